//! Config for the match runner behaviors
//!
//! This module provides configuration options for controlling what the runner prints and logs.
//! Time limits live in [`Constraints`](crate::constraints::Constraints).
//!
//! Configuration can be created programmatically using [`Configuration::new()`] or by reading
//! environment variables using [`Configuration::from_env()`].
//!
//! # Environment Variables
//!
//! The following environment variables can be used to override configuration values. All
//! values are optional, and case-insensitive. Set the value to `"true"` to enable a flag.
//!
//! - `MATCH_VERBOSE` — Print match progress to stdout (default: `true`)
//! - `MATCH_LOG` — Enable logging to a file (default: `false`)
//! - `MATCH_DEBUG_BOT_STDERR` — Forward bot stderr to the logs (default: `false`)

/// Configuration for match runner behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Configuration {
    pub(crate) verbose: bool,
    pub(crate) log: bool,
    pub(crate) debug_bot_stderr: bool,
}

impl Configuration {
    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - The runner will print match progress to stdout.
    /// - Logging to file is disabled.
    /// - Bot stderr is only kept in memory (and in the bot log directory, if any).
    pub fn new() -> Self {
        Self {
            verbose: true,
            log: false,
            debug_bot_stderr: false,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// The following environment variables are recognized:
    /// - `MATCH_VERBOSE`: if set to `"true"`, enables verbose output (default: `true`)
    /// - `MATCH_LOG`: if set to `"true"`, enables logging to file (default: `false`)
    /// - `MATCH_DEBUG_BOT_STDERR`: if set to `"true"`, forwards bot stderr to the logs (default: `false`)
    ///
    /// Any other value (including unset) will result in using the default value for each field.
    pub fn from_env() -> Self {
        fn get_env_flag(var: &str, default: bool) -> bool {
            match std::env::var(var) {
                Ok(val) => val.eq_ignore_ascii_case("true"),
                Err(_) => default,
            }
        }

        Self {
            verbose: get_env_flag("MATCH_VERBOSE", true),
            log: get_env_flag("MATCH_LOG", false),
            debug_bot_stderr: get_env_flag("MATCH_DEBUG_BOT_STDERR", false),
        }
    }

    /// Enable or disable progress output.
    pub fn with_verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// Enable or disable forwarding of bot stderr to the logs (debug purposes only).
    pub fn with_debug_bot_stderr(mut self, value: bool) -> Self {
        self.debug_bot_stderr = value;
        self
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = Configuration::new()
            .with_verbose(false)
            .with_debug_bot_stderr(true);
        assert!(!config.verbose);
        assert!(!config.log);
        assert!(config.debug_bot_stderr);
        assert_eq!(Configuration::default(), Configuration::new());
    }
}
