//! Defines the time limits applied to bots during a match.
//!
//! # Overview
//!
//! The main entry point is the [`ConstraintsBuilder`] struct, which uses a builder pattern
//! to configure limits. These include:
//!
//! - **Time budget**:
//!   * Starting budget, available before the first round
//!   * Per-round replenishment, added each time the engine waits for a bot
//!   * Poll interval, the granularity at which waiting is charged
//! - **Match length**: the tick cap
//!
//! The budget is cumulative: time a fast bot does not spend is kept for later rounds.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use nanowar::constraints::ConstraintsBuilder;
//!
//! let constraints = ConstraintsBuilder::new()
//!     .with_starting_budget(Duration::from_millis(500))
//!     .with_budget_per_round(Duration::from_millis(200))
//!     .with_max_ticks(300)
//!     .build()
//!     .unwrap();
//! ```
//!
//! You may also construct constraints from environment variables using
//! [`ConstraintsBuilder::from_env()`] for runtime configurability.

use std::{env, time::Duration};

use anyhow::bail;

const DEFAULT_STARTING_BUDGET: Duration = Duration::from_millis(1000);
const DEFAULT_BUDGET_PER_ROUND: Duration = Duration::from_millis(1000);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(30);
const DEFAULT_MAX_TICKS: u32 = 1000;

/// A builder for the time limits of a match.
///
/// Every value left unset falls back to the standard rules: 1000 ms of starting budget,
/// 1000 ms added per round, 30 ms polls and 1000 ticks.
#[derive(Debug, Default)]
pub struct ConstraintsBuilder {
    starting_budget: Option<Duration>,
    budget_per_round: Option<Duration>,
    poll_interval: Option<Duration>,
    max_ticks: Option<u32>,
}

impl ConstraintsBuilder {
    /// Creates a new `ConstraintsBuilder` with the standard rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `ConstraintsBuilder` configured from environment variables.
    ///
    /// Read environment variables are:
    /// - `STARTING_BUDGET_MS` (u64): budget of each bot before the first round
    /// - `BUDGET_PER_ROUND_MS` (u64): budget added each round
    /// - `POLL_INTERVAL_MS` (u64): polling granularity
    /// - `MAX_TICKS` (u32): tick cap
    #[must_use]
    pub fn from_env() -> Self {
        fn parse_duration_millis(var: &str) -> Option<Duration> {
            env::var(var)
                .ok()?
                .parse::<u64>()
                .ok()
                .map(Duration::from_millis)
        }

        ConstraintsBuilder {
            starting_budget: parse_duration_millis("STARTING_BUDGET_MS"),
            budget_per_round: parse_duration_millis("BUDGET_PER_ROUND_MS"),
            poll_interval: parse_duration_millis("POLL_INTERVAL_MS"),
            max_ticks: env::var("MAX_TICKS").ok().and_then(|v| v.parse().ok()),
        }
    }

    /// Sets the budget each bot holds before its first round.
    #[must_use]
    pub fn with_starting_budget(self, duration: Duration) -> Self {
        Self {
            starting_budget: Some(duration),
            ..self
        }
    }

    /// Sets the budget added to a bot each time the engine waits for it.
    #[must_use]
    pub fn with_budget_per_round(self, duration: Duration) -> Self {
        Self {
            budget_per_round: Some(duration),
            ..self
        }
    }

    /// Sets the waiting granularity. Each wait is charged one full interval.
    #[must_use]
    pub fn with_poll_interval(self, duration: Duration) -> Self {
        Self {
            poll_interval: Some(duration),
            ..self
        }
    }

    /// Sets the number of ticks after which the match stops.
    #[must_use]
    pub fn with_max_ticks(self, max: u32) -> Self {
        Self {
            max_ticks: Some(max),
            ..self
        }
    }

    /// Consumes the builder and returns the constructed `Constraints`.
    ///
    /// # Errors
    ///
    /// Returns an error when the poll interval or the tick cap is zero.
    pub fn build(self) -> anyhow::Result<Constraints> {
        let poll_interval = self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL);
        if poll_interval.is_zero() {
            bail!("poll interval must be positive");
        }
        let max_ticks = self.max_ticks.unwrap_or(DEFAULT_MAX_TICKS);
        if max_ticks == 0 {
            bail!("a match must last at least one tick");
        }

        Ok(Constraints {
            starting_budget: self.starting_budget.unwrap_or(DEFAULT_STARTING_BUDGET),
            budget_per_round: self.budget_per_round.unwrap_or(DEFAULT_BUDGET_PER_ROUND),
            poll_interval,
            max_ticks,
        })
    }
}

/// Obtained using `ConstraintsBuilder`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Constraints {
    pub(crate) starting_budget: Duration,
    pub(crate) budget_per_round: Duration,
    pub(crate) poll_interval: Duration,
    pub(crate) max_ticks: u32,
}

impl Constraints {
    /// create a ConstraintsBuilder
    pub fn builder() -> ConstraintsBuilder {
        ConstraintsBuilder::new()
    }

    pub fn max_ticks(&self) -> u32 {
        self.max_ticks
    }
}

impl Default for Constraints {
    fn default() -> Self {
        Constraints {
            starting_budget: DEFAULT_STARTING_BUDGET,
            budget_per_round: DEFAULT_BUDGET_PER_ROUND,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_ticks: DEFAULT_MAX_TICKS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_rules() {
        let constraints = ConstraintsBuilder::new().build().unwrap();
        assert_eq!(constraints, Constraints::default());
        assert_eq!(constraints.poll_interval, Duration::from_millis(30));
        assert_eq!(constraints.max_ticks(), 1000);
    }

    #[test]
    fn rejects_zero_poll_interval() {
        assert!(Constraints::builder()
            .with_poll_interval(Duration::ZERO)
            .build()
            .is_err());
    }

    #[test]
    fn rejects_zero_ticks() {
        assert!(Constraints::builder().with_max_ticks(0).build().is_err());
    }
}
