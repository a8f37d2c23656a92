use std::{
    fs::File,
    hash::Hash,
    path::PathBuf,
    sync::atomic::{AtomicUsize, Ordering},
};

use anyhow::{bail, Context};

/// How to start one bot.
#[derive(Debug)]
pub struct BotSpec {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    /// Where to write the bot's stderr at the end of each match.
    pub log_dir: Option<PathBuf>,
    match_number: AtomicUsize,
}

impl PartialEq for BotSpec {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for BotSpec {}

impl Hash for BotSpec {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.command.hash(state);
        self.args.hash(state);
    }
}

impl BotSpec {
    pub fn new(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> BotSpec {
        BotSpec {
            name: name.into(),
            command: command.into(),
            args,
            log_dir: None,
            match_number: AtomicUsize::new(1),
        }
    }

    /// Splits a command line on whitespace: the first word is the program, the rest its
    /// arguments. No shell quoting is interpreted.
    pub fn from_command_line(name: impl Into<String>, command_line: &str) -> anyhow::Result<BotSpec> {
        let mut words = command_line.split_whitespace().map(str::to_string);
        let Some(command) = words.next() else {
            bail!("empty command line");
        };
        Ok(BotSpec::new(name, command, words.collect()))
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> BotSpec {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn should_be_logged(&self) -> bool {
        self.log_dir.is_some()
    }

    /// Creates `match_<n>.txt` in the log directory, `n` counting the matches of this bot.
    pub fn create_new_match_log_file(&self) -> anyhow::Result<File> {
        let dir_path = self
            .log_dir
            .as_ref()
            .context("bot has no log directory. Cannot create match log file")?;

        let id = self.match_number.fetch_add(1, Ordering::Relaxed);

        let path = dir_path.join(format!("match_{id}.txt"));

        File::create_new(&path).with_context(|| format!("file {} already exists", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_is_split_on_whitespace() {
        let spec = BotSpec::from_command_line("idle", "python3  bots/idle.py --quiet").unwrap();
        assert_eq!(spec.command, "python3");
        assert_eq!(spec.args, vec!["bots/idle.py", "--quiet"]);
        assert!(!spec.should_be_logged());
    }

    #[test]
    fn empty_command_line_is_rejected() {
        assert!(BotSpec::from_command_line("nobody", "   ").is_err());
    }

    #[test]
    fn log_files_are_numbered() {
        let dir = std::env::temp_dir().join(format!("nanowar_bot_logs_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let spec = BotSpec::new("logged", "true", vec![]).with_log_dir(&dir);
        spec.create_new_match_log_file().unwrap();
        spec.create_new_match_log_file().unwrap();
        assert!(dir.join("match_1.txt").exists());
        assert!(dir.join("match_2.txt").exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
