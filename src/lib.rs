//! # Nanowar
//!
//! Runs matches of nanowar, a turn-based planet conquest game, between bots that are separate
//! programs talking over their standard input and output.
//!
//! It provides:
//! - The game rules: map, troop movement, combat and growth ([`game`])
//! - The text protocol spoken with the bots ([`protocol`])
//! - Process handling with a cumulative time budget per bot ([`bot_channel`], [`bot_group`])
//! - The match loop ([`MatchRunner`](crate::match_runner::MatchRunner) and
//!   [`run_match`](crate::match_runner::run_match))
//!
//! A bot that crashes, times out or sends nonsense never stops a match: it loses its turn, or
//! its seat, and the other bots keep playing.
//!
//! # Documentation Overview
//!
//! - For the wire format a bot has to implement, see the [`protocol`] module.
//! - For time limits, see [`constraints`]; for output and logging, see
//!   [`Configuration`](crate::configuration::Configuration).
//! - For what a finished match reports, see [`MatchOutcome`](crate::outcome::MatchOutcome).
//!
//! # Usage Example
//!
//! ```no_run
//! use nanowar::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let constraints = ConstraintsBuilder::new().with_max_ticks(500).build()?;
//!     let config = Configuration::new().with_log(true);
//!
//!     let state = GameState::default_map(Player::new(1, "greedy"), Player::new(2, "idle"))?;
//!     let bots = vec![
//!         BotSpec::from_command_line("greedy", "./bots/greedy")?,
//!         BotSpec::from_command_line("idle", "python3 bots/idle.py")?,
//!     ];
//!
//!     let outcome = run_match(state, bots, constraints, config)?;
//!     println!("{outcome}");
//!     for error in &outcome.errors {
//!         println!("{error}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Bot Requirements
//!
//! - Answer `OK` to the first line, `START`
//! - Read the setup message, then one tick message per round
//! - Answer every tick with an order count and that many `<from> <to> <size>` lines
//! - Stay within the time budget: unused time is kept for later rounds, but once it runs out
//!   the bot is never waited for again

pub use anyhow;

pub mod bot;
pub mod bot_channel;
pub mod bot_group;
pub mod configuration;
pub mod constraints;
pub mod error;
pub mod game;
mod logger;
pub mod match_runner;
pub mod outcome;
pub mod protocol;

/// Commonly used types for quick access.
///
/// ```rust
/// use nanowar::prelude::*;
/// ```
pub mod prelude {
    pub use crate::bot::BotSpec;
    pub use crate::configuration::Configuration;
    pub use crate::constraints::ConstraintsBuilder;
    pub use crate::game::{GameState, Player, PlayerId, Termination};
    pub use crate::match_runner::{run_match, MatchRunner};
    pub use crate::outcome::MatchOutcome;
}
