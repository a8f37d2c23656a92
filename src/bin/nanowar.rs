//! Plays one match of nanowar on the default map.
//!
//! ```text
//! nanowar "<first bot command line>" "<second bot command line>"
//! ```
//!
//! Time limits and output are configured through the environment, see
//! [`ConstraintsBuilder::from_env`] and [`Configuration::from_env`].

use std::env;

use anyhow::{bail, Context};
use nanowar::prelude::*;

fn main() -> anyhow::Result<()> {
    let mut args = env::args();
    let _ = args.next(); // Skip binary name

    let (Some(first), Some(second)) = (args.next(), args.next()) else {
        bail!("usage: nanowar <first bot command> <second bot command>");
    };

    let bots = vec![
        BotSpec::from_command_line("bot 1", &first).context("invalid first bot")?,
        BotSpec::from_command_line("bot 2", &second).context("invalid second bot")?,
    ];
    let state = GameState::default_map(Player::new(1, first), Player::new(2, second))?;
    let constraints = ConstraintsBuilder::from_env().build()?;
    let config = Configuration::from_env();

    let outcome = run_match(state, bots, constraints, config)?;

    for standing in &outcome.standings {
        println!(
            "{}: {} planets, {} units",
            standing.name, standing.planets, standing.strength
        );
    }
    match outcome.winner {
        Some(winner) => println!("winner: player {winner} at tick {}", outcome.final_tick),
        None => println!("no winner at tick {} ({:?})", outcome.final_tick, outcome.termination),
    }
    for error in &outcome.errors {
        eprintln!("{error}");
    }
    Ok(())
}
