//! Game model and rules.
//!
//! [`GameState`] is the single mutable aggregate of a match. It is built from a validated map
//! ([`GameState::new`] or [`GameState::default_map`]) and moved forward one tick at a time by
//! [`GameState::advance`].

mod map;
mod state;
mod world;

pub use state::{
    Command, DistanceMatrix, GameState, InFlightTroop, Order, Owner, PlanetDefinition, PlanetId,
    PlanetState, Player, PlayerId, Termination, Tick,
};
pub use world::{resolve_combat, Arrival, CombatOutcome, TickReport};
