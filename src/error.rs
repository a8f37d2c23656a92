//! Error types shared by the channel layer, the protocol codec and the match engine.
//!
//! Per-bot errors ([`ChannelError`], [`ProtocolError`]) never abort a match: the engine logs
//! them and degrades the offending seat. Only a [`MatchError`] stops the engine loop.

use std::io;

use thiserror::Error;

use crate::game::{InFlightTroop, PlanetId, PlayerId};

/// Failure of a write towards a bot.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The bot process is gone (or was never started) and its input stream is closed.
    #[error("channel closed")]
    Closed,

    /// The seat was excluded from the match and no message is sent to it anymore.
    #[error("seat excluded from the match")]
    Excluded,

    /// Writing to the bot's standard input failed.
    #[error("write error: {0}")]
    Write(#[from] io::Error),
}

/// Reasons a bot response is rejected. A rejected response counts as "no orders" for one tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Nothing was received.
    #[error("empty response")]
    EmptyResponse,

    /// The first line is not a non-negative integer.
    #[error("invalid order count '{0}'")]
    MalformedCount(String),

    /// An order line is not made of three non-negative integers.
    #[error("invalid order line '{0}'")]
    MalformedOrder(String),

    /// More orders announced than there are distinct routes on the map.
    #[error("{count} orders announced, at most {max} are possible")]
    TooManyOrders {
        /// Announced count.
        count: usize,
        /// Number of distinct `(from, to)` routes.
        max: usize,
    },

    /// The response ended before all announced orders were read.
    #[error("expected {expected} orders, got {received}")]
    MissingOrders {
        /// Announced count.
        expected: usize,
        /// Order lines actually present.
        received: usize,
    },

    /// Trailing lines after the announced orders.
    #[error("expected {expected} orders, got more lines")]
    UnexpectedLines {
        /// Announced count.
        expected: usize,
    },

    /// The planet does not exist on this map.
    #[error("invalid planet id {0}")]
    PlanetOutOfRange(PlanetId),

    /// Troops can only leave owned planets.
    #[error("planet {0} is not owned by any player")]
    NeutralSource(PlanetId),

    /// The source planet belongs to someone else.
    #[error("planet {planet} is owned by player {owner}")]
    ForeignSource {
        /// Source planet.
        planet: PlanetId,
        /// Its actual owner.
        owner: PlayerId,
    },

    /// Orders from one planet exceed its population.
    #[error("planet {planet} has {available} troops left, {requested} requested")]
    InsufficientPopulation {
        /// Source planet.
        planet: PlanetId,
        /// Size of the rejected order.
        requested: u32,
        /// Population still available after the previous orders.
        available: u32,
    },

    /// A troop must carry at least one unit.
    #[error("empty troop from {from} to {to}")]
    EmptyOrder {
        /// Source planet.
        from: PlanetId,
        /// Destination planet.
        to: PlanetId,
    },

    /// One route may only be used once per tick.
    #[error("troops sent from {from} to {to} more than once")]
    DuplicateRoute {
        /// Source planet.
        from: PlanetId,
        /// Destination planet.
        to: PlanetId,
    },
}

/// Invalid map given to [`GameState::new`](crate::game::GameState::new).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    /// Planet ids must be `0..n` in order.
    #[error("planet at index {index} has id {id}")]
    PlanetOrder {
        /// Position in the planet list.
        index: usize,
        /// Id found at that position.
        id: PlanetId,
    },

    /// Efficiency is a number of ticks and must be positive.
    #[error("planet {0} has a zero efficiency")]
    ZeroEfficiency(PlanetId),

    /// The distance matrix must be `n x n`.
    #[error("distance matrix is not {expected}x{expected}")]
    DistanceShape {
        /// Planet count.
        expected: usize,
    },

    /// `distance[i][i]` must be zero.
    #[error("distance from planet {0} to itself is not zero")]
    DistanceDiagonal(PlanetId),

    /// `distance[i][j]` must equal `distance[j][i]`.
    #[error("distance between planets {0} and {1} is not symmetric")]
    DistanceSymmetry(PlanetId, PlanetId),

    /// The tick must hold one state per planet.
    #[error("tick has {found} planet states for {expected} planets")]
    TickShape {
        /// Planet count.
        expected: usize,
        /// States found.
        found: usize,
    },

    /// Each player id may only appear once.
    #[error("player {0} is declared twice")]
    DuplicatePlayer(PlayerId),

    /// A planet or troop refers to a player that is not in the match.
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),

    /// A troop must be non-empty, travel between existing planets and not land in the past.
    #[error("invalid troop {0:?}")]
    InvalidTroop(InFlightTroop),

    /// An owner cannot have taken a planet in the future.
    #[error("planet {planet} owned since tick {starting_tick}, after current tick {tick}")]
    FutureOwnership {
        /// Planet concerned.
        planet: PlanetId,
        /// Declared starting tick.
        starting_tick: u32,
        /// Current tick id.
        tick: u32,
    },
}

/// Fatal errors: the match cannot go on.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The state reached a situation the rules cannot produce.
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),

    /// The map handed to the engine is unusable.
    #[error("invalid map: {0}")]
    InvalidMap(#[from] MapError),

    /// Every player needs exactly one bot.
    #[error("{bots} bots for {players} players")]
    SeatMismatch {
        /// Bots in the group.
        bots: usize,
        /// Players on the map.
        players: usize,
    },
}
