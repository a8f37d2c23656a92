//! Result of a finished match.

use std::fmt::Display;

use crate::{
    bot_channel::{ChannelState, Fault},
    game::{GameState, PlayerId, Termination},
};

/// Something a bot got wrong during one tick. Never fatal to the match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickError {
    pub tick: u32,
    pub player: PlayerId,
    pub message: String,
}

impl Display for TickError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tick {} player {}: {}", self.tick, self.player, self.message)
    }
}

/// Final score of one player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    pub player: PlayerId,
    pub name: String,
    pub planets: usize,
    /// Population on owned planets plus troops still travelling.
    pub strength: u64,
}

/// What became of one bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatReport {
    pub seat: usize,
    pub bot: String,
    pub player: PlayerId,
    /// Whether the bot answered the liveness probe.
    pub admitted: bool,
    pub state: ChannelState,
    pub fault: Option<Fault>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Id of the tick the match stopped at.
    pub final_tick: u32,
    pub termination: Termination,
    /// The last player owning planets, if there is exactly one.
    pub winner: Option<PlayerId>,
    /// Ordered by strength, strongest first.
    pub standings: Vec<Standing>,
    pub seats: Vec<SeatReport>,
    pub errors: Vec<TickError>,
}

impl MatchOutcome {
    pub(crate) fn new(
        state: &GameState,
        termination: Termination,
        seats: Vec<SeatReport>,
        errors: Vec<TickError>,
    ) -> MatchOutcome {
        let owners = state.owners();
        let winner = if owners.len() == 1 {
            owners.first().copied()
        } else {
            None
        };

        let mut standings: Vec<Standing> = state
            .players()
            .iter()
            .map(|player| Standing {
                player: player.id,
                name: player.name.clone(),
                planets: state.planets_owned_by(player.id),
                strength: state.strength(player.id),
            })
            .collect();
        standings.sort_by(|a, b| b.strength.cmp(&a.strength).then(a.player.cmp(&b.player)));

        MatchOutcome {
            final_tick: state.tick().id,
            termination,
            winner,
            standings,
            seats,
            errors,
        }
    }

    pub fn standing(&self, player: PlayerId) -> Option<&Standing> {
        self.standings.iter().find(|s| s.player == player)
    }

    pub fn errors_of(&self, player: PlayerId) -> impl Iterator<Item = &TickError> {
        self.errors.iter().filter(move |e| e.player == player)
    }
}

impl Display for MatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scores = self
            .standings
            .iter()
            .map(|s| format!("{} ({} planets, {} units)", s.name, s.planets, s.strength))
            .collect::<Vec<_>>()
            .join(" - ");
        write!(f, "tick {} {:?}: {scores}", self.final_tick, self.termination)?;
        if let Some(winner) = self.winner {
            write!(f, ", winner {winner}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Player;

    #[test]
    fn default_map_has_no_winner() {
        let state = GameState::default_map(Player::new(1, "a"), Player::new(2, "b")).unwrap();
        let outcome = MatchOutcome::new(&state, Termination::TickCap, vec![], vec![]);
        assert_eq!(outcome.winner, None);
        assert_eq!(outcome.final_tick, 0);
        assert_eq!(outcome.standings.len(), 2);
        // equal strength falls back to player order
        assert_eq!(outcome.standings[0].player, PlayerId(1));
        assert_eq!(outcome.standing(PlayerId(2)).unwrap().strength, 100);
        assert_eq!(outcome.standing(PlayerId(2)).unwrap().planets, 1);
        assert!(outcome.to_string().starts_with("tick 0 TickCap: a (1 planets, 100 units)"));
    }
}
