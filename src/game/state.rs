use std::{
    collections::{BTreeSet, HashSet},
    fmt::Display,
};

use crate::error::MapError;

/// Index of a planet in the map. Planet `i` is always at position `i`.
pub type PlanetId = usize;

/// Identity of a player, as written on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u32);

impl Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
}

impl Player {
    pub fn new(id: u32, name: impl Into<String>) -> Player {
        Player {
            id: PlayerId(id),
            name: name.into(),
        }
    }
}

/// Static part of a planet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanetDefinition {
    pub id: PlanetId,
    pub position: (i64, i64),
    /// Ticks needed for one unit of population growth.
    pub efficiency: u32,
}

/// Travel time in ticks between every pair of planets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistanceMatrix {
    rows: Vec<Vec<u32>>,
}

impl DistanceMatrix {
    pub fn new(rows: Vec<Vec<u32>>) -> DistanceMatrix {
        DistanceMatrix { rows }
    }

    pub fn get(&self, from: PlanetId, to: PlanetId) -> Option<u32> {
        self.rows.get(from)?.get(to).copied()
    }

    pub fn rows(&self) -> &[Vec<u32>] {
        &self.rows
    }

    fn validate(&self, planet_count: usize) -> Result<(), MapError> {
        if self.rows.len() != planet_count || self.rows.iter().any(|r| r.len() != planet_count) {
            return Err(MapError::DistanceShape {
                expected: planet_count,
            });
        }
        for from in 0..planet_count {
            if self.rows[from][from] != 0 {
                return Err(MapError::DistanceDiagonal(from));
            }
            for to in (from + 1)..planet_count {
                if self.rows[from][to] != self.rows[to][from] {
                    return Err(MapError::DistanceSymmetry(from, to));
                }
            }
        }
        Ok(())
    }
}

/// Who holds a planet, and since when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    pub player: PlayerId,
    /// Tick at which `player` took the planet. Growth is counted from here.
    pub starting_tick: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanetState {
    pub id: PlanetId,
    /// `None` for a neutral planet.
    pub owner: Option<Owner>,
    pub population: u32,
}

impl PlanetState {
    pub fn owned(id: PlanetId, player: PlayerId, starting_tick: u32, population: u32) -> Self {
        PlanetState {
            id,
            owner: Some(Owner {
                player,
                starting_tick,
            }),
            population,
        }
    }

    pub fn neutral(id: PlanetId, population: u32) -> Self {
        PlanetState {
            id,
            owner: None,
            population,
        }
    }

    pub fn owner_id(&self) -> Option<PlayerId> {
        self.owner.map(|o| o.player)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlightTroop {
    pub from: PlanetId,
    pub to: PlanetId,
    pub who: PlayerId,
    pub size: u32,
    /// Tick at which the troop lands on `to`.
    pub end_tick: u32,
}

/// Mutable part of the game at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tick {
    pub id: u32,
    pub planets: Vec<PlanetState>,
    pub troops: Vec<InFlightTroop>,
}

/// One troop dispatch, already validated against the tick it was issued on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub player: PlayerId,
    pub from: PlanetId,
    pub to: PlanetId,
    pub size: u32,
}

/// Every order of one bot for one tick.
pub type Command = Vec<Order>;

/// Why a match stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// At most one player still owns planets.
    Elimination,
    /// The tick cap was reached.
    TickCap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    players: Vec<Player>,
    pub(super) planets: Vec<PlanetDefinition>,
    distances: DistanceMatrix,
    pub(super) tick: Tick,
}

impl GameState {
    /// Builds a state after checking that the map is coherent.
    pub fn new(
        players: Vec<Player>,
        planets: Vec<PlanetDefinition>,
        distances: DistanceMatrix,
        tick: Tick,
    ) -> Result<GameState, MapError> {
        let mut ids = HashSet::new();
        for player in &players {
            if !ids.insert(player.id) {
                return Err(MapError::DuplicatePlayer(player.id));
            }
        }

        for (index, planet) in planets.iter().enumerate() {
            if planet.id != index {
                return Err(MapError::PlanetOrder {
                    index,
                    id: planet.id,
                });
            }
            if planet.efficiency == 0 {
                return Err(MapError::ZeroEfficiency(planet.id));
            }
        }

        distances.validate(planets.len())?;

        if tick.planets.len() != planets.len() {
            return Err(MapError::TickShape {
                expected: planets.len(),
                found: tick.planets.len(),
            });
        }
        for (index, planet) in tick.planets.iter().enumerate() {
            if planet.id != index {
                return Err(MapError::PlanetOrder {
                    index,
                    id: planet.id,
                });
            }
            if let Some(owner) = planet.owner {
                if !ids.contains(&owner.player) {
                    return Err(MapError::UnknownPlayer(owner.player));
                }
                if owner.starting_tick > tick.id {
                    return Err(MapError::FutureOwnership {
                        planet: planet.id,
                        starting_tick: owner.starting_tick,
                        tick: tick.id,
                    });
                }
            }
        }
        for troop in &tick.troops {
            if !ids.contains(&troop.who) {
                return Err(MapError::UnknownPlayer(troop.who));
            }
            if troop.from >= planets.len()
                || troop.to >= planets.len()
                || troop.size == 0
                || troop.end_tick < tick.id
            {
                return Err(MapError::InvalidTroop(*troop));
            }
        }

        Ok(GameState {
            players,
            planets,
            distances,
            tick,
        })
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn planets(&self) -> &[PlanetDefinition] {
        &self.planets
    }

    pub fn distances(&self) -> &DistanceMatrix {
        &self.distances
    }

    pub fn tick(&self) -> &Tick {
        &self.tick
    }

    pub fn planet_count(&self) -> usize {
        self.planets.len()
    }

    /// Players owning at least one planet.
    pub fn owners(&self) -> BTreeSet<PlayerId> {
        self.tick
            .planets
            .iter()
            .filter_map(PlanetState::owner_id)
            .collect()
    }

    /// Population on owned planets plus troops still travelling.
    pub fn strength(&self, player: PlayerId) -> u64 {
        let on_planets: u64 = self
            .tick
            .planets
            .iter()
            .filter(|p| p.owner_id() == Some(player))
            .map(|p| u64::from(p.population))
            .sum();
        let travelling: u64 = self
            .tick
            .troops
            .iter()
            .filter(|t| t.who == player)
            .map(|t| u64::from(t.size))
            .sum();
        on_planets + travelling
    }

    pub fn planets_owned_by(&self, player: PlayerId) -> usize {
        self.tick
            .planets
            .iter()
            .filter(|p| p.owner_id() == Some(player))
            .count()
    }

    /// Every unit in the game, neutral garrisons included.
    pub fn total_units(&self) -> u64 {
        let on_planets: u64 = self
            .tick
            .planets
            .iter()
            .map(|p| u64::from(p.population))
            .sum();
        let travelling: u64 = self.tick.troops.iter().map(|t| u64::from(t.size)).sum();
        on_planets + travelling
    }

    pub fn termination(&self, max_ticks: u32) -> Option<Termination> {
        if self.owners().len() <= 1 {
            Some(Termination::Elimination)
        } else if self.tick.id >= max_ticks {
            Some(Termination::TickCap)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_planets() -> (Vec<Player>, Vec<PlanetDefinition>, DistanceMatrix) {
        let players = vec![Player::new(1, "a"), Player::new(2, "b")];
        let planets = vec![
            PlanetDefinition {
                id: 0,
                position: (0, 0),
                efficiency: 1,
            },
            PlanetDefinition {
                id: 1,
                position: (10, 0),
                efficiency: 1,
            },
        ];
        let distances = DistanceMatrix::new(vec![vec![0, 10], vec![10, 0]]);
        (players, planets, distances)
    }

    fn tick(planets: Vec<PlanetState>) -> Tick {
        Tick {
            id: 0,
            planets,
            troops: vec![],
        }
    }

    #[test]
    fn accepts_coherent_map() {
        let (players, planets, distances) = two_planets();
        let state = GameState::new(
            players,
            planets,
            distances,
            tick(vec![
                PlanetState::owned(0, PlayerId(1), 0, 100),
                PlanetState::owned(1, PlayerId(2), 0, 100),
            ]),
        )
        .unwrap();
        assert_eq!(state.owners().len(), 2);
        assert_eq!(state.strength(PlayerId(1)), 100);
        assert_eq!(state.termination(1000), None);
    }

    #[test]
    fn rejects_asymmetric_distances() {
        let (players, planets, _) = two_planets();
        let distances = DistanceMatrix::new(vec![vec![0, 10], vec![9, 0]]);
        let err = GameState::new(
            players,
            planets,
            distances,
            tick(vec![PlanetState::neutral(0, 0), PlanetState::neutral(1, 0)]),
        )
        .unwrap_err();
        assert_eq!(err, MapError::DistanceSymmetry(0, 1));
    }

    #[test]
    fn rejects_unknown_owner() {
        let (players, planets, distances) = two_planets();
        let err = GameState::new(
            players,
            planets,
            distances,
            tick(vec![
                PlanetState::owned(0, PlayerId(7), 0, 1),
                PlanetState::neutral(1, 0),
            ]),
        )
        .unwrap_err();
        assert_eq!(err, MapError::UnknownPlayer(PlayerId(7)));
    }

    #[test]
    fn rejects_missing_planet_state() {
        let (players, planets, distances) = two_planets();
        let err = GameState::new(
            players,
            planets,
            distances,
            tick(vec![PlanetState::neutral(0, 0)]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            MapError::TickShape {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn single_owner_is_elimination() {
        let (players, planets, distances) = two_planets();
        let state = GameState::new(
            players,
            planets,
            distances,
            tick(vec![
                PlanetState::owned(0, PlayerId(1), 0, 100),
                PlanetState::neutral(1, 50),
            ]),
        )
        .unwrap();
        assert_eq!(state.termination(1000), Some(Termination::Elimination));
    }
}
