use crate::error::MapError;

use super::{DistanceMatrix, GameState, PlanetDefinition, PlanetState, Player, Tick};

const DEFAULT_POSITIONS: [(i64, i64); 4] = [(0, 0), (10, 10), (0, 10), (10, 0)];
const DEFAULT_DISTANCES: [[u32; 4]; 4] = [
    [0, 14, 10, 10],
    [14, 0, 10, 10],
    [10, 10, 0, 14],
    [10, 10, 14, 0],
];
const DEFAULT_POPULATION: u32 = 100;

impl GameState {
    /// The standard two-player map: four planets on the corners of a 10x10 square.
    ///
    /// `first` starts on planet 0 and `second` on the opposite corner (planet 1). Planets 2 and
    /// 3 are neutral. Every planet holds 100 units and grows by one unit per tick.
    pub fn default_map(first: Player, second: Player) -> Result<GameState, MapError> {
        let planets = DEFAULT_POSITIONS
            .iter()
            .enumerate()
            .map(|(id, &position)| PlanetDefinition {
                id,
                position,
                efficiency: 1,
            })
            .collect();
        let distances =
            DistanceMatrix::new(DEFAULT_DISTANCES.iter().map(|row| row.to_vec()).collect());
        let tick = Tick {
            id: 0,
            planets: vec![
                PlanetState::owned(0, first.id, 0, DEFAULT_POPULATION),
                PlanetState::owned(1, second.id, 0, DEFAULT_POPULATION),
                PlanetState::neutral(2, DEFAULT_POPULATION),
                PlanetState::neutral(3, DEFAULT_POPULATION),
            ],
            troops: vec![],
        };

        GameState::new(vec![first, second], planets, distances, tick)
    }
}
