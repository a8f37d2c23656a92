//! Text protocol spoken with the bots.
//!
//! Every message is a block of newline-separated lines; the channel appends the final line
//! terminator.
//!
//! * Engine -> bot, once: the setup message
//!   ```text
//!   <player id>
//!   <planet count>
//!   <x> <y> <efficiency>        (one line per planet)
//!   <d0> <d1> ... <dn-1>        (one line per distance matrix row)
//!   ```
//! * Engine -> bot, every tick: the tick message
//!   ```text
//!   <tick id>
//!   <planet id> <owner id or -1> <population>   (one line per planet)
//!   <troop count>
//!   <who> <from> <to> <size> <end tick>         (one line per troop)
//!   ```
//! * Bot -> engine, every tick: an order count `n` followed by `n` lines `<from> <to> <size>`.
//!
//! Everything here is pure; validation errors are returned, never logged.

use std::collections::{BTreeMap, HashSet};

use crate::error::ProtocolError;
use crate::game::{Command, GameState, Order, PlanetId, PlayerId, Tick};

/// Liveness probe sent before the setup message.
pub const START: &str = "START";
/// The only accepted answer to [`START`].
pub const OK: &str = "OK";

pub fn setup_message(state: &GameState, player: PlayerId) -> String {
    let mut lines = Vec::with_capacity(2 + 2 * state.planet_count());
    lines.push(player.to_string());
    lines.push(state.planet_count().to_string());
    for planet in state.planets() {
        lines.push(format!(
            "{} {} {}",
            planet.position.0, planet.position.1, planet.efficiency
        ));
    }
    for row in state.distances().rows() {
        lines.push(join(row));
    }
    lines.join("\n")
}

pub fn tick_message(tick: &Tick) -> String {
    let mut lines = Vec::with_capacity(2 + tick.planets.len() + tick.troops.len());
    lines.push(tick.id.to_string());
    for planet in &tick.planets {
        let owner = planet
            .owner_id()
            .map_or_else(|| "-1".to_string(), |id| id.to_string());
        lines.push(format!("{} {owner} {}", planet.id, planet.population));
    }
    lines.push(tick.troops.len().to_string());
    for troop in &tick.troops {
        lines.push(format!(
            "{} {} {} {} {}",
            troop.who, troop.from, troop.to, troop.size, troop.end_tick
        ));
    }
    lines.join("\n")
}

/// Reads the first line of a response: the number of order lines that follow.
pub fn order_count(line: &str, state: &GameState) -> Result<usize, ProtocolError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ProtocolError::EmptyResponse);
    }
    let count: usize = line
        .parse()
        .map_err(|_| ProtocolError::MalformedCount(line.to_string()))?;
    let max = state.planet_count() * state.planet_count();
    if count > max {
        return Err(ProtocolError::TooManyOrders { count, max });
    }
    Ok(count)
}

/// Validates `lines` as the `expected` orders of `player` against the current tick.
///
/// All orders are checked together: orders leaving the same planet may not exceed its
/// population, and a route may only appear once.
pub fn parse_orders<S: AsRef<str>>(
    state: &GameState,
    player: PlayerId,
    expected: usize,
    lines: &[S],
) -> Result<Command, ProtocolError> {
    if lines.len() < expected {
        return Err(ProtocolError::MissingOrders {
            expected,
            received: lines.len(),
        });
    }
    if lines.len() > expected {
        return Err(ProtocolError::UnexpectedLines { expected });
    }

    let planets = &state.tick().planets;
    let mut remaining: BTreeMap<PlanetId, u32> = BTreeMap::new();
    let mut routes = HashSet::new();
    let mut command = Vec::with_capacity(expected);

    for line in lines {
        let (from, to, size) = parse_order_line(line.as_ref())?;
        if from >= planets.len() {
            return Err(ProtocolError::PlanetOutOfRange(from));
        }
        if to >= planets.len() {
            return Err(ProtocolError::PlanetOutOfRange(to));
        }

        let source = &planets[from];
        match source.owner_id() {
            None => return Err(ProtocolError::NeutralSource(from)),
            Some(owner) if owner != player => {
                return Err(ProtocolError::ForeignSource {
                    planet: from,
                    owner,
                })
            }
            Some(_) => {}
        }

        if size == 0 {
            return Err(ProtocolError::EmptyOrder { from, to });
        }
        let available = remaining.entry(from).or_insert(source.population);
        if *available < size {
            return Err(ProtocolError::InsufficientPopulation {
                planet: from,
                requested: size,
                available: *available,
            });
        }
        if !routes.insert((from, to)) {
            return Err(ProtocolError::DuplicateRoute { from, to });
        }
        *available -= size;

        command.push(Order {
            player,
            from,
            to,
            size,
        });
    }
    Ok(command)
}

/// Parses a full response (count line and order lines) from `player`.
pub fn parse_command(
    state: &GameState,
    player: PlayerId,
    response: &str,
) -> Result<Command, ProtocolError> {
    let mut lines = response.lines().map(str::trim).filter(|l| !l.is_empty());
    let count = order_count(lines.next().unwrap_or_default(), state)?;
    let orders = lines.collect::<Vec<_>>();
    parse_orders(state, player, count, &orders)
}

fn parse_order_line(line: &str) -> Result<(PlanetId, PlanetId, u32), ProtocolError> {
    let malformed = || ProtocolError::MalformedOrder(line.to_string());
    let mut fields = line.split_whitespace();
    let mut next = || fields.next().ok_or_else(malformed);
    let from = next()?.parse().map_err(|_| malformed())?;
    let to = next()?.parse().map_err(|_| malformed())?;
    let size = next()?.parse().map_err(|_| malformed())?;
    if fields.next().is_some() {
        return Err(malformed());
    }
    Ok((from, to, size))
}

fn join<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(T::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{InFlightTroop, Player};

    fn state() -> GameState {
        GameState::default_map(Player::new(1, "1"), Player::new(2, "2")).unwrap()
    }

    #[test]
    fn setup_message_layout() {
        let message = setup_message(&state(), PlayerId(2));
        let expected = "2\n4\n0 0 1\n10 10 1\n0 10 1\n10 0 1\n\
                        0 14 10 10\n14 0 10 10\n10 10 0 14\n10 10 14 0";
        assert_eq!(message, expected);
    }

    #[test]
    fn tick_message_separates_size_and_end_tick() {
        let mut state = state();
        state
            .advance(&[
                vec![Order {
                    player: PlayerId(1),
                    from: 0,
                    to: 2,
                    size: 12,
                }],
                vec![],
            ])
            .unwrap();
        let message = tick_message(state.tick());
        let lines = message.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "1");
        assert_eq!(lines[1], "0 1 88");
        assert_eq!(lines[3], "2 -1 100");
        assert_eq!(lines[5], "1");
        assert_eq!(lines[6], "1 0 2 12 10");
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn valid_command_round_trip() {
        let mut state = state();
        let before = state.tick().clone();
        let command = parse_command(&state, PlayerId(1), "2\n0 2 30\n0 3 20\n").unwrap();
        assert_eq!(command.len(), 2);

        state.advance(&[command, vec![]]).unwrap();
        let after = state.tick();
        // no growth on the first tick
        assert_eq!(after.planets[0].population, before.planets[0].population - 50);
        assert_eq!(after.planets[1], before.planets[1]);
        assert_eq!(after.planets[2], before.planets[2]);
        assert_eq!(after.planets[3], before.planets[3]);
        assert_eq!(
            after.troops,
            vec![
                InFlightTroop {
                    from: 0,
                    to: 2,
                    who: PlayerId(1),
                    size: 30,
                    end_tick: 10
                },
                InFlightTroop {
                    from: 0,
                    to: 3,
                    who: PlayerId(1),
                    size: 20,
                    end_tick: 10
                },
            ]
        );
    }

    #[test]
    fn zero_orders() {
        assert_eq!(parse_command(&state(), PlayerId(1), "0"), Ok(vec![]));
    }

    #[test]
    fn malformed_count() {
        assert_eq!(
            parse_command(&state(), PlayerId(1), "abc"),
            Err(ProtocolError::MalformedCount("abc".to_string()))
        );
        assert_eq!(
            parse_command(&state(), PlayerId(1), ""),
            Err(ProtocolError::EmptyResponse)
        );
        assert_eq!(
            parse_command(&state(), PlayerId(1), "-1"),
            Err(ProtocolError::MalformedCount("-1".to_string()))
        );
    }

    #[test]
    fn rejects_invalid_orders() {
        let state = state();
        let cases = [
            ("1\n4 0 10", ProtocolError::PlanetOutOfRange(4)),
            ("1\n0 9 10", ProtocolError::PlanetOutOfRange(9)),
            ("1\n2 0 10", ProtocolError::NeutralSource(2)),
            (
                "1\n1 0 10",
                ProtocolError::ForeignSource {
                    planet: 1,
                    owner: PlayerId(2),
                },
            ),
            (
                "1\n0 1 101",
                ProtocolError::InsufficientPopulation {
                    planet: 0,
                    requested: 101,
                    available: 100,
                },
            ),
            (
                "2\n0 1 60\n0 2 60",
                ProtocolError::InsufficientPopulation {
                    planet: 0,
                    requested: 60,
                    available: 40,
                },
            ),
            (
                "2\n0 1 10\n0 1 10",
                ProtocolError::DuplicateRoute { from: 0, to: 1 },
            ),
            ("1\n0 1 0", ProtocolError::EmptyOrder { from: 0, to: 1 }),
            ("1\n0 1", ProtocolError::MalformedOrder("0 1".to_string())),
            ("1\n0 1 x", ProtocolError::MalformedOrder("0 1 x".to_string())),
            (
                "2\n0 1 10",
                ProtocolError::MissingOrders {
                    expected: 2,
                    received: 1,
                },
            ),
            ("0\n0 1 10", ProtocolError::UnexpectedLines { expected: 0 }),
            ("17", ProtocolError::TooManyOrders { count: 17, max: 16 }),
        ];
        for (text, error) in cases {
            assert_eq!(parse_command(&state, PlayerId(1), text), Err(error), "{text:?}");
        }
    }
}
