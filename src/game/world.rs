//! The world-update algorithm.
//!
//! One call to [`GameState::advance`] runs, in this order: dispatch, arrival partition, combat,
//! growth. Later phases see the results of earlier ones.

use std::{collections::BTreeMap, mem};

use tracing::trace;

use crate::error::MatchError;

use super::{Command, GameState, InFlightTroop, Owner, PlanetId, PlanetState, PlayerId};

/// A troop landing on a planet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arrival {
    pub who: PlayerId,
    pub size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombatOutcome {
    /// `winner` holds the planet with `population` units left.
    Captured {
        winner: PlayerId,
        population: u32,
        losses: u64,
    },
    /// The two strongest sides cancelled out.
    Neutralized { losses: u64 },
}

impl CombatOutcome {
    /// Units destroyed on the planet.
    pub fn losses(&self) -> u64 {
        match *self {
            CombatOutcome::Captured { losses, .. } | CombatOutcome::Neutralized { losses } => losses,
        }
    }
}

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Id of the tick that was played.
    pub tick: u32,
    pub dispatched: usize,
    pub combats: Vec<(PlanetId, CombatOutcome)>,
    pub combat_losses: u64,
    pub growth: u64,
}

/// Resolves the fight on one planet.
///
/// Arrivals are summed per player; the resident population counts for the current owner
/// (a neutral garrison does not fight). A tie between the two largest sides leaves the planet
/// neutral and empty, otherwise the largest side keeps the difference.
pub fn resolve_combat(
    planet: &PlanetState,
    arrivals: &[Arrival],
) -> Result<CombatOutcome, MatchError> {
    let mut totals: BTreeMap<PlayerId, u64> = BTreeMap::new();
    for arrival in arrivals {
        *totals.entry(arrival.who).or_default() += u64::from(arrival.size);
    }
    if let Some(owner) = planet.owner {
        *totals.entry(owner.player).or_default() += u64::from(planet.population);
    }

    let arriving: u64 = arrivals.iter().map(|a| u64::from(a.size)).sum();
    let engaged = u64::from(planet.population) + arriving;

    let mut ranked = totals.into_iter().collect::<Vec<_>>();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    let second = ranked.get(1).map_or(0, |&(_, size)| size);

    match ranked.first() {
        None => Err(MatchError::InvariantViolation(format!(
            "combat on planet {} without any contributor",
            planet.id
        ))),
        Some(&(_, largest)) if largest == second => {
            Ok(CombatOutcome::Neutralized { losses: engaged })
        }
        Some(&(winner, largest)) => {
            let population = u32::try_from(largest - second).map_err(|_| {
                MatchError::InvariantViolation(format!(
                    "population overflow on planet {}",
                    planet.id
                ))
            })?;
            Ok(CombatOutcome::Captured {
                winner,
                population,
                losses: engaged - u64::from(population),
            })
        }
    }
}

impl GameState {
    /// Plays the current tick with the given commands and moves to the next tick.
    ///
    /// Commands must have been validated against the current tick
    /// (see [`parse_command`](crate::protocol::parse_command)); an order that cannot be applied
    /// is an invariant violation.
    pub fn advance(&mut self, commands: &[Command]) -> Result<TickReport, MatchError> {
        let current = self.tick.id;
        let mut report = TickReport {
            tick: current,
            ..TickReport::default()
        };

        // dispatch
        for order in commands.iter().flatten() {
            let travel = self.distances().get(order.from, order.to).ok_or_else(|| {
                MatchError::InvariantViolation(format!(
                    "order from {} to {} outside of the map",
                    order.from, order.to
                ))
            })?;
            let source = &mut self.tick.planets[order.from];
            if source.owner_id() != Some(order.player) || order.size == 0 {
                return Err(MatchError::InvariantViolation(format!(
                    "unvalidated order {order:?} on planet {source:?}"
                )));
            }
            let held = source.population;
            source.population = held.checked_sub(order.size).ok_or_else(|| {
                MatchError::InvariantViolation(format!(
                    "planet {} sends {} troops but holds {held}",
                    order.from, order.size
                ))
            })?;
            let end_tick = current.checked_add(travel).ok_or_else(|| {
                MatchError::InvariantViolation(format!(
                    "troop sent at tick {current} over {travel} ticks lands past the last tick"
                ))
            })?;
            self.tick.troops.push(InFlightTroop {
                from: order.from,
                to: order.to,
                who: order.player,
                size: order.size,
                end_tick,
            });
            report.dispatched += 1;
        }

        // arrivals
        let (landed, travelling): (Vec<_>, Vec<_>) = mem::take(&mut self.tick.troops)
            .into_iter()
            .partition(|troop| troop.end_tick == current);
        self.tick.troops = travelling;

        let mut arrivals: BTreeMap<PlanetId, Vec<Arrival>> = BTreeMap::new();
        for troop in landed {
            arrivals.entry(troop.to).or_default().push(Arrival {
                who: troop.who,
                size: troop.size,
            });
        }

        // combat
        for (planet_id, arriving) in arrivals {
            let planet = self.tick.planets.get_mut(planet_id).ok_or_else(|| {
                MatchError::InvariantViolation(format!("troops landed on unknown planet {planet_id}"))
            })?;
            let outcome = resolve_combat(planet, &arriving)?;
            match outcome {
                CombatOutcome::Captured {
                    winner, population, ..
                } => {
                    planet.owner = Some(Owner {
                        player: winner,
                        starting_tick: current,
                    });
                    planet.population = population;
                }
                CombatOutcome::Neutralized { .. } => {
                    planet.owner = None;
                    planet.population = 0;
                }
            }
            trace!(tick = current, planet = planet_id, ?outcome, "combat");
            report.combat_losses += outcome.losses();
            report.combats.push((planet_id, outcome));
        }

        // growth
        for (planet, definition) in self.tick.planets.iter_mut().zip(self.planets.iter()) {
            let Some(owner) = planet.owner else {
                continue;
            };
            let held_for = current.saturating_sub(owner.starting_tick);
            if held_for > 0 && held_for % definition.efficiency == 0 {
                planet.population = planet.population.checked_add(1).ok_or_else(|| {
                    MatchError::InvariantViolation(format!(
                        "population overflow on planet {}",
                        planet.id
                    ))
                })?;
                report.growth += 1;
            }
        }

        self.tick.id += 1;
        Ok(report)
    }
}
