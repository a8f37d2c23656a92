//! The match loop.
//!
//! [`MatchRunner`] owns the [`GameState`] and the bots of one match. It greets every bot with
//! [`START`], sends the setup message to the admitted ones, then plays ticks until at most one
//! player owns planets or the tick cap is reached. Per-bot problems are logged, recorded as
//! [`TickError`]s and degrade the seat; only a broken game invariant stops the match.

use std::{collections::BTreeSet, io::Write};

use anyhow::Context;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::{
    bot::BotSpec,
    bot_channel::{ChannelState, Fault},
    bot_group::BotGroup,
    configuration::Configuration,
    constraints::Constraints,
    error::{ChannelError, MatchError},
    game::{Command, GameState, PlayerId, Termination},
    logger::init_logger,
    outcome::{MatchOutcome, SeatReport, TickError},
    protocol::{order_count, parse_orders, setup_message, tick_message, OK, START},
};

pub struct MatchRunner {
    state: GameState,
    specs: Vec<BotSpec>,
    constraints: Constraints,
    config: Configuration,
    admitted: Vec<bool>,
    timed_out: BTreeSet<usize>,
    errors: Vec<TickError>,
}

impl MatchRunner {
    /// Seat `i` is played by `bots[i]` on behalf of the `i`-th player of `state`.
    pub fn new(
        state: GameState,
        bots: Vec<BotSpec>,
        constraints: Constraints,
        config: Configuration,
    ) -> Result<MatchRunner, MatchError> {
        if bots.len() != state.players().len() {
            return Err(MatchError::SeatMismatch {
                bots: bots.len(),
                players: state.players().len(),
            });
        }
        Ok(MatchRunner {
            admitted: vec![false; bots.len()],
            state,
            specs: bots,
            constraints,
            config,
            timed_out: BTreeSet::new(),
            errors: Vec::new(),
        })
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Plays the whole match. Must be awaited within a tokio runtime able to drive processes
    /// and timers.
    #[instrument(skip_all, fields(bots = self.specs.len()))]
    pub async fn run(mut self) -> Result<MatchOutcome, MatchError> {
        let mut bots = BotGroup::spawn(&self.specs, &self.constraints, self.config);
        if self.config.verbose {
            disable_line_wrap();
        }

        let result = self.play(&mut bots).await;
        let seats = self.seat_reports(&bots);
        bots.shutdown().await;
        self.write_bot_logs(&bots);

        if self.config.verbose {
            enable_line_wrap();
        }
        let termination = result?;
        let outcome = MatchOutcome::new(&self.state, termination, seats, self.errors);
        info!(
            tick = outcome.final_tick,
            termination = ?outcome.termination,
            winner = ?outcome.winner,
            errors = outcome.errors.len(),
            "match over"
        );
        if self.config.verbose {
            print_outcome(&outcome);
        }
        Ok(outcome)
    }

    async fn play(&mut self, bots: &mut BotGroup) -> Result<Termination, MatchError> {
        self.admit(bots).await;
        loop {
            if let Some(termination) = self.state.termination(self.constraints.max_ticks) {
                return Ok(termination);
            }
            if let Err(e) = self.play_tick(bots).await {
                error!("match aborted at tick {}: {e}", self.state.tick().id);
                return Err(e);
            }
            if self.config.verbose {
                print_progress(&self.state);
            }
        }
    }

    #[instrument(skip_all)]
    async fn admit(&mut self, bots: &mut BotGroup) {
        let sent = bots.broadcast(START).await;
        let replies = bots.collect_all(self.constraints.budget_per_round).await;

        for (seat, (sent, reply)) in sent.into_iter().zip(replies).enumerate() {
            match (sent, reply) {
                (Ok(()), Some(reply)) if reply == OK => {
                    self.admitted[seat] = true;
                    info!(seat, player = %self.player_of(seat), "bot admitted");
                }
                (Err(e), _) => self.drop_seat(bots, seat, format!("could not send {START}: {e}")),
                (Ok(()), reply) => self.drop_seat(
                    bots,
                    seat,
                    format!("expected '{OK}' to {START}, got {reply:?}"),
                ),
            }
        }

        let messages = (0..bots.seat_count())
            .map(|seat| setup_message(&self.state, self.player_of(seat)))
            .collect::<Vec<_>>();
        let sent = bots.send_each(&messages).await;
        for (seat, result) in sent.into_iter().enumerate() {
            self.check_send(bots, seat, result, "setup");
        }
    }

    #[instrument(skip_all, fields(tick = self.state.tick().id))]
    async fn play_tick(&mut self, bots: &mut BotGroup) -> Result<(), MatchError> {
        let message = tick_message(self.state.tick());
        let sent = bots.broadcast(&message).await;
        for (seat, result) in sent.into_iter().enumerate() {
            self.check_send(bots, seat, result, "tick");
        }

        let first_lines = bots.collect_all(self.constraints.budget_per_round).await;
        let mut counts = vec![0; bots.seat_count()];
        let mut expecting = vec![false; bots.seat_count()];
        for (seat, line) in first_lines.into_iter().enumerate() {
            if !bots.is_active(seat) {
                continue;
            }
            let Some(line) = line else {
                self.no_answer(bots, seat);
                continue;
            };
            match order_count(&line, &self.state) {
                Ok(count) => {
                    counts[seat] = count;
                    expecting[seat] = true;
                }
                Err(e) => {
                    // order lines sent after a rejected count would be read as next tick's count
                    let dropped = bots.discard_pending(seat);
                    self.record(seat, format!("rejected response: {e}"));
                    if dropped > 0 {
                        debug!(seat, dropped, "discarded pending lines");
                    }
                }
            }
        }

        let follow_ups = bots.collect_follow_ups(&counts).await;
        let mut commands: Vec<Command> = vec![Vec::new(); bots.seat_count()];
        for (seat, lines) in follow_ups.into_iter().enumerate() {
            if !expecting[seat] {
                continue;
            }
            let Some(lines) = lines else {
                self.no_answer(bots, seat);
                continue;
            };
            match parse_orders(&self.state, self.player_of(seat), counts[seat], &lines) {
                Ok(command) => {
                    trace!(seat, orders = command.len(), "command accepted");
                    commands[seat] = command;
                }
                Err(e) => self.record(seat, format!("rejected command: {e}")),
            }
        }

        for seat in bots.active_seats() {
            self.check_alive(bots, seat);
        }

        let report = self.state.advance(&commands)?;
        debug!(
            dispatched = report.dispatched,
            combats = report.combats.len(),
            losses = report.combat_losses,
            growth = report.growth,
            "tick played"
        );
        Ok(())
    }

    fn player_of(&self, seat: usize) -> PlayerId {
        self.state.players()[seat].id
    }

    fn record(&mut self, seat: usize, message: String) {
        let player = self.player_of(seat);
        warn!(seat, %player, "{message}");
        self.errors.push(TickError {
            tick: self.state.tick().id,
            player,
            message,
        });
    }

    fn drop_seat(&mut self, bots: &mut BotGroup, seat: usize, message: String) {
        self.record(seat, message);
        bots.exclude(seat);
    }

    fn check_send(
        &mut self,
        bots: &mut BotGroup,
        seat: usize,
        result: Result<(), ChannelError>,
        what: &str,
    ) {
        match result {
            Ok(()) | Err(ChannelError::Excluded) => {}
            Err(e) => self.drop_seat(bots, seat, format!("could not send {what} message: {e}")),
        }
    }

    /// A seat gave no (complete) answer this tick.
    fn no_answer(&mut self, bots: &mut BotGroup, seat: usize) {
        match bots.channel(seat).and_then(|c| c.fault()) {
            Some(Fault::Timeout) => {
                if self.timed_out.insert(seat) {
                    self.record(seat, "time limit exceeded".to_string());
                }
            }
            _ => self.check_alive(bots, seat),
        }
    }

    /// Excludes a seat whose process failed or whose channel is closed in either direction.
    fn check_alive(&mut self, bots: &mut BotGroup, seat: usize) {
        let Some(channel) = bots.channel(seat) else {
            return;
        };
        let reason = match (channel.state(), channel.fault()) {
            (_, Some(Fault::NonZeroExit)) => "bot exited with an error",
            (_, Some(Fault::SpawnFailure)) => "bot process failed",
            (ChannelState::Terminated, _) => "bot exited",
            _ if channel.is_closed() => "bot input closed",
            _ if channel.output_closed() => "bot output closed",
            _ => return,
        };
        self.drop_seat(bots, seat, reason.to_string());
    }

    fn seat_reports(&self, bots: &BotGroup) -> Vec<SeatReport> {
        bots.channels()
            .iter()
            .map(|channel| SeatReport {
                seat: channel.seat(),
                bot: channel.name().to_string(),
                player: self.player_of(channel.seat()),
                admitted: self.admitted[channel.seat()],
                state: channel.state(),
                fault: channel.fault(),
            })
            .collect()
    }

    fn write_bot_logs(&self, bots: &BotGroup) {
        for (spec, channel) in self.specs.iter().zip(bots.channels()) {
            if !spec.should_be_logged() {
                continue;
            }
            let written = spec
                .create_new_match_log_file()
                .and_then(|mut file| -> anyhow::Result<()> {
                    for line in channel.diagnostics() {
                        writeln!(file, "{line}")?;
                    }
                    Ok(())
                });
            if let Err(e) = written {
                warn!(bot = %spec.name, "could not write bot log: {e:#}");
            }
        }
    }
}

/// Plays one match to the end, blocking the current thread.
///
/// Builds its own single-threaded runtime. Installs the file logger first when
/// [`Configuration::with_log`] is set.
pub fn run_match(
    state: GameState,
    bots: Vec<BotSpec>,
    constraints: Constraints,
    config: Configuration,
) -> anyhow::Result<MatchOutcome> {
    if config.log {
        init_logger()?;
    }
    let runner = MatchRunner::new(state, bots, constraints, config)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("could not start the match runtime")?;
    let outcome = runtime.block_on(runner.run())?;
    Ok(outcome)
}

fn print_progress(state: &GameState) {
    let scores = state
        .players()
        .iter()
        .map(|p| {
            format!(
                "{}: {}/{}",
                p.name,
                state.planets_owned_by(p.id),
                state.strength(p.id)
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    // clear, green, default, start of line
    print!(
        "\x1b[2K\x1b[32mTick {}:\x1b[39m {scores}\x1b[0G",
        state.tick().id
    );
    let _ = std::io::stdout().flush();
}

fn print_outcome(outcome: &MatchOutcome) {
    // clear line, green outcome, red errors, start of line
    println!(
        "\x1b[2K\x1b[32m{outcome}\x1b[39m \x1b[31m{}\x1b[39m\x1b[0G",
        outcome
            .errors
            .iter()
            .map(TickError::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    );
}

fn disable_line_wrap() {
    print!("\x1b[?7l");
}

fn enable_line_wrap() {
    print!("\x1b[?7h");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Player;

    #[test]
    fn one_bot_per_player() {
        let state = GameState::default_map(Player::new(1, "a"), Player::new(2, "b")).unwrap();
        let bots = vec![BotSpec::new("only", "true", vec![])];
        let runner = MatchRunner::new(state, bots, Constraints::default(), Configuration::new());
        assert!(matches!(
            runner,
            Err(MatchError::SeatMismatch {
                bots: 1,
                players: 2
            })
        ));
    }
}
