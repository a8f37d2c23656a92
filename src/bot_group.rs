//! Fan-out and fan-in over the fixed set of bots of a match.
//!
//! Every operation returns one entry per seat, in seat order. Seats are never removed: an
//! excluded seat stays in place and simply stops being talked to.

use std::{collections::BTreeSet, time::Duration};

use futures_util::future::join_all;
use tracing::{info, instrument};

use crate::{
    bot::BotSpec,
    bot_channel::BotChannel,
    configuration::Configuration,
    constraints::Constraints,
    error::ChannelError,
};

#[derive(Debug)]
pub struct BotGroup {
    channels: Vec<BotChannel>,
    excluded: BTreeSet<usize>,
}

impl BotGroup {
    /// Starts one bot per spec. Seat `i` is the bot of `specs[i]`.
    #[instrument(skip_all, fields(bots = specs.len()))]
    pub fn spawn(specs: &[BotSpec], constraints: &Constraints, config: Configuration) -> BotGroup {
        let channels = specs
            .iter()
            .enumerate()
            .map(|(seat, spec)| BotChannel::spawn(seat, spec, constraints, config.debug_bot_stderr))
            .collect();
        BotGroup {
            channels,
            excluded: BTreeSet::new(),
        }
    }

    pub fn seat_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, seat: usize) -> Option<&BotChannel> {
        self.channels.get(seat)
    }

    pub fn channels(&self) -> &[BotChannel] {
        &self.channels
    }

    /// Stops all further exchanges with `seat` for the rest of the match.
    pub fn exclude(&mut self, seat: usize) {
        if seat < self.channels.len() && self.excluded.insert(seat) {
            info!(seat, bot = self.channels[seat].name(), "seat excluded");
        }
    }

    /// Drops the lines `seat` sent that were not read yet.
    pub fn discard_pending(&mut self, seat: usize) -> usize {
        self.channels
            .get_mut(seat)
            .map_or(0, BotChannel::discard_pending)
    }

    pub fn is_active(&self, seat: usize) -> bool {
        seat < self.channels.len() && !self.excluded.contains(&seat)
    }

    pub fn active_seats(&self) -> Vec<usize> {
        (0..self.channels.len())
            .filter(|seat| !self.excluded.contains(seat))
            .collect()
    }

    /// Sends the same message to every active seat concurrently.
    pub async fn broadcast(&mut self, message: &str) -> Vec<Result<(), ChannelError>> {
        let excluded = &self.excluded;
        join_all(self.channels.iter_mut().map(|channel| async move {
            if excluded.contains(&channel.seat()) {
                return Err(ChannelError::Excluded);
            }
            channel.send(message).await
        }))
        .await
    }

    /// Sends `messages[i]` to seat `i`. Seats without a message are skipped.
    pub async fn send_each(&mut self, messages: &[String]) -> Vec<Result<(), ChannelError>> {
        let excluded = &self.excluded;
        join_all(self.channels.iter_mut().map(|channel| async move {
            let seat = channel.seat();
            if excluded.contains(&seat) {
                return Err(ChannelError::Excluded);
            }
            match messages.get(seat) {
                Some(message) => channel.send(message).await,
                None => Err(ChannelError::Excluded),
            }
        }))
        .await
    }

    /// Waits for one line from every active seat, each with `replenish` added to its budget.
    ///
    /// A slow or faulted seat only delays its own entry.
    pub async fn collect_all(&mut self, replenish: Duration) -> Vec<Option<String>> {
        let excluded = &self.excluded;
        join_all(self.channels.iter_mut().map(|channel| async move {
            if excluded.contains(&channel.seat()) {
                return None;
            }
            channel.receive_line(replenish).await
        }))
        .await
    }

    /// Reads `counts[i]` more lines from seat `i`, spending only what is left of its budget.
    ///
    /// An entry is `None` when the seat could not deliver all of its lines.
    pub async fn collect_follow_ups(&mut self, counts: &[usize]) -> Vec<Option<Vec<String>>> {
        let excluded = &self.excluded;
        join_all(self.channels.iter_mut().map(|channel| async move {
            let seat = channel.seat();
            if excluded.contains(&seat) {
                return None;
            }
            let count = counts.get(seat).copied().unwrap_or(0);
            let mut lines = Vec::with_capacity(count);
            for _ in 0..count {
                lines.push(channel.receive_line(Duration::ZERO).await?);
            }
            Some(lines)
        }))
        .await
    }

    /// Kills every bot and waits for the processes to be gone.
    pub async fn shutdown(&mut self) {
        join_all(self.channels.iter_mut().map(|channel| channel.shutdown())).await;
    }
}
