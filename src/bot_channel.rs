//! One running bot and the line-based exchange with it.
//!
//! A [`BotChannel`] owns the child process. Background tasks split its stdout into trimmed,
//! non-empty lines queued for [`BotChannel::receive_line`], keep its stderr in a separate
//! diagnostic buffer, and watch for the process exit.
//!
//! Waiting for a line is charged against a budget that is replenished each round and never
//! reset: time a bot does not use is kept for later rounds. Every wait costs one full poll
//! interval, even when a line shows up before the interval is over.

use std::{
    collections::VecDeque,
    process::Stdio,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStderr, ChildStdin, ChildStdout, Command},
    sync::{oneshot, Notify},
    time::{sleep, timeout},
};
use tracing::{debug, info, instrument, trace, warn};

use crate::{bot::BotSpec, constraints::Constraints, error::ChannelError};

/// What went wrong with a bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The process exited with a failure status.
    NonZeroExit,
    /// The process could not be started, or could not be waited on.
    SpawnFailure,
    /// The bot used up its time budget without answering.
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Running,
    Faulted(Fault),
    /// The process is gone. [`BotChannel::fault`] tells whether it failed.
    Terminated,
}

#[derive(Debug, Default)]
struct Inbox {
    lines: VecDeque<String>,
    diagnostics: Vec<String>,
    fault: Option<Fault>,
    exited: bool,
    stdout_closed: bool,
}

#[derive(Debug, Default)]
struct Shared {
    inbox: Mutex<Inbox>,
    wake: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inbox> {
        self.inbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wake_all(&self) {
        self.wake.notify_waiters();
    }
}

#[derive(Debug)]
pub struct BotChannel {
    seat: usize,
    name: String,
    stdin: Option<ChildStdin>,
    shared: Arc<Shared>,
    budget: Duration,
    poll_interval: Duration,
    write_timeout: Duration,
    kill: Option<oneshot::Sender<()>>,
}

impl BotChannel {
    /// Starts the bot described by `spec`. Must be called from within a tokio runtime.
    ///
    /// A bot that cannot be started still gets a channel, in the
    /// [`Faulted(SpawnFailure)`](Fault::SpawnFailure) state, so that seats keep their index.
    #[instrument(skip_all, fields(bot = %spec.name, seat = seat))]
    pub fn spawn(
        seat: usize,
        spec: &BotSpec,
        constraints: &Constraints,
        debug_stderr: bool,
    ) -> BotChannel {
        let shared = Arc::new(Shared::default());
        let mut channel = BotChannel {
            seat,
            name: spec.name.clone(),
            stdin: None,
            shared: shared.clone(),
            budget: constraints.starting_budget,
            poll_interval: constraints.poll_interval,
            write_timeout: constraints.budget_per_round.max(constraints.poll_interval),
            kill: None,
        };

        let mut child = match Command::new(&spec.command)
            .args(&spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!("could not start '{}': {e}", spec.command);
                shared.lock().fault = Some(Fault::SpawnFailure);
                return channel;
            }
        };
        info!(pid = child.id(), "bot started");

        channel.stdin = child.stdin.take();
        match child.stdout.take() {
            Some(stdout) => {
                tokio::spawn(read_stdout(stdout, shared.clone(), spec.name.clone()));
            }
            None => shared.lock().stdout_closed = true,
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(read_stderr(
                stderr,
                shared.clone(),
                spec.name.clone(),
                debug_stderr,
            ));
        }

        let (kill_tx, kill_rx) = oneshot::channel();
        channel.kill = Some(kill_tx);
        tokio::spawn(watch_exit(child, kill_rx, shared, spec.name.clone()));

        channel
    }

    pub fn seat(&self) -> usize {
        self.seat
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ChannelState {
        let inbox = self.shared.lock();
        if inbox.exited {
            ChannelState::Terminated
        } else if let Some(fault) = inbox.fault {
            ChannelState::Faulted(fault)
        } else {
            ChannelState::Running
        }
    }

    /// Last fault seen, kept after the process terminated.
    pub fn fault(&self) -> Option<Fault> {
        self.shared.lock().fault
    }

    /// True once nothing can be sent to the bot anymore.
    pub fn is_closed(&self) -> bool {
        self.stdin.is_none() || self.state() == ChannelState::Terminated
    }

    /// True once the bot's output is closed and every line it sent has been read.
    pub fn output_closed(&self) -> bool {
        let inbox = self.shared.lock();
        inbox.stdout_closed && inbox.lines.is_empty()
    }

    /// Drops the lines received but not read yet. Returns how many were dropped.
    pub fn discard_pending(&mut self) -> usize {
        let mut inbox = self.shared.lock();
        let dropped = inbox.lines.len();
        inbox.lines.clear();
        dropped
    }

    /// Time the bot may still spend before timing out.
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Everything the bot wrote on stderr so far.
    pub fn diagnostics(&self) -> Vec<String> {
        self.shared.lock().diagnostics.clone()
    }

    /// Writes `message` and a line terminator to the bot's stdin.
    ///
    /// Once this returns [`ChannelError::Closed`] it will keep doing so: the seat should be left
    /// out of the following rounds.
    pub async fn send(&mut self, message: &str) -> Result<(), ChannelError> {
        if self.state() == ChannelState::Terminated {
            self.stdin = None;
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ChannelError::Closed);
        };

        let mut payload = String::with_capacity(message.len() + 1);
        payload.push_str(message);
        payload.push('\n');

        let written = timeout(self.write_timeout, async {
            stdin.write_all(payload.as_bytes()).await?;
            stdin.flush().await
        })
        .await
        .unwrap_or_else(|_| {
            Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "bot does not read its input",
            ))
        });

        if let Err(e) = written {
            warn!(bot = %self.name, "write failed: {e}");
            self.stdin = None;
            return Err(ChannelError::Write(e));
        }
        trace!(bot = %self.name, bytes = payload.len(), "sent");
        Ok(())
    }

    /// Waits for the next line of the bot, adding `replenish` to its budget first.
    ///
    /// Returns `None` right away, without touching the budget, if the channel already has a
    /// fault. Returns `None` and records [`Fault::Timeout`] when the budget runs out.
    pub async fn receive_line(&mut self, replenish: Duration) -> Option<String> {
        if let Some(fault) = self.fault() {
            trace!(bot = %self.name, ?fault, "no data from faulted bot");
            return None;
        }
        self.budget += replenish;

        loop {
            let wake = self.shared.wake.notified();
            tokio::pin!(wake);
            wake.as_mut().enable();

            {
                let mut inbox = self.shared.lock();
                if inbox.fault.is_some() {
                    return None;
                }
                if let Some(line) = inbox.lines.pop_front() {
                    trace!(bot = %self.name, budget = ?self.budget, "received '{line}'");
                    return Some(line);
                }
                if inbox.stdout_closed {
                    debug!(bot = %self.name, "stdout closed, nothing left to read");
                    return None;
                }
                if self.budget.is_zero() {
                    warn!(bot = %self.name, "time limit exceeded");
                    inbox.fault = Some(Fault::Timeout);
                    return None;
                }
            }

            self.budget = self.budget.saturating_sub(self.poll_interval);
            tokio::select! {
                _ = &mut wake => {}
                _ = sleep(self.poll_interval) => {}
            }
        }
    }

    /// Kills the bot and waits until its exit has been observed.
    pub async fn shutdown(&mut self) {
        self.stdin = None;
        let Some(kill) = self.kill.take() else {
            return;
        };
        let _ = kill.send(());

        loop {
            let wake = self.shared.wake.notified();
            tokio::pin!(wake);
            wake.as_mut().enable();
            if self.shared.lock().exited {
                return;
            }
            wake.await;
        }
    }
}

async fn read_stdout(stdout: ChildStdout, shared: Arc<Shared>, name: String) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                // invalid bytes are replaced, the line is still delivered
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                shared.lock().lines.push_back(line.to_string());
                shared.wake_all();
            }
            Err(e) => {
                warn!(bot = %name, "could not read stdout: {e}");
                break;
            }
        }
    }
    shared.lock().stdout_closed = true;
    shared.wake_all();
}

async fn read_stderr(stderr: ChildStderr, shared: Arc<Shared>, name: String, forward: bool) {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    while let Ok(read) = reader.read_until(b'\n', &mut buf).await {
        if read == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf).trim_end().to_string();
        buf.clear();
        if forward {
            debug!(bot = %name, "stderr: {line}");
        }
        shared.lock().diagnostics.push(line);
    }
}

async fn watch_exit(
    mut child: Child,
    kill: oneshot::Receiver<()>,
    shared: Arc<Shared>,
    name: String,
) {
    // a dropped sender also means the channel is gone
    let status = tokio::select! {
        status = child.wait() => Some(status),
        _ = kill => None,
    };
    let killed = status.is_none();
    let status = match status {
        Some(status) => status,
        None => {
            if let Err(e) = child.start_kill() {
                warn!(bot = %name, "could not kill bot: {e}");
            }
            child.wait().await
        }
    };

    let mut inbox = shared.lock();
    inbox.exited = true;
    match status {
        Ok(status) if status.success() || killed => info!(bot = %name, "bot exited ({status})"),
        Ok(status) => {
            warn!(bot = %name, "bot exited with {status}");
            inbox.fault.get_or_insert(Fault::NonZeroExit);
        }
        Err(e) => {
            warn!(bot = %name, "could not wait for bot: {e}");
            inbox.fault.get_or_insert(Fault::SpawnFailure);
        }
    }
    drop(inbox);
    shared.wake_all();
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::constraints::ConstraintsBuilder;

    fn sh(script: &str) -> BotSpec {
        BotSpec::new("test", "sh", vec!["-c".to_string(), script.to_string()])
    }

    fn constraints(starting_ms: u64) -> Constraints {
        ConstraintsBuilder::new()
            .with_starting_budget(Duration::from_millis(starting_ms))
            .with_budget_per_round(Duration::from_millis(90))
            .with_poll_interval(Duration::from_millis(30))
            .build()
            .unwrap()
    }

    async fn wait_until(channel: &BotChannel, done: impl Fn(&BotChannel) -> bool) {
        for _ in 0..200 {
            if done(channel) {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached, state: {:?}", channel.state());
    }

    #[tokio::test]
    async fn echo_round_trip() {
        let spec = sh("while read line; do echo \"got $line\"; done");
        let mut channel = BotChannel::spawn(0, &spec, &constraints(1000), false);
        assert_eq!(channel.state(), ChannelState::Running);

        channel.send("hello").await.unwrap();
        let line = channel.receive_line(Duration::from_millis(1000)).await;
        assert_eq!(line.as_deref(), Some("got hello"));

        channel.shutdown().await;
        assert_eq!(channel.state(), ChannelState::Terminated);
        assert_eq!(channel.fault(), None);
        assert!(matches!(channel.send("again").await, Err(ChannelError::Closed)));
    }

    #[tokio::test]
    async fn lines_are_trimmed_and_blank_lines_dropped() {
        let spec = sh("printf '\\n   first  \\n\\n\\t\\nsecond\\n'; sleep 5");
        let mut channel = BotChannel::spawn(0, &spec, &constraints(1000), false);
        let first = channel.receive_line(Duration::ZERO).await;
        let second = channel.receive_line(Duration::ZERO).await;
        assert_eq!(first.as_deref(), Some("first"));
        assert_eq!(second.as_deref(), Some("second"));
        channel.shutdown().await;
    }

    #[tokio::test]
    async fn silent_bot_times_out_then_fails_fast() {
        let spec = sh("while read line; do :; done");
        let mut channel = BotChannel::spawn(0, &spec, &constraints(0), false);

        let started = Instant::now();
        assert_eq!(channel.receive_line(Duration::from_millis(90)).await, None);
        assert!(started.elapsed() >= Duration::from_millis(90));
        assert_eq!(channel.state(), ChannelState::Faulted(Fault::Timeout));

        let started = Instant::now();
        assert_eq!(channel.receive_line(Duration::from_millis(90)).await, None);
        assert!(started.elapsed() < Duration::from_millis(30));
        assert_eq!(channel.budget(), Duration::ZERO);

        // the process is still alive and can still be written to
        assert!(channel.send("ping").await.is_ok());
        channel.shutdown().await;
    }

    #[tokio::test]
    async fn unused_budget_is_kept() {
        let spec = sh("while read line; do echo ok; done");
        let mut channel = BotChannel::spawn(0, &spec, &constraints(0), false);
        for _ in 0..3 {
            channel.send("tick").await.unwrap();
            let line = channel.receive_line(Duration::from_millis(300)).await;
            assert_eq!(line.as_deref(), Some("ok"));
        }
        assert!(channel.budget() > Duration::from_millis(300));
        channel.shutdown().await;
    }

    #[tokio::test]
    async fn non_zero_exit_hides_buffered_output() {
        let spec = sh("echo early; exit 3");
        let mut channel = BotChannel::spawn(0, &spec, &constraints(1000), false);
        wait_until(&channel, |c| c.state() == ChannelState::Terminated).await;

        assert_eq!(channel.fault(), Some(Fault::NonZeroExit));
        assert_eq!(channel.receive_line(Duration::from_millis(90)).await, None);
        assert!(channel.is_closed());
        assert!(matches!(channel.send("x").await, Err(ChannelError::Closed)));
    }

    #[tokio::test]
    async fn clean_exit_serves_remaining_lines() {
        let spec = sh("echo last words");
        let mut channel = BotChannel::spawn(0, &spec, &constraints(1000), false);
        wait_until(&channel, |c| c.state() == ChannelState::Terminated).await;

        assert_eq!(channel.fault(), None);
        let line = channel.receive_line(Duration::ZERO).await;
        assert_eq!(line.as_deref(), Some("last words"));

        let started = Instant::now();
        assert_eq!(channel.receive_line(Duration::from_millis(90)).await, None);
        assert!(started.elapsed() < Duration::from_millis(90));
    }

    #[tokio::test]
    async fn missing_executable_is_a_spawn_failure() {
        let spec = BotSpec::new("ghost", "/nonexistent/nanowar-bot", vec![]);
        let mut channel = BotChannel::spawn(3, &spec, &constraints(1000), false);
        assert_eq!(channel.seat(), 3);
        assert_eq!(channel.state(), ChannelState::Faulted(Fault::SpawnFailure));
        assert!(matches!(channel.send("START").await, Err(ChannelError::Closed)));
        assert_eq!(channel.receive_line(Duration::from_millis(90)).await, None);
        channel.shutdown().await;
    }

    #[tokio::test]
    async fn stderr_goes_to_diagnostics() {
        let spec = sh("echo oops >&2; echo done; sleep 5");
        let mut channel = BotChannel::spawn(0, &spec, &constraints(1000), true);
        let line = channel.receive_line(Duration::ZERO).await;
        assert_eq!(line.as_deref(), Some("done"));
        wait_until(&channel, |c| !c.diagnostics().is_empty()).await;
        assert_eq!(channel.diagnostics(), vec!["oops".to_string()]);
        channel.shutdown().await;
    }

    #[tokio::test]
    async fn invalid_bytes_do_not_cut_the_stream() {
        let spec = sh("printf 'caf\\377\\n'; while read line; do echo ok; done");
        let mut channel = BotChannel::spawn(0, &spec, &constraints(1000), false);
        let first = channel.receive_line(Duration::from_millis(300)).await;
        assert_eq!(first.as_deref(), Some("caf\u{FFFD}"));

        channel.send("tick").await.unwrap();
        let second = channel.receive_line(Duration::from_millis(300)).await;
        assert_eq!(second.as_deref(), Some("ok"));
        assert_eq!(channel.state(), ChannelState::Running);
        assert!(!channel.output_closed());
        channel.shutdown().await;
    }

    #[tokio::test]
    async fn closed_output_of_a_live_bot_is_visible() {
        let spec = sh("exec 1>&-; while read line; do :; done");
        let mut channel = BotChannel::spawn(0, &spec, &constraints(1000), false);
        wait_until(&channel, BotChannel::output_closed).await;
        assert_eq!(channel.state(), ChannelState::Running);

        let started = Instant::now();
        assert_eq!(channel.receive_line(Duration::from_millis(90)).await, None);
        assert!(started.elapsed() < Duration::from_millis(90));
        channel.shutdown().await;
    }

    #[tokio::test]
    async fn pending_lines_can_be_discarded() {
        let spec = sh("echo a; echo b; echo c; read line; echo d; sleep 5");
        let mut channel = BotChannel::spawn(0, &spec, &constraints(1000), false);
        let first = channel.receive_line(Duration::ZERO).await;
        assert_eq!(first.as_deref(), Some("a"));
        sleep(Duration::from_millis(100)).await;
        assert_eq!(channel.discard_pending(), 2);

        channel.send("go").await.unwrap();
        let next = channel.receive_line(Duration::ZERO).await;
        assert_eq!(next.as_deref(), Some("d"));
        channel.shutdown().await;
    }

    #[tokio::test]
    async fn bot_not_reading_its_input_gets_it_closed() {
        let spec = sh("sleep 30");
        let mut channel = BotChannel::spawn(0, &spec, &constraints(1000), false);
        let message = "x".repeat(200_000);

        let started = Instant::now();
        let sent = channel.send(&message).await;
        let elapsed = started.elapsed();
        match sent {
            Err(ChannelError::Write(e)) => assert_eq!(e.kind(), std::io::ErrorKind::TimedOut),
            other => panic!("expected a write timeout, got {other:?}"),
        }
        assert!(elapsed >= Duration::from_millis(90));
        assert!(elapsed < Duration::from_millis(1000));

        assert!(channel.is_closed());
        assert!(matches!(channel.send("small").await, Err(ChannelError::Closed)));
        channel.shutdown().await;
    }
}
