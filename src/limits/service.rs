use anyhow::{Context, Result};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::limits::control::{ControlChannel, CONTROL_CHECK_INTERVAL};
use crate::limits::monitor::{Directive, Enforcer, MonitoringState};
use crate::limits::package::PackageId;
use crate::limits::signal::BlockSignal;
use crate::limits::snapshot::{save_snapshot, MonitorSnapshot};
use crate::limits::usage::UsageLedger;

const EVENT_QUEUE: usize = 64;

/// Poll tick for one generation of the watched package
#[derive(Debug)]
struct Tick {
    generation: u64,
    package: PackageId,
}

/// Running poll task; dropping it cancels the timer
struct PollTask {
    package: PackageId,
    generation: u64,
    handle: JoinHandle<()>,
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Entry point for foreground observers and the presentation layer
#[derive(Clone)]
pub struct MonitorHandle {
    events: mpsc::Sender<Option<PackageId>>,
    signal: BlockSignal,
}

impl MonitorHandle {
    /// Report a new foreground application (`None` for no app)
    pub async fn foreground_changed(&self, package: Option<PackageId>) -> Result<()> {
        self.events
            .send(package)
            .await
            .context("Monitor service has stopped")
    }

    pub fn signal(&self) -> &BlockSignal {
        &self.signal
    }
}

/// Drives an [`Enforcer`] from foreground events and poll timers
///
/// Events and ticks are handled one at a time on the service task. Each watched
/// package gets its own poll task; starting a new one drops the old one, and ticks
/// from an older generation are discarded.
pub struct MonitorService {
    enforcer: Enforcer,
    events: mpsc::Receiver<Option<PackageId>>,
    ticks_tx: mpsc::Sender<Tick>,
    ticks_rx: mpsc::Receiver<Tick>,
    poll_interval: Duration,
    poll: Option<PollTask>,
    generation: u64,
    ledger: Option<Arc<UsageLedger>>,
    snapshot_path: Option<PathBuf>,
    control: Option<ControlChannel>,
    last_state: Option<MonitoringState>,
}

impl MonitorService {
    pub fn new(enforcer: Enforcer) -> (Self, MonitorHandle) {
        let (events_tx, events) = mpsc::channel(EVENT_QUEUE);
        let (ticks_tx, ticks_rx) = mpsc::channel(EVENT_QUEUE);

        let handle = MonitorHandle {
            events: events_tx,
            signal: enforcer.signal().clone(),
        };
        let poll_interval = enforcer.settings().poll_interval;

        let service = Self {
            enforcer,
            events,
            ticks_tx,
            ticks_rx,
            poll_interval,
            poll: None,
            generation: 0,
            ledger: None,
            snapshot_path: None,
            control: None,
            last_state: None,
        };

        (service, handle)
    }

    /// Record every foreground change in `ledger` before enforcing it
    pub fn with_ledger(mut self, ledger: Arc<UsageLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Write a [`MonitorSnapshot`] to `path` on every state change
    pub fn with_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Honour unlock requests other processes leave in `control`
    pub fn with_control(mut self, control: ControlChannel) -> Self {
        self.control = Some(control);
        self
    }

    /// Run until every [`MonitorHandle`] has been dropped
    pub async fn run(mut self) -> Result<()> {
        info!(
            "Monitor started (poll interval {}s)",
            self.poll_interval.as_secs_f32()
        );

        let mut blocked = self.enforcer.signal().subscribe();
        self.write_snapshot();

        if let Some(control) = &self.control {
            match control.discard_pending() {
                Ok(0) => {}
                Ok(n) => info!("Discarded {} stale unlock request(s)", n),
                Err(e) => warn!("Failed to clear stale unlock requests: {:#}", e),
            }
        }
        let mut control_check = time::interval(CONTROL_CHECK_INTERVAL);
        control_check.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(package) => self.handle_foreground(package),
                    None => break,
                },
                Some(tick) = self.ticks_rx.recv() => self.handle_tick(tick),
                Ok(()) = blocked.changed() => {
                    blocked.borrow_and_update();
                    self.write_snapshot();
                }
                _ = control_check.tick(), if self.control.is_some() => self.handle_control(),
            }
        }

        self.poll = None;
        info!("Monitor stopped");
        Ok(())
    }

    fn handle_foreground(&mut self, package: Option<PackageId>) {
        debug!("Foreground changed: {:?}", package.as_ref().map(PackageId::as_str));

        if let Some(ledger) = &self.ledger {
            if let Err(e) = ledger.record_foreground(package.as_ref()) {
                warn!("Failed to record foreground usage: {:#}", e);
            }
        }

        let directive = self.enforcer.on_foreground_changed(package.as_ref());
        self.apply(directive);
    }

    fn handle_tick(&mut self, tick: Tick) {
        let current = self.poll.as_ref().map(|poll| poll.generation);
        if current != Some(tick.generation) {
            debug!("Discarding poll tick for {} (generation {})", tick.package, tick.generation);
            return;
        }

        let directive = self.enforcer.on_poll_tick(&tick.package);
        self.apply(directive);
    }

    fn handle_control(&self) {
        let Some(control) = &self.control else {
            return;
        };

        let requests = match control.take_requests() {
            Ok(requests) => requests,
            Err(e) => {
                warn!("Failed to read unlock requests: {:#}", e);
                return;
            }
        };

        let signal = self.enforcer.signal();
        for request in requests {
            if signal.blocked_package().as_ref() == Some(&request.package) {
                info!("Unlock requested for {}", request.package);
                signal.clear();
            } else {
                debug!("Ignoring unlock request for {} (not blocked)", request.package);
            }
        }
    }

    fn apply(&mut self, directive: Directive) {
        match directive {
            Directive::Keep => {}
            Directive::StopPolling | Directive::Blocked(_) => {
                if let Some(poll) = self.poll.take() {
                    debug!("Stopped polling {}", poll.package);
                }
            }
            Directive::StartPolling(package) => {
                self.poll = Some(self.spawn_poll(package));
            }
        }

        self.write_snapshot();
    }

    fn spawn_poll(&mut self, package: PackageId) -> PollTask {
        self.generation += 1;
        let generation = self.generation;
        let period = self.poll_interval;
        let ticks = self.ticks_tx.clone();
        let tick_package = package.clone();

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                let tick = Tick {
                    generation,
                    package: tick_package.clone(),
                };
                if ticks.send(tick).await.is_err() {
                    break;
                }
            }
        });

        debug!("Polling {} every {}s", package, period.as_secs_f32());
        PollTask {
            package,
            generation,
            handle,
        }
    }

    fn write_snapshot(&mut self) {
        let state = self.enforcer.state();
        if self.last_state.as_ref() == Some(&state) {
            return;
        }

        if let Some(path) = &self.snapshot_path {
            let snapshot =
                MonitorSnapshot::new(&state, self.enforcer.signal().blocked_package(), Utc::now());
            if let Err(e) = save_snapshot(path, &snapshot) {
                warn!("Failed to write monitor snapshot: {:#}", e);
            }
        }

        self.last_state = Some(state);
    }
}
