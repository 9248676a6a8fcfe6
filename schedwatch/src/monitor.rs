//! Monitor state and driver loop: polling the simulator, merging snapshots,
//! reaping finished processes, and publishing read-only views.
//!
//! One task owns all mutable state. Readers get an `Arc<View>` per publish and
//! never block the loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::client::Simulator;
use crate::error::Result;
use crate::estimate::{estimate, estimate_process, AverageEstimate, ProcessEstimate};
use crate::rank::{next_to_run, rank, StateCounts};
use crate::reconcile::{ProcessTable, ReconciledProcess, RETENTION_WINDOW};
use crate::timeline::{build_timeline, Timeline};
use crate::types::{alerts_or_stable, AddProcessRequest, AggregateSnapshot, Bottleneck};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    pub reap_interval: Duration,
    pub retention: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            reap_interval: Duration::from_secs(1),
            retention: RETENTION_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Health {
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_success: Option<Instant>,
    pub stale_dropped: u64,
}

/// Immutable picture of the monitor at one publish.
#[derive(Debug, Clone, Default)]
pub struct View {
    /// Latest aggregate counters; `processes` is always empty here, the
    /// reconciled table is authoritative.
    pub aggregate: AggregateSnapshot,
    pub processes: ProcessTable,
    pub health: Health,
    /// Sequence number of the snapshot this view reflects (0 = none yet).
    pub applied_seq: u64,
}

impl View {
    pub fn processes(&self) -> &[ReconciledProcess] {
        self.processes.as_slice()
    }

    pub fn running(&self) -> bool {
        self.aggregate.running
    }

    pub fn ranked(&self) -> Vec<&ReconciledProcess> {
        rank(&self.processes)
    }

    pub fn next_to_run(&self) -> Option<&ReconciledProcess> {
        next_to_run(&self.ranked())
    }

    pub fn estimates(&self) -> AverageEstimate {
        estimate(&self.processes)
    }

    pub fn process_estimate(&self, pid: u64) -> Option<ProcessEstimate> {
        self.processes.get(pid).map(|p| estimate_process(&p.entry))
    }

    pub fn timeline(&self) -> Timeline {
        build_timeline(&self.aggregate.timeline, &self.aggregate.history)
    }

    pub fn state_counts(&self) -> StateCounts {
        StateCounts::tally(&self.processes)
    }

    pub fn alerts(&self) -> Vec<Bottleneck> {
        alerts_or_stable(&self.aggregate.bottlenecks)
    }
}

/// The reconciliation state machine, free of timers so it can be driven by hand.
#[derive(Debug)]
pub struct MonitorState {
    table: ProcessTable,
    aggregate: AggregateSnapshot,
    health: Health,
    next_seq: u64,
    applied_seq: u64,
    retention: Duration,
}

impl MonitorState {
    pub fn new(retention: Duration) -> Self {
        Self {
            table: ProcessTable::new(),
            aggregate: AggregateSnapshot::default(),
            health: Health::default(),
            next_seq: 0,
            applied_seq: 0,
            retention,
        }
    }

    /// Tags a fetch about to be issued.
    pub fn begin_fetch(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Applies a fetch outcome. Returns whether observers should be notified.
    pub fn apply(&mut self, seq: u64, outcome: Result<AggregateSnapshot>, now: Instant) -> bool {
        if seq <= self.applied_seq {
            self.health.stale_dropped += 1;
            debug!(seq, applied = self.applied_seq, "dropping stale response");
            return false;
        }
        match outcome {
            Ok(mut snap) => {
                let incoming = std::mem::take(&mut snap.processes);
                self.table = self.table.merge(&incoming, now);
                self.aggregate = snap;
                self.applied_seq = seq;
                self.health.consecutive_failures = 0;
                self.health.last_error = None;
                self.health.last_success = Some(now);
            }
            Err(e) => {
                self.health.consecutive_failures += 1;
                warn!(
                    seq,
                    failures = self.health.consecutive_failures,
                    error = %e,
                    "fetch failed; keeping last good state"
                );
                self.health.last_error = Some(e.to_string());
            }
        }
        true
    }

    pub fn reap(&mut self, now: Instant) -> usize {
        self.table.reap(now, self.retention)
    }

    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    pub fn view(&self) -> View {
        View {
            aggregate: self.aggregate.clone(),
            processes: self.table.clone(),
            health: self.health.clone(),
            applied_seq: self.applied_seq,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Refresh,
    Shutdown,
}

pub struct Monitor {
    sim: Arc<dyn Simulator>,
    config: MonitorConfig,
}

impl Monitor {
    pub fn new(sim: Arc<dyn Simulator>, config: MonitorConfig) -> Self {
        Self { sim, config }
    }

    /// Starts the poll and reap timers. They run until the handle is shut
    /// down or dropped. Must be called inside a tokio runtime.
    pub fn spawn(self) -> MonitorHandle {
        let state = MonitorState::new(self.config.retention);
        let (publish, views) = watch::channel(Arc::new(state.view()));
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let driver = Driver {
            sim: Arc::clone(&self.sim),
            config: self.config,
            state,
            publish,
            control: control_rx,
        };
        let task = tokio::spawn(driver.run());
        MonitorHandle {
            sim: self.sim,
            control: control_tx,
            views,
            task,
        }
    }
}

pub struct MonitorHandle {
    sim: Arc<dyn Simulator>,
    control: mpsc::UnboundedSender<Control>,
    views: watch::Receiver<Arc<View>>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn current(&self) -> Arc<View> {
        Arc::clone(&self.views.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<View>> {
        self.views.clone()
    }

    /// Asks for an out-of-band fetch; coalesced if one is already running.
    pub fn refresh(&self) {
        let _ = self.control.send(Control::Refresh);
    }

    // Commands touch local state only through the refresh they trigger; a
    // failed command leaves everything as it was.
    pub async fn start(&self) -> Result<()> {
        self.sim.start().await?;
        self.refresh();
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        self.sim.stop().await?;
        self.refresh();
        Ok(())
    }

    pub async fn add_process(&self, req: &AddProcessRequest) -> Result<()> {
        self.sim.add_process(req).await?;
        self.refresh();
        Ok(())
    }

    /// Cancels both timers and any in-flight fetch, then waits for the loop to exit.
    pub async fn shutdown(self) {
        let _ = self.control.send(Control::Shutdown);
        if let Err(e) = self.task.await {
            warn!(error = %e, "monitor task did not exit cleanly");
        }
    }
}

struct Driver {
    sim: Arc<dyn Simulator>,
    config: MonitorConfig,
    state: MonitorState,
    publish: watch::Sender<Arc<View>>,
    control: mpsc::UnboundedReceiver<Control>,
}

type FetchSet = JoinSet<(u64, Result<AggregateSnapshot>)>;

// tokio's clock, so paused-time tests see the same instants as the timers.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

impl Driver {
    async fn run(mut self) {
        let mut poll = interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut reap = interval(self.config.reap_interval);
        reap.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut inflight = FetchSet::new();
        let mut refresh_pending = false;
        info!(
            poll_ms = self.config.poll_interval.as_millis() as u64,
            reap_ms = self.config.reap_interval.as_millis() as u64,
            "monitor started"
        );

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    if inflight.is_empty() {
                        self.spawn_fetch(&mut inflight);
                    } else {
                        debug!("poll tick skipped; fetch still outstanding");
                    }
                }
                _ = reap.tick() => {
                    if self.state.reap(now()) > 0 {
                        self.publish();
                    }
                }
                Some(joined) = inflight.join_next(), if !inflight.is_empty() => {
                    match joined {
                        Ok((seq, outcome)) => {
                            if self.state.apply(seq, outcome, now()) {
                                self.publish();
                            }
                        }
                        Err(e) => warn!(error = %e, "fetch task ended abnormally"),
                    }
                    if refresh_pending {
                        refresh_pending = false;
                        self.spawn_fetch(&mut inflight);
                    }
                }
                ctl = self.control.recv() => match ctl {
                    Some(Control::Refresh) => {
                        if inflight.is_empty() {
                            self.spawn_fetch(&mut inflight);
                        } else {
                            refresh_pending = true;
                        }
                    }
                    Some(Control::Shutdown) | None => break,
                },
            }
        }

        // A response resolving after teardown must never be applied.
        inflight.abort_all();
        info!(applied = self.state.applied_seq, "monitor stopped");
    }

    fn spawn_fetch(&mut self, inflight: &mut FetchSet) {
        let seq = self.state.begin_fetch();
        let sim = Arc::clone(&self.sim);
        inflight.spawn(async move { (seq, sim.fetch().await) });
        debug!(seq, "fetch issued");
    }

    fn publish(&self) {
        self.publish.send_replace(Arc::new(self.state.view()));
    }
}
