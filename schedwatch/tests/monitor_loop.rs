//! Driver loop tests against a scripted simulator, on tokio's paused clock.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use schedwatch::types::{AddProcessRequest, AggregateSnapshot, ProcState, ProcessSnapshotEntry};
use schedwatch::{Error, Monitor, MonitorConfig, Result, Simulator};

#[derive(Default)]
struct Scripted {
    script: Mutex<VecDeque<Result<AggregateSnapshot>>>,
    fallback: AggregateSnapshot,
    delay: Duration,
    fail_commands: bool,
    calls: AtomicUsize,
    completed: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Scripted {
    fn new(script: Vec<Result<AggregateSnapshot>>, fallback: AggregateSnapshot) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            ..Default::default()
        }
    }
}

#[async_trait]
impl Simulator for Scripted {
    async fn fetch(&self) -> Result<AggregateSnapshot> {
        self.calls.fetch_add(1, SeqCst);
        let now = self.in_flight.fetch_add(1, SeqCst) + 1;
        self.max_in_flight.fetch_max(now, SeqCst);
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, SeqCst);
        self.completed.fetch_add(1, SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }

    async fn start(&self) -> Result<()> {
        if self.fail_commands {
            return Err(Error::Status {
                endpoint: "start",
                status: 500,
            });
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }

    async fn add_process(&self, _req: &AddProcessRequest) -> Result<()> {
        Ok(())
    }
}

fn snap(running: bool, procs: &[(u64, ProcState)]) -> AggregateSnapshot {
    AggregateSnapshot {
        running,
        cpu: 40.0,
        processes: procs
            .iter()
            .map(|&(pid, state)| ProcessSnapshotEntry {
                pid,
                name: format!("p{pid}"),
                state,
                priority: 3,
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

fn config(poll_secs: u64) -> MonitorConfig {
    MonitorConfig {
        poll_interval: Duration::from_secs(poll_secs),
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn first_snapshot_is_published() {
    let sim = Arc::new(Scripted::new(vec![], snap(true, &[(1, ProcState::Running)])));
    let handle = Monitor::new(sim.clone(), config(2)).spawn();
    let mut views = handle.subscribe();
    views.changed().await.unwrap();

    let view = handle.current();
    assert!(view.running());
    assert_eq!(view.processes().len(), 1);
    assert_eq!(view.next_to_run().map(|p| p.pid()), Some(1));
    assert_eq!(view.applied_seq, 1);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn slow_fetch_is_never_overlapped() {
    let sim = Arc::new(Scripted {
        delay: Duration::from_secs(5),
        fallback: snap(true, &[]),
        ..Default::default()
    });
    let handle = Monitor::new(sim.clone(), config(2)).spawn();

    // fetches start at 0s and 6s; ticks at 2, 4, 8 and 10 find one outstanding
    sleep(Duration::from_millis(10_500)).await;
    assert_eq!(sim.calls.load(SeqCst), 2);
    assert_eq!(sim.completed.load(SeqCst), 1);
    assert_eq!(sim.max_in_flight.load(SeqCst), 1);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn response_after_shutdown_is_dropped() {
    let sim = Arc::new(Scripted {
        delay: Duration::from_secs(3),
        fallback: snap(true, &[(1, ProcState::Ready)]),
        ..Default::default()
    });
    let handle = Monitor::new(sim.clone(), config(2)).spawn();
    let views = handle.subscribe();

    sleep(Duration::from_secs(1)).await;
    handle.shutdown().await;
    sleep(Duration::from_secs(5)).await;

    assert_eq!(sim.calls.load(SeqCst), 1);
    assert_eq!(sim.completed.load(SeqCst), 0);
    assert_eq!(views.borrow().applied_seq, 0);
    assert!(views.borrow().processes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_poll_keeps_last_good_view() {
    let sim = Arc::new(Scripted::new(
        vec![
            Ok(snap(true, &[(1, ProcState::Running), (2, ProcState::Ready)])),
            Err(Error::Transport("connection refused".into())),
        ],
        snap(true, &[]),
    ));
    let handle = Monitor::new(sim.clone(), config(2)).spawn();

    sleep(Duration::from_millis(2_500)).await;
    let view = handle.current();
    assert!(view.running());
    assert_eq!(view.processes().len(), 2);
    assert_eq!(view.aggregate.cpu, 40.0);
    assert_eq!(view.health.consecutive_failures, 1);
    assert!(view.health.last_error.as_deref().unwrap().contains("refused"));

    sleep(Duration::from_secs(2)).await;
    let view = handle.current();
    assert_eq!(view.health.consecutive_failures, 0);
    // absent from the feed, still carried
    assert_eq!(view.processes().len(), 2);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn completed_process_is_reaped_after_retention() {
    let sim = Arc::new(Scripted::new(
        vec![
            Ok(snap(true, &[(1, ProcState::Running)])),
            Ok(snap(true, &[(1, ProcState::Completed)])),
        ],
        snap(true, &[]),
    ));
    let handle = Monitor::new(sim.clone(), config(2)).spawn();

    // completed first seen at 2s; the 1s reaper drops it on the first tick past 7s
    sleep(Duration::from_millis(4_500)).await;
    let view = handle.current();
    let p = view.processes.get(1).expect("still retained");
    assert_eq!(p.state(), ProcState::Completed);

    sleep(Duration::from_secs(2)).await;
    let view = handle.current();
    assert!(view.processes.get(1).unwrap().is_fading(
        tokio::time::Instant::now().into_std()
    ));

    sleep(Duration::from_secs(2)).await;
    assert!(handle.current().processes().is_empty());
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn reaped_process_does_not_return_from_feed() {
    // the simulator keeps listing completed processes forever
    let sim = Arc::new(Scripted::new(
        vec![Ok(snap(true, &[(1, ProcState::Running), (2, ProcState::Ready)]))],
        snap(true, &[(1, ProcState::Completed), (2, ProcState::Ready)]),
    ));
    let handle = Monitor::new(sim.clone(), config(2)).spawn();

    sleep(Duration::from_millis(4_500)).await;
    assert!(handle.current().processes.get(1).is_some());

    sleep(Duration::from_secs(4)).await;
    assert!(handle.current().processes.get(1).is_none());

    sleep(Duration::from_secs(6)).await;
    let view = handle.current();
    assert!(view.processes.get(1).is_none());
    assert_eq!(view.processes().len(), 1);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn refresh_fetches_out_of_band() {
    let sim = Arc::new(Scripted::new(vec![], snap(false, &[])));
    let handle = Monitor::new(sim.clone(), config(60)).spawn();
    let mut views = handle.subscribe();
    views.changed().await.unwrap();
    assert_eq!(sim.calls.load(SeqCst), 1);

    handle.refresh();
    views.changed().await.unwrap();
    assert_eq!(sim.calls.load(SeqCst), 2);
    assert_eq!(views.borrow().applied_seq, 2);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failed_command_leaves_state_alone() {
    let sim = Arc::new(Scripted {
        fallback: snap(false, &[(4, ProcState::Ready)]),
        fail_commands: true,
        ..Default::default()
    });
    let handle = Monitor::new(sim.clone(), config(2)).spawn();
    let mut views = handle.subscribe();
    views.changed().await.unwrap();

    let err = handle.start().await.unwrap_err();
    assert!(matches!(err, Error::Status { endpoint: "start", status: 500 }));

    sleep(Duration::from_millis(2_500)).await;
    let view = handle.current();
    assert!(!view.running());
    assert_eq!(view.health.consecutive_failures, 0);
    assert_eq!(sim.calls.load(SeqCst), 2);
    handle.shutdown().await;
}
