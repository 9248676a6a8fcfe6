//! Heuristic scheduling metrics.
//!
//! The snapshot feed carries neither arrival time nor first-dispatch time, so
//! turnaround, waiting and response are modelled from priority and state alone.
//! These are estimates, not measurements; keep the formula stable so numbers
//! line up with what the simulator's own dashboard shows.

use serde::Serialize;
use std::fmt;

use crate::reconcile::ReconciledProcess;
use crate::types::{ProcState, ProcessSnapshotEntry};

pub const BASE_TIME: f64 = 2.0;
pub const PRIORITY_TIME_FACTOR: f64 = 0.5;
const MIN_RESPONSE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ProcessEstimate {
    pub turnaround: f64,
    pub waiting: f64,
    pub response: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AverageEstimate {
    pub avg_turnaround: f64,
    pub avg_waiting: f64,
    pub avg_response: f64,
    pub count: usize,
}

fn waiting_multiplier(state: ProcState) -> f64 {
    match state {
        ProcState::Ready | ProcState::Waiting => 0.7,
        ProcState::Running => 0.2,
        _ => 0.5,
    }
}

pub fn estimate_process(p: &ProcessSnapshotEntry) -> ProcessEstimate {
    let priority = f64::from(p.effective_priority());
    let burst = if p.cpu_burst > 0.0 { p.cpu_burst } else { 1.0 };
    let time_in_system = BASE_TIME + priority * PRIORITY_TIME_FACTOR;

    let turnaround = time_in_system + burst;
    let waiting = (turnaround - burst + time_in_system * waiting_multiplier(p.state)).max(0.0);
    let dispatch = if p.state == ProcState::Running { 0.1 } else { 0.5 };
    let response = (priority * 0.3 + dispatch).max(MIN_RESPONSE);

    ProcessEstimate {
        turnaround,
        waiting,
        response,
    }
}

/// Arithmetic mean over every reconciled process; all zeros when empty.
pub fn estimate<'a, I>(processes: I) -> AverageEstimate
where
    I: IntoIterator<Item = &'a ReconciledProcess>,
{
    let mut sum = ProcessEstimate::default();
    let mut count = 0usize;
    for p in processes {
        let e = estimate_process(&p.entry);
        sum.turnaround += e.turnaround;
        sum.waiting += e.waiting;
        sum.response += e.response;
        count += 1;
    }
    if count == 0 {
        return AverageEstimate::default();
    }
    let n = count as f64;
    AverageEstimate {
        avg_turnaround: sum.turnaround / n,
        avg_waiting: sum.waiting / n,
        avg_response: sum.response / n,
        count,
    }
}

/// One decimal place; display only.
pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

impl fmt::Display for AverageEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "est. avg turnaround {:.1}s | waiting {:.1}s | response {:.1}s",
            self.avg_turnaround, self.avg_waiting, self.avg_response
        )
    }
}
