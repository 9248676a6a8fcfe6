//! Process ordering, next-to-run selection and per-state tallies.

use serde::Serialize;
use std::fmt;

use crate::reconcile::ReconciledProcess;
use crate::types::ProcState;

// Seconds of simulated CPU work one burst unit represents (one 80 ms quantum).
const SECS_PER_BURST_UNIT: f64 = 0.08;

pub fn state_order(state: ProcState) -> u8 {
    match state {
        ProcState::Running => 0,
        ProcState::Ready => 1,
        ProcState::Waiting => 2,
        ProcState::Blocked => 3,
        ProcState::Completed | ProcState::Unknown => 99,
    }
}

/// State first, then priority ascending. Stable, so ties keep input order.
pub fn rank<'a, I>(processes: I) -> Vec<&'a ReconciledProcess>
where
    I: IntoIterator<Item = &'a ReconciledProcess>,
{
    let mut ranked: Vec<&ReconciledProcess> = processes.into_iter().collect();
    ranked.sort_by_key(|p| (state_order(p.state()), p.entry.effective_priority()));
    ranked
}

pub fn next_to_run<'a>(ranked: &[&'a ReconciledProcess]) -> Option<&'a ReconciledProcess> {
    ranked
        .iter()
        .copied()
        .find(|p| matches!(p.state(), ProcState::Ready | ProcState::Running))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PriorityBand {
    High,
    #[serde(rename = "MED")]
    Medium,
    Low,
}

impl PriorityBand {
    pub fn of(priority: u32) -> Self {
        match priority {
            0..=2 => Self::High,
            3 => Self::Medium,
            _ => Self::Low,
        }
    }
}

impl fmt::Display for PriorityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::High => "HIGH",
            Self::Medium => "MED",
            Self::Low => "LOW",
        })
    }
}

/// Rough wall-clock seconds left, for processes that still have work.
pub fn remaining_secs(p: &ReconciledProcess) -> Option<u64> {
    if p.state() == ProcState::Completed || p.entry.cpu_burst <= 0.0 {
        return None;
    }
    Some((p.entry.cpu_burst / SECS_PER_BURST_UNIT).ceil() as u64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StateCounts {
    pub ready: usize,
    pub running: usize,
    pub waiting: usize,
    pub blocked: usize,
    pub completed: usize,
}

impl StateCounts {
    pub fn tally<'a, I>(processes: I) -> Self
    where
        I: IntoIterator<Item = &'a ReconciledProcess>,
    {
        let mut c = Self::default();
        for p in processes {
            match p.state() {
                ProcState::Ready => c.ready += 1,
                ProcState::Running => c.running += 1,
                ProcState::Waiting => c.waiting += 1,
                ProcState::Blocked => c.blocked += 1,
                ProcState::Completed => c.completed += 1,
                ProcState::Unknown => {}
            }
        }
        c
    }

    /// Headline state: the most "interesting" state with at least one process.
    pub fn active_state(&self) -> Option<ProcState> {
        [
            (self.running, ProcState::Running),
            (self.waiting, ProcState::Waiting),
            (self.blocked, ProcState::Blocked),
            (self.ready, ProcState::Ready),
            (self.completed, ProcState::Completed),
        ]
        .into_iter()
        .find(|(n, _)| *n > 0)
        .map(|(_, s)| s)
    }
}
