//! Identity-stable process set: merges successive snapshots and reaps finished entries.
//!
//! The merger is the only writer of entry fields and the reaper the only remover.
//! Absence from a snapshot never evicts; a completed process lingers for
//! [`RETENTION_WINDOW`] after it was first seen completed, then vanishes. A
//! reaped pid stays gone while the feed keeps reporting it.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use crate::types::{ProcState, ProcessSnapshotEntry};

/// How long a completed process stays visible.
pub const RETENTION_WINDOW: Duration = Duration::from_secs(5);

/// Completed rows older than this are flagged as fading out.
pub const FADE_AFTER: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledProcess {
    #[serde(flatten)]
    pub entry: ProcessSnapshotEntry,
    #[serde(skip)]
    pub first_observed_at: Instant,
    #[serde(skip)]
    pub completed_at: Option<Instant>,
}

impl ReconciledProcess {
    fn observe(entry: ProcessSnapshotEntry, now: Instant) -> Self {
        let completed_at = (entry.state == ProcState::Completed).then_some(now);
        Self {
            entry,
            first_observed_at: now,
            completed_at,
        }
    }

    // Replace everything but the two write-once stamps.
    fn update(&mut self, entry: ProcessSnapshotEntry, now: Instant) {
        if entry.state == ProcState::Completed && self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
        self.entry = entry;
    }

    pub fn pid(&self) -> u64 {
        self.entry.pid
    }

    pub fn state(&self) -> ProcState {
        self.entry.state
    }

    pub fn is_expired(&self, now: Instant, retention: Duration) -> bool {
        self.entry.state == ProcState::Completed
            && self
                .completed_at
                .is_some_and(|t| now.saturating_duration_since(t) >= retention)
    }

    pub fn is_fading(&self, now: Instant) -> bool {
        self.entry.state == ProcState::Completed
            && self
                .completed_at
                .is_some_and(|t| now.saturating_duration_since(t) > FADE_AFTER)
    }
}

/// Reconciled processes in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessTable {
    rows: Vec<ReconciledProcess>,
    // Pids removed by the reaper. Only pids still present in the latest
    // snapshot are remembered.
    reaped: HashSet<u64>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn as_slice(&self) -> &[ReconciledProcess] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ReconciledProcess> {
        self.rows.iter()
    }

    pub fn get(&self, pid: u64) -> Option<&ReconciledProcess> {
        self.rows.iter().find(|p| p.pid() == pid)
    }

    /// Folds `incoming` into a copy of this table. `self` is left untouched so
    /// callers can diff old and new.
    pub fn merge(&self, incoming: &[ProcessSnapshotEntry], now: Instant) -> ProcessTable {
        let mut rows = self.rows.clone();
        let mut index: HashMap<u64, usize> = rows
            .iter()
            .enumerate()
            .map(|(i, p)| (p.pid(), i))
            .collect();

        let mut created = 0usize;
        let mut reaped = HashSet::new();
        for entry in incoming {
            if self.reaped.contains(&entry.pid) {
                reaped.insert(entry.pid);
                continue;
            }
            match index.get(&entry.pid) {
                Some(&i) => rows[i].update(entry.clone(), now),
                None => {
                    index.insert(entry.pid, rows.len());
                    rows.push(ReconciledProcess::observe(entry.clone(), now));
                    created += 1;
                }
            }
        }
        debug!(
            incoming = incoming.len(),
            created,
            carried = rows.len().saturating_sub(incoming.len()),
            suppressed = reaped.len(),
            "merged snapshot"
        );
        ProcessTable { rows, reaped }
    }

    /// Drops completed processes whose retention has elapsed. Returns how many went.
    pub fn reap(&mut self, now: Instant, retention: Duration) -> usize {
        let before = self.rows.len();
        let gone = &mut self.reaped;
        self.rows.retain(|p| {
            let expired = p.is_expired(now, retention);
            if expired {
                gone.insert(p.pid());
            }
            !expired
        });
        let reaped = before - self.rows.len();
        if reaped > 0 {
            debug!(reaped, remaining = self.rows.len(), "reaped completed processes");
        }
        reaped
    }
}

impl<'a> IntoIterator for &'a ProcessTable {
    type Item = &'a ReconciledProcess;
    type IntoIter = std::slice::Iter<'a, ReconciledProcess>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
