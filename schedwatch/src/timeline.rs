//! Gantt timeline reconstruction.
//!
//! Authoritative slice records win. Without them the last [`FALLBACK_SAMPLES`]
//! history samples that name an active process become unit-width slices laid
//! end to end from 0, trading timestamp fidelity for something drawable.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::types::{HistorySample, TimelineRecord};

pub const FALLBACK_SAMPLES: usize = 20;

/// The x-axis never shrinks below this many time units.
pub const MIN_SPAN: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineSlice {
    pub process: String,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Swatch {
    Blue,
    Emerald,
    Amber,
    Purple,
    Rose,
    Indigo,
    Cyan,
}

pub const PALETTE: [Swatch; 7] = [
    Swatch::Blue,
    Swatch::Emerald,
    Swatch::Amber,
    Swatch::Purple,
    Swatch::Rose,
    Swatch::Indigo,
    Swatch::Cyan,
];

impl fmt::Display for Swatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Blue => "blue",
            Self::Emerald => "emerald",
            Self::Amber => "amber",
            Self::Purple => "purple",
            Self::Rose => "rose",
            Self::Indigo => "indigo",
            Self::Cyan => "cyan",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineSource {
    Slices,
    History,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timeline {
    pub source: TimelineSource,
    pub slices: Vec<TimelineSlice>,
    /// Parallel to `slices`.
    pub colors: Vec<Swatch>,
    pub span: f64,
}

impl Timeline {
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }
}

// Empty labels and zero end times count as missing; an end before the
// start collapses to a zero-width slice.
fn from_record(r: &TimelineRecord) -> TimelineSlice {
    let start = r.start_time.unwrap_or(0.0);
    let end = r.end_time.filter(|e| *e != 0.0).unwrap_or(start);
    TimelineSlice {
        process: r
            .process
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| format!("P{}", r.pid.unwrap_or(0))),
        start_time: start,
        end_time: end.max(start),
        pid: r.pid,
    }
}

fn from_history(history: &[HistorySample]) -> Vec<TimelineSlice> {
    let active: Vec<&HistorySample> = history
        .iter()
        .filter(|h| h.active_process.is_some())
        .collect();
    let skip = active.len().saturating_sub(FALLBACK_SAMPLES);
    active
        .into_iter()
        .skip(skip)
        .enumerate()
        .map(|(i, h)| TimelineSlice {
            process: h
                .active_process
                .clone()
                .unwrap_or_else(|| format!("P{}", h.active_pid.unwrap_or(0))),
            start_time: i as f64,
            end_time: (i + 1) as f64,
            pid: h.active_pid,
        })
        .collect()
}

pub fn span(slices: &[TimelineSlice]) -> f64 {
    slices.iter().map(|s| s.end_time).fold(MIN_SPAN, f64::max)
}

/// First-seen pid order picks the next palette entry; slices without a pid
/// (or pid 0) fall back to their own index. Depends only on iteration order.
pub fn assign_colors(slices: &[TimelineSlice]) -> Vec<Swatch> {
    let mut by_pid: HashMap<u64, Swatch> = HashMap::new();
    let mut next = 0usize;
    slices
        .iter()
        .enumerate()
        .map(|(idx, s)| match s.pid {
            Some(pid) if pid != 0 => *by_pid.entry(pid).or_insert_with(|| {
                let c = PALETTE[next % PALETTE.len()];
                next += 1;
                c
            }),
            _ => PALETTE[idx % PALETTE.len()],
        })
        .collect()
}

pub fn build_timeline(records: &[TimelineRecord], history: &[HistorySample]) -> Timeline {
    let (source, slices) = if !records.is_empty() {
        (TimelineSource::Slices, records.iter().map(from_record).collect())
    } else {
        let slices = from_history(history);
        let source = if slices.is_empty() {
            TimelineSource::Empty
        } else {
            TimelineSource::History
        };
        (source, slices)
    };
    let colors = assign_colors(&slices);
    Timeline {
        source,
        span: span(&slices),
        colors,
        slices,
    }
}
