//! Types that mirror the simulator's JSON schema.
//!
//! Every field is defaulted: a snapshot missing optional data is still applied,
//! never rejected wholesale.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Priority assumed when the simulator omits it (or sends 0).
pub const DEFAULT_PRIORITY: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcState {
    #[default]
    Ready,
    Running,
    Waiting,
    Blocked,
    Completed,
    Unknown,
}

impl ProcState {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "ready" => Self::Ready,
            "running" => Self::Running,
            "waiting" => Self::Waiting,
            "blocked" => Self::Blocked,
            "completed" => Self::Completed,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Waiting => "waiting",
            Self::Blocked => "blocked",
            Self::Completed => "completed",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

// Missing or null state reads as ready; unrecognised strings as unknown.
impl<'de> Deserialize<'de> for ProcState {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw.as_deref().map(ProcState::parse).unwrap_or_default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessSnapshotEntry {
    pub pid: u64,
    pub name: String,
    pub state: ProcState,
    pub priority: u32,
    pub cpu_burst: f64,
    pub remaining_burst: f64,
    pub memory_mb: f64,
    pub working_set_mb: f64,
    pub io_wait_cycles: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workload: Option<String>,
    pub io_bound: f64,
    pub aging: u32,
}

impl ProcessSnapshotEntry {
    /// Priority with the 0/absent case folded onto [`DEFAULT_PRIORITY`].
    pub fn effective_priority(&self) -> u32 {
        if self.priority == 0 {
            DEFAULT_PRIORITY
        } else {
            self.priority
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Critical,
    Warning,
    #[default]
    Info,
}

impl<'de> Deserialize<'de> for AlertLevel {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("critical") => Self::Critical,
            Some("warning") => Self::Warning,
            _ => Self::Info,
        })
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::Info => "info",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bottleneck {
    #[serde(rename = "type")]
    pub kind: String,
    pub level: AlertLevel,
    pub detail: String,
}

impl Bottleneck {
    pub fn stable() -> Self {
        Self {
            kind: "ok".into(),
            level: AlertLevel::Info,
            detail: "System stable".into(),
        }
    }
}

/// Upstream alerts as-is, or a single "System stable" entry when there are none.
pub fn alerts_or_stable(alerts: &[Bottleneck]) -> Vec<Bottleneck> {
    if alerts.is_empty() {
        vec![Bottleneck::stable()]
    } else {
        alerts.to_vec()
    }
}

/// One past aggregate sample from the simulator's rolling history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySample {
    pub timestamp: f64,
    pub cpu: f64,
    pub quantum_ms: u32,
    pub memory_used: f64,
    pub memory_pressure: f64,
    pub page_faults: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_process: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_pid: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running_pid: Option<u64>,
}

/// Authoritative execution slice as reported by the simulator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineRecord {
    pub process: Option<String>,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub pid: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateSnapshot {
    pub cpu: f64,
    pub memory_used: f64,
    pub memory_total: f64,
    pub memory_pressure: f64,
    pub page_faults: u64,
    pub quantum_ms: u32,
    pub bottlenecks: Vec<Bottleneck>,
    pub history: Vec<HistorySample>,
    pub running: bool,
    pub processes: Vec<ProcessSnapshotEntry>,
    pub timeline: Vec<TimelineRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running_pid: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_slice: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_count: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Workload {
    Light,
    Medium,
    Heavy,
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Light => "light",
            Self::Medium => "medium",
            Self::Heavy => "heavy",
        })
    }
}

/// Body of `POST /add_process`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddProcessRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub workload: Workload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
}

impl AddProcessRequest {
    pub const PRIORITY_RANGE: std::ops::RangeInclusive<u32> = 1..=5;

    /// Validates priority and drops a blank name so the simulator picks one.
    pub fn new(name: Option<&str>, workload: Workload, priority: u32) -> crate::Result<Self> {
        if !Self::PRIORITY_RANGE.contains(&priority) {
            return Err(crate::Error::InvalidRequest(format!(
                "priority must be between 1 and 5, got {priority}"
            )));
        }
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        Ok(Self {
            name,
            workload,
            priority: Some(priority),
        })
    }

    /// Quick-add preset: `<workload>-batch`, priority left to the simulator.
    pub fn preset(workload: Workload) -> Self {
        Self {
            name: Some(format!("{workload}-batch")),
            workload,
            priority: None,
        }
    }
}
