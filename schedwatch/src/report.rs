//! Flattened, serializable summary of a [`View`] for the CLI (text or JSON).

use serde::Serialize;
use std::fmt::Write as _;
use std::time::Instant;

use crate::estimate::{estimate_process, AverageEstimate, ProcessEstimate};
use crate::monitor::View;
use crate::rank::{remaining_secs, PriorityBand, StateCounts};
use crate::timeline::Timeline;
use crate::types::{Bottleneck, ProcState};

#[derive(Debug, Clone, Serialize)]
pub struct ProcessRow {
    pub pid: u64,
    pub name: String,
    pub state: ProcState,
    pub priority: u32,
    pub band: PriorityBand,
    pub cpu_burst: f64,
    pub memory_mb: f64,
    pub remaining_secs: Option<u64>,
    pub fading: bool,
    pub is_next: bool,
    pub estimate: ProcessEstimate,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_success_secs_ago: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub running: bool,
    pub cpu: f64,
    pub memory_used: f64,
    pub memory_total: f64,
    pub memory_pressure: f64,
    pub page_faults: u64,
    pub quantum_ms: u32,
    pub counts: StateCounts,
    pub next_to_run: Option<u64>,
    pub estimates: AverageEstimate,
    /// Ranked order.
    pub processes: Vec<ProcessRow>,
    pub alerts: Vec<Bottleneck>,
    pub timeline: Timeline,
    pub health: HealthReport,
}

impl Report {
    pub fn from_view(v: &View, now: Instant) -> Self {
        let ranked = v.ranked();
        let next = v.next_to_run().map(|p| p.pid());
        let processes = ranked
            .iter()
            .map(|p| ProcessRow {
                pid: p.pid(),
                name: p.entry.name.clone(),
                state: p.state(),
                priority: p.entry.effective_priority(),
                band: PriorityBand::of(p.entry.effective_priority()),
                cpu_burst: p.entry.cpu_burst,
                memory_mb: p.entry.memory_mb,
                remaining_secs: remaining_secs(p),
                fading: p.is_fading(now),
                is_next: Some(p.pid()) == next,
                estimate: estimate_process(&p.entry),
            })
            .collect();
        let a = &v.aggregate;
        Self {
            running: a.running,
            cpu: a.cpu,
            memory_used: a.memory_used,
            memory_total: a.memory_total,
            memory_pressure: a.memory_pressure,
            page_faults: a.page_faults,
            quantum_ms: a.quantum_ms,
            counts: v.state_counts(),
            next_to_run: next,
            estimates: v.estimates(),
            processes,
            alerts: v.alerts(),
            timeline: v.timeline(),
            health: HealthReport {
                consecutive_failures: v.health.consecutive_failures,
                last_error: v.health.last_error.clone(),
                last_success_secs_ago: v
                    .health
                    .last_success
                    .map(|t| now.saturating_duration_since(t).as_secs_f64()),
            },
        }
    }
}

pub fn render_text(r: &Report) -> String {
    let mut out = String::new();
    let c = &r.counts;
    let _ = writeln!(
        out,
        "[{}] {} | cpu {:.1}% | mem {:.0}/{:.0} MB ({:.1}%) | faults {} | quantum {} ms",
        chrono::Local::now().format("%H:%M:%S"),
        if r.running { "running" } else { "stopped" },
        r.cpu,
        r.memory_used,
        r.memory_total,
        r.memory_pressure,
        r.page_faults,
        r.quantum_ms,
    );
    let _ = writeln!(
        out,
        "  {} processes: {} running, {} ready, {} waiting, {} blocked, {} completed",
        r.processes.len(),
        c.running,
        c.ready,
        c.waiting,
        c.blocked,
        c.completed
    );
    if let Some(next) = r.processes.iter().find(|p| p.is_next) {
        let _ = writeln!(out, "  next to run: {} (priority {})", next.name, next.priority);
    }
    let _ = writeln!(out, "  {}", r.estimates);
    for a in &r.alerts {
        let _ = writeln!(out, "  [{}] {}: {}", a.level, a.kind, a.detail);
    }
    if r.health.consecutive_failures > 0 {
        let _ = writeln!(
            out,
            "  ! {} failed polls, showing last good state ({})",
            r.health.consecutive_failures,
            r.health.last_error.as_deref().unwrap_or("unknown error")
        );
    }
    if !r.processes.is_empty() {
        let _ = writeln!(
            out,
            "  {:>14} {:<20} {:<10} {:>3} {:<4} {:>8} {:>8}",
            "PID", "NAME", "STATE", "PRI", "", "CPU", "MEM MB"
        );
    }
    for p in &r.processes {
        let cpu = match p.remaining_secs {
            Some(s) => format!("{:.1} ~{s}s", p.cpu_burst),
            None => "0.0".to_string(),
        };
        let _ = writeln!(
            out,
            "  {:>14} {:<20} {:<10} {:>3} {:<4} {:>8} {:>8.0}{}{}",
            p.pid,
            p.name,
            p.state,
            p.priority,
            p.band,
            cpu,
            p.memory_mb,
            if p.is_next { "  <- next" } else { "" },
            if p.fading { "  (fading)" } else { "" },
        );
    }
    if !r.timeline.is_empty() {
        let spans: Vec<String> = r
            .timeline
            .slices
            .iter()
            .map(|s| format!("{}[{}-{})", s.process, s.start_time, s.end_time))
            .collect();
        let _ = writeln!(out, "  timeline (span {}): {}", r.timeline.span, spans.join(" "));
    }
    out
}
