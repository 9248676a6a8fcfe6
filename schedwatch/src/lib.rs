//! Client-side reconciliation for a remote process-scheduling simulator.
//!
//! Snapshots are pulled on a fixed cadence, merged into an identity-stable
//! process table, reaped a fixed time after completion, and exposed as
//! read-only views with estimated scheduling metrics, a ranked process order
//! and a reconstructed execution timeline.

pub mod client;
pub mod config;
pub mod error;
pub mod estimate;
pub mod monitor;
pub mod rank;
pub mod reconcile;
pub mod report;
pub mod timeline;
pub mod types;

pub use client::{HttpSimulator, Simulator};
pub use error::{Error, Result};
pub use monitor::{Monitor, MonitorConfig, MonitorHandle, View};
