//! Batch job tracking.

pub mod monitor;

pub use monitor::{JobMonitor, MonitorSnapshot, DEFAULT_FILTER_DAYS, DEFAULT_POLL_INTERVAL};
