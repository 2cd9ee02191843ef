//! Run diagnostics for the inference pipeline.
//!
//! This module provides observability only: value summaries used for
//! debug logging and per-run counters. Nothing here feeds back into the
//! numeric result.

pub mod log;
pub mod summary;

pub use log::{create_shared_log, RunLog, RunStats, SharedRunLog};
pub use summary::Summary;
