//! Progress reporting.
//!
//! This module provides [`ProgressCallback`] for observing a pipeline run and
//! [`ProgressInfo`] for progress snapshots. Two levels are reported:
//! [`OperationType::Pipeline`] once per finished archive, and
//! [`OperationType::EntryConversion`] once per finished video member.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use unspool::{ConvertOptions, OperationType, ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if info.operation == OperationType::Pipeline {
//!             println!("{}/{:?} archives", info.current, info.total);
//!         }
//!     }
//! }
//!
//! let options = ConvertOptions::new().with_progress(Arc::new(PrintProgress));
//! ```

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

/// The kind of work a progress report refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Archives completed by the pipeline driver.
    Pipeline,
    /// Video members completed inside one archive.
    EntryConversion,
}

/// A snapshot of progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// What kind of work is being counted.
    pub operation: OperationType,
    /// How many items have finished so far.
    pub current: u64,
    /// Number of items this operation will report.
    pub total: Option<u64>,
    /// `current / total` as a percentage, when `total` is known and non-zero.
    pub percentage: Option<f32>,
    /// Time since tracking began.
    pub elapsed: Duration,
    /// Time left at the average pace so far.
    pub estimated_remaining: Option<Duration>,
    /// The archive path or member name that just finished.
    pub item: Option<String>,
    /// Whether the finished item failed.
    pub failed: bool,
}

/// Trait for receiving progress updates.
///
/// Implementations must be [`Send`] and [`Sync`]: archive-level reports are
/// delivered on the thread that called the driver, but member-level reports
/// come from whichever worker is converting that archive.
pub trait ProgressCallback: Send + Sync {
    /// Called each time an archive or member finishes.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Default observer; ignores every report.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Counts finished items for one operation and notifies the observer.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    total: Option<u64>,
    current: u64,
    start_time: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        operation: OperationType,
        total: Option<u64>,
    ) -> Self {
        Self {
            callback,
            operation,
            total,
            current: 0,
            start_time: Instant::now(),
        }
    }

    /// Record one finished item and notify the callback.
    pub(crate) fn advance(&mut self, item: &str, failed: bool) {
        self.current += 1;
        let info = self.snapshot(Some(item.to_string()), failed);
        self.callback.on_progress(&info);
    }

    fn snapshot(&self, item: Option<String>, failed: bool) -> ProgressInfo {
        let elapsed = self.start_time.elapsed();

        let percentage = self
            .total
            .filter(|&total| total > 0)
            .map(|total| (self.current as f32 / total as f32) * 100.0);

        let estimated_remaining = self.total.filter(|_| self.current > 0).map(|total| {
            let left = total.saturating_sub(self.current) as f64;
            elapsed.mul_f64(left / self.current as f64)
        });

        ProgressInfo {
            operation: self.operation,
            current: self.current,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
            item,
            failed,
        }
    }
}
