// Training monitor
// Progress callbacks and cooperative cancellation for long training runs

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Whether training starts from the current model or from nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartingMode {
    /// Continue from the loaded model, if any
    Incremental,

    /// Discard any loaded model
    Scratch,
}

/// Observer of a training run
///
/// Every callback is optional. Implementations are called from the training
/// thread and must not block.
pub trait TrainingMonitor {
    /// Training is about to start on `samples` usable samples
    fn training_started(&self, _samples: usize, _epochs: usize) {}

    /// One sample has been prepared for training
    fn sample_processed(&self, _source: &str) {}

    /// An epoch has completed with the given mean error
    fn epoch_completed(&self, _epoch: usize, _error: f64) {}

    /// Number of epochs between `epoch_completed` calls
    fn epoch_period(&self) -> usize {
        1
    }

    /// Polled between epochs; training stops early when true
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Shared cancellation switch, settable from any thread
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl TrainingMonitor for CancelFlag {
    fn is_cancelled(&self) -> bool {
        self.is_set()
    }
}

/// Whether an epoch should be reported to the monitor
pub(crate) fn should_report(monitor: &dyn TrainingMonitor, epoch: usize) -> bool {
    let period = monitor.epoch_period().max(1);
    (epoch + 1) % period == 0
}
