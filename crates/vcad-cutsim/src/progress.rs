//! Progress reporting and cancellation shared with a supervising thread.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Full scale of the progress signal.
pub const PROGRESS_MAX: f64 = 1000.0;

/// Receives permille progress values in `[0, 1000]`.
pub trait ProgressSink {
    /// Publish a new progress value.
    fn publish(&mut self, permille: f64);
}

impl<F: FnMut(f64)> ProgressSink for F {
    fn publish(&mut self, permille: f64) {
        self(permille)
    }
}

/// Sink that discards every value.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn publish(&mut self, _permille: f64) {}
}

/// Lock-free progress value readable from another thread.
#[derive(Debug, Clone, Default)]
pub struct ProgressCounter {
    bits: Arc<AtomicU64>,
}

impl ProgressCounter {
    /// Counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest published value.
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }

    /// True once 1000 has been published.
    pub fn is_complete(&self) -> bool {
        self.get() >= PROGRESS_MAX
    }
}

impl ProgressSink for ProgressCounter {
    fn publish(&mut self, permille: f64) {
        self.bits.store(permille.to_bits(), Ordering::SeqCst);
    }
}

/// Cooperative cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// A token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the run stops before its next command.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Monotonic permille accumulator feeding a sink.
pub(crate) struct ProgressTracker<'a> {
    sink: &'a mut dyn ProgressSink,
    value: f64,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(sink: &'a mut dyn ProgressSink) -> Self {
        sink.publish(0.0);
        Self { sink, value: 0.0 }
    }

    /// Add `amount` and publish the clamped running total.
    pub(crate) fn advance(&mut self, amount: f64) {
        if amount.is_finite() && amount > 0.0 {
            self.value = (self.value + amount).min(PROGRESS_MAX);
        }
        self.sink.publish(self.value);
    }

    pub(crate) fn finish(&mut self) {
        self.value = PROGRESS_MAX;
        self.sink.publish(PROGRESS_MAX);
    }
}
