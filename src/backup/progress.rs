//! Progress reporting seam.
//!
//! The orchestrator emits phase/percentage/message events through this
//! trait and behaves identically whether a real reporter or the no-op sink
//! is attached (headless mode).

/// A pure sink for progress events. No buffering, no retry.
pub trait ProgressReporter: Send + Sync {
    /// `percent` is 0..=100 across the whole run.
    fn report(&self, phase: &str, percent: u8, message: &str);
}

/// Discards every event. Default reporter for headless use.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _phase: &str, _percent: u8, _message: &str) {}
}
