//! Progress reporting seam for long suspension points

/// Receives start/stop notifications around slow operations
pub trait ProgressSink: Send + Sync {
    fn start(&self, message: &str);
    fn stop(&self);
}

/// Sink that reports nothing (raw and debug modes)
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn start(&self, _message: &str) {}
    fn stop(&self) {}
}
