//! Best-effort progress notification seam.
//!
//! Delivery failures are caught and logged, never allowed to abort
//! resolution or commit.

use anyhow::Result;

/// One progress notification
#[derive(Debug, Clone, Copy)]
pub struct ProgressUpdate<'a> {
    pub message: &'a str,
    pub current: usize,
    pub total: usize,
}

/// Fire-and-forget notification channel
pub trait ProgressSink {
    fn publish(&self, topic: &str, update: &ProgressUpdate<'_>) -> Result<()>;
}

/// Publish, swallowing and logging any delivery failure
pub fn publish_best_effort(sink: &dyn ProgressSink, topic: &str, update: &ProgressUpdate<'_>) {
    if let Err(err) = sink.publish(topic, update) {
        log::warn!("progress publish to '{}' failed: {:#}", topic, err);
    }
}

/// Sink that reports through the log
pub struct LogSink;

impl ProgressSink for LogSink {
    fn publish(&self, topic: &str, update: &ProgressUpdate<'_>) -> Result<()> {
        log::info!(
            "[{}] {} ({}/{})",
            topic,
            update.message,
            update.current,
            update.total
        );
        Ok(())
    }
}

/// Sink that discards everything
pub struct NullSink;

impl ProgressSink for NullSink {
    fn publish(&self, _topic: &str, _update: &ProgressUpdate<'_>) -> Result<()> {
        Ok(())
    }
}
