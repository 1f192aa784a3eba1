//! Job status notifications.

use async_trait::async_trait;
use sclip_models::StatusEvent;
use tokio::sync::mpsc;
use tracing::info;

use crate::error::{WorkerError, WorkerResult};

/// Receiver of job status events, one per state transition or progress step.
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn publish(&self, event: &StatusEvent) -> WorkerResult<()>;
}

/// Sink that only logs events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl StatusSink for TracingSink {
    async fn publish(&self, event: &StatusEvent) -> WorkerResult<()> {
        info!(
            job_id = %event.job_id,
            seq = event.seq,
            kind = event.kind.as_str(),
            progress = event.progress,
            message = event.message.as_deref().unwrap_or(""),
            "Job status"
        );
        Ok(())
    }
}

/// Sink that forwards events to an in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<StatusEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver its events arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl StatusSink for ChannelSink {
    async fn publish(&self, event: &StatusEvent) -> WorkerResult<()> {
        self.tx
            .send(event.clone())
            .map_err(|_| WorkerError::notify("status receiver dropped"))
    }
}
