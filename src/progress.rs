//! Progress events for a conversion batch.
//!
//! The pipeline never calls into display code directly. It emits immutable
//! [`BatchProgress`] snapshots to a [`ProgressSink`]; the usual sink is the
//! sending half of an unbounded channel created by [`progress_channel`], so
//! emitting never blocks the batch and a slow or vanished receiver never
//! stalls conversion.
//!
//! # Example
//!
//! ```rust
//! use exam_convert::progress::{progress_channel, ProgressSink, BatchProgress, Stage};
//! use futures::StreamExt;
//!
//! # tokio_test::block_on(async {
//! let (sink, mut events) = progress_channel();
//! sink.emit(BatchProgress::new("photo.jpg", 0.0, Stage::Analyzing));
//! drop(sink);
//! let first = events.next().await.unwrap();
//! assert_eq!(first.stage, Stage::Analyzing);
//! # });
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Which step of the per-file sequence the batch is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Analyzing,
    Converting,
    Formatting,
    Completed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Analyzing => "analyzing",
            Stage::Converting => "converting",
            Stage::Formatting => "formatting",
            Stage::Completed => "completed",
        }
    }
}

/// A snapshot of batch progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub current_file: String,
    /// Percent complete, 0–100, non-decreasing over one run.
    pub progress: f64,
    pub stage: Stage,
}

impl BatchProgress {
    pub fn new(current_file: impl Into<String>, progress: f64, stage: Stage) -> Self {
        Self {
            current_file: current_file.into(),
            progress: progress.clamp(0.0, 100.0),
            stage,
        }
    }
}

/// Receives progress snapshots from the pipeline.
///
/// Implementations must return promptly; the pipeline emits inline between
/// stages. Delivery is at-least-once from the sink's point of view.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: BatchProgress);
}

/// A no-op sink for callers that don't need progress events.
///
/// This is the default when no sink is supplied.
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn emit(&self, _event: BatchProgress) {}
}

/// Sending half of a progress channel.
#[derive(Debug, Clone)]
pub struct ChannelProgressSink {
    tx: mpsc::UnboundedSender<BatchProgress>,
}

impl ChannelProgressSink {
    pub fn new(tx: mpsc::UnboundedSender<BatchProgress>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: BatchProgress) {
        // A dropped receiver just means nobody is watching.
        let _ = self.tx.send(event);
    }
}

/// Create a progress sink plus a stream of the events it receives.
pub fn progress_channel() -> (ChannelProgressSink, UnboundedReceiverStream<BatchProgress>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelProgressSink::new(tx), UnboundedReceiverStream::new(rx))
}
