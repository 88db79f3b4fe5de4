//! Progress emitter: [`BatchEvent`]s onto the response body.
//!
//! Each emitted event is encoded through the stream's [`WireShape`] and sent
//! as one line on an unbounded channel. The receiving half is handed to the
//! HTTP layer as the response body stream, so every line becomes its own
//! body frame as soon as it is produced.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use batchgen_core::batch::event::{BatchEvent, BatchSummary};
use batchgen_core::batch::wire::WireShape;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Receiving half of an emitter: one NDJSON line per item.
pub type NdjsonStream = UnboundedReceiverStream<String>;

#[derive(Debug, Clone)]
pub struct ProgressEmitter {
    tx: mpsc::UnboundedSender<String>,
    shape: WireShape,
    disconnected: Arc<AtomicBool>,
}

impl ProgressEmitter {
    /// Create an emitter speaking `shape` and the stream it feeds.
    pub fn channel(shape: WireShape) -> (Self, NdjsonStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let emitter = Self {
            tx,
            shape,
            disconnected: Arc::new(AtomicBool::new(false)),
        };
        (emitter, UnboundedReceiverStream::new(rx))
    }

    /// Append one event to the stream.
    ///
    /// Never fails: a client that went away stops receiving lines, and the
    /// run carries on server-side.
    pub fn emit(&self, event: &BatchEvent<'_>) {
        let line = match self.shape.encode_line(event) {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode progress event");
                return;
            }
        };

        if self.tx.send(line).is_err() && !self.disconnected.swap(true, Ordering::Relaxed) {
            tracing::debug!("Progress stream receiver dropped, continuing without client");
        }
    }

    /// Write the terminal event. Consumes this handle.
    pub fn finish(self, summary: &BatchSummary) {
        self.emit(&BatchEvent::Finished { summary });
    }
}
