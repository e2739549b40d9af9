//! Shared driver state
//!
//! Every driver runs against a [`DriverContext`]: the store, the writer half
//! of the stream's channel and the resolved settings. Drivers return a
//! [`Flow`] and [`DriverContext::finish`] turns it into the channel's
//! terminal transition.

use std::sync::Arc;

use tracing::warn;

use rowstream_core::{Store, StreamResult};

use crate::channel::ChannelWriter;
use crate::encoding::Chunk;
use crate::metrics::Completion;
use crate::request::{Intent, Settings};

/// How a driver loop stopped without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Every window was processed
    Done,
    /// The channel became terminal before the loop finished
    Cancelled,
}

/// Everything a driver needs for one stream
pub struct DriverContext<S: Store> {
    /// Entity name, for logs
    pub entity: String,
    /// What the stream does
    pub intent: Intent,
    /// Store bound to the entity
    pub store: Arc<S>,
    /// Driver half of the output channel
    pub writer: ChannelWriter,
    /// Effective batch size and output mode
    pub settings: Settings,
}

impl<S: Store> DriverContext<S> {
    /// True once the consumer cancelled or the channel ended
    pub fn is_terminal(&self) -> bool {
        self.writer.is_terminal()
    }

    /// Push an encoded chunk. `None` is a no-op.
    ///
    /// Returns false if the channel is terminal and the driver must stop.
    pub async fn push(&self, chunk: Option<Chunk>) -> bool {
        match chunk {
            Some(chunk) => self.writer.write(chunk).await,
            None => !self.is_terminal(),
        }
    }

    /// Apply the driver's outcome to the channel
    pub fn finish(&self, outcome: StreamResult<Flow>) -> Completion {
        match outcome {
            Ok(Flow::Done) if self.writer.close() => Completion::Completed,
            Ok(_) => Completion::Cancelled,
            Err(e) => {
                if self.writer.fail(e.clone()) {
                    warn!(
                        target: "rowstream::stream",
                        entity = %self.entity,
                        intent = %self.intent,
                        error = %e,
                        "Stream failed"
                    );
                    Completion::Failed
                } else {
                    Completion::Cancelled
                }
            }
        }
    }
}
