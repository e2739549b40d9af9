//! Output channel between a driver task and its consumer
//!
//! A channel is created synchronously by [`channel`] and split into a
//! [`ChannelWriter`] (driver side) and a [`RecordStream`] (consumer side).
//!
//! # Lifecycle
//!
//! ```text
//!            close()
//!   OPEN ──────────────▶ CLOSED
//!     │   cancel() / consumer dropped
//!     │──────────────▶ CLOSED (cancelled)
//!     │   fail(err)
//!     └──────────────▶ ERRORED(err)
//! ```
//!
//! Terminal states are absorbing: writes after them are no-ops and a second
//! `close`/`fail` changes nothing. The consumer observes zero or more
//! `Data` events followed by exactly one `End` or `Error`, unless it
//! cancelled, in which case the stream simply stops.
//!
//! Backpressure comes from a bounded tokio mpsc queue. A cancellation token
//! shared by both halves lets a writer blocked on a full queue return as
//! soon as the consumer cancels.

use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

use rowstream_core::{Record, StreamError, StreamResult};

use crate::encoding::Chunk;

/// Channel state. `Closed` and `Errored` are terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelState {
    /// Accepting writes
    Open,
    /// Ended normally or cancelled by the consumer
    Closed,
    /// Ended by a producer error
    Errored(StreamError),
}

impl ChannelState {
    /// True for `Closed` and `Errored`
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChannelState::Open)
    }
}

/// Event observed by a consumer
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// One chunk of output
    Data(Chunk),
    /// The producer closed the stream
    End,
    /// The producer failed the stream
    Error(StreamError),
}

#[derive(Debug)]
struct Shared {
    state: Mutex<ChannelState>,
    /// Dropped on the first terminal transition so the receiver drains and ends
    sender: Mutex<Option<mpsc::Sender<Chunk>>>,
    token: CancellationToken,
    cancel_reason: Mutex<Option<String>>,
}

impl Shared {
    /// Move Open → `next`. Returns false if already terminal.
    fn transition(&self, next: ChannelState) -> bool {
        let mut state = self.state.lock();
        if state.is_terminal() {
            return false;
        }
        *state = next;
        drop(state);
        self.sender.lock().take();
        true
    }

    fn cancel(&self, reason: Option<String>) -> bool {
        let transitioned = self.transition(ChannelState::Closed);
        if transitioned {
            *self.cancel_reason.lock() = reason;
        }
        self.token.cancel();
        transitioned
    }
}

/// Create a channel buffering at most `capacity` chunks (minimum 1).
pub fn channel(capacity: usize) -> (ChannelWriter, RecordStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let shared = Arc::new(Shared {
        state: Mutex::new(ChannelState::Open),
        sender: Mutex::new(Some(tx)),
        token: CancellationToken::new(),
        cancel_reason: Mutex::new(None),
    });
    let writer = ChannelWriter {
        shared: Arc::clone(&shared),
    };
    let reader = RecordStream {
        shared,
        receiver: rx,
        finished: false,
    };
    (writer, reader)
}

/// Driver half of a channel.
///
/// Dropping a writer that is still open fails the stream with
/// [`StreamError::Aborted`], so a panicking driver never leaves the
/// consumer waiting forever.
#[derive(Debug)]
pub struct ChannelWriter {
    shared: Arc<Shared>,
}

impl ChannelWriter {
    /// Push one chunk, waiting for buffer space.
    ///
    /// Returns `false` without sending if the channel is terminal, or if the
    /// consumer cancels or goes away while the writer waits.
    pub async fn write(&self, chunk: Chunk) -> bool {
        if self.is_terminal() {
            return false;
        }
        let sender = self.shared.sender.lock().clone();
        let Some(sender) = sender else {
            return false;
        };
        tokio::select! {
            biased;
            _ = self.shared.token.cancelled() => false,
            sent = sender.send(chunk) => match sent {
                Ok(()) => true,
                Err(_) => {
                    self.shared.cancel(Some("consumer dropped".to_string()));
                    false
                }
            },
        }
    }

    /// OPEN → CLOSED. Returns false if the channel was already terminal.
    pub fn close(&self) -> bool {
        self.shared.transition(ChannelState::Closed)
    }

    /// OPEN → ERRORED. Returns false if the channel was already terminal.
    pub fn fail(&self, error: StreamError) -> bool {
        self.shared.transition(ChannelState::Errored(error))
    }

    /// True once the channel is closed, errored or cancelled
    pub fn is_terminal(&self) -> bool {
        self.shared.token.is_cancelled() || self.shared.state.lock().is_terminal()
    }

    /// True if the consumer cancelled
    pub fn is_cancelled(&self) -> bool {
        self.shared.token.is_cancelled()
    }

    /// Current state
    pub fn state(&self) -> ChannelState {
        self.shared.state.lock().clone()
    }

    /// Token cancelled when the consumer cancels
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.token.clone()
    }
}

impl Drop for ChannelWriter {
    fn drop(&mut self) {
        self.shared.transition(ChannelState::Errored(StreamError::Aborted {
            reason: "producer dropped without closing the stream".to_string(),
        }));
    }
}

/// Cancels a stream from outside the task that consumes it
#[derive(Debug, Clone)]
pub struct CancelHandle {
    shared: Arc<Shared>,
}

impl CancelHandle {
    /// Cancel with an optional reason. Returns false if already terminal.
    pub fn cancel(&self, reason: Option<String>) -> bool {
        self.shared.cancel(reason)
    }

    /// True once cancelled
    pub fn is_cancelled(&self) -> bool {
        self.shared.token.is_cancelled()
    }
}

/// Consumer half of a channel.
///
/// Use [`next_event`](RecordStream::next_event) for the three-event
/// protocol, or the [`Stream`] implementation which yields `Ok(chunk)` per
/// data event, `Err(e)` for an error, and ends on `End`.
///
/// Dropping the stream before it ends cancels the producer.
#[derive(Debug)]
pub struct RecordStream {
    shared: Arc<Shared>,
    receiver: mpsc::Receiver<Chunk>,
    finished: bool,
}

impl RecordStream {
    /// Next event, or `None` after the terminal event or a cancellation
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        poll_fn(|cx| self.poll_event(cx)).await
    }

    /// Cancel the stream; no further data events are observed
    pub fn cancel(&mut self) -> bool {
        self.cancel_with(None)
    }

    /// Cancel the stream with a reason
    pub fn cancel_with(&mut self, reason: Option<String>) -> bool {
        self.finished = true;
        self.receiver.close();
        self.shared.cancel(reason)
    }

    /// Handle that can cancel this stream from another task
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Current state
    pub fn state(&self) -> ChannelState {
        self.shared.state.lock().clone()
    }

    /// Reason given to the cancelling call, if any
    pub fn cancel_reason(&self) -> Option<String> {
        self.shared.cancel_reason.lock().clone()
    }

    /// Drain every chunk; fails with the stream's error
    pub async fn collect_chunks(mut self) -> StreamResult<Vec<Chunk>> {
        let mut chunks = Vec::new();
        while let Some(event) = self.next_event().await {
            match event {
                StreamEvent::Data(chunk) => chunks.push(chunk),
                StreamEvent::End => break,
                StreamEvent::Error(e) => return Err(e),
            }
        }
        Ok(chunks)
    }

    /// Drain a text stream into one string
    pub async fn collect_text(self) -> StreamResult<String> {
        let mut out = String::new();
        for chunk in self.collect_chunks().await? {
            match chunk {
                Chunk::Text(text) => out.push_str(&text),
                other => {
                    return Err(StreamError::invalid_request(format!(
                        "expected text chunk, got {:?}",
                        other
                    )))
                }
            }
        }
        Ok(out)
    }

    /// Drain an object-mode stream into its record batches
    pub async fn collect_batches(self) -> StreamResult<Vec<Vec<Record>>> {
        let mut batches = Vec::new();
        for chunk in self.collect_chunks().await? {
            match chunk {
                Chunk::Records(records) => batches.push(records),
                other => {
                    return Err(StreamError::invalid_request(format!(
                        "expected record batch, got {:?}",
                        other
                    )))
                }
            }
        }
        Ok(batches)
    }

    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<Option<StreamEvent>> {
        if self.finished || self.shared.token.is_cancelled() {
            self.finished = true;
            return Poll::Ready(None);
        }
        match self.receiver.poll_recv(cx) {
            Poll::Ready(Some(chunk)) => Poll::Ready(Some(StreamEvent::Data(chunk))),
            Poll::Ready(None) => {
                self.finished = true;
                if self.shared.token.is_cancelled() {
                    return Poll::Ready(None);
                }
                let event = match self.state() {
                    ChannelState::Closed => StreamEvent::End,
                    ChannelState::Errored(e) => StreamEvent::Error(e),
                    ChannelState::Open => StreamEvent::Error(StreamError::Aborted {
                        reason: "channel ended while open".to_string(),
                    }),
                };
                Poll::Ready(Some(event))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Stream for RecordStream {
    type Item = StreamResult<Chunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.poll_event(cx) {
            Poll::Ready(Some(StreamEvent::Data(chunk))) => Poll::Ready(Some(Ok(chunk))),
            Poll::Ready(Some(StreamEvent::Error(e))) => Poll::Ready(Some(Err(e))),
            Poll::Ready(Some(StreamEvent::End)) | Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for RecordStream {
    fn drop(&mut self) {
        if !self.finished {
            self.shared.cancel(Some("stream dropped".to_string()));
        }
    }
}
