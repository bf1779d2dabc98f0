//! The chunk channel — ordered, unbounded, single producer, single consumer.
//!
//! The close signal rides the same queue as the values, so "drain buffered
//! chunks first, then end exactly once" falls directly out of FIFO order.
//! A producer handle dropped without an explicit close delivers
//! [`StreamError::Cancelled`] as the terminal signal, so a consumer is never
//! left waiting on an abandoned stream.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::Stream;

/// Terminal or send-side failures of a chunk channel.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    /// `send` was called after the channel was closed (or the consumer is gone).
    #[error("stream channel is closed")]
    Closed,

    /// The producer went away without closing; the stream was cancelled.
    #[error("stream cancelled: producer dropped before close")]
    Cancelled,

    /// The producer closed the channel with an error; this is the terminal
    /// signal the consumer observes after draining buffered chunks.
    #[error("stream terminated: {0}")]
    Terminal(String),
}

enum Event<T> {
    Chunk(T),
    Close(Option<StreamError>),
}

/// Create a new chunk channel.
pub fn channel<T>() -> (ChunkSender<T>, ChunkReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ChunkSender { tx, closed: AtomicBool::new(false) },
        ChunkReceiver { rx, done: false },
    )
}

/// The producer half. Exposed to action functions as a chunk callback.
pub struct ChunkSender<T> {
    tx: mpsc::UnboundedSender<Event<T>>,
    closed: AtomicBool,
}

impl<T> ChunkSender<T> {
    /// Non-blocking append to the queue.
    ///
    /// Fails with [`StreamError::Closed`] once the channel is closed or the
    /// consumer has been dropped.
    pub fn send(&self, value: T) -> Result<(), StreamError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StreamError::Closed);
        }
        self.tx
            .send(Event::Chunk(value))
            .map_err(|_| StreamError::Closed)
    }

    /// Close the channel cleanly. Subsequent closes are no-ops.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.tx.send(Event::Close(None));
        }
    }

    /// Close the channel with a terminal error delivered to the consumer
    /// after any buffered chunks.
    pub fn close_with_error(&self, error: StreamError) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(error = %error, "closing stream with error");
            let _ = self.tx.send(Event::Close(Some(error)));
        }
    }

    /// Whether the channel has been closed from the producer side.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl<T> Drop for ChunkSender<T> {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Acquire) {
            let _ = self.tx.send(Event::Close(Some(StreamError::Cancelled)));
        }
    }
}

/// The consumer half — a lazy, single-pass, finite sequence of chunks.
pub struct ChunkReceiver<T> {
    rx: mpsc::UnboundedReceiver<Event<T>>,
    done: bool,
}

impl<T> ChunkReceiver<T> {
    /// Receive the next chunk.
    ///
    /// Returns `Ok(Some(chunk))` for each buffered or future chunk in send
    /// order, then exactly one terminal signal: `Ok(None)` for a clean
    /// close, or `Err` if the producer closed with an error (or vanished).
    /// After the terminal signal, every further call returns `Ok(None)`.
    pub async fn recv(&mut self) -> Result<Option<T>, StreamError> {
        if self.done {
            return Ok(None);
        }
        match self.rx.recv().await {
            Some(Event::Chunk(value)) => Ok(Some(value)),
            Some(Event::Close(None)) | None => {
                self.done = true;
                Ok(None)
            }
            Some(Event::Close(Some(error))) => {
                self.done = true;
                Err(error)
            }
        }
    }

    /// Drain every remaining chunk, discarding the terminal error if any.
    pub async fn collect_remaining(&mut self) -> Vec<T> {
        let mut chunks = Vec::new();
        while let Ok(Some(chunk)) = self.recv().await {
            chunks.push(chunk);
        }
        chunks
    }
}

impl<T> Stream for ChunkReceiver<T> {
    type Item = Result<T, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(Event::Chunk(value))) => Poll::Ready(Some(Ok(value))),
            Poll::Ready(Some(Event::Close(None))) | Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Ready(Some(Event::Close(Some(error)))) => {
                this.done = true;
                Poll::Ready(Some(Err(error)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
