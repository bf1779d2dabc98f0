//! Sync/async bridge.
//!
//! Callers that only understand blocking calls still need to drive actions
//! to completion. [`run_to_completion`] handles both worlds: outside any
//! runtime it builds a one-off current-thread runtime; inside a running
//! runtime it ships the future to a scoped worker thread that drives it
//! with the live runtime's handle, so the loop is never blocked against
//! itself. Failures keep their original type and message because the
//! future's own output is returned unchanged; panics are resumed on the
//! calling thread.

use std::future::Future;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio_stream::{Stream, StreamExt};

enum Driver {
    /// A runtime is already running on this thread; reuse its handle.
    Ambient(Handle),
    /// No ambient runtime; own a single-threaded one.
    Owned(Runtime),
}

impl Driver {
    fn new() -> Self {
        match Handle::try_current() {
            Ok(handle) => Self::Ambient(handle),
            Err(_) => Self::Owned(
                Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap_or_else(|e| panic!("failed to build bridge runtime: {e}")),
            ),
        }
    }

    fn block_on<F>(&self, future: F) -> F::Output
    where
        F: Future + Send,
        F::Output: Send,
    {
        match self {
            Self::Owned(runtime) => runtime.block_on(future),
            Self::Ambient(handle) => std::thread::scope(|scope| {
                let worker = scope.spawn(|| handle.block_on(future));
                match worker.join() {
                    Ok(output) => output,
                    Err(payload) => std::panic::resume_unwind(payload),
                }
            }),
        }
    }
}

/// Run an asynchronous unit of work to completion from a synchronous caller.
///
/// Safe to call both from a plain thread and from a thread that is itself
/// inside a running tokio runtime (the re-entrant case). The future's output
/// — value or error — is returned as-is.
pub fn run_to_completion<F>(future: F) -> F::Output
where
    F: Future + Send,
    F::Output: Send,
{
    Driver::new().block_on(future)
}

/// Convert an asynchronous sequence into one a synchronous caller can
/// iterate with blocking semantics.
///
/// Order and finiteness are preserved; the underlying stream's items
/// (including per-item errors) pass through unchanged, and exhaustion maps
/// to ordinary iterator end.
pub fn blocking_iter<S>(stream: S) -> BlockingStream<S>
where
    S: Stream + Unpin + Send,
    S::Item: Send,
{
    BlockingStream { inner: stream, driver: Driver::new() }
}

/// Blocking iterator adapter over an async stream. See [`blocking_iter`].
pub struct BlockingStream<S> {
    inner: S,
    driver: Driver,
}

impl<S> Iterator for BlockingStream<S>
where
    S: Stream + Unpin + Send,
    S::Item: Send,
{
    type Item = S::Item;

    fn next(&mut self) -> Option<Self::Item> {
        self.driver.block_on(self.inner.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{channel, StreamError};

    async fn double(x: u32) -> u32 {
        tokio::task::yield_now().await;
        x * 2
    }

    async fn fails() -> Result<u32, String> {
        Err("original message".to_string())
    }

    #[test]
    fn plain_context_runs_future() {
        assert_eq!(run_to_completion(double(21)), 42);
    }

    #[test]
    fn plain_context_propagates_error() {
        let err = run_to_completion(fails()).unwrap_err();
        assert_eq!(err, "original message");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reentrant_context_runs_future() {
        // Calling the blocking bridge from inside a running runtime must not
        // deadlock the loop against itself.
        let result = tokio::task::spawn_blocking(|| run_to_completion(double(21)))
            .await
            .unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reentrant_context_propagates_same_error() {
        let err = tokio::task::spawn_blocking(|| run_to_completion(fails()).unwrap_err())
            .await
            .unwrap();
        assert_eq!(err, "original message");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reentrant_direct_call_from_async_context() {
        // Even without spawn_blocking: the future is driven on a scoped
        // worker thread, so the current worker only blocks on the join.
        let result = run_to_completion(double(5));
        assert_eq!(result, 10);
    }

    #[test]
    fn blocking_iter_preserves_order_and_end() {
        let (tx, rx) = channel();
        for i in 0..4 {
            tx.send(i).unwrap();
        }
        tx.close();

        let items: Vec<_> = blocking_iter(rx).collect();
        assert_eq!(items, vec![Ok(0), Ok(1), Ok(2), Ok(3)]);
    }

    #[test]
    fn blocking_iter_surfaces_terminal_error() {
        let (tx, rx) = channel::<u32>();
        tx.send(1).unwrap();
        tx.close_with_error(StreamError::Terminal("upstream failed".into()));

        let items: Vec<_> = blocking_iter(rx).collect();
        assert_eq!(
            items,
            vec![Ok(1), Err(StreamError::Terminal("upstream failed".into()))]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_iter_reentrant() {
        let (tx, rx) = channel();
        tokio::spawn(async move {
            for i in 0..3 {
                tx.send(i).unwrap();
            }
            tx.close();
        });

        let items = tokio::task::spawn_blocking(move || {
            blocking_iter(rx).collect::<Vec<_>>()
        })
        .await
        .unwrap();
        assert_eq!(items, vec![Ok(0), Ok(1), Ok(2)]);
    }
}
