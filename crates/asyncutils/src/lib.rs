//! Completion handles for code that lives on both sides of the async fence.
//!
//! The storage layer is written against async drivers, but most of its
//! callers just want an answer. A [`Blocking`] wraps a future together with
//! the runtime [`Handle`] that knows how to drive it, so the caller can pick:
//! `.await` it from async code, or [`execute_as_blocking`](Blocking::execute_as_blocking)
//! it from a plain thread and get a fully materialized result back.

use derive_more::{Display, Error};
use futures::future::{BoxFuture, FutureExt};
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::runtime::Handle;

/// A boxed, type-erased completion handle.
pub type BoxBlocking<T> = Blocking<BoxFuture<'static, T>>;

/// The handle was resolved with a timeout and the timeout won.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
#[display("operation did not complete within {}ms", _0.as_millis())]
pub struct TimedOut(#[error(not(source))] pub Duration);

pin_project! {
    /// A future bound to the runtime that should drive it.
    ///
    /// Nothing happens until the handle is either awaited or executed.
    #[must_use = "completion handles do nothing until awaited or executed"]
    pub struct Blocking<F> {
        #[pin]
        future: F,
        handle: Handle,
        timeout: Option<Duration>,
    }
}

impl<F: Future> Blocking<F> {
    pub fn new(handle: Handle, future: F) -> Self {
        Self { future, handle, timeout: None }
    }

    /// Limit how long [`execute_as_blocking`](Self::execute_as_blocking) may
    /// wait. `None` waits forever.
    ///
    /// The limit only applies to blocking execution; async callers are
    /// expected to compose their own timeouts.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Block the current thread until the future resolves.
    ///
    /// # Panics
    /// Panics if called from within an asynchronous execution context, the
    /// same as [`Handle::block_on`]. Await the handle instead.
    pub fn execute_as_blocking(self) -> Result<F::Output, TimedOut> {
        let Self { future, handle, timeout } = self;
        match timeout {
            Some(limit) => handle
                .block_on(async move { tokio::time::timeout(limit, future).await })
                .map_err(|_elapsed| TimedOut(limit)),
            None => Ok(handle.block_on(future)),
        }
    }
}

impl<F> Blocking<F>
where
    F: Future + Send + 'static,
{
    /// Erase the future type so handles for different operations can share
    /// one concrete type.
    pub fn boxed(self) -> BoxBlocking<F::Output> {
        let Self { future, handle, timeout } = self;
        Blocking { future: future.boxed(), handle, timeout }
    }
}

impl<F: Future> Future for Blocking<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.project().future.poll(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tokio::runtime::Runtime;

    #[fixture]
    fn runtime() -> Runtime {
        tokio::runtime::Builder::new_multi_thread().worker_threads(1).enable_all().build().unwrap()
    }

    #[rstest]
    fn test_execute_as_blocking_returns_output(runtime: Runtime) {
        let pending = Blocking::new(runtime.handle().clone(), async { 40 + 2 });
        assert_eq!(pending.execute_as_blocking(), Ok(42));
    }

    #[rstest]
    #[case(None)]
    #[case(Some(Duration::from_secs(5)))]
    fn test_completes_within_timeout(runtime: Runtime, #[case] timeout: Option<Duration>) {
        let pending = Blocking::new(runtime.handle().clone(), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            "done"
        })
        .with_timeout(timeout);
        assert_eq!(pending.execute_as_blocking(), Ok("done"));
    }

    #[rstest]
    fn test_timeout_is_reported(runtime: Runtime) {
        let limit = Duration::from_millis(10);
        let pending = Blocking::new(runtime.handle().clone(), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        })
        .with_timeout(Some(limit));
        assert_eq!(pending.execute_as_blocking(), Err(TimedOut(limit)));
    }

    #[rstest]
    fn test_boxed_handles_share_a_type(runtime: Runtime) {
        let handles: Vec<BoxBlocking<u8>> = vec![
            Blocking::new(runtime.handle().clone(), async { 1 }).boxed(),
            Blocking::new(runtime.handle().clone(), std::future::ready(2)).boxed(),
        ];
        let results = handles.into_iter().map(|h| h.execute_as_blocking().unwrap()).collect::<Vec<_>>();
        assert_eq!(results, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_awaiting_ignores_blocking_timeout() {
        let pending = Blocking::new(Handle::current(), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            7
        })
        .with_timeout(Some(Duration::from_millis(1)));
        assert_eq!(pending.await, 7);
    }
}
