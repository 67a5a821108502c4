use std::pin::Pin;
use std::task::{Context, Poll};

use anyhow::Result;
use futures::channel::oneshot;
use futures::FutureExt;

use crate::Error;

struct CleanupFnLink {
    pub f: Box<dyn FnOnce() + Send>,
    pub next: Option<Box<CleanupFnLink>>,
}

/// Resolves once a full-sync issued with [`RasterQueue::sync_full_notify()`](crate::RasterQueue::sync_full_notify)
/// went through the rasterizer and its interrupt was serviced. The output is the argument word the
/// full-sync carried.
///
/// Dropping a completion does not cancel anything, the full-sync still runs.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Completion {
    #[derivative(Debug = "ignore")]
    receiver: oneshot::Receiver<u32>,
    #[derivative(Debug = "ignore")]
    first_cleanup_fn: Option<Box<CleanupFnLink>>,
}

impl Unpin for Completion {}

impl Completion {
    pub(crate) fn new(receiver: oneshot::Receiver<u32>) -> Self {
        Self {
            receiver,
            first_cleanup_fn: None,
        }
    }

    /// Block the calling thread until the completion fires. For the nonblocking version, use the `Future`
    /// implementation by calling `.await`.
    /// # Errors
    /// * Fails if the callback entry was removed before it fired.
    pub fn wait(self) -> Result<u32> {
        futures::executor::block_on(self)
    }

    /// Check for completion without blocking. Returns `Ok(None)` if the full-sync has not completed yet.
    /// # Errors
    /// * Fails if the callback entry was removed before it fired.
    pub fn try_wait(&mut self) -> Result<Option<u32>> {
        match self.receiver.try_recv() {
            Ok(Some(argument)) => {
                self.run_cleanup();
                Ok(Some(argument))
            }
            Ok(None) => Ok(None),
            Err(_) => Err(Error::CompletionDropped.into()),
        }
    }

    /// Add a function to the front of the chain of functions to be called when this completion resolves.
    pub fn with_cleanup(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        let head = Box::new(CleanupFnLink {
            f: Box::new(f),
            next: self.first_cleanup_fn.take(),
        });
        self.first_cleanup_fn = Some(head);
        self
    }

    fn run_cleanup(&mut self) {
        let mut link = self.first_cleanup_fn.take();
        while let Some(func) = link {
            (func.f)();
            link = func.next;
        }
    }
}

impl std::future::Future for Completion {
    type Output = Result<u32>;

    fn poll(mut self: Pin<&mut Self>, ctx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.receiver.poll_unpin(ctx) {
            Poll::Ready(Ok(argument)) => {
                self.run_cleanup();
                Poll::Ready(Ok(argument))
            }
            Poll::Ready(Err(canceled)) => Poll::Ready(Err(Error::from(canceled).into())),
            Poll::Pending => Poll::Pending,
        }
    }
}
