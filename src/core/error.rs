//! Exposes the rasterq error type

use std::sync::PoisonError;

use futures::channel::oneshot::Canceled;
use thiserror::Error;

use crate::core::queue::OverlayId;

/// Error type that rasterq can return.
#[derive(Error, Debug)]
pub enum Error {
    /// The chunk allocator ran out of physical memory for a new chunk.
    #[error("Out of chunk memory while allocating `{0}` command words.")]
    OutOfChunkMemory(usize),
    /// A chunk handle did not refer to a live chunk. Generally this should not happen.
    #[error("Implementation error. Chunk handle not found. Please open an issue.")]
    ChunkNotFound,
    /// The queue settings are inconsistent.
    #[error("Invalid queue settings: {0}")]
    InvalidSettings(&'static str),
    /// The overlay id is already taken by another user of the submission queue.
    #[error("Overlay `{0:?}` is already registered.")]
    OverlayInUse(OverlayId),
    /// The submission queue does not know about the overlay.
    #[error("Overlay `{0:?}` is not registered.")]
    OverlayNotRegistered(OverlayId),
    /// Every callback handle that fits in a full-sync command is in use.
    #[error("Callback table is full.")]
    CallbackTableFull,
    /// The completion channel was torn down before the full-sync fired.
    #[error("Completion was dropped before the full sync fired.")]
    CompletionDropped,
    /// Poisoned mutex
    #[error("Poisoned mutex")]
    PoisonError,
}

impl<T> From<PoisonError<T>> for Error {
    fn from(_: PoisonError<T>) -> Self {
        Error::PoisonError
    }
}

impl From<Canceled> for Error {
    fn from(_: Canceled) -> Self {
        Error::CompletionDropped
    }
}
