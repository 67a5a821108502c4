//! Recorded blocks.
//!
//! A block is a replayable list of rasterizer commands, built once and executed any number of times.
//! Its commands live in a chain of chunks obtained from a [`ChunkAllocator`]. While recording, every
//! contiguous run of commands written into a chunk is also announced to the submission queue as a
//! range entry, so the queue ends up holding the exact sequence needed to replay the block, fixup
//! commands included.
//!
//! [`BlockRecorder`] drives the chunk chain: it creates the first chunk lazily, keeps a cursor and a
//! boundary into the current chunk, grows the chain when the boundary is crossed, and collapses
//! adjacent range entries into one. [`Block`] is what is left once recording ended.

use anyhow::Result;

use crate::allocator::chunk::ChunkHandle;
use crate::allocator::traits::ChunkAllocator;

pub mod recorder;

pub use recorder::BlockRecorder;

/// A finished block. It owns its chunks, which stay allocated until the block is passed to
/// [`BlockRecorder::free()`].
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Block {
    pub(crate) first: ChunkHandle,
    pub(crate) chunk_count: usize,
}

impl Block {
    /// The first chunk of the chain.
    pub fn first_chunk(&self) -> ChunkHandle {
        self.first
    }

    /// Number of chunks in the chain.
    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Walk the chain of chunks, first to last.
    pub fn chunks<'a, A: ChunkAllocator>(&self, allocator: &'a A) -> Chunks<'a, A> {
        Chunks {
            allocator,
            next: Some(self.first),
        }
    }

    /// Copy out every recorded word, placeholders included, in chain order.
    /// # Errors
    /// * Fails if a chunk of the chain is no longer allocated.
    pub fn words<A: ChunkAllocator>(&self, allocator: &A) -> Result<Vec<u64>> {
        let mut words = Vec::new();
        for handle in self.chunks(allocator) {
            let chunk = allocator.chunk(handle?).ok_or(crate::Error::ChunkNotFound)?;
            words.extend_from_slice(chunk.words());
        }
        Ok(words)
    }
}

/// Iterator over the chunks of a [`Block`], following the successor links.
pub struct Chunks<'a, A: ChunkAllocator> {
    allocator: &'a A,
    next: Option<ChunkHandle>,
}

impl<'a, A: ChunkAllocator> Iterator for Chunks<'a, A> {
    type Item = Result<ChunkHandle>;

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.next.take()?;
        match self.allocator.chunk(handle) {
            Some(chunk) => {
                self.next = chunk.next();
                Some(Ok(handle))
            }
            None => Some(Err(crate::Error::ChunkNotFound.into())),
        }
    }
}
