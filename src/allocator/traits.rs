use anyhow::Result;

use crate::allocator::chunk::{Chunk, ChunkHandle};

/// Source of chunk memory for recorded blocks. Implement this to place blocks in a custom memory region.
pub trait ChunkAllocator {
    /// Allocate a zeroed chunk that holds `capacity` command words.
    /// # Errors
    /// * Fails if no memory is left for the chunk.
    fn allocate(&mut self, capacity: usize) -> Result<ChunkHandle>;
    /// Free a chunk. The handle must not be used afterwards.
    /// # Errors
    /// * Fails if the handle does not refer to a live chunk.
    fn free(&mut self, chunk: ChunkHandle) -> Result<()>;
    /// Access a live chunk.
    fn chunk(&self, chunk: ChunkHandle) -> Option<&Chunk>;
    /// Mutably access a live chunk.
    fn chunk_mut(&mut self, chunk: ChunkHandle) -> Option<&mut Chunk>;
}
