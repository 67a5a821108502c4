//! Contains the default chunk allocator, an arena of chunks placed in a window of physical memory.

use anyhow::Result;

use crate::allocator::chunk::{Chunk, ChunkHandle, WORD_SIZE};
use crate::allocator::traits::ChunkAllocator;
use crate::core::queue::PhysicalAddress;
use crate::util::align::align_up;
use crate::Error;

/// Start of the physical window used by [`DefaultChunkAllocator::new()`].
pub const DEFAULT_WINDOW_BASE: PhysicalAddress = 0x0010_0000;
/// Size of the physical window used by [`DefaultChunkAllocator::new()`]. Range commands only carry
/// 24 address bits, so the window must stay below 16 MiB.
pub const DEFAULT_WINDOW_SIZE: u32 = 0x0040_0000;

/// The default allocator. Chunks live in an arena and are referred to by [`ChunkHandle`]. Each chunk
/// gets an 8-byte aligned physical address inside a fixed window; freed address ranges are reused
/// first-fit before the window is grown into.
///
/// # Example
/// ```
/// # use rasterq::prelude::*;
/// # use anyhow::Result;
/// fn allocate_and_free() -> Result<()> {
///     let mut allocator = DefaultChunkAllocator::new();
///     let chunk = allocator.allocate(64)?;
///     assert_eq!(allocator.chunk(chunk).unwrap().capacity(), 64);
///     allocator.free(chunk)?;
///     Ok(())
/// }
/// # allocate_and_free().unwrap();
/// ```
#[derive(Debug)]
pub struct DefaultChunkAllocator {
    chunks: Vec<Option<Chunk>>,
    free_slots: Vec<usize>,
    free_ranges: Vec<(PhysicalAddress, u32)>,
    next_address: PhysicalAddress,
    end_address: PhysicalAddress,
}

impl Default for DefaultChunkAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultChunkAllocator {
    /// Create an allocator over the default physical window.
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW_BASE, DEFAULT_WINDOW_SIZE)
    }

    /// Create an allocator handing out addresses in `[base, base + size)`.
    /// # Panics
    /// Panics if the base is not 8-byte aligned or the window crosses the 24-bit address limit.
    pub fn with_window(base: PhysicalAddress, size: u32) -> Self {
        assert!(base % WORD_SIZE == 0, "window base not aligned to 8 bytes: {:#x}", base);
        assert!(
            base.checked_add(size).map_or(false, |end| end <= 0x0100_0000),
            "window {:#x}+{:#x} exceeds 24-bit addressing",
            base,
            size
        );
        Self {
            chunks: vec![],
            free_slots: vec![],
            free_ranges: vec![],
            next_address: base,
            end_address: base + size,
        }
    }

    /// Number of chunks currently allocated.
    pub fn live_chunks(&self) -> usize {
        self.chunks.len() - self.free_slots.len()
    }

    fn reserve_address(&mut self, bytes: u32) -> Option<PhysicalAddress> {
        if let Some(index) = self.free_ranges.iter().position(|&(_, size)| size >= bytes) {
            let (address, size) = self.free_ranges[index];
            if size == bytes {
                self.free_ranges.swap_remove(index);
            } else {
                self.free_ranges[index] = (address + bytes, size - bytes);
            }
            return Some(address);
        }

        let address = align_up(self.next_address, WORD_SIZE);
        let end = address.checked_add(bytes)?;
        if end > self.end_address {
            return None;
        }
        self.next_address = end;
        Some(address)
    }
}

impl ChunkAllocator for DefaultChunkAllocator {
    fn allocate(&mut self, capacity: usize) -> Result<ChunkHandle> {
        assert!(capacity > 0, "requested an empty chunk");
        let bytes = u32::try_from(capacity)
            .ok()
            .and_then(|words| words.checked_mul(WORD_SIZE))
            .ok_or(Error::OutOfChunkMemory(capacity))?;
        let address = self.reserve_address(bytes).ok_or(Error::OutOfChunkMemory(capacity))?;

        let chunk = Chunk::new(address, capacity);
        let index = match self.free_slots.pop() {
            Some(index) => {
                self.chunks[index] = Some(chunk);
                index
            }
            None => {
                self.chunks.push(Some(chunk));
                self.chunks.len() - 1
            }
        };
        Ok(ChunkHandle(index as u32))
    }

    fn free(&mut self, chunk: ChunkHandle) -> Result<()> {
        let freed = self
            .chunks
            .get_mut(chunk.index())
            .and_then(Option::take)
            .ok_or(Error::ChunkNotFound)?;
        self.free_ranges
            .push((freed.address(), freed.capacity() as u32 * WORD_SIZE));
        self.free_slots.push(chunk.index());
        Ok(())
    }

    fn chunk(&self, chunk: ChunkHandle) -> Option<&Chunk> {
        self.chunks.get(chunk.index()).and_then(Option::as_ref)
    }

    fn chunk_mut(&mut self, chunk: ChunkHandle) -> Option<&mut Chunk> {
        self.chunks.get_mut(chunk.index()).and_then(Option::as_mut)
    }
}
