//! A single contiguous allocation backing part of a recorded block.

use crate::core::queue::PhysicalAddress;

/// Size of one command word in bytes.
pub const WORD_SIZE: u32 = 8;

/// Handle to a chunk owned by a [`ChunkAllocator`](crate::allocator::traits::ChunkAllocator).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ChunkHandle(pub(crate) u32);

impl ChunkHandle {
    /// Raw index of the chunk inside its allocator.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Owned memory for a run of command words, with a physical address the GPU can read it from.
/// Chunks of one block are chained through [`Chunk::next()`].
#[derive(Debug)]
pub struct Chunk {
    address: PhysicalAddress,
    words: Box<[u64]>,
    len: usize,
    next: Option<ChunkHandle>,
}

impl Chunk {
    /// Create a zeroed chunk of `capacity` words placed at `address`.
    pub fn new(address: PhysicalAddress, capacity: usize) -> Self {
        Self {
            address,
            words: vec![0; capacity].into_boxed_slice(),
            len: 0,
            next: None,
        }
    }

    /// Physical address of the first word.
    pub fn address(&self) -> PhysicalAddress {
        self.address
    }

    /// Physical address of the word at `offset`.
    pub fn address_of(&self, offset: usize) -> PhysicalAddress {
        self.address + offset as PhysicalAddress * WORD_SIZE
    }

    /// Capacity in command words.
    pub fn capacity(&self) -> usize {
        self.words.len()
    }

    /// Number of words recorded into this chunk, placeholders included.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The recorded words.
    pub fn words(&self) -> &[u64] {
        &self.words[..self.len]
    }

    /// The successor of this chunk in its block.
    pub fn next(&self) -> Option<ChunkHandle> {
        self.next
    }

    pub(crate) fn set_next(&mut self, next: Option<ChunkHandle>) {
        self.next = next;
    }

    pub(crate) fn set_len(&mut self, len: usize) {
        assert!(len <= self.capacity(), "chunk length {} exceeds capacity {}", len, self.capacity());
        self.len = len;
    }

    pub(crate) fn storage_mut(&mut self) -> &mut [u64] {
        &mut self.words
    }
}
