//! The allocator module provides the memory recorded blocks are built in.
//! <br>
//! <br>
//! # Allocator traits
//! [`traits::ChunkAllocator`] can be implemented to place blocks in a custom memory region.
//! # Default allocator
//! [`default_allocator::DefaultChunkAllocator`] keeps chunks in an arena and hands out physical
//! addresses from a fixed window. Most types that take a generic allocator parameter default to it.
//! # Chunks
//! A block is a chain of [`chunk::Chunk`]s. The block recorder starts with a small chunk and doubles
//! the capacity of every further one, up to a maximum.

pub mod chunk;
pub mod default_allocator;
pub mod traits;
