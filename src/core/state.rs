//! The state record shared with the GPU side.
//!
//! The record lives in memory both the producer and the co-processor microcode can reach. The producer
//! seeds it once at startup; afterwards the microcode owns the cached mode words and, most importantly,
//! stores a copy of every full-sync command it forwards to the rasterizer. The interrupt handler reads
//! that copy back to find the completion callback.
//!
//! All fields are atomics so the record can be shared through an [`Arc`](std::sync::Arc) with whatever
//! plays the GPU side, without any lock.

use std::mem::offset_of;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};

use static_assertions::{assert_impl_all, const_assert_eq};

use crate::command::opcode;
use crate::core::queue::{OverlayId, PhysicalAddress};

/// Number of entries in the address lookup table.
pub const ADDRESS_TABLE_SIZE: usize = 16;

/// Hardware-visible state record. The layout is fixed, the microcode addresses fields by offset.
#[derive(Debug, Default)]
#[repr(C)]
pub struct StateRecord {
    sync_full: AtomicU64,
    address_table: [AtomicU32; ADDRESS_TABLE_SIZE],
    other_modes: AtomicU64,
    scissor_rect: AtomicU64,
    fill_color: AtomicU32,
    rdram_state_address: AtomicU32,
    target_bitdepth: AtomicU8,
}

const_assert_eq!(offset_of!(StateRecord, sync_full), 0);
const_assert_eq!(offset_of!(StateRecord, address_table), 8);
const_assert_eq!(offset_of!(StateRecord, other_modes), 72);
const_assert_eq!(offset_of!(StateRecord, scissor_rect), 80);
const_assert_eq!(offset_of!(StateRecord, fill_color), 88);
const_assert_eq!(offset_of!(StateRecord, rdram_state_address), 92);
const_assert_eq!(offset_of!(StateRecord, target_bitdepth), 96);
const_assert_eq!(std::mem::size_of::<StateRecord>(), 104);
assert_impl_all!(StateRecord: Send, Sync);

/// Other-modes word the record starts out with.
pub fn default_other_modes(overlay: OverlayId) -> u64 {
    ((overlay.base() as u64) << 32) + ((opcode::SET_OTHER_MODES as u64) << 56)
}

/// Scissor word the record starts out with.
/// Bit 12 keeps the right edge from underflowing when the cycle mode subtracts a subpixel
/// before any scissor was set.
pub fn default_scissor_rect(overlay: OverlayId) -> u64 {
    (((overlay.base() as u64) << 32) + ((opcode::SET_SCISSOR_EX_FIX as u64) << 56)) | (1 << 12)
}

impl StateRecord {
    /// Create a zeroed record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero the record, then seed the fields the producer owns.
    pub fn initialize(&self, address: PhysicalAddress, overlay: OverlayId) {
        self.sync_full.store(0, Ordering::Relaxed);
        for entry in &self.address_table {
            entry.store(0, Ordering::Relaxed);
        }
        self.fill_color.store(0, Ordering::Relaxed);
        self.target_bitdepth.store(0, Ordering::Relaxed);

        self.rdram_state_address.store(address, Ordering::Relaxed);
        self.other_modes.store(default_other_modes(overlay), Ordering::Relaxed);
        self.scissor_rect.store(default_scissor_rect(overlay), Ordering::Release);
    }

    /// The last full-sync command forwarded to the rasterizer.
    pub fn sync_full(&self) -> u64 {
        self.sync_full.load(Ordering::Acquire)
    }

    /// Store a copy of a full-sync command. This is the GPU side's job, right before the command
    /// reaches the rasterizer.
    pub fn latch_sync_full(&self, command: u64) {
        self.sync_full.store(command, Ordering::Release);
    }

    /// Physical address of this record.
    pub fn address(&self) -> PhysicalAddress {
        self.rdram_state_address.load(Ordering::Acquire)
    }

    /// Cached other-modes command word.
    pub fn other_modes(&self) -> u64 {
        self.other_modes.load(Ordering::Acquire)
    }

    /// Update the cached other-modes word (GPU side).
    pub fn store_other_modes(&self, word: u64) {
        self.other_modes.store(word, Ordering::Release);
    }

    /// Cached scissor command word.
    pub fn scissor_rect(&self) -> u64 {
        self.scissor_rect.load(Ordering::Acquire)
    }

    /// Update the cached scissor word (GPU side).
    pub fn store_scissor_rect(&self, word: u64) {
        self.scissor_rect.store(word, Ordering::Release);
    }

    pub fn fill_color(&self) -> u32 {
        self.fill_color.load(Ordering::Acquire)
    }

    pub fn store_fill_color(&self, color: u32) {
        self.fill_color.store(color, Ordering::Release);
    }

    pub fn target_bitdepth(&self) -> u8 {
        self.target_bitdepth.load(Ordering::Acquire)
    }

    pub fn store_target_bitdepth(&self, bitdepth: u8) {
        self.target_bitdepth.store(bitdepth, Ordering::Release);
    }

    /// Entry of the address lookup table.
    /// # Panics
    /// Panics if the index is out of range.
    pub fn lookup_address(&self, index: usize) -> PhysicalAddress {
        self.address_table[index].load(Ordering::Acquire)
    }

    /// Set an entry of the address lookup table.
    /// # Panics
    /// Panics if the index is out of range.
    pub fn store_lookup_address(&self, index: usize, address: PhysicalAddress) {
        self.address_table[index].store(address, Ordering::Release);
    }
}
