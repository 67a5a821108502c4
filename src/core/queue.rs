//! The submission queue the rasterizer consumes commands from.
//!
//! The real ring buffer and its consumer live outside this crate. Everything rasterq needs from them
//! is captured by the [`SubmissionQueue`] trait. [`CommandRing`] is a plain in-memory implementation
//! that keeps every entry around, which is what hosts without the real ring (and the tests) use.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;

use crate::core::state::StateRecord;
use crate::Error;

/// Physical address as seen by the GPU. Only the low 24 bits are meaningful in range commands.
pub type PhysicalAddress = u32;

/// Identifies the id space a set of commands is registered under in the submission queue.
/// The id occupies the top nibble of the first word of every queued command.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct OverlayId(u8);

impl OverlayId {
    /// The overlay id rasterizer commands are registered under by default.
    pub const RASTERIZER: OverlayId = OverlayId(0xC);

    /// Create an overlay id. The 6-bit opcode field reaches into the low two bits of the nibble, so
    /// only multiples of four are accepted. Returns `None` for any other id.
    pub fn new(id: u8) -> Option<Self> {
        (id <= 0xF && id & 0x3 == 0).then_some(Self(id))
    }

    /// The raw nibble.
    pub fn id(&self) -> u8 {
        self.0
    }

    /// The overlay id shifted into place in the first command word.
    pub fn base(&self) -> u32 {
        (self.0 as u32) << 28
    }
}

/// Position of an entry inside the submission queue.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueueSlot(pub usize);

/// Everything the producer side of the ring buffer must support.
pub trait SubmissionQueue {
    /// Register an overlay id and the state record its commands operate on.
    /// # Errors
    /// * Fails if the overlay id is already registered.
    fn register_overlay(&mut self, overlay: OverlayId, state: Arc<StateRecord>) -> Result<()>;
    /// Remove a previously registered overlay.
    fn unregister_overlay(&mut self, overlay: OverlayId);
    /// Physical address of the state record registered for an overlay.
    fn state_address(&self, overlay: OverlayId) -> Option<PhysicalAddress>;
    /// Append a command, given as 32-bit words. The first word already carries overlay id and opcode.
    fn write(&mut self, words: &[u32]);
    /// Append a command that makes the GPU execute the pre-built commands in `[start, end)`.
    fn write_range(&mut self, start: PhysicalAddress, end: PhysicalAddress) -> QueueSlot;
    /// Rewrite the end address of a range entry that was previously appended.
    fn patch_range(&mut self, slot: QueueSlot, end: PhysicalAddress);
    /// The slot the next entry will be written to.
    fn position(&self) -> QueueSlot;
    /// Called when a block starts recording, with the address of its first chunk.
    fn begin_static_block(&mut self, start: PhysicalAddress);
    /// Append a command that stalls the queue until the GPU is idle.
    fn wait_idle(&mut self);
}

/// A single entry of a [`CommandRing`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEntry {
    /// An overlay command with its payload.
    Command(Vec<u32>),
    /// Execute the static commands in `[start, end)`.
    Range {
        start: PhysicalAddress,
        end: PhysicalAddress,
    },
    /// Wait until the GPU is idle.
    WaitIdle,
}

impl QueueEntry {
    /// The opcode of an overlay command, if this is one.
    pub fn opcode(&self) -> Option<u8> {
        match self {
            QueueEntry::Command(words) => words.first().map(|word| crate::command::opcode_of(*word)),
            _ => None,
        }
    }
}

/// Address the first overlay state record is placed at. Each further overlay gets its own page.
const STATE_BASE_ADDRESS: PhysicalAddress = 0x0000_1000;
const STATE_PAGE_SIZE: PhysicalAddress = 0x100;

/// In-memory submission queue. Entries are kept in order and never consumed.
#[derive(Derivative, Default)]
#[derivative(Debug)]
pub struct CommandRing {
    entries: Vec<QueueEntry>,
    #[derivative(Debug = "ignore")]
    overlays: HashMap<OverlayId, Arc<StateRecord>>,
    static_block: Option<PhysicalAddress>,
}

impl CommandRing {
    /// Create an empty ring.
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries written so far, oldest first.
    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    /// Take all entries written so far, leaving the ring empty.
    pub fn take_entries(&mut self) -> Vec<QueueEntry> {
        std::mem::take(&mut self.entries)
    }

    /// Address of the first chunk of the block that started recording most recently.
    pub fn static_block(&self) -> Option<PhysicalAddress> {
        self.static_block
    }

    /// The state record registered for an overlay.
    pub fn overlay_state(&self, overlay: OverlayId) -> Option<Arc<StateRecord>> {
        self.overlays.get(&overlay).cloned()
    }
}

impl SubmissionQueue for CommandRing {
    fn register_overlay(&mut self, overlay: OverlayId, state: Arc<StateRecord>) -> Result<()> {
        if self.overlays.contains_key(&overlay) {
            anyhow::bail!(Error::OverlayInUse(overlay));
        }
        self.overlays.insert(overlay, state);
        Ok(())
    }

    fn unregister_overlay(&mut self, overlay: OverlayId) {
        self.overlays.remove(&overlay);
    }

    fn state_address(&self, overlay: OverlayId) -> Option<PhysicalAddress> {
        self.overlays
            .contains_key(&overlay)
            .then(|| STATE_BASE_ADDRESS + overlay.id() as PhysicalAddress * STATE_PAGE_SIZE)
    }

    fn write(&mut self, words: &[u32]) {
        self.entries.push(QueueEntry::Command(words.to_vec()));
    }

    fn write_range(&mut self, start: PhysicalAddress, end: PhysicalAddress) -> QueueSlot {
        let slot = self.position();
        self.entries.push(QueueEntry::Range { start, end });
        slot
    }

    fn patch_range(&mut self, slot: QueueSlot, end: PhysicalAddress) {
        match self.entries.get_mut(slot.0) {
            Some(QueueEntry::Range { end: old_end, .. }) => *old_end = end,
            other => panic!("slot {:?} does not hold a range entry: {:?}", slot, other),
        }
    }

    fn position(&self) -> QueueSlot {
        QueueSlot(self.entries.len())
    }

    fn begin_static_block(&mut self, start: PhysicalAddress) {
        self.static_block = Some(start);
    }

    fn wait_idle(&mut self) {
        self.entries.push(QueueEntry::WaitIdle);
    }
}
