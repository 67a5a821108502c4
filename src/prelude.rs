pub use crate::core::debug::{report_firmware_fault, FirmwareFault};
pub use crate::core::error::Error;
pub use crate::core::queue::{CommandRing, OverlayId, PhysicalAddress, QueueEntry, QueueSlot, SubmissionQueue};
pub use crate::core::settings::{QueueBuilder, QueueSettings};
pub use crate::core::state::StateRecord;

pub use crate::allocator::chunk::{Chunk, ChunkHandle};
pub use crate::allocator::default_allocator::DefaultChunkAllocator;
pub use crate::allocator::traits::*;

pub use crate::block::{Block, BlockRecorder};

pub use crate::command::fixup::{FixupOp, Recording};
pub use crate::command::{opcode, opcode_of, opcode_of_word};

pub use crate::sync::autosync::{AutosyncConfig, Hazard};
pub use crate::sync::completion::{CallbackHandle, CompletionChannel};
pub use crate::sync::fence::Completion;

pub use crate::raster_queue::RasterQueue;
