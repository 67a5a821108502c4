//! Command queue for a fixed-function rasterizer
//!
//! rasterq turns drawing and state calls into the rasterizer's native command words and feeds them to
//! the submission queue the GPU consumes from. It keeps the hardware pipeline hazard-free by inserting
//! sync commands automatically, and it can record commands into replayable blocks instead of sending
//! them right away.
//!
//! To get started, import the prelude
//! ```
//! use rasterq::prelude::*;
//! ```
//!
//! # Example
//!
//! First, define the [`QueueSettings`](crate::QueueSettings) with a [`QueueBuilder`](crate::QueueBuilder).
//! Then create a [`RasterQueue`](crate::RasterQueue) on top of a submission queue. [`CommandRing`](crate::CommandRing)
//! is an in-memory queue, any other implementation of [`SubmissionQueue`](crate::SubmissionQueue) works too.
//! ```
//! use rasterq::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let settings = QueueBuilder::new()
//!     .autosync(AutosyncConfig::PIPE | AutosyncConfig::LOAD)
//!     .build();
//! let mut rq = RasterQueue::new(CommandRing::new(), &settings)?;
//!
//! // Commands outside of a block are queued right away.
//! rq.set_other_modes(0, 0)?;
//! rq.fill_triangle([0; 8])?;
//!
//! // Changing the pipe configuration after drawing inserts a SYNC_PIPE first.
//! rq.set_fill_color(0xFFFF_FFFF)?;
//! let opcodes: Vec<_> = rq.queue().entries().iter().filter_map(QueueEntry::opcode).collect();
//! assert_eq!(
//!     opcodes,
//!     [opcode::SET_OTHER_MODES, opcode::TRI, opcode::SYNC_PIPE, opcode::SET_FILL_COLOR_32]
//! );
//! # Ok(())
//! # }
//! ```
//! For further details, check out the following modules
//! - [`raster_queue`] for the command entry points.
//! - [`block`] for recording blocks.
//! - [`sync`] for autosync and full-sync completions.
//! - [`command`] for opcodes, encoding and fixup descriptors.
//! - [`allocator`] for the memory blocks are recorded into.
//! - [`core`] for settings, errors and the submission queue interface.

#[macro_use]
extern crate derivative;
#[macro_use]
extern crate log;

pub mod prelude;
pub use crate::prelude::*;

pub mod allocator;
pub mod block;
pub mod command;
pub mod core;
pub mod raster_queue;
pub mod sync;
pub mod util;
