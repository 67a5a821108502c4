//! The raster queue is the single entry point for rasterizer commands.
//!
//! Every command goes through [`RasterQueue::emit()`] or one of its fixup-aware variants. Outside of a
//! block, commands are appended to the submission queue and reach the GPU as soon as the consumer gets
//! to them. Between [`RasterQueue::begin()`] and [`RasterQueue::end()`] they are recorded into a
//! [`Block`] instead, which can be replayed later.
//!
//! Before a command is written, the queue inserts whatever sync commands its hazards require. See
//! [`sync::autosync`](crate::sync::autosync) for the rules.
//!
//! # Example
//! ```
//! # use rasterq::prelude::*;
//! # use anyhow::Result;
//! fn record() -> Result<()> {
//!     let settings = QueueBuilder::new().build();
//!     let mut rq = RasterQueue::new(CommandRing::new(), &settings)?;
//!
//!     rq.begin();
//!     rq.write8_sync_use(opcode::FILL_RECTANGLE, 0x0014_0014, 0x0000_0000, Hazard::PIPE)?;
//!     rq.set_fill_color(0xFF00_00FF)?;
//!     let block = rq.end().expect("commands were recorded");
//!
//!     let words = rq.block_words(&block)?;
//!     assert_eq!(opcode_of_word(words[1]), opcode::SYNC_PIPE);
//!     rq.free_block(block)?;
//!     Ok(())
//! }
//! # record().unwrap();
//! ```

use std::sync::Arc;

use anyhow::Result;

use crate::allocator::default_allocator::DefaultChunkAllocator;
use crate::allocator::traits::ChunkAllocator;
use crate::block::{Block, BlockRecorder};
use crate::command::fixup::{self, FixupOp, Recording};
use crate::command::{self, opcode, MAX_COMMAND_ARGS};
use crate::core::queue::{OverlayId, SubmissionQueue};
use crate::core::settings::QueueSettings;
use crate::core::state::StateRecord;
use crate::sync::autosync::{Autosync, AutosyncConfig, Hazard, SyncKind};
use crate::sync::completion::{CallbackHandle, CompletionChannel};
use crate::sync::fence::Completion;
use crate::Error;

/// Producer side of the rasterizer command stream. Owns the block recorder, the hazard state and the
/// overlay registration; there is one per submission queue.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct RasterQueue<Q: SubmissionQueue, A: ChunkAllocator = DefaultChunkAllocator> {
    #[derivative(Debug = "ignore")]
    queue: Q,
    recorder: BlockRecorder<A>,
    autosync: Autosync,
    overlay: OverlayId,
    #[derivative(Debug = "ignore")]
    state: Arc<StateRecord>,
    completion: Arc<CompletionChannel>,
}

impl<Q: SubmissionQueue> RasterQueue<Q, DefaultChunkAllocator> {
    /// Set up a raster queue on top of `queue`, recording blocks with the default chunk allocator.
    /// # Errors
    /// * Fails if the settings are invalid.
    /// * Fails if the overlay id is already taken.
    pub fn new(queue: Q, settings: &QueueSettings) -> Result<Self> {
        Self::with_allocator(queue, DefaultChunkAllocator::new(), settings)
    }
}

impl<Q: SubmissionQueue, A: ChunkAllocator> RasterQueue<Q, A> {
    /// Set up a raster queue on top of `queue`, recording blocks into chunks from `allocator`.
    /// # Errors
    /// * Fails if the settings are invalid.
    /// * Fails if the overlay id is already taken.
    pub fn with_allocator(mut queue: Q, allocator: A, settings: &QueueSettings) -> Result<Self> {
        settings.validate()?;

        let overlay = settings.overlay;
        let state = Arc::new(StateRecord::new());
        queue.register_overlay(overlay, state.clone())?;
        let address = match queue.state_address(overlay) {
            Some(address) => address,
            None => {
                queue.unregister_overlay(overlay);
                anyhow::bail!(Error::OverlayNotRegistered(overlay));
            }
        };
        state.initialize(address, overlay);

        let completion = Arc::new(CompletionChannel::new(state.clone()));
        completion.set_enabled(true);

        info!("Raster queue registered as overlay {:#x}, state record at {:#x}", overlay.id(), address);

        Ok(Self {
            queue,
            recorder: BlockRecorder::new(allocator, settings),
            autosync: Autosync::new(settings.autosync),
            overlay,
            state,
            completion,
        })
    }

    /// Emit a command. Syncs required by `changes` are inserted first, then `uses` is marked, then the
    /// command is written to the queue, or to the current block while recording.
    /// # Errors
    /// * Fails if a block is being recorded and it cannot grow.
    /// # Panics
    /// Panics if `args` is empty, or if it has an odd length while recording.
    pub fn emit(&mut self, opcode: u8, args: &[u32], uses: Hazard, changes: Hazard) -> Result<()> {
        self.autosync_change(changes)?;
        self.autosync.mark_use(uses);
        self.write(opcode, args)
    }

    /// Emit a one-word command.
    /// # Errors
    /// * Fails if a block is being recorded and it cannot grow.
    pub fn write8(&mut self, opcode: u8, arg0: u32, arg1: u32) -> Result<()> {
        self.write(opcode, &[arg0, arg1])
    }

    /// Emit a two-word command.
    /// # Errors
    /// * Fails if a block is being recorded and it cannot grow.
    pub fn write16(&mut self, opcode: u8, arg0: u32, arg1: u32, arg2: u32, arg3: u32) -> Result<()> {
        self.write(opcode, &[arg0, arg1, arg2, arg3])
    }

    /// Emit a one-word command that depends on the state in `uses`.
    /// # Errors
    /// * Fails if a block is being recorded and it cannot grow.
    pub fn write8_sync_use(&mut self, opcode: u8, arg0: u32, arg1: u32, uses: Hazard) -> Result<()> {
        self.emit(opcode, &[arg0, arg1], uses, Hazard::empty())
    }

    /// Emit a one-word command that changes the state in `changes`.
    /// # Errors
    /// * Fails if a block is being recorded and it cannot grow.
    pub fn write8_sync_change(&mut self, opcode: u8, arg0: u32, arg1: u32, changes: Hazard) -> Result<()> {
        self.emit(opcode, &[arg0, arg1], Hazard::empty(), changes)
    }

    /// Emit a two-word command that depends on the state in `uses`.
    /// # Errors
    /// * Fails if a block is being recorded and it cannot grow.
    pub fn write16_sync_use(&mut self, opcode: u8, args: [u32; 4], uses: Hazard) -> Result<()> {
        self.emit(opcode, &args, uses, Hazard::empty())
    }

    /// Emit a two-word command that changes the state in `changes`.
    /// # Errors
    /// * Fails if a block is being recorded and it cannot grow.
    pub fn write16_sync_change(&mut self, opcode: u8, args: [u32; 4], changes: Hazard) -> Result<()> {
        self.emit(opcode, &args, Hazard::empty(), changes)
    }

    /// Append a command to the submission queue, even while a block is being recorded.
    pub fn dynamic_write(&mut self, opcode: u8, args: &[u32]) {
        let mut buffer = [0u32; MAX_COMMAND_ARGS];
        let words = command::encode(self.overlay, opcode, args, &mut buffer);
        self.queue.write(words);
    }

    /// [`Self::dynamic_write()`] for a one-word command.
    pub fn dynamic_write8(&mut self, opcode: u8, arg0: u32, arg1: u32) {
        self.dynamic_write(opcode, &[arg0, arg1]);
    }

    /// Emit a command whose encoding depends on state known only when it executes. Outside of a block,
    /// the dynamic form is queued. While recording, the fix form is queued and the block is laid out as
    /// described by the op's [`Recording`].
    /// # Errors
    /// * Fails if a block is being recorded and it cannot grow.
    pub fn fixup_write(&mut self, op: &FixupOp, args: &[u32], uses: Hazard, changes: Hazard) -> Result<()> {
        self.autosync_change(changes)?;
        self.autosync.mark_use(uses);

        if !self.recorder.is_active() {
            self.dynamic_write(op.dynamic, args);
            return Ok(());
        }

        self.recorder.ensure_block(&mut self.queue)?;
        trace!("Recording fixup {}", op.name);
        match op.recording {
            Recording::Deferred { placeholder } => {
                self.dynamic_write(op.fix, args);
                self.recorder.skip(&mut self.queue, placeholder);
                Ok(())
            }
            Recording::StaticThenFix { placeholder } => {
                self.static_write(op.dynamic, args)?;
                self.dynamic_write(op.fix, args);
                self.recorder.skip(&mut self.queue, placeholder);
                Ok(())
            }
            Recording::FixThenStatic => {
                self.dynamic_write(op.fix, args);
                self.static_write(op.dynamic, args)
            }
        }
    }

    /// [`Self::fixup_write()`] for a one-word command without hazards.
    /// # Errors
    /// * Fails if a block is being recorded and it cannot grow.
    pub fn fixup_write8(&mut self, op: &FixupOp, arg0: u32, arg1: u32) -> Result<()> {
        self.fixup_write(op, &[arg0, arg1], Hazard::empty(), Hazard::empty())
    }

    /// Start recording a block. The first chunk is allocated by the first command written.
    /// # Panics
    /// Panics if a block is already being recorded.
    pub fn begin(&mut self) {
        self.recorder.begin();
    }

    /// Stop recording. Returns the block, or `None` if no command was recorded.
    /// # Panics
    /// Panics if no block is being recorded.
    pub fn end(&mut self) -> Option<Block> {
        self.recorder.end()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_active()
    }

    /// Free a finished block and all of its chunks.
    /// # Errors
    /// * Fails if a chunk of the block is no longer allocated.
    pub fn free_block(&mut self, block: Block) -> Result<()> {
        self.recorder.free(block)
    }

    /// Copy out every word of a finished block, in replay order.
    /// # Errors
    /// * Fails if a chunk of the block is no longer allocated.
    pub fn block_words(&self, block: &Block) -> Result<Vec<u64>> {
        block.words(self.recorder.allocator())
    }

    pub fn recorder(&self) -> &BlockRecorder<A> {
        &self.recorder
    }

    /// Drain commands using the pipe configuration.
    /// # Errors
    /// * Fails if a block is being recorded and it cannot grow.
    pub fn sync_pipe(&mut self) -> Result<()> {
        self.sync(SyncKind::Pipe)
    }

    /// Drain commands using tile descriptors.
    /// # Errors
    /// * Fails if a block is being recorded and it cannot grow.
    pub fn sync_tile(&mut self) -> Result<()> {
        self.sync(SyncKind::Tile)
    }

    /// Drain commands using texture memory.
    /// # Errors
    /// * Fails if a block is being recorded and it cannot grow.
    pub fn sync_load(&mut self) -> Result<()> {
        self.sync(SyncKind::Load)
    }

    /// Drain the whole pipeline. Once the rasterizer is idle, the callback registered under `callback`
    /// runs with `argument`. Afterwards no sync is needed for any category.
    ///
    /// Inside a block, the callback fires on every replay. One-shot callbacks only fire on the first.
    /// # Errors
    /// * Fails if a block is being recorded and it cannot grow.
    pub fn sync_full(&mut self, callback: Option<CallbackHandle>, argument: u32) -> Result<()> {
        let id = callback.map_or(0, |handle| handle.id());
        self.fixup_write(&fixup::SYNC_FULL, &[id, argument], Hazard::empty(), Hazard::empty())?;
        self.autosync.reset();
        Ok(())
    }

    /// Issue a full sync and return a future that resolves to `argument` once it completed.
    /// # Errors
    /// * Fails if the callback table is full.
    /// * Fails if a block is being recorded and it cannot grow.
    pub fn sync_full_notify(&mut self, argument: u32) -> Result<Completion> {
        let (handle, completion) = self.completion.register_completion()?;
        if let Err(err) = self.sync_full(Some(handle), argument) {
            self.completion.unregister(handle)?;
            return Err(err);
        }
        Ok(completion)
    }

    /// Issue a full sync without callback and make the submission queue wait until the rasterizer is idle.
    /// # Errors
    /// * Fails if a block is being recorded and it cannot grow.
    pub fn fence(&mut self) -> Result<()> {
        self.sync_full(None, 0)?;
        self.queue.wait_idle();
        Ok(())
    }

    /// Register a callback that full syncs can refer to.
    /// # Errors
    /// * Fails if the callback table is full.
    pub fn register_callback(&self, callback: impl Fn(u32) + Send + Sync + 'static) -> Result<CallbackHandle> {
        self.completion.register(callback)
    }

    /// Current autosync configuration.
    pub fn config(&self) -> AutosyncConfig {
        self.autosync.config()
    }

    pub fn set_config(&mut self, config: AutosyncConfig) {
        self.autosync.set_config(config);
    }

    /// Enable the categories in `on`, then disable those in `off`. Returns the previous configuration.
    pub fn change_config(&mut self, on: AutosyncConfig, off: AutosyncConfig) -> AutosyncConfig {
        let old = self.autosync.config();
        self.autosync.set_config((old | on) - off);
        old
    }

    /// Categories used since their last sync.
    pub fn hazards(&self) -> Hazard {
        self.autosync.used()
    }

    /// Set the scissor rectangle. Needs no pipe sync.
    /// # Errors
    /// * Fails if a block is being recorded and it cannot grow.
    pub fn set_scissor(&mut self, w0: u32, w1: u32) -> Result<()> {
        self.fixup_write8(&fixup::SET_SCISSOR, w0, w1)
    }

    /// Set the fill color as 32-bit RGBA. The microcode converts it to the target bit depth.
    /// # Errors
    /// * Fails if a block is being recorded and it cannot grow.
    pub fn set_fill_color(&mut self, color: u32) -> Result<()> {
        self.fixup_write(&fixup::SET_FILL_COLOR, &[0, color], Hazard::empty(), Hazard::PIPE)
    }

    /// # Errors
    /// * Fails if a block is being recorded and it cannot grow.
    pub fn set_texture_image(&mut self, w0: u32, w1: u32) -> Result<()> {
        self.fixup_write(&fixup::SET_TEXTURE_IMAGE, &[w0, w1], Hazard::empty(), Hazard::PIPE)
    }

    /// # Errors
    /// * Fails if a block is being recorded and it cannot grow.
    pub fn set_z_image(&mut self, w0: u32, w1: u32) -> Result<()> {
        self.fixup_write(&fixup::SET_Z_IMAGE, &[w0, w1], Hazard::empty(), Hazard::PIPE)
    }

    /// # Errors
    /// * Fails if a block is being recorded and it cannot grow.
    pub fn set_color_image(&mut self, w0: u32, w1: u32) -> Result<()> {
        self.fixup_write(&fixup::SET_COLOR_IMAGE, &[w0, w1], Hazard::empty(), Hazard::PIPE)
    }

    /// # Errors
    /// * Fails if a block is being recorded and it cannot grow.
    pub fn set_other_modes(&mut self, w0: u32, w1: u32) -> Result<()> {
        self.fixup_write(&fixup::SET_OTHER_MODES, &[w0, w1], Hazard::empty(), Hazard::PIPE)
    }

    /// Change the bits of one other-modes word selected by `mask` to `value`. `w0` selects the word.
    /// # Errors
    /// * Fails if a block is being recorded and it cannot grow.
    pub fn modify_other_modes(&mut self, w0: u32, mask: u32, value: u32) -> Result<()> {
        self.fixup_write(&fixup::MODIFY_OTHER_MODES, &[w0, mask, value], Hazard::empty(), Hazard::PIPE)
    }

    /// # Errors
    /// * Fails if a block is being recorded and it cannot grow.
    pub fn texture_rectangle(&mut self, args: [u32; 4]) -> Result<()> {
        self.fixup_write(&fixup::TEXTURE_RECTANGLE, &args, Hazard::PIPE, Hazard::empty())
    }

    /// Draw a flat triangle from its pre-computed edge coefficients.
    /// # Errors
    /// * Fails if a block is being recorded and it cannot grow.
    pub fn fill_triangle(&mut self, edges: [u32; 8]) -> Result<()> {
        self.emit(opcode::TRI, &edges, Hazard::PIPE, Hazard::empty())
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut Q {
        &mut self.queue
    }

    /// The state record shared with the GPU side.
    pub fn state(&self) -> &Arc<StateRecord> {
        &self.state
    }

    /// The channel full-sync signals are delivered to. Clone the `Arc` to service the interrupt elsewhere.
    pub fn completion(&self) -> &Arc<CompletionChannel> {
        &self.completion
    }

    pub fn overlay(&self) -> OverlayId {
        self.overlay
    }

    fn write(&mut self, opcode: u8, args: &[u32]) -> Result<()> {
        if self.recorder.is_active() {
            self.recorder.ensure_block(&mut self.queue)?;
            self.static_write(opcode, args)
        } else {
            self.dynamic_write(opcode, args);
            Ok(())
        }
    }

    fn static_write(&mut self, opcode: u8, args: &[u32]) -> Result<()> {
        let mut buffer = [0u32; MAX_COMMAND_ARGS];
        let words = command::encode(self.overlay, opcode, args, &mut buffer);
        self.recorder.write(&mut self.queue, command::pack(words))
    }

    fn sync(&mut self, kind: SyncKind) -> Result<()> {
        self.write8(kind.opcode(), 0, 0)?;
        self.autosync.synced(kind);
        Ok(())
    }

    fn autosync_change(&mut self, changes: Hazard) -> Result<()> {
        for kind in self.autosync.required_syncs(changes) {
            self.sync(kind)?;
        }
        Ok(())
    }
}

impl<Q: SubmissionQueue, A: ChunkAllocator> Drop for RasterQueue<Q, A> {
    fn drop(&mut self) {
        if self.recorder.is_active() {
            warn!("Raster queue closed while a block was being recorded");
        }
        self.completion.set_enabled(false);
        self.queue.unregister_overlay(self.overlay);
        info!("Raster queue for overlay {:#x} closed", self.overlay.id());
    }
}
