#![allow(dead_code)]

use anyhow::Result;

use rasterq::prelude::*;

pub type Context = RasterQueue<CommandRing>;

/// Initialize logging once per test binary.
pub fn init_logging() {
    let _ = pretty_env_logger::try_init();
}

/// Creates a raster queue on an in-memory ring with default settings
pub fn make_context() -> Result<Context> {
    make_context_with_settings(|builder| builder)
}

/// Creates a raster queue on an in-memory ring, letting the caller adjust the settings
pub fn make_context_with_settings<F: FnOnce(QueueBuilder) -> QueueBuilder>(callback: F) -> Result<Context> {
    init_logging();
    let settings = callback(QueueBuilder::new()).build();
    RasterQueue::new(CommandRing::new(), &settings)
}

/// Opcodes of all overlay commands in the ring, in order. Range and wait entries are skipped.
pub fn queued_opcodes(rq: &Context) -> Vec<u8> {
    rq.queue().entries().iter().filter_map(QueueEntry::opcode).collect()
}

/// All range entries in the ring, in order.
pub fn queued_ranges(rq: &Context) -> Vec<(PhysicalAddress, PhysicalAddress)> {
    rq.queue()
        .entries()
        .iter()
        .filter_map(|entry| match entry {
            QueueEntry::Range { start, end } => Some((*start, *end)),
            _ => None,
        })
        .collect()
}

/// Opcodes of the commands recorded in a block. Placeholder words are skipped.
pub fn block_opcodes(rq: &Context, block: &Block) -> Result<Vec<u8>> {
    Ok(rq
        .block_words(block)?
        .into_iter()
        .filter(|word| *word != 0)
        .map(opcode_of_word)
        .collect())
}

/// The most recent full-sync command in the ring, either form, as the 64-bit word the microcode stores.
pub fn last_sync_full(rq: &Context) -> Option<u64> {
    rq.queue().entries().iter().rev().find_map(|entry| match entry {
        QueueEntry::Command(words)
            if matches!(opcode_of(words[0]), opcode::SYNC_FULL | opcode::SYNC_FULL_FIX) =>
        {
            Some(((words[0] as u64) << 32) | words[1] as u64)
        }
        _ => None,
    })
}

/// Plays the GPU side of a full sync: store the command in the state record, raise the signal and
/// service it. Returns whether the handler ran.
pub fn complete_sync_full(rq: &Context, command: u64) -> bool {
    rq.state().latch_sync_full(command);
    rq.completion().raise();
    rq.completion().service_interrupt()
}
