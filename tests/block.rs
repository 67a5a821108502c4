use anyhow::Result;

use rasterq::prelude::*;

mod framework;

fn capacities(rq: &framework::Context, block: &Block) -> Result<Vec<usize>> {
    let allocator = rq.recorder().allocator();
    block
        .chunks(allocator)
        .map(|handle| Ok(allocator.chunk(handle?).unwrap().capacity()))
        .collect()
}

#[test]
pub fn immediate_commands_go_to_the_queue() -> Result<()> {
    let mut rq = framework::make_context()?;
    rq.write8(opcode::SET_PRIM_COLOR, 0x12, 0xFF00_FF00)?;
    rq.write16(opcode::TEXTURE_RECTANGLE, 1, 2, 3, 4)?;
    assert_eq!(
        rq.queue().entries(),
        [
            QueueEntry::Command(vec![0xFA00_0012, 0xFF00_FF00]),
            QueueEntry::Command(vec![0xE400_0001, 2, 3, 4]),
        ]
    );
    assert_eq!(rq.recorder().allocator().live_chunks(), 0);
    Ok(())
}

#[test]
pub fn empty_block_allocates_nothing() -> Result<()> {
    let mut rq = framework::make_context()?;
    rq.begin();
    assert!(rq.is_recording());
    assert!(rq.end().is_none());
    assert!(!rq.is_recording());
    assert!(rq.queue().entries().is_empty());
    assert_eq!(rq.recorder().allocator().live_chunks(), 0);
    Ok(())
}

#[test]
pub fn recorded_words_carry_overlay_and_opcode() -> Result<()> {
    let mut rq = framework::make_context()?;
    rq.begin();
    rq.write8(opcode::SET_PRIM_COLOR, 0x12, 0xFF00_FF00)?;
    rq.write16(opcode::TEXTURE_RECTANGLE, 1, 2, 3, 4)?;
    let block = rq.end().unwrap();
    assert_eq!(
        rq.block_words(&block)?,
        [0xFA00_0012_FF00_FF00, 0xE400_0001_0000_0002, 0x0000_0003_0000_0004]
    );
    rq.free_block(block)?;
    Ok(())
}

#[test]
pub fn first_write_starts_the_block() -> Result<()> {
    let mut rq = framework::make_context()?;
    rq.begin();
    assert_eq!(rq.queue().static_block(), None);
    rq.write8(opcode::SET_PRIM_COLOR, 0, 0)?;
    let block = rq.end().unwrap();
    let address = rq.recorder().allocator().chunk(block.first_chunk()).unwrap().address();
    assert_eq!(rq.queue().static_block(), Some(address));
    rq.free_block(block)?;
    Ok(())
}

#[test]
pub fn small_blocks_use_one_chunk() -> Result<()> {
    let mut rq = framework::make_context()?;
    rq.begin();
    // The first chunk holds 64 words, 44 of which are reserved as tail margin.
    for i in 0..20 {
        rq.write8(opcode::SET_PRIM_COLOR, 0, i)?;
    }
    assert_eq!(rq.recorder().cursor(), Some((20, 20)));
    let block = rq.end().unwrap();
    assert_eq!(block.chunk_count(), 1);
    assert_eq!(rq.recorder().allocator().live_chunks(), 1);
    assert_eq!(rq.block_words(&block)?.len(), 20);
    rq.free_block(block)?;
    Ok(())
}

#[test]
pub fn contiguous_writes_collapse_into_one_range() -> Result<()> {
    let mut rq = framework::make_context()?;
    rq.begin();
    for i in 0..10 {
        rq.write8(opcode::SET_PRIM_COLOR, 0, i)?;
    }
    let block = rq.end().unwrap();
    let start = rq.recorder().allocator().chunk(block.first_chunk()).unwrap().address();
    assert_eq!(rq.queue().entries(), [QueueEntry::Range { start, end: start + 10 * 8 }]);
    rq.free_block(block)?;
    Ok(())
}

#[test]
pub fn seventy_writes_grow_once() -> Result<()> {
    let mut rq = framework::make_context_with_settings(|builder| {
        builder.min_chunk_words(64).max_command_words(44)
    })?;
    rq.begin();
    for i in 0..70 {
        rq.write8(opcode::SET_PRIM_COLOR, 0, i)?;
    }
    assert_eq!(rq.recorder().current_capacity(), Some(128));
    let block = rq.end().unwrap();
    assert_eq!(block.chunk_count(), 2);
    assert_eq!(capacities(&rq, &block)?, [64, 128]);

    let words = rq.block_words(&block)?;
    assert_eq!(words.len(), 70);
    assert!(words.iter().enumerate().all(|(i, word)| *word as u32 == i as u32));

    // Ranges are not extended across chunks, and each chunk starts with its own entry.
    let chunks = block
        .chunks(rq.recorder().allocator())
        .map(|handle| rq.recorder().allocator().chunk(handle.unwrap()).unwrap().address())
        .collect::<Vec<_>>();
    assert_eq!(
        framework::queued_ranges(&rq),
        [(chunks[0], chunks[0] + 21 * 8), (chunks[1], chunks[1] + 49 * 8)]
    );
    rq.free_block(block)?;
    Ok(())
}

#[test]
pub fn capacity_doubles_up_to_the_maximum() -> Result<()> {
    let mut rq = framework::make_context_with_settings(|builder| {
        builder.min_chunk_words(64).max_chunk_words(256).max_command_words(44)
    })?;
    rq.begin();
    for i in 0..600 {
        rq.write8(opcode::SET_PRIM_COLOR, 0, i)?;
    }
    let block = rq.end().unwrap();
    assert_eq!(capacities(&rq, &block)?, [64, 128, 256, 256, 256]);
    assert_eq!(rq.block_words(&block)?.len(), 600);
    rq.free_block(block)?;
    Ok(())
}

#[test]
pub fn free_releases_every_chunk() -> Result<()> {
    let mut rq = framework::make_context()?;
    rq.begin();
    for i in 0..200 {
        rq.write16(opcode::TEXTURE_RECTANGLE, 0, i, 0, 0)?;
    }
    let block = rq.end().unwrap();
    assert!(block.chunk_count() > 1);
    assert_eq!(rq.recorder().allocator().live_chunks(), block.chunk_count());
    rq.free_block(block)?;
    assert_eq!(rq.recorder().allocator().live_chunks(), 0);
    Ok(())
}

#[test]
pub fn blocks_can_be_recorded_back_to_back() -> Result<()> {
    let mut rq = framework::make_context()?;
    rq.begin();
    rq.write8(opcode::SET_PRIM_COLOR, 0, 1)?;
    let first = rq.end().unwrap();

    rq.write8(opcode::SET_PRIM_COLOR, 0, 2)?;

    rq.begin();
    rq.write8(opcode::SET_PRIM_COLOR, 0, 3)?;
    let second = rq.end().unwrap();

    assert_ne!(first.first_chunk(), second.first_chunk());
    assert_eq!(rq.block_words(&first)?.len(), 1);
    assert_eq!(rq.block_words(&second)?.len(), 1);
    assert_eq!(framework::queued_ranges(&rq).len(), 2);
    assert_eq!(framework::queued_opcodes(&rq), [opcode::SET_PRIM_COLOR]);

    rq.free_block(first)?;
    rq.free_block(second)?;
    Ok(())
}

#[test]
#[should_panic(expected = "already being recorded")]
pub fn nested_begin_panics() {
    let mut rq = framework::make_context().unwrap();
    rq.begin();
    rq.begin();
}

#[test]
#[should_panic(expected = "not a whole number")]
pub fn odd_recorded_command_panics() {
    let mut rq = framework::make_context().unwrap();
    rq.begin();
    rq.emit(opcode::SET_PRIM_COLOR, &[0, 0, 0], Hazard::empty(), Hazard::empty()).unwrap();
}

#[test]
pub fn dynamic_writes_bypass_the_block() -> Result<()> {
    let mut rq = framework::make_context()?;
    rq.begin();
    rq.write8(opcode::SET_PRIM_COLOR, 0, 1)?;
    rq.dynamic_write8(opcode::SET_ENV_COLOR, 0, 2);
    let block = rq.end().unwrap();

    let overlay = rq.overlay();
    assert_eq!(rq.block_words(&block)?, [rasterq::command::word(overlay, opcode::SET_PRIM_COLOR, 0, 1)]);
    let entries = rq.queue_mut().take_entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].opcode(), Some(opcode::SET_ENV_COLOR));
    assert!(rq.queue().entries().is_empty());
    rq.free_block(block)?;
    Ok(())
}

#[test]
pub fn failed_growth_records_nothing_past_the_boundary() -> Result<()> {
    framework::init_logging();
    // Room for the first 64-word chunk and nothing else.
    let allocator = DefaultChunkAllocator::with_window(0x2000, 64 * 8);
    let mut rq = RasterQueue::with_allocator(CommandRing::new(), allocator, &QueueSettings::default())?;
    rq.begin();
    for i in 0..10 {
        rq.write16(opcode::TEXTURE_RECTANGLE, 0, i, 0, 0)?;
    }
    assert_eq!(rq.recorder().cursor(), Some((20, 20)));

    // This one still starts at the boundary, so it is recorded even though the block cannot grow.
    rq.write16(opcode::TEXTURE_RECTANGLE, 0, 10, 0, 0)?;
    assert_eq!(rq.recorder().cursor(), Some((22, 20)));

    for _ in 0..5 {
        let err = rq.write16(opcode::TEXTURE_RECTANGLE, 0, 11, 0, 0).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::OutOfChunkMemory(128))));
        assert_eq!(rq.recorder().cursor(), Some((22, 20)));
    }
    assert!(rq.set_fill_color(0).is_err());
    assert!(rq.queue().entries().iter().all(|entry| entry.opcode().is_none()));

    let block = rq.end().unwrap();
    assert_eq!(block.chunk_count(), 1);
    let words = rq.block_words(&block)?;
    assert_eq!(words.len(), 22);
    assert_eq!(opcode_of_word(words[20]), opcode::TEXTURE_RECTANGLE);
    assert_eq!(words[20] as u32, 10);
    let start = rq.recorder().allocator().chunk(block.first_chunk()).unwrap().address();
    assert_eq!(framework::queued_ranges(&rq), [(start, start + 22 * 8)]);
    rq.free_block(block)?;
    Ok(())
}
