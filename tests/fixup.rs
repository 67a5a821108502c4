use anyhow::Result;

use rasterq::command::fixup;
use rasterq::prelude::*;

mod framework;

#[test]
pub fn immediate_setters_use_the_dynamic_form() -> Result<()> {
    let mut rq = framework::make_context()?;
    rq.set_scissor(0, 0)?;
    rq.set_fill_color(0xFF00_00FF)?;
    rq.set_texture_image(0, 0)?;
    rq.set_z_image(0, 0)?;
    rq.set_color_image(0, 0)?;
    rq.set_other_modes(0, 0)?;
    rq.modify_other_modes(0, 0, 0)?;
    assert_eq!(
        framework::queued_opcodes(&rq),
        [
            opcode::SET_SCISSOR_EX,
            opcode::SET_FILL_COLOR_32,
            opcode::SET_TEXTURE_IMAGE,
            opcode::SET_Z_IMAGE,
            opcode::SET_COLOR_IMAGE,
            opcode::SET_OTHER_MODES,
            opcode::MODIFY_OTHER_MODES,
        ]
    );
    assert_eq!(rq.queue().entries()[1], QueueEntry::Command(vec![0xD600_0000, 0xFF00_00FF]));
    Ok(())
}

#[test]
pub fn recorded_setters_queue_the_fix_form() -> Result<()> {
    let mut rq = framework::make_context()?;
    rq.begin();
    rq.set_scissor(0, 0)?;
    rq.set_fill_color(0)?;
    rq.set_texture_image(0, 0)?;
    rq.set_z_image(0, 0)?;
    rq.set_color_image(0, 0)?;
    rq.modify_other_modes(0, 0, 0)?;
    let block = rq.end().unwrap();

    assert_eq!(
        framework::queued_opcodes(&rq),
        [
            opcode::SET_SCISSOR_EX_FIX,
            opcode::SET_FILL_COLOR_32_FIX,
            opcode::SET_TEXTURE_IMAGE_FIX,
            opcode::SET_Z_IMAGE_FIX,
            opcode::SET_COLOR_IMAGE_FIX,
            opcode::MODIFY_OTHER_MODES_FIX,
        ]
    );
    // Nothing but placeholders: 1 + 1 + 1 + 1 + 2 + 2 words.
    assert_eq!(rq.block_words(&block)?, [0u64; 8]);
    rq.free_block(block)?;
    Ok(())
}

#[test]
pub fn placeholders_split_the_range() -> Result<()> {
    let mut rq = framework::make_context()?;
    rq.begin();
    rq.set_scissor(0x0010_0020, 0x0050_0060)?;
    rq.write8(opcode::SET_PRIM_COLOR, 0, 0)?;
    let block = rq.end().unwrap();
    let start = rq.recorder().allocator().chunk(block.first_chunk()).unwrap().address();

    assert_eq!(
        rq.queue().entries(),
        [
            QueueEntry::Range { start, end: start },
            QueueEntry::Command(vec![0xC500_0000 | 0x0010_0020, 0x0050_0060]),
            QueueEntry::Range { start: start + 8, end: start + 16 },
        ]
    );
    rq.free_block(block)?;
    Ok(())
}

#[test]
pub fn recorded_other_modes_is_followed_by_its_fix() -> Result<()> {
    let mut rq = framework::make_context()?;
    rq.begin();
    rq.set_other_modes(0x0000_1234, 0x5678_0000)?;
    let block = rq.end().unwrap();
    let start = rq.recorder().allocator().chunk(block.first_chunk()).unwrap().address();

    assert_eq!(rq.block_words(&block)?, [0xEF00_1234_5678_0000, 0]);
    assert_eq!(
        rq.queue().entries(),
        [
            QueueEntry::Range { start, end: start + 8 },
            QueueEntry::Command(vec![0xE000_1234, 0x5678_0000]),
        ]
    );
    rq.free_block(block)?;
    Ok(())
}

#[test]
pub fn texture_rectangle_uses_the_pipe() -> Result<()> {
    let mut rq = framework::make_context()?;
    rq.begin();
    rq.texture_rectangle([0, 0, 0, 0])?;
    rq.set_fill_color(0)?;
    let block = rq.end().unwrap();

    // The sync is recorded, the fixups are queued.
    assert_eq!(framework::block_opcodes(&rq, &block)?, [opcode::SYNC_PIPE]);
    assert_eq!(
        framework::queued_opcodes(&rq),
        [opcode::TEXTURE_RECTANGLE_EX_FIX, opcode::SET_FILL_COLOR_32_FIX]
    );
    assert_eq!(rq.block_words(&block)?.len(), 2 + 1 + 1);
    rq.free_block(block)?;
    Ok(())
}

#[test]
pub fn scissor_needs_no_sync() -> Result<()> {
    let mut rq = framework::make_context()?;
    rq.fill_triangle([0; 8])?;
    rq.set_scissor(0, 0)?;
    assert_eq!(framework::queued_opcodes(&rq), [opcode::TRI, opcode::SET_SCISSOR_EX]);
    assert_eq!(rq.hazards(), Hazard::PIPE);
    Ok(())
}

#[test]
pub fn custom_fixup_ops_go_through_the_same_path() -> Result<()> {
    let op = FixupOp {
        name: "set_prim_depth",
        dynamic: opcode::SET_PRIM_DEPTH,
        fix: opcode::NOOP,
        recording: Recording::Deferred { placeholder: 1 },
    };
    let mut rq = framework::make_context()?;
    rq.fixup_write8(&op, 0, 0)?;
    rq.begin();
    rq.fixup_write8(&op, 0, 0)?;
    let block = rq.end().unwrap();
    assert_eq!(framework::queued_opcodes(&rq), [opcode::SET_PRIM_DEPTH, opcode::NOOP]);
    assert_eq!(rq.block_words(&block)?, [0]);
    rq.free_block(block)?;
    Ok(())
}

#[test]
pub fn descriptors_reserve_what_the_fix_produces() {
    assert_eq!(fixup::SET_SCISSOR.recording.placeholder(), 1);
    assert_eq!(fixup::SET_COLOR_IMAGE.recording.placeholder(), 2);
    assert_eq!(fixup::MODIFY_OTHER_MODES.recording.placeholder(), 2);
    assert_eq!(fixup::TEXTURE_RECTANGLE.recording.placeholder(), 2);
    assert_eq!(fixup::SET_OTHER_MODES.recording, Recording::StaticThenFix { placeholder: 1 });
    assert_eq!(fixup::SYNC_FULL.recording, Recording::FixThenStatic);
    assert_eq!(fixup::SYNC_FULL.recording.placeholder(), 0);
}
