use anyhow::Result;

use rasterq::prelude::*;

mod framework;

#[test]
pub fn use_then_change_inserts_one_sync() -> Result<()> {
    let mut rq = framework::make_context()?;
    rq.emit(opcode::FILL_RECTANGLE, &[0, 0], Hazard::PIPE, Hazard::empty())?;
    assert_eq!(rq.hazards(), Hazard::PIPE);
    rq.emit(opcode::SET_PRIM_COLOR, &[0, 0], Hazard::empty(), Hazard::PIPE)?;
    assert_eq!(
        framework::queued_opcodes(&rq),
        [opcode::FILL_RECTANGLE, opcode::SYNC_PIPE, opcode::SET_PRIM_COLOR]
    );
    assert_eq!(rq.hazards(), Hazard::empty());

    // Nothing was used since, so a second change needs no sync.
    rq.emit(opcode::SET_BLEND_COLOR, &[0, 0], Hazard::empty(), Hazard::PIPE)?;
    assert_eq!(framework::queued_opcodes(&rq).len(), 4);
    Ok(())
}

#[test]
pub fn disabled_category_keeps_its_bit() -> Result<()> {
    let mut rq = framework::make_context_with_settings(|builder| {
        builder.autosync(AutosyncConfig::LOAD | AutosyncConfig::TILE)
    })?;
    rq.write8_sync_use(opcode::FILL_RECTANGLE, 0, 0, Hazard::PIPE)?;
    rq.write8_sync_change(opcode::SET_PRIM_COLOR, 0, 0, Hazard::PIPE)?;
    assert_eq!(framework::queued_opcodes(&rq), [opcode::FILL_RECTANGLE, opcode::SET_PRIM_COLOR]);
    assert_eq!(rq.hazards(), Hazard::PIPE);
    Ok(())
}

#[test]
pub fn change_without_use_emits_nothing() -> Result<()> {
    let mut rq = framework::make_context()?;
    rq.write16_sync_change(opcode::SET_TILE_SIZE, [0; 4], Hazard::TILE)?;
    assert_eq!(framework::queued_opcodes(&rq), [opcode::SET_TILE_SIZE]);
    Ok(())
}

#[test]
pub fn syncs_are_emitted_tile_load_pipe() -> Result<()> {
    let mut rq = framework::make_context()?;
    rq.write16_sync_use(opcode::TEXTURE_RECTANGLE, [0; 4], Hazard::all())?;
    rq.emit(opcode::SET_OTHER_MODES, &[0, 0], Hazard::empty(), Hazard::all())?;
    assert_eq!(
        framework::queued_opcodes(&rq),
        [
            opcode::TEXTURE_RECTANGLE,
            opcode::SYNC_TILE,
            opcode::SYNC_LOAD,
            opcode::SYNC_PIPE,
            opcode::SET_OTHER_MODES,
        ]
    );
    assert_eq!(rq.hazards(), Hazard::empty());
    Ok(())
}

#[test]
pub fn only_changed_categories_are_synced() -> Result<()> {
    let mut rq = framework::make_context()?;
    rq.write8_sync_use(opcode::LOAD_TILE, 0, 0, Hazard::TILE | Hazard::TMEM)?;
    rq.write8_sync_change(opcode::LOAD_BLOCK, 0, 0, Hazard::TMEM)?;
    assert_eq!(
        framework::queued_opcodes(&rq),
        [opcode::LOAD_TILE, opcode::SYNC_LOAD, opcode::LOAD_BLOCK]
    );
    assert_eq!(rq.hazards(), Hazard::TILE);
    Ok(())
}

#[test]
pub fn recorded_block_contains_the_sync() -> Result<()> {
    let mut rq = framework::make_context()?;
    rq.begin();
    rq.emit(opcode::FILL_RECTANGLE, &[0, 0], Hazard::PIPE, Hazard::empty())?;
    rq.emit(opcode::SET_PRIM_COLOR, &[0, 0], Hazard::empty(), Hazard::PIPE)?;
    let block = rq.end().unwrap();
    assert_eq!(
        framework::block_opcodes(&rq, &block)?,
        [opcode::FILL_RECTANGLE, opcode::SYNC_PIPE, opcode::SET_PRIM_COLOR]
    );
    assert!(framework::queued_opcodes(&rq).is_empty());
    rq.free_block(block)?;
    Ok(())
}

#[test]
pub fn sync_full_clears_every_category() -> Result<()> {
    let mut rq = framework::make_context_with_settings(|builder| builder.autosync(AutosyncConfig::empty()))?;
    rq.emit(opcode::TEXTURE_RECTANGLE, &[0; 4], Hazard::all(), Hazard::empty())?;
    assert_eq!(rq.hazards(), Hazard::all());
    rq.sync_full(None, 0)?;
    assert_eq!(rq.hazards(), Hazard::empty());
    Ok(())
}

#[test]
pub fn explicit_syncs_clear_their_category() -> Result<()> {
    let mut rq = framework::make_context()?;
    rq.emit(opcode::TEXTURE_RECTANGLE, &[0; 4], Hazard::all(), Hazard::empty())?;
    rq.sync_tile()?;
    assert_eq!(rq.hazards(), Hazard::PIPE | Hazard::TMEM);
    rq.sync_load()?;
    assert_eq!(rq.hazards(), Hazard::PIPE);
    rq.sync_pipe()?;
    assert_eq!(rq.hazards(), Hazard::empty());
    assert_eq!(
        &framework::queued_opcodes(&rq)[1..],
        [opcode::SYNC_TILE, opcode::SYNC_LOAD, opcode::SYNC_PIPE]
    );
    Ok(())
}

#[test]
pub fn change_config_returns_previous() -> Result<()> {
    let mut rq = framework::make_context()?;
    assert_eq!(rq.config(), AutosyncConfig::all());
    let old = rq.change_config(AutosyncConfig::empty(), AutosyncConfig::PIPE);
    assert_eq!(old, AutosyncConfig::all());
    assert_eq!(rq.config(), AutosyncConfig::LOAD | AutosyncConfig::TILE);
    let old = rq.change_config(AutosyncConfig::PIPE, AutosyncConfig::LOAD);
    assert_eq!(old, AutosyncConfig::LOAD | AutosyncConfig::TILE);
    assert_eq!(rq.config(), AutosyncConfig::PIPE | AutosyncConfig::TILE);
    rq.set_config(AutosyncConfig::empty());
    assert_eq!(rq.config(), AutosyncConfig::empty());
    Ok(())
}

#[test]
pub fn tracker_in_isolation() {
    use rasterq::sync::autosync::{Autosync, SyncKind};

    let mut autosync = Autosync::new(AutosyncConfig::PIPE | AutosyncConfig::TILE);
    autosync.mark_use(Hazard::PIPE | Hazard::TMEM);
    let syncs = autosync.required_syncs(Hazard::all()).collect::<Vec<_>>();
    // Texture memory is in use but its autosync is off.
    assert_eq!(syncs, [SyncKind::Pipe]);
    autosync.synced(SyncKind::Pipe);
    assert_eq!(autosync.used(), Hazard::TMEM);
    autosync.reset();
    assert_eq!(autosync.used(), Hazard::empty());
}
