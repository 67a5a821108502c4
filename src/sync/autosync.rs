//! Automatic insertion of sync commands.
//!
//! The rasterizer pipelines its work: while one command is still being drawn, the next one may already
//! be changing state the first one depends on. The hardware does not protect itself against that, so
//! before state of a category is changed, the matching sync command has to drain every command still
//! using it. [`Autosync`] tracks which categories were used since they were last synced, so a sync is
//! inserted only when a change follows a use.
//!
//! Tracking is conservative: it may sync more often than strictly needed, never less. Categories can
//! be opted out through [`AutosyncConfig`], in which case the caller is responsible for syncing.

use bitflags::bitflags;

use crate::command::opcode;

bitflags! {
    /// Categories of fixed-function state with their own sync command.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct Hazard: u32 {
        /// Pipe configuration: other modes, combiner, colors, render target.
        const PIPE = 0x1;
        /// Tile descriptors.
        const TILE = 0x2;
        /// Texture memory contents.
        const TMEM = 0x4;
    }
}

bitflags! {
    /// Enables automatic sync insertion per category.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct AutosyncConfig: u32 {
        /// Insert SYNC_PIPE before pipe changes.
        const PIPE = 0x1;
        /// Insert SYNC_LOAD before texture memory changes.
        const LOAD = 0x2;
        /// Insert SYNC_TILE before tile changes.
        const TILE = 0x4;
    }
}

/// One of the three sync commands a category change may require.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SyncKind {
    Tile,
    Load,
    Pipe,
}

impl SyncKind {
    /// The category this sync command drains.
    pub fn hazard(&self) -> Hazard {
        match self {
            SyncKind::Tile => Hazard::TILE,
            SyncKind::Load => Hazard::TMEM,
            SyncKind::Pipe => Hazard::PIPE,
        }
    }

    /// The config flag that enables inserting this sync automatically.
    pub fn config(&self) -> AutosyncConfig {
        match self {
            SyncKind::Tile => AutosyncConfig::TILE,
            SyncKind::Load => AutosyncConfig::LOAD,
            SyncKind::Pipe => AutosyncConfig::PIPE,
        }
    }

    /// Opcode of the sync command.
    pub fn opcode(&self) -> u8 {
        match self {
            SyncKind::Tile => opcode::SYNC_TILE,
            SyncKind::Load => opcode::SYNC_LOAD,
            SyncKind::Pipe => opcode::SYNC_PIPE,
        }
    }
}

/// Order in which pending syncs are emitted.
const SYNC_ORDER: [SyncKind; 3] = [SyncKind::Tile, SyncKind::Load, SyncKind::Pipe];

/// Hazard state plus configuration.
#[derive(Debug, Clone)]
pub struct Autosync {
    used: Hazard,
    config: AutosyncConfig,
}

impl Autosync {
    pub fn new(config: AutosyncConfig) -> Self {
        Self {
            used: Hazard::empty(),
            config,
        }
    }

    /// Categories used since their last sync.
    pub fn used(&self) -> Hazard {
        self.used
    }

    pub fn config(&self) -> AutosyncConfig {
        self.config
    }

    pub fn set_config(&mut self, config: AutosyncConfig) {
        self.config = config;
    }

    /// Mark categories as used by a command about to be emitted.
    pub fn mark_use(&mut self, hazard: Hazard) {
        self.used |= hazard;
    }

    /// Sync commands that must precede a command changing `hazard`, in emission order.
    /// Categories that are not in use, or not enabled for autosync, need nothing.
    pub fn required_syncs(&self, hazard: Hazard) -> impl Iterator<Item = SyncKind> {
        let pending = hazard & self.used;
        let config = self.config;
        SYNC_ORDER
            .into_iter()
            .filter(move |kind| pending.contains(kind.hazard()) && config.contains(kind.config()))
    }

    /// A sync command for the category was emitted.
    pub fn synced(&mut self, kind: SyncKind) {
        self.used.remove(kind.hazard());
    }

    /// The whole pipeline was drained.
    pub fn reset(&mut self) {
        self.used = Hazard::empty();
    }
}
