//! Commands whose final encoding depends on state only known when they execute.
//!
//! The effective scissor rectangle, for example, depends on the cycle mode selected by the other-modes
//! command. When a command is sent straight to the submission queue, the microcode resolves it against
//! its current state right away (the *dynamic* form). A recorded block is replayed later, in whatever
//! state the queue is in at that point, so it cannot carry the final bytes. Instead, the *fix* form is
//! queued next to the block and resolves the command at replay time, writing the result into a
//! placeholder the block reserved for it.
//!
//! Each such command is described by a [`FixupOp`], and
//! [`RasterQueue::fixup_write`](crate::RasterQueue::fixup_write) handles all of them the same way.

use crate::command::opcode;

/// How a fixup command is laid out while a block is being recorded.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Recording {
    /// Queue the fix form, reserve `placeholder` command words in the block.
    Deferred { placeholder: usize },
    /// Record the command itself, then queue the fix form, which derives a dependent command into the
    /// `placeholder` words that follow.
    StaticThenFix { placeholder: usize },
    /// Queue the fix form first so it can update shared state, then record the command itself.
    FixThenStatic,
}

impl Recording {
    /// Command words reserved in the block for the output of the fix form.
    pub fn placeholder(&self) -> usize {
        match self {
            Recording::Deferred { placeholder } | Recording::StaticThenFix { placeholder } => *placeholder,
            Recording::FixThenStatic => 0,
        }
    }
}

/// Descriptor of a command with a dynamic and a fix form.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FixupOp {
    /// Name used in logs.
    pub name: &'static str,
    /// Opcode used outside of blocks, and the opcode recorded into the block where the layout records
    /// the command itself.
    pub dynamic: u8,
    /// Opcode queued next to a block, resolved at replay time.
    pub fix: u8,
    /// Layout while recording.
    pub recording: Recording,
}

pub const TEXTURE_RECTANGLE: FixupOp = FixupOp {
    name: "texture_rectangle",
    dynamic: opcode::TEXTURE_RECTANGLE_EX,
    fix: opcode::TEXTURE_RECTANGLE_EX_FIX,
    recording: Recording::Deferred { placeholder: 2 },
};

pub const SET_SCISSOR: FixupOp = FixupOp {
    name: "set_scissor",
    dynamic: opcode::SET_SCISSOR_EX,
    fix: opcode::SET_SCISSOR_EX_FIX,
    recording: Recording::Deferred { placeholder: 1 },
};

pub const SET_FILL_COLOR: FixupOp = FixupOp {
    name: "set_fill_color",
    dynamic: opcode::SET_FILL_COLOR_32,
    fix: opcode::SET_FILL_COLOR_32_FIX,
    recording: Recording::Deferred { placeholder: 1 },
};

pub const SET_TEXTURE_IMAGE: FixupOp = FixupOp {
    name: "set_texture_image",
    dynamic: opcode::SET_TEXTURE_IMAGE,
    fix: opcode::SET_TEXTURE_IMAGE_FIX,
    recording: Recording::Deferred { placeholder: 1 },
};

pub const SET_Z_IMAGE: FixupOp = FixupOp {
    name: "set_z_image",
    dynamic: opcode::SET_Z_IMAGE,
    fix: opcode::SET_Z_IMAGE_FIX,
    recording: Recording::Deferred { placeholder: 1 },
};

/// The fix form also re-emits the scissor, whose clamping depends on the target bit depth.
pub const SET_COLOR_IMAGE: FixupOp = FixupOp {
    name: "set_color_image",
    dynamic: opcode::SET_COLOR_IMAGE,
    fix: opcode::SET_COLOR_IMAGE_FIX,
    recording: Recording::Deferred { placeholder: 2 },
};

/// Other modes need no fixing themselves, but the scissor derived from the cycle mode does.
pub const SET_OTHER_MODES: FixupOp = FixupOp {
    name: "set_other_modes",
    dynamic: opcode::SET_OTHER_MODES,
    fix: opcode::SET_OTHER_MODES_FIX,
    recording: Recording::StaticThenFix { placeholder: 1 },
};

pub const MODIFY_OTHER_MODES: FixupOp = FixupOp {
    name: "modify_other_modes",
    dynamic: opcode::MODIFY_OTHER_MODES,
    fix: opcode::MODIFY_OTHER_MODES_FIX,
    recording: Recording::Deferred { placeholder: 2 },
};

/// The fix form stores the command in the state record, where the interrupt handler finds the callback.
pub const SYNC_FULL: FixupOp = FixupOp {
    name: "sync_full",
    dynamic: opcode::SYNC_FULL,
    fix: opcode::SYNC_FULL_FIX,
    recording: Recording::FixThenStatic,
};
