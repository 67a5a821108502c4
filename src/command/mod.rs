//! Command encoding.
//!
//! Every command is one or more 64-bit words. The rasterizer reads the opcode from bits 56..61 of the
//! first word and ignores the two bits above it, which is where the overlay id sits when the same
//! command travels through the submission queue. On the queue path a command is a run of 32-bit
//! words: word 0 is `overlay | opcode << 24 | arg0`, followed by the remaining arguments.
//! Recording packs those 32-bit words pairwise into 64-bit command words, high half first.
//!
//! The [`opcode`] module lists the rasterizer's native opcodes, whose values are fixed by the
//! hardware, and the extended opcodes only the microcode understands. [`fixup`] describes the
//! commands that need to be resolved at execution time.

use crate::core::queue::OverlayId;

pub mod fixup;

/// Opcode values.
pub mod opcode {
    pub const NOOP: u8 = 0x00;
    pub const SET_LOOKUP_ADDRESS: u8 = 0x01;
    pub const TEXTURE_RECTANGLE_EX: u8 = 0x02;
    pub const TEXTURE_RECTANGLE_EX_FIX: u8 = 0x03;
    pub const SET_SCISSOR_EX: u8 = 0x04;
    pub const SET_SCISSOR_EX_FIX: u8 = 0x05;
    pub const MODIFY_OTHER_MODES: u8 = 0x06;
    pub const MODIFY_OTHER_MODES_FIX: u8 = 0x07;
    /// Flat triangle. Shade, texture and depth variants follow at 0x09..=0x0F.
    pub const TRI: u8 = 0x08;
    pub const SET_FILL_COLOR_32: u8 = 0x16;
    pub const SET_FILL_COLOR_32_FIX: u8 = 0x17;
    pub const SET_TEXTURE_IMAGE_FIX: u8 = 0x1D;
    pub const SET_Z_IMAGE_FIX: u8 = 0x1E;
    pub const SET_COLOR_IMAGE_FIX: u8 = 0x1F;
    pub const SET_OTHER_MODES_FIX: u8 = 0x20;
    pub const SYNC_FULL_FIX: u8 = 0x21;

    pub const TEXTURE_RECTANGLE: u8 = 0x24;
    pub const TEXTURE_RECTANGLE_FLIP: u8 = 0x25;
    pub const SYNC_LOAD: u8 = 0x26;
    pub const SYNC_PIPE: u8 = 0x27;
    pub const SYNC_TILE: u8 = 0x28;
    pub const SYNC_FULL: u8 = 0x29;
    pub const SET_KEY_GB: u8 = 0x2A;
    pub const SET_KEY_R: u8 = 0x2B;
    pub const SET_CONVERT: u8 = 0x2C;
    pub const SET_SCISSOR: u8 = 0x2D;
    pub const SET_PRIM_DEPTH: u8 = 0x2E;
    pub const SET_OTHER_MODES: u8 = 0x2F;
    pub const LOAD_TLUT: u8 = 0x30;
    pub const SET_TILE_SIZE: u8 = 0x32;
    pub const LOAD_BLOCK: u8 = 0x33;
    pub const LOAD_TILE: u8 = 0x34;
    pub const SET_TILE: u8 = 0x35;
    pub const FILL_RECTANGLE: u8 = 0x36;
    pub const SET_FILL_COLOR: u8 = 0x37;
    pub const SET_FOG_COLOR: u8 = 0x38;
    pub const SET_BLEND_COLOR: u8 = 0x39;
    pub const SET_PRIM_COLOR: u8 = 0x3A;
    pub const SET_ENV_COLOR: u8 = 0x3B;
    pub const SET_COMBINE_MODE: u8 = 0x3C;
    pub const SET_TEXTURE_IMAGE: u8 = 0x3D;
    pub const SET_Z_IMAGE: u8 = 0x3E;
    pub const SET_COLOR_IMAGE: u8 = 0x3F;
}

/// Largest number of 32-bit arguments a single command may carry.
pub const MAX_COMMAND_ARGS: usize = 88;

/// Mask of the argument bits available in the first word of a command.
pub const ARG0_MASK: u32 = 0x00FF_FFFF;

/// Opcode of a queued command, given its first 32-bit word.
pub fn opcode_of(word: u32) -> u8 {
    ((word >> 24) & 0x3F) as u8
}

/// Opcode of a recorded command, given its first 64-bit word.
pub fn opcode_of_word(word: u64) -> u8 {
    ((word >> 56) & 0x3F) as u8
}

/// First 32-bit word of a command.
pub fn header(overlay: OverlayId, opcode: u8, arg0: u32) -> u32 {
    debug_assert!(opcode <= 0x3F, "opcode out of range: {:#x}", opcode);
    debug_assert!(arg0 & !ARG0_MASK == 0, "first argument overlaps the opcode: {:#x}", arg0);
    overlay.base() | (opcode as u32) << 24 | arg0
}

/// Encode a command into 32-bit queue words. Returns the used part of `buffer`.
/// # Panics
/// Panics if `args` is empty or longer than [`MAX_COMMAND_ARGS`].
pub fn encode<'b>(overlay: OverlayId, opcode: u8, args: &[u32], buffer: &'b mut [u32; MAX_COMMAND_ARGS]) -> &'b [u32] {
    assert!(!args.is_empty(), "command {:#x} has no arguments", opcode);
    assert!(args.len() <= MAX_COMMAND_ARGS, "command {:#x} has {} arguments", opcode, args.len());
    buffer[0] = header(overlay, opcode, args[0]);
    buffer[1..args.len()].copy_from_slice(&args[1..]);
    &buffer[..args.len()]
}

/// Pack 32-bit queue words pairwise into 64-bit command words.
/// # Panics
/// Panics if the number of words is odd.
pub fn pack(words: &[u32]) -> impl Iterator<Item = u64> + '_ {
    assert!(words.len() % 2 == 0, "command is not a whole number of 64-bit words: {} words", words.len());
    words.chunks_exact(2).map(|pair| ((pair[0] as u64) << 32) | pair[1] as u64)
}

/// Build a single 64-bit command word from its two halves.
pub fn word(overlay: OverlayId, opcode: u8, high: u32, low: u32) -> u64 {
    ((header(overlay, opcode, high) as u64) << 32) | low as u64
}
