//! Diagnostics for faults reported by the GPU firmware.
//!
//! When the microcode hits an internal assertion it stops and hands an assert code to the CPU.
//! There is nothing to recover at that point, the hook only makes the failure readable.

use std::fmt;

/// Assert code raised when a flipped texture rectangle is drawn in copy mode.
pub const ASSERT_FLIP_COPY: u16 = 0xC001;

/// A decoded firmware assert.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FirmwareFault {
    /// A flipped texture rectangle was drawn while the rasterizer is in copy mode.
    FlipInCopyMode,
    /// An assert code this crate does not know about.
    Unknown(u16),
}

impl FirmwareFault {
    /// Decode a raw assert code.
    pub fn from_code(code: u16) -> Self {
        match code {
            ASSERT_FLIP_COPY => FirmwareFault::FlipInCopyMode,
            other => FirmwareFault::Unknown(other),
        }
    }
}

impl fmt::Display for FirmwareFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FirmwareFault::FlipInCopyMode => write!(f, "TextureRectangleFlip cannot be used in copy mode"),
            FirmwareFault::Unknown(code) => write!(f, "Unknown assert (code {:#06x})", code),
        }
    }
}

/// The fixed hook the submission queue calls when the microcode reports an assert. Logs the fault
/// and returns it decoded. Never attempts recovery.
pub fn report_firmware_fault(code: u16) -> FirmwareFault {
    let fault = FirmwareFault::from_code(code);
    error!("[rasterizer firmware]: {}", fault);
    fault
}
