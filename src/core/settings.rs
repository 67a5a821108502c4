//! Exposes all structs needed to store initialization parameters.

use anyhow::Result;

use crate::core::queue::OverlayId;
use crate::sync::autosync::AutosyncConfig;
use crate::Error;

/// Capacity of the first chunk of every block, in command words.
pub const DEFAULT_MIN_CHUNK_WORDS: usize = 64;
/// Chunks stop doubling once they reach this capacity, in command words.
pub const DEFAULT_MAX_CHUNK_WORDS: usize = 4096;
/// Size of the largest command that may be recorded, in command words. A shaded, textured,
/// z-buffered triangle is the worst case.
pub const DEFAULT_MAX_COMMAND_WORDS: usize = 44;

/// Settings used to initialize a [`RasterQueue`](crate::RasterQueue).
///
/// See also: [`QueueBuilder`]
#[derive(Debug, Clone)]
pub struct QueueSettings {
    /// Id space the commands are registered under in the submission queue.
    pub overlay: OverlayId,
    /// Capacity of the first chunk of a block. Every further chunk doubles the previous capacity.
    pub min_chunk_words: usize,
    /// Upper bound for chunk capacity.
    pub max_chunk_words: usize,
    /// Tail margin kept free at the end of every chunk. No single recorded command may be larger.
    pub max_command_words: usize,
    /// Categories that get sync commands inserted automatically.
    pub autosync: AutosyncConfig,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            overlay: OverlayId::RASTERIZER,
            min_chunk_words: DEFAULT_MIN_CHUNK_WORDS,
            max_chunk_words: DEFAULT_MAX_CHUNK_WORDS,
            max_command_words: DEFAULT_MAX_COMMAND_WORDS,
            autosync: AutosyncConfig::all(),
        }
    }
}

impl QueueSettings {
    /// Check that the settings make sense together.
    /// # Errors
    /// * Fails if a chunk of minimum size cannot hold one command of maximum size
    /// * Fails if the maximum chunk size is smaller than the minimum
    /// * Fails if the maximum command size is zero
    pub fn validate(&self) -> Result<()> {
        if self.max_command_words == 0 {
            anyhow::bail!(Error::InvalidSettings("maximum command size must be at least one word"));
        }
        if self.min_chunk_words <= self.max_command_words {
            anyhow::bail!(Error::InvalidSettings("minimum chunk size must exceed the maximum command size"));
        }
        if self.max_chunk_words < self.min_chunk_words {
            anyhow::bail!(Error::InvalidSettings("maximum chunk size is smaller than the minimum"));
        }
        Ok(())
    }
}

/// The queue builder is a convenience struct to easily create [`QueueSettings`].
///
/// # Example
/// ```
/// # use rasterq::prelude::*;
/// let settings = QueueBuilder::new()
///     .min_chunk_words(128)
///     .autosync(AutosyncConfig::PIPE | AutosyncConfig::TILE)
///     .build();
/// assert_eq!(settings.min_chunk_words, 128);
/// ```
#[derive(Debug, Default)]
pub struct QueueBuilder {
    inner: QueueSettings,
}

impl QueueBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the overlay id.
    pub fn overlay(mut self, overlay: OverlayId) -> Self {
        self.inner.overlay = overlay;
        self
    }

    /// Capacity of the first chunk of a block, in command words.
    pub fn min_chunk_words(mut self, words: usize) -> Self {
        self.inner.min_chunk_words = words;
        self
    }

    /// Maximum chunk capacity, in command words.
    pub fn max_chunk_words(mut self, words: usize) -> Self {
        self.inner.max_chunk_words = words;
        self
    }

    /// Size of the largest recordable command, in command words.
    pub fn max_command_words(mut self, words: usize) -> Self {
        self.inner.max_command_words = words;
        self
    }

    /// Initial autosync configuration.
    pub fn autosync(mut self, config: AutosyncConfig) -> Self {
        self.inner.autosync = config;
        self
    }

    /// Build the resulting settings.
    pub fn build(self) -> QueueSettings {
        self.inner
    }
}
