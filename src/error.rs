//! Typed failures callers may want to match on.
//!
//! Everything else travels as `anyhow::Error` with context; these enums are
//! wrapped in it and can be recovered with `downcast_ref`.

use std::path::PathBuf;
use thiserror::Error;

/// Manifest parsing and clean/noisy pairing errors
#[derive(Debug, Error)]
pub enum ManifestError {
    /// A non-blank line did not carry both an utterance id and a path
    #[error("{}:{line}: expected `<utterance_id> <wav_path>`, got {content:?}", .path.display())]
    MalformedLine {
        path: PathBuf,
        line: usize,
        content: String,
    },

    /// Clean and noisy manifests name different utterances at the same row
    #[error("manifest misalignment at row {row}: clean id {clean_id:?} != noisy id {noisy_id:?}")]
    Misaligned {
        row: usize,
        clean_id: String,
        noisy_id: String,
    },

    /// Clean and noisy manifests have different row counts
    #[error("manifest length mismatch: {clean} clean rows, {noisy} noisy rows")]
    LengthMismatch { clean: usize, noisy: usize },
}

/// Dataset construction and access errors
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("channel group size must be positive")]
    EmptyChannelGroup,

    /// Channels of one group produced spectra of different lengths
    #[error("channel {channel} of item {index} has {frames} frames, expected {expected}")]
    ChannelFrameMismatch {
        index: usize,
        channel: usize,
        frames: usize,
        expected: usize,
    },
}
