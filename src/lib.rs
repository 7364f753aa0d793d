//! # ibm-dataset
//!
//! Training data for mask-based speech enhancement, served straight from
//! Kaldi-style utterance manifests.
//!
//! Two manifests list the same utterances in the same order, one pointing at
//! clean recordings and one at their noisy counterparts:
//!
//! ```text
//! A_CH1 /data/clean/A.CH1.wav        A_CH1 /data/noisy/A.CH1.wav
//! A_CH2 /data/clean/A.CH2.wav        A_CH2 /data/noisy/A.CH2.wav
//! ```
//!
//! Each item of an [`IbmDataset`] is the noisy power spectrum plus the ideal
//! binary masks for target speech and noise, time-major so the frame axis can
//! act as the batch axis.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ibm_dataset::{IbmDataset, IndexedDataset};
//!
//! let dataset = IbmDataset::single("data/clean.scp", "data/noisy.scp")?;
//! let item = dataset.get(0)?;
//! println!("{:?}", item.psd.dims()); // [n_frames, n_bins]
//!
//! // Six microphones per utterance, stacked channel-first
//! let dataset = IbmDataset::multichannel("dt05_clean.scp", "dt05_noisy.scp", 6)?;
//! let item = dataset.get(0)?;
//! println!("{:?}", item.psd.dims()); // [6, n_frames, n_bins]
//! ```
//!
//! ## Consistency
//!
//! Manifests are read and checked once, at construction: a row whose clean
//! and noisy utterance ids differ is reported as
//! [`ManifestError::Misaligned`]. Items are recomputed from the WAV files on
//! every access unless the dataset is wrapped in a [`CachedDataset`].

pub mod audio;
pub mod config;
pub mod dataset;
pub mod error;
pub mod ibm;
pub mod manifest;
pub mod profiling;

pub use audio::AudioBuffer;
pub use config::{DatasetConfig, IbmConfig};
pub use dataset::{
    CachedDataset, ChannelLayout, IbmDataset, IbmItem, IndexedDataset, DEFAULT_CHANNELS,
};
pub use error::{DatasetError, ManifestError};
pub use ibm::{IbmFeatures, StftIbm, WavToIbm};
pub use manifest::{Manifest, ManifestEntry, ManifestPair};
