//! JSON-loadable settings for mask extraction and dataset construction.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::audio::StftConfig;

/// Mask extraction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IbmConfig {
    /// Rate both files of a pair are resampled to before analysis. `None`
    /// keeps the native rate, which the two files must then share.
    #[serde(default)]
    pub sample_rate: Option<u32>,
    /// FFT size; each frame carries `n_fft / 2 + 1` bins
    #[serde(default = "default_n_fft")]
    pub n_fft: usize,
    #[serde(default = "default_hop_length")]
    pub hop_length: usize,
    /// Local criterion in dB: a bin belongs to the target when its
    /// clean-to-noise ratio exceeds this
    #[serde(default)]
    pub lc_db: f32,
}

fn default_n_fft() -> usize {
    512
}
fn default_hop_length() -> usize {
    256
}

impl Default for IbmConfig {
    fn default() -> Self {
        Self {
            sample_rate: None,
            n_fft: default_n_fft(),
            hop_length: default_hop_length(),
            lc_db: 0.0,
        }
    }
}

impl IbmConfig {
    pub fn stft_config(&self) -> StftConfig {
        StftConfig {
            n_fft: self.n_fft,
            hop_length: self.hop_length,
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_json(path.as_ref())
    }
}

fn default_channels() -> usize {
    1
}

/// Everything needed to build a dataset from a config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub clean_manifest: PathBuf,
    pub noisy_manifest: PathBuf,
    /// Rows per item: 1 for a single-channel dataset, N for N-microphone groups
    #[serde(default = "default_channels")]
    pub channels: usize,
    /// Memoize items by index after first access
    #[serde(default)]
    pub cache: bool,
    #[serde(default)]
    pub ibm: IbmConfig,
}

impl DatasetConfig {
    pub fn new(clean_manifest: impl Into<PathBuf>, noisy_manifest: impl Into<PathBuf>) -> Self {
        Self {
            clean_manifest: clean_manifest.into(),
            noisy_manifest: noisy_manifest.into(),
            channels: default_channels(),
            cache: false,
            ibm: IbmConfig::default(),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_json(path.as_ref())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", path.display()))
}
