//! Audio processing utilities for mask extraction
//!
//! This module provides:
//! - WAV file I/O
//! - Audio resampling
//! - Centered short-time Fourier transform and power spectra

mod io;
pub mod resample;
mod stft;

pub use io::{load_wav, save_wav, AudioBuffer};
pub use resample::{resample, ResampleQuality, Resampler};
pub use stft::{Stft, StftConfig};
