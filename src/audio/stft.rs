//! Short-time Fourier transform and power spectra.
//!
//! Frames are centered: the signal is reflect-padded by `n_fft / 2` on each
//! side before framing, so frame `t` is centered on sample `t * hop_length`.

use anyhow::{ensure, Result};
use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// STFT parameters
#[derive(Debug, Clone)]
pub struct StftConfig {
    /// FFT size (and Hann window length)
    pub n_fft: usize,
    /// Hop length between frames
    pub hop_length: usize,
}

impl Default for StftConfig {
    fn default() -> Self {
        Self {
            n_fft: 512,
            hop_length: 256,
        }
    }
}

impl StftConfig {
    /// Number of non-negative frequency bins produced per frame.
    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Number of frames produced for a signal of `n_samples` samples.
    pub fn n_frames(&self, n_samples: usize) -> usize {
        let padded = n_samples + 2 * (self.n_fft / 2);
        if padded < self.n_fft {
            return 0;
        }
        (padded - self.n_fft) / self.hop_length + 1
    }
}

/// STFT analyzer with a planned FFT and precomputed window.
pub struct Stft {
    config: StftConfig,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for Stft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stft").field("config", &self.config).finish()
    }
}

impl Stft {
    pub fn new(config: StftConfig) -> Result<Self> {
        ensure!(config.n_fft >= 2, "n_fft must be at least 2, got {}", config.n_fft);
        ensure!(config.hop_length > 0, "hop_length must be positive");

        let window = Self::hann_window(config.n_fft);
        let fft = FftPlanner::<f32>::new().plan_fft_forward(config.n_fft);

        Ok(Self {
            config,
            window,
            fft,
        })
    }

    pub fn config(&self) -> &StftConfig {
        &self.config
    }

    /// Complex spectrum, frame-major: `[n_frames][n_bins]`.
    pub fn stft(&self, samples: &[f32]) -> Vec<Vec<Complex32>> {
        let n_fft = self.config.n_fft;
        let hop_length = self.config.hop_length;
        let pad_length = n_fft / 2;

        let mut padded = Vec::with_capacity(samples.len() + 2 * pad_length);
        for i in (1..=pad_length).rev() {
            padded.push(reflect(samples, -(i as isize)));
        }
        padded.extend_from_slice(samples);
        for i in 0..pad_length {
            padded.push(reflect(samples, (samples.len() + i) as isize));
        }

        let n_frames = self.config.n_frames(samples.len());
        let mut result = Vec::with_capacity(n_frames);

        for t in 0..n_frames {
            let start = t * hop_length;

            let mut buffer: Vec<Complex32> = (0..n_fft)
                .map(|j| Complex32::new(padded[start + j] * self.window[j], 0.0))
                .collect();

            self.fft.process(&mut buffer);
            buffer.truncate(self.config.n_bins());
            result.push(buffer);
        }

        result
    }

    /// Power spectrum `|X|^2`, frame-major: `[n_frames][n_bins]`.
    pub fn power_spectrogram(&self, samples: &[f32]) -> Vec<Vec<f32>> {
        self.stft(samples)
            .iter()
            .map(|frame| frame.iter().map(|c| c.norm_sqr()).collect())
            .collect()
    }

    /// Periodic Hann window
    fn hann_window(length: usize) -> Vec<f32> {
        (0..length)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / length as f32).cos()))
            .collect()
    }
}

/// Sample at `idx` with reflection about the first and last sample
/// (numpy `mode="reflect"`). Empty input yields 0.
fn reflect(samples: &[f32], idx: isize) -> f32 {
    let n = samples.len() as isize;
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return samples[0];
    }
    let period = 2 * (n - 1);
    let mut i = idx.rem_euclid(period);
    if i >= n {
        i = period - i;
    }
    samples[i as usize]
}
