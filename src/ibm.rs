//! Clean/noisy waveform pair to PSD features and ideal binary masks.
//!
//! The datasets only depend on [`WavToIbm`]; [`StftIbm`] is the default
//! implementation. All five outputs are bin-major, `[n_bins, n_frames]`.

use anyhow::{bail, Context, Result};
use candle_core::{Device, Tensor};
use std::borrow::Cow;
use std::path::Path;

use crate::audio::{load_wav, AudioBuffer, Resampler, Stft};
use crate::config::IbmConfig;

/// Denominator floor for the clean-to-noise ratio
const PSD_FLOOR: f32 = 1e-10;

/// Conversion outputs, each `[n_bins, n_frames]`, f32.
#[derive(Debug, Clone)]
pub struct IbmFeatures {
    /// Power spectrum of the noisy input (the model input feature)
    pub noisy_psd: Tensor,
    pub clean_psd: Tensor,
    /// Power spectrum of `noisy - clean`
    pub noise_psd: Tensor,
    /// 1 where the clean signal dominates the noise
    pub target_mask: Tensor,
    /// Complement of `target_mask`
    pub noise_mask: Tensor,
}

/// Converts one clean/noisy WAV pair into features and masks.
pub trait WavToIbm: Send + Sync {
    fn convert(&self, clean: &Path, noisy: &Path) -> Result<IbmFeatures>;
}

impl<T: WavToIbm + ?Sized> WavToIbm for std::sync::Arc<T> {
    fn convert(&self, clean: &Path, noisy: &Path) -> Result<IbmFeatures> {
        (**self).convert(clean, noisy)
    }
}

/// STFT-based ideal binary mask extraction.
#[derive(Debug)]
pub struct StftIbm {
    config: IbmConfig,
    stft: Stft,
    resampler: Resampler,
}

impl StftIbm {
    pub fn new(config: IbmConfig) -> Result<Self> {
        let stft = Stft::new(config.stft_config()).context("Invalid STFT settings")?;
        Ok(Self {
            config,
            stft,
            resampler: Resampler::default(),
        })
    }

    pub fn config(&self) -> &IbmConfig {
        &self.config
    }

    /// Compute the five outputs from in-memory waveforms.
    ///
    /// With `sample_rate` set, both signals are first resampled to it. The
    /// longer signal is truncated to the shorter one; the noise signal is
    /// `noisy - clean` sample by sample.
    pub fn compute(&self, clean: &AudioBuffer, noisy: &AudioBuffer) -> Result<IbmFeatures> {
        let (clean, noisy) = match self.config.sample_rate {
            Some(rate) => (
                Cow::Owned(self.resampler.resample(clean, rate)?),
                Cow::Owned(self.resampler.resample(noisy, rate)?),
            ),
            None => {
                if clean.sample_rate != noisy.sample_rate {
                    bail!(
                        "sample rate mismatch: clean {} Hz, noisy {} Hz",
                        clean.sample_rate,
                        noisy.sample_rate
                    );
                }
                (Cow::Borrowed(clean), Cow::Borrowed(noisy))
            }
        };

        let n = clean.len().min(noisy.len());
        let clean_samples = &clean.samples[..n];
        let noisy_samples = &noisy.samples[..n];
        let noise_samples: Vec<f32> = noisy_samples
            .iter()
            .zip(clean_samples)
            .map(|(y, x)| y - x)
            .collect();

        let noisy_psd = self.stft.power_spectrogram(noisy_samples);
        let clean_psd = self.stft.power_spectrogram(clean_samples);
        let noise_psd = self.stft.power_spectrogram(&noise_samples);
        let (target_mask, noise_mask) =
            ideal_binary_mask(&clean_psd, &noise_psd, self.config.lc_db);

        let n_bins = self.stft.config().n_bins();
        Ok(IbmFeatures {
            noisy_psd: bin_major(noisy_psd, n_bins)?,
            clean_psd: bin_major(clean_psd, n_bins)?,
            noise_psd: bin_major(noise_psd, n_bins)?,
            target_mask: bin_major(target_mask, n_bins)?,
            noise_mask: bin_major(noise_mask, n_bins)?,
        })
    }
}

impl WavToIbm for StftIbm {
    fn convert(&self, clean: &Path, noisy: &Path) -> Result<IbmFeatures> {
        #[cfg(feature = "profiling")]
        let _span = tracing::info_span!("wav_to_ibm").entered();

        tracing::debug!(clean = %clean.display(), noisy = %noisy.display(), "converting pair");
        let clean_audio = load_wav(clean)?;
        let noisy_audio = load_wav(noisy)?;
        self.compute(&clean_audio, &noisy_audio)
            .with_context(|| format!("in {} and {}", clean.display(), noisy.display()))
    }
}

/// Target and noise masks from frame-major clean and noise power spectra.
///
/// A bin is 1 in the target mask when `10 log10(clean / noise) > lc_db`.
pub fn ideal_binary_mask(
    clean_psd: &[Vec<f32>],
    noise_psd: &[Vec<f32>],
    lc_db: f32,
) -> (Vec<Vec<f32>>, Vec<Vec<f32>>) {
    let threshold = 10f32.powf(lc_db / 10.0);
    let target: Vec<Vec<f32>> = clean_psd
        .iter()
        .zip(noise_psd)
        .map(|(x, n)| {
            x.iter()
                .zip(n)
                .map(|(&x, &n)| {
                    if x > threshold * n.max(PSD_FLOOR) {
                        1.0
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect();
    let noise = target
        .iter()
        .map(|frame| frame.iter().map(|m| 1.0 - m).collect())
        .collect();
    (target, noise)
}

/// `[n_frames][n_bins]` rows to a contiguous `[n_bins, n_frames]` tensor.
fn bin_major(frames: Vec<Vec<f32>>, n_bins: usize) -> Result<Tensor> {
    let n_frames = frames.len();
    let flat: Vec<f32> = frames.into_iter().flatten().collect();
    let tensor = Tensor::from_vec(flat, (n_frames, n_bins), &Device::Cpu)?
        .t()?
        .contiguous()?;
    Ok(tensor)
}
