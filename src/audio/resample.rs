//! Audio resampling using rubato
//!
//! Brings clean/noisy pairs recorded at another rate to the rate the mask
//! settings expect.

use anyhow::{Context, Result};
use rubato::{
    audioadapter::Adapter, Async, FixedAsync, PolynomialDegree, Resampler as RubatoResampler,
    SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::AudioBuffer;

const CHUNK_SIZE: usize = 1024;

/// Resampling quality preset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResampleQuality {
    /// Cubic polynomial interpolation
    Fast,
    /// Sinc interpolation, 128 taps
    #[default]
    Normal,
    /// Sinc interpolation, 256 taps
    High,
}

/// Audio resampler
#[derive(Debug, Clone, Default)]
pub struct Resampler {
    quality: ResampleQuality,
}

impl Resampler {
    pub fn new(quality: ResampleQuality) -> Self {
        Self { quality }
    }

    pub fn quality(&self) -> ResampleQuality {
        self.quality
    }

    /// Resample audio to `target_rate`.
    ///
    /// The output holds exactly `round(len * target_rate / source_rate)`
    /// samples, so two equally long inputs stay equally long.
    pub fn resample(&self, audio: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer> {
        if audio.sample_rate == target_rate {
            return Ok(audio.clone());
        }
        if audio.is_empty() {
            return Ok(AudioBuffer::new(Vec::new(), target_rate));
        }

        let ratio = target_rate as f64 / audio.sample_rate as f64;
        let expected_len = (audio.len() as f64 * ratio).round() as usize;

        let mut samples = match self.quality {
            ResampleQuality::Fast => self.resample_fast(&audio.samples, ratio)?,
            ResampleQuality::Normal | ResampleQuality::High => {
                self.resample_sinc(&audio.samples, ratio)?
            }
        };
        samples.resize(expected_len, 0.0);

        Ok(AudioBuffer::new(samples, target_rate))
    }

    fn resample_fast(&self, samples: &[f32], ratio: f64) -> Result<Vec<f32>> {
        let mut resampler = Async::<f32>::new_poly(
            ratio,
            1.0,
            PolynomialDegree::Cubic,
            CHUNK_SIZE,
            1, // mono
            FixedAsync::Input,
        )
        .context("Failed to create fast resampler")?;

        self.process_chunks(&mut resampler, samples)
    }

    fn resample_sinc(&self, samples: &[f32], ratio: f64) -> Result<Vec<f32>> {
        let taps = if self.quality == ResampleQuality::High {
            256
        } else {
            128
        };
        let params = SincInterpolationParameters {
            sinc_len: taps,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: taps,
            window: WindowFunction::BlackmanHarris2,
        };

        let mut resampler = Async::<f32>::new_sinc(
            ratio,
            1.0,
            &params,
            CHUNK_SIZE,
            1, // mono
            FixedAsync::Input,
        )
        .context("Failed to create sinc resampler")?;

        self.process_chunks(&mut resampler, samples)
    }

    /// Feed fixed-size chunks, zero-padding the last one.
    fn process_chunks<R: RubatoResampler<f32>>(
        &self,
        resampler: &mut R,
        samples: &[f32],
    ) -> Result<Vec<f32>> {
        use audioadapter_buffers::direct::SequentialSliceOfVecs;

        let mut output = Vec::new();

        for chunk in samples.chunks(CHUNK_SIZE) {
            let mut data = chunk.to_vec();
            data.resize(CHUNK_SIZE, 0.0);

            let input_vecs = vec![data];
            let input = SequentialSliceOfVecs::new(&input_vecs, 1, CHUNK_SIZE)
                .context("Failed to create input adapter")?;

            let result = resampler
                .process(&input, 0, None)
                .context("Resampling failed")?;

            for i in 0..result.frames() {
                output.push(result.read_sample(0, i).unwrap_or(0.0));
            }
        }

        Ok(output)
    }
}

/// Resample with the default quality
pub fn resample(audio: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer> {
    Resampler::default().resample(audio, target_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_resample_quality_default() {
        assert_eq!(Resampler::default().quality(), ResampleQuality::Normal);
    }

    #[test]
    fn test_no_resample_needed() {
        let audio = AudioBuffer::new(vec![0.25; 1000], 16000);
        let result = resample(&audio, 16000).unwrap();
        assert_eq!(result.sample_rate, 16000);
        assert_eq!(result.samples, audio.samples);
    }

    #[test]
    fn test_downsample_exact_length() {
        let audio = AudioBuffer::new(vec![0.0; 16000], 16000);
        let result = resample(&audio, 8000).unwrap();
        assert_eq!(result.sample_rate, 8000);
        assert_eq!(result.len(), 8000);
    }

    #[test]
    fn test_upsample_exact_length() {
        let audio = AudioBuffer::new(vec![0.0; 1600], 8000);
        let result = resample(&audio, 16000).unwrap();
        assert_eq!(result.sample_rate, 16000);
        assert_eq!(result.len(), 3200);
    }

    #[test]
    fn test_every_quality_keeps_length() {
        let audio = AudioBuffer::new(vec![0.0; 4410], 44100);
        for quality in [
            ResampleQuality::Fast,
            ResampleQuality::Normal,
            ResampleQuality::High,
        ] {
            let result = Resampler::new(quality).resample(&audio, 16000).unwrap();
            assert_eq!(result.len(), 1600, "{quality:?}");
        }
    }

    #[test]
    fn test_resample_preserves_sine_wave() {
        let freq = 100.0;
        let audio = AudioBuffer::new(
            (0..16000)
                .map(|i| (2.0 * PI * freq * i as f32 / 16000.0).sin())
                .collect(),
            16000,
        );

        let result = resample(&audio, 8000).unwrap();
        let max_val = result
            .samples
            .iter()
            .map(|s| s.abs())
            .fold(0.0f32, f32::max);
        assert!(max_val > 0.5);
    }

    #[test]
    fn test_resample_empty_audio() {
        let audio = AudioBuffer::new(vec![], 16000);
        let result = resample(&audio, 8000).unwrap();
        assert_eq!(result.sample_rate, 8000);
        assert!(result.is_empty());
    }
}
