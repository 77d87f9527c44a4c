//! Audio loading and waveform utilities

use crate::error::{Result, ScoreError};
use hound::WavReader;
use std::path::Path;

/// Mono waveform with its sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    /// Audio samples (mono, normalized to [-1, 1])
    samples: Vec<f32>,
    /// Sample rate in Hz
    sample_rate: u32,
}

impl Waveform {
    /// Wrap already-decoded mono samples
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(ScoreError::InputValidation(
                "sample rate must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Load a WAV file, down-mixing to mono
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        validate_audio_path(path)?;
        let (samples, sample_rate) = load_wav_file(path)?;
        log::debug!(
            "Loaded {} samples at {} Hz from {}",
            samples.len(),
            sample_rate,
            path.display()
        );
        Self::new(samples, sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get audio duration in seconds
    pub fn duration_sec(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Get number of samples
    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Check that the input exists and carries a WAV extension
pub fn validate_audio_path(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(ScoreError::InputValidation(format!(
            "Audio file does not exist: {}",
            path.display()
        )));
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();
    if extension != "wav" && extension != "wave" {
        return Err(ScoreError::InvalidAudioFormat(format!(
            "Unsupported audio format: {}",
            extension
        )));
    }

    Ok(())
}

/// Load WAV file and return mono samples with sample rate
fn load_wav_file(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();

    if spec.channels == 0 {
        return Err(ScoreError::InvalidAudioFormat(
            "WAV header declares zero channels".to_string(),
        ));
    }

    let mut samples: Vec<f32> = Vec::with_capacity(reader.len() as usize);
    match spec.sample_format {
        hound::SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(ScoreError::InvalidAudioFormat(format!(
                    "Unsupported bit depth: {}",
                    spec.bits_per_sample
                )));
            }
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            for sample in reader.samples::<i32>() {
                samples.push(sample? as f32 / max_value);
            }
        }
        hound::SampleFormat::Float => {
            for sample in reader.samples::<f32>() {
                samples.push(sample?);
            }
        }
    }

    Ok((mix_to_mono(&samples, spec.channels as usize), spec.sample_rate))
}

/// Average interleaved channels into a single channel
pub fn mix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Root-mean-square level of a signal
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|&x| x * x).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Absolute peak level of a signal
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()))
}
