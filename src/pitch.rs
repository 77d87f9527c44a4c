//! Frame-wise pitch candidate extraction
//!
//! A [`PitchExtractor`] turns a [`Waveform`] into a [`PitchFrameTable`]: for
//! every analysis frame, a column of candidate frequencies with their
//! magnitudes. The default [`PiptrackExtractor`] picks spectral peaks and
//! refines them by parabolic interpolation.

use crate::audio::Waveform;
use crate::config::PitchConfig;
use crate::error::{Result, ScoreError};
use crate::spectral::{fft_frequencies, magnitude_spectrogram, stft};
use ndarray::Array2;

/// Candidate frequencies and magnitudes indexed by (candidate, frame)
#[derive(Debug, Clone, PartialEq)]
pub struct PitchFrameTable {
    frequencies: Array2<f32>,
    magnitudes: Array2<f32>,
    sample_rate: u32,
    hop_length: usize,
}

impl PitchFrameTable {
    pub fn new(
        frequencies: Array2<f32>,
        magnitudes: Array2<f32>,
        sample_rate: u32,
        hop_length: usize,
    ) -> Result<Self> {
        if frequencies.shape() != magnitudes.shape() {
            return Err(ScoreError::PitchTracking(format!(
                "frequency table {:?} and magnitude table {:?} differ in shape",
                frequencies.shape(),
                magnitudes.shape()
            )));
        }
        Ok(Self {
            frequencies,
            magnitudes,
            sample_rate,
            hop_length,
        })
    }

    /// Build a table from per-frame `(frequency, magnitude)` columns.
    ///
    /// Every frame must list the same number of candidates.
    pub fn from_frames(frames: &[Vec<(f32, f32)>], sample_rate: u32, hop_length: usize) -> Result<Self> {
        let n_candidates = frames.first().map_or(0, Vec::len);
        let mut frequencies = Array2::<f32>::zeros((n_candidates, frames.len()));
        let mut magnitudes = Array2::<f32>::zeros((n_candidates, frames.len()));

        for (t, frame) in frames.iter().enumerate() {
            if frame.len() != n_candidates {
                return Err(ScoreError::PitchTracking(format!(
                    "frame {} has {} candidates, expected {}",
                    t,
                    frame.len(),
                    n_candidates
                )));
            }
            for (i, &(freq, mag)) in frame.iter().enumerate() {
                frequencies[[i, t]] = freq;
                magnitudes[[i, t]] = mag;
            }
        }

        Self::new(frequencies, magnitudes, sample_rate, hop_length)
    }

    pub fn frequencies(&self) -> &Array2<f32> {
        &self.frequencies
    }

    pub fn magnitudes(&self) -> &Array2<f32> {
        &self.magnitudes
    }

    pub fn n_candidates(&self) -> usize {
        self.frequencies.shape()[0]
    }

    pub fn n_frames(&self) -> usize {
        self.frequencies.shape()[1]
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    /// Start time of a frame in seconds
    pub fn frame_time(&self, frame: usize) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        (frame * self.hop_length) as f64 / self.sample_rate as f64
    }
}

/// A pitch tracking backend
pub trait PitchExtractor {
    fn extract(&self, waveform: &Waveform) -> Result<PitchFrameTable>;
}

/// Spectral peak tracker with parabolic interpolation
#[derive(Debug, Clone)]
pub struct PiptrackExtractor {
    config: PitchConfig,
}

impl PiptrackExtractor {
    pub fn new(config: PitchConfig) -> Self {
        Self { config }
    }

    fn check(&self, waveform: &Waveform) -> Result<()> {
        let c = &self.config;
        if waveform.is_empty() {
            return Err(ScoreError::PitchTracking("waveform is empty".to_string()));
        }
        if waveform.sample_rate() == 0 {
            return Err(ScoreError::PitchTracking("sample rate is zero".to_string()));
        }
        if c.n_fft < 4 || c.hop_length == 0 {
            return Err(ScoreError::PitchTracking(format!(
                "invalid frame layout n_fft={} hop_length={}",
                c.n_fft, c.hop_length
            )));
        }
        if !(c.fmin >= 0.0 && c.fmin < c.fmax) {
            return Err(ScoreError::PitchTracking(format!(
                "empty frequency band fmin={} fmax={}",
                c.fmin, c.fmax
            )));
        }
        Ok(())
    }
}

impl Default for PiptrackExtractor {
    fn default() -> Self {
        Self::new(PitchConfig::default())
    }
}

impl PitchExtractor for PiptrackExtractor {
    fn extract(&self, waveform: &Waveform) -> Result<PitchFrameTable> {
        self.check(waveform)?;
        let c = &self.config;
        let sr = waveform.sample_rate();

        log::debug!(
            "Tracking pitch: {} samples at {} Hz (n_fft={}, hop={})",
            waveform.n_samples(),
            sr,
            c.n_fft,
            c.hop_length
        );

        let spec = stft(waveform.samples(), c.n_fft, c.hop_length, &c.window, sr);
        let mags = magnitude_spectrogram(&spec);
        let (frequencies, magnitudes) = piptrack(&mags, sr, c);

        PitchFrameTable::new(frequencies, magnitudes, sr, c.hop_length)
    }
}

/// Pick interpolated spectral peaks from a magnitude spectrogram
pub fn piptrack(s: &Array2<f32>, sample_rate: u32, config: &PitchConfig) -> (Array2<f32>, Array2<f32>) {
    let (n_bins, n_frames) = s.dim();
    let n_fft = (n_bins - 1) * 2;
    let mut pitches = Array2::<f32>::zeros((n_bins, n_frames));
    let mut mags = Array2::<f32>::zeros((n_bins, n_frames));
    if n_bins < 3 {
        return (pitches, mags);
    }

    let fmin = config.fmin.max(0.0);
    let fmax = config.fmax.min(sample_rate as f32 / 2.0);
    let freqs = fft_frequencies(sample_rate, n_fft);
    let in_band: Vec<bool> = freqs.iter().map(|&f| fmin <= f && f < fmax).collect();
    let bin_hz = sample_rate as f32 / n_fft as f32;

    for t in 0..n_frames {
        let column = s.column(t);
        let ref_value = config.threshold * column.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        let gated: Vec<f32> = column
            .iter()
            .map(|&v| if v > ref_value { v } else { 0.0 })
            .collect();

        for i in 0..n_bins {
            if !in_band[i] || !is_local_max(&gated, i) {
                continue;
            }
            let (shift, dskew) = if i == 0 || i + 1 == n_bins {
                (0.0, 0.0)
            } else {
                let avg = 0.5 * (column[i + 1] - column[i - 1]);
                let mut curvature = 2.0 * column[i] - column[i + 1] - column[i - 1];
                if curvature.abs() < f32::MIN_POSITIVE {
                    curvature += 1.0;
                }
                let shift = avg / curvature;
                (shift, 0.5 * avg * shift)
            };
            pitches[[i, t]] = (i as f32 + shift) * bin_hz;
            mags[[i, t]] = column[i] + dskew;
        }
    }

    (pitches, mags)
}

/// Strictly above the previous bin and not below the next, edges compared with themselves
fn is_local_max(x: &[f32], i: usize) -> bool {
    let prev = if i == 0 { x[i] } else { x[i - 1] };
    let next = if i + 1 == x.len() { x[i] } else { x[i + 1] };
    x[i] > prev && x[i] >= next
}
