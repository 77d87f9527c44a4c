//! Spectral processing utilities (STFT, windows, magnitudes)

use ndarray::Array2;
use rustfft::{num_complex::Complex32, FftPlanner};

/// STFT data structure
#[derive(Debug, Clone)]
pub struct StftData {
    pub s: Array2<Complex32>,
    pub freqs: Vec<f32>,
    pub times: Vec<f32>,
}

/// Compute a centered STFT of an audio signal.
///
/// The signal is zero-padded by `n_fft / 2` on both sides so frame `t` is
/// centered on sample `t * hop_length`; the frame count is
/// `1 + y.len() / hop_length`.
pub fn stft(y: &[f32], n_fft: usize, hop_length: usize, window: &str, sample_rate: u32) -> StftData {
    let pad = n_fft / 2;
    let mut padded = vec![0.0f32; y.len() + 2 * pad];
    padded[pad..pad + y.len()].copy_from_slice(y);

    let n_frames = (padded.len() - n_fft) / hop_length + 1;
    let n_bins = n_fft / 2 + 1;
    let mut s = Array2::<Complex32>::zeros((n_bins, n_frames));

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n_fft);
    let window_fn = generate_window(window, n_fft);
    let mut frame = vec![Complex32::new(0.0, 0.0); n_fft];

    for frame_idx in 0..n_frames {
        let start = frame_idx * hop_length;
        let chunk = &padded[start..start + n_fft];

        for (slot, (&sample, &win)) in frame.iter_mut().zip(chunk.iter().zip(&window_fn)) {
            *slot = Complex32::new(sample * win, 0.0);
        }

        fft.process(&mut frame);

        // Store positive frequencies
        for (i, &val) in frame[..n_bins].iter().enumerate() {
            s[[i, frame_idx]] = val;
        }
    }

    let freqs = fft_frequencies(sample_rate, n_fft);
    let times: Vec<f32> = (0..n_frames)
        .map(|i| i as f32 * hop_length as f32 / sample_rate as f32)
        .collect();

    StftData { s, freqs, times }
}

/// Center frequency of every non-negative FFT bin
pub fn fft_frequencies(sample_rate: u32, n_fft: usize) -> Vec<f32> {
    (0..n_fft / 2 + 1)
        .map(|i| i as f32 * sample_rate as f32 / n_fft as f32)
        .collect()
}

/// Generate window function
pub fn generate_window(window_type: &str, size: usize) -> Vec<f32> {
    match window_type {
        // Periodic Hann, the spectral-analysis variant
        "hann" => (0..size)
            .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos())
            .collect(),
        _ => vec![1.0; size], // Rectangular window as fallback
    }
}

/// Compute magnitude spectrogram
pub fn magnitude_spectrogram(stft_data: &StftData) -> Array2<f32> {
    stft_data.s.map(|c| c.norm())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_frame_count_is_centered() {
        let y = vec![0.0f32; 4096];
        let data = stft(&y, 2048, 512, "hann", 22050);
        assert_eq!(data.s.shape(), &[1025, 1 + 4096 / 512]);
        assert_eq!(data.times.len(), 9);
    }

    #[test]
    fn test_short_signal_still_yields_frames() {
        let data = stft(&[0.5; 10], 64, 16, "hann", 8000);
        assert_eq!(data.s.shape()[1], 1);
    }

    #[test]
    fn test_sine_peaks_at_expected_bin() {
        let sr = 8000;
        let n_fft = 256;
        // Bin 16 is exactly 500 Hz
        let y: Vec<f32> = (0..4000)
            .map(|i| (2.0 * PI * 500.0 * i as f32 / sr as f32).sin())
            .collect();
        let data = stft(&y, n_fft, 64, "hann", sr);
        let mags = magnitude_spectrogram(&data);
        let column = mags.column(10);
        let (peak_bin, _) = column
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |best, (i, &m)| if m > best.1 { (i, m) } else { best });
        assert_eq!(peak_bin, 16);
        assert!((data.freqs[16] - 500.0).abs() < 1e-3);
    }

    #[test]
    fn test_periodic_hann() {
        let w = generate_window("hann", 4);
        assert!((w[0] - 0.0).abs() < 1e-6);
        assert!((w[2] - 1.0).abs() < 1e-6);
        assert_eq!(generate_window("boxcar", 3), vec![1.0; 3]);
    }
}
