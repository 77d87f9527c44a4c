//! Validation tests for spectral pitch tracking

use std::f32::consts::PI;
use wav2score::config::PitchConfig;
use wav2score::quantize::quantize_frames;
use wav2score::{PiptrackExtractor, PitchExtractor, ScoreError, Waveform};

const SR: u32 = 22050;

/// Generate a sine tone with 50 ms raised-cosine fades and optional white noise
fn sine(freq: f32, seconds: f32, noise_level: f32) -> Vec<f32> {
    let n = (seconds * SR as f32) as usize;
    let fade = (0.05 * SR as f32) as usize;
    (0..n)
        .map(|i| {
            let edge = i.min(n - 1 - i);
            let gain = if edge < fade {
                0.5 - 0.5 * (PI * edge as f32 / fade as f32).cos()
            } else {
                1.0
            };
            let tone = 0.5 * gain * (2.0 * PI * freq * i as f32 / SR as f32).sin();
            let noise = (rand::random::<f32>() - 0.5) * 2.0 * noise_level;
            tone + noise
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        let waveform = Waveform::new(sine(440.0, 1.0, 0.0), SR).unwrap();
        let table = PiptrackExtractor::default().extract(&waveform).unwrap();
        assert_eq!(table.n_candidates(), 1025);
        assert_eq!(table.n_frames(), 1 + SR as usize / 512);
        assert_eq!(table.hop_length(), 512);
    }

    #[test]
    fn test_a4_sine_quantizes_to_69() {
        let waveform = Waveform::new(sine(440.0, 1.0, 0.0), SR).unwrap();
        let table = PiptrackExtractor::default().extract(&waveform).unwrap();
        let notes = quantize_frames(&table).unwrap();
        assert_eq!(notes.len(), table.n_frames());
        // Frames straddling the fades may wobble by a semitone, the body may not
        let n = notes.len();
        assert!(notes[2..n - 2].iter().all(|&note| note == 69), "notes: {:?}", notes);
        assert!(notes.iter().all(|&note| (68..=70).contains(&note)), "notes: {:?}", notes);
    }

    #[test]
    fn test_interpolated_frequency_is_close() {
        let waveform = Waveform::new(sine(523.25, 1.0, 0.0), SR).unwrap();
        let table = PiptrackExtractor::default().extract(&waveform).unwrap();
        // A frame well inside the signal
        let t = 20;
        let column = table.magnitudes().column(t);
        let best = column
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |acc, (i, &m)| if m > acc.1 { (i, m) } else { acc });
        let freq = table.frequencies()[[best.0, t]];
        assert!((freq - 523.25).abs() < 5.0, "tracked {} Hz", freq);
    }

    #[test]
    fn test_noisy_tone_still_tracked() {
        let waveform = Waveform::new(sine(659.25, 1.0, 0.02), SR).unwrap();
        let table = PiptrackExtractor::default().extract(&waveform).unwrap();
        let notes = quantize_frames(&table).unwrap();
        let hits = notes.iter().filter(|&&n| n == 76).count();
        assert!(hits as f32 >= 0.9 * notes.len() as f32);
    }

    #[test]
    fn test_tone_below_fmin_is_silence() {
        // 100 Hz sits below the default 150 Hz floor, so no frame is voiced
        let waveform = Waveform::new(sine(100.0, 1.0, 0.0), SR).unwrap();
        let table = PiptrackExtractor::default().extract(&waveform).unwrap();
        assert!(matches!(
            quantize_frames(&table),
            Err(ScoreError::NoNotesDetected)
        ));
    }

    #[test]
    fn test_lower_fmin_admits_bass() {
        let config = PitchConfig {
            fmin: 60.0,
            ..PitchConfig::default()
        };
        let waveform = Waveform::new(sine(110.0, 1.0, 0.0), SR).unwrap();
        let table = PiptrackExtractor::new(config).extract(&waveform).unwrap();
        let notes = quantize_frames(&table).unwrap();
        let hits = notes.iter().filter(|&&n| n == 45).count();
        assert!(hits as f32 >= 0.9 * notes.len() as f32, "notes: {:?}", notes);
    }

    #[test]
    fn test_digital_silence() {
        let waveform = Waveform::new(vec![0.0; SR as usize], SR).unwrap();
        let table = PiptrackExtractor::default().extract(&waveform).unwrap();
        assert!(table.frequencies().iter().all(|&f| f == 0.0));
        assert!(matches!(
            quantize_frames(&table),
            Err(ScoreError::NoNotesDetected)
        ));
    }

    #[test]
    fn test_invalid_band_rejected() {
        let config = PitchConfig {
            fmin: 500.0,
            fmax: 400.0,
            ..PitchConfig::default()
        };
        let waveform = Waveform::new(sine(440.0, 0.1, 0.0), SR).unwrap();
        assert!(matches!(
            PiptrackExtractor::new(config).extract(&waveform),
            Err(ScoreError::PitchTracking(_))
        ));
    }
}
