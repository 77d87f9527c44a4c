//! Validation tests for pitch-to-note quantization and note scheduling

use wav2score::midi::schedule_notes;
use wav2score::quantize::{frequency_to_note, hz_to_midi, quantize_frames, quantize_with_stats};
use wav2score::{PitchFrameTable, ScoreError};

fn table(frames: &[Vec<(f32, f32)>]) -> PitchFrameTable {
    PitchFrameTable::from_frames(frames, 22050, 512).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_a4_frame() {
        let t = table(&[vec![(440.0, 1.0)]]);
        assert_eq!(quantize_frames(&t).unwrap(), vec![69]);
    }

    #[test]
    fn test_silent_middle_frame_dropped() {
        let t = table(&[vec![(440.0, 1.0)], vec![(0.0, 0.9)], vec![(880.0, 0.5)]]);
        assert_eq!(quantize_frames(&t).unwrap(), vec![69, 81]);
    }

    #[test]
    fn test_negative_frequency_is_silence() {
        let t = table(&[vec![(-440.0, 1.0)], vec![(220.0, 0.2)]]);
        let (notes, stats) = quantize_with_stats(&t);
        assert_eq!(notes, vec![57]);
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.silent_frames, 1);
    }

    #[test]
    fn test_formula_over_the_audible_range() {
        let mut f = 20.0f32;
        while f < 20_000.0 {
            let expected = (69.0 + 12.0 * (f as f64 / 440.0).log2())
                .round_ties_even()
                .clamp(0.0, 127.0) as u8;
            assert_eq!(frequency_to_note(f), Some(expected), "frequency {}", f);
            f *= 1.037;
        }
    }

    #[test]
    fn test_boundaries_clamp() {
        // MIDI 0 is about 8.18 Hz, MIDI 127 about 12543.85 Hz
        assert_eq!(frequency_to_note(2.0), Some(0));
        assert_eq!(frequency_to_note(8.18), Some(0));
        assert_eq!(frequency_to_note(12_543.85), Some(127));
        assert_eq!(frequency_to_note(30_000.0), Some(127));
        assert!((hz_to_midi(440.0) - 69.0).abs() < 1e-12);
        assert!((hz_to_midi(880.0) - 81.0).abs() < 1e-12);
    }

    #[test]
    fn test_all_silence_reports_no_notes() {
        let t = table(&vec![vec![(0.0, 1.0), (0.0, 0.5)]; 8]);
        assert!(matches!(quantize_frames(&t), Err(ScoreError::NoNotesDetected)));
    }

    #[test]
    fn test_schedule_n_notes() {
        let pitches: Vec<u8> = (0..17).map(|k| 50 + (k % 12) as u8).collect();
        let notes = schedule_notes(&pitches, 0.5, false);
        assert_eq!(notes.len(), pitches.len());
        for (k, note) in notes.iter().enumerate() {
            assert_eq!(note.pitch, pitches[k]);
            assert!((note.start - 0.5 * k as f64).abs() < 1e-9);
            assert!((note.duration - 0.5).abs() < 1e-12);
        }
        assert!(notes.windows(2).all(|w| (w[0].end() - w[1].start).abs() < 1e-9));
    }

    #[test]
    fn test_schedule_empty() {
        assert!(schedule_notes(&[], 0.5, false).is_empty());
    }
}
