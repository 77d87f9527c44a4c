//! Pitch-to-note quantization
//!
//! Every frame of a [`PitchFrameTable`] is reduced to its strongest
//! candidate, which is snapped to the nearest equal-tempered semitone.
//! Silent frames are dropped rather than held as rests, and repeated
//! pitches are kept as separate notes.

use crate::error::{Result, ScoreError};
use crate::pitch::PitchFrameTable;
use serde::{Deserialize, Serialize};

/// Reference tuning: A4
pub const A4_HZ: f64 = 440.0;
pub const A4_MIDI: f64 = 69.0;

/// Frame accounting for one quantizer run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantizeStats {
    pub frames: usize,
    pub voiced_frames: usize,
    pub silent_frames: usize,
}

/// Fractional MIDI pitch of a frequency in Hz
pub fn hz_to_midi(frequency: f64) -> f64 {
    A4_MIDI + 12.0 * (frequency / A4_HZ).log2()
}

/// Nearest MIDI note for a frequency, `None` for silence
pub fn frequency_to_note(frequency: f32) -> Option<u8> {
    if !(frequency.is_finite() && frequency > 0.0) {
        return None;
    }
    let note = hz_to_midi(frequency as f64).round_ties_even();
    Some(note.clamp(0.0, 127.0) as u8)
}

/// Index of the strongest candidate in a frame, first one wins ties
fn strongest_candidate(table: &PitchFrameTable, frame: usize) -> Option<usize> {
    let column = table.magnitudes().column(frame);
    let mut best: Option<(usize, f32)> = None;
    for (i, &mag) in column.iter().enumerate() {
        match best {
            Some((_, best_mag)) if mag <= best_mag => {}
            _ if mag.is_nan() => {}
            _ => best = Some((i, mag)),
        }
    }
    best.map(|(i, _)| i)
}

/// Quantize a pitch table into note numbers, also returning frame stats
pub fn quantize_with_stats(table: &PitchFrameTable) -> (Vec<u8>, QuantizeStats) {
    let mut notes = Vec::with_capacity(table.n_frames());
    let mut stats = QuantizeStats {
        frames: table.n_frames(),
        ..QuantizeStats::default()
    };

    for t in 0..table.n_frames() {
        let note = strongest_candidate(table, t)
            .and_then(|i| frequency_to_note(table.frequencies()[[i, t]]));
        match note {
            Some(n) => {
                notes.push(n);
                stats.voiced_frames += 1;
            }
            None => stats.silent_frames += 1,
        }
    }

    log::debug!(
        "Quantized {} frames: {} voiced, {} silent",
        stats.frames,
        stats.voiced_frames,
        stats.silent_frames
    );

    (notes, stats)
}

/// Quantize a pitch table into note numbers, one per voiced frame.
///
/// Fails with [`ScoreError::NoNotesDetected`] when no frame is voiced.
pub fn quantize_frames(table: &PitchFrameTable) -> Result<Vec<u8>> {
    let (notes, _) = quantize_with_stats(table);
    if notes.is_empty() {
        return Err(ScoreError::NoNotesDetected);
    }
    Ok(notes)
}
