//! Key estimation and pitch spelling
//!
//! Uses the Krumhansl-Schmuckler algorithm: a duration-weighted pitch-class
//! histogram is correlated against the Krumhansl-Kessler tonal profile
//! rotated to each of the 24 major and minor keys.
//!
//! # Reference
//!
//! Krumhansl, C. L., & Kessler, E. J. (1982). Tracing the Dynamic Changes in Perceived
//! Tonal Organization in a Spatial Representation of Musical Keys. *Psychological Review*,
//! 89(4), 334-368.

use crate::score::Score;
use serde::{Deserialize, Serialize};
use std::fmt;

const SHARP_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
const FLAT_NAMES: [&str; 12] = ["C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B"];

/// Circle-of-fifths position of the major key on each pitch class
const MAJOR_FIFTHS: [i8; 12] = [0, -5, 2, -3, 4, -1, 6, 1, -4, 3, -2, 5];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Major,
    Minor,
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Major => "major",
            Mode::Minor => "minor",
        }
    }
}

/// A musical key: tonic pitch class (0 = C) and mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    pub tonic: u8,
    pub mode: Mode,
}

impl Key {
    pub fn new(tonic: u8, mode: Mode) -> Self {
        Self {
            tonic: tonic % 12,
            mode,
        }
    }

    /// Sharps (positive) or flats (negative) in the key signature
    pub fn fifths(&self) -> i8 {
        match self.mode {
            Mode::Major => MAJOR_FIFTHS[self.tonic as usize],
            // Relative major sits a minor third above
            Mode::Minor => MAJOR_FIFTHS[((self.tonic + 3) % 12) as usize],
        }
    }

    pub fn tonic_name(&self) -> &'static str {
        pitch_class_name(self.tonic, self.fifths())
    }
}

impl Default for Key {
    fn default() -> Self {
        Key::new(0, Mode::Major)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tonic_name(), self.mode.name())
    }
}

/// Tonal profiles indexed from the tonic
#[derive(Debug, Clone)]
pub struct KeyProfiles {
    pub major: [f64; 12],
    pub minor: [f64; 12],
}

impl KeyProfiles {
    pub fn krumhansl_kessler() -> Self {
        Self {
            major: [6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88],
            minor: [6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17],
        }
    }

    /// Profile for `key`, indexed by absolute pitch class
    pub fn rotated(&self, key: Key) -> [f64; 12] {
        let base = match key.mode {
            Mode::Major => &self.major,
            Mode::Minor => &self.minor,
        };
        let mut out = [0.0; 12];
        for (pc, slot) in out.iter_mut().enumerate() {
            *slot = base[(pc + 12 - key.tonic as usize) % 12];
        }
        out
    }
}

impl Default for KeyProfiles {
    fn default() -> Self {
        Self::krumhansl_kessler()
    }
}

/// Outcome of key estimation, all 24 candidates ranked best first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEstimate {
    pub key: Key,
    pub correlation: f64,
    pub ranked: Vec<(Key, f64)>,
}

/// Pitch-class histogram weighted by note duration in quarter notes
pub fn pitch_class_distribution(score: &Score) -> [f64; 12] {
    let mut histogram = [0.0; 12];
    for note in score.notes() {
        histogram[(note.pitch % 12) as usize] += score.quarter_length(note.duration_ticks);
    }
    histogram
}

/// Estimate the key of a score
pub fn estimate_key(score: &Score) -> KeyEstimate {
    estimate_key_from_distribution(&pitch_class_distribution(score), &KeyProfiles::default())
}

/// Correlate a pitch-class distribution against all 24 keys.
///
/// A flat distribution correlates with nothing; the estimate then falls back
/// to C major with every correlation at zero.
pub fn estimate_key_from_distribution(
    distribution: &[f64; 12],
    profiles: &KeyProfiles,
) -> KeyEstimate {
    log::debug!("Estimating key from distribution {:?}", distribution);

    let mut ranked = Vec::with_capacity(24);
    let mut undefined = false;
    for mode in [Mode::Major, Mode::Minor] {
        for tonic in 0..12u8 {
            let key = Key::new(tonic, mode);
            let r = pearson(distribution, &profiles.rotated(key)).unwrap_or_else(|| {
                undefined = true;
                0.0
            });
            ranked.push((key, r));
        }
    }

    if undefined {
        log::warn!("Pitch-class distribution is flat, falling back to {}", Key::default());
        for entry in ranked.iter_mut() {
            entry.1 = 0.0;
        }
        return KeyEstimate {
            key: Key::default(),
            correlation: 0.0,
            ranked,
        };
    }

    // Stable sort keeps majors before minors and lower tonics first on ties
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let (key, correlation) = ranked[0];

    KeyEstimate {
        key,
        correlation,
        ranked,
    }
}

/// Pearson correlation, `None` when either side has no variance
fn pearson(a: &[f64; 12], b: &[f64; 12]) -> Option<f64> {
    let mean_a = a.iter().sum::<f64>() / 12.0;
    let mean_b = b.iter().sum::<f64>() / 12.0;
    let mut num = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        num += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a).powi(2);
        var_b += (y - mean_b).powi(2);
    }
    let denom = (var_a * var_b).sqrt();
    if denom <= f64::EPSILON {
        None
    } else {
        Some(num / denom)
    }
}

/// Name of a pitch class, sharps for sharp keys and flats for flat keys
pub fn pitch_class_name(pc: u8, fifths: i8) -> &'static str {
    if fifths < 0 {
        FLAT_NAMES[(pc % 12) as usize]
    } else {
        SHARP_NAMES[(pc % 12) as usize]
    }
}

/// Written form of a MIDI pitch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpelledPitch {
    pub step: char,
    pub alter: i8,
    pub octave: i8,
}

/// Spell a MIDI note in the context of a key signature
pub fn spell_pitch(midi: u8, fifths: i8) -> SpelledPitch {
    let name = pitch_class_name(midi % 12, fifths);
    let mut chars = name.chars();
    let step = chars.next().unwrap_or('C');
    let alter = match chars.next() {
        Some('#') => 1,
        Some('b') => -1,
        _ => 0,
    };
    SpelledPitch {
        step,
        alter,
        octave: (midi / 12) as i8 - 1,
    }
}

/// Spell a MIDI note for `key`, written against a signature of `fifths`.
///
/// The raised leading tone of a minor key is spelled as a sharp even in flat
/// keys, so D minor writes C# rather than Db.
pub fn spell_in_key(midi: u8, key: &Key, fifths: i8) -> SpelledPitch {
    if key.mode == Mode::Minor && midi % 12 == (key.tonic + 11) % 12 {
        return spell_pitch(midi, fifths.max(0));
    }
    spell_pitch(midi, fifths)
}

/// Alteration the key signature applies to a step
pub fn key_signature_alter(step: char, fifths: i8) -> i8 {
    const SHARP_ORDER: [char; 7] = ['F', 'C', 'G', 'D', 'A', 'E', 'B'];
    const FLAT_ORDER: [char; 7] = ['B', 'E', 'A', 'D', 'G', 'C', 'F'];
    if fifths > 0 {
        let n = fifths.min(7) as usize;
        if SHARP_ORDER[..n].contains(&step) {
            return 1;
        }
    } else if fifths < 0 {
        let n = (-fifths).min(7) as usize;
        if FLAT_ORDER[..n].contains(&step) {
            return -1;
        }
    }
    0
}
