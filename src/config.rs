//! Configuration system for the wav-to-score pipeline

use crate::error::{Result, ScoreError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: String,
    /// WAV recording to transcribe
    pub input_path: PathBuf,
    /// Intermediate Standard MIDI File
    pub midi_output_path: PathBuf,
    /// Final MusicXML document
    pub score_output_path: PathBuf,
    /// Length of every emitted note in seconds
    pub note_duration: f64,
    /// Optional JSON analysis report
    pub report_path: Option<PathBuf>,
    pub pitch: PitchConfig,
    pub quantize: QuantizeConfig,
    pub midi: MidiConfig,
    pub score: ScoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            input_path: PathBuf::from("test.wav"),
            midi_output_path: PathBuf::from("converted.mid"),
            score_output_path: PathBuf::from("converted_musicxml.xml"),
            note_duration: 0.5,
            report_path: None,
            pitch: PitchConfig::default(),
            quantize: QuantizeConfig::default(),
            midi: MidiConfig::default(),
            score: ScoreConfig::default(),
        }
    }
}

/// Spectral pitch tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    pub n_fft: usize,
    pub hop_length: usize,
    pub window: String,
    pub fmin: f32,
    pub fmax: f32,
    /// Fraction of the per-frame spectral maximum a peak must exceed
    pub threshold: f32,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
            window: "hann".to_string(),
            fmin: 150.0,
            fmax: 4000.0,
            threshold: 0.1,
        }
    }
}

/// Note quantizer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizeConfig {
    /// Collapse consecutive identical pitches into one longer note
    pub merge_repeated: bool,
}

/// MIDI synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiConfig {
    pub ticks_per_quarter: u16,
    pub tempo_bpm: f64,
    pub program: u8,
    pub channel: u8,
    pub velocity: u8,
    pub track_name: String,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            ticks_per_quarter: 220,
            tempo_bpm: 120.0,
            program: 0, // Acoustic Grand Piano
            channel: 0,
            velocity: 100,
            track_name: "Acoustic Grand Piano".to_string(),
        }
    }
}

/// MusicXML output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    pub title: String,
    pub part_name: String,
    /// Attach the estimated key signature to the first measure
    pub write_key_signature: bool,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            title: "Transcription".to_string(),
            part_name: "Piano".to_string(),
            write_key_signature: true,
        }
    }
}

/// Check a configuration for values the pipeline cannot work with
pub fn validate_config(config: &Config) -> Result<()> {
    if !(config.note_duration.is_finite() && config.note_duration > 0.0) {
        return Err(ScoreError::ConfigValidation(format!(
            "note_duration must be positive, got {}",
            config.note_duration
        )));
    }

    let pitch = &config.pitch;
    if pitch.n_fft < 4 || pitch.hop_length == 0 {
        return Err(ScoreError::ConfigValidation(
            "pitch.n_fft must be >= 4 and pitch.hop_length > 0".to_string(),
        ));
    }
    if !(pitch.fmin >= 0.0 && pitch.fmin < pitch.fmax) {
        return Err(ScoreError::ConfigValidation(format!(
            "pitch band is empty: fmin={} fmax={}",
            pitch.fmin, pitch.fmax
        )));
    }
    if !(0.0..1.0).contains(&pitch.threshold) {
        return Err(ScoreError::ConfigValidation(format!(
            "pitch.threshold must be in [0, 1), got {}",
            pitch.threshold
        )));
    }

    let midi = &config.midi;
    if midi.ticks_per_quarter == 0 || midi.ticks_per_quarter > 0x7fff {
        return Err(ScoreError::ConfigValidation(format!(
            "midi.ticks_per_quarter out of range: {}",
            midi.ticks_per_quarter
        )));
    }
    if !(midi.tempo_bpm.is_finite() && midi.tempo_bpm > 0.0) {
        return Err(ScoreError::ConfigValidation(format!(
            "midi.tempo_bpm must be positive, got {}",
            midi.tempo_bpm
        )));
    }
    if crate::midi::tempo_to_uspq(midi.tempo_bpm).is_none() {
        return Err(ScoreError::ConfigValidation(format!(
            "midi.tempo_bpm {} is outside the range a MIDI tempo event can store",
            midi.tempo_bpm
        )));
    }
    if midi.program > 127 || midi.velocity > 127 || midi.channel > 15 {
        return Err(ScoreError::ConfigValidation(
            "midi.program/velocity must be <= 127 and midi.channel <= 15".to_string(),
        ));
    }

    Ok(())
}

/// Load configuration from JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Save configuration to JSON file
pub fn save_config<P: AsRef<Path>>(config: &Config, path: P) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
