//! Transcription report export

use crate::error::{Result, ScoreError};
use crate::key::{Key, Mode};
use crate::Transcription;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete transcription report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionReport {
    pub version: String,
    pub audio_info: AudioInfo,
    pub pitch_tracking: PitchTrackingInfo,
    pub notes: NoteSummary,
    pub key: KeySummary,
    pub outputs: OutputPaths,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioInfo {
    pub duration_seconds: f32,
    pub sample_rate: u32,
    pub total_samples: usize,
    pub rms: f32,
    pub peak: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PitchTrackingInfo {
    pub hop_length: usize,
    pub frames: usize,
    pub voiced_frames: usize,
    pub silent_frames: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteSummary {
    pub count: usize,
    pub lowest: Option<u8>,
    pub highest: Option<u8>,
    pub note_duration_seconds: f64,
    pub total_duration_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeySummary {
    pub name: String,
    pub tonic: u8,
    pub mode: Mode,
    pub fifths: i8,
    pub correlation: f64,
}

impl KeySummary {
    fn new(key: Key, correlation: f64) -> Self {
        Self {
            name: key.to_string(),
            tonic: key.tonic,
            mode: key.mode,
            fifths: key.fifths(),
            correlation,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputPaths {
    pub midi: String,
    pub score: String,
}

/// Build the report structure for a finished run
pub fn build_report(transcription: &Transcription) -> TranscriptionReport {
    let notes = &transcription.notes;
    TranscriptionReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        audio_info: AudioInfo {
            duration_seconds: transcription.duration_sec,
            sample_rate: transcription.sample_rate,
            total_samples: transcription.n_samples,
            rms: transcription.rms,
            peak: transcription.peak,
        },
        pitch_tracking: PitchTrackingInfo {
            hop_length: transcription.hop_length,
            frames: transcription.stats.frames,
            voiced_frames: transcription.stats.voiced_frames,
            silent_frames: transcription.stats.silent_frames,
        },
        notes: NoteSummary {
            count: notes.len(),
            lowest: notes.iter().map(|n| n.pitch).min(),
            highest: notes.iter().map(|n| n.pitch).max(),
            note_duration_seconds: transcription.note_duration,
            total_duration_seconds: notes.last().map_or(0.0, |n| n.end()),
        },
        key: KeySummary::new(transcription.key.key, transcription.key.correlation),
        outputs: OutputPaths {
            midi: transcription.midi_path.display().to_string(),
            score: transcription.score_path.display().to_string(),
        },
    }
}

/// Write the report as pretty JSON
pub fn export_report(transcription: &Transcription, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| ScoreError::ReportExport(format!("{}: {}", parent.display(), e)))?;
    }

    let report = build_report(transcription);
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(path, json)
        .map_err(|e| ScoreError::ReportExport(format!("{}: {}", path.display(), e)))?;

    log::info!("Exported analysis report to {}", path.display());
    Ok(())
}
