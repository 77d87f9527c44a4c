//! Error types for the transcription pipeline

use thiserror::Error;

/// Errors raised by the wav-to-score pipeline
#[derive(Debug, Clone, Error)]
pub enum ScoreError {
    /// E001: Audio file layout or extension is not supported
    #[error("E001: Invalid audio format - {0}")]
    InvalidAudioFormat(String),
    /// E002: Audio file I/O error
    #[error("E002: Audio file I/O error - {0}")]
    AudioFile(String),
    /// E003: Input validation error
    #[error("E003: Input validation error - {0}")]
    InputValidation(String),
    /// E004: Pitch tracker rejected its input or parameters
    #[error("E004: Pitch tracking error - {0}")]
    PitchTracking(String),
    /// E005: Quantizer produced no notes
    #[error("E005: No notes detected in the audio")]
    NoNotesDetected,
    /// E006: MIDI encode or write error
    #[error("E006: MIDI export error - {0}")]
    MidiExport(String),
    /// E007: Anything that goes wrong between the MIDI file and the MusicXML file
    #[error("E007: MIDI to MusicXML conversion error - {0}")]
    Conversion(String),
    /// E008: Configuration validation failed
    #[error("E008: Configuration validation failed - {0}")]
    ConfigValidation(String),
    /// E009: Analysis report export error
    #[error("E009: Analysis report export error - {0}")]
    ReportExport(String),
}

impl From<std::io::Error> for ScoreError {
    fn from(err: std::io::Error) -> Self {
        ScoreError::AudioFile(format!("File I/O error: {}", err))
    }
}

impl From<hound::Error> for ScoreError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => ScoreError::AudioFile(e.to_string()),
            other => ScoreError::InvalidAudioFormat(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ScoreError {
    fn from(err: serde_json::Error) -> Self {
        ScoreError::ReportExport(format!("JSON serialization error: {}", err))
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, ScoreError>;
