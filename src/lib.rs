//! WAV-to-Score Transcription
//!
//! Turns a monophonic recording into a MIDI file and a MusicXML score:
//! spectral pitch tracking, per-frame note quantization, MIDI synthesis and
//! MusicXML engraving with an estimated key signature.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod convert;
pub mod error;
pub mod key;
pub mod midi;
pub mod musicxml;
pub mod pitch;
pub mod quantize;
pub mod score;
pub mod spectral;

pub use audio::Waveform;
pub use config::Config;
pub use error::{Result, ScoreError};
pub use key::{Key, KeyEstimate, Mode};
pub use midi::Note;
pub use musicxml::{MusicXmlWriter, NotationWriter};
pub use pitch::{PiptrackExtractor, PitchExtractor, PitchFrameTable};
pub use quantize::QuantizeStats;

use std::path::{Path, PathBuf};

/// Output of the WAV to MIDI stage
#[derive(Debug, Clone)]
pub struct MidiStage {
    pub notes: Vec<Note>,
    pub stats: QuantizeStats,
    pub hop_length: usize,
    pub sample_rate: u32,
    pub n_samples: usize,
    pub duration_sec: f32,
    pub rms: f32,
    pub peak: f32,
}

/// Everything a successful run produced
#[derive(Debug, Clone)]
pub struct Transcription {
    pub notes: Vec<Note>,
    pub stats: QuantizeStats,
    pub key: KeyEstimate,
    pub hop_length: usize,
    pub sample_rate: u32,
    pub n_samples: usize,
    pub duration_sec: f32,
    pub rms: f32,
    pub peak: f32,
    pub note_duration: f64,
    pub midi_path: PathBuf,
    pub score_path: PathBuf,
}

/// Quantize a waveform into note numbers with the given pitch tracker
pub fn transcribe_waveform(
    waveform: &Waveform,
    extractor: &dyn PitchExtractor,
) -> Result<(Vec<u8>, QuantizeStats)> {
    let table = extractor.extract(waveform)?;
    let (pitches, stats) = quantize::quantize_with_stats(&table);
    if pitches.is_empty() {
        return Err(ScoreError::NoNotesDetected);
    }
    Ok((pitches, stats))
}

/// Main transcription pipeline
pub struct WavToScore {
    config: Config,
    extractor: Box<dyn PitchExtractor>,
    writer: Box<dyn NotationWriter>,
}

impl WavToScore {
    /// Create a pipeline with the default pitch tracker and MusicXML writer
    pub fn new(config: Config) -> Self {
        let extractor = Box::new(PiptrackExtractor::new(config.pitch.clone()));
        let writer = Box::new(MusicXmlWriter::new(config.score.clone()));
        Self {
            config,
            extractor,
            writer,
        }
    }

    /// Swap in another pitch tracking backend
    pub fn with_pitch_extractor<E: PitchExtractor + 'static>(mut self, extractor: E) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    /// Swap in another notation backend
    pub fn with_notation_writer<W: NotationWriter + 'static>(mut self, writer: W) -> Self {
        self.writer = Box::new(writer);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Stage 1 and 2 plus MIDI synthesis: load audio, track pitch, quantize, write MIDI.
    ///
    /// Halts with [`ScoreError::NoNotesDetected`] before any MIDI file is written
    /// when the recording has no voiced frames.
    pub fn wav_to_midi(&self) -> Result<MidiStage> {
        let input = &self.config.input_path;
        log::info!("Loading WAV file: {}", input.display());
        let waveform = Waveform::load(input)?;

        log::info!("Extracting pitches from {:.2}s of audio", waveform.duration_sec());
        let (pitches, stats) = transcribe_waveform(&waveform, self.extractor.as_ref())?;
        log::info!(
            "Quantized {} notes from {} frames ({} silent frames dropped)",
            pitches.len(),
            stats.frames,
            stats.silent_frames
        );

        let notes = midi::schedule_notes(
            &pitches,
            self.config.note_duration,
            self.config.quantize.merge_repeated,
        );
        log::info!("Creating MIDI file...");
        midi::write_midi(&notes, &self.config.midi, &self.config.midi_output_path)?;

        Ok(MidiStage {
            notes,
            stats,
            hop_length: self.config.pitch.hop_length,
            sample_rate: waveform.sample_rate(),
            n_samples: waveform.n_samples(),
            duration_sec: waveform.duration_sec(),
            rms: audio::rms(waveform.samples()),
            peak: audio::peak(waveform.samples()),
        })
    }

    /// Stage 3 second half: MIDI file to MusicXML with an estimated key
    pub fn midi_to_musicxml(&self) -> Result<KeyEstimate> {
        convert::midi_to_notation(
            &self.config.midi_output_path,
            &self.config.score_output_path,
            self.writer.as_ref(),
        )
    }

    /// Run every stage in order, exporting the optional report at the end
    pub fn run(&self) -> Result<Transcription> {
        config::validate_config(&self.config)?;

        let stage = self.wav_to_midi()?;
        let key = self.midi_to_musicxml()?;

        let transcription = Transcription {
            notes: stage.notes,
            stats: stage.stats,
            key,
            hop_length: stage.hop_length,
            sample_rate: stage.sample_rate,
            n_samples: stage.n_samples,
            duration_sec: stage.duration_sec,
            rms: stage.rms,
            peak: stage.peak,
            note_duration: self.config.note_duration,
            midi_path: self.config.midi_output_path.clone(),
            score_path: self.config.score_output_path.clone(),
        };

        if let Some(report_path) = &self.config.report_path {
            analysis::export_report(&transcription, report_path)?;
        }

        Ok(transcription)
    }
}

/// Whether the final score landed on disk, checked independently of `run`
pub fn score_written<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().is_file()
}

/// How a run ended, as reported on the console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The MusicXML file is on disk
    Completed,
    /// No stage failed but the MusicXML file is missing
    ScoreMissing,
    /// Audio loading, pitch tracking, quantization or MIDI export failed
    MidiStageFailed,
    /// MIDI to MusicXML conversion failed
    ConversionFailed,
}

/// Log the result of [`WavToScore::run`] and confirm the score separately.
///
/// Failures are reported, never propagated. A report export failure happens
/// after both files are written, so the existence check still runs.
pub fn report_run(result: &Result<Transcription>, score_path: &Path) -> RunOutcome {
    match result {
        Ok(transcription) => {
            log::info!(
                "Transcribed {} notes in {}",
                transcription.notes.len(),
                transcription.key.key
            );
        }
        Err(e @ ScoreError::Conversion(_)) => {
            log::error!("{}", e);
            log::error!("MIDI to MusicXML conversion failed.");
            return RunOutcome::ConversionFailed;
        }
        Err(e @ ScoreError::ReportExport(_)) => {
            log::error!("{}", e);
        }
        Err(e) => {
            log::error!("{}", e);
            log::error!("WAV to MIDI conversion failed, stopping.");
            return RunOutcome::MidiStageFailed;
        }
    }

    if score_written(score_path) {
        log::info!("[DONE] Final MusicXML file: {}", score_path.display());
        RunOutcome::Completed
    } else {
        log::error!("MusicXML file was not created: {}", score_path.display());
        RunOutcome::ScoreMissing
    }
}
