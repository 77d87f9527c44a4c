//! Score model parsed back from a Standard MIDI File

use crate::error::{Result, ScoreError};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::HashMap;
use std::path::Path;

/// One sounding note, timed in MIDI ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreNote {
    pub start_tick: u64,
    pub duration_ticks: u64,
    pub pitch: u8,
    pub velocity: u8,
}

impl ScoreNote {
    pub fn end_tick(&self) -> u64 {
        self.start_tick + self.duration_ticks
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    pub beats: u8,
    pub beat_type: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            beats: 4,
            beat_type: 4,
        }
    }
}

/// A single instrument part
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub name: String,
    pub channel: u8,
    pub program: u8,
    pub notes: Vec<ScoreNote>,
}

/// Monophonic score read from MIDI
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    pub ticks_per_quarter: u16,
    pub tempo_bpm: f64,
    pub time_signature: TimeSignature,
    pub part: Part,
}

impl Score {
    /// Read and parse a MIDI file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| ScoreError::Conversion(format!("{}: {}", path.display(), e)))?;
        Self::from_midi_bytes(&bytes)
    }

    /// Parse SMF bytes into a single monophonic part
    pub fn from_midi_bytes(bytes: &[u8]) -> Result<Self> {
        let smf = Smf::parse(bytes)
            .map_err(|e| ScoreError::Conversion(format!("invalid MIDI data: {}", e)))?;

        let ticks_per_quarter = match smf.header.timing {
            Timing::Metrical(tpq) if tpq.as_int() > 0 => tpq.as_int(),
            Timing::Metrical(_) => {
                return Err(ScoreError::Conversion(
                    "MIDI header declares zero ticks per quarter".to_string(),
                ))
            }
            Timing::Timecode(..) => {
                return Err(ScoreError::Conversion(
                    "SMPTE timecode MIDI files are not supported".to_string(),
                ))
            }
        };

        let mut tempo_uspq: Option<u32> = None;
        let mut time_signature: Option<TimeSignature> = None;
        let mut name: Option<String> = None;
        let mut program: Option<(u8, u8)> = None;
        let mut notes = Vec::new();

        for track in &smf.tracks {
            let mut tick = 0u64;
            let mut sounding: HashMap<(u8, u8), (u64, u8)> = HashMap::new();

            for event in track {
                tick += event.delta.as_int() as u64;
                match event.kind {
                    TrackEventKind::Meta(MetaMessage::Tempo(t)) => {
                        tempo_uspq.get_or_insert(t.as_int());
                    }
                    TrackEventKind::Meta(MetaMessage::TimeSignature(num, den_log2, _, _)) => {
                        if time_signature.is_none() && num > 0 && den_log2 < 8 {
                            time_signature = Some(TimeSignature {
                                beats: num,
                                beat_type: 1u8 << den_log2,
                            });
                        }
                    }
                    TrackEventKind::Meta(MetaMessage::TrackName(raw)) if name.is_none() => {
                        let text = String::from_utf8_lossy(raw).trim().to_string();
                        if !text.is_empty() {
                            name = Some(text);
                        }
                    }
                    TrackEventKind::Midi { channel, message } => {
                        let channel = channel.as_int();
                        match message {
                            MidiMessage::ProgramChange { program: p } => {
                                program.get_or_insert((channel, p.as_int()));
                            }
                            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                                let key = key.as_int();
                                // Re-striking a sounding key ends the previous note
                                if let Some((start, velocity)) = sounding.remove(&(channel, key)) {
                                    push_note(&mut notes, start, tick, key, velocity);
                                }
                                sounding.insert((channel, key), (tick, vel.as_int()));
                            }
                            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                                let key = key.as_int();
                                if let Some((start, velocity)) = sounding.remove(&(channel, key)) {
                                    push_note(&mut notes, start, tick, key, velocity);
                                }
                            }
                            _ => {}
                        }
                    }
                    _ => {}
                }
            }

            // Notes never released end with their track
            for ((_, key), (start, velocity)) in sounding {
                push_note(&mut notes, start, tick, key, velocity);
            }
        }

        if notes.is_empty() {
            return Err(ScoreError::Conversion("MIDI file contains no notes".to_string()));
        }

        notes.sort_by_key(|n| (n.start_tick, n.pitch));
        let notes = make_monophonic(notes);

        let tempo_bpm = 60_000_000.0 / tempo_uspq.filter(|&t| t > 0).unwrap_or(500_000) as f64;
        let (channel, program) = program.unwrap_or((0, 0));

        log::debug!(
            "Parsed MIDI: {} notes, {} ticks/quarter, {:.1} BPM",
            notes.len(),
            ticks_per_quarter,
            tempo_bpm
        );

        Ok(Score {
            ticks_per_quarter,
            tempo_bpm,
            time_signature: time_signature.unwrap_or_default(),
            part: Part {
                name: name.unwrap_or_else(|| "Piano".to_string()),
                channel,
                program,
                notes,
            },
        })
    }

    pub fn notes(&self) -> &[ScoreNote] {
        &self.part.notes
    }

    /// Length of one measure in ticks
    pub fn measure_ticks(&self) -> u64 {
        self.ticks_per_quarter as u64 * 4 * self.time_signature.beats as u64
            / self.time_signature.beat_type.max(1) as u64
    }

    /// Duration of a tick span in quarter notes
    pub fn quarter_length(&self, ticks: u64) -> f64 {
        ticks as f64 / self.ticks_per_quarter as f64
    }

    /// Average pitch weighted by duration
    pub fn mean_pitch(&self) -> Option<f64> {
        let total: u64 = self.part.notes.iter().map(|n| n.duration_ticks).sum();
        if total == 0 {
            return None;
        }
        let weighted: f64 = self
            .part
            .notes
            .iter()
            .map(|n| n.pitch as f64 * n.duration_ticks as f64)
            .sum();
        Some(weighted / total as f64)
    }
}

fn push_note(notes: &mut Vec<ScoreNote>, start: u64, end: u64, pitch: u8, velocity: u8) {
    if end > start {
        notes.push(ScoreNote {
            start_tick: start,
            duration_ticks: end - start,
            pitch,
            velocity,
        });
    }
}

/// Truncate overlapping notes so at most one sounds at a time
fn make_monophonic(notes: Vec<ScoreNote>) -> Vec<ScoreNote> {
    let mut out: Vec<ScoreNote> = Vec::with_capacity(notes.len());
    let mut truncated = 0usize;

    for note in notes {
        if let Some(prev) = out.last_mut() {
            if note.start_tick < prev.end_tick() {
                truncated += 1;
                if note.start_tick == prev.start_tick {
                    // Chord: keep the first (lowest) note
                    continue;
                }
                prev.duration_ticks = note.start_tick - prev.start_tick;
            }
        }
        out.push(note);
    }

    if truncated > 0 {
        log::warn!("Reduced {} overlapping notes to a single voice", truncated);
    }
    out
}
