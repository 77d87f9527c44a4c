//! Note scheduling and MIDI export

use crate::config::MidiConfig;
use crate::error::{Result, ScoreError};
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A note placed on the timeline, times in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: u8,
    pub start: f64,
    pub duration: f64,
}

impl Note {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Lay quantized pitches end-to-end starting at time 0.
///
/// Each pitch gets `note_duration` seconds. With `merge_repeated` a run of
/// identical consecutive pitches becomes one note spanning the whole run.
pub fn schedule_notes(pitches: &[u8], note_duration: f64, merge_repeated: bool) -> Vec<Note> {
    let mut notes: Vec<Note> = Vec::with_capacity(pitches.len());
    let mut slots = 0usize;

    for &pitch in pitches {
        match notes.last_mut() {
            Some(last) if merge_repeated && last.pitch == pitch => {
                last.duration += note_duration;
            }
            _ => notes.push(Note {
                pitch,
                start: slots as f64 * note_duration,
                duration: note_duration,
            }),
        }
        slots += 1;
    }

    notes
}

/// Convert seconds to ticks at a fixed tempo
pub fn seconds_to_ticks(seconds: f64, ticks_per_quarter: u16, tempo_bpm: f64) -> u32 {
    (seconds * ticks_per_quarter as f64 * tempo_bpm / 60.0).round().max(0.0) as u32
}

/// Largest value a 24-bit tempo meta event can carry
pub const MAX_TEMPO_USPQ: u32 = 0x00FF_FFFF;

/// Microseconds per quarter note, `None` when a tempo event cannot store it
pub fn tempo_to_uspq(tempo_bpm: f64) -> Option<u32> {
    let uspq = (60_000_000.0 / tempo_bpm).round();
    (uspq.is_finite() && uspq >= 1.0 && uspq <= MAX_TEMPO_USPQ as f64).then_some(uspq as u32)
}

/// Encode notes as a two-track Standard MIDI File
pub fn encode_midi(notes: &[Note], config: &MidiConfig) -> Result<Vec<u8>> {
    let tpq = config.ticks_per_quarter;
    let tempo_uspq = tempo_to_uspq(config.tempo_bpm).ok_or_else(|| {
        ScoreError::MidiExport(format!(
            "tempo {} BPM does not fit a MIDI tempo event",
            config.tempo_bpm
        ))
    })?;
    let channel = u4::from(config.channel.min(15));

    // Tempo track
    let tempo_track = vec![
        TrackEvent {
            delta: u28::from(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::from(tempo_uspq))),
        },
        TrackEvent {
            delta: u28::from(0),
            kind: TrackEventKind::Meta(MetaMessage::TimeSignature(4, 2, 24, 8)),
        },
        TrackEvent {
            delta: u28::from(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        },
    ];

    // Collect (tick, is_on, key) then order offs before ons at equal ticks
    let mut timeline: Vec<(u32, bool, u8)> = Vec::with_capacity(notes.len() * 2);
    for note in notes {
        let start = seconds_to_ticks(note.start, tpq, config.tempo_bpm);
        let end = seconds_to_ticks(note.end(), tpq, config.tempo_bpm).max(start + 1);
        let key = note.pitch.min(127);
        timeline.push((start, true, key));
        timeline.push((end, false, key));
    }
    timeline.sort_by_key(|&(tick, is_on, _)| (tick, is_on));

    let mut note_track = vec![
        TrackEvent {
            delta: u28::from(0),
            kind: TrackEventKind::Meta(MetaMessage::TrackName(config.track_name.as_bytes())),
        },
        TrackEvent {
            delta: u28::from(0),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange {
                    program: u7::from(config.program.min(127)),
                },
            },
        },
    ];

    let velocity = u7::from(config.velocity.min(127));
    let mut current_tick = 0u32;
    for (tick, is_on, key) in timeline {
        let message = if is_on {
            MidiMessage::NoteOn {
                key: u7::from(key),
                vel: velocity,
            }
        } else {
            MidiMessage::NoteOff {
                key: u7::from(key),
                vel: u7::from(0),
            }
        };
        note_track.push(TrackEvent {
            delta: u28::from(tick - current_tick),
            kind: TrackEventKind::Midi { channel, message },
        });
        current_tick = tick;
    }

    note_track.push(TrackEvent {
        delta: u28::from(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let smf = Smf {
        header: Header {
            format: Format::Parallel,
            timing: Timing::Metrical(u15::from(tpq)),
        },
        tracks: vec![tempo_track, note_track],
    };

    let mut bytes = Vec::new();
    smf.write(&mut bytes)
        .map_err(|e| ScoreError::MidiExport(format!("Failed to write MIDI data: {:?}", e)))?;
    Ok(bytes)
}

/// Encode notes and write them to a MIDI file
pub fn write_midi<P: AsRef<Path>>(notes: &[Note], config: &MidiConfig, path: P) -> Result<()> {
    let path = path.as_ref();
    if notes.is_empty() {
        return Err(ScoreError::MidiExport("no notes to export".to_string()));
    }

    let bytes = encode_midi(notes, config)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| ScoreError::MidiExport(format!("{}: {}", parent.display(), e)))?;
    }
    std::fs::write(path, &bytes)
        .map_err(|e| ScoreError::MidiExport(format!("{}: {}", path.display(), e)))?;

    log::info!("Exported {} notes to {}", notes.len(), path.display());
    Ok(())
}
