//! MusicXML engraving and serialization

use crate::config::ScoreConfig;
use crate::error::{Result, ScoreError};
use crate::key::{key_signature_alter, spell_in_key, Key};
use crate::score::Score;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::collections::HashMap;

const DOCTYPE: &str = r#"score-partwise PUBLIC "-//Recordare//DTD MusicXML 4.0 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd""#;

/// Notated values as (numerator, denominator) of a quarter note, longest first
const NOTE_VALUES: [(u64, u64, &str, u8); 10] = [
    (4, 1, "whole", 0),
    (3, 1, "half", 1),
    (2, 1, "half", 0),
    (3, 2, "quarter", 1),
    (1, 1, "quarter", 0),
    (3, 4, "eighth", 1),
    (1, 2, "eighth", 0),
    (3, 8, "16th", 1),
    (1, 4, "16th", 0),
    (1, 8, "32nd", 0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Note { pitch: u8 },
    Rest,
}

/// One printed note or rest inside a measure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element {
    pub kind: ElementKind,
    pub duration: u64,
    pub note_type: Option<&'static str>,
    pub dots: u8,
    pub tie_start: bool,
    pub tie_stop: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measure {
    pub number: u32,
    pub elements: Vec<Element>,
}

impl Measure {
    pub fn duration(&self) -> u64 {
        self.elements.iter().map(|e| e.duration).sum()
    }
}

/// A notation backend turning a parsed score into a document
pub trait NotationWriter {
    fn render(&self, score: &Score, key: &Key) -> Result<Vec<u8>>;
}

/// MusicXML 4.0 partwise writer
#[derive(Debug, Clone, Default)]
pub struct MusicXmlWriter {
    config: ScoreConfig,
}

impl MusicXmlWriter {
    pub fn new(config: ScoreConfig) -> Self {
        Self { config }
    }
}

impl NotationWriter for MusicXmlWriter {
    fn render(&self, score: &Score, key: &Key) -> Result<Vec<u8>> {
        write_musicxml(score, key, &self.config)
    }
}

/// Split a tick span into notated values
fn decompose(mut ticks: u64, tpq: u64) -> Vec<(u64, Option<&'static str>, u8)> {
    let mut pieces = Vec::new();
    while ticks > 0 {
        let fit = NOTE_VALUES.iter().find_map(|&(num, den, name, dots)| {
            let value = tpq * num;
            (value % den == 0 && value / den <= ticks && value / den > 0)
                .then_some((value / den, name, dots))
        });
        match fit {
            Some((value, name, dots)) => {
                pieces.push((value, Some(name), dots));
                ticks -= value;
            }
            None => {
                pieces.push((ticks, None, 0));
                ticks = 0;
            }
        }
    }
    pieces
}

/// Lay the part's notes into measures.
///
/// Gaps become rests, notes crossing a barline are split and tied, and the
/// last measure is filled with rests.
pub fn engrave(score: &Score) -> Vec<Measure> {
    let measure_len = score.measure_ticks().max(1);
    let tpq = score.ticks_per_quarter as u64;

    // (start, duration, pitch) with rests as None
    let mut spans: Vec<(u64, u64, Option<u8>)> = Vec::new();
    let mut cursor = 0u64;
    for note in score.notes() {
        if note.start_tick > cursor {
            spans.push((cursor, note.start_tick - cursor, None));
        }
        let start = note.start_tick.max(cursor);
        if note.end_tick() > start {
            spans.push((start, note.end_tick() - start, Some(note.pitch)));
            cursor = note.end_tick();
        }
    }
    let n_measures = cursor.div_ceil(measure_len).max(1);
    let total = n_measures * measure_len;
    if cursor < total {
        spans.push((cursor, total - cursor, None));
    }

    let mut measures: Vec<Measure> = (0..n_measures)
        .map(|i| Measure {
            number: i as u32 + 1,
            elements: Vec::new(),
        })
        .collect();

    for (start, duration, pitch) in spans {
        // Break the span at barlines, then into notated values
        let mut pieces: Vec<(usize, u64, Option<&'static str>, u8)> = Vec::new();
        let mut pos = start;
        let end = start + duration;
        while pos < end {
            let index = (pos / measure_len) as usize;
            let bar_end = (index as u64 + 1) * measure_len;
            let chunk = end.min(bar_end) - pos;
            for (ticks, name, dots) in decompose(chunk, tpq) {
                pieces.push((index, ticks, name, dots));
            }
            pos += chunk;
        }

        let last = pieces.len().saturating_sub(1);
        for (i, (index, ticks, name, dots)) in pieces.into_iter().enumerate() {
            let kind = match pitch {
                Some(p) => ElementKind::Note { pitch: p },
                None => ElementKind::Rest,
            };
            let tied = pitch.is_some();
            measures[index].elements.push(Element {
                kind,
                duration: ticks,
                note_type: name,
                dots,
                tie_start: tied && i < last,
                tie_stop: tied && i > 0,
            });
        }
    }

    measures
}

/// Thin wrapper mapping writer failures into conversion errors
struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn event(&mut self, event: Event<'_>) -> Result<()> {
        self.writer
            .write_event(event)
            .map_err(|e| ScoreError::Conversion(format!("XML write failed: {}", e)))
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        self.event(Event::Start(
            BytesStart::new(name).with_attributes(attrs.iter().copied()),
        ))
    }

    fn end(&mut self, name: &str) -> Result<()> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        self.event(Event::Empty(
            BytesStart::new(name).with_attributes(attrs.iter().copied()),
        ))
    }

    fn text(&mut self, name: &str, text: &str) -> Result<()> {
        self.start(name, &[])?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    fn into_bytes(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

/// Serialize a score as a MusicXML partwise document
pub fn write_musicxml(score: &Score, key: &Key, config: &ScoreConfig) -> Result<Vec<u8>> {
    let measures = engrave(score);
    let fifths = if config.write_key_signature {
        key.fifths()
    } else {
        0
    };

    let mut out = XmlOut::new();
    out.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("no"))))?;
    out.event(Event::DocType(BytesText::from_escaped(DOCTYPE)))?;
    out.start("score-partwise", &[("version", "4.0")])?;

    out.start("work", &[])?;
    out.text("work-title", &config.title)?;
    out.end("work")?;

    out.start("identification", &[])?;
    out.start("encoding", &[])?;
    out.text("software", concat!("wav2score ", env!("CARGO_PKG_VERSION")))?;
    out.end("encoding")?;
    out.end("identification")?;

    write_part_list(&mut out, score, config)?;

    out.start("part", &[("id", "P1")])?;
    for measure in &measures {
        let number = measure.number.to_string();
        out.start("measure", &[("number", number.as_str())])?;
        if measure.number == 1 {
            write_attributes(&mut out, score, key, config)?;
            write_tempo(&mut out, score.tempo_bpm)?;
        }

        let mut shown: HashMap<(char, i8), i8> = HashMap::new();
        for element in &measure.elements {
            write_element(&mut out, element, key, fifths, &mut shown)?;
        }

        if measure.number as usize == measures.len() {
            out.start("barline", &[("location", "right")])?;
            out.text("bar-style", "light-heavy")?;
            out.end("barline")?;
        }
        out.end("measure")?;
    }
    out.end("part")?;
    out.end("score-partwise")?;

    let mut bytes = out.into_bytes();
    bytes.push(b'\n');
    Ok(bytes)
}

fn write_part_list(out: &mut XmlOut, score: &Score, config: &ScoreConfig) -> Result<()> {
    out.start("part-list", &[])?;
    out.start("score-part", &[("id", "P1")])?;
    out.text("part-name", &config.part_name)?;
    out.start("score-instrument", &[("id", "P1-I1")])?;
    out.text("instrument-name", &score.part.name)?;
    out.end("score-instrument")?;
    out.start("midi-instrument", &[("id", "P1-I1")])?;
    out.text("midi-channel", &(score.part.channel as u16 + 1).to_string())?;
    out.text("midi-program", &(score.part.program as u16 + 1).to_string())?;
    out.end("midi-instrument")?;
    out.end("score-part")?;
    out.end("part-list")
}

fn write_attributes(out: &mut XmlOut, score: &Score, key: &Key, config: &ScoreConfig) -> Result<()> {
    out.start("attributes", &[])?;
    out.text("divisions", &score.ticks_per_quarter.to_string())?;
    if config.write_key_signature {
        out.start("key", &[])?;
        out.text("fifths", &key.fifths().to_string())?;
        out.text("mode", key.mode.name())?;
        out.end("key")?;
    }
    out.start("time", &[])?;
    out.text("beats", &score.time_signature.beats.to_string())?;
    out.text("beat-type", &score.time_signature.beat_type.to_string())?;
    out.end("time")?;

    let (sign, line) = match score.mean_pitch() {
        Some(mean) if mean < 60.0 => ("F", "4"),
        _ => ("G", "2"),
    };
    out.start("clef", &[])?;
    out.text("sign", sign)?;
    out.text("line", line)?;
    out.end("clef")?;
    out.end("attributes")
}

fn write_tempo(out: &mut XmlOut, tempo_bpm: f64) -> Result<()> {
    let bpm = format!("{}", (tempo_bpm * 100.0).round() / 100.0);
    out.start("direction", &[("placement", "above")])?;
    out.start("direction-type", &[])?;
    out.start("metronome", &[])?;
    out.text("beat-unit", "quarter")?;
    out.text("per-minute", &bpm)?;
    out.end("metronome")?;
    out.end("direction-type")?;
    out.empty("sound", &[("tempo", bpm.as_str())])?;
    out.end("direction")
}

fn write_element(
    out: &mut XmlOut,
    element: &Element,
    key: &Key,
    fifths: i8,
    shown: &mut HashMap<(char, i8), i8>,
) -> Result<()> {
    out.start("note", &[])?;

    let mut accidental = None;
    match element.kind {
        ElementKind::Rest => out.empty("rest", &[])?,
        ElementKind::Note { pitch } => {
            let spelled = spell_in_key(pitch, key, fifths);
            let current = *shown
                .entry((spelled.step, spelled.octave))
                .or_insert_with(|| key_signature_alter(spelled.step, fifths));
            // A tied continuation inherits the accidental of the note it holds
            if current != spelled.alter && !element.tie_stop {
                accidental = Some(match spelled.alter {
                    1 => "sharp",
                    -1 => "flat",
                    _ => "natural",
                });
                shown.insert((spelled.step, spelled.octave), spelled.alter);
            }

            out.start("pitch", &[])?;
            out.text("step", &spelled.step.to_string())?;
            if spelled.alter != 0 {
                out.text("alter", &spelled.alter.to_string())?;
            }
            out.text("octave", &spelled.octave.to_string())?;
            out.end("pitch")?;
        }
    }

    out.text("duration", &element.duration.to_string())?;
    if element.tie_stop {
        out.empty("tie", &[("type", "stop")])?;
    }
    if element.tie_start {
        out.empty("tie", &[("type", "start")])?;
    }
    out.text("voice", "1")?;
    if let Some(name) = element.note_type {
        out.text("type", name)?;
    }
    for _ in 0..element.dots {
        out.empty("dot", &[])?;
    }
    if let Some(acc) = accidental {
        out.text("accidental", acc)?;
    }
    if element.tie_start || element.tie_stop {
        out.start("notations", &[])?;
        if element.tie_stop {
            out.empty("tied", &[("type", "stop")])?;
        }
        if element.tie_start {
            out.empty("tied", &[("type", "start")])?;
        }
        out.end("notations")?;
    }

    out.end("note")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Mode;
    use crate::score::{Part, ScoreNote, TimeSignature};

    fn score(notes: &[(u64, u64, u8)]) -> Score {
        Score {
            ticks_per_quarter: 220,
            tempo_bpm: 120.0,
            time_signature: TimeSignature::default(),
            part: Part {
                name: "Acoustic Grand Piano".to_string(),
                channel: 0,
                program: 0,
                notes: notes
                    .iter()
                    .map(|&(start_tick, duration_ticks, pitch)| ScoreNote {
                        start_tick,
                        duration_ticks,
                        pitch,
                        velocity: 100,
                    })
                    .collect(),
            },
        }
    }

    #[test]
    fn test_decompose_values() {
        assert_eq!(decompose(220, 220), vec![(220, Some("quarter"), 0)]);
        assert_eq!(decompose(330, 220), vec![(330, Some("quarter"), 1)]);
        assert_eq!(
            decompose(1100, 220),
            vec![(880, Some("whole"), 0), (220, Some("quarter"), 0)]
        );
        // 220 ticks per quarter cannot express a 32nd, leftovers go untyped
        assert_eq!(decompose(30, 220), vec![(30, None, 0)]);
        assert_eq!(
            decompose(250, 220),
            vec![(220, Some("quarter"), 0), (30, None, 0)]
        );
    }

    #[test]
    fn test_quarters_fill_measures() {
        let notes: Vec<(u64, u64, u8)> = (0..5).map(|k| (k * 220, 220, 60 + k as u8)).collect();
        let measures = engrave(&score(&notes));
        assert_eq!(measures.len(), 2);
        assert_eq!(measures[0].elements.len(), 4);
        assert!(measures.iter().all(|m| m.duration() == 880));
        // Last measure: one note, then rests filling three quarters
        assert_eq!(measures[1].elements[0].kind, ElementKind::Note { pitch: 64 });
        assert!(measures[1].elements[1..]
            .iter()
            .all(|e| e.kind == ElementKind::Rest));
    }

    #[test]
    fn test_note_across_barline_is_tied() {
        let measures = engrave(&score(&[(660, 440, 67)]));
        assert_eq!(measures.len(), 2);
        let first = measures[0].elements.last().unwrap();
        let second = measures[1].elements.first().unwrap();
        assert_eq!(first.kind, ElementKind::Note { pitch: 67 });
        assert!(first.tie_start && !first.tie_stop);
        assert!(second.tie_stop && !second.tie_start);
        assert_eq!(measures[0].elements[0].kind, ElementKind::Rest);
        assert_eq!(measures[0].elements[0].duration, 660);
    }

    #[test]
    fn test_tied_continuation_has_no_accidental() {
        // C# held across the barline in C major
        let xml = write_musicxml(
            &score(&[(660, 440, 61)]),
            &Key::new(0, Mode::Major),
            &ScoreConfig::default(),
        )
        .unwrap();
        let text = String::from_utf8(xml).unwrap();
        assert_eq!(text.matches("<accidental>sharp</accidental>").count(), 1);
        assert_eq!(text.matches("<tied type=\"stop\"/>").count(), 1);
    }

    #[test]
    fn test_minor_leading_tone_written_sharp() {
        let xml = write_musicxml(
            &score(&[(0, 220, 62), (220, 220, 61), (440, 220, 62)]),
            &Key::new(2, Mode::Minor),
            &ScoreConfig::default(),
        )
        .unwrap();
        let text = String::from_utf8(xml).unwrap();
        assert!(text.contains("<fifths>-1</fifths>"));
        assert!(text.contains("<step>C</step>"));
        assert!(text.contains("<accidental>sharp</accidental>"));
        assert!(!text.contains("<accidental>flat</accidental>"));
    }

    #[test]
    fn test_document_shape() {
        let xml = write_musicxml(
            &score(&[(0, 220, 60), (220, 220, 66)]),
            &Key::new(0, Mode::Major),
            &ScoreConfig::default(),
        )
        .unwrap();
        let text = String::from_utf8(xml).unwrap();
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>"));
        assert!(text.contains("<!DOCTYPE score-partwise PUBLIC"));
        assert!(text.contains("<score-partwise version=\"4.0\">"));
        assert!(text.contains("<divisions>220</divisions>"));
        assert!(text.contains("<fifths>0</fifths>"));
        assert!(text.contains("<mode>major</mode>"));
        assert!(text.contains("<step>F</step>"));
        assert!(text.contains("<accidental>sharp</accidental>"));
        assert!(text.contains("<bar-style>light-heavy</bar-style>"));
        assert!(text.contains("<per-minute>120</per-minute>"));
        // Two notes and a half rest closing the measure
        assert_eq!(text.matches("<note>").count(), 3);
    }

    #[test]
    fn test_flat_key_spelling_and_naturals() {
        // F major: Bb is in the signature, B natural needs a sign
        let xml = write_musicxml(
            &score(&[(0, 220, 70), (220, 220, 71), (440, 220, 71)]),
            &Key::new(5, Mode::Major),
            &ScoreConfig::default(),
        )
        .unwrap();
        let text = String::from_utf8(xml).unwrap();
        assert!(text.contains("<fifths>-1</fifths>"));
        assert!(text.contains("<alter>-1</alter>"));
        // Only the first B natural in the measure is marked
        assert_eq!(text.matches("<accidental>natural</accidental>").count(), 1);
        assert!(!text.contains("<accidental>flat</accidental>"));
    }

    #[test]
    fn test_low_part_uses_bass_clef() {
        let xml = write_musicxml(
            &score(&[(0, 220, 40)]),
            &Key::default(),
            &ScoreConfig::default(),
        )
        .unwrap();
        let text = String::from_utf8(xml).unwrap();
        assert!(text.contains("<sign>F</sign>"));
    }

    #[test]
    fn test_key_signature_can_be_omitted() {
        let config = ScoreConfig {
            write_key_signature: false,
            ..ScoreConfig::default()
        };
        let xml = write_musicxml(&score(&[(0, 220, 62)]), &Key::new(2, Mode::Major), &config).unwrap();
        let text = String::from_utf8(xml).unwrap();
        assert!(!text.contains("<key>"));
    }
}
