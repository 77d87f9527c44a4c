//! MIDI to notation conversion stage

use crate::error::{Result, ScoreError};
use crate::key::{estimate_key, KeyEstimate};
use crate::musicxml::NotationWriter;
use crate::score::Score;
use std::path::Path;

/// Re-load a MIDI file, estimate its key and write it out through `writer`.
///
/// Every failure surfaces as [`ScoreError::Conversion`]; nothing is written
/// to `score_path` unless rendering succeeded.
pub fn midi_to_notation<P: AsRef<Path>, Q: AsRef<Path>>(
    midi_path: P,
    score_path: Q,
    writer: &dyn NotationWriter,
) -> Result<KeyEstimate> {
    let midi_path = midi_path.as_ref();
    let score_path = score_path.as_ref();
    log::info!(
        "Converting MIDI to MusicXML: {} -> {}",
        midi_path.display(),
        score_path.display()
    );

    convert(midi_path, score_path, writer).map_err(|e| match e {
        ScoreError::Conversion(_) => e,
        other => ScoreError::Conversion(other.to_string()),
    })
}

fn convert(midi_path: &Path, score_path: &Path, writer: &dyn NotationWriter) -> Result<KeyEstimate> {
    let score = Score::load(midi_path)?;

    let estimate = estimate_key(&score);
    log::info!(
        "Estimated key: {} (r = {:.3})",
        estimate.key,
        estimate.correlation
    );

    let document = writer.render(&score, &estimate.key)?;

    if let Some(parent) = score_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| ScoreError::Conversion(format!("{}: {}", parent.display(), e)))?;
    }
    std::fs::write(score_path, document)
        .map_err(|e| ScoreError::Conversion(format!("{}: {}", score_path.display(), e)))?;

    log::info!("MusicXML score written to {}", score_path.display());
    Ok(estimate)
}
