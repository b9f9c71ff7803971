//! Pitch detection from sample file names.
//!
//! Two patterns are tried in order against the base file name of a sample:
//!
//! 1. A note name, e.g. `Piano_C#4v2_1.wav` (letter, optional `#`/`b`,
//!    octave, optional velocity tag, optional numeric suffix).
//! 2. A plain MIDI note number, e.g. `piano-060vL.wav`.
//!
//! Samples matching neither are skipped with a warning.

use std::{collections::BTreeMap, path::Path};

use lazy_regex::regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::note::{midi_to_note, note_to_midi};

/// Reasons a sample can't be given a pitch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PitchError {
    #[error("No file name in sample path")]
    NoFileName,

    #[error("Unable to extract pitch information from file name '{0}'")]
    NoPattern(String),

    #[error("Unable to determine pitch from note name '{0}'")]
    UnknownNote(String),

    #[error("MIDI note number {0} is out of valid range (0-127)")]
    OutOfRange(u16),
}

/// Velocity layer marker following the pitch, e.g. `v3` or `vH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VelocityTag {
    Layer(u16),
    Low,
    Medium,
    High,
}

impl VelocityTag {
    fn from_capture(value: &str) -> Option<Self> {
        match value {
            "l" | "L" => Some(VelocityTag::Low),
            "m" | "M" => Some(VelocityTag::Medium),
            "h" | "H" => Some(VelocityTag::High),
            number => number.parse().ok().map(VelocityTag::Layer),
        }
    }
}

/// A file name recognized by its note name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteNameCapture<'a> {
    /// Letter, accidental and octave, e.g. `C#4`.
    pub note: &'a str,
    pub letter: char,
    pub accidental: Option<char>,
    pub octave: i8,
    pub velocity: Option<VelocityTag>,
    /// Trailing `-N`/`_N` counter, without the separator.
    pub suffix: Option<&'a str>,
}

/// A file name recognized by its note number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericCapture<'a> {
    pub number: u16,
    pub velocity: Option<VelocityTag>,
    pub suffix: Option<&'a str>,
}

/// Matches a base file name against the note name pattern.
pub fn match_note_name(base_name: &str) -> Option<NoteNameCapture<'_>> {
    let caps = regex!(
        r"^(.+[-_])?(?P<note>(?P<letter>[A-Ga-g])(?P<accidental>[b#]?)(?P<octave>-?[0-9]))(v(?P<velocity>[0-9]{1,3}|[LMHlmh]))?(?P<suffix>[-_][0-9]+)?\.wav$"
    )
    .captures(base_name)?;

    Some(NoteNameCapture {
        note: caps.name("note")?.as_str(),
        letter: caps.name("letter")?.as_str().chars().next()?,
        accidental: caps
            .name("accidental")
            .and_then(|a| a.as_str().chars().next()),
        octave: caps.name("octave")?.as_str().parse().ok()?,
        velocity: caps
            .name("velocity")
            .and_then(|v| VelocityTag::from_capture(v.as_str())),
        suffix: caps.name("suffix").map(|s| &s.as_str()[1..]),
    })
}

/// Matches a base file name against the note number pattern.
///
/// Like the note name pattern this one requires a `.wav` extension, but it
/// doesn't require the extension to end the name.
pub fn match_numeric(base_name: &str) -> Option<NumericCapture<'_>> {
    let caps = regex!(
        r"^(.+[-_])?(?P<number>[0-9]{1,3})(v(?P<velocity>[0-9]{1,3}|[LMHlmh]))?(?P<suffix>[-_][0-9]+)?\.wav"
    )
    .captures(base_name)?;

    Some(NumericCapture {
        number: caps.name("number")?.as_str().parse().ok()?,
        velocity: caps
            .name("velocity")
            .and_then(|v| VelocityTag::from_capture(v.as_str())),
        suffix: caps.name("suffix").map(|s| &s.as_str()[1..]),
    })
}

/// Derives the MIDI note number of a sample from its file name.
pub fn extract_pitch(sample: &str) -> Result<u8, PitchError> {
    let base_name = Path::new(sample)
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or(PitchError::NoFileName)?;

    if let Some(capture) = match_note_name(base_name) {
        return note_to_midi(capture.note)
            .ok_or_else(|| PitchError::UnknownNote(capture.note.to_owned()));
    }

    let capture =
        match_numeric(base_name).ok_or_else(|| PitchError::NoPattern(base_name.to_owned()))?;

    u8::try_from(capture.number)
        .ok()
        .filter(|note| *note <= 127)
        .ok_or(PitchError::OutOfRange(capture.number))
}

/// Samples keyed by the MIDI note they were recorded at.
///
/// Each note holds at most one sample. Assigning a second sample to a note
/// replaces the first one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PitchAssignment {
    notes: BTreeMap<u8, String>,
}

impl PitchAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an assignment from samples in input order, skipping the ones
    /// whose pitch can't be determined.
    pub fn from_samples<I, S>(samples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut assignment = Self::new();
        for sample in samples {
            assignment.assign(sample.as_ref());
        }
        assignment
    }

    /// Detects the pitch of a sample and records it. Returns the note the
    /// sample was assigned to, or `None` if it was skipped.
    pub fn assign(&mut self, sample: &str) -> Option<u8> {
        match extract_pitch(sample) {
            Ok(note) => {
                self.insert(note, sample);
                Some(note)
            }
            Err(err) => {
                warn!("Skipping file '{sample}': {err}");
                None
            }
        }
    }

    /// Records a sample for a note, returning the sample it replaced.
    pub fn insert(&mut self, note: u8, sample: impl Into<String>) -> Option<String> {
        let sample = sample.into();
        debug!("Mapped '{sample}' to note {note} ({})", midi_to_note(note));
        let replaced = self.notes.insert(note, sample);
        if let Some(replaced) = &replaced {
            debug!("Note {note} was already mapped to '{replaced}', replacing it");
        }
        replaced
    }

    pub fn get(&self, note: u8) -> Option<&str> {
        self.notes.get(&note).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Iterates over the assignment in ascending note order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &str)> {
        self.notes.iter().map(|(note, sample)| (*note, sample.as_str()))
    }
}
