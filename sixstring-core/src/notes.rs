//! # Note/Frequency Table
//!
//! Equal-tempered note table (A4 = 440 Hz) shared by the tuning engine and
//! the pitch detector.
//!
//! ## Features
//! - Chromatic pitch classes with sharp display names and flat-tolerant parsing
//! - Exact octave doubling: the same pitch class one octave apart is exactly 2x
//! - Nearest-note lookup over a bounded octave range with cent deviation

use crate::error::ParsePitchClassError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reference pitch for A4 in Hz.
pub const A4_FREQUENCY: f32 = 440.0;

/// Octave used as the base of the frequency formula.
const REFERENCE_OCTAVE: i32 = 4;

/// One of the 12 chromatic pitch classes, C = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    #[serde(rename = "C#")]
    Cs,
    D,
    #[serde(rename = "D#")]
    Ds,
    E,
    F,
    #[serde(rename = "F#")]
    Fs,
    G,
    #[serde(rename = "G#")]
    Gs,
    A,
    #[serde(rename = "A#")]
    As,
    B,
}

impl PitchClass {
    /// All pitch classes in chromatic order starting at C.
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::Cs,
        PitchClass::D,
        PitchClass::Ds,
        PitchClass::E,
        PitchClass::F,
        PitchClass::Fs,
        PitchClass::G,
        PitchClass::Gs,
        PitchClass::A,
        PitchClass::As,
        PitchClass::B,
    ];

    /// Chromatic index, 0 (C) to 11 (B).
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Pitch class for any integer index, wrapping cyclically.
    pub fn from_index(index: i32) -> PitchClass {
        PitchClass::ALL[index.rem_euclid(12) as usize]
    }

    /// Moves the pitch class by `semitones`, wrapping around the octave.
    pub fn transpose(self, semitones: i32) -> PitchClass {
        PitchClass::from_index(self.index() as i32 + semitones)
    }

    /// Display name using sharps.
    pub const fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::Cs => "C#",
            PitchClass::D => "D",
            PitchClass::Ds => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::Fs => "F#",
            PitchClass::G => "G",
            PitchClass::Gs => "G#",
            PitchClass::A => "A",
            PitchClass::As => "A#",
            PitchClass::B => "B",
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PitchClass {
    type Err = ParsePitchClassError;

    /// Accepts "C", "c#", "Db", "Bb" and similar spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        let natural = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('C') => 0,
            Some('D') => 2,
            Some('E') => 4,
            Some('F') => 5,
            Some('G') => 7,
            Some('A') => 9,
            Some('B') => 11,
            _ => return Err(ParsePitchClassError(s.to_string())),
        };
        let accidental = match chars.as_str() {
            "" => 0,
            "#" => 1,
            "b" => -1,
            _ => return Err(ParsePitchClassError(s.to_string())),
        };
        Ok(PitchClass::from_index(natural + accidental))
    }
}

/// A single table entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    pub pitch_class: PitchClass,
    pub octave: i32,
    /// Frequency in Hz
    pub frequency: f32,
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class, self.octave)
    }
}

/// One entry per semitone for octaves 0 through 8.
static NOTES: Lazy<Vec<Note>> = Lazy::new(|| {
    let mut notes = Vec::with_capacity(9 * 12);
    for octave in 0..=8 {
        for pitch_class in PitchClass::ALL {
            notes.push(Note {
                pitch_class,
                octave,
                frequency: frequency_of(pitch_class, octave),
            });
        }
    }
    notes
});

/// Equal-tempered frequency of a pitch class in a given octave.
///
/// The octave-4 frequency is scaled by an exact power of two, so
/// `frequency_of(pc, n + 1) == 2.0 * frequency_of(pc, n)` holds bit-for-bit.
pub fn frequency_of(pitch_class: PitchClass, octave: i32) -> f32 {
    let semitones_from_a = pitch_class.index() as f32 - PitchClass::A.index() as f32;
    let reference = A4_FREQUENCY * 2.0_f32.powf(semitones_from_a / 12.0);
    reference * 2.0_f32.powi(octave - REFERENCE_OCTAVE)
}

/// Deviation of `freq` from `reference` in cents (positive = sharp).
pub fn cents_between(freq: f32, reference: f32) -> f32 {
    1200.0 * (freq / reference).log2()
}

/// Bounds for [`nearest_note_in`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteSearch {
    pub min_octave: i32,
    pub max_octave: i32,
    /// Frequencies below this are rejected outright.
    pub min_hz: f32,
    /// Frequencies above this are rejected outright.
    pub max_hz: f32,
}

impl Default for NoteSearch {
    fn default() -> Self {
        Self {
            min_octave: 2,
            max_octave: 6,
            min_hz: 50.0,
            max_hz: 2000.0,
        }
    }
}

/// Result of a nearest-note lookup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NearestNote {
    pub pitch_class: PitchClass,
    pub octave: i32,
    /// Table frequency of the matched note.
    pub frequency: f32,
    /// Signed deviation of the input from the table frequency, within ±50.
    pub cents: f32,
}

/// [`nearest_note_in`] with the default search bounds (octaves 2-6, 50-2000 Hz).
pub fn nearest_note(freq: f32) -> Option<NearestNote> {
    nearest_note_in(freq, &NoteSearch::default())
}

/// Finds the table note closest to `freq` in cents.
///
/// # Arguments
/// * `freq` - Frequency in Hz
/// * `search` - Octave and Hz bounds of the lookup
///
/// # Returns
/// * `Some(nearest)` - Note, octave and deviation within ±50 cents
/// * `None` - Non-finite input, input outside the search's Hz range, or
///   input more than half a semitone beyond the searched octaves
pub fn nearest_note_in(freq: f32, search: &NoteSearch) -> Option<NearestNote> {
    if !freq.is_finite() || freq < search.min_hz || freq > search.max_hz {
        return None;
    }

    let nearest = NOTES
        .iter()
        .filter(|note| (search.min_octave..=search.max_octave).contains(&note.octave))
        .map(|note| (note, cents_between(freq, note.frequency)))
        .min_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))?;

    let (note, cents) = nearest;
    if cents.abs() > 50.0 {
        return None;
    }

    Some(NearestNote {
        pitch_class: note.pitch_class,
        octave: note.octave,
        frequency: note.frequency,
        cents,
    })
}
