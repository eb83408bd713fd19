//! # Tuning & Chord-Shape Engine
//!
//! Turns a (key, mode) pair into the six tuned strings and the mode's chord
//! catalog with concrete chord names. Everything here is a pure function of
//! its inputs, so the full (mode × key) table can be built once and shared.
//!
//! ## Octave assignment
//! Keys C through F start on octave 3, keys F# through B on octave 2, which
//! keeps the root string inside F#2..F3 for every key. The octave then steps
//! up whenever a string's chromatic index does not exceed the previous one.

use crate::chords::{self, ChordMatch, StringMask};
use crate::error::{ChordError, ModeError};
use crate::modes::{ChordQuality, ChordShape, MODES, Mode, ModeRegistry};
use crate::notes::{PitchClass, frequency_of};
use crate::strum::StringEvent;
use crate::STRING_COUNT;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Starting octave for keys in the lower half of the chromatic scale.
const LOWER_HALF_OCTAVE: i32 = 3;
/// Starting octave for keys in the upper half.
const UPPER_HALF_OCTAVE: i32 = 2;

/// One string of a tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TunedString {
    pub pitch_class: PitchClass,
    pub octave: i32,
    /// Frequency in Hz
    pub frequency: f32,
}

/// The six open strings for a (key, mode) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StringTuning {
    pub key: PitchClass,
    pub mode: String,
    pub strings: [TunedString; STRING_COUNT],
}

impl StringTuning {
    /// Pairs every string's frequency with its open/muted state, low string first.
    pub fn strum_events(&self, mask: &StringMask) -> [StringEvent; STRING_COUNT] {
        std::array::from_fn(|i| StringEvent {
            frequency: self.strings[i].frequency,
            open: mask.is_open(i),
        })
    }
}

/// A chord shape resolved to a name for one key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    /// Display name, e.g. "F#m7".
    pub name: String,
    pub root: PitchClass,
    pub degree: String,
    pub quality: ChordQuality,
    pub pattern: [bool; STRING_COUNT],
}

/// A mode's chord shapes resolved for one key, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChordCatalog {
    pub key: PitchClass,
    pub mode: String,
    pub entries: Vec<CatalogEntry>,
}

/// Tuning and catalog for one (key, mode) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TunedMode {
    pub tuning: StringTuning,
    pub catalog: ChordCatalog,
}

/// Pitch class of every string: `(key + interval) mod 12`.
pub fn string_notes(key: PitchClass, mode: &Mode) -> [PitchClass; STRING_COUNT] {
    mode.intervals()
        .map(|interval| key.transpose(interval as i32))
}

/// Octave of every string for a note sequence rooted at `key`.
pub fn assign_octaves(notes: &[PitchClass; STRING_COUNT], key: PitchClass) -> [i32; STRING_COUNT] {
    let mut octave = if key.index() < 6 {
        LOWER_HALF_OCTAVE
    } else {
        UPPER_HALF_OCTAVE
    };

    let mut octaves = [octave; STRING_COUNT];
    for i in 1..STRING_COUNT {
        if notes[i].index() <= notes[i - 1].index() {
            octave += 1;
        }
        octaves[i] = octave;
    }
    octaves
}

/// Root pitch class of `shape` in `key`, read from the string the mode assigns to its degree.
fn shape_root(key: PitchClass, shape: &ChordShape, mode: &Mode) -> Result<PitchClass, ModeError> {
    let string = mode
        .root_string(&shape.degree)
        .ok_or_else(|| ModeError::UnknownDegree {
            mode: mode.name().to_string(),
            degree: shape.degree.clone(),
        })?;
    Ok(string_notes(key, mode)[string])
}

/// Display name of `shape` in `key`: root-string note name plus quality suffix.
pub fn resolve_chord_name(key: PitchClass, shape: &ChordShape, mode: &Mode) -> Result<String, ModeError> {
    let root = shape_root(key, shape, mode)?;
    Ok(format!("{}{}", root, shape.quality.suffix()))
}

/// Builds the tuning and resolved catalog for one (key, mode) pair.
///
/// # Arguments
/// * `key` - Pitch class of the lowest string
/// * `mode` - Interval set and chord shapes to resolve
///
/// # Returns
/// * `Ok(tuned)` - Six ascending strings plus the named chord catalog
/// * `Err(ModeError::UnknownDegree)` - A chord shape's degree has no root string
pub fn build_tuning(key: PitchClass, mode: &Mode) -> Result<TunedMode, ModeError> {
    let notes = string_notes(key, mode);
    let octaves = assign_octaves(&notes, key);
    let strings = std::array::from_fn(|i| TunedString {
        pitch_class: notes[i],
        octave: octaves[i],
        frequency: frequency_of(notes[i], octaves[i]),
    });

    let entries = mode
        .shapes()
        .iter()
        .map(|shape| {
            let root = shape_root(key, shape, mode)?;
            Ok(CatalogEntry {
                name: format!("{}{}", root, shape.quality.suffix()),
                root,
                degree: shape.degree.clone(),
                quality: shape.quality,
                pattern: shape.pattern,
            })
        })
        .collect::<Result<Vec<_>, ModeError>>()?;

    Ok(TunedMode {
        tuning: StringTuning {
            key,
            mode: mode.name().to_string(),
            strings,
        },
        catalog: ChordCatalog {
            key,
            mode: mode.name().to_string(),
            entries,
        },
    })
}

/// Precomputed tunings for every (mode, key) pair of a registry.
///
/// Read-only after construction; entries are shared through `Arc`.
#[derive(Debug, Clone, Default)]
pub struct TuningCache {
    entries: HashMap<(String, PitchClass), Arc<TunedMode>>,
}

impl TuningCache {
    pub fn build(registry: &ModeRegistry) -> Result<TuningCache, ModeError> {
        let mut entries = HashMap::with_capacity(registry.len() * 12);
        for mode in registry.iter() {
            for key in PitchClass::ALL {
                let tuned = build_tuning(key, mode)?;
                entries.insert((mode.name().to_string(), key), Arc::new(tuned));
            }
        }
        Ok(TuningCache { entries })
    }

    pub fn get(&self, mode: &str, key: PitchClass) -> Option<Arc<TunedMode>> {
        self.entries.get(&(mode.to_string(), key)).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Matches a raw 0/1 string-state vector against the catalog of (mode, key).
    pub fn match_chord(&self, mode: &str, key: PitchClass, states: &[u8]) -> Result<Option<ChordMatch>, ChordError> {
        let mask = StringMask::try_from(states)?;
        let tuned = self
            .get(mode, key)
            .ok_or_else(|| ChordError::UnknownMode(mode.to_string()))?;
        Ok(chords::match_chord(&tuned.catalog, &mask))
    }
}

/// Tunings for the built-in modes.
pub static TUNINGS: Lazy<TuningCache> = Lazy::new(|| {
    // MODES only holds validated modes, so resolution cannot fail.
    TuningCache::build(&MODES).expect("built-in modes resolve for every key")
});

#[cfg(test)]
mod tests {
    use super::*;
    use PitchClass::*;

    fn mode(name: &str) -> &'static Mode {
        MODES.get(name).unwrap()
    }

    #[test]
    fn major_strings_in_c() {
        assert_eq!(string_notes(C, mode("major")), [C, D, E, F, G, A]);
    }

    #[test]
    fn mixolydian_strings_in_a() {
        assert_eq!(string_notes(A, mode("mixolydian")), [A, B, Cs, D, E, G]);
    }

    #[test]
    fn octave_split_by_key_half() {
        let c = build_tuning(C, mode("major")).unwrap().tuning;
        assert_eq!(c.strings.map(|s| s.octave), [3; 6]);

        let fs = build_tuning(Fs, mode("major")).unwrap().tuning;
        assert_eq!(fs.strings.map(|s| s.octave), [2; 6]);
    }

    #[test]
    fn octave_steps_at_wraparound() {
        // A major: A B C# D E F#; C# wraps past B.
        let notes = string_notes(A, mode("major"));
        assert_eq!(assign_octaves(&notes, A), [2, 2, 3, 3, 3, 3]);

        // F major: F G A A# C D; C wraps past A#.
        let notes = string_notes(F, mode("major"));
        assert_eq!(assign_octaves(&notes, F), [3, 3, 3, 3, 4, 4]);
    }

    #[test]
    fn repeated_pitch_class_steps_octave() {
        let notes = [E, A, D, G, B, E];
        assert_eq!(assign_octaves(&notes, E), [3, 3, 4, 4, 4, 5]);
    }

    #[test]
    fn frequencies_follow_the_table() {
        let tuning = build_tuning(A, mode("minor")).unwrap().tuning;
        assert_eq!(tuning.strings[0].frequency, 110.0);
        for s in tuning.strings {
            assert_eq!(s.frequency, frequency_of(s.pitch_class, s.octave));
        }
    }

    #[test]
    fn resolves_names_from_root_string() {
        let m = mode("dorian");
        let names: Vec<_> = m
            .shapes()
            .iter()
            .map(|shape| resolve_chord_name(D, shape, m).unwrap())
            .collect();
        assert_eq!(names, ["Dm", "Em", "G", "Bdim", "D5", "E5", "Em7", "G7"]);
    }

    #[test]
    fn shapes_transpose_without_changing_patterns() {
        let m = mode("major");
        let in_c = build_tuning(C, m).unwrap().catalog;
        let in_e = build_tuning(E, m).unwrap().catalog;
        let patterns = |c: &ChordCatalog| c.entries.iter().map(|e| e.pattern).collect::<Vec<_>>();
        assert_eq!(patterns(&in_c), patterns(&in_e));
        assert_eq!(in_c.entries[2].name, "F");
        assert_eq!(in_e.entries[2].name, "A");
    }

    #[test]
    fn cache_covers_every_pair() {
        assert_eq!(TUNINGS.len(), MODES.len() * 12);
        let entry = TUNINGS.get("mixolydian", G).unwrap();
        assert_eq!(entry.catalog.entries[1].name, "F");
        assert!(TUNINGS.get("lydian", G).is_none());
    }

    #[test]
    fn cache_match_rejects_unknown_mode() {
        let err = TUNINGS.match_chord("lydian", C, &[1, 0, 1, 0, 1, 0]).unwrap_err();
        assert_eq!(err, ChordError::UnknownMode("lydian".into()));
    }

    #[test]
    fn strum_events_follow_mask() {
        let tuning = build_tuning(C, mode("major")).unwrap().tuning;
        let mask = StringMask::try_from(&[1u8, 0, 1, 0, 1, 0][..]).unwrap();
        let events = tuning.strum_events(&mask);
        assert!(events[0].open && !events[1].open);
        assert_eq!(events[4].frequency, frequency_of(G, 3));
    }
}
