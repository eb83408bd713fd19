//! # Modes and Chord Shapes
//!
//! A mode fixes the open tuning of the six strings (as semitone intervals over
//! the key) and the catalog of chord shapes playable in it. Shapes are
//! positional: the same open/mute pattern names a different chord in every
//! key, because only the string note names move.
//!
//! Modes are validated once when constructed and are immutable afterwards.

use crate::error::ModeError;
use crate::STRING_COUNT;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Chord quality and its display suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChordQuality {
    Major,
    Minor,
    Power,
    Minor7,
    Major7,
    Dominant7,
    Diminished,
}

impl ChordQuality {
    /// Suffix appended to the root note name ("" for a plain major triad).
    pub const fn suffix(self) -> &'static str {
        match self {
            ChordQuality::Major => "",
            ChordQuality::Power => "5",
            ChordQuality::Minor => "m",
            ChordQuality::Minor7 => "m7",
            ChordQuality::Major7 => "maj7",
            ChordQuality::Dominant7 => "7",
            ChordQuality::Diminished => "dim",
        }
    }
}

impl fmt::Display for ChordQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// An open/mute pattern tied to a scale degree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChordShape {
    /// `true` = string sounds open, `false` = muted.
    pub pattern: [bool; STRING_COUNT],
    /// Scale-degree label, e.g. "IV" or "ii7".
    pub degree: String,
    pub quality: ChordQuality,
}

impl ChordShape {
    /// Builds a shape from a 0/1 pattern; any non-zero entry counts as open.
    pub fn new(pattern: [u8; STRING_COUNT], degree: impl Into<String>, quality: ChordQuality) -> Self {
        Self {
            pattern: pattern.map(|bit| bit != 0),
            degree: degree.into(),
            quality,
        }
    }
}

/// A validated mode descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mode {
    name: String,
    intervals: [u8; STRING_COUNT],
    root_map: BTreeMap<String, usize>,
    shapes: Vec<ChordShape>,
}

impl Mode {
    /// Validates and builds a mode.
    ///
    /// Checks that there is one interval per string, every interval lies in
    /// one octave, every root-map entry names a real string, every shape's
    /// degree has a root string, and no two shapes share a pattern.
    pub fn new<I, S>(
        name: impl Into<String>,
        intervals: &[u8],
        root_map: I,
        shapes: Vec<ChordShape>,
    ) -> Result<Mode, ModeError>
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let name = name.into();

        let intervals: [u8; STRING_COUNT] =
            intervals.try_into().map_err(|_| ModeError::IntervalCount {
                mode: name.clone(),
                got: intervals.len(),
            })?;
        if let Some(&interval) = intervals.iter().find(|&&i| i >= 12) {
            return Err(ModeError::IntervalOutOfRange { mode: name, interval });
        }

        let mut roots = BTreeMap::new();
        for (degree, string) in root_map {
            let degree = degree.into();
            if string >= STRING_COUNT {
                return Err(ModeError::RootStringOutOfRange {
                    mode: name,
                    degree,
                    string,
                });
            }
            roots.insert(degree, string);
        }

        for (i, shape) in shapes.iter().enumerate() {
            if !roots.contains_key(&shape.degree) {
                return Err(ModeError::UnknownDegree {
                    mode: name,
                    degree: shape.degree.clone(),
                });
            }
            if shape.pattern.iter().all(|&open| !open) {
                return Err(ModeError::MutedShape {
                    mode: name,
                    degree: shape.degree.clone(),
                });
            }
            if shapes[..i].iter().any(|earlier| earlier.pattern == shape.pattern) {
                return Err(ModeError::DuplicatePattern {
                    mode: name,
                    pattern: shape.pattern,
                });
            }
        }

        Ok(Mode {
            name,
            intervals,
            root_map: roots,
            shapes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Semitone offset of each string over the key.
    pub fn intervals(&self) -> &[u8; STRING_COUNT] {
        &self.intervals
    }

    /// Shape catalog in declaration order. Order decides first-match results.
    pub fn shapes(&self) -> &[ChordShape] {
        &self.shapes
    }

    /// Index of the string that carries the root of `degree`.
    pub fn root_string(&self, degree: &str) -> Option<usize> {
        self.root_map.get(degree).copied()
    }
}

/// Modes keyed by identifier, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ModeRegistry {
    modes: Vec<Mode>,
}

impl ModeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a mode; identifiers must be unique.
    pub fn register(&mut self, mode: Mode) -> Result<(), ModeError> {
        if self.get(mode.name()).is_some() {
            return Err(ModeError::DuplicateMode(mode.name.clone()));
        }
        self.modes.push(mode);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Mode> {
        self.modes.iter().find(|mode| mode.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mode> {
        self.modes.iter()
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    /// Registry holding the four built-in modes.
    pub fn builtin() -> Result<ModeRegistry, ModeError> {
        let mut registry = ModeRegistry::new();
        registry.register(major()?)?;
        registry.register(minor()?)?;
        registry.register(dorian()?)?;
        registry.register(mixolydian()?)?;
        Ok(registry)
    }
}

/// Built-in modes, validated on first access.
pub static MODES: Lazy<ModeRegistry> = Lazy::new(|| {
    // The built-in tables are static data covered by the tests below.
    ModeRegistry::builtin().expect("built-in modes are valid")
});

use ChordQuality::*;

/// Strings sound degrees 1 2 3 4 5 6 of the major scale.
fn major() -> Result<Mode, ModeError> {
    Mode::new(
        "major",
        &[0, 2, 4, 5, 7, 9],
        [
            ("I", 0),
            ("ii", 1),
            ("IV", 3),
            ("vi", 5),
            ("I5", 0),
            ("V5", 4),
            ("ii7", 1),
            ("IVmaj7", 3),
            ("vi7", 5),
        ],
        vec![
            ChordShape::new([1, 0, 1, 0, 1, 0], "I", Major),
            ChordShape::new([0, 1, 0, 1, 0, 1], "ii", Minor),
            ChordShape::new([1, 0, 0, 1, 0, 1], "IV", Major),
            ChordShape::new([1, 0, 1, 0, 0, 1], "vi", Minor),
            ChordShape::new([1, 0, 0, 0, 1, 0], "I5", Power),
            ChordShape::new([0, 1, 0, 0, 1, 0], "V5", Power),
            ChordShape::new([1, 1, 0, 1, 0, 1], "ii7", Minor7),
            ChordShape::new([1, 0, 1, 1, 0, 1], "IVmaj7", Major7),
            ChordShape::new([1, 0, 1, 0, 1, 1], "vi7", Minor7),
        ],
    )
}

/// Strings sound degrees 1 2 b3 4 5 b6 of the natural minor scale.
fn minor() -> Result<Mode, ModeError> {
    Mode::new(
        "minor",
        &[0, 2, 3, 5, 7, 8],
        [
            ("i", 0),
            ("ii°", 1),
            ("iv", 3),
            ("VI", 5),
            ("i5", 0),
            ("v5", 4),
            ("iv7", 3),
            ("VImaj7", 5),
        ],
        vec![
            ChordShape::new([1, 0, 1, 0, 1, 0], "i", Minor),
            ChordShape::new([0, 1, 0, 1, 0, 1], "ii°", Diminished),
            ChordShape::new([1, 0, 0, 1, 0, 1], "iv", Minor),
            ChordShape::new([1, 0, 1, 0, 0, 1], "VI", Major),
            ChordShape::new([1, 0, 0, 0, 1, 0], "i5", Power),
            ChordShape::new([0, 1, 0, 0, 1, 0], "v5", Power),
            ChordShape::new([1, 0, 1, 1, 0, 1], "iv7", Minor7),
            ChordShape::new([1, 0, 1, 0, 1, 1], "VImaj7", Major7),
        ],
    )
}

/// Strings sound degrees 1 2 b3 4 5 6 of the dorian scale.
fn dorian() -> Result<Mode, ModeError> {
    Mode::new(
        "dorian",
        &[0, 2, 3, 5, 7, 9],
        [
            ("i", 0),
            ("ii", 1),
            ("IV", 3),
            ("vi°", 5),
            ("i5", 0),
            ("ii5", 1),
            ("ii7", 1),
            ("IV7", 3),
        ],
        vec![
            ChordShape::new([1, 0, 1, 0, 1, 0], "i", Minor),
            ChordShape::new([0, 1, 0, 1, 0, 1], "ii", Minor),
            ChordShape::new([1, 0, 0, 1, 0, 1], "IV", Major),
            ChordShape::new([1, 0, 1, 0, 0, 1], "vi°", Diminished),
            ChordShape::new([1, 0, 0, 0, 1, 0], "i5", Power),
            ChordShape::new([0, 1, 0, 0, 0, 1], "ii5", Power),
            ChordShape::new([1, 1, 0, 1, 0, 1], "ii7", Minor7),
            ChordShape::new([1, 0, 1, 1, 0, 1], "IV7", Dominant7),
        ],
    )
}

/// Strings sound degrees 1 2 3 4 5 b7 of the mixolydian scale.
fn mixolydian() -> Result<Mode, ModeError> {
    Mode::new(
        "mixolydian",
        &[0, 2, 4, 5, 7, 10],
        [
            ("I", 0),
            ("iii°", 2),
            ("v", 4),
            ("bVII", 5),
            ("I5", 0),
            ("V5", 4),
            ("I7", 0),
            ("v7", 4),
        ],
        vec![
            ChordShape::new([1, 0, 1, 0, 1, 0], "I", Major),
            ChordShape::new([0, 1, 0, 1, 0, 1], "bVII", Major),
            ChordShape::new([0, 1, 0, 0, 1, 1], "v", Minor),
            ChordShape::new([0, 0, 1, 0, 1, 1], "iii°", Diminished),
            ChordShape::new([1, 0, 0, 0, 1, 0], "I5", Power),
            ChordShape::new([0, 1, 0, 0, 1, 0], "V5", Power),
            ChordShape::new([1, 0, 1, 0, 1, 1], "I7", Dominant7),
            ChordShape::new([0, 1, 0, 1, 1, 1], "v7", Minor7),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_is_valid() {
        let registry = ModeRegistry::builtin().unwrap();
        let names: Vec<_> = registry.iter().map(Mode::name).collect();
        assert_eq!(names, ["major", "minor", "dorian", "mixolydian"]);
        assert_eq!(MODES.len(), 4);
    }

    #[test]
    fn every_shape_degree_has_a_root() {
        for mode in MODES.iter() {
            for shape in mode.shapes() {
                assert!(
                    mode.root_string(&shape.degree).is_some(),
                    "{}: {}",
                    mode.name(),
                    shape.degree
                );
            }
        }
    }

    #[test]
    fn rejects_wrong_interval_count() {
        let err = Mode::new("short", &[0, 2, 4], [("I", 0)], vec![]).unwrap_err();
        assert_eq!(
            err,
            ModeError::IntervalCount {
                mode: "short".into(),
                got: 3
            }
        );
    }

    #[test]
    fn rejects_interval_outside_octave() {
        let err = Mode::new("wide", &[0, 2, 4, 5, 7, 14], [("I", 0)], vec![]).unwrap_err();
        assert!(matches!(err, ModeError::IntervalOutOfRange { interval: 14, .. }));
    }

    #[test]
    fn rejects_unknown_degree() {
        let shapes = vec![ChordShape::new([1, 0, 1, 0, 1, 0], "V", Major)];
        let err = Mode::new("m", &[0, 2, 4, 5, 7, 9], [("I", 0)], shapes).unwrap_err();
        assert!(matches!(err, ModeError::UnknownDegree { ref degree, .. } if degree == "V"));
    }

    #[test]
    fn rejects_root_string_out_of_range() {
        let err = Mode::new("m", &[0, 2, 4, 5, 7, 9], [("I", 6)], vec![]).unwrap_err();
        assert!(matches!(err, ModeError::RootStringOutOfRange { string: 6, .. }));
    }

    #[test]
    fn rejects_duplicate_pattern_and_muted_shape() {
        let shapes = vec![
            ChordShape::new([1, 0, 1, 0, 1, 0], "I", Major),
            ChordShape::new([1, 0, 1, 0, 1, 0], "I", Power),
        ];
        let err = Mode::new("m", &[0, 2, 4, 5, 7, 9], [("I", 0)], shapes).unwrap_err();
        assert!(matches!(err, ModeError::DuplicatePattern { .. }));

        let shapes = vec![ChordShape::new([0; 6], "I", Major)];
        let err = Mode::new("m", &[0, 2, 4, 5, 7, 9], [("I", 0)], shapes).unwrap_err();
        assert!(matches!(err, ModeError::MutedShape { .. }));
    }

    #[test]
    fn rejects_duplicate_registration() {
        let mut registry = ModeRegistry::builtin().unwrap();
        let err = registry.register(major().unwrap()).unwrap_err();
        assert_eq!(err, ModeError::DuplicateMode("major".into()));
    }

    #[test]
    fn quality_suffixes() {
        let suffixes: Vec<_> = [Major, Power, Minor, Minor7, Major7, Dominant7, Diminished]
            .iter()
            .map(|q| q.suffix())
            .collect();
        assert_eq!(suffixes, ["", "5", "m", "m7", "maj7", "7", "dim"]);
    }
}
