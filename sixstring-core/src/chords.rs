//! # Chord Pattern Matcher
//!
//! Exact matching of a live open/mute vector against a resolved catalog.
//! The catalog is scanned in declaration order and the first equal pattern
//! wins; there is no partial or superset matching.

use crate::error::ChordError;
use crate::modes::ChordQuality;
use crate::notes::PitchClass;
use crate::tuning::ChordCatalog;
use crate::STRING_COUNT;
use serde::Serialize;

/// Validated open (`true`) / muted (`false`) state of the six strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct StringMask([bool; STRING_COUNT]);

impl StringMask {
    pub const ALL_MUTED: StringMask = StringMask([false; STRING_COUNT]);

    pub fn new(states: [bool; STRING_COUNT]) -> Self {
        StringMask(states)
    }

    pub fn is_open(&self, string: usize) -> bool {
        self.0.get(string).copied().unwrap_or(false)
    }

    pub fn is_all_muted(&self) -> bool {
        self.0.iter().all(|&open| !open)
    }
}

impl TryFrom<&[u8]> for StringMask {
    type Error = ChordError;

    fn try_from(states: &[u8]) -> Result<Self, Self::Error> {
        if states.len() != STRING_COUNT {
            return Err(ChordError::InvalidLength {
                expected: STRING_COUNT,
                got: states.len(),
            });
        }
        let mut mask = [false; STRING_COUNT];
        for (string, (&value, slot)) in states.iter().zip(mask.iter_mut()).enumerate() {
            *slot = match value {
                0 => false,
                1 => true,
                _ => return Err(ChordError::InvalidState { string, value }),
            };
        }
        Ok(StringMask(mask))
    }
}

impl TryFrom<[u8; STRING_COUNT]> for StringMask {
    type Error = ChordError;

    fn try_from(states: [u8; STRING_COUNT]) -> Result<Self, Self::Error> {
        StringMask::try_from(&states[..])
    }
}

/// A catalog entry that matched the string states.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedChord {
    pub name: String,
    pub root: PitchClass,
    pub degree: String,
    pub quality: ChordQuality,
    /// Position of the entry in the catalog.
    pub index: usize,
}

/// Result of a successful lookup. An unrecognized pattern is `None` instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChordMatch {
    Chord(MatchedChord),
    /// Every string is muted.
    AllMuted,
}

/// Returns the first catalog entry whose pattern equals `mask`.
///
/// An all-muted mask that matches nothing yields [`ChordMatch::AllMuted`];
/// any other unmatched mask yields `None`.
pub fn match_chord(catalog: &ChordCatalog, mask: &StringMask) -> Option<ChordMatch> {
    let found = catalog
        .entries
        .iter()
        .enumerate()
        .find(|(_, entry)| entry.pattern == mask.0);

    match found {
        Some((index, entry)) => Some(ChordMatch::Chord(MatchedChord {
            name: entry.name.clone(),
            root: entry.root,
            degree: entry.degree.clone(),
            quality: entry.quality,
            index,
        })),
        None if mask.is_all_muted() => Some(ChordMatch::AllMuted),
        None => None,
    }
}
