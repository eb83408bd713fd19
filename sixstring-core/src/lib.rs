// sixstring-core/src/lib.rs

//! The core logic for the six-string companion.
//! This crate is responsible for pitch detection, plucked-string synthesis,
//! and the per-key, per-mode tuning and chord-shape engine. It is completely
//! headless and contains no GUI code.

pub mod audio;
pub mod chords;
pub mod config;
pub mod detector;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod modes;
pub mod notes;
pub mod pitch;
pub mod playback;
pub mod strum;
pub mod synth;
pub mod tuning;

use notes::PitchClass;
use serde::Serialize;

/// Number of strings on the instrument.
pub const STRING_COUNT: usize = 6;

/// A confident pitch detected in one capture frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectedPitch {
    /// Estimated fundamental in Hz.
    pub frequency: f32,
    /// Correlation at the detected period (0.0 to 1.0).
    pub confidence: f32,
    /// RMS level of the frame.
    pub volume: f32,
    /// Nearest equal-tempered note.
    pub note: PitchClass,
    pub octave: i32,
    /// Deviation from the nearest note in cents, within ±50.
    pub cents: f32,
}

/// Outcome of a single detection pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PitchEvent {
    /// A confident pitch mapped to a note.
    Pitch(DetectedPitch),
    /// The frame was below the volume gate.
    Silence { volume: f32 },
    /// Loud enough, but no confident in-range pitch.
    Unclear { volume: f32, confidence: f32 },
}

impl PitchEvent {
    pub fn volume(&self) -> f32 {
        match self {
            PitchEvent::Pitch(p) => p.volume,
            PitchEvent::Silence { volume } | PitchEvent::Unclear { volume, .. } => *volume,
        }
    }
}
