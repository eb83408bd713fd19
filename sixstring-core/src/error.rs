//! # Error Types
//!
//! One error enum per concern. Capture failures are classified so a host can
//! tell a denied permission from a missing microphone without string matching.

use thiserror::Error;

/// Returned when a string is not a recognizable note name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{0}` is not a note name")]
pub struct ParsePitchClassError(pub String);

/// Errors raised while registering or resolving a [`Mode`](crate::modes::Mode).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModeError {
    /// A mode must define one interval per string.
    #[error("mode `{mode}` defines {got} intervals, expected 6")]
    IntervalCount { mode: String, got: usize },

    /// Intervals are semitone offsets inside one octave.
    #[error("mode `{mode}` has interval {interval} outside 0..12")]
    IntervalOutOfRange { mode: String, interval: u8 },

    /// The root map points at a string that does not exist.
    #[error("mode `{mode}` maps degree `{degree}` to string {string}, expected 0..6")]
    RootStringOutOfRange {
        mode: String,
        degree: String,
        string: usize,
    },

    /// A chord shape names a degree that has no root string.
    #[error("mode `{mode}` has no root string for degree `{degree}`")]
    UnknownDegree { mode: String, degree: String },

    /// Two shapes share a pattern; the second could never match.
    #[error("mode `{mode}` declares pattern {pattern:?} more than once")]
    DuplicatePattern { mode: String, pattern: [bool; 6] },

    /// The all-muted vector is reserved for the muted sentinel.
    #[error("mode `{mode}` declares an all-muted shape for degree `{degree}`")]
    MutedShape { mode: String, degree: String },

    /// Mode identifiers are unique within a registry.
    #[error("mode `{0}` is already registered")]
    DuplicateMode(String),
}

/// Errors raised by the chord matcher on malformed input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChordError {
    /// The string-state vector must have exactly one entry per string.
    #[error("expected a {expected}-string state vector, got {got}")]
    InvalidLength { expected: usize, got: usize },

    /// String states are 0 (muted) or 1 (open).
    #[error("string {string} has state {value}, expected 0 or 1")]
    InvalidState { string: usize, value: u8 },

    /// The mode identifier is not registered.
    #[error("unknown mode `{0}`")]
    UnknownMode(String),
}

/// Classified capture-device failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// The platform refused microphone access.
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    /// No usable input device is present.
    #[error("no audio input device found")]
    DeviceNotFound,

    /// Anything else the audio backend reported.
    #[error("audio capture failed: {0}")]
    Other(String),
}

/// Errors returned by [`PitchDetector`](crate::detector::PitchDetector) entry points.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectorError {
    /// `start()` was called while the detector is requesting or listening.
    #[error("detector is already running; call stop() first")]
    AlreadyRunning,

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

/// Errors raised while opening the output device.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no audio output device found")]
    NoOutputDevice,

    #[error("unsupported output sample format {0}")]
    UnsupportedFormat(String),

    #[error("audio output failed: {0}")]
    Stream(String),
}
