//! # Configuration
//!
//! Tunable parameters for detection, synthesis and strumming. Every struct
//! has defaults and deserializes from partial input, so a host only has to
//! spell out what it changes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Parameters of the autocorrelation pitch detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Samples per analysis frame.
    pub frame_len: usize,
    /// RMS below this is reported as silence.
    pub volume_gate: f32,
    /// Estimates at or below this correlation are reported as unclear.
    pub confidence_gate: f32,
    /// Correlation a rising lag must exceed to become a candidate period.
    pub good_correlation: f32,
    /// Correlation accepted at integer precision when no lag was good.
    pub fallback_correlation: f32,
    /// Lowest detectable pitch in Hz (sets the longest lag).
    pub min_frequency: f32,
    /// Highest detectable pitch in Hz (sets the shortest lag).
    pub max_frequency: f32,
    /// Cadence of detection passes while listening.
    pub tick_interval: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            frame_len: 4096,
            volume_gate: 0.002,
            confidence_gate: 0.6,
            good_correlation: 0.9,
            fallback_correlation: 0.8,
            min_frequency: 50.0,
            max_frequency: 2000.0,
            tick_interval: Duration::from_millis(16),
        }
    }
}

/// Timbre parameters of a Karplus-Strong pluck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluckParams {
    /// 0.0 (dark, heavy smoothing) to 1.0 (bright, no smoothing).
    pub brightness: f32,
    /// Per-sample energy retained by the loop, below 1.0.
    pub damping: f32,
    /// Pluck point as a fraction of string length, 0.0 to 0.5.
    pub pluck_position: f32,
    /// Amount of body resonance mixed into the output.
    pub body_resonance: f32,
    /// Center of the body band-pass in Hz.
    pub body_frequency: f32,
    pub body_q: f32,
    /// Linear attack time in seconds.
    pub attack: f32,
    /// Time constant of the decay towards `sustain`, in seconds.
    pub decay: f32,
    /// Level the decay settles at before the release.
    pub sustain: f32,
    /// Seed for the noise burst; `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl Default for PluckParams {
    fn default() -> Self {
        Self {
            brightness: 0.5,
            damping: 0.996,
            pluck_position: 0.18,
            body_resonance: 0.25,
            body_frequency: 180.0,
            body_q: 1.4,
            attack: 0.003,
            decay: 0.06,
            sustain: 0.6,
            seed: None,
        }
    }
}

/// Strum direction across the strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrumDirection {
    /// Lowest string first.
    Down,
    /// Highest string first.
    Up,
}

/// How a strum is spread over time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrumConfig {
    /// Delay between consecutive played strings, limited to 0..=1000 ms.
    pub inter_onset_ms: f32,
    pub direction: StrumDirection,
    /// Length of each string's voice in seconds.
    pub duration: f32,
    pub volume: f32,
    pub params: PluckParams,
}

impl Default for StrumConfig {
    fn default() -> Self {
        Self {
            inter_onset_ms: 25.0,
            direction: StrumDirection::Down,
            duration: 2.5,
            volume: 0.7,
            params: PluckParams::default(),
        }
    }
}
