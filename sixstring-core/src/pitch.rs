//! # Pitch Detection Module
//!
//! Time-domain autocorrelation pitch estimation for a single-voice
//! instrument signal.
//!
//! ## Features
//! - RMS volume gate to report silence instead of guessing
//! - Zero-crossing aligned scan start to reduce phase-dependent noise
//! - Energy-normalized autocorrelation over the 50-2000 Hz lag range
//! - Early exit once the correlation peak has been passed
//! - Parabolic interpolation for sub-sample accuracy
//!
//! ## Known tradeoff
//! The scan stops at the first correlation peak above the "good" threshold,
//! and the integer fallback likewise takes the first peak above the lower
//! threshold. On noisy input that peak may not be the global best, but it is
//! the fundamental rather than a multiple of its period.

use crate::config::DetectorConfig;
use crate::notes::{NoteSearch, nearest_note_in};
use crate::{DetectedPitch, PitchEvent};

/// A raw periodicity estimate before note mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    /// Frequency in Hz
    pub frequency: f32,
    /// Normalized correlation at the detected period (0.0 to 1.0).
    pub confidence: f32,
}

/// Root-mean-square level of a frame.
pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    (frame.iter().map(|&s| s * s).sum::<f32>() / frame.len() as f32).sqrt()
}

/// First negative-to-nonnegative zero crossing in the first half of the frame, or 0.
fn scan_start(frame: &[f32]) -> usize {
    (1..frame.len() / 2)
        .find(|&i| frame[i - 1] < 0.0 && frame[i] >= 0.0)
        .unwrap_or(0)
}

/// Correlation of `frame[start..]` with itself shifted by `lag`, normalized by
/// the geometric mean of both windows' energies. Zero energy yields 0.0.
fn normalized_correlation(frame: &[f32], start: usize, lag: usize) -> f32 {
    if start + lag >= frame.len() {
        return 0.0;
    }
    let window = frame.len() - start - lag;
    let a = &frame[start..start + window];
    let b = &frame[start + lag..start + lag + window];

    let (mut dot, mut energy_a, mut energy_b) = (0.0_f32, 0.0_f32, 0.0_f32);
    for (&x, &y) in a.iter().zip(b) {
        dot += x * y;
        energy_a += x * x;
        energy_b += y * y;
    }

    if energy_a == 0.0 || energy_b == 0.0 {
        return 0.0;
    }
    dot / (energy_a * energy_b).sqrt()
}

/// Sub-sample period from the three correlations around `lag`.
///
/// Returns `None` when the parabola is degenerate.
fn interpolate_period(frame: &[f32], start: usize, lag: usize, peak: f32) -> Option<f32> {
    if lag < 2 {
        return None;
    }
    let y1 = normalized_correlation(frame, start, lag - 1);
    let y3 = normalized_correlation(frame, start, lag + 1);

    let shift = (y1 - y3) / (2.0 * (y1 - 2.0 * peak + y3));
    let period = lag as f32 + shift;
    if period.is_finite() && shift.abs() <= 1.0 {
        Some(period)
    } else {
        None
    }
}

/// Estimates the fundamental of `frame` by autocorrelation.
///
/// Lags are scanned from the shortest period upwards. A lag becomes a
/// candidate while the correlation is rising and above
/// `config.good_correlation`; the scan stops as soon as the correlation falls
/// back below the best candidate. Without a good candidate, the peak of the
/// first lobe that rises above `config.fallback_correlation` is used at
/// integer precision, so a stronger subharmonic further out never wins.
///
/// # Arguments
/// * `frame` - Mono samples; at least two periods of the lowest frequency
/// * `sample_rate` - Sample rate of `frame` in Hz
/// * `config` - Lag range and correlation thresholds
///
/// # Returns
/// * `Some(estimate)` - Frequency and the correlation it was found at
/// * `None` - No sufficiently periodic component
pub fn autocorrelate(frame: &[f32], sample_rate: u32, config: &DetectorConfig) -> Option<Estimate> {
    let sr = sample_rate as f32;
    let min_lag = ((sr / config.max_frequency) as usize).max(1);
    let max_lag = ((sr / config.min_frequency) as usize).min(frame.len() / 2);
    if min_lag >= max_lag {
        return None;
    }

    let start = scan_start(frame);

    // The lag just below the range decides whether the first lag is rising.
    let mut last = normalized_correlation(frame, start, min_lag - 1);
    let mut best: Option<(usize, f32)> = None;
    let mut fallback: Option<(usize, f32)> = None;
    let mut fallback_open = true;

    for lag in min_lag..max_lag {
        let correlation = normalized_correlation(frame, start, lag);
        let rising = correlation > last;

        // Peak of the first lobe that rises above the fallback threshold. The
        // lobe lasts until the correlation crosses zero again.
        if fallback_open {
            match fallback {
                None if rising && correlation > config.fallback_correlation => {
                    fallback = Some((lag, correlation));
                }
                Some(_) if correlation <= 0.0 => fallback_open = false,
                Some((_, c)) if correlation > c => fallback = Some((lag, correlation)),
                _ => {}
            }
        }

        if rising && correlation > config.good_correlation {
            if best.is_none_or(|(_, c)| correlation > c) {
                best = Some((lag, correlation));
            }
        } else if let Some((_, c)) = best {
            if correlation < c {
                break;
            }
        }
        last = correlation;
    }

    if let Some((lag, correlation)) = best {
        let period = interpolate_period(frame, start, lag, correlation).unwrap_or(lag as f32);
        return Some(Estimate {
            frequency: sr / period,
            confidence: correlation.clamp(0.0, 1.0),
        });
    }

    fallback.map(|(lag, correlation)| Estimate {
        frequency: sr / lag as f32,
        confidence: correlation.clamp(0.0, 1.0),
    })
}

/// Runs one full detection pass over a frame.
///
/// Quiet frames become [`PitchEvent::Silence`]; frames without a confident,
/// in-range estimate become [`PitchEvent::Unclear`].
pub fn analyze_frame(frame: &[f32], sample_rate: u32, config: &DetectorConfig) -> PitchEvent {
    let volume = rms(frame);
    if volume < config.volume_gate {
        return PitchEvent::Silence { volume };
    }

    let Some(estimate) = autocorrelate(frame, sample_rate, config) else {
        return PitchEvent::Unclear {
            volume,
            confidence: 0.0,
        };
    };

    if estimate.confidence <= config.confidence_gate {
        return PitchEvent::Unclear {
            volume,
            confidence: estimate.confidence,
        };
    }

    let search = NoteSearch {
        min_hz: config.min_frequency,
        max_hz: config.max_frequency,
        ..NoteSearch::default()
    };
    match nearest_note_in(estimate.frequency, &search) {
        Some(nearest) => PitchEvent::Pitch(DetectedPitch {
            frequency: estimate.frequency,
            confidence: estimate.confidence,
            volume,
            note: nearest.pitch_class,
            octave: nearest.octave,
            cents: nearest.cents,
        }),
        None => PitchEvent::Unclear {
            volume,
            confidence: estimate.confidence,
        },
    }
}

/// Exponential moving average over consecutive detections of the same note.
///
/// Silence, unclear frames and note changes restart the average.
#[derive(Debug, Clone)]
pub struct PitchSmoother {
    alpha: f32,
    current: Option<DetectedPitch>,
}

impl PitchSmoother {
    /// `alpha` is the weight of the newest frame, clamped to (0, 1].
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(f32::EPSILON, 1.0),
            current: None,
        }
    }

    pub fn update(&mut self, event: &PitchEvent) -> Option<DetectedPitch> {
        let PitchEvent::Pitch(detected) = event else {
            self.current = None;
            return None;
        };

        let smoothed = match self.current {
            Some(prev) if same_note(&prev, detected) => {
                let frequency = self.alpha * detected.frequency + (1.0 - self.alpha) * prev.frequency;
                let ratio = frequency / detected.frequency;
                DetectedPitch {
                    frequency,
                    cents: detected.cents + 1200.0 * ratio.log2(),
                    ..*detected
                }
            }
            _ => *detected,
        };
        self.current = Some(smoothed);
        Some(smoothed)
    }

    /// Forgets the running average, e.g. when the input source changes.
    pub fn reset(&mut self) {
        self.current = None;
    }
}

fn same_note(a: &DetectedPitch, b: &DetectedPitch) -> bool {
    a.note == b.note && a.octave == b.octave
}

/// Convenience for callers that only need the note name.
pub fn note_label(pitch: &DetectedPitch) -> String {
    format!("{}{}", pitch.note, pitch.octave)
}
