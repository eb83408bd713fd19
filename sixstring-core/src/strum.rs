//! Strum planning and offline mixdown.
//!
//! A strum is a list of open strings turned into staggered pluck requests.
//! Muted strings are skipped and do not leave a gap in the timing.

use crate::config::{StrumConfig, StrumDirection};
use crate::synth::{PluckRequest, synthesize_pluck, voice_len};
use serde::Serialize;
use std::time::Duration;

/// Longest delay between two strings of one strum.
pub const MAX_INTER_ONSET_MS: f32 = 1000.0;

/// One string's contribution to a strum, low string first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StringEvent {
    pub frequency: f32,
    pub open: bool,
}

/// A pluck and when it starts relative to the strum.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledPluck {
    pub onset: Duration,
    pub request: PluckRequest,
}

impl ScheduledPluck {
    /// Onset in whole samples.
    pub fn onset_samples(&self, sample_rate: u32) -> usize {
        (self.onset.as_secs_f64() * sample_rate as f64).round() as usize
    }
}

/// Orders the open strings and staggers them by `config.inter_onset_ms`.
///
/// `Down` keeps the given order, `Up` reverses it. The n-th played string
/// starts at `n * inter_onset_ms`, with the delay limited to
/// [`MAX_INTER_ONSET_MS`].
pub fn plan_strum(events: &[StringEvent], config: &StrumConfig) -> Vec<ScheduledPluck> {
    let mut open: Vec<&StringEvent> = events.iter().filter(|e| e.open).collect();
    if config.direction == StrumDirection::Up {
        open.reverse();
    }

    let step = Duration::from_secs_f32(inter_onset_ms(config) / 1000.0);
    open.into_iter()
        .enumerate()
        .map(|(i, event)| ScheduledPluck {
            onset: step.saturating_mul(u32::try_from(i).unwrap_or(u32::MAX)),
            request: PluckRequest::new(event.frequency, config.duration, config.volume)
                .with_params(config.params.clone()),
        })
        .collect()
}

/// Inter-onset delay limited to `0..=MAX_INTER_ONSET_MS`; NaN counts as zero.
fn inter_onset_ms(config: &StrumConfig) -> f32 {
    if config.inter_onset_ms.is_nan() {
        0.0
    } else {
        config.inter_onset_ms.clamp(0.0, MAX_INTER_ONSET_MS)
    }
}

/// Renders every pluck on its own and sums them at their onsets.
///
/// The buffer ends with the latest-ending voice.
pub fn render_strum(sample_rate: u32, plan: &[ScheduledPluck]) -> Vec<f32> {
    let len = plan
        .iter()
        .map(|p| p.onset_samples(sample_rate) + voice_len(sample_rate, p.request.duration))
        .max()
        .unwrap_or(0);

    let mut mix = vec![0.0; len];
    for pluck in plan {
        let offset = pluck.onset_samples(sample_rate);
        let voice = synthesize_pluck(sample_rate, &pluck.request);
        for (out, sample) in mix[offset..].iter_mut().zip(voice) {
            *out += sample;
        }
    }
    mix
}
