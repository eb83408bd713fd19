//! # Karplus-Strong Synthesis
//!
//! Plucked-string voices from a filtered feedback delay line.
//!
//! ## Features
//! - Noise burst excitation with a comb notch at the pluck point
//! - One-pole loop filter driven by `brightness`, per-pass `damping`
//! - Band-pass "body" resonance mixed into the output
//! - Attack / decay / release envelope
//!
//! ## Pitch quantization
//! The delay line is a whole number of samples, `round(sample_rate / f)`,
//! so the sounding pitch is `sample_rate / delay_len`. The error grows with
//! frequency: at 44.1 kHz it stays under 2 cents below 200 Hz and reaches
//! about 8 cents near 1 kHz. The loop filter adds a small extra flattening.

use crate::config::PluckParams;
use crate::envelope::PluckEnvelope;
use crate::filter::{BandPass, OnePole};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Lowest synthesizable fundamental in Hz.
pub const MIN_FREQUENCY: f32 = 20.0;

/// Gain of the delayed copy subtracted from the excitation.
const PLUCK_NODE_GAIN: f32 = 0.5;

/// One plucked note.
#[derive(Debug, Clone, PartialEq)]
pub struct PluckRequest {
    pub frequency: f32,
    /// Length of the voice in seconds.
    pub duration: f32,
    /// Output gain, 0.0 to 1.0.
    pub volume: f32,
    pub params: PluckParams,
}

impl PluckRequest {
    pub fn new(frequency: f32, duration: f32, volume: f32) -> Self {
        Self {
            frequency,
            duration,
            volume,
            params: PluckParams::default(),
        }
    }

    pub fn with_params(mut self, params: PluckParams) -> Self {
        self.params = params;
        self
    }
}

/// Number of samples a voice of `duration` seconds occupies.
///
/// The product is taken in `f32`, the precision `duration` is given in, so
/// that e.g. 0.2 s at 44.1 kHz is 8820 samples rather than 8821.
pub fn voice_len(sample_rate: u32, duration: f32) -> usize {
    let samples = (sample_rate as f32 * duration).ceil();
    if samples.is_finite() && samples > 0.0 {
        samples as usize
    } else {
        0
    }
}

/// Delay line length for `frequency`, after clamping it to the playable range.
pub fn delay_len(sample_rate: u32, frequency: f32) -> usize {
    let sr = sample_rate as f32;
    let nyquist = (sr / 2.0).max(MIN_FREQUENCY);
    let frequency = if frequency.is_finite() {
        frequency.clamp(MIN_FREQUENCY, nyquist)
    } else {
        MIN_FREQUENCY
    };
    ((sr / frequency).round() as usize).max(2)
}

/// Renders one plucked-string voice.
///
/// The output is exactly `ceil(sample_rate * duration)` samples long. Every
/// call owns its delay line, filters and noise generator, so voices can be
/// rendered concurrently.
///
/// # Arguments
/// * `sample_rate` - Output rate in Hz
/// * `request` - Frequency, duration, volume and timbre of the pluck
///
/// # Returns
/// Mono samples, [`voice_len`] long; empty for a zero, negative or
/// non-finite duration.
pub fn synthesize_pluck(sample_rate: u32, request: &PluckRequest) -> Vec<f32> {
    let total = voice_len(sample_rate, request.duration);
    if total == 0 {
        return Vec::new();
    }
    let params = &request.params;
    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut line = excitation(&mut rng, delay_len(sample_rate, request.frequency), params);
    let len = line.len();

    let mut loop_filter = OnePole::new(params.brightness.clamp(0.0, 1.0) * 0.9 + 0.1);
    let mut body = BandPass::new(params.body_frequency, params.body_q, sample_rate as f32);
    let damping = params.damping.clamp(0.0, 0.9999);
    let envelope = PluckEnvelope::new(params, sample_rate, total);
    let volume = request.volume.clamp(0.0, 1.0);

    let mut output = Vec::with_capacity(total);
    let mut index = 0;
    for n in 0..total {
        let current = line[index];
        line[index] = loop_filter.process(current) * damping;
        index = (index + 1) % len;

        let sample = current + params.body_resonance * body.process(current);
        output.push(sample * envelope.level(n) * volume);
    }
    output
}

/// Noise burst with a comb notch at the pluck point, peak-normalized to 1.0.
fn excitation(rng: &mut StdRng, len: usize, params: &PluckParams) -> Vec<f32> {
    let noise: Vec<f32> = (0..len).map(|_| rng.random_range(-1.0_f32..1.0)).collect();

    let position = params.pluck_position.clamp(0.0, 0.5);
    let period = ((len as f32 * position).round() as usize).max(1);
    let mut line: Vec<f32> = noise
        .iter()
        .enumerate()
        .map(|(i, &x)| match i.checked_sub(period) {
            Some(j) => x - PLUCK_NODE_GAIN * noise[j],
            None => x,
        })
        .collect();

    let peak = line.iter().fold(0.0_f32, |m, &x| m.max(x.abs()));
    if peak > 0.0 {
        line.iter_mut().for_each(|x| *x /= peak);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectorConfig;
    use crate::pitch;
    use rustfft::FftPlanner;
    use rustfft::num_complex::Complex;

    const SR: u32 = 44100;

    fn seeded(frequency: f32, duration: f32) -> PluckRequest {
        PluckRequest::new(frequency, duration, 0.8).with_params(PluckParams {
            seed: Some(7),
            ..PluckParams::default()
        })
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn output_length_is_exact() {
        assert_eq!(synthesize_pluck(SR, &seeded(110.0, 1.0)).len(), 44100);
        assert_eq!(synthesize_pluck(SR, &seeded(110.0, 0.5)).len(), 22050);
        assert_eq!(synthesize_pluck(SR, &seeded(110.0, 0.01)).len(), 441);
        assert_eq!(synthesize_pluck(48000, &seeded(110.0, 0.1)).len(), 4800);
        assert!(synthesize_pluck(SR, &seeded(110.0, 0.0)).is_empty());
        assert!(synthesize_pluck(SR, &seeded(110.0, -1.0)).is_empty());
        assert!(synthesize_pluck(SR, &seeded(110.0, f32::NAN)).is_empty());
        assert!(synthesize_pluck(SR, &seeded(110.0, f32::INFINITY)).is_empty());
    }

    #[test]
    fn out_of_range_frequencies_are_clamped() {
        assert_eq!(delay_len(SR, 0.0), 2205);
        assert_eq!(delay_len(SR, -50.0), 2205);
        assert_eq!(delay_len(SR, f32::NAN), 2205);
        assert_eq!(delay_len(SR, 1.0e6), 2);
        assert_eq!(delay_len(SR, 82.41), 535);

        for frequency in [0.0, -10.0, 1.0e6] {
            let samples = synthesize_pluck(SR, &seeded(frequency, 0.2));
            assert_eq!(samples.len(), 8820);
            assert!(samples.iter().all(|s| s.is_finite()));
        }
    }

    #[test]
    fn seeded_plucks_are_reproducible() {
        let a = synthesize_pluck(SR, &seeded(196.0, 0.3));
        let b = synthesize_pluck(SR, &seeded(196.0, 0.3));
        assert_eq!(a, b);

        let mut other = seeded(196.0, 0.3);
        other.params.seed = Some(8);
        assert_ne!(a, synthesize_pluck(SR, &other));
    }

    #[test]
    fn windowed_energy_does_not_grow_after_attack() {
        let samples = synthesize_pluck(SR, &seeded(110.0, 2.0));
        let windows: Vec<f32> = samples[8820..].chunks_exact(4096).map(rms).collect();
        assert!(windows.len() > 5);
        for pair in windows.windows(2) {
            assert!(pair[1] <= pair[0] * 1.05, "energy rose: {pair:?}");
        }
        assert!(windows[windows.len() - 1] < windows[0] * 0.1);
    }

    #[test]
    fn silent_volume_is_silent() {
        let mut request = seeded(220.0, 0.1);
        request.volume = 0.0;
        assert!(synthesize_pluck(SR, &request).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn fundamental_is_recovered_by_autocorrelation() {
        let frequency = 196.0;
        let sounding = SR as f32 / delay_len(SR, frequency) as f32;
        let samples = synthesize_pluck(SR, &seeded(frequency, 1.0));
        let frame = &samples[22050..22050 + 4096];

        let estimate = pitch::autocorrelate(frame, SR, &DetectorConfig::default())
            .expect("a pluck is periodic");
        let error = (estimate.frequency - sounding).abs() / sounding;
        assert!(error < 0.01, "estimated {} Hz for {sounding} Hz", estimate.frequency);
    }

    #[test]
    fn spectral_peak_is_a_harmonic() {
        let frequency = 196.0;
        let sounding = SR as f32 / delay_len(SR, frequency) as f32;
        let samples = synthesize_pluck(SR, &seeded(frequency, 1.0));

        let n = 16384;
        let mut buffer: Vec<Complex<f32>> = samples[22050..22050 + n]
            .iter()
            .map(|&s| Complex { re: s, im: 0.0 })
            .collect();
        FftPlanner::new().plan_fft_forward(n).process(&mut buffer);

        let bin_hz = SR as f32 / n as f32;
        let (peak_bin, _) = buffer[1..n / 2]
            .iter()
            .enumerate()
            .map(|(i, c)| (i + 1, c.norm()))
            .fold((0, 0.0_f32), |best, (i, m)| if m > best.1 { (i, m) } else { best });

        let ratio = peak_bin as f32 * bin_hz / sounding;
        assert!(ratio.round() >= 1.0, "peak below the fundamental: {ratio}");
        assert!((ratio - ratio.round()).abs() < 0.05, "peak off harmonic: {ratio}");
    }
}
