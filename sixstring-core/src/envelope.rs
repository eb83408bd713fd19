//! Amplitude envelope for a single pluck.
//!
//! Linear attack to 1.0, exponential decay towards the sustain level, then an
//! exponential release that reaches 0.1% of its starting level on the last
//! sample. After the attack the level never increases.

use crate::config::PluckParams;

/// ln(1000): the release falls by 60 dB over its length.
const RELEASE_DEPTH: f32 = 6.907_755;

/// Number of decay time constants before the release begins.
const DECAY_SPAN: f32 = 3.0;

#[derive(Debug, Clone)]
pub struct PluckEnvelope {
    attack: usize,
    decay_tau: f32,
    sustain: f32,
    release_start: usize,
    total: usize,
}

impl PluckEnvelope {
    /// Envelope for a voice of `total` samples.
    pub fn new(params: &PluckParams, sample_rate: u32, total: usize) -> Self {
        let sr = sample_rate as f32;
        let attack = ((params.attack.max(0.0) * sr).round() as usize).min(total);
        let decay_tau = (params.decay.max(0.0) * sr).max(1.0);
        let release_start = (attack + (DECAY_SPAN * decay_tau) as usize).min(total);
        Self {
            attack,
            decay_tau,
            sustain: params.sustain.clamp(0.0, 1.0),
            release_start,
            total,
        }
    }

    fn decay_level(&self, n: usize) -> f32 {
        let t = (n - self.attack) as f32 / self.decay_tau;
        self.sustain + (1.0 - self.sustain) * (-t).exp()
    }

    /// Gain at sample `n`.
    pub fn level(&self, n: usize) -> f32 {
        if n >= self.total {
            return 0.0;
        }
        if n < self.attack {
            return n as f32 / self.attack as f32;
        }
        if n < self.release_start {
            return self.decay_level(n);
        }

        let start_level = self.decay_level(self.release_start);
        let release_len = (self.total - self.release_start).max(1) as f32;
        let progress = (n - self.release_start + 1) as f32 / release_len;
        start_level * (-RELEASE_DEPTH * progress).exp()
    }

    /// Index of the first sample after the attack.
    pub fn attack_end(&self) -> usize {
        self.attack
    }

    pub fn release_start(&self) -> usize {
        self.release_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 44100;

    fn envelope(seconds: f32) -> PluckEnvelope {
        let total = (SR as f32 * seconds) as usize;
        PluckEnvelope::new(&PluckParams::default(), SR, total)
    }

    #[test]
    fn attack_is_linear_and_fast() {
        let env = envelope(1.0);
        assert_eq!(env.attack_end(), 132); // 3 ms at 44.1 kHz
        assert_eq!(env.level(0), 0.0);
        assert!((env.level(66) - 0.5).abs() < 1e-6);
        assert!((env.level(132) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn settles_near_sustain_before_release() {
        let env = envelope(2.0);
        let level = env.level(env.release_start() - 1);
        assert!((level - 0.6).abs() < 0.03, "level {level}");
    }

    #[test]
    fn never_rises_after_attack() {
        let env = envelope(1.5);
        let total = (SR as f32 * 1.5) as usize;
        let mut previous = env.level(env.attack_end());
        for n in env.attack_end() + 1..total {
            let level = env.level(n);
            assert!(level <= previous + 1e-6, "rose at {n}: {previous} -> {level}");
            previous = level;
        }
    }

    #[test]
    fn ends_near_zero() {
        let env = envelope(1.0);
        let last = env.level(SR as usize - 1);
        assert!(last < 1e-3, "last level {last}");
        assert_eq!(env.level(SR as usize), 0.0);
    }

    #[test]
    fn short_voice_is_truncated() {
        let env = PluckEnvelope::new(&PluckParams::default(), SR, 50);
        assert_eq!(env.attack_end(), 50);
        assert!(env.level(49) < 1.0);
    }
}
