//! Filters used by the plucked-string model.

use std::f32::consts::PI;

/// One-pole low-pass: `y[n] = a * x[n] + (1 - a) * y[n-1]`.
///
/// `a = 1.0` passes the input unchanged; smaller values smooth harder.
#[derive(Debug, Clone)]
pub struct OnePole {
    coefficient: f32,
    previous: f32,
}

impl OnePole {
    pub fn new(coefficient: f32) -> Self {
        Self {
            coefficient: coefficient.clamp(0.0, 1.0),
            previous: 0.0,
        }
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.coefficient * input + (1.0 - self.coefficient) * self.previous;
        self.previous = output;
        output
    }
}

/// Second-order band-pass (constant 0 dB peak gain).
///
/// Direct Form II Transposed, coefficients from the Audio EQ Cookbook.
#[derive(Debug, Clone)]
pub struct BandPass {
    b0: f32,
    b2: f32,
    a1: f32,
    a2: f32,

    z1: f32,
    z2: f32,
}

impl BandPass {
    pub fn new(center: f32, q: f32, sample_rate: f32) -> Self {
        let center = center.clamp(1.0, sample_rate * 0.45);
        let w0 = 2.0 * PI * center / sample_rate;
        let alpha = w0.sin() / (2.0 * q.max(0.01));

        let a0 = 1.0 + alpha;
        BandPass {
            b0: alpha / a0,
            b2: -alpha / a0,
            a1: -2.0 * w0.cos() / a0,
            a2: (1.0 - alpha) / a0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.b0 * input + self.z1;
        self.z1 = -self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak_amplitude(filter: &mut BandPass, freq: f32, sample_rate: f32) -> f32 {
        let mut max_out = 0.0_f32;
        for i in 0..(sample_rate as usize / 2) {
            let input = (2.0 * PI * freq * i as f32 / sample_rate).sin();
            let out = filter.process(input);
            if i > 4000 {
                // skip transient
                max_out = max_out.max(out.abs());
            }
        }
        max_out
    }

    #[test]
    fn one_pole_unity_passes_input() {
        let mut f = OnePole::new(1.0);
        assert_eq!(f.process(0.7), 0.7);
        assert_eq!(f.process(-0.2), -0.2);
    }

    #[test]
    fn one_pole_converges_to_dc() {
        let mut f = OnePole::new(0.1);
        let mut output = 0.0;
        for _ in 0..500 {
            output = f.process(1.0);
        }
        assert!((output - 1.0).abs() < 1e-3, "got {output}");
    }

    #[test]
    fn band_pass_peaks_at_center() {
        let sr = 44100.0;
        let at_center = peak_amplitude(&mut BandPass::new(180.0, 1.4, sr), 180.0, sr);
        let far_above = peak_amplitude(&mut BandPass::new(180.0, 1.4, sr), 5000.0, sr);
        assert!((at_center - 1.0).abs() < 0.05, "center gain {at_center}");
        assert!(far_above < 0.1, "5 kHz gain {far_above}");
    }

    #[test]
    fn band_pass_blocks_dc_and_stays_finite() {
        let mut f = BandPass::new(180.0, 1.4, 44100.0);
        let mut output = 0.0;
        for _ in 0..20000 {
            output = f.process(1.0);
            assert!(output.is_finite());
        }
        assert!(output.abs() < 1e-3, "got {output}");
    }
}
