//! Second-order IIR filter section (direct form I).
//!
//! Coefficients follow the RBJ Audio EQ Cookbook; only the peaking form is
//! provided because that is all the three-band EQ and tone stages need.

use std::f32::consts::PI;

/// One biquad section with direct form I state.
#[derive(Debug, Clone, Default)]
pub struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    /// Identity filter (passes input through unchanged).
    pub fn new() -> Self {
        Self {
            b0: 1.0,
            ..Self::default()
        }
    }

    /// Install normalized coefficients (`a0` already divided out).
    pub fn set_coefficients(&mut self, b0: f32, b1: f32, b2: f32, a1: f32, a2: f32) {
        self.b0 = b0;
        self.b1 = b1;
        self.b2 = b2;
        self.a1 = a1;
        self.a2 = a2;
    }

    /// Process one sample.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }

    /// Clear the filter history without touching coefficients.
    pub fn clear(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

/// RBJ peaking EQ coefficients, normalized by `a0`.
///
/// `A = 10^(gain_db/40)`, so the filter reaches exactly `gain_db` at the
/// center frequency.
pub fn peaking_coefficients(
    freq_hz: f32,
    q: f32,
    gain_db: f32,
    sample_rate: f32,
) -> (f32, f32, f32, f32, f32) {
    let a = 10.0f32.powf(gain_db / 40.0);
    let w0 = 2.0 * PI * freq_hz / sample_rate;
    let (sin_w0, cos_w0) = w0.sin_cos();
    let alpha = sin_w0 / (2.0 * q);

    let b0 = 1.0 + alpha * a;
    let b1 = -2.0 * cos_w0;
    let b2 = 1.0 - alpha * a;
    let a0 = 1.0 + alpha / a;
    let a1 = -2.0 * cos_w0;
    let a2 = 1.0 - alpha / a;

    (b0 / a0, b1 / a0, b2 / a0, a1 / a0, a2 / a0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_amplitude_after(filter: &mut Biquad, freq: f32, sample_rate: f32) -> f32 {
        // Settle, then measure the peak over a few cycles.
        let total = (sample_rate * 0.5) as usize;
        let measure_from = total / 2;
        let mut peak = 0.0f32;
        for n in 0..total {
            let x = (2.0 * PI * freq * n as f32 / sample_rate).sin() * 0.1;
            let y = filter.process(x);
            if n >= measure_from {
                peak = peak.max(y.abs());
            }
        }
        peak
    }

    #[test]
    fn test_identity_by_default() {
        let mut filter = Biquad::new();
        for i in 0..32 {
            let x = (i as f32 * 0.1).sin();
            assert_eq!(filter.process(x), x);
        }
    }

    #[test]
    fn test_peaking_gain_at_center() {
        let sample_rate = 48000.0;
        let (b0, b1, b2, a1, a2) = peaking_coefficients(1000.0, 1.0, 12.0, sample_rate);
        let mut filter = Biquad::new();
        filter.set_coefficients(b0, b1, b2, a1, a2);

        let peak = sine_amplitude_after(&mut filter, 1000.0, sample_rate);
        let gain_db = 20.0 * (peak / 0.1).log10();
        assert!(
            (gain_db - 12.0).abs() < 0.5,
            "expected ~12 dB at center, got {gain_db:.2} dB"
        );
    }

    #[test]
    fn test_peaking_unity_far_from_center() {
        let sample_rate = 48000.0;
        let (b0, b1, b2, a1, a2) = peaking_coefficients(1000.0, 1.0, 12.0, sample_rate);
        let mut filter = Biquad::new();
        filter.set_coefficients(b0, b1, b2, a1, a2);

        let peak = sine_amplitude_after(&mut filter, 60.0, sample_rate);
        let gain_db = 20.0 * (peak / 0.1).log10();
        assert!(
            gain_db.abs() < 2.0,
            "expected ~0 dB two octaves away, got {gain_db:.2} dB"
        );
    }

    #[test]
    fn test_clear_resets_state() {
        let (b0, b1, b2, a1, a2) = peaking_coefficients(500.0, 1.0, 6.0, 48000.0);
        let mut filter = Biquad::new();
        filter.set_coefficients(b0, b1, b2, a1, a2);

        for _ in 0..100 {
            filter.process(0.7);
        }
        filter.clear();

        let mut reference = Biquad::new();
        reference.set_coefficients(b0, b1, b2, a1, a2);
        assert_eq!(filter.process(0.3), reference.process(0.3));
    }
}
