//! Low-frequency oscillator for modulation effects.

use std::f32::consts::TAU;

/// Phase-accumulating LFO.
///
/// [`advance`](Lfo::advance) returns the current phase in radians
/// `[0, 2π)` and steps it by one sample; callers shape the phase into
/// whatever waveform they need (`phase.sin()`, square via half-cycle
/// comparison, blends). Frequency and sample-rate changes preserve phase,
/// so sweeps stay click-free.
#[derive(Debug, Clone)]
pub struct Lfo {
    phase: f32,
    increment: f32,
    frequency: f32,
    sample_rate: f32,
}

impl Lfo {
    /// Create an LFO at `frequency` Hz.
    pub fn new(sample_rate: f32, frequency: f32) -> Self {
        let mut lfo = Self {
            phase: 0.0,
            increment: 0.0,
            frequency,
            sample_rate,
        };
        lfo.update_increment();
        lfo
    }

    fn update_increment(&mut self) {
        self.increment = TAU * self.frequency / self.sample_rate.max(1.0);
    }

    /// Set the oscillation rate in Hz, keeping phase continuous.
    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = frequency;
        self.update_increment();
    }

    /// Current rate in Hz.
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Update the sample rate, keeping phase continuous.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update_increment();
    }

    /// Return the current phase in radians and advance by one sample.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        let phase = self.phase;
        self.phase += self.increment;
        if self.phase >= TAU {
            self.phase -= TAU;
        }
        phase
    }

    /// Reset phase to zero.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_matches_frequency() {
        let sample_rate = 1000.0;
        let mut lfo = Lfo::new(sample_rate, 2.0);
        // After exactly one second the phase should be back near zero
        // (two full cycles).
        let mut last = 0.0;
        for _ in 0..1000 {
            last = lfo.advance();
        }
        let _ = last;
        let phase = lfo.advance();
        assert!(
            phase < 0.1 || (TAU - phase) < 0.1,
            "phase after 2 cycles: {phase}"
        );
    }

    #[test]
    fn test_phase_continuous_across_frequency_change() {
        let mut lfo = Lfo::new(48000.0, 1.0);
        for _ in 0..100 {
            lfo.advance();
        }
        let before = lfo.phase;
        lfo.set_frequency(7.3);
        assert_eq!(lfo.phase, before);
    }

    #[test]
    fn test_phase_stays_in_range() {
        let mut lfo = Lfo::new(100.0, 19.0);
        for _ in 0..10_000 {
            let phase = lfo.advance();
            assert!((0.0..TAU).contains(&phase));
        }
    }
}
