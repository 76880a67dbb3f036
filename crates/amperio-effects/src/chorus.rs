//! Classic chorus.
//!
//! One LFO sweeps a fractional-delay read around a 10 ms center (±5 ms at
//! full depth) and the wet tap is blended with the dry signal. Both
//! channels share the LFO but keep independent delay lines.

use amperio_core::{DelayLine, Effect, Lfo, ParamSpec};

const PARAMS: &[ParamSpec] = &[
    ParamSpec::new("rate", "Rate", 0.1, 10.0, 1.0),
    ParamSpec::new("depth", "Depth", 0.0, 1.0, 0.5),
    ParamSpec::new("mix", "Mix", 0.0, 1.0, 0.5),
];

/// Delay line length: 50 ms covers the 10 ms ± 5 ms sweep with headroom.
const MAX_DELAY_SECONDS: f32 = 0.05;
const BASE_DELAY_SECONDS: f32 = 0.010;
const MOD_RANGE_SECONDS: f32 = 0.005;

/// Modulated-delay chorus.
#[derive(Debug, Clone)]
pub struct Chorus {
    rate: f32,
    depth: f32,
    mix: f32,
    sample_rate: f32,
    lfo: Lfo,
    lines: [DelayLine; 2],
}

impl Chorus {
    /// Create a chorus at the given sample rate with default settings.
    pub fn new(sample_rate: f32) -> Self {
        let len = (sample_rate * MAX_DELAY_SECONDS) as usize;
        Self {
            rate: 1.0,
            depth: 0.5,
            mix: 0.5,
            sample_rate,
            lfo: Lfo::new(sample_rate, 1.0),
            lines: [DelayLine::new(len), DelayLine::new(len)],
        }
    }
}

impl Effect for Chorus {
    fn process(&mut self, input: &[f32], output: &mut [f32], frames: usize) {
        for i in 0..frames {
            let phase = self.lfo.advance();
            let delay_seconds =
                BASE_DELAY_SECONDS + MOD_RANGE_SECONDS * self.depth * phase.sin();
            let delay_samples = delay_seconds * self.sample_rate;

            for ch in 0..2 {
                let idx = i * 2 + ch;
                let dry = input[idx];
                let wet = self.lines[ch].read_fractional(delay_samples);
                self.lines[ch].write(dry);
                output[idx] = dry * (1.0 - self.mix) + wet * self.mix;
            }
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.lfo.set_sample_rate(sample_rate);
        let len = (sample_rate * MAX_DELAY_SECONDS) as usize;
        for line in &mut self.lines {
            line.resize(len);
        }
    }

    fn reset(&mut self) {
        self.lfo.reset();
        for line in &mut self.lines {
            line.clear();
        }
    }

    fn params(&self) -> &'static [ParamSpec] {
        PARAMS
    }

    fn set_param(&mut self, name: &str, value: f32) {
        match name {
            "rate" => {
                self.rate = PARAMS[0].clamp(value);
                self.lfo.set_frequency(self.rate);
            }
            "depth" => self.depth = PARAMS[1].clamp(value),
            "mix" => self.mix = PARAMS[2].clamp(value),
            _ => {}
        }
    }

    fn get_param(&self, name: &str) -> f32 {
        match name {
            "rate" => self.rate,
            "depth" => self.depth,
            "mix" => self.mix,
            _ => 0.0,
        }
    }

    fn type_tag(&self) -> &'static str {
        "chorus"
    }

    fn display_name(&self) -> &'static str {
        "Chorus"
    }
}
