//! Amplitude-modulation tremolo.
//!
//! The LFO waveform morphs between sine (wave = 0) and square (wave = 1);
//! the modulator is `1 - depth * lfo`, clamped to [0, 1] so the signal is
//! attenuated, never inverted.

use amperio_core::{Effect, Lfo, ParamSpec};

use std::f32::consts::PI;

const PARAMS: &[ParamSpec] = &[
    ParamSpec::new("rate", "Rate", 0.1, 20.0, 2.0),
    ParamSpec::new("depth", "Depth", 0.0, 1.0, 0.5),
    ParamSpec::new("volume", "Volume", 0.0, 1.0, 0.5),
    ParamSpec::new("wave", "Wave", 0.0, 1.0, 0.0),
];

/// LFO-driven amplitude modulation.
#[derive(Debug, Clone)]
pub struct Tremolo {
    rate: f32,
    depth: f32,
    volume: f32,
    wave: f32,
    lfo: Lfo,
}

impl Tremolo {
    /// Create a tremolo at the given sample rate with default settings.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            rate: 2.0,
            depth: 0.5,
            volume: 0.5,
            wave: 0.0,
            lfo: Lfo::new(sample_rate, 2.0),
        }
    }

    /// Blend sine and square shapes at the given phase.
    #[inline]
    fn lfo_value(&self, phase: f32) -> f32 {
        let sine = phase.sin();
        let square = if phase < PI { 1.0 } else { -1.0 };
        sine * (1.0 - self.wave) + square * self.wave
    }
}

impl Effect for Tremolo {
    fn process(&mut self, input: &[f32], output: &mut [f32], frames: usize) {
        let volume_gain = self.volume * 2.0;

        for i in 0..frames {
            let phase = self.lfo.advance();
            let modulation = (1.0 - self.depth * self.lfo_value(phase)).clamp(0.0, 1.0);
            let gain = modulation * volume_gain;

            output[i * 2] = input[i * 2] * gain;
            output[i * 2 + 1] = input[i * 2 + 1] * gain;
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.lfo.set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        self.lfo.reset();
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
            "volume" => self.volume = PARAMS[2].clamp(value),
            "wave" => self.wave = PARAMS[3].clamp(value),
            _ => {}
        }
    }

    fn get_param(&self, name: &str) -> f32 {
        match name {
            "rate" => self.rate,
            "depth" => self.depth,
            "volume" => self.volume,
            "wave" => self.wave,
            _ => 0.0,
        }
    }

    fn type_tag(&self) -> &'static str {
        "tremolo"
    }

    fn display_name(&self) -> &'static str {
        "Tremolo"
    }
}
