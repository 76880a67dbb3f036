//! Hard-clipping distortion with tone control.
//!
//! Signal flow: input gain -> hard clip -> tone lowpass blend -> level.
//! The gain control maps 0–100 onto a 0–10x linear drive, so 50 is the
//! classic 5x crunch point.

use amperio_core::{Effect, ParamSpec};

use crate::tone_stage::ToneStage;

const PARAMS: &[ParamSpec] = &[
    ParamSpec::new("gain", "Gain", 0.0, 100.0, 50.0),
    ParamSpec::new("tone", "Tone", 0.0, 100.0, 50.0),
    ParamSpec::new("level", "Level", 0.0, 100.0, 50.0),
];

/// Aggressive hard-clipping distortion.
///
/// # Example
///
/// ```rust
/// use amperio_core::Effect;
/// use amperio_effects::Distortion;
///
/// let mut dist = Distortion::new(48000.0);
/// dist.set_param("gain", 80.0);
///
/// let input = [0.2f32; 128];
/// let mut output = [0.0f32; 128];
/// dist.process(&input, &mut output, 64);
/// ```
#[derive(Debug, Clone)]
pub struct Distortion {
    gain: f32,
    tone: f32,
    level: f32,
    sample_rate: f32,
    tone_stage: ToneStage,
}

impl Distortion {
    /// Create a distortion at the given sample rate with default settings.
    pub fn new(sample_rate: f32) -> Self {
        let mut dist = Self {
            gain: 50.0,
            tone: 50.0,
            level: 50.0,
            sample_rate,
            tone_stage: ToneStage::new(),
        };
        dist.update_tone_filter();
        dist
    }

    /// Tone 0 is dark, 100 is bright: cutoff sweeps 2 kHz to 20 kHz.
    fn update_tone_filter(&mut self) {
        let cutoff = 2000.0 + (self.tone / 100.0) * 18000.0;
        self.tone_stage.set_cutoff(cutoff, self.sample_rate);
    }
}

impl Effect for Distortion {
    fn process(&mut self, input: &[f32], output: &mut [f32], frames: usize) {
        let drive = self.gain / 50.0 * 10.0;
        let level = self.level / 100.0;
        let blend = self.tone / 100.0;

        for i in 0..frames {
            for ch in 0..2 {
                let idx = i * 2 + ch;
                let driven = (input[idx] * drive).clamp(-1.0, 1.0);
                output[idx] = self.tone_stage.process(ch, driven, blend) * level;
            }
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update_tone_filter();
    }

    fn reset(&mut self) {
        self.tone_stage.reset();
    }

    fn params(&self) -> &'static [ParamSpec] {
        PARAMS
    }

    fn set_param(&mut self, name: &str, value: f32) {
        match name {
            "gain" => self.gain = PARAMS[0].clamp(value),
            "tone" => {
                self.tone = PARAMS[1].clamp(value);
                self.update_tone_filter();
            }
            "level" => self.level = PARAMS[2].clamp(value),
            _ => {}
        }
    }

    fn get_param(&self, name: &str) -> f32 {
        match name {
            "gain" => self.gain,
            "tone" => self.tone,
            "level" => self.level,
            _ => 0.0,
        }
    }

    fn type_tag(&self) -> &'static str {
        "distortion"
    }

    fn display_name(&self) -> &'static str {
        "Distortion"
    }
}
