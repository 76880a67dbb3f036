//! Tube-style overdrive.
//!
//! Softer sibling of [`crate::Distortion`]: a tanh waveshaper instead of a
//! hard clip, normalized 0–1 controls, and a tone lowpass that closes as
//! the knob comes up (darker at higher settings, like a classic screamer).

use amperio_core::{Effect, ParamSpec};

use crate::tone_stage::ToneStage;

const PARAMS: &[ParamSpec] = &[
    ParamSpec::new("drive", "Drive", 0.0, 1.0, 0.5),
    ParamSpec::new("tone", "Tone", 0.0, 1.0, 0.5),
    ParamSpec::new("level", "Level", 0.0, 1.0, 0.5),
];

/// Soft-clipping overdrive.
#[derive(Debug, Clone)]
pub struct Overdrive {
    drive: f32,
    tone: f32,
    level: f32,
    sample_rate: f32,
    tone_stage: ToneStage,
}

impl Overdrive {
    /// Create an overdrive at the given sample rate with default settings.
    pub fn new(sample_rate: f32) -> Self {
        let mut od = Self {
            drive: 0.5,
            tone: 0.5,
            level: 0.5,
            sample_rate,
            tone_stage: ToneStage::new(),
        };
        od.update_tone_filter();
        od
    }

    /// tanh soft clip, gentler than hard clipping.
    #[inline]
    fn soft_clip(x: f32) -> f32 {
        (x * 2.0).tanh() * 0.5
    }

    /// Cutoff sweeps from 20 kHz (open) down to 2 kHz as tone rises.
    fn update_tone_filter(&mut self) {
        let cutoff = 20000.0 - self.tone * 18000.0;
        self.tone_stage.set_cutoff(cutoff, self.sample_rate);
    }
}

impl Effect for Overdrive {
    fn process(&mut self, input: &[f32], output: &mut [f32], frames: usize) {
        let drive_gain = self.drive * 3.0 + 1.0;
        let level_gain = self.level * 2.0;
        let blend = self.tone;

        for i in 0..frames {
            for ch in 0..2 {
                let idx = i * 2 + ch;
                let shaped = Self::soft_clip(input[idx] * drive_gain);
                output[idx] = self.tone_stage.process(ch, shaped, blend) * level_gain;
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
            "drive" => self.drive = PARAMS[0].clamp(value),
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
            "drive" => self.drive,
            "tone" => self.tone,
            "level" => self.level,
            _ => 0.0,
        }
    }

    fn type_tag(&self) -> &'static str {
        "overdrive"
    }

    fn display_name(&self) -> &'static str {
        "Overdrive"
    }
}
