//! Jet-plane flanger.
//!
//! A very short delay (1–5 ms, positioned by `manual`) swept by an LFO,
//! with the delayed signal fed back into the line. `depth` sets both the
//! sweep width and the wet level; `resonance` intensifies the feedback
//! path for a sharper comb peak.

use amperio_core::{flush_denormal, DelayLine, Effect, Lfo, ParamSpec};

const PARAMS: &[ParamSpec] = &[
    ParamSpec::new("rate", "Rate", 0.1, 5.0, 0.5),
    ParamSpec::new("depth", "Depth", 0.0, 1.0, 0.5),
    ParamSpec::new("feedback", "Feedback", 0.0, 1.0, 0.3),
    ParamSpec::new("manual", "Manual", 0.0, 1.0, 0.5),
    ParamSpec::new("resonance", "Resonance", 0.0, 1.0, 0.5),
];

/// 10 ms of line covers the 1–5 ms base plus the ±2 ms sweep.
const MAX_DELAY_SECONDS: f32 = 0.010;

/// Swept-delay flanger with feedback.
#[derive(Debug, Clone)]
pub struct Flanger {
    rate: f32,
    depth: f32,
    feedback: f32,
    manual: f32,
    resonance: f32,
    sample_rate: f32,
    lfo: Lfo,
    lines: [DelayLine; 2],
}

impl Flanger {
    /// Create a flanger at the given sample rate with default settings.
    pub fn new(sample_rate: f32) -> Self {
        let len = (sample_rate * MAX_DELAY_SECONDS) as usize;
        Self {
            rate: 0.5,
            depth: 0.5,
            feedback: 0.3,
            manual: 0.5,
            resonance: 0.5,
            sample_rate,
            lfo: Lfo::new(sample_rate, 0.5),
            lines: [DelayLine::new(len), DelayLine::new(len)],
        }
    }

    /// Effective feedback gain, kept below unity for stability.
    #[inline]
    fn feedback_gain(&self) -> f32 {
        (self.feedback * (0.5 + 0.5 * self.resonance)).min(0.95)
    }
}

impl Effect for Flanger {
    fn process(&mut self, input: &[f32], output: &mut [f32], frames: usize) {
        let feedback = self.feedback_gain();

        for i in 0..frames {
            let phase = self.lfo.advance();
            // Base delay 1-5 ms from manual, swept ±2 ms by depth.
            let delay_seconds =
                0.001 + self.manual * 0.004 + 0.002 * self.depth * phase.sin();
            let delay_samples = delay_seconds * self.sample_rate;

            for ch in 0..2 {
                let idx = i * 2 + ch;
                let dry = input[idx];
                let delayed = self.lines[ch].read_fractional(delay_samples);
                self.lines[ch].write(flush_denormal(dry + delayed * feedback));
                output[idx] = dry + delayed * self.depth;
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
            "feedback" => self.feedback = PARAMS[2].clamp(value),
            "manual" => self.manual = PARAMS[3].clamp(value),
            "resonance" => self.resonance = PARAMS[4].clamp(value),
            _ => {}
        }
    }

    fn get_param(&self, name: &str) -> f32 {
        match name {
            "rate" => self.rate,
            "depth" => self.depth,
            "feedback" => self.feedback,
            "manual" => self.manual,
            "resonance" => self.resonance,
            _ => 0.0,
        }
    }

    fn type_tag(&self) -> &'static str {
        "flanger"
    }

    fn display_name(&self) -> &'static str {
        "Flanger"
    }
}
