//! Schroeder reverb.
//!
//! Four parallel feedback combs feed two series allpasses, per channel.
//! Comb delays come from a 44.1 kHz reference table and scale with the
//! sample rate so the room keeps its size everywhere. `decay` drives the
//! comb feedback (capped at 0.7 for stability), `room` scales the send
//! level into the comb bank.

use amperio_core::{flush_denormal, DelayLine, Effect, ParamSpec};

const PARAMS: &[ParamSpec] = &[
    ParamSpec::new("room", "Room", 0.0, 100.0, 50.0),
    ParamSpec::new("decay", "Decay", 0.0, 100.0, 50.0),
    ParamSpec::new("mix", "Mix", 0.0, 100.0, 50.0),
];

/// Comb delays in samples at the 44.1 kHz reference rate.
const COMB_DELAYS_44K: [usize; NUM_COMBS] = [1116, 1188, 1277, 1356];
/// Allpass delays in samples at the 44.1 kHz reference rate.
const ALLPASS_DELAYS_44K: [usize; NUM_ALLPASS] = [556, 441];

const NUM_COMBS: usize = 4;
const NUM_ALLPASS: usize = 2;
const ALLPASS_GAIN: f32 = 0.5;
/// Comb feedback ceiling; above this the tail rings effectively forever.
const MAX_COMB_FEEDBACK: f32 = 0.7;

#[derive(Debug, Clone)]
struct CombFilter {
    line: DelayLine,
    delay: usize,
}

impl CombFilter {
    fn process(&mut self, input: f32, feedback: f32) -> f32 {
        let delayed = self.line.read(self.delay);
        self.line.write(flush_denormal(input + delayed * feedback));
        delayed
    }
}

#[derive(Debug, Clone)]
struct AllpassFilter {
    line: DelayLine,
    delay: usize,
}

impl AllpassFilter {
    fn process(&mut self, input: f32) -> f32 {
        let delayed = self.line.read(self.delay);
        let out = delayed + input * ALLPASS_GAIN;
        self.line.write(flush_denormal(out));
        out
    }
}

/// Comb-and-allpass algorithmic reverb.
#[derive(Debug, Clone)]
pub struct Reverb {
    room: f32,
    decay: f32,
    mix: f32,
    sample_rate: f32,
    // [channel][unit]
    combs: [Vec<CombFilter>; 2],
    allpasses: [Vec<AllpassFilter>; 2],
}

impl Reverb {
    /// Create a reverb at the given sample rate with default settings.
    pub fn new(sample_rate: f32) -> Self {
        let mut reverb = Self {
            room: 50.0,
            decay: 50.0,
            mix: 50.0,
            sample_rate,
            combs: [Vec::new(), Vec::new()],
            allpasses: [Vec::new(), Vec::new()],
        };
        reverb.rebuild_filters();
        reverb
    }

    /// Rebuild all delay lines for the current sample rate.
    fn rebuild_filters(&mut self) {
        let scale = self.sample_rate / 44100.0;
        for ch in 0..2 {
            self.combs[ch] = COMB_DELAYS_44K
                .iter()
                .map(|&ref_delay| {
                    let delay = ((ref_delay as f32 * scale) as usize).max(1);
                    CombFilter {
                        line: DelayLine::new(delay + 1),
                        delay,
                    }
                })
                .collect();
            self.allpasses[ch] = ALLPASS_DELAYS_44K
                .iter()
                .map(|&ref_delay| {
                    let delay = ((ref_delay as f32 * scale) as usize).max(1);
                    AllpassFilter {
                        line: DelayLine::new(delay + 1),
                        delay,
                    }
                })
                .collect();
        }
    }

    fn comb_feedback(&self) -> f32 {
        (self.decay / 100.0) * MAX_COMB_FEEDBACK
    }
}

impl Effect for Reverb {
    fn process(&mut self, input: &[f32], output: &mut [f32], frames: usize) {
        let wet = self.mix / 100.0;
        let dry = 1.0 - wet;
        let room_scale = self.room / 100.0;
        let feedback = self.comb_feedback();

        for i in 0..frames {
            for ch in 0..2 {
                let idx = i * 2 + ch;
                let send = input[idx] * room_scale;

                let mut comb_sum = 0.0;
                for comb in &mut self.combs[ch] {
                    comb_sum += comb.process(send, feedback);
                }
                let mut diffused = comb_sum / NUM_COMBS as f32;

                for allpass in &mut self.allpasses[ch] {
                    diffused = allpass.process(diffused);
                }

                output[idx] = input[idx] * dry + diffused * wet;
            }
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.rebuild_filters();
    }

    fn reset(&mut self) {
        for ch in 0..2 {
            for comb in &mut self.combs[ch] {
                comb.line.clear();
            }
            for allpass in &mut self.allpasses[ch] {
                allpass.line.clear();
            }
        }
    }

    fn params(&self) -> &'static [ParamSpec] {
        PARAMS
    }

    fn set_param(&mut self, name: &str, value: f32) {
        match name {
            "room" => self.room = PARAMS[0].clamp(value),
            "decay" => self.decay = PARAMS[1].clamp(value),
            "mix" => self.mix = PARAMS[2].clamp(value),
            _ => {}
        }
    }

    fn get_param(&self, name: &str) -> f32 {
        match name {
            "room" => self.room,
            "decay" => self.decay,
            "mix" => self.mix,
            _ => 0.0,
        }
    }

    fn type_tag(&self) -> &'static str {
        "reverb"
    }

    fn display_name(&self) -> &'static str {
        "Reverb"
    }
}
