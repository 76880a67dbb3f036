//! Feedback echo delay.
//!
//! Per-channel circular buffer sized for the 2-second maximum; the delayed
//! tap is re-injected at the write point scaled by feedback, so each echo
//! decays by the feedback ratio. `time` is a 0–100 control mapping linearly
//! onto 0–2000 ms.

use amperio_core::{flush_denormal, DelayLine, Effect, ParamSpec};

const PARAMS: &[ParamSpec] = &[
    ParamSpec::new("time", "Time", 0.0, 100.0, 50.0),
    ParamSpec::new("feedback", "Feedback", 0.0, 100.0, 50.0),
    ParamSpec::new("mix", "Mix", 0.0, 100.0, 50.0),
];

const MAX_DELAY_SECONDS: f32 = 2.0;

/// Classic feedback delay, up to two seconds.
#[derive(Debug, Clone)]
pub struct EchoDelay {
    time: f32,
    feedback: f32,
    mix: f32,
    sample_rate: f32,
    delay_samples: usize,
    lines: [DelayLine; 2],
}

impl EchoDelay {
    /// Create a delay at the given sample rate with default settings.
    pub fn new(sample_rate: f32) -> Self {
        let len = (sample_rate * MAX_DELAY_SECONDS) as usize;
        let mut delay = Self {
            time: 50.0,
            feedback: 50.0,
            mix: 50.0,
            sample_rate,
            delay_samples: 1,
            lines: [DelayLine::new(len), DelayLine::new(len)],
        };
        delay.update_delay_length();
        delay
    }

    /// time 0-100 maps to 0-2000 ms; at least one sample of delay.
    fn update_delay_length(&mut self) {
        let delay_ms = (self.time / 100.0) * 2000.0;
        let samples = ((delay_ms / 1000.0) * self.sample_rate) as usize;
        self.delay_samples = samples.clamp(1, self.lines[0].len());
    }
}

impl Effect for EchoDelay {
    fn process(&mut self, input: &[f32], output: &mut [f32], frames: usize) {
        let feedback = self.feedback / 100.0;
        let wet = self.mix / 100.0;
        let dry = 1.0 - wet;
        let delay = self.delay_samples;

        for i in 0..frames {
            for ch in 0..2 {
                let idx = i * 2 + ch;
                let sample = input[idx];
                let delayed = self.lines[ch].read(delay);
                output[idx] = sample * dry + delayed * wet;
                self.lines[ch].write(flush_denormal(sample + delayed * feedback));
            }
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        let len = (sample_rate * MAX_DELAY_SECONDS) as usize;
        for line in &mut self.lines {
            line.resize(len);
        }
        self.update_delay_length();
    }

    fn reset(&mut self) {
        for line in &mut self.lines {
            line.clear();
        }
    }

    fn params(&self) -> &'static [ParamSpec] {
        PARAMS
    }

    fn set_param(&mut self, name: &str, value: f32) {
        match name {
            "time" => {
                self.time = PARAMS[0].clamp(value);
                self.update_delay_length();
            }
            "feedback" => self.feedback = PARAMS[1].clamp(value),
            "mix" => self.mix = PARAMS[2].clamp(value),
            _ => {}
        }
    }

    fn get_param(&self, name: &str) -> f32 {
        match name {
            "time" => self.time,
            "feedback" => self.feedback,
            "mix" => self.mix,
            _ => 0.0,
        }
    }

    fn type_tag(&self) -> &'static str {
        "delay"
    }

    fn display_name(&self) -> &'static str {
        "Delay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Process an impulse and return the left-channel output over `frames`.
    fn impulse_response(delay: &mut EchoDelay, frames: usize) -> Vec<f32> {
        let block = 64;
        let mut out_left = Vec::with_capacity(frames);
        let mut input = vec![0.0f32; block * 2];
        let mut output = vec![0.0f32; block * 2];
        input[0] = 1.0;
        input[1] = 1.0;

        let mut processed = 0;
        while processed < frames {
            delay.process(&input, &mut output, block);
            for i in 0..block {
                out_left.push(output[i * 2]);
            }
            input[0] = 0.0;
            input[1] = 0.0;
            processed += block;
        }
        out_left
    }

    #[test]
    fn test_echo_train_decays_by_feedback() {
        let mut delay = EchoDelay::new(48000.0);
        delay.set_param("time", 25.0); // 500 ms -> 24000 samples
        delay.set_param("feedback", 50.0);
        delay.set_param("mix", 100.0);

        let response = impulse_response(&mut delay, 50000);

        // First repeat carries the full impulse; the one 24000 samples
        // later comes back through the feedback path at half amplitude.
        assert!(
            (response[24000] - 1.0).abs() < 1e-4,
            "first echo: {}",
            response[24000]
        );
        assert!(
            (response[48000] - 0.5).abs() < 1e-4,
            "second echo: {}",
            response[48000]
        );

        // Nothing between the echoes.
        let between = response[24100..47900].iter().fold(0.0f32, |m, &x| m.max(x.abs()));
        assert!(between < 1e-6);
    }

    #[test]
    fn test_mix_zero_passes_dry_only() {
        let mut delay = EchoDelay::new(48000.0);
        delay.set_param("mix", 0.0);

        let input: Vec<f32> = (0..256).map(|i| (i as f32 * 0.1).sin()).collect();
        let mut output = vec![0.0; 256];
        delay.process(&input, &mut output, 128);
        for (x, y) in input.iter().zip(output.iter()) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_time_zero_still_delays_one_sample() {
        let mut delay = EchoDelay::new(48000.0);
        delay.set_param("time", 0.0);
        delay.set_param("mix", 100.0);
        delay.set_param("feedback", 0.0);

        let mut input = [0.0f32; 8];
        input[0] = 1.0;
        let mut output = [0.0f32; 8];
        delay.process(&input, &mut output, 4);
        assert_eq!(output[0], 0.0);
        assert_eq!(output[2], 1.0);
    }

    #[test]
    fn test_high_feedback_remains_finite() {
        let mut delay = EchoDelay::new(8000.0);
        delay.set_param("time", 1.0);
        delay.set_param("feedback", 100.0);
        delay.set_param("mix", 50.0);

        let input = vec![0.5f32; 32768];
        let mut output = vec![0.0f32; 32768];
        delay.process(&input, &mut output, 16384);
        assert!(output.iter().all(|x| x.is_finite()));
    }
}
