//! Vintage fuzz.
//!
//! The nastiest of the clipping family: up to 11x input gain into a hard
//! clip, followed by an amplitude squash that compresses the tops of the
//! waveform for the classic splatty fuzz character.

use amperio_core::{Effect, ParamSpec};

use crate::tone_stage::ToneStage;

const PARAMS: &[ParamSpec] = &[
    ParamSpec::new("fuzz", "Fuzz", 0.0, 1.0, 0.5),
    ParamSpec::new("tone", "Tone", 0.0, 1.0, 0.5),
    ParamSpec::new("volume", "Volume", 0.0, 1.0, 0.5),
];

/// Extreme-clipping fuzz box.
#[derive(Debug, Clone)]
pub struct Fuzz {
    fuzz: f32,
    tone: f32,
    volume: f32,
    sample_rate: f32,
    tone_stage: ToneStage,
}

impl Fuzz {
    /// Create a fuzz at the given sample rate with default settings.
    pub fn new(sample_rate: f32) -> Self {
        let mut fuzz = Self {
            fuzz: 0.5,
            tone: 0.5,
            volume: 0.5,
            sample_rate,
            tone_stage: ToneStage::new(),
        };
        fuzz.update_tone_filter();
        fuzz
    }

    /// Hard clip then squash: the `1 - 0.3|x|` term flattens the peaks.
    #[inline]
    fn fuzz_clip(x: f32) -> f32 {
        let clipped = x.clamp(-1.0, 1.0);
        clipped * (1.0 - 0.3 * clipped.abs())
    }

    /// Cutoff sweeps 20 kHz down to 5 kHz as tone rises.
    fn update_tone_filter(&mut self) {
        let cutoff = 20000.0 - self.tone * 15000.0;
        self.tone_stage.set_cutoff(cutoff, self.sample_rate);
    }
}

impl Effect for Fuzz {
    fn process(&mut self, input: &[f32], output: &mut [f32], frames: usize) {
        let fuzz_gain = self.fuzz * 10.0 + 1.0;
        let volume_gain = self.volume * 2.0;
        let blend = self.tone;

        for i in 0..frames {
            for ch in 0..2 {
                let idx = i * 2 + ch;
                let shaped = Self::fuzz_clip(input[idx] * fuzz_gain);
                output[idx] = self.tone_stage.process(ch, shaped, blend) * volume_gain;
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
            "fuzz" => self.fuzz = PARAMS[0].clamp(value),
            "tone" => {
                self.tone = PARAMS[1].clamp(value);
                self.update_tone_filter();
            }
            "volume" => self.volume = PARAMS[2].clamp(value),
            _ => {}
        }
    }

    fn get_param(&self, name: &str) -> f32 {
        match name {
            "fuzz" => self.fuzz,
            "tone" => self.tone,
            "volume" => self.volume,
            _ => 0.0,
        }
    }

    fn type_tag(&self) -> &'static str {
        "fuzz"
    }

    fn display_name(&self) -> &'static str {
        "Fuzz"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuzz_clip_bounded() {
        for x in [-50.0, -1.0, -0.5, 0.0, 0.5, 1.0, 50.0] {
            let y = Fuzz::fuzz_clip(x);
            assert!(y.abs() <= 1.0, "fuzz_clip({x}) = {y}");
        }
    }

    #[test]
    fn test_peaks_are_squashed() {
        // A full-scale sample comes out below full scale.
        assert!((Fuzz::fuzz_clip(1.0) - 0.7).abs() < 1e-6);
        assert!((Fuzz::fuzz_clip(-1.0) + 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_process_silence_stays_silent() {
        let mut fuzz = Fuzz::new(48000.0);
        let input = [0.0f32; 128];
        let mut output = [0.5f32; 128];
        fuzz.process(&input, &mut output, 64);
        assert!(output.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_max_settings_finite() {
        let mut fuzz = Fuzz::new(48000.0);
        fuzz.set_param("fuzz", 1.0);
        fuzz.set_param("volume", 1.0);
        fuzz.set_param("tone", 1.0);

        let input: Vec<f32> = (0..256).map(|i| ((i as f32) * 0.7).sin()).collect();
        let mut output = vec![0.0; 256];
        fuzz.process(&input, &mut output, 128);
        assert!(output.iter().all(|x| x.is_finite()));
    }
}
