//! Three-band equalizer.
//!
//! Peaking biquads at 100 Hz, 1 kHz, and 5 kHz with Q = 1, one set per
//! channel, plus an output level. Coefficients are recomputed when a band
//! gain or the sample rate changes, never per sample.

use amperio_core::{peaking_coefficients, Biquad, Effect, ParamSpec};

const PARAMS: &[ParamSpec] = &[
    ParamSpec::new("low", "Low", -12.0, 12.0, 0.0),
    ParamSpec::new("mid", "Mid", -12.0, 12.0, 0.0),
    ParamSpec::new("high", "High", -12.0, 12.0, 0.0),
    ParamSpec::new("level", "Level", 0.0, 1.0, 0.5),
];

const BAND_FREQS: [f32; 3] = [100.0, 1000.0, 5000.0];
const BAND_Q: f32 = 1.0;

/// Three peaking bands in series.
#[derive(Debug, Clone)]
pub struct ThreeBandEq {
    gains_db: [f32; 3],
    level: f32,
    sample_rate: f32,
    // [band][channel]
    filters: [[Biquad; 2]; 3],
}

impl ThreeBandEq {
    /// Create a flat EQ at the given sample rate.
    pub fn new(sample_rate: f32) -> Self {
        let mut eq = Self {
            gains_db: [0.0; 3],
            level: 0.5,
            sample_rate,
            filters: std::array::from_fn(|_| [Biquad::new(), Biquad::new()]),
        };
        eq.update_band(0);
        eq.update_band(1);
        eq.update_band(2);
        eq
    }

    fn update_band(&mut self, band: usize) {
        let (b0, b1, b2, a1, a2) = peaking_coefficients(
            BAND_FREQS[band],
            BAND_Q,
            self.gains_db[band],
            self.sample_rate,
        );
        for filter in &mut self.filters[band] {
            filter.set_coefficients(b0, b1, b2, a1, a2);
            filter.clear();
        }
    }

    fn set_band_gain(&mut self, band: usize, gain_db: f32) {
        self.gains_db[band] = PARAMS[band].clamp(gain_db);
        self.update_band(band);
    }
}

impl Effect for ThreeBandEq {
    fn process(&mut self, input: &[f32], output: &mut [f32], frames: usize) {
        let level_gain = self.level * 2.0;

        for i in 0..frames {
            for ch in 0..2 {
                let idx = i * 2 + ch;
                let mut sample = input[idx];
                for band in 0..3 {
                    sample = self.filters[band][ch].process(sample);
                }
                output[idx] = sample * level_gain;
            }
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update_band(0);
        self.update_band(1);
        self.update_band(2);
    }

    fn reset(&mut self) {
        for band in &mut self.filters {
            for filter in band {
                filter.clear();
            }
        }
    }

    fn params(&self) -> &'static [ParamSpec] {
        PARAMS
    }

    fn set_param(&mut self, name: &str, value: f32) {
        match name {
            "low" => self.set_band_gain(0, value),
            "mid" => self.set_band_gain(1, value),
            "high" => self.set_band_gain(2, value),
            "level" => self.level = PARAMS[3].clamp(value),
            _ => {}
        }
    }

    fn get_param(&self, name: &str) -> f32 {
        match name {
            "low" => self.gains_db[0],
            "mid" => self.gains_db[1],
            "high" => self.gains_db[2],
            "level" => self.level,
            _ => 0.0,
        }
    }

    fn type_tag(&self) -> &'static str {
        "eq"
    }

    fn display_name(&self) -> &'static str {
        "EQ"
    }
}
