//! Cabinet impulse-response convolution.
//!
//! Two engines behind one effect, picked by IR length:
//!
//! - **Direct FIR** for IRs up to 128 taps: per-sample dot product against
//!   a per-channel history ring. Cheapest for short IRs and has no block
//!   latency.
//! - **Overlap-add FFT** for anything longer: the IR spectrum is computed
//!   once when the IR is installed; each sub-block of input is zero-padded,
//!   transformed, multiplied, inverse-transformed, and added into a
//!   per-channel overlap tail.
//!
//! The impulse response itself arrives out of band (see
//! `amperio_engine::ir::load_ir_wav`); only the dry/wet mix is a live
//! parameter. All FFT buffers are sized when the IR is installed, so
//! `process` never allocates.

use std::sync::Arc;

use amperio_core::{Effect, ParamSpec};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

const PARAMS: &[ParamSpec] = &[ParamSpec::new("mix", "Mix", 0.0, 100.0, 100.0)];

/// IRs at or below this many taps use the direct engine.
const DIRECT_THRESHOLD: usize = 128;
/// Sub-block size for the overlap-add engine.
const OLA_BLOCK: usize = 512;

struct OlaState {
    fft_size: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    ir_spectrum: Vec<Complex<f32>>,
    // Reused per sub-block.
    work: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    // Per-channel convolution tail carried across blocks.
    overlap: [Vec<f32>; 2],
}

impl OlaState {
    fn new(ir: &[f32]) -> Self {
        let fft_size = (OLA_BLOCK + ir.len() - 1).next_power_of_two();
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);

        let mut ir_spectrum: Vec<Complex<f32>> = ir
            .iter()
            .map(|&x| Complex::new(x, 0.0))
            .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
            .take(fft_size)
            .collect();
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        let mut scratch = vec![Complex::new(0.0, 0.0); scratch_len];
        forward.process_with_scratch(&mut ir_spectrum, &mut scratch);

        Self {
            fft_size,
            forward,
            inverse,
            ir_spectrum,
            work: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
            overlap: [vec![0.0; fft_size], vec![0.0; fft_size]],
        }
    }

    /// Convolve one sub-block of `samples` for channel `ch`, writing the
    /// same number of output samples into `out`.
    fn process_block(&mut self, ch: usize, samples: &[f32], out: &mut [f32]) {
        debug_assert!(samples.len() <= OLA_BLOCK);
        let n = samples.len();

        for (slot, &x) in self.work.iter_mut().zip(samples) {
            *slot = Complex::new(x, 0.0);
        }
        for slot in self.work.iter_mut().skip(n) {
            *slot = Complex::new(0.0, 0.0);
        }

        self.forward
            .process_with_scratch(&mut self.work, &mut self.scratch);
        for (slot, h) in self.work.iter_mut().zip(&self.ir_spectrum) {
            *slot *= h;
        }
        self.inverse
            .process_with_scratch(&mut self.work, &mut self.scratch);

        // rustfft does not normalize; fold 1/N into the output stage.
        let norm = 1.0 / self.fft_size as f32;
        let overlap = &mut self.overlap[ch];
        for i in 0..n {
            out[i] = overlap[i] + self.work[i].re * norm;
        }
        // Slide the tail forward and fold in the new block's remainder.
        overlap.copy_within(n.., 0);
        let kept = self.fft_size - n;
        overlap[kept..].fill(0.0);
        for i in n..self.fft_size {
            overlap[i - n] += self.work[i].re * norm;
        }
    }

    fn clear(&mut self) {
        for tail in &mut self.overlap {
            tail.fill(0.0);
        }
    }
}

/// Impulse-response convolver with automatic direct/FFT engine selection.
pub struct IrConvolver {
    mix: f32,
    ir: Vec<f32>,
    // Direct engine: per-channel input history ring.
    history: [Vec<f32>; 2],
    history_pos: usize,
    ola: Option<OlaState>,
    // Per-call wet staging for the FFT engine, sized at IR install.
    block_in: Vec<f32>,
    block_out: Vec<f32>,
}

impl IrConvolver {
    /// Create a convolver with no IR loaded; it passes audio through until
    /// [`set_impulse_response`](Self::set_impulse_response) is called.
    pub fn new(_sample_rate: f32) -> Self {
        Self {
            mix: 100.0,
            ir: Vec::new(),
            history: [vec![0.0; DIRECT_THRESHOLD], vec![0.0; DIRECT_THRESHOLD]],
            history_pos: 0,
            ola: None,
            block_in: vec![0.0; OLA_BLOCK],
            block_out: vec![0.0; OLA_BLOCK],
        }
    }

    /// Install a mono impulse response, replacing any previous one.
    ///
    /// Runs on the control thread; this is where all engine buffers are
    /// sized. An empty IR unloads the effect (passthrough).
    pub fn set_impulse_response(&mut self, ir: &[f32]) {
        self.ir = ir.to_vec();
        self.history_pos = 0;
        if self.ir.len() > DIRECT_THRESHOLD {
            self.ola = Some(OlaState::new(&self.ir));
        } else {
            self.ola = None;
            let len = self.ir.len().max(1).next_power_of_two();
            self.history = [vec![0.0; len], vec![0.0; len]];
        }
    }

    /// True once an impulse response has been installed.
    pub fn has_impulse_response(&self) -> bool {
        !self.ir.is_empty()
    }

    /// Installed IR length in taps.
    pub fn ir_len(&self) -> usize {
        self.ir.len()
    }

    fn process_direct(&mut self, input: &[f32], output: &mut [f32], frames: usize) {
        let wet_gain = self.mix / 100.0;
        let dry_gain = 1.0 - wet_gain;
        let mask = self.history[0].len() - 1;

        for i in 0..frames {
            for ch in 0..2 {
                let idx = i * 2 + ch;
                let sample = input[idx];
                self.history[ch][self.history_pos & mask] = sample;

                let mut acc = 0.0;
                for (j, &tap) in self.ir.iter().enumerate() {
                    acc += self.history[ch][(self.history_pos.wrapping_sub(j)) & mask] * tap;
                }
                output[idx] = sample * dry_gain + acc * wet_gain;
            }
            self.history_pos = self.history_pos.wrapping_add(1);
        }
    }

    fn process_ola(&mut self, input: &[f32], output: &mut [f32], frames: usize) {
        let wet_gain = self.mix / 100.0;
        let dry_gain = 1.0 - wet_gain;

        let mut done = 0;
        while done < frames {
            let n = (frames - done).min(OLA_BLOCK);
            for ch in 0..2 {
                for i in 0..n {
                    self.block_in[i] = input[(done + i) * 2 + ch];
                }
                if let Some(ola) = self.ola.as_mut() {
                    ola.process_block(ch, &self.block_in[..n], &mut self.block_out[..n]);
                }
                for i in 0..n {
                    let idx = (done + i) * 2 + ch;
                    output[idx] = input[idx] * dry_gain + self.block_out[i] * wet_gain;
                }
            }
            done += n;
        }
    }
}

impl Effect for IrConvolver {
    fn process(&mut self, input: &[f32], output: &mut [f32], frames: usize) {
        if self.ir.is_empty() {
            output[..frames * 2].copy_from_slice(&input[..frames * 2]);
            return;
        }
        if self.ola.is_some() {
            self.process_ola(input, output, frames);
        } else {
            self.process_direct(input, output, frames);
        }
    }

    fn set_sample_rate(&mut self, _sample_rate: f32) {
        // The IR is taken as-is at whatever rate it was recorded; the
        // loader is responsible for rate matching.
    }

    fn reset(&mut self) {
        for ring in &mut self.history {
            ring.fill(0.0);
        }
        self.history_pos = 0;
        if let Some(ola) = self.ola.as_mut() {
            ola.clear();
        }
    }

    fn params(&self) -> &'static [ParamSpec] {
        PARAMS
    }

    fn set_param(&mut self, name: &str, value: f32) {
        if name == "mix" {
            self.mix = PARAMS[0].clamp(value);
        }
    }

    fn get_param(&self, name: &str) -> f32 {
        if name == "mix" { self.mix } else { 0.0 }
    }

    fn type_tag(&self) -> &'static str {
        "ir_convolution"
    }

    fn display_name(&self) -> &'static str {
        "IR Convolution"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convolve_reference(signal: &[f32], ir: &[f32]) -> Vec<f32> {
        let mut out = vec![0.0f32; signal.len()];
        for (n, slot) in out.iter_mut().enumerate() {
            for (j, &tap) in ir.iter().enumerate() {
                if n >= j {
                    *slot += signal[n - j] * tap;
                }
            }
        }
        out
    }

    fn run_convolver(conv: &mut IrConvolver, signal: &[f32]) -> Vec<f32> {
        let frames = signal.len();
        let mut input = vec![0.0f32; frames * 2];
        for (i, &x) in signal.iter().enumerate() {
            input[i * 2] = x;
            input[i * 2 + 1] = x;
        }
        let mut output = vec![0.0f32; frames * 2];
        conv.process(&input, &mut output, frames);
        output.iter().step_by(2).copied().collect()
    }

    #[test]
    fn test_no_ir_is_passthrough() {
        let mut conv = IrConvolver::new(48000.0);
        let signal: Vec<f32> = (0..64).map(|i| (i as f32 * 0.3).sin()).collect();
        let out = run_convolver(&mut conv, &signal);
        assert_eq!(out, signal);
    }

    #[test]
    fn test_direct_engine_matches_reference() {
        let mut conv = IrConvolver::new(48000.0);
        assert!(!conv.has_impulse_response());
        let ir = [0.5f32, 0.25, 0.125, 0.0625];
        conv.set_impulse_response(&ir);
        conv.set_param("mix", 100.0);
        assert!(conv.ola.is_none());
        assert!(conv.has_impulse_response());
        assert_eq!(conv.ir_len(), 4);

        let signal: Vec<f32> = (0..200).map(|i| ((i * 7) % 13) as f32 / 13.0 - 0.5).collect();
        let out = run_convolver(&mut conv, &signal);
        let expected = convolve_reference(&signal, &ir);
        for (a, b) in out.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-5, "direct mismatch: {a} vs {b}");
        }
    }

    #[test]
    fn test_fft_engine_matches_reference() {
        let mut conv = IrConvolver::new(48000.0);
        // 300 taps forces the overlap-add path.
        let ir: Vec<f32> = (0..300).map(|i| 0.9f32.powi(i) * 0.1).collect();
        conv.set_impulse_response(&ir);
        conv.set_param("mix", 100.0);
        assert!(conv.ola.is_some());

        let signal: Vec<f32> = (0..1500)
            .map(|i| (i as f32 * 0.05).sin() * 0.5)
            .collect();
        let out = run_convolver(&mut conv, &signal);
        let expected = convolve_reference(&signal, &ir);
        for (i, (a, b)) in out.iter().zip(expected.iter()).enumerate() {
            assert!(
                (a - b).abs() < 1e-3,
                "fft mismatch at {i}: {a} vs {b}"
            );
        }
    }

    #[test]
    fn test_fft_engine_is_continuous_across_calls() {
        // Same signal processed in one call vs many small calls must agree.
        let ir: Vec<f32> = (0..300).map(|i| if i == 150 { 1.0 } else { 0.0 }).collect();
        let signal: Vec<f32> = (0..1024).map(|i| (i as f32 * 0.11).sin()).collect();

        let mut one_shot = IrConvolver::new(48000.0);
        one_shot.set_impulse_response(&ir);
        let expected = run_convolver(&mut one_shot, &signal);

        let mut chunked = IrConvolver::new(48000.0);
        chunked.set_impulse_response(&ir);
        let mut out = Vec::new();
        for chunk in signal.chunks(96) {
            out.extend(run_convolver(&mut chunked, chunk));
        }

        for (i, (a, b)) in out.iter().zip(expected.iter()).enumerate() {
            assert!((a - b).abs() < 1e-3, "chunking mismatch at {i}: {a} vs {b}");
        }
    }

    #[test]
    fn test_mix_zero_is_dry() {
        let mut conv = IrConvolver::new(48000.0);
        conv.set_impulse_response(&[0.0, 0.0, 1.0]);
        conv.set_param("mix", 0.0);

        let signal: Vec<f32> = (0..64).map(|i| i as f32 * 0.01).collect();
        let out = run_convolver(&mut conv, &signal);
        for (a, b) in out.iter().zip(signal.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }
}
