//! The DSP pipeline: per-buffer processing plus its cross-thread control
//! surface.
//!
//! The pipeline is split along the thread boundary:
//!
//! - [`PipelineHandle`] is the control side: atomic gains, atomic
//!   test-tone settings, the stats mutex, and the chain slot. It is cheap
//!   to clone behind an `Arc` and safe to poke from any thread.
//! - [`DspPipeline`] is the audio side: the work buffer, the tone
//!   generator, and the timing state. It moves into the driver callback
//!   and is the only thing that touches them.
//!
//! Per buffer the audio side: routes either the test tone or the gained
//! driver input into the work buffer, runs the chain, applies output gain,
//! and updates telemetry.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use portable_atomic::AtomicF32;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};

use amperio_core::{db_to_linear, kernels, linear_to_db};

use crate::chain::EffectChain;
use crate::tone::{ToneGenerator, WaveType};

/// Weight of the previous estimate in the CPU usage moving average.
///
/// `cpu = 0.9 * cpu + 0.1 * instantaneous` smooths per-buffer jitter
/// while converging on a steady load figure within a few hundred buffers.
const CPU_EMA_KEEP: f64 = 0.9;

/// Point-in-time pipeline metrics, returned by value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PipelineStats {
    /// Smoothed DSP load as a percentage of the buffer period.
    pub cpu_usage: f64,
    /// Peak input level of the last buffer, in dBFS (-96 dB floor).
    pub peak_input: f32,
    /// Peak output level of the last buffer, in dBFS (-96 dB floor).
    pub peak_output: f32,
    /// One buffer of latency in milliseconds.
    pub latency_ms: f64,
    /// Total frames processed since the last reset.
    pub samples_processed: u64,
}

/// Control-side surface of the pipeline. Shared via `Arc`.
pub struct PipelineHandle {
    input_gain_db: AtomicF32,
    output_gain_db: AtomicF32,

    tone_enabled: AtomicBool,
    tone_frequency: AtomicF32,
    tone_amplitude: AtomicF32,
    tone_wave: AtomicU8,

    sample_rate: AtomicU32,
    buffer_size: AtomicU32,

    stats: Mutex<PipelineStats>,
    samples_processed: AtomicU64,

    chain: Mutex<Arc<EffectChain>>,
}

impl PipelineHandle {
    /// Create a handle around `chain` with unity gains and the tone off.
    pub fn new(chain: Arc<EffectChain>) -> Self {
        Self {
            input_gain_db: AtomicF32::new(0.0),
            output_gain_db: AtomicF32::new(0.0),
            tone_enabled: AtomicBool::new(false),
            tone_frequency: AtomicF32::new(440.0),
            tone_amplitude: AtomicF32::new(0.3),
            tone_wave: AtomicU8::new(WaveType::Sine.to_index()),
            sample_rate: AtomicU32::new(48000),
            buffer_size: AtomicU32::new(64),
            stats: Mutex::new(PipelineStats::default()),
            samples_processed: AtomicU64::new(0),
            chain: Mutex::new(chain),
        }
    }

    /// Input gain in dB, applied before the chain.
    pub fn set_input_gain_db(&self, db: f32) {
        self.input_gain_db.store(db, Ordering::Relaxed);
    }

    /// Current input gain in dB.
    pub fn input_gain_db(&self) -> f32 {
        self.input_gain_db.load(Ordering::Relaxed)
    }

    /// Output gain in dB, applied after the chain.
    pub fn set_output_gain_db(&self, db: f32) {
        self.output_gain_db.store(db, Ordering::Relaxed);
    }

    /// Current output gain in dB.
    pub fn output_gain_db(&self) -> f32 {
        self.output_gain_db.load(Ordering::Relaxed)
    }

    /// Turn the test tone on or off.
    pub fn enable_test_tone(&self, enabled: bool) {
        self.tone_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Whether the test tone currently replaces the driver input.
    pub fn is_test_tone_enabled(&self) -> bool {
        self.tone_enabled.load(Ordering::Relaxed)
    }

    /// Test-tone frequency in Hz.
    pub fn set_test_tone_frequency(&self, frequency: f32) {
        self.tone_frequency.store(frequency, Ordering::Relaxed);
    }

    /// Test-tone amplitude (linear).
    pub fn set_test_tone_amplitude(&self, amplitude: f32) {
        self.tone_amplitude.store(amplitude, Ordering::Relaxed);
    }

    /// Test-tone waveform.
    pub fn set_test_tone_wave(&self, wave: WaveType) {
        self.tone_wave.store(wave.to_index(), Ordering::Relaxed);
    }

    /// Record the negotiated stream format. Called by the engine at
    /// initialization, read by telemetry.
    pub fn set_stream_format(&self, sample_rate: u32, buffer_size: u32) {
        self.sample_rate.store(sample_rate, Ordering::Relaxed);
        self.buffer_size.store(buffer_size, Ordering::Relaxed);
    }

    /// Negotiated sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    /// Negotiated buffer size in frames.
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size.load(Ordering::Relaxed)
    }

    /// Snapshot the current telemetry by copy.
    pub fn stats(&self) -> PipelineStats {
        let mut snapshot = *self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        snapshot.samples_processed = self.samples_processed.load(Ordering::Relaxed);
        snapshot
    }

    /// Zero all telemetry.
    pub fn reset_stats(&self) {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner) = PipelineStats::default();
        self.samples_processed.store(0, Ordering::Relaxed);
    }

    /// Atomically replace the chain the audio side processes.
    pub fn set_chain(&self, chain: Arc<EffectChain>) {
        *self.chain.lock().unwrap_or_else(PoisonError::into_inner) = chain;
    }

    /// Clone out the current chain reference.
    pub fn chain(&self) -> Arc<EffectChain> {
        Arc::clone(&self.chain.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Audio-side pipeline state. Moves into the driver callback.
pub struct DspPipeline {
    shared: Arc<PipelineHandle>,
    work: Vec<f32>,
    tone: ToneGenerator,
    sample_rate: u32,
    buffer_size: u32,
    cpu_ema: f64,
}

impl DspPipeline {
    /// Build the audio side for a negotiated stream format.
    ///
    /// `max_frames` sizes the work buffer; processing larger buffers later
    /// falls back to a (cold) reallocation.
    pub fn new(shared: Arc<PipelineHandle>, sample_rate: u32, buffer_size: u32, max_frames: usize) -> Self {
        shared.set_stream_format(sample_rate, buffer_size);
        let mut tone = ToneGenerator::new(sample_rate);
        tone.set_frequency(shared.tone_frequency.load(Ordering::Relaxed));
        Self {
            shared,
            work: vec![0.0; max_frames * 2],
            tone,
            sample_rate,
            buffer_size,
            cpu_ema: 0.0,
        }
    }

    /// The control handle this pipeline reports to.
    pub fn handle(&self) -> &Arc<PipelineHandle> {
        &self.shared
    }

    /// Process one buffer of interleaved stereo audio.
    pub fn process(&mut self, input: &[f32], output: &mut [f32], frames: usize) {
        if frames == 0 {
            return;
        }
        let samples = frames * 2;
        if self.work.len() < samples {
            self.work.resize(samples, 0.0);
        }
        let started = Instant::now();

        // 1. Source select: test tone or gained driver input.
        let input_gain = db_to_linear(self.shared.input_gain_db.load(Ordering::Relaxed));
        if self.shared.tone_enabled.load(Ordering::Relaxed) {
            self.sync_tone_settings();
            self.tone.generate(&mut self.work[..samples], frames, 2);
            kernels::apply_gain(&mut self.work[..samples], input_gain);
        } else {
            kernels::scale(&input[..samples], input_gain, &mut self.work[..samples]);
        }

        // 2. Effect chain. The chain slot mutex is held only long enough
        // to clone the Arc; the chain's own mutex bounds the rest.
        let chain = self.shared.chain();
        chain.process(&self.work[..samples], &mut output[..samples], frames);

        // 3. Output gain in place.
        let output_gain = db_to_linear(self.shared.output_gain_db.load(Ordering::Relaxed));
        kernels::apply_gain(&mut output[..samples], output_gain);

        // 4. Telemetry.
        self.update_stats(&input[..samples], &output[..samples], frames, started);
    }

    fn sync_tone_settings(&mut self) {
        let frequency = self.shared.tone_frequency.load(Ordering::Relaxed);
        if frequency != self.tone.frequency() {
            self.tone.set_frequency(frequency);
        }
        self.tone
            .set_amplitude(self.shared.tone_amplitude.load(Ordering::Relaxed));
        self.tone
            .set_wave_type(WaveType::from_index(self.shared.tone_wave.load(Ordering::Relaxed)));
    }

    fn update_stats(&mut self, input: &[f32], output: &[f32], frames: usize, started: Instant) {
        let peak_in = kernels::peak(input);
        let peak_out = kernels::peak(output);

        let buffer_seconds = frames as f64 / f64::from(self.sample_rate.max(1));
        let elapsed = started.elapsed().as_secs_f64();
        let instantaneous = elapsed / buffer_seconds * 100.0;
        self.cpu_ema = self.cpu_ema * CPU_EMA_KEEP + instantaneous * (1.0 - CPU_EMA_KEEP);

        self.shared
            .samples_processed
            .fetch_add(frames as u64, Ordering::Relaxed);

        let mut stats = self
            .shared
            .stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        stats.peak_input = linear_to_db(peak_in);
        stats.peak_output = linear_to_db(peak_out);
        stats.latency_ms = f64::from(self.buffer_size) / f64::from(self.sample_rate.max(1)) * 1000.0;
        stats.cpu_usage = self.cpu_ema;
    }
}
