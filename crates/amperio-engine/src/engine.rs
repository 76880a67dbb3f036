//! The audio engine: driver lifecycle plus the wiring between driver,
//! pipeline, chain, and manager.
//!
//! The engine is deliberately not `Send` (platform audio streams are tied
//! to their thread); it is created and driven on one control thread. The
//! handles it exposes, [`PipelineHandle`] and [`EffectManager`], are
//! `Send + Sync` and are what the rest of the process uses.

use std::sync::Arc;

use tracing::info;

use amperio_core::BufferPool;

use crate::chain::EffectChain;
use crate::driver::{AudioDriver, CpalDriver, MAX_FRAMES};
use crate::error::EngineError;
use crate::manager::EffectManager;
use crate::pipeline::{DspPipeline, PipelineHandle, PipelineStats};

/// Engine configuration. Driver name follows
/// [`crate::driver::DRIVER_NAMES`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Backend name (`auto`, `WASAPI`, `ASIO`, `CoreAudio`, `PipeWire`).
    pub driver: String,
    /// Requested sample rate in Hz.
    pub sample_rate: u32,
    /// Requested buffer size in frames.
    pub buffer_size: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            driver: "auto".to_string(),
            sample_rate: 48000,
            // 64 frames at 48 kHz is ~1.3 ms per buffer, keeping the
            // end-to-end target under 5 ms.
            buffer_size: 64,
        }
    }
}

/// Owns the driver and the DSP wiring for one audio session.
pub struct AudioEngine {
    config: EngineConfig,
    driver: Option<Box<dyn AudioDriver>>,
    chain: Arc<EffectChain>,
    handle: Arc<PipelineHandle>,
    manager: Arc<EffectManager>,
    pool: BufferPool,
    initialized: bool,
    running: bool,
}

impl AudioEngine {
    /// Create an engine with an empty chain. No device is touched until
    /// [`initialize`](Self::initialize).
    pub fn new(config: EngineConfig) -> Self {
        let chain = Arc::new(EffectChain::new());
        let handle = Arc::new(PipelineHandle::new(Arc::clone(&chain)));
        let manager = Arc::new(EffectManager::new(Arc::clone(&chain)));
        Self {
            config,
            driver: None,
            chain,
            handle,
            manager,
            pool: BufferPool::new(MAX_FRAMES * 2, 4),
            initialized: false,
            running: false,
        }
    }

    /// Acquire the audio device and wire the pipeline into it.
    ///
    /// Fails fast when the backend or device is unavailable; no retries.
    pub fn initialize(&mut self) -> Result<(), EngineError> {
        if self.running {
            self.stop()?;
        }
        self.driver = None;
        self.initialized = false;

        let pipeline = DspPipeline::new(
            Arc::clone(&self.handle),
            self.config.sample_rate,
            self.config.buffer_size,
            MAX_FRAMES,
        );
        let driver = CpalDriver::build(
            &self.config.driver,
            self.config.sample_rate,
            self.config.buffer_size,
            pipeline,
            &self.pool,
        )?;
        self.install_driver(Box::new(driver))
    }

    /// Adopt an already-built driver. Used by [`initialize`](Self::initialize)
    /// and by tests that stub the platform layer out.
    pub fn install_driver(&mut self, driver: Box<dyn AudioDriver>) -> Result<(), EngineError> {
        let sample_rate = driver.sample_rate();
        let buffer_size = driver.buffer_size();

        self.chain.configure(sample_rate as f32, MAX_FRAMES);
        self.handle.set_stream_format(sample_rate, buffer_size);
        self.handle.reset_stats();

        info!(
            sample_rate,
            buffer_size,
            latency_ms = (driver.input_latency() + driver.output_latency()) * 1000.0,
            "audio engine initialized"
        );

        self.config.sample_rate = sample_rate;
        self.config.buffer_size = buffer_size;
        self.driver = Some(driver);
        self.initialized = true;
        Ok(())
    }

    /// Begin streaming. Idempotent once running.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.running {
            return Ok(());
        }
        let driver = self.driver.as_mut().ok_or(EngineError::NotInitialized)?;
        driver.start()?;
        self.running = true;
        info!("audio engine started");
        Ok(())
    }

    /// Halt streaming. Idempotent once stopped.
    pub fn stop(&mut self) -> Result<(), EngineError> {
        if !self.running {
            return Ok(());
        }
        if let Some(driver) = self.driver.as_mut() {
            driver.stop()?;
        }
        self.running = false;
        info!("audio engine stopped");
        Ok(())
    }

    /// Whether audio is currently streaming.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether a driver is installed.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Change the sample rate. Rejected while running; reinitializes the
    /// driver when one is already installed.
    pub fn set_sample_rate(&mut self, sample_rate: u32) -> Result<(), EngineError> {
        if self.running {
            return Err(EngineError::Running);
        }
        self.config.sample_rate = sample_rate;
        if self.initialized {
            self.initialize()?;
        }
        Ok(())
    }

    /// Change the buffer size. Rejected while running; reinitializes the
    /// driver when one is already installed.
    pub fn set_buffer_size(&mut self, buffer_size: u32) -> Result<(), EngineError> {
        if self.running {
            return Err(EngineError::Running);
        }
        self.config.buffer_size = buffer_size;
        if self.initialized {
            self.initialize()?;
        }
        Ok(())
    }

    /// Negotiated sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Negotiated buffer size in frames.
    pub fn buffer_size(&self) -> u32 {
        self.config.buffer_size
    }

    /// Total driver latency estimate in seconds.
    pub fn total_latency(&self) -> f64 {
        match &self.driver {
            Some(driver) => driver.input_latency() + driver.output_latency(),
            None => 0.0,
        }
    }

    /// Telemetry snapshot.
    pub fn stats(&self) -> PipelineStats {
        self.handle.stats()
    }

    /// The pipeline control handle (gains, tone, stats).
    pub fn handle(&self) -> Arc<PipelineHandle> {
        Arc::clone(&self.handle)
    }

    /// The effect manager (id-addressed chain mutations).
    pub fn manager(&self) -> Arc<EffectManager> {
        Arc::clone(&self.manager)
    }

    /// The effect chain itself.
    pub fn chain(&self) -> Arc<EffectChain> {
        Arc::clone(&self.chain)
    }

    /// Stop streaming and release the device.
    pub fn shutdown(&mut self) {
        let _ = self.stop();
        self.driver = None;
        self.initialized = false;
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
