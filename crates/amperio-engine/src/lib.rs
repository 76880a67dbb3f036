//! Amperio Engine - the live-processing half of amperio.
//!
//! This crate assembles the pieces from [`amperio_core`] and
//! [`amperio_effects`] into a running instrument processor:
//!
//! - [`EffectChain`] - ordered, bypass-aware effect sequence, mutated live
//!   under a one-buffer-bounded mutex
//! - [`EffectManager`] - stable string ids over chain positions
//! - [`DspPipeline`] / [`PipelineHandle`] - the per-buffer processing
//!   function and its cross-thread control surface
//! - [`ToneGenerator`] - deterministic audition tone
//! - [`AudioEngine`] - driver lifecycle and callback wiring over cpal
//! - [`Preset`] - JSON chain serialization
//! - [`load_ir_wav`] - out-of-band impulse-response loading
//!
//! # Threading model
//!
//! The audio thread runs [`DspPipeline::process`] once per hardware buffer
//! and takes exactly one lock, the chain mutex, for at most one buffer
//! period. Everything the control side touches is either atomic
//! ([`PipelineHandle`]) or serialized behind the same chain mutex
//! ([`EffectManager`]), so mutations are linearized against processing:
//! any buffer sees either the pre-mutation or the post-mutation chain,
//! never a half-applied one.

pub mod chain;
pub mod driver;
pub mod engine;
pub mod error;
pub mod ir;
pub mod manager;
pub mod pipeline;
pub mod preset;
pub mod tone;

// Re-export main types at crate root
pub use chain::{EffectChain, MAX_EFFECTS};
pub use driver::{AudioDriver, CpalDriver, DRIVER_NAMES};
pub use engine::{AudioEngine, EngineConfig};
pub use error::EngineError;
pub use ir::load_ir_wav;
pub use manager::EffectManager;
pub use pipeline::{DspPipeline, PipelineHandle, PipelineStats};
pub use preset::{EffectPreset, Preset, PresetError};
pub use tone::{ToneGenerator, WaveType};
