//! Amperio Core - DSP primitives for real-time audio processing
//!
//! This crate provides the foundational building blocks shared by the rest
//! of the amperio workspace, designed for zero allocation in the audio path.
//!
//! # Core Abstractions
//!
//! ## Cross-thread plumbing
//!
//! - [`RingBuffer`] - Lock-free SPSC sample queue with split
//!   [`Producer`]/[`Consumer`] ends
//! - [`BufferPool`] - Pre-allocated scratch buffers handed out as RAII guards
//!
//! ## Effect System
//!
//! - [`Effect`] - Object-safe trait for all audio effects (interleaved
//!   stereo block processing, name-based parameters)
//! - [`ParamSpec`] - Static parameter descriptor with range clamping
//!
//! ## DSP primitives
//!
//! - [`Biquad`] - second-order IIR section with RBJ peaking coefficients
//! - [`DelayLine`] - circular delay with defensive fractional reads
//! - [`Lfo`] - phase-continuous low-frequency oscillator
//!
//! ## Kernels
//!
//! Block operations (`copy`, gain, mix, peak) with SIMD main loops behind
//! the default-on `simd` feature and scalar fallbacks. Both paths produce
//! identical output.
//!
//! # Design Principles
//!
//! - **Real-time safe**: no allocations or locks in processing paths
//! - **No `unsafe`**: the workspace denies `unsafe_code`; the lock-free
//!   queue is built from atomic cells instead of raw memory
//! - **Object-safe traits**: dynamic dispatch at the chain seam, inline
//!   storage everywhere else

pub mod biquad;
pub mod delay;
pub mod effect;
pub mod kernels;
pub mod lfo;
pub mod math;
pub mod param;
pub mod pool;
pub mod ring;

// Re-export main types at crate root
pub use biquad::{peaking_coefficients, Biquad};
pub use delay::DelayLine;
pub use effect::Effect;
pub use lfo::Lfo;
pub use math::{db_to_linear, flush_denormal, linear_to_db, one_pole_coefficient, DB_SILENCE_FLOOR};
pub use param::ParamSpec;
pub use pool::{BufferPool, PooledBuffer};
pub use ring::{ring_buffer, Consumer, Producer, RingBuffer};
