//! Amperio Effects - the pedalboard.
//!
//! Ten effects built on [`amperio_core`], each a small struct implementing
//! [`amperio_core::Effect`] over interleaved stereo blocks:
//!
//! - [`Distortion`] - hard-clipping gain stage with tone control
//! - [`Overdrive`] - tanh soft clipper, tube-style
//! - [`Fuzz`] - extreme clipping with amplitude squash
//! - [`Chorus`] - LFO-modulated delay around 10 ms
//! - [`Flanger`] - short swept delay with feedback
//! - [`Tremolo`] - amplitude modulation, sine-to-square morphable
//! - [`ThreeBandEq`] - peaking biquads at 100 Hz / 1 kHz / 5 kHz
//! - [`EchoDelay`] - feedback delay up to 2 seconds
//! - [`Reverb`] - parallel combs into series allpasses
//! - [`IrConvolver`] - cabinet impulse-response convolution
//!
//! [`EffectNode`] wraps them all in a tagged sum with inline storage, a
//! per-node bypass flag, and a type-tag factory; it is the unit the effect
//! chain stores and the control protocol addresses.

pub mod chorus;
pub mod convolver;
pub mod delay;
pub mod distortion;
pub mod eq;
pub mod flanger;
pub mod fuzz;
pub mod node;
pub mod overdrive;
pub mod reverb;
pub mod tremolo;

mod tone_stage;

// Re-export main types at crate root
pub use chorus::Chorus;
pub use convolver::IrConvolver;
pub use delay::EchoDelay;
pub use distortion::Distortion;
pub use eq::ThreeBandEq;
pub use flanger::Flanger;
pub use fuzz::Fuzz;
pub use node::{EffectNode, EFFECT_TYPE_TAGS};
pub use overdrive::Overdrive;
pub use reverb::Reverb;
pub use tremolo::Tremolo;
