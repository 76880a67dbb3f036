//! Error types for engine operations.

use thiserror::Error;

/// Errors surfaced by the audio engine and effect management layers.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The requested audio backend is not available on this platform or
    /// the device could not be acquired.
    #[error("audio driver unavailable: {0}")]
    DriverUnavailable(String),

    /// Stream construction or control failed.
    #[error("audio stream error: {0}")]
    Stream(String),

    /// The engine must be initialized before this operation.
    #[error("engine not initialized")]
    NotInitialized,

    /// Sample rate or buffer size cannot change while audio is running.
    #[error("configuration is locked while the engine is running")]
    Running,

    /// The effect factory does not recognize this type tag.
    #[error("unknown effect type: {0}")]
    UnknownEffectType(String),

    /// No effect with this id exists in the chain.
    #[error("unknown effect id: {0}")]
    UnknownEffectId(String),

    /// The chain is at its 20-effect capacity.
    #[error("effect chain is full ({max} effects)", max = crate::chain::MAX_EFFECTS)]
    ChainFull,

    /// Impulse response file could not be read.
    #[error("failed to read impulse response: {0}")]
    IrRead(#[from] hound::Error),

    /// Impulse response file contained no samples.
    #[error("impulse response is empty")]
    IrEmpty,

    /// The addressed effect is not an IR convolver.
    #[error("effect '{0}' does not accept an impulse response")]
    NotAConvolver(String),
}
