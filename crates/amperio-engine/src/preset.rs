//! Preset file format and operations.
//!
//! Presets are UTF-8 JSON documents describing a chain: an ordered list of
//! effect types, each with a parameter map.
//!
//! # JSON Format
//!
//! ```json
//! {
//!   "name": "Edge of Breakup",
//!   "description": "Low-gain overdrive into a short room",
//!   "effects": [
//!     { "type": "overdrive", "parameters": { "drive": 0.35, "tone": 0.6, "level": 0.5 } },
//!     { "type": "reverb", "parameters": { "room": 30.0, "decay": 40.0, "mix": 25.0 } }
//!   ]
//! }
//! ```
//!
//! Parameter values round-trip exactly: `f32` values serialize with enough
//! precision that save then load reproduces the chain bit-for-bit.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from preset file I/O and parsing.
#[derive(Debug, Error)]
pub enum PresetError {
    /// Failed to read a preset file.
    #[error("failed to read preset '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a preset file.
    #[error("failed to write preset '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON or wrong document shape.
    #[error("failed to parse preset JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One effect entry inside a preset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EffectPreset {
    /// Effect type tag as understood by the factory.
    #[serde(rename = "type")]
    pub effect_type: String,

    /// Parameter values keyed by wire name. Sorted map so the serialized
    /// form is deterministic.
    #[serde(default)]
    pub parameters: BTreeMap<String, f32>,
}

impl EffectPreset {
    /// New entry with an empty parameter map.
    pub fn new(effect_type: impl Into<String>) -> Self {
        Self {
            effect_type: effect_type.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Builder-style parameter insertion.
    pub fn with_param(mut self, name: impl Into<String>, value: f32) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }
}

/// A saved effect chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Preset {
    /// Preset display name.
    pub name: String,

    /// Optional free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Effects in chain order.
    #[serde(default)]
    pub effects: Vec<EffectPreset>,
}

impl Preset {
    /// Create an empty preset.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            effects: Vec::new(),
        }
    }

    /// Builder-style description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder-style effect append.
    pub fn with_effect(mut self, effect: EffectPreset) -> Self {
        self.effects.push(effect);
        self
    }

    /// Parse a preset from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, PresetError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, PresetError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a preset from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PresetError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| PresetError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Save the preset to a JSON file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PresetError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|source| PresetError::WriteFile {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let content = self.to_json()?;
        std::fs::write(path, content).map_err(|source| PresetError::WriteFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Number of effects in the preset.
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// True if the preset holds no effects.
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Effect type tags in chain order.
    pub fn effect_types(&self) -> Vec<&str> {
        self.effects.iter().map(|e| e.effect_type.as_str()).collect()
    }
}

/// A passthrough preset used as the engine's boot state in tests.
pub fn clean_passthrough() -> Preset {
    Preset::new("Clean").with_description("Empty chain, unity gain")
}
