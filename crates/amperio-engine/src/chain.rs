//! The effect chain: an ordered, bypass-aware sequence of effects that the
//! audio thread processes while the control thread mutates it.
//!
//! # Locking discipline
//!
//! Every operation, including [`process`](EffectChain::process), serializes
//! on one internal mutex. `process` holds it for exactly one buffer (at 64
//! frames / 48 kHz that is ~1.3 ms), so a control-side mutation blocks for
//! at most one buffer period. Effect construction happens before `add`
//! takes the lock and destruction happens after `remove` releases it; only
//! the splice of an already-built node runs under the lock.
//!
//! # Traversal
//!
//! `process` ping-pongs between two scratch buffers owned by the chain:
//! `input -> scratch A -> scratch B -> scratch A -> ... -> output`.
//! Bypassed nodes copy bit-exactly. The scratch buffers are sized by
//! [`configure`](EffectChain::configure) so the steady state never
//! allocates.

use std::sync::Mutex;
use std::sync::PoisonError;

use amperio_core::{kernels, Effect};
use amperio_effects::EffectNode;
use tracing::warn;

use crate::error::EngineError;
use crate::preset::{EffectPreset, Preset};

/// Hard cap on chain membership.
pub const MAX_EFFECTS: usize = 20;

struct ChainInner {
    nodes: Vec<EffectNode>,
    scratch_a: Vec<f32>,
    scratch_b: Vec<f32>,
    sample_rate: f32,
}

/// Thread-safe ordered collection of up to [`MAX_EFFECTS`] effects.
pub struct EffectChain {
    inner: Mutex<ChainInner>,
}

impl Default for EffectChain {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectChain {
    /// Create an empty chain at the default 48 kHz rate.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ChainInner {
                nodes: Vec::with_capacity(MAX_EFFECTS),
                scratch_a: Vec::new(),
                scratch_b: Vec::new(),
                sample_rate: 48000.0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChainInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the sample rate and pre-size the scratch buffers for the largest
    /// buffer the driver will deliver. Existing nodes are reconfigured.
    pub fn configure(&self, sample_rate: f32, max_frames: usize) {
        let mut inner = self.lock();
        inner.sample_rate = sample_rate;
        let len = max_frames * 2;
        inner.scratch_a.resize(len, 0.0);
        inner.scratch_b.resize(len, 0.0);
        for node in &mut inner.nodes {
            node.set_sample_rate(sample_rate);
        }
    }

    /// Insert an already-constructed node.
    ///
    /// `position` of `None` (or past the end) appends. The node is switched
    /// to the chain's sample rate on entry. Returns the actual index, or
    /// [`EngineError::ChainFull`] with the chain unchanged.
    pub fn add(&self, mut node: EffectNode, position: Option<usize>) -> Result<usize, EngineError> {
        let mut inner = self.lock();
        if inner.nodes.len() >= MAX_EFFECTS {
            return Err(EngineError::ChainFull);
        }
        node.set_sample_rate(inner.sample_rate);
        let index = position.unwrap_or(usize::MAX).min(inner.nodes.len());
        inner.nodes.insert(index, node);
        Ok(index)
    }

    /// Remove the node at `index`, returning it so the caller drops it
    /// outside the lock. `None` if out of range.
    pub fn remove(&self, index: usize) -> Option<EffectNode> {
        let mut inner = self.lock();
        if index < inner.nodes.len() {
            Some(inner.nodes.remove(index))
        } else {
            None
        }
    }

    /// Remove every node, returning them for out-of-lock destruction.
    pub fn clear(&self) -> Vec<EffectNode> {
        let mut inner = self.lock();
        std::mem::take(&mut inner.nodes)
    }

    /// Move a node: remove from `from`, reinsert so it lands at index `to`
    /// in the resulting order.
    pub fn move_effect(&self, from: usize, to: usize) -> bool {
        let mut inner = self.lock();
        let len = inner.nodes.len();
        if from >= len || to >= len {
            return false;
        }
        if from != to {
            let node = inner.nodes.remove(from);
            inner.nodes.insert(to, node);
        }
        true
    }

    /// Swap two nodes.
    pub fn swap(&self, a: usize, b: usize) -> bool {
        let mut inner = self.lock();
        if a >= inner.nodes.len() || b >= inner.nodes.len() {
            return false;
        }
        inner.nodes.swap(a, b);
        true
    }

    /// Number of nodes in the chain.
    pub fn len(&self) -> usize {
        self.lock().nodes.len()
    }

    /// True when the chain holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.lock().nodes.is_empty()
    }

    /// Set a node's bypass flag. `false` if out of range.
    pub fn set_bypass(&self, index: usize, bypassed: bool) -> bool {
        let mut inner = self.lock();
        match inner.nodes.get_mut(index) {
            Some(node) => {
                node.set_bypassed(bypassed);
                true
            }
            None => false,
        }
    }

    /// Read a node's bypass flag.
    pub fn is_bypassed(&self, index: usize) -> Option<bool> {
        self.lock().nodes.get(index).map(EffectNode::is_bypassed)
    }

    /// Set a named parameter on the node at `index` (clamped by the node).
    /// `false` if the index is out of range; unknown parameter names are a
    /// node-level no-op and still report success.
    pub fn set_param(&self, index: usize, name: &str, value: f32) -> bool {
        let mut inner = self.lock();
        match inner.nodes.get_mut(index) {
            Some(node) => {
                node.set_param(name, value);
                true
            }
            None => false,
        }
    }

    /// Read a named parameter from the node at `index`.
    pub fn get_param(&self, index: usize, name: &str) -> Option<f32> {
        self.lock().nodes.get(index).map(|node| node.get_param(name))
    }

    /// Type tag of the node at `index`.
    pub fn type_tag_at(&self, index: usize) -> Option<&'static str> {
        self.lock().nodes.get(index).map(|node| node.type_tag())
    }

    /// Type tags of all nodes in chain order.
    pub fn type_tags(&self) -> Vec<&'static str> {
        self.lock().nodes.iter().map(|node| node.type_tag()).collect()
    }

    /// Run `f` against the node at `index` under the chain lock.
    ///
    /// Used for operations outside the `Effect` surface, like installing an
    /// impulse response on a convolver node.
    pub fn with_node_mut<R>(&self, index: usize, f: impl FnOnce(&mut EffectNode) -> R) -> Option<R> {
        let mut inner = self.lock();
        inner.nodes.get_mut(index).map(f)
    }

    /// Process one buffer through every node in order.
    ///
    /// Holds the chain mutex for the duration of the buffer. An empty chain
    /// copies input to output. The final copy into `output` is
    /// unconditional, so `output` never carries stale data.
    pub fn process(&self, input: &[f32], output: &mut [f32], frames: usize) {
        let samples = frames * 2;
        let mut inner = self.lock();

        if inner.nodes.is_empty() {
            kernels::copy(&input[..samples], &mut output[..samples]);
            return;
        }

        // configure() pre-sizes these; growing here is the defensive cold
        // path for a driver that delivers more than it promised.
        if inner.scratch_a.len() < samples {
            inner.scratch_a.resize(samples, 0.0);
            inner.scratch_b.resize(samples, 0.0);
        }

        let ChainInner {
            nodes,
            scratch_a,
            scratch_b,
            ..
        } = &mut *inner;

        kernels::copy(&input[..samples], &mut scratch_a[..samples]);
        let mut current_in_b = false;
        for node in nodes.iter_mut() {
            if current_in_b {
                node.process(&scratch_b[..samples], &mut scratch_a[..samples], frames);
            } else {
                node.process(&scratch_a[..samples], &mut scratch_b[..samples], frames);
            }
            current_in_b = !current_in_b;
        }

        let current = if current_in_b { scratch_b } else { scratch_a };
        kernels::copy(&current[..samples], &mut output[..samples]);
    }

    /// Capture the chain as a [`Preset`]: type tags in order plus every
    /// parameter's current value.
    pub fn snapshot(&self, name: &str) -> Preset {
        let inner = self.lock();
        let mut preset = Preset::new(name);
        for node in &inner.nodes {
            let mut entry = EffectPreset::new(node.type_tag());
            for spec in node.params() {
                entry.parameters.insert(spec.name.to_string(), node.get_param(spec.name));
            }
            preset.effects.push(entry);
        }
        preset
    }

    /// Replace the chain's contents with a preset.
    ///
    /// Unknown effect types are dropped with a warning and the remaining
    /// effects load in order. Returns the number of effects actually
    /// loaded. Nodes are constructed before the lock is taken and the old
    /// nodes are dropped after it is released.
    pub fn apply_preset(&self, preset: &Preset) -> usize {
        let sample_rate = self.lock().sample_rate;

        let mut nodes = Vec::with_capacity(preset.effects.len().min(MAX_EFFECTS));
        for entry in &preset.effects {
            if nodes.len() >= MAX_EFFECTS {
                warn!(preset = %preset.name, "preset exceeds chain capacity, truncating");
                break;
            }
            match EffectNode::create(&entry.effect_type, sample_rate) {
                Some(mut node) => {
                    for (name, &value) in &entry.parameters {
                        node.set_param(name, value);
                    }
                    nodes.push(node);
                }
                None => {
                    warn!(effect_type = %entry.effect_type, "unknown effect type in preset, skipping");
                }
            }
        }
        let loaded = nodes.len();

        let old = {
            let mut inner = self.lock();
            std::mem::replace(&mut inner.nodes, nodes)
        };
        drop(old);
        loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(tag: &str) -> EffectNode {
        EffectNode::create(tag, 48000.0).expect("known tag")
    }

    #[test]
    fn test_empty_chain_copies_input() {
        let chain = EffectChain::new();
        chain.configure(48000.0, 64);

        let input: Vec<f32> = (0..128).map(|i| if i % 2 == 0 { 0.1 } else { -0.1 }).collect();
        let mut output = vec![0.0f32; 128];
        chain.process(&input, &mut output, 64);
        assert_eq!(input, output);
    }

    #[test]
    fn test_add_positions() {
        let chain = EffectChain::new();
        assert_eq!(chain.add(node("distortion"), None).unwrap(), 0);
        assert_eq!(chain.add(node("delay"), None).unwrap(), 1);
        assert_eq!(chain.add(node("chorus"), Some(1)).unwrap(), 1);
        assert_eq!(chain.type_tags(), vec!["distortion", "chorus", "delay"]);

        // Past-the-end position appends.
        assert_eq!(chain.add(node("reverb"), Some(99)).unwrap(), 3);
    }

    #[test]
    fn test_capacity_is_enforced() {
        let chain = EffectChain::new();
        for _ in 0..MAX_EFFECTS {
            chain.add(node("tremolo"), None).unwrap();
        }
        let err = chain.add(node("tremolo"), None).unwrap_err();
        assert!(matches!(err, EngineError::ChainFull));
        assert_eq!(chain.len(), MAX_EFFECTS);
    }

    #[test]
    fn test_remove_and_clear() {
        let chain = EffectChain::new();
        chain.add(node("distortion"), None).unwrap();
        chain.add(node("delay"), None).unwrap();

        let removed = chain.remove(0).unwrap();
        assert_eq!(removed.type_tag(), "distortion");
        assert_eq!(chain.len(), 1);
        assert!(chain.remove(5).is_none());

        let drained = chain.clear();
        assert_eq!(drained.len(), 1);
        assert!(chain.is_empty());
    }

    #[test]
    fn test_move_and_swap() {
        let chain = EffectChain::new();
        chain.add(node("distortion"), None).unwrap();
        chain.add(node("chorus"), None).unwrap();
        chain.add(node("delay"), None).unwrap();

        assert!(chain.move_effect(0, 2));
        assert_eq!(chain.type_tags(), vec!["chorus", "delay", "distortion"]);

        assert!(chain.swap(0, 1));
        assert_eq!(chain.type_tags(), vec!["delay", "chorus", "distortion"]);

        assert!(!chain.move_effect(0, 3));
        assert!(!chain.swap(3, 0));
    }

    #[test]
    fn test_bypassed_cascade_is_transparent() {
        let chain = EffectChain::new();
        chain.configure(44100.0, 1024);
        for i in 0..MAX_EFFECTS {
            chain.add(node("distortion"), None).unwrap();
            chain.set_bypass(i, true);
        }

        let frames = 1024;
        let mut input = vec![0.0f32; frames * 2];
        for i in 0..frames {
            let x = (std::f32::consts::TAU * 440.0 * i as f32 / 44100.0).sin() * 0.3;
            input[i * 2] = x;
            input[i * 2 + 1] = x;
        }
        let mut output = vec![0.0f32; frames * 2];
        chain.process(&input, &mut output, frames);

        for (x, y) in input.iter().zip(output.iter()) {
            assert!((x - y).abs() < 1e-5);
        }
    }

    #[test]
    fn test_param_routing() {
        let chain = EffectChain::new();
        chain.add(node("delay"), None).unwrap();

        assert!(chain.set_param(0, "time", 25.0));
        assert_eq!(chain.get_param(0, "time"), Some(25.0));
        // Unknown parameter names are a node-level no-op.
        assert!(chain.set_param(0, "bogus", 1.0));
        // Out-of-range index is an error.
        assert!(!chain.set_param(3, "time", 1.0));
        assert_eq!(chain.get_param(3, "time"), None);
    }

    #[test]
    fn test_snapshot_then_apply_round_trips() {
        let chain = EffectChain::new();
        chain.configure(48000.0, 64);
        chain.add(node("chorus"), None).unwrap();
        chain.set_param(0, "rate", 2.5);
        chain.set_param(0, "depth", 0.7);
        chain.set_param(0, "mix", 0.4);
        chain.add(node("delay"), None).unwrap();
        chain.set_param(1, "time", 30.0);
        chain.set_param(1, "feedback", 40.0);
        chain.set_param(1, "mix", 60.0);

        let preset = chain.snapshot("roundtrip");
        chain.clear();
        assert!(chain.is_empty());

        let loaded = chain.apply_preset(&preset);
        assert_eq!(loaded, 2);
        assert_eq!(chain.type_tags(), vec!["chorus", "delay"]);
        assert!((chain.get_param(0, "rate").unwrap() - 2.5).abs() < 1e-6);
        assert!((chain.get_param(0, "depth").unwrap() - 0.7).abs() < 1e-6);
        assert!((chain.get_param(1, "feedback").unwrap() - 40.0).abs() < 1e-6);
    }

    #[test]
    fn test_apply_preset_drops_unknown_types() {
        let chain = EffectChain::new();
        let preset = Preset::new("mixed")
            .with_effect(EffectPreset::new("distortion"))
            .with_effect(EffectPreset::new("time_machine"))
            .with_effect(EffectPreset::new("reverb"));

        let loaded = chain.apply_preset(&preset);
        assert_eq!(loaded, 2);
        assert_eq!(chain.type_tags(), vec!["distortion", "reverb"]);
    }

    #[test]
    fn test_process_applies_effects_in_order() {
        let chain = EffectChain::new();
        chain.configure(48000.0, 16);
        // distortion at level 0 silences everything downstream.
        chain.add(node("distortion"), None).unwrap();
        chain.set_param(0, "level", 0.0);
        chain.add(node("tremolo"), None).unwrap();

        let input = vec![0.5f32; 32];
        let mut output = vec![1.0f32; 32];
        chain.process(&input, &mut output, 16);
        assert!(output.iter().all(|&x| x == 0.0));
    }
}
