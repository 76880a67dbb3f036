//! The chain's unit of storage: a tagged sum over every concrete effect.
//!
//! Storing effects inline in an enum keeps the chain's nodes contiguous
//! and costs a single match (a jump table) per buffer to reach the
//! concrete type, instead of a heap pointer chase per node. The enum also
//! carries the per-node bypass flag: a bypassed node's `process` is a
//! bit-exact copy of its input.

use amperio_core::{Effect, ParamSpec};

use crate::{
    Chorus, Distortion, EchoDelay, Flanger, Fuzz, IrConvolver, Overdrive, Reverb, ThreeBandEq,
    Tremolo,
};

/// Every type tag the factory recognizes, in registry order.
pub const EFFECT_TYPE_TAGS: &[&str] = &[
    "distortion",
    "overdrive",
    "fuzz",
    "chorus",
    "flanger",
    "tremolo",
    "eq",
    "delay",
    "reverb",
    "ir_convolution",
];

enum Kind {
    Distortion(Distortion),
    Overdrive(Overdrive),
    Fuzz(Fuzz),
    Chorus(Chorus),
    Flanger(Flanger),
    Tremolo(Tremolo),
    Eq(ThreeBandEq),
    Delay(EchoDelay),
    Reverb(Reverb),
    IrConvolver(IrConvolver),
}

/// One effect instance plus its bypass flag.
pub struct EffectNode {
    kind: Kind,
    bypassed: bool,
}

impl EffectNode {
    /// Instantiate an effect by type tag.
    ///
    /// Returns `None` for unknown tags; this is the single factory used by
    /// the chain, the manager, and preset loading.
    pub fn create(type_tag: &str, sample_rate: f32) -> Option<Self> {
        let kind = match type_tag {
            "distortion" => Kind::Distortion(Distortion::new(sample_rate)),
            "overdrive" => Kind::Overdrive(Overdrive::new(sample_rate)),
            "fuzz" => Kind::Fuzz(Fuzz::new(sample_rate)),
            "chorus" => Kind::Chorus(Chorus::new(sample_rate)),
            "flanger" => Kind::Flanger(Flanger::new(sample_rate)),
            "tremolo" => Kind::Tremolo(Tremolo::new(sample_rate)),
            "eq" => Kind::Eq(ThreeBandEq::new(sample_rate)),
            "delay" => Kind::Delay(EchoDelay::new(sample_rate)),
            "reverb" => Kind::Reverb(Reverb::new(sample_rate)),
            "ir_convolution" => Kind::IrConvolver(IrConvolver::new(sample_rate)),
            _ => return None,
        };
        Some(Self {
            kind,
            bypassed: false,
        })
    }

    fn inner(&self) -> &dyn Effect {
        match &self.kind {
            Kind::Distortion(e) => e,
            Kind::Overdrive(e) => e,
            Kind::Fuzz(e) => e,
            Kind::Chorus(e) => e,
            Kind::Flanger(e) => e,
            Kind::Tremolo(e) => e,
            Kind::Eq(e) => e,
            Kind::Delay(e) => e,
            Kind::Reverb(e) => e,
            Kind::IrConvolver(e) => e,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Effect {
        match &mut self.kind {
            Kind::Distortion(e) => e,
            Kind::Overdrive(e) => e,
            Kind::Fuzz(e) => e,
            Kind::Chorus(e) => e,
            Kind::Flanger(e) => e,
            Kind::Tremolo(e) => e,
            Kind::Eq(e) => e,
            Kind::Delay(e) => e,
            Kind::Reverb(e) => e,
            Kind::IrConvolver(e) => e,
        }
    }

    /// Access the convolver variant, if that is what this node holds.
    ///
    /// Used by the out-of-band IR loading path.
    pub fn as_convolver_mut(&mut self) -> Option<&mut IrConvolver> {
        match &mut self.kind {
            Kind::IrConvolver(e) => Some(e),
            _ => None,
        }
    }

    /// Whether this node currently passes audio through untouched.
    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }

    /// Engage or release bypass.
    pub fn set_bypassed(&mut self, bypassed: bool) {
        self.bypassed = bypassed;
    }
}

impl Effect for EffectNode {
    fn process(&mut self, input: &[f32], output: &mut [f32], frames: usize) {
        if self.bypassed {
            output[..frames * 2].copy_from_slice(&input[..frames * 2]);
        } else {
            self.inner_mut().process(input, output, frames);
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.inner_mut().set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        self.inner_mut().reset();
    }

    fn params(&self) -> &'static [ParamSpec] {
        self.inner().params()
    }

    fn set_param(&mut self, name: &str, value: f32) {
        self.inner_mut().set_param(name, value);
    }

    fn get_param(&self, name: &str) -> f32 {
        self.inner().get_param(name)
    }

    fn type_tag(&self) -> &'static str {
        self.inner().type_tag()
    }

    fn display_name(&self) -> &'static str {
        self.inner().display_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_creates_every_tag() {
        for &tag in EFFECT_TYPE_TAGS {
            let node = EffectNode::create(tag, 48000.0)
                .unwrap_or_else(|| panic!("factory failed for {tag}"));
            assert_eq!(node.type_tag(), tag);
            assert!(!node.is_bypassed());
            assert!(!node.display_name().is_empty());
        }
    }

    #[test]
    fn test_unknown_tag_returns_none() {
        assert!(EffectNode::create("vocoder", 48000.0).is_none());
        assert!(EffectNode::create("", 48000.0).is_none());
    }

    #[test]
    fn test_bypass_is_bit_exact() {
        for &tag in EFFECT_TYPE_TAGS {
            let mut node = EffectNode::create(tag, 48000.0).unwrap();
            node.set_bypassed(true);

            let input: Vec<f32> = (0..128).map(|i| (i as f32 * 0.37).sin()).collect();
            let mut output = vec![0.0f32; 128];
            node.process(&input, &mut output, 64);
            assert_eq!(input, output, "bypass not bit-exact for {tag}");
        }
    }

    #[test]
    fn test_every_node_processes_finite_output() {
        for &tag in EFFECT_TYPE_TAGS {
            let mut node = EffectNode::create(tag, 48000.0).unwrap();

            // Impulse followed by a long silence tail; exposes feedback
            // blowups and uninitialized state.
            let mut input = vec![0.0f32; 4096];
            input[0] = 1.0;
            input[1] = 1.0;
            let mut output = vec![0.0f32; 4096];
            node.process(&input, &mut output, 2048);
            assert!(
                output.iter().all(|x| x.is_finite()),
                "{tag}: non-finite output"
            );
        }
    }

    #[test]
    fn test_params_clamp_for_every_node() {
        for &tag in EFFECT_TYPE_TAGS {
            let mut node = EffectNode::create(tag, 48000.0).unwrap();
            for spec in node.params() {
                node.set_param(spec.name, spec.max + 1000.0);
                assert_eq!(node.get_param(spec.name), spec.max, "{tag}.{}", spec.name);
                node.set_param(spec.name, spec.min - 1000.0);
                assert_eq!(node.get_param(spec.name), spec.min, "{tag}.{}", spec.name);
            }
        }
    }

    #[test]
    fn test_defaults_match_specs() {
        for &tag in EFFECT_TYPE_TAGS {
            let node = EffectNode::create(tag, 48000.0).unwrap();
            for spec in node.params() {
                assert_eq!(
                    node.get_param(spec.name),
                    spec.default,
                    "{tag}.{} default",
                    spec.name
                );
            }
        }
    }

    #[test]
    fn test_convolver_accessor() {
        let mut node = EffectNode::create("ir_convolution", 48000.0).unwrap();
        assert!(node.as_convolver_mut().is_some());
        let mut other = EffectNode::create("delay", 48000.0).unwrap();
        assert!(other.as_convolver_mut().is_none());
    }
}
