//! Stable string ids over chain positions.
//!
//! Raw chain indices shift whenever the chain is mutated; external clients
//! need handles that survive insertions and reorders. The manager assigns
//! an opaque id to every effect it adds and keeps an id list parallel to
//! the chain order, re-synced inside the same critical section as each
//! mutation, so an id always resolves to the node's current index.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use amperio_effects::EffectNode;

use crate::chain::EffectChain;
use crate::error::EngineError;

struct ManagerInner {
    /// Ids in chain order; `ids[i]` names the node at chain index `i`.
    ids: Vec<String>,
    /// Monotonic suffix for generated ids.
    counter: u64,
    /// Small LCG for the id's random-looking stem.
    rng_state: u64,
}

impl ManagerInner {
    fn next_id(&mut self) -> String {
        self.rng_state = self
            .rng_state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let stem = (self.rng_state >> 32) as u32;
        let id = format!("effect-{stem:08x}-{}", self.counter);
        self.counter += 1;
        id
    }
}

/// Maps external effect ids onto chain positions.
pub struct EffectManager {
    chain: Arc<EffectChain>,
    inner: Mutex<ManagerInner>,
}

impl EffectManager {
    /// Create a manager for `chain`. The manager must be the only mutation
    /// path for the chain, otherwise ids and positions drift apart.
    pub fn new(chain: Arc<EffectChain>) -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x5eed)
            | 1;
        Self {
            chain,
            inner: Mutex::new(ManagerInner {
                ids: Vec::new(),
                counter: 0,
                rng_state: seed,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManagerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The chain this manager fronts.
    pub fn chain(&self) -> &Arc<EffectChain> {
        &self.chain
    }

    /// Create an effect of `effect_type` and insert it.
    ///
    /// `requested_id` is honored when non-empty and not already taken;
    /// otherwise a fresh id is generated. `pedal_id` is the client's
    /// UI identity for the pedal; it is logged but not interpreted.
    pub fn add_effect(
        &self,
        effect_type: &str,
        pedal_id: &str,
        position: Option<usize>,
        requested_id: Option<&str>,
    ) -> Result<String, EngineError> {
        // Construction stays outside every lock.
        let node = EffectNode::create(effect_type, 48000.0)
            .ok_or_else(|| EngineError::UnknownEffectType(effect_type.to_string()))?;

        let mut inner = self.lock();
        let id = match requested_id {
            Some(requested) if !requested.is_empty() && !inner.ids.iter().any(|i| i == requested) => {
                requested.to_string()
            }
            _ => inner.next_id(),
        };

        let index = self.chain.add(node, position)?;
        inner.ids.insert(index, id.clone());
        tracing::debug!(effect_type, pedal_id, id = %id, index, "effect added");
        Ok(id)
    }

    /// Remove the effect with `effect_id`. The node is dropped after the
    /// chain lock is released.
    pub fn remove_effect(&self, effect_id: &str) -> Result<(), EngineError> {
        let removed = {
            let mut inner = self.lock();
            let index = Self::index_of(&inner.ids, effect_id)?;
            let node = self.chain.remove(index);
            if node.is_some() {
                inner.ids.remove(index);
            }
            node
        };
        match removed {
            Some(_node) => Ok(()),
            None => Err(EngineError::UnknownEffectId(effect_id.to_string())),
        }
    }

    /// Clamp-and-set a parameter on the effect with `effect_id`.
    pub fn set_parameter(&self, effect_id: &str, name: &str, value: f32) -> Result<(), EngineError> {
        let inner = self.lock();
        let index = Self::index_of(&inner.ids, effect_id)?;
        if self.chain.set_param(index, name, value) {
            Ok(())
        } else {
            Err(EngineError::UnknownEffectId(effect_id.to_string()))
        }
    }

    /// Read a parameter from the effect with `effect_id`.
    pub fn get_parameter(&self, effect_id: &str, name: &str) -> Result<f32, EngineError> {
        let inner = self.lock();
        let index = Self::index_of(&inner.ids, effect_id)?;
        self.chain
            .get_param(index, name)
            .ok_or_else(|| EngineError::UnknownEffectId(effect_id.to_string()))
    }

    /// Move the effect with `effect_id` to `to_position` (clamped to the
    /// end of the chain).
    pub fn move_effect(&self, effect_id: &str, to_position: usize) -> Result<(), EngineError> {
        let mut inner = self.lock();
        let from = Self::index_of(&inner.ids, effect_id)?;
        let to = to_position.min(inner.ids.len().saturating_sub(1));
        if from == to {
            return Ok(());
        }
        if !self.chain.move_effect(from, to) {
            return Err(EngineError::UnknownEffectId(effect_id.to_string()));
        }
        let id = inner.ids.remove(from);
        inner.ids.insert(to, id);
        Ok(())
    }

    /// Set the bypass flag on the effect with `effect_id`.
    pub fn toggle_bypass(&self, effect_id: &str, bypassed: bool) -> Result<(), EngineError> {
        let inner = self.lock();
        let index = Self::index_of(&inner.ids, effect_id)?;
        if self.chain.set_bypass(index, bypassed) {
            Ok(())
        } else {
            Err(EngineError::UnknownEffectId(effect_id.to_string()))
        }
    }

    /// Current chain index of the effect with `effect_id`.
    pub fn effect_index(&self, effect_id: &str) -> Option<usize> {
        self.lock().ids.iter().position(|id| id == effect_id)
    }

    /// Type tag of the effect with `effect_id`.
    pub fn effect_type(&self, effect_id: &str) -> Option<&'static str> {
        let index = self.effect_index(effect_id)?;
        self.chain.type_tag_at(index)
    }

    /// All ids in chain order.
    pub fn effect_ids(&self) -> Vec<String> {
        self.lock().ids.clone()
    }

    /// Install an impulse response on a convolver effect.
    pub fn set_impulse_response(&self, effect_id: &str, ir: &[f32]) -> Result<(), EngineError> {
        let inner = self.lock();
        let index = Self::index_of(&inner.ids, effect_id)?;
        let installed = self
            .chain
            .with_node_mut(index, |node| match node.as_convolver_mut() {
                Some(convolver) => {
                    convolver.set_impulse_response(ir);
                    true
                }
                None => false,
            })
            .unwrap_or(false);
        if installed {
            Ok(())
        } else {
            Err(EngineError::NotAConvolver(effect_id.to_string()))
        }
    }

    fn index_of(ids: &[String], effect_id: &str) -> Result<usize, EngineError> {
        ids.iter()
            .position(|id| id == effect_id)
            .ok_or_else(|| EngineError::UnknownEffectId(effect_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> EffectManager {
        EffectManager::new(Arc::new(EffectChain::new()))
    }

    #[test]
    fn test_add_assigns_unique_ids() {
        let mgr = manager();
        let a = mgr.add_effect("distortion", "pedal-1", None, None).unwrap();
        let b = mgr.add_effect("distortion", "pedal-2", None, None).unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("effect-"));
        assert_eq!(mgr.chain().len(), 2);
    }

    #[test]
    fn test_requested_id_is_reused_when_unique() {
        let mgr = manager();
        let id = mgr
            .add_effect("chorus", "pedal-1", None, Some("preview-chorus-1"))
            .unwrap();
        assert_eq!(id, "preview-chorus-1");

        // A second request for the same id falls back to a generated one.
        let other = mgr
            .add_effect("chorus", "pedal-2", None, Some("preview-chorus-1"))
            .unwrap();
        assert_ne!(other, "preview-chorus-1");
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let mgr = manager();
        let err = mgr.add_effect("timewarp", "pedal-1", None, None).unwrap_err();
        assert!(matches!(err, EngineError::UnknownEffectType(_)));
        assert!(mgr.chain().is_empty());
    }

    #[test]
    fn test_ids_survive_moves() {
        let mgr = manager();
        let a = mgr.add_effect("distortion", "p", None, Some("A")).unwrap();
        let b = mgr.add_effect("chorus", "p", None, Some("B")).unwrap();
        let c = mgr.add_effect("delay", "p", None, Some("C")).unwrap();
        assert_eq!((a.as_str(), b.as_str(), c.as_str()), ("A", "B", "C"));

        mgr.move_effect("A", 2).unwrap();

        assert_eq!(mgr.effect_index("A"), Some(2));
        assert_eq!(mgr.effect_index("B"), Some(0));
        assert_eq!(mgr.effect_index("C"), Some(1));
        assert_eq!(mgr.chain().type_tags(), vec!["chorus", "delay", "distortion"]);
        assert_eq!(mgr.effect_type("A"), Some("distortion"));
    }

    #[test]
    fn test_ids_survive_removal() {
        let mgr = manager();
        mgr.add_effect("distortion", "p", None, Some("A")).unwrap();
        mgr.add_effect("chorus", "p", None, Some("B")).unwrap();
        mgr.add_effect("delay", "p", None, Some("C")).unwrap();

        mgr.remove_effect("B").unwrap();
        assert_eq!(mgr.effect_index("A"), Some(0));
        assert_eq!(mgr.effect_index("C"), Some(1));
        assert!(matches!(
            mgr.remove_effect("B").unwrap_err(),
            EngineError::UnknownEffectId(_)
        ));
    }

    #[test]
    fn test_parameter_round_trip() {
        let mgr = manager();
        mgr.add_effect("delay", "p", None, Some("dly")).unwrap();
        mgr.set_parameter("dly", "time", 25.0).unwrap();
        assert_eq!(mgr.get_parameter("dly", "time").unwrap(), 25.0);

        // Values clamp against the descriptor.
        mgr.set_parameter("dly", "feedback", 500.0).unwrap();
        assert_eq!(mgr.get_parameter("dly", "feedback").unwrap(), 100.0);

        assert!(matches!(
            mgr.set_parameter("ghost", "time", 1.0).unwrap_err(),
            EngineError::UnknownEffectId(_)
        ));
    }

    #[test]
    fn test_bypass_round_trip() {
        let mgr = manager();
        mgr.add_effect("fuzz", "p", None, Some("fz")).unwrap();
        mgr.toggle_bypass("fz", true).unwrap();
        assert_eq!(mgr.chain().is_bypassed(0), Some(true));
        mgr.toggle_bypass("fz", false).unwrap();
        assert_eq!(mgr.chain().is_bypassed(0), Some(false));
    }

    #[test]
    fn test_insert_at_position_shifts_ids() {
        let mgr = manager();
        mgr.add_effect("distortion", "p", None, Some("first")).unwrap();
        mgr.add_effect("delay", "p", None, Some("last")).unwrap();
        mgr.add_effect("chorus", "p", Some(1), Some("middle")).unwrap();

        assert_eq!(mgr.effect_ids(), vec!["first", "middle", "last"]);
        assert_eq!(mgr.chain().type_tags(), vec!["distortion", "chorus", "delay"]);
    }

    #[test]
    fn test_move_clamps_to_chain_end() {
        let mgr = manager();
        mgr.add_effect("distortion", "p", None, Some("A")).unwrap();
        mgr.add_effect("chorus", "p", None, Some("B")).unwrap();

        mgr.move_effect("A", 99).unwrap();
        assert_eq!(mgr.effect_index("A"), Some(1));
    }

    #[test]
    fn test_ir_install_only_on_convolver() {
        let mgr = manager();
        mgr.add_effect("ir_convolution", "p", None, Some("cab")).unwrap();
        mgr.add_effect("delay", "p", None, Some("dly")).unwrap();

        mgr.set_impulse_response("cab", &[1.0, 0.5]).unwrap();
        assert!(matches!(
            mgr.set_impulse_response("dly", &[1.0]).unwrap_err(),
            EngineError::NotAConvolver(_)
        ));
    }
}
