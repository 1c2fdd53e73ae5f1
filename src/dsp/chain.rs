//! Effect Chain management
//!
//! Effects are processed in chain order (index 0 first); the order is the
//! signal path. Every effect in the chain is prepared with the chain's
//! current spec, including effects added later. Reordering moves effects
//! without touching their internal state.

use super::audio_buffer::{AudioBlock, ProcessSpec};
use super::effect::Effect;
use super::registry::{AnyEffect, EffectType};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::state::StateElement;
use tracing::{debug, warn};

/// Root tag of a saved chain
pub const CHAIN_TAG: &str = "EffectChain";

/// Tag of one saved effect
pub const EFFECT_TAG: &str = "Effect";

/// Attribute carrying the effect type tag
const TYPE_KEY: &str = "Type";

/// Attribute carrying the instance id
const ID_KEY: &str = "Id";

/// Ordered chain of effects
#[derive(Debug, Clone)]
pub struct EffectChain {
    effects: Vec<AnyEffect>,
    spec: ProcessSpec,
    config: EngineConfig,
}

impl EffectChain {
    /// Create a new empty effect chain
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an empty chain whose effects are sized from `config`
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            effects: Vec::new(),
            spec: config.default_spec,
            config,
        }
    }

    /// Last spec the chain was prepared with
    pub fn spec(&self) -> ProcessSpec {
        self.spec
    }

    /// Prepare all effects for processing
    pub fn prepare(&mut self, spec: &ProcessSpec) {
        self.spec = *spec;
        for effect in &mut self.effects {
            effect.prepare(spec);
        }
        debug!(
            sample_rate = spec.sample_rate,
            max_block_size = spec.max_block_size,
            num_channels = spec.num_channels,
            effects = self.effects.len(),
            "effect chain prepared"
        );
    }

    /// Run the block through every effect in order
    ///
    /// A block larger than the prepared spec triggers a re-prepare first.
    pub fn process(&mut self, block: &mut AudioBlock<'_>) {
        if block.is_empty() {
            return;
        }
        if !self.spec.covers(block.num_channels(), block.num_samples()) {
            warn!(
                channels = block.num_channels(),
                samples = block.num_samples(),
                prepared_channels = self.spec.num_channels,
                prepared_block = self.spec.max_block_size,
                "block exceeds prepared spec, re-preparing chain"
            );
            let widened = self
                .spec
                .widened_to(block.num_channels(), block.num_samples());
            self.prepare(&widened);
        }
        for effect in &mut self.effects {
            effect.process(block);
        }
    }

    /// Reset all effects
    pub fn reset(&mut self) {
        for effect in &mut self.effects {
            effect.reset();
        }
    }

    /// Prepare an effect with the chain's spec and append it
    pub fn add_effect(&mut self, mut effect: AnyEffect) {
        effect.prepare(&self.spec);
        debug!(effect = %effect.effect_type(), index = self.effects.len(), "effect added");
        self.effects.push(effect);
    }

    /// Construct an effect of the given type, append it and return its index
    pub fn add_effect_type(&mut self, effect_type: EffectType) -> usize {
        self.add_effect(AnyEffect::with_config(effect_type, &self.config));
        self.effects.len() - 1
    }

    /// Insert an effect; the index is clamped to the chain length
    pub fn insert_effect(&mut self, index: usize, mut effect: AnyEffect) {
        effect.prepare(&self.spec);
        let index = index.min(self.effects.len());
        debug!(effect = %effect.effect_type(), index, "effect inserted");
        self.effects.insert(index, effect);
    }

    /// Remove and return the effect at `index`
    pub fn remove_effect(&mut self, index: usize) -> Option<AnyEffect> {
        if index >= self.effects.len() {
            return None;
        }
        let effect = self.effects.remove(index);
        debug!(effect = %effect.effect_type(), index, "effect removed");
        Some(effect)
    }

    /// Move an effect to a new position; no-op unless both indices are valid
    pub fn move_effect(&mut self, from: usize, to: usize) {
        let len = self.effects.len();
        if from >= len || to >= len || from == to {
            return;
        }
        let effect = self.effects.remove(from);
        self.effects.insert(to, effect);
        debug!(from, to, "effect moved");
    }

    /// Get a reference to an effect by index
    pub fn get_effect(&self, index: usize) -> Option<&AnyEffect> {
        self.effects.get(index)
    }

    /// Get a mutable reference to an effect by index
    pub fn get_effect_mut(&mut self, index: usize) -> Option<&mut AnyEffect> {
        self.effects.get_mut(index)
    }

    /// Index of the effect with the given instance id
    pub fn position_of(&self, effect_id: &str) -> Option<usize> {
        self.effects.iter().position(|e| e.id() == effect_id)
    }

    /// Set one parameter of one effect; returns false when either index is out of range
    pub fn set_effect_parameter(&mut self, effect_index: usize, parameter_index: usize, value: f32) -> bool {
        match self.effects.get_mut(effect_index) {
            Some(effect) if parameter_index < effect.num_parameters() => {
                effect.set_parameter(parameter_index, value);
                true
            }
            _ => false,
        }
    }

    /// Get the number of effects in the chain
    pub fn num_effects(&self) -> usize {
        self.effects.len()
    }

    /// Check if the chain is empty
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Iterate over effects in signal order
    pub fn iter(&self) -> impl Iterator<Item = &AnyEffect> {
        self.effects.iter()
    }

    /// Remove every effect
    pub fn clear(&mut self) {
        self.effects.clear();
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Save the chain as an `EffectChain` element with one child per effect
    pub fn save_state(&self) -> StateElement {
        let mut root = StateElement::new(CHAIN_TAG);
        for effect in &self.effects {
            let child = root.add_child(StateElement::new(EFFECT_TAG));
            child.set_str(TYPE_KEY, effect.effect_type().tag());
            child.set_str(ID_KEY, effect.id());
            effect.save_state(child);
        }
        root
    }

    /// Rebuild the chain from a saved element
    ///
    /// Unknown effect types are skipped. Each rebuilt effect is prepared with
    /// the chain's current spec.
    pub fn load_state(&mut self, element: &StateElement) {
        if element.tag != CHAIN_TAG {
            warn!(tag = %element.tag, "loading chain state from unexpected element");
        }

        self.effects.clear();
        for child in element.children_named(EFFECT_TAG) {
            match AnyEffect::from_state(child, &self.config) {
                Some(mut effect) => {
                    if let Some(id) = child.get_str(ID_KEY) {
                        effect.set_id(id.to_string());
                    }
                    effect.prepare(&self.spec);
                    self.effects.push(effect);
                }
                None => {
                    debug!(
                        effect_type = child.get_str(TYPE_KEY).unwrap_or(""),
                        "skipping unknown effect type"
                    );
                }
            }
        }
        debug!(effects = self.effects.len(), "effect chain state loaded");
    }

    /// Serialize chain state to JSON
    pub fn to_json(&self) -> Result<String> {
        self.save_state().to_json()
    }

    /// Replace the chain with state decoded from JSON
    pub fn from_json(&mut self, json: &str) -> Result<()> {
        let element = StateElement::from_json(json)?;
        self.load_state(&element);
        Ok(())
    }
}

impl Default for EffectChain {
    fn default() -> Self {
        Self::new()
    }
}
