//! In-memory preset bank
//!
//! Numbered slots each holding a named snapshot of a chain's state tree.
//! Persisting the bank is left to the caller via `save_state` / `load_state`.

use crate::dsp::chain::EffectChain;
use crate::state::StateElement;
use std::collections::BTreeMap;
use tracing::debug;

/// Tag of the bank element
pub const PRESETS_TAG: &str = "Presets";

/// Tag of one preset
pub const PRESET_TAG: &str = "Preset";

#[derive(Debug, Clone, PartialEq)]
struct Preset {
    name: String,
    state: StateElement,
}

/// Numbered preset slots
#[derive(Debug, Clone, Default)]
pub struct PresetBank {
    presets: BTreeMap<usize, Preset>,
}

impl PresetBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the chain's current state in a slot, replacing what was there
    pub fn save_preset(&mut self, index: usize, name: &str, chain: &EffectChain) {
        self.presets.insert(
            index,
            Preset {
                name: name.to_string(),
                state: chain.save_state(),
            },
        );
        debug!(index, name, "preset saved");
    }

    /// Restore a slot into the chain; returns false for an empty slot
    pub fn load_preset(&self, index: usize, chain: &mut EffectChain) -> bool {
        match self.presets.get(&index) {
            Some(preset) => {
                chain.load_state(&preset.state);
                debug!(index, name = %preset.name, "preset loaded");
                true
            }
            None => false,
        }
    }

    pub fn delete_preset(&mut self, index: usize) {
        if self.presets.remove(&index).is_some() {
            debug!(index, "preset deleted");
        }
    }

    pub fn preset_exists(&self, index: usize) -> bool {
        self.presets.contains_key(&index)
    }

    pub fn preset_name(&self, index: usize) -> Option<&str> {
        self.presets.get(&index).map(|p| p.name.as_str())
    }

    pub fn num_presets(&self) -> usize {
        self.presets.len()
    }

    /// Occupied slot indices in ascending order
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.presets.keys().copied()
    }

    /// Save the bank as a `Presets` element, one `Preset` child per slot
    pub fn save_state(&self) -> StateElement {
        let mut root = StateElement::new(PRESETS_TAG);
        for (index, preset) in &self.presets {
            let child = root.add_child(StateElement::new(PRESET_TAG));
            child.set_f64("Index", *index as f64);
            child.set_str("Name", preset.name.clone());
            child.add_child(preset.state.clone());
        }
        root
    }

    /// Replace the bank with the slots found in `element`
    ///
    /// Accepts the `Presets` element itself or any element containing one.
    /// Entries without an index or a state child are skipped.
    pub fn load_state(&mut self, element: &StateElement) {
        self.presets.clear();
        let bank = if element.tag == PRESETS_TAG {
            Some(element)
        } else {
            element.child(PRESETS_TAG)
        };
        let Some(bank) = bank else {
            return;
        };

        for child in bank.children_named(PRESET_TAG) {
            let (Some(index), Some(state)) = (child.get_usize("Index"), child.children.first()) else {
                debug!("skipping malformed preset entry");
                continue;
            };
            self.presets.insert(
                index,
                Preset {
                    name: child.get_str("Name").unwrap_or_default().to_string(),
                    state: state.clone(),
                },
            );
        }
        debug!(presets = self.presets.len(), "preset bank loaded");
    }
}
