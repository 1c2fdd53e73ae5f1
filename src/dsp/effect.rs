//! Effect trait definition
//!
//! Base trait for every block effect. Effects process an `AudioBlock` in
//! place, expose an ordered table of float parameters addressed by index, and
//! save/load those parameters as attributes of a `StateElement`.

use crate::dsp::audio_buffer::{AudioBlock, ProcessSpec};
use crate::dsp::params::{flatten_ranges, ParameterDescriptor};
use crate::dsp::registry::EffectType;
use crate::state::StateElement;

/// State attribute carrying the enabled flag
pub const ENABLED_KEY: &str = "Enabled";

/// Fields common to all effects
#[derive(Debug, Clone)]
pub struct EffectParams {
    /// Unique identifier for this effect instance
    pub id: String,
    /// Whether the effect is enabled
    pub enabled: bool,
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            enabled: true,
        }
    }
}

/// Base trait for all block effects
///
/// `process` runs on the audio thread and must not allocate, block or fail.
/// A disabled effect leaves the block untouched and does not advance any
/// internal state.
pub trait Effect: Send {
    /// Size internal buffers for the given playback configuration
    ///
    /// Idempotent for an unchanged spec.
    fn prepare(&mut self, spec: &ProcessSpec);

    /// Process a block in place
    fn process(&mut self, block: &mut AudioBlock<'_>);

    /// Clear history to silence without releasing memory
    fn reset(&mut self);

    /// Variant tag
    fn effect_type(&self) -> EffectType;

    /// Human-readable name
    fn name(&self) -> &'static str {
        self.effect_type().display_name()
    }

    /// Browser category, e.g. "Time", "Distortion"
    fn category(&self) -> &'static str {
        self.effect_type().category()
    }

    /// Ordered parameter table
    fn parameter_descriptors(&self) -> &'static [ParameterDescriptor];

    /// Set a parameter by index; unknown indices are ignored
    fn set_parameter(&mut self, index: usize, value: f32);

    /// Get a parameter by index; unknown indices read 0.0
    fn get_parameter(&self, index: usize) -> f32;

    /// Unique instance id
    fn id(&self) -> &str;

    /// Replace the instance id
    fn set_id(&mut self, id: String);

    /// Check if effect is enabled
    fn is_enabled(&self) -> bool;

    /// Enable or disable the effect
    fn set_enabled(&mut self, enabled: bool);

    /// Number of parameters
    fn num_parameters(&self) -> usize {
        self.parameter_descriptors().len()
    }

    /// Parameter display names in index order
    fn parameter_names(&self) -> Vec<&'static str> {
        self.parameter_descriptors().iter().map(|d| d.name).collect()
    }

    /// Parameter unit labels in index order
    fn parameter_labels(&self) -> Vec<&'static str> {
        self.parameter_descriptors().iter().map(|d| d.label).collect()
    }

    /// Flattened `[min, max, default]` triples in index order
    fn parameter_ranges(&self) -> Vec<f32> {
        flatten_ranges(self.parameter_descriptors())
    }

    /// Index of a parameter by display name or state key
    fn parameter_index(&self, name: &str) -> Option<usize> {
        self.parameter_descriptors()
            .iter()
            .position(|d| d.name.eq_ignore_ascii_case(name) || d.key.eq_ignore_ascii_case(name))
    }

    /// Write the enabled flag and one attribute per parameter
    fn save_state(&self, element: &mut StateElement) {
        element.set_bool(ENABLED_KEY, self.is_enabled());
        for (index, descriptor) in self.parameter_descriptors().iter().enumerate() {
            element.set_f64(descriptor.key, self.get_parameter(index) as f64);
        }
    }

    /// Read the attributes written by `save_state`
    ///
    /// Missing or unreadable attributes keep the current value.
    fn load_state(&mut self, element: &StateElement) {
        if let Some(enabled) = element.get_bool(ENABLED_KEY) {
            self.set_enabled(enabled);
        }
        for (index, descriptor) in self.parameter_descriptors().iter().enumerate() {
            if let Some(value) = element.get_f64(descriptor.key) {
                self.set_parameter(index, value as f32);
            }
        }
    }
}

/// Helper macro to implement common Effect trait methods
///
/// Expects the implementing struct to carry `params: EffectParams`.
#[macro_export]
macro_rules! impl_effect_common {
    ($effect_type:expr, $descriptors:expr) => {
        fn effect_type(&self) -> $crate::dsp::registry::EffectType {
            $effect_type
        }

        fn parameter_descriptors(&self) -> &'static [$crate::dsp::params::ParameterDescriptor] {
            $descriptors
        }

        fn id(&self) -> &str {
            &self.params.id
        }

        fn set_id(&mut self, id: String) {
            self.params.id = id;
        }

        fn is_enabled(&self) -> bool {
            self.params.enabled
        }

        fn set_enabled(&mut self, enabled: bool) {
            self.params.enabled = enabled;
        }
    };
}
