//! Distortion Effect
//!
//! Hard-driven tanh waveshaping: up to 36 dB of input gain into a steep
//! curve, with makeup gain and dry/wet mix.

use super::audio_buffer::{AudioBlock, ProcessSpec};
use super::effect::{Effect, EffectParams};
use super::params::ParameterDescriptor;
use super::registry::EffectType;
use super::waveshaper::{ShaperCurve, Waveshaper};
use crate::impl_effect_common;

/// Distortion voicing
pub const DISTORTION_CURVE: ShaperCurve = ShaperCurve {
    max_drive_db: 36.0,
    k: 3.0,
};

/// Parameter indices
pub mod param {
    pub const DRIVE: usize = 0;
    pub const MIX: usize = 1;
}

/// Distortion parameter table
pub const DISTORTION_PARAMETERS: &[ParameterDescriptor] = &[
    ParameterDescriptor::new("Drive", "dB", 0.0, 1.0, 0.5, "Drive"),
    ParameterDescriptor::new("Mix", "%", 0.0, 1.0, 0.5, "WetDry"),
];

/// Distortion effect
#[derive(Debug, Clone)]
pub struct DistortionEffect {
    params: EffectParams,
    values: [f32; 2],
    shaper: Waveshaper,
}

impl DistortionEffect {
    /// Create a distortion with default drive and mix
    pub fn new() -> Self {
        let values: [f32; 2] = std::array::from_fn(|i| DISTORTION_PARAMETERS[i].default);
        Self {
            params: EffectParams::default(),
            shaper: Waveshaper::new(DISTORTION_CURVE, values[param::DRIVE]),
            values,
        }
    }
}

impl Default for DistortionEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for DistortionEffect {
    impl_effect_common!(EffectType::Distortion, DISTORTION_PARAMETERS);

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.shaper.prepare(spec);
    }

    fn process(&mut self, block: &mut AudioBlock<'_>) {
        if !self.params.enabled || block.is_empty() {
            return;
        }
        self.shaper.process(block, self.values[param::MIX]);
    }

    fn reset(&mut self) {
        self.shaper.reset();
    }

    fn set_parameter(&mut self, index: usize, value: f32) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
            if index == param::DRIVE {
                self.shaper.set_drive(value);
            }
        }
    }

    fn get_parameter(&self, index: usize) -> f32 {
        self.values.get(index).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::audio_buffer::AudioBuffer;
    use crate::state::StateElement;

    #[test]
    fn test_distortion_defaults() {
        let fx = DistortionEffect::new();
        assert_eq!(fx.get_parameter(param::DRIVE), 0.5);
        assert_eq!(fx.get_parameter(param::MIX), 0.5);
        assert_eq!(fx.name(), "Distortion");
        assert_eq!(fx.parameter_names(), vec!["Drive", "Mix"]);
    }

    #[test]
    fn test_distortion_adds_harmonics() {
        let mut fx = DistortionEffect::new();
        fx.set_parameter(param::DRIVE, 1.0);
        fx.set_parameter(param::MIX, 1.0);
        fx.prepare(&ProcessSpec::new(44100.0, 512, 1));
        fx.reset();

        let original = AudioBuffer::sine(220.0, 0.5, 1, 4410, 44100.0);
        let mut buffer = original.clone();
        fx.process(&mut buffer.as_block());

        // Squared-off waveform: the output is no longer a scaled copy
        let ratio = buffer.channel(0)[50] / original.channel(0)[50];
        let ratio_late = buffer.channel(0)[5] / original.channel(0)[5];
        assert!((ratio - ratio_late).abs() > 1e-3);
        assert!(buffer.is_valid());
    }

    #[test]
    fn test_distortion_state_keys() {
        let mut fx = DistortionEffect::new();
        fx.set_parameter(param::MIX, 0.8);
        let mut el = StateElement::new("Effect");
        fx.save_state(&mut el);
        assert!(el.has_attribute("Drive"));
        assert!(el.has_attribute("WetDry"));

        let mut restored = DistortionEffect::new();
        restored.load_state(&el);
        assert_eq!(restored.get_parameter(param::MIX), 0.8);
    }

    #[test]
    fn test_disabled_is_identity() {
        let mut fx = DistortionEffect::new();
        fx.set_enabled(false);
        let original = AudioBuffer::sine(440.0, 0.9, 2, 512, 44100.0);
        let mut buffer = original.clone();
        fx.process(&mut buffer.as_block());
        assert_eq!(buffer, original);
    }
}
