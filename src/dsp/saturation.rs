//! Saturation Effect
//!
//! Gentle tanh saturation: up to 24 dB of drive into a unit-slope curve,
//! with makeup gain and dry/wet mix.

use super::audio_buffer::{AudioBlock, ProcessSpec};
use super::effect::{Effect, EffectParams};
use super::params::ParameterDescriptor;
use super::registry::EffectType;
use super::waveshaper::{ShaperCurve, Waveshaper};
use crate::impl_effect_common;

/// Saturation voicing
pub const SATURATION_CURVE: ShaperCurve = ShaperCurve {
    max_drive_db: 24.0,
    k: 1.0,
};

/// Parameter indices
pub mod param {
    pub const DRIVE: usize = 0;
    pub const MIX: usize = 1;
}

/// Saturation parameter table
pub const SATURATION_PARAMETERS: &[ParameterDescriptor] = &[
    ParameterDescriptor::new("Drive", "dB", 0.0, 1.0, 0.5, "Drive"),
    ParameterDescriptor::new("Mix", "%", 0.0, 1.0, 0.5, "WetDry"),
];

/// Saturation effect
#[derive(Debug, Clone)]
pub struct SaturationEffect {
    params: EffectParams,
    values: [f32; 2],
    shaper: Waveshaper,
}

impl SaturationEffect {
    /// Create a new saturation effect with default settings
    pub fn new() -> Self {
        let values: [f32; 2] = std::array::from_fn(|i| SATURATION_PARAMETERS[i].default);
        Self {
            params: EffectParams::default(),
            shaper: Waveshaper::new(SATURATION_CURVE, values[param::DRIVE]),
            values,
        }
    }
}

impl Default for SaturationEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for SaturationEffect {
    impl_effect_common!(EffectType::Saturation, SATURATION_PARAMETERS);

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
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_saturation_new() {
        let sat = SaturationEffect::new();
        assert_eq!(sat.get_parameter(param::DRIVE), 0.5);
        assert_eq!(sat.get_parameter(param::MIX), 0.5);
        assert!(sat.is_enabled());
        assert_eq!(sat.category(), "Distortion");
    }

    #[test]
    fn test_saturation_zero_drive_near_linear() {
        let mut sat = SaturationEffect::new();
        sat.set_parameter(param::DRIVE, 0.0);
        sat.set_parameter(param::MIX, 1.0);
        sat.prepare(&ProcessSpec::new(44100.0, 512, 1));

        // tanh(x) ~ x for small signals
        let original = AudioBuffer::sine(440.0, 0.05, 1, 512, 44100.0);
        let mut buffer = original.clone();
        sat.process(&mut buffer.as_block());
        for (out, inp) in buffer.channel(0).iter().zip(original.channel(0)) {
            assert_abs_diff_eq!(*out, *inp, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_saturation_softer_than_distortion() {
        use crate::dsp::distortion::DistortionEffect;

        let spec = ProcessSpec::new(44100.0, 512, 1);
        let mut sat = SaturationEffect::new();
        let mut dist = DistortionEffect::new();
        for fx in [&mut sat as &mut dyn Effect, &mut dist as &mut dyn Effect] {
            fx.set_parameter(0, 1.0);
            fx.set_parameter(1, 1.0);
            fx.prepare(&spec);
        }

        let mut a = AudioBuffer::sine(220.0, 0.1, 1, 512, 44100.0);
        let mut b = a.clone();
        sat.process(&mut a.as_block());
        dist.process(&mut b.as_block());

        // Same input, less compression through the gentler curve
        assert!(a.peak(0) > b.peak(0));
    }

    #[test]
    fn test_saturation_half_mix() {
        let mut sat = SaturationEffect::new();
        sat.set_parameter(param::DRIVE, 1.0);
        sat.set_parameter(param::MIX, 0.5);
        sat.prepare(&ProcessSpec::new(44100.0, 512, 1));

        let mut buffer = AudioBuffer::new(1, 1, 44100.0);
        buffer.channel_mut(0)[0] = 1.0;
        sat.process(&mut buffer.as_block());

        let gain = crate::dsp::params::db_to_linear(24.0);
        let expected = 0.5 + 0.5 * gain.tanh() / gain;
        assert_abs_diff_eq!(buffer.channel(0)[0], expected, epsilon = 1e-5);
    }
}
