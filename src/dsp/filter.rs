//! Filter Effect
//!
//! Topology-preserving transform state-variable filter with lowpass,
//! highpass and bandpass outputs. Coefficients are recomputed when a parameter
//! changes or on prepare, never inside the sample loop.

use super::audio_buffer::{AudioBlock, ProcessSpec, MAX_CHANNELS};
use super::effect::{Effect, EffectParams};
use super::params::ParameterDescriptor;
use super::registry::EffectType;
use crate::impl_effect_common;
use std::f64::consts::PI;

/// Lowest usable resonance
const MIN_RESONANCE: f64 = 0.01;

/// Highest cutoff as a fraction of the sample rate
const MAX_CUTOFF_RATIO: f64 = 0.49;

/// Parameter indices
pub mod param {
    pub const CUTOFF: usize = 0;
    pub const RESONANCE: usize = 1;
    pub const TYPE: usize = 2;
}

/// Filter parameter table
pub const FILTER_PARAMETERS: &[ParameterDescriptor] = &[
    ParameterDescriptor::new("Cutoff", "Hz", 20.0, 20000.0, 1000.0, "Cutoff"),
    ParameterDescriptor::new("Resonance", "Q", 0.1, 8.0, 0.7, "Resonance"),
    ParameterDescriptor::new("Type", "", 0.0, 2.0, 0.0, "FilterType"),
];

/// Filter response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    LowPass,
    HighPass,
    BandPass,
}

impl FilterType {
    /// Map a raw selector value, rounding and clamping to the enum range
    pub fn from_value(value: f32) -> Self {
        match value.round().clamp(0.0, 2.0) as u8 {
            0 => FilterType::LowPass,
            1 => FilterType::HighPass,
            _ => FilterType::BandPass,
        }
    }
}

// ============================================================================
// State Variable Filter
// ============================================================================

/// Multi-channel TPT state-variable filter
#[derive(Debug, Clone)]
pub struct StateVariableFilter {
    filter_type: FilterType,
    /// Damping term `1/Q`
    k: f32,
    a1: f32,
    a2: f32,
    a3: f32,
    /// Integrator states per channel
    ic1: [f32; MAX_CHANNELS],
    ic2: [f32; MAX_CHANNELS],
}

impl StateVariableFilter {
    /// Create a filter with pass-through-ish coefficients; call `set_coefficients`
    pub fn new(filter_type: FilterType) -> Self {
        let mut filter = Self {
            filter_type,
            k: 1.0,
            a1: 0.0,
            a2: 0.0,
            a3: 0.0,
            ic1: [0.0; MAX_CHANNELS],
            ic2: [0.0; MAX_CHANNELS],
        };
        filter.set_coefficients(1000.0, 0.707, 44100.0);
        filter
    }

    /// Change the response without touching state
    pub fn set_type(&mut self, filter_type: FilterType) {
        self.filter_type = filter_type;
    }

    /// Response type
    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    /// Recompute coefficients
    ///
    /// Cutoff is limited below Nyquist and resonance is floored.
    pub fn set_coefficients(&mut self, cutoff_hz: f64, resonance: f64, sample_rate: f64) {
        let nyquist_limit = sample_rate * MAX_CUTOFF_RATIO;
        let fc = if cutoff_hz.is_nan() {
            nyquist_limit
        } else {
            cutoff_hz.clamp(1.0, nyquist_limit)
        };
        // f64::max drops a NaN operand
        let q = resonance.max(MIN_RESONANCE);

        let g = (PI * fc / sample_rate).tan();
        let k = 1.0 / q;
        let a1 = 1.0 / (1.0 + g * (g + k));
        let a2 = g * a1;
        let a3 = g * a2;

        self.k = k as f32;
        self.a1 = a1 as f32;
        self.a2 = a2 as f32;
        self.a3 = a3 as f32;
    }

    /// Filter one sample on one channel
    #[inline]
    pub fn process_sample(&mut self, channel: usize, input: f32) -> f32 {
        let ic1 = self.ic1[channel];
        let ic2 = self.ic2[channel];

        let v3 = input - ic2;
        let v1 = self.a1 * ic1 + self.a2 * v3;
        let v2 = ic2 + self.a2 * ic1 + self.a3 * v3;

        self.ic1[channel] = 2.0 * v1 - ic1;
        self.ic2[channel] = 2.0 * v2 - ic2;

        match self.filter_type {
            FilterType::LowPass => v2,
            FilterType::BandPass => v1,
            FilterType::HighPass => input - self.k * v1 - v2,
        }
    }

    /// Filter a slice in place
    pub fn process_slice(&mut self, channel: usize, samples: &mut [f32]) {
        if channel >= MAX_CHANNELS {
            return;
        }
        for sample in samples.iter_mut() {
            *sample = self.process_sample(channel, *sample);
        }
    }

    /// Zero integrator states
    pub fn reset(&mut self) {
        self.ic1 = [0.0; MAX_CHANNELS];
        self.ic2 = [0.0; MAX_CHANNELS];
    }
}

// ============================================================================
// Filter Effect
// ============================================================================

/// Resonant multimode filter effect
#[derive(Debug, Clone)]
pub struct FilterEffect {
    params: EffectParams,
    values: [f32; 3],
    sample_rate: f64,
    svf: StateVariableFilter,
}

impl FilterEffect {
    /// Create a 1 kHz lowpass
    pub fn new() -> Self {
        let mut effect = Self {
            params: EffectParams::default(),
            values: std::array::from_fn(|i| FILTER_PARAMETERS[i].default),
            sample_rate: 44100.0,
            svf: StateVariableFilter::new(FilterType::LowPass),
        };
        effect.update_coefficients();
        effect
    }

    /// Current response type
    pub fn filter_type(&self) -> FilterType {
        self.svf.filter_type()
    }

    fn update_coefficients(&mut self) {
        self.svf
            .set_type(FilterType::from_value(self.values[param::TYPE]));
        self.svf.set_coefficients(
            self.values[param::CUTOFF] as f64,
            self.values[param::RESONANCE] as f64,
            self.sample_rate,
        );
    }
}

impl Default for FilterEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for FilterEffect {
    impl_effect_common!(EffectType::Filter, FILTER_PARAMETERS);

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        self.update_coefficients();
        self.svf.reset();
    }

    fn process(&mut self, block: &mut AudioBlock<'_>) {
        if !self.params.enabled || block.is_empty() {
            return;
        }
        for ch in 0..block.num_channels() {
            self.svf.process_slice(ch, block.channel_mut(ch));
        }
    }

    fn reset(&mut self) {
        self.svf.reset();
    }

    fn set_parameter(&mut self, index: usize, value: f32) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
            self.update_coefficients();
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

    const SR: f64 = 44100.0;

    fn filter(cutoff: f32, q: f32, kind: f32) -> FilterEffect {
        let mut f = FilterEffect::new();
        f.set_parameter(param::CUTOFF, cutoff);
        f.set_parameter(param::RESONANCE, q);
        f.set_parameter(param::TYPE, kind);
        f.prepare(&ProcessSpec::new(SR, 512, 1));
        f
    }

    fn settled_peak(buffer: &AudioBuffer) -> f32 {
        let ch = buffer.channel(0);
        ch[ch.len() / 2..].iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    #[test]
    fn test_lowpass_attenuates_above_cutoff() {
        let mut f = filter(500.0, 0.7, 0.0);
        let input = AudioBuffer::sine(1000.0, 1.0, 1, 512, SR);
        let mut output = input.clone();
        f.process(&mut output.as_block());

        assert!(settled_peak(&output) < 0.8 * settled_peak(&input));
    }

    #[test]
    fn test_lowpass_passes_below_cutoff() {
        let mut f = filter(5000.0, 0.7, 0.0);
        let mut output = AudioBuffer::sine(100.0, 1.0, 1, 8820, SR);
        f.process(&mut output.as_block());
        assert!(settled_peak(&output) > 0.9);
    }

    #[test]
    fn test_highpass_attenuates_below_cutoff() {
        let mut f = filter(2000.0, 0.7, 1.0);
        assert_eq!(f.filter_type(), FilterType::HighPass);
        let mut output = AudioBuffer::sine(100.0, 1.0, 1, 8820, SR);
        f.process(&mut output.as_block());
        assert!(settled_peak(&output) < 0.1);
    }

    #[test]
    fn test_bandpass_peaks_at_centre() {
        let mut centre = filter(1000.0, 2.0, 2.0);
        let mut at_centre = AudioBuffer::sine(1000.0, 1.0, 1, 8820, SR);
        centre.process(&mut at_centre.as_block());

        let mut off = filter(1000.0, 2.0, 2.0);
        let mut off_centre = AudioBuffer::sine(8000.0, 1.0, 1, 8820, SR);
        off.process(&mut off_centre.as_block());

        assert!(settled_peak(&at_centre) > 2.0 * settled_peak(&off_centre));
    }

    #[test]
    fn test_extreme_values_stay_finite() {
        // Cutoff above Nyquist and a tiny resonance are limited internally
        let mut f = filter(30000.0, 0.0, 0.0);
        assert_eq!(f.get_parameter(param::CUTOFF), 30000.0);
        let mut output = AudioBuffer::sine(1000.0, 1.0, 1, 4096, SR);
        f.process(&mut output.as_block());
        assert!(output.is_valid());
    }

    #[test]
    fn test_reset_clears_state() {
        let mut f = filter(500.0, 0.7, 0.0);
        let mut buffer = AudioBuffer::sine(200.0, 1.0, 1, 1024, SR);
        f.process(&mut buffer.as_block());
        f.reset();

        let mut silence = AudioBuffer::new(1, 64, SR);
        f.process(&mut silence.as_block());
        assert_eq!(silence.peak(0), 0.0);
    }

    #[test]
    fn test_disabled_is_identity() {
        let mut f = filter(500.0, 0.7, 0.0);
        f.set_enabled(false);
        let original = AudioBuffer::sine(1000.0, 1.0, 2, 512, SR);
        let mut buffer = original.clone();
        f.process(&mut buffer.as_block());
        assert_eq!(buffer, original);
    }

    #[test]
    fn test_nan_cutoff_recovers() {
        let mut f = filter(f32::NAN, 0.7, 0.0);
        let mut buffer = AudioBuffer::sine(1000.0, 0.5, 1, 512, SR);
        f.process(&mut buffer.as_block());
        assert!(buffer.is_valid());

        f.set_parameter(param::CUTOFF, 500.0);
        let mut buffer = AudioBuffer::sine(1000.0, 0.5, 1, 512, SR);
        f.process(&mut buffer.as_block());
        assert!(buffer.is_valid());
        assert!(settled_peak(&buffer) < 0.4);
    }
}
