//! Pitch Shift Effect
//!
//! Dual-tap rotating-head shifter. Two read taps sweep a 50 ms window behind
//! the write head at a rate of `1 - ratio`, half a window apart. Each tap is
//! faded with a triangular window so the tap that is about to jump is always
//! silent and the two gains sum to one.

use super::audio_buffer::{AudioBlock, ProcessSpec, MAX_CHANNELS};
use super::delay_line::DelayLine;
use super::effect::{Effect, EffectParams};
use super::params::ParameterDescriptor;
use super::registry::EffectType;
use crate::impl_effect_common;

/// Sweep window length in seconds
const WINDOW_SECONDS: f64 = 0.05;

/// Smallest tap delay; keeps Hermite reads behind the write head
const MIN_TAP_DELAY: f64 = 3.0;

/// Parameter indices
pub mod param {
    pub const PITCH: usize = 0;
    pub const FINE: usize = 1;
}

/// Pitch shift parameter table
pub const PITCH_PARAMETERS: &[ParameterDescriptor] = &[
    ParameterDescriptor::new("Pitch", "st", -12.0, 12.0, 0.0, "Pitch"),
    ParameterDescriptor::new("Fine", "cent", -50.0, 50.0, 0.0, "FineTune"),
];

/// Playback-rate ratio for a shift in semitones and cents
pub fn pitch_ratio(semitones: f32, cents: f32) -> f64 {
    2f64.powf((semitones as f64 + cents as f64 / 100.0) / 12.0)
}

/// Triangular fade: 0 at the window edges, 1 in the middle
#[inline]
fn triangle(phase: f64) -> f32 {
    (1.0 - (2.0 * phase - 1.0).abs()) as f32
}

/// Pitch shift effect
#[derive(Debug, Clone)]
pub struct PitchShiftEffect {
    params: EffectParams,
    values: [f32; 2],
    ratio: f64,
    line: DelayLine,
    window: f64,
    /// Sweep position of the first tap, 0..1
    phase: f64,
}

impl PitchShiftEffect {
    /// Create a shifter at unison
    pub fn new() -> Self {
        Self {
            params: EffectParams::default(),
            values: [0.0, 0.0],
            ratio: 1.0,
            line: DelayLine::new(),
            window: 0.0,
            phase: 0.0,
        }
    }

    /// Current playback ratio
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Latency of the shifter at unison, in samples
    pub fn latency_samples(&self) -> f64 {
        MIN_TAP_DELAY + self.window * 0.5
    }
}

impl Default for PitchShiftEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for PitchShiftEffect {
    impl_effect_common!(EffectType::PitchShift, PITCH_PARAMETERS);

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.window = (WINDOW_SECONDS * spec.sample_rate).round().max(1.0);
        let capacity = (self.window + MIN_TAP_DELAY) as usize + 1;
        self.line
            .prepare(spec.num_channels.clamp(1, MAX_CHANNELS), capacity);
        self.phase = 0.0;
    }

    fn process(&mut self, block: &mut AudioBlock<'_>) {
        if !self.params.enabled || block.is_empty() || self.line.is_empty() {
            return;
        }

        let channels = block.num_channels().min(self.line.num_channels());
        let step = (1.0 - self.ratio) / self.window;

        for frame in 0..block.num_samples() {
            let phase_a = self.phase;
            let phase_b = (phase_a + 0.5).fract();
            let delay_a = MIN_TAP_DELAY + phase_a * self.window;
            let delay_b = MIN_TAP_DELAY + phase_b * self.window;
            let gain_a = triangle(phase_a);
            let gain_b = triangle(phase_b);

            for ch in 0..channels {
                let input = block.get(frame, ch);
                let a = self.line.read_hermite(ch, delay_a);
                let b = self.line.read_hermite(ch, delay_b);
                self.line.write(ch, input);
                block.set(frame, ch, a * gain_a + b * gain_b);
            }
            self.line.advance();
            self.phase = (self.phase + step).rem_euclid(1.0);
        }
    }

    fn reset(&mut self) {
        self.line.clear();
        self.phase = 0.0;
    }

    fn set_parameter(&mut self, index: usize, value: f32) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = PITCH_PARAMETERS[index].clamp(value);
            self.ratio = pitch_ratio(self.values[param::PITCH], self.values[param::FINE]);
        }
    }

    fn get_parameter(&self, index: usize) -> f32 {
        self.values.get(index).copied().unwrap_or(0.0)
    }
}
