//! Delay Effect
//!
//! Feedback delay with three voicings:
//! - Digital: clean repeats, linear interpolation
//! - Analog: a one-pole lowpass darkens each repeat
//! - Tape: Hermite interpolation with slow wow on the delay time

use super::audio_buffer::{AudioBlock, ProcessSpec, MAX_CHANNELS};
use super::delay_line::DelayLine;
use super::effect::{Effect, EffectParams};
use super::params::{clamp_or, ParameterDescriptor};
use super::registry::EffectType;
use crate::impl_effect_common;
use std::f64::consts::TAU;

/// Default ring capacity in seconds
pub const DEFAULT_MAX_DELAY_SECONDS: f64 = 2.0;

/// Cutoff of the analog feedback filter
const ANALOG_CUTOFF_HZ: f64 = 3500.0;

/// Tape wow rate
const WOW_RATE_HZ: f64 = 0.5;

/// Tape wow depth in seconds
const WOW_DEPTH_SECONDS: f64 = 0.0015;

/// Loop gain ceiling, keeps the feedback path stable
const MAX_LOOP_GAIN: f32 = 0.99;

/// Parameter indices
pub mod param {
    pub const TIME: usize = 0;
    pub const FEEDBACK: usize = 1;
    pub const MIX: usize = 2;
    pub const TYPE: usize = 3;
}

/// Delay parameter table
pub const DELAY_PARAMETERS: &[ParameterDescriptor] = &[
    ParameterDescriptor::new("Time", "sec", 0.0, 2.0, 0.5, "Time"),
    ParameterDescriptor::new("Feedback", "%", 0.0, 0.95, 0.5, "Feedback"),
    ParameterDescriptor::new("Mix", "%", 0.0, 1.0, 0.5, "Mix"),
    ParameterDescriptor::new("Type", "", 0.0, 2.0, 0.0, "DelayType"),
];

/// Delay voicing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayType {
    Digital,
    Analog,
    Tape,
}

impl DelayType {
    /// Map a raw selector value, rounding and clamping to the enum range
    pub fn from_value(value: f32) -> Self {
        match value.round().clamp(0.0, 2.0) as u8 {
            0 => DelayType::Digital,
            1 => DelayType::Analog,
            _ => DelayType::Tape,
        }
    }
}

/// Feedback delay effect
#[derive(Debug, Clone)]
pub struct DelayEffect {
    params: EffectParams,
    /// Raw parameter values in table order
    values: [f32; 4],
    max_delay_seconds: f64,
    line: DelayLine,
    sample_rate: f64,
    /// One-pole lowpass state per channel (analog voicing)
    filter_state: [f32; MAX_CHANNELS],
    filter_coeff: f32,
    /// Wow LFO phase in cycles
    wow_phase: f64,
}

impl DelayEffect {
    /// Create a delay with a 2 second ring
    pub fn new() -> Self {
        Self::with_max_delay(DEFAULT_MAX_DELAY_SECONDS)
    }

    /// Create a delay with a custom ring capacity
    pub fn with_max_delay(max_delay_seconds: f64) -> Self {
        Self {
            params: EffectParams::default(),
            values: std::array::from_fn(|i| DELAY_PARAMETERS[i].default),
            max_delay_seconds: max_delay_seconds.max(0.001),
            line: DelayLine::new(),
            sample_rate: 0.0,
            filter_state: [0.0; MAX_CHANNELS],
            filter_coeff: 1.0,
            wow_phase: 0.0,
        }
    }

    /// Current voicing
    pub fn delay_type(&self) -> DelayType {
        DelayType::from_value(self.values[param::TYPE])
    }

    /// Delay time in samples, limited to the ring capacity
    pub fn delay_samples(&self) -> f64 {
        let max = self.line.max_delay().max(1) as f64;
        let time = match self.values[param::TIME] {
            t if t.is_nan() => DELAY_PARAMETERS[param::TIME].default,
            t => t,
        };
        (time as f64 * self.sample_rate).clamp(1.0, max)
    }

    /// Calculate one-pole lowpass coefficient
    fn calc_filter_coeff(sample_rate: f64) -> f32 {
        // coeff = 1 - exp(-2 * PI * fc / fs)
        (1.0 - (-TAU * ANALOG_CUTOFF_HZ / sample_rate).exp()) as f32
    }
}

impl Default for DelayEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for DelayEffect {
    impl_effect_common!(EffectType::Delay, DELAY_PARAMETERS);

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        let capacity = (self.max_delay_seconds * spec.sample_rate).ceil() as usize;
        let channels = spec.num_channels.clamp(1, MAX_CHANNELS);
        self.line.prepare(channels, capacity);
        self.filter_coeff = Self::calc_filter_coeff(spec.sample_rate);
        self.reset();
    }

    fn process(&mut self, block: &mut AudioBlock<'_>) {
        if !self.params.enabled || block.is_empty() || self.line.is_empty() {
            return;
        }

        let channels = block.num_channels().min(self.line.num_channels());
        let base_delay = self.delay_samples();
        let feedback = clamp_or(self.values[param::FEEDBACK], 0.0, MAX_LOOP_GAIN, 0.0);
        let mix = clamp_or(self.values[param::MIX], 0.0, 1.0, 0.0);
        let voicing = self.delay_type();

        let max_delay = self.line.max_delay() as f64;
        let wow_depth = WOW_DEPTH_SECONDS * self.sample_rate;
        let wow_step = WOW_RATE_HZ / self.sample_rate;

        for frame in 0..block.num_samples() {
            let delay = match voicing {
                DelayType::Tape => {
                    let wow = (TAU * self.wow_phase).sin() * wow_depth;
                    self.wow_phase = (self.wow_phase + wow_step).fract();
                    // Hermite reads one sample ahead of the tap
                    (base_delay + wow).clamp(3.0, max_delay.max(3.0))
                }
                _ => base_delay,
            };

            for ch in 0..channels {
                let input = block.get(frame, ch);
                let delayed = match voicing {
                    DelayType::Tape => self.line.read_hermite(ch, delay),
                    _ => self.line.read_linear(ch, delay),
                };

                let recirculated = match voicing {
                    DelayType::Analog => {
                        let state = &mut self.filter_state[ch];
                        *state += self.filter_coeff * (delayed * feedback - *state);
                        *state
                    }
                    _ => delayed * feedback,
                };

                self.line.write(ch, input + recirculated);
                block.set(frame, ch, input * (1.0 - mix) + delayed * mix);
            }
            self.line.advance();
        }
    }

    fn reset(&mut self) {
        self.line.clear();
        self.filter_state = [0.0; MAX_CHANNELS];
        self.wow_phase = 0.0;
    }

    fn set_parameter(&mut self, index: usize, value: f32) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }

    fn get_parameter(&self, index: usize) -> f32 {
        self.values.get(index).copied().unwrap_or(0.0)
    }
}
