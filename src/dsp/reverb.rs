//! Reverb effect
//!
//! Implements the Freeverb algorithm:
//! - 8 parallel comb filters per channel for the decay
//! - 4 series allpass filters per channel for diffusion
//! - Stereo width control
//! - Freeze mode (infinite sustain, input muted)
//!
//! The algorithm lives in [`Freeverb`] so the granular engine can reuse it as
//! its output stage; [`ReverbEffect`] wraps it in the `Effect` contract.

use super::audio_buffer::{AudioBlock, ProcessSpec};
use super::effect::{Effect, EffectParams};
use super::params::{clamp_or, ParameterDescriptor};
use super::registry::EffectType;
use crate::impl_effect_common;

// ============================================================================
// Freeverb Constants
// ============================================================================

/// Reference sample rate for Freeverb delays
const REFERENCE_SAMPLE_RATE: f64 = 44100.0;

/// Comb filter delays at 44100 Hz (8 filters)
const COMB_DELAYS: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];

/// Allpass filter delays at 44100 Hz (4 filters)
const ALLPASS_DELAYS: [usize; 4] = [556, 441, 341, 225];

/// Stereo spread offset in samples (for right channel)
const STEREO_SPREAD: usize = 23;

/// Fixed gain for allpass filters (standard Freeverb value)
const ALLPASS_GAIN: f32 = 0.5;

/// Scale factor for room size parameter to feedback
const ROOM_SCALE: f32 = 0.28;

/// Offset for room size parameter to feedback
const ROOM_OFFSET: f32 = 0.7;

/// Scale factor for damping parameter
const DAMP_SCALE: f32 = 0.4;

/// Gain applied to the input before the comb bank
const INPUT_GAIN: f32 = 0.015;

/// Wet level scaling
const WET_SCALE: f32 = 3.0;

/// Dry level scaling
const DRY_SCALE: f32 = 2.0;

/// Freeze engages at or above this control value
const FREEZE_THRESHOLD: f32 = 0.5;

// ============================================================================
// Parameters
// ============================================================================

/// Parameter indices
pub mod param {
    pub const ROOM_SIZE: usize = 0;
    pub const DAMPING: usize = 1;
    pub const WET_LEVEL: usize = 2;
    pub const DRY_LEVEL: usize = 3;
    pub const WIDTH: usize = 4;
    pub const FREEZE: usize = 5;
}

/// Reverb parameter table
pub const REVERB_PARAMETERS: &[ParameterDescriptor] = &[
    ParameterDescriptor::new("Room Size", "%", 0.0, 1.0, 0.5, "RoomSize"),
    ParameterDescriptor::new("Damping", "%", 0.0, 1.0, 0.5, "Damping"),
    ParameterDescriptor::new("Wet Level", "%", 0.0, 1.0, 0.33, "WetLevel"),
    ParameterDescriptor::new("Dry Level", "%", 0.0, 1.0, 0.4, "DryLevel"),
    ParameterDescriptor::new("Width", "%", 0.0, 1.0, 1.0, "Width"),
    ParameterDescriptor::new("Freeze", "", 0.0, 1.0, 0.0, "FreezeMode"),
];

/// Freeverb control values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreeverbSettings {
    /// Room size (0 to 1)
    pub room_size: f32,
    /// High-frequency damping (0 to 1)
    pub damping: f32,
    /// Wet level (0 to 1)
    pub wet_level: f32,
    /// Dry level (0 to 1)
    pub dry_level: f32,
    /// Stereo width (0 to 1)
    pub width: f32,
    /// Freeze control; engaged at 0.5 and above
    pub freeze: f32,
}

impl Default for FreeverbSettings {
    fn default() -> Self {
        Self {
            room_size: 0.5,
            damping: 0.5,
            wet_level: 0.33,
            dry_level: 0.4,
            width: 1.0,
            freeze: 0.0,
        }
    }
}

impl FreeverbSettings {
    /// Whether freeze mode is engaged
    pub fn is_frozen(&self) -> bool {
        self.freeze >= FREEZE_THRESHOLD
    }
}

// ============================================================================
// Filter Building Blocks
// ============================================================================

/// Low-pass comb filter for Freeverb
///
/// Implements: y[n] = x[n - delay] + feedback * lowpass(y[n - delay])
#[derive(Debug, Clone)]
struct CombFilter {
    /// Circular buffer for delay line
    buffer: Vec<f32>,
    /// Current write position
    write_pos: usize,
    /// Buffer size mask for efficient wrapping
    mask: usize,
    /// Filter state for damping (low-pass)
    filter_state: f32,
    /// Feedback coefficient (derived from room_size)
    feedback: f32,
    /// Damping coefficient (1 - damp_scale * damping)
    damp1: f32,
    /// Damping coefficient (damp_scale * damping)
    damp2: f32,
}

impl CombFilter {
    /// Create a new comb filter with the given delay size
    fn new(delay_size: usize) -> Self {
        // Round up to next power of 2 for efficient wrapping
        let size = delay_size.next_power_of_two();
        Self {
            buffer: vec![0.0; size],
            write_pos: 0,
            mask: size - 1,
            filter_state: 0.0,
            feedback: 0.5,
            damp1: 0.5,
            damp2: 0.5,
        }
    }

    /// Set feedback and damping coefficients
    fn set_coefficients(&mut self, feedback: f32, damp1: f32, damp2: f32) {
        self.feedback = feedback;
        self.damp1 = damp1;
        self.damp2 = damp2;
    }

    /// Process a single sample through the comb filter
    #[inline]
    fn process(&mut self, input: f32, delay: usize) -> f32 {
        let read_pos = (self.write_pos + self.mask + 1 - delay) & self.mask;
        let output = self.buffer[read_pos];

        // One-pole low-pass in the feedback path
        self.filter_state = output * self.damp1 + self.filter_state * self.damp2;

        self.buffer[self.write_pos] = input + self.filter_state * self.feedback;
        self.write_pos = (self.write_pos + 1) & self.mask;

        output
    }

    /// Clear the filter state
    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.filter_state = 0.0;
        self.write_pos = 0;
    }
}

/// Allpass filter for Freeverb diffusion
///
/// Implements: y[n] = -x[n] + b[n - delay], b[n] = x[n] + gain * b[n - delay]
#[derive(Debug, Clone)]
struct AllpassFilter {
    /// Circular buffer for delay line
    buffer: Vec<f32>,
    /// Current write position
    write_pos: usize,
    /// Buffer size mask for efficient wrapping
    mask: usize,
}

impl AllpassFilter {
    /// Create a new allpass filter with the given delay size
    fn new(delay_size: usize) -> Self {
        let size = delay_size.next_power_of_two();
        Self {
            buffer: vec![0.0; size],
            write_pos: 0,
            mask: size - 1,
        }
    }

    /// Process a single sample through the allpass filter
    #[inline]
    fn process(&mut self, input: f32, delay: usize) -> f32 {
        let read_pos = (self.write_pos + self.mask + 1 - delay) & self.mask;
        let delayed = self.buffer[read_pos];

        self.buffer[self.write_pos] = input + delayed * ALLPASS_GAIN;
        self.write_pos = (self.write_pos + 1) & self.mask;

        delayed - input
    }

    /// Clear the filter state
    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

// ============================================================================
// Freeverb Core
// ============================================================================

/// Stereo Freeverb tank
#[derive(Debug, Clone)]
pub struct Freeverb {
    settings: FreeverbSettings,
    sample_rate: f64,

    comb_left: [CombFilter; 8],
    comb_right: [CombFilter; 8],
    allpass_left: [AllpassFilter; 4],
    allpass_right: [AllpassFilter; 4],

    /// Comb/allpass delays scaled for the current sample rate
    comb_delays_left: [usize; 8],
    comb_delays_right: [usize; 8],
    allpass_delays_left: [usize; 4],
    allpass_delays_right: [usize; 4],

    input_gain: f32,
    wet1: f32,
    wet2: f32,
    dry: f32,
}

impl Freeverb {
    /// Create a tank sized for 44.1 kHz
    pub fn new() -> Self {
        let mut reverb = Self {
            settings: FreeverbSettings::default(),
            sample_rate: 0.0,
            comb_left: std::array::from_fn(|i| CombFilter::new(COMB_DELAYS[i] + 1)),
            comb_right: std::array::from_fn(|i| CombFilter::new(COMB_DELAYS[i] + STEREO_SPREAD + 1)),
            allpass_left: std::array::from_fn(|i| AllpassFilter::new(ALLPASS_DELAYS[i] + 1)),
            allpass_right: std::array::from_fn(|i| {
                AllpassFilter::new(ALLPASS_DELAYS[i] + STEREO_SPREAD + 1)
            }),
            comb_delays_left: COMB_DELAYS,
            comb_delays_right: std::array::from_fn(|i| COMB_DELAYS[i] + STEREO_SPREAD),
            allpass_delays_left: ALLPASS_DELAYS,
            allpass_delays_right: std::array::from_fn(|i| ALLPASS_DELAYS[i] + STEREO_SPREAD),
            input_gain: INPUT_GAIN,
            wet1: 0.0,
            wet2: 0.0,
            dry: 0.0,
        };
        reverb.set_sample_rate(REFERENCE_SAMPLE_RATE);
        reverb
    }

    /// Current control values
    pub fn settings(&self) -> &FreeverbSettings {
        &self.settings
    }

    /// Replace the control values and recompute coefficients
    pub fn set_settings(&mut self, settings: FreeverbSettings) {
        self.settings = settings;
        self.update_coefficients();
    }

    /// Resize all filter buffers for a new sample rate and clear them
    ///
    /// A repeat call with the same rate only clears.
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        if sample_rate <= 0.0 {
            return;
        }
        if sample_rate != self.sample_rate {
            self.sample_rate = sample_rate;
            let scale = sample_rate / REFERENCE_SAMPLE_RATE;
            let scaled = |delay: usize| ((delay as f64 * scale) as usize).max(1);

            for i in 0..8 {
                self.comb_delays_left[i] = scaled(COMB_DELAYS[i]);
                self.comb_delays_right[i] = scaled(COMB_DELAYS[i] + STEREO_SPREAD);
                self.comb_left[i] = CombFilter::new(self.comb_delays_left[i] + 1);
                self.comb_right[i] = CombFilter::new(self.comb_delays_right[i] + 1);
            }
            for i in 0..4 {
                self.allpass_delays_left[i] = scaled(ALLPASS_DELAYS[i]);
                self.allpass_delays_right[i] = scaled(ALLPASS_DELAYS[i] + STEREO_SPREAD);
                self.allpass_left[i] = AllpassFilter::new(self.allpass_delays_left[i] + 1);
                self.allpass_right[i] = AllpassFilter::new(self.allpass_delays_right[i] + 1);
            }
        }
        self.update_coefficients();
        self.clear();
    }

    /// Silence the tank
    pub fn clear(&mut self) {
        self.comb_left.iter_mut().for_each(CombFilter::clear);
        self.comb_right.iter_mut().for_each(CombFilter::clear);
        self.allpass_left.iter_mut().for_each(AllpassFilter::clear);
        self.allpass_right.iter_mut().for_each(AllpassFilter::clear);
    }

    /// Update filter coefficients and gains from the control values
    fn update_coefficients(&mut self) {
        let s = self.settings;
        let d = FreeverbSettings::default();
        let room_size = clamp_or(s.room_size, 0.0, 1.0, d.room_size);
        let damping = clamp_or(s.damping, 0.0, 1.0, d.damping);
        let width = clamp_or(s.width, 0.0, 1.0, d.width);
        let wet = clamp_or(s.wet_level, 0.0, 1.0, d.wet_level) * WET_SCALE;

        let (feedback, damp) = if s.is_frozen() {
            (1.0, 0.0)
        } else {
            (room_size * ROOM_SCALE + ROOM_OFFSET, damping * DAMP_SCALE)
        };
        self.input_gain = if s.is_frozen() { 0.0 } else { INPUT_GAIN };

        for comb in self.comb_left.iter_mut().chain(self.comb_right.iter_mut()) {
            comb.set_coefficients(feedback, 1.0 - damp, damp);
        }

        // At width 0 both sides get the mono sum, at 1 full separation
        self.wet1 = 0.5 * wet * (1.0 + width);
        self.wet2 = 0.5 * wet * (1.0 - width);
        self.dry = clamp_or(s.dry_level, 0.0, 1.0, d.dry_level) * DRY_SCALE;
    }

    /// Process one channel of audio through the left tank
    pub fn process_mono(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            let input = *sample * self.input_gain;

            let mut output = 0.0;
            for (comb, &delay) in self.comb_left.iter_mut().zip(&self.comb_delays_left) {
                output += comb.process(input, delay);
            }
            for (allpass, &delay) in self.allpass_left.iter_mut().zip(&self.allpass_delays_left) {
                output = allpass.process(output, delay);
            }

            *sample = output * self.wet1 + *sample * self.dry;
        }
    }

    /// Process a stereo pair in place
    pub fn process_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let input = (*l + *r) * self.input_gain;

            let mut out_l = 0.0;
            let mut out_r = 0.0;
            for j in 0..8 {
                out_l += self.comb_left[j].process(input, self.comb_delays_left[j]);
                out_r += self.comb_right[j].process(input, self.comb_delays_right[j]);
            }
            for j in 0..4 {
                out_l = self.allpass_left[j].process(out_l, self.allpass_delays_left[j]);
                out_r = self.allpass_right[j].process(out_r, self.allpass_delays_right[j]);
            }

            let dry_l = *l;
            let dry_r = *r;
            *l = out_l * self.wet1 + out_r * self.wet2 + dry_l * self.dry;
            *r = out_r * self.wet1 + out_l * self.wet2 + dry_r * self.dry;
        }
    }
}

impl Default for Freeverb {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Reverb Effect
// ============================================================================

/// Reverb effect using the Freeverb algorithm
#[derive(Debug, Clone)]
pub struct ReverbEffect {
    params: EffectParams,
    /// Raw parameter values in table order
    values: [f32; 6],
    tank: Freeverb,
}

impl ReverbEffect {
    /// Create a reverb with default parameters
    pub fn new() -> Self {
        let mut effect = Self {
            params: EffectParams::default(),
            values: std::array::from_fn(|i| REVERB_PARAMETERS[i].default),
            tank: Freeverb::new(),
        };
        effect.push_settings();
        effect
    }

    /// Current settings derived from the parameter values
    pub fn settings(&self) -> FreeverbSettings {
        FreeverbSettings {
            room_size: self.values[param::ROOM_SIZE],
            damping: self.values[param::DAMPING],
            wet_level: self.values[param::WET_LEVEL],
            dry_level: self.values[param::DRY_LEVEL],
            width: self.values[param::WIDTH],
            freeze: self.values[param::FREEZE],
        }
    }

    fn push_settings(&mut self) {
        let settings = self.settings();
        self.tank.set_settings(settings);
    }
}

impl Default for ReverbEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for ReverbEffect {
    impl_effect_common!(EffectType::Reverb, REVERB_PARAMETERS);

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.tank.set_sample_rate(spec.sample_rate);
    }

    fn process(&mut self, block: &mut AudioBlock<'_>) {
        if !self.params.enabled || block.is_empty() {
            return;
        }

        match block.stereo_mut() {
            Some((left, right)) => self.tank.process_stereo(left, right),
            None => self.tank.process_mono(block.channel_mut(0)),
        }
    }

    fn reset(&mut self) {
        self.tank.clear();
    }

    fn set_parameter(&mut self, index: usize, value: f32) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
            self.push_settings();
        }
    }

    fn get_parameter(&self, index: usize) -> f32 {
        self.values.get(index).copied().unwrap_or(0.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
