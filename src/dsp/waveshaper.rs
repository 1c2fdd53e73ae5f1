//! Waveshaper core
//!
//! Shared by distortion and saturation: drive maps exponentially in dB to an
//! input gain, the signal is shaped by `tanh(k * x)`, makeup gain `1/gain`
//! restores the level and a linear dry/wet mix blends in the pre-gain input.
//! Gain changes ramp over 50 ms.

use super::audio_buffer::{AudioBlock, ProcessSpec};
use super::params::{clamp_or, db_to_linear};
use super::smoothing::SmoothedValue;

/// Ramp time for drive changes
const GAIN_RAMP_SECONDS: f64 = 0.05;

/// Fixed shaping curve of one voicing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShaperCurve {
    /// Input gain in dB at full drive
    pub max_drive_db: f32,
    /// Steepness of the tanh curve
    pub k: f32,
}

/// Soft-clipping waveshaper with smoothed drive
#[derive(Debug, Clone)]
pub struct Waveshaper {
    curve: ShaperCurve,
    gain: SmoothedValue,
}

impl Waveshaper {
    /// Create a shaper with drive at `drive`
    pub fn new(curve: ShaperCurve, drive: f32) -> Self {
        let mut shaper = Self {
            curve,
            gain: SmoothedValue::new(1.0),
        };
        shaper.set_drive(drive);
        shaper.gain.snap();
        shaper
    }

    /// Input gain for a drive value
    pub fn drive_to_gain(&self, drive: f32) -> f32 {
        db_to_linear(clamp_or(drive, 0.0, 1.0, 0.0) * self.curve.max_drive_db)
    }

    /// Start ramping toward the gain for `drive`
    pub fn set_drive(&mut self, drive: f32) {
        let gain = self.drive_to_gain(drive);
        self.gain.set_target(gain);
    }

    /// Set the ramp length for the new sample rate and settle the gain
    pub fn prepare(&mut self, spec: &ProcessSpec) {
        self.gain.set_ramp(spec.sample_rate, GAIN_RAMP_SECONDS);
    }

    /// Settle any ramp in progress
    pub fn reset(&mut self) {
        self.gain.snap();
    }

    /// Shape one sample at a given input gain
    #[inline]
    pub fn shape(&self, input: f32, gain: f32) -> f32 {
        (self.curve.k * input * gain).tanh() / gain
    }

    /// Shape a block in place with dry/wet `mix`
    pub fn process(&mut self, block: &mut AudioBlock<'_>, mix: f32) {
        let mix = clamp_or(mix, 0.0, 1.0, 0.0);
        let channels = block.num_channels();

        for frame in 0..block.num_samples() {
            let gain = self.gain.next_value();
            for ch in 0..channels {
                let dry = block.get(frame, ch);
                let wet = self.shape(dry, gain);
                block.set(frame, ch, dry * (1.0 - mix) + wet * mix);
            }
        }
    }
}
