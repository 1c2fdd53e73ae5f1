//! Time-Stretch Engine
//!
//! Tape-style stretching by circular-buffer resampling. Input is written to a
//! ring at the host rate and read back at `1/ratio` samples per sample, so
//! speed and pitch move together. The read cursor is kept as a lag behind the
//! write cursor:
//! - a slow reader whose lag outgrows the window re-syncs to the minimum lag
//! - a fast reader that catches up jumps back half a window
//!
//! The wet signal runs through a lowpass before the dry/wet mix to tame the
//! images resampling creates.

use super::audio_buffer::{AudioBlock, ProcessSpec, MAX_CHANNELS};
use super::delay_line::DelayLine;
use super::filter::{FilterType, StateVariableFilter};
use super::interpolation::HERMITE_SUPPORT;
use super::params::{clamp_or, ParameterDescriptor};
use crate::config::EngineConfig;
use tracing::{debug, warn};

/// Smallest distance between read and write cursors
const MIN_LAG: f64 = HERMITE_SUPPORT as f64;

/// Anti-alias cutoff ceiling as a fraction of the sample rate
const MAX_ANTI_ALIAS_RATIO: f64 = 0.45;

/// Anti-alias filter Q (Butterworth)
const ANTI_ALIAS_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Ring length ceiling in samples, reached only by very large blocks
pub const MAX_RING_LENGTH: usize = 1 << 22;

/// Number of note-division steps (1/1 through 1/64)
pub const NUM_DIVISIONS: usize = 7;

/// Parameter indices
pub mod param {
    pub const TIME_DIV: usize = 0;
    pub const PITCH: usize = 1;
    pub const MIX: usize = 2;
}

/// Time-stretch parameter table
pub const TIME_STRETCH_PARAMETERS: &[ParameterDescriptor] = &[
    ParameterDescriptor::new("Time Division", "", 0.0, 6.0, 0.0, "TimeDiv"),
    ParameterDescriptor::new("Pitch", "st", -12.0, 12.0, 0.0, "Pitch"),
    ParameterDescriptor::new("Mix", "%", 0.0, 100.0, 100.0, "Mix"),
];

/// Division labels in selector order
pub const DIVISION_LABELS: [&str; NUM_DIVISIONS] = ["1/1", "1/2", "1/4", "1/8", "1/16", "1/32", "1/64"];

/// Stretch ratio for a division index and pitch offset
///
/// `2^index / 2^(semitones/12)`; the read cursor advances `1/ratio` per sample.
/// The division rounds into 0..=6 and the pitch is held to ±12 semitones;
/// NaN reads as 1/1 and unison.
pub fn stretch_ratio(division: f32, semitones: f32) -> f64 {
    let last = (NUM_DIVISIONS - 1) as f32;
    let index = clamp_or(division.round(), 0.0, last, 0.0) as i32;
    let semitones = clamp_or(semitones, -12.0, 12.0, 0.0);
    2f64.powi(index) / 2f64.powf(semitones as f64 / 12.0)
}

/// Ring length needed for a ratio and block size, capped at `MAX_RING_LENGTH`
pub fn required_length(ratio: f64, max_block_size: usize) -> usize {
    let stretch = ratio.max(1.0 / ratio);
    let span = (max_block_size as f64 * stretch).ceil();
    let span = if span.is_finite() {
        span.min(MAX_RING_LENGTH as f64) as usize
    } else {
        MAX_RING_LENGTH
    };
    span.saturating_mul(2)
        .saturating_add(max_block_size)
        .saturating_add(HERMITE_SUPPORT)
        .min(MAX_RING_LENGTH)
}

/// Standalone time-stretch engine
#[derive(Debug, Clone)]
pub struct TimeStretchEngine {
    values: [f32; 3],
    ratio: f64,
    initial_seconds: f64,
    anti_alias_hz: f64,
    spec: Option<ProcessSpec>,
    line: DelayLine,
    /// Read cursor distance behind the write cursor
    lag: f64,
    filter: StateVariableFilter,
}

impl TimeStretchEngine {
    /// Create an engine sized from the configuration
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            values: std::array::from_fn(|i| TIME_STRETCH_PARAMETERS[i].default),
            ratio: 1.0,
            initial_seconds: config.time_stretch_seconds,
            anti_alias_hz: config.anti_alias_hz,
            spec: None,
            line: DelayLine::new(),
            lag: MIN_LAG,
            filter: StateVariableFilter::new(FilterType::LowPass),
        }
    }

    /// Parameter table
    pub fn parameter_descriptors(&self) -> &'static [ParameterDescriptor] {
        TIME_STRETCH_PARAMETERS
    }

    /// Set a parameter by index; unknown indices are ignored
    pub fn set_parameter(&mut self, index: usize, value: f32) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
            self.ratio = stretch_ratio(self.values[param::TIME_DIV], self.values[param::PITCH]);
        }
    }

    /// Get a parameter by index; unknown indices read 0.0
    pub fn get_parameter(&self, index: usize) -> f32 {
        self.values.get(index).copied().unwrap_or(0.0)
    }

    /// Current stretch ratio
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Ring length in samples (0 before prepare)
    pub fn ring_length(&self) -> usize {
        self.line.len()
    }

    /// Current read lag in samples
    pub fn lag(&self) -> f64 {
        self.lag
    }

    /// Size the ring and filter for a playback configuration
    pub fn prepare(&mut self, spec: &ProcessSpec) {
        let channels = spec.num_channels.clamp(1, MAX_CHANNELS);
        let initial = (self.initial_seconds * spec.sample_rate).ceil() as usize;
        let needed = required_length(self.ratio, spec.max_block_size);
        let len = initial.max(needed).min(MAX_RING_LENGTH);

        // DelayLine adds the interpolation support on top of the requested delay
        self.line.prepare(channels, len.saturating_sub(HERMITE_SUPPORT));
        let cutoff = self
            .anti_alias_hz
            .min(spec.sample_rate * MAX_ANTI_ALIAS_RATIO);
        self.filter
            .set_coefficients(cutoff, ANTI_ALIAS_Q, spec.sample_rate);
        self.filter.reset();
        self.lag = MIN_LAG;
        self.spec = Some(*spec);

        debug!(
            sample_rate = spec.sample_rate,
            ring_length = self.line.len(),
            "time-stretch prepared"
        );
    }

    /// Grow the ring if the current ratio needs more room than it has
    pub fn ensure_capacity(&mut self) {
        let Some(spec) = self.spec else {
            return;
        };
        let needed = required_length(self.ratio, spec.max_block_size);
        if needed > self.line.len() {
            debug!(needed, current = self.line.len(), "growing time-stretch ring");
            self.line
                .prepare(self.line.num_channels(), needed - HERMITE_SUPPORT);
            self.lag = MIN_LAG;
        }
    }

    /// Clear history, keep allocations
    pub fn reset(&mut self) {
        self.line.clear();
        self.filter.reset();
        self.lag = MIN_LAG;
    }

    /// Process a block in place
    pub fn process(&mut self, block: &mut AudioBlock<'_>) {
        if block.is_empty() {
            return;
        }

        let spec = self.spec.unwrap_or_default();
        if self.spec.is_none() || !spec.covers(block.num_channels(), block.num_samples()) {
            warn!(
                channels = block.num_channels(),
                samples = block.num_samples(),
                "block exceeds prepared spec, re-preparing time-stretch"
            );
            self.prepare(&spec.widened_to(block.num_channels(), block.num_samples()));
        }
        self.ensure_capacity();

        let channels = block.num_channels().min(self.line.num_channels());
        let speed = 1.0 / self.ratio;
        let mix = clamp_or(self.values[param::MIX] / 100.0, 0.0, 1.0, 1.0);
        let max_lag = (self.line.len() - HERMITE_SUPPORT) as f64;
        let half_window = (max_lag - MIN_LAG) * 0.5;

        for frame in 0..block.num_samples() {
            for ch in 0..channels {
                self.line.write(ch, block.get(frame, ch));
            }
            self.line.advance();

            if !self.lag.is_finite() || self.lag > max_lag {
                self.lag = MIN_LAG;
            } else if self.lag < MIN_LAG {
                self.lag += half_window;
            }
            let read_pos = self.line.write_position() as f64 - self.lag;

            for ch in 0..channels {
                let dry = block.get(frame, ch);
                let wet = self
                    .filter
                    .process_sample(ch, self.line.read_at(ch, read_pos));
                block.set(frame, ch, dry * (1.0 - mix) + wet * mix);
            }

            self.lag += 1.0 - speed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::audio_buffer::AudioBuffer;
    use approx::assert_abs_diff_eq;

    const SR: f64 = 44100.0;

    fn engine(division: f32, pitch: f32) -> TimeStretchEngine {
        let mut engine = TimeStretchEngine::new(&EngineConfig::default());
        engine.set_parameter(param::TIME_DIV, division);
        engine.set_parameter(param::PITCH, pitch);
        engine.set_parameter(param::MIX, 100.0);
        engine.prepare(&ProcessSpec::new(SR, 512, 1));
        engine
    }

    fn run_blocks(engine: &mut TimeStretchEngine, buffer: &mut AudioBuffer) {
        let total = buffer.num_samples();
        let mut start = 0;
        while start < total {
            engine.process(&mut buffer.block_range(start, 512));
            start += 512;
        }
    }

    fn zero_crossings(samples: &[f32]) -> usize {
        samples
            .windows(2)
            .filter(|w| (w[0] < 0.0) != (w[1] < 0.0))
            .count()
    }

    /// Peak normalized cross-correlation over a range of lags
    fn best_correlation(a: &[f32], b: &[f32], max_shift: usize) -> f32 {
        let mut best = 0.0f32;
        for shift in 0..max_shift {
            let n = a.len().min(b.len() - shift);
            let (mut ab, mut aa, mut bb) = (0.0f32, 0.0f32, 0.0f32);
            for i in 0..n {
                let x = a[i];
                let y = b[i + shift];
                ab += x * y;
                aa += x * x;
                bb += y * y;
            }
            if aa > 0.0 && bb > 0.0 {
                best = best.max(ab / (aa.sqrt() * bb.sqrt()));
            }
        }
        best
    }

    #[test]
    fn test_stretch_ratio() {
        assert_abs_diff_eq!(stretch_ratio(0.0, 0.0), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(stretch_ratio(1.0, 0.0), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(stretch_ratio(6.0, 0.0), 64.0, epsilon = 1e-12);
        assert_abs_diff_eq!(stretch_ratio(0.0, 12.0), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(stretch_ratio(9.0, 0.0), 64.0, epsilon = 1e-12);
    }

    #[test]
    fn test_stretch_ratio_holds_pitch_range() {
        assert_abs_diff_eq!(stretch_ratio(6.0, -1000.0), 128.0, epsilon = 1e-9);
        assert_abs_diff_eq!(stretch_ratio(0.0, 1000.0), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(stretch_ratio(f32::NAN, f32::NAN), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(stretch_ratio(-5.0, f32::NEG_INFINITY), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_required_length_is_capped() {
        assert_eq!(required_length(f64::INFINITY, 512), MAX_RING_LENGTH);
        assert_eq!(required_length(0.0, 512), MAX_RING_LENGTH);
        assert_eq!(required_length(1e12, usize::MAX / 2), MAX_RING_LENGTH);
        assert!(required_length(128.0, 512) < MAX_RING_LENGTH);
    }

    #[test]
    fn test_required_length() {
        assert_eq!(required_length(1.0, 512), 2 * 512 + 512 + 4);
        assert_eq!(required_length(0.5, 100), 2 * 200 + 100 + 4);
        assert_eq!(required_length(4.0, 100), 2 * 400 + 100 + 4);
    }

    #[test]
    fn test_prepare_uses_configured_length() {
        let engine = engine(0.0, 0.0);
        assert_eq!(engine.ring_length(), (2.0 * SR) as usize);
    }

    #[test]
    fn test_half_division_halves_frequency() {
        let mut engine = engine(1.0, 0.0);
        let input = AudioBuffer::sine(441.0, 0.5, 1, 44100, SR);
        let mut output = input.clone();
        run_blocks(&mut engine, &mut output);

        // Skip the filter's settling time
        let skip = 2048;
        let in_count = zero_crossings(&input.channel(0)[skip..]) as f64;
        let out_count = zero_crossings(&output.channel(0)[skip..]) as f64;
        let ratio = out_count / in_count;
        assert!(ratio > 0.45 && ratio < 0.55, "crossing ratio {ratio}");

        let reference = AudioBuffer::sine(220.5, 0.5, 1, 44100, SR);
        let corr = best_correlation(
            &output.channel(0)[skip..skip + 8192],
            &reference.channel(0),
            400,
        );
        assert!(corr > 0.9, "correlation {corr}");
    }

    #[test]
    fn test_slow_reader_resyncs() {
        let mut engine = TimeStretchEngine::new(&EngineConfig::default());
        engine.set_parameter(param::TIME_DIV, 6.0);
        engine.prepare(&ProcessSpec::new(8000.0, 256, 1));
        let max_lag = (engine.ring_length() - HERMITE_SUPPORT) as f64;

        let mut buffer = AudioBuffer::sine(100.0, 0.5, 1, 40000, 8000.0);
        let mut start = 0;
        while start < buffer.num_samples() {
            engine.process(&mut buffer.block_range(start, 256));
            assert!(engine.lag() <= max_lag + 1.0);
            assert!(engine.lag() >= MIN_LAG - 1.0);
            start += 256;
        }
        assert!(buffer.is_valid());
    }

    #[test]
    fn test_fast_reader_jumps_back() {
        let mut engine = engine(0.0, 12.0);
        assert_abs_diff_eq!(engine.ratio(), 0.5, epsilon = 1e-12);
        let mut buffer = AudioBuffer::sine(220.0, 0.5, 1, 8192, SR);
        run_blocks(&mut engine, &mut buffer);
        assert!(engine.lag() >= MIN_LAG - 1.0);
        assert!(buffer.is_valid());
    }

    #[test]
    fn test_ring_grows_for_extreme_ratio() {
        let mut engine = TimeStretchEngine::new(&EngineConfig::default());
        engine.prepare(&ProcessSpec::new(8000.0, 2048, 1));
        let before = engine.ring_length();

        engine.set_parameter(param::TIME_DIV, 6.0);
        engine.ensure_capacity();
        assert!(engine.ring_length() >= required_length(64.0, 2048));
        assert!(engine.ring_length() > before);
    }

    #[test]
    fn test_oversized_block_reprepares() {
        let mut engine = engine(1.0, 0.0);
        let mut buffer = AudioBuffer::sine(440.0, 0.5, 2, 2048, SR);
        engine.process(&mut buffer.as_block());
        assert!(buffer.is_valid());
    }

    #[test]
    fn test_extreme_parameters_keep_ring_bounded() {
        let mut engine = engine(0.0, 0.0);
        for (division, pitch) in [(1000.0, -1000.0), (-1000.0, 1000.0), (6.0, -60.0)] {
            engine.set_parameter(param::TIME_DIV, division);
            engine.set_parameter(param::PITCH, pitch);
            let mut buffer = AudioBuffer::sine(220.0, 0.5, 1, 512, SR);
            engine.process(&mut buffer.as_block());

            assert!(buffer.is_valid());
            assert!(engine.ratio() <= 128.0);
            assert!(engine.ring_length() <= required_length(128.0, 512));
            // Raw values are kept; only the derived ratio is limited
            assert_eq!(engine.get_parameter(param::PITCH), pitch);
        }
    }

    #[test]
    fn test_nan_pitch_does_not_stick() {
        let mut engine = engine(1.0, 0.0);
        engine.set_parameter(param::PITCH, f32::NAN);
        assert!(engine.ratio().is_finite());

        let mut buffer = AudioBuffer::sine(220.0, 0.5, 1, 512, SR);
        engine.process(&mut buffer.as_block());
        assert!(engine.lag().is_finite());

        engine.set_parameter(param::PITCH, 0.0);
        let mut buffer = AudioBuffer::sine(220.0, 0.5, 1, 512, SR);
        engine.process(&mut buffer.as_block());
        assert!(engine.lag().is_finite());
        assert!(buffer.is_valid());
    }

    #[test]
    fn test_non_finite_lag_resyncs() {
        let mut engine = engine(1.0, 0.0);
        engine.lag = f64::NAN;
        let mut buffer = AudioBuffer::sine(220.0, 0.5, 1, 512, SR);
        engine.process(&mut buffer.as_block());

        let max_lag = (engine.ring_length() - HERMITE_SUPPORT) as f64;
        assert!(engine.lag() >= MIN_LAG && engine.lag() <= max_lag);
        assert!(buffer.is_valid());
    }

    #[test]
    fn test_zero_mix_is_dry() {
        let mut engine = engine(2.0, 0.0);
        engine.set_parameter(param::MIX, 0.0);
        let original = AudioBuffer::sine(440.0, 0.5, 1, 512, SR);
        let mut buffer = original.clone();
        engine.process(&mut buffer.as_block());
        assert_eq!(buffer, original);
    }
}
