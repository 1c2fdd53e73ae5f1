//! Granular Engine
//!
//! Live input is summed to mono and written into a short history ring. Grains
//! are short windows of that history replayed at their own pitch and pan; the
//! sum of active grains is panned to stereo and sent through a Freeverb stage.
//!
//! Grain size and pitch are held to their documented ranges when a grain
//! starts. Within them a grain's read head trails the write cursor by at most
//! `MIN_LAG + 0.375 s`, which a history longer than 0.75 s always covers; a
//! shorter history caps the lag at half the ring and a fast grain may then
//! overtake the write cursor.
//!
//! Grains live in a fixed pool reserved up front. A spawn reuses the first
//! inactive slot, grows the pool while it is under capacity, and is dropped
//! silently once every slot is busy.

use super::audio_buffer::{AudioBlock, ProcessSpec};
use super::interpolation::{self, HERMITE_SUPPORT};
use super::params::{clamp_or, ParameterDescriptor};
use super::reverb::{Freeverb, FreeverbSettings};
use crate::config::EngineConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Output scaling of the grain sum
pub const GRAIN_GAIN: f32 = 0.25;

/// Smallest distance between a grain's read head and the write cursor
const MIN_LAG: f64 = HERMITE_SUPPORT as f64;

/// Parameter indices
pub mod param {
    pub const GRAIN_SIZE: usize = 0;
    pub const SPREAD: usize = 1;
    pub const PITCH: usize = 2;
    pub const DENSITY: usize = 3;
    pub const REVERB_SIZE: usize = 4;
    pub const REVERB_DAMPING: usize = 5;
    pub const REVERB_WIDTH: usize = 6;
    pub const REVERB_MIX: usize = 7;
}

/// Granular parameter table
pub const GRANULAR_PARAMETERS: &[ParameterDescriptor] = &[
    ParameterDescriptor::new("Grain Size", "ms", 10.0, 500.0, 100.0, "GrainSize"),
    ParameterDescriptor::new("Spread", "%", 0.0, 1.0, 0.5, "Spread"),
    ParameterDescriptor::new("Pitch", "st", -12.0, 12.0, 0.0, "Pitch"),
    ParameterDescriptor::new("Density", "", 0.0, 1.0, 0.002, "Density"),
    ParameterDescriptor::new("Reverb Size", "%", 0.0, 1.0, 0.5, "ReverbSize"),
    ParameterDescriptor::new("Reverb Damping", "%", 0.0, 1.0, 0.5, "ReverbDamping"),
    ParameterDescriptor::new("Reverb Width", "%", 0.0, 1.0, 1.0, "ReverbWidth"),
    ParameterDescriptor::new("Reverb Mix", "%", 0.0, 1.0, 0.3, "ReverbMix"),
];

/// One grain of replayed history
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grain {
    /// Ring position of the grain's first sample
    pub start_position: f64,
    /// Length in source samples
    pub length: f64,
    /// Source samples advanced per output sample
    pub pitch_ratio: f64,
    /// 0 = hard left, 1 = hard right
    pub pan: f32,
    /// Source samples consumed so far
    pub position: f64,
    pub active: bool,
}

/// Standalone granular engine with reverb
#[derive(Debug, Clone)]
pub struct GranularEngine {
    values: [f32; 8],
    capacity: usize,
    grains: Vec<Grain>,
    history_seconds: f64,
    history: Vec<f32>,
    write_pos: usize,
    sample_rate: f64,
    rng: StdRng,
    reverb: Freeverb,
}

impl GranularEngine {
    /// Create an engine seeded from the OS
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Create an engine with a fixed seed
    pub fn with_seed(config: &EngineConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &EngineConfig, rng: StdRng) -> Self {
        let capacity = config.grain_capacity.max(1);
        let mut engine = Self {
            values: std::array::from_fn(|i| GRANULAR_PARAMETERS[i].default),
            capacity,
            grains: Vec::with_capacity(capacity),
            history_seconds: config.grain_history_seconds,
            history: Vec::new(),
            write_pos: 0,
            sample_rate: config.default_spec.sample_rate,
            rng,
            reverb: Freeverb::new(),
        };
        engine.reverb.set_settings(engine.reverb_settings());
        engine
    }

    /// Parameter table
    pub fn parameter_descriptors(&self) -> &'static [ParameterDescriptor] {
        GRANULAR_PARAMETERS
    }

    /// Set a parameter by index; unknown indices are ignored
    pub fn set_parameter(&mut self, index: usize, value: f32) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }

    /// Get a parameter by index; unknown indices read 0.0
    pub fn get_parameter(&self, index: usize) -> f32 {
        self.values.get(index).copied().unwrap_or(0.0)
    }

    /// Pool capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots allocated so far (active or not)
    pub fn pool_len(&self) -> usize {
        self.grains.len()
    }

    /// Number of grains currently playing
    pub fn active_grains(&self) -> usize {
        self.grains.iter().filter(|g| g.active).count()
    }

    /// Reverb controls derived from the parameter values
    pub fn reverb_settings(&self) -> FreeverbSettings {
        let mix = clamp_or(self.values[param::REVERB_MIX], 0.0, 1.0, 0.0);
        FreeverbSettings {
            room_size: self.values[param::REVERB_SIZE],
            damping: self.values[param::REVERB_DAMPING],
            width: self.values[param::REVERB_WIDTH],
            wet_level: mix,
            dry_level: 1.0 - mix,
            freeze: 0.0,
        }
    }

    /// Size the history ring and reverb for a playback configuration
    pub fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        let len = ((self.history_seconds * spec.sample_rate).ceil() as usize).max(HERMITE_SUPPORT * 2);
        if self.history.len() != len {
            self.history = vec![0.0; len];
        }
        self.reverb.set_sample_rate(spec.sample_rate);
        self.reset();
        debug!(history = len, capacity = self.capacity, "granular engine prepared");
    }

    /// Silence history, grains and reverb
    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.write_pos = 0;
        for grain in &mut self.grains {
            grain.active = false;
        }
        self.reverb.clear();
    }

    /// Start a grain; dropped when every slot is busy
    fn spawn_grain(&mut self) {
        let len = self.history.len() as f64;
        let size_ms =
            GRANULAR_PARAMETERS[param::GRAIN_SIZE].clamp(self.values[param::GRAIN_SIZE]) as f64;
        let length = (size_ms * 0.001 * self.sample_rate).max(1.0);

        let spread = clamp_or(self.values[param::SPREAD], 0.0, 1.0, 0.0);
        let jitter: f32 = self.rng.gen_range(-1.0..=1.0);
        let pitch = GRANULAR_PARAMETERS[param::PITCH].clamp(self.values[param::PITCH]);
        let semitones = pitch + jitter * spread * 12.0;
        let pitch_ratio = 2f64.powf(semitones as f64 / 12.0);
        let pan: f32 = self.rng.gen_range(0.0..=1.0);

        // A faster grain gains on the write cursor by length * (1 - 1/ratio)
        let catch_up = (length * (1.0 - 1.0 / pitch_ratio)).max(0.0);
        let lag = (MIN_LAG + catch_up).min(len * 0.5);
        let newest = self.write_pos as f64 - 1.0;
        let grain = Grain {
            start_position: newest - lag,
            length,
            pitch_ratio,
            pan,
            position: 0.0,
            active: true,
        };

        if let Some(slot) = self.grains.iter_mut().find(|g| !g.active) {
            *slot = grain;
        } else if self.grains.len() < self.capacity {
            self.grains.push(grain);
        }
    }

    /// Replace the block with the granular output
    pub fn process(&mut self, block: &mut AudioBlock<'_>) {
        if block.is_empty() {
            return;
        }
        if self.history.is_empty() {
            let spec = ProcessSpec::new(self.sample_rate, block.num_samples(), block.num_channels());
            self.prepare(&spec);
        }

        let settings = self.reverb_settings();
        if settings != *self.reverb.settings() {
            self.reverb.set_settings(settings);
        }
        let density = clamp_or(self.values[param::DENSITY], 0.0, 1.0, 0.0);
        let channels = block.num_channels();
        let ring_len = self.history.len();

        for frame in 0..block.num_samples() {
            let mono: f32 = (0..channels).map(|ch| block.get(frame, ch)).sum();
            self.history[self.write_pos] = mono;
            self.write_pos = (self.write_pos + 1) % ring_len;

            if density > 0.0 && self.rng.gen::<f32>() < density {
                self.spawn_grain();
            }

            let mut left = 0.0;
            let mut right = 0.0;
            for grain in self.grains.iter_mut().filter(|g| g.active) {
                let sample =
                    interpolation::read_hermite(&self.history, grain.start_position + grain.position);
                left += sample * (1.0 - grain.pan);
                right += sample * grain.pan;

                grain.position += grain.pitch_ratio;
                if grain.position >= grain.length {
                    grain.active = false;
                }
            }

            if channels == 1 {
                block.set(frame, 0, (left + right) * GRAIN_GAIN);
            } else {
                block.set(frame, 0, left * GRAIN_GAIN);
                block.set(frame, 1, right * GRAIN_GAIN);
                for ch in 2..channels {
                    block.set(frame, ch, 0.0);
                }
            }
        }

        match block.stereo_mut() {
            Some((left, right)) => self.reverb.process_stereo(left, right),
            None => self.reverb.process_mono(block.channel_mut(0)),
        }
    }
}
