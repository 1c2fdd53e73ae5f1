//! Engine configuration
//!
//! Buffer capacities and fixed tuning that are chosen once per host session.
//! Parsed from JSON text; every field has a default so partial documents are
//! accepted. The core never reads files itself.

use crate::dsp::audio_buffer::{ProcessSpec, MAX_CHANNELS};
use crate::error::{FxError, Result};
use serde::{Deserialize, Serialize};

/// Bounds for the time-stretch ring length
pub const TIME_STRETCH_SECONDS_RANGE: (f64, f64) = (2.0, 8.0);

/// Sizing and tuning for effects and engines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Delay ring capacity in seconds
    pub max_delay_seconds: f64,
    /// Initial time-stretch ring length in seconds
    pub time_stretch_seconds: f64,
    /// Time-stretch anti-alias lowpass cutoff in Hz
    pub anti_alias_hz: f64,
    /// Grain pool capacity
    pub grain_capacity: usize,
    /// Granular input history in seconds
    pub grain_history_seconds: f64,
    /// Spec used before the host calls prepare
    pub default_spec: ProcessSpec,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_delay_seconds: 2.0,
            time_stretch_seconds: 2.0,
            anti_alias_hz: 18000.0,
            grain_capacity: 32,
            grain_history_seconds: 2.0,
            default_spec: ProcessSpec::default(),
        }
    }
}

fn invalid(field: &str, value: impl ToString, expected: &str) -> FxError {
    FxError::InvalidConfig {
        field: field.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    }
}

impl EngineConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize as pretty JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every field against its allowed range
    pub fn validate(&self) -> Result<()> {
        if !(self.max_delay_seconds > 0.0 && self.max_delay_seconds <= 60.0) {
            return Err(invalid(
                "max_delay_seconds",
                self.max_delay_seconds,
                "greater than 0 and at most 60",
            ));
        }
        let (lo, hi) = TIME_STRETCH_SECONDS_RANGE;
        if !(lo..=hi).contains(&self.time_stretch_seconds) {
            return Err(invalid(
                "time_stretch_seconds",
                self.time_stretch_seconds,
                "2.0 to 8.0",
            ));
        }
        if !(self.anti_alias_hz > 0.0) {
            return Err(invalid("anti_alias_hz", self.anti_alias_hz, "greater than 0"));
        }
        if self.grain_capacity == 0 {
            return Err(invalid("grain_capacity", self.grain_capacity, "at least 1"));
        }
        if !(self.grain_history_seconds > 0.0 && self.grain_history_seconds <= 60.0) {
            return Err(invalid(
                "grain_history_seconds",
                self.grain_history_seconds,
                "greater than 0 and at most 60",
            ));
        }

        let spec = &self.default_spec;
        if !(spec.sample_rate > 0.0) {
            return Err(invalid("default_spec.sample_rate", spec.sample_rate, "greater than 0"));
        }
        if spec.max_block_size == 0 {
            return Err(invalid("default_spec.max_block_size", spec.max_block_size, "at least 1"));
        }
        if spec.num_channels == 0 || spec.num_channels > MAX_CHANNELS {
            return Err(invalid("default_spec.num_channels", spec.num_channels, "1 to 8"));
        }
        Ok(())
    }
}
