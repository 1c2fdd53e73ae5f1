//! Parameter descriptor tables
//!
//! Each effect exposes a fixed, ordered list of float parameters. The table is
//! static data resolved at compile time, so hosts and the state layer never
//! need to inspect an effect's concrete type to learn its parameters.

/// Static description of one float parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterDescriptor {
    /// Display name, e.g. "Feedback"
    pub name: &'static str,
    /// Unit label, e.g. "Hz", "dB", "%"
    pub label: &'static str,
    /// Lower bound of the documented range
    pub min: f32,
    /// Upper bound of the documented range
    pub max: f32,
    /// Value after construction
    pub default: f32,
    /// Attribute key used when saving state
    pub key: &'static str,
}

impl ParameterDescriptor {
    /// Build a descriptor
    pub const fn new(
        name: &'static str,
        label: &'static str,
        min: f32,
        max: f32,
        default: f32,
        key: &'static str,
    ) -> Self {
        Self {
            name,
            label,
            min,
            max,
            default,
            key,
        }
    }

    /// Whether a value lies inside the documented range
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }

    /// Clamp a value into the documented range; NaN maps to the default
    pub fn clamp(&self, value: f32) -> f32 {
        clamp_or(value, self.min, self.max, self.default)
    }

    /// Map a normalized 0..1 value onto the range; NaN maps to the default
    pub fn from_normalized(&self, normalized: f32) -> f32 {
        if normalized.is_nan() {
            return self.default;
        }
        self.min + normalized.clamp(0.0, 1.0) * (self.max - self.min)
    }

    /// Map a value in range onto 0..1
    pub fn to_normalized(&self, value: f32) -> f32 {
        let span = self.max - self.min;
        if span <= 0.0 {
            0.0
        } else {
            ((value - self.min) / span).clamp(0.0, 1.0)
        }
    }
}

/// Flatten descriptors into `[min, max, default, min, max, default, ...]`
pub fn flatten_ranges(descriptors: &[ParameterDescriptor]) -> Vec<f32> {
    descriptors
        .iter()
        .flat_map(|d| [d.min, d.max, d.default])
        .collect()
}

/// Clamp into `[min, max]`, mapping NaN to `fallback`
///
/// Used wherever a raw parameter value turns into a coefficient, so a NaN
/// written by a host never reaches filter or feedback state.
#[inline]
pub fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}
