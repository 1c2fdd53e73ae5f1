//! Parameter smoothing
//!
//! Linear ramp toward a target value over a fixed time, used where a
//! parameter jump would otherwise be audible as zipper noise.

/// A value that ramps linearly to its target
#[derive(Debug, Clone)]
pub struct SmoothedValue {
    current: f32,
    target: f32,
    step: f32,
    steps_remaining: usize,
    ramp_samples: usize,
}

impl SmoothedValue {
    /// Create a value that starts settled at `initial`
    pub fn new(initial: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            step: 0.0,
            steps_remaining: 0,
            ramp_samples: 0,
        }
    }

    /// Set the ramp length from a duration and sample rate
    pub fn set_ramp(&mut self, sample_rate: f64, ramp_seconds: f64) {
        self.ramp_samples = (sample_rate * ramp_seconds).max(0.0) as usize;
        self.snap();
    }

    /// Start ramping toward a new target
    pub fn set_target(&mut self, target: f32) {
        if target == self.target {
            return;
        }
        self.target = target;
        if self.ramp_samples == 0 {
            self.snap();
            return;
        }
        self.steps_remaining = self.ramp_samples;
        self.step = (self.target - self.current) / self.ramp_samples as f32;
    }

    /// Jump straight to the target
    pub fn snap(&mut self) {
        self.current = self.target;
        self.steps_remaining = 0;
        self.step = 0.0;
    }

    /// Target value
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Whether a ramp is in progress
    pub fn is_smoothing(&self) -> bool {
        self.steps_remaining > 0
    }

    /// Advance one sample and return the new value
    #[inline]
    pub fn next_value(&mut self) -> f32 {
        if self.steps_remaining > 0 {
            self.steps_remaining -= 1;
            if self.steps_remaining == 0 {
                self.current = self.target;
            } else {
                self.current += self.step;
            }
        }
        self.current
    }
}
