//! Multi-channel circular delay line
//!
//! One ring per channel sharing a single write cursor. Reads are fractional
//! and always measured backwards from the write cursor, so a read can never
//! land ahead of the most recently written sample as long as the requested
//! delay stays within `max_delay()`.

use super::interpolation::{self, HERMITE_SUPPORT};

/// Circular buffer of float samples, one ring per channel
#[derive(Debug, Clone, Default)]
pub struct DelayLine {
    rings: Vec<Vec<f32>>,
    write_pos: usize,
}

impl DelayLine {
    /// Create an unallocated delay line; call `prepare` before use
    pub fn new() -> Self {
        Self::default()
    }

    /// Size the rings for `max_delay_samples` plus the interpolation support
    ///
    /// Reallocates only when the shape changes; otherwise just clears.
    pub fn prepare(&mut self, num_channels: usize, max_delay_samples: usize) {
        let len = max_delay_samples + HERMITE_SUPPORT;
        if self.rings.len() != num_channels || self.len() != len {
            self.rings = vec![vec![0.0; len]; num_channels];
        }
        self.clear();
    }

    /// Ring length in samples
    pub fn len(&self) -> usize {
        self.rings.first().map_or(0, Vec::len)
    }

    /// True before `prepare`
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of channel rings
    pub fn num_channels(&self) -> usize {
        self.rings.len()
    }

    /// Longest delay that can be read without touching unwritten history
    pub fn max_delay(&self) -> usize {
        self.len().saturating_sub(HERMITE_SUPPORT)
    }

    /// Current write cursor
    pub fn write_position(&self) -> usize {
        self.write_pos
    }

    /// Raw ring contents for one channel
    pub fn ring(&self, channel: usize) -> &[f32] {
        &self.rings[channel]
    }

    /// Store a sample at the write cursor without advancing it
    #[inline]
    pub fn write(&mut self, channel: usize, sample: f32) {
        let pos = self.write_pos;
        if let Some(ring) = self.rings.get_mut(channel) {
            ring[pos] = sample;
        }
    }

    /// Move the write cursor forward by one frame
    #[inline]
    pub fn advance(&mut self) {
        let len = self.len();
        if len > 0 {
            self.write_pos = (self.write_pos + 1) % len;
        }
    }

    /// Linearly interpolated sample `delay` samples behind the write cursor
    #[inline]
    pub fn read_linear(&self, channel: usize, delay: f64) -> f32 {
        match self.rings.get(channel) {
            Some(ring) => interpolation::read_linear(ring, self.write_pos as f64 - delay),
            None => 0.0,
        }
    }

    /// Hermite-interpolated sample `delay` samples behind the write cursor
    #[inline]
    pub fn read_hermite(&self, channel: usize, delay: f64) -> f32 {
        match self.rings.get(channel) {
            Some(ring) => interpolation::read_hermite(ring, self.write_pos as f64 - delay),
            None => 0.0,
        }
    }

    /// Hermite read at an absolute ring position
    #[inline]
    pub fn read_at(&self, channel: usize, position: f64) -> f32 {
        match self.rings.get(channel) {
            Some(ring) => interpolation::read_hermite(ring, position),
            None => 0.0,
        }
    }

    /// Zero all history and rewind the write cursor
    pub fn clear(&mut self) {
        for ring in &mut self.rings {
            ring.fill(0.0);
        }
        self.write_pos = 0;
    }
}
