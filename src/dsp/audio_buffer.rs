//! Audio containers for block processing
//!
//! `AudioBlock` is the in-place, non-owning view every effect processes.
//! `AudioBuffer` owns planar storage and lends blocks out of it; it backs the
//! offline renderer, engine scratch space and the tests.

use crate::error::{FxError, Result};

/// Maximum channel count a block can carry
pub const MAX_CHANNELS: usize = 8;

// ============================================================================
// Process Spec
// ============================================================================

/// Playback configuration negotiated at `prepare`
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProcessSpec {
    /// Sample rate in Hz
    pub sample_rate: f64,
    /// Largest block the host will pass to `process`
    pub max_block_size: usize,
    /// Channel count of every block
    pub num_channels: usize,
}

impl ProcessSpec {
    /// Create a new spec
    pub fn new(sample_rate: f64, max_block_size: usize, num_channels: usize) -> Self {
        Self {
            sample_rate,
            max_block_size,
            num_channels,
        }
    }

    /// Whether a block of this shape fits the prepared capacity
    pub fn covers(&self, num_channels: usize, num_samples: usize) -> bool {
        num_channels <= self.num_channels && num_samples <= self.max_block_size
    }

    /// Smallest spec that covers both this spec and the given block shape
    pub fn widened_to(&self, num_channels: usize, num_samples: usize) -> Self {
        Self {
            sample_rate: self.sample_rate,
            max_block_size: self.max_block_size.max(num_samples),
            num_channels: self.num_channels.max(num_channels),
        }
    }
}

impl Default for ProcessSpec {
    fn default() -> Self {
        Self::new(44100.0, 512, 2)
    }
}

// ============================================================================
// Audio Block
// ============================================================================

/// Planar, in-place view over caller-provided channel storage
///
/// All channels expose the same length: the shortest slice handed in.
/// Channels beyond `MAX_CHANNELS` are ignored.
pub struct AudioBlock<'a> {
    channels: [&'a mut [f32]; MAX_CHANNELS],
    num_channels: usize,
    num_samples: usize,
}

impl<'a> AudioBlock<'a> {
    /// Wrap a set of channel slices
    pub fn new<I>(channels: I) -> Self
    where
        I: IntoIterator<Item = &'a mut [f32]>,
    {
        let mut slots: [&'a mut [f32]; MAX_CHANNELS] = Default::default();
        let mut num_channels = 0;
        let mut num_samples = usize::MAX;

        for channel in channels.into_iter().take(MAX_CHANNELS) {
            num_samples = num_samples.min(channel.len());
            slots[num_channels] = channel;
            num_channels += 1;
        }

        if num_channels == 0 {
            num_samples = 0;
        }

        Self {
            channels: slots,
            num_channels,
            num_samples,
        }
    }

    /// Number of channels
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Number of samples per channel
    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// True when there is nothing to process
    pub fn is_empty(&self) -> bool {
        self.num_channels == 0 || self.num_samples == 0
    }

    /// Read-only access to one channel
    pub fn channel(&self, channel: usize) -> &[f32] {
        &self.channels[channel][..self.num_samples]
    }

    /// Mutable access to one channel
    pub fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        let len = self.num_samples;
        &mut self.channels[channel][..len]
    }

    /// Mutable access to the first two channels at once
    ///
    /// Returns `None` for mono blocks.
    pub fn stereo_mut(&mut self) -> Option<(&mut [f32], &mut [f32])> {
        if self.num_channels < 2 {
            return None;
        }
        let len = self.num_samples;
        let (left, right) = self.channels.split_at_mut(1);
        Some((&mut left[0][..len], &mut right[0][..len]))
    }

    /// Get a sample, or 0.0 when out of range
    pub fn get(&self, frame: usize, channel: usize) -> f32 {
        if frame < self.num_samples && channel < self.num_channels {
            self.channels[channel][frame]
        } else {
            0.0
        }
    }

    /// Set a sample; out-of-range writes are ignored
    pub fn set(&mut self, frame: usize, channel: usize, value: f32) {
        if frame < self.num_samples && channel < self.num_channels {
            self.channels[channel][frame] = value;
        }
    }

    /// Silence every channel
    pub fn clear(&mut self) {
        for channel in 0..self.num_channels {
            self.channel_mut(channel).fill(0.0);
        }
    }

    /// Copy the block's contents into an owned buffer
    pub fn to_buffer(&self, sample_rate: f64) -> AudioBuffer {
        let samples = (0..self.num_channels)
            .map(|ch| self.channel(ch).to_vec())
            .collect();
        AudioBuffer {
            samples,
            sample_rate,
        }
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Owned planar audio buffer
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    /// One vector per channel
    samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    sample_rate: f64,
}

impl AudioBuffer {
    /// Create a silent buffer
    pub fn new(num_channels: usize, num_samples: usize, sample_rate: f64) -> Self {
        Self {
            samples: vec![vec![0.0; num_samples]; num_channels],
            sample_rate,
        }
    }

    /// Create a buffer from planar channel data
    pub fn from_channels(samples: Vec<Vec<f32>>, sample_rate: f64) -> Result<Self> {
        if let Some(first) = samples.first() {
            if samples.iter().any(|ch| ch.len() != first.len()) {
                return Err(FxError::UnsupportedFormat {
                    details: "channels have different lengths".to_string(),
                });
            }
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Create a buffer from interleaved samples `[L0, R0, L1, R1, ...]`
    pub fn from_interleaved(interleaved: &[f32], num_channels: usize, sample_rate: f64) -> Result<Self> {
        if num_channels == 0 || interleaved.len() % num_channels != 0 {
            return Err(FxError::UnsupportedFormat {
                details: format!(
                    "Sample count {} is not divisible by channel count {}",
                    interleaved.len(),
                    num_channels
                ),
            });
        }
        let num_samples = interleaved.len() / num_channels;
        let mut buffer = Self::new(num_channels, num_samples, sample_rate);
        for (frame, chunk) in interleaved.chunks_exact(num_channels).enumerate() {
            for (channel, &sample) in chunk.iter().enumerate() {
                buffer.samples[channel][frame] = sample;
            }
        }
        Ok(buffer)
    }

    /// Create a sine tone on every channel
    pub fn sine(
        frequency: f64,
        amplitude: f32,
        num_channels: usize,
        num_samples: usize,
        sample_rate: f64,
    ) -> Self {
        let tone: Vec<f32> = (0..num_samples)
            .map(|i| {
                let t = i as f64 / sample_rate;
                amplitude * (2.0 * std::f64::consts::PI * frequency * t).sin() as f32
            })
            .collect();
        Self {
            samples: vec![tone; num_channels],
            sample_rate,
        }
    }

    /// Number of channels
    pub fn num_channels(&self) -> usize {
        self.samples.len()
    }

    /// Number of samples per channel
    pub fn num_samples(&self) -> usize {
        self.samples.first().map_or(0, Vec::len)
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Read-only access to one channel
    pub fn channel(&self, channel: usize) -> &[f32] {
        &self.samples[channel]
    }

    /// Mutable access to one channel
    pub fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        &mut self.samples[channel]
    }

    /// Borrow the whole buffer as a processable block
    pub fn as_block(&mut self) -> AudioBlock<'_> {
        AudioBlock::new(self.samples.iter_mut().map(|ch| ch.as_mut_slice()))
    }

    /// Borrow `len` samples starting at `start` as a block
    ///
    /// The range is clipped to the buffer length.
    pub fn block_range(&mut self, start: usize, len: usize) -> AudioBlock<'_> {
        let total = self.num_samples();
        let start = start.min(total);
        let end = (start + len).min(total);
        AudioBlock::new(self.samples.iter_mut().map(move |ch| &mut ch[start..end]))
    }

    /// Flatten to interleaved samples
    pub fn to_interleaved(&self) -> Vec<f32> {
        let channels = self.num_channels();
        let mut out = Vec::with_capacity(channels * self.num_samples());
        for frame in 0..self.num_samples() {
            for channel in &self.samples {
                out.push(channel[frame]);
            }
        }
        out
    }

    /// Peak absolute sample value on a channel
    pub fn peak(&self, channel: usize) -> f32 {
        self.samples
            .get(channel)
            .map_or(0.0, |ch| ch.iter().fold(0.0f32, |acc, &s| acc.max(s.abs())))
    }

    /// RMS level in dB for a channel
    pub fn rms_db(&self, channel: usize) -> f64 {
        let Some(samples) = self.samples.get(channel) else {
            return f64::NEG_INFINITY;
        };
        if samples.is_empty() {
            return f64::NEG_INFINITY;
        }

        let sum_sq: f64 = samples.iter().map(|&s| (s as f64).powi(2)).sum();
        let rms = (sum_sq / samples.len() as f64).sqrt();

        if rms > 0.0 {
            20.0 * rms.log10()
        } else {
            f64::NEG_INFINITY
        }
    }

    /// Check that the buffer holds usable audio (no NaN/Inf, no runaway gain)
    pub fn is_valid(&self) -> bool {
        self.samples
            .iter()
            .flatten()
            .all(|&s| s.is_finite() && s.abs() <= 16.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer() {
        let buf = AudioBuffer::new(2, 1000, 44100.0);
        assert_eq!(buf.num_channels(), 2);
        assert_eq!(buf.num_samples(), 1000);
        assert_eq!(buf.sample_rate(), 44100.0);
    }

    #[test]
    fn test_block_view_writes_through() {
        let mut buf = AudioBuffer::new(2, 16, 44100.0);
        {
            let mut block = buf.as_block();
            assert_eq!(block.num_channels(), 2);
            assert_eq!(block.num_samples(), 16);
            block.set(3, 1, 0.25);
            block.channel_mut(0)[0] = -0.5;
        }
        assert_eq!(buf.channel(1)[3], 0.25);
        assert_eq!(buf.channel(0)[0], -0.5);
    }

    #[test]
    fn test_block_uses_shortest_channel() {
        let mut left = vec![0.0f32; 8];
        let mut right = vec![0.0f32; 5];
        let block = AudioBlock::new([left.as_mut_slice(), right.as_mut_slice()]);
        assert_eq!(block.num_samples(), 5);
    }

    #[test]
    fn test_block_get_out_of_range() {
        let mut buf = AudioBuffer::new(1, 4, 44100.0);
        let mut block = buf.as_block();
        assert_eq!(block.get(10, 0), 0.0);
        assert_eq!(block.get(0, 3), 0.0);
        block.set(10, 0, 1.0);
        assert!(block.stereo_mut().is_none());
    }

    #[test]
    fn test_block_range_clips() {
        let mut buf = AudioBuffer::new(2, 10, 44100.0);
        let block = buf.block_range(8, 512);
        assert_eq!(block.num_samples(), 2);
    }

    #[test]
    fn test_interleaved_round_trip() {
        let interleaved = vec![0.1, -0.1, 0.2, -0.2, 0.3, -0.3];
        let buf = AudioBuffer::from_interleaved(&interleaved, 2, 48000.0).unwrap();
        assert_eq!(buf.channel(0), &[0.1, 0.2, 0.3]);
        assert_eq!(buf.channel(1), &[-0.1, -0.2, -0.3]);
        assert_eq!(buf.to_interleaved(), interleaved);
    }

    #[test]
    fn test_from_interleaved_rejects_ragged() {
        assert!(AudioBuffer::from_interleaved(&[0.0; 5], 2, 44100.0).is_err());
    }

    #[test]
    fn test_rms_db() {
        let buf = AudioBuffer::sine(441.0, 1.0, 1, 44100, 44100.0);
        // RMS of sine wave is 1/sqrt(2) = -3.01 dB
        assert!((buf.rms_db(0) - (-3.01)).abs() < 0.1);
    }

    #[test]
    fn test_is_valid() {
        let mut buf = AudioBuffer::new(1, 100, 44100.0);
        assert!(buf.is_valid());
        buf.channel_mut(0)[50] = f32::NAN;
        assert!(!buf.is_valid());
    }

    #[test]
    fn test_spec_widening() {
        let spec = ProcessSpec::new(48000.0, 256, 1);
        assert!(spec.covers(1, 256));
        assert!(!spec.covers(2, 128));
        let wide = spec.widened_to(2, 1024);
        assert_eq!(wide.num_channels, 2);
        assert_eq!(wide.max_block_size, 1024);
        assert_eq!(wide.sample_rate, 48000.0);
    }
}
