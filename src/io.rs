//! WAV file I/O for the offline renderer
//!
//! The real-time core never touches the filesystem; this module is host glue
//! used by the CLI and by tests. Audio is read into 32-bit float at the
//! file's own sample rate.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::dsp::audio_buffer::{AudioBuffer, MAX_CHANNELS};
use crate::error::{FxError, Result};

/// Export format configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFormat {
    /// Bit depth: 16, 24, or 32 (float)
    pub bit_depth: u16,
}

impl Default for ExportFormat {
    fn default() -> Self {
        ExportFormat { bit_depth: 24 }
    }
}

impl ExportFormat {
    pub fn new(bit_depth: u16) -> Self {
        ExportFormat { bit_depth }
    }
}

fn audio_file_error(path: &Path, source: hound::Error) -> FxError {
    FxError::AudioFile {
        path: path.display().to_string(),
        source,
    }
}

/// Read a WAV file into an owned buffer
///
/// # Errors
/// * `AudioFile` - If the file cannot be opened or decoded
/// * `UnsupportedFormat` - If the channel count or bit depth is not handled
pub fn read_wav(path: &Path) -> Result<AudioBuffer> {
    let reader = WavReader::open(path).map_err(|e| audio_file_error(path, e))?;

    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 || channels > MAX_CHANNELS {
        return Err(FxError::UnsupportedFormat {
            details: format!("{channels}-channel audio (1 to {MAX_CHANNELS} supported)"),
        });
    }

    let samples = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)
        .map_err(|e| match e {
            ReadError::Hound(source) => audio_file_error(path, source),
            ReadError::Unsupported(details) => FxError::UnsupportedFormat { details },
        })?;

    AudioBuffer::from_interleaved(&samples, channels, f64::from(spec.sample_rate))
}

/// Write a buffer as a WAV file at the buffer's sample rate
pub fn write_wav(path: &Path, buffer: &AudioBuffer, format: ExportFormat) -> Result<()> {
    let sample_format = match format.bit_depth {
        16 | 24 => SampleFormat::Int,
        32 => SampleFormat::Float,
        other => {
            return Err(FxError::UnsupportedFormat {
                details: format!("{other}-bit audio (only 16, 24, 32 supported)"),
            })
        }
    };

    let spec = WavSpec {
        channels: buffer.num_channels() as u16,
        sample_rate: buffer.sample_rate().round() as u32,
        bits_per_sample: format.bit_depth,
        sample_format,
    };

    let mut writer = WavWriter::create(path, spec).map_err(|e| audio_file_error(path, e))?;
    let interleaved = buffer.to_interleaved();

    match format.bit_depth {
        16 => {
            for sample in interleaved {
                let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(scaled).map_err(|e| audio_file_error(path, e))?;
            }
        }
        24 => {
            for sample in interleaved {
                // 24-bit stored as i32 in hound
                let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                writer.write_sample(scaled).map_err(|e| audio_file_error(path, e))?;
            }
        }
        _ => {
            for sample in interleaved {
                writer.write_sample(sample).map_err(|e| audio_file_error(path, e))?;
            }
        }
    }

    writer.finalize().map_err(|e| audio_file_error(path, e))?;
    Ok(())
}

// ============================================================================
// Internal helper functions
// ============================================================================

enum ReadError {
    Hound(hound::Error),
    Unsupported(String),
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> std::result::Result<Vec<f32>, ReadError> {
    let scale = match (sample_format, bits_per_sample) {
        (SampleFormat::Float, _) => {
            return reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(ReadError::Hound)
        }
        (SampleFormat::Int, 8) => 128.0,
        (SampleFormat::Int, 16) => 32768.0,
        // 24-bit stored as i32 in hound
        (SampleFormat::Int, 24) => 8388608.0,
        (SampleFormat::Int, 32) => 2147483648.0,
        (SampleFormat::Int, bits) => {
            return Err(ReadError::Unsupported(format!("{bits}-bit integer audio")))
        }
    };

    reader
        .samples::<i32>()
        .map(|s| s.map(|v| v as f32 / scale))
        .collect::<std::result::Result<Vec<f32>, _>>()
        .map_err(ReadError::Hound)
}
