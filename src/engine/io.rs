//! Audio I/O for loopgen
//!
//! WAV import/export through `hound`, plus the raw PCM payload used when loops
//! travel between a job server and its workers. Audio keeps its native sample
//! rate: the engine is rate-agnostic, so nothing is resampled here.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use sha2::{Digest, Sha256};

use crate::engine::buffer::{AudioBuffer, ChannelLayout};
use crate::error::{LoopGenError, Result};

/// Size of the PCM payload header: sample rate and channel count, both i32 LE
const PCM_HEADER_LEN: usize = 8;

/// WAV export configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    /// Bit depth: 16, 24, or 32 (float)
    pub bit_depth: u16,
}

impl Default for WavFormat {
    fn default() -> Self {
        WavFormat { bit_depth: 16 }
    }
}

impl WavFormat {
    pub fn new(bit_depth: u16) -> Self {
        WavFormat { bit_depth }
    }

    /// 32-bit float, lossless with respect to the internal representation
    pub fn float() -> Self {
        WavFormat { bit_depth: 32 }
    }
}

// ============================================================================
// WAV files
// ============================================================================

/// Import a WAV file
///
/// # Errors
/// * `FileNotFound` - If the file does not exist
/// * `InvalidAudio` - If the file is not a valid WAV file or holds no samples
/// * `UnsupportedFormat` - If the audio has more than 2 channels
pub fn import_wav(path: &Path) -> Result<AudioBuffer> {
    if !path.exists() {
        return Err(LoopGenError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let reader = WavReader::open(path).map_err(|e| LoopGenError::InvalidAudio {
        reason: format!("Failed to open WAV file {}: {}", path.display(), e),
    })?;

    let spec = reader.spec();
    let channels = spec.channels as usize;
    let layout =
        ChannelLayout::from_count(channels).ok_or_else(|| LoopGenError::UnsupportedFormat {
            format: format!("{}-channel audio (only mono/stereo supported)", channels),
        })?;

    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    let buffer = AudioBuffer::from_interleaved(&interleaved, layout, spec.sample_rate)?;

    tracing::debug!(
        path = %path.display(),
        sample_rate = spec.sample_rate,
        channels,
        frames = buffer.len(),
        "imported wav"
    );

    Ok(buffer)
}

/// Export an AudioBuffer to a WAV file at its own sample rate
pub fn export_wav(buffer: &AudioBuffer, path: &Path, format: WavFormat) -> Result<()> {
    let spec = WavSpec {
        channels: buffer.channels() as u16,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: format.bit_depth,
        sample_format: if format.bit_depth == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    };

    let interleaved = buffer.to_interleaved();
    let mut writer = WavWriter::create(path, spec).map_err(wav_io_error)?;

    match format.bit_depth {
        16 => {
            for sample in interleaved {
                let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(scaled).map_err(wav_io_error)?;
            }
        }
        24 => {
            for sample in interleaved {
                // 24-bit stored as i32 in hound
                let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                writer.write_sample(scaled).map_err(wav_io_error)?;
            }
        }
        32 => {
            for sample in interleaved {
                writer.write_sample(sample).map_err(wav_io_error)?;
            }
        }
        _ => {
            return Err(LoopGenError::UnsupportedFormat {
                format: format!("{}-bit audio (only 16, 24, 32 supported)", format.bit_depth),
            });
        }
    }

    writer.finalize().map_err(wav_io_error)?;
    Ok(())
}

// ============================================================================
// PCM payloads
// ============================================================================

/// Serialize a buffer to the raw PCM payload format
///
/// Layout: `[sample_rate: i32 LE][channels: i32 LE]` followed by each channel's
/// samples in turn as f32 LE.
pub fn encode_pcm(buffer: &AudioBuffer) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(PCM_HEADER_LEN + buffer.channels() * buffer.len() * 4);
    bytes.extend_from_slice(&(buffer.sample_rate() as i32).to_le_bytes());
    bytes.extend_from_slice(&(buffer.channels() as i32).to_le_bytes());
    for channel in buffer.samples() {
        for sample in channel {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
    }
    bytes
}

/// Parse a raw PCM payload produced by [`encode_pcm`]
pub fn decode_pcm(bytes: &[u8]) -> Result<AudioBuffer> {
    if bytes.len() < PCM_HEADER_LEN {
        return Err(LoopGenError::InvalidAudio {
            reason: format!("PCM payload of {} bytes has no header", bytes.len()),
        });
    }

    let sample_rate = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let channels = i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if sample_rate <= 0 || !(1..=2).contains(&channels) {
        return Err(LoopGenError::InvalidAudio {
            reason: format!(
                "PCM header declares {} Hz with {} channels",
                sample_rate, channels
            ),
        });
    }

    let body = &bytes[PCM_HEADER_LEN..];
    let channels = channels as usize;
    if body.len() % (4 * channels) != 0 {
        return Err(LoopGenError::InvalidAudio {
            reason: format!(
                "PCM body of {} bytes does not divide into {} f32 channels",
                body.len(),
                channels
            ),
        });
    }

    let frames = body.len() / (4 * channels);
    let samples: Vec<f32> = body
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    let channel_data = samples.chunks(frames.max(1)).map(|c| c.to_vec()).collect();

    AudioBuffer::new(channel_data, sample_rate as u32)
}

/// Lowercase hex SHA-256 digest of a payload
pub fn checksum(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn wav_io_error(e: hound::Error) -> LoopGenError {
    LoopGenError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let read_error = |e: hound::Error| LoopGenError::InvalidAudio {
        reason: format!("Failed to read {}-bit samples: {}", bits_per_sample, e),
    };

    match (sample_format, bits_per_sample) {
        (SampleFormat::Float, _) => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(read_error),
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| v as f32 / 128.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(read_error),
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(read_error),
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8388608.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(read_error),
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 2147483648.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(read_error),
        (SampleFormat::Int, bits) => Err(LoopGenError::UnsupportedFormat {
            format: format!("{}-bit integer audio", bits),
        }),
    }
}
