//! Audio Buffer
//!
//! Decoded PCM container shared by every stage of the loop engine. Buffers are
//! immutable once built: edits go through [`AudioBuffer::into_channels`] and a
//! rebuild, so the cached mono downmix can never go stale.

use std::sync::OnceLock;

use crate::error::{LoopGenError, Result};

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to linear amplitude
///
/// # Arguments
/// * `db` - Value in decibels
///
/// # Returns
/// Linear amplitude (0.0 to 1.0+ range)
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert a duration in milliseconds to a sample count (floor)
#[inline]
pub fn ms_to_samples(ms: u64, sample_rate: u32) -> usize {
    (sample_rate as u64 * ms / 1000) as usize
}

/// Convert a sample count to whole milliseconds (floor)
#[inline]
pub fn samples_to_ms(samples: usize, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    samples as u64 * 1000 / sample_rate as u64
}

/// Root mean square of a slice of samples (linear)
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Peak absolute value of a slice of samples (linear)
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
}

// ============================================================================
// Channel Layout
// ============================================================================

/// Audio channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelLayout {
    /// Single channel (mono)
    Mono,
    /// Two channels (stereo: left, right)
    Stereo,
}

impl ChannelLayout {
    /// Returns the number of channels for this layout
    pub fn num_channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }

    /// Create a ChannelLayout from a channel count
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(ChannelLayout::Mono),
            2 => Some(ChannelLayout::Stereo),
            _ => None,
        }
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Decoded 1- or 2-channel PCM audio
///
/// Stores audio as non-interleaved 32-bit float samples, one `Vec<f32>` per
/// channel, nominally in [-1.0, 1.0].
///
/// # Invariants
/// - 1 or 2 channels, all of equal non-zero length
/// - sample rate > 0
///
/// # Example
/// ```
/// use loopgen::engine::AudioBuffer;
///
/// let buffer = AudioBuffer::new(vec![vec![0.0; 44100], vec![0.0; 44100]], 44100).unwrap();
/// assert!(buffer.is_stereo());
/// assert_eq!(buffer.duration_ms(), 1000);
/// ```
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    samples: Vec<Vec<f32>>,
    sample_rate: u32,
    mono: OnceLock<Vec<f32>>,
}

impl AudioBuffer {
    /// Create a buffer from per-channel sample data
    ///
    /// # Errors
    /// `InvalidAudio` if the channel shape breaks an invariant, or
    /// `InvalidParameter` for a zero sample rate.
    pub fn new(samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(LoopGenError::invalid_parameter(
                "sample_rate",
                sample_rate,
                "> 0",
            ));
        }
        if ChannelLayout::from_count(samples.len()).is_none() {
            return Err(LoopGenError::InvalidAudio {
                reason: format!("{} channels (only mono/stereo supported)", samples.len()),
            });
        }
        let len = samples[0].len();
        if len == 0 {
            return Err(LoopGenError::InvalidAudio {
                reason: "audio contains no samples".to_string(),
            });
        }
        if samples.iter().any(|ch| ch.len() != len) {
            return Err(LoopGenError::InvalidAudio {
                reason: "channels have different lengths".to_string(),
            });
        }

        Ok(Self {
            samples,
            sample_rate,
            mono: OnceLock::new(),
        })
    }

    /// Create a mono buffer
    pub fn from_mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        Self::new(vec![samples], sample_rate)
    }

    /// Create a buffer from interleaved sample data
    ///
    /// # Arguments
    /// * `interleaved` - Interleaved sample data (L, R, L, R, ... for stereo)
    /// * `layout` - Channel configuration
    /// * `sample_rate` - Sample rate in Hz
    pub fn from_interleaved(
        interleaved: &[f32],
        layout: ChannelLayout,
        sample_rate: u32,
    ) -> Result<Self> {
        let num_channels = layout.num_channels();

        if interleaved.len() % num_channels != 0 {
            return Err(LoopGenError::InvalidAudio {
                reason: format!(
                    "Interleaved data length {} is not divisible by channel count {}",
                    interleaved.len(),
                    num_channels
                ),
            });
        }

        let num_samples = interleaved.len() / num_channels;
        let mut samples = vec![Vec::with_capacity(num_samples); num_channels];
        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Self::new(samples, sample_rate)
    }

    /// Convert the buffer to interleaved format (L, R, L, R, ... for stereo)
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut interleaved = Vec::with_capacity(self.channels() * self.len());
        for sample_idx in 0..self.len() {
            for channel in &self.samples {
                interleaved.push(channel[sample_idx]);
            }
        }
        interleaved
    }

    /// Number of channels (1 or 2)
    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Number of samples per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.samples[0].len()
    }

    /// Always false for a constructed buffer; present for API symmetry with `len`
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample rate in Hz
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn is_stereo(&self) -> bool {
        self.channels() == 2
    }

    /// Duration in whole milliseconds (`len * 1000 / sample_rate`, floored)
    #[inline]
    pub fn duration_ms(&self) -> u64 {
        samples_to_ms(self.len(), self.sample_rate)
    }

    /// Get immutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// All channels, planar
    #[inline]
    pub fn samples(&self) -> &[Vec<f32>] {
        &self.samples
    }

    /// Consume the buffer and hand back its channel data for editing
    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.samples
    }

    /// Channel-averaged mono signal, computed on first use and cached
    pub fn mono_downmix(&self) -> &[f32] {
        self.mono.get_or_init(|| {
            if self.samples.len() == 1 {
                return self.samples[0].clone();
            }
            let scale = 1.0 / self.samples.len() as f32;
            (0..self.len())
                .map(|i| self.samples.iter().map(|ch| ch[i]).sum::<f32>() * scale)
                .collect()
        })
    }

    /// Copy of the samples in `[start, end)` as a new buffer
    ///
    /// # Errors
    /// `InvalidParameter` if the range is empty or out of bounds
    pub fn slice(&self, start: usize, end: usize) -> Result<AudioBuffer> {
        if start >= end || end > self.len() {
            return Err(LoopGenError::invalid_parameter(
                "range",
                format!("{}..{}", start, end),
                format!("non-empty range within 0..{}", self.len()),
            ));
        }
        let samples = self
            .samples
            .iter()
            .map(|ch| ch[start..end].to_vec())
            .collect();
        AudioBuffer::new(samples, self.sample_rate)
    }

    /// Peak absolute sample value across all channels
    pub fn peak(&self) -> f32 {
        self.samples
            .iter()
            .map(|ch| peak(ch))
            .fold(0.0_f32, f32::max)
    }

    /// RMS level across all channels (linear)
    pub fn rms(&self) -> f32 {
        let total = (self.channels() * self.len()) as f64;
        let sum_squares: f64 = self
            .samples
            .iter()
            .flat_map(|ch| ch.iter())
            .map(|&s| (s as f64) * (s as f64))
            .sum();
        (sum_squares / total).sqrt() as f32
    }

    /// Check if all samples are finite (not NaN or Infinity)
    pub fn is_finite(&self) -> bool {
        self.samples
            .iter()
            .flat_map(|ch| ch.iter())
            .all(|s| s.is_finite())
    }
}

impl PartialEq for AudioBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.sample_rate == other.sample_rate && self.samples == other.samples
    }
}

// ============================================================================
// Tests
// ============================================================================
