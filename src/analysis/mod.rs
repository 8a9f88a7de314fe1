//! Signal Analysis Module
//!
//! Everything the loop strategies need to know about a signal goes through the
//! [`SignalAnalysis`] trait, so the spectral backend can be swapped without
//! touching strategy code. [`SpectralAnalyzer`] is the built-in backend.

pub mod analyzer;
pub mod beat;
pub mod features;
pub mod mel;
pub mod onset;
pub mod stft;

pub use analyzer::{AnalyzerSettings, SpectralAnalyzer};
pub use beat::BeatTrack;

use crate::error::Result;

/// Frames of significant spectral change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transients {
    /// Ordered frame indices
    pub frames: Vec<usize>,
    /// Samples per analysis frame
    pub hop_length: usize,
}

impl Transients {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Sample offset of the transient at `index`
    pub fn sample_offset(&self, index: usize) -> Option<usize> {
        self.frames.get(index).map(|f| f * self.hop_length)
    }
}

/// Spectral analysis capabilities used by the loop strategies.
///
/// All inputs are mono signals. Implementations must be shareable across
/// threads; one instance serves every strategy of an orchestrator.
pub trait SignalAnalysis: Send + Sync {
    /// Estimate tempo and ordered beat times
    fn beat_track(&self, mono: &[f32], sample_rate: u32) -> Result<BeatTrack>;

    /// Onset positions as ordered sample offsets
    fn onset_detect(&self, mono: &[f32], sample_rate: u32) -> Result<Vec<usize>>;

    /// Transient frames from combined onset strength and spectral flux
    fn transients(&self, mono: &[f32], sample_rate: u32) -> Result<Transients>;

    /// Mel power spectrogram indexed `[frame][mel band]`
    fn mel_spectrogram(
        &self,
        segment: &[f32],
        sample_rate: u32,
        n_fft: usize,
        hop_length: usize,
    ) -> Result<Vec<Vec<f32>>>;

    /// Per-frame spectral centroid in Hz
    fn spectral_centroid(&self, mono: &[f32], sample_rate: u32) -> Result<Vec<f32>>;

    /// Per-frame spectral flatness in [0, 1]
    fn spectral_flatness(&self, mono: &[f32], sample_rate: u32) -> Result<Vec<f32>>;
}
