//! Spectral crossfade looping for steady material (pads, drones, noise).

use super::{Status, StrategyContext};
use crate::analysis::features::variance;
use crate::dsp::crossfade::{crossfade_in_place, fade_out_in_place, CurveShape, FadeLevels};
use crate::engine::AudioBuffer;
use crate::error::Result;

#[derive(Debug)]
pub struct SpectralCrossFade<'a> {
    pub(super) ctx: StrategyContext<'a>,
    pub(super) status: Status,
}

impl<'a> SpectralCrossFade<'a> {
    pub fn new(ctx: StrategyContext<'a>) -> Self {
        Self {
            ctx,
            status: Status::default(),
        }
    }

    /// Variance of the per-frame spectral centroid, in Hz²
    pub fn centroid_variance(&self) -> Result<f64> {
        let audio = self.ctx.audio;
        let centroid = self
            .ctx
            .analysis
            .spectral_centroid(audio.mono_downmix(), audio.sample_rate())?;
        Ok(variance(&centroid))
    }

    pub(super) fn assess(&mut self) -> Result<bool> {
        let spread = self.centroid_variance()?;
        let threshold = self.ctx.settings.centroid_variance_threshold;
        tracing::debug!(centroid_variance = spread, threshold, "spectral stability");
        Ok(spread < threshold)
    }

    pub(super) fn build(&self) -> Result<AudioBuffer> {
        let audio = self.ctx.audio;
        let sr = audio.sample_rate();
        let settings = self.ctx.settings;

        let mut channels = audio.samples().to_vec();
        crossfade_in_place(
            &mut channels,
            sr,
            settings.crossfade_ms.min(audio.duration_ms() / 3),
            CurveShape::EqualPower,
            FadeLevels::default(),
        )?;
        fade_out_in_place(&mut channels, sr, settings.fade_out_ms, FadeLevels::default())?;
        AudioBuffer::new(channels, sr)
    }
}
