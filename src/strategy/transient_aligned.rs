//! Transient-aligned looping: find a spectrally matching transient pair.

use super::{missing_points, Status, StrategyContext, StrategyId};
use crate::dsp::{find_similar_endpoints, slice_and_blend};
use crate::engine::buffer::{rms, samples_to_ms};
use crate::engine::AudioBuffer;
use crate::error::Result;

/// Transient count threshold for a metric of 0
const BASE_THRESHOLD: f32 = 5.0;
/// Added to the threshold at a metric of 1
const THRESHOLD_SPAN: f32 = 10.0;

const ENERGY_WEIGHT: f32 = 0.60;
const FLATNESS_WEIGHT: f32 = 0.25;
const RANGE_WEIGHT: f32 = 0.15;

#[derive(Debug)]
pub struct TransientAligned<'a> {
    pub(super) ctx: StrategyContext<'a>,
    pub(super) status: Status,
    points: Option<(usize, usize)>,
}

impl<'a> TransientAligned<'a> {
    pub fn new(ctx: StrategyContext<'a>) -> Self {
        Self {
            ctx,
            status: Status::default(),
            points: None,
        }
    }

    /// Loop points found by the last evaluation
    pub fn points(&self) -> Option<(usize, usize)> {
        self.points
    }

    /// Transients needed before the buffer counts as rhythmic enough.
    ///
    /// Louder, noisier and more dynamic material needs more transients.
    pub fn dynamic_threshold(&self, mono: &[f32]) -> Result<usize> {
        let sr = self.ctx.audio.sample_rate();

        let energy = rms(mono).clamp(0.0, 1.0);
        let flatness = self.ctx.analysis.spectral_flatness(mono, sr)?;
        let mean_flatness = if flatness.is_empty() {
            0.0
        } else {
            (flatness.iter().sum::<f32>() / flatness.len() as f32).clamp(0.0, 1.0)
        };
        let (min, max) = mono
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &s| {
                (lo.min(s), hi.max(s))
            });
        let range = ((max - min) / 2.0).clamp(0.0, 1.0);

        let metric =
            ENERGY_WEIGHT * energy + FLATNESS_WEIGHT * mean_flatness + RANGE_WEIGHT * range;
        Ok((BASE_THRESHOLD + THRESHOLD_SPAN * metric).floor() as usize)
    }

    pub(super) fn assess(&mut self) -> Result<bool> {
        let audio = self.ctx.audio;
        let sr = audio.sample_rate();
        let mono = audio.mono_downmix();
        let analysis = self.ctx.analysis.as_ref();

        let transients = analysis.transients(mono, sr)?;
        if transients.len() < 2 {
            return Ok(false);
        }
        let threshold = self.dynamic_threshold(mono)?;
        if transients.len() <= threshold {
            tracing::debug!(
                transients = transients.len(),
                threshold,
                "too few transients"
            );
            return Ok(false);
        }

        let settings = self.ctx.settings;
        let Some((start, end)) = find_similar_endpoints(
            analysis,
            mono,
            sr,
            &transients,
            settings.max_candidates,
            settings.similarity_threshold,
        ) else {
            return Ok(false);
        };
        if start >= end {
            return Ok(false);
        }

        let duration_ms = samples_to_ms(end - start, sr);
        tracing::debug!(start, end, duration_ms, "transient-aligned loop points");
        self.points = Some((start, end));
        Ok(duration_ms >= self.ctx.min_duration_ms)
    }

    pub(super) fn build(&self) -> Result<AudioBuffer> {
        let (start, end) = self
            .points
            .ok_or_else(|| missing_points(StrategyId::TransientAligned))?;
        let blended = slice_and_blend(
            self.ctx.audio,
            self.ctx.analysis.as_ref(),
            start,
            end,
            &self.ctx.settings.blend,
        )?;
        Ok(blended.audio)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::context;
    use super::super::{LoopState, LoopStrategy, StrategySettings};
    use super::*;
    use std::f32::consts::PI;

    const SR: u32 = 44100;

    /// Steady drone with a short click every half second
    fn pulsing_drone(secs: usize) -> AudioBuffer {
        let len = SR as usize * secs;
        let mut samples: Vec<f32> = (0..len)
            .map(|i| 0.5 * (2.0 * PI * 220.0 * i as f32 / SR as f32).sin())
            .collect();
        let burst = SR as usize / 200;
        let mut pos = SR as usize / 4;
        while pos + burst < len {
            for i in 0..burst {
                let t = i as f32 / SR as f32;
                samples[pos + i] += 0.3 * (-t * 600.0).exp() * (2.0 * PI * 3000.0 * t).sin();
            }
            pos += SR as usize / 2;
        }
        AudioBuffer::from_mono(samples, SR).unwrap()
    }

    #[test]
    fn test_threshold_grows_with_energy() {
        let settings = StrategySettings::default();
        let quiet_samples = (0..SR as usize)
            .map(|i| 0.01 * (2.0 * PI * 441.0 * i as f32 / SR as f32).sin())
            .collect();
        let quiet = AudioBuffer::from_mono(quiet_samples, SR).unwrap();
        let loud = pulsing_drone(1);

        let t_quiet = TransientAligned::new(context(&quiet, 0, &settings))
            .dynamic_threshold(quiet.mono_downmix())
            .unwrap();
        let t_loud = TransientAligned::new(context(&loud, 0, &settings))
            .dynamic_threshold(loud.mono_downmix())
            .unwrap();

        assert_eq!(t_quiet, 5);
        assert!(t_loud > t_quiet);
        assert!(t_loud <= 15);
    }

    #[test]
    fn test_pulsing_drone_loops_between_transients() {
        let audio = pulsing_drone(12);
        let settings = StrategySettings::default();
        let mut strategy = TransientAligned::new(context(&audio, 3000, &settings));

        assert!(strategy.assess().unwrap());
        let (start, end) = strategy.points().unwrap();
        assert!(samples_to_ms(end - start, SR) >= 3000);
    }

    #[test]
    fn test_steady_tone_has_no_transients() {
        let samples = (0..SR as usize * 4)
            .map(|i| 0.5 * (2.0 * PI * 441.0 * i as f32 / SR as f32).sin())
            .collect();
        let audio = AudioBuffer::from_mono(samples, SR).unwrap();
        let settings = StrategySettings::default();
        let mut strategy =
            LoopStrategy::new(StrategyId::TransientAligned, context(&audio, 1000, &settings));

        assert!(!strategy.evaluate());
        assert_eq!(strategy.state(), LoopState::Unsuitable);
    }
}
