//! Beat-aligned looping: cut on bar lines spanning a power-of-two bar count.

use super::{missing_points, Status, StrategyContext, StrategyId};
use crate::dsp::slice_and_blend;
use crate::engine::buffer::{peak, samples_to_ms};
use crate::engine::AudioBuffer;
use crate::error::Result;

const BEATS_PER_BAR: usize = 4;

#[derive(Debug)]
pub struct BeatAligned<'a> {
    pub(super) ctx: StrategyContext<'a>,
    pub(super) status: Status,
    points: Option<(usize, usize)>,
}

impl<'a> BeatAligned<'a> {
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

    pub(super) fn assess(&mut self) -> Result<bool> {
        let audio = self.ctx.audio;
        let sr = audio.sample_rate();
        let mono = audio.mono_downmix();

        let level = peak(mono);
        if level <= 0.0 {
            return Ok(false);
        }
        let normalized: Vec<f32> = mono.iter().map(|s| s / level).collect();

        let beats = self.ctx.analysis.beat_track(&normalized, sr)?;
        let num_bars = beats.len() / BEATS_PER_BAR;
        if num_bars < 1 {
            tracing::debug!(beats = beats.len(), "not enough beats for a bar");
            return Ok(false);
        }
        let even_bars = if num_bars.is_power_of_two() {
            num_bars
        } else {
            num_bars.next_power_of_two() / 2
        };

        let (Some(start), Some(end)) = (
            beats.sample_offset(0, sr),
            beats.sample_offset(even_bars * BEATS_PER_BAR - 1, sr),
        ) else {
            return Ok(false);
        };
        if start >= end || end > audio.len() {
            return Ok(false);
        }

        let duration_ms = samples_to_ms(end - start, sr);
        tracing::debug!(
            tempo_bpm = beats.tempo_bpm,
            bars = even_bars,
            start,
            end,
            duration_ms,
            "beat-aligned loop points"
        );
        self.points = Some((start, end));
        Ok(duration_ms >= self.ctx.min_duration_ms)
    }

    pub(super) fn build(&self) -> Result<AudioBuffer> {
        let (start, end) = self
            .points
            .ok_or_else(|| missing_points(StrategyId::BeatAligned))?;
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
    use super::super::{LoopStrategy, StrategySettings};
    use super::*;

    const SR: u32 = 44100;

    /// 120 BPM clicks: 10 ms decaying 2 kHz bursts
    fn click_track(secs: usize, offset: usize) -> AudioBuffer {
        let len = SR as usize * secs;
        let interval = SR as usize / 2;
        let burst = SR as usize / 100;
        let mut samples = vec![0.0_f32; len];
        let mut pos = offset;
        while pos + burst < len {
            for i in 0..burst {
                let t = i as f32 / SR as f32;
                samples[pos + i] =
                    0.9 * (-t * 400.0).exp() * (2.0 * std::f32::consts::PI * 2000.0 * t).sin();
            }
            pos += interval;
        }
        AudioBuffer::from_mono(samples, SR).unwrap()
    }

    #[test]
    fn test_click_track_spans_power_of_two_bars() {
        let audio = click_track(10, 11025);
        let settings = StrategySettings::default();
        let mut strategy = BeatAligned::new(context(&audio, 5000, &settings));

        assert!(strategy.assess().unwrap());
        let (start, end) = strategy.points().unwrap();
        // 20 beats -> 5 bars -> 4 bars: first beat to beat 15
        let span_ms = samples_to_ms(end - start, SR) as i64;
        assert!((span_ms - 7500).abs() <= 60, "span {} ms", span_ms);
        assert!(start.abs_diff(11025) < 1024);
    }

    #[test]
    fn test_click_track_loop_is_created() {
        let audio = click_track(10, 11025);
        let settings = StrategySettings::default();
        let mut strategy = LoopStrategy::new(StrategyId::BeatAligned, context(&audio, 5000, &settings));

        assert!(strategy.evaluate());
        let looped = strategy.create_loop().unwrap();
        assert!(looped.duration_ms() >= 5000);
        assert!(looped.is_finite());
    }

    #[test]
    fn test_min_duration_rejects_short_span() {
        let audio = click_track(10, 11025);
        let settings = StrategySettings::default();
        let mut strategy = BeatAligned::new(context(&audio, 9000, &settings));
        assert!(!strategy.assess().unwrap());
    }

    #[test]
    fn test_silence_is_unsuitable() {
        let audio = AudioBuffer::from_mono(vec![0.0; SR as usize * 2], SR).unwrap();
        let settings = StrategySettings::default();
        let mut strategy = BeatAligned::new(context(&audio, 1000, &settings));
        assert!(!strategy.assess().unwrap());
    }
}
