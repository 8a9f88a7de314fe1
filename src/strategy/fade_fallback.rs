//! Last-resort looping: fade the whole buffer in and out.

use super::{Status, StrategyContext};
use crate::dsp::crossfade::{fade_in_in_place, fade_out_in_place, FadeLevels};
use crate::engine::AudioBuffer;
use crate::error::Result;

#[derive(Debug)]
pub struct FadeFallback<'a> {
    pub(super) ctx: StrategyContext<'a>,
    pub(super) status: Status,
}

impl<'a> FadeFallback<'a> {
    pub fn new(ctx: StrategyContext<'a>) -> Self {
        Self {
            ctx,
            status: Status::default(),
        }
    }

    pub(super) fn assess(&mut self) -> Result<bool> {
        Ok(true)
    }

    pub(super) fn build(&self) -> Result<AudioBuffer> {
        let audio = self.ctx.audio;
        let sr = audio.sample_rate();
        let fade_ms = self.ctx.settings.fade_fallback_ms.min(audio.duration_ms() / 3);

        let mut channels = audio.samples().to_vec();
        fade_in_in_place(&mut channels, sr, fade_ms, FadeLevels::default())?;
        fade_out_in_place(&mut channels, sr, fade_ms, FadeLevels::default())?;
        AudioBuffer::new(channels, sr)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::context;
    use super::super::{LoopStrategy, StrategyId, StrategySettings};
    use super::*;

    #[test]
    fn test_fades_both_ends() {
        let audio = AudioBuffer::new(vec![vec![0.5; 44100], vec![-0.5; 44100]], 44100).unwrap();
        let settings = StrategySettings::default();
        let mut strategy =
            LoopStrategy::new(StrategyId::FadeFallback, context(&audio, 0, &settings));

        assert!(strategy.evaluate());
        let looped = strategy.create_loop().unwrap();
        assert_eq!(looped.len(), audio.len());
        for ch in looped.samples() {
            assert_eq!(ch[0], 0.0);
            assert_eq!(ch[ch.len() - 1], 0.0);
            assert_eq!(ch[ch.len() / 2].abs(), 0.5);
        }
    }

    #[test]
    fn test_fade_capped_to_third_of_short_buffer() {
        // 300 ms buffer: fades are 100 ms, the middle is untouched
        let audio = AudioBuffer::from_mono(vec![1.0; 300], 1000).unwrap();
        let settings = StrategySettings::default();
        let looped = FadeFallback::new(context(&audio, 0, &settings)).build().unwrap();

        assert!(looped.channel(0)[100..200].iter().all(|&s| s == 1.0));
        assert!(looped.channel(0)[50] < 1.0);
        assert!(looped.channel(0)[250] < 1.0);
    }
}
