//! Silence pruning.
//!
//! Silence is a stretch of at least `frame_ms` whose mono level stays more
//! than `top_db` below the buffer's mono peak. Quieter dips that are shorter
//! than a frame, such as zero crossings or near-zero noise samples, count as
//! sound. Leading and trailing silence is trimmed; interior gaps longer than
//! `min_silence_ms` are shortened to `keep_silence_ms`. Shorter gaps are kept
//! whole. Pruning an already pruned buffer changes nothing.

use serde::{Deserialize, Serialize};

use crate::engine::buffer::{db_to_linear, ms_to_samples, AudioBuffer};
use crate::error::{LoopGenError, Result};

/// Silence pruning parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SilenceSettings {
    /// Gaps up to this long are kept intact (default: 1000)
    pub min_silence_ms: i64,
    /// Silence left in place of a longer gap (default: 100)
    pub keep_silence_ms: i64,
    /// Level below the peak that counts as silence (default: 45)
    pub top_db: f32,
    /// Shortest quiet stretch that counts as silence (default: 50)
    pub frame_ms: u64,
}

impl Default for SilenceSettings {
    fn default() -> Self {
        Self {
            min_silence_ms: 1000,
            keep_silence_ms: 100,
            top_db: 45.0,
            frame_ms: 50,
        }
    }
}

impl SilenceSettings {
    pub fn validate(&self) -> Result<()> {
        if self.min_silence_ms < 0 {
            return Err(LoopGenError::invalid_parameter(
                "min_silence_ms",
                self.min_silence_ms,
                ">= 0",
            ));
        }
        if self.keep_silence_ms < 0 {
            return Err(LoopGenError::invalid_parameter(
                "keep_silence_ms",
                self.keep_silence_ms,
                ">= 0",
            ));
        }
        if self.keep_silence_ms >= self.min_silence_ms {
            return Err(LoopGenError::invalid_parameter(
                "keep_silence_ms",
                self.keep_silence_ms,
                format!("< min_silence_ms ({})", self.min_silence_ms),
            ));
        }
        if !self.top_db.is_finite() || self.top_db <= 0.0 {
            return Err(LoopGenError::invalid_parameter(
                "top_db",
                self.top_db,
                "finite and > 0",
            ));
        }
        Ok(())
    }
}

/// Removes long silences from a buffer
#[derive(Debug, Clone, Default)]
pub struct SilencePruner {
    settings: SilenceSettings,
}

impl SilencePruner {
    /// # Errors
    /// `InvalidParameter` if the settings do not validate
    pub fn new(settings: SilenceSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &SilenceSettings {
        &self.settings
    }

    /// Sample ranges of `audio` that survive pruning, in order.
    ///
    /// Empty when the buffer is entirely silent (peak of zero).
    pub fn kept_ranges(&self, audio: &AudioBuffer) -> Vec<(usize, usize)> {
        let mono = audio.mono_downmix();
        let peak = mono.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()));
        if peak <= 0.0 {
            return Vec::new();
        }
        let threshold = peak * db_to_linear(-self.settings.top_db);

        let sr = audio.sample_rate();
        let frame = ms_to_samples(self.settings.frame_ms, sr).max(1);
        let min_gap = ms_to_samples(self.settings.min_silence_ms as u64, sr);
        let keep = ms_to_samples(self.settings.keep_silence_ms as u64, sr);

        let mut ranges: Vec<(usize, usize)> = Vec::new();
        for (run_start, run_end) in sounding_runs(mono, threshold, frame) {
            match ranges.last_mut() {
                Some(last) if run_start - last.1 <= min_gap => last.1 = run_end,
                Some(_) => ranges.push((run_start - keep, run_end)),
                None => ranges.push((run_start, run_end)),
            }
        }
        ranges
    }

    /// Prune `audio`. An all-zero buffer is returned unchanged.
    pub fn prune(&self, audio: &AudioBuffer) -> Result<AudioBuffer> {
        let ranges = self.kept_ranges(audio);
        if ranges.is_empty() {
            return Ok(audio.clone());
        }

        let channels = audio
            .samples()
            .iter()
            .map(|ch| {
                ranges
                    .iter()
                    .flat_map(|&(start, end)| ch[start..end].iter().copied())
                    .collect()
            })
            .collect();
        AudioBuffer::new(channels, audio.sample_rate())
    }
}

/// Ranges between silent stretches: runs of at least `frame` samples below
/// `threshold`.
fn sounding_runs(mono: &[f32], threshold: f32, frame: usize) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut cursor = 0;
    let mut i = 0;
    while i < mono.len() {
        if mono[i].abs() >= threshold {
            i += 1;
            continue;
        }
        let quiet_start = i;
        while i < mono.len() && mono[i].abs() < threshold {
            i += 1;
        }
        if i - quiet_start >= frame {
            if quiet_start > cursor {
                runs.push((cursor, quiet_start));
            }
            cursor = i;
        }
    }
    if cursor < mono.len() {
        runs.push((cursor, mono.len()));
    }
    runs
}
