//! Slice-and-blend: turn a pair of loop points into a seamless loop buffer.
//!
//! Pipeline: snap the points to nearby onsets, phase-align the end toward the
//! start, crop, blend the lead-in material that precedes the start into the
//! loop tail, then apply short asymmetric fade margins.

use serde::{Deserialize, Serialize};

use crate::analysis::SignalAnalysis;
use crate::dsp::crossfade::{
    crossfade_curves, crossfade_samples_in_place, fade_in_samples_in_place,
    fade_out_samples_in_place, CurveShape, FadeLevels,
};
use crate::dsp::phase::phase_align_in_place;
use crate::engine::buffer::{ms_to_samples, AudioBuffer};
use crate::error::{LoopGenError, Result};

/// Tuning for [`slice_and_blend`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendSettings {
    /// Furthest a loop point may move to reach an onset (default: 50)
    pub onset_snap_ms: u64,
    /// Phase alignment window (default: 20)
    pub phase_window_ms: u64,
    /// Lead-in blended into the loop tail (default: 10)
    pub blend_ms: u64,
    /// Tail-into-head crossfade when there is no lead-in (default: 100)
    pub fallback_crossfade_ms: u64,
    /// Fade-in margin at the loop head (default: 3)
    pub head_fade_ms: u64,
    /// Fade-out margin at the loop tail (default: 8)
    pub tail_fade_ms: u64,
}

impl Default for BlendSettings {
    fn default() -> Self {
        Self {
            onset_snap_ms: 50,
            phase_window_ms: 20,
            blend_ms: 10,
            fallback_crossfade_ms: 100,
            head_fade_ms: 3,
            tail_fade_ms: 8,
        }
    }
}

/// A blended loop and the points it was cut from
#[derive(Debug, Clone)]
pub struct BlendedLoop {
    pub audio: AudioBuffer,
    /// Loop start after onset snapping, in source samples
    pub start: usize,
    /// Loop end (exclusive) after onset snapping, in source samples
    pub end: usize,
}

/// Move each loop point onto its nearest onset.
///
/// An onset qualifies when it lies within `max_distance` samples and inside
/// `[0, len]`. Snaps that would leave `start >= end` are discarded.
pub fn snap_to_onsets(
    start: usize,
    end: usize,
    onsets: &[usize],
    len: usize,
    max_distance: usize,
) -> (usize, usize) {
    let snap = |point: usize| {
        onsets
            .iter()
            .copied()
            .filter(|&o| o <= len && o.abs_diff(point) <= max_distance)
            .min_by_key(|&o| o.abs_diff(point))
            .unwrap_or(point)
    };

    let (snapped_start, snapped_end) = (snap(start), snap(end));
    if snapped_start < snapped_end {
        (snapped_start, snapped_end)
    } else {
        (start, end)
    }
}

/// Cut `[start, end)` out of `buffer` as a seamless loop.
///
/// The returned audio is exactly `end - start` samples long, using the
/// snapped points reported in the result.
///
/// # Errors
/// `InvalidParameter` unless `start < end <= buffer.len()`; analysis errors
/// from onset detection.
pub fn slice_and_blend(
    buffer: &AudioBuffer,
    analysis: &dyn SignalAnalysis,
    start: usize,
    end: usize,
    settings: &BlendSettings,
) -> Result<BlendedLoop> {
    if start >= end || end > buffer.len() {
        return Err(LoopGenError::invalid_parameter(
            "loop_points",
            format!("{}..{}", start, end),
            format!("start < end <= {}", buffer.len()),
        ));
    }
    let sr = buffer.sample_rate();

    let onsets = analysis.onset_detect(buffer.mono_downmix(), sr)?;
    let (start, end) = snap_to_onsets(
        start,
        end,
        &onsets,
        buffer.len(),
        ms_to_samples(settings.onset_snap_ms, sr),
    );

    let mut source = buffer.samples().to_vec();
    phase_align_in_place(
        &mut source,
        start,
        end,
        ms_to_samples(settings.phase_window_ms, sr),
    )?;

    let mut looped: Vec<Vec<f32>> = source.iter().map(|ch| ch[start..end].to_vec()).collect();
    let loop_len = end - start;
    let max_blend = (loop_len / 2).saturating_sub(1);

    let lead = ms_to_samples(settings.blend_ms, sr).min(start).min(max_blend);
    if lead > 0 {
        let (fade_in, fade_out) = crossfade_curves(lead, CurveShape::EqualPower, FadeLevels::default())?;
        let tail = loop_len - lead;
        for (ch, src) in looped.iter_mut().zip(&source) {
            for i in 0..lead {
                ch[tail + i] = ch[tail + i] * fade_out[i] + src[start - lead + i] * fade_in[i];
            }
        }
    } else {
        let n = ms_to_samples(settings.fallback_crossfade_ms, sr).min(max_blend);
        if n > 0 {
            crossfade_samples_in_place(&mut looped, n, CurveShape::EqualPower, FadeLevels::default())?;
        }
    }

    fade_in_samples_in_place(
        &mut looped,
        ms_to_samples(settings.head_fade_ms, sr),
        FadeLevels::default(),
    )?;
    fade_out_samples_in_place(
        &mut looped,
        ms_to_samples(settings.tail_fade_ms, sr),
        FadeLevels::default(),
    )?;

    Ok(BlendedLoop {
        audio: AudioBuffer::new(looped, sr)?,
        start,
        end,
    })
}
