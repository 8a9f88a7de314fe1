//! Beat tracking on top of an onset envelope.
//!
//! The beat period is the lag with the strongest autocorrelation of the onset
//! envelope, weighted by a log-normal tempo prior around 120 BPM. The grid
//! phase is the offset whose beat positions collect the most envelope energy.
//! Grid positions snap onto nearby onsets, grid beats before the first and
//! after the last matched onset are dropped, and a least squares line through
//! the matched beats gives the final period.

use std::cmp::Ordering;

/// Slowest tempo considered when estimating the beat period.
pub const MIN_BPM: f64 = 30.0;
/// Fastest tempo considered when estimating the beat period.
pub const MAX_BPM: f64 = 300.0;
/// Center of the tempo prior.
const PRIOR_BPM: f64 = 120.0;
/// Standard deviation of the tempo prior, in octaves.
const PRIOR_OCTAVES: f64 = 1.0;
/// Fraction of a beat period within which a grid position snaps to an onset.
const SNAP_TOLERANCE: f64 = 0.25;

/// Result of beat tracking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeatTrack {
    /// Estimated tempo in beats per minute (0 when no beats were found)
    pub tempo_bpm: f64,
    /// Ordered beat times in seconds
    pub beat_times: Vec<f64>,
}

impl BeatTrack {
    pub fn len(&self) -> usize {
        self.beat_times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beat_times.is_empty()
    }

    /// Beat position `index` as a sample offset (floored)
    pub fn sample_offset(&self, index: usize, sample_rate: u32) -> Option<usize> {
        self.beat_times
            .get(index)
            .map(|t| (t * sample_rate as f64).floor() as usize)
    }
}

/// Track beats from an onset envelope and the onsets picked from it.
///
/// `envelope` holds one onset strength per frame of `hop` samples; `onsets`
/// are ordered sample offsets.
pub fn track_beats(envelope: &[f32], onsets: &[usize], hop: usize, sample_rate: u32) -> BeatTrack {
    if onsets.len() < 2 || hop == 0 || sample_rate == 0 {
        return BeatTrack::default();
    }

    let envelope = cap_to_onset_strength(envelope, onsets, hop);
    let Some(period) = estimate_period(&envelope, hop, sample_rate) else {
        return BeatTrack::default();
    };
    let phase = best_phase(&envelope, period);

    let hop = hop as f64;
    let tolerance = period * hop * SNAP_TOLERANCE;
    let end = envelope.len() as f64 * hop;
    let grid: Vec<Option<usize>> = (0_usize..)
        .map(|k| (phase + k as f64 * period) * hop)
        .take_while(|&target| target < end)
        .map(|target| nearest(onsets, target).filter(|&o| (o as f64 - target).abs() <= tolerance))
        .collect();

    let (Some(first), Some(last)) = (
        grid.iter().position(Option::is_some),
        grid.iter().rposition(Option::is_some),
    ) else {
        return BeatTrack::default();
    };
    let grid = &grid[first..=last];

    let matched: Vec<(f64, f64)> = grid
        .iter()
        .enumerate()
        .filter_map(|(k, onset)| onset.map(|o| (k as f64, o as f64)))
        .collect();
    let Some((origin, slope)) = fit_line(&matched) else {
        return BeatTrack::default();
    };

    let sr = sample_rate as f64;
    if slope < 60.0 * sr / MAX_BPM || slope > 60.0 * sr / MIN_BPM {
        return BeatTrack::default();
    }

    let beat_times = grid
        .iter()
        .enumerate()
        .map(|(k, onset)| {
            onset
                .map(|o| o as f64)
                .unwrap_or(origin + k as f64 * slope)
                / sr
        })
        .collect();

    BeatTrack {
        tempo_bpm: 60.0 * sr / slope,
        beat_times,
    }
}

/// Envelope limited to the median strength of the picked onsets, so one
/// loud onset cannot outweigh a steady pulse.
fn cap_to_onset_strength(envelope: &[f32], onsets: &[usize], hop: usize) -> Vec<f32> {
    let mut strengths: Vec<f32> = onsets
        .iter()
        .filter_map(|&o| envelope.get(o / hop).copied())
        .collect();
    if strengths.is_empty() {
        return envelope.to_vec();
    }
    strengths.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let cap = strengths[strengths.len() / 2];
    envelope.iter().map(|v| v.min(cap)).collect()
}

/// Mean product of the mean-removed envelope with itself shifted by `lag`
fn autocorrelation(centered: &[f64], lag: usize) -> f64 {
    let n = centered.len() - lag;
    let sum: f64 = centered[..n]
        .iter()
        .zip(&centered[lag..])
        .map(|(a, b)| a * b)
        .sum();
    sum / n as f64
}

/// Beat period in frames, refined to a fraction of a frame
fn estimate_period(envelope: &[f32], hop: usize, sample_rate: u32) -> Option<f64> {
    let frame_rate = sample_rate as f64 / hop as f64;
    let min_lag = ((60.0 * frame_rate / MAX_BPM).floor() as usize).max(1);
    let max_lag = ((60.0 * frame_rate / MIN_BPM).ceil() as usize).min(envelope.len() / 2);
    if min_lag + 1 >= max_lag {
        return None;
    }

    let mean = envelope.iter().map(|&v| v as f64).sum::<f64>() / envelope.len() as f64;
    let centered: Vec<f64> = envelope.iter().map(|&v| v as f64 - mean).collect();
    let acf: Vec<f64> = (0..=max_lag + 1)
        .map(|lag| autocorrelation(&centered, lag))
        .collect();

    let weighted = |lag: usize| {
        let bpm = 60.0 * frame_rate / lag as f64;
        let octaves = (bpm / PRIOR_BPM).log2() / PRIOR_OCTAVES;
        acf[lag] * (-0.5 * octaves * octaves).exp()
    };
    let best = (min_lag..=max_lag)
        .max_by(|&a, &b| weighted(a).partial_cmp(&weighted(b)).unwrap_or(Ordering::Equal))?;
    if acf[best] <= 0.0 {
        return None;
    }

    // Parabolic interpolation around the peak
    let (left, center, right) = (acf[best - 1], acf[best], acf[best + 1]);
    let curvature = left - 2.0 * center + right;
    let offset = if curvature.abs() > f64::EPSILON {
        (0.5 * (left - right) / curvature).clamp(-0.5, 0.5)
    } else {
        0.0
    };
    Some(best as f64 + offset)
}

/// Grid offset in `[0, period)` frames collecting the most envelope energy
fn best_phase(envelope: &[f32], period: f64) -> f64 {
    let score = |phase: f64| -> f32 {
        (0_usize..)
            .map(|k| (phase + k as f64 * period).round() as usize)
            .take_while(|&frame| frame < envelope.len())
            .map(|frame| {
                let lo = frame.saturating_sub(1);
                let hi = (frame + 2).min(envelope.len());
                envelope[lo..hi].iter().copied().fold(0.0_f32, f32::max)
            })
            .sum()
    };
    (0..period.ceil() as usize)
        .map(|p| (p as f64, score(p as f64)))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
        .map(|(phase, _)| phase)
        .unwrap_or(0.0)
}

/// Least squares `y = origin + slope * x`
fn fit_line(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;
    let var_x: f64 = points.iter().map(|p| (p.0 - mean_x).powi(2)).sum();
    if var_x <= 0.0 {
        return None;
    }
    let cov: f64 = points
        .iter()
        .map(|p| (p.0 - mean_x) * (p.1 - mean_y))
        .sum();
    let slope = cov / var_x;
    Some((mean_y - slope * mean_x, slope))
}

/// Onset closest to `target` in an ordered list
fn nearest(onsets: &[usize], target: f64) -> Option<usize> {
    let idx = onsets.partition_point(|&o| (o as f64) < target);
    let before = idx.checked_sub(1).map(|i| onsets[i]);
    let after = onsets.get(idx).copied();
    match (before, after) {
        (Some(b), Some(a)) => {
            if target - b as f64 <= a as f64 - target {
                Some(b)
            } else {
                Some(a)
            }
        }
        (b, a) => b.or(a),
    }
}
