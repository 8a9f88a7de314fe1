//! Spectral similarity between candidate loop boundaries.

use crate::analysis::{SignalAnalysis, Transients};
use crate::dsp::zero_crossing::nearest_zero_crossing;
use crate::error::{LoopGenError, Result};

/// Analysis frame length at 44.1 kHz, scaled to other rates
const REFERENCE_FRAME: usize = 2048;
/// Analysis hop at 44.1 kHz, scaled to other rates
const REFERENCE_HOP: usize = 512;
const REFERENCE_RATE: usize = 44100;

/// Frame length and hop used for similarity windows at `sample_rate`
pub fn similarity_geometry(sample_rate: u32) -> (usize, usize) {
    let sr = sample_rate as usize;
    (
        (REFERENCE_FRAME * sr / REFERENCE_RATE).max(1),
        (REFERENCE_HOP * sr / REFERENCE_RATE).max(1),
    )
}

/// Pearson correlation of two equally sized series; 0 if either is constant.
pub fn pearson(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let mean = |v: &[f32]| v[..n].iter().map(|&x| x as f64).sum::<f64>() / n as f64;
    let (mean_a, mean_b) = (mean(a), mean(b));

    let (mut cov, mut var_a, mut var_b) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (&x, &y) in a[..n].iter().zip(&b[..n]) {
        let dx = x as f64 - mean_a;
        let dy = y as f64 - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a <= f64::EPSILON || var_b <= f64::EPSILON {
        return 0.0;
    }
    (cov / (var_a.sqrt() * var_b.sqrt())) as f32
}

/// Correlation between the mel spectrogram just after `start` and the one
/// just before `end`.
///
/// The windows are `[start, start + frame)` and `[end - frame, end)`.
///
/// # Errors
/// `SegmentTooShort` if either window leaves the signal
pub fn spectral_similarity(
    analysis: &dyn SignalAnalysis,
    mono: &[f32],
    sample_rate: u32,
    start: usize,
    end: usize,
) -> Result<f32> {
    let (frame, hop) = similarity_geometry(sample_rate);

    if start + frame > mono.len() {
        return Err(LoopGenError::SegmentTooShort {
            needed: start + frame,
            available: mono.len(),
        });
    }
    if end < frame || end > mono.len() {
        return Err(LoopGenError::SegmentTooShort {
            needed: frame,
            available: end.min(mono.len()),
        });
    }

    let head = analysis.mel_spectrogram(&mono[start..start + frame], sample_rate, frame, hop)?;
    let tail = analysis.mel_spectrogram(&mono[end - frame..end], sample_rate, frame, hop)?;

    let flatten = |m: Vec<Vec<f32>>| m.into_iter().flatten().collect::<Vec<f32>>();
    Ok(pearson(&flatten(head), &flatten(tail)))
}

/// Search transient pairs for a spectrally similar start/end.
///
/// Starts are tried from the earliest transient and ends from the latest,
/// each bounded to `max_candidates` and snapped to the nearest zero crossing.
/// The first pair whose similarity exceeds `threshold` wins. A window that
/// does not fit ends the search for the current start.
pub fn find_similar_endpoints(
    analysis: &dyn SignalAnalysis,
    mono: &[f32],
    sample_rate: u32,
    transients: &Transients,
    max_candidates: usize,
    threshold: f32,
) -> Option<(usize, usize)> {
    let count = transients.len();
    if count < 2 {
        return None;
    }

    for i in 0..(count - 1).min(max_candidates) {
        let start = transients
            .sample_offset(i)
            .and_then(|s| nearest_zero_crossing(mono, s))?;

        for j in 0..(count - 1 - i).min(max_candidates) {
            let end = match transients
                .sample_offset(count - 1 - j)
                .and_then(|e| nearest_zero_crossing(mono, e))
            {
                Some(end) => end,
                None => break,
            };

            match spectral_similarity(analysis, mono, sample_rate, start, end) {
                Ok(similarity) if similarity > threshold => {
                    tracing::debug!(start, end, similarity, "similar endpoints");
                    return Some((start, end));
                }
                Ok(_) => {}
                Err(LoopGenError::SegmentTooShort { .. }) => break,
                Err(e) => {
                    tracing::debug!(error = %e, "similarity failed");
                    break;
                }
            }
        }
    }

    None
}
