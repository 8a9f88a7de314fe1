//! Onset envelopes and peak picking.
//!
//! Two novelty curves are provided: the onset strength of a log-power mel
//! spectrogram and the spectral flux of a dB-scaled magnitude spectrogram.
//! Both are positive first differences averaged across bands, with frame 0
//! fixed at zero.

/// Window lengths for [`peak_pick`], in frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakPickParams {
    pub pre_max: usize,
    pub post_max: usize,
    pub pre_avg: usize,
    pub post_avg: usize,
    pub delta: f32,
    pub wait: usize,
    /// Raw envelope level a peak must reach before normalization
    pub min_strength: f32,
}

impl PeakPickParams {
    /// Windows of 30 ms (local max), 100 ms (local mean) and 30 ms (refractory
    /// wait) at the given frame rate. Peaks weaker than an average rise of
    /// 1 dB per band are ignored.
    pub fn for_frame_rate(sample_rate: u32, hop: usize) -> Self {
        let frames = |secs: f32| (secs * sample_rate as f32 / hop as f32) as usize;
        Self {
            pre_max: frames(0.03),
            post_max: 1,
            pre_avg: frames(0.10),
            post_avg: frames(0.10) + 1,
            delta: 0.07,
            wait: frames(0.03),
            min_strength: 1.0,
        }
    }
}

/// Mean positive first difference across the bands of each frame.
///
/// `frames` is indexed `[frame][band]`.
pub fn positive_flux(frames: &[Vec<f32>]) -> Vec<f32> {
    let mut envelope = Vec::with_capacity(frames.len());
    if frames.is_empty() {
        return envelope;
    }
    envelope.push(0.0);
    for pair in frames.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        let bands = cur.len().max(1) as f32;
        let rise: f32 = cur
            .iter()
            .zip(prev)
            .map(|(c, p)| (c - p).max(0.0))
            .sum();
        envelope.push(rise / bands);
    }
    envelope
}

/// Rescale an envelope to [0, 1]. A flat envelope becomes all zeros.
pub fn normalize(envelope: &[f32]) -> Vec<f32> {
    let min = envelope.iter().copied().fold(f32::INFINITY, f32::min);
    let shifted: Vec<f32> = envelope.iter().map(|v| v - min).collect();
    let max = shifted.iter().copied().fold(0.0_f32, f32::max);
    if max <= f32::EPSILON {
        return vec![0.0; envelope.len()];
    }
    shifted.iter().map(|v| v / max).collect()
}

/// Pick onset frames from a novelty curve.
///
/// A frame is an onset when it is the maximum of
/// `[i - pre_max, i + post_max)`, exceeds the mean of
/// `[i - pre_avg, i + post_avg)` by `delta`, and lies more than `wait` frames
/// after the previous onset. The envelope is normalized first; peaks whose raw
/// value is below `min_strength` are dropped.
pub fn peak_pick(envelope: &[f32], params: &PeakPickParams) -> Vec<usize> {
    let env = normalize(envelope);
    let n = env.len();
    let mut peaks = Vec::new();
    let mut last: Option<usize> = None;

    for i in 0..n {
        if envelope[i] < params.min_strength {
            continue;
        }
        let max_lo = i.saturating_sub(params.pre_max);
        let max_hi = (i + params.post_max).min(n).max(i + 1);
        let local_max = env[max_lo..max_hi]
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max);
        if env[i] < local_max {
            continue;
        }

        let avg_lo = i.saturating_sub(params.pre_avg);
        let avg_hi = (i + params.post_avg).min(n).max(i + 1);
        let window = &env[avg_lo..avg_hi];
        let local_mean = window.iter().sum::<f32>() / window.len() as f32;
        if env[i] < local_mean + params.delta {
            continue;
        }

        if let Some(prev) = last {
            if i <= prev + params.wait {
                continue;
            }
        }
        peaks.push(i);
        last = Some(i);
    }

    peaks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> PeakPickParams {
        PeakPickParams {
            pre_max: 2,
            post_max: 1,
            pre_avg: 4,
            post_avg: 5,
            delta: 0.07,
            wait: 2,
            min_strength: 0.0,
        }
    }

    #[test]
    fn test_positive_flux_ignores_decay() {
        let frames = vec![vec![0.0, 0.0], vec![2.0, 4.0], vec![1.0, 1.0]];
        assert_eq!(positive_flux(&frames), vec![0.0, 3.0, 0.0]);
    }

    #[test]
    fn test_peak_pick_isolated_spikes() {
        let mut env = vec![0.0; 40];
        env[5] = 1.0;
        env[20] = 0.8;
        env[33] = 0.9;
        assert_eq!(peak_pick(&env, &params()), vec![5, 20, 33]);
    }

    #[test]
    fn test_peak_pick_flat_envelope_has_no_peaks() {
        assert!(peak_pick(&[0.3; 50], &params()).is_empty());
        assert!(peak_pick(&[], &params()).is_empty());
    }

    #[test]
    fn test_peak_pick_respects_wait() {
        let mut env = vec![0.0; 20];
        env[5] = 1.0;
        env[7] = 1.0;
        let peaks = peak_pick(&env, &params());
        assert_eq!(peaks, vec![5]);
    }

    #[test]
    fn test_peak_pick_ignores_weak_envelopes() {
        let mut env = vec![0.0; 20];
        env[5] = 0.2;
        let strict = PeakPickParams {
            min_strength: 1.0,
            ..params()
        };
        assert!(peak_pick(&env, &strict).is_empty());
        assert_eq!(peak_pick(&env, &params()), vec![5]);
    }

    #[test]
    fn test_params_scale_with_frame_rate() {
        let p = PeakPickParams::for_frame_rate(44100, 512);
        assert_eq!(p.pre_max, 2);
        assert_eq!(p.pre_avg, 8);
        assert_eq!(p.post_avg, 9);
        assert_eq!(p.wait, 2);
    }
}
