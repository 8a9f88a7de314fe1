//! FFT phase alignment of a loop's end toward its start.
//!
//! The window ending at the loop end keeps its magnitude spectrum but takes the
//! phase of the material leading into the loop start, so the last samples of
//! the loop run on into the first ones. The corrected window is blended in
//! with an equal-power curve, reaching it fully at the loop end.

use rustfft::{num_complex::Complex, FftPlanner};

use crate::dsp::crossfade::{crossfade_curves, CurveShape, FadeLevels};
use crate::error::{LoopGenError, Result};

/// Below this magnitude a reference bin has no usable phase
const PHASE_EPSILON: f32 = 1e-9;

/// Phase-align the window ending at `end` toward the audio around `start`.
///
/// The window is `min(window, (end - start) / 2)` samples. The reference is the
/// window preceding `start`, or the one following it when `start` is too close
/// to the beginning. Windows shorter than 2 samples are left alone.
///
/// # Errors
/// `InvalidParameter` unless `start < end <= len`
pub fn phase_align_in_place(
    channels: &mut [Vec<f32>],
    start: usize,
    end: usize,
    window: usize,
) -> Result<()> {
    let len = channels.first().map(|ch| ch.len()).unwrap_or(0);
    if start >= end || end > len {
        return Err(LoopGenError::invalid_parameter(
            "loop_points",
            format!("{}..{}", start, end),
            format!("start < end <= {}", len),
        ));
    }

    let w = window.min((end - start) / 2);
    if w < 2 {
        return Ok(());
    }
    let reference = if start >= w { start - w } else { start };

    let mut planner = FftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(w);
    let inverse = planner.plan_fft_inverse(w);
    let (fade_in, fade_out) = crossfade_curves(w, CurveShape::EqualPower, FadeLevels::default())?;
    let scale = 1.0 / w as f32;

    for ch in channels.iter_mut() {
        let mut tail: Vec<Complex<f32>> = ch[end - w..end]
            .iter()
            .map(|&s| Complex::new(s, 0.0))
            .collect();
        let mut lead: Vec<Complex<f32>> = ch[reference..reference + w]
            .iter()
            .map(|&s| Complex::new(s, 0.0))
            .collect();
        forward.process(&mut tail);
        forward.process(&mut lead);

        let mut corrected: Vec<Complex<f32>> = tail
            .iter()
            .zip(&lead)
            .map(|(t, l)| {
                let mag = l.norm();
                if mag > PHASE_EPSILON {
                    *l * (t.norm() / mag)
                } else {
                    *t
                }
            })
            .collect();
        inverse.process(&mut corrected);

        for (i, sample) in ch[end - w..end].iter_mut().enumerate() {
            *sample = *sample * fade_out[i] + corrected[i].re * scale * fade_in[i];
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::PI;

    fn periodic(len: usize) -> Vec<f32> {
        // Period of exactly 100 samples
        (0..len).map(|i| (2.0 * PI * i as f32 / 100.0).sin() * 0.5).collect()
    }

    #[test]
    fn test_matching_windows_keep_endpoints() {
        let original = periodic(10_000);
        let mut channels = vec![original.clone(), original.clone()];
        phase_align_in_place(&mut channels, 1000, 9000, 400).unwrap();

        for ch in &channels {
            // Window start blends nothing in, window end is fully corrected
            assert_abs_diff_eq!(ch[9000 - 400], original[9000 - 400], epsilon = 1e-4);
            assert_abs_diff_eq!(ch[8999], original[8999], epsilon = 1e-3);
            // Outside the window nothing moves
            assert_eq!(&ch[..8600], &original[..8600]);
            assert_eq!(&ch[9000..], &original[9000..]);
        }
    }

    #[test]
    fn test_end_takes_phase_of_lead_in() {
        // Lead-in before the start is a sine, the end window a phase-shifted sine
        let len = 4000;
        let mut signal: Vec<f32> = (0..len)
            .map(|i| (2.0 * PI * i as f32 / 50.0).sin())
            .collect();
        for (i, s) in signal[3000..3500].iter_mut().enumerate() {
            *s = (2.0 * PI * i as f32 / 50.0 + PI / 2.0).sin();
        }
        let lead = signal[500..1000].to_vec();
        let mut channels = vec![signal];
        phase_align_in_place(&mut channels, 1000, 3500, 500).unwrap();

        // Fully corrected at the loop end: matches the lead-in
        assert_abs_diff_eq!(channels[0][3499], lead[499], epsilon = 1e-3);
    }

    #[test]
    fn test_window_is_capped_to_half_loop() {
        let original = periodic(1000);
        let mut channels = vec![original.clone()];
        phase_align_in_place(&mut channels, 500, 700, 4096).unwrap();
        // Only the last 100 samples before the end may change
        assert_eq!(&channels[0][..600], &original[..600]);
    }

    #[test]
    fn test_rejects_bad_points() {
        let mut channels = vec![vec![0.0; 100]];
        assert!(phase_align_in_place(&mut channels, 50, 50, 10).is_err());
        assert!(phase_align_in_place(&mut channels, 10, 101, 10).is_err());
    }
}
