//! Short-time Fourier transform helpers.
//!
//! Frames are centered: the signal is zero-padded by `n_fft / 2` on both
//! sides, so frame `t` is centered on sample `t * hop` and a signal of `len`
//! samples yields `1 + len / hop` frames.

use std::f32::consts::PI;

use rustfft::{num_complex::Complex, Fft};

/// Zero-valued complex number, used for FFT buffer initialization.
const COMPLEX_ZERO: Complex<f32> = Complex::new(0.0, 0.0);

/// Floor applied before taking logarithms of power values.
pub const AMIN: f32 = 1e-10;

/// Dynamic range kept by [`power_to_db`] below the loudest bin.
pub const TOP_DB: f32 = 80.0;

/// Periodic Hann window of the given size.
pub fn hann_window(size: usize) -> Vec<f32> {
    match size {
        0 => vec![],
        1 => vec![1.0],
        n => (0..n)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / n as f32).cos())
            .collect(),
    }
}

/// Number of centered frames for a signal of `len` samples.
#[inline]
pub fn frame_count(len: usize, hop: usize) -> usize {
    1 + len / hop
}

/// Magnitude spectrogram, indexed `[frame][bin]` with `n_fft / 2 + 1` bins.
///
/// `fft` must be a forward plan of length `window.len()`.
pub fn magnitude_spectrogram(
    signal: &[f32],
    fft: &dyn Fft<f32>,
    window: &[f32],
    hop: usize,
) -> Vec<Vec<f32>> {
    let n_fft = window.len();
    let pad = n_fft / 2;
    let num_bins = n_fft / 2 + 1;
    let num_frames = frame_count(signal.len(), hop);

    let mut buffer = vec![COMPLEX_ZERO; n_fft];
    let mut frames = Vec::with_capacity(num_frames);

    for t in 0..num_frames {
        // Sample index of window position 0, possibly negative
        let origin = (t * hop) as isize - pad as isize;
        for (i, (slot, &w)) in buffer.iter_mut().zip(window).enumerate() {
            let idx = origin + i as isize;
            let s = if idx >= 0 && (idx as usize) < signal.len() {
                signal[idx as usize]
            } else {
                0.0
            };
            *slot = Complex::new(s * w, 0.0);
        }

        fft.process(&mut buffer);
        frames.push(buffer[..num_bins].iter().map(|c| c.norm()).collect());
    }

    frames
}

/// Convert a power spectrogram to decibels relative to `reference`, clipped
/// to [`TOP_DB`] below the loudest value.
pub fn power_to_db(frames: &[Vec<f32>], reference: f32) -> Vec<Vec<f32>> {
    let ref_db = 10.0 * reference.max(AMIN).log10();
    let mut db: Vec<Vec<f32>> = frames
        .iter()
        .map(|frame| {
            frame
                .iter()
                .map(|&p| 10.0 * p.max(AMIN).log10() - ref_db)
                .collect()
        })
        .collect();

    let max = db
        .iter()
        .flat_map(|f| f.iter())
        .fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let floor = max - TOP_DB;
    for frame in &mut db {
        for v in frame.iter_mut() {
            *v = v.max(floor);
        }
    }
    db
}

/// Center frequency in Hz of every bin for an `n_fft`-point transform.
pub fn bin_frequencies(n_fft: usize, sample_rate: u32) -> Vec<f32> {
    let bin_hz = sample_rate as f32 / n_fft as f32;
    (0..n_fft / 2 + 1).map(|k| k as f32 * bin_hz).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustfft::FftPlanner;

    #[test]
    fn test_hann_window_is_periodic() {
        let w = hann_window(8);
        assert!(w[0].abs() < 1e-7);
        assert!((w[4] - 1.0).abs() < 1e-6);
        assert!((w[1] - w[7]).abs() < 1e-6);
    }

    #[test]
    fn test_frame_count_is_centered() {
        assert_eq!(frame_count(2048, 512), 5);
        assert_eq!(frame_count(100, 512), 1);
    }

    #[test]
    fn test_sine_peaks_in_expected_bin() {
        let sr = 44100;
        let n_fft = 1024;
        // Bin 40 exactly
        let freq = 40.0 * sr as f32 / n_fft as f32;
        let signal: Vec<f32> = (0..8192)
            .map(|i| (2.0 * PI * freq * i as f32 / sr as f32).sin())
            .collect();

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n_fft);
        let frames = magnitude_spectrogram(&signal, fft.as_ref(), &hann_window(n_fft), 256);

        let middle = &frames[frames.len() / 2];
        let (peak_bin, _) = middle
            .iter()
            .enumerate()
            .fold((0, 0.0_f32), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) });
        assert_eq!(peak_bin, 40);
    }

    #[test]
    fn test_power_to_db_clips_dynamic_range() {
        let frames = vec![vec![1.0, 1e-12], vec![0.5, 0.0]];
        let db = power_to_db(&frames, 1.0);
        assert!((db[0][0] - 0.0).abs() < 1e-5);
        assert!((db[0][1] - (-TOP_DB)).abs() < 1e-4);
        assert!((db[1][1] - (-TOP_DB)).abs() < 1e-4);
    }
}
