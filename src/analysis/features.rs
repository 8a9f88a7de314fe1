//! Per-frame spectral descriptors computed from magnitude spectrograms.

use super::stft::AMIN;

/// Magnitude-weighted mean frequency of each frame, in Hz.
///
/// Silent frames report 0 Hz.
pub fn spectral_centroid(magnitudes: &[Vec<f32>], frequencies: &[f32]) -> Vec<f32> {
    magnitudes
        .iter()
        .map(|frame| {
            let total: f64 = frame.iter().map(|&m| m as f64).sum();
            if total <= 0.0 {
                return 0.0;
            }
            let weighted: f64 = frame
                .iter()
                .zip(frequencies)
                .map(|(&m, &f)| m as f64 * f as f64)
                .sum();
            (weighted / total) as f32
        })
        .collect()
}

/// Ratio of geometric to arithmetic mean of each frame's power spectrum.
///
/// 1.0 for white noise, close to 0 for a pure tone.
pub fn spectral_flatness(magnitudes: &[Vec<f32>]) -> Vec<f32> {
    magnitudes
        .iter()
        .map(|frame| {
            if frame.is_empty() {
                return 0.0;
            }
            let n = frame.len() as f64;
            let (log_sum, sum) = frame.iter().fold((0.0_f64, 0.0_f64), |(ls, s), &m| {
                let power = ((m * m).max(AMIN)) as f64;
                (ls + power.ln(), s + power)
            });
            ((log_sum / n).exp() / (sum / n)) as f32
        })
        .collect()
}

/// Population variance of a series
pub fn variance(values: &[f32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centroid_of_single_bin() {
        let freqs = vec![0.0, 100.0, 200.0, 300.0];
        let frames = vec![vec![0.0, 0.0, 1.0, 0.0], vec![0.0, 1.0, 0.0, 1.0]];
        let centroid = spectral_centroid(&frames, &freqs);
        assert!((centroid[0] - 200.0).abs() < 1e-4);
        assert!((centroid[1] - 200.0).abs() < 1e-4);
    }

    #[test]
    fn test_centroid_of_silence_is_zero() {
        let centroid = spectral_centroid(&[vec![0.0; 4]], &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(centroid, vec![0.0]);
    }

    #[test]
    fn test_flatness_bounds() {
        let flat = spectral_flatness(&[vec![1.0; 64]]);
        assert!((flat[0] - 1.0).abs() < 1e-5);

        let mut tone = vec![0.0; 64];
        tone[10] = 1.0;
        let peaky = spectral_flatness(&[tone]);
        assert!(peaky[0] < 0.01);
    }

    #[test]
    fn test_variance() {
        assert_eq!(variance(&[]), 0.0);
        assert!((variance(&[1.0, 3.0]) - 1.0).abs() < 1e-12);
        assert_eq!(variance(&[5.0; 10]), 0.0);
    }
}
