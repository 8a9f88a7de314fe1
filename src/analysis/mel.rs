//! Mel filterbank.
//!
//! Triangular filters evenly spaced on the HTK mel scale between 0 Hz and
//! Nyquist, area-normalized so each filter integrates to a constant.

/// Convert Hz to mels (HTK formula)
#[inline]
pub fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

/// Convert mels to Hz (HTK formula)
#[inline]
pub fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}

/// A bank of triangular mel filters over the bins of an `n_fft`-point FFT.
#[derive(Debug, Clone)]
pub struct MelFilterbank {
    /// Weights indexed `[mel][bin]`
    weights: Vec<Vec<f32>>,
}

impl MelFilterbank {
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize) -> Self {
        let num_bins = n_fft / 2 + 1;
        let bin_hz = sample_rate as f32 / n_fft as f32;
        let max_mel = hz_to_mel(sample_rate as f32 / 2.0);

        // n_mels + 2 edge frequencies
        let edges: Vec<f32> = (0..n_mels + 2)
            .map(|i| mel_to_hz(max_mel * i as f32 / (n_mels + 1) as f32))
            .collect();

        let weights = (0..n_mels)
            .map(|m| {
                let (lo, center, hi) = (edges[m], edges[m + 1], edges[m + 2]);
                let norm = 2.0 / (hi - lo).max(f32::EPSILON);
                (0..num_bins)
                    .map(|k| {
                        let f = k as f32 * bin_hz;
                        let rising = (f - lo) / (center - lo).max(f32::EPSILON);
                        let falling = (hi - f) / (hi - center).max(f32::EPSILON);
                        rising.min(falling).max(0.0) * norm
                    })
                    .collect()
            })
            .collect();

        Self { weights }
    }

    pub fn n_mels(&self) -> usize {
        self.weights.len()
    }

    /// Project one power spectrum frame onto the mel bands
    pub fn apply(&self, power: &[f32]) -> Vec<f32> {
        self.weights
            .iter()
            .map(|band| band.iter().zip(power).map(|(w, p)| w * p).sum())
            .collect()
    }
}
