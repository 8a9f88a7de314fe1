//! Built-in [`SignalAnalysis`] backend on top of `rustfft`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use super::beat::{track_beats, BeatTrack};
use super::features;
use super::mel::MelFilterbank;
use super::onset::{peak_pick, positive_flux, PeakPickParams};
use super::stft::{bin_frequencies, hann_window, magnitude_spectrogram, power_to_db};
use super::{SignalAnalysis, Transients};
use crate::error::{LoopGenError, Result};

/// STFT geometry used for whole-signal analysis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerSettings {
    /// FFT size (default: 2048)
    pub n_fft: usize,
    /// Hop between frames (default: 512)
    pub hop_length: usize,
    /// Mel bands (default: 128)
    pub n_mels: usize,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
        }
    }
}

impl AnalyzerSettings {
    pub fn validate(&self) -> Result<()> {
        if self.n_fft < 16 {
            return Err(LoopGenError::invalid_parameter("n_fft", self.n_fft, ">= 16"));
        }
        if self.hop_length == 0 || self.hop_length > self.n_fft {
            return Err(LoopGenError::invalid_parameter(
                "hop_length",
                self.hop_length,
                format!("1..={}", self.n_fft),
            ));
        }
        if self.n_mels == 0 {
            return Err(LoopGenError::invalid_parameter("n_mels", self.n_mels, "> 0"));
        }
        Ok(())
    }
}

type FilterbankKey = (u32, usize, usize);

/// STFT-based analyzer with cached FFT plans and mel filterbanks
pub struct SpectralAnalyzer {
    settings: AnalyzerSettings,
    plans: Mutex<HashMap<usize, Arc<dyn Fft<f32>>>>,
    filterbanks: Mutex<HashMap<FilterbankKey, Arc<MelFilterbank>>>,
}

impl SpectralAnalyzer {
    pub fn new() -> Self {
        Self::with_settings(AnalyzerSettings::default())
    }

    pub fn with_settings(settings: AnalyzerSettings) -> Self {
        Self {
            settings,
            plans: Mutex::new(HashMap::new()),
            filterbanks: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    fn plan(&self, n_fft: usize) -> Result<Arc<dyn Fft<f32>>> {
        let mut plans = self.plans.lock().map_err(|_| LoopGenError::Analysis {
            reason: "FFT plan cache poisoned".to_string(),
        })?;
        let plan = plans
            .entry(n_fft)
            .or_insert_with(|| FftPlanner::new().plan_fft_forward(n_fft));
        Ok(Arc::clone(plan))
    }

    fn filterbank(&self, sample_rate: u32, n_fft: usize) -> Result<Arc<MelFilterbank>> {
        let mut banks = self.filterbanks.lock().map_err(|_| LoopGenError::Analysis {
            reason: "mel filterbank cache poisoned".to_string(),
        })?;
        let bank = banks
            .entry((sample_rate, n_fft, self.settings.n_mels))
            .or_insert_with(|| {
                Arc::new(MelFilterbank::new(sample_rate, n_fft, self.settings.n_mels))
            });
        Ok(Arc::clone(bank))
    }

    fn magnitudes(&self, signal: &[f32], n_fft: usize, hop: usize) -> Result<Vec<Vec<f32>>> {
        if signal.is_empty() {
            return Err(LoopGenError::Analysis {
                reason: "cannot analyze an empty signal".to_string(),
            });
        }
        if n_fft == 0 || hop == 0 {
            return Err(LoopGenError::invalid_parameter(
                "n_fft/hop_length",
                format!("{}/{}", n_fft, hop),
                "both > 0",
            ));
        }
        let fft = self.plan(n_fft)?;
        Ok(magnitude_spectrogram(signal, fft.as_ref(), &hann_window(n_fft), hop))
    }

    fn mel_power(
        &self,
        signal: &[f32],
        sample_rate: u32,
        n_fft: usize,
        hop: usize,
    ) -> Result<Vec<Vec<f32>>> {
        let magnitudes = self.magnitudes(signal, n_fft, hop)?;
        let bank = self.filterbank(sample_rate, n_fft)?;
        Ok(magnitudes
            .iter()
            .map(|frame| {
                let power: Vec<f32> = frame.iter().map(|m| m * m).collect();
                bank.apply(&power)
            })
            .collect())
    }

    /// Onset strength: positive flux of the log-power mel spectrogram
    pub fn onset_envelope(&self, mono: &[f32], sample_rate: u32) -> Result<Vec<f32>> {
        let AnalyzerSettings {
            n_fft, hop_length, ..
        } = self.settings;
        let mel = self.mel_power(mono, sample_rate, n_fft, hop_length)?;
        Ok(positive_flux(&power_to_db(&mel, 1.0)))
    }

    /// Spectral flux of the magnitude spectrogram in dB relative to its peak
    pub fn flux_envelope(&self, mono: &[f32]) -> Result<Vec<f32>> {
        let AnalyzerSettings {
            n_fft, hop_length, ..
        } = self.settings;
        let power: Vec<Vec<f32>> = self
            .magnitudes(mono, n_fft, hop_length)?
            .into_iter()
            .map(|frame| frame.into_iter().map(|m| m * m).collect())
            .collect();
        let reference = power
            .iter()
            .flat_map(|f| f.iter())
            .copied()
            .fold(0.0_f32, f32::max);
        Ok(positive_flux(&power_to_db(&power, reference)))
    }

    fn peak_params(&self, sample_rate: u32) -> PeakPickParams {
        PeakPickParams::for_frame_rate(sample_rate, self.settings.hop_length)
    }
}

impl Default for SpectralAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SpectralAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralAnalyzer")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl SignalAnalysis for SpectralAnalyzer {
    fn beat_track(&self, mono: &[f32], sample_rate: u32) -> Result<BeatTrack> {
        let envelope = self.onset_envelope(mono, sample_rate)?;
        let hop = self.settings.hop_length;
        let onsets: Vec<usize> = peak_pick(&envelope, &self.peak_params(sample_rate))
            .into_iter()
            .map(|frame| frame * hop)
            .collect();
        let track = track_beats(&envelope, &onsets, hop, sample_rate);
        tracing::debug!(
            onsets = onsets.len(),
            beats = track.len(),
            tempo_bpm = track.tempo_bpm,
            "beat tracking"
        );
        Ok(track)
    }

    fn onset_detect(&self, mono: &[f32], sample_rate: u32) -> Result<Vec<usize>> {
        let envelope = self.onset_envelope(mono, sample_rate)?;
        let hop = self.settings.hop_length;
        Ok(peak_pick(&envelope, &self.peak_params(sample_rate))
            .into_iter()
            .map(|frame| frame * hop)
            .collect())
    }

    fn transients(&self, mono: &[f32], sample_rate: u32) -> Result<Transients> {
        let strength = self.onset_envelope(mono, sample_rate)?;
        let flux = self.flux_envelope(mono)?;
        let combined: Vec<f32> = strength.iter().zip(&flux).map(|(a, b)| a + b).collect();
        Ok(Transients {
            frames: peak_pick(&combined, &self.peak_params(sample_rate)),
            hop_length: self.settings.hop_length,
        })
    }

    fn mel_spectrogram(
        &self,
        segment: &[f32],
        sample_rate: u32,
        n_fft: usize,
        hop_length: usize,
    ) -> Result<Vec<Vec<f32>>> {
        self.mel_power(segment, sample_rate, n_fft, hop_length)
    }

    fn spectral_centroid(&self, mono: &[f32], sample_rate: u32) -> Result<Vec<f32>> {
        let AnalyzerSettings {
            n_fft, hop_length, ..
        } = self.settings;
        let magnitudes = self.magnitudes(mono, n_fft, hop_length)?;
        Ok(features::spectral_centroid(
            &magnitudes,
            &bin_frequencies(n_fft, sample_rate),
        ))
    }

    fn spectral_flatness(&self, mono: &[f32], _sample_rate: u32) -> Result<Vec<f32>> {
        let AnalyzerSettings {
            n_fft, hop_length, ..
        } = self.settings;
        let magnitudes = self.magnitudes(mono, n_fft, hop_length)?;
        Ok(features::spectral_flatness(&magnitudes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const SR: u32 = 44100;

    /// 10 ms decaying 2 kHz burst every `interval` samples starting at `offset`
    fn click_track(len: usize, offset: usize, interval: usize) -> Vec<f32> {
        let mut signal = vec![0.0; len];
        let burst = (SR / 100) as usize;
        let mut pos = offset;
        while pos + burst < len {
            for i in 0..burst {
                let decay = (-(i as f32) / 80.0).exp();
                signal[pos + i] = 0.9 * decay * (2.0 * PI * 2000.0 * i as f32 / SR as f32).cos();
            }
            pos += interval;
        }
        signal
    }

    fn sine(freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / SR as f32).sin())
            .collect()
    }

    #[test]
    fn test_onsets_follow_clicks() {
        let analyzer = SpectralAnalyzer::new();
        let signal = click_track(SR as usize * 3, 11025, 22050);
        let onsets = analyzer.onset_detect(&signal, SR).unwrap();

        assert_eq!(onsets.len(), 6, "onsets: {:?}", onsets);
        for (k, &onset) in onsets.iter().enumerate() {
            let click = 11025 + k * 22050;
            assert!(
                (onset as i64 - click as i64).abs() <= 2048,
                "onset {} too far from click {}",
                onset,
                click
            );
        }
    }

    #[test]
    fn test_beat_track_on_click_track() {
        let analyzer = SpectralAnalyzer::new();
        let signal = click_track(SR as usize * 10, 11025, 22050);
        let track = analyzer.beat_track(&signal, SR).unwrap();

        assert_eq!(track.len(), 20);
        assert!((track.tempo_bpm - 120.0).abs() < 1.0, "tempo {}", track.tempo_bpm);
    }

    #[test]
    fn test_beat_track_ignores_pad_entry() {
        let analyzer = SpectralAnalyzer::new();
        let len = SR as usize * 10;
        let clicks = click_track(len, 11025, 22050);
        let pad = sine(220.0, len);
        let signal: Vec<f32> = clicks.iter().zip(&pad).map(|(c, p)| c + 0.4 * p).collect();

        let track = analyzer.beat_track(&signal, SR).unwrap();
        assert!((track.tempo_bpm - 120.0).abs() < 1.0, "tempo {}", track.tempo_bpm);
        assert!(track.len() >= 16, "beats {}", track.len());
        let span = track.beat_times[15] - track.beat_times[0];
        assert!((span - 7.5).abs() < 0.06, "span {}", span);
    }

    #[test]
    fn test_sine_has_no_transients() {
        let analyzer = SpectralAnalyzer::new();
        let signal = sine(441.0, SR as usize * 2);
        let transients = analyzer.transients(&signal, SR).unwrap();
        assert!(transients.len() <= 1, "transients: {:?}", transients.frames);
    }

    #[test]
    fn test_centroid_tracks_tone_frequency() {
        let analyzer = SpectralAnalyzer::new();
        let centroid = analyzer.spectral_centroid(&sine(1000.0, SR as usize), SR).unwrap();
        let middle = centroid[centroid.len() / 2];
        assert!((middle - 1000.0).abs() < 50.0, "centroid {}", middle);
    }

    #[test]
    fn test_flatness_separates_tone_from_noise() {
        use rand::{rngs::StdRng, Rng, SeedableRng};
        let mut rng = StdRng::seed_from_u64(7);
        let noise: Vec<f32> = (0..SR as usize).map(|_| rng.gen_range(-0.5..0.5)).collect();
        let analyzer = SpectralAnalyzer::new();

        let mean = |v: Vec<f32>| v.iter().sum::<f32>() / v.len() as f32;
        let noise_flatness = mean(analyzer.spectral_flatness(&noise, SR).unwrap());
        let tone_flatness = mean(analyzer.spectral_flatness(&sine(440.0, SR as usize), SR).unwrap());
        assert!(noise_flatness > 0.3, "noise flatness {}", noise_flatness);
        assert!(tone_flatness < 0.05, "tone flatness {}", tone_flatness);
    }

    #[test]
    fn test_mel_spectrogram_shape() {
        let analyzer = SpectralAnalyzer::new();
        let mel = analyzer.mel_spectrogram(&sine(440.0, 2048), SR, 2048, 512).unwrap();
        assert_eq!(mel.len(), 5);
        assert!(mel.iter().all(|frame| frame.len() == 128));
    }

    #[test]
    fn test_empty_signal_is_an_error() {
        let analyzer = SpectralAnalyzer::new();
        assert!(analyzer.spectral_centroid(&[], SR).is_err());
    }

    #[test]
    fn test_settings_validation() {
        assert!(AnalyzerSettings::default().validate().is_ok());
        let bad = AnalyzerSettings {
            hop_length: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
