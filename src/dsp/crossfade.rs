//! Crossfades and fade ramps.
//!
//! Every operation comes in two forms: an `*_in_place` function that edits
//! channel data it exclusively borrows, and a function that takes a shared
//! [`AudioBuffer`] and returns a new one.

use std::f32::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use crate::engine::buffer::{ms_to_samples, AudioBuffer};
use crate::error::{LoopGenError, Result};

// ============================================================================
// Curves
// ============================================================================

/// Shape of a crossfade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveShape {
    /// Straight ramps; the summed gain dips mid-fade for uncorrelated material
    Linear,
    /// sin/cos ramps with constant summed power
    #[default]
    EqualPower,
}

/// Gain bounds of a fade
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FadeLevels {
    pub min: f32,
    pub max: f32,
}

impl Default for FadeLevels {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

impl FadeLevels {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min) || !(0.0..=1.0).contains(&self.max) {
            return Err(LoopGenError::invalid_parameter(
                "fade_levels",
                format!("{}..{}", self.min, self.max),
                "levels within [0, 1]",
            ));
        }
        if self.min >= self.max {
            return Err(LoopGenError::invalid_parameter(
                "fade_levels",
                format!("{}..{}", self.min, self.max),
                "min < max",
            ));
        }
        Ok(())
    }
}

/// `n` evenly spaced values from `start` to `end`, both included
fn linspace(start: f32, end: f32, n: usize) -> Vec<f32> {
    match n {
        0 => vec![],
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f32;
            let mut values: Vec<f32> = (0..n).map(|i| start + step * i as f32).collect();
            values[n - 1] = end;
            values
        }
    }
}

/// Fade-in and fade-out gain curves of length `n`.
///
/// Equal-power curves are `sin θ` / `cos θ` with `θ` running from
/// `min·π/2` to `max·π/2`. Linear curves ramp from `min` to `max` and back.
pub fn crossfade_curves(
    n: usize,
    shape: CurveShape,
    levels: FadeLevels,
) -> Result<(Vec<f32>, Vec<f32>)> {
    levels.validate()?;
    Ok(match shape {
        CurveShape::EqualPower => {
            let theta = linspace(levels.min * FRAC_PI_2, levels.max * FRAC_PI_2, n);
            (
                theta.iter().map(|t| t.sin()).collect(),
                theta.iter().map(|t| t.cos()).collect(),
            )
        }
        CurveShape::Linear => (
            linspace(levels.min, levels.max, n),
            linspace(levels.max, levels.min, n),
        ),
    })
}

fn frame_len(channels: &[Vec<f32>]) -> Result<usize> {
    match channels.first() {
        Some(ch) => Ok(ch.len()),
        None => Err(LoopGenError::InvalidAudio {
            reason: "no channels to process".to_string(),
        }),
    }
}

// ============================================================================
// Single-buffer crossfade (tail into head)
// ============================================================================

/// Blend the first `n` samples into the last `n`: the tail becomes
/// `tail * fade_out + head * fade_in`. Length is unchanged.
///
/// # Errors
/// `CrossfadeTooLong` if `n >= len / 2`
pub fn crossfade_samples_in_place(
    channels: &mut [Vec<f32>],
    n: usize,
    shape: CurveShape,
    levels: FadeLevels,
) -> Result<()> {
    let len = frame_len(channels)?;
    if n >= len / 2 {
        return Err(LoopGenError::CrossfadeTooLong {
            requested: n,
            available: len / 2,
        });
    }
    let (fade_in, fade_out) = crossfade_curves(n, shape, levels)?;
    let tail = len - n;
    for ch in channels.iter_mut() {
        for i in 0..n {
            ch[tail + i] = ch[tail + i] * fade_out[i] + ch[i] * fade_in[i];
        }
    }
    Ok(())
}

/// Millisecond form of [`crossfade_samples_in_place`]
pub fn crossfade_in_place(
    channels: &mut [Vec<f32>],
    sample_rate: u32,
    duration_ms: u64,
    shape: CurveShape,
    levels: FadeLevels,
) -> Result<()> {
    crossfade_samples_in_place(channels, ms_to_samples(duration_ms, sample_rate), shape, levels)
}

/// Copying tail-into-head crossfade
pub fn crossfade(buffer: &AudioBuffer, duration_ms: u64, shape: CurveShape) -> Result<AudioBuffer> {
    let mut channels = buffer.samples().to_vec();
    crossfade_in_place(
        &mut channels,
        buffer.sample_rate(),
        duration_ms,
        shape,
        FadeLevels::default(),
    )?;
    AudioBuffer::new(channels, buffer.sample_rate())
}

/// Loop-closing crossfade: blend the first `n` samples into the last `n`,
/// then drop those first `n`.
///
/// The loop now ends on the blended copy of `head[n - 1]` and wraps to
/// `head[n]`, so playback runs straight through the seam. The result is `n`
/// samples shorter.
///
/// # Errors
/// `CrossfadeTooLong` if `n >= len / 2`
pub fn loop_crossfade_samples_in_place(
    channels: &mut [Vec<f32>],
    n: usize,
    shape: CurveShape,
    levels: FadeLevels,
) -> Result<()> {
    crossfade_samples_in_place(channels, n, shape, levels)?;
    for ch in channels.iter_mut() {
        ch.drain(..n);
    }
    Ok(())
}

/// Millisecond form of [`loop_crossfade_samples_in_place`]
pub fn loop_crossfade_in_place(
    channels: &mut [Vec<f32>],
    sample_rate: u32,
    duration_ms: u64,
    shape: CurveShape,
    levels: FadeLevels,
) -> Result<()> {
    loop_crossfade_samples_in_place(
        channels,
        ms_to_samples(duration_ms, sample_rate),
        shape,
        levels,
    )
}

// ============================================================================
// Cross-buffer crossfade
// ============================================================================

/// Join two buffers with an overlap of `duration_ms`.
///
/// The result is `a[..len-n] ++ (a_tail * fade_out + b_head * fade_in) ++ b[n..]`.
///
/// # Errors
/// * `CrossfadeTooLong` - either buffer is shorter than the overlap
/// * `ChannelMismatch` - channel counts differ
/// * `InvalidParameter` - sample rates differ
pub fn crossfade_join(
    a: &AudioBuffer,
    b: &AudioBuffer,
    duration_ms: u64,
    shape: CurveShape,
) -> Result<AudioBuffer> {
    if a.channels() != b.channels() {
        return Err(LoopGenError::ChannelMismatch {
            left: a.channels(),
            right: b.channels(),
        });
    }
    if a.sample_rate() != b.sample_rate() {
        return Err(LoopGenError::invalid_parameter(
            "sample_rate",
            b.sample_rate(),
            format!("{} (matching the first buffer)", a.sample_rate()),
        ));
    }

    let n = ms_to_samples(duration_ms, a.sample_rate());
    let shortest = a.len().min(b.len());
    if n > shortest {
        return Err(LoopGenError::CrossfadeTooLong {
            requested: n,
            available: shortest,
        });
    }

    let (fade_in, fade_out) = crossfade_curves(n, shape, FadeLevels::default())?;
    let split = a.len() - n;
    let channels = a
        .samples()
        .iter()
        .zip(b.samples())
        .map(|(left, right)| {
            let mut joined = Vec::with_capacity(left.len() + right.len() - n);
            joined.extend_from_slice(&left[..split]);
            joined.extend(
                (0..n).map(|i| left[split + i] * fade_out[i] + right[i] * fade_in[i]),
            );
            joined.extend_from_slice(&right[n..]);
            joined
        })
        .collect();

    AudioBuffer::new(channels, a.sample_rate())
}

// ============================================================================
// Fades
// ============================================================================

/// Linear fade-in over the first `min(n, len)` samples
pub fn fade_in_samples_in_place(channels: &mut [Vec<f32>], n: usize, levels: FadeLevels) -> Result<()> {
    levels.validate()?;
    let n = n.min(frame_len(channels)?);
    let ramp = linspace(levels.min, levels.max, n);
    for ch in channels.iter_mut() {
        for (sample, gain) in ch.iter_mut().zip(&ramp) {
            *sample *= gain;
        }
    }
    Ok(())
}

/// Linear fade-out over the last `min(n, len)` samples
pub fn fade_out_samples_in_place(channels: &mut [Vec<f32>], n: usize, levels: FadeLevels) -> Result<()> {
    levels.validate()?;
    let len = frame_len(channels)?;
    let n = n.min(len);
    let ramp = linspace(levels.max, levels.min, n);
    for ch in channels.iter_mut() {
        for (sample, gain) in ch[len - n..].iter_mut().zip(&ramp) {
            *sample *= gain;
        }
    }
    Ok(())
}

/// Millisecond form of [`fade_in_samples_in_place`]
pub fn fade_in_in_place(
    channels: &mut [Vec<f32>],
    sample_rate: u32,
    duration_ms: u64,
    levels: FadeLevels,
) -> Result<()> {
    fade_in_samples_in_place(channels, ms_to_samples(duration_ms, sample_rate), levels)
}

/// Millisecond form of [`fade_out_samples_in_place`]
pub fn fade_out_in_place(
    channels: &mut [Vec<f32>],
    sample_rate: u32,
    duration_ms: u64,
    levels: FadeLevels,
) -> Result<()> {
    fade_out_samples_in_place(channels, ms_to_samples(duration_ms, sample_rate), levels)
}

/// Copying linear fade-in
pub fn fade_in(buffer: &AudioBuffer, duration_ms: u64, levels: FadeLevels) -> Result<AudioBuffer> {
    let mut channels = buffer.samples().to_vec();
    fade_in_in_place(&mut channels, buffer.sample_rate(), duration_ms, levels)?;
    AudioBuffer::new(channels, buffer.sample_rate())
}

/// Copying linear fade-out
pub fn fade_out(buffer: &AudioBuffer, duration_ms: u64, levels: FadeLevels) -> Result<AudioBuffer> {
    let mut channels = buffer.samples().to_vec();
    fade_out_in_place(&mut channels, buffer.sample_rate(), duration_ms, levels)?;
    AudioBuffer::new(channels, buffer.sample_rate())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use test_case::test_case;

    fn constant(value: f32, len: usize, channels: usize) -> AudioBuffer {
        AudioBuffer::new(vec![vec![value; len]; channels], 1000).unwrap()
    }

    // ------------------------------------------------------------------------
    // Curve tests
    // ------------------------------------------------------------------------

    #[test_case(FadeLevels::default() ; "full range")]
    #[test_case(FadeLevels { min: 0.2, max: 0.9 } ; "partial range")]
    fn test_equal_power_is_constant_power(levels: FadeLevels) {
        let (fade_in, fade_out) = crossfade_curves(257, CurveShape::EqualPower, levels).unwrap();
        for (a, b) in fade_in.iter().zip(&fade_out) {
            assert_abs_diff_eq!(a * a + b * b, 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_curve_endpoints() {
        let (fade_in, fade_out) =
            crossfade_curves(11, CurveShape::EqualPower, FadeLevels::default()).unwrap();
        assert_abs_diff_eq!(fade_in[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(fade_in[10], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(fade_out[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(fade_out[10], 0.0, epsilon = 1e-6);

        let (fade_in, fade_out) =
            crossfade_curves(5, CurveShape::Linear, FadeLevels::default()).unwrap();
        assert_eq!(fade_in, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(fade_out, vec![1.0, 0.75, 0.5, 0.25, 0.0]);
    }

    #[test]
    fn test_invalid_levels_rejected() {
        let levels = FadeLevels { min: 0.8, max: 0.2 };
        assert!(crossfade_curves(4, CurveShape::Linear, levels).is_err());
        let levels = FadeLevels { min: 0.0, max: 1.5 };
        assert!(levels.validate().is_err());
    }

    // ------------------------------------------------------------------------
    // Single-buffer crossfade
    // ------------------------------------------------------------------------

    #[test]
    fn test_crossfade_blends_head_into_tail() {
        let head_value = 1.0;
        let mut samples = vec![0.0; 100];
        samples[..10].iter_mut().for_each(|s| *s = head_value);
        let buffer = AudioBuffer::new(vec![samples], 1000).unwrap();

        let out = crossfade(&buffer, 10, CurveShape::Linear).unwrap();
        assert_eq!(out.len(), 100);
        // Tail ends fully on the head material
        assert_abs_diff_eq!(out.channel(0)[99], head_value, epsilon = 1e-6);
        assert_abs_diff_eq!(out.channel(0)[90], 0.0, epsilon = 1e-6);
        // Head untouched
        assert_eq!(&out.channel(0)[..10], &buffer.channel(0)[..10]);
    }

    #[test]
    fn test_crossfade_too_long() {
        let buffer = constant(0.5, 100, 2);
        let err = crossfade(&buffer, 50, CurveShape::EqualPower).unwrap_err();
        assert_eq!(err.error_code(), "CROSSFADE_TOO_LONG");
        assert!(crossfade(&buffer, 49, CurveShape::EqualPower).is_ok());
    }

    #[test]
    fn test_crossfade_leaves_original_untouched() {
        let buffer = constant(0.5, 100, 1);
        let _ = crossfade(&buffer, 20, CurveShape::Linear).unwrap();
        assert!(buffer.channel(0).iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_loop_crossfade_runs_through_seam() {
        // Ramp with a hard jump from the last sample back to the first
        let mut channels = vec![(0..200).map(|i| i as f32 / 200.0).collect::<Vec<f32>>()];
        let original = channels[0].clone();

        loop_crossfade_samples_in_place(&mut channels, 40, CurveShape::EqualPower, FadeLevels::default())
            .unwrap();
        let looped = &channels[0];

        assert_eq!(looped.len(), 160);
        assert_eq!(looped[0], original[40]);
        assert_abs_diff_eq!(looped[159], original[39], epsilon = 1e-6);
        assert!((looped[159] - looped[0]).abs() <= 1.0 / 200.0 + 1e-6);
    }

    #[test]
    fn test_loop_crossfade_too_long() {
        let mut channels = vec![vec![0.5; 100]; 2];
        let err = loop_crossfade_in_place(&mut channels, 1000, 50, CurveShape::EqualPower, FadeLevels::default())
            .unwrap_err();
        assert_eq!(err.error_code(), "CROSSFADE_TOO_LONG");
        assert_eq!(channels[0].len(), 100);
    }

    // ------------------------------------------------------------------------
    // Cross-buffer crossfade
    // ------------------------------------------------------------------------

    #[test]
    fn test_join_length_and_content() {
        let a = constant(1.0, 100, 2);
        let b = constant(-1.0, 80, 2);
        let joined = crossfade_join(&a, &b, 20, CurveShape::Linear).unwrap();

        assert_eq!(joined.len(), 100 + 80 - 20);
        assert_eq!(joined.channel(0)[0], 1.0);
        assert_eq!(joined.channel(1)[159], -1.0);
        // Midpoint of a linear blend between +1 and -1
        let mid = joined.channel(0)[80 + 10];
        assert!(mid.abs() < 0.1, "mid {}", mid);
    }

    #[test]
    fn test_join_rejects_mismatches() {
        let stereo = constant(0.0, 100, 2);
        let mono = constant(0.0, 100, 1);
        assert_eq!(
            crossfade_join(&stereo, &mono, 10, CurveShape::EqualPower)
                .unwrap_err()
                .error_code(),
            "CHANNEL_MISMATCH"
        );
        let short = constant(0.0, 5, 2);
        assert_eq!(
            crossfade_join(&stereo, &short, 10, CurveShape::EqualPower)
                .unwrap_err()
                .error_code(),
            "CROSSFADE_TOO_LONG"
        );
    }

    // ------------------------------------------------------------------------
    // Fades
    // ------------------------------------------------------------------------

    #[test]
    fn test_fades_ramp_to_levels() {
        let buffer = constant(1.0, 100, 2);
        let faded = fade_in(&buffer, 11, FadeLevels::default()).unwrap();
        assert_eq!(faded.channel(0)[0], 0.0);
        assert_abs_diff_eq!(faded.channel(1)[5], 0.5, epsilon = 1e-6);
        assert_eq!(faded.channel(0)[11], 1.0);

        let faded = fade_out(&buffer, 11, FadeLevels { min: 0.5, max: 1.0 }).unwrap();
        assert_eq!(faded.channel(0)[88], 1.0);
        assert_abs_diff_eq!(faded.channel(0)[99], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_fade_longer_than_buffer_is_capped() {
        let mut channels = vec![vec![1.0; 10]];
        fade_out_samples_in_place(&mut channels, 1000, FadeLevels::default()).unwrap();
        assert_eq!(channels[0][0], 1.0);
        assert_eq!(channels[0][9], 0.0);
    }
}
