//! Conversion of raw capture buffers into the 16 kHz mono stream everything
//! downstream expects.
//!
//! cpal hands over whatever the device produces — interleaved channels at
//! 44.1 or 48 kHz.  [`stereo_to_mono`] averages the channels of each
//! interleaved frame; [`resample_to_16k`] linearly interpolates to
//! [`TARGET_RATE`].  Linear interpolation is sufficient for speech headed
//! into a recognizer; this is not a playback path.

use super::source::TARGET_RATE;

// ---------------------------------------------------------------------------
// stereo_to_mono
// ---------------------------------------------------------------------------

/// Average interleaved channels down to one.
///
/// Output length is `samples.len() / channels`; a trailing partial frame is
/// dropped.  Mono input comes back as an owned copy, zero channels as an
/// empty vector.
pub fn stereo_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels == 0 {
        return Vec::new();
    }
    if channels == 1 {
        return samples.to_vec();
    }
    let n = channels as usize;
    samples
        .chunks_exact(n)
        .map(|frame| frame.iter().sum::<f32>() / n as f32)
        .collect()
}

// ---------------------------------------------------------------------------
// resample_to_16k
// ---------------------------------------------------------------------------

/// Linearly interpolate mono `samples` from `source_rate` Hz to
/// [`TARGET_RATE`].
///
/// Input already at 16 kHz is copied through untouched.  The output holds
/// `ceil(samples.len() * 16_000 / source_rate)` samples; the final output
/// sample clamps to the last input sample rather than reading past the end.
pub fn resample_to_16k(samples: &[f32], source_rate: u32) -> Vec<f32> {
    if source_rate == TARGET_RATE || samples.is_empty() {
        return samples.to_vec();
    }

    let step = source_rate as f64 / TARGET_RATE as f64;
    let out_len = (samples.len() as f64 / step).ceil() as usize;
    let last = samples.len() - 1;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let pos = i as f64 * step;
        let idx = pos as usize;
        let frac = (pos - idx as f64) as f32;
        let a = samples[idx.min(last)];
        let b = samples[(idx + 1).min(last)];
        out.push(a + (b - a) * frac);
    }

    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| i as f32 / len as f32).collect()
    }

    // ---- stereo_to_mono ----------------------------------------------------

    #[test]
    fn mono_input_passes_through() {
        let input = vec![0.1_f32, -0.2, 0.3];
        assert_eq!(stereo_to_mono(&input, 1), input);
    }

    #[test]
    fn stereo_frames_are_averaged() {
        let input = vec![1.0_f32, -1.0, 0.5, 0.5];
        let out = stereo_to_mono(&input, 2);
        assert_eq!(out.len(), 2);
        assert!((out[0]).abs() < 1e-6);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn three_channel_frames_are_averaged() {
        let input = vec![0.3_f32, 0.6, 0.9, -0.3, -0.6, -0.9];
        let out = stereo_to_mono(&input, 3);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.6).abs() < 1e-6);
        assert!((out[1] + 0.6).abs() < 1e-6);
    }

    #[test]
    fn trailing_partial_frame_is_dropped() {
        let out = stereo_to_mono(&[0.1_f32, 0.2, 0.3], 2);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn zero_channels_yields_empty() {
        assert!(stereo_to_mono(&[1.0_f32, 2.0], 0).is_empty());
    }

    // ---- resample_to_16k ---------------------------------------------------

    #[test]
    fn already_16k_is_copied_unchanged() {
        let input = ramp(160);
        assert_eq!(resample_to_16k(&input, 16_000), input);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert!(resample_to_16k(&[], 48_000).is_empty());
    }

    #[test]
    fn downsampling_a_ramp_picks_exact_points() {
        // A linear ramp survives linear interpolation exactly: 48 kHz → 16 kHz
        // keeps every third sample.
        let input = ramp(480);
        let out = resample_to_16k(&input, 48_000);
        assert_eq!(out.len(), 160);
        for (i, &s) in out.iter().enumerate() {
            let expected = input[i * 3];
            assert!((s - expected).abs() < 1e-6, "sample {i}: {s} vs {expected}");
        }
    }

    #[test]
    fn upsampling_a_ramp_interpolates_midpoints() {
        // 8 kHz → 16 kHz doubles the length; odd outputs sit halfway between
        // neighbouring inputs.
        let input = ramp(80);
        let out = resample_to_16k(&input, 8_000);
        assert_eq!(out.len(), 160);
        let mid = (input[0] + input[1]) / 2.0;
        assert!((out[1] - mid).abs() < 1e-6);
    }

    #[test]
    fn fractional_ratio_length_is_close() {
        // 44.1 kHz: 1 s of input becomes ~16 000 output samples.
        let out = resample_to_16k(&vec![0.0_f32; 44_100], 44_100);
        assert!(out.len().abs_diff(16_000) <= 1, "got {}", out.len());
    }

    #[test]
    fn dc_signal_keeps_its_amplitude() {
        let out = resample_to_16k(&vec![0.5_f32; 480], 48_000);
        for &s in &out {
            assert!((s - 0.5).abs() < 1e-5, "amplitude drift: {s}");
        }
    }
}
