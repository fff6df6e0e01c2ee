//! Energy measurement helpers.
//!
//! The segmenter classifies audio regions by RMS amplitude, the level meter
//! reports RMS at ~10 Hz, and dead-stream detection watches per-frame peaks.
//! All three share the two free functions here.

// ---------------------------------------------------------------------------
// rms
// ---------------------------------------------------------------------------

/// Root-mean-square amplitude of `samples`.
///
/// Returns `0.0` for an empty slice.
///
/// # Example
///
/// ```rust
/// use talknotes::audio::rms;
///
/// assert!((rms(&[0.5_f32; 160]) - 0.5).abs() < 1e-6);
/// assert_eq!(rms(&[]), 0.0);
/// ```
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let mean_sq: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    mean_sq.sqrt()
}

// ---------------------------------------------------------------------------
// peak
// ---------------------------------------------------------------------------

/// Maximum absolute amplitude in `samples`.
///
/// Returns `0.0` for an empty slice.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
