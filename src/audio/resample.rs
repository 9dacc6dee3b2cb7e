//! Channel downmix and sample-rate conversion.
//!
//! The STT engine requires **16 kHz mono `f32`** audio while capture devices
//! deliver whatever rate and channel layout the hardware prefers.  This
//! module provides the conversion steps:
//!
//! 1. [`downmix_to_mono`] — average any number of interleaved channels.
//! 2. [`sanitize`] — zero out non-finite samples from misbehaving drivers.
//! 3. [`Resampler`] — deterministic rate conversion: an anti-aliasing FIR
//!    low-pass when decimating, then linear interpolation with absolute
//!    index math so no phase error accumulates over long buffers.
//!
//! The output length contract is exact: `n` input samples become
//! `round(n * target_rate / source_rate)` output samples.

use std::f32::consts::PI;

// Practical device-rate bounds; rates outside this range are treated as
// unconvertible and passed through untouched.
const MIN_SOURCE_RATE: u32 = 2_000;
const MAX_SOURCE_RATE: u32 = 1_600_000;
const MAX_FIR_TAPS: usize = 129;

// ---------------------------------------------------------------------------
// downmix_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging channels.
///
/// The output length is `samples.len() / channels`.
///
/// * If `channels == 1` the input slice is returned as an owned `Vec` with
///   no averaging (fast path).
/// * If `channels == 0` an empty vector is returned.
///
/// # Example
///
/// ```rust
/// use voicewire::audio::downmix_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, -0.2]; // L R L R
/// let mono = downmix_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[0] - 0.0).abs() < 1e-6);
/// assert!((mono[1] - 0.0).abs() < 1e-6);
/// ```
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    let mut mono = Vec::new();
    downmix_into(&mut mono, samples, channels);
    mono
}

/// Allocation-free downmix: clears `dst` and fills it with the mono mix.
///
/// Used from the capture callback with a preallocated scratch buffer so the
/// real-time path never allocates once warmed up.  A trailing partial frame
/// is averaged over the channels actually present.
pub fn downmix_into(dst: &mut Vec<f32>, samples: &[f32], channels: u16) {
    dst.clear();
    match channels {
        0 => {}
        1 => dst.extend_from_slice(samples),
        n => {
            let n = n as usize;
            let mut acc = 0.0f32;
            let mut count = 0usize;
            for &sample in samples {
                acc += sample;
                count += 1;
                if count == n {
                    dst.push(acc / n as f32);
                    acc = 0.0;
                    count = 0;
                }
            }
            if count > 0 {
                dst.push(acc / count as f32);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// sanitize
// ---------------------------------------------------------------------------

/// Replace non-finite samples (NaN / ±Inf) with `0.0` in place.
///
/// Returns the number of samples replaced so callers can log it; the
/// condition is recovered locally and never escalated.
pub fn sanitize(samples: &mut [f32]) -> usize {
    let mut replaced = 0;
    for sample in samples.iter_mut() {
        if !sample.is_finite() {
            *sample = 0.0;
            replaced += 1;
        }
    }
    replaced
}

// ---------------------------------------------------------------------------
// Resampler
// ---------------------------------------------------------------------------

/// Deterministic sample-rate converter between two fixed rates.
///
/// Construction precomputes the FIR taps (when decimating); conversion is
/// then a pure function of the input, so the same input always produces the
/// same output.
///
/// # Example
///
/// ```rust
/// use voicewire::audio::Resampler;
///
/// // Downsample from 48 kHz to 16 kHz (ratio = 1/3)
/// let rs = Resampler::new(48_000, 16_000);
/// let input = vec![0.5_f32; 480]; // 10 ms @ 48 kHz
/// let out = rs.resample(&input);
/// assert_eq!(out.len(), 160); // 10 ms @ 16 kHz
/// ```
pub struct Resampler {
    source_rate: u32,
    target_rate: u32,
    /// Anti-aliasing taps; `None` when not decimating or rates are equal.
    fir: Option<Vec<f32>>,
}

impl Resampler {
    /// Create a converter from `source_rate` Hz to `target_rate` Hz.
    pub fn new(source_rate: u32, target_rate: u32) -> Self {
        let fir = if source_rate > target_rate
            && (MIN_SOURCE_RATE..=MAX_SOURCE_RATE).contains(&source_rate)
        {
            let cutoff = (target_rate as f32 * 0.5 / source_rate as f32).min(0.499);
            Some(design_low_pass(cutoff, fir_tap_count(source_rate, target_rate)))
        } else {
            None
        };
        Self {
            source_rate,
            target_rate,
            fir,
        }
    }

    /// Source rate in Hz.
    pub fn source_rate(&self) -> u32 {
        self.source_rate
    }

    /// Target rate in Hz.
    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Exact output length for `n` input samples:
    /// `round(n * target_rate / source_rate)`.
    pub fn output_len(&self, n: usize) -> usize {
        if self.source_rate == self.target_rate || self.source_rate == 0 {
            return n;
        }
        let ratio = self.target_rate as f64 / self.source_rate as f64;
        (n as f64 * ratio).round() as usize
    }

    /// Convert `mono` from the source rate to the target rate.
    ///
    /// * Equal rates (or a zero source rate) are a no-op copy.
    /// * Empty input produces empty output.
    /// * The output length always equals [`output_len`](Self::output_len).
    pub fn resample(&self, mono: &[f32]) -> Vec<f32> {
        if self.source_rate == self.target_rate || self.source_rate == 0 || mono.is_empty() {
            return mono.to_vec();
        }

        let filtered;
        let input: &[f32] = match &self.fir {
            Some(taps) => {
                filtered = convolve(mono, taps);
                &filtered
            }
            None => mono,
        };

        let ratio = self.target_rate as f64 / self.source_rate as f64;
        let output_len = self.output_len(mono.len());
        let mut output = Vec::with_capacity(output_len);

        for i in 0..output_len {
            // Absolute position math: each output index maps straight back
            // to a source position, so there is no accumulated drift.
            let src_pos = i as f64 / ratio;
            let idx = src_pos as usize;
            let frac = (src_pos - idx as f64) as f32;

            let sample = if idx + 1 < input.len() {
                input[idx] * (1.0 - frac) + input[idx + 1] * frac
            } else if idx < input.len() {
                input[idx]
            } else {
                *input.last().unwrap_or(&0.0)
            };
            output.push(sample);
        }

        output
    }
}

// ---------------------------------------------------------------------------
// FIR low-pass
// ---------------------------------------------------------------------------

/// Tap count scaled to the decimation ratio: short for near-equal rates,
/// longer when collapsing 48 kHz into 16 kHz.  Always odd.
fn fir_tap_count(source_rate: u32, target_rate: u32) -> usize {
    let decimation = source_rate as f32 / target_rate as f32;
    let mut taps = (decimation * 4.0).ceil().max(11.0) as usize;
    if taps % 2 == 0 {
        taps += 1;
    }
    taps.min(MAX_FIR_TAPS)
}

/// Normalized Hamming-windowed sinc taps for the anti-aliasing filter.
fn design_low_pass(normalized_cutoff: f32, taps: usize) -> Vec<f32> {
    let mut coeffs = Vec::with_capacity(taps);
    let m = (taps - 1) as f32;

    for n in 0..taps {
        let centered = n as f32 - m / 2.0;
        let x = 2.0 * PI * normalized_cutoff * centered;
        let sinc = if centered == 0.0 {
            2.0 * normalized_cutoff
        } else {
            (2.0 * normalized_cutoff * x.sin()) / x
        };
        let window = if taps <= 1 {
            1.0
        } else {
            0.54 - 0.46 * ((2.0 * PI * n as f32) / m).cos()
        };
        coeffs.push(sinc * window);
    }

    let sum: f32 = coeffs.iter().sum();
    if sum != 0.0 {
        for coeff in coeffs.iter_mut() {
            *coeff /= sum;
        }
    }

    coeffs
}

/// Zero-padded convolution keeping the output aligned with the input.
fn convolve(input: &[f32], taps: &[f32]) -> Vec<f32> {
    let half = taps.len() / 2;
    let mut output = Vec::with_capacity(input.len());

    for n in 0..input.len() {
        let mut acc = 0.0;
        for (k, coeff) in taps.iter().enumerate() {
            if let Some(idx) = (n + k).checked_sub(half) {
                if let Some(sample) = input.get(idx) {
                    acc += *sample * coeff;
                }
            }
        }
        output.push(acc);
    }

    output
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
