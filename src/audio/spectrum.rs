//! Short-time-Fourier-transform spectrogram engine.
//!
//! Runs on a fixed analysis cadence, independent of the capture callback.
//! Each [`tick`](SpectrogramEngine::tick) reads the most recent window from
//! the ring buffer and produces one [`SpectrogramFrame`]: Hann window →
//! forward FFT → logarithmic frequency binning onto display rows →
//! noise-floor gating → dB normalization into `[0, 1]`.
//!
//! Frames are ephemeral — the caller keeps the latest and drops the rest.
//! A slow or missed tick is simply skipped; there is no queue.
//!
//! # Noise floor
//!
//! [`NoiseFloorEstimate`] tracks a running RMS baseline built only from
//! low-energy windows, so ambient hiss converges into the floor and renders
//! as visual silence while speech stays above the gate.  The estimate is
//! mutated here and read-only everywhere else.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

use crate::audio::buffer::SharedRingBuffer;
use crate::config::SpectrumConfig;

/// Bins at or below this magnitude are always rendered silent, even before
/// the running floor has converged.
const MIN_BIN_FLOOR: f32 = 1e-4;

/// Display dynamic range: bin levels are mapped from `[-40 dB, 0 dB]`
/// relative to the reference level onto `[0, 1]`.
const DISPLAY_RANGE_DB: f32 = 40.0;

// ---------------------------------------------------------------------------
// SpectrogramFrame
// ---------------------------------------------------------------------------

/// One analysis tick's worth of display data.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrogramFrame {
    /// Normalized intensity per display row, low frequencies first, each in
    /// `[0.0, 1.0]`.
    pub rows: Vec<f32>,
    /// Monotonic tick counter; lets consumers tell a fresh frame from a
    /// repeat of the one they already drew.
    pub generation: u64,
}

// ---------------------------------------------------------------------------
// NoiseFloorEstimate
// ---------------------------------------------------------------------------

/// Running RMS baseline of the quiet periods between speech.
pub struct NoiseFloorEstimate {
    floor: f32,
    /// Exponential smoothing factor applied to qualifying windows.
    smoothing: f32,
    /// Absolute RMS below which a window counts as "quiet" and may update
    /// the floor.  Speech-level windows never move the estimate.
    quiet_threshold: f32,
}

impl NoiseFloorEstimate {
    fn new(smoothing: f32, quiet_threshold: f32) -> Self {
        Self {
            floor: 0.0,
            smoothing,
            quiet_threshold,
        }
    }

    /// Current baseline RMS.
    pub fn rms(&self) -> f32 {
        self.floor
    }

    fn observe(&mut self, window_rms: f32) {
        if window_rms >= self.quiet_threshold {
            return;
        }
        if self.floor == 0.0 {
            self.floor = window_rms;
        } else {
            self.floor += self.smoothing * (window_rms - self.floor);
        }
    }
}

// ---------------------------------------------------------------------------
// SpectrogramEngine
// ---------------------------------------------------------------------------

/// Stateful STFT analyzer owning a planned FFT and the Hann window.
///
/// # Example
///
/// ```rust
/// use voicewire::audio::SpectrogramEngine;
/// use voicewire::config::SpectrumConfig;
///
/// let cfg = SpectrumConfig {
///     fft_size: 1024,
///     display_rows: 16,
///     ..SpectrumConfig::default()
/// };
/// let mut engine = SpectrogramEngine::new(&cfg);
///
/// let silence = vec![0.0_f32; 1024];
/// let frame = engine.analyze(&silence);
/// assert_eq!(frame.rows.len(), 16);
/// assert!(frame.rows.iter().all(|&r| r == 0.0));
/// ```
pub struct SpectrogramEngine {
    fft: Arc<dyn Fft<f32>>,
    hann: Vec<f32>,
    /// Reused FFT scratch — windowed input in, spectrum out.
    buffer: Vec<Complex<f32>>,
    /// Reused window assembly buffer (zero-padded at the front on underrun).
    padded: Vec<f32>,
    fft_size: usize,
    rows: usize,
    gate_ratio: f32,
    min_reference: f32,
    noise_floor: NoiseFloorEstimate,
    generation: u64,
}

impl SpectrogramEngine {
    /// Plan the FFT and precompute the Hann window for the configured size.
    pub fn new(cfg: &SpectrumConfig) -> Self {
        let fft_size = cfg.fft_size.max(2);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        let n = fft_size as f32;
        let hann: Vec<f32> = (0..fft_size)
            .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n).cos()))
            .collect();

        Self {
            fft,
            hann,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            padded: vec![0.0; fft_size],
            fft_size,
            rows: cfg.display_rows,
            gate_ratio: cfg.noise_gate_ratio,
            min_reference: cfg.min_reference,
            noise_floor: NoiseFloorEstimate::new(cfg.noise_floor_smoothing, cfg.quiet_threshold),
            generation: 0,
        }
    }

    /// Current noise-floor baseline (RMS).
    pub fn noise_floor(&self) -> f32 {
        self.noise_floor.rms()
    }

    /// Generation counter of the most recent frame.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Analyze the latest window from the shared ring buffer.
    ///
    /// A short or empty read (capture delivered nothing this tick) is
    /// treated as silence, not an error.
    pub fn tick(&mut self, ring: &SharedRingBuffer) -> SpectrogramFrame {
        let samples = match ring.lock() {
            Ok(buf) => buf.read_latest(self.fft_size),
            Err(_) => Vec::new(),
        };
        self.analyze(&samples)
    }

    /// Analyze one window of mono samples (the most recent `fft_size`; fewer
    /// are zero-padded at the front).
    pub fn analyze(&mut self, samples: &[f32]) -> SpectrogramFrame {
        self.generation += 1;

        let rms = window_rms(samples);
        self.noise_floor.observe(rms);
        let gate = self.noise_floor.rms() * self.gate_ratio;

        if samples.is_empty() || rms <= gate {
            return SpectrogramFrame {
                rows: vec![0.0; self.rows],
                generation: self.generation,
            };
        }

        // Right-align the window, zero-padding the front on short reads.
        let take = samples.len().min(self.fft_size);
        let pad = self.fft_size - take;
        self.padded[..pad].fill(0.0);
        self.padded[pad..].copy_from_slice(&samples[samples.len() - take..]);

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            *slot = Complex::new(self.padded[i] * self.hann[i], 0.0);
        }
        self.fft.process(&mut self.buffer);

        // Positive frequencies only, linear magnitude.
        let half = self.fft_size / 2;
        let scale = 1.0 / self.fft_size as f32;
        let magnitudes: Vec<f32> = self.buffer[..half].iter().map(|c| c.norm() * scale).collect();

        let binned = bin_log_frequency(&magnitudes, self.rows);
        let bin_gate = gate.max(MIN_BIN_FLOOR);
        let rows = normalize_rows(&binned, bin_gate, self.min_reference);

        SpectrogramFrame {
            rows,
            generation: self.generation,
        }
    }
}

// ---------------------------------------------------------------------------
// Spectrum shaping helpers
// ---------------------------------------------------------------------------

/// RMS energy of one analysis window.
fn window_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    energy.sqrt()
}

/// Group FFT bins into `rows` display rows with logarithmic boundaries, so
/// lower frequencies get more rows — matching how pitch is perceived.
///
/// Row `i` covers bins `[n^(i/rows), n^((i+1)/rows))` averaged; the DC bin
/// is excluded.
fn bin_log_frequency(spectrum: &[f32], rows: usize) -> Vec<f32> {
    if spectrum.is_empty() || rows == 0 {
        return vec![0.0; rows];
    }
    if spectrum.len() <= rows {
        let mut result: Vec<f32> = spectrum.to_vec();
        result.resize(rows, 0.0);
        return result;
    }

    let n = spectrum.len() as f32;
    let mut out = Vec::with_capacity(rows);

    for i in 0..rows {
        let lo = (n.powf(i as f32 / rows as f32) as usize).min(spectrum.len());
        let hi = (n.powf((i + 1) as f32 / rows as f32) as usize)
            .max(lo + 1)
            .min(spectrum.len());

        let sum: f32 = spectrum[lo..hi].iter().sum();
        out.push(sum / (hi - lo) as f32);
    }

    out
}

/// Map row magnitudes onto `[0, 1]` with a gate and a minimum reference.
///
/// Rows at or below `gate` are zeroed.  The reference level is the larger
/// of the actual peak and `min_reference`, so quiet residual noise is shown
/// proportionally quiet instead of being scaled to full range.  Levels are
/// mapped on a dB scale over [`DISPLAY_RANGE_DB`].
fn normalize_rows(magnitudes: &[f32], gate: f32, min_reference: f32) -> Vec<f32> {
    if magnitudes.is_empty() {
        return Vec::new();
    }

    let max = magnitudes.iter().cloned().fold(0.0_f32, f32::max);
    if max <= gate {
        return vec![0.0; magnitudes.len()];
    }

    let ref_level = max.max(min_reference);
    magnitudes
        .iter()
        .map(|&m| {
            if m <= gate {
                0.0
            } else {
                let db = 20.0 * (m / ref_level).log10();
                ((db + DISPLAY_RANGE_DB) / DISPLAY_RANGE_DB).clamp(0.0, 1.0)
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
