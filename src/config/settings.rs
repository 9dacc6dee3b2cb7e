//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across
//! threads.  Tunables the pipeline deliberately does not hard-code — ring
//! capacity, minimum utterance length, noise-floor behaviour, tick and
//! render rates, the STT deadline — all live here.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for capture and utterance extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Ring buffer capacity in seconds at the device's native rate.  Bounds
    /// the longest extractable utterance; spans older than this are
    /// reported as overrun.
    pub buffer_secs: u32,
    /// Utterances shorter than this are discarded as no-speech instead of
    /// being sent to the STT engine.
    pub min_utterance_ms: u32,
    /// Attempts to open the capture device before giving up.
    pub device_retries: u32,
    /// Initial backoff between device-open attempts, in milliseconds
    /// (doubled after each failure).
    pub device_retry_backoff_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            buffer_secs: 60,
            min_utterance_ms: 300,
            device_retries: 3,
            device_retry_backoff_ms: 500,
        }
    }
}

// ---------------------------------------------------------------------------
// SpectrumConfig
// ---------------------------------------------------------------------------

/// Settings for the spectrogram engine and its render cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumConfig {
    /// STFT window length in samples.
    pub fft_size: usize,
    /// Number of display rows the spectrum is binned onto.
    pub display_rows: usize,
    /// Analysis ticks per second.
    pub tick_hz: u32,
    /// Maximum frames per second forwarded to the renderer.
    pub render_max_fps: u32,
    /// Windows with RMS below this level count as quiet and feed the
    /// running noise-floor estimate.
    pub quiet_threshold: f32,
    /// Exponential smoothing factor for the noise-floor estimate
    /// (`0.0..=1.0`; higher adapts faster).
    pub noise_floor_smoothing: f32,
    /// A window is gated to silence when its RMS is at or below
    /// `noise_floor * noise_gate_ratio`.
    pub noise_gate_ratio: f32,
    /// Minimum normalization reference so residual noise is shown
    /// proportionally quiet instead of scaled to full range.
    pub min_reference: f32,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            display_rows: 32,
            tick_hz: 20,
            render_max_fps: 12,
            quiet_threshold: 0.01,
            noise_floor_smoothing: 0.05,
            noise_gate_ratio: 2.5,
            min_reference: 0.05,
        }
    }
}

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Settings for the STT collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SttConfig {
    /// Seconds the transcription worker waits before reporting a timeout.
    pub timeout_secs: u64,
    /// Speech model file the binary should load — `None` leaves the
    /// placeholder engine in place.
    pub model_path: Option<String>,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            model_path: None,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use voicewire::config::AppConfig;
///
/// // Load (returns Default when the file is missing)
/// let config = AppConfig::load().unwrap();
/// config.save().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Capture / utterance settings.
    pub audio: AudioConfig,
    /// Spectrogram and render settings.
    pub spectrum: SpectrumConfig,
    /// STT collaborator settings.
    pub stt: SttConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns `true` when no `settings.toml` file exists yet.
    pub fn is_first_run() -> bool {
        !AppPaths::new().settings_file.exists()
    }

    /// Minimum utterance length in samples at the given capture rate.
    pub fn min_utterance_samples(&self, sample_rate: u32) -> u64 {
        u64::from(self.audio.min_utterance_ms) * u64::from(sample_rate) / 1000
    }

    /// Ring buffer capacity in samples at the given capture rate.
    pub fn ring_capacity(&self, sample_rate: u32) -> usize {
        (self.audio.buffer_secs as usize).max(1) * sample_rate as usize
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
