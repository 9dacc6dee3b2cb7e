//! voicewire — real-time voice-capture front end.
//!
//! Captures microphone audio into a shared ring buffer, feeds a live
//! spectrogram visualisation, and extracts push-to-talk utterances for an
//! external speech-to-text engine.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → downmix → RingBuffer.write
//!                                   │
//!                ┌──────────────────┴──────────────────┐
//!                ▼                                     ▼
//!      SpectrogramEngine.tick                RecordingSession (key up)
//!      (read_latest, every tick)             extract_range → Resampler
//!                │                                     │
//!          RenderThrottle                        SttEngine (worker)
//!                │                                     │
//!            Renderer                            transcript channel
//! ```
//!
//! The capture callback is the only producer and never blocks; the analysis
//! loop and the utterance extraction are the only readers, each copying a
//! window out under a short lock.

pub mod audio;
pub mod config;
pub mod pipeline;
pub mod stt;
pub mod viz;

pub use audio::{
    downmix_to_mono, shared_ring, AudioCapture, AudioFrame, BufferError, CaptureError,
    RecordingSession, Resampler, RingBuffer, SessionState, SharedRingBuffer, SpectrogramEngine,
    SpectrogramFrame, TARGET_SAMPLE_RATE,
};
pub use config::AppConfig;
pub use pipeline::{ControlEvent, PipelineOrchestrator, PipelinePhase, SharedState};
pub use stt::{SttEngine, SttError};
pub use viz::{RenderThrottle, Renderer};
