//! Audio ingestion and real-time analysis pipeline.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → downmix_into → RingBuffer.write
//!                                    │
//!              ┌─────────────────────┴────────────────────┐
//!              ▼                                          ▼
//!     SpectrogramEngine.tick                     RecordingSession
//!     (read_latest each tick)              (extract_range on key up)
//!                                                         │
//!                                                    Resampler → STT
//! ```
//!
//! The ring buffer is the only shared-memory primitive: one producer (the
//! capture callback), two readers (the analysis loop and the utterance
//! extraction), every access a short bounded critical section.

pub mod buffer;
pub mod capture;
pub mod resample;
pub mod session;
pub mod spectrum;

pub use buffer::{shared_ring, BufferError, RingBuffer, SharedRingBuffer};
pub use capture::{write_frame, AudioCapture, AudioFrame, CaptureError, StreamHandle};
pub use resample::{downmix_into, downmix_to_mono, sanitize, Resampler};
pub use session::{KeyDownOutcome, KeyUpOutcome, RecordingSession, SessionState};
pub use spectrum::{NoiseFloorEstimate, SpectrogramEngine, SpectrogramFrame};

/// Sample rate the STT collaborator expects, in Hz.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;
