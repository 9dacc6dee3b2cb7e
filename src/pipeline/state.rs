//! Pipeline phases and shared application state.
//!
//! [`PipelinePhase`] is the display-level view of the pipeline; the
//! authoritative push-to-talk state lives in
//! [`RecordingSession`](crate::audio::RecordingSession).
//!
//! [`AppState`] is the single source of truth for everything a front end
//! needs: current phase, last transcript, any error message, and the most
//! recent spectrogram frame.  [`SharedState`] (`Arc<Mutex<AppState>>`) is
//! cheap to clone and safe to share across threads; lock for a short
//! critical section and never across `.await` points.

use std::sync::{Arc, Mutex};

use crate::audio::SpectrogramFrame;

// ---------------------------------------------------------------------------
// PipelinePhase
// ---------------------------------------------------------------------------

/// Display-level phase of the voice pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelinePhase {
    /// Waiting for the push-to-talk key.
    #[default]
    Idle,

    /// Microphone audio between the key-down cursor and now belongs to the
    /// current utterance.
    Recording,

    /// An utterance was extracted; the STT worker is running.
    Transcribing,

    /// A recoverable error occurred.  The pipeline accepts the next key
    /// press as if idle.
    Error,
}

impl PipelinePhase {
    /// Returns `true` while the pipeline is capturing or transcribing.
    pub fn is_busy(&self) -> bool {
        matches!(self, PipelinePhase::Recording | PipelinePhase::Transcribing)
    }

    /// A short human-readable label for a status line.
    pub fn label(&self) -> &'static str {
        match self {
            PipelinePhase::Idle => "Idle",
            PipelinePhase::Recording => "Recording",
            PipelinePhase::Transcribing => "Transcribing",
            PipelinePhase::Error => "Error",
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Shared application state read by the render loop and any front end.
#[derive(Debug, Default)]
pub struct AppState {
    /// Current phase of the pipeline.
    pub phase: PipelinePhase,

    /// The most recent finalized transcript, `None` until the first
    /// utterance completes.
    pub last_transcript: Option<String>,

    /// Error message to surface when `phase == PipelinePhase::Error`.
    pub error_message: Option<String>,

    /// Latest spectrogram frame; replaced every analysis tick.
    pub frame: Option<SpectrogramFrame>,
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`AppState`].
pub type SharedState = Arc<Mutex<AppState>>;

/// Construct a new [`SharedState`] wrapping a default [`AppState`].
pub fn new_shared_state() -> SharedState {
    Arc::new(Mutex::new(AppState::default()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
