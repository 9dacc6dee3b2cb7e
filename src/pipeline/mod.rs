//! Pipeline orchestration.
//!
//! Wires key events, the recording session, utterance extraction,
//! resampling and the STT worker into one event loop, and exposes the
//! shared state front ends read.
//!
//! # Architecture
//!
//! ```text
//! ControlEvent (mpsc)                 SttOutcome (internal mpsc)
//!        │                                   │
//!        └────────────┬──────────────────────┘
//!                     ▼
//!        PipelineOrchestrator::run()   ← async tokio task
//!                     │
//!                     ├─ KeyDown  → session start, phase Recording
//!                     ├─ KeyUp    → extract_range → resample → stt worker
//!                     ├─ Cancel   → drop in-flight utterance
//!                     └─ Outcome  → transcript_tx / surfaced error
//!
//! SharedState (Arc<Mutex<AppState>>) ←── read by the render loop
//! ```

pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use runner::{ControlEvent, PipelineOrchestrator};
pub use state::{new_shared_state, AppState, PipelinePhase, SharedState};
