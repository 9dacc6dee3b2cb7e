//! Speech-to-text collaborator boundary.
//!
//! The pipeline never runs model inference itself — it hands a finalized
//! 16 kHz mono buffer to an [`SttEngine`] implementation and receives the
//! transcript (or a typed failure) back asynchronously.
//!
//! [`worker::spawn_transcription`] is the only way the orchestrator invokes
//! an engine: inference runs on the blocking thread pool under a deadline,
//! and the outcome comes back over a channel so the control loop stays
//! responsive while a transcription is in flight.

pub mod engine;
pub mod worker;

pub use engine::{SttEngine, SttError};
pub use worker::{spawn_transcription, SttOutcome};

// test-only re-export so orchestrator tests can import the mock without
// spelling out the module path.
#[cfg(test)]
pub use engine::MockSttEngine;
