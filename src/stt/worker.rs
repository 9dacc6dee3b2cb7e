//! Asynchronous transcription worker with a hard deadline.
//!
//! STT inference can block for one to several seconds, so it never runs on
//! the control loop: [`spawn_transcription`] pushes it onto tokio's
//! blocking thread pool, races it against a timeout, and posts the
//! [`SttOutcome`] back over a channel.  The orchestrator matches the
//! outcome against its in-flight utterance id and drops anything stale.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::stt::engine::{SttEngine, SttError};

// ---------------------------------------------------------------------------
// SttOutcome
// ---------------------------------------------------------------------------

/// Result of one transcription attempt, tagged with the utterance it
/// belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SttOutcome {
    pub utterance_id: u64,
    pub result: Result<String, SttError>,
}

// ---------------------------------------------------------------------------
// spawn_transcription
// ---------------------------------------------------------------------------

/// Run `engine.transcribe(audio)` on the blocking pool with a `deadline`.
///
/// Exactly one [`SttOutcome`] is sent on `outcome_tx`:
///
/// * the engine's own result when it finishes in time,
/// * [`SttError::TranscriptionTimeout`] when the deadline expires (a
///   straggling inference keeps running on its pool thread but its result
///   is discarded),
/// * [`SttError::InferenceError`] when the blocking task itself dies.
///
/// A closed receiver is logged and ignored — the worker never panics.
pub fn spawn_transcription(
    engine: Arc<dyn SttEngine>,
    audio: Vec<f32>,
    deadline: Duration,
    utterance_id: u64,
    outcome_tx: mpsc::Sender<SttOutcome>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let limit_secs = deadline.as_secs();
        let samples = audio.len();
        log::debug!("stt worker: utterance {utterance_id}, {samples} samples, {limit_secs}s limit");

        let inference = tokio::task::spawn_blocking(move || engine.transcribe(&audio));

        let result = match timeout(deadline, inference).await {
            Err(_elapsed) => Err(SttError::TranscriptionTimeout { limit_secs }),
            Ok(Err(join_err)) => Err(SttError::InferenceError(join_err.to_string())),
            Ok(Ok(result)) => result,
        };

        if outcome_tx
            .send(SttOutcome {
                utterance_id,
                result,
            })
            .await
            .is_err()
        {
            log::debug!("stt worker: outcome receiver dropped");
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
