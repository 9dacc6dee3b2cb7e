//! Push-to-talk recording session state machine.
//!
//! A session never touches audio data itself — it snapshots the ring
//! buffer's write cursor on key down and key up, and the orchestrator uses
//! the resulting span for extraction.  Keeping the transitions as a pure
//! outcome-returning function makes every edge independently testable.
//!
//! # Transitions
//!
//! ```text
//! Idle ──key down──▶ Recording { start_seq = W }
//! Recording ──key down──▶ Recording            (repeat events ignored)
//! Recording ──key up────▶ Finalizing { end_seq = W }   span ≥ minimum
//!                       ▶ Idle                          span < minimum
//! Finalizing ──key down─▶ Finalizing            (rejected: one in flight)
//! Finalizing ──finish───▶ Idle                  (after STT hand-off)
//! Idle ──key up─────────▶ Idle                  (no-op)
//! ```
//!
//! # Example
//!
//! ```rust
//! use voicewire::audio::{KeyDownOutcome, KeyUpOutcome, RecordingSession};
//!
//! let mut session = RecordingSession::new(4_800); // 300 ms @ 16 kHz
//! assert_eq!(session.on_key_down(0), KeyDownOutcome::Started { start_seq: 0 });
//! // Held for one second of samples:
//! assert_eq!(
//!     session.on_key_up(16_000),
//!     KeyUpOutcome::Finalize { start_seq: 0, end_seq: 16_000 }
//! );
//! session.finish();
//! assert!(!session.is_busy());
//! ```

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Tagged state of a push-to-talk session.
///
/// The cursor snapshots live inside the variants, so `start_seq <= end_seq`
/// holds by construction: `end_seq` is taken from a monotonic cursor after
/// `start_seq` was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the push-to-talk key.
    Idle,
    /// Key is held; audio between `start_seq` and the live cursor belongs to
    /// this utterance.
    Recording { start_seq: u64 },
    /// Key released; the span is being extracted / transcribed.  No new
    /// recording may start until [`RecordingSession::finish`] or
    /// [`RecordingSession::cancel`].
    Finalizing { start_seq: u64, end_seq: u64 },
}

// ---------------------------------------------------------------------------
// Transition outcomes
// ---------------------------------------------------------------------------

/// What a key-down event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDownOutcome {
    /// A new utterance began at `start_seq`.
    Started { start_seq: u64 },
    /// Already recording — repeat event ignored.
    AlreadyRecording,
    /// A prior utterance is still finalizing (STT in flight) — rejected.
    Busy,
}

/// What a key-up event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUpOutcome {
    /// The utterance span is ready for extraction.
    Finalize { start_seq: u64, end_seq: u64 },
    /// The span was shorter than the configured minimum; the session went
    /// straight back to idle and the caller should report no speech.
    TooShort { samples: u64, min_samples: u64 },
    /// Key up with no recording in progress — no-op.
    Ignored,
}

// ---------------------------------------------------------------------------
// RecordingSession
// ---------------------------------------------------------------------------

/// Push-to-talk state machine over ring-buffer sequence numbers.
pub struct RecordingSession {
    state: SessionState,
    /// Minimum utterance length in samples (at the capture rate) below
    /// which the recording is discarded instead of transcribed.
    min_samples: u64,
}

impl RecordingSession {
    /// Create an idle session with the given minimum utterance length.
    pub fn new(min_samples: u64) -> Self {
        Self {
            state: SessionState::Idle,
            min_samples,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns `true` while recording or finalizing.
    pub fn is_busy(&self) -> bool {
        self.state != SessionState::Idle
    }

    /// Handle a push-to-talk key press at write cursor `write_seq`.
    pub fn on_key_down(&mut self, write_seq: u64) -> KeyDownOutcome {
        match self.state {
            SessionState::Idle => {
                self.state = SessionState::Recording {
                    start_seq: write_seq,
                };
                KeyDownOutcome::Started {
                    start_seq: write_seq,
                }
            }
            SessionState::Recording { .. } => KeyDownOutcome::AlreadyRecording,
            SessionState::Finalizing { .. } => KeyDownOutcome::Busy,
        }
    }

    /// Handle a push-to-talk key release at write cursor `write_seq`.
    pub fn on_key_up(&mut self, write_seq: u64) -> KeyUpOutcome {
        match self.state {
            SessionState::Recording { start_seq } => {
                debug_assert!(write_seq >= start_seq, "write cursor moved backwards");
                let end_seq = write_seq.max(start_seq);
                let samples = end_seq - start_seq;
                if samples < self.min_samples {
                    self.state = SessionState::Idle;
                    KeyUpOutcome::TooShort {
                        samples,
                        min_samples: self.min_samples,
                    }
                } else {
                    self.state = SessionState::Finalizing { start_seq, end_seq };
                    KeyUpOutcome::Finalize { start_seq, end_seq }
                }
            }
            SessionState::Idle | SessionState::Finalizing { .. } => KeyUpOutcome::Ignored,
        }
    }

    /// Complete the in-flight utterance (transcript delivered or failed)
    /// and return to idle.
    pub fn finish(&mut self) {
        self.state = SessionState::Idle;
    }

    /// Abandon whatever is in progress and return to idle.
    pub fn cancel(&mut self) {
        self.state = SessionState::Idle;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
