//! Pipeline orchestrator — drives key events through extraction,
//! resampling and transcription.
//!
//! [`PipelineOrchestrator`] owns the [`RecordingSession`] and responds to
//! [`ControlEvent`]s received over a `tokio::sync::mpsc` channel.
//!
//! # Event flow
//!
//! ```text
//! ControlEvent::KeyDown
//!   └─▶ session snapshots start_seq = ring write cursor   [Recording]
//!
//! ControlEvent::KeyUp
//!   └─▶ session snapshots end_seq; minimum-duration gate
//!         ├─ too short  → report no speech, back to Idle
//!         └─ extract_range → sanitize → resample
//!               └─▶ stt worker (blocking pool + deadline) [Transcribing]
//!
//! SttOutcome (internal channel)
//!   ├─ matches in-flight id → transcript out / error surfaced  [Idle]
//!   └─ stale id (canceled / superseded)  → dropped
//! ```
//!
//! Transcription completion arrives as an event on the same loop that
//! handles keys, so the control path stays responsive while inference is
//! in flight — a second key press is *rejected* (one utterance in flight
//! at a time) but never blocked.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::audio::buffer::{BufferError, SharedRingBuffer};
use crate::audio::resample::{sanitize, Resampler};
use crate::audio::session::{KeyDownOutcome, KeyUpOutcome, RecordingSession};
use crate::pipeline::state::{PipelinePhase, SharedState};
use crate::stt::{spawn_transcription, SttEngine, SttError, SttOutcome};

// ---------------------------------------------------------------------------
// ControlEvent
// ---------------------------------------------------------------------------

/// Events delivered from the interactive control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Push-to-talk key pressed.
    KeyDown,
    /// Push-to-talk key released.
    KeyUp,
    /// Explicitly discard the utterance currently recording or in flight.
    CancelUtterance,
    /// Stop the orchestrator loop.
    Shutdown,
}

// ---------------------------------------------------------------------------
// PipelineOrchestrator
// ---------------------------------------------------------------------------

/// Drives the push-to-talk pipeline.
///
/// Create with [`PipelineOrchestrator::new`], then spawn
/// [`run`](Self::run) as a tokio task.  Finalized transcripts are sent
/// over `transcript_tx`; downstream consumers see only the string.
pub struct PipelineOrchestrator {
    state: SharedState,
    ring: SharedRingBuffer,
    session: RecordingSession,
    resampler: Resampler,
    stt: Arc<dyn SttEngine>,
    stt_deadline: Duration,
    transcript_tx: mpsc::Sender<String>,
    next_utterance_id: u64,
    /// Utterance id whose transcription is currently in flight, if any.
    in_flight: Option<u64>,
}

impl PipelineOrchestrator {
    /// Create a new orchestrator.
    ///
    /// # Arguments
    ///
    /// * `state`         — shared state mirrored for front ends.
    /// * `ring`          — buffer filled by the capture callback.
    /// * `resampler`     — native rate → STT rate converter.
    /// * `stt`           — transcription engine.
    /// * `min_utterance_samples` — spans shorter than this (at the capture
    ///   rate) are discarded as no-speech.
    /// * `stt_deadline`  — hard limit per transcription attempt.
    /// * `transcript_tx` — sink for finalized transcripts.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: SharedState,
        ring: SharedRingBuffer,
        resampler: Resampler,
        stt: Arc<dyn SttEngine>,
        min_utterance_samples: u64,
        stt_deadline: Duration,
        transcript_tx: mpsc::Sender<String>,
    ) -> Self {
        Self {
            state,
            ring,
            session: RecordingSession::new(min_utterance_samples),
            resampler,
            stt,
            stt_deadline,
            transcript_tx,
            next_utterance_id: 0,
            in_flight: None,
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run the orchestrator until `control_rx` is closed or
    /// [`ControlEvent::Shutdown`] arrives.
    pub async fn run(mut self, mut control_rx: mpsc::Receiver<ControlEvent>) {
        // Transcription outcomes join the same loop via an internal channel
        // so key handling is never blocked on inference.
        let (outcome_tx, mut outcome_rx) = mpsc::channel::<SttOutcome>(4);

        loop {
            tokio::select! {
                event = control_rx.recv() => match event {
                    None | Some(ControlEvent::Shutdown) => break,
                    Some(ControlEvent::KeyDown) => self.handle_key_down(),
                    Some(ControlEvent::KeyUp) => self.handle_key_up(&outcome_tx),
                    Some(ControlEvent::CancelUtterance) => self.handle_cancel(),
                },
                Some(outcome) = outcome_rx.recv() => self.handle_outcome(outcome).await,
            }
        }

        log::info!("pipeline: control channel closed, orchestrator shutting down");
    }

    // -----------------------------------------------------------------------
    // Event handlers
    // -----------------------------------------------------------------------

    fn handle_key_down(&mut self) {
        let write_seq = match self.ring.lock() {
            Ok(buf) => buf.write_seq(),
            Err(e) => {
                self.report_error(format!("audio buffer lock poisoned: {e}"));
                return;
            }
        };

        match self.session.on_key_down(write_seq) {
            KeyDownOutcome::Started { start_seq } => {
                log::debug!("pipeline: recording started at seq {start_seq}");
                let mut st = self.state.lock().unwrap();
                st.phase = PipelinePhase::Recording;
                st.error_message = None;
            }
            KeyDownOutcome::AlreadyRecording => {
                log::debug!("pipeline: repeat key down ignored");
            }
            KeyDownOutcome::Busy => {
                log::warn!("pipeline: key down rejected — utterance still in flight");
                let mut st = self.state.lock().unwrap();
                st.error_message = Some("still transcribing the previous utterance".into());
            }
        }
    }

    fn handle_key_up(&mut self, outcome_tx: &mpsc::Sender<SttOutcome>) {
        // Snapshot the cursor and extract under a single lock so the span
        // and its contents come from the same instant.
        let extraction = match self.ring.lock() {
            Ok(buf) => {
                let write_seq = buf.write_seq();
                match self.session.on_key_up(write_seq) {
                    KeyUpOutcome::Finalize { start_seq, end_seq } => {
                        Some(buf.extract_range(start_seq, end_seq))
                    }
                    KeyUpOutcome::TooShort {
                        samples,
                        min_samples,
                    } => {
                        log::info!(
                            "pipeline: utterance too short ({samples} < {min_samples} samples)"
                        );
                        self.report_discard(SttError::NoSpeechDetected.to_string());
                        None
                    }
                    KeyUpOutcome::Ignored => {
                        log::debug!("pipeline: key up with no recording in progress");
                        None
                    }
                }
            }
            Err(e) => {
                self.session.cancel();
                self.report_error(format!("audio buffer lock poisoned: {e}"));
                None
            }
        };

        let Some(extraction) = extraction else { return };

        let mut native = match extraction {
            Ok(samples) => samples,
            Err(err @ BufferError::Overrun { .. }) => {
                log::warn!("pipeline: {err}");
                self.session.finish();
                self.report_error(
                    "recording too long — oldest audio was overwritten, utterance discarded"
                        .into(),
                );
                return;
            }
            Err(err) => {
                self.session.finish();
                self.report_error(format!("utterance extraction failed: {err}"));
                return;
            }
        };

        let replaced = sanitize(&mut native);
        if replaced > 0 {
            log::debug!("pipeline: sanitized {replaced} non-finite samples");
        }

        let audio = self.resampler.resample(&native);
        log::debug!(
            "pipeline: extracted {} native samples → {} @ {} Hz",
            native.len(),
            audio.len(),
            self.resampler.target_rate()
        );

        let utterance_id = self.next_utterance_id;
        self.next_utterance_id += 1;
        self.in_flight = Some(utterance_id);
        self.set_phase(PipelinePhase::Transcribing);

        spawn_transcription(
            Arc::clone(&self.stt),
            audio,
            self.stt_deadline,
            utterance_id,
            outcome_tx.clone(),
        );
    }

    fn handle_cancel(&mut self) {
        if self.session.is_busy() || self.in_flight.is_some() {
            log::info!("pipeline: utterance canceled by user");
            self.session.cancel();
            self.in_flight = None;
            self.report_discard("utterance discarded".into());
        } else {
            log::debug!("pipeline: cancel with nothing in flight");
        }
    }

    async fn handle_outcome(&mut self, outcome: SttOutcome) {
        if self.in_flight != Some(outcome.utterance_id) {
            log::debug!(
                "pipeline: dropping stale transcription outcome for utterance {}",
                outcome.utterance_id
            );
            return;
        }
        self.in_flight = None;
        self.session.finish();

        match outcome.result {
            Ok(text) if text.trim().is_empty() => {
                self.report_discard(SttError::NoSpeechDetected.to_string());
            }
            Ok(text) => {
                log::info!("pipeline: transcript ready ({} chars)", text.len());
                {
                    let mut st = self.state.lock().unwrap();
                    st.phase = PipelinePhase::Idle;
                    st.last_transcript = Some(text.clone());
                    st.error_message = None;
                }
                if self.transcript_tx.send(text).await.is_err() {
                    log::debug!("pipeline: transcript receiver dropped");
                }
            }
            Err(e) => {
                self.report_error(e.to_string());
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn set_phase(&self, phase: PipelinePhase) {
        self.state.lock().unwrap().phase = phase;
    }

    /// Surface a recoverable failure; the next key press proceeds as if
    /// idle — capture and visualization are unaffected.
    fn report_error(&self, message: String) {
        log::error!("pipeline: {message}");
        let mut st = self.state.lock().unwrap();
        st.phase = PipelinePhase::Error;
        st.error_message = Some(message);
    }

    /// Surface a discarded utterance without entering the error phase.
    fn report_discard(&self, message: String) {
        log::info!("pipeline: {message}");
        let mut st = self.state.lock().unwrap();
        st.phase = PipelinePhase::Idle;
        st.error_message = Some(message);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::shared_ring;
    use crate::pipeline::state::new_shared_state;
    use crate::stt::MockSttEngine;

    struct Harness {
        control_tx: mpsc::Sender<ControlEvent>,
        transcript_rx: mpsc::Receiver<String>,
        state: SharedState,
        ring: SharedRingBuffer,
        engine: Arc<MockSttEngine>,
        orchestrator: tokio::task::JoinHandle<()>,
    }

    /// Spawn an orchestrator with an identity resampler and the given mock.
    fn start(engine: MockSttEngine, ring_capacity: usize, min_samples: u64) -> Harness {
        start_with_deadline(engine, ring_capacity, min_samples, Duration::from_secs(5))
    }

    fn start_with_deadline(
        engine: MockSttEngine,
        ring_capacity: usize,
        min_samples: u64,
        deadline: Duration,
    ) -> Harness {
        let state = new_shared_state();
        let ring = shared_ring(ring_capacity);
        let engine = Arc::new(engine);
        let (control_tx, control_rx) = mpsc::channel(16);
        let (transcript_tx, transcript_rx) = mpsc::channel(8);

        let orc = PipelineOrchestrator::new(
            Arc::clone(&state),
            Arc::clone(&ring),
            Resampler::new(16_000, 16_000),
            Arc::clone(&engine) as Arc<dyn SttEngine>,
            min_samples,
            deadline,
            transcript_tx,
        );
        let orchestrator = tokio::spawn(orc.run(control_rx));

        Harness {
            control_tx,
            transcript_rx,
            state,
            ring,
            engine,
            orchestrator,
        }
    }

    /// Give the orchestrator task a moment to drain its queue.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(80)).await;
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    /// Key down should move the pipeline into the Recording phase.
    #[tokio::test]
    async fn key_down_enters_recording_phase() {
        let h = start(MockSttEngine::ok("unused"), 16_000, 0);

        h.control_tx.send(ControlEvent::KeyDown).await.unwrap();
        settle().await;

        assert_eq!(h.state.lock().unwrap().phase, PipelinePhase::Recording);
        drop(h.control_tx);
        h.orchestrator.await.unwrap();
    }

    /// A full press → capture → release cycle delivers the transcript and
    /// returns to Idle.
    #[tokio::test]
    async fn full_utterance_reaches_transcript_channel() {
        let mut h = start(MockSttEngine::ok("open the file"), 64_000, 0);

        h.control_tx.send(ControlEvent::KeyDown).await.unwrap();
        settle().await;
        h.ring.lock().unwrap().write(&vec![0.1_f32; 16_000]);
        h.control_tx.send(ControlEvent::KeyUp).await.unwrap();
        settle().await;

        assert_eq!(h.transcript_rx.recv().await.unwrap(), "open the file");
        let st = h.state.lock().unwrap();
        assert_eq!(st.phase, PipelinePhase::Idle);
        assert_eq!(st.last_transcript.as_deref(), Some("open the file"));
        assert!(st.error_message.is_none());
        assert_eq!(h.engine.calls(), 1);
    }

    /// An utterance shorter than the minimum is discarded without ever
    /// calling the STT engine.
    #[tokio::test]
    async fn short_utterance_skips_stt() {
        let h = start(MockSttEngine::ok("should not run"), 16_000, 4_800);

        // No samples written between press and release — span is zero.
        h.control_tx.send(ControlEvent::KeyDown).await.unwrap();
        h.control_tx.send(ControlEvent::KeyUp).await.unwrap();
        settle().await;

        assert_eq!(h.engine.calls(), 0, "STT must not run for short utterances");
        let st = h.state.lock().unwrap();
        assert_eq!(st.phase, PipelinePhase::Idle);
        assert_eq!(st.error_message.as_deref(), Some("no speech detected"));
    }

    /// Key up with no prior key down is a no-op.
    #[tokio::test]
    async fn stray_key_up_is_ignored() {
        let h = start(MockSttEngine::ok("unused"), 16_000, 0);

        h.control_tx.send(ControlEvent::KeyUp).await.unwrap();
        settle().await;

        assert_eq!(h.engine.calls(), 0);
        assert_eq!(h.state.lock().unwrap().phase, PipelinePhase::Idle);
    }

    /// KeyDown, KeyDown, KeyUp yields exactly one transcription.
    #[tokio::test]
    async fn repeat_key_down_yields_one_extraction() {
        let mut h = start(MockSttEngine::ok("once"), 64_000, 0);

        h.control_tx.send(ControlEvent::KeyDown).await.unwrap();
        h.control_tx.send(ControlEvent::KeyDown).await.unwrap();
        settle().await;
        h.ring.lock().unwrap().write(&vec![0.1_f32; 8_000]);
        h.control_tx.send(ControlEvent::KeyUp).await.unwrap();
        settle().await;

        assert_eq!(h.engine.calls(), 1);
        assert_eq!(h.transcript_rx.recv().await.unwrap(), "once");
    }

    /// A second key down while a transcription is in flight is rejected —
    /// one utterance at a time.
    #[tokio::test]
    async fn key_down_while_in_flight_is_rejected() {
        let mut h = start(
            MockSttEngine::slow("first", Duration::from_millis(300)),
            64_000,
            0,
        );

        h.control_tx.send(ControlEvent::KeyDown).await.unwrap();
        settle().await;
        h.ring.lock().unwrap().write(&vec![0.1_f32; 8_000]);
        h.control_tx.send(ControlEvent::KeyUp).await.unwrap();
        settle().await;

        // Inference still running (300 ms) — this press must be rejected.
        h.control_tx.send(ControlEvent::KeyDown).await.unwrap();
        settle().await;
        assert!(h
            .state
            .lock()
            .unwrap()
            .error_message
            .as_deref()
            .unwrap_or("")
            .contains("still transcribing"));

        // Only the first utterance ever reaches the engine or the channel.
        assert_eq!(h.transcript_rx.recv().await.unwrap(), "first");
        settle().await;
        assert_eq!(h.engine.calls(), 1);
    }

    /// Overrun at extraction discards the utterance and surfaces an error;
    /// the engine is never called.
    #[tokio::test]
    async fn overrun_discards_utterance() {
        let h = start(MockSttEngine::ok("unused"), 1_000, 0);

        h.control_tx.send(ControlEvent::KeyDown).await.unwrap(); // start_seq = 0
        settle().await;
        // Push 5000 samples through a 1000-sample ring: seq 0 is long gone.
        h.ring.lock().unwrap().write(&vec![0.2_f32; 5_000]);
        h.control_tx.send(ControlEvent::KeyUp).await.unwrap();
        settle().await;

        assert_eq!(h.engine.calls(), 0);
        let st = h.state.lock().unwrap();
        assert_eq!(st.phase, PipelinePhase::Error);
        assert!(st
            .error_message
            .as_deref()
            .unwrap_or("")
            .contains("recording too long"));
    }

    /// A deadline miss surfaces `TranscriptionTimeout` and the pipeline
    /// accepts the next utterance.
    #[tokio::test]
    async fn timeout_is_surfaced_and_pipeline_recovers() {
        let h = start_with_deadline(
            MockSttEngine::slow("late", Duration::from_millis(400)),
            64_000,
            0,
            Duration::from_millis(50),
        );

        h.control_tx.send(ControlEvent::KeyDown).await.unwrap();
        settle().await;
        h.ring.lock().unwrap().write(&vec![0.1_f32; 8_000]);
        h.control_tx.send(ControlEvent::KeyUp).await.unwrap();
        settle().await;

        {
            let st = h.state.lock().unwrap();
            assert_eq!(st.phase, PipelinePhase::Error);
            assert!(st
                .error_message
                .as_deref()
                .unwrap_or("")
                .contains("timed out"));
        }

        // Pipeline is idle again: a new recording may start.
        h.control_tx.send(ControlEvent::KeyDown).await.unwrap();
        settle().await;
        assert_eq!(h.state.lock().unwrap().phase, PipelinePhase::Recording);
    }

    /// Cancel while a transcription is in flight drops the late outcome.
    #[tokio::test]
    async fn cancel_drops_in_flight_result() {
        let mut h = start(
            MockSttEngine::slow("too late", Duration::from_millis(200)),
            64_000,
            0,
        );

        h.control_tx.send(ControlEvent::KeyDown).await.unwrap();
        settle().await;
        h.ring.lock().unwrap().write(&vec![0.1_f32; 8_000]);
        h.control_tx.send(ControlEvent::KeyUp).await.unwrap();
        settle().await;
        h.control_tx.send(ControlEvent::CancelUtterance).await.unwrap();

        // Wait past the engine's completion; the result must be discarded.
        tokio::time::sleep(Duration::from_millis(400)).await;
        drop(h.control_tx);
        h.orchestrator.await.unwrap();

        assert!(h.transcript_rx.try_recv().is_err(), "canceled transcript leaked");
        assert!(h.state.lock().unwrap().last_transcript.is_none());
    }

    /// An empty transcript is reported as no speech, not forwarded.
    #[tokio::test]
    async fn blank_transcript_reports_no_speech() {
        let mut h = start(MockSttEngine::ok("   "), 64_000, 0);

        h.control_tx.send(ControlEvent::KeyDown).await.unwrap();
        settle().await;
        h.ring.lock().unwrap().write(&vec![0.1_f32; 8_000]);
        h.control_tx.send(ControlEvent::KeyUp).await.unwrap();
        settle().await;

        assert!(h.transcript_rx.try_recv().is_err());
        let st = h.state.lock().unwrap();
        assert_eq!(st.error_message.as_deref(), Some("no speech detected"));
        assert_eq!(st.phase, PipelinePhase::Idle);
    }
}
