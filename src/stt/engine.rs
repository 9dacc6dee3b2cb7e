//! Core STT engine trait and error type.
//!
//! [`SttEngine`] is the public interface used by the pipeline.  It is
//! object-safe and `Send + Sync` so it can be held behind an
//! `Arc<dyn SttEngine>` and called from the blocking thread pool.
//!
//! [`MockSttEngine`] (available under `#[cfg(test)]`) is a stub that
//! returns a pre-configured response and counts its invocations — used to
//! verify that discarded utterances never reach the engine.

use thiserror::Error;

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

/// Typed failures the STT collaborator can report.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SttError {
    /// No speech model is available for inference.
    #[error("speech model not loaded: {0}")]
    ModelNotLoaded(String),

    /// The buffer contained no usable speech (also produced locally for
    /// below-minimum utterances that are never forwarded to the engine).
    #[error("no speech detected")]
    NoSpeechDetected,

    /// Inference started but failed.
    #[error("transcription failed: {0}")]
    InferenceError(String),

    /// The engine did not finish within the configured deadline.
    #[error("transcription timed out after {limit_secs}s")]
    TranscriptionTimeout { limit_secs: u64 },
}

// ---------------------------------------------------------------------------
// SttEngine trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for speech-to-text engines.
///
/// # Contract
///
/// - `audio` is **16 kHz, mono, f32** PCM with a bounded maximum duration
///   (the ring buffer capacity bounds it upstream).
/// - `transcribe` may block for seconds; the pipeline always calls it from
///   a blocking worker, never from the control loop.
pub trait SttEngine: Send + Sync {
    /// Transcribe `audio` and return the text transcript.
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError>;
}

// Compile-time assertion: Box<dyn SttEngine> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SttEngine>) {}
};

// ---------------------------------------------------------------------------
// MockSttEngine (test only)
// ---------------------------------------------------------------------------

/// Scripted engine for pipeline tests: fixed response, optional artificial
/// latency, call counting.
#[cfg(test)]
pub struct MockSttEngine {
    response: Result<String, SttError>,
    delay: Option<std::time::Duration>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockSttEngine {
    /// Always succeeds with `text`.
    pub fn ok(text: &str) -> Self {
        Self {
            response: Ok(text.to_string()),
            delay: None,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Always fails with `err`.
    pub fn failing(err: SttError) -> Self {
        Self {
            response: Err(err),
            delay: None,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Succeeds with `text` after sleeping `delay` — for deadline tests.
    pub fn slow(text: &str, delay: std::time::Duration) -> Self {
        Self {
            response: Ok(text.to_string()),
            delay: Some(delay),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Number of `transcribe` invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl SttEngine for MockSttEngine {
    fn transcribe(&self, _audio: &[f32]) -> Result<String, SttError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.response.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_format_for_display() {
        assert!(SttError::ModelNotLoaded("ggml-base.en.bin".into())
            .to_string()
            .contains("ggml-base.en.bin"));
        assert_eq!(SttError::NoSpeechDetected.to_string(), "no speech detected");
        assert!(SttError::TranscriptionTimeout { limit_secs: 15 }
            .to_string()
            .contains("15s"));
    }

    #[test]
    fn mock_counts_calls() {
        let mock = MockSttEngine::ok("hello");
        assert_eq!(mock.calls(), 0);
        assert_eq!(mock.transcribe(&[0.0; 16]), Ok("hello".into()));
        assert_eq!(mock.transcribe(&[0.0; 16]), Ok("hello".into()));
        assert_eq!(mock.calls(), 2);
    }

    #[test]
    fn mock_failure_is_returned() {
        let mock = MockSttEngine::failing(SttError::NoSpeechDetected);
        assert_eq!(mock.transcribe(&[]), Err(SttError::NoSpeechDetected));
    }
}
