//! Microphone capture via `cpal`.
//!
//! [`AudioCapture`] wraps the cpal host/device/stream lifecycle.  Call
//! [`AudioCapture::start`] with a [`SharedRingBuffer`]; the returned
//! [`StreamHandle`] is a RAII guard — dropping it stops the underlying
//! stream.
//!
//! The capture callback is the real-time edge of the system.  It does three
//! things and nothing else: convert the device's sample format, downmix to
//! mono into a preallocated scratch buffer, and perform one
//! `RingBuffer::write` under a `try_lock`.  On lock contention the batch is
//! dropped and counted — the producer never waits on a reader.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use thiserror::Error;

use crate::audio::buffer::SharedRingBuffer;
use crate::audio::resample::downmix_into;

// ---------------------------------------------------------------------------
// AudioFrame
// ---------------------------------------------------------------------------

/// A single batch of raw audio as delivered by a capture source.
///
/// Samples are interleaved `f32` in `[-1.0, 1.0]` at the source's native
/// rate and channel count.  Immutable once delivered.  The first frame's
/// `sample_rate`/`channels` fix the [`Resampler`](crate::audio::Resampler)
/// configuration for the rest of the stream.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Native sample rate of this frame in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo, …).
    pub channels: u16,
    /// Arrival sequence number (0-based batch counter).
    pub seq: u64,
}

/// Downmix `frame` to mono and append it to the shared ring buffer.
///
/// This is the non-real-time ingest path, used by tests and offline feeds
/// that stand in for a capture device; the live cpal callback does the same
/// work without allocating.
pub fn write_frame(ring: &SharedRingBuffer, frame: &AudioFrame) {
    let mut mono = Vec::new();
    downmix_into(&mut mono, &frame.samples, frame.channels);
    if let Ok(mut buf) = ring.lock() {
        buf.write(&mono);
    }
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while setting up or running the audio capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// The device could not be opened after the configured number of
    /// attempts.  Fatal to the capture subsystem only — analysis and
    /// control keep running without live audio.
    #[error("audio input device unavailable after {attempts} attempts")]
    DeviceUnavailable { attempts: u32 },
}

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// RAII guard that keeps the cpal stream alive.
///
/// Dropping this value stops the underlying hardware stream.
pub struct StreamHandle {
    _stream: cpal::Stream,
    dropped_batches: Arc<AtomicUsize>,
    frames_delivered: Arc<AtomicU64>,
}

impl StreamHandle {
    /// Batches discarded because a reader held the ring lock at the moment
    /// the callback fired.  Should stay near zero in normal operation.
    pub fn dropped_batches(&self) -> usize {
        self.dropped_batches.load(Ordering::Relaxed)
    }

    /// Total batches the device has delivered.
    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// AudioCapture
// ---------------------------------------------------------------------------

/// Microphone capture device wrapper built on top of `cpal`.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use voicewire::audio::{shared_ring, AudioCapture};
///
/// let capture = AudioCapture::open_with_retry(3, Duration::from_millis(500)).unwrap();
/// let ring = shared_ring(capture.sample_rate() as usize * 60);
/// let _handle = capture.start(&ring).unwrap();
/// // `_handle` keeps the stream alive; drop it to stop capturing.
/// ```
pub struct AudioCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    /// Native sample rate reported by the device (Hz).
    sample_rate: u32,
    /// Number of interleaved channels reported by the device.
    channels: u16,
}

impl AudioCapture {
    /// Open the system default input device with its preferred
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::NoDevice`] when no input device is available,
    /// or [`CaptureError::DefaultConfig`] when the device cannot report a
    /// default stream configuration.
    pub fn open() -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;

        let supported = device.default_input_config()?;
        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        log::info!("audio device ready: {sample_rate} Hz, {channels} ch, {sample_format:?}");

        Ok(Self {
            device,
            config,
            sample_format,
            sample_rate,
            channels,
        })
    }

    /// Open the default input device, retrying with exponential backoff.
    ///
    /// Devices can be briefly unavailable right after login or while
    /// another process holds them exclusively.  After `attempts` failures
    /// the error becomes [`CaptureError::DeviceUnavailable`].
    pub fn open_with_retry(attempts: u32, initial_backoff: Duration) -> Result<Self, CaptureError> {
        let mut backoff = initial_backoff;
        for attempt in 1..=attempts.max(1) {
            match Self::open() {
                Ok(capture) => return Ok(capture),
                Err(e) => {
                    log::warn!("audio device open failed (attempt {attempt}/{attempts}): {e}");
                    if attempt < attempts {
                        std::thread::sleep(backoff);
                        backoff = backoff.saturating_mul(2);
                    }
                }
            }
        }
        Err(CaptureError::DeviceUnavailable {
            attempts: attempts.max(1),
        })
    }

    /// Start capturing into `ring`.
    ///
    /// The cpal callback runs on a dedicated audio thread; each hardware
    /// buffer is downmixed to mono and written to the ring under a
    /// `try_lock`.  Stream errors are logged — the stream itself keeps
    /// running where the platform allows it.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::BuildStream`] or [`CaptureError::PlayStream`]
    /// if the platform rejects the stream configuration, and
    /// [`CaptureError::UnsupportedFormat`] for sample formats outside
    /// f32/i16/u16.
    pub fn start(&self, ring: &SharedRingBuffer) -> Result<StreamHandle, CaptureError> {
        let dropped = Arc::new(AtomicUsize::new(0));
        let delivered = Arc::new(AtomicU64::new(0));

        let stream = match self.sample_format {
            cpal::SampleFormat::F32 => self.build_stream::<f32>(ring, &dropped, &delivered)?,
            cpal::SampleFormat::I16 => self.build_stream::<i16>(ring, &dropped, &delivered)?,
            cpal::SampleFormat::U16 => self.build_stream::<u16>(ring, &dropped, &delivered)?,
            format => return Err(CaptureError::UnsupportedFormat(format!("{format:?}"))),
        };

        stream.play()?;
        log::debug!("audio stream started");

        Ok(StreamHandle {
            _stream: stream,
            dropped_batches: dropped,
            frames_delivered: delivered,
        })
    }

    fn build_stream<T>(
        &self,
        ring: &SharedRingBuffer,
        dropped: &Arc<AtomicUsize>,
        delivered: &Arc<AtomicU64>,
    ) -> Result<cpal::Stream, CaptureError>
    where
        T: SizedSample + Send + 'static,
        f32: FromSample<T>,
    {
        let ring = Arc::clone(ring);
        let dropped = Arc::clone(dropped);
        let delivered = Arc::clone(delivered);
        let channels = self.channels;

        // Scratch buffers reused across callbacks; after the first few
        // invocations the real-time path performs no allocation.
        let mut interleaved: Vec<f32> = Vec::new();
        let mut mono: Vec<f32> = Vec::new();

        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                delivered.fetch_add(1, Ordering::Relaxed);

                interleaved.clear();
                interleaved.extend(data.iter().map(|s| f32::from_sample(*s)));
                downmix_into(&mut mono, &interleaved, channels);

                // The producer must never wait on a reader: on contention
                // the batch is dropped and counted.
                match ring.try_lock() {
                    Ok(mut buf) => buf.write(&mono),
                    Err(_) => {
                        dropped.fetch_add(1, Ordering::Relaxed);
                    }
                }
            },
            |err: cpal::StreamError| {
                log::error!("audio stream error: {err}");
            },
            None,
        )?;

        Ok(stream)
    }

    /// Native sample rate of the capture stream in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels in each hardware buffer.
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::shared_ring;

    /// `AudioFrame` must be `Send` so it can cross thread boundaries.
    #[test]
    fn audio_frame_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AudioFrame>();
    }

    #[test]
    fn write_frame_downmixes_and_appends() {
        let ring = shared_ring(64);
        let frame = AudioFrame {
            samples: vec![1.0, -1.0, 0.5, 0.5], // L R L R
            sample_rate: 48_000,
            channels: 2,
            seq: 0,
        };
        write_frame(&ring, &frame);

        let buf = ring.lock().unwrap();
        assert_eq!(buf.write_seq(), 2);
        assert_eq!(buf.read_latest(2), vec![0.0, 0.5]);
    }

    #[test]
    fn write_frame_mono_passthrough() {
        let ring = shared_ring(64);
        let frame = AudioFrame {
            samples: vec![0.1, 0.2, 0.3],
            sample_rate: 16_000,
            channels: 1,
            seq: 7,
        };
        write_frame(&ring, &frame);
        assert_eq!(ring.lock().unwrap().read_latest(3), vec![0.1, 0.2, 0.3]);
    }

    /// Exhausted retries surface `DeviceUnavailable` with the attempt count
    /// (only runs meaningfully on hosts with no input device, so we just
    /// check the error formatting here).
    #[test]
    fn device_unavailable_message_names_attempts() {
        let err = CaptureError::DeviceUnavailable { attempts: 3 };
        assert!(err.to_string().contains("3 attempts"));
    }
}
