//! Application entry point — voicewire voice-capture front end.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Open the capture device with bounded retry; a dead device degrades
//!    the session to analysis-only, it never aborts startup.
//! 4. Create the tokio runtime (multi-thread, 2 workers).
//! 5. Spawn the pipeline orchestrator, the analysis/render loop and the
//!    transcript printer.
//! 6. Run the raw-mode key loop on the main thread until quit.
//!
//! Terminals do not deliver key-release events, so the space bar toggles:
//! first press maps to `KeyDown`, the next to `KeyUp`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tokio::sync::mpsc;

use voicewire::audio::{
    shared_ring, AudioCapture, Resampler, SharedRingBuffer, SpectrogramEngine, StreamHandle,
    TARGET_SAMPLE_RATE,
};
use voicewire::config::AppConfig;
use voicewire::pipeline::{new_shared_state, ControlEvent, PipelineOrchestrator};
use voicewire::stt::{SttEngine, SttError};
use voicewire::viz::{BarRenderer, RenderThrottle, Renderer};

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("voicewire starting up");

    // 2. Configuration
    if AppConfig::is_first_run() {
        log::info!("no settings file yet — using defaults");
    }
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Capture device — bounded retry, degrade on failure.
    let (native_rate, ring, _stream): (u32, SharedRingBuffer, Option<StreamHandle>) =
        match AudioCapture::open_with_retry(
            config.audio.device_retries,
            Duration::from_millis(config.audio.device_retry_backoff_ms),
        ) {
            Ok(capture) => {
                let rate = capture.sample_rate();
                let ring = shared_ring(config.ring_capacity(rate));
                match capture.start(&ring) {
                    Ok(handle) => (rate, ring, Some(handle)),
                    Err(e) => {
                        log::error!("failed to start audio stream: {e}");
                        (rate, ring, None)
                    }
                }
            }
            Err(e) => {
                // Fatal to the capture subsystem only — analysis and the
                // control loop keep running against an empty buffer.
                log::error!("capture unavailable: {e}");
                let ring = shared_ring(config.ring_capacity(TARGET_SAMPLE_RATE));
                (TARGET_SAMPLE_RATE, ring, None)
            }
        };

    // 4. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    // 5. Channels, shared state, tasks
    let state = new_shared_state();
    let (control_tx, control_rx) = mpsc::channel::<ControlEvent>(16);
    let (transcript_tx, mut transcript_rx) = mpsc::channel::<String>(8);

    // The inference backend is a collaborator; without one configured the
    // pipeline still runs and reports the missing model per utterance.
    let stt: Arc<dyn SttEngine> = Arc::new(PlaceholderStt {
        detail: config
            .stt
            .model_path
            .clone()
            .unwrap_or_else(|| "no model configured".into()),
    });

    let orchestrator = PipelineOrchestrator::new(
        Arc::clone(&state),
        Arc::clone(&ring),
        Resampler::new(native_rate, TARGET_SAMPLE_RATE),
        stt,
        config.min_utterance_samples(native_rate),
        Duration::from_secs(config.stt.timeout_secs),
        transcript_tx,
    );
    rt.spawn(orchestrator.run(control_rx));

    // Analysis / render loop: fixed tick, throttled redraw, latest frame
    // mirrored into shared state.  Missed ticks are skipped, not queued.
    {
        let ring = Arc::clone(&ring);
        let state = Arc::clone(&state);
        let spectrum = config.spectrum.clone();
        rt.spawn(async move {
            let mut engine = SpectrogramEngine::new(&spectrum);
            let mut throttle = RenderThrottle::new(spectrum.render_max_fps);
            let mut renderer = BarRenderer::stdout();

            let mut ticker =
                tokio::time::interval(Duration::from_secs(1) / spectrum.tick_hz.max(1));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let frame = engine.tick(&ring);
                if throttle.ready(Instant::now()) {
                    if let Err(e) = renderer.draw(&frame) {
                        log::debug!("render failed: {e}");
                    }
                }
                if let Ok(mut st) = state.lock() {
                    st.frame = Some(frame);
                }
            }
        });
    }

    // Transcript consumer: downstream sees only the finalized string.
    rt.spawn(async move {
        while let Some(text) = transcript_rx.recv().await {
            print!("\r\n> {text}\r\n");
        }
    });

    // 6. Key loop on the main thread
    print!("voicewire — [space] start/stop talking  [backspace] discard  [q/esc] quit\r\n");
    terminal::enable_raw_mode()?;
    let result = key_loop(&control_tx);
    terminal::disable_raw_mode()?;
    println!();

    result
}

/// Raw-mode key loop: maps space toggles onto push-to-talk transitions.
fn key_loop(control_tx: &mpsc::Sender<ControlEvent>) -> Result<()> {
    let mut talking = false;

    loop {
        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let control = match key.code {
            KeyCode::Char('q') | KeyCode::Esc => break,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
            KeyCode::Char(' ') => {
                talking = !talking;
                if talking {
                    ControlEvent::KeyDown
                } else {
                    ControlEvent::KeyUp
                }
            }
            KeyCode::Backspace | KeyCode::Delete => {
                talking = false;
                ControlEvent::CancelUtterance
            }
            _ => continue,
        };

        control_tx
            .blocking_send(control)
            .map_err(|_| anyhow!("pipeline stopped"))?;
    }

    let _ = control_tx.blocking_send(ControlEvent::Shutdown);
    Ok(())
}

// ---------------------------------------------------------------------------
// PlaceholderStt — engine stub used when no model backend is wired up
// ---------------------------------------------------------------------------

struct PlaceholderStt {
    detail: String,
}

impl SttEngine for PlaceholderStt {
    fn transcribe(&self, _audio: &[f32]) -> Result<String, SttError> {
        Err(SttError::ModelNotLoaded(self.detail.clone()))
    }
}
