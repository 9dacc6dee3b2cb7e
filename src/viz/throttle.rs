//! Frame-rate cap between the analysis loop and the renderer.
//!
//! A pure rate limiter: [`RenderThrottle::ready`] answers "may I draw now?"
//! at most `max_fps` times per second.  Frames arriving in between are
//! dropped by the caller, never buffered.  Time is injected so tests are
//! deterministic.
//!
//! # Example
//!
//! ```rust
//! use std::time::{Duration, Instant};
//! use voicewire::viz::RenderThrottle;
//!
//! let mut throttle = RenderThrottle::new(10); // at most 10 fps
//! let t0 = Instant::now();
//! assert!(throttle.ready(t0));                              // first frame passes
//! assert!(!throttle.ready(t0 + Duration::from_millis(50))); // too soon
//! assert!(throttle.ready(t0 + Duration::from_millis(100))); // interval elapsed
//! ```

use std::time::{Duration, Instant};

/// Caps how often frames are forwarded to the renderer.
pub struct RenderThrottle {
    min_interval: Duration,
    last_emit: Option<Instant>,
}

impl RenderThrottle {
    /// Allow at most `max_fps` frames per second (`0` is treated as `1`).
    pub fn new(max_fps: u32) -> Self {
        Self {
            min_interval: Duration::from_secs(1) / max_fps.max(1),
            last_emit: None,
        }
    }

    /// Returns `true` when enough time has passed since the last forwarded
    /// frame.  A `true` result counts as an emission.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last_emit {
            Some(last) if now.duration_since(last) < self.min_interval => false,
            _ => {
                self.last_emit = Some(now);
                true
            }
        }
    }

    /// Minimum spacing between forwarded frames.
    pub fn interval(&self) -> Duration {
        self.min_interval
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_always_passes() {
        let mut t = RenderThrottle::new(30);
        assert!(t.ready(Instant::now()));
    }

    #[test]
    fn frames_within_interval_are_dropped() {
        let mut t = RenderThrottle::new(10); // 100 ms interval
        let t0 = Instant::now();
        assert!(t.ready(t0));
        assert!(!t.ready(t0 + Duration::from_millis(10)));
        assert!(!t.ready(t0 + Duration::from_millis(99)));
        assert!(t.ready(t0 + Duration::from_millis(100)));
    }

    /// Dropped frames must not shift the schedule: readiness is measured
    /// from the last *emitted* frame.
    #[test]
    fn dropped_frames_do_not_reset_interval() {
        let mut t = RenderThrottle::new(10);
        let t0 = Instant::now();
        assert!(t.ready(t0));
        for ms in [20, 40, 60, 80] {
            assert!(!t.ready(t0 + Duration::from_millis(ms)));
        }
        assert!(t.ready(t0 + Duration::from_millis(101)));
    }

    #[test]
    fn sustained_rate_is_capped() {
        let mut t = RenderThrottle::new(10);
        let t0 = Instant::now();

        // 1 simulated second of 60 Hz frames → at most 11 pass
        // (one at t0 plus one per full interval).
        let mut emitted = 0;
        for i in 0..60 {
            if t.ready(t0 + Duration::from_millis(i * 1000 / 60)) {
                emitted += 1;
            }
        }
        assert!(emitted <= 11, "emitted {emitted} frames");
        assert!(emitted >= 9, "throttle too aggressive: {emitted}");
    }

    #[test]
    fn zero_fps_is_clamped() {
        let t = RenderThrottle::new(0);
        assert_eq!(t.interval(), Duration::from_secs(1));
    }
}
