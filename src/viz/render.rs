//! Terminal bar renderer for spectrogram frames.
//!
//! Draws one row of half-block characters per frame onto the current
//! terminal line, colored green → yellow → red by intensity.  This is the
//! bundled implementation of the [`Renderer`](crate::viz::Renderer)
//! collaborator; the core pipeline only ever hands it normalized rows.

use std::io::{self, Write};

use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::{cursor, queue, terminal};

use crate::audio::SpectrogramFrame;
use crate::viz::Renderer;

/// Half-block characters for 8 levels of vertical resolution (low to high).
const BAR_GLYPHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Map a normalized level (`0.0..=1.0`) to a half-block character.
/// Exactly zero renders as a blank so silence reads as silence.
pub fn level_glyph(level: f32) -> char {
    let clamped = level.clamp(0.0, 1.0);
    if clamped == 0.0 {
        return ' ';
    }
    BAR_GLYPHS[((clamped * 8.0) as usize).min(7)]
}

/// Pick a color by level: green (low) → yellow (mid) → red (high).
fn level_color(level: f32) -> Color {
    let l = level.clamp(0.0, 1.0);
    if l < 0.33 {
        Color::Green
    } else if l < 0.66 {
        Color::Yellow
    } else {
        Color::Red
    }
}

// ---------------------------------------------------------------------------
// BarRenderer
// ---------------------------------------------------------------------------

/// Renders frames as a single in-place line of colored bars.
pub struct BarRenderer<W: Write> {
    out: W,
}

impl<W: Write> BarRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl BarRenderer<io::Stdout> {
    /// Renderer writing to stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Renderer for BarRenderer<W> {
    fn draw(&mut self, frame: &SpectrogramFrame) -> io::Result<()> {
        queue!(
            self.out,
            cursor::MoveToColumn(0),
            terminal::Clear(terminal::ClearType::CurrentLine)
        )?;
        for &level in &frame.rows {
            queue!(
                self.out,
                SetForegroundColor(level_color(level)),
                Print(level_glyph(level))
            )?;
        }
        queue!(self.out, ResetColor)?;
        self.out.flush()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
