//! Full-screen ANSI renderer for the sign's terminal.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │            Design Studio             │  header
//! │                                      │
//! │                 Open                 │  title
//! │                                      │
//! │           Mentor on Duty:            │  mentor block (green only)
//! │             Alice & Bob              │
//! │                                      │
//! │                               2:05PM │  clock
//! └──────────────────────────────────────┘
//! ```
//!
//! Every frame repaints the whole screen from the cursor home position in
//! 24-bit colour. Laid-out lines are cached per (text, size, colour).

use super::cache::LruCache;
use super::{RenderError, RenderPort};
use crate::error::{Result, SignError};
use crate::sign::Background;
use crate::sign::decision::{mentor_label, parse_start};
use chrono::{Local, NaiveTime};
use log::{info, warn};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;

/// Number of laid-out lines kept around between frames.
pub const TEXT_CACHE_CAPACITY: usize = 7;

const CLEAR_SCREEN: &str = "\x1b[2J";
const CURSOR_HOME: &str = "\x1b[H";
const HIDE_CURSOR: &str = "\x1b[?25l";
const SHOW_CURSOR: &str = "\x1b[?25h";
const RESET: &str = "\x1b[0m";

/// Screen size in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    columns: u16,
    rows: u16,
}

impl Layout {
    /// Header, title, two mentor lines and the clock need at least 20x8.
    pub fn new(columns: u16, rows: u16) -> std::result::Result<Self, String> {
        if columns < 20 || rows < 8 {
            return Err(format!("{columns}x{rows} is too small for the sign"));
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> u16 {
        self.columns
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            columns: 80,
            rows: 24,
        }
    }
}

impl FromStr for Layout {
    type Err = String;

    /// `columnsxrows`, e.g. `80x24`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (columns, rows) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected COLUMNSxROWS, got {s:?}"))?;
        let columns: u16 = columns.trim().parse().map_err(|e| format!("columns: {e}"))?;
        let rows: u16 = rows.trim().parse().map_err(|e| format!("rows: {e}"))?;
        Self::new(columns, rows)
    }
}

/// Typographic role of a line. Part of the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSize {
    Header,
    Title,
    Body,
    Clock,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TextKey {
    text: String,
    size: TextSize,
    background: Background,
}

/// Renders frames onto a terminal writer.
pub struct TerminalDisplay<W: Write + Send> {
    out: W,
    layout: Layout,
    header: String,
    cache: LruCache<TextKey, String>,
    clock: Box<dyn Fn() -> NaiveTime + Send>,
}

impl TerminalDisplay<Box<dyn Write + Send>> {
    /// Open the sign's terminal: a tty device path, or stdout for `None`.
    pub fn open(device: Option<&Path>, layout: Layout, header: impl Into<String>) -> Result<Self> {
        let out: Box<dyn Write + Send> = match device {
            Some(path) => {
                let file = OpenOptions::new().write(true).open(path).map_err(|e| {
                    SignError::DisplayUnavailable(format!("{}: {}", path.display(), e))
                })?;
                info!("[Display] Rendering to {}", path.display());
                Box::new(file)
            }
            None => {
                info!("[Display] Rendering to stdout");
                Box::new(io::stdout())
            }
        };
        let mut display = Self::new(out, layout, header);
        display
            .prepare()
            .map_err(|e| SignError::DisplayUnavailable(e.to_string()))?;
        Ok(display)
    }
}

impl<W: Write + Send> TerminalDisplay<W> {
    pub fn new(out: W, layout: Layout, header: impl Into<String>) -> Self {
        Self {
            out,
            layout,
            header: header.into(),
            cache: LruCache::new(TEXT_CACHE_CAPACITY),
            clock: Box::new(|| Local::now().time()),
        }
    }

    /// Replace the wall clock, e.g. with a fixed time.
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveTime + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    fn prepare(&mut self) -> io::Result<()> {
        write!(self.out, "{HIDE_CURSOR}{CLEAR_SCREEN}")?;
        self.out.flush()
    }

    fn line(&mut self, text: &str, size: TextSize, background: Background) -> String {
        let columns = usize::from(self.layout.columns);
        let key = TextKey {
            text: text.to_string(),
            size,
            background,
        };
        self.cache
            .get_or_insert_with(key, |key| lay_out(&key.text, key.size, key.background, columns))
            .clone()
    }

    /// The frame as one string of rows.
    fn compose(&mut self, title: &str, subtitle: &str, background: Background) -> String {
        let rows = usize::from(self.layout.rows);
        let middle = rows / 2;
        let mut lines: Vec<(String, TextSize)> = vec![(String::new(), TextSize::Body); rows];

        lines[0] = (self.header.clone(), TextSize::Header);
        lines[middle - 2] = (title.to_string(), TextSize::Title);

        match background {
            Background::Green if !subtitle.is_empty() => {
                lines[middle] = (mentor_label(subtitle, true).trim_end().to_string(), TextSize::Body);
                lines[middle + 1] = (subtitle.to_string(), TextSize::Body);
            }
            Background::Red if parse_start(subtitle).is_some() => {
                lines[middle] = (format!("Opens at {subtitle}"), TextSize::Body);
            }
            _ => {}
        }

        let now = (self.clock)();
        lines[rows - 1] = (now.format("%-I:%M%p").to_string(), TextSize::Clock);

        let mut frame = String::from(CURSOR_HOME);
        let last = lines.len() - 1;
        for (i, (text, size)) in lines.into_iter().enumerate() {
            frame.push_str(&self.line(&text, size, background));
            if i != last {
                frame.push_str("\r\n");
            }
        }
        frame.push_str(RESET);
        frame
    }
}

impl<W: Write + Send> RenderPort for TerminalDisplay<W> {
    fn render(
        &mut self,
        title: &str,
        subtitle: &str,
        background: Background,
    ) -> std::result::Result<(), RenderError> {
        let frame = self.compose(title, subtitle, background);
        self.out.write_all(frame.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }

    fn release(mut self: Box<Self>) {
        self.cache.clear();
        let result = write!(self.out, "{RESET}{CLEAR_SCREEN}{CURSOR_HOME}{SHOW_CURSOR}")
            .and_then(|()| self.out.flush());
        match result {
            Ok(()) => info!("[Display] Released"),
            Err(e) => warn!("[Display] Failed to clear the screen on release: {}", e),
        }
    }
}

/// One full-width row: colours, alignment and padding.
fn lay_out(text: &str, size: TextSize, background: Background, columns: usize) -> String {
    let text: String = text.chars().take(columns).collect();
    let width = text.chars().count();
    let (left, right) = match size {
        TextSize::Clock => {
            let margin = (columns - width).min(1);
            (columns - width - margin, margin)
        }
        _ => {
            let left = (columns - width) / 2;
            (left, columns - width - left)
        }
    };
    let (r, g, b) = background.rgb();
    let style = match size {
        TextSize::Title => "\x1b[1m",
        TextSize::Header => "\x1b[2m",
        TextSize::Body | TextSize::Clock => "",
    };
    format!(
        "\x1b[48;2;{r};{g};{b}m\x1b[97m{style}{}{text}{}\x1b[22m",
        " ".repeat(left),
        " ".repeat(right)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn display() -> TerminalDisplay<Vec<u8>> {
        TerminalDisplay::new(Vec::new(), Layout::default(), "Design Studio")
            .with_clock(|| NaiveTime::from_hms_opt(14, 5, 0).unwrap())
    }

    fn rendered(display: &TerminalDisplay<Vec<u8>>) -> String {
        String::from_utf8(display.writer().clone()).unwrap()
    }

    #[test]
    fn test_layout_parse() {
        assert_eq!("100x30".parse::<Layout>(), Layout::new(100, 30));
        assert_eq!(Layout::new(100, 30).unwrap().columns(), 100);
        assert!("80".parse::<Layout>().is_err());
        assert!("10x4".parse::<Layout>().is_err());
    }

    #[test]
    fn test_layout_rejects_too_small() {
        assert!(Layout::new(80, 3).is_err());
        assert!(Layout::new(19, 24).is_err());
        assert!(Layout::new(20, 8).is_ok());
    }

    #[test]
    fn test_smallest_layout_renders_every_row() {
        let layout = Layout::new(20, 8).unwrap();
        let mut display = TerminalDisplay::new(Vec::new(), layout, "Design Studio")
            .with_clock(|| NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        let frame = display.compose("Open", "Alice & Bob", Background::Green);
        assert_eq!(frame.split("\r\n").count(), 8);
    }

    #[test]
    fn test_open_frame_shows_mentors() {
        let mut display = display();
        display.render("Open", "Alice & Bob", Background::Green).unwrap();

        let out = rendered(&display);
        assert!(out.contains("Design Studio"));
        assert!(out.contains("Open"));
        assert!(out.contains("Mentors on Duty:"));
        assert!(out.contains("Alice & Bob"));
        assert!(out.contains("2:05PM"));
        assert!(out.contains("\x1b[48;2;0;95;77m"));
    }

    #[test]
    fn test_closed_frame_shows_reopen_time_only_for_times() {
        let mut display = display();
        display.render("Closed", "6:00PM", Background::Red).unwrap();
        assert!(rendered(&display).contains("Opens at 6:00PM"));

        let mut display = self::display();
        display.render("Closed", "?", Background::Red).unwrap();
        let out = rendered(&display);
        assert!(!out.contains("Opens at"));
        assert!(!out.contains('?'));
        assert!(out.contains("\x1b[48;2;199;0;43m"));
    }

    #[test]
    fn test_every_row_is_full_width() {
        let mut display = display();
        let frame = display.compose("Open", "Alice", Background::Green);
        let rows: Vec<&str> = frame.split("\r\n").collect();
        assert_eq!(rows.len(), 24);
        for row in rows {
            let visible: String = strip_ansi(row);
            assert_eq!(visible.chars().count(), 80, "{visible:?}");
        }
    }

    #[test]
    fn test_cache_is_bounded() {
        let mut display = display();
        for name in ["A", "B", "C", "D", "E", "F", "G", "H"] {
            display.render("Open", name, Background::Green).unwrap();
        }
        assert_eq!(display.cache.len(), TEXT_CACHE_CAPACITY);
    }

    #[test]
    fn test_release_restores_terminal() {
        let out = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let display = TerminalDisplay::new(SharedBuf(out.clone()), Layout::default(), "x");
        Box::new(display).release();
        let written = String::from_utf8(out.lock().clone()).unwrap();
        assert!(written.ends_with(SHOW_CURSOR));
    }

    struct SharedBuf(std::sync::Arc<parking_lot::Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn strip_ansi(s: &str) -> String {
        let mut out = String::new();
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            if c == '\x1b' {
                for c in chars.by_ref() {
                    if c.is_ascii_alphabetic() {
                        break;
                    }
                }
            } else {
                out.push(c);
            }
        }
        out
    }
}
