//! Character display rendering
//!
//! Everything shown on the 20x4 display goes through [`Frame`]: four lines,
//! each truncated to the display width and blank-padded so a shorter value
//! always erases what a longer one left behind.

use crate::NodeError;
use crate::config::{LCD_COLUMNS, LCD_ROWS};
use crate::sensor::SensorReading;
use core::fmt::{self, Write};
use heapless::String;
use log::warn;

/// One display row: up to 20 characters, each up to 4 bytes of UTF-8
pub type DisplayLine = String<{ LCD_COLUMNS * 4 }>;

/// Character display port
pub trait CharDisplay {
    /// Write `text` at column 0 of `row`
    fn write_line(&mut self, row: u8, text: &str) -> Result<(), NodeError>;
    /// Blank the whole display
    fn clear(&mut self) -> Result<(), NodeError>;
}

/// `fmt::Write` sink that silently drops every character past the display width
struct Truncating<'a> {
    line: &'a mut DisplayLine,
    width: usize,
}

impl Write for Truncating<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.width == LCD_COLUMNS || self.line.push(c).is_err() {
                break;
            }
            self.width += 1;
        }
        Ok(())
    }
}

/// Format a line, truncate it to the display width and pad it with spaces
pub fn format_line(args: fmt::Arguments<'_>) -> DisplayLine {
    let mut line = DisplayLine::new();
    let mut sink = Truncating {
        line: &mut line,
        width: 0,
    };
    // Truncating never fails; a Display impl error just leaves a shorter line
    let _ = sink.write_fmt(args);
    for _ in sink.width..LCD_COLUMNS {
        let _ = line.push(' ');
    }
    line
}

/// Pad plain text to a full line
pub fn pad_line(text: &str) -> DisplayLine {
    format_line(format_args!("{}", text))
}

/// Four lines to flush in one go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    lines: [DisplayLine; LCD_ROWS],
    clear_first: bool,
}

impl Frame {
    pub fn new(lines: [DisplayLine; LCD_ROWS]) -> Self {
        Self {
            lines,
            clear_first: false,
        }
    }

    pub fn blank() -> Self {
        Self::new(core::array::from_fn(|_| pad_line("")))
    }

    pub fn boot() -> Self {
        let mut frame = Self::blank();
        frame.lines[0] = pad_line("Sensors Initializing");
        frame
    }

    /// The regular four-line reading view
    pub fn reading(reading: &SensorReading) -> Self {
        Self::new([
            format_line(format_args!(
                "T:{:4.1}C  H:{:4.1}%",
                reading.temperature, reading.humidity
            )),
            format_line(format_args!(
                "L:{:3}% Level:{}",
                reading.light_percent,
                reading.light_level()
            )),
            format_line(format_args!(
                "NOx:{:3}% Raw:{:4}",
                reading.air_quality_percent, reading.air_quality_raw
            )),
            format_line(format_args!("PIR: {}", reading.motion_status())),
        ])
    }

    pub fn sensor_error() -> Self {
        Self::new([
            pad_line("DHT22 Error"),
            pad_line("Check wiring"),
            pad_line(""),
            pad_line(""),
        ])
    }

    pub fn joining(ssid: &str, attempt: u32, max_attempts: u32) -> Self {
        Self::new([
            pad_line("WiFi connecting"),
            pad_line(ssid),
            format_line(format_args!("Attempt {}/{}", attempt, max_attempts)),
            pad_line(""),
        ])
    }

    pub fn joined(address: Option<[u8; 4]>) -> Self {
        let address_line = match address {
            Some(ip) => format_line(format_args!("{}.{}.{}.{}", ip[0], ip[1], ip[2], ip[3])),
            None => pad_line("IP pending"),
        };
        Self::new([
            pad_line("WiFi connected"),
            address_line,
            pad_line(""),
            pad_line(""),
        ])
    }

    pub fn session_retry(host: &str, attempt: u32) -> Self {
        Self::new([
            pad_line("MQTT connecting"),
            pad_line(host),
            format_line(format_args!("Retry #{}", attempt)),
            pad_line(""),
        ])
    }

    /// Quote overlay: clears the display, label and text on rows 0-1
    pub fn overlay_quote(&mut self, text: &str) {
        *self = Self::blank();
        self.clear_first = true;
        self.lines[0] = pad_line("Quote:");
        self.lines[1] = pad_line(text);
    }

    /// Summary overlay: label and text on rows 2-3
    pub fn overlay_summary(&mut self, text: &str) {
        self.lines[2] = pad_line("Summary:");
        self.lines[3] = pad_line(text);
    }

    pub fn line(&self, row: usize) -> &str {
        self.lines[row].as_str()
    }

    pub fn clears_first(&self) -> bool {
        self.clear_first
    }
}

/// Renders frames on a [`CharDisplay`]
pub struct Screen<D> {
    display: D,
}

impl<D: CharDisplay> Screen<D> {
    pub fn new(display: D) -> Self {
        Self { display }
    }

    /// Flush a frame; bus errors are logged and the rest of the frame is skipped
    pub fn render(&mut self, frame: &Frame) {
        if let Err(e) = self.try_render(frame) {
            warn!("[LCD] Render failed: {:?}", e);
        }
    }

    fn try_render(&mut self, frame: &Frame) -> Result<(), NodeError> {
        if frame.clear_first {
            self.display.clear()?;
        }
        for (row, line) in frame.lines.iter().enumerate() {
            self.display.write_line(row as u8, line.as_str())?;
        }
        Ok(())
    }

    pub fn display(&self) -> &D {
        &self.display
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SensorReading {
        SensorReading {
            temperature: 25.0,
            humidity: 40.0,
            light_percent: 70,
            light_digital_high: false,
            air_quality_percent: 10,
            air_quality_raw: 409,
            motion_detected: false,
        }
    }

    #[test]
    fn padded_lines_blank_the_tail() {
        let source = "abcdefghijklmnopqrst";
        for len in 0..=LCD_COLUMNS {
            let line = pad_line(&source[..len]);
            assert_eq!(line.len(), LCD_COLUMNS);
            assert_eq!(&line[..len], &source[..len]);
            assert!(line[len..].chars().all(|c| c == ' '));
        }
    }

    #[test]
    fn long_text_is_truncated() {
        let line = pad_line("The quick brown fox jumps over the lazy dog");
        assert_eq!(line.as_str(), "The quick brown fox ");
    }

    #[test]
    fn truncation_counts_characters() {
        let accented = "é".repeat(30);
        let line = pad_line(&accented);
        assert_eq!(line.chars().count(), LCD_COLUMNS);
        assert!(line.chars().all(|c| c == 'é'));

        let short = pad_line("Grüße");
        assert_eq!(short.chars().count(), LCD_COLUMNS);
        assert!(short.starts_with("Grüße "));
    }

    #[test]
    fn reading_frame_layout() {
        let frame = Frame::reading(&sample());
        assert_eq!(frame.line(0), "T:25.0C  H:40.0%    ");
        assert_eq!(frame.line(1), "L: 70% Level:HIGH   ");
        assert_eq!(frame.line(2), "NOx: 10% Raw: 409   ");
        assert_eq!(frame.line(3), "PIR: No Motion      ");
        assert!(!frame.clears_first());
    }

    #[test]
    fn quote_then_summary_overlay() {
        let mut frame = Frame::reading(&sample());
        frame.overlay_quote("Rooms that breathe slowly keep their secrets");
        frame.overlay_summary("Deadline moved to Friday");
        assert!(frame.clears_first());
        assert_eq!(frame.line(0), "Quote:              ");
        assert_eq!(frame.line(1), "Rooms that breathe s");
        assert_eq!(frame.line(2), "Summary:            ");
        assert_eq!(frame.line(3), "Deadline moved to Fr");
    }

    #[test]
    fn summary_alone_keeps_reading_rows() {
        let mut frame = Frame::reading(&sample());
        frame.overlay_summary("Dinner on Saturday?");
        assert!(!frame.clears_first());
        assert_eq!(frame.line(0), "T:25.0C  H:40.0%    ");
        assert_eq!(frame.line(3), "Dinner on Saturday? ");
    }
}
