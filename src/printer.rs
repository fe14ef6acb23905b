//! The multiplexed, prefixed output stream.
//!
//! Every line written gets a `<time> <name> | ` prefix, with the name column
//! padded so that output from all processes lines up:
//!
//! ```text
//! 14:02:11 system | web.1 started (pid=4242)
//! 14:02:11 web.1  | Listening on port 5000
//! ```

use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Local};

use crate::colour::Colour;

pub const DEFAULT_TIME_FORMAT: &str = "%H:%M:%S";

/// A chunk of printable output.
///
/// Lifecycle events are rendered to text before they become a `Message`.
#[derive(Clone, Debug)]
pub struct Message {
    pub data: Vec<u8>,
    pub time: DateTime<Local>,
    pub name: Option<String>,
    pub colour: Option<Colour>,
}

impl Message {
    pub fn new(
        data: impl Into<Vec<u8>>,
        time: DateTime<Local>,
        name: Option<String>,
        colour: Option<Colour>,
    ) -> Self {
        Self {
            data: data.into(),
            time,
            name,
            colour,
        }
    }
}

/// Renders messages somewhere.
pub trait OutputPrinter {
    fn width(&self) -> usize;

    /// Sets the width of the name column.
    fn set_width(&mut self, width: usize);

    fn write(&mut self, message: &Message) -> io::Result<()>;
}

/// Writes prefixed lines to any `Write`, flushing after every message.
#[derive(Debug)]
pub struct Printer<W: Write> {
    output: W,
    time_format: String,
    width: usize,
    colour: bool,
}

impl<W: Write> Printer<W> {
    /// A printer that never emits colour codes.
    pub fn new(output: W) -> Self {
        Self {
            output,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            width: 0,
            colour: false,
        }
    }

    /// Enables or disables colour.
    ///
    /// Callers are responsible for only enabling colour on a terminal;
    /// [`Printer::stdout`] does that check itself.
    pub fn with_colour(mut self, colour: bool) -> Self {
        self.colour = colour;
        self
    }

    /// Sets the `strftime`-style format of the timestamp column.
    pub fn with_time_format(mut self, format: impl Into<String>) -> Self {
        self.time_format = format.into();
        self
    }

    pub fn into_inner(self) -> W {
        self.output
    }
}

impl Printer<io::Stdout> {
    /// A printer on stdout. Colour is used only if requested and stdout is a terminal.
    pub fn stdout(colour: bool) -> Self {
        let output = io::stdout();
        let tty = output.is_terminal();
        if colour && !tty {
            debug!("stdout is not a terminal, disabling colour");
        }

        Self::new(output).with_colour(colour && tty)
    }
}

impl<W: Write> OutputPrinter for Printer<W> {
    fn width(&self) -> usize {
        self.width
    }

    fn set_width(&mut self, width: usize) {
        self.width = width;
    }

    fn write(&mut self, message: &Message) -> io::Result<()> {
        let mut name = format!(
            "{:<width$}",
            message.name.as_deref().unwrap_or(""),
            width = self.width
        );
        if !name.is_empty() {
            name.push(' ');
        }

        let time = message.time.format(&self.time_format).to_string();
        let mut prefix = format!("{} {}| ", time, name);
        if self.colour {
            if let Some(colour) = message.colour {
                prefix = colour.paint(&prefix);
            }
        }

        // Undecodable bytes become U+FFFD rather than an error.
        let text = String::from_utf8_lossy(&message.data);
        for line in split_lines(&text) {
            writeln!(self.output, "{}{}", prefix, line)?;
        }

        self.output.flush()
    }
}

/// Splits on `\n`, `\r\n` and a bare `\r`, so that progress output which
/// only returns the carriage still gets one prefix per update.
fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        match rest.find(|c: char| c == '\n' || c == '\r') {
            Some(end) => {
                lines.push(&rest[..end]);
                let skip = if rest[end..].starts_with("\r\n") { 2 } else { 1 };
                rest = &rest[end + skip..];
            }
            None => {
                lines.push(rest);
                break;
            }
        }
    }
    lines
}
