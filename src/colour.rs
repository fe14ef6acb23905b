//! ANSI colours assigned to processes.

use std::fmt;

/// An ANSI SGR colour code, such as `36` or `36;1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Colour(&'static str);

pub const RED: Colour = Colour("31");
pub const GREEN: Colour = Colour("32");
pub const YELLOW: Colour = Colour("33");
pub const BLUE: Colour = Colour("34");
pub const MAGENTA: Colour = Colour("35");
pub const CYAN: Colour = Colour("36");

pub const INTENSE_RED: Colour = Colour("31;1");
pub const INTENSE_GREEN: Colour = Colour("32;1");
pub const INTENSE_YELLOW: Colour = Colour("33;1");
pub const INTENSE_BLUE: Colour = Colour("34;1");
pub const INTENSE_MAGENTA: Colour = Colour("35;1");
pub const INTENSE_CYAN: Colour = Colour("36;1");

const PALETTE: [Colour; 12] = [
    CYAN,
    YELLOW,
    GREEN,
    MAGENTA,
    RED,
    BLUE,
    INTENSE_CYAN,
    INTENSE_YELLOW,
    INTENSE_GREEN,
    INTENSE_MAGENTA,
    INTENSE_RED,
    INTENSE_BLUE,
];

impl Colour {
    pub const fn code(self) -> &'static str {
        self.0
    }

    /// Wraps `s` in this colour, resetting afterwards.
    pub fn paint(self, s: &str) -> String {
        format!("\x1b[{}m{}\x1b[0m", self.code(), s)
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Endless round-robin over the process colours.
#[derive(Clone, Debug, Default)]
pub struct Palette {
    index: usize,
}

impl Iterator for Palette {
    type Item = Colour;

    fn next(&mut self) -> Option<Colour> {
        let colour = PALETTE[self.index % PALETTE.len()];
        self.index = self.index.wrapping_add(1);
        Some(colour)
    }
}
