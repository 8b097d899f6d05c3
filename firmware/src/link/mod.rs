//! Host link: newline-delimited level commands arriving over the control
//! UART, one decimal level per line.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use heapless::Vec;

use crate::output::LevelCommand;

/// Longest accepted command line, excluding the terminator.
pub const MAX_LINE_LEN: usize = 16;

/// Why a received line did not produce a command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LineError {
    /// Line exceeded [`MAX_LINE_LEN`] before a terminator arrived.
    TooLong,
    /// Line was not a decimal level in `[0, 1]`.
    BadLevel,
}

impl LineError {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            LineError::TooLong => "line too long",
            LineError::BadLevel => "not a level in [0, 1]",
        }
    }
}

/// Accumulates UART bytes into newline-terminated level commands.
///
/// An overlong line is reported once at its terminator and the bytes in
/// between are discarded, so a burst of noise cannot wedge the accumulator.
#[derive(Default)]
pub struct LineAccumulator {
    buf: Vec<u8, MAX_LINE_LEN>,
    overflowed: bool,
}

impl LineAccumulator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            overflowed: false,
        }
    }

    /// Feeds one received byte. Returns a parse result when a terminator
    /// completes a line; blank lines (and the `\n` of a `\r\n` pair) are
    /// swallowed.
    pub fn push(&mut self, byte: u8) -> Option<Result<LevelCommand, LineError>> {
        match byte {
            b'\n' | b'\r' => {
                let overflowed = core::mem::take(&mut self.overflowed);
                let line = core::mem::take(&mut self.buf);
                if overflowed {
                    Some(Err(LineError::TooLong))
                } else if line.is_empty() {
                    None
                } else {
                    Some(parse_level_line(&line))
                }
            }
            _ if self.overflowed => None,
            _ => {
                if self.buf.push(byte).is_err() {
                    self.overflowed = true;
                }
                None
            }
        }
    }
}

fn parse_level_line(line: &[u8]) -> Result<LevelCommand, LineError> {
    let text = core::str::from_utf8(line).map_err(|_| LineError::BadLevel)?;
    let level: f32 = text.trim().parse().map_err(|_| LineError::BadLevel)?;
    if (0.0..=1.0).contains(&level) {
        Ok(LevelCommand::new(level))
    } else {
        Err(LineError::BadLevel)
    }
}
