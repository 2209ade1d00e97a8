//! Row/column positions in a text buffer.
//!
//! Columns count Unicode scalar values (`char`s), not bytes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A zero-based `(row, column)` position.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Point {
    /// Line number.
    pub row: u32,
    /// Character offset within the line.
    pub column: u32,
}

impl Point {
    /// The start of a buffer.
    pub const ZERO: Self = Self { row: 0, column: 0 };

    /// Create a point.
    #[must_use]
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// Advance past one character.
    pub const fn advance_char(&mut self, ch: char) {
        if ch == '\n' {
            self.row += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
    }

    /// Advance past every character of `text`.
    pub fn advance_str(&mut self, text: &str) {
        for ch in text.chars() {
            self.advance_char(ch);
        }
    }

    /// The point reached from `self` after `text`.
    #[must_use]
    pub fn after(mut self, text: &str) -> Self {
        self.advance_str(text);
        self
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.column)
    }
}
