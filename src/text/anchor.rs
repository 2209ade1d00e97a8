//! Anchors: positions that track their neighboring character.
//!
//! An anchor is attached to a character rather than an offset, so it keeps
//! pointing at the same logical place while text is inserted or deleted
//! elsewhere. When the character it is attached to is deleted, the anchor
//! resolves to where that character used to be.

use serde::{Deserialize, Serialize};

use super::{TextBuffer, View};
use crate::oplog::CharRef;

/// Which side of its character an anchor sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bias {
    /// Directly after the character (text inserted at the anchor lands after it).
    Left,
    /// Directly before the character.
    Right,
}

/// A logical buffer position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anchor {
    /// The start of the buffer.
    Start,
    /// The end of the buffer.
    End,
    /// Next to a specific character.
    Char {
        /// The character.
        char: CharRef,
        /// Which side of it.
        bias: Bias,
    },
}

impl TextBuffer {
    /// Create an anchor at visible offset `offset`.
    ///
    /// `Bias::Left` attaches to the character before the offset,
    /// `Bias::Right` to the character at it.
    #[must_use]
    pub fn anchor_at(&self, view: View<'_>, offset: usize, bias: Bias) -> Anchor {
        let target = match bias {
            Bias::Left => offset.checked_sub(1),
            Bias::Right => Some(offset),
        };
        let Some(index) = target else {
            return Anchor::Start;
        };
        match self.visible_chars(view).nth(index) {
            Some((char, _)) => Anchor::Char { char, bias },
            None => Anchor::End,
        }
    }

    /// Resolve an anchor to a visible offset.
    ///
    /// Returns `None` if the anchor names a character this buffer never
    /// contained.
    #[must_use]
    pub fn resolve_anchor(&self, view: View<'_>, anchor: &Anchor) -> Option<usize> {
        match *anchor {
            Anchor::Start => Some(0),
            Anchor::End => Some(self.len(view)),
            Anchor::Char { char, bias } => {
                let (before, visible) = self.locate(view, char)?;
                Some(match bias {
                    Bias::Left if visible => before + 1,
                    _ => before,
                })
            }
        }
    }
}
