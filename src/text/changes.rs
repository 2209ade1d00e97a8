//! Composed change sets between two views of a buffer.
//!
//! Changes are listed in document order and are sequentially applicable:
//! each change's `start` is expressed in the text produced by applying every
//! earlier change, and `end` is `start` advanced over the text it replaces.

use serde::{Deserialize, Serialize};

use super::{TextBuffer, View};
use crate::model::Point;

/// One replacement: the text between `start` and `end` becomes `text`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Start of the replaced region.
    pub start: Point,
    /// End of the replaced region (before replacement).
    pub end: Point,
    /// Replacement text.
    pub text: String,
}

struct Pending {
    start: Point,
    deleted_extent: Point,
    text: String,
}

impl Pending {
    fn finish(self) -> Change {
        let end = Point::new(
            self.start.row + self.deleted_extent.row,
            if self.deleted_extent.row == 0 {
                self.start.column + self.deleted_extent.column
            } else {
                self.deleted_extent.column
            },
        );
        Change {
            start: self.start,
            end,
            text: self.text,
        }
    }
}

impl TextBuffer {
    /// Changes transforming the text visible in `old` into the text visible
    /// in `new`.
    #[must_use]
    pub fn changes_between(&self, old: View<'_>, new: View<'_>) -> Vec<Change> {
        let mut changes = Vec::new();
        let mut cursor = Point::ZERO;
        let mut pending: Option<Pending> = None;
        for frag in &self.fragments {
            match (frag.is_visible(old), frag.is_visible(new)) {
                (true, true) => {
                    if let Some(p) = pending.take() {
                        changes.push(p.finish());
                    }
                    cursor.advance_str(&frag.text);
                }
                (true, false) => {
                    pending
                        .get_or_insert_with(|| Pending {
                            start: cursor,
                            deleted_extent: Point::ZERO,
                            text: String::new(),
                        })
                        .deleted_extent
                        .advance_str(&frag.text);
                }
                (false, true) => {
                    pending
                        .get_or_insert_with(|| Pending {
                            start: cursor,
                            deleted_extent: Point::ZERO,
                            text: String::new(),
                        })
                        .text
                        .push_str(&frag.text);
                    cursor.advance_str(&frag.text);
                }
                (false, false) => {}
            }
        }
        if let Some(p) = pending {
            changes.push(p.finish());
        }
        changes
    }
}
