//! Per-file text CRDT.
//!
//! A [`TextBuffer`] is a sequence of fragments. Each fragment is a run of
//! characters from one insertion, plus the set of operations that deleted
//! it. Deleted text is kept as a tombstone so later operations can still
//! refer to it, and so the buffer's contents at any earlier [`Version`] can be
//! recovered.
//!
//! # Ordering
//!
//! An insertion is placed directly after the character it names, then skips
//! forward past every fragment whose [`InsertionId::precedence`] is greater.
//! Every insertion's precedence exceeds that of the character it follows, so
//! the resulting order does not depend on integration order.
//!
//! # Visibility
//!
//! Whether a fragment is visible is evaluated against a [`View`]: a version
//! plus the chain of active epochs at that version. User text is visible once
//! its operation is observed; base text only while its epoch is on the chain.

pub mod anchor;
pub mod changes;

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::TreeError;
use crate::model::{Lamport, LocalTimestamp, Point, Version};
use crate::oplog::{CharRef, DeleteSpan, EpochId, Insertion, InsertionId};

pub use anchor::{Anchor, Bias};
pub use changes::Change;

// ---------------------------------------------------------------------------
// BufferId
// ---------------------------------------------------------------------------

/// Handle to an open text buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BufferId(u64);

impl BufferId {
    /// Wrap a raw handle.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Origins and deleters
// ---------------------------------------------------------------------------

/// Who inserted a fragment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Origin {
    /// A user edit operation.
    User(LocalTimestamp),
    /// The base layer of an epoch.
    Base(EpochId),
}

/// Who deleted a fragment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Deleter {
    /// A user edit operation.
    User(LocalTimestamp),
    /// The base layer of an epoch.
    Base(EpochId),
}

/// The point of view visibility is evaluated from.
#[derive(Clone, Copy, Debug)]
pub struct View<'a> {
    /// Operations considered applied.
    pub version: &'a Version,
    /// Epochs whose base layers are active.
    pub chain: &'a BTreeSet<EpochId>,
}

impl View<'_> {
    fn inserted(&self, origin: Origin) -> bool {
        match origin {
            Origin::User(ts) => self.version.observed(ts),
            Origin::Base(epoch) => self.chain.contains(&epoch),
        }
    }

    fn deleted_by(&self, deleter: Deleter) -> bool {
        match deleter {
            Deleter::User(ts) => self.version.observed(ts),
            Deleter::Base(epoch) => self.chain.contains(&epoch),
        }
    }
}

// ---------------------------------------------------------------------------
// Fragment
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
struct Fragment {
    insertion: InsertionId,
    origin: Origin,
    /// Offset of the first character within the insertion.
    offset: usize,
    /// Length in characters.
    len: usize,
    text: String,
    deleters: Vec<Deleter>,
}

impl Fragment {
    fn is_visible(&self, view: View<'_>) -> bool {
        view.inserted(self.origin) && !self.deleters.iter().any(|&d| view.deleted_by(d))
    }

    fn contains(&self, r: CharRef) -> bool {
        self.insertion == r.insertion && (self.offset..self.offset + self.len).contains(&r.offset)
    }

    fn chars(&self) -> impl Iterator<Item = (CharRef, char)> + '_ {
        self.text.chars().zip(self.offset..).map(|(ch, offset)| {
            (
                CharRef {
                    insertion: self.insertion,
                    offset,
                },
                ch,
            )
        })
    }
}

// ---------------------------------------------------------------------------
// EditRecord
// ---------------------------------------------------------------------------

/// A user edit as stored for replay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditRecord {
    /// The edit operation's id.
    pub id: LocalTimestamp,
    /// The edit operation's Lamport reading.
    pub lamport: Lamport,
    /// Characters deleted.
    pub deletions: Vec<DeleteSpan>,
    /// Text inserted.
    pub insertions: Vec<Insertion>,
}

impl EditRecord {
    /// Whether the edit changes anything.
    #[must_use]
    pub fn is_effective(&self) -> bool {
        !self.deletions.is_empty() || self.insertions.iter().any(|i| !i.text.is_empty())
    }
}

// ---------------------------------------------------------------------------
// TextBuffer
// ---------------------------------------------------------------------------

/// Replicated text contents of one file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextBuffer {
    fragments: Vec<Fragment>,
    layers: BTreeSet<EpochId>,
}

impl TextBuffer {
    /// An empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the base layer of `epoch` has been integrated.
    #[must_use]
    pub fn has_layer(&self, epoch: EpochId) -> bool {
        self.layers.contains(&epoch)
    }

    /// Record that the base layer of `epoch` has been integrated.
    pub fn mark_layer(&mut self, epoch: EpochId) {
        self.layers.insert(epoch);
    }

    // -----------------------------------------------------------------------
    // Integration
    // -----------------------------------------------------------------------

    /// Insert `text` after `after` (or at the start) under identity `id`.
    ///
    /// # Errors
    /// Returns [`TreeError::MalformedOperation`] if `after` names a character
    /// this buffer does not contain.
    pub fn integrate_insertion(
        &mut self,
        id: InsertionId,
        origin: Origin,
        after: Option<CharRef>,
        text: &str,
    ) -> Result<(), TreeError> {
        if text.is_empty() {
            return Ok(());
        }
        let mut pos = match after {
            None => 0,
            Some(r) => self.split_after(r)?,
        };
        while pos < self.fragments.len()
            && self.fragments[pos].insertion.precedence() > id.precedence()
        {
            pos += 1;
        }
        self.fragments.insert(
            pos,
            Fragment {
                insertion: id,
                origin,
                offset: 0,
                len: text.chars().count(),
                text: text.to_owned(),
                deleters: Vec::new(),
            },
        );
        Ok(())
    }

    /// Mark the characters of `span` as deleted by `deleter`.
    ///
    /// # Errors
    /// Returns [`TreeError::MalformedOperation`] if the span is empty or
    /// reaches past the text of its insertion.
    pub fn integrate_deletion(
        &mut self,
        span: &DeleteSpan,
        deleter: Deleter,
    ) -> Result<(), TreeError> {
        if span.start >= span.end {
            return Err(TreeError::malformed(format!(
                "empty deletion {}..{}",
                span.start, span.end
            )));
        }
        let mut covered = 0;
        let mut i = 0;
        while i < self.fragments.len() {
            let frag = &self.fragments[i];
            let (lo, hi) = (frag.offset, frag.offset + frag.len);
            let start = span.start.max(lo);
            let end = span.end.min(hi);
            if frag.insertion != span.insertion || start >= end {
                i += 1;
                continue;
            }
            if start > lo {
                self.split(i, start - lo);
                i += 1;
                continue;
            }
            if end < hi {
                self.split(i, end - lo);
            }
            let frag = &mut self.fragments[i];
            if !frag.deleters.contains(&deleter) {
                frag.deleters.push(deleter);
            }
            covered += end - start;
            i += 1;
        }
        if covered == span.end - span.start {
            Ok(())
        } else {
            Err(TreeError::malformed(format!(
                "deletion {}..{} of {:?} covers unknown text",
                span.start, span.end, span.insertion
            )))
        }
    }

    /// Integrate a user edit.
    ///
    /// # Errors
    /// Returns [`TreeError::MalformedOperation`] if the edit references text
    /// this buffer does not contain.
    pub fn apply_edit(&mut self, edit: &EditRecord) -> Result<(), TreeError> {
        for insertion in &edit.insertions {
            let id = InsertionId {
                lamport: edit.lamport,
                index: insertion.index,
            };
            self.integrate_insertion(id, Origin::User(edit.id), insertion.after, &insertion.text)?;
        }
        for span in &edit.deletions {
            self.integrate_deletion(span, Deleter::User(edit.id))?;
        }
        Ok(())
    }

    /// Split so that `r` ends a fragment; returns the index after it.
    fn split_after(&mut self, r: CharRef) -> Result<usize, TreeError> {
        let i = self
            .fragments
            .iter()
            .position(|f| f.contains(r))
            .ok_or_else(|| {
                TreeError::malformed(format!(
                    "insertion follows unknown character {:?}+{}",
                    r.insertion, r.offset
                ))
            })?;
        let frag = &self.fragments[i];
        let local_end = r.offset - frag.offset + 1;
        if local_end < frag.len {
            self.split(i, local_end);
        }
        Ok(i + 1)
    }

    /// Split fragment `i` after `at` characters (`0 < at < len`).
    fn split(&mut self, i: usize, at: usize) {
        let frag = &mut self.fragments[i];
        let byte = frag
            .text
            .char_indices()
            .nth(at)
            .map_or(frag.text.len(), |(b, _)| b);
        let tail = Fragment {
            insertion: frag.insertion,
            origin: frag.origin,
            offset: frag.offset + at,
            len: frag.len - at,
            text: frag.text.split_off(byte),
            deleters: frag.deleters.clone(),
        };
        frag.len = at;
        self.fragments.insert(i + 1, tail);
    }

    // -----------------------------------------------------------------------
    // Projection
    // -----------------------------------------------------------------------

    /// Every visible character in order.
    pub fn visible_chars<'a>(
        &'a self,
        view: View<'a>,
    ) -> impl Iterator<Item = (CharRef, char)> + 'a {
        self.fragments
            .iter()
            .filter(move |f| f.is_visible(view))
            .flat_map(Fragment::chars)
    }

    /// The visible text.
    #[must_use]
    pub fn text(&self, view: View<'_>) -> String {
        self.fragments
            .iter()
            .filter(|f| f.is_visible(view))
            .map(|f| f.text.as_str())
            .collect()
    }

    /// Number of visible characters.
    #[must_use]
    pub fn len(&self, view: View<'_>) -> usize {
        self.fragments
            .iter()
            .filter(|f| f.is_visible(view))
            .map(|f| f.len)
            .sum()
    }

    /// Whether no character is visible.
    #[must_use]
    pub fn is_empty(&self, view: View<'_>) -> bool {
        self.len(view) == 0
    }

    /// Character offset of `point`, or `None` if it lies outside the text.
    #[must_use]
    pub fn point_to_offset(&self, view: View<'_>, point: Point) -> Option<usize> {
        let mut cursor = Point::ZERO;
        let mut offset = 0;
        for (_, ch) in self.visible_chars(view) {
            if cursor == point {
                return Some(offset);
            }
            if cursor.row == point.row && ch == '\n' {
                // Column past the end of this line.
                return None;
            }
            cursor.advance_char(ch);
            offset += 1;
        }
        (cursor == point).then_some(offset)
    }

    /// Point of character offset `offset` (clamped to the end).
    #[must_use]
    pub fn offset_to_point(&self, view: View<'_>, offset: usize) -> Point {
        let mut cursor = Point::ZERO;
        for (_, ch) in self.visible_chars(view).take(offset) {
            cursor.advance_char(ch);
        }
        cursor
    }

    /// Base-origin characters visible when exactly the epochs in `chain` are
    /// active, ignoring user edits.
    #[must_use]
    pub fn base_view(&self, chain: &BTreeSet<EpochId>) -> Vec<(CharRef, char)> {
        self.fragments
            .iter()
            .filter(|f| match f.origin {
                Origin::Base(epoch) => {
                    chain.contains(&epoch)
                        && !f.deleters.iter().any(|d| match d {
                            Deleter::Base(e) => chain.contains(e),
                            Deleter::User(_) => false,
                        })
                }
                Origin::User(_) => false,
            })
            .flat_map(Fragment::chars)
            .collect()
    }

    /// Translate a local edit over visible character ranges into the
    /// deletions and insertions of an edit operation.
    ///
    /// `ranges` must be sorted, non-overlapping, and within bounds.
    #[must_use]
    pub fn plan_edit(
        &self,
        view: View<'_>,
        ranges: &[Range<usize>],
        text: &str,
    ) -> (Vec<DeleteSpan>, Vec<Insertion>) {
        let chars: Vec<CharRef> = self.visible_chars(view).map(|(r, _)| r).collect();
        let mut deletions = Vec::new();
        let mut insertions = Vec::new();
        for (index, range) in ranges.iter().enumerate() {
            deletions.extend(spans_of(chars[range.clone()].iter().copied()));
            if !text.is_empty() {
                insertions.push(Insertion {
                    index,
                    after: range.start.checked_sub(1).map(|k| chars[k]),
                    text: text.to_owned(),
                });
            }
        }
        (deletions, insertions)
    }

    /// Position of a character among visible characters: the number of
    /// visible characters before it, and whether it is visible itself.
    fn locate(&self, view: View<'_>, r: CharRef) -> Option<(usize, bool)> {
        let mut before = 0;
        for frag in &self.fragments {
            let visible = frag.is_visible(view);
            if frag.contains(r) {
                let inner = if visible { r.offset - frag.offset } else { 0 };
                return Some((before + inner, visible));
            }
            if visible {
                before += frag.len;
            }
        }
        None
    }
}

/// Coalesce consecutive characters of the same insertion into spans.
pub(crate) fn spans_of(chars: impl IntoIterator<Item = CharRef>) -> Vec<DeleteSpan> {
    let mut spans: Vec<DeleteSpan> = Vec::new();
    for r in chars {
        if let Some(last) = spans.last_mut()
            && last.insertion == r.insertion
            && last.end == r.offset
        {
            last.end += 1;
            continue;
        }
        spans.push(DeleteSpan {
            insertion: r.insertion,
            start: r.offset,
            end: r.offset + 1,
        });
    }
    spans
}

// ---------------------------------------------------------------------------
// TextFile
// ---------------------------------------------------------------------------

/// Everything known about one text file's contents.
///
/// User edits are kept for the lifetime of the work tree so the buffer can be
/// rebuilt on open; `buffer` is present only while the file is open.
#[derive(Clone, Debug, Default)]
pub struct TextFile {
    /// User edits in application order.
    pub edits: Vec<EditRecord>,
    /// The materialized buffer, if open.
    pub buffer: Option<TextBuffer>,
}

impl TextFile {
    /// Whether any user edit changed this file.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.edits.iter().any(EditRecord::is_effective)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::all, clippy::pedantic, clippy::nursery)]
mod tests {
    use super::*;
    use crate::model::ReplicaId;

    fn r(n: u64) -> ReplicaId {
        ReplicaId::new(n)
    }

    fn epoch() -> EpochId {
        EpochId(Lamport::new(1, r(0)))
    }

    fn seeded(text: &str) -> (TextBuffer, BTreeSet<EpochId>) {
        let mut buf = TextBuffer::new();
        let id = InsertionId {
            lamport: epoch().0,
            index: 0,
        };
        buf.integrate_insertion(id, Origin::Base(epoch()), None, text)
            .unwrap();
        buf.mark_layer(epoch());
        (buf, BTreeSet::from([epoch()]))
    }

    struct Replica {
        version: Version,
        seq: u64,
        lamport: u64,
        replica: ReplicaId,
    }

    impl Replica {
        fn new(n: u64) -> Self {
            Self {
                version: Version::new(),
                seq: 0,
                lamport: 1,
                replica: r(n),
            }
        }

        fn edit(
            &mut self,
            buf: &mut TextBuffer,
            chain: &BTreeSet<EpochId>,
            ranges: &[Range<usize>],
            text: &str,
        ) -> EditRecord {
            let view = View {
                version: &self.version,
                chain,
            };
            let (deletions, insertions) = buf.plan_edit(view, ranges, text);
            self.seq += 1;
            self.lamport += 1;
            let record = EditRecord {
                id: LocalTimestamp::new(self.replica, self.seq),
                lamport: Lamport::new(self.lamport, self.replica),
                deletions,
                insertions,
            };
            buf.apply_edit(&record).unwrap();
            self.version.observe(record.id);
            record
        }
    }

    #[test]
    fn multi_range_edit() {
        let (mut buf, chain) = seeded("abc");
        let mut a = Replica::new(1);
        a.edit(&mut buf, &chain, &[0..0, 1..2, 3..3], "123");
        let view = View {
            version: &a.version,
            chain: &chain,
        };
        assert_eq!(buf.text(view), "123a123c123");
    }

    #[test]
    fn concurrent_inserts_at_same_point_converge() {
        let (base, chain) = seeded("xy");
        let mut a = Replica::new(1);
        let mut b = Replica::new(2);
        let mut buf_a = base.clone();
        let mut buf_b = base;
        let ea = a.edit(&mut buf_a, &chain, &[1..1], "A");
        let eb = b.edit(&mut buf_b, &chain, &[1..1], "B");
        buf_a.apply_edit(&eb).unwrap();
        buf_b.apply_edit(&ea).unwrap();
        let mut all = Version::new();
        all.observe(ea.id);
        all.observe(eb.id);
        let view = View {
            version: &all,
            chain: &chain,
        };
        assert_eq!(buf_a.text(view), buf_b.text(view));
        // Equal Lamport values: the higher replica id goes first.
        assert_eq!(buf_a.text(view), "xBAy");
    }

    #[test]
    fn earlier_versions_remain_visible() {
        let (mut buf, chain) = seeded("hello");
        let mut a = Replica::new(1);
        let before = a.version.clone();
        a.edit(&mut buf, &chain, &[0..5], "bye");
        let old = View {
            version: &before,
            chain: &chain,
        };
        let new = View {
            version: &a.version,
            chain: &chain,
        };
        assert_eq!(buf.text(old), "hello");
        assert_eq!(buf.text(new), "bye");
    }

    #[test]
    fn points_and_offsets() {
        let (buf, chain) = seeded("ab\ncde\n");
        let version = Version::new();
        let view = View {
            version: &version,
            chain: &chain,
        };
        assert_eq!(buf.point_to_offset(view, Point::new(0, 0)), Some(0));
        assert_eq!(buf.point_to_offset(view, Point::new(0, 2)), Some(2));
        assert_eq!(buf.point_to_offset(view, Point::new(0, 3)), None);
        assert_eq!(buf.point_to_offset(view, Point::new(1, 3)), Some(6));
        assert_eq!(buf.point_to_offset(view, Point::new(2, 0)), Some(7));
        assert_eq!(buf.point_to_offset(view, Point::new(2, 1)), None);
        assert_eq!(buf.offset_to_point(view, 4), Point::new(1, 1));
    }

    #[test]
    fn deletion_of_unknown_text_is_malformed() {
        let (mut buf, _) = seeded("abc");
        let span = DeleteSpan {
            insertion: InsertionId {
                lamport: epoch().0,
                index: 0,
            },
            start: 2,
            end: 5,
        };
        assert!(matches!(
            buf.integrate_deletion(&span, Deleter::User(LocalTimestamp::new(r(1), 1))),
            Err(TreeError::MalformedOperation { .. })
        ));
    }

    #[test]
    fn base_view_ignores_user_edits() {
        let (mut buf, chain) = seeded("abc");
        let mut a = Replica::new(1);
        a.edit(&mut buf, &chain, &[1..2], "XYZ");
        let text: String = buf.base_view(&chain).into_iter().map(|(_, c)| c).collect();
        assert_eq!(text, "abc");
        assert!(buf.base_view(&BTreeSet::new()).is_empty());
    }

    #[test]
    fn spans_coalesce_contiguous_chars() {
        let id = InsertionId {
            lamport: epoch().0,
            index: 0,
        };
        let other = InsertionId {
            lamport: Lamport::new(9, r(1)),
            index: 0,
        };
        let chars = [
            CharRef { insertion: id, offset: 0 },
            CharRef { insertion: id, offset: 1 },
            CharRef { insertion: other, offset: 0 },
            CharRef { insertion: id, offset: 3 },
        ];
        let spans = spans_of(chars);
        assert_eq!(spans.len(), 3);
        assert_eq!((spans[0].start, spans[0].end), (0, 2));
    }

    #[test]
    fn effective_edits() {
        let record = EditRecord {
            id: LocalTimestamp::new(r(1), 1),
            lamport: Lamport::new(1, r(1)),
            deletions: vec![],
            insertions: vec![],
        };
        assert!(!record.is_effective());
        let file = TextFile {
            edits: vec![record],
            buffer: None,
        };
        assert!(!file.is_modified());
    }
}
