//! Rebase engine: moving text onto a new base snapshot.
//!
//! Starting an epoch does not rewrite any user operation. Instead every text
//! file gains a *base layer* for the epoch: the minimal character diff from
//! the text the previous epoch's bases produced to the new base text,
//! expressed as ordinary CRDT insertions and deletions. Because a layer is
//! anchored only in base text, user edits made against any earlier base stay
//! in place and merge with it like a concurrent remote edit.
//!
//! A layer only counts while its epoch is on the active chain (see
//! [`View`](crate::text::View)), so two replicas that reset concurrently
//! converge on whichever epoch is greater.

pub mod diff;

use std::collections::BTreeSet;

use tracing::trace;

use crate::error::TreeError;
use crate::oplog::{EpochId, InsertionId};
use crate::text::{Deleter, Origin, TextBuffer, spans_of};

pub use diff::{Hunk, diff};

/// One epoch's contribution to a text file.
#[derive(Clone, Debug)]
pub struct Layer<'a> {
    /// The epoch.
    pub epoch: EpochId,
    /// Active chain of the epoch it was started from (empty for a root epoch).
    pub prev_chain: BTreeSet<EpochId>,
    /// The file's text in this epoch's base (empty if absent).
    pub text: &'a str,
}

/// Integrate one base layer into `buffer`.
///
/// Layers must be integrated in ascending epoch order; integrating a layer
/// twice is a no-op.
///
/// # Errors
/// Returns [`TreeError::MalformedOperation`] if the buffer is inconsistent
/// with the layers already integrated.
pub fn apply_layer(buffer: &mut TextBuffer, layer: &Layer<'_>) -> Result<(), TreeError> {
    if buffer.has_layer(layer.epoch) {
        return Ok(());
    }
    let old = buffer.base_view(&layer.prev_chain);
    let old_chars: Vec<char> = old.iter().map(|&(_, ch)| ch).collect();
    let new_chars: Vec<char> = layer.text.chars().collect();
    let hunks = diff(&old_chars, &new_chars);
    trace!(epoch = %layer.epoch, hunks = hunks.len(), "integrating base layer");

    for (index, hunk) in hunks.iter().enumerate() {
        let text: String = new_chars[hunk.new.clone()].iter().collect();
        let after = hunk.old.start.checked_sub(1).map(|i| old[i].0);
        buffer.integrate_insertion(
            InsertionId {
                lamport: layer.epoch.0,
                index,
            },
            Origin::Base(layer.epoch),
            after,
            &text,
        )?;
        for span in spans_of(old[hunk.old.clone()].iter().map(|&(r, _)| r)) {
            buffer.integrate_deletion(&span, Deleter::Base(layer.epoch))?;
        }
    }
    buffer.mark_layer(layer.epoch);
    Ok(())
}

/// Integrate several layers in ascending epoch order.
///
/// # Errors
/// Propagates the first [`apply_layer`] failure.
pub fn apply_layers<'a>(
    buffer: &mut TextBuffer,
    layers: impl IntoIterator<Item = Layer<'a>>,
) -> Result<(), TreeError> {
    let mut layers: Vec<_> = layers.into_iter().collect();
    layers.sort_by_key(|l| l.epoch);
    for layer in &layers {
        apply_layer(buffer, layer)?;
    }
    Ok(())
}
