//! Cycle detection for concurrent moves.
//!
//! Two replicas can each move a directory into the other. Both moves are
//! valid where they were made, but together they detach a loop from the
//! root. The projection resolves this by ignoring, one at a time, the move
//! with the greatest Lamport reading among those forming the loop, until no
//! loop remains. Every replica applies the same rule to the same set of
//! operations, so every replica ignores the same moves.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{FileId, Lamport};
use crate::tree::{Node, Placement};

/// Find one cycle among located nodes, returned as the files along it.
#[must_use]
pub fn find_cycle(nodes: &BTreeMap<FileId, Node>) -> Option<Vec<FileId>> {
    // Files already known to reach the root (or a dangling parent).
    let mut settled: BTreeSet<FileId> = BTreeSet::new();
    for &start in nodes.keys() {
        let mut path: Vec<FileId> = Vec::new();
        let mut on_path: BTreeSet<FileId> = BTreeSet::new();
        let mut current = start;
        loop {
            if current == FileId::Root || settled.contains(&current) {
                break;
            }
            if !on_path.insert(current) {
                let at = path.iter().position(|&f| f == current).unwrap_or(0);
                return Some(path.split_off(at));
            }
            path.push(current);
            match nodes.get(&current) {
                Some(node) => current = node.parent,
                None => break,
            }
        }
        settled.extend(path);
    }
    None
}

/// The file in `cycle` whose effective placement is the latest move.
///
/// `skips` counts how many of each file's latest placements are already
/// ignored. Files sitting at their base location have no move to ignore.
#[must_use]
pub fn latest_move(
    cycle: &[FileId],
    placements: &BTreeMap<FileId, BTreeMap<Lamport, Placement>>,
    skips: &BTreeMap<FileId, usize>,
) -> Option<FileId> {
    cycle
        .iter()
        .filter_map(|&file| {
            let skip = skips.get(&file).copied().unwrap_or(0);
            let (&lamport, _) = placements.get(&file)?.iter().rev().nth(skip)?;
            Some((lamport, file))
        })
        .max()
        .map(|(_, file)| file)
}
