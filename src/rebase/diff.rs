//! Minimal character diff (Myers' O(ND) algorithm, linear-space variant).
//!
//! The common prefix and suffix are trimmed first; the middle is split where
//! a forward and a backward search meet, and each half is diffed the same
//! way. Memory stays linear in the input however far apart the two are.
//! The result is a list of [`Hunk`]s in ascending order, each replacing
//! `old` with `new`.

use std::ops::Range;

/// One region of difference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hunk {
    /// Replaced range in the old sequence.
    pub old: Range<usize>,
    /// Replacement range in the new sequence.
    pub new: Range<usize>,
}

/// Diff two sequences.
#[must_use]
pub fn diff<T: PartialEq>(old: &[T], new: &[T]) -> Vec<Hunk> {
    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    let a = &old[prefix..old.len() - suffix];
    let b = &new[prefix..new.len() - suffix];

    let mut hunks = Vec::new();
    let mut current: Option<Hunk> = None;
    for step in script(a, b) {
        match step {
            Step::Equal(..) => {
                if let Some(h) = current.take() {
                    hunks.push(h);
                }
            }
            Step::Delete(i, j) => {
                let h = current.get_or_insert(Hunk {
                    old: prefix + i..prefix + i,
                    new: prefix + j..prefix + j,
                });
                h.old.end = prefix + i + 1;
            }
            Step::Insert(i, j) => {
                let h = current.get_or_insert(Hunk {
                    old: prefix + i..prefix + i,
                    new: prefix + j..prefix + j,
                });
                h.new.end = prefix + j + 1;
            }
        }
    }
    hunks.extend(current);
    hunks
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Equal(usize, usize),
    Delete(usize, usize),
    Insert(usize, usize),
}

/// Forward edit script between `a` and `b`, in order.
fn script<T: PartialEq>(a: &[T], b: &[T]) -> Vec<Step> {
    let mut steps = Vec::with_capacity(a.len() + b.len());
    conquer(a, b, 0, 0, &mut steps);
    steps
}

/// Script `a` against `b`, whose first elements sit at `x0` and `y0` in the
/// full sequences.
#[allow(clippy::many_single_char_names)]
fn conquer<T: PartialEq>(a: &[T], b: &[T], x0: usize, y0: usize, steps: &mut Vec<Step>) {
    let prefix = common_prefix(a, b);
    steps.extend((0..prefix).map(|i| Step::Equal(x0 + i, y0 + i)));
    let (a, b) = (&a[prefix..], &b[prefix..]);
    let (x0, y0) = (x0 + prefix, y0 + prefix);
    let suffix = common_suffix(a, b);
    let (a, b) = (&a[..a.len() - suffix], &b[..b.len() - suffix]);

    if a.is_empty() {
        steps.extend((0..b.len()).map(|j| Step::Insert(x0, y0 + j)));
    } else if b.is_empty() {
        steps.extend((0..a.len()).map(|i| Step::Delete(x0 + i, y0)));
    } else if let Some((x, y)) = bisect(a, b) {
        conquer(&a[..x], &b[..y], x0, y0, steps);
        conquer(&a[x..], &b[y..], x0 + x, y0 + y, steps);
    } else {
        steps.extend((0..a.len()).map(|i| Step::Delete(x0 + i, y0)));
        steps.extend((0..b.len()).map(|j| Step::Insert(x0 + a.len(), y0 + j)));
    }

    let (x0, y0) = (x0 + a.len(), y0 + b.len());
    steps.extend((0..suffix).map(|i| Step::Equal(x0 + i, y0 + i)));
}

fn common_prefix<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn common_suffix<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

#[allow(clippy::cast_possible_wrap)]
const fn signed(n: usize) -> isize {
    n as isize
}

fn unsigned(n: isize) -> usize {
    usize::try_from(n).unwrap_or(0)
}

/// Where a shortest edit path crosses the middle of the edit graph,
/// searching from both corners at once so only two frontiers are kept.
///
/// Diagonals whose search has left the grid are retired from both ends of
/// the sweep. Returns `None` if the searches never meet.
#[allow(clippy::many_single_char_names, clippy::similar_names)]
fn bisect<T: PartialEq>(a: &[T], b: &[T]) -> Option<(usize, usize)> {
    let n = signed(a.len());
    let m = signed(b.len());
    let max_d = (n + m + 1) / 2;
    let offset = max_d;
    let len = 2 * max_d + 2;
    // Furthest `x` reached on each diagonal, -1 where not yet reached.
    let mut forward = vec![-1_isize; unsigned(len)];
    let mut backward = forward.clone();
    forward[unsigned(offset + 1)] = 0;
    backward[unsigned(offset + 1)] = 0;
    let delta = n - m;
    // With an odd delta the forward search detects the overlap.
    let front = delta % 2 != 0;
    let (mut k1_start, mut k1_end, mut k2_start, mut k2_end) = (0, 0, 0, 0);

    for d in 0..max_d {
        let mut k1 = -d + k1_start;
        while k1 <= d - k1_end {
            let i = unsigned(offset + k1);
            let mut x1 = if k1 == -d || (k1 != d && forward[i - 1] < forward[i + 1]) {
                forward[i + 1]
            } else {
                forward[i - 1] + 1
            };
            let mut y1 = x1 - k1;
            while x1 < n && y1 < m && a[unsigned(x1)] == b[unsigned(y1)] {
                x1 += 1;
                y1 += 1;
            }
            forward[i] = x1;
            if x1 > n {
                k1_end += 2;
            } else if y1 > m {
                k1_start += 2;
            } else if front {
                let j = offset + delta - k1;
                if (0..len).contains(&j)
                    && backward[unsigned(j)] != -1
                    && x1 >= n - backward[unsigned(j)]
                {
                    return Some((unsigned(x1), unsigned(y1)));
                }
            }
            k1 += 2;
        }

        let mut k2 = -d + k2_start;
        while k2 <= d - k2_end {
            let i = unsigned(offset + k2);
            let mut x2 = if k2 == -d || (k2 != d && backward[i - 1] < backward[i + 1]) {
                backward[i + 1]
            } else {
                backward[i - 1] + 1
            };
            let mut y2 = x2 - k2;
            while x2 < n && y2 < m && a[unsigned(n - x2 - 1)] == b[unsigned(m - y2 - 1)] {
                x2 += 1;
                y2 += 1;
            }
            backward[i] = x2;
            if x2 > n {
                k2_end += 2;
            } else if y2 > m {
                k2_start += 2;
            } else if !front {
                let j = offset + delta - k2;
                if (0..len).contains(&j) && forward[unsigned(j)] != -1 {
                    let x1 = forward[unsigned(j)];
                    let y1 = x1 - (j - offset);
                    if x1 >= n - x2 {
                        return Some((unsigned(x1), unsigned(y1)));
                    }
                }
            }
            k2 += 2;
        }
    }
    None
}
