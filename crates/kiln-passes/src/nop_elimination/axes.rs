//! Set operations over axis lists.
//!
//! Axis lists are treated as sets: order and repetition do not matter.

use std::collections::BTreeSet;

/// Axes present in `to` but not in `from`, sorted ascending.
///
/// Returns `None` unless every axis of `from` also appears in `to`. When
/// `rank_reducing` is false, each remaining axis at or beyond `|from|` is
/// shifted down by `|from|` to account for axes consumed by the inner op.
pub fn axes_remaining(from: &[i64], to: &[i64], rank_reducing: bool) -> Option<Vec<i64>> {
    let from: BTreeSet<i64> = from.iter().copied().collect();
    let to: BTreeSet<i64> = to.iter().copied().collect();
    if !from.is_subset(&to) {
        return None;
    }

    let shift = from.len() as i64;
    Some(
        to.difference(&from)
            .map(|&axis| {
                if !rank_reducing && axis >= shift {
                    axis - shift
                } else {
                    axis
                }
            })
            .collect(),
    )
}

/// True iff both lists name the same set of axes.
pub fn axes_equal(a: &[i64], b: &[i64]) -> bool {
    let a: BTreeSet<i64> = a.iter().copied().collect();
    let b: BTreeSet<i64> = b.iter().copied().collect();
    a == b
}
