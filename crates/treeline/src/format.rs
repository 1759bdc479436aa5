//! The path-extraction contract supplied by the caller.

use std::cmp::Ordering;

/// Describes how flat source values map onto tree positions.
///
/// The engine invokes `get_path` once per value and caches the result on
/// the node; extraction must be deterministic, the path non-empty, and
/// its last element the value itself. None of this is verified beyond the
/// non-empty check — a format that violates it corrupts the view.
pub trait TreeFormat<T> {
    /// Appends the value's full path, from the conceptual root down to
    /// and including the value itself, onto `out`.
    fn get_path(&self, value: &T, out: &mut Vec<T>);

    /// Whether this value may have children. Values that cannot sort as
    /// if their path were one element shorter, so parentless leaves
    /// interleave correctly with sibling subtrees.
    fn allows_children(&self, value: &T) -> bool {
        let _ = value;
        true
    }

    /// Orders two values occupying the same path depth. `None` means no
    /// comparator is supplied at this depth and ordering is not enforced
    /// there; equality then falls back to `PartialEq`.
    fn compare_at_depth(&self, depth: usize, a: &T, b: &T) -> Option<Ordering>;

    /// Expansion state given to a brand-new node for this path. Consulted
    /// for newly inserted source values and for virtual ancestors
    /// synthesized on their behalf.
    fn expanded_by_default(&self, path: &[T]) -> bool {
        let _ = path;
        true
    }
}

/// Depth-scoped equality: the comparator where one is supplied, value
/// equality where not.
pub(crate) fn values_equal_at_depth<T, F>(format: &F, depth: usize, a: &T, b: &T) -> bool
where
    T: PartialEq,
    F: TreeFormat<T> + ?Sized,
{
    match format.compare_at_depth(depth, a, b) {
        Some(ordering) => ordering == Ordering::Equal,
        None => a == b,
    }
}

/// Full path order as the engine expects its input stream to be sorted:
/// depth by depth, with a value that cannot have children ranked as if
/// its path were one element shorter, and same-depth leaves ordered among
/// themselves at their final depth.
///
/// Note the deliberate oddity inherited from the contract: a depth with
/// no comparator short-circuits the *entire* comparison as `Equal`
/// instead of merely skipping that depth.
pub fn compare_paths<T, F>(
    format: &F,
    a: &[T],
    a_allows_children: bool,
    b: &[T],
    b_allows_children: bool,
) -> Ordering
where
    F: TreeFormat<T> + ?Sized,
{
    let a_len = a.len() - usize::from(!a_allows_children);
    let b_len = b.len() - usize::from(!b_allows_children);
    for depth in 0..a_len.min(b_len) {
        match format.compare_at_depth(depth, &a[depth], &b[depth]) {
            None => return Ordering::Equal,
            Some(Ordering::Equal) => {}
            Some(ordering) => return ordering,
        }
    }
    match a_len.cmp(&b_len) {
        Ordering::Equal => {
            if a_len < a.len() && b_len < b.len() {
                format
                    .compare_at_depth(a_len, &a[a.len() - 1], &b[b.len() - 1])
                    .unwrap_or(Ordering::Equal)
            } else {
                Ordering::Equal
            }
        }
        ordering => ordering,
    }
}
