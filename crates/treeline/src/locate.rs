//! Placement of newly inserted source values among existing virtual
//! nodes.
//!
//! The candidate window for an insertion at source position `i` is the
//! run of nodes strictly between the previous real node and the next
//! real node; only virtual nodes inside it can host or neighbor the new
//! value. The locator lives for one batch and keeps the candidate list
//! of the most recent window, keyed by the window's right real bound, so
//! a run of insertions into the same window scans it once.

use std::collections::VecDeque;

use four_color_tree::{ColorMask, NodeId};

use crate::format::{values_equal_at_depth, TreeFormat};
use crate::tree_list::TreeList;

pub(crate) enum Resolution {
    /// An existing virtual node carries exactly this path: promote it in
    /// place, reusing its store handle and links.
    Promote(NodeId),
    /// Insert a new hidden real node at this global position.
    InsertAt(usize),
}

pub(crate) struct InsertionLocator {
    valid: bool,
    /// Real node bounding the cached window on the right; `None` for the
    /// end of the sequence.
    end_bound: Option<NodeId>,
    /// Virtual nodes of the cached window, in global order. A deque so
    /// that pruning from the front stays O(1) per pruned candidate over
    /// a run of same-window insertions.
    candidates: VecDeque<NodeId>,
}

impl InsertionLocator {
    pub(crate) fn new() -> InsertionLocator {
        InsertionLocator {
            valid: false,
            end_bound: None,
            candidates: VecDeque::new(),
        }
    }

    /// Drops the cache. Any record that can introduce or move virtual
    /// nodes mid-batch (updates, deletions) must call this.
    pub(crate) fn invalidate(&mut self) {
        self.valid = false;
        self.end_bound = None;
        self.candidates.clear();
    }

    /// Forgets a candidate that was promoted to real.
    pub(crate) fn note_promotion(&mut self, id: NodeId) {
        self.candidates.retain(|c| *c != id);
    }

    pub(crate) fn resolve<T, F>(
        &mut self,
        tree: &TreeList<T, F>,
        window_start: usize,
        window_end: usize,
        path: &[T],
    ) -> Resolution
    where
        T: Clone + PartialEq,
        F: TreeFormat<T>,
    {
        let store = tree.store();
        let end_bound = if window_end == store.len() {
            None
        } else {
            Some(store.get(window_end, ColorMask::ALL))
        };
        if self.valid && self.end_bound == end_bound {
            // Same window as the previous insertion; earlier insertions
            // can only have shrunk it from the left.
            while let Some(&front) = self.candidates.front() {
                if store.index_of(front, ColorMask::ALL) < window_start {
                    self.candidates.pop_front();
                } else {
                    break;
                }
            }
        } else {
            self.candidates.clear();
            for index in window_start..window_end {
                let id = store.get(index, ColorMask::ALL);
                if !store.color(id).is_real() {
                    self.candidates.push_back(id);
                }
            }
            self.end_bound = end_bound;
            self.valid = true;
        }

        let mut best_ancestor: Option<NodeId> = None;
        let mut best_len = 0usize;
        for &id in &self.candidates {
            let candidate = tree.node(id).path();
            if candidate.len() > path.len() {
                continue;
            }
            let shared = candidate
                .iter()
                .enumerate()
                .all(|(d, v)| values_equal_at_depth(tree.format(), d, v, &path[d]));
            if !shared {
                continue;
            }
            if candidate.len() == path.len() {
                return Resolution::Promote(id);
            }
            if candidate.len() > best_len {
                best_len = candidate.len();
                best_ancestor = Some(id);
            }
        }
        match best_ancestor {
            Some(ancestor) => {
                Resolution::InsertAt(store.index_of(ancestor, ColorMask::ALL) + 1)
            }
            None => Resolution::InsertAt(window_start),
        }
    }
}
