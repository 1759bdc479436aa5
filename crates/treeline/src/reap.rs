//! The reaper: removes virtual nodes that stopped earning their keep and
//! merges duplicate subtrees left behind by mid-batch repair.
//!
//! Runs once per source batch, after attachment. Candidates come from the
//! batch's verify list: nodes converted to virtual by a delete, plus the
//! former parents and right siblings of removed nodes.

use std::collections::VecDeque;

use four_color_tree::{ColorMask, NodeId};

use crate::events::ViewChange;
use crate::format::TreeFormat;
use crate::tree_list::TreeList;

pub(crate) fn sweep<T, F>(tree: &mut TreeList<T, F>, verify: Vec<NodeId>)
where
    T: Clone + PartialEq,
    F: TreeFormat<T>,
{
    // Phase one: childless virtual nodes die, and their death can orphan
    // the parent in turn, so each candidate walks up as far as it reaps.
    for &id in &verify {
        reap_leaves_upward(tree, id);
    }

    // Phase two: a surviving virtual node whose predecessor run contains
    // an equal-path twin is merged into that twin. Merging relocates
    // children, which can expose further merges, so this is a worklist.
    let mut worklist: VecDeque<NodeId> = verify.into_iter().collect();
    while let Some(id) = worklist.pop_front() {
        if !tree.store().contains(id) || tree.store().color(id).is_real() {
            continue;
        }
        if let Some(target) = merge_target(tree, id) {
            merge_into(tree, id, target, &mut worklist);
        }
    }
}

fn reap_leaves_upward<T, F>(tree: &mut TreeList<T, F>, start: NodeId)
where
    T: Clone + PartialEq,
    F: TreeFormat<T>,
{
    let mut cur = Some(start);
    while let Some(id) = cur {
        if !tree.store().contains(id)
            || tree.store().color(id).is_real()
            || tree.has_node_children(id)
        {
            break;
        }
        let parent = tree.node(id).parent;
        tree.unlink_siblings(id);
        if tree.store().color(id).is_visible() {
            let index = tree.store().index_of(id, ColorMask::VISIBLE);
            tree.events_mut().record(ViewChange::delete(index));
        }
        tree.store_mut().remove(id);
        cur = parent;
    }
}

/// When `id`'s immediate predecessor sits inside a subtree rooted at an
/// equal-path twin of `id`, returns that twin.
fn merge_target<T, F>(tree: &TreeList<T, F>, id: NodeId) -> Option<NodeId>
where
    T: Clone + PartialEq,
    F: TreeFormat<T>,
{
    let pred = tree.store().prev(id)?;
    if !tree.is_prefix_of(id, pred) {
        return None;
    }
    let levels = tree.node(pred).path().len() - tree.node(id).path().len();
    let mut target = pred;
    for _ in 0..levels {
        target = tree
            .node(target)
            .parent
            .unwrap_or_else(|| panic!("tree link bookkeeping is corrupt: merge climb fell off"));
    }
    assert!(
        tree.node(target).path().len() == tree.node(id).path().len()
            && tree.is_prefix_of(target, id),
        "merge climb landed on a node with a different path"
    );
    Some(target)
}

/// Dissolves `id`, handing its direct children over to `target`. The
/// merged node is expanded if either side was; the children then get
/// their visibility recomputed under the combined ancestry.
fn merge_into<T, F>(
    tree: &mut TreeList<T, F>,
    id: NodeId,
    target: NodeId,
    worklist: &mut VecDeque<NodeId>,
) where
    T: Clone + PartialEq,
    F: TreeFormat<T>,
{
    let id_depth = tree.node(id).path().len();
    let mut children = Vec::new();
    let mut cur = tree.store().next(id);
    while let Some(n) = cur {
        if !tree.is_descendant_path(n, id) {
            break;
        }
        if tree.node(n).path().len() == id_depth + 1 {
            children.push(n);
        }
        cur = tree.store().next(n);
    }

    // Target's last direct child, for splicing the sibling chains. The
    // walk stops when it reaches `id` itself (equal depth, not a
    // descendant), so only the pre-existing children are seen.
    let mut last_old_child: Option<NodeId> = None;
    cur = tree.store().next(target);
    while let Some(n) = cur {
        if !tree.is_descendant_path(n, target) {
            break;
        }
        if tree.node(n).path().len() == id_depth + 1 {
            last_old_child = Some(n);
        }
        cur = tree.store().next(n);
    }

    if tree.store().color(id).is_visible() {
        let index = tree.store().index_of(id, ColorMask::VISIBLE);
        tree.events_mut().record(ViewChange::delete(index));
    }
    tree.unlink_siblings(id);
    let id_expanded = tree.node(id).is_expanded();
    tree.store_mut().remove(id);

    for &child in &children {
        tree.node_mut(child).parent = Some(target);
    }
    if let (Some(last), Some(&first)) = (last_old_child, children.first()) {
        tree.node_mut(last).sibling_after = Some(first);
        tree.node_mut(first).sibling_before = Some(last);
    }

    if id_expanded && !tree.node(target).is_expanded() {
        tree.node_mut(target).expanded = true;
    }
    if tree.store().color(target).is_visible() {
        let index = tree.store().index_of(target, ColorMask::VISIBLE);
        tree.events_mut().record(ViewChange::update(index));
    }
    tree.refresh_subtree_visibility(target);

    worklist.push_back(target);
    if let Some(&first) = children.first() {
        worklist.push_back(first);
    }
}
