//! Ancestor attachment: links freshly placed nodes into the tree,
//! synthesizing virtual ancestors where the global order demands them.
//!
//! Nodes enter the store hidden and parentless. For each queued node the
//! pass climbs its immediate predecessor chain looking for the real spot
//! of its parent; whenever no suitable parent exists one is synthesized
//! directly before the node, and the climb restarts one level up. Once
//! the node is linked, its root-to-leaf ancestor chain is replayed to
//! settle visibility and emit the induced view records.

use std::collections::VecDeque;

use four_color_tree::{Color, ColorMask, NodeId};

use crate::events::ViewChange;
use crate::format::{values_equal_at_depth, TreeFormat};
use crate::node::TreeNode;
use crate::tree_list::TreeList;

pub(crate) struct AttachQueue {
    queue: VecDeque<NodeId>,
}

impl AttachQueue {
    pub(crate) fn new() -> AttachQueue {
        AttachQueue {
            queue: VecDeque::new(),
        }
    }

    pub(crate) fn enqueue(&mut self, id: NodeId) {
        self.queue.push_back(id);
    }
}

pub(crate) fn run<T, F>(tree: &mut TreeList<T, F>, queue: &mut AttachQueue)
where
    T: Clone + PartialEq,
    F: TreeFormat<T>,
{
    // Each step either finishes a node or synthesizes one ancestor, so
    // the pass is linear in nodes-plus-depths; the budget only trips on
    // corrupt state.
    let mut budget = 64 + 16 * (queue.queue.len() + tree.store().len());
    while let Some(id) = queue.queue.pop_front() {
        if !tree.store().contains(id) {
            continue;
        }
        // A node fresh from this batch's insertions gets default
        // expansion for its synthesized ancestors; a re-queued survivor
        // of a sibling detach keeps the expansion its depths had.
        let is_new = tree.node(id).newly_inserted;
        attach_one(tree, queue, id, is_new);
        budget = budget.checked_sub(1).unwrap_or_else(|| {
            panic!("ancestor attachment failed to reach a fixed point")
        });
    }
}

fn attach_one<T, F>(tree: &mut TreeList<T, F>, queue: &mut AttachQueue, id: NodeId, is_new: bool)
where
    T: Clone + PartialEq,
    F: TreeFormat<T>,
{
    // Expansion state of the node's stale ancestor chain, captured before
    // any relinking. When a detached subtree is re-attached, synthesized
    // replacement ancestors inherit the expansion their depth had.
    let prior_expansion = capture_expansion_by_depth(tree, id);

    let mut current = id;
    let mut left_candidate: Option<NodeId> = None;
    let mut predecessor = tree.store().prev(id);
    loop {
        let current_len = tree.node(current).path().len();
        match predecessor {
            None if current_len > 1 => {
                current = synthesize_parent(tree, current, is_new, &prior_expansion);
                left_candidate = None;
            }
            None => {
                attach_under(tree, current, None, left_candidate);
                break;
            }
            Some(pred) => {
                let pred_len = tree.node(pred).path().len();
                if pred_len == current_len - 1 && tree.is_prefix_of(pred, current) {
                    attach_under(tree, current, Some(pred), left_candidate);
                    break;
                }
                if pred_len >= current_len {
                    if pred_len == current_len {
                        left_candidate = Some(pred);
                        // A predecessor at our depth whose recorded next
                        // sibling is not us is holding a stale link; the
                        // displaced sibling goes back through the queue to
                        // find its own place.
                        let stale = tree.node(pred).sibling_after;
                        if let Some(s) = stale {
                            if s != current {
                                tree.node_mut(pred).sibling_after = None;
                                if tree.store().contains(s) {
                                    tree.node_mut(s).sibling_before = None;
                                    queue.enqueue(s);
                                }
                            }
                        }
                    }
                    predecessor = tree.node(pred).parent;
                } else {
                    // Predecessor is shallower but not our parent: the
                    // parent does not exist yet.
                    current = synthesize_parent(tree, current, is_new, &prior_expansion);
                    left_candidate = None;
                }
            }
        }
    }

    replay_chain(tree, id);
    tree.node_mut(id).newly_inserted = false;
}

fn capture_expansion_by_depth<T, F>(tree: &TreeList<T, F>, id: NodeId) -> Vec<(usize, bool)>
where
    T: Clone + PartialEq,
    F: TreeFormat<T>,
{
    let mut out = Vec::new();
    let mut cur = tree.node(id).parent;
    while let Some(p) = cur {
        if !tree.store().contains(p) {
            break;
        }
        let node = tree.node(p);
        out.push((node.depth(), node.is_expanded()));
        cur = node.parent;
    }
    out
}

/// Inserts a virtual hidden parent directly before `current` and links
/// `current` under it. Returns the new parent, which becomes the node to
/// place next.
fn synthesize_parent<T, F>(
    tree: &mut TreeList<T, F>,
    current: NodeId,
    is_new: bool,
    prior_expansion: &[(usize, bool)],
) -> NodeId
where
    T: Clone + PartialEq,
    F: TreeFormat<T>,
{
    let parent_path: Vec<T> = {
        let path = tree.node(current).path();
        path[..path.len() - 1].to_vec()
    };
    let depth = parent_path.len() - 1;
    let expanded = if is_new {
        tree.format().expanded_by_default(&parent_path)
    } else {
        prior_expansion
            .iter()
            .find(|(d, _)| *d == depth)
            .map(|(_, e)| *e)
            .unwrap_or_else(|| tree.format().expanded_by_default(&parent_path))
    };
    let index = tree.store().index_of(current, ColorMask::ALL);
    let parent = tree.store_mut().insert(
        index,
        ColorMask::ALL,
        Color::VirtualHidden,
        TreeNode::new(parent_path, expanded),
    );
    let child = tree.node_mut(current);
    child.parent = Some(parent);
    child.sibling_before = None;
    repair_right_sibling(tree, current);
    parent
}

fn attach_under<T, F>(
    tree: &mut TreeList<T, F>,
    current: NodeId,
    parent: Option<NodeId>,
    left_candidate: Option<NodeId>,
) where
    T: Clone + PartialEq,
    F: TreeFormat<T>,
{
    tree.node_mut(current).parent = parent;
    match left_candidate {
        Some(left) => {
            tree.node_mut(left).sibling_after = Some(current);
            tree.node_mut(current).sibling_before = Some(left);
        }
        None => tree.node_mut(current).sibling_before = None,
    }
    repair_right_sibling(tree, current);
}

/// Points `sibling_after` at the node following `current`'s subtree when
/// that node shares `current`'s parent position, and clears it otherwise.
fn repair_right_sibling<T, F>(tree: &mut TreeList<T, F>, current: NodeId)
where
    T: Clone + PartialEq,
    F: TreeFormat<T>,
{
    let follower = tree.subtree_follower(current);
    let linked = match follower {
        Some(f) => {
            let a = tree.node(current).path();
            let b = tree.node(f).path();
            a.len() == b.len()
                && (0..a.len() - 1)
                    .all(|d| values_equal_at_depth(tree.format(), d, &a[d], &b[d]))
        }
        None => false,
    };
    if linked {
        let f = follower.unwrap_or_else(|| unreachable!());
        // Steal the follower from whoever linked to it before.
        if let Some(old_left) = tree.node(f).sibling_before {
            if old_left != current && tree.store().contains(old_left) {
                tree.node_mut(old_left).sibling_after = None;
            }
        }
        tree.node_mut(current).sibling_after = Some(f);
        tree.node_mut(f).sibling_before = Some(current);
    } else {
        tree.node_mut(current).sibling_after = None;
    }
}

/// Walks `id`'s freshly linked ancestor chain root-to-leaf, settling each
/// node's visibility against its ancestors' expansion and recording the
/// induced view changes. A node synthesized or inserted hidden becomes
/// visible here if every ancestor above it is expanded; nodes that were
/// already visible get an update record since their row content (depth,
/// child count) may have changed.
fn replay_chain<T, F>(tree: &mut TreeList<T, F>, id: NodeId)
where
    T: Clone + PartialEq,
    F: TreeFormat<T>,
{
    let mut chain = Vec::new();
    let mut cur = Some(id);
    while let Some(n) = cur {
        chain.push(n);
        cur = tree.node(n).parent;
    }
    chain.reverse();

    let mut visible = true;
    for n in chain {
        let color = tree.store().color(n);
        if visible {
            if color.is_visible() {
                let index = tree.store().index_of(n, ColorMask::VISIBLE);
                tree.events_mut().record(ViewChange::update(index));
            } else {
                tree.store_mut().set_color(n, color.with_visibility(true));
                let index = tree.store().index_of(n, ColorMask::VISIBLE);
                tree.events_mut().record(ViewChange::insert(index));
            }
        } else if color.is_visible() {
            let index = tree.store().index_of(n, ColorMask::VISIBLE);
            tree.events_mut().record(ViewChange::delete(index));
            tree.store_mut().set_color(n, color.with_visibility(false));
        }
        visible = visible && tree.node(n).is_expanded();
    }
}
