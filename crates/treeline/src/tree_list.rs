//! The engine: a live tree view materialized over a flat source
//! sequence.
//!
//! Structural mutation is single-writer and fully synchronous: every
//! algorithm triggered by one upstream batch runs to completion inside
//! one nested event bracket before `source_changed` returns. The engine
//! performs no internal locking; callers that mutate from multiple
//! threads must hold their own write lock around it.

use four_color_tree::{Color, ColorMask, FourColorTree, NodeId};

use crate::attach::{self, AttachQueue};
use crate::error::TreeError;
use crate::events::{EventBus, SourceChange, SubscriptionId, ViewChange};
use crate::format::{values_equal_at_depth, TreeFormat};
use crate::locate::{InsertionLocator, Resolution};
use crate::node::TreeNode;
use crate::reap;

/// Read-only snapshot of one visible row.
#[derive(Debug)]
pub struct NodeInfo<'a, T> {
    pub value: &'a T,
    pub path: &'a [T],
    pub depth: usize,
    pub is_virtual: bool,
    pub is_expanded: bool,
    pub has_children: bool,
    pub allows_children: bool,
}

/// Transient state of one in-flight batch; constructed fresh per
/// `source_changed` call and discarded at its end.
pub(crate) struct Batch {
    pub(crate) attach: AttachQueue,
    pub(crate) locator: InsertionLocator,
    pub(crate) verify: Vec<NodeId>,
}

impl Batch {
    fn new() -> Batch {
        Batch {
            attach: AttachQueue::new(),
            locator: InsertionLocator::new(),
            verify: Vec::new(),
        }
    }
}

pub struct TreeList<T, F> {
    store: FourColorTree<TreeNode<T>>,
    format: F,
    events: EventBus,
}

impl<T, F> TreeList<T, F>
where
    T: Clone + PartialEq,
    F: TreeFormat<T>,
{
    pub fn new(format: F) -> TreeList<T, F> {
        TreeList {
            store: FourColorTree::new(),
            format,
            events: EventBus::new(),
        }
    }

    // ---- crate-internal access for the batch algorithms ----

    pub(crate) fn store(&self) -> &FourColorTree<TreeNode<T>> {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut FourColorTree<TreeNode<T>> {
        &mut self.store
    }

    pub(crate) fn format(&self) -> &F {
        &self.format
    }

    pub(crate) fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut TreeNode<T> {
        self.store.value_mut(id)
    }

    // ---- node inspection ----

    pub fn node(&self, id: NodeId) -> &TreeNode<T> {
        self.store.value(id)
    }

    pub fn is_virtual(&self, id: NodeId) -> bool {
        !self.store.color(id).is_real()
    }

    pub fn is_visible(&self, id: NodeId) -> bool {
        self.store.color(id).is_visible()
    }

    /// `descendant`'s path strictly extends `ancestor`'s path, value by
    /// value. Purely positional; does not consult the link fields, so it
    /// stays trustworthy mid-repair.
    pub(crate) fn is_descendant_path(&self, descendant: NodeId, ancestor: NodeId) -> bool {
        let d = self.node(descendant).path();
        let a = self.node(ancestor).path();
        d.len() > a.len()
            && a.iter()
                .enumerate()
                .all(|(depth, v)| values_equal_at_depth(&self.format, depth, &d[depth], v))
    }

    /// `shorter`'s whole path is a value-equal prefix of `longer`'s.
    pub(crate) fn is_prefix_of(&self, shorter: NodeId, longer: NodeId) -> bool {
        let s = self.node(shorter).path();
        let l = self.node(longer).path();
        s.len() <= l.len()
            && s.iter()
                .enumerate()
                .all(|(depth, v)| values_equal_at_depth(&self.format, depth, &l[depth], v))
    }

    /// A node's first child, when it has one, is the node directly after
    /// it in global order.
    pub(crate) fn has_node_children(&self, id: NodeId) -> bool {
        match self.store.next(id) {
            Some(next) => self.is_descendant_path(next, id),
            None => false,
        }
    }

    /// First node after `id`'s whole subtree in global order.
    pub(crate) fn subtree_follower(&self, id: NodeId) -> Option<NodeId> {
        let mut cur = self.store.next(id);
        while let Some(n) = cur {
            if !self.is_descendant_path(n, id) {
                return Some(n);
            }
            cur = self.store.next(n);
        }
        None
    }

    pub(crate) fn unlink_siblings(&mut self, id: NodeId) {
        let (before, after) = {
            let n = self.node(id);
            (n.sibling_before, n.sibling_after)
        };
        if let Some(b) = before {
            if self.store.contains(b) {
                self.node_mut(b).sibling_after = after;
            }
        }
        if let Some(a) = after {
            if self.store.contains(a) {
                self.node_mut(a).sibling_before = before;
            }
        }
        let n = self.node_mut(id);
        n.sibling_before = None;
        n.sibling_after = None;
    }

    /// Every ancestor from `id`'s parent up to and including `stop` is
    /// expanded. The chain must reach `stop`; anything else is corrupt
    /// bookkeeping.
    fn ancestors_expanded_up_to(&self, id: NodeId, stop: NodeId) -> bool {
        let mut cur = self.node(id).parent;
        loop {
            match cur {
                Some(p) => {
                    if !self.node(p).is_expanded() {
                        return false;
                    }
                    if p == stop {
                        return true;
                    }
                    cur = self.node(p).parent;
                }
                None => panic!(
                    "tree link bookkeeping is corrupt: ancestor chain broke before the subtree root"
                ),
            }
        }
    }

    /// Recomputes visibility for every node in `root`'s subtree and
    /// emits the induced insert/delete records. Shared by the expansion
    /// toggler and the reaper's merges.
    pub(crate) fn refresh_subtree_visibility(&mut self, root: NodeId) {
        let root_visible = self.store.color(root).is_visible();
        let mut cur = self.store.next(root);
        while let Some(id) = cur {
            if !self.is_descendant_path(id, root) {
                break;
            }
            let should = root_visible && self.ancestors_expanded_up_to(id, root);
            let color = self.store.color(id);
            if should && !color.is_visible() {
                self.store.set_color(id, color.with_visibility(true));
                let index = self.store.index_of(id, ColorMask::VISIBLE);
                self.events.record(ViewChange::insert(index));
            } else if !should && color.is_visible() {
                let index = self.store.index_of(id, ColorMask::VISIBLE);
                self.events.record(ViewChange::delete(index));
                self.store.set_color(id, color.with_visibility(false));
            }
            cur = self.store.next(id);
        }
    }

    // ---- upstream intake ----

    /// Applies one batch of source mutations. Records are processed in
    /// order, each index relative to the source state after the records
    /// before it. All repair happens before this returns, wrapped in one
    /// event bracket toward subscribers.
    ///
    /// On `Err` the batch was aborted mid-application and the view is no
    /// longer consistent with the source; the tree should be disposed.
    pub fn source_changed(&mut self, changes: &[SourceChange<T>]) -> Result<(), TreeError> {
        self.events.begin();
        let mut batch = Batch::new();
        for change in changes {
            let applied = match change {
                SourceChange::Inserted { index, value } => {
                    self.handle_insert(*index, value, &mut batch)
                }
                SourceChange::Updated { index, value } => {
                    self.handle_update(*index, value, &mut batch)
                }
                SourceChange::Deleted { index } => {
                    self.handle_delete(*index, &mut batch);
                    Ok(())
                }
            };
            if let Err(error) = applied {
                self.events.abort();
                return Err(error);
            }
        }
        attach::run(self, &mut batch.attach);
        reap::sweep(self, std::mem::take(&mut batch.verify));
        self.events.commit();
        Ok(())
    }

    fn extract_path(&self, source_index: usize, value: &T) -> Result<Vec<T>, TreeError> {
        let mut path = Vec::new();
        self.format.get_path(value, &mut path);
        if path.is_empty() {
            return Err(TreeError::EmptyPath { source_index });
        }
        Ok(path)
    }

    fn handle_insert(
        &mut self,
        source_index: usize,
        value: &T,
        batch: &mut Batch,
    ) -> Result<(), TreeError> {
        let path = self.extract_path(source_index, value)?;
        self.insert_with_path(source_index, path, batch);
        Ok(())
    }

    fn insert_with_path(&mut self, source_index: usize, path: Vec<T>, batch: &mut Batch) {
        let real_size = self.store.size(ColorMask::REAL);
        assert!(
            source_index <= real_size,
            "source insert index {source_index} out of bounds (source size {real_size})"
        );
        let window_start = if source_index == 0 {
            0
        } else {
            self.store
                .convert_index(source_index - 1, ColorMask::REAL, ColorMask::ALL)
                + 1
        };
        let window_end = if source_index == real_size {
            self.store.len()
        } else {
            self.store
                .convert_index(source_index, ColorMask::REAL, ColorMask::ALL)
        };
        match batch.locator.resolve(self, window_start, window_end, &path) {
            Resolution::Promote(id) => {
                let color = self.store.color(id);
                self.store.set_color(id, color.with_real(true));
                // Carry the live source values; the virtual path was only
                // depth-wise equal.
                self.node_mut(id).path = path;
                if color.is_visible() {
                    let index = self.store.index_of(id, ColorMask::VISIBLE);
                    self.events.record(ViewChange::update(index));
                }
                batch.locator.note_promotion(id);
            }
            Resolution::InsertAt(all_index) => {
                let expanded = self.format.expanded_by_default(&path);
                let node = TreeNode::new_inserted(path, expanded);
                let id = self
                    .store
                    .insert(all_index, ColorMask::ALL, Color::RealHidden, node);
                batch.attach.enqueue(id);
            }
        }
    }

    fn handle_update(
        &mut self,
        source_index: usize,
        value: &T,
        batch: &mut Batch,
    ) -> Result<(), TreeError> {
        let path = self.extract_path(source_index, value)?;
        batch.locator.invalidate();
        let id = self.store.get(source_index, ColorMask::REAL);
        let same_position = {
            let old = self.node(id).path();
            old.len() == path.len()
                && (0..path.len())
                    .all(|d| values_equal_at_depth(&self.format, d, &old[d], &path[d]))
        };
        if same_position {
            self.node_mut(id).path = path;
            if self.store.color(id).is_visible() {
                let index = self.store.index_of(id, ColorMask::VISIBLE);
                self.events.record(ViewChange::update(index));
            }
        } else {
            // The replacement lives somewhere else in the tree: the old
            // node dies (spawning a virtual stand-in if it has children)
            // and the new value goes through regular placement.
            self.handle_delete(source_index, batch);
            self.insert_with_path(source_index, path, batch);
        }
        Ok(())
    }

    fn handle_delete(&mut self, source_index: usize, batch: &mut Batch) {
        batch.locator.invalidate();
        let id = self.store.get(source_index, ColorMask::REAL);
        if self.has_node_children(id) {
            // Convert in place: same handle, same links, only the backing
            // goes away. The reaper rechecks it once the batch settles.
            let color = self.store.color(id);
            self.store.set_color(id, color.with_real(false));
            if color.is_visible() {
                let index = self.store.index_of(id, ColorMask::VISIBLE);
                self.events.record(ViewChange::update(index));
            }
            batch.verify.push(id);
        } else {
            let (parent, after) = {
                let n = self.node(id);
                (n.parent, n.sibling_after)
            };
            self.unlink_siblings(id);
            if self.store.color(id).is_visible() {
                let index = self.store.index_of(id, ColorMask::VISIBLE);
                self.events.record(ViewChange::delete(index));
            }
            self.store.remove(id);
            if let Some(p) = parent {
                batch.verify.push(p);
            }
            if let Some(a) = after {
                batch.verify.push(a);
            }
        }
    }

    // ---- downstream view ----

    /// Number of visible rows.
    pub fn size(&self) -> usize {
        self.store.size(ColorMask::VISIBLE)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Number of real nodes; equals the source length between batches.
    pub fn real_size(&self) -> usize {
        self.store.size(ColorMask::REAL)
    }

    /// Total node count, virtual ancestors included.
    pub fn node_count(&self) -> usize {
        self.store.len()
    }

    fn visible_id(&self, visible_index: usize) -> NodeId {
        self.store.get(visible_index, ColorMask::VISIBLE)
    }

    pub fn get(&self, visible_index: usize) -> &T {
        self.node(self.visible_id(visible_index)).value()
    }

    pub fn node_id(&self, visible_index: usize) -> NodeId {
        self.visible_id(visible_index)
    }

    pub fn tree_node(&self, visible_index: usize) -> NodeInfo<'_, T> {
        let id = self.visible_id(visible_index);
        let is_virtual = self.is_virtual(id);
        let has_children = self.has_node_children(id);
        let node = self.node(id);
        NodeInfo {
            value: node.value(),
            path: node.path(),
            depth: node.depth(),
            is_virtual,
            is_expanded: node.is_expanded(),
            has_children,
            allows_children: is_virtual || self.format.allows_children(node.value()),
        }
    }

    pub fn depth(&self, visible_index: usize) -> usize {
        self.node(self.visible_id(visible_index)).depth()
    }

    pub fn has_children(&self, visible_index: usize) -> bool {
        self.has_node_children(self.visible_id(visible_index))
    }

    /// Virtual nodes always allow children; real nodes defer to the
    /// format.
    pub fn allows_children(&self, visible_index: usize) -> bool {
        let id = self.visible_id(visible_index);
        self.is_virtual(id) || self.format.allows_children(self.node(id).value())
    }

    /// Size of the subtree rooted at the given visible row, the row
    /// itself included. With `include_collapsed` the count covers hidden
    /// descendants as well.
    pub fn subtree_size(&self, visible_index: usize, include_collapsed: bool) -> usize {
        let id = self.visible_id(visible_index);
        let mut count = 1;
        let mut cur = self.store.next(id);
        while let Some(n) = cur {
            if !self.is_descendant_path(n, id) {
                break;
            }
            if include_collapsed || self.store.color(n).is_visible() {
                count += 1;
            }
            cur = self.store.next(n);
        }
        count
    }

    pub fn is_expanded(&self, visible_index: usize) -> bool {
        self.node(self.visible_id(visible_index)).is_expanded()
    }

    pub fn set_expanded(&mut self, visible_index: usize, expanded: bool) {
        let id = self.visible_id(visible_index);
        self.set_expanded_node(id, expanded);
    }

    pub fn toggle_expanded(&mut self, visible_index: usize) {
        let expanded = self.is_expanded(visible_index);
        self.set_expanded(visible_index, !expanded);
    }

    pub(crate) fn set_expanded_node(&mut self, id: NodeId, expanded: bool) {
        if self.node(id).is_expanded() == expanded {
            return;
        }
        self.events.begin();
        self.node_mut(id).expanded = expanded;
        if self.store.color(id).is_visible() {
            let index = self.store.index_of(id, ColorMask::VISIBLE);
            self.events.record(ViewChange::update(index));
        }
        self.refresh_subtree_visibility(id);
        self.events.commit();
    }

    /// Handles of all depth-0 nodes, in order.
    pub fn roots(&self) -> Vec<NodeId> {
        let mut roots = Vec::new();
        let mut cur = self.store.first();
        while let Some(id) = cur {
            roots.push(id);
            cur = self.subtree_follower(id);
        }
        roots
    }

    pub fn visible_nodes(&self) -> Nodes<'_, T> {
        Nodes {
            store: &self.store,
            inner: self.store.iter(ColorMask::VISIBLE),
        }
    }

    /// Every node including hidden ones and virtual ancestors; mostly
    /// for diagnostics and invariant checks.
    pub fn all_nodes(&self) -> Nodes<'_, T> {
        Nodes {
            store: &self.store,
            inner: self.store.iter(ColorMask::ALL),
        }
    }

    pub fn subscribe(&mut self, subscriber: Box<dyn FnMut(&[ViewChange])>) -> SubscriptionId {
        self.events.subscribe(subscriber)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Drops all subscribers and every node. The tree must not be fed
    /// further source batches afterwards.
    pub fn dispose(&mut self) {
        self.events.reset();
        self.store.clear();
    }
}

/// Iterator over `(handle, node)` pairs in global order.
pub struct Nodes<'a, T> {
    store: &'a FourColorTree<TreeNode<T>>,
    inner: four_color_tree::Iter<'a, TreeNode<T>>,
}

impl<'a, T> Iterator for Nodes<'a, T> {
    type Item = (NodeId, &'a TreeNode<T>);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|id| (id, self.store.value(id)))
    }
}
