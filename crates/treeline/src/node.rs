//! Tree node payload stored in the four-color arena.

use four_color_tree::NodeId;

/// One unit of tree structure: a cached path plus non-owning links to the
/// parent and the neighboring same-parent siblings. Whether the node is
/// virtual and whether it is visible live in the store color, never here.
#[derive(Debug, Clone)]
pub struct TreeNode<T> {
    pub(crate) path: Vec<T>,
    pub(crate) expanded: bool,
    pub(crate) parent: Option<NodeId>,
    pub(crate) sibling_before: Option<NodeId>,
    pub(crate) sibling_after: Option<NodeId>,
    /// Set on nodes inserted by the in-flight batch; the attachment pass
    /// reads it to pick the expansion policy for synthesized ancestors
    /// and clears it once the node is linked.
    pub(crate) newly_inserted: bool,
}

impl<T> TreeNode<T> {
    pub(crate) fn new(path: Vec<T>, expanded: bool) -> TreeNode<T> {
        debug_assert!(!path.is_empty());
        TreeNode {
            path,
            expanded,
            parent: None,
            sibling_before: None,
            sibling_after: None,
            newly_inserted: false,
        }
    }

    pub(crate) fn new_inserted(path: Vec<T>, expanded: bool) -> TreeNode<T> {
        let mut node = TreeNode::new(path, expanded);
        node.newly_inserted = true;
        node
    }

    /// Ancestor values from the conceptual root down to this node's own
    /// value, inclusive.
    pub fn path(&self) -> &[T] {
        &self.path
    }

    /// The node's own value: the last path element.
    pub fn value(&self) -> &T {
        &self.path[self.path.len() - 1]
    }

    /// Root nodes are at depth 0.
    pub fn depth(&self) -> usize {
        self.path.len() - 1
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn sibling_before(&self) -> Option<NodeId> {
        self.sibling_before
    }

    pub fn sibling_after(&self) -> Option<NodeId> {
        self.sibling_after
    }
}
