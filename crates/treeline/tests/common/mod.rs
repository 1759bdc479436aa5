#![allow(dead_code)]

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use treeline::{compare_paths, SourceChange, TreeFormat, TreeList, ViewChange};

/// Paths from slash-separated strings: `"a/b/C"` becomes the prefix
/// chain `["a", "a/b", "a/b/C"]`. A segment starting with an uppercase
/// letter is a leaf. Fully ordered at every depth.
pub struct SlashPathFormat;

fn push_prefixes(value: &str, out: &mut Vec<String>) {
    let mut prefix = String::new();
    for segment in value.split('/') {
        if segment.is_empty() {
            continue;
        }
        if !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(segment);
        out.push(prefix.clone());
    }
}

fn last_segment_allows_children(value: &str) -> bool {
    value
        .rsplit('/')
        .next()
        .and_then(|segment| segment.chars().next())
        .map(|c| !c.is_uppercase())
        .unwrap_or(true)
}

impl TreeFormat<String> for SlashPathFormat {
    fn get_path(&self, value: &String, out: &mut Vec<String>) {
        push_prefixes(value, out);
    }

    fn allows_children(&self, value: &String) -> bool {
        last_segment_allows_children(value)
    }

    fn compare_at_depth(&self, _depth: usize, a: &String, b: &String) -> Option<Ordering> {
        Some(a.cmp(b))
    }
}

/// Same path shape as [`SlashPathFormat`] but with no comparator at any
/// depth: the source keeps arrival order and equality falls back to
/// `PartialEq`.
pub struct ArrivalPathFormat;

impl TreeFormat<String> for ArrivalPathFormat {
    fn get_path(&self, value: &String, out: &mut Vec<String>) {
        push_prefixes(value, out);
    }

    fn allows_children(&self, value: &String) -> bool {
        last_segment_allows_children(value)
    }

    fn compare_at_depth(&self, _depth: usize, _a: &String, _b: &String) -> Option<Ordering> {
        None
    }
}

/// [`SlashPathFormat`] with depth-0 nodes starting collapsed.
pub struct CollapsedRootsFormat;

impl TreeFormat<String> for CollapsedRootsFormat {
    fn get_path(&self, value: &String, out: &mut Vec<String>) {
        push_prefixes(value, out);
    }

    fn allows_children(&self, value: &String) -> bool {
        last_segment_allows_children(value)
    }

    fn compare_at_depth(&self, _depth: usize, a: &String, b: &String) -> Option<Ordering> {
        Some(a.cmp(b))
    }

    fn expanded_by_default(&self, path: &[String]) -> bool {
        path.len() > 1
    }
}

/// Subscriber that applies every delivered record to a row count,
/// checking each index is in bounds at its point in the batch.
#[derive(Clone, Default)]
pub struct MirrorLen(Rc<RefCell<usize>>);

impl MirrorLen {
    pub fn attach<T, F>(tree: &mut TreeList<T, F>) -> MirrorLen
    where
        T: Clone + PartialEq + 'static,
        F: TreeFormat<T> + 'static,
    {
        let mirror = MirrorLen::default();
        let len = Rc::clone(&mirror.0);
        tree.subscribe(Box::new(move |batch: &[ViewChange]| {
            let mut n = *len.borrow();
            for change in batch {
                match change.kind {
                    treeline::ChangeKind::Insert => {
                        assert!(change.index <= n, "insert index {} beyond {}", change.index, n);
                        n += 1;
                    }
                    treeline::ChangeKind::Update => {
                        assert!(change.index < n, "update index {} beyond {}", change.index, n);
                    }
                    treeline::ChangeKind::Delete => {
                        assert!(change.index < n, "delete index {} beyond {}", change.index, n);
                        n -= 1;
                    }
                }
            }
            *len.borrow_mut() = n;
        }));
        mirror
    }

    pub fn len(&self) -> usize {
        *self.0.borrow()
    }
}

/// Subscriber that replays every delivered record against a mirror of
/// the visible row values. Inserted and updated rows become placeholders;
/// [`RowMirror::verify`] then checks that every row *not* named by a
/// record still shows the same value at the same visible index, so a
/// record carrying a wrong-but-in-bounds index shifts an untouched row
/// and fails the comparison.
#[derive(Clone, Default)]
pub struct RowMirror(Rc<RefCell<Vec<Option<String>>>>);

impl RowMirror {
    pub fn attach<F>(tree: &mut TreeList<String, F>) -> RowMirror
    where
        F: TreeFormat<String> + 'static,
    {
        let mirror = RowMirror::default();
        let rows = Rc::clone(&mirror.0);
        tree.subscribe(Box::new(move |batch: &[ViewChange]| {
            let mut rows = rows.borrow_mut();
            for change in batch {
                match change.kind {
                    treeline::ChangeKind::Insert => {
                        assert!(change.index <= rows.len());
                        rows.insert(change.index, None);
                    }
                    treeline::ChangeKind::Update => {
                        assert!(change.index < rows.len());
                        rows[change.index] = None;
                    }
                    treeline::ChangeKind::Delete => {
                        assert!(change.index < rows.len());
                        rows.remove(change.index);
                    }
                }
            }
        }));
        mirror
    }

    /// Checks the mirror against the tree's visible sequence and fills
    /// the placeholders back in for the next round.
    pub fn verify<F>(&self, tree: &TreeList<String, F>)
    where
        F: TreeFormat<String>,
    {
        let mut rows = self.0.borrow_mut();
        assert_eq!(rows.len(), tree.size(), "mirror row count");
        for (i, row) in rows.iter_mut().enumerate() {
            match row {
                Some(value) => assert_eq!(
                    value,
                    tree.get(i),
                    "row {i} moved without a record naming it"
                ),
                None => *row = Some(tree.get(i).clone()),
            }
        }
    }
}

/// Collects delivered batches verbatim.
#[derive(Clone, Default)]
pub struct Recorder(Rc<RefCell<Vec<Vec<ViewChange>>>>);

impl Recorder {
    pub fn attach<T, F>(tree: &mut TreeList<T, F>) -> Recorder
    where
        T: Clone + PartialEq + 'static,
        F: TreeFormat<T> + 'static,
    {
        let recorder = Recorder::default();
        let sink = Rc::clone(&recorder.0);
        tree.subscribe(Box::new(move |batch: &[ViewChange]| {
            sink.borrow_mut().push(batch.to_vec())
        }));
        recorder
    }

    pub fn batches(&self) -> Vec<Vec<ViewChange>> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

/// A sorted source sequence driving a tree, the way a sorted observable
/// list would feed the view in an application.
pub struct SortedSource {
    values: Vec<String>,
    pub tree: TreeList<String, SlashPathFormat>,
}

impl SortedSource {
    pub fn new() -> SortedSource {
        SortedSource {
            values: Vec::new(),
            tree: TreeList::new(SlashPathFormat),
        }
    }

    fn sorted_position(&self, value: &str, skip: Option<usize>) -> usize {
        let format = SlashPathFormat;
        let mut new_path = Vec::new();
        push_prefixes(value, &mut new_path);
        let new_leaf = last_segment_allows_children(value);
        let mut position = 0;
        for (i, existing) in self.values.iter().enumerate() {
            if skip == Some(i) {
                continue;
            }
            let mut old_path = Vec::new();
            push_prefixes(existing, &mut old_path);
            let old_leaf = last_segment_allows_children(existing);
            // Lower bound: equal-comparing values are inserted before
            // their peers, which keeps a new parent ahead of the subtree
            // it will adopt.
            if compare_paths(&format, &old_path, !old_leaf, &new_path, !new_leaf)
                == Ordering::Less
            {
                position += 1;
            }
        }
        position
    }

    pub fn insert(&mut self, value: &str) -> usize {
        let index = self.sorted_position(value, None);
        self.values.insert(index, value.to_string());
        self.tree
            .source_changed(&[SourceChange::Inserted {
                index,
                value: value.to_string(),
            }])
            .unwrap();
        index
    }

    pub fn remove(&mut self, index: usize) {
        self.values.remove(index);
        self.tree
            .source_changed(&[SourceChange::Deleted { index }])
            .unwrap();
    }

    pub fn remove_value(&mut self, value: &str) {
        let index = self
            .values
            .iter()
            .position(|v| v == value)
            .unwrap_or_else(|| panic!("{value:?} not in source"));
        self.remove(index);
    }

    /// Replaces the value at `index`. When the new value keeps its sorted
    /// position this is a single update record; otherwise it becomes a
    /// delete plus a re-insert, in one batch, like a sorted list would
    /// report it.
    pub fn set(&mut self, index: usize, value: &str) {
        let new_index = self.sorted_position(value, Some(index));
        if new_index == index {
            self.values[index] = value.to_string();
            self.tree
                .source_changed(&[SourceChange::Updated {
                    index,
                    value: value.to_string(),
                }])
                .unwrap();
        } else {
            self.values.remove(index);
            self.values.insert(new_index, value.to_string());
            self.tree
                .source_changed(&[
                    SourceChange::Deleted { index },
                    SourceChange::Inserted {
                        index: new_index,
                        value: value.to_string(),
                    },
                ])
                .unwrap();
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn check(&self) {
        check_invariants(&self.tree, self.values.len());
    }
}

/// Structural invariants that must hold between batches. Uses plain
/// `PartialEq` on path elements, which matches both test formats.
pub fn check_invariants<F>(tree: &TreeList<String, F>, source_len: usize)
where
    F: TreeFormat<String>,
{
    assert_eq!(tree.real_size(), source_len, "real node count vs source");

    let nodes: Vec<_> = tree.all_nodes().collect();
    let mut prev_path: Option<&[String]> = None;
    let mut visible_count = 0;
    for (id, node) in &nodes {
        let path = node.path();
        assert!(!path.is_empty());

        // A node is at most one level deeper than its global predecessor,
        // and the first node is a root.
        match prev_path {
            None => assert_eq!(path.len(), 1, "first node must be a root"),
            Some(prev) => assert!(
                path.len() <= prev.len() + 1,
                "depth jump from {prev:?} to {path:?}"
            ),
        }
        prev_path = Some(path);

        // Parent link agrees with the path.
        match node.parent() {
            Some(p) => {
                let parent_path = tree.node(p).path();
                assert_eq!(parent_path.len() + 1, path.len());
                assert_eq!(parent_path, &path[..path.len() - 1]);
            }
            None => assert_eq!(path.len(), 1, "non-root without a parent: {path:?}"),
        }

        // Sibling links are mutual and stay within one parent.
        if let Some(after) = node.sibling_after() {
            let sibling = tree.node(after);
            assert_eq!(sibling.sibling_before(), Some(*id));
            assert_eq!(sibling.path().len(), path.len());
            assert_eq!(sibling.parent(), node.parent());
        }
        if let Some(before) = node.sibling_before() {
            assert_eq!(tree.node(before).sibling_after(), Some(*id));
        }

        // Visible exactly when every strict ancestor is expanded.
        let mut ancestors_expanded = true;
        let mut cur = node.parent();
        while let Some(p) = cur {
            let ancestor = tree.node(p);
            ancestors_expanded &= ancestor.is_expanded();
            cur = ancestor.parent();
        }
        assert_eq!(
            tree.is_visible(*id),
            ancestors_expanded,
            "visibility of {path:?}"
        );
        if ancestors_expanded {
            visible_count += 1;
        }

        // Virtual nodes only exist on behalf of descendants.
        if tree.is_virtual(*id) {
            let has_child = nodes.iter().any(|(_, other)| {
                other.path().len() == path.len() + 1 && &other.path()[..path.len()] == path
            });
            assert!(has_child, "childless virtual node {path:?}");
        }
    }
    assert_eq!(tree.size(), visible_count);
}
