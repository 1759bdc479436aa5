//! The augmented AVL tree behind all color-scoped indexing.
//!
//! Every structural operation is O(log n) in the total element count.
//! That bound is load-bearing for callers that touch the tree once per
//! changed element per batch.

use crate::color::{Color, ColorMask};

/// Generational handle to an arena slot. Carries the slot's generation at
/// issue time; once the slot is freed the generation advances and the old
/// handle stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

/// Per-color subtree cardinalities, self included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Counts([u32; 4]);

impl Counts {
    fn unit(color: Color) -> Counts {
        let mut c = Counts::default();
        c.0[color.bit()] = 1;
        c
    }

    fn add(&mut self, other: &Counts) {
        for i in 0..4 {
            self.0[i] += other.0[i];
        }
    }

    fn masked(&self, mask: ColorMask) -> usize {
        let mut total = 0usize;
        for i in 0..4 {
            if mask.contains_bit(i) {
                total += self.0[i] as usize;
            }
        }
        total
    }
}

struct Slot<V> {
    /// `None` while the slot sits on the free list.
    value: Option<V>,
    color: Color,
    parent: Option<u32>,
    left: Option<u32>,
    right: Option<u32>,
    height: u8,
    counts: Counts,
    generation: u32,
}

fn expect_node(link: Option<u32>) -> u32 {
    match link {
        Some(i) => i,
        None => panic!("four-color tree link bookkeeping is corrupt"),
    }
}

/// Arena-backed order-statistics tree; see the crate docs for the model.
pub struct FourColorTree<V> {
    slots: Vec<Slot<V>>,
    free: Vec<u32>,
    root: Option<u32>,
}

impl<V> Default for FourColorTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> FourColorTree<V> {
    pub fn new() -> Self {
        FourColorTree {
            slots: Vec::new(),
            free: Vec::new(),
            root: None,
        }
    }

    fn slot(&self, i: u32) -> &Slot<V> {
        &self.slots[i as usize]
    }

    fn slot_mut(&mut self, i: u32) -> &mut Slot<V> {
        &mut self.slots[i as usize]
    }

    /// Resolves a handle, panicking on stale or foreign handles. A failed
    /// resolution is a caller logic defect, not a recoverable condition.
    fn resolve(&self, id: NodeId) -> u32 {
        let slot = match self.slots.get(id.index as usize) {
            Some(slot) => slot,
            None => panic!("node handle outside arena bounds"),
        };
        if slot.generation != id.generation || slot.value.is_none() {
            panic!("stale node handle: the slot was freed");
        }
        id.index
    }

    fn id_of(&self, i: u32) -> NodeId {
        NodeId {
            index: i,
            generation: self.slot(i).generation,
        }
    }

    fn height_of(&self, link: Option<u32>) -> u8 {
        link.map_or(0, |i| self.slot(i).height)
    }

    fn counts_of(&self, link: Option<u32>) -> Counts {
        link.map_or_else(Counts::default, |i| self.slot(i).counts)
    }

    /// Recomputes height and counts from the children.
    fn pull(&mut self, i: u32) {
        let (left, right, color) = {
            let s = self.slot(i);
            (s.left, s.right, s.color)
        };
        let height = 1 + self.height_of(left).max(self.height_of(right));
        let mut counts = Counts::unit(color);
        counts.add(&self.counts_of(left));
        counts.add(&self.counts_of(right));
        let s = self.slot_mut(i);
        s.height = height;
        s.counts = counts;
    }

    fn alloc(&mut self, value: V, color: Color) -> u32 {
        match self.free.pop() {
            Some(i) => {
                let s = self.slot_mut(i);
                s.value = Some(value);
                s.color = color;
                s.parent = None;
                s.left = None;
                s.right = None;
                s.height = 1;
                s.counts = Counts::unit(color);
                i
            }
            None => {
                self.slots.push(Slot {
                    value: Some(value),
                    color,
                    parent: None,
                    left: None,
                    right: None,
                    height: 1,
                    counts: Counts::unit(color),
                    generation: 0,
                });
                (self.slots.len() - 1) as u32
            }
        }
    }

    fn release(&mut self, i: u32) -> V {
        let s = self.slot_mut(i);
        s.generation = s.generation.wrapping_add(1);
        s.parent = None;
        s.left = None;
        s.right = None;
        s.height = 0;
        s.counts = Counts::default();
        let value = match s.value.take() {
            Some(v) => v,
            None => panic!("releasing an already-free slot"),
        };
        self.free.push(i);
        value
    }

    pub fn size(&self, mask: ColorMask) -> usize {
        self.counts_of(self.root).masked(mask)
    }

    pub fn len(&self) -> usize {
        self.size(ColorMask::ALL)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.slots
            .get(id.index as usize)
            .map_or(false, |s| s.generation == id.generation && s.value.is_some())
    }

    pub fn color(&self, id: NodeId) -> Color {
        self.slot(self.resolve(id)).color
    }

    pub fn value(&self, id: NodeId) -> &V {
        let i = self.resolve(id);
        match &self.slot(i).value {
            Some(v) => v,
            None => panic!("stale node handle: the slot was freed"),
        }
    }

    pub fn value_mut(&mut self, id: NodeId) -> &mut V {
        let i = self.resolve(id);
        match &mut self.slot_mut(i).value {
            Some(v) => v,
            None => panic!("stale node handle: the slot was freed"),
        }
    }

    /// Inserts so that the new element becomes the immediate global
    /// predecessor of the element currently at `index` within `mask`;
    /// `index == size(mask)` appends at the global end.
    pub fn insert(&mut self, index: usize, mask: ColorMask, color: Color, value: V) -> NodeId {
        let size = self.size(mask);
        assert!(
            index <= size,
            "insert index {index} out of bounds for color scope of size {size}"
        );
        let node = self.alloc(value, color);
        match self.root {
            None => {
                self.root = Some(node);
            }
            Some(root) => {
                if index == size {
                    let mut cur = root;
                    while let Some(r) = self.slot(cur).right {
                        cur = r;
                    }
                    self.slot_mut(cur).right = Some(node);
                    self.slot_mut(node).parent = Some(cur);
                } else {
                    let at = self.locate(index, mask);
                    match self.slot(at).left {
                        None => {
                            self.slot_mut(at).left = Some(node);
                            self.slot_mut(node).parent = Some(at);
                        }
                        Some(left) => {
                            let mut cur = left;
                            while let Some(r) = self.slot(cur).right {
                                cur = r;
                            }
                            self.slot_mut(cur).right = Some(node);
                            self.slot_mut(node).parent = Some(cur);
                        }
                    }
                }
                let parent = self.slot(node).parent;
                self.rebalance_upward(parent);
            }
        }
        self.id_of(node)
    }

    pub fn remove(&mut self, id: NodeId) -> V {
        let i = self.resolve(id);
        let (left, right, parent) = {
            let s = self.slot(i);
            (s.left, s.right, s.parent)
        };
        let rebalance_from = match (left, right) {
            (Some(left), Some(right)) => {
                // Relink the in-order successor into this position; slot
                // contents never move, so other handles stay valid.
                let mut succ = right;
                while let Some(l) = self.slot(succ).left {
                    succ = l;
                }
                let succ_parent = expect_node(self.slot(succ).parent);
                let succ_right = self.slot(succ).right;
                let from = if succ_parent == i {
                    succ
                } else {
                    self.slot_mut(succ_parent).left = succ_right;
                    if let Some(x) = succ_right {
                        self.slot_mut(x).parent = Some(succ_parent);
                    }
                    self.slot_mut(succ).right = Some(right);
                    self.slot_mut(right).parent = Some(succ);
                    succ_parent
                };
                self.slot_mut(succ).left = Some(left);
                self.slot_mut(left).parent = Some(succ);
                self.slot_mut(succ).parent = parent;
                self.replace_child(parent, i, Some(succ));
                Some(from)
            }
            (Some(child), None) | (None, Some(child)) => {
                self.slot_mut(child).parent = parent;
                self.replace_child(parent, i, Some(child));
                parent
            }
            (None, None) => {
                self.replace_child(parent, i, None);
                parent
            }
        };
        self.rebalance_upward(rebalance_from);
        self.release(i)
    }

    pub fn get(&self, index: usize, mask: ColorMask) -> NodeId {
        let size = self.size(mask);
        assert!(
            index < size,
            "index {index} out of bounds for color scope of size {size}"
        );
        self.id_of(self.locate(index, mask))
    }

    /// Number of `mask` elements strictly before `id` in global order.
    /// The handle's own color does not have to be in `mask`.
    pub fn index_of(&self, id: NodeId, mask: ColorMask) -> usize {
        let i = self.resolve(id);
        let mut index = self.counts_of(self.slot(i).left).masked(mask);
        let mut cur = i;
        while let Some(p) = self.slot(cur).parent {
            if self.slot(p).right == Some(cur) {
                index += self.counts_of(self.slot(p).left).masked(mask);
                if mask.contains(self.slot(p).color) {
                    index += 1;
                }
            }
            cur = p;
        }
        index
    }

    pub fn convert_index(&self, index: usize, from: ColorMask, to: ColorMask) -> usize {
        self.index_of(self.get(index, from), to)
    }

    pub fn set_color(&mut self, id: NodeId, color: Color) {
        let i = self.resolve(id);
        let old = self.slot(i).color;
        if old == color {
            return;
        }
        self.slot_mut(i).color = color;
        let mut cur = Some(i);
        while let Some(c) = cur {
            let s = self.slot_mut(c);
            s.counts.0[old.bit()] -= 1;
            s.counts.0[color.bit()] += 1;
            cur = s.parent;
        }
    }

    pub fn first(&self) -> Option<NodeId> {
        let mut cur = self.root?;
        while let Some(l) = self.slot(cur).left {
            cur = l;
        }
        Some(self.id_of(cur))
    }

    pub fn last(&self) -> Option<NodeId> {
        let mut cur = self.root?;
        while let Some(r) = self.slot(cur).right {
            cur = r;
        }
        Some(self.id_of(cur))
    }

    /// In-order successor in the global (all-colors) order.
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        let mut cur = self.resolve(id);
        if let Some(r) = self.slot(cur).right {
            let mut c = r;
            while let Some(l) = self.slot(c).left {
                c = l;
            }
            return Some(self.id_of(c));
        }
        while let Some(p) = self.slot(cur).parent {
            if self.slot(p).left == Some(cur) {
                return Some(self.id_of(p));
            }
            cur = p;
        }
        None
    }

    /// In-order predecessor in the global (all-colors) order.
    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        let mut cur = self.resolve(id);
        if let Some(l) = self.slot(cur).left {
            let mut c = l;
            while let Some(r) = self.slot(c).right {
                c = r;
            }
            return Some(self.id_of(c));
        }
        while let Some(p) = self.slot(cur).parent {
            if self.slot(p).right == Some(cur) {
                return Some(self.id_of(p));
            }
            cur = p;
        }
        None
    }

    pub fn iter(&self, mask: ColorMask) -> Iter<'_, V> {
        Iter {
            tree: self,
            next: self.first(),
            mask,
        }
    }

    pub fn clear(&mut self) {
        self.free.clear();
        for (i, s) in self.slots.iter_mut().enumerate() {
            if s.value.is_some() {
                s.generation = s.generation.wrapping_add(1);
                s.value = None;
            }
            s.parent = None;
            s.left = None;
            s.right = None;
            s.height = 0;
            s.counts = Counts::default();
            self.free.push(i as u32);
        }
        self.root = None;
    }

    fn locate(&self, mut index: usize, mask: ColorMask) -> u32 {
        let mut cur = expect_node(self.root);
        loop {
            let left = self.slot(cur).left;
            let left_count = self.counts_of(left).masked(mask);
            if index < left_count {
                cur = expect_node(left);
                continue;
            }
            index -= left_count;
            if mask.contains(self.slot(cur).color) {
                if index == 0 {
                    return cur;
                }
                index -= 1;
            }
            cur = expect_node(self.slot(cur).right);
        }
    }

    fn replace_child(&mut self, parent: Option<u32>, old: u32, new: Option<u32>) {
        match parent {
            None => self.root = new,
            Some(p) => {
                if self.slot(p).left == Some(old) {
                    self.slot_mut(p).left = new;
                } else {
                    debug_assert_eq!(self.slot(p).right, Some(old));
                    self.slot_mut(p).right = new;
                }
            }
        }
    }

    /// Pulls and rebalances every node from `from` up to the root. Counts
    /// change along the whole path, so the walk never stops early.
    fn rebalance_upward(&mut self, mut from: Option<u32>) {
        while let Some(i) = from {
            let i = self.rebalance(i);
            self.pull(i);
            from = self.slot(i).parent;
        }
    }

    fn rebalance(&mut self, i: u32) -> u32 {
        let left = self.slot(i).left;
        let right = self.slot(i).right;
        let balance = self.height_of(left) as i16 - self.height_of(right) as i16;
        if balance > 1 {
            let l = expect_node(left);
            if self.height_of(self.slot(l).left) >= self.height_of(self.slot(l).right) {
                self.rotate_right(i)
            } else {
                self.rotate_left(l);
                self.rotate_right(i)
            }
        } else if balance < -1 {
            let r = expect_node(right);
            if self.height_of(self.slot(r).right) >= self.height_of(self.slot(r).left) {
                self.rotate_left(i)
            } else {
                self.rotate_right(r);
                self.rotate_left(i)
            }
        } else {
            i
        }
    }

    fn rotate_left(&mut self, i: u32) -> u32 {
        let r = expect_node(self.slot(i).right);
        let rl = self.slot(r).left;
        let parent = self.slot(i).parent;
        self.slot_mut(i).right = rl;
        if let Some(x) = rl {
            self.slot_mut(x).parent = Some(i);
        }
        self.replace_child(parent, i, Some(r));
        self.slot_mut(r).parent = parent;
        self.slot_mut(r).left = Some(i);
        self.slot_mut(i).parent = Some(r);
        self.pull(i);
        self.pull(r);
        r
    }

    fn rotate_right(&mut self, i: u32) -> u32 {
        let l = expect_node(self.slot(i).left);
        let lr = self.slot(l).right;
        let parent = self.slot(i).parent;
        self.slot_mut(i).left = lr;
        if let Some(x) = lr {
            self.slot_mut(x).parent = Some(i);
        }
        self.replace_child(parent, i, Some(l));
        self.slot_mut(l).parent = parent;
        self.slot_mut(l).right = Some(i);
        self.slot_mut(i).parent = Some(l);
        self.pull(i);
        self.pull(l);
        l
    }

    /// Exhaustive structural check: parent links, AVL balance, heights and
    /// per-color counts, free-list accounting. Panics on the first
    /// violation. Recursion depth is the tree height, so O(log n).
    pub fn validate(&self) {
        fn walk<V>(tree: &FourColorTree<V>, i: u32, parent: Option<u32>) -> (u8, Counts) {
            let s = tree.slot(i);
            assert!(s.value.is_some(), "linked slot {i} is on the free list");
            assert_eq!(s.parent, parent, "parent link of slot {i} disagrees");
            let (lh, lc) = s
                .left
                .map_or((0, Counts::default()), |l| walk(tree, l, Some(i)));
            let (rh, rc) = s
                .right
                .map_or((0, Counts::default()), |r| walk(tree, r, Some(i)));
            assert!(
                (lh as i16 - rh as i16).abs() <= 1,
                "slot {i} violates the AVL balance bound"
            );
            let height = 1 + lh.max(rh);
            assert_eq!(s.height, height, "height of slot {i} is stale");
            let mut counts = Counts::unit(s.color);
            counts.add(&lc);
            counts.add(&rc);
            assert_eq!(s.counts, counts, "color counts of slot {i} are stale");
            (height, counts)
        }
        if let Some(root) = self.root {
            walk(self, root, None);
        }
        assert_eq!(
            self.len() + self.free.len(),
            self.slots.len(),
            "free-list accounting disagrees with arena size"
        );
    }
}

/// Global-order iterator filtered by a color mask, yielding handles.
pub struct Iter<'a, V> {
    tree: &'a FourColorTree<V>,
    next: Option<NodeId>,
    mask: ColorMask,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while let Some(id) = self.next {
            self.next = self.tree.next(id);
            if self.mask.contains(self.tree.color(id)) {
                return Some(id);
            }
        }
        None
    }
}
