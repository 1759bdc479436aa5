//! Change-record protocol, upstream and downstream.
//!
//! The engine consumes [`SourceChange`] batches describing mutations of
//! the flat source sequence and emits [`ViewChange`] batches in
//! visible-index terms. Records within a batch are sequential: each index
//! is relative to the state after the records before it have been applied.

/// One mutation of the flat source sequence. Indices address the source
/// (real-node) space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceChange<T> {
    Inserted { index: usize, value: T },
    Updated { index: usize, value: T },
    Deleted { index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One mutation of the visible view, addressed by visible index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewChange {
    pub kind: ChangeKind,
    pub index: usize,
}

impl ViewChange {
    pub fn insert(index: usize) -> ViewChange {
        ViewChange {
            kind: ChangeKind::Insert,
            index,
        }
    }

    pub fn update(index: usize) -> ViewChange {
        ViewChange {
            kind: ChangeKind::Update,
            index,
        }
    }

    pub fn delete(index: usize) -> ViewChange {
        ViewChange {
            kind: ChangeKind::Delete,
            index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&[ViewChange])>;

/// Nested begin/commit bracket around each batch of structural repair.
///
/// Records accumulate while the bracket is open and fan out to every
/// subscriber exactly once, when the outermost bracket commits. Observers
/// therefore never see a structurally inconsistent intermediate tree.
pub(crate) struct EventBus {
    depth: usize,
    pending: Vec<ViewChange>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
}

impl EventBus {
    pub(crate) fn new() -> EventBus {
        EventBus {
            depth: 0,
            pending: Vec::new(),
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub(crate) fn begin(&mut self) {
        self.depth += 1;
    }

    pub(crate) fn commit(&mut self) {
        assert!(self.depth > 0, "commit without a matching begin");
        self.depth -= 1;
        if self.depth > 0 || self.pending.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.pending);
        for (_, subscriber) in &mut self.subscribers {
            subscriber(&batch);
        }
    }

    /// Closes the bracket and discards everything recorded inside it.
    /// Used when a batch turns out to be fatally malformed.
    pub(crate) fn abort(&mut self) {
        assert!(self.depth > 0, "abort without a matching begin");
        self.depth -= 1;
        if self.depth == 0 {
            self.pending.clear();
        }
    }

    pub(crate) fn record(&mut self, change: ViewChange) {
        debug_assert!(self.depth > 0, "record outside a begin/commit bracket");
        self.pending.push(change);
    }

    pub(crate) fn subscribe(&mut self, subscriber: Subscriber) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, subscriber));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(s, _)| *s != id);
        self.subscribers.len() != before
    }

    pub(crate) fn reset(&mut self) {
        self.depth = 0;
        self.pending.clear();
        self.subscribers.clear();
    }
}
