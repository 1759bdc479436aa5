//! Order-statistics arena tree with four-color subsequence indexing.
//!
//! Stores every element in one global order while tagging each with one of
//! four [`Color`]s. Subtree counts are kept per color, so any union of
//! colors (a [`ColorMask`]) addresses its own logical subsequence of the
//! single physical ordering: an element has an index in "all" space, in
//! "visible" space, in "real" space, and so on, all answered in O(log n).
//!
//! Instead of raw pointers, all links are `Option<u32>` indices into a
//! slot arena owned by the tree; callers hold [`NodeId`] handles that
//! carry a generation stamp, so a handle taken before a removal can never
//! silently alias the slot's next occupant.
//!
//! # Module layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`color`] | [`Color`] and [`ColorMask`] |
//! | [`tree`]  | [`FourColorTree`], [`NodeId`], iteration |

pub mod color;
pub mod tree;

pub use color::{Color, ColorMask};
pub use tree::{FourColorTree, Iter, NodeId};
