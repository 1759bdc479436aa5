//! A live tree view over a flat, mutable, observable sequence.
//!
//! Feed the engine an ordered source sequence plus a [`TreeFormat`] that
//! maps each value to a path, and it maintains a materialized tree on
//! top: missing ancestors are synthesized as *virtual* nodes, ancestors
//! that lose their last descendant are reaped, and expand/collapse state
//! decides which rows the visible projection exposes. Every source batch
//! is absorbed synchronously and reported downstream as one batch of
//! visible-index [`ViewChange`] records.
//!
//! ```
//! use std::cmp::Ordering;
//! use treeline::{SourceChange, TreeFormat, TreeList};
//!
//! struct Slashes;
//!
//! impl TreeFormat<String> for Slashes {
//!     fn get_path(&self, value: &String, out: &mut Vec<String>) {
//!         let mut prefix = String::new();
//!         for segment in value.split('/') {
//!             if !prefix.is_empty() {
//!                 prefix.push('/');
//!             }
//!             prefix.push_str(segment);
//!             out.push(prefix.clone());
//!         }
//!     }
//!
//!     fn compare_at_depth(&self, _depth: usize, a: &String, b: &String) -> Option<Ordering> {
//!         Some(a.cmp(b))
//!     }
//! }
//!
//! let mut tree = TreeList::new(Slashes);
//! tree.source_changed(&[
//!     SourceChange::Inserted { index: 0, value: "src/lib.rs".to_string() },
//!     SourceChange::Inserted { index: 1, value: "src/main.rs".to_string() },
//! ])
//! .unwrap();
//! // "src" appears as a synthesized ancestor row.
//! assert_eq!(tree.size(), 3);
//! assert_eq!(tree.real_size(), 2);
//! ```

mod attach;
pub mod error;
pub mod events;
pub mod format;
mod locate;
pub mod node;
mod reap;
pub mod tree_list;

pub use four_color_tree::{Color, ColorMask, NodeId};

pub use crate::error::TreeError;
pub use crate::events::{ChangeKind, SourceChange, SubscriptionId, ViewChange};
pub use crate::format::{compare_paths, TreeFormat};
pub use crate::node::TreeNode;
pub use crate::tree_list::{NodeInfo, Nodes, TreeList};
