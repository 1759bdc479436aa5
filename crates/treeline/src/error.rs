use thiserror::Error;

/// Contract-level failures surfaced by the batch entry point.
///
/// These cover defects in the collaborating path extractor that are
/// detectable before the tree commits to them. They are fatal to the
/// batch: the engine makes no attempt at partial recovery, and a tree
/// that returned one of these should be disposed. Internal structural
/// corruption is a logic defect of the engine itself and panics instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("path extraction returned an empty path for the value at source index {source_index}")]
    EmptyPath { source_index: usize },
}
