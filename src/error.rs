//! ReconcileError: unified error type for mesh-reconcile public APIs.
//!
//! Every fatal condition names the stage and the offending identifier
//! (block id, group id, node or element id) rather than surfacing a raw
//! collaborator error code.

use thiserror::Error;

/// Unified error type for snapshot import and reconciliation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReconcileError {
    /// A required variable or attribute is missing from the snapshot, or has
    /// the wrong declared type or arity. Always fatal.
    #[error("snapshot format error: {0}")]
    Format(String),
    /// The element-type tag string on a block's connectivity was not recognized.
    #[error("unrecognized element type tag `{0}`")]
    UnknownElementType(String),
    /// A file-local node index escaped the canonical node-handle range.
    /// The canonical handle space is finite; any escape indicates file corruption.
    #[error("block {block}: node index {index} outside the canonical node range 1..={limit}")]
    BadConnectivity { block: i32, index: i64, limit: usize },
    /// A mesh-database operation failed. Aborts the run; prior creations remain as-is.
    #[error("mesh database error: {0}")]
    Database(String),
    /// Attempted to construct an `EntityHandle` from zero (reserved as invalid).
    #[error("entity handle must be non-zero")]
    InvalidHandle,
    /// A side-group member references an element id outside every block's range.
    #[error("side group {group}: element {element} is not covered by any block")]
    SideElementOutOfRange { group: i32, element: i64 },
    /// A snapshot element flagged dead resolved to no canonical element.
    #[error("block {block}: dead element {element} matches no canonical element")]
    NoMatch { block: i32, element: i64 },
    /// A snapshot element flagged dead resolved to more than one canonical element.
    #[error("block {block}: dead element {element} matches {count} canonical elements")]
    AmbiguousMatch {
        block: i32,
        element: i64,
        count: usize,
    },
    /// The requested snapshot time step does not exist.
    #[error("time step {requested} out of range; snapshot stores {available} step(s)")]
    TimeStepOutOfRange { requested: usize, available: usize },
    /// A source node required for dead-element resolution has no canonical match.
    #[error("dead element {element}: source node {node} has no canonical correspondence")]
    UnresolvedCorrespondence { element: i64, node: i64 },
}
