//! # mesh-reconcile
//!
//! mesh-reconcile reconciles two representations of a finite-element mesh:
//! a flat, array-based file snapshot (nodes, elements grouped into typed
//! blocks, boundary node/side groupings) and a topological mesh database
//! addressed by opaque entity handles with derived adjacency.
//!
//! ## What it does
//! - Rebuilds typed element blocks with canonical node ordering from flat
//!   connectivity arrays ([`blocks`]).
//! - Resolves named boundary face/edge groupings against already-created
//!   elements using adjacency and connectivity-rotation matching, tracking
//!   forward/reverse sense and distribution-factor alignment ([`boundary`]).
//! - Matches nodes between independently numbered snapshots by stable id or
//!   spatial proximity ([`correspondence`]) to replay coordinate updates and
//!   prune elements flagged dead in a later snapshot ([`reconcile`]).
//!
//! File-format byte parsing and mesh-database internals stay behind the
//! [`snapshot::SnapshotSource`] and [`database::MeshDatabase`] traits;
//! in-memory implementations of both ship with the crate.
//!
//! ## Determinism
//! Stages run single-threaded and batch-sequential; entity handles are
//! allocated in creation order, so repeated runs over the same snapshot
//! produce identical handles.
//!
//! ## Usage
//! ```no_run
//! use mesh_reconcile::prelude::*;
//!
//! # fn run(source: mesh_reconcile::snapshot::InMemorySnapshot)
//! #     -> Result<(), mesh_reconcile::ReconcileError> {
//! let mut db = InMemoryMeshDb::new();
//! let report = import_snapshot(&mut db, &source, &ImportOptions::default())?;
//! println!("{} elements", report.elements_created);
//!
//! let update = ReconcileOptions {
//!     time_step: 2,
//!     mode: UpdateMode::Replace,
//!     strategy: MatchStrategy::Identity,
//!     blocks: None,
//! };
//! let outcome = reconcile_snapshot(&mut db, &source, &update)?;
//! println!("{} dead elements pruned", outcome.elements_deleted);
//! # Ok(())
//! # }
//! ```

pub mod blocks;
pub mod boundary;
pub mod correspondence;
pub mod database;
pub mod error;
pub mod import;
pub mod reconcile;
pub mod session;
pub mod snapshot;
pub mod topology;

pub use error::ReconcileError;

/// The most-used types and entry points.
pub mod prelude {
    pub use crate::correspondence::{DEFAULT_SEARCH_RADIUS, MatchStrategy};
    pub use crate::database::{GroupKind, InMemoryMeshDb, MeshDatabase};
    pub use crate::error::ReconcileError;
    pub use crate::import::{ImportOptions, ImportReport, import_snapshot};
    pub use crate::reconcile::{
        ReconcileOptions, ReconcileReport, UpdateMode, reconcile_snapshot,
    };
    pub use crate::snapshot::{InMemorySnapshot, SnapshotSource};
    pub use crate::topology::{ElementType, EntityHandle, EntityRange, Sense};
}
