//! Per-run import state, threaded explicitly through every stage.
//!
//! There is no process-wide reader state: everything a stage needs to know
//! about the snapshot being imported lives in a [`Session`] value built up
//! stage by stage (nodes, then blocks, then boundary groups) and discarded
//! when the run completes.

use crate::blocks::Block;
use crate::error::ReconcileError;
use crate::snapshot::SnapshotHeader;
use crate::topology::{EntityHandle, EntityRange};

/// Arena-style offset from file-local 1-based node indices into the
/// canonical node-handle space established when coordinates were loaded.
#[derive(Debug, Clone, Copy)]
pub struct NodeArena {
    range: EntityRange,
}

impl NodeArena {
    pub fn new(range: EntityRange) -> Self {
        Self { range }
    }

    /// Number of canonical nodes behind the arena.
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Canonical handle for a file-local 1-based index, if in range.
    pub fn handle(&self, file_index: i64) -> Option<EntityHandle> {
        if file_index < 1 {
            return None;
        }
        self.range.handle(file_index as usize - 1)
    }

    /// Like [`NodeArena::handle`], but an escape from the finite handle
    /// space is a hard [`ReconcileError::BadConnectivity`] for the block.
    pub fn checked_handle(
        &self,
        block: i32,
        file_index: i64,
    ) -> Result<EntityHandle, ReconcileError> {
        self.handle(file_index)
            .ok_or_else(|| ReconcileError::BadConnectivity {
                block,
                index: file_index,
                limit: self.range.len(),
            })
    }
}

/// Accumulated state of one import run.
#[derive(Debug)]
pub struct Session {
    pub header: SnapshotHeader,
    pub nodes: NodeArena,
    pub blocks: Vec<Block>,
    /// Indexed by 0-based file-local node index: true when the node appears
    /// in the connectivity of a block that is being read.
    pub node_in_read_block: Vec<bool>,
    pub warnings: Vec<String>,
}

impl Session {
    pub fn new(header: SnapshotHeader, nodes: NodeArena) -> Self {
        let node_count = nodes.len();
        Self {
            header,
            nodes,
            blocks: Vec::new(),
            node_in_read_block: vec![false; node_count],
            warnings: Vec::new(),
        }
    }

    /// Records a non-fatal observation surfaced in the final report.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{message}");
        self.warnings.push(message);
    }
}
