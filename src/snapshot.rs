//! Snapshot collaborator: named array reads off a file snapshot.
//!
//! The byte-level format (dimension/attribute/variable lookup, string
//! decoding) lives outside this crate; reconciliation consumes the snapshot
//! through [`SnapshotSource`]. Every accessor either returns data, reports
//! "not present" (`Ok(None)` where the variable is optional), or fails with
//! [`ReconcileError::Format`] when a required variable is missing or has
//! the wrong arity.
//!
//! [`InMemorySnapshot`] is the provided implementation over plain arrays;
//! callers that parse a real file fill one in, and the test suite builds
//! them directly.

use crate::error::ReconcileError;

/// Global counts declared in the snapshot header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapshotHeader {
    /// Spatial dimension (2 or 3).
    pub dimensions: usize,
    pub num_nodes: usize,
    pub num_elements: usize,
    pub num_blocks: usize,
    pub num_node_groups: usize,
    pub num_side_groups: usize,
}

/// Per-block counts declared in the snapshot header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockHeader {
    pub num_elements: usize,
    pub nodes_per_element: usize,
    pub num_attributes: usize,
}

/// Flat connectivity of one block plus its element-type tag.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockConnectivity {
    /// Element-type tag string attached to the connectivity variable.
    pub element_type: String,
    /// File-local 1-based node indices, `num_elements * nodes_per_element` long.
    pub connectivity: Vec<i64>,
}

/// One named node grouping: file-local node indices plus optional per-node
/// distribution factors.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeGroupData {
    /// File-local 1-based node indices.
    pub nodes: Vec<i64>,
    /// Per-node scalar weights; empty when the group carries none.
    pub dist_factors: Vec<f64>,
}

/// One named side grouping: (element file id, 1-based local side) pairs plus
/// optional distribution factors aligned to the group's total side-node count.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SideGroupData {
    pub elements: Vec<i64>,
    pub sides: Vec<usize>,
    pub dist_factors: Vec<f64>,
}

/// Read access to one file snapshot.
pub trait SnapshotSource {
    /// Header counts. Required.
    fn header(&self) -> Result<SnapshotHeader, ReconcileError>;

    /// Node coordinates, `num_nodes` long; 2-D snapshots report z = 0.
    fn coordinates(&self) -> Result<Vec<[f64; 3]>, ReconcileError>;

    /// Stable external node ids, `num_nodes` long, or `None` when the
    /// snapshot carries no node id map.
    fn node_id_map(&self) -> Result<Option<Vec<i64>>, ReconcileError>;

    /// Stable external element ids in block order, or `None`.
    fn element_id_map(&self) -> Result<Option<Vec<i64>>, ReconcileError>;

    /// External block identifiers, `num_blocks` long.
    fn block_ids(&self) -> Result<Vec<i32>, ReconcileError>;

    /// Per-block counts; `block_seq` is 0-based in block order.
    fn block_header(&self, block_seq: usize) -> Result<BlockHeader, ReconcileError>;

    /// Element-type tag of a block without pulling its connectivity.
    fn block_element_type(&self, block_seq: usize) -> Result<String, ReconcileError>;

    /// Flat connectivity of a block.
    fn block_connectivity(&self, block_seq: usize) -> Result<BlockConnectivity, ReconcileError>;

    /// External ids of the node groups.
    fn node_group_ids(&self) -> Result<Vec<i32>, ReconcileError>;

    /// Membership of the node group at `group_seq` (0-based).
    fn node_group(&self, group_seq: usize) -> Result<NodeGroupData, ReconcileError>;

    /// External ids of the side groups.
    fn side_group_ids(&self) -> Result<Vec<i32>, ReconcileError>;

    /// Membership of the side group at `group_seq` (0-based).
    fn side_group(&self, group_seq: usize) -> Result<SideGroupData, ReconcileError>;

    /// Number of stored time steps.
    fn time_steps(&self) -> Result<usize, ReconcileError>;

    /// Per-node displacement vectors at a 1-based time step.
    fn displacements(&self, time_step: usize) -> Result<Vec<[f64; 3]>, ReconcileError>;

    /// Per-element liveness flags for one block at a 1-based time step
    /// (alive == 1.0), or `None` when the snapshot tracks no liveness.
    fn liveness(
        &self,
        time_step: usize,
        block_seq: usize,
    ) -> Result<Option<Vec<f64>>, ReconcileError>;

    /// Free-form provenance records.
    fn qa_records(&self) -> Result<Vec<String>, ReconcileError>;
}

/// Array-backed snapshot, one block/group entry per sequence position.
#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshot {
    pub dimensions: usize,
    pub coordinates: Vec<[f64; 3]>,
    pub node_id_map: Option<Vec<i64>>,
    pub element_id_map: Option<Vec<i64>>,
    pub block_ids: Vec<i32>,
    pub blocks: Vec<InMemoryBlock>,
    pub node_group_ids: Vec<i32>,
    pub node_groups: Vec<NodeGroupData>,
    pub side_group_ids: Vec<i32>,
    pub side_groups: Vec<SideGroupData>,
    /// Per-step displacement arrays, each `num_nodes` long.
    pub displacements: Vec<Vec<[f64; 3]>>,
    /// `liveness[step][block_seq]`; inner `None` when a block has no flags.
    pub liveness: Vec<Vec<Option<Vec<f64>>>>,
    pub qa_records: Vec<String>,
}

/// One block of an [`InMemorySnapshot`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryBlock {
    pub element_type: String,
    pub nodes_per_element: usize,
    pub num_attributes: usize,
    /// File-local 1-based node indices.
    pub connectivity: Vec<i64>,
}

impl InMemoryBlock {
    fn num_elements(&self) -> usize {
        if self.nodes_per_element == 0 {
            0
        } else {
            self.connectivity.len() / self.nodes_per_element
        }
    }
}

impl InMemorySnapshot {
    fn block(&self, block_seq: usize) -> Result<&InMemoryBlock, ReconcileError> {
        self.blocks
            .get(block_seq)
            .ok_or_else(|| ReconcileError::Format(format!("block sequence {block_seq} not present")))
    }

    fn num_elements(&self) -> usize {
        self.blocks.iter().map(InMemoryBlock::num_elements).sum()
    }
}

impl SnapshotSource for InMemorySnapshot {
    fn header(&self) -> Result<SnapshotHeader, ReconcileError> {
        if self.dimensions == 0 || self.dimensions > 3 {
            return Err(ReconcileError::Format(format!(
                "unsupported spatial dimension {}",
                self.dimensions
            )));
        }
        if self.block_ids.len() != self.blocks.len() {
            return Err(ReconcileError::Format(
                "block id list length disagrees with block count".into(),
            ));
        }
        Ok(SnapshotHeader {
            dimensions: self.dimensions,
            num_nodes: self.coordinates.len(),
            num_elements: self.num_elements(),
            num_blocks: self.blocks.len(),
            num_node_groups: self.node_groups.len(),
            num_side_groups: self.side_groups.len(),
        })
    }

    fn coordinates(&self) -> Result<Vec<[f64; 3]>, ReconcileError> {
        Ok(self.coordinates.clone())
    }

    fn node_id_map(&self) -> Result<Option<Vec<i64>>, ReconcileError> {
        if let Some(map) = &self.node_id_map {
            if map.len() != self.coordinates.len() {
                return Err(ReconcileError::Format(
                    "node id map length disagrees with node count".into(),
                ));
            }
        }
        Ok(self.node_id_map.clone())
    }

    fn element_id_map(&self) -> Result<Option<Vec<i64>>, ReconcileError> {
        if let Some(map) = &self.element_id_map {
            if map.len() != self.num_elements() {
                return Err(ReconcileError::Format(
                    "element id map length disagrees with element count".into(),
                ));
            }
        }
        Ok(self.element_id_map.clone())
    }

    fn block_ids(&self) -> Result<Vec<i32>, ReconcileError> {
        Ok(self.block_ids.clone())
    }

    fn block_header(&self, block_seq: usize) -> Result<BlockHeader, ReconcileError> {
        let block = self.block(block_seq)?;
        Ok(BlockHeader {
            num_elements: block.num_elements(),
            nodes_per_element: block.nodes_per_element,
            num_attributes: block.num_attributes,
        })
    }

    fn block_element_type(&self, block_seq: usize) -> Result<String, ReconcileError> {
        Ok(self.block(block_seq)?.element_type.clone())
    }

    fn block_connectivity(&self, block_seq: usize) -> Result<BlockConnectivity, ReconcileError> {
        let block = self.block(block_seq)?;
        if block.nodes_per_element == 0
            || block.connectivity.len() % block.nodes_per_element != 0
        {
            return Err(ReconcileError::Format(format!(
                "block sequence {block_seq}: connectivity length {} is not a multiple of {} nodes per element",
                block.connectivity.len(),
                block.nodes_per_element
            )));
        }
        Ok(BlockConnectivity {
            element_type: block.element_type.clone(),
            connectivity: block.connectivity.clone(),
        })
    }

    fn node_group_ids(&self) -> Result<Vec<i32>, ReconcileError> {
        if self.node_group_ids.len() != self.node_groups.len() {
            return Err(ReconcileError::Format(
                "node group id list length disagrees with group count".into(),
            ));
        }
        Ok(self.node_group_ids.clone())
    }

    fn node_group(&self, group_seq: usize) -> Result<NodeGroupData, ReconcileError> {
        let group = self.node_groups.get(group_seq).ok_or_else(|| {
            ReconcileError::Format(format!("node group sequence {group_seq} not present"))
        })?;
        if !group.dist_factors.is_empty() && group.dist_factors.len() != group.nodes.len() {
            return Err(ReconcileError::Format(format!(
                "node group sequence {group_seq}: {} distribution factors for {} nodes",
                group.dist_factors.len(),
                group.nodes.len()
            )));
        }
        Ok(group.clone())
    }

    fn side_group_ids(&self) -> Result<Vec<i32>, ReconcileError> {
        if self.side_group_ids.len() != self.side_groups.len() {
            return Err(ReconcileError::Format(
                "side group id list length disagrees with group count".into(),
            ));
        }
        Ok(self.side_group_ids.clone())
    }

    fn side_group(&self, group_seq: usize) -> Result<SideGroupData, ReconcileError> {
        let group = self.side_groups.get(group_seq).ok_or_else(|| {
            ReconcileError::Format(format!("side group sequence {group_seq} not present"))
        })?;
        if group.elements.len() != group.sides.len() {
            return Err(ReconcileError::Format(format!(
                "side group sequence {group_seq}: {} elements but {} sides",
                group.elements.len(),
                group.sides.len()
            )));
        }
        Ok(group.clone())
    }

    fn time_steps(&self) -> Result<usize, ReconcileError> {
        Ok(self.displacements.len().max(self.liveness.len()))
    }

    fn displacements(&self, time_step: usize) -> Result<Vec<[f64; 3]>, ReconcileError> {
        let step = self
            .displacements
            .get(time_step.wrapping_sub(1))
            .ok_or_else(|| {
                ReconcileError::Format(format!("no displacement data at time step {time_step}"))
            })?;
        if step.len() != self.coordinates.len() {
            return Err(ReconcileError::Format(format!(
                "time step {time_step}: {} displacement entries for {} nodes",
                step.len(),
                self.coordinates.len()
            )));
        }
        Ok(step.clone())
    }

    fn liveness(
        &self,
        time_step: usize,
        block_seq: usize,
    ) -> Result<Option<Vec<f64>>, ReconcileError> {
        let Some(step) = self.liveness.get(time_step.wrapping_sub(1)) else {
            return Ok(None);
        };
        let Some(flags) = step.get(block_seq).and_then(Option::as_ref) else {
            return Ok(None);
        };
        let expected = self.block(block_seq)?.num_elements();
        if flags.len() != expected {
            return Err(ReconcileError::Format(format!(
                "block sequence {block_seq}: {} liveness flags for {expected} elements",
                flags.len()
            )));
        }
        Ok(Some(flags.clone()))
    }

    fn qa_records(&self) -> Result<Vec<String>, ReconcileError> {
        Ok(self.qa_records.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_counts_derive_from_arrays() {
        let snapshot = InMemorySnapshot {
            dimensions: 3,
            coordinates: vec![[0.0; 3]; 4],
            block_ids: vec![100],
            blocks: vec![InMemoryBlock {
                element_type: "TETRA".into(),
                nodes_per_element: 4,
                connectivity: vec![1, 2, 3, 4],
                ..Default::default()
            }],
            ..Default::default()
        };
        let header = snapshot.header().unwrap();
        assert_eq!(header.num_nodes, 4);
        assert_eq!(header.num_elements, 1);
        assert_eq!(header.num_blocks, 1);
    }

    #[test]
    fn ragged_connectivity_is_a_format_error() {
        let snapshot = InMemorySnapshot {
            dimensions: 3,
            block_ids: vec![1],
            blocks: vec![InMemoryBlock {
                element_type: "HEX".into(),
                nodes_per_element: 8,
                connectivity: vec![1, 2, 3],
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(matches!(
            snapshot.block_connectivity(0),
            Err(ReconcileError::Format(_))
        ));
    }

    #[test]
    fn missing_time_step_is_a_format_error() {
        let snapshot = InMemorySnapshot {
            dimensions: 3,
            coordinates: vec![[0.0; 3]],
            displacements: vec![vec![[0.0; 3]]],
            ..Default::default()
        };
        assert!(snapshot.displacements(1).is_ok());
        assert!(matches!(
            snapshot.displacements(2),
            Err(ReconcileError::Format(_))
        ));
    }
}
