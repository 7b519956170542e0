//! Block builder: typed element ranges from flat snapshot connectivity.
//!
//! Blocks arrive as headers first (counts only) and connectivity later.
//! File-local element ids are contiguous and ascending across blocks in
//! sequence order, so range containment identifies the owning block for any
//! element id — including ids that fall in a block that is *not* being
//! read, which later stages must treat as a defined skip rather than a
//! false match.

use crate::database::{GroupKind, MeshDatabase};
use crate::error::ReconcileError;
use crate::session::Session;
use crate::snapshot::SnapshotSource;
use crate::topology::{ElementType, EntityHandle};

/// One element block of the snapshot being imported.
#[derive(Debug, Clone)]
pub struct Block {
    /// External block identifier.
    pub block_id: i32,
    /// 0-based position in the snapshot's block sequence.
    pub block_seq: usize,
    /// Filled in lazily when connectivity (or the type tag) is read.
    pub element_type: Option<ElementType>,
    /// First file-local element id owned by this block.
    pub start_file_id: i64,
    /// First canonical handle, once elements exist.
    pub start_handle: Option<EntityHandle>,
    pub num_elements: usize,
    /// False when the block was excluded by a subset import; its id range
    /// is still recorded.
    pub reading: bool,
}

impl Block {
    /// Whether a file-local element id falls inside this block's range.
    pub fn contains_file_id(&self, file_id: i64) -> bool {
        file_id >= self.start_file_id && file_id < self.start_file_id + self.num_elements as i64
    }

    /// Canonical handle of a file-local element id, once the block's
    /// elements have been created.
    pub fn handle_for_file_id(&self, file_id: i64) -> Option<EntityHandle> {
        if !self.contains_file_id(file_id) {
            return None;
        }
        let offset = (file_id - self.start_file_id) as u64;
        self.start_handle
            .and_then(|start| EntityHandle::new(start.get() + offset).ok())
    }

    /// Type of this block, which must have been resolved by the block
    /// builder before any stage that enumerates sides runs.
    pub fn resolved_type(&self) -> Result<ElementType, ReconcileError> {
        self.element_type.ok_or_else(|| {
            ReconcileError::Format(format!(
                "block {} has no resolved element type",
                self.block_id
            ))
        })
    }
}

/// Reads block headers and assigns contiguous file-id ranges.
///
/// When `subset` is given, blocks whose external id is not listed are
/// marked not-reading; their ranges still participate in id containment.
pub fn read_block_headers<S: SnapshotSource>(
    source: &S,
    subset: Option<&[i32]>,
) -> Result<Vec<Block>, ReconcileError> {
    let block_ids = source.block_ids()?;
    let mut blocks = Vec::with_capacity(block_ids.len());
    let mut next_file_id = 1i64;
    for (block_seq, block_id) in block_ids.into_iter().enumerate() {
        let header = source.block_header(block_seq)?;
        let reading = subset.is_none_or(|ids| ids.contains(&block_id));
        blocks.push(Block {
            block_id,
            block_seq,
            element_type: None,
            start_file_id: next_file_id,
            start_handle: None,
            num_elements: header.num_elements,
            reading,
        });
        next_file_id += header.num_elements as i64;
    }
    Ok(blocks)
}

/// Locates the block owning a file-local element id by range containment.
///
/// Ranges are disjoint and ascending, so a binary search on the start id
/// suffices.
pub fn find_block(blocks: &[Block], file_id: i64) -> Option<&Block> {
    let idx = blocks.partition_point(|b| b.start_file_id <= file_id);
    let block = blocks.get(idx.checked_sub(1)?)?;
    block.contains_file_id(file_id).then_some(block)
}

/// Reads connectivity for every block marked reading, creates its element
/// range and grouping container, and resolves element types for the
/// remaining blocks so side resolution can account for skipped members.
///
/// Returns the number of elements created.
pub fn read_elements<D: MeshDatabase, S: SnapshotSource>(
    db: &mut D,
    source: &S,
    session: &mut Session,
) -> Result<usize, ReconcileError> {
    let element_id_map = source.element_id_map()?;
    let mut created = 0usize;

    for block_idx in 0..session.blocks.len() {
        let (block_id, block_seq, num_elements, reading) = {
            let block = &session.blocks[block_idx];
            (
                block.block_id,
                block.block_seq,
                block.num_elements,
                block.reading,
            )
        };

        if !reading {
            // The skipped block's type still matters for distribution-factor
            // alignment during side resolution.
            let tag = source.block_element_type(block_seq)?;
            session.blocks[block_idx].element_type = Some(ElementType::from_tag(&tag)?);
            log::debug!("block {block_id}: skipped ({num_elements} elements)");
            continue;
        }

        let data = source.block_connectivity(block_seq)?;
        let element_type = ElementType::from_tag(&data.element_type)?;
        let nodes_per_element = element_type.nodes_per_element();
        if data.connectivity.len() != num_elements * nodes_per_element {
            return Err(ReconcileError::Format(format!(
                "block {block_id}: {} connectivity entries for {num_elements} {:?} elements",
                data.connectivity.len(),
                element_type
            )));
        }

        // Bounds-check every index before offsetting; mark the bitmap used
        // by node-group filtering.
        let mut handles = Vec::with_capacity(data.connectivity.len());
        for &index in &data.connectivity {
            let handle = session.nodes.checked_handle(block_id, index)?;
            session.node_in_read_block[index as usize - 1] = true;
            handles.push(handle);
        }

        // Permute each element into canonical node order.
        if let Some(perm) = element_type.canonical_permutation() {
            for conn in handles.chunks_mut(nodes_per_element) {
                let source_order: Vec<EntityHandle> = conn.to_vec();
                for (slot, &from) in conn.iter_mut().zip(perm) {
                    *slot = source_order[from];
                }
            }
        }

        let range = db.create_elements(element_type.dimension(), nodes_per_element, &handles)?;
        let start_file_id = session.blocks[block_idx].start_file_id;
        for (i, element) in range.iter().enumerate() {
            let external = match &element_id_map {
                Some(ids) => ids[(start_file_id - 1) as usize + i],
                None => start_file_id + i as i64,
            };
            db.set_external_id(element, external)?;
        }

        let group = db.create_group(GroupKind::Block, block_id)?;
        let members: Vec<EntityHandle> = range.iter().collect();
        db.add_members(group, &members)?;

        let block = &mut session.blocks[block_idx];
        block.element_type = Some(element_type);
        block.start_handle = Some(range.start());
        created += range.len();
        log::debug!(
            "block {block_id}: created {} {element_type:?} elements",
            range.len()
        );
    }

    Ok(created)
}
