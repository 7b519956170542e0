//! Boundary resolver: node groups and side groups against created elements.
//!
//! A side group names (element file id, local side) pairs. Resolving a pair
//! means finding the owning block by id-range containment, deriving the
//! ordered side-node list from the per-type side table, and then either
//! reusing an existing sub-entity (matched by cyclic rotation of candidate
//! connectivity, in either orientation) or creating a new one. At most one
//! entity ever exists per distinct geometric face or edge, no matter how
//! many groups reference it or in which order.
//!
//! Distribution-factor alignment is deliberately kept apart from geometry
//! resolution: [`DfCursor`] tracks the scalar array position, including the
//! slots a skipped block's members would have consumed.

use crate::blocks::{Block, find_block};
use crate::database::{GroupKind, MeshDatabase};
use crate::error::ReconcileError;
use crate::session::Session;
use crate::snapshot::SnapshotSource;
use crate::topology::{ElementType, EntityHandle, Sense, SideSpec};

/// Position tracker over a side group's distribution-factor array.
///
/// A group without factors degenerates to a no-op cursor; with factors,
/// every member (and every skipped member) must consume its slot count so
/// later members stay aligned.
#[derive(Debug)]
pub struct DfCursor {
    group_id: i32,
    values: Vec<f64>,
    pos: usize,
}

impl DfCursor {
    pub fn new(group_id: i32, values: Vec<f64>) -> Self {
        Self {
            group_id,
            values,
            pos: 0,
        }
    }

    /// Whether the group carries factors at all.
    pub fn has_factors(&self) -> bool {
        !self.values.is_empty()
    }

    fn advance(&mut self, count: usize) -> Result<usize, ReconcileError> {
        if !self.has_factors() {
            return Ok(self.pos);
        }
        let start = self.pos;
        if start + count > self.values.len() {
            return Err(ReconcileError::Format(format!(
                "side group {}: distribution-factor array exhausted at slot {start} (needed {count} more of {})",
                self.group_id,
                self.values.len()
            )));
        }
        self.pos += count;
        Ok(start)
    }

    /// Consumes slots for a member that produced no entity.
    pub fn skip(&mut self, count: usize) -> Result<(), ReconcileError> {
        self.advance(count).map(|_| ())
    }

    /// Consumes and returns the slice for a resolved member; empty when the
    /// group has no factors.
    pub fn take(&mut self, count: usize) -> Result<&[f64], ReconcileError> {
        if !self.has_factors() {
            return Ok(&[]);
        }
        let start = self.advance(count)?;
        Ok(&self.values[start..start + count])
    }

    /// Slots still unconsumed after every member has been resolved. The
    /// factor array length must equal the sum of per-member slot counts,
    /// so a nonzero leftover means the group was written inconsistently.
    pub fn leftover(&self) -> usize {
        self.values.len() - self.pos
    }
}

/// Outcome of resolving one (element, local side) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideMatch {
    /// The owning block is not being read; only factor slots were consumed.
    Skipped { df_slots: usize },
    Resolved {
        handle: EntityHandle,
        sense: Sense,
        df_slots: usize,
        /// True when no existing sub-entity matched and one was created.
        created: bool,
    },
}

/// Finds an existing sub-entity over `side_nodes` or creates one.
///
/// Candidates are the entities already adjacent to the first side node at
/// the side's dimension. A candidate matches when, rotated to start at the
/// first side node, its node list equals the side list forward (same sense)
/// or reversed (opposite sense). The first match wins; a valid mesh holds
/// at most one true geometric match, which is assumed rather than
/// re-verified here.
pub fn find_or_create_side<D: MeshDatabase>(
    db: &mut D,
    dimension: u8,
    side_nodes: &[EntityHandle],
) -> Result<(EntityHandle, Sense, bool), ReconcileError> {
    let first = side_nodes[0];
    for candidate in db.adjacent_entities(first, dimension)? {
        let mut conn = db.connectivity(candidate)?;
        if conn.len() != side_nodes.len() {
            continue;
        }
        let Some(pos) = conn.iter().position(|&n| n == first) else {
            continue;
        };
        conn.rotate_left(pos);
        if conn == side_nodes {
            // For a 2-node edge the rotation group and the reflection
            // coincide: a nonzero rotation is a reversal.
            let sense = if side_nodes.len() == 2 && pos != 0 {
                Sense::Reverse
            } else {
                Sense::Forward
            };
            return Ok((candidate, sense, false));
        }
        if conn[1..].iter().rev().eq(side_nodes[1..].iter()) {
            return Ok((candidate, Sense::Reverse, false));
        }
    }
    let handle = db.create_element(dimension, side_nodes)?;
    Ok((handle, Sense::Forward, true))
}

/// Resolves one side-group member to an entity, a sense and its
/// distribution-factor slot count.
pub fn resolve_side<D: MeshDatabase>(
    db: &mut D,
    blocks: &[Block],
    group_id: i32,
    element_file_id: i64,
    side: usize,
    spatial_dim: usize,
) -> Result<SideMatch, ReconcileError> {
    let block = find_block(blocks, element_file_id).ok_or(
        ReconcileError::SideElementOutOfRange {
            group: group_id,
            element: element_file_id,
        },
    )?;
    let element_type: ElementType = block.resolved_type()?;
    let df_slots = element_type.dist_factor_slots(side, spatial_dim)?;

    if !block.reading {
        return Ok(SideMatch::Skipped { df_slots });
    }
    let element = block.handle_for_file_id(element_file_id).ok_or_else(|| {
        ReconcileError::Format(format!(
            "block {}: elements were never created",
            block.block_id
        ))
    })?;

    match element_type.side(side, spatial_dim)? {
        SideSpec::Whole(sense) => Ok(SideMatch::Resolved {
            handle: element,
            sense,
            df_slots,
            created: false,
        }),
        SideSpec::Sub { dimension, corners } => {
            let conn = db.connectivity(element)?;
            let side_nodes: Vec<EntityHandle> = corners.iter().map(|&c| conn[c]).collect();
            let (handle, sense, created) = find_or_create_side(db, dimension, &side_nodes)?;
            Ok(SideMatch::Resolved {
                handle,
                sense,
                df_slots,
                created,
            })
        }
    }
}

/// Counts reported by the boundary stages.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryStats {
    /// Members appended across all groups (forward plus reverse).
    pub members: usize,
    /// Sub-entities newly created during side resolution.
    pub entities_created: usize,
    /// Members skipped because their block is not being read.
    pub skipped: usize,
}

/// Reads every node group, filtered to nodes that appear in a read block's
/// connectivity, and appends members and factors to the (possibly
/// pre-existing) grouping container.
pub fn read_node_groups<D: MeshDatabase, S: SnapshotSource>(
    db: &mut D,
    source: &S,
    session: &mut Session,
) -> Result<BoundaryStats, ReconcileError> {
    let mut stats = BoundaryStats::default();
    let group_ids = source.node_group_ids()?;
    for (group_seq, &group_id) in group_ids.iter().enumerate() {
        let data = source.node_group(group_seq)?;
        let has_factors = !data.dist_factors.is_empty();

        let existing = db.find_group(GroupKind::NodeGroup, group_id);
        let existing_members = match existing {
            Some(group) => db.group_members(group)?,
            None => Vec::new(),
        };

        let mut members = Vec::new();
        let mut factors = Vec::new();
        for (j, &file_index) in data.nodes.iter().enumerate() {
            let in_read_block = file_index >= 1
                && session
                    .node_in_read_block
                    .get(file_index as usize - 1)
                    .copied()
                    .ok_or_else(|| {
                        ReconcileError::Format(format!(
                            "node group {group_id}: node index {file_index} out of range"
                        ))
                    })?;
            if !in_read_block {
                stats.skipped += 1;
                continue;
            }
            let handle = session.nodes.checked_handle(group_id, file_index)?;
            if existing_members.contains(&handle) || members.contains(&handle) {
                continue;
            }
            members.push(handle);
            if has_factors {
                factors.push(data.dist_factors[j]);
            }
        }

        if members.is_empty() {
            if !data.nodes.is_empty() {
                session.warn(format!(
                    "node group {group_id}: no members fall inside read blocks"
                ));
            }
            continue;
        }
        let group = match existing {
            Some(group) => group,
            None => db.create_group(GroupKind::NodeGroup, group_id)?,
        };
        stats.members += members.len();
        db.add_members(group, &members)?;
        if has_factors {
            db.append_dist_factors(group, &factors)?;
        }
        log::debug!("node group {group_id}: {} member(s)", members.len());
    }
    Ok(stats)
}

/// Reads every side group, resolving each (element, side) pair to a
/// sub-entity with sense, and appends forward members, reverse members and
/// aligned distribution factors to the grouping container.
pub fn read_side_groups<D: MeshDatabase, S: SnapshotSource>(
    db: &mut D,
    source: &S,
    session: &mut Session,
) -> Result<BoundaryStats, ReconcileError> {
    let mut stats = BoundaryStats::default();
    let spatial_dim = session.header.dimensions;
    let group_ids = source.side_group_ids()?;
    for (group_seq, &group_id) in group_ids.iter().enumerate() {
        let data = source.side_group(group_seq)?;
        let mut cursor = DfCursor::new(group_id, data.dist_factors);

        let mut forward = Vec::new();
        let mut reverse = Vec::new();
        let mut factors = Vec::new();
        for (&element, &side) in data.elements.iter().zip(&data.sides) {
            match resolve_side(db, &session.blocks, group_id, element, side, spatial_dim)? {
                SideMatch::Skipped { df_slots } => {
                    cursor.skip(df_slots)?;
                    stats.skipped += 1;
                }
                SideMatch::Resolved {
                    handle,
                    sense,
                    df_slots,
                    created,
                } => {
                    factors.extend_from_slice(cursor.take(df_slots)?);
                    match sense {
                        Sense::Forward => forward.push(handle),
                        Sense::Reverse => reverse.push(handle),
                    }
                    if created {
                        stats.entities_created += 1;
                    }
                }
            }
        }

        if cursor.has_factors() && cursor.leftover() > 0 {
            session.warn(format!(
                "side group {group_id}: {} trailing distribution-factor slot(s) never consumed",
                cursor.leftover()
            ));
        }

        if forward.is_empty() && reverse.is_empty() {
            if !data.elements.is_empty() {
                session.warn(format!(
                    "side group {group_id}: every member falls in a skipped block"
                ));
            }
            continue;
        }
        let group = match db.find_group(GroupKind::SideGroup, group_id) {
            Some(group) => group,
            None => db.create_group(GroupKind::SideGroup, group_id)?,
        };
        stats.members += forward.len() + reverse.len();
        db.add_members(group, &forward)?;
        db.add_reverse_members(group, &reverse)?;
        db.append_dist_factors(group, &factors)?;
        log::debug!(
            "side group {group_id}: {} forward, {} reverse member(s)",
            forward.len(),
            reverse.len()
        );
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_without_factors_is_a_no_op() {
        let mut cursor = DfCursor::new(1, Vec::new());
        cursor.skip(4).unwrap();
        assert_eq!(cursor.take(4).unwrap(), &[] as &[f64]);
    }

    #[test]
    fn cursor_keeps_alignment_across_skips() {
        let mut cursor = DfCursor::new(1, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        cursor.skip(4).unwrap();
        assert_eq!(cursor.take(2).unwrap(), &[5.0, 6.0]);
        assert!(cursor.take(1).is_err());
    }

    #[test]
    fn cursor_exhaustion_is_a_format_error() {
        let mut cursor = DfCursor::new(9, vec![1.0, 2.0]);
        assert!(matches!(
            cursor.take(3),
            Err(ReconcileError::Format(message)) if message.contains("side group 9")
        ));
    }

    #[test]
    fn cursor_reports_unconsumed_trailing_slots() {
        let mut cursor = DfCursor::new(3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        cursor.take(4).unwrap();
        assert_eq!(cursor.leftover(), 2);
        cursor.take(2).unwrap();
        assert_eq!(cursor.leftover(), 0);
    }
}
