//! Snapshot reconciler: coordinate replay and dead-element pruning.
//!
//! Reconciliation matches an existing canonical mesh against a later
//! snapshot of the same model under independent numbering. Per selected
//! time step it replays node coordinates (original plus displacement)
//! through the correspondence map, then prunes elements the snapshot flags
//! dead, locating each by the adjacency intersection of its resolved node
//! set. Stages run strictly in sequence; a failed run leaves already
//! performed updates in place.

use crate::blocks::read_block_headers;
use crate::correspondence::{MatchStrategy, build_correspondence};
use crate::database::MeshDatabase;
use crate::error::ReconcileError;
use crate::snapshot::SnapshotSource;
use crate::topology::{ElementType, EntityHandle};
use itertools::izip;

/// How replayed coordinates combine with the canonical mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// Canonical coordinates become snapshot original + displacement.
    #[default]
    Replace,
    /// Displacement is added onto the current canonical coordinates.
    Accumulate,
}

/// Options for one reconciliation run.
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// 1-based snapshot time step.
    pub time_step: usize,
    pub mode: UpdateMode,
    pub strategy: MatchStrategy,
    /// Restrict dead-element pruning to these external block ids.
    pub blocks: Option<Vec<i32>>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            time_step: 1,
            mode: UpdateMode::default(),
            strategy: MatchStrategy::default(),
            blocks: None,
        }
    }
}

/// Structured result of a reconciliation run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReconcileReport {
    pub nodes_matched: usize,
    pub nodes_unmatched: usize,
    /// Matched nodes whose coordinates were written back.
    pub nodes_moved: usize,
    pub elements_deleted: usize,
    pub warnings: Vec<String>,
}

/// Reconciles the canonical mesh in `db` against a later snapshot.
pub fn reconcile_snapshot<D: MeshDatabase, S: SnapshotSource>(
    db: &mut D,
    source: &S,
    options: &ReconcileOptions,
) -> Result<ReconcileReport, ReconcileError> {
    let header = source.header()?;
    let available = source.time_steps()?;
    if options.time_step == 0 || options.time_step > available {
        return Err(ReconcileError::TimeStepOutOfRange {
            requested: options.time_step,
            available,
        });
    }

    let original = source.coordinates()?;
    if original.len() != header.num_nodes {
        return Err(ReconcileError::Format(format!(
            "{} coordinate triples for {} declared nodes",
            original.len(),
            header.num_nodes
        )));
    }
    let source_ids = source.node_id_map()?;

    let correspondence =
        build_correspondence(db, &original, source_ids.as_deref(), options.strategy)?;

    let mut report = ReconcileReport {
        nodes_matched: correspondence.matched(),
        nodes_unmatched: correspondence.missed(),
        ..Default::default()
    };

    // Coordinate replay.
    let displacements = source.displacements(options.time_step)?;
    let mut max_magnitude = 0f64;
    let mut total_magnitude = 0f64;
    for (i, orig, disp) in izip!(0.., &original, &displacements) {
        let Some(node) = correspondence.get(i) else {
            log::debug!(
                "source node {} has no canonical match at ({}, {}, {})",
                i + 1,
                orig[0],
                orig[1],
                orig[2]
            );
            continue;
        };
        let updated = match options.mode {
            UpdateMode::Replace => [orig[0] + disp[0], orig[1] + disp[1], orig[2] + disp[2]],
            UpdateMode::Accumulate => {
                let current = db.node_coords(node)?;
                [
                    current[0] + disp[0],
                    current[1] + disp[1],
                    current[2] + disp[2],
                ]
            }
        };
        db.set_node_coords(node, updated)?;
        report.nodes_moved += 1;
        let magnitude = (disp[0] * disp[0] + disp[1] * disp[1] + disp[2] * disp[2]).sqrt();
        max_magnitude = max_magnitude.max(magnitude);
        total_magnitude += magnitude;
    }
    if report.nodes_unmatched > 0 {
        report.warnings.push(format!(
            "{} source node(s) had no canonical match",
            report.nodes_unmatched
        ));
    }
    if report.nodes_moved > 0 {
        log::info!(
            "coordinate replay: {} node(s) updated, displacement max {:.6e}, mean {:.6e}",
            report.nodes_moved,
            max_magnitude,
            total_magnitude / report.nodes_moved as f64
        );
    }

    prune_dead_elements(db, source, options, &correspondence, header.num_nodes, &mut report)?;
    Ok(report)
}

fn prune_dead_elements<D: MeshDatabase, S: SnapshotSource>(
    db: &mut D,
    source: &S,
    options: &ReconcileOptions,
    correspondence: &crate::correspondence::CorrespondenceMap,
    num_nodes: usize,
    report: &mut ReconcileReport,
) -> Result<(), ReconcileError> {
    let blocks = read_block_headers(source, options.blocks.as_deref())?;
    let mut first_failure: Option<(i64, i64)> = None;

    for block in &blocks {
        if !block.reading {
            continue;
        }
        let Some(flags) = source.liveness(options.time_step, block.block_seq)? else {
            continue;
        };
        if flags.len() != block.num_elements {
            return Err(ReconcileError::Format(format!(
                "block {}: {} liveness flags for {} elements",
                block.block_id,
                flags.len(),
                block.num_elements
            )));
        }

        let data = source.block_connectivity(block.block_seq)?;
        let element_type = ElementType::from_tag(&data.element_type)?;
        let nodes_per_element = element_type.nodes_per_element();
        if data.connectivity.len() != block.num_elements * nodes_per_element {
            return Err(ReconcileError::Format(format!(
                "block {}: {} connectivity entries for {} {:?} elements",
                block.block_id,
                data.connectivity.len(),
                block.num_elements,
                element_type
            )));
        }

        let mut dead_in_block = 0usize;
        for (j, conn) in data.connectivity.chunks(nodes_per_element).enumerate() {
            // alive flags are exactly 1; anything else marks a dead element
            if flags[j] == 1.0 {
                continue;
            }
            dead_in_block += 1;
            let element_file_id = block.start_file_id + j as i64;

            let mut node_set: Vec<EntityHandle> = Vec::with_capacity(nodes_per_element);
            let mut unresolved = None;
            for &index in conn {
                // 1-based file indices; an escape from the source node range
                // is corruption, not a correspondence miss.
                if index < 1 || index as usize > num_nodes {
                    return Err(ReconcileError::BadConnectivity {
                        block: block.block_id,
                        index,
                        limit: num_nodes,
                    });
                }
                match correspondence.get(index as usize - 1) {
                    Some(handle) => node_set.push(handle),
                    None => {
                        unresolved = Some(index);
                        break;
                    }
                }
            }
            if let Some(index) = unresolved {
                report.warnings.push(format!(
                    "dead element {element_file_id}: source node {index} has no canonical match; element left in place"
                ));
                first_failure.get_or_insert((element_file_id, index));
                continue;
            }

            let candidates = db.adjacent_to_all(&node_set, element_type.dimension())?;
            match candidates.as_slice() {
                [element] => {
                    db.delete_element(*element)?;
                    report.elements_deleted += 1;
                }
                [] => {
                    return Err(ReconcileError::NoMatch {
                        block: block.block_id,
                        element: element_file_id,
                    });
                }
                many => {
                    return Err(ReconcileError::AmbiguousMatch {
                        block: block.block_id,
                        element: element_file_id,
                        count: many.len(),
                    });
                }
            }
        }
        log::info!(
            "block {}: {dead_in_block}/{} dead element(s)",
            block.block_id,
            block.num_elements
        );
    }

    // A dead element that could not be resolved means the snapshots do not
    // describe the same mesh; the run fails after the full sweep so every
    // offender is reported.
    if let Some((element, node)) = first_failure {
        return Err(ReconcileError::UnresolvedCorrespondence { element, node });
    }
    log::info!("pruned {} dead element(s)", report.elements_deleted);
    Ok(())
}
