//! Import orchestration: mesh from snapshot, stage by stage.
//!
//! Stages run batch-sequential — nodes, block headers, elements, node
//! groups, side groups, provenance records — each consuming the full
//! output of the previous one through the [`Session`] value.

use crate::blocks::{read_block_headers, read_elements};
use crate::boundary::{read_node_groups, read_side_groups};
use crate::database::MeshDatabase;
use crate::error::ReconcileError;
use crate::session::{NodeArena, Session};
use crate::snapshot::SnapshotSource;

/// Options for one import run.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Restrict the import to these external block ids; `None` reads all.
    pub blocks: Option<Vec<i32>>,
}

/// Structured result of an import run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ImportReport {
    pub nodes_created: usize,
    pub elements_created: usize,
    /// Face/edge sub-entities created during side-group resolution.
    pub side_entities_created: usize,
    /// Members appended across all node and side groups.
    pub group_members: usize,
    /// Group members skipped because their block is not being read.
    pub members_skipped: usize,
    pub warnings: Vec<String>,
}

/// Imports a mesh snapshot into the database.
pub fn import_snapshot<D: MeshDatabase, S: SnapshotSource>(
    db: &mut D,
    source: &S,
    options: &ImportOptions,
) -> Result<ImportReport, ReconcileError> {
    let header = source.header()?;
    if header.num_nodes == 0 {
        return Err(ReconcileError::Format("snapshot declares no nodes".into()));
    }
    let coords = source.coordinates()?;
    if coords.len() != header.num_nodes {
        return Err(ReconcileError::Format(format!(
            "{} coordinate triples for {} declared nodes",
            coords.len(),
            header.num_nodes
        )));
    }

    let range = db.create_nodes(&coords)?;
    let node_ids = source.node_id_map()?;
    for (i, node) in range.iter().enumerate() {
        let external = match &node_ids {
            Some(ids) => ids[i],
            None => i as i64 + 1,
        };
        db.set_external_id(node, external)?;
    }
    log::info!("created {} node(s)", range.len());

    let mut session = Session::new(header, NodeArena::new(range));
    session.blocks = read_block_headers(source, options.blocks.as_deref())?;

    let elements_created = read_elements(db, source, &mut session)?;
    log::info!(
        "created {elements_created} element(s) across {} block(s)",
        session.blocks.iter().filter(|b| b.reading).count()
    );

    let node_stats = read_node_groups(db, source, &mut session)?;
    let side_stats = read_side_groups(db, source, &mut session)?;

    for record in source.qa_records()? {
        db.add_text_record(&record)?;
    }

    Ok(ImportReport {
        nodes_created: session.nodes.len(),
        elements_created,
        side_entities_created: side_stats.entities_created,
        group_members: node_stats.members + side_stats.members,
        members_skipped: node_stats.skipped + side_stats.skipped,
        warnings: session.warnings,
    })
}
