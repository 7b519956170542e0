//! Node correspondence: snapshot node identity to canonical mesh node.
//!
//! Two interchangeable strategies, selected once per run. Identity matching
//! keys canonical nodes by their stable external id tag; proximity matching
//! builds an R-tree over canonical coordinates and takes the
//! minimum-distance node inside a fixed search radius. The resulting map is
//! built fresh per run and read-only afterward.
//!
//! The map is not forced to be injective on the canonical side: a snapshot
//! may legitimately hold duplicate node positions at degenerate seams, so
//! several source nodes may land on one canonical node. Unmatched source
//! nodes are counted, never fatal here; the caller decides what a nonzero
//! miss count means.

use crate::database::MeshDatabase;
use crate::error::ReconcileError;
use crate::topology::EntityHandle;
use hashbrown::HashMap;
use rstar::RTree;
use rstar::primitives::GeomWithData;

/// Farthest distance at which a proximity match is accepted.
pub const DEFAULT_SEARCH_RADIUS: f64 = 1e-1;

/// How snapshot nodes are matched against canonical nodes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchStrategy {
    /// Match by stable external node id.
    Identity,
    /// Match the nearest canonical node within `search_radius`.
    Proximity { search_radius: f64 },
}

impl Default for MatchStrategy {
    fn default() -> Self {
        Self::Identity
    }
}

/// Run-scoped mapping from 0-based source node index to canonical handle.
#[derive(Debug, Default)]
pub struct CorrespondenceMap {
    by_source: HashMap<usize, EntityHandle>,
    matched: usize,
    missed: usize,
}

impl CorrespondenceMap {
    /// Canonical node for a source index, if matched.
    pub fn get(&self, source_index: usize) -> Option<EntityHandle> {
        self.by_source.get(&source_index).copied()
    }

    pub fn matched(&self) -> usize {
        self.matched
    }

    pub fn missed(&self) -> usize {
        self.missed
    }
}

/// Builds the correspondence map for one reconciliation run.
///
/// `source_ids`, when present, supplies the stable external id of each
/// source node; without a node id map, file-local numbering (1-based) is
/// the identity.
pub fn build_correspondence<D: MeshDatabase>(
    db: &D,
    source_coords: &[[f64; 3]],
    source_ids: Option<&[i64]>,
    strategy: MatchStrategy,
) -> Result<CorrespondenceMap, ReconcileError> {
    let map = match strategy {
        MatchStrategy::Identity => match_by_id(db, source_coords.len(), source_ids)?,
        MatchStrategy::Proximity { search_radius } => {
            match_by_proximity(db, source_coords, search_radius)?
        }
    };
    log::info!(
        "node correspondence: {} matched, {} missed ({})",
        map.matched,
        map.missed,
        match strategy {
            MatchStrategy::Identity => "by id".to_string(),
            MatchStrategy::Proximity { search_radius } =>
                format!("by proximity, radius {search_radius}"),
        }
    );
    Ok(map)
}

fn match_by_id<D: MeshDatabase>(
    db: &D,
    source_count: usize,
    source_ids: Option<&[i64]>,
) -> Result<CorrespondenceMap, ReconcileError> {
    let mut canonical: HashMap<i64, EntityHandle> = HashMap::new();
    for node in db.nodes() {
        if let Some(id) = db.external_id(node)? {
            // first creation wins on duplicate ids
            canonical.entry(id).or_insert(node);
        }
    }

    let mut map = CorrespondenceMap::default();
    for i in 0..source_count {
        let id = match source_ids {
            Some(ids) => ids[i],
            None => i as i64 + 1,
        };
        match canonical.get(&id) {
            Some(&handle) => {
                map.by_source.insert(i, handle);
                map.matched += 1;
            }
            None => map.missed += 1,
        }
    }
    Ok(map)
}

fn match_by_proximity<D: MeshDatabase>(
    db: &D,
    source_coords: &[[f64; 3]],
    search_radius: f64,
) -> Result<CorrespondenceMap, ReconcileError> {
    let mut entries = Vec::new();
    for node in db.nodes() {
        entries.push(GeomWithData::new(db.node_coords(node)?, node));
    }
    let tree: RTree<GeomWithData<[f64; 3], EntityHandle>> = RTree::bulk_load(entries);

    let squared_radius = search_radius * search_radius;
    let mut map = CorrespondenceMap::default();
    for (i, point) in source_coords.iter().enumerate() {
        let mut best: Option<(f64, EntityHandle)> = None;
        for entry in tree.locate_within_distance(*point, squared_radius) {
            let dx = entry.geom()[0] - point[0];
            let dy = entry.geom()[1] - point[1];
            let dz = entry.geom()[2] - point[2];
            let dist_sq = dx * dx + dy * dy + dz * dz;
            // strict comparison keeps the first candidate on exact ties
            if best.is_none_or(|(d, _)| dist_sq < d) {
                best = Some((dist_sq, entry.data));
            }
        }
        match best {
            Some((_, handle)) => {
                map.by_source.insert(i, handle);
                map.matched += 1;
            }
            None => map.missed += 1,
        }
    }
    Ok(map)
}
