//! Mesh-database collaborator: handle allocation, adjacency and tagging.
//!
//! Reconciliation never owns entity memory; it asks the database to create
//! or delete entities and records the handles it gets back. [`MeshDatabase`]
//! is the full surface the algorithms need: entity creation/deletion,
//! tracked grouping containers, adjacency queries at a dimension,
//! connectivity and coordinate access, and a small set of typed attributes.
//!
//! [`InMemoryMeshDb`] implements the trait with forward (element-to-node)
//! and reverse (node-to-element) incidence maps and deterministic,
//! creation-ordered handle allocation.

use crate::error::ReconcileError;
use crate::topology::{EntityHandle, EntityRange};
use hashbrown::HashMap;

/// The three grouping-container flavors the import session creates.
///
/// Blocks carry a material id, node groups a Dirichlet-style boundary id,
/// side groups a Neumann-style boundary id; the id is keyed by kind, so the
/// same external number may name a block and a side group at once.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum GroupKind {
    Block,
    NodeGroup,
    SideGroup,
}

/// Opaque identifier for a grouping container.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct GroupHandle(usize);

/// Operations the reconciliation stages require of a mesh database.
///
/// Any failure maps to [`ReconcileError::Database`] and aborts the current
/// run; there is no per-entity retry.
pub trait MeshDatabase {
    /// Allocates one vertex per coordinate triple; handles are contiguous.
    fn create_nodes(&mut self, coords: &[[f64; 3]]) -> Result<EntityRange, ReconcileError>;

    /// Creates a single element (or face/edge sub-entity) at a dimension.
    fn create_element(
        &mut self,
        dimension: u8,
        connectivity: &[EntityHandle],
    ) -> Result<EntityHandle, ReconcileError>;

    /// Creates a contiguous run of same-arity elements from flat connectivity.
    fn create_elements(
        &mut self,
        dimension: u8,
        nodes_per_element: usize,
        connectivity: &[EntityHandle],
    ) -> Result<EntityRange, ReconcileError>;

    /// Deletes an element, detaching it from every tracked group first.
    fn delete_element(&mut self, element: EntityHandle) -> Result<(), ReconcileError>;

    /// Ordered node list of an element.
    fn connectivity(&self, element: EntityHandle) -> Result<Vec<EntityHandle>, ReconcileError>;

    /// Entities of the given dimension incident to one node, in creation order.
    fn adjacent_entities(
        &self,
        node: EntityHandle,
        dimension: u8,
    ) -> Result<Vec<EntityHandle>, ReconcileError>;

    /// Entities of the given dimension incident to *every* listed node.
    fn adjacent_to_all(
        &self,
        nodes: &[EntityHandle],
        dimension: u8,
    ) -> Result<Vec<EntityHandle>, ReconcileError>;

    /// All vertices in creation order.
    fn nodes(&self) -> Vec<EntityHandle>;

    fn node_coords(&self, node: EntityHandle) -> Result<[f64; 3], ReconcileError>;

    fn set_node_coords(
        &mut self,
        node: EntityHandle,
        coords: [f64; 3],
    ) -> Result<(), ReconcileError>;

    /// Creates a grouping container tagged with its kind-scoped external id.
    fn create_group(
        &mut self,
        kind: GroupKind,
        external_id: i32,
    ) -> Result<GroupHandle, ReconcileError>;

    /// Looks up an existing container by kind and external id.
    fn find_group(&self, kind: GroupKind, external_id: i32) -> Option<GroupHandle>;

    fn add_members(
        &mut self,
        group: GroupHandle,
        members: &[EntityHandle],
    ) -> Result<(), ReconcileError>;

    /// Adds members whose sense is reversed relative to their stored
    /// connectivity. Kept apart from the forward membership because a
    /// reversed member cannot share one handle entry with a forward member
    /// of the same geometric face.
    fn add_reverse_members(
        &mut self,
        group: GroupHandle,
        members: &[EntityHandle],
    ) -> Result<(), ReconcileError>;

    fn group_members(&self, group: GroupHandle) -> Result<Vec<EntityHandle>, ReconcileError>;

    fn group_reverse_members(
        &self,
        group: GroupHandle,
    ) -> Result<Vec<EntityHandle>, ReconcileError>;

    /// Appends to the group's variable-length distribution-factor payload.
    fn append_dist_factors(
        &mut self,
        group: GroupHandle,
        factors: &[f64],
    ) -> Result<(), ReconcileError>;

    fn dist_factors(&self, group: GroupHandle) -> Result<Vec<f64>, ReconcileError>;

    /// Stable external (file) id attribute on a node or element.
    fn set_external_id(
        &mut self,
        entity: EntityHandle,
        id: i64,
    ) -> Result<(), ReconcileError>;

    fn external_id(&self, entity: EntityHandle) -> Result<Option<i64>, ReconcileError>;

    /// Appends a free-form provenance record.
    fn add_text_record(&mut self, record: &str) -> Result<(), ReconcileError>;

    fn text_records(&self) -> Result<Vec<String>, ReconcileError>;
}

#[derive(Debug, Clone)]
struct ElementRecord {
    dimension: u8,
    connectivity: Vec<EntityHandle>,
}

#[derive(Debug, Clone)]
struct GroupRecord {
    kind: GroupKind,
    external_id: i32,
    members: Vec<EntityHandle>,
    reverse_members: Vec<EntityHandle>,
    dist_factors: Vec<f64>,
}

/// Incidence-map mesh database with deterministic handle allocation.
#[derive(Debug, Default)]
pub struct InMemoryMeshDb {
    next_handle: u64,
    node_order: Vec<EntityHandle>,
    coords: HashMap<EntityHandle, [f64; 3]>,
    elements: HashMap<EntityHandle, ElementRecord>,
    /// Reverse incidence: node -> incident elements, creation-ordered.
    support: HashMap<EntityHandle, Vec<EntityHandle>>,
    groups: Vec<GroupRecord>,
    external_ids: HashMap<EntityHandle, i64>,
    text_records: Vec<String>,
}

impl InMemoryMeshDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self) -> Result<EntityHandle, ReconcileError> {
        self.next_handle += 1;
        EntityHandle::new(self.next_handle)
    }

    fn element(&self, handle: EntityHandle) -> Result<&ElementRecord, ReconcileError> {
        self.elements
            .get(&handle)
            .ok_or_else(|| ReconcileError::Database(format!("unknown element handle {handle}")))
    }

    fn group(&self, handle: GroupHandle) -> Result<&GroupRecord, ReconcileError> {
        self.groups
            .get(handle.0)
            .ok_or_else(|| ReconcileError::Database(format!("unknown group handle {}", handle.0)))
    }

    fn group_mut(&mut self, handle: GroupHandle) -> Result<&mut GroupRecord, ReconcileError> {
        self.groups
            .get_mut(handle.0)
            .ok_or_else(|| ReconcileError::Database(format!("unknown group handle {}", handle.0)))
    }

    fn insert_element(
        &mut self,
        dimension: u8,
        connectivity: &[EntityHandle],
    ) -> Result<EntityHandle, ReconcileError> {
        for node in connectivity {
            if !self.coords.contains_key(node) {
                return Err(ReconcileError::Database(format!(
                    "connectivity references unknown node {node}"
                )));
            }
        }
        let handle = self.alloc()?;
        self.elements.insert(
            handle,
            ElementRecord {
                dimension,
                connectivity: connectivity.to_vec(),
            },
        );
        for node in connectivity {
            let incident = self.support.entry(*node).or_default();
            if !incident.contains(&handle) {
                incident.push(handle);
            }
        }
        Ok(handle)
    }
}

impl MeshDatabase for InMemoryMeshDb {
    fn create_nodes(&mut self, coords: &[[f64; 3]]) -> Result<EntityRange, ReconcileError> {
        let start = self.alloc()?;
        self.node_order.push(start);
        self.coords.insert(start, coords[0]);
        for xyz in &coords[1..] {
            let handle = self.alloc()?;
            self.node_order.push(handle);
            self.coords.insert(handle, *xyz);
        }
        Ok(EntityRange::new(start, coords.len()))
    }

    fn create_element(
        &mut self,
        dimension: u8,
        connectivity: &[EntityHandle],
    ) -> Result<EntityHandle, ReconcileError> {
        if connectivity.is_empty() {
            return Err(ReconcileError::Database(
                "cannot create an element with empty connectivity".into(),
            ));
        }
        self.insert_element(dimension, connectivity)
    }

    fn create_elements(
        &mut self,
        dimension: u8,
        nodes_per_element: usize,
        connectivity: &[EntityHandle],
    ) -> Result<EntityRange, ReconcileError> {
        if nodes_per_element == 0 || connectivity.len() % nodes_per_element != 0 {
            return Err(ReconcileError::Database(format!(
                "flat connectivity of length {} is not a multiple of {nodes_per_element}",
                connectivity.len()
            )));
        }
        let count = connectivity.len() / nodes_per_element;
        let mut start = None;
        for conn in connectivity.chunks(nodes_per_element) {
            let handle = self.insert_element(dimension, conn)?;
            start.get_or_insert(handle);
        }
        let start = start.ok_or_else(|| {
            ReconcileError::Database("cannot create an empty element range".into())
        })?;
        Ok(EntityRange::new(start, count))
    }

    fn delete_element(&mut self, element: EntityHandle) -> Result<(), ReconcileError> {
        let record = self.elements.remove(&element).ok_or_else(|| {
            ReconcileError::Database(format!("cannot delete unknown element {element}"))
        })?;
        for node in &record.connectivity {
            if let Some(incident) = self.support.get_mut(node) {
                incident.retain(|&e| e != element);
            }
        }
        for group in &mut self.groups {
            group.members.retain(|&e| e != element);
            group.reverse_members.retain(|&e| e != element);
        }
        self.external_ids.remove(&element);
        Ok(())
    }

    fn connectivity(&self, element: EntityHandle) -> Result<Vec<EntityHandle>, ReconcileError> {
        Ok(self.element(element)?.connectivity.clone())
    }

    fn adjacent_entities(
        &self,
        node: EntityHandle,
        dimension: u8,
    ) -> Result<Vec<EntityHandle>, ReconcileError> {
        let Some(incident) = self.support.get(&node) else {
            return Ok(Vec::new());
        };
        Ok(incident
            .iter()
            .copied()
            .filter(|e| {
                self.elements
                    .get(e)
                    .is_some_and(|record| record.dimension == dimension)
            })
            .collect())
    }

    fn adjacent_to_all(
        &self,
        nodes: &[EntityHandle],
        dimension: u8,
    ) -> Result<Vec<EntityHandle>, ReconcileError> {
        let Some((first, rest)) = nodes.split_first() else {
            return Ok(Vec::new());
        };
        let mut candidates = self.adjacent_entities(*first, dimension)?;
        candidates.retain(|candidate| {
            rest.iter().all(|node| {
                self.support
                    .get(node)
                    .is_some_and(|incident| incident.contains(candidate))
            })
        });
        Ok(candidates)
    }

    fn nodes(&self) -> Vec<EntityHandle> {
        self.node_order.clone()
    }

    fn node_coords(&self, node: EntityHandle) -> Result<[f64; 3], ReconcileError> {
        self.coords
            .get(&node)
            .copied()
            .ok_or_else(|| ReconcileError::Database(format!("unknown node handle {node}")))
    }

    fn set_node_coords(
        &mut self,
        node: EntityHandle,
        coords: [f64; 3],
    ) -> Result<(), ReconcileError> {
        match self.coords.get_mut(&node) {
            Some(slot) => {
                *slot = coords;
                Ok(())
            }
            None => Err(ReconcileError::Database(format!(
                "unknown node handle {node}"
            ))),
        }
    }

    fn create_group(
        &mut self,
        kind: GroupKind,
        external_id: i32,
    ) -> Result<GroupHandle, ReconcileError> {
        self.groups.push(GroupRecord {
            kind,
            external_id,
            members: Vec::new(),
            reverse_members: Vec::new(),
            dist_factors: Vec::new(),
        });
        Ok(GroupHandle(self.groups.len() - 1))
    }

    fn find_group(&self, kind: GroupKind, external_id: i32) -> Option<GroupHandle> {
        self.groups
            .iter()
            .position(|g| g.kind == kind && g.external_id == external_id)
            .map(GroupHandle)
    }

    fn add_members(
        &mut self,
        group: GroupHandle,
        members: &[EntityHandle],
    ) -> Result<(), ReconcileError> {
        self.group_mut(group)?.members.extend_from_slice(members);
        Ok(())
    }

    fn add_reverse_members(
        &mut self,
        group: GroupHandle,
        members: &[EntityHandle],
    ) -> Result<(), ReconcileError> {
        self.group_mut(group)?
            .reverse_members
            .extend_from_slice(members);
        Ok(())
    }

    fn group_members(&self, group: GroupHandle) -> Result<Vec<EntityHandle>, ReconcileError> {
        Ok(self.group(group)?.members.clone())
    }

    fn group_reverse_members(
        &self,
        group: GroupHandle,
    ) -> Result<Vec<EntityHandle>, ReconcileError> {
        Ok(self.group(group)?.reverse_members.clone())
    }

    fn append_dist_factors(
        &mut self,
        group: GroupHandle,
        factors: &[f64],
    ) -> Result<(), ReconcileError> {
        self.group_mut(group)?.dist_factors.extend_from_slice(factors);
        Ok(())
    }

    fn dist_factors(&self, group: GroupHandle) -> Result<Vec<f64>, ReconcileError> {
        Ok(self.group(group)?.dist_factors.clone())
    }

    fn set_external_id(
        &mut self,
        entity: EntityHandle,
        id: i64,
    ) -> Result<(), ReconcileError> {
        self.external_ids.insert(entity, id);
        Ok(())
    }

    fn external_id(&self, entity: EntityHandle) -> Result<Option<i64>, ReconcileError> {
        Ok(self.external_ids.get(&entity).copied())
    }

    fn add_text_record(&mut self, record: &str) -> Result<(), ReconcileError> {
        self.text_records.push(record.to_string());
        Ok(())
    }

    fn text_records(&self) -> Result<Vec<String>, ReconcileError> {
        Ok(self.text_records.clone())
    }
}
