use mesh_reconcile::database::{GroupKind, InMemoryMeshDb, MeshDatabase};
use mesh_reconcile::import::{ImportOptions, import_snapshot};
use mesh_reconcile::snapshot::{InMemoryBlock, InMemorySnapshot, NodeGroupData, SideGroupData};
use mesh_reconcile::topology::EntityHandle;

fn handle(raw: u64) -> EntityHandle {
    EntityHandle::new(raw).unwrap()
}

/// Two unit hexes stacked along z, sharing the mid plane (nodes 5..8).
fn stacked_hex_snapshot() -> InMemorySnapshot {
    let mut coordinates = Vec::new();
    for layer in 0..3 {
        let z = layer as f64;
        coordinates.push([0.0, 0.0, z]);
        coordinates.push([1.0, 0.0, z]);
        coordinates.push([1.0, 1.0, z]);
        coordinates.push([0.0, 1.0, z]);
    }
    InMemorySnapshot {
        dimensions: 3,
        coordinates,
        block_ids: vec![100],
        blocks: vec![InMemoryBlock {
            element_type: "HEX".into(),
            nodes_per_element: 8,
            connectivity: vec![1, 2, 3, 4, 5, 6, 7, 8, 5, 6, 7, 8, 9, 10, 11, 12],
            ..Default::default()
        }],
        ..Default::default()
    }
}

#[test]
fn shared_face_resolves_to_one_entity_with_opposite_senses() {
    let mut snapshot = stacked_hex_snapshot();
    // Top face of the lower hex and bottom face of the upper hex are the
    // same geometric quad, seen with opposite orientation.
    snapshot.side_group_ids = vec![200];
    snapshot.side_groups = vec![SideGroupData {
        elements: vec![1, 2],
        sides: vec![6, 5],
        dist_factors: vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8],
    }];

    let mut db = InMemoryMeshDb::new();
    let report = import_snapshot(&mut db, &snapshot, &ImportOptions::default()).unwrap();
    assert_eq!(report.side_entities_created, 1);
    assert_eq!(report.group_members, 2);

    let group = db.find_group(GroupKind::SideGroup, 200).unwrap();
    let forward = db.group_members(group).unwrap();
    let reverse = db.group_reverse_members(group).unwrap();
    assert_eq!(forward.len(), 1);
    assert_eq!(reverse, forward);

    // The quad was created over the lower hex's top face in its order.
    let quad = forward[0];
    assert_eq!(
        db.connectivity(quad).unwrap(),
        vec![handle(5), handle(6), handle(7), handle(8)]
    );
    assert_eq!(
        db.dist_factors(group).unwrap(),
        vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8]
    );
}

#[test]
fn shared_quad_edge_resolves_once_with_reverse_sense() {
    // Two planar quads sharing the edge (2, 5), traversed in opposite
    // directions by the two owners.
    let snapshot = InMemorySnapshot {
        dimensions: 2,
        coordinates: vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
            [2.0, 1.0, 0.0],
        ],
        block_ids: vec![1],
        blocks: vec![InMemoryBlock {
            element_type: "QUAD".into(),
            nodes_per_element: 4,
            connectivity: vec![1, 2, 5, 4, 2, 3, 6, 5],
            ..Default::default()
        }],
        side_group_ids: vec![30],
        side_groups: vec![SideGroupData {
            elements: vec![1, 2],
            sides: vec![2, 4],
            dist_factors: vec![1.0, 1.0, 2.0, 2.0],
        }],
        ..Default::default()
    };

    let mut db = InMemoryMeshDb::new();
    let report = import_snapshot(&mut db, &snapshot, &ImportOptions::default()).unwrap();
    assert_eq!(report.side_entities_created, 1);

    let group = db.find_group(GroupKind::SideGroup, 30).unwrap();
    let forward = db.group_members(group).unwrap();
    let reverse = db.group_reverse_members(group).unwrap();
    assert_eq!(forward.len(), 1);
    assert_eq!(reverse, forward);
    assert_eq!(
        db.connectivity(forward[0]).unwrap(),
        vec![handle(2), handle(5)]
    );
}

#[test]
fn shell_sides_are_the_whole_element_with_sense() {
    let snapshot = InMemorySnapshot {
        dimensions: 3,
        coordinates: vec![[0.0; 3]; 4],
        block_ids: vec![7],
        blocks: vec![InMemoryBlock {
            element_type: "SHELL".into(),
            nodes_per_element: 4,
            connectivity: vec![1, 2, 3, 4],
            ..Default::default()
        }],
        side_group_ids: vec![40],
        side_groups: vec![SideGroupData {
            elements: vec![1, 1],
            sides: vec![1, 2],
            dist_factors: vec![0.5; 8],
        }],
        ..Default::default()
    };

    let mut db = InMemoryMeshDb::new();
    let report = import_snapshot(&mut db, &snapshot, &ImportOptions::default()).unwrap();
    // No sub-entity is ever created for a whole-element side.
    assert_eq!(report.side_entities_created, 0);

    let block = db.find_group(GroupKind::Block, 7).unwrap();
    let shell = db.group_members(block).unwrap()[0];
    let group = db.find_group(GroupKind::SideGroup, 40).unwrap();
    assert_eq!(db.group_members(group).unwrap(), vec![shell]);
    assert_eq!(db.group_reverse_members(group).unwrap(), vec![shell]);
    assert_eq!(db.dist_factors(group).unwrap(), vec![0.5; 8]);
}

#[test]
fn skipped_block_members_still_consume_factor_slots() {
    let snapshot = InMemorySnapshot {
        dimensions: 3,
        coordinates: vec![[0.0; 3]; 12],
        block_ids: vec![10, 20],
        blocks: vec![
            InMemoryBlock {
                element_type: "HEX".into(),
                nodes_per_element: 8,
                connectivity: vec![1, 2, 3, 4, 5, 6, 7, 8],
                ..Default::default()
            },
            InMemoryBlock {
                element_type: "HEX".into(),
                nodes_per_element: 8,
                connectivity: vec![5, 6, 7, 8, 9, 10, 11, 12],
                ..Default::default()
            },
        ],
        side_group_ids: vec![50],
        side_groups: vec![SideGroupData {
            elements: vec![1, 2],
            sides: vec![6, 6],
            dist_factors: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
        }],
        ..Default::default()
    };

    let mut db = InMemoryMeshDb::new();
    let options = ImportOptions {
        blocks: Some(vec![20]),
    };
    let report = import_snapshot(&mut db, &snapshot, &options).unwrap();
    assert_eq!(report.members_skipped, 1);

    // The member from the skipped block consumed four slots, so the
    // surviving member gets the second half of the factor array.
    let group = db.find_group(GroupKind::SideGroup, 50).unwrap();
    assert_eq!(db.group_members(group).unwrap().len(), 1);
    assert_eq!(db.dist_factors(group).unwrap(), vec![5.0, 6.0, 7.0, 8.0]);
}

#[test]
fn node_groups_filter_to_nodes_in_read_blocks() {
    let mut snapshot = stacked_hex_snapshot();
    snapshot.node_group_ids = vec![300];
    snapshot.node_groups = vec![NodeGroupData {
        nodes: vec![1, 2, 3, 4],
        dist_factors: vec![1.0, 2.0, 3.0, 4.0],
    }];

    let mut db = InMemoryMeshDb::new();
    let report = import_snapshot(&mut db, &snapshot, &ImportOptions::default()).unwrap();
    assert_eq!(report.group_members, 4);

    let group = db.find_group(GroupKind::NodeGroup, 300).unwrap();
    assert_eq!(
        db.group_members(group).unwrap(),
        vec![handle(1), handle(2), handle(3), handle(4)]
    );
    assert_eq!(db.dist_factors(group).unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn node_group_outside_read_blocks_creates_nothing_but_warns() {
    let snapshot = InMemorySnapshot {
        dimensions: 3,
        coordinates: vec![[0.0; 3]; 12],
        block_ids: vec![10, 20],
        blocks: vec![
            InMemoryBlock {
                element_type: "HEX".into(),
                nodes_per_element: 8,
                connectivity: vec![1, 2, 3, 4, 5, 6, 7, 8],
                ..Default::default()
            },
            InMemoryBlock {
                element_type: "HEX".into(),
                nodes_per_element: 8,
                connectivity: vec![5, 6, 7, 8, 9, 10, 11, 12],
                ..Default::default()
            },
        ],
        node_group_ids: vec![60],
        node_groups: vec![NodeGroupData {
            // Nodes 1..4 appear only in the skipped block's connectivity.
            nodes: vec![1, 2, 3, 4],
            dist_factors: Vec::new(),
        }],
        ..Default::default()
    };

    let mut db = InMemoryMeshDb::new();
    let options = ImportOptions {
        blocks: Some(vec![20]),
    };
    let report = import_snapshot(&mut db, &snapshot, &options).unwrap();
    assert!(db.find_group(GroupKind::NodeGroup, 60).is_none());
    assert_eq!(report.members_skipped, 4);
    assert!(report.warnings.iter().any(|w| w.contains("node group 60")));
}

#[test]
fn duplicate_node_group_members_are_appended_once() {
    let mut snapshot = stacked_hex_snapshot();
    snapshot.node_group_ids = vec![70];
    snapshot.node_groups = vec![NodeGroupData {
        nodes: vec![5, 5, 6],
        dist_factors: Vec::new(),
    }];

    let mut db = InMemoryMeshDb::new();
    import_snapshot(&mut db, &snapshot, &ImportOptions::default()).unwrap();
    let group = db.find_group(GroupKind::NodeGroup, 70).unwrap();
    assert_eq!(
        db.group_members(group).unwrap(),
        vec![handle(5), handle(6)]
    );
}

#[test]
fn surplus_factor_slots_are_reported_as_a_warning() {
    let mut snapshot = stacked_hex_snapshot();
    snapshot.side_group_ids = vec![90];
    snapshot.side_groups = vec![SideGroupData {
        elements: vec![1],
        sides: vec![6],
        // Six slots where the single quad member consumes four.
        dist_factors: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
    }];

    let mut db = InMemoryMeshDb::new();
    let report = import_snapshot(&mut db, &snapshot, &ImportOptions::default()).unwrap();
    assert!(
        report
            .warnings
            .iter()
            .any(|w| w.contains("side group 90") && w.contains("2 trailing"))
    );

    let group = db.find_group(GroupKind::SideGroup, 90).unwrap();
    assert_eq!(db.dist_factors(group).unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn exhausted_factor_array_fails_the_import() {
    let mut snapshot = stacked_hex_snapshot();
    snapshot.side_group_ids = vec![80];
    snapshot.side_groups = vec![SideGroupData {
        elements: vec![1, 2],
        sides: vec![6, 5],
        // Four slots for two quad members needing eight.
        dist_factors: vec![1.0, 2.0, 3.0, 4.0],
    }];

    let mut db = InMemoryMeshDb::new();
    let err = import_snapshot(&mut db, &snapshot, &ImportOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        mesh_reconcile::ReconcileError::Format(message) if message.contains("side group 80")
    ));
}
