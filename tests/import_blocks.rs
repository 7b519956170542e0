use mesh_reconcile::database::{GroupKind, InMemoryMeshDb, MeshDatabase};
use mesh_reconcile::import::{ImportOptions, import_snapshot};
use mesh_reconcile::snapshot::{InMemoryBlock, InMemorySnapshot};
use mesh_reconcile::topology::EntityHandle;
use mesh_reconcile::ReconcileError;

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
fn block_import_preserves_connectivity_order() {
    let mut db = InMemoryMeshDb::new();
    let report =
        import_snapshot(&mut db, &stacked_hex_snapshot(), &ImportOptions::default()).unwrap();
    assert_eq!(report.nodes_created, 12);
    assert_eq!(report.elements_created, 2);

    let group = db.find_group(GroupKind::Block, 100).unwrap();
    let elements = db.group_members(group).unwrap();
    assert_eq!(elements.len(), 2);

    // Nodes take handles 1..12 in file order; connectivity maps straight
    // through since HEX needs no reordering.
    let expected_a: Vec<_> = (1..=8).map(handle).collect();
    let expected_b: Vec<_> = (5..=12).map(handle).collect();
    assert_eq!(db.connectivity(elements[0]).unwrap(), expected_a);
    assert_eq!(db.connectivity(elements[1]).unwrap(), expected_b);
}

#[test]
fn element_external_ids_default_to_file_position() {
    let mut db = InMemoryMeshDb::new();
    import_snapshot(&mut db, &stacked_hex_snapshot(), &ImportOptions::default()).unwrap();
    let group = db.find_group(GroupKind::Block, 100).unwrap();
    let elements = db.group_members(group).unwrap();
    assert_eq!(db.external_id(elements[0]).unwrap(), Some(1));
    assert_eq!(db.external_id(elements[1]).unwrap(), Some(2));
}

#[test]
fn element_id_map_indexes_by_absolute_file_position() {
    let mut snapshot = stacked_hex_snapshot();
    snapshot.element_id_map = Some(vec![700, 800]);
    let mut db = InMemoryMeshDb::new();
    import_snapshot(&mut db, &snapshot, &ImportOptions::default()).unwrap();
    let group = db.find_group(GroupKind::Block, 100).unwrap();
    let elements = db.group_members(group).unwrap();
    assert_eq!(db.external_id(elements[0]).unwrap(), Some(700));
    assert_eq!(db.external_id(elements[1]).unwrap(), Some(800));
}

#[test]
fn quadratic_hex_connectivity_is_permuted_to_canonical_order() {
    let snapshot = InMemorySnapshot {
        dimensions: 3,
        coordinates: vec![[0.0; 3]; 27],
        block_ids: vec![1],
        blocks: vec![InMemoryBlock {
            element_type: "HEX27".into(),
            nodes_per_element: 27,
            connectivity: (1..=27).collect(),
            ..Default::default()
        }],
        ..Default::default()
    };
    let mut db = InMemoryMeshDb::new();
    import_snapshot(&mut db, &snapshot, &ImportOptions::default()).unwrap();

    let group = db.find_group(GroupKind::Block, 1).unwrap();
    let element = db.group_members(group).unwrap()[0];
    let conn = db.connectivity(element).unwrap();

    // Corner and edge nodes stay in place; the body-center node (file
    // position 21) moves to the end, behind the six face centers.
    let mut expected: Vec<_> = (1..=20).map(handle).collect();
    expected.extend((22..=27).map(handle));
    expected.push(handle(21));
    assert_eq!(conn, expected);
}

#[test]
fn out_of_range_connectivity_names_the_block() {
    let mut snapshot = stacked_hex_snapshot();
    snapshot.blocks[0].connectivity[3] = 99;
    let mut db = InMemoryMeshDb::new();
    let err = import_snapshot(&mut db, &snapshot, &ImportOptions::default()).unwrap_err();
    assert_eq!(
        err,
        ReconcileError::BadConnectivity {
            block: 100,
            index: 99,
            limit: 12,
        }
    );
}

#[test]
fn subset_import_skips_unlisted_blocks_but_keeps_id_ranges() {
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
        ..Default::default()
    };
    let mut db = InMemoryMeshDb::new();
    let options = ImportOptions {
        blocks: Some(vec![20]),
    };
    let report = import_snapshot(&mut db, &snapshot, &options).unwrap();
    assert_eq!(report.elements_created, 1);
    assert!(db.find_group(GroupKind::Block, 10).is_none());
    assert!(db.find_group(GroupKind::Block, 20).is_some());
}

#[test]
fn unknown_element_type_tag_is_rejected() {
    let mut snapshot = stacked_hex_snapshot();
    snapshot.blocks[0].element_type = "POLYGON".into();
    let mut db = InMemoryMeshDb::new();
    let err = import_snapshot(&mut db, &snapshot, &ImportOptions::default()).unwrap_err();
    assert_eq!(err, ReconcileError::UnknownElementType("POLYGON".into()));
}

#[test]
fn snapshot_without_nodes_is_rejected() {
    let snapshot = InMemorySnapshot {
        dimensions: 3,
        ..Default::default()
    };
    let mut db = InMemoryMeshDb::new();
    assert!(matches!(
        import_snapshot(&mut db, &snapshot, &ImportOptions::default()),
        Err(ReconcileError::Format(_))
    ));
}

#[test]
fn provenance_records_land_in_the_database() {
    let mut snapshot = stacked_hex_snapshot();
    snapshot.qa_records = vec!["solver 4.2 2026-01-15".into()];
    let mut db = InMemoryMeshDb::new();
    import_snapshot(&mut db, &snapshot, &ImportOptions::default()).unwrap();
    assert_eq!(
        db.text_records().unwrap(),
        vec!["solver 4.2 2026-01-15".to_string()]
    );
}

#[test]
fn repeated_import_allocates_identical_handles() {
    let snapshot = stacked_hex_snapshot();
    let mut first = InMemoryMeshDb::new();
    let mut second = InMemoryMeshDb::new();
    import_snapshot(&mut first, &snapshot, &ImportOptions::default()).unwrap();
    import_snapshot(&mut second, &snapshot, &ImportOptions::default()).unwrap();

    let group_a = first.find_group(GroupKind::Block, 100).unwrap();
    let group_b = second.find_group(GroupKind::Block, 100).unwrap();
    assert_eq!(
        first.group_members(group_a).unwrap(),
        second.group_members(group_b).unwrap()
    );
    assert_eq!(first.nodes(), second.nodes());
}
