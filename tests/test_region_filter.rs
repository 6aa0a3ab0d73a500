//! Integration tests for region and map filtering during tracking.
//!
//! Tests cover:
//! - Exclusion maps (full veto, disabled flag)
//! - Inclusion ("AND") maps
//! - Active child regions as selection gates
//! - NOT children in prune and remove mode
//! - Gray-matter run limits and mask thresholds

use fibernav::{
    DirectionField, Mat3, Region, RegionTree, ScalarVolume, SeedSource, StreamlineStore,
    SurfaceMesh, TensorField, Tracker, TrackingConfig, TrackingMaps, Vec3, VoxelGrid,
};

fn grid() -> VoxelGrid {
    VoxelGrid::unit(10, 10, 10).unwrap()
}

/// Principal axis along +x everywhere.
fn straight_field(grid: VoxelGrid) -> DirectionField {
    let n = grid.num_voxels();
    TensorField::new(grid, vec![Mat3::diagonal(1.0, 0.05, 0.05); n], vec![0.9; n])
        .unwrap()
        .into()
}

fn config() -> TrackingConfig {
    TrackingConfig {
        min_fiber_length: 0.0,
        max_fiber_length: 500.0,
        seeds_per_axis: 2,
        ..TrackingConfig::default()
    }
}

/// Seed box spanning x in [2, 4] around y = z = 5.
fn seeded_tree() -> (RegionTree, fibernav::RegionId) {
    let mut tree = RegionTree::new();
    let id = tree.add_root(Region::new_box(Vec3::new(3.0, 5.0, 5.0), Vec3::new(2.0, 2.0, 2.0)));
    (tree, id)
}

#[test]
fn test_full_exclusion_yields_nothing() {
    let grid = grid();
    let field = straight_field(grid);
    let (tree, _) = seeded_tree();
    let exclusion = ScalarVolume::filled(grid, 1.0);
    let config = config();
    let mut store = StreamlineStore::new();

    let report = Tracker::new(&grid, &tree, &config)
        .with_field(&field)
        .with_maps(TrackingMaps {
            exclusion: Some(&exclusion),
            ..TrackingMaps::default()
        })
        .run(&SeedSource::Regions, &mut store)
        .unwrap();

    assert_eq!(report.seeds, 8);
    assert_eq!(report.accepted, 0);
    assert!(store.is_empty());
}

#[test]
fn test_disabled_exclusion_is_ignored() {
    let grid = grid();
    let field = straight_field(grid);
    let (tree, _) = seeded_tree();
    let exclusion = ScalarVolume::filled(grid, 1.0);
    let config = TrackingConfig {
        exclusion_enabled: false,
        ..config()
    };
    let mut store = StreamlineStore::new();

    let report = Tracker::new(&grid, &tree, &config)
        .with_field(&field)
        .with_maps(TrackingMaps {
            exclusion: Some(&exclusion),
            ..TrackingMaps::default()
        })
        .run(&SeedSource::Regions, &mut store)
        .unwrap();
    assert_eq!(report.accepted, 8);
}

#[test]
fn test_empty_inclusion_rejects_all() {
    let grid = grid();
    let field = straight_field(grid);
    let (tree, _) = seeded_tree();
    let inclusion = ScalarVolume::filled(grid, 0.0);
    let config = config();
    let mut store = StreamlineStore::new();

    let report = Tracker::new(&grid, &tree, &config)
        .with_field(&field)
        .with_maps(TrackingMaps {
            inclusion: Some(&inclusion),
            ..TrackingMaps::default()
        })
        .run(&SeedSource::Regions, &mut store)
        .unwrap();

    assert_eq!(report.rejected_filter, 8);
    assert!(store.is_empty());
}

#[test]
fn test_inclusion_slab_is_reached() {
    let grid = grid();
    let field = straight_field(grid);
    let (tree, _) = seeded_tree();
    let inclusion = ScalarVolume::from_fn(grid, |x, _, _| if x == 8 { 1.0 } else { 0.0 });
    let config = config();
    let mut store = StreamlineStore::new();

    let report = Tracker::new(&grid, &tree, &config)
        .with_field(&field)
        .with_maps(TrackingMaps {
            inclusion: Some(&inclusion),
            ..TrackingMaps::default()
        })
        .run(&SeedSource::Regions, &mut store)
        .unwrap();
    assert_eq!(report.accepted, 8);
}

#[test]
fn test_inclusion_behind_mask_barrier_is_not_reached() {
    let grid = grid();
    let field = straight_field(grid);
    let tree = RegionTree::new();
    // The inclusion plane sits exactly where the mask stops the walk
    let mask = ScalarVolume::from_fn(grid, |x, _, _| if x == 8 { 0.0 } else { 0.5 });
    let inclusion = ScalarVolume::from_fn(grid, |x, _, _| if x == 8 { 1.0 } else { 0.0 });
    let config = config();
    let mesh = SurfaceMesh {
        vertices: vec![Vec3::new(5.5, 5.5, 5.5)],
        triangles: Vec::new(),
    };
    let mut store = StreamlineStore::new();

    let report = Tracker::new(&grid, &tree, &config)
        .with_field(&field)
        .with_maps(TrackingMaps {
            mask: Some(&mask),
            inclusion: Some(&inclusion),
            ..TrackingMaps::default()
        })
        .run(&SeedSource::Surface(&mesh), &mut store)
        .unwrap();

    assert_eq!(report.accepted, 0);
    assert_eq!(report.rejected_filter, 1);
    assert!(store.is_empty());
}

#[test]
fn test_active_child_selects_crossing_lines() {
    let grid = grid();
    let field = straight_field(grid);
    let (mut tree, root) = seeded_tree();
    // Only the y = z = 4 row of seeds runs through this child
    tree.add_child(
        root,
        Region::new_box(Vec3::new(7.0, 4.0, 4.0), Vec3::new(2.0, 1.0, 1.0)),
    )
    .unwrap();
    let config = config();
    let mut store = StreamlineStore::new();

    let report = Tracker::new(&grid, &tree, &config)
        .with_field(&field)
        .run(&SeedSource::Regions, &mut store)
        .unwrap();

    assert_eq!(report.accepted, 2);
    assert_eq!(report.rejected_filter, 6);
    for i in 0..store.num_lines() {
        assert!(store.line(i).unwrap().iter().all(|p| p.y == 4.0 && p.z == 4.0));
    }
}

#[test]
fn test_inactive_child_is_ignored() {
    let grid = grid();
    let field = straight_field(grid);
    let (mut tree, root) = seeded_tree();
    tree.add_child(
        root,
        Region::new_box(Vec3::new(7.0, 4.0, 4.0), Vec3::new(2.0, 1.0, 1.0)).with_active(false),
    )
    .unwrap();
    let config = config();
    let mut store = StreamlineStore::new();

    let report = Tracker::new(&grid, &tree, &config)
        .with_field(&field)
        .run(&SeedSource::Regions, &mut store)
        .unwrap();
    assert_eq!(report.accepted, 8);
}

#[test]
fn test_not_prune_cuts_lines_at_the_box() {
    let grid = grid();
    let field = straight_field(grid);
    let (mut tree, root) = seeded_tree();
    tree.add_child(
        root,
        Region::new_box(Vec3::new(7.0, 5.0, 5.0), Vec3::new(2.0, 10.0, 10.0)).with_not(false),
    )
    .unwrap();
    let config = config();
    let mut store = StreamlineStore::new();

    let report = Tracker::new(&grid, &tree, &config)
        .with_field(&field)
        .run(&SeedSource::Regions, &mut store)
        .unwrap();

    assert_eq!(report.accepted, 8);
    let flat = store.points();
    assert!(flat.chunks_exact(3).all(|p| p[0] < 6.0));
}

#[test]
fn test_not_remove_hides_lines() {
    let grid = grid();
    let field = straight_field(grid);
    let (mut tree, root) = seeded_tree();
    tree.add_child(
        root,
        Region::new_box(Vec3::new(7.0, 5.0, 5.0), Vec3::new(2.0, 10.0, 10.0)).with_not(true),
    )
    .unwrap();
    let config = config();
    let mut store = StreamlineStore::new();

    let report = Tracker::new(&grid, &tree, &config)
        .with_field(&field)
        .run(&SeedSource::Regions, &mut store)
        .unwrap();

    assert_eq!(report.rejected_filter, 8);
    assert!(store.is_empty());
}

#[test]
fn test_gray_matter_run_limit() {
    let grid = grid();
    let field = straight_field(grid);
    let tree = RegionTree::new();
    let gray = ScalarVolume::filled(grid, 1.0);
    let config = TrackingConfig {
        gm_max_steps: 3,
        ..config()
    };
    let mesh = SurfaceMesh {
        vertices: vec![Vec3::new(5.5, 5.5, 5.5)],
        triangles: Vec::new(),
    };
    let mut store = StreamlineStore::new();

    Tracker::new(&grid, &tree, &config)
        .with_field(&field)
        .with_maps(TrackingMaps {
            gray_matter: Some(&gray),
            ..TrackingMaps::default()
        })
        .run(&SeedSource::Surface(&mesh), &mut store)
        .unwrap();

    // Seed counts as the first gray-matter step; the fourth one stops the walk
    assert_eq!(store.line_counts(), &[2, 2]);
}

#[test]
fn test_mask_threshold_stops_walk() {
    let grid = grid();
    let field = straight_field(grid);
    let tree = RegionTree::new();
    let mask = ScalarVolume::from_fn(grid, |x, _, _| if x < 7 { 0.5 } else { 0.0 });
    let config = config();
    let mesh = SurfaceMesh {
        vertices: vec![Vec3::new(5.5, 5.5, 5.5)],
        triangles: Vec::new(),
    };
    let mut store = StreamlineStore::new();

    Tracker::new(&grid, &tree, &config)
        .with_field(&field)
        .with_maps(TrackingMaps {
            mask: Some(&mask),
            ..TrackingMaps::default()
        })
        .run(&SeedSource::Surface(&mesh), &mut store)
        .unwrap();

    assert_eq!(store.line_counts(), &[1, 5]);
}
