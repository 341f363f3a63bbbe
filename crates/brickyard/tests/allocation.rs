// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 The Brickyard Authors

//! End-to-end allocation scenarios.

mod common;

use brickyard::{alloc_bricks_in_cluster, SnapshotRequest, VolumeCreateRequest};
use brickyard_core::durability::Durability;
use brickyard_core::error::Error;
use brickyard_core::types::{BrickId, GB, TB};
use brickyard_store::{listing, BrickEntry, ClusterEntry, VolumeEntry};

use common::{
    assert_fault_domains, assert_ledgers_conserved, brick_count, device_ledgers, setup_topology,
    test_app,
};

#[tokio::test]
async fn test_clean_create_replicate_volume() {
    let (app, executor) = test_app();
    setup_topology(&app, 1, 3, 4, 6 * TB);

    let req = VolumeCreateRequest {
        size_gb: 1024,
        durability: Durability::Replicate { replica: 3 },
        ..Default::default()
    };
    let volume = app.create_volume(&req).await.unwrap();

    assert_eq!(volume.bricks.len(), 3);
    assert_fault_domains(&app, &volume);
    assert_ledgers_conserved(&app);

    // The registry advertises exactly this volume.
    let listed = app.db.view(|tx| listing::list_complete_volumes(tx)).unwrap();
    assert_eq!(listed, vec![volume.id]);

    // Every brick was materialized and the volume created over them.
    assert_eq!(executor.created_bricks().len(), 3);
    let live = executor.live_bricks(&volume.name).unwrap();
    assert_eq!(live.len(), 3);
    for name in &live {
        assert!(name.contains(".storage.example:/var/lib/brickyard/mounts/"), "{name}");
    }

    // The persisted volume matches what the call returned.
    let stored = app.db.view(|tx| VolumeEntry::from_id(tx, &volume.id)).unwrap();
    assert_eq!(stored.bricks, volume.bricks);
    assert_eq!(stored.cluster_id, volume.cluster_id);
}

#[tokio::test]
async fn test_multi_set_allocation_spreads_every_set() {
    let (app, _executor) = test_app();
    setup_topology(&app, 1, 4, 2, 6 * TB);

    // 5 TB exceeds the maximum brick size, so the schedule starts at two
    // sets of 2.5 TB bricks.
    let req = VolumeCreateRequest {
        size_gb: 5000,
        durability: Durability::Replicate { replica: 2 },
        ..Default::default()
    };
    let volume = app.create_volume(&req).await.unwrap();

    assert_eq!(volume.bricks.len(), 4, "two sets of two replicas");
    assert_fault_domains(&app, &volume);
    assert_ledgers_conserved(&app);
}

#[tokio::test]
async fn test_snapshot_factor_inflates_reservation() {
    let (app, _executor) = test_app();
    setup_topology(&app, 1, 3, 1, 6 * TB);

    let req = VolumeCreateRequest {
        size_gb: 100,
        durability: Durability::Replicate { replica: 3 },
        snapshot: SnapshotRequest { enable: true, factor: Some(1.5) },
        ..Default::default()
    };
    let volume = app.create_volume(&req).await.unwrap();

    app.db
        .view(|tx| {
            for id in &volume.bricks {
                let brick = BrickEntry::from_id(tx, id)?;
                assert_eq!(brick.size, 100 * GB);
                assert_eq!(brick.total_size, 150 * GB);
            }
            Ok(())
        })
        .unwrap();
    assert_ledgers_conserved(&app);
}

#[tokio::test]
async fn test_size_shrink_retry_lands_on_third_candidate() {
    let (app, _executor) = test_app();
    // 400 GB devices cannot take the 1024 GB or 512 GB candidates; the
    // third candidate (four sets of 256 GB bricks) fits.
    setup_topology(&app, 1, 3, 4, 400 * GB);

    let req = VolumeCreateRequest {
        size_gb: 1024,
        durability: Durability::Replicate { replica: 3 },
        ..Default::default()
    };
    let volume = app.create_volume(&req).await.unwrap();

    assert_eq!(volume.bricks.len(), 12, "four sets of three replicas");
    app.db
        .view(|tx| {
            for id in &volume.bricks {
                assert_eq!(BrickEntry::from_id(tx, id)?.size, 256 * GB);
            }
            Ok(())
        })
        .unwrap();

    // The failed attempts left nothing behind.
    assert_eq!(brick_count(&app), 12);
    assert_fault_domains(&app, &volume);
    assert_ledgers_conserved(&app);
}

#[tokio::test]
async fn test_brick_ceiling_refused_without_persistence() {
    let (app, _executor) = test_app();
    let clusters = setup_topology(&app, 1, 3, 4, 6 * TB);
    let before = device_ledgers(&app);

    // A volume two bricks under the ceiling; one more replica-3 set would
    // cross it.
    let mut volume = VolumeEntry::new(
        "vol_full".into(),
        1024 * GB,
        Durability::Replicate { replica: 3 },
        1.0,
        0,
    );
    for _ in 0..30 {
        volume.brick_add(BrickId::generate());
    }

    let err =
        alloc_bricks_in_cluster(&app.db, app.allocator(), &clusters[0], &mut volume, 1024)
            .await
            .unwrap_err();
    assert!(matches!(err, Error::MaxBricks));

    assert_eq!(brick_count(&app), 0);
    assert_eq!(device_ledgers(&app), before);
}

#[tokio::test]
async fn test_request_larger_than_cluster_fails_cleanly() {
    let (app, _executor) = test_app();
    setup_topology(&app, 1, 3, 2, 100 * GB);

    let req = VolumeCreateRequest {
        size_gb: 10_000,
        durability: Durability::Replicate { replica: 3 },
        ..Default::default()
    };
    let err = app.create_volume(&req).await.unwrap_err();
    // The schedule shrinks until the brick ceiling cuts the search off;
    // whichever refusal ends it, nothing may have been persisted.
    assert!(err.is_cluster_retryable(), "got {err:?}");
    assert_eq!(brick_count(&app), 0);
    assert_eq!(device_ledgers(&app).len(), 6);
    assert_ledgers_conserved(&app);
}

#[tokio::test]
async fn test_create_tries_next_cluster() {
    let (app, _executor) = test_app();
    // First cluster is far too small, second one fits.
    let small = setup_topology(&app, 1, 3, 1, 10 * GB);
    let big = setup_topology(&app, 1, 3, 4, 6 * TB);

    let req = VolumeCreateRequest {
        size_gb: 100,
        durability: Durability::Replicate { replica: 3 },
        clusters: vec![small[0], big[0]],
        ..Default::default()
    };
    let volume = app.create_volume(&req).await.unwrap();
    assert_eq!(volume.cluster_id, Some(big[0]));

    let registered = app.db.view(|tx| ClusterEntry::from_id(tx, &big[0])).unwrap();
    assert_eq!(registered.volumes, vec![volume.id]);
    let untouched = app.db.view(|tx| ClusterEntry::from_id(tx, &small[0])).unwrap();
    assert!(untouched.volumes.is_empty());
}

#[tokio::test]
async fn test_failed_materialization_unwinds_everything() {
    let (app, executor) = test_app();
    setup_topology(&app, 1, 3, 4, 6 * TB);
    let before = device_ledgers(&app);
    executor.fail_create_bricks();

    let req = VolumeCreateRequest {
        size_gb: 1024,
        durability: Durability::Replicate { replica: 3 },
        ..Default::default()
    };
    let err = app.create_volume(&req).await.unwrap_err();
    assert!(matches!(err, Error::External(_)));

    // Bricks, volume, cluster registration and pending markers are gone.
    assert_eq!(brick_count(&app), 0);
    assert_eq!(device_ledgers(&app), before);
    assert!(app.db.view(|tx| listing::list_complete_volumes(tx)).unwrap().is_empty());
    assert!(app.db.view(|tx| brickyard_store::pending::map(tx)).unwrap().is_empty());
    let cluster_id = app.db.view(ClusterEntry::ids).unwrap()[0];
    let cluster = app.db.view(|tx| ClusterEntry::from_id(tx, &cluster_id)).unwrap();
    assert!(cluster.volumes.is_empty());
}
