// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 The Brickyard Authors

//! Shared fixtures: an app over an in-memory registry and sample cluster
//! topologies.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use brickyard::{App, MockExecutor, RingAllocator};
use brickyard_core::types::{BrickId, ClusterId, DeviceId, NodeId};
use brickyard_store::{BrickEntry, ClusterEntry, Db, DeviceEntry, NodeEntry, VolumeEntry};

/// An app wired to a mock executor over an in-memory registry.
pub fn test_app() -> (App, Arc<MockExecutor>) {
    let db = Db::open_in_memory().unwrap();
    let executor = Arc::new(MockExecutor::new());
    let app = App::with_db(db, executor.clone(), Arc::new(RingAllocator::new()));
    (app, executor)
}

/// Builds `clusters` clusters of `nodes_per_cluster` nodes carrying
/// `devices_per_node` devices of `disk_size` bytes each.
pub fn setup_topology(
    app: &App,
    clusters: usize,
    nodes_per_cluster: usize,
    devices_per_node: usize,
    disk_size: u64,
) -> Vec<ClusterId> {
    let mut cluster_ids = Vec::new();
    app.db
        .update(|tx| {
            for _ in 0..clusters {
                let mut cluster = ClusterEntry::new();
                for _ in 0..nodes_per_cluster {
                    let mut node = NodeEntry::new(cluster.id, Vec::new(), Vec::new());
                    node.manage_hostnames = vec![format!("{}.manage.example", node.id)];
                    node.storage_hostnames = vec![format!("{}.storage.example", node.id)];
                    for d in 0..devices_per_node {
                        let device = DeviceEntry::new(node.id, format!("/dev/bd{d}"), disk_size);
                        node.device_add(device.id);
                        device.save(tx)?;
                    }
                    cluster.node_add(node.id);
                    node.save(tx)?;
                }
                cluster.save(tx)?;
                cluster_ids.push(cluster.id);
            }
            Ok(())
        })
        .unwrap();
    cluster_ids
}

/// Free size and hosted bricks of every device.
pub fn device_ledgers(app: &App) -> HashMap<DeviceId, (u64, Vec<BrickId>)> {
    app.db
        .view(|tx| {
            let mut out = HashMap::new();
            for id in DeviceEntry::ids(tx)? {
                let device = DeviceEntry::from_id(tx, &id)?;
                out.insert(id, (device.free_size, device.bricks.clone()));
            }
            Ok(out)
        })
        .unwrap()
}

/// Asserts capacity conservation on every device: free size plus the total
/// size of hosted bricks equals the device size.
pub fn assert_ledgers_conserved(app: &App) {
    app.db
        .view(|tx| {
            for id in DeviceEntry::ids(tx)? {
                let device = DeviceEntry::from_id(tx, &id)?;
                let hosted: u64 = device
                    .bricks
                    .iter()
                    .map(|b| BrickEntry::from_id(tx, b).map(|b| b.total_size))
                    .collect::<brickyard_core::error::Result<Vec<_>>>()?
                    .into_iter()
                    .sum();
                assert_eq!(
                    device.free_size + hosted,
                    device.total_size,
                    "ledger of device {id} is off"
                );
            }
            Ok(())
        })
        .unwrap();
}

/// Number of brick records in the registry.
pub fn brick_count(app: &App) -> usize {
    app.db.view(|tx| BrickEntry::ids(tx).map(|ids| ids.len())).unwrap()
}

/// Reloads a volume.
pub fn reload_volume(app: &App, volume: &VolumeEntry) -> VolumeEntry {
    app.db.view(|tx| VolumeEntry::from_id(tx, &volume.id)).unwrap()
}

/// The node hosting each of the volume's bricks, in brick order.
pub fn brick_nodes(app: &App, volume: &VolumeEntry) -> Vec<NodeId> {
    app.db
        .view(|tx| {
            volume.bricks.iter().map(|id| BrickEntry::from_id(tx, id).map(|b| b.node_id)).collect()
        })
        .unwrap()
}

/// Asserts the fault-domain invariant: every consecutive window of
/// `bricks_in_set` bricks covers pairwise distinct nodes.
pub fn assert_fault_domains(app: &App, volume: &VolumeEntry) {
    let width = volume.durability.bricks_in_set();
    let nodes = brick_nodes(app, volume);
    for (set, window) in nodes.chunks(width).enumerate() {
        let mut unique = window.to_vec();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), window.len(), "set {set} shares a node: {window:?}");
    }
}
