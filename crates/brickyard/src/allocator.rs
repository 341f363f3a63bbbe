// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 The Brickyard Authors

//! The allocator seam and the default ring allocator.

use brickyard_core::error::Result;
use brickyard_core::types::{BrickId, ClusterId};
use brickyard_placement::ring::{ordered_candidates, RingCandidate};
use brickyard_placement::stream::{device_channel, DeviceStream};
use brickyard_store::{ClusterEntry, Db, NodeEntry};
use tracing::debug;

/// Source of candidate devices for brick placement.
///
/// An allocator opens one stream per brick set. The order is
/// implementation-defined but must be deterministic per seed; consumers
/// apply fault-domain and capacity filtering themselves.
pub trait Allocator: Send + Sync {
    /// Opens a device stream over `cluster`'s devices, ordered by `seed`.
    ///
    /// Topology load errors are posted to the stream's late-error channel,
    /// surfacing after the (empty) device channel is drained.
    fn get_nodes(&self, db: &Db, cluster: &ClusterId, seed: BrickId) -> DeviceStream;
}

/// The default allocator: devices ordered on a deterministic per-seed ring.
///
/// The producer runs as its own task against its own registry snapshot and
/// stops as soon as the consumer releases the stream's done signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct RingAllocator;

impl RingAllocator {
    /// Creates a ring allocator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn load_candidates(db: &Db, cluster_id: &ClusterId) -> Result<Vec<RingCandidate>> {
        db.view(|tx| {
            let cluster = ClusterEntry::from_id(tx, cluster_id)?;
            let mut out = Vec::new();
            for node_id in &cluster.nodes {
                let node = NodeEntry::from_id(tx, node_id)?;
                out.extend(
                    node.devices.iter().map(|d| RingCandidate { device: *d, node: node.id }),
                );
            }
            Ok(out)
        })
    }
}

impl Allocator for RingAllocator {
    fn get_nodes(&self, db: &Db, cluster: &ClusterId, seed: BrickId) -> DeviceStream {
        let (mut sender, stream) = device_channel();
        let db = db.clone();
        let cluster = *cluster;

        tokio::spawn(async move {
            let candidates = match Self::load_candidates(&db, &cluster) {
                Ok(candidates) => candidates,
                Err(e) => {
                    sender.fail(e);
                    return;
                }
            };
            let order = ordered_candidates(seed, &candidates);
            debug!(%cluster, %seed, candidates = order.len(), "device stream opened");
            for device in order {
                if !sender.send(device).await {
                    break;
                }
            }
        });

        stream
    }
}
