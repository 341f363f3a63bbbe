// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 The Brickyard Authors

//! Volume and block-volume create operations.

use brickyard_core::durability::Durability;
use brickyard_core::error::{Error, Result};
use brickyard_core::types::{ClusterId, OperationId, GB};
use brickyard_store::{
    listing, pending, BlockVolumeEntry, BrickEntry, ClusterEntry, Db, NodeEntry, VolumeEntry,
};
use metrics::counter;
use tracing::{debug, error, info};

use crate::allocate::alloc_bricks_in_cluster;
use crate::allocator::Allocator;
use crate::executor::{BrickSpec, Executor, VolumeCreateSpec};

/// Snapshot factor applied when snapshots are enabled without an explicit
/// factor.
const DEFAULT_SNAPSHOT_FACTOR: f64 = 1.5;

/// Snapshot settings of a create request.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotRequest {
    /// Whether snapshots are enabled for the volume.
    pub enable: bool,
    /// Reservation factor (≥ 1.0) inflating each brick's on-disk size.
    pub factor: Option<f64>,
}

/// A volume create request.
#[derive(Debug, Clone, Default)]
pub struct VolumeCreateRequest {
    /// Requested size in decimal gigabytes.
    pub size_gb: u64,
    /// Durability profile.
    pub durability: Durability,
    /// Volume name; generated from the id when empty.
    pub name: Option<String>,
    /// Group id brick directories are created with.
    pub gid: i64,
    /// Snapshot settings.
    pub snapshot: SnapshotRequest,
    /// Candidate clusters, tried in order; all clusters when empty.
    pub clusters: Vec<ClusterId>,
    /// Whether block volumes may later be carved from this volume.
    pub block_hosting: bool,
}

impl VolumeCreateRequest {
    fn build_entry(&self) -> Result<VolumeEntry> {
        if self.size_gb == 0 {
            return Err(Error::InvalidRequest("volume size must be positive".to_string()));
        }
        if let Some(factor) = self.snapshot.factor {
            if factor < 1.0 {
                return Err(Error::InvalidRequest(
                    "snapshot factor must be at least 1.0".to_string(),
                ));
            }
        }
        let snapshot_factor = if self.snapshot.enable {
            self.snapshot.factor.unwrap_or(DEFAULT_SNAPSHOT_FACTOR)
        } else {
            1.0
        };

        let size = self.size_gb * GB;
        let mut volume = VolumeEntry::new(
            self.name.clone().unwrap_or_default(),
            size,
            self.durability,
            snapshot_factor,
            self.gid,
        );
        if volume.name.is_empty() {
            volume.name = format!("vol_{}", volume.id);
        }
        volume.block_hosting = self.block_hosting;
        if self.block_hosting {
            volume.block_free = size;
        }
        Ok(volume)
    }
}

/// Creates a volume: places bricks in the first candidate cluster that can
/// hold them, persists the result, and materializes it through the
/// executor.
///
/// The volume carries a pending marker from first persistence until the
/// external materialization finished, so listings never advertise a
/// half-built volume.
///
/// # Errors
///
/// Returns the placement failure of the last candidate cluster when none
/// fits, and any registry or executor failure otherwise. On executor
/// failure, persisted bricks and the volume record are removed again.
pub async fn create_volume(
    db: &Db,
    executor: &dyn Executor,
    allocator: &dyn Allocator,
    req: &VolumeCreateRequest,
) -> Result<VolumeEntry> {
    let mut volume = req.build_entry()?;

    let candidates =
        if req.clusters.is_empty() { db.view(ClusterEntry::ids)? } else { req.clusters.clone() };

    let mut bricks = None;
    let mut last_err = Error::NoSpace;
    for cluster_id in &candidates {
        match alloc_bricks_in_cluster(db, allocator, cluster_id, &mut volume, req.size_gb).await {
            Ok(placed) => {
                volume.cluster_id = Some(*cluster_id);
                bricks = Some(placed);
                break;
            }
            Err(e) if e.is_cluster_retryable() => {
                debug!(cluster = %cluster_id, error = %e, "cluster cannot host volume");
                last_err = e;
            }
            Err(e) => return Err(e),
        }
    }
    let Some(bricks) = bricks else {
        return Err(last_err);
    };
    // Placement set it just before breaking out of the loop.
    let cluster_id = volume.cluster_id.ok_or(Error::NotFound)?;

    let op = OperationId::generate();
    db.update(|tx| {
        pending::mark(tx, &volume.id.to_string(), op)?;
        volume.save(tx)?;
        let mut cluster = ClusterEntry::from_id(tx, &cluster_id)?;
        cluster.volume_add(volume.id);
        cluster.save(tx)
    })?;

    let specs = brick_specs(db, &bricks)?;
    if let Err(e) = executor.create_bricks(&specs).await {
        error!(volume = %volume.id, error = %e, "brick materialization failed");
        cleanup_failed_create(db, executor, &mut volume, &bricks, &specs, false).await;
        return Err(e);
    }

    let create_spec = VolumeCreateSpec {
        name: volume.name.clone(),
        durability: volume.durability,
        bricks: specs.iter().map(BrickSpec::locator).collect(),
    };
    // Drive volume creation from the first brick's node.
    let host = specs.first().map(|s| s.manage_host.clone()).ok_or(Error::NoSpace)?;
    if let Err(e) = executor.volume_create(&host, &create_spec).await {
        error!(volume = %volume.id, error = %e, "volume creation failed");
        cleanup_failed_create(db, executor, &mut volume, &bricks, &specs, true).await;
        return Err(e);
    }

    db.update(|tx| pending::clear(tx, &volume.id.to_string()))?;
    counter!("brickyard_volumes_created_total").increment(1);
    info!(volume = %volume.id, name = %volume.name, cluster = %cluster_id, "created volume");
    Ok(volume)
}

/// Unwinds a create whose external materialization failed: destroys any
/// bricks already created remotely and removes all persisted state.
async fn cleanup_failed_create(
    db: &Db,
    executor: &dyn Executor,
    volume: &mut VolumeEntry,
    bricks: &[BrickEntry],
    specs: &[BrickSpec],
    destroy_bricks: bool,
) {
    if destroy_bricks {
        if let Err(e) = executor.destroy_bricks(specs).await {
            error!(volume = %volume.id, error = %e, "could not destroy bricks during cleanup");
        }
    }
    let result = db.update(|tx| {
        for brick in bricks {
            volume.remove_brick(tx, brick)?;
        }
        if let Some(cluster_id) = volume.cluster_id {
            let mut cluster = ClusterEntry::from_id(tx, &cluster_id)?;
            cluster.volume_delete(volume.id);
            cluster.save(tx)?;
        }
        volume.delete(tx)?;
        pending::clear(tx, &volume.id.to_string())
    });
    if let Err(e) = result {
        error!(volume = %volume.id, error = %e, "cleanup after failed create did not complete");
    }
}

fn brick_specs(db: &Db, bricks: &[BrickEntry]) -> Result<Vec<BrickSpec>> {
    db.view(|tx| {
        bricks
            .iter()
            .map(|brick| {
                let node = NodeEntry::from_id(tx, &brick.node_id)?;
                BrickSpec::from_entry(brick, &node)
            })
            .collect()
    })
}

/// A block-volume create request.
#[derive(Debug, Clone, Default)]
pub struct BlockVolumeCreateRequest {
    /// Requested size in decimal gigabytes.
    pub size_gb: u64,
    /// Block volume name; generated from the id when empty.
    pub name: Option<String>,
    /// Candidate clusters for a newly created hosting volume.
    pub clusters: Vec<ClusterId>,
}

/// Creates a block volume, carving it from a block-hosting volume.
///
/// Reuses the first complete block-hosting volume with enough free block
/// capacity; otherwise a replicate-3 hosting volume is created through
/// [`create_volume`] first.
///
/// # Errors
///
/// Returns placement errors from hosting-volume creation, `NoSpace` when
/// the reserved capacity was taken concurrently, and registry failures.
pub async fn create_block_volume(
    db: &Db,
    executor: &dyn Executor,
    allocator: &dyn Allocator,
    req: &BlockVolumeCreateRequest,
) -> Result<BlockVolumeEntry> {
    if req.size_gb == 0 {
        return Err(Error::InvalidRequest("block volume size must be positive".to_string()));
    }
    let size = req.size_gb * GB;

    let hosting = db.view(|tx| {
        for volume_id in listing::list_complete_volumes(tx)? {
            let volume = VolumeEntry::from_id(tx, &volume_id)?;
            let cluster_ok = req.clusters.is_empty()
                || volume.cluster_id.is_some_and(|c| req.clusters.contains(&c));
            if volume.block_hosting && volume.block_free >= size && cluster_ok {
                return Ok(Some(volume));
            }
        }
        Ok(None)
    })?;

    let hosting = match hosting {
        Some(volume) => volume,
        None => {
            let hosting_req = VolumeCreateRequest {
                size_gb: req.size_gb,
                durability: Durability::Replicate { replica: 3 },
                clusters: req.clusters.clone(),
                block_hosting: true,
                ..Default::default()
            };
            create_volume(db, executor, allocator, &hosting_req).await?
        }
    };
    let cluster_id = hosting.cluster_id.ok_or(Error::NotFound)?;

    let mut entry = BlockVolumeEntry::new(
        req.name.clone().unwrap_or_default(),
        size,
        hosting.id,
        cluster_id,
    );
    if entry.name.is_empty() {
        entry.name = format!("blk_{}", entry.id);
    }

    let op = OperationId::generate();
    db.update(|tx| {
        pending::mark(tx, &entry.id.to_string(), op)?;
        // Reload the hosting volume: its free block capacity may have moved
        // since the read view above.
        let mut hosting = VolumeEntry::from_id(tx, &hosting.id)?;
        if hosting.block_free < size {
            return Err(Error::NoSpace);
        }
        hosting.block_free -= size;
        hosting.block_volume_add(entry.id);
        hosting.save(tx)?;

        let mut cluster = ClusterEntry::from_id(tx, &cluster_id)?;
        cluster.block_volume_add(entry.id);
        cluster.save(tx)?;

        entry.save(tx)
    })?;
    db.update(|tx| pending::clear(tx, &entry.id.to_string()))?;

    counter!("brickyard_block_volumes_created_total").increment(1);
    info!(block_volume = %entry.id, hosting = %hosting.id, "created block volume");
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_size_is_invalid() {
        let req = VolumeCreateRequest::default();
        assert!(matches!(req.build_entry(), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_snapshot_factor_below_one_is_invalid() {
        let req = VolumeCreateRequest {
            size_gb: 10,
            snapshot: SnapshotRequest { enable: true, factor: Some(0.5) },
            ..Default::default()
        };
        assert!(matches!(req.build_entry(), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_snapshot_defaults() {
        let disabled = VolumeCreateRequest { size_gb: 10, ..Default::default() };
        assert_eq!(disabled.build_entry().unwrap().snapshot_factor, 1.0);

        let enabled = VolumeCreateRequest {
            size_gb: 10,
            snapshot: SnapshotRequest { enable: true, factor: None },
            ..Default::default()
        };
        assert_eq!(enabled.build_entry().unwrap().snapshot_factor, DEFAULT_SNAPSHOT_FACTOR);
    }

    #[test]
    fn test_generated_name_and_block_hosting() {
        let req = VolumeCreateRequest { size_gb: 10, block_hosting: true, ..Default::default() };
        let volume = req.build_entry().unwrap();
        assert_eq!(volume.name, format!("vol_{}", volume.id));
        assert!(volume.block_hosting);
        assert_eq!(volume.block_free, 10 * GB);
    }
}
