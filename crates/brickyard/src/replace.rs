// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 The Brickyard Authors

//! The replace-brick coordinator.
//!
//! Swapping a brick while its volume stays online runs in phases:
//!
//! 1. Resolve the old brick, its device and its node.
//! 2. Pick a management target: the old node if its daemon responds, else
//!    any verified node of the cluster.
//! 3. Reconstruct the brick's peer set from the daemon's live brick list.
//! 4. Safety check: the old brick must not be a heal source and enough
//!    peers must be online.
//! 5. Allocate a replacement brick on an admissible device.
//! 6. Materialize the replacement on its node.
//! 7. Drive the external atomic swap.
//! 8. Reconcile the registry: persist the new brick, retire the old one.
//!
//! Steps 5 and 6 arm compensations on an explicit stack; a failure before
//! the swap commits unwinds them in LIFO order. The swap itself is the
//! point of no return: afterwards the stack is cleared, the old brick is
//! destroyed best-effort, and reconcile errors are logged while the
//! volume's pending marker is left in place for operator attention.

use brickyard_core::durability::Durability;
use brickyard_core::error::{Error, Result};
use brickyard_core::types::{BrickId, ClusterId, DeviceId, OperationId};
use brickyard_store::{pending, BrickEntry, ClusterEntry, Db, DeviceEntry, NodeEntry, VolumeEntry};
use metrics::counter;
use tracing::{debug, error, info, warn};

use crate::allocator::Allocator;
use crate::executor::{BrickLocator, BrickSpec, Executor, INFO_NOT_AVAILABLE};

/// Undo actions armed while a replace is in flight, applied in LIFO order
/// if a step fails before the external swap commits.
enum Compensation {
    /// Credit a device's ledger for a replacement brick that will not be
    /// used after all.
    CreditDevice {
        device: DeviceId,
        amount: u64,
    },
    /// Destroy materialized replacement bricks.
    DestroyBricks {
        specs: Vec<BrickSpec>,
    },
}

async fn unwind(db: &Db, executor: &dyn Executor, stack: &mut Vec<Compensation>) {
    while let Some(compensation) = stack.pop() {
        match compensation {
            Compensation::CreditDevice { device, amount } => {
                let result = db.update(|tx| {
                    let mut device = DeviceEntry::from_id(tx, &device)?;
                    device.storage_free(amount);
                    device.save(tx)
                });
                if let Err(e) = result {
                    error!(%device, error = %e, "could not credit device back during unwind");
                }
            }
            Compensation::DestroyBricks { specs } => {
                if let Err(e) = executor.destroy_bricks(&specs).await {
                    warn!(error = %e, "could not destroy replacement brick during unwind");
                }
            }
        }
    }
}

/// Replaces `old_brick_id` of `volume` with a freshly allocated brick.
///
/// The caller's `volume` is read-only context; the reconcile phase reloads
/// entries from the registry, so callers should re-read the volume after a
/// successful replace.
///
/// # Errors
///
/// - [`Error::UnsupportedDurability`] for distribute-only volumes.
/// - [`Error::NotFound`] when the old brick cannot be resolved, or the
///   registry diverged from the live brick list.
/// - [`Error::HealSourceConflict`] / [`Error::QuorumNotMet`] when the
///   safety check refuses the swap; nothing was changed.
/// - [`Error::NoReplacement`] when no admissible device is found.
/// - [`Error::External`] when a daemon call fails; compensations have run.
pub async fn replace_brick(
    db: &Db,
    executor: &dyn Executor,
    allocator: &dyn Allocator,
    volume: &VolumeEntry,
    old_brick_id: BrickId,
) -> Result<()> {
    if matches!(volume.durability, Durability::Distribute) {
        return Err(Error::UnsupportedDurability(volume.durability.kind().to_string()));
    }
    let cluster_id = volume.cluster_id.ok_or(Error::NotFound)?;

    let (old_brick, old_device, old_node) = db.view(|tx| {
        let brick = BrickEntry::from_id(tx, &old_brick_id)?;
        let device = DeviceEntry::from_id(tx, &brick.device_id)?;
        let node = NodeEntry::from_id(tx, &brick.node_id)?;
        Ok((brick, device, node))
    })?;

    // Prefer driving the swap from the old brick's own node; fall back to
    // any node of the cluster whose daemon responds.
    let mgmt_host = match old_node.manage_hostname() {
        Some(host) if executor.daemon_check(host).await.is_ok() => host.to_string(),
        _ => get_verified_manage_hostname(db, executor, &old_node.cluster_id).await?,
    };

    let setlist = brick_set_for_brick(db, executor, volume, old_brick_id, &mgmt_host).await?;
    can_replace_brick_in_set(db, executor, volume, &old_brick, &mgmt_host, &setlist).await?;

    let new_brick_id = BrickId::generate();
    let mut stream = allocator.get_nodes(db, &cluster_id, new_brick_id);

    while let Some(device_id) = stream.next().await {
        if device_id == old_device.id {
            continue;
        }
        let candidate = db.view(|tx| DeviceEntry::from_id(tx, &device_id))?;
        // The peers of the old brick pin their nodes; the replacement must
        // not join them there.
        if setlist.iter().any(|b| b.node_id == candidate.node_id) {
            continue;
        }

        // Debit the ledger against the freshest device state; the write
        // transaction serializes this against concurrent allocations.
        let new_brick = db.update(|tx| {
            let mut device = DeviceEntry::from_id(tx, &device_id)?;
            let brick =
                device.new_brick(old_brick.size, volume.snapshot_factor, volume.gid, volume.id);
            if brick.is_some() {
                device.save(tx)?;
            }
            Ok(brick)
        })?;
        let Some(mut new_brick) = new_brick else {
            debug!(device = %device_id, "candidate device cannot fit the replacement");
            continue;
        };
        new_brick.set_id(new_brick_id);

        let mut undo = vec![Compensation::CreditDevice {
            device: device_id,
            amount: new_brick.total_size,
        }];

        let swap = swap_and_reconcile(
            db, executor, volume, &mgmt_host, &old_brick, &old_node, &new_brick, &mut undo,
        )
        .await;
        return match swap {
            Ok(()) => Ok(()),
            Err(e) => {
                unwind(db, executor, &mut undo).await;
                Err(e)
            }
        };
    }

    stream.finish().await?;
    Err(Error::NoReplacement)
}

/// Phases 6 through 8: materialize the replacement, drive the swap, and
/// reconcile the registry.
#[allow(clippy::too_many_arguments)]
async fn swap_and_reconcile(
    db: &Db,
    executor: &dyn Executor,
    volume: &VolumeEntry,
    mgmt_host: &str,
    old_brick: &BrickEntry,
    old_node: &NodeEntry,
    new_brick: &BrickEntry,
    undo: &mut Vec<Compensation>,
) -> Result<()> {
    // Resolve everything fallible before the first external side effect.
    let new_node = db.view(|tx| NodeEntry::from_id(tx, &new_brick.node_id))?;
    let new_spec = BrickSpec::from_entry(new_brick, &new_node)?;
    let old_spec = BrickSpec::from_entry(old_brick, old_node)?;
    let old_locator = BrickLocator::from_entry(old_brick, old_node)?;
    let new_locator = new_spec.locator();

    executor.create_bricks(std::slice::from_ref(&new_spec)).await?;
    undo.push(Compensation::DestroyBricks { specs: vec![new_spec] });

    executor.volume_replace_brick(mgmt_host, &volume.name, &old_locator, &new_locator).await?;

    // Point of no return: there is no revert for the swap. From here on,
    // failures are logged, never propagated as replace failure.
    undo.clear();

    if let Err(e) = executor.destroy_bricks(std::slice::from_ref(&old_spec)).await {
        warn!(brick = %old_brick.id, error = %e, "could not destroy replaced brick");
    }

    let volume_key = volume.id.to_string();
    let op = OperationId::generate();
    if let Err(e) = db.update(|tx| pending::mark(tx, &volume_key, op)) {
        error!(volume = %volume_key, error = %e, "could not mark volume pending for reconcile");
    }

    // Re-read everything: on-disk state may have moved since the swap
    // started.
    let reconciled = db.update(|tx| {
        new_brick.save(tx)?;
        let mut new_device = DeviceEntry::from_id(tx, &new_brick.device_id)?;
        new_device.brick_add(new_brick.id);
        new_device.save(tx)?;

        let mut reread_volume = VolumeEntry::from_id(tx, &new_brick.volume_id)?;
        reread_volume.brick_add(new_brick.id);
        reread_volume.remove_brick(tx, old_brick)?;
        reread_volume.save(tx)
    });
    match reconciled {
        Ok(()) => {
            if let Err(e) = db.update(|tx| pending::clear(tx, &volume_key)) {
                error!(volume = %volume_key, error = %e, "could not clear pending marker");
            }
        }
        Err(e) => {
            // The volume stays pending so listings stop advertising it
            // until an operator reconciles registry and cluster state.
            error!(
                volume = %volume_key,
                error = %e,
                "swap committed but registry reconcile failed; volume kept pending"
            );
        }
    }

    counter!("brickyard_bricks_replaced_total").increment(1);
    info!(
        old_brick = %old_brick.id,
        old_node = %old_brick.node_id,
        old_path = %old_brick.path,
        new_brick = %new_brick.id,
        new_node = %new_brick.node_id,
        new_path = %new_brick.path,
        "replaced brick"
    );
    Ok(())
}

/// Reconstructs the peer set of `old_brick_id` from the daemon's live brick
/// list.
///
/// The live list lays sets out consecutively, so it is scanned in strides
/// of the set width; the stride containing the old brick yields the peers.
async fn brick_set_for_brick(
    db: &Db,
    executor: &dyn Executor,
    volume: &VolumeEntry,
    old_brick_id: BrickId,
    mgmt_host: &str,
) -> Result<Vec<BrickEntry>> {
    let live = executor.volume_info(mgmt_host, &volume.name).await?;
    let width = volume.durability.bricks_in_set();

    let mut start = 0;
    while start + width <= live.bricks.len() {
        let mut setlist = Vec::new();
        let mut found = false;
        for live_brick in &live.bricks[start..start + width] {
            let entry = brick_entry_from_name(db, volume, &live_brick.name)?;
            if entry.id == old_brick_id {
                found = true;
            } else {
                setlist.push(entry);
            }
        }
        if found {
            return Ok(setlist);
        }
        start += width;
    }

    error!(
        brick = %old_brick_id,
        volume = %volume.id,
        "brick set not found in live volume info; registry and cluster state diverge"
    );
    Err(Error::NotFound)
}

/// Maps a live `host:path` brick name back to the persisted brick entry.
fn brick_entry_from_name(db: &Db, volume: &VolumeEntry, name: &str) -> Result<BrickEntry> {
    db.view(|tx| {
        for brick_id in &volume.bricks {
            let brick = BrickEntry::from_id(tx, brick_id)?;
            let node = NodeEntry::from_id(tx, &brick.node_id)?;
            if let Some(host) = node.storage_hostname() {
                if name == format!("{host}:{}", brick.path) {
                    return Ok(brick);
                }
            }
        }
        Err(Error::NotFound)
    })
}

/// Checks whether one brick of a set may be replaced right now:
/// the brick must not be a heal source, and enough of its peers must be
/// online to satisfy the durability profile's quorum.
async fn can_replace_brick_in_set(
    db: &Db,
    executor: &dyn Executor,
    volume: &VolumeEntry,
    brick: &BrickEntry,
    mgmt_host: &str,
    setlist: &[BrickEntry],
) -> Result<()> {
    let heal = executor.heal_info(mgmt_host, &volume.name).await?;

    let mut online_peer_bricks = 0;
    for status in &heal.bricks {
        // The daemon cannot name bricks whose node is down. A down brick is
        // never a heal source, so it is safe to skip.
        if status.name == INFO_NOT_AVAILABLE {
            continue;
        }
        let entry = brick_entry_from_name(db, volume, &status.name)?;
        if entry.id == brick.id
            && status.number_of_entries != "-"
            && status.number_of_entries != "0"
        {
            return Err(Error::HealSourceConflict(brick.id.to_string()));
        }
        if setlist.iter().any(|peer| peer.id == entry.id) {
            online_peer_bricks += 1;
        }
    }

    let required = volume.durability.quorum_brick_count();
    if online_peer_bricks < required {
        return Err(Error::QuorumNotMet { online: online_peer_bricks, required });
    }
    Ok(())
}

/// Walks the cluster's nodes and returns the first management hostname
/// whose daemon responds.
///
/// # Errors
///
/// Returns [`Error::NotFound`] when no node of the cluster is reachable.
pub async fn get_verified_manage_hostname(
    db: &Db,
    executor: &dyn Executor,
    cluster_id: &ClusterId,
) -> Result<String> {
    let nodes = db.view(|tx| {
        let cluster = ClusterEntry::from_id(tx, cluster_id)?;
        cluster.nodes.iter().map(|id| NodeEntry::from_id(tx, id)).collect::<Result<Vec<_>>>()
    })?;

    for node in nodes {
        if let Some(host) = node.manage_hostname() {
            if executor.daemon_check(host).await.is_ok() {
                return Ok(host.to_string());
            }
            debug!(node = %node.id, host, "daemon unreachable, trying next node");
        }
    }
    Err(Error::NotFound)
}
