// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 The Brickyard Authors

//! The placement engine and the allocation driver.
//!
//! Placement runs against a write transaction but mutates only in-memory
//! copies of device entries: the free-space debit becomes durable when the
//! driver persists bricks and touched devices and commits. A `NoSpace`
//! outcome therefore aborts the transaction at zero persistent cost, and
//! the driver retries with the next smaller brick size from the durability
//! profile's schedule.

use std::collections::{HashMap, HashSet};

use brickyard_core::error::{Error, Result};
use brickyard_core::types::{BrickId, ClusterId, DeviceId, BRICK_MAX_NUM, GB};
use brickyard_placement::stream::DeviceStream;
use brickyard_store::{BrickEntry, Db, DeviceEntry, VolumeEntry, WriteTx};
use metrics::counter;
use tracing::{debug, info};

use crate::allocator::Allocator;

/// The outcome of one placement pass: bricks to create, and the device
/// entries whose ledgers were debited for them.
#[derive(Debug, Default)]
pub(crate) struct BrickAllocation {
    pub(crate) bricks: Vec<BrickEntry>,
    pub(crate) devices: Vec<DeviceEntry>,
}

/// Pulls candidates from the stream until one passes the fault-domain rule
/// and can fit the brick.
///
/// Devices are resolved through `devcache` so one placement pass reads each
/// device once and later sets observe earlier in-memory debits.
async fn find_device_for_brick(
    tx: &WriteTx,
    stream: &mut DeviceStream,
    devcache: &mut HashMap<DeviceId, DeviceEntry>,
    setlist: &[BrickEntry],
    volume: &VolumeEntry,
    brick_size: u64,
) -> Result<(BrickEntry, DeviceId)> {
    while let Some(device_id) = stream.next().await {
        let device = match devcache.entry(device_id) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(DeviceEntry::from_id(tx, &device_id)?)
            }
        };

        // Fault domain: no two bricks of one set may share a node.
        if setlist.iter().any(|b| b.node_id == device.node_id) {
            continue;
        }

        if let Some(brick) =
            device.new_brick(brick_size, volume.snapshot_factor, volume.gid, volume.id)
        {
            return Ok((brick, device_id));
        }
    }

    // The ring is exhausted; surface a deferred producer error if there is
    // one, otherwise the cluster is simply out of space at this size.
    stream.finish().await?;
    Err(Error::NoSpace)
}

/// Places `sets` complete brick sets of `brick_size` bytes each.
///
/// Each set draws from its own freshly seeded stream, and the set's first
/// brick takes the seed as its id, which is what later makes the set
/// reconstructable from any of its members.
pub(crate) async fn allocate_bricks(
    tx: &WriteTx,
    db: &Db,
    allocator: &dyn Allocator,
    cluster: &ClusterId,
    volume: &VolumeEntry,
    sets: u64,
    brick_size: u64,
) -> Result<BrickAllocation> {
    let mut result = BrickAllocation::default();
    let mut devcache: HashMap<DeviceId, DeviceEntry> = HashMap::new();

    for set in 0..sets {
        debug!(set, sets, brick_size, "placing brick set");

        let seed = BrickId::generate();
        let mut stream = allocator.get_nodes(db, cluster, seed);
        let mut setlist: Vec<BrickEntry> = Vec::new();

        for i in 0..volume.durability.bricks_in_set() {
            let (mut brick, device_id) = find_device_for_brick(
                tx, &mut stream, &mut devcache, &setlist, volume, brick_size,
            )
            .await?;

            if i == 0 {
                brick.set_id(seed);
            }

            devcache
                .get_mut(&device_id)
                .ok_or_else(|| Error::Database("device cache lost an entry".to_string()))?
                .brick_add(brick.id);

            result.bricks.push(brick.clone());
            setlist.push(brick);
        }
        // Dropping the stream releases its done signal and stops the
        // producer.
    }

    let touched: HashSet<DeviceId> = result.bricks.iter().map(|b| b.device_id).collect();
    result.devices = devcache.into_values().filter(|d| touched.contains(&d.id)).collect();
    Ok(result)
}

/// One allocation attempt at a fixed brick size, persisted atomically.
///
/// On success the volume object has the new brick ids registered; the
/// volume itself is persisted by the caller together with its other
/// mutations.
async fn alloc_bricks(
    db: &Db,
    allocator: &dyn Allocator,
    cluster: &ClusterId,
    volume: &mut VolumeEntry,
    sets: u64,
    brick_size: u64,
) -> Result<Vec<BrickEntry>> {
    let tx = db.write_tx()?;
    let allocation =
        allocate_bricks(&tx, db, allocator, cluster, volume, sets, brick_size).await?;
    for brick in &allocation.bricks {
        brick.save(&tx)?;
    }
    for device in &allocation.devices {
        device.save(&tx)?;
    }
    tx.commit()?;

    for brick in &allocation.bricks {
        volume.brick_add(brick.id);
    }
    Ok(allocation.bricks)
}

/// Allocates bricks for `gb_size` decimal gigabytes of `volume` in
/// `cluster`, shrinking the brick size until the cluster fits the request.
///
/// # Errors
///
/// - [`Error::MaxBricks`] when any candidate would push the volume past
///   its brick ceiling.
/// - [`Error::NoSizeAvailable`] when the size schedule is exhausted.
/// - [`Error::NoSpace`] never escapes here; it only drives the retry loop.
pub async fn alloc_bricks_in_cluster(
    db: &Db,
    allocator: &dyn Allocator,
    cluster: &ClusterId,
    volume: &mut VolumeEntry,
    gb_size: u64,
) -> Result<Vec<BrickEntry>> {
    let size = gb_size * GB;
    let mut gen = volume.durability.brick_size_generator(size);

    loop {
        let (sets, brick_size) = gen.next_size()?;
        let num_bricks = sets as usize * volume.durability.bricks_in_set();

        if num_bricks + volume.bricks.len() > BRICK_MAX_NUM {
            debug!(num_bricks, existing = volume.bricks.len(), "brick ceiling reached");
            return Err(Error::MaxBricks);
        }

        match alloc_bricks(db, allocator, cluster, volume, sets, brick_size).await {
            Ok(bricks) => {
                counter!("brickyard_bricks_allocated_total").increment(bricks.len() as u64);
                info!(
                    volume = %volume.id,
                    %cluster,
                    bricks = bricks.len(),
                    brick_size,
                    "allocated bricks"
                );
                return Ok(bricks);
            }
            Err(Error::NoSpace) => {
                debug!(brick_size, "no space, retrying with smaller brick size");
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::RingAllocator;
    use brickyard_core::durability::Durability;
    use brickyard_core::types::TB;
    use brickyard_store::{ClusterEntry, NodeEntry};
    use parking_lot::Mutex;

    struct RecordingAllocator {
        inner: RingAllocator,
        seeds: Mutex<Vec<BrickId>>,
    }

    impl Allocator for RecordingAllocator {
        fn get_nodes(&self, db: &Db, cluster: &ClusterId, seed: BrickId) -> DeviceStream {
            self.seeds.lock().push(seed);
            self.inner.get_nodes(db, cluster, seed)
        }
    }

    fn topology(db: &Db, nodes: usize, devices_per_node: usize, disk_size: u64) -> ClusterId {
        let mut cluster = ClusterEntry::new();
        db.update(|tx| {
            for _ in 0..nodes {
                let mut node = NodeEntry::new(
                    cluster.id,
                    vec!["m.example".to_string()],
                    vec!["s.example".to_string()],
                );
                for d in 0..devices_per_node {
                    let device = DeviceEntry::new(node.id, format!("/dev/bd{d}"), disk_size);
                    node.device_add(device.id);
                    device.save(tx)?;
                }
                cluster.node_add(node.id);
                node.save(tx)?;
            }
            cluster.save(tx)
        })
        .unwrap();
        cluster.id
    }

    fn sample_volume() -> VolumeEntry {
        VolumeEntry::new(
            "vol_t".to_string(),
            100 * GB,
            Durability::Replicate { replica: 3 },
            1.0,
            0,
        )
    }

    #[tokio::test]
    async fn test_first_brick_of_each_set_carries_the_seed() {
        let db = Db::open_in_memory().unwrap();
        let cluster = topology(&db, 3, 2, 6 * TB);
        let allocator =
            RecordingAllocator { inner: RingAllocator::new(), seeds: Mutex::new(Vec::new()) };
        let volume = sample_volume();

        let tx = db.write_tx().unwrap();
        let allocation =
            allocate_bricks(&tx, &db, &allocator, &cluster, &volume, 2, 10 * GB).await.unwrap();
        drop(tx);

        let seeds = allocator.seeds.lock().clone();
        assert_eq!(seeds.len(), 2, "one stream per set");
        assert_eq!(allocation.bricks.len(), 6);
        for (set, seed) in seeds.iter().enumerate() {
            let first = &allocation.bricks[set * 3];
            assert_eq!(first.id, *seed);
            assert!(first.path.contains(&seed.to_string()), "path follows the overridden id");
        }
    }

    #[tokio::test]
    async fn test_no_space_when_fault_domains_cannot_be_satisfied() {
        let db = Db::open_in_memory().unwrap();
        // Two nodes cannot spread a replica-3 set, no matter how much free
        // space their devices have.
        let cluster = topology(&db, 2, 4, 6 * TB);
        let volume = sample_volume();

        let tx = db.write_tx().unwrap();
        let err = allocate_bricks(&tx, &db, &RingAllocator::new(), &cluster, &volume, 1, 10 * GB)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoSpace));
    }

    #[tokio::test]
    async fn test_devices_register_their_bricks() {
        let db = Db::open_in_memory().unwrap();
        let cluster = topology(&db, 3, 1, 6 * TB);
        let volume = sample_volume();

        let tx = db.write_tx().unwrap();
        let allocation =
            allocate_bricks(&tx, &db, &RingAllocator::new(), &cluster, &volume, 1, 10 * GB)
                .await
                .unwrap();
        drop(tx);

        assert_eq!(allocation.devices.len(), 3);
        for brick in &allocation.bricks {
            let device = allocation.devices.iter().find(|d| d.id == brick.device_id).unwrap();
            assert!(device.bricks.contains(&brick.id));
            assert_eq!(device.free_size, 6 * TB - brick.total_size);
        }
    }
}
