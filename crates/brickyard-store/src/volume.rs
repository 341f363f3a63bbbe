//! Volume entries.

use brickyard_core::durability::Durability;
use brickyard_core::error::Result;
use brickyard_core::types::{BlockVolumeId, BrickId, ClusterId, VolumeId};
use serde::{Deserialize, Serialize};

use crate::brick::BrickEntry;
use crate::db::{self, Reader, WriteTx};
use crate::device::DeviceEntry;

/// A logical volume and the bricks that implement it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeEntry {
    /// Volume id.
    pub id: VolumeId,
    /// Volume name, unique per deployment.
    pub name: String,
    /// Cluster the volume was placed into; `None` until placement.
    pub cluster_id: Option<ClusterId>,
    /// Durability profile.
    pub durability: Durability,
    /// Snapshot reservation factor (≥ 1.0) applied to each brick's on-disk
    /// size.
    pub snapshot_factor: f64,
    /// Group id brick directories are created with.
    pub gid: i64,
    /// Requested size in bytes.
    pub size: u64,
    /// Bricks owned by the volume, set by set.
    pub bricks: Vec<BrickId>,
    /// Whether block volumes may be carved from this volume.
    pub block_hosting: bool,
    /// Remaining capacity for block volumes, in bytes.
    pub block_free: u64,
    /// Block volumes carved from this volume.
    pub block_volumes: Vec<BlockVolumeId>,
}

impl VolumeEntry {
    /// Creates an unplaced volume.
    #[must_use]
    pub fn new(
        name: String,
        size: u64,
        durability: Durability,
        snapshot_factor: f64,
        gid: i64,
    ) -> Self {
        Self {
            id: VolumeId::generate(),
            name,
            cluster_id: None,
            durability,
            snapshot_factor,
            gid,
            size,
            bricks: Vec::new(),
            block_hosting: false,
            block_free: 0,
            block_volumes: Vec::new(),
        }
    }

    /// Loads the volume with the given id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such volume exists.
    pub fn from_id(tx: &impl Reader, id: &VolumeId) -> Result<Self> {
        db::require_entry(tx, db::VOLUMES, &id.to_string())
    }

    /// Persists the volume.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn save(&self, tx: &WriteTx) -> Result<()> {
        db::store_entry(tx, db::VOLUMES, &self.id.to_string(), self)
    }

    /// Deletes the volume record.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn delete(&self, tx: &WriteTx) -> Result<()> {
        tx.remove(db::VOLUMES, &self.id.to_string())
    }

    /// Registers a brick.
    pub fn brick_add(&mut self, id: BrickId) {
        if !self.bricks.contains(&id) {
            self.bricks.push(id);
        }
    }

    /// Unregisters a brick.
    pub fn brick_delete(&mut self, id: BrickId) {
        self.bricks.retain(|b| *b != id);
    }

    /// Registers a carved block volume.
    pub fn block_volume_add(&mut self, id: BlockVolumeId) {
        if !self.block_volumes.contains(&id) {
            self.block_volumes.push(id);
        }
    }

    /// Removes a brick from persistent state, inside the caller's
    /// transaction: credits the hosting device's free space, unlinks the
    /// brick id from the device, deletes the brick record, and unlinks the
    /// brick id from this volume.
    ///
    /// The volume itself is not saved here; callers persist it together
    /// with their other mutations.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be loaded or a write fails.
    pub fn remove_brick(&mut self, tx: &WriteTx, brick: &BrickEntry) -> Result<()> {
        let mut device = DeviceEntry::from_id(tx, &brick.device_id)?;
        device.storage_free(brick.total_size);
        device.brick_delete(brick.id);
        device.save(tx)?;

        brick.delete(tx)?;
        self.brick_delete(brick.id);
        Ok(())
    }
}
