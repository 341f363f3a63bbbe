//! Brick entries.

use brickyard_core::error::Result;
use brickyard_core::types::{BrickId, DeviceId, NodeId, VolumeId};
use serde::{Deserialize, Serialize};

use crate::db::{self, Reader, WriteTx};
use crate::device::DeviceEntry;

/// A brick: a per-device storage extent participating in a volume.
///
/// Bricks are only created through [`DeviceEntry::new_brick`], which debits
/// the device's free-space ledger by the brick's on-disk size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrickEntry {
    /// Brick id. The first brick of a set carries the set's seed id.
    pub id: BrickId,
    /// Logical size in bytes.
    pub size: u64,
    /// On-disk reservation: `size` inflated by the volume's snapshot factor.
    pub total_size: u64,
    /// Device hosting the brick.
    pub device_id: DeviceId,
    /// Node hosting the device.
    pub node_id: NodeId,
    /// Volume owning the brick.
    pub volume_id: VolumeId,
    /// Group id the brick directory is created with.
    pub gid: i64,
    /// Path of the brick directory on its node.
    pub path: String,
}

impl BrickEntry {
    pub(crate) fn new(
        device: &DeviceEntry,
        size: u64,
        total_size: u64,
        gid: i64,
        volume_id: VolumeId,
    ) -> Self {
        let id = BrickId::generate();
        Self {
            id,
            size,
            total_size,
            device_id: device.id,
            node_id: device.node_id,
            volume_id,
            gid,
            path: brick_path(device.id, id),
        }
    }

    /// Loads the brick with the given id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such brick exists.
    pub fn from_id(tx: &impl Reader, id: &BrickId) -> Result<Self> {
        db::require_entry(tx, db::BRICKS, &id.to_string())
    }

    /// Lists the ids of all bricks.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read.
    pub fn ids(tx: &impl Reader) -> Result<Vec<BrickId>> {
        tx.keys(db::BRICKS)?
            .iter()
            .map(|k| {
                BrickId::parse(k)
                    .map_err(|_| brickyard_core::error::Error::Database(format!("bad brick key {k}")))
            })
            .collect()
    }

    /// Persists the brick.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn save(&self, tx: &WriteTx) -> Result<()> {
        db::store_entry(tx, db::BRICKS, &self.id.to_string(), self)
    }

    /// Deletes the brick record.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn delete(&self, tx: &WriteTx) -> Result<()> {
        tx.remove(db::BRICKS, &self.id.to_string())
    }

    /// Overrides the brick id, re-deriving the on-node path.
    ///
    /// The placement engine uses this to give the first brick of a set the
    /// set's seed id.
    pub fn set_id(&mut self, id: BrickId) {
        self.id = id;
        self.path = brick_path(self.device_id, id);
    }
}

/// Path of a brick directory on its node.
#[must_use]
pub fn brick_path(device: DeviceId, brick: BrickId) -> String {
    format!("/var/lib/brickyard/mounts/vg_{device}/brick_{brick}/brick")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_id_rewrites_path() {
        let mut device = DeviceEntry::new(NodeId::generate(), "/dev/sdb".into(), 100);
        let mut brick = device.new_brick(10, 1.0, 0, VolumeId::generate()).unwrap();

        let seed = BrickId::generate();
        brick.set_id(seed);
        assert_eq!(brick.id, seed);
        assert_eq!(brick.path, brick_path(device.id, seed));
    }
}
