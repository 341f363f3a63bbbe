//! Device entries and the free-space ledger.

use brickyard_core::error::Result;
use brickyard_core::types::{BrickId, DeviceId, NodeId, VolumeId};
use serde::{Deserialize, Serialize};

use crate::brick::BrickEntry;
use crate::db::{self, Reader, WriteTx};

/// A physical storage device on a node.
///
/// The device owns the free-space ledger: for any committed state,
/// `free_size` plus the total size of hosted bricks equals the device size.
/// Mutators keep that conserved; callers persist the entry to make a
/// mutation durable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// Device id.
    pub id: DeviceId,
    /// Node the device is attached to.
    pub node_id: NodeId,
    /// Device name on the node, e.g. `/dev/sdb`.
    pub name: String,
    /// Total capacity in bytes.
    pub total_size: u64,
    /// Unreserved capacity in bytes.
    pub free_size: u64,
    /// Capacity reserved by bricks, in bytes.
    pub used_size: u64,
    /// Bricks hosted on this device.
    pub bricks: Vec<BrickId>,
}

impl DeviceEntry {
    /// Creates an empty device of `size` bytes on `node_id`.
    #[must_use]
    pub fn new(node_id: NodeId, name: String, size: u64) -> Self {
        Self {
            id: DeviceId::generate(),
            node_id,
            name,
            total_size: size,
            free_size: size,
            used_size: 0,
            bricks: Vec::new(),
        }
    }

    /// Loads the device with the given id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such device exists.
    pub fn from_id(tx: &impl Reader, id: &DeviceId) -> Result<Self> {
        db::require_entry(tx, db::DEVICES, &id.to_string())
    }

    /// Lists the ids of all devices.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read.
    pub fn ids(tx: &impl Reader) -> Result<Vec<DeviceId>> {
        tx.keys(db::DEVICES)?
            .iter()
            .map(|k| {
                DeviceId::parse(k).map_err(|_| {
                    brickyard_core::error::Error::Database(format!("bad device key {k}"))
                })
            })
            .collect()
    }

    /// Persists the device.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn save(&self, tx: &WriteTx) -> Result<()> {
        db::store_entry(tx, db::DEVICES, &self.id.to_string(), self)
    }

    /// Deletes the device record.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn delete(&self, tx: &WriteTx) -> Result<()> {
        tx.remove(db::DEVICES, &self.id.to_string())
    }

    /// Tries to carve a new brick out of this device.
    ///
    /// Debits the free-space ledger by `size × snapshot_factor` and returns
    /// the brick, or `None` when the device cannot fit it. The brick id is
    /// not yet registered on the device; callers do that once they accept
    /// the brick.
    pub fn new_brick(
        &mut self,
        size: u64,
        snapshot_factor: f64,
        gid: i64,
        volume_id: VolumeId,
    ) -> Option<BrickEntry> {
        let total_size = (size as f64 * snapshot_factor) as u64;
        if !self.storage_allocate(total_size) {
            return None;
        }
        Some(BrickEntry::new(self, size, total_size, gid, volume_id))
    }

    /// Reserves `amount` bytes, returning whether the device could fit it.
    pub fn storage_allocate(&mut self, amount: u64) -> bool {
        if self.free_size < amount {
            return false;
        }
        self.free_size -= amount;
        self.used_size += amount;
        true
    }

    /// Returns `amount` bytes to the free pool.
    pub fn storage_free(&mut self, amount: u64) {
        self.free_size += amount;
        self.used_size = self.used_size.saturating_sub(amount);
    }

    /// Registers a hosted brick.
    pub fn brick_add(&mut self, id: BrickId) {
        if !self.bricks.contains(&id) {
            self.bricks.push(id);
        }
    }

    /// Unregisters a hosted brick.
    pub fn brick_delete(&mut self, id: BrickId) {
        self.bricks.retain(|b| *b != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickyard_core::types::GB;

    #[test]
    fn test_new_brick_debits_inflated_size() {
        let mut device = DeviceEntry::new(NodeId::generate(), "/dev/sdb".into(), 100 * GB);
        let brick = device.new_brick(10 * GB, 1.5, 0, VolumeId::generate()).unwrap();

        assert_eq!(brick.size, 10 * GB);
        assert_eq!(brick.total_size, 15 * GB);
        assert_eq!(device.free_size, 85 * GB);
        assert_eq!(device.used_size, 15 * GB);
        assert_eq!(brick.device_id, device.id);
        assert_eq!(brick.node_id, device.node_id);
    }

    #[test]
    fn test_new_brick_refuses_when_full() {
        let mut device = DeviceEntry::new(NodeId::generate(), "/dev/sdb".into(), 10 * GB);
        assert!(device.new_brick(8 * GB, 1.5, 0, VolumeId::generate()).is_none());
        // A refusal must not touch the ledger.
        assert_eq!(device.free_size, 10 * GB);
        assert_eq!(device.used_size, 0);
    }

    #[test]
    fn test_storage_free_restores_ledger() {
        let mut device = DeviceEntry::new(NodeId::generate(), "/dev/sdb".into(), 100 * GB);
        let brick = device.new_brick(20 * GB, 1.0, 0, VolumeId::generate()).unwrap();
        device.storage_free(brick.total_size);
        assert_eq!(device.free_size, 100 * GB);
        assert_eq!(device.used_size, 0);
    }

    #[test]
    fn test_ledger_is_conserved_across_allocations() {
        let mut device = DeviceEntry::new(NodeId::generate(), "/dev/sdb".into(), 100 * GB);
        let mut hosted = 0;
        while let Some(brick) = device.new_brick(7 * GB, 1.0, 0, VolumeId::generate()) {
            device.brick_add(brick.id);
            hosted += brick.total_size;
            assert_eq!(device.free_size + hosted, 100 * GB);
        }
        assert_eq!(device.bricks.len(), 14);
    }

    #[test]
    fn test_brick_registration_round_trip() {
        let mut device = DeviceEntry::new(NodeId::generate(), "/dev/sdb".into(), 10 * GB);
        let id = BrickId::generate();
        device.brick_add(id);
        device.brick_add(id);
        assert_eq!(device.bricks.len(), 1);
        device.brick_delete(id);
        assert!(device.bricks.is_empty());
    }
}
