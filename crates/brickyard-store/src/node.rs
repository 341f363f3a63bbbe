//! Node entries.

use brickyard_core::error::Result;
use brickyard_core::types::{ClusterId, DeviceId, NodeId};
use serde::{Deserialize, Serialize};

use crate::db::{self, Reader, WriteTx};

/// A storage node: the fault domain bricks of one set must not share.
///
/// A node is reachable on two planes: management hostnames for daemon
/// control, storage hostnames for the data path. The first storage hostname
/// is the one live brick names are formed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    /// Node id.
    pub id: NodeId,
    /// Cluster the node belongs to.
    pub cluster_id: ClusterId,
    /// Management-plane hostnames, most preferred first.
    pub manage_hostnames: Vec<String>,
    /// Storage-plane hostnames, most preferred first.
    pub storage_hostnames: Vec<String>,
    /// Devices attached to the node.
    pub devices: Vec<DeviceId>,
}

impl NodeEntry {
    /// Creates a node in `cluster_id` with the given hostnames.
    #[must_use]
    pub fn new(cluster_id: ClusterId, manage: Vec<String>, storage: Vec<String>) -> Self {
        Self {
            id: NodeId::generate(),
            cluster_id,
            manage_hostnames: manage,
            storage_hostnames: storage,
            devices: Vec::new(),
        }
    }

    /// Loads the node with the given id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such node exists.
    pub fn from_id(tx: &impl Reader, id: &NodeId) -> Result<Self> {
        db::require_entry(tx, db::NODES, &id.to_string())
    }

    /// Persists the node.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn save(&self, tx: &WriteTx) -> Result<()> {
        db::store_entry(tx, db::NODES, &self.id.to_string(), self)
    }

    /// Deletes the node record.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn delete(&self, tx: &WriteTx) -> Result<()> {
        tx.remove(db::NODES, &self.id.to_string())
    }

    /// The preferred management hostname, if any is configured.
    #[must_use]
    pub fn manage_hostname(&self) -> Option<&str> {
        self.manage_hostnames.first().map(String::as_str)
    }

    /// The storage hostname live brick names are formed from.
    #[must_use]
    pub fn storage_hostname(&self) -> Option<&str> {
        self.storage_hostnames.first().map(String::as_str)
    }

    /// Attaches a device.
    pub fn device_add(&mut self, id: DeviceId) {
        if !self.devices.contains(&id) {
            self.devices.push(id);
        }
    }
}
