//! Cluster entries.

use brickyard_core::error::{Error, Result};
use brickyard_core::types::{BlockVolumeId, ClusterId, NodeId, VolumeId};
use serde::{Deserialize, Serialize};

use crate::db::{self, Reader, WriteTx};

/// A cluster: a set of nodes volumes are placed into, plus the volumes it
/// carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterEntry {
    /// Cluster id.
    pub id: ClusterId,
    /// Nodes registered in this cluster.
    pub nodes: Vec<NodeId>,
    /// Volumes placed in this cluster.
    pub volumes: Vec<VolumeId>,
    /// Block volumes carried by this cluster.
    pub block_volumes: Vec<BlockVolumeId>,
}

impl ClusterEntry {
    /// Creates an empty cluster with a fresh id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: ClusterId::generate(),
            nodes: Vec::new(),
            volumes: Vec::new(),
            block_volumes: Vec::new(),
        }
    }

    /// Loads the cluster with the given id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such cluster exists.
    pub fn from_id(tx: &impl Reader, id: &ClusterId) -> Result<Self> {
        db::require_entry(tx, db::CLUSTERS, &id.to_string())
    }

    /// Lists the ids of all registered clusters.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read.
    pub fn ids(tx: &impl Reader) -> Result<Vec<ClusterId>> {
        tx.keys(db::CLUSTERS)?
            .iter()
            .map(|k| ClusterId::parse(k).map_err(|_| Error::Database(format!("bad cluster key {k}"))))
            .collect()
    }

    /// Persists the cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn save(&self, tx: &WriteTx) -> Result<()> {
        db::store_entry(tx, db::CLUSTERS, &self.id.to_string(), self)
    }

    /// Deletes the cluster record.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn delete(&self, tx: &WriteTx) -> Result<()> {
        tx.remove(db::CLUSTERS, &self.id.to_string())
    }

    /// Registers a node.
    pub fn node_add(&mut self, id: NodeId) {
        if !self.nodes.contains(&id) {
            self.nodes.push(id);
        }
    }

    /// Registers a volume.
    pub fn volume_add(&mut self, id: VolumeId) {
        if !self.volumes.contains(&id) {
            self.volumes.push(id);
        }
    }

    /// Unregisters a volume.
    pub fn volume_delete(&mut self, id: VolumeId) {
        self.volumes.retain(|v| *v != id);
    }

    /// Registers a block volume.
    pub fn block_volume_add(&mut self, id: BlockVolumeId) {
        if !self.block_volumes.contains(&id) {
            self.block_volumes.push(id);
        }
    }
}

impl Default for ClusterEntry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Db;

    #[test]
    fn test_save_load_and_list() {
        let db = Db::open_in_memory().unwrap();
        let mut cluster = ClusterEntry::new();
        cluster.node_add(NodeId::generate());
        db.update(|tx| cluster.save(tx)).unwrap();

        let loaded = db.view(|tx| ClusterEntry::from_id(tx, &cluster.id)).unwrap();
        assert_eq!(loaded, cluster);
        assert_eq!(db.view(ClusterEntry::ids).unwrap(), vec![cluster.id]);
    }

    #[test]
    fn test_missing_cluster_is_not_found() {
        let db = Db::open_in_memory().unwrap();
        let err = db.view(|tx| ClusterEntry::from_id(tx, &ClusterId::generate())).unwrap_err();
        assert!(matches!(err, Error::NotFound));
    }

    #[test]
    fn test_volume_registration_is_idempotent() {
        let mut cluster = ClusterEntry::new();
        let vol = VolumeId::generate();
        cluster.volume_add(vol);
        cluster.volume_add(vol);
        assert_eq!(cluster.volumes.len(), 1);
        cluster.volume_delete(vol);
        assert!(cluster.volumes.is_empty());
    }
}
