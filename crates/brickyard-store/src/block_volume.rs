//! Block volume entries.

use brickyard_core::error::{Error, Result};
use brickyard_core::types::{BlockVolumeId, ClusterId, VolumeId};
use serde::{Deserialize, Serialize};

use crate::db::{self, Reader, WriteTx};

/// A block volume carved out of a block-hosting volume's capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockVolumeEntry {
    /// Block volume id.
    pub id: BlockVolumeId,
    /// Block volume name.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Volume the block volume is carved from.
    pub hosting_volume: VolumeId,
    /// Cluster the hosting volume lives in.
    pub cluster_id: ClusterId,
}

impl BlockVolumeEntry {
    /// Creates a block volume record bound to its hosting volume.
    #[must_use]
    pub fn new(
        name: String,
        size: u64,
        hosting_volume: VolumeId,
        cluster_id: ClusterId,
    ) -> Self {
        Self { id: BlockVolumeId::generate(), name, size, hosting_volume, cluster_id }
    }

    /// Loads the block volume with the given id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such block volume exists.
    pub fn from_id(tx: &impl Reader, id: &BlockVolumeId) -> Result<Self> {
        db::require_entry(tx, db::BLOCK_VOLUMES, &id.to_string())
    }

    /// Lists the ids of all block volumes.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read.
    pub fn ids(tx: &impl Reader) -> Result<Vec<BlockVolumeId>> {
        tx.keys(db::BLOCK_VOLUMES)?
            .iter()
            .map(|k| {
                BlockVolumeId::parse(k)
                    .map_err(|_| Error::Database(format!("bad block volume key {k}")))
            })
            .collect()
    }

    /// Persists the block volume.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn save(&self, tx: &WriteTx) -> Result<()> {
        db::store_entry(tx, db::BLOCK_VOLUMES, &self.id.to_string(), self)
    }

    /// Deletes the block volume record.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn delete(&self, tx: &WriteTx) -> Result<()> {
        tx.remove(db::BLOCK_VOLUMES, &self.id.to_string())
    }
}
