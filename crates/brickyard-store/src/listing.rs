//! Listing helpers over the registry.
//!
//! "Complete" listings exclude entries referenced by a pending-operation
//! marker: a volume that is still being materialized, or whose replace
//! operation could not reconcile, is not advertised.

use std::collections::HashMap;

use brickyard_core::error::{Error, Result};
use brickyard_core::types::{BlockVolumeId, VolumeId};

use crate::db::{self, Reader};
use crate::pending;

/// Returns the items whose value is not a key of `keys`, preserving input
/// order.
#[must_use]
pub fn remove_keys_from_list(items: Vec<String>, keys: &HashMap<String, String>) -> Vec<String> {
    items.into_iter().filter(|item| !keys.contains_key(item)).collect()
}

/// Lists the ids of volumes not referenced by a pending operation.
///
/// # Errors
///
/// Returns an error if the registry cannot be read.
pub fn list_complete_volumes(tx: &impl Reader) -> Result<Vec<VolumeId>> {
    let pending = pending::map(tx)?;
    remove_keys_from_list(tx.keys(db::VOLUMES)?, &pending)
        .iter()
        .map(|k| VolumeId::parse(k).map_err(|_| Error::Database(format!("bad volume key {k}"))))
        .collect()
}

/// Lists the ids of block volumes not referenced by a pending operation.
///
/// # Errors
///
/// Returns an error if the registry cannot be read.
pub fn list_complete_block_volumes(tx: &impl Reader) -> Result<Vec<BlockVolumeId>> {
    let pending = pending::map(tx)?;
    remove_keys_from_list(tx.keys(db::BLOCK_VOLUMES)?, &pending)
        .iter()
        .map(|k| {
            BlockVolumeId::parse(k).map_err(|_| Error::Database(format!("bad block volume key {k}")))
        })
        .collect()
}
