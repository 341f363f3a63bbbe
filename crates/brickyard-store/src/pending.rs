//! Pending-operation markers.
//!
//! A mutating operation that spans external side effects marks the entries
//! it creates before the side effects run and clears the marks once the
//! operation completes. Listings subtract marked ids, so half-built volumes
//! are never advertised, and a marker that survives a crash or a failed
//! post-swap reconcile points an operator at exactly the entity that needs
//! attention.

use std::collections::HashMap;

use brickyard_core::error::Result;
use brickyard_core::types::OperationId;

use crate::db::{self, Reader, WriteTx};

/// Marks `entity_id` as touched by the in-flight operation `op`.
///
/// # Errors
///
/// Returns an error if the write fails.
pub fn mark(tx: &WriteTx, entity_id: &str, op: OperationId) -> Result<()> {
    tx.put_bytes(db::PENDING_OPS, entity_id, op.to_string().as_bytes())
}

/// Clears the marker on `entity_id`, if any.
///
/// # Errors
///
/// Returns an error if the write fails.
pub fn clear(tx: &WriteTx, entity_id: &str) -> Result<()> {
    tx.remove(db::PENDING_OPS, entity_id)
}

/// Returns the full marker map: entity id to operation id.
///
/// # Errors
///
/// Returns an error if the table cannot be read.
pub fn map(tx: &impl Reader) -> Result<HashMap<String, String>> {
    Ok(tx
        .entries(db::PENDING_OPS)?
        .into_iter()
        .map(|(entity, op)| (entity, String::from_utf8_lossy(&op).into_owned()))
        .collect())
}
