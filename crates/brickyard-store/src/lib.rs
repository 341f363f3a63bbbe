//! Persistent registry for the Brickyard volume manager.
//!
//! The registry keeps the authoritative record of clusters, nodes, devices,
//! bricks, volumes and block volumes in an embedded [redb] database. Every
//! mutation happens inside a transaction: the store serializes writers (at
//! most one write transaction system-wide at any instant) while readers see
//! a consistent snapshot.
//!
//! Entries mirror one another symmetrically: a brick referenced by a volume
//! references that volume back, and the device hosting it lists the brick id
//! and accounts for its on-disk size in the free-space ledger.
//!
//! [redb]: https://docs.rs/redb

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod block_volume;
pub mod brick;
pub mod cluster;
pub mod db;
pub mod device;
pub mod listing;
pub mod node;
pub mod pending;
pub mod volume;

pub use block_volume::BlockVolumeEntry;
pub use brick::BrickEntry;
pub use cluster::ClusterEntry;
pub use db::{Db, ReadTx, Reader, WriteTx};
pub use device::DeviceEntry;
pub use listing::{list_complete_block_volumes, list_complete_volumes, remove_keys_from_list};
pub use node::NodeEntry;
pub use volume::VolumeEntry;
