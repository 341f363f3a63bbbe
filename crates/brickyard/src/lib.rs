// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 The Brickyard Authors

//! Brickyard: brick allocation and live brick replacement for distributed
//! storage volumes.
//!
//! Brickyard decides which physical devices across which nodes of a cluster
//! host a volume's bricks, and swaps a failing brick for a freshly
//! allocated one while the volume stays online.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                          App                                │
//! ├──────────────┬───────────────────────┬─────────────────────┤
//! │  create /    │   allocation driver   │   replace-brick     │
//! │  listing     │   + placement engine  │   coordinator       │
//! ├──────────────┴──────────┬────────────┴──────────┬──────────┤
//! │   registry (redb)       │   allocator (ring)    │ executor │
//! │   clusters/nodes/...    │   device streams      │ (remote) │
//! └─────────────────────────┴───────────────────────┴──────────┘
//! ```
//!
//! Placement pulls candidate device ids lazily from an [`Allocator`]
//! stream, honors fault domains (no two bricks of one set on one node), and
//! persists a whole allocation in a single registry transaction. The
//! replace coordinator reconstructs a brick's set from live cluster state,
//! runs heal and quorum safety checks, allocates a replacement, drives the
//! external swap, and reconciles the registry, compensating in LIFO order
//! when a step fails before the swap commits.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod allocate;
pub mod allocator;
pub mod app;
pub mod create;
pub mod executor;
pub mod replace;

pub use allocate::alloc_bricks_in_cluster;
pub use allocator::{Allocator, RingAllocator};
pub use app::{init_logging, App};
pub use create::{
    create_block_volume, create_volume, BlockVolumeCreateRequest, SnapshotRequest,
    VolumeCreateRequest,
};
pub use executor::{
    BrickHealStatus, BrickLocator, BrickSpec, Executor, HealReport, LiveBrick, MockExecutor,
    VolumeCreateSpec, VolumeInfoReport, INFO_NOT_AVAILABLE,
};
pub use replace::{get_verified_manage_hostname, replace_brick};
