// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 The Brickyard Authors

//! Deterministic device ordering and the cancellable allocator stream.
//!
//! This crate holds the pure placement machinery of Brickyard:
//!
//! - [`ring`] orders a cluster's devices deterministically for a given
//!   allocation seed, interleaving candidates across nodes so that the head
//!   of the sequence already spreads fault domains.
//! - [`stream`] provides the producer/consumer endpoints an allocator hands
//!   to the placement engine: a bounded device-id channel, a done signal the
//!   consumer releases on every exit path, and a late-error channel that is
//!   read at most once after the device channel is drained.
//!
//! Nothing in here touches the registry; callers snapshot the topology and
//! feed it in.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod hash;
pub mod ring;
pub mod stream;

pub use hash::{ring_hash, ring_hash2};
pub use ring::{ordered_candidates, RingCandidate};
pub use stream::{device_channel, DeviceSender, DeviceStream};
