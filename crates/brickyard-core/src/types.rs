// Copyright (c) 2025 The Brickyard Authors
// SPDX-License-Identifier: Apache-2.0

//! Typed entity identifiers and size constants used throughout Brickyard.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One decimal gigabyte.
pub const GB: u64 = 1_000_000_000;

/// One decimal terabyte.
pub const TB: u64 = 1_000 * GB;

/// Smallest brick the size search will propose.
pub const BRICK_MIN_SIZE: u64 = GB;

/// Largest brick the size search will propose.
pub const BRICK_MAX_SIZE: u64 = 4 * TB;

/// Ceiling on the number of bricks a single volume may own.
pub const BRICK_MAX_NUM: usize = 32;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random id.
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parses an id from its canonical string form.
            ///
            /// # Errors
            ///
            /// Returns an error if the string is not a valid id.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(s).map(Self)
            }

            /// Returns the raw 16 bytes of the id.
            #[must_use]
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0.simple())
            }
        }
    };
}

entity_id!(
    /// Identifies a cluster of storage nodes.
    ClusterId
);

entity_id!(
    /// Identifies a storage node within a cluster.
    NodeId
);

entity_id!(
    /// Identifies a physical storage device on a node.
    DeviceId
);

entity_id!(
    /// Identifies a brick, a per-device storage extent of a volume.
    ///
    /// The first brick of a brick set carries the set's seed id, so a
    /// `BrickId` also doubles as the allocator seed for that set.
    BrickId
);

entity_id!(
    /// Identifies a logical volume.
    VolumeId
);

entity_id!(
    /// Identifies a block volume carved from a block-hosting volume.
    BlockVolumeId
);

entity_id!(
    /// Identifies one in-flight mutating operation, used for pending
    /// markers in the registry.
    OperationId
);
