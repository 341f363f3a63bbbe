//! Volume durability profiles and the brick size search schedule.
//!
//! A durability profile fixes three things the allocation core depends on:
//! the width of a brick set, how many peer bricks must be online before one
//! brick of a set may be replaced, and the schedule of progressively smaller
//! brick sizes the allocation driver walks when the cluster cannot fit the
//! current candidate.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{BRICK_MAX_SIZE, BRICK_MIN_SIZE};

/// The durability profile of a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Durability {
    /// Plain distribution, no redundancy. Each brick set is a single brick.
    Distribute,
    /// Synchronous replication across `replica` bricks per set.
    Replicate {
        /// Number of replicas per brick set.
        replica: usize,
    },
    /// Erasure coding with `data` data bricks and `redundancy` parity
    /// bricks per set.
    Disperse {
        /// Data bricks per set.
        data: usize,
        /// Redundancy bricks per set.
        redundancy: usize,
    },
}

impl Default for Durability {
    fn default() -> Self {
        Self::Distribute
    }
}

impl Durability {
    /// Short name of the profile, used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Distribute => "distribute",
            Self::Replicate { .. } => "replicate",
            Self::Disperse { .. } => "disperse",
        }
    }

    /// Number of bricks that jointly form one replica/dispersion group.
    #[must_use]
    pub fn bricks_in_set(&self) -> usize {
        match self {
            Self::Distribute => 1,
            Self::Replicate { replica } => *replica,
            Self::Disperse { data, redundancy } => data + redundancy,
        }
    }

    /// How many peer bricks of a set must be online to tolerate replacing
    /// one of its bricks.
    ///
    /// Distribute-only volumes cannot lose a brick at all; replacement is
    /// refused before this count is consulted.
    #[must_use]
    pub fn quorum_brick_count(&self) -> usize {
        match self {
            Self::Distribute => 0,
            Self::Replicate { replica } => replica / 2 + 1,
            Self::Disperse { data, .. } => *data,
        }
    }

    /// Returns the size search schedule for a volume of `total_size` bytes.
    #[must_use]
    pub fn brick_size_generator(&self, total_size: u64) -> BrickSizeGenerator {
        let data = match self {
            Self::Disperse { data, .. } => *data as u64,
            Self::Distribute | Self::Replicate { .. } => 1,
        };
        BrickSizeGenerator { total_size, data, sets: 1 }
    }
}

/// A finite schedule of `(sets, brick_size)` candidates with strictly
/// decreasing brick sizes.
///
/// Each call to [`next_size`](Self::next_size) doubles the set count, so a
/// volume that does not fit as one large brick per set is retried as twice
/// as many half-sized bricks. The allocation driver relies on the sizes
/// decreasing monotonically.
#[derive(Debug)]
pub struct BrickSizeGenerator {
    total_size: u64,
    data: u64,
    sets: u64,
}

impl BrickSizeGenerator {
    /// Produces the next `(sets, brick_size)` candidate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSizeAvailable`] once the schedule would drop below
    /// the minimum brick size.
    pub fn next_size(&mut self) -> Result<(u64, u64)> {
        loop {
            let brick_size = self.total_size / (self.sets * self.data);
            if brick_size < BRICK_MIN_SIZE {
                return Err(Error::NoSizeAvailable);
            }
            if brick_size <= BRICK_MAX_SIZE {
                let sets = self.sets;
                self.sets *= 2;
                return Ok((sets, brick_size));
            }
            self.sets *= 2;
        }
    }
}
