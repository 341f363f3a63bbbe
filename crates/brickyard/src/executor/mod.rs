//! The executor seam to the storage daemons.
//!
//! Everything Brickyard does on remote nodes goes through [`Executor`]:
//! daemon probes, live volume and heal queries, brick materialization and
//! the atomic replace-brick call. The trait is the boundary between the
//! transactional registry and side effects that cannot be rolled back.

use async_trait::async_trait;
use brickyard_core::durability::Durability;
use brickyard_core::error::{Error, Result};
use brickyard_core::types::BrickId;
use brickyard_store::{BrickEntry, NodeEntry};

pub mod mock;

pub use mock::MockExecutor;

/// Name the daemon reports for bricks it cannot describe because their node
/// is down. A down brick cannot be a heal source, so these are skipped.
pub const INFO_NOT_AVAILABLE: &str = "information not available";

/// Identifies a brick on the data plane as `host:path`, where `host` is the
/// first storage hostname of the brick's node.
///
/// The rendered form is the only join key between persisted bricks and live
/// daemon output; divergence (hostname reconfiguration, path rewrites)
/// surfaces as `NotFound` during set reconstruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrickLocator {
    /// Storage hostname of the brick's node.
    pub host: String,
    /// Brick directory path on the node.
    pub path: String,
}

impl BrickLocator {
    /// Builds the locator for a persisted brick.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the node has no storage hostname.
    pub fn from_entry(brick: &BrickEntry, node: &NodeEntry) -> Result<Self> {
        let host = node.storage_hostname().ok_or(Error::NotFound)?;
        Ok(Self { host: host.to_string(), path: brick.path.clone() })
    }
}

impl std::fmt::Display for BrickLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.path)
    }
}

/// Everything the executor needs to materialize or destroy one brick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrickSpec {
    /// Brick id.
    pub id: BrickId,
    /// Management hostname of the brick's node.
    pub manage_host: String,
    /// Storage hostname of the brick's node.
    pub storage_host: String,
    /// Brick directory path on the node.
    pub path: String,
    /// Logical size in bytes.
    pub size: u64,
    /// On-disk reservation in bytes.
    pub total_size: u64,
    /// Group id the brick directory is created with.
    pub gid: i64,
}

impl BrickSpec {
    /// Builds the spec for a persisted brick.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the node lacks a management or storage
    /// hostname.
    pub fn from_entry(brick: &BrickEntry, node: &NodeEntry) -> Result<Self> {
        let manage_host = node.manage_hostname().ok_or(Error::NotFound)?;
        let storage_host = node.storage_hostname().ok_or(Error::NotFound)?;
        Ok(Self {
            id: brick.id,
            manage_host: manage_host.to_string(),
            storage_host: storage_host.to_string(),
            path: brick.path.clone(),
            size: brick.size,
            total_size: brick.total_size,
            gid: brick.gid,
        })
    }

    /// The brick's data-plane locator.
    #[must_use]
    pub fn locator(&self) -> BrickLocator {
        BrickLocator { host: self.storage_host.clone(), path: self.path.clone() }
    }
}

/// Parameters for creating a volume over already materialized bricks.
#[derive(Debug, Clone)]
pub struct VolumeCreateSpec {
    /// Volume name.
    pub name: String,
    /// Durability profile to configure.
    pub durability: Durability,
    /// Brick locators in set order.
    pub bricks: Vec<BrickLocator>,
}

/// Live brick list of a volume as reported by a daemon.
#[derive(Debug, Clone, Default)]
pub struct VolumeInfoReport {
    /// Bricks in configuration order, sets laid out consecutively.
    pub bricks: Vec<LiveBrick>,
}

/// One brick in a live volume report.
#[derive(Debug, Clone)]
pub struct LiveBrick {
    /// `host:path` name of the brick.
    pub name: String,
}

/// Self-heal status of a volume as reported by a daemon.
#[derive(Debug, Clone, Default)]
pub struct HealReport {
    /// Per-brick heal status.
    pub bricks: Vec<BrickHealStatus>,
}

/// Heal status of one brick.
#[derive(Debug, Clone)]
pub struct BrickHealStatus {
    /// `host:path` name, or [`INFO_NOT_AVAILABLE`] when the brick's node is
    /// down.
    pub name: String,
    /// Number of entries queued for healing from this brick; `"-"` or `"0"`
    /// when the brick is not a heal source.
    pub number_of_entries: String,
}

/// Remote side effects on the storage daemons.
///
/// Calls are stateless per invocation and cannot be rolled back; callers
/// order them against registry transactions and compensate explicitly.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Verifies the volume manager daemon on `host` is reachable.
    async fn daemon_check(&self, host: &str) -> Result<()>;

    /// Fetches the live brick list of `volume` from the daemon on `host`.
    async fn volume_info(&self, host: &str, volume: &str) -> Result<VolumeInfoReport>;

    /// Fetches the self-heal status of `volume` from the daemon on `host`.
    async fn heal_info(&self, host: &str, volume: &str) -> Result<HealReport>;

    /// Creates `spec` as a volume over its already materialized bricks,
    /// driven from the daemon on `host`.
    async fn volume_create(&self, host: &str, spec: &VolumeCreateSpec) -> Result<()>;

    /// Atomically swaps `old` for `new` in `volume`, driven from the daemon
    /// on `host`. Irreversible once it returns success.
    async fn volume_replace_brick(
        &self,
        host: &str,
        volume: &str,
        old: &BrickLocator,
        new: &BrickLocator,
    ) -> Result<()>;

    /// Materializes brick directories on their nodes.
    async fn create_bricks(&self, bricks: &[BrickSpec]) -> Result<()>;

    /// Destroys brick directories on their nodes.
    async fn destroy_bricks(&self, bricks: &[BrickSpec]) -> Result<()>;
}
