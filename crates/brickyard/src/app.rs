// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 The Brickyard Authors

//! Top-level wiring: registry, executor and allocator behind one handle.

use std::sync::Arc;

use brickyard_core::config::{Config, LoggingConfig};
use brickyard_core::error::Result;
use brickyard_core::types::{BrickId, VolumeId};
use brickyard_store::{BlockVolumeEntry, Db, VolumeEntry};

use crate::allocator::Allocator;
use crate::create::{
    create_block_volume, create_volume, BlockVolumeCreateRequest, VolumeCreateRequest,
};
use crate::executor::Executor;
use crate::replace::replace_brick;

/// A wired Brickyard instance.
pub struct App {
    /// The registry database.
    pub db: Db,
    executor: Arc<dyn Executor>,
    allocator: Arc<dyn Allocator>,
}

impl App {
    /// Opens the registry named by `config` and wires it to the given
    /// executor and allocator.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be opened.
    pub fn open(
        config: &Config,
        executor: Arc<dyn Executor>,
        allocator: Arc<dyn Allocator>,
    ) -> Result<Self> {
        let db = Db::open(&config.db.path)?;
        Ok(Self::with_db(db, executor, allocator))
    }

    /// Wires an already opened registry, used by tests with the in-memory
    /// backend.
    #[must_use]
    pub fn with_db(db: Db, executor: Arc<dyn Executor>, allocator: Arc<dyn Allocator>) -> Self {
        Self { db, executor, allocator }
    }

    /// The wired executor.
    #[must_use]
    pub fn executor(&self) -> &dyn Executor {
        self.executor.as_ref()
    }

    /// The wired allocator.
    #[must_use]
    pub fn allocator(&self) -> &dyn Allocator {
        self.allocator.as_ref()
    }

    /// Creates a volume. See [`create_volume`].
    ///
    /// # Errors
    ///
    /// See [`create_volume`].
    pub async fn create_volume(&self, req: &VolumeCreateRequest) -> Result<VolumeEntry> {
        create_volume(&self.db, self.executor(), self.allocator(), req).await
    }

    /// Creates a block volume. See [`create_block_volume`].
    ///
    /// # Errors
    ///
    /// See [`create_block_volume`].
    pub async fn create_block_volume(
        &self,
        req: &BlockVolumeCreateRequest,
    ) -> Result<BlockVolumeEntry> {
        create_block_volume(&self.db, self.executor(), self.allocator(), req).await
    }

    /// Replaces `old_brick_id` of the volume `volume_id`. See
    /// [`replace_brick`].
    ///
    /// # Errors
    ///
    /// See [`replace_brick`].
    pub async fn replace_brick(&self, volume_id: &VolumeId, old_brick_id: BrickId) -> Result<()> {
        let volume = self.db.view(|tx| VolumeEntry::from_id(tx, volume_id))?;
        replace_brick(&self.db, self.executor(), self.allocator(), &volume, old_brick_id).await
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App").field("db", &self.db).finish_non_exhaustive()
    }
}

/// Initializes process-wide tracing from the logging configuration.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging(config: &LoggingConfig) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.level))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::RingAllocator;
    use crate::executor::MockExecutor;

    #[test]
    fn test_open_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.db.path = dir.path().join("registry.db");
        init_logging(&config.logging);

        let app = App::open(
            &config,
            Arc::new(MockExecutor::new()),
            Arc::new(RingAllocator::new()),
        )
        .unwrap();
        assert!(config.db.path.exists());
        drop(app);
    }
}
