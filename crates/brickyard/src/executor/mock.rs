//! In-memory executor for tests and dry runs.
//!
//! The mock keeps the live brick list of every created volume, so replace
//! flows exercise the same set reconstruction and heal checks they run
//! against a real cluster. Failures are injected per call site.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use brickyard_core::error::{Error, Result};
use parking_lot::Mutex;
use tracing::debug;

use super::{
    BrickHealStatus, BrickLocator, BrickSpec, Executor, HealReport, LiveBrick, VolumeCreateSpec,
    VolumeInfoReport, INFO_NOT_AVAILABLE,
};

/// One recorded `volume_replace_brick` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceCall {
    /// Management host the call was driven from.
    pub host: String,
    /// Volume name.
    pub volume: String,
    /// Old brick locator, rendered.
    pub old: String,
    /// New brick locator, rendered.
    pub new: String,
}

#[derive(Default)]
struct State {
    created_bricks: Vec<BrickSpec>,
    destroyed_bricks: Vec<BrickSpec>,
    /// Volume name to live brick names, in configuration order.
    volumes: HashMap<String, Vec<String>>,
    /// Brick name to reported `NumberOfEntries`.
    heal_entries: HashMap<String, String>,
    /// Brick names whose node the daemon reports as down.
    unavailable_bricks: HashSet<String>,
    down_hosts: HashSet<String>,
    fail_replace: bool,
    fail_create_bricks: bool,
    replace_calls: Vec<ReplaceCall>,
}

/// A stateful in-memory [`Executor`].
#[derive(Default)]
pub struct MockExecutor {
    state: Mutex<State>,
}

impl MockExecutor {
    /// Creates a mock with no volumes and nothing failing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `host` as unreachable for daemon checks.
    pub fn set_down_host(&self, host: &str) {
        self.state.lock().down_hosts.insert(host.to_string());
    }

    /// Sets the heal entry count reported for `brick_name`.
    pub fn set_heal_entries(&self, brick_name: &str, entries: &str) {
        self.state.lock().heal_entries.insert(brick_name.to_string(), entries.to_string());
    }

    /// Reports `brick_name` as hosted on a down node in heal output.
    pub fn set_brick_unavailable(&self, brick_name: &str) {
        self.state.lock().unavailable_bricks.insert(brick_name.to_string());
    }

    /// Makes every subsequent `volume_replace_brick` call fail.
    pub fn fail_replace(&self) {
        self.state.lock().fail_replace = true;
    }

    /// Makes every subsequent `create_bricks` call fail.
    pub fn fail_create_bricks(&self) {
        self.state.lock().fail_create_bricks = true;
    }

    /// Bricks materialized so far.
    #[must_use]
    pub fn created_bricks(&self) -> Vec<BrickSpec> {
        self.state.lock().created_bricks.clone()
    }

    /// Bricks destroyed so far.
    #[must_use]
    pub fn destroyed_bricks(&self) -> Vec<BrickSpec> {
        self.state.lock().destroyed_bricks.clone()
    }

    /// Recorded replace-brick calls.
    #[must_use]
    pub fn replace_calls(&self) -> Vec<ReplaceCall> {
        self.state.lock().replace_calls.clone()
    }

    /// The live brick names of `volume`, if it exists.
    #[must_use]
    pub fn live_bricks(&self, volume: &str) -> Option<Vec<String>> {
        self.state.lock().volumes.get(volume).cloned()
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn daemon_check(&self, host: &str) -> Result<()> {
        if self.state.lock().down_hosts.contains(host) {
            return Err(Error::External(format!("daemon not reachable on {host}")));
        }
        Ok(())
    }

    async fn volume_info(&self, _host: &str, volume: &str) -> Result<VolumeInfoReport> {
        let state = self.state.lock();
        let bricks = state
            .volumes
            .get(volume)
            .ok_or_else(|| Error::External(format!("volume {volume} not known to daemon")))?;
        Ok(VolumeInfoReport {
            bricks: bricks.iter().map(|name| LiveBrick { name: name.clone() }).collect(),
        })
    }

    async fn heal_info(&self, _host: &str, volume: &str) -> Result<HealReport> {
        let state = self.state.lock();
        let bricks = state
            .volumes
            .get(volume)
            .ok_or_else(|| Error::External(format!("volume {volume} not known to daemon")))?;
        let bricks = bricks
            .iter()
            .map(|name| {
                if state.unavailable_bricks.contains(name) {
                    BrickHealStatus {
                        name: INFO_NOT_AVAILABLE.to_string(),
                        number_of_entries: "-".to_string(),
                    }
                } else {
                    BrickHealStatus {
                        name: name.clone(),
                        number_of_entries: state
                            .heal_entries
                            .get(name)
                            .cloned()
                            .unwrap_or_else(|| "0".to_string()),
                    }
                }
            })
            .collect();
        Ok(HealReport { bricks })
    }

    async fn volume_create(&self, host: &str, spec: &VolumeCreateSpec) -> Result<()> {
        debug!(host, volume = %spec.name, bricks = spec.bricks.len(), "mock volume create");
        let mut state = self.state.lock();
        let names = spec.bricks.iter().map(ToString::to_string).collect();
        state.volumes.insert(spec.name.clone(), names);
        Ok(())
    }

    async fn volume_replace_brick(
        &self,
        host: &str,
        volume: &str,
        old: &BrickLocator,
        new: &BrickLocator,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_replace {
            return Err(Error::External("replace brick failed".to_string()));
        }
        let bricks = state
            .volumes
            .get_mut(volume)
            .ok_or_else(|| Error::External(format!("volume {volume} not known to daemon")))?;
        let old_name = old.to_string();
        let new_name = new.to_string();
        let slot = bricks
            .iter_mut()
            .find(|name| **name == old_name)
            .ok_or_else(|| Error::External(format!("{old_name} is not a brick of {volume}")))?;
        // The swapped-in brick keeps the old brick's position in the set.
        *slot = new_name.clone();
        state.replace_calls.push(ReplaceCall {
            host: host.to_string(),
            volume: volume.to_string(),
            old: old_name,
            new: new_name,
        });
        Ok(())
    }

    async fn create_bricks(&self, bricks: &[BrickSpec]) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_create_bricks {
            return Err(Error::External("brick create failed".to_string()));
        }
        state.created_bricks.extend_from_slice(bricks);
        Ok(())
    }

    async fn destroy_bricks(&self, bricks: &[BrickSpec]) -> Result<()> {
        self.state.lock().destroyed_bricks.extend_from_slice(bricks);
        Ok(())
    }
}
