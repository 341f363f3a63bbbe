//! Core types and utilities for the Brickyard volume manager.
//!
//! This crate provides the building blocks shared by all Brickyard
//! components:
//! - Configuration management
//! - The crate-wide error type
//! - Typed entity identifiers and size constants
//! - Volume durability profiles and the brick size search schedule

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod durability;
pub mod error;
pub mod types;

pub use config::{Config, DbConfig, LoggingConfig};
pub use durability::{BrickSizeGenerator, Durability};
pub use error::{Error, Result};
pub use types::{
    BlockVolumeId, BrickId, ClusterId, DeviceId, NodeId, OperationId, VolumeId, BRICK_MAX_NUM,
    BRICK_MAX_SIZE, BRICK_MIN_SIZE, GB, TB,
};
