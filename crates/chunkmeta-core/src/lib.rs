// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Chunkmeta Authors

//! Core types and utilities for the chunkmeta scheduling layer.
//!
//! This crate provides the building blocks shared by every chunkmeta crate:
//! - Identifiers for chunkservers, servers, zones, pools and copysets
//! - Chunkserver state enums and copyset configuration-change descriptors
//! - Heartbeat statistics value types
//! - TOML configuration and the core error type

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, LogFormat, LoggingConfig, ScheduleConfig};
pub use error::{Error, Result};
pub use types::{
    ChunkServerId, ChunkServerStatistics, ChunkServerStatus, ConfigChangeInfo, ConfigChangeType,
    CopysetId, CopysetKey, CopysetStatistics, DiskState, Epoch, OnlineState, PoolId, ServerId,
    ZoneId, UNINITIALIZED_ID,
};
