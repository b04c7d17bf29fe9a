// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Configuration structs for every composable layer.
//!
//! There is no file-based or environment-based configuration loader: every
//! knob is a plain struct built in code, consistent with the rest of the
//! crate having no external configuration surface to parse or validate.

use crate::wal::SyncMode;
use std::path::PathBuf;

/// Shard count for a [`crate::sharded::ShardedTree`] and the branching
/// factor of each underlying [`crate::btree::Tree`].
#[derive(Debug, Clone, Copy)]
pub struct ShardedConfig {
    pub num_shards: usize,
    pub order: u16,
}

impl ShardedConfig {
    /// `num_shards` defaults to the available parallelism (falling back to
    /// 1 if it cannot be determined), `order` to 64.
    pub fn new() -> Self {
        let num_shards = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self { num_shards, order: 64 }
    }

    pub fn with_num_shards(mut self, num_shards: usize) -> Self {
        self.num_shards = num_shards.max(1);
        self
    }

    pub fn with_order(mut self, order: u16) -> Self {
        self.order = order;
        self
    }
}

impl Default for ShardedConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for a [`crate::index::SecondaryIndex`].
#[derive(Debug, Clone, Copy)]
pub struct IndexConfig {
    pub unique: bool,
    pub num_shards: usize,
}

impl IndexConfig {
    pub fn new(unique: bool) -> Self {
        Self { unique, num_shards: 4 }
    }

    pub fn with_num_shards(mut self, num_shards: usize) -> Self {
        self.num_shards = num_shards.max(1);
        self
    }
}

/// Configuration for a [`crate::store::DurableStore`].
#[derive(Debug, Clone)]
pub struct DurableConfig {
    pub wal_path: PathBuf,
    pub num_shards: usize,
    pub order: u16,
    pub sync_mode: SyncMode,
    pub buffer_size: usize,
}

impl DurableConfig {
    pub fn new(wal_path: impl Into<PathBuf>) -> Self {
        Self {
            wal_path: wal_path.into(),
            num_shards: ShardedConfig::new().num_shards,
            order: 64,
            sync_mode: SyncMode::Batch(100),
            buffer_size: 64 * 1024,
        }
    }

    pub fn with_num_shards(mut self, num_shards: usize) -> Self {
        self.num_shards = num_shards.max(1);
        self
    }

    pub fn with_order(mut self, order: u16) -> Self {
        self.order = order;
        self
    }

    pub fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = sync_mode;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }
}
