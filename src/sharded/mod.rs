// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Hash-partitioned fan-out over independent [`Tree`]s.
//!
//! ```text
//!   key ──FNV-1a──▶ shard index ──▶ Tree[shard]
//! ```
//!
//! Each shard is a fully independent [`Tree`] behind its own `RwLock`, so
//! writers to different shards never contend with each other. There is no
//! cross-shard atomicity: a `bulk_insert` that touches two shards is not a
//! single transaction, and `range`/`delete_range`/`for_each` fan out to
//! every shard and merge results rather than taking a consistent snapshot
//! across shards.

use crate::btree::Tree;
use crate::config::ShardedConfig;
use crate::error::{BkvError, BkvResult};
use std::sync::atomic::{AtomicU64, Ordering};

/// FNV-1a 32-bit offset basis.
const FNV_OFFSET: u32 = 0x811C_9DC5;
/// FNV-1a 32-bit prime.
const FNV_PRIME: u32 = 0x0100_0193;

/// Hash `bytes` with FNV-1a, used to route keys to shards.
pub fn fnv1a32(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET;
    for &byte in bytes {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Aggregate and per-shard statistics for a [`ShardedTree`].
///
/// Counters are maintained with relaxed atomics and carry no
/// synchronization with the data itself: a snapshot can be taken mid-write
/// and may not add up perfectly under concurrent mutation.
#[derive(Debug, Clone)]
pub struct ShardedStats {
    pub total_inserts: u64,
    pub total_finds: u64,
    pub total_deletes: u64,
    pub per_shard_len: Vec<usize>,
    pub min_occupancy: usize,
    pub max_occupancy: usize,
    /// Coefficient of variation of per-shard key counts (stddev / mean),
    /// `0.0` when there is one shard or all shards are empty.
    pub occupancy_skew: f64,
}

/// A fixed set of independent [`Tree`]s, indexed by `fnv1a32(key) % shards`.
///
/// ## Example
/// ```rust
/// use bkv::sharded::ShardedTree;
///
/// let store = ShardedTree::new(8, 32)?;
/// store.insert(b"alice".to_vec(), b"1".to_vec());
/// assert_eq!(store.find(b"alice"), Some(b"1".to_vec()));
/// # Ok::<(), bkv::error::BkvError>(())
/// ```
pub struct ShardedTree {
    shards: Vec<Tree>,
    inserts: Vec<AtomicU64>,
    finds: Vec<AtomicU64>,
    deletes: Vec<AtomicU64>,
}

impl ShardedTree {
    /// Create `num_shards` independent trees, each with branching factor
    /// `order`. `num_shards` is clamped to at least 1.
    pub fn new(num_shards: usize, order: u16) -> BkvResult<Self> {
        let num_shards = num_shards.max(1);
        let mut shards = Vec::with_capacity(num_shards);
        for _ in 0..num_shards {
            shards.push(Tree::new(order)?);
        }
        Ok(Self {
            shards,
            inserts: (0..num_shards).map(|_| AtomicU64::new(0)).collect(),
            finds: (0..num_shards).map(|_| AtomicU64::new(0)).collect(),
            deletes: (0..num_shards).map(|_| AtomicU64::new(0)).collect(),
        })
    }

    /// Create a `ShardedTree` from a [`ShardedConfig`].
    pub fn with_config(config: ShardedConfig) -> BkvResult<Self> {
        Self::new(config.num_shards, config.order)
    }

    /// Number of shards.
    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    /// The shard index `key` is routed to.
    pub fn shard_index(&self, key: &[u8]) -> usize {
        (fnv1a32(key) as usize) % self.shards.len()
    }

    /// Direct access to one shard's tree, by index.
    pub fn shard(&self, index: usize) -> &Tree {
        &self.shards[index]
    }

    pub fn find(&self, key: &[u8]) -> Option<Vec<u8>> {
        let idx = self.shard_index(key);
        self.finds[idx].fetch_add(1, Ordering::Relaxed);
        self.shards[idx].find(key)
    }

    /// Alias for [`find`](Self::find).
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.find(key)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.shards[self.shard_index(key)].contains_key(key)
    }

    pub fn insert(&self, key: Vec<u8>, value: Vec<u8>) -> Option<Vec<u8>> {
        let idx = self.shard_index(&key);
        self.inserts[idx].fetch_add(1, Ordering::Relaxed);
        self.shards[idx].insert(key, value)
    }

    /// Alias for [`insert`](Self::insert), matching the external naming
    /// convention used by the composite stores.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Option<Vec<u8>> {
        self.insert(key, value)
    }

    /// Remove `key`. Returns `true` if the key existed.
    pub fn delete(&self, key: &[u8]) -> bool {
        let idx = self.shard_index(key);
        self.deletes[idx].fetch_add(1, Ordering::Relaxed);
        self.shards[idx].delete(key)
    }

    /// Total number of keys across all shards.
    pub fn count(&self) -> usize {
        std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .shards
                .iter()
                .map(|shard| scope.spawn(|| shard.len()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        })
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Range query fanned out in parallel across every shard, merged and
    /// sorted by key.
    pub fn range(&self, lo: &[u8], hi: &[u8]) -> BkvResult<Vec<(Vec<u8>, Vec<u8>)>> {
        if lo > hi {
            return Err(BkvError::InvalidRange);
        }
        let per_shard: Vec<Vec<(Vec<u8>, Vec<u8>)>> = std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .shards
                .iter()
                .map(|shard| scope.spawn(move || shard.range(lo, hi).unwrap_or_default()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        let mut merged: Vec<(Vec<u8>, Vec<u8>)> = per_shard.into_iter().flatten().collect();
        merged.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(merged)
    }

    /// `delete_range` fanned out across every shard; returns the total
    /// number of keys deleted.
    pub fn delete_range(&self, lo: &[u8], hi: &[u8]) -> BkvResult<usize> {
        if lo > hi {
            return Err(BkvError::InvalidRange);
        }
        let counts: Vec<usize> = std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .shards
                .iter()
                .map(|shard| scope.spawn(move || shard.delete_range(lo, hi).unwrap_or(0)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        Ok(counts.into_iter().sum())
    }

    /// Visit every key-value pair across all shards. Per-shard order is
    /// ascending; there is no cross-shard ordering guarantee.
    pub fn for_each(&self, mut f: impl FnMut(&[u8], &[u8])) {
        for shard in &self.shards {
            shard.for_each(&mut f);
        }
    }

    /// Remove every entry from every shard and reset counters.
    pub fn clear(&self) {
        for shard in &self.shards {
            shard.clear();
        }
        for counter in self.inserts.iter().chain(&self.finds).chain(&self.deletes) {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Insert many entries, pre-grouped by shard to minimize cross-shard
    /// work. Not atomic across shards: a panic partway through can leave
    /// some shards updated and others not.
    ///
    /// ## Error Conditions
    /// - `MismatchedBulkLengths`: `keys.len() != values.len()`
    pub fn bulk_insert(&self, keys: Vec<Vec<u8>>, values: Vec<Vec<u8>>) -> BkvResult<()> {
        if keys.len() != values.len() {
            return Err(BkvError::MismatchedBulkLengths {
                keys: keys.len(),
                values: values.len(),
            });
        }
        let mut grouped: Vec<(Vec<Vec<u8>>, Vec<Vec<u8>>)> =
            (0..self.shards.len()).map(|_| (Vec::new(), Vec::new())).collect();
        for (key, value) in keys.into_iter().zip(values.into_iter()) {
            let idx = self.shard_index(&key);
            grouped[idx].0.push(key);
            grouped[idx].1.push(value);
        }
        for (idx, (keys, values)) in grouped.into_iter().enumerate() {
            if keys.is_empty() {
                continue;
            }
            self.inserts[idx].fetch_add(keys.len() as u64, Ordering::Relaxed);
            self.shards[idx].bulk_insert(keys, values)?;
        }
        Ok(())
    }

    /// Aggregate and per-shard size/operation-count snapshot.
    pub fn stats(&self) -> ShardedStats {
        let per_shard_len: Vec<usize> = self.shards.iter().map(Tree::len).collect();
        let min_occupancy = per_shard_len.iter().copied().min().unwrap_or(0);
        let max_occupancy = per_shard_len.iter().copied().max().unwrap_or(0);
        let n = per_shard_len.len() as f64;
        let mean = per_shard_len.iter().sum::<usize>() as f64 / n;
        let variance = if mean > 0.0 {
            per_shard_len
                .iter()
                .map(|&len| {
                    let diff = len as f64 - mean;
                    diff * diff
                })
                .sum::<f64>()
                / n
        } else {
            0.0
        };
        let occupancy_skew = if mean > 0.0 { variance.sqrt() / mean } else { 0.0 };
        ShardedStats {
            total_inserts: self.inserts.iter().map(|c| c.load(Ordering::Relaxed)).sum(),
            total_finds: self.finds.iter().map(|c| c.load(Ordering::Relaxed)).sum(),
            total_deletes: self.deletes.iter().map(|c| c.load(Ordering::Relaxed)).sum(),
            per_shard_len,
            min_occupancy,
            max_occupancy,
            occupancy_skew,
        }
    }
}
