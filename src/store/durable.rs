// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Composes a [`ShardedTree`] with a [`WriteAheadLog`] for crash-recoverable
//! durability.
//!
//! ```text
//! mutation -> WAL.append (durable) -> apply to tree (in-memory)
//! ```
//!
//! Every mutating operation is written to the WAL before it touches the
//! tree. A crash between those two steps is recovered on the next open: the
//! constructor replays the WAL from scratch and re-drives every record
//! onto a fresh tree.

use crate::config::DurableConfig;
use crate::error::BkvResult;
use crate::sharded::{ShardedStats, ShardedTree};
use crate::wal::{WalConfig, WalOp, WalStats, WriteAheadLog};
use std::path::Path;
use std::sync::RwLock;

/// Combined point-in-time snapshot of the tree and the WAL.
#[derive(Debug, Clone)]
pub struct DurableStats {
    pub tree: ShardedStats,
    pub wal: WalStats,
}

/// A [`ShardedTree`] whose mutations are durable across process restarts.
///
/// A single `RwLock` orders mutations relative to each other and to the
/// WAL: `write()` is held for the append-then-apply sequence of any single
/// mutating call, `read()` for plain reads. This is separate from — and
/// layered above — whatever per-shard locking the tree itself performs.
pub struct DurableStore {
    tree: ShardedTree,
    wal: WriteAheadLog,
    lock: RwLock<()>,
}

impl DurableStore {
    /// Open the WAL (validating or creating its header and recovering its
    /// sequence counter), create a fresh tree, then replay every WAL record
    /// onto it. A replay failure aborts construction.
    pub fn open(config: DurableConfig) -> BkvResult<Self> {
        let wal = WriteAheadLog::open(
            WalConfig::new(config.wal_path.clone())
                .with_sync_mode(config.sync_mode)
                .with_buffer_size(config.buffer_size),
        )?;
        let tree = ShardedTree::new(config.num_shards, config.order)?;

        wal.replay(|record| {
            match record.op {
                WalOp::Insert => {
                    tree.insert(record.key.clone(), record.value.clone());
                }
                WalOp::Delete => {
                    tree.delete(&record.key);
                }
                WalOp::Clear => {
                    tree.clear();
                }
            }
            Ok(())
        })?;

        Ok(Self { tree, wal, lock: RwLock::new(()) })
    }

    pub fn insert(&self, key: Vec<u8>, value: Vec<u8>) -> BkvResult<Option<Vec<u8>>> {
        let _guard = self.lock.write().unwrap();
        self.wal.append_insert(&key, &value)?;
        Ok(self.tree.insert(key, value))
    }

    /// Alias for [`insert`](Self::insert).
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> BkvResult<Option<Vec<u8>>> {
        self.insert(key, value)
    }

    pub fn delete(&self, key: &[u8]) -> BkvResult<bool> {
        let _guard = self.lock.write().unwrap();
        self.wal.append_delete(key)?;
        Ok(self.tree.delete(key))
    }

    pub fn clear(&self) -> BkvResult<()> {
        let _guard = self.lock.write().unwrap();
        self.wal.append_clear()?;
        self.tree.clear();
        Ok(())
    }

    /// Append every record to the WAL, force a sync, then apply all of
    /// them to the tree. Forcing the sync before any tree application
    /// preserves the all-or-nothing property across crashes: a crash
    /// during the WAL-append phase leaves none of the batch durable, and a
    /// crash after the sync guarantees all of it replays.
    pub fn bulk_insert(&self, keys: Vec<Vec<u8>>, values: Vec<Vec<u8>>) -> BkvResult<()> {
        let _guard = self.lock.write().unwrap();
        for (key, value) in keys.iter().zip(values.iter()) {
            self.wal.append_insert(key, value)?;
        }
        self.wal.sync()?;
        self.tree.bulk_insert(keys, values)
    }

    pub fn find(&self, key: &[u8]) -> Option<Vec<u8>> {
        let _guard = self.lock.read().unwrap();
        self.tree.find(key)
    }

    /// Alias for [`find`](Self::find).
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.find(key)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        let _guard = self.lock.read().unwrap();
        self.tree.contains_key(key)
    }

    pub fn range(&self, lo: &[u8], hi: &[u8]) -> BkvResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let _guard = self.lock.read().unwrap();
        self.tree.range(lo, hi)
    }

    /// Delete every key in `[lo, hi]`. Each doomed key is appended to the
    /// WAL as its own delete record, in the same WAL-before-tree order as
    /// every other mutator here, before the range is removed from the tree.
    pub fn delete_range(&self, lo: &[u8], hi: &[u8]) -> BkvResult<usize> {
        let _guard = self.lock.write().unwrap();
        let doomed = self.tree.range(lo, hi)?;
        for (key, _) in &doomed {
            self.wal.append_delete(key)?;
        }
        self.tree.delete_range(lo, hi)
    }

    pub fn count(&self) -> usize {
        let _guard = self.lock.read().unwrap();
        self.tree.count()
    }

    pub fn for_each(&self, f: impl FnMut(&[u8], &[u8])) {
        let _guard = self.lock.read().unwrap();
        self.tree.for_each(f);
    }

    /// Truncate the WAL to just its header. Intended to be called once the
    /// caller has independently persisted the logical state elsewhere;
    /// the tree itself is untouched.
    pub fn checkpoint(&self) -> BkvResult<()> {
        let _guard = self.lock.write().unwrap();
        self.wal.checkpoint()
    }

    /// Force any unsynced WAL appends to stable storage now.
    pub fn sync(&self) -> BkvResult<()> {
        self.wal.sync()
    }

    pub fn close(self) -> BkvResult<()> {
        self.wal.close()
    }

    pub fn stats(&self) -> DurableStats {
        DurableStats { tree: self.tree.stats(), wal: self.wal.stats() }
    }

    pub fn wal_path(&self) -> &Path {
        self.wal.path()
    }

    pub fn wal_sequence(&self) -> u64 {
        self.wal.sequence()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(dir: &tempfile::TempDir, name: &str) -> std::path::PathBuf {
        dir.path().join(name)
    }

    #[test]
    fn insert_and_find_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = temp_path(&dir, "basic.wal");
        let store = DurableStore::open(DurableConfig::new(&path).with_num_shards(2)).unwrap();
        store.insert(b"a".to_vec(), b"1".to_vec()).unwrap();
        assert_eq!(store.find(b"a"), Some(b"1".to_vec()));
    }

    #[test]
    fn reopening_replays_prior_mutations() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = temp_path(&dir, "reopen.wal");
        {
            let store = DurableStore::open(DurableConfig::new(&path).with_num_shards(2)).unwrap();
            store.insert(b"a".to_vec(), b"1".to_vec()).unwrap();
            store.insert(b"b".to_vec(), b"2".to_vec()).unwrap();
            store.delete(b"a").unwrap();
        }

        let reopened = DurableStore::open(DurableConfig::new(&path).with_num_shards(2)).unwrap();
        assert_eq!(reopened.find(b"a"), None);
        assert_eq!(reopened.find(b"b"), Some(b"2".to_vec()));
    }

    #[test]
    fn checkpoint_then_reopen_starts_from_the_persisted_tree_state_only() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = temp_path(&dir, "checkpoint.wal");
        {
            let store = DurableStore::open(DurableConfig::new(&path).with_num_shards(2)).unwrap();
            store.insert(b"a".to_vec(), b"1".to_vec()).unwrap();
            store.checkpoint().unwrap();
            store.insert(b"b".to_vec(), b"2".to_vec()).unwrap();
        }

        // Replay after checkpoint only reproduces post-checkpoint records;
        // a real caller must have persisted "a" -> "1" externally before
        // checkpointing for no data to be lost.
        let reopened = DurableStore::open(DurableConfig::new(&path).with_num_shards(2)).unwrap();
        assert_eq!(reopened.find(b"a"), None);
        assert_eq!(reopened.find(b"b"), Some(b"2".to_vec()));
    }

    #[test]
    fn bulk_insert_is_all_applied_together() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = temp_path(&dir, "bulk.wal");
        let store = DurableStore::open(DurableConfig::new(&path).with_num_shards(2)).unwrap();
        let keys = vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()];
        let values = vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()];
        store.bulk_insert(keys, values).unwrap();
        assert_eq!(store.count(), 3);
    }

    #[test]
    fn delete_range_is_logged_before_removal_and_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = temp_path(&dir, "delete_range.wal");
        {
            let store = DurableStore::open(DurableConfig::new(&path).with_num_shards(2)).unwrap();
            store.insert(b"a".to_vec(), b"1".to_vec()).unwrap();
            store.insert(b"b".to_vec(), b"2".to_vec()).unwrap();
            store.insert(b"c".to_vec(), b"3".to_vec()).unwrap();

            let deleted = store.delete_range(b"a", b"b").unwrap();
            assert_eq!(deleted, 2);
            assert_eq!(store.find(b"c"), Some(b"3".to_vec()));
        }

        let reopened = DurableStore::open(DurableConfig::new(&path).with_num_shards(2)).unwrap();
        assert_eq!(reopened.find(b"a"), None);
        assert_eq!(reopened.find(b"b"), None);
        assert_eq!(reopened.find(b"c"), Some(b"3".to_vec()));
    }
}
