// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Composes a primary [`ShardedTree`] with a named set of
//! [`SecondaryIndex`]es, keeping both consistent on every mutation.

use crate::config::ShardedConfig;
use crate::error::{BkvError, BkvResult};
use crate::index::{Extractor, SecondaryIndex};
use crate::sharded::ShardedTree;
use std::collections::HashMap;
use std::sync::RwLock;

/// A primary store with synchronously maintained secondary indexes.
///
/// The index map is guarded by its own `RwLock`, separate from whatever
/// internal locking each shard's [`crate::btree::Tree`] performs: mutating
/// operations take a read-lock on the map (to snapshot which indexes
/// exist) while `create_index`/`drop_index` take the write-lock.
pub struct IndexedStore {
    primary: ShardedTree,
    indexes: RwLock<HashMap<String, SecondaryIndex>>,
}

impl IndexedStore {
    pub fn new(num_shards: usize, order: u16) -> BkvResult<Self> {
        Ok(Self {
            primary: ShardedTree::new(num_shards, order)?,
            indexes: RwLock::new(HashMap::new()),
        })
    }

    /// Create an `IndexedStore` whose primary tree is built from a
    /// [`ShardedConfig`].
    pub fn with_config(config: ShardedConfig) -> BkvResult<Self> {
        Ok(Self { primary: ShardedTree::with_config(config)?, indexes: RwLock::new(HashMap::new()) })
    }

    /// Register a new secondary index. The index starts empty: existing
    /// primary records are not retroactively indexed (see
    /// [`create_index_with_rebuild`](Self::create_index_with_rebuild)).
    pub fn create_index(
        &self,
        name: impl Into<String>,
        extractor: Extractor,
        unique: bool,
        num_shards: usize,
    ) -> BkvResult<()> {
        let name = name.into();
        let mut indexes = self.indexes.write().unwrap();
        if indexes.contains_key(&name) {
            return Err(BkvError::IndexAlreadyExists { name });
        }
        let index = SecondaryIndex::new(name.clone(), extractor, unique, num_shards)?;
        indexes.insert(name, index);
        Ok(())
    }

    /// Like [`create_index`](Self::create_index), but walks every existing
    /// primary record through the new index. The first rejection (e.g. a
    /// uniqueness collision among existing records) drops the new index
    /// entirely and surfaces the error, leaving the index set unchanged.
    pub fn create_index_with_rebuild(
        &self,
        name: impl Into<String>,
        extractor: Extractor,
        unique: bool,
        num_shards: usize,
    ) -> BkvResult<()> {
        let name = name.into();
        self.create_index(name.clone(), extractor, unique, num_shards)?;

        let mut rebuild_error = None;
        self.primary.for_each(|key, value| {
            if rebuild_error.is_some() {
                return;
            }
            let indexes = self.indexes.read().unwrap();
            if let Some(index) = indexes.get(&name) {
                if let Err(e) = index.index(key, value) {
                    rebuild_error = Some(e);
                }
            }
        });

        if let Some(err) = rebuild_error {
            self.indexes.write().unwrap().remove(&name);
            return Err(err);
        }
        Ok(())
    }

    /// Remove a secondary index. The primary tree is untouched.
    pub fn drop_index(&self, name: &str) -> BkvResult<()> {
        let mut indexes = self.indexes.write().unwrap();
        if indexes.remove(name).is_none() {
            return Err(BkvError::IndexNotFound { name: name.to_string() });
        }
        Ok(())
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.indexes.read().unwrap().contains_key(name)
    }

    pub fn list_indexes(&self) -> Vec<String> {
        self.indexes.read().unwrap().keys().cloned().collect()
    }

    /// Insert `(pk, value)`.
    ///
    /// 1. Snapshot the index set under a read-lock.
    /// 2. For each unique index, reject if the derived key already maps to
    ///    a different pk.
    /// 3. Insert into the primary tree.
    /// 4. Apply `index(pk, value)` to every index; a late collision (a
    ///    concurrent insert won the race between steps 2 and 4) rolls back
    ///    the primary insert before the error is returned.
    pub fn insert(&self, pk: Vec<u8>, value: Vec<u8>) -> BkvResult<Option<Vec<u8>>> {
        let indexes = self.indexes.read().unwrap();
        for index in indexes.values() {
            index.check_unique(&pk, &value)?;
        }

        let previous = self.primary.insert(pk.clone(), value.clone());

        for index in indexes.values() {
            if let Err(e) = index.index(&pk, &value) {
                // Roll back: the delete must complete before the error is
                // surfaced, so a caller that retries never observes the
                // half-applied insert.
                self.primary.delete(&pk);
                return Err(e);
            }
        }
        Ok(previous)
    }

    /// Alias for [`insert`](Self::insert).
    pub fn put(&self, pk: Vec<u8>, value: Vec<u8>) -> BkvResult<Option<Vec<u8>>> {
        self.insert(pk, value)
    }

    /// Update the value stored at `pk`, maintaining every index.
    ///
    /// Fails with [`BkvError::NotFound`] if `pk` is absent. Unique indexes
    /// are checked against the new value before the primary tree is
    /// overwritten.
    pub fn update(&self, pk: &[u8], new_value: Vec<u8>) -> BkvResult<Vec<u8>> {
        let indexes = self.indexes.read().unwrap();
        let old_value = self.primary.find(pk).ok_or_else(|| BkvError::NotFound {
            key: String::from_utf8_lossy(pk).into_owned(),
        })?;

        for index in indexes.values() {
            index.check_unique(pk, &new_value)?;
        }

        self.primary.insert(pk.to_vec(), new_value.clone());

        for index in indexes.values() {
            index.update(pk, &old_value, &new_value)?;
        }
        Ok(old_value)
    }

    /// Delete `pk`. Returns `false` (without touching any index) if `pk`
    /// was absent.
    pub fn delete(&self, pk: &[u8]) -> BkvResult<bool> {
        let indexes = self.indexes.read().unwrap();
        let Some(value) = self.primary.find(pk) else {
            return Ok(false);
        };
        let deleted = self.primary.delete(pk);
        if deleted {
            for index in indexes.values() {
                index.remove(pk, &value)?;
            }
        }
        Ok(deleted)
    }

    pub fn find(&self, pk: &[u8]) -> Option<Vec<u8>> {
        self.primary.find(pk)
    }

    /// Alias for [`find`](Self::find).
    pub fn get(&self, pk: &[u8]) -> Option<Vec<u8>> {
        self.find(pk)
    }

    pub fn contains_key(&self, pk: &[u8]) -> bool {
        self.primary.contains_key(pk)
    }

    pub fn range(&self, lo: &[u8], hi: &[u8]) -> BkvResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.primary.range(lo, hi)
    }

    /// Insert many `(pk, value)` pairs, maintaining every index.
    ///
    /// Mirrors [`insert`](Self::insert)'s protocol over the whole batch:
    /// every unique index is checked against every incoming pair before
    /// anything is written, the batch is applied to the primary tree, then
    /// each pair is indexed. A collision during that last step rolls the
    /// entire batch back out of the primary tree before the error is
    /// returned.
    pub fn bulk_insert(&self, keys: Vec<Vec<u8>>, values: Vec<Vec<u8>>) -> BkvResult<()> {
        if keys.len() != values.len() {
            return Err(BkvError::MismatchedBulkLengths { keys: keys.len(), values: values.len() });
        }
        let indexes = self.indexes.read().unwrap();
        for (key, value) in keys.iter().zip(values.iter()) {
            for index in indexes.values() {
                index.check_unique(key, value)?;
            }
        }

        self.primary.bulk_insert(keys.clone(), values.clone())?;

        for (key, value) in keys.iter().zip(values.iter()) {
            for index in indexes.values() {
                if let Err(e) = index.index(key, value) {
                    for key in &keys {
                        self.primary.delete(key);
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Delete every key in `[lo, hi]`, maintaining every index.
    ///
    /// Snapshots the doomed `(pk, value)` pairs before deleting so each
    /// index can be told what to remove, since `ShardedTree::delete_range`
    /// itself reports only a count.
    pub fn delete_range(&self, lo: &[u8], hi: &[u8]) -> BkvResult<usize> {
        let indexes = self.indexes.read().unwrap();
        let doomed = self.primary.range(lo, hi)?;
        let deleted = self.primary.delete_range(lo, hi)?;
        for (pk, value) in &doomed {
            for index in indexes.values() {
                index.remove(pk, value)?;
            }
        }
        Ok(deleted)
    }

    pub fn count(&self) -> usize {
        self.primary.count()
    }

    pub fn for_each(&self, f: impl FnMut(&[u8], &[u8])) {
        self.primary.for_each(f);
    }

    /// Clear the primary tree and every registered index.
    pub fn clear(&self) {
        self.primary.clear();
        for index in self.indexes.read().unwrap().values() {
            index.clear();
        }
    }
}
