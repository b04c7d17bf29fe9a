// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! A secondary index: an auxiliary `index_key -> primary_key(s)` mapping
//! maintained alongside a primary store.
//!
//! ## Example
//! ```rust
//! use bkv::index::{Extractor, SecondaryIndex};
//!
//! let by_name = SecondaryIndex::new("by_name", Extractor::Prefix(4), true, 4)?;
//! by_name.index(b"pk-1", b"alicexyz")?;
//! assert_eq!(by_name.find_one(b"alic"), Some(b"pk-1".to_vec()));
//! # Ok::<(), bkv::error::BkvError>(())
//! ```

use crate::config::IndexConfig;
use crate::error::{BkvError, BkvResult};
use crate::index::extractor::Extractor;
use crate::sharded::ShardedTree;

fn encode_pk_list(pks: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + pks.iter().map(|pk| 4 + pk.len()).sum::<usize>());
    out.extend_from_slice(&(pks.len() as u32).to_le_bytes());
    for pk in pks {
        out.extend_from_slice(&(pk.len() as u32).to_le_bytes());
        out.extend_from_slice(pk);
    }
    out
}

fn decode_pk_list(bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    if bytes.len() < 4 {
        return out;
    }
    let count = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
    let mut i = 4;
    for _ in 0..count {
        if i + 4 > bytes.len() {
            break;
        }
        let len = u32::from_le_bytes(bytes[i..i + 4].try_into().unwrap()) as usize;
        i += 4;
        if i + len > bytes.len() {
            break;
        }
        out.push(bytes[i..i + len].to_vec());
        i += len;
    }
    out
}

/// An auxiliary index owning its own internal [`ShardedTree`].
///
/// Unique indexes store a direct `index_key -> primary_key` mapping.
/// Non-unique indexes store `index_key -> encoded primary_key list`
/// (`count:u32 | (len:u32 | key_bytes)` repeated `count` times).
pub struct SecondaryIndex {
    name: String,
    extractor: Extractor,
    unique: bool,
    tree: ShardedTree,
}

impl SecondaryIndex {
    pub fn new(name: impl Into<String>, extractor: Extractor, unique: bool, num_shards: usize) -> BkvResult<Self> {
        Ok(Self {
            name: name.into(),
            extractor,
            unique,
            tree: ShardedTree::new(num_shards, 64)?,
        })
    }

    /// Create a `SecondaryIndex` from an [`IndexConfig`].
    pub fn with_config(name: impl Into<String>, extractor: Extractor, config: IndexConfig) -> BkvResult<Self> {
        Self::new(name, extractor, config.unique, config.num_shards)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Index `(pk, value)`. A no-op if the extractor returns no key for
    /// `value`. Re-indexing a pk already listed under the derived key is
    /// idempotent.
    pub fn index(&self, pk: &[u8], value: &[u8]) -> BkvResult<()> {
        let Some(key) = self.extractor.extract(value) else {
            return Ok(());
        };

        if self.unique {
            if let Some(existing_pk) = self.tree.find(&key) {
                if existing_pk != pk {
                    return Err(BkvError::UniqueConstraintViolation {
                        index: self.name.clone(),
                        reason: "index key already mapped to a different primary key".to_string(),
                    });
                }
                return Ok(());
            }
            self.tree.insert(key, pk.to_vec());
        } else {
            let mut pks = self.tree.find(&key).map(|raw| decode_pk_list(&raw)).unwrap_or_default();
            if !pks.iter().any(|existing| existing.as_slice() == pk) {
                pks.push(pk.to_vec());
                self.tree.insert(key, encode_pk_list(&pks));
            }
        }
        Ok(())
    }

    /// Inverse of [`index`](Self::index): drop `pk` from the entry derived
    /// from `value`. Removing the last pk for a key deletes the entry.
    pub fn remove(&self, pk: &[u8], value: &[u8]) -> BkvResult<()> {
        let Some(key) = self.extractor.extract(value) else {
            return Ok(());
        };

        if self.unique {
            if self.tree.find(&key).as_deref() == Some(pk) {
                self.tree.delete(&key);
            }
        } else if let Some(raw) = self.tree.find(&key) {
            let mut pks = decode_pk_list(&raw);
            if let Some(pos) = pks.iter().position(|existing| existing.as_slice() == pk) {
                pks.remove(pos);
                if pks.is_empty() {
                    self.tree.delete(&key);
                } else {
                    self.tree.insert(key, encode_pk_list(&pks));
                }
            }
        }
        Ok(())
    }

    /// If the extracted keys of `old` and `new` are equal, a no-op.
    /// Otherwise `remove(pk, old)` followed by `index(pk, new)`.
    pub fn update(&self, pk: &[u8], old: &[u8], new: &[u8]) -> BkvResult<()> {
        if self.extractor.extract(old) == self.extractor.extract(new) {
            return Ok(());
        }
        self.remove(pk, old)?;
        self.index(pk, new)
    }

    /// The single pk mapped to `key`. For a non-unique index this returns
    /// the first pk in the stored list, since no single pk is canonical.
    pub fn find_one(&self, key: &[u8]) -> Option<Vec<u8>> {
        let raw = self.tree.find(key)?;
        if self.unique {
            Some(raw)
        } else {
            decode_pk_list(&raw).into_iter().next()
        }
    }

    /// Every pk mapped to `key`.
    pub fn find_all(&self, key: &[u8]) -> Vec<Vec<u8>> {
        match self.tree.find(key) {
            None => Vec::new(),
            Some(raw) => {
                if self.unique {
                    vec![raw]
                } else {
                    decode_pk_list(&raw)
                }
            }
        }
    }

    /// Every pk whose index-key lies in `[lo, hi]`.
    pub fn find_range(&self, lo: &[u8], hi: &[u8]) -> BkvResult<Vec<Vec<u8>>> {
        let pairs = self.tree.range(lo, hi)?;
        let mut out = Vec::new();
        for (_, raw) in pairs {
            if self.unique {
                out.push(raw);
            } else {
                out.extend(decode_pk_list(&raw));
            }
        }
        Ok(out)
    }

    /// Pre-insert uniqueness check: does indexing `(pk, value)` collide with
    /// a *different* pk already mapped to the same key? A no-op extractor
    /// result, a non-unique index, or an existing mapping to this same pk
    /// all pass.
    pub fn check_unique(&self, pk: &[u8], value: &[u8]) -> BkvResult<()> {
        if !self.unique {
            return Ok(());
        }
        let Some(key) = self.extractor.extract(value) else {
            return Ok(());
        };
        match self.tree.find(&key) {
            Some(existing_pk) if existing_pk != pk => Err(BkvError::UniqueConstraintViolation {
                index: self.name.clone(),
                reason: "index key already mapped to a different primary key".to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Number of distinct index-keys stored.
    pub fn count(&self) -> usize {
        self.tree.count()
    }

    pub fn clear(&self) {
        self.tree.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_index_rejects_duplicate_key() {
        let index = SecondaryIndex::new("by_email", Extractor::Prefix(5), true, 2).unwrap();
        index.index(b"pk-1", b"alice").unwrap();
        let err = index.index(b"pk-2", b"alice").unwrap_err();
        assert!(matches!(err, BkvError::UniqueConstraintViolation { .. }));
    }

    #[test]
    fn unique_reindex_of_same_pk_is_idempotent() {
        let index = SecondaryIndex::new("by_email", Extractor::Prefix(5), true, 2).unwrap();
        index.index(b"pk-1", b"alice").unwrap();
        index.index(b"pk-1", b"alice").unwrap();
        assert_eq!(index.find_one(b"alice"), Some(b"pk-1".to_vec()));
    }

    #[test]
    fn multi_valued_index_accumulates_and_shrinks() {
        let index = SecondaryIndex::new("by_dept", Extractor::Prefix(3), false, 2).unwrap();
        index.index(b"pk-1", b"eng-alice").unwrap();
        index.index(b"pk-2", b"eng-bob").unwrap();
        let mut pks = index.find_all(b"eng");
        pks.sort();
        assert_eq!(pks, vec![b"pk-1".to_vec(), b"pk-2".to_vec()]);

        index.remove(b"pk-1", b"eng-alice").unwrap();
        assert_eq!(index.find_all(b"eng"), vec![b"pk-2".to_vec()]);

        index.remove(b"pk-2", b"eng-bob").unwrap();
        assert_eq!(index.find_all(b"eng"), Vec::<Vec<u8>>::new());
        assert_eq!(index.count(), 0);
    }

    #[test]
    fn update_is_noop_when_key_unchanged() {
        let index = SecondaryIndex::new("by_dept", Extractor::Prefix(3), false, 2).unwrap();
        index.index(b"pk-1", b"eng-alice").unwrap();
        index.update(b"pk-1", b"eng-alice", b"eng-alicia").unwrap();
        assert_eq!(index.find_all(b"eng"), vec![b"pk-1".to_vec()]);
    }

    #[test]
    fn update_moves_pk_between_keys() {
        let index = SecondaryIndex::new("by_dept", Extractor::Prefix(3), false, 2).unwrap();
        index.index(b"pk-1", b"eng-alice").unwrap();
        index.update(b"pk-1", b"eng-alice", b"ops-alice").unwrap();
        assert_eq!(index.find_all(b"eng"), Vec::<Vec<u8>>::new());
        assert_eq!(index.find_all(b"ops"), vec![b"pk-1".to_vec()]);
    }

    #[test]
    fn no_index_key_is_a_noop() {
        let index = SecondaryIndex::new("by_email", Extractor::Offset(100, 4), true, 2).unwrap();
        index.index(b"pk-1", b"short").unwrap();
        assert_eq!(index.count(), 0);
    }

    #[test]
    fn check_unique_passes_for_own_pk_and_fails_for_others() {
        let index = SecondaryIndex::new("by_email", Extractor::Prefix(5), true, 2).unwrap();
        index.index(b"pk-1", b"alice").unwrap();
        assert!(index.check_unique(b"pk-1", b"alice").is_ok());
        assert!(index.check_unique(b"pk-2", b"alice").is_err());
    }

    #[test]
    fn find_range_collects_across_matching_keys() {
        let index = SecondaryIndex::new("by_prefix", Extractor::Prefix(1), false, 2).unwrap();
        index.index(b"pk-a", b"apple").unwrap();
        index.index(b"pk-b", b"banana").unwrap();
        index.index(b"pk-c", b"cherry").unwrap();
        let mut pks = index.find_range(b"a", b"b").unwrap();
        pks.sort();
        assert_eq!(pks, vec![b"pk-a".to_vec(), b"pk-b".to_vec()]);
    }
}
