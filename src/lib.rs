// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! bkv - an in-memory, embeddable, ordered key-value store.
//!
//! Built around a concurrent "pure" B-tree — values live at every node
//! level, not just the leaves, so a lookup can return as soon as it finds
//! a match instead of always descending to a leaf. Three composable layers
//! sit on top of the single-tree core:
//!
//! - **sharding** ([`sharded`]): hash-routed fan-out across independent
//!   trees for write scalability.
//! - **durability** ([`wal`], [`store::DurableStore`]): a write-ahead log
//!   for crash recovery.
//! - **secondary indexing** ([`index`], [`store::IndexedStore`]): auxiliary
//!   key-to-primary-key mappings maintained synchronously, with optional
//!   uniqueness constraints.
//!
//! ## Quick Start
//!
//! ```rust
//! use bkv::Tree;
//!
//! let tree = Tree::new(64)?;
//! tree.insert(b"alice".to_vec(), b"engineer".to_vec());
//! assert_eq!(tree.find(b"alice"), Some(b"engineer".to_vec()));
//! # Ok::<(), bkv::error::BkvError>(())
//! ```
//!
//! ## Architecture
//!
//! - [`btree`]: the single-tree building block.
//! - [`sharded`]: hash-partitioned fan-out over independent trees.
//! - [`wal`]: the write-ahead log.
//! - [`index`]: extractors and secondary indexes.
//! - [`store`]: `IndexedStore` and `DurableStore`, composing the above.
//! - [`config`]: plain configuration structs for every layer.
//! - [`error`]: the crate's error type.

pub mod btree;
pub mod config;
pub mod error;
pub mod index;
pub mod sharded;
pub mod store;
pub mod wal;

// Re-export commonly used types
pub use btree::{Order, Tree};
pub use error::{BkvError, BkvResult};
pub use index::{Extractor, SecondaryIndex};
pub use sharded::{ShardedStats, ShardedTree};
pub use store::{DurableStats, DurableStore, IndexedStore};
pub use wal::{SyncMode, WalConfig, WalStats, WriteAheadLog};
