// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Secondary indexing: auxiliary `index_key -> primary_key(s)` mappings
//! kept synchronously up to date with a primary store.
//!
//! ```text
//! primary record (pk, value) ──extractor──▶ index_key ──▶ SecondaryIndex tree
//! ```
//!
//! See [`crate::store::IndexedStore`] for the composition that keeps a
//! primary [`crate::sharded::ShardedTree`] and a set of named
//! `SecondaryIndex`es consistent under concurrent mutation.

mod extractor;
mod secondary;

pub use extractor::Extractor;
pub use secondary::SecondaryIndex;
