// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Composite stores layering indexing and durability on top of
//! [`crate::sharded::ShardedTree`].
//!
//! The two layers are independent and can be combined by an application
//! that needs both (e.g. wrapping a `DurableStore`'s tree access pattern
//! around an `IndexedStore`'s index maintenance) — this crate exposes them
//! separately rather than as a single fused type, since not every caller
//! needs both.

mod durable;
mod indexed;

pub use durable::{DurableStats, DurableStore};
pub use indexed::IndexedStore;
