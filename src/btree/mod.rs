// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! The single-tree building block: an in-memory, ordered, pure B-tree.
//!
//! "Pure" here means values live at every level of the tree, not only at
//! the leaves — see [`tree`] for why that matters for lookups.

mod node;
mod order;
mod tree;

pub use order::Order;
pub use tree::Tree;
