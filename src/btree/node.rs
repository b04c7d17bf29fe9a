// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Node representation for the in-memory pure B-tree.
//!
//! Unlike a B+-tree, values live at every level: an internal node carries a
//! value alongside each of its separator keys, so a lookup can return as
//! soon as it finds a matching key instead of always descending to a leaf.

/// A single node of the tree.
///
/// `keys[i]` and `values[i]` are paired. For an internal node,
/// `children.len() == keys.len() + 1`; `children[i]` holds keys less than
/// `keys[i]` and `children[i + 1]` holds keys greater than or equal to
/// `keys[i]`.
pub(crate) struct Node {
    pub(crate) keys: Vec<Vec<u8>>,
    pub(crate) values: Vec<Vec<u8>>,
    pub(crate) children: Vec<Box<Node>>,
}

impl Node {
    pub(crate) fn new_leaf() -> Self {
        Self {
            keys: Vec::new(),
            values: Vec::new(),
            children: Vec::new(),
        }
    }

    pub(crate) fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    /// Binary search for `key` among this node's keys.
    ///
    /// `Ok(i)` means `keys[i] == key`. `Err(i)` means `key` would sit at
    /// index `i`, i.e. `children[i]` is the subtree to descend into.
    ///
    /// Keys compare as unsigned byte sequences (`Vec<u8>`'s natural `Ord`
    /// already is lexicographic byte order, with a shorter prefix sorting
    /// before a longer sequence that extends it).
    pub(crate) fn search(&self, key: &[u8]) -> Result<usize, usize> {
        self.keys.binary_search_by(|probe| probe.as_slice().cmp(key))
    }
}
