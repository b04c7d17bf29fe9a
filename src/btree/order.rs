// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Branching factor configuration for [`Tree`](super::tree::Tree).

use crate::error::{BkvError, BkvResult};

/// Branching factor of a [`Tree`](super::tree::Tree): the maximum number of
/// keys a node may hold before it must split.
///
/// ## Constraints
/// - Minimum value: 3 (a node always has room to borrow a key from a
///   sibling without underflowing further)
///
/// ## Example
/// ```rust
/// use bkv::btree::Order;
///
/// let order = Order::new(4)?;
/// assert_eq!(order.max_keys(), 4);
/// assert_eq!(order.min_keys(), 2);
/// # Ok::<(), bkv::error::BkvError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order(u16);

impl Order {
    /// Create a new order with validation.
    ///
    /// ## Error Conditions
    /// - `order < 3`: rejected, since nodes below that size cannot maintain
    ///   the minimum-occupancy invariant after a split.
    pub fn new(order: u16) -> BkvResult<Self> {
        if order < 3 {
            return Err(BkvError::InvalidOrder { order, min: 3 });
        }
        Ok(Self(order))
    }

    /// Maximum number of keys a non-root node may hold, `M`.
    pub fn max_keys(&self) -> u16 {
        self.0
    }

    /// Minimum number of keys a non-root node must hold, `m = M / 2`.
    pub fn min_keys(&self) -> u16 {
        self.0 / 2
    }

    /// The raw configured value.
    pub fn value(&self) -> u16 {
        self.0
    }
}

impl Default for Order {
    fn default() -> Self {
        Self(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_small_orders() {
        assert!(Order::new(0).is_err());
        assert!(Order::new(1).is_err());
        assert!(Order::new(2).is_err());
        assert!(Order::new(3).is_ok());
    }

    #[test]
    fn min_keys_is_half_max() {
        assert_eq!(Order::new(4).unwrap().min_keys(), 2);
        assert_eq!(Order::new(5).unwrap().min_keys(), 2);
        assert_eq!(Order::new(64).unwrap().min_keys(), 32);
    }
}
