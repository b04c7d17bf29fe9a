// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Write-ahead log: the durability layer that lets a [`crate::store::DurableStore`]
//! recover tree state after a crash.
//!
//! ```text
//! caller -> append(op, key, value) -> fsync policy -> on-disk frame
//!                                                          |
//!                                              replay(applier) on reopen
//! ```
//!
//! Every mutation is appended here *before* it is applied to the tree; on
//! recovery, replaying the log from scratch reproduces exactly the set of
//! mutations that were durable at the moment of the crash.

mod log;
mod record;

pub use log::{SyncMode, WalConfig, WalStats, WriteAheadLog};
pub use record::{WalOp, WalRecord};
