// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A write stall controller for LSM-tree storage engines. It features:
//!
//! - `RocksDB`-compatible stall causes, conditions and thresholds
//! - 100% safe & stable Rust
//! - Per-column-family and database-wide stall scopes
//! - Single atomic load per scope on the write path
//! - Incremental delay schedule for throttled writes
//! - Stable, hyphenated statistic names for monitoring
//!
//! It is not:
//!
//! - a storage engine: it never flushes, compacts or allocates anything itself
//! - a rate limiter: a throttled write maps to one bounded sleep, not a token bucket
//!
//! The flush and compaction machinery of the engine reports resource levels
//! (unflushed memtable count, L0 file count, compaction backlog, write buffer
//! memory) and the controller classifies each scope as `Normal`, `Delayed` or
//! `Stopped`. The write path asks the controller before every write and is
//! admitted, throttled or blocked until background work catches up.
//!
//! ```
//! use write_stall::{ControllerOptions, StallController, StallThresholds, WriteStallCondition};
//!
//! // One controller per database
//! let controller = StallController::new(
//!     ControllerOptions::default().db_write_buffer_size(/* 256 MiB */ 256 * 1_024 * 1_024),
//! );
//!
//! // Each column family is classified against its own thresholds
//! let items = controller.column_family("items", StallThresholds::default());
//!
//! // Background maintenance reports resource levels...
//! items.set_memtable_count(1);
//! items.set_l0_file_count(4);
//!
//! // ...and the write path asks before every write
//! assert_eq!(WriteStallCondition::Normal, controller.effective_condition(&items));
//! controller.wait_for_write(&items)?;
//!
//! // When a scope degrades, writes are throttled or stopped
//! items.set_l0_file_count(20);
//! assert_eq!(WriteStallCondition::Delayed, controller.effective_condition(&items));
//! #
//! # Ok::<_, write_stall::Error>(())
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]

mod cause;
mod cf_name;
mod column_family;
mod condition;
mod controller;
mod error;
mod evaluator;
mod gate;
mod snapshot;
pub mod stat_name;
mod state;
mod stats;
mod stop_signal;
mod thresholds;
mod write_buffer_manager;
mod write_delay;

pub(crate) type HashMap<K, V> = std::collections::HashMap<K, V, xxhash_rust::xxh3::Xxh3Builder>;

pub use {
    cause::WriteStallCause,
    cf_name::{is_valid_cf_name, CfName},
    column_family::ColumnFamily,
    condition::WriteStallCondition,
    controller::{ControllerOptions, StallController},
    error::{Error, Result},
    snapshot::ResourceSnapshot,
    stop_signal::StopSignal,
    thresholds::StallThresholds,
    write_buffer_manager::WriteBufferManager,
};
