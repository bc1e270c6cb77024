// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Stable names for the stall statistics map.
//!
//! Every key exported here is part of a persisted, externally reported
//! vocabulary. Existing names must never be changed.

use crate::{WriteStallCause, WriteStallCondition};

/// Sentinel token for values outside the taxonomy.
pub const INVALID: &str = "invalid";

/// Number of transitions into `Stopped`, summed over a scope's causes.
pub const TOTAL_STOPS: &str = "total-stops";

/// Number of transitions into `Delayed`, summed over a scope's causes.
pub const TOTAL_DELAYS: &str = "total-delays";

/// Number of L0-file-count delays that began while a compaction was
/// already running in the column family.
///
/// An L0 stall *without* ongoing compaction points at a starved
/// compaction scheduler, which is a different failure mode than
/// compaction simply not keeping up.
pub const CF_L0_FILE_COUNT_LIMIT_DELAYS_WITH_ONGOING_COMPACTION: &str =
    "cf-l0-file-count-limit-delays-with-ongoing-compaction";

/// Number of L0-file-count stops that began while a compaction was
/// already running in the column family.
pub const CF_L0_FILE_COUNT_LIMIT_STOPS_WITH_ONGOING_COMPACTION: &str =
    "cf-l0-file-count-limit-stops-with-ongoing-compaction";

/// Builds the stats map key for a (cause, condition) pair,
/// e.g. `"l0-file-count-limit-delays"`.
///
/// `Normal` never appears in a stats map; passing it yields the
/// `"invalid"` condition token.
///
/// # Panics
///
/// Panics if the cause belongs to neither scope. That cannot happen
/// for any current cause and would mean a cause was added without
/// updating the scope boundaries.
#[must_use]
pub fn stat_key(cause: WriteStallCause, condition: WriteStallCondition) -> String {
    assert!(
        cause.is_cf_scope() || cause.is_db_scope(),
        "write stall cause belongs to no scope"
    );

    format!("{}-{}", cause.as_hyphen_str(), condition.as_hyphen_str())
}
