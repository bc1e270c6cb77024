// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Pure classification of resource levels into stall conditions.
//!
//! Each cause is classified independently by a monotonic step
//! function; no cause's condition depends on another's.

use crate::{
    snapshot::ResourceSnapshot, thresholds::StallThresholds, WriteStallCause, WriteStallCondition,
};

/// Conditions of all column-family-scope causes for one snapshot.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct CfClassification {
    pub memtable: WriteStallCondition,
    pub l0: WriteStallCondition,
    pub pending_bytes: WriteStallCondition,
}

impl CfClassification {
    /// The most severe condition over all CF-scope causes.
    pub fn aggregate(self) -> WriteStallCondition {
        self.memtable.max(self.l0).max(self.pending_bytes)
    }

    /// The cause responsible for the aggregate condition, if any.
    ///
    /// Ties break in evaluation order (memtables before L0 before
    /// compaction backlog).
    pub fn binding_cause(self) -> Option<WriteStallCause> {
        let aggregate = self.aggregate();

        if aggregate == WriteStallCondition::Normal {
            return None;
        }

        WriteStallCause::CF_SCOPE
            .into_iter()
            .find(|&cause| self.get(cause) == aggregate)
    }

    /// Condition of a single CF-scope cause.
    ///
    /// # Panics
    ///
    /// Panics when given a DB-scope cause.
    pub fn get(self, cause: WriteStallCause) -> WriteStallCondition {
        match cause {
            WriteStallCause::MemtableLimit => self.memtable,
            WriteStallCause::L0FileCountLimit => self.l0,
            WriteStallCause::PendingCompactionBytes => self.pending_bytes,
            WriteStallCause::WriteBufferManagerLimit => {
                panic!("{cause:?} is not a column family scope cause")
            }
        }
    }
}

/// Classifies the unflushed memtable count.
///
/// Stops at `max_write_buffer_number`; throttles one memtable below
/// the ceiling when the ceiling is above 3. The classification is a
/// pure function of the count, so it only leaves `Stopped` once a
/// flush has actually retired a memtable.
pub(crate) fn classify_memtable_count(
    count: usize,
    thresholds: &StallThresholds,
) -> WriteStallCondition {
    let ceiling = thresholds.max_write_buffer_number;

    if ceiling == 0 {
        return WriteStallCondition::Normal;
    }

    if count >= ceiling {
        WriteStallCondition::Stopped
    } else if ceiling > 3 && count >= ceiling - 1 {
        WriteStallCondition::Delayed
    } else {
        WriteStallCondition::Normal
    }
}

/// Classifies the L0 file count.
///
/// The stop trigger is checked first, so an inverted slowdown/stop
/// pair stops at the lower of the two values and never delays.
pub(crate) fn classify_l0_file_count(
    count: usize,
    thresholds: &StallThresholds,
) -> WriteStallCondition {
    if thresholds.disable_auto_compactions {
        return WriteStallCondition::Normal;
    }

    let stop = thresholds.level0_stop_writes_trigger;
    let slowdown = thresholds.level0_slowdown_writes_trigger;

    if stop > 0 && count >= stop {
        WriteStallCondition::Stopped
    } else if slowdown > 0 && count >= slowdown {
        WriteStallCondition::Delayed
    } else {
        WriteStallCondition::Normal
    }
}

/// Classifies the compaction backlog estimate.
///
/// Same shape as the L0 classifier, including the inverted-pair
/// behavior for soft/hard limits.
pub(crate) fn classify_pending_compaction_bytes(
    bytes: u64,
    thresholds: &StallThresholds,
) -> WriteStallCondition {
    if thresholds.disable_auto_compactions {
        return WriteStallCondition::Normal;
    }

    let hard = thresholds.hard_pending_compaction_bytes_limit;
    let soft = thresholds.soft_pending_compaction_bytes_limit;

    if hard > 0 && bytes >= hard {
        WriteStallCondition::Stopped
    } else if soft > 0 && bytes >= soft {
        WriteStallCondition::Delayed
    } else {
        WriteStallCondition::Normal
    }
}

/// Classifies global write buffer usage against the manager's limit.
///
/// This cause is binary: usage exceeding the limit stops writes,
/// there is no delay band.
pub(crate) fn classify_write_buffer_usage(usage: u64, limit: u64) -> WriteStallCondition {
    if limit > 0 && usage > limit {
        WriteStallCondition::Stopped
    } else {
        WriteStallCondition::Normal
    }
}

/// Classifies a full column family resource snapshot.
pub(crate) fn classify_cf(
    snapshot: &ResourceSnapshot,
    thresholds: &StallThresholds,
) -> CfClassification {
    CfClassification {
        memtable: classify_memtable_count(snapshot.memtable_count, thresholds),
        l0: classify_l0_file_count(snapshot.l0_file_count, thresholds),
        pending_bytes: classify_pending_compaction_bytes(
            snapshot.pending_compaction_bytes,
            thresholds,
        ),
    }
}
