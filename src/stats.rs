// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Ephemeral, runtime stall statistics.
//!
//! Counters count transitions *into* a condition, not time spent in
//! it, and there is no counter for recovering to `Normal`. All
//! counters are monotone for the lifetime of their scope.

use crate::{stat_name, HashMap, WriteStallCause, WriteStallCondition};
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

/// Stall counters of one column family.
#[derive(Default)]
pub(crate) struct CfScopeStats {
    memtable_limit_delays: AtomicU64,
    memtable_limit_stops: AtomicU64,

    l0_file_count_limit_delays: AtomicU64,
    l0_file_count_limit_stops: AtomicU64,

    pending_compaction_bytes_limit_delays: AtomicU64,
    pending_compaction_bytes_limit_stops: AtomicU64,

    total_delays: AtomicU64,
    total_stops: AtomicU64,

    l0_delays_with_ongoing_compaction: AtomicU64,
    l0_stops_with_ongoing_compaction: AtomicU64,
}

impl CfScopeStats {
    /// Records one transition into `condition` for a CF-scope cause.
    ///
    /// Callers only invoke this when the condition actually changed;
    /// re-evaluations that land on the same condition are not
    /// transitions and must not reach this.
    pub fn record_transition(
        &self,
        cause: WriteStallCause,
        condition: WriteStallCondition,
        has_ongoing_compaction: bool,
    ) {
        debug_assert!(cause.is_cf_scope());

        let counter = match (cause, condition) {
            (WriteStallCause::MemtableLimit, WriteStallCondition::Delayed) => {
                &self.memtable_limit_delays
            }
            (WriteStallCause::MemtableLimit, WriteStallCondition::Stopped) => {
                &self.memtable_limit_stops
            }
            (WriteStallCause::L0FileCountLimit, WriteStallCondition::Delayed) => {
                &self.l0_file_count_limit_delays
            }
            (WriteStallCause::L0FileCountLimit, WriteStallCondition::Stopped) => {
                &self.l0_file_count_limit_stops
            }
            (WriteStallCause::PendingCompactionBytes, WriteStallCondition::Delayed) => {
                &self.pending_compaction_bytes_limit_delays
            }
            (WriteStallCause::PendingCompactionBytes, WriteStallCondition::Stopped) => {
                &self.pending_compaction_bytes_limit_stops
            }
            // Entering Normal is an exit, not a stall event
            (_, WriteStallCondition::Normal) => return,
            (WriteStallCause::WriteBufferManagerLimit, _) => return,
        };
        counter.fetch_add(1, Relaxed);

        match condition {
            WriteStallCondition::Delayed => {
                self.total_delays.fetch_add(1, Relaxed);

                if cause == WriteStallCause::L0FileCountLimit && has_ongoing_compaction {
                    self.l0_delays_with_ongoing_compaction.fetch_add(1, Relaxed);
                }
            }
            WriteStallCondition::Stopped => {
                self.total_stops.fetch_add(1, Relaxed);

                if cause == WriteStallCause::L0FileCountLimit && has_ongoing_compaction {
                    self.l0_stops_with_ongoing_compaction.fetch_add(1, Relaxed);
                }
            }
            WriteStallCondition::Normal => {}
        }
    }

    /// Exports all counters keyed by their stable names.
    pub fn to_map(&self) -> HashMap<String, u64> {
        let mut map = HashMap::default();

        map.insert(
            stat_name::stat_key(
                WriteStallCause::MemtableLimit,
                WriteStallCondition::Delayed,
            ),
            self.memtable_limit_delays.load(Relaxed),
        );
        map.insert(
            stat_name::stat_key(
                WriteStallCause::MemtableLimit,
                WriteStallCondition::Stopped,
            ),
            self.memtable_limit_stops.load(Relaxed),
        );
        map.insert(
            stat_name::stat_key(
                WriteStallCause::L0FileCountLimit,
                WriteStallCondition::Delayed,
            ),
            self.l0_file_count_limit_delays.load(Relaxed),
        );
        map.insert(
            stat_name::stat_key(
                WriteStallCause::L0FileCountLimit,
                WriteStallCondition::Stopped,
            ),
            self.l0_file_count_limit_stops.load(Relaxed),
        );
        map.insert(
            stat_name::stat_key(
                WriteStallCause::PendingCompactionBytes,
                WriteStallCondition::Delayed,
            ),
            self.pending_compaction_bytes_limit_delays.load(Relaxed),
        );
        map.insert(
            stat_name::stat_key(
                WriteStallCause::PendingCompactionBytes,
                WriteStallCondition::Stopped,
            ),
            self.pending_compaction_bytes_limit_stops.load(Relaxed),
        );

        map.insert(
            stat_name::TOTAL_DELAYS.into(),
            self.total_delays.load(Relaxed),
        );
        map.insert(
            stat_name::TOTAL_STOPS.into(),
            self.total_stops.load(Relaxed),
        );

        map.insert(
            stat_name::CF_L0_FILE_COUNT_LIMIT_DELAYS_WITH_ONGOING_COMPACTION.into(),
            self.l0_delays_with_ongoing_compaction.load(Relaxed),
        );
        map.insert(
            stat_name::CF_L0_FILE_COUNT_LIMIT_STOPS_WITH_ONGOING_COMPACTION.into(),
            self.l0_stops_with_ongoing_compaction.load(Relaxed),
        );

        map
    }
}

/// Stall counters of the database scope.
///
/// The write buffer manager cause is binary, so only a stops counter
/// exists for it; `total-delays` is carried for symmetry with the CF
/// map and stays 0 until a DB-scope cause with a delay band exists.
#[derive(Default)]
pub(crate) struct DbScopeStats {
    write_buffer_manager_limit_stops: AtomicU64,

    total_delays: AtomicU64,
    total_stops: AtomicU64,
}

impl DbScopeStats {
    /// Records one transition into `condition` for a DB-scope cause.
    pub fn record_transition(&self, cause: WriteStallCause, condition: WriteStallCondition) {
        debug_assert!(cause.is_db_scope());

        if cause == WriteStallCause::WriteBufferManagerLimit
            && condition == WriteStallCondition::Stopped
        {
            self.write_buffer_manager_limit_stops.fetch_add(1, Relaxed);
            self.total_stops.fetch_add(1, Relaxed);
        }
    }

    /// Exports all counters keyed by their stable names.
    pub fn to_map(&self) -> HashMap<String, u64> {
        let mut map = HashMap::default();

        map.insert(
            stat_name::stat_key(
                WriteStallCause::WriteBufferManagerLimit,
                WriteStallCondition::Stopped,
            ),
            self.write_buffer_manager_limit_stops.load(Relaxed),
        );
        map.insert(
            stat_name::TOTAL_DELAYS.into(),
            self.total_delays.load(Relaxed),
        );
        map.insert(
            stat_name::TOTAL_STOPS.into(),
            self.total_stops.load(Relaxed),
        );

        map
    }
}
