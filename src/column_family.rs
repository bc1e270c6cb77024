// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    cf_name::CfName,
    evaluator::{self, CfClassification},
    gate::Gate,
    snapshot::ResourceSnapshot,
    state::CfStallState,
    stats::CfScopeStats,
    thresholds::StallThresholds,
    write_delay, HashMap, WriteStallCause, WriteStallCondition,
};
use std::sync::{
    atomic::{
        AtomicBool, AtomicUsize,
        Ordering::{Acquire, Relaxed, Release},
    },
    Arc, Mutex,
};

// Thresholds and the last reported resource levels, guarded by one
// mutex so every transition is computed from a consistent pair.
struct EvalShared {
    thresholds: StallThresholds,
    snapshot: ResourceSnapshot,
}

/// Shared state of a column family handle.
#[allow(clippy::module_name_repetitions)]
pub struct ColumnFamilyInner {
    /// Column family name
    pub(crate) name: CfName,

    pub(crate) state: CfStallState,
    pub(crate) stats: CfScopeStats,

    shared: Mutex<EvalShared>,

    /// Number of compactions currently running in this column family
    active_compaction_count: AtomicUsize,

    /// If `true`, the column family was deregistered and no longer
    /// stalls anything
    pub(crate) is_dropped: AtomicBool,

    gate: Gate,
}

impl Drop for ColumnFamilyInner {
    fn drop(&mut self) {
        log::trace!("Dropping ColumnFamilyInner: {:?}", self.name);
    }
}

/// Stall tracking of a single column family.
///
/// Each column family classifies its own resource levels against its
/// own thresholds, independently of every other column family. The
/// flush and compaction machinery reports level changes through the
/// `set_*` methods; the write path reads the aggregate condition.
///
/// A handle is a cheap clone; all clones share the same state.
#[derive(Clone)]
#[allow(clippy::module_name_repetitions)]
#[doc(alias = "keyspace")]
#[doc(alias = "partition")]
#[doc(alias = "locality group")]
pub struct ColumnFamily(pub(crate) Arc<ColumnFamilyInner>);

impl std::ops::Deref for ColumnFamily {
    type Target = ColumnFamilyInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Debug for ColumnFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ColumnFamily({:?})", self.name)
    }
}

impl PartialEq for ColumnFamily {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ColumnFamily {}

impl std::hash::Hash for ColumnFamily {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write(self.name.as_bytes());
    }
}

impl ColumnFamily {
    /// Creates a new column family.
    pub(crate) fn create_new(name: CfName, thresholds: StallThresholds, gate: Gate) -> Self {
        log::debug!("Creating column family {name:?}");

        Self(Arc::new(ColumnFamilyInner {
            name,
            state: CfStallState::default(),
            stats: CfScopeStats::default(),
            shared: Mutex::new(EvalShared {
                thresholds,
                snapshot: ResourceSnapshot::default(),
            }),
            active_compaction_count: AtomicUsize::default(),
            is_dropped: AtomicBool::default(),
            gate,
        }))
    }

    /// Returns the column family name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reports a new unflushed memtable count.
    pub fn set_memtable_count(&self, count: usize) {
        self.transition(|shared| shared.snapshot.memtable_count = count);
    }

    /// Reports a new L0 file count.
    pub fn set_l0_file_count(&self, count: usize) {
        self.transition(|shared| shared.snapshot.l0_file_count = count);
    }

    /// Reports a new compaction backlog estimate.
    pub fn set_pending_compaction_bytes(&self, bytes: u64) {
        self.transition(|shared| shared.snapshot.pending_compaction_bytes = bytes);
    }

    /// Reports a full resource snapshot at once.
    pub fn apply_snapshot(&self, snapshot: ResourceSnapshot) {
        self.transition(|shared| shared.snapshot = snapshot);
    }

    /// Replaces the stall thresholds.
    ///
    /// The last reported resource levels are immediately
    /// re-classified against the new thresholds; resulting condition
    /// changes count in the statistics like any other transition.
    pub fn set_thresholds(&self, thresholds: StallThresholds) {
        log::debug!("{:?}: updating stall thresholds", self.name);
        self.transition(|shared| shared.thresholds = thresholds);
    }

    /// Returns a copy of the current stall thresholds.
    #[must_use]
    pub fn thresholds(&self) -> StallThresholds {
        self.shared
            .lock()
            .expect("lock is poisoned")
            .thresholds
            .clone()
    }

    /// Marks a compaction as running in this column family.
    pub fn compaction_started(&self) {
        self.active_compaction_count.fetch_add(1, Relaxed);
    }

    /// Marks a previously started compaction as finished.
    pub fn compaction_finished(&self) {
        let prev = self.active_compaction_count.fetch_sub(1, Relaxed);
        debug_assert!(prev > 0, "compaction_finished without compaction_started");
    }

    /// Returns `true` if at least one compaction is currently running
    /// in this column family.
    #[must_use]
    pub fn has_ongoing_compaction(&self) -> bool {
        self.active_compaction_count.load(Relaxed) > 0
    }

    /// Returns the current condition of a single cause.
    ///
    /// # Panics
    ///
    /// Panics when given a cause that is not CF-scope.
    #[must_use]
    pub fn current_condition(&self, cause: WriteStallCause) -> WriteStallCondition {
        assert!(
            cause.is_cf_scope(),
            "{cause:?} is not a column family scope cause"
        );

        self.state.load().get(cause)
    }

    /// Returns the aggregate (most severe) condition over all causes
    /// of this column family.
    #[must_use]
    pub fn aggregate_condition(&self) -> WriteStallCondition {
        self.state.aggregate()
    }

    /// Returns the cause responsible for the aggregate condition.
    ///
    /// `None` when the column family is not stalled. Ties break in
    /// evaluation order: memtables, then L0, then compaction backlog.
    #[must_use]
    pub fn binding_cause(&self) -> Option<WriteStallCause> {
        self.state.load().binding_cause()
    }

    /// Returns the stall statistics of this column family, keyed by
    /// the stable names from [`crate::stat_name`].
    #[must_use]
    pub fn stall_stats(&self) -> HashMap<String, u64> {
        self.stats.to_map()
    }

    /// Throttle delay for the current condition, in milliseconds.
    pub(crate) fn write_delay_ms(&self) -> u64 {
        let shared = self.shared.lock().expect("lock is poisoned");

        match self.state.load().binding_cause() {
            Some(WriteStallCause::L0FileCountLimit) => write_delay::get_write_delay(
                shared.snapshot.l0_file_count,
                shared.thresholds.level0_slowdown_writes_trigger,
                shared.thresholds.level0_stop_writes_trigger,
            ),
            Some(_) => write_delay::BASE_DELAY_MS,
            None => 0,
        }
    }

    /// Deregisters the column family.
    ///
    /// Conditions reset to `Normal` and blocked writers are woken, so
    /// a dropped column family can never stall anything again.
    /// Surviving handles stay safe to use; their level reports are
    /// remembered but no longer classified.
    pub(crate) fn mark_dropped(&self) {
        let shared = self.shared.lock().expect("lock is poisoned");
        self.is_dropped.store(true, Release);
        self.state.store(CfClassification::default());
        drop(shared);

        self.gate.notify_all();
    }

    fn transition<F: FnOnce(&mut EvalShared)>(&self, update: F) {
        let mut shared = self.shared.lock().expect("lock is poisoned");
        update(&mut shared);

        if self.is_dropped.load(Acquire) {
            return;
        }

        let next = evaluator::classify_cf(&shared.snapshot, &shared.thresholds);
        let prev = self.state.load();

        if next == prev {
            return;
        }

        // Compaction activity is sampled inside the critical section,
        // so the joint counters attribute a stall to the activity at
        // the moment of the transition.
        let has_ongoing_compaction = self.has_ongoing_compaction();

        for cause in WriteStallCause::CF_SCOPE {
            let old_condition = prev.get(cause);
            let new_condition = next.get(cause);

            if old_condition != new_condition {
                log::trace!(
                    "{:?}: {} {old_condition:?} -> {new_condition:?}",
                    self.name,
                    cause.as_hyphen_str(),
                );

                self.stats
                    .record_transition(cause, new_condition, has_ongoing_compaction);
            }
        }

        self.state.store(next);
        drop(shared);

        let old_aggregate = prev.aggregate();
        let new_aggregate = next.aggregate();

        if new_aggregate != old_aggregate {
            self.log_aggregate_change(new_aggregate, next.binding_cause());

            if old_aggregate == WriteStallCondition::Stopped {
                self.gate.notify_all();
            }
        }
    }

    fn log_aggregate_change(
        &self,
        aggregate: WriteStallCondition,
        cause: Option<WriteStallCause>,
    ) {
        match aggregate {
            WriteStallCondition::Stopped => {
                if let Some(cause) = cause {
                    log::warn!(
                        "{:?}: write halt because of {}",
                        self.name,
                        cause_message(cause)
                    );
                }
            }
            WriteStallCondition::Delayed => {
                if let Some(cause) = cause {
                    log::info!(
                        "{:?}: write stall because of {}",
                        self.name,
                        cause_message(cause)
                    );
                }
            }
            WriteStallCondition::Normal => {
                log::debug!("{:?}: write stall cleared", self.name);
            }
        }
    }
}

pub(crate) fn cause_message(cause: WriteStallCause) -> &'static str {
    match cause {
        WriteStallCause::MemtableLimit => "too many unflushed memtables",
        WriteStallCause::L0FileCountLimit => "too many L0 files",
        WriteStallCause::PendingCompactionBytes => "compaction backlog is too large",
        WriteStallCause::WriteBufferManagerLimit => "write buffer saturation",
    }
}
