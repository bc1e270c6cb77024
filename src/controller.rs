// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    cf_name::{is_valid_cf_name, CfName},
    column_family::{cause_message, ColumnFamily},
    evaluator,
    gate::Gate,
    state::DbStallState,
    stats::DbScopeStats,
    stop_signal::StopSignal,
    thresholds::StallThresholds,
    write_buffer_manager::WriteBufferManager,
    HashMap, WriteStallCause, WriteStallCondition,
};
use dashmap::DashMap;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

/// Options to configure a [`StallController`].
#[derive(Clone, Debug, Default)]
pub struct ControllerOptions {
    /// Byte limit for the write buffer manager (0 = no limit)
    pub(crate) db_write_buffer_size: u64,
}

impl ControllerOptions {
    /// Sets the global write buffer byte limit.
    ///
    /// When the write buffer manager's usage exceeds this limit,
    /// writes are stopped database-wide until enough memory is freed.
    ///
    /// Default = 0 (no limit)
    #[must_use]
    pub fn db_write_buffer_size(mut self, bytes: u64) -> Self {
        self.db_write_buffer_size = bytes;
        self
    }
}

/// Shared state of a stall controller handle.
#[allow(clippy::module_name_repetitions)]
pub struct StallControllerInner {
    options: ControllerOptions,

    /// Registered column families
    column_families: DashMap<CfName, ColumnFamily, xxhash_rust::xxh3::Xxh3Builder>,

    db_state: DbStallState,
    db_stats: DbScopeStats,

    write_buffer_manager: WriteBufferManager,

    // Database-scope transitions are serialized through this lock
    db_eval_lock: Mutex<()>,

    gate: Gate,
    stop_signal: StopSignal,
}

impl Drop for StallControllerInner {
    fn drop(&mut self) {
        log::trace!("Dropping StallControllerInner");
        self.stop_signal.send();
        self.gate.notify_all();
    }
}

/// Write stall controller of an LSM-tree storage engine.
///
/// Decides, before every write, whether the engine is healthy (the
/// write proceeds), under pressure (the write is throttled) or
/// overloaded (the write is blocked until background work catches
/// up), and records exactly why.
///
/// The controller tracks per-column-family pressure (memtable count,
/// L0 file count, compaction backlog) and database-wide pressure
/// (write buffer memory); the effective gate for a write is the more
/// severe of the two scopes.
///
/// A controller is a cheap clone; all clones share the same state.
#[derive(Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct StallController(Arc<StallControllerInner>);

impl std::ops::Deref for StallController {
    type Target = StallControllerInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl StallController {
    /// Creates a new stall controller.
    #[must_use]
    pub fn new(options: ControllerOptions) -> Self {
        let stop_signal = StopSignal::default();

        Self(Arc::new(StallControllerInner {
            options,
            column_families: DashMap::default(),
            db_state: DbStallState::default(),
            db_stats: DbScopeStats::default(),
            write_buffer_manager: WriteBufferManager::default(),
            db_eval_lock: Mutex::new(()),
            gate: Gate::new(stop_signal.clone()),
            stop_signal,
        }))
    }

    /// Returns the column family with the given name, creating it if
    /// it does not exist yet.
    ///
    /// If the column family already exists, `thresholds` is ignored
    /// and the existing handle is returned.
    ///
    /// # Panics
    ///
    /// Panics if the column family name is invalid.
    pub fn column_family(&self, name: &str, thresholds: StallThresholds) -> ColumnFamily {
        assert!(is_valid_cf_name(name));

        if let Some(cf) = self.column_families.get(name) {
            return cf.clone();
        }

        let name = CfName::from(name);

        self.column_families
            .entry(name.clone())
            .or_insert_with(|| ColumnFamily::create_new(name, thresholds, self.gate.clone()))
            .clone()
    }

    /// Deregisters a column family.
    ///
    /// Its conditions reset to `Normal` and writers blocked on it are
    /// woken, so a dropped column family cannot stall the process.
    /// Outstanding handles remain safe to use, but their level
    /// reports are no longer classified.
    ///
    /// Does nothing if no column family with that name exists.
    pub fn drop_column_family(&self, name: &str) {
        if let Some((_, cf)) = self.column_families.remove(name) {
            log::debug!("Dropping column family {name:?}");
            cf.mark_dropped();
        }
    }

    /// Returns the write buffer manager.
    ///
    /// The handle can be cloned into the engine's memory accounting;
    /// call [`StallController::refresh_memory_usage`] after updating
    /// it directly.
    #[must_use]
    pub fn write_buffer_manager(&self) -> &WriteBufferManager {
        &self.write_buffer_manager
    }

    /// Reserves write buffer memory and re-classifies the database
    /// scope.
    ///
    /// Returns the usage after incrementing.
    pub fn reserve_memory(&self, bytes: u64) -> u64 {
        let usage = self.write_buffer_manager.allocate(bytes);
        self.reevaluate_db_scope();
        usage
    }

    /// Frees previously reserved write buffer memory and
    /// re-classifies the database scope.
    ///
    /// Returns the usage after decrementing.
    pub fn release_memory(&self, bytes: u64) -> u64 {
        let usage = self.write_buffer_manager.free(bytes);
        self.reevaluate_db_scope();
        usage
    }

    /// Re-classifies the database scope from the current write buffer
    /// usage.
    ///
    /// Only needed when usage was changed directly through the
    /// [`WriteBufferManager`] handle instead of
    /// [`StallController::reserve_memory`] and
    /// [`StallController::release_memory`].
    pub fn refresh_memory_usage(&self) {
        self.reevaluate_db_scope();
    }

    /// Returns the aggregate condition of the database scope.
    #[must_use]
    pub fn db_condition(&self) -> WriteStallCondition {
        self.db_state.aggregate()
    }

    /// Returns the effective gate condition for a write into the
    /// given column family.
    ///
    /// This is the more severe of the column family aggregate and the
    /// database aggregate, one atomic load per scope. The scopes are
    /// read independently, so one may be slightly stale relative to
    /// the other; within a scope the value is never torn.
    #[must_use]
    pub fn effective_condition(&self, cf: &ColumnFamily) -> WriteStallCondition {
        cf.aggregate_condition().max(self.db_condition())
    }

    /// Gates a write into the given column family.
    ///
    /// `Normal` admits the write immediately. `Delayed` sleeps a
    /// bounded throttle delay and then admits it, unless the scope
    /// stopped meanwhile. `Stopped` blocks until background work
    /// recovers the scope, the column family is dropped, or the
    /// controller shuts down.
    ///
    /// Engines with their own rate limiter should read
    /// [`StallController::effective_condition`] instead and apply
    /// their own throttling policy.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ShuttingDown`] if the controller shuts
    /// down while the write is blocked. Being stalled is never an
    /// error.
    pub fn wait_for_write(&self, cf: &ColumnFamily) -> crate::Result<()> {
        use WriteStallCondition::{Delayed, Normal, Stopped};

        match self.effective_condition(cf) {
            Normal => Ok(()),
            Delayed => {
                let ms = cf.write_delay_ms();

                if ms > 0 {
                    log::trace!("{:?}: delaying write for {ms} ms", cf.name);
                    std::thread::sleep(Duration::from_millis(ms));
                }

                if self.effective_condition(cf) == Stopped {
                    self.block_until_recovered(cf)
                } else {
                    Ok(())
                }
            }
            Stopped => self.block_until_recovered(cf),
        }
    }

    /// Shuts the controller down, releasing all blocked writers.
    ///
    /// Blocked and future blocking waits return
    /// [`crate::Error::ShuttingDown`]; conditions and statistics
    /// remain readable. Also fired when the last controller handle is
    /// dropped.
    pub fn shutdown(&self) {
        log::trace!("Sending stop signal to blocked writers");
        self.stop_signal.send();
        self.gate.notify_all();
    }

    /// Returns the shutdown signal.
    #[must_use]
    pub fn stop_signal(&self) -> StopSignal {
        self.stop_signal.clone()
    }

    /// Returns the stall statistics of the database scope, keyed by
    /// the stable names from [`crate::stat_name`].
    #[must_use]
    pub fn db_stall_stats(&self) -> HashMap<String, u64> {
        self.db_stats.to_map()
    }

    fn block_until_recovered(&self, cf: &ColumnFamily) -> crate::Result<()> {
        log::trace!("{:?}: waiting for write stall to clear", cf.name);

        self.gate
            .wait_while(|| self.effective_condition(cf) == WriteStallCondition::Stopped)
    }

    fn reevaluate_db_scope(&self) {
        let guard = self.db_eval_lock.lock().expect("lock is poisoned");

        let usage = self.write_buffer_manager.get();
        let next =
            evaluator::classify_write_buffer_usage(usage, self.options.db_write_buffer_size);
        let prev = self.db_state.write_buffer();

        if next == prev {
            return;
        }

        self.db_stats
            .record_transition(WriteStallCause::WriteBufferManagerLimit, next);
        self.db_state.store_write_buffer(next);
        drop(guard);

        if next == WriteStallCondition::Stopped {
            log::warn!(
                "write halt because of {}",
                cause_message(WriteStallCause::WriteBufferManagerLimit)
            );
        } else {
            log::debug!("database write stall cleared");
            self.gate.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;
    use WriteStallCondition::{Normal, Stopped};

    #[test]
    fn controller_cf_create_or_return() {
        let controller = StallController::new(ControllerOptions::default());

        let a = controller.column_family("default", StallThresholds::default());
        let b = controller.column_family(
            "default",
            StallThresholds::default().level0_stop_writes_trigger(1),
        );

        assert_eq!(a, b);

        // The second registration's thresholds were ignored
        assert_eq!(36, b.thresholds().level0_stop_writes_trigger);
    }

    #[test]
    #[should_panic(expected = "is_valid_cf_name")]
    fn controller_cf_invalid_name() {
        let controller = StallController::new(ControllerOptions::default());
        let _ = controller.column_family("no spaces allowed", StallThresholds::default());
    }

    #[test]
    fn controller_memory_reservation_gates_db_scope() {
        let controller =
            StallController::new(ControllerOptions::default().db_write_buffer_size(1_000));
        let cf = controller.column_family("default", StallThresholds::default());

        assert_eq!(1_000, controller.reserve_memory(1_000));
        assert_eq!(Normal, controller.db_condition());

        controller.reserve_memory(1);
        assert_eq!(Stopped, controller.db_condition());
        assert_eq!(Stopped, controller.effective_condition(&cf));

        controller.release_memory(1);
        assert_eq!(Normal, controller.db_condition());

        let map = controller.db_stall_stats();
        assert_eq!(Some(&1), map.get("write-buffer-manager-limit-stops"));
        assert_eq!(Some(&1), map.get("total-stops"));
    }

    #[test]
    fn controller_unlimited_write_buffer() {
        let controller = StallController::new(ControllerOptions::default());

        controller.reserve_memory(u64::MAX / 2);
        assert_eq!(Normal, controller.db_condition());
    }

    #[test]
    fn controller_external_usage_needs_refresh() {
        let controller =
            StallController::new(ControllerOptions::default().db_write_buffer_size(100));

        controller.write_buffer_manager().allocate(200);
        assert_eq!(Normal, controller.db_condition());

        controller.refresh_memory_usage();
        assert_eq!(Stopped, controller.db_condition());
    }

    #[test]
    fn controller_effective_condition_takes_worse_scope() {
        let controller =
            StallController::new(ControllerOptions::default().db_write_buffer_size(100));
        let cf = controller.column_family("default", StallThresholds::default());

        assert_eq!(Normal, controller.effective_condition(&cf));

        controller.reserve_memory(200);
        assert_eq!(Normal, cf.aggregate_condition());
        assert_eq!(Stopped, controller.effective_condition(&cf));
    }

    #[test]
    fn controller_wait_for_write_admits_when_normal() {
        let controller = StallController::new(ControllerOptions::default());
        let cf = controller.column_family("default", StallThresholds::default());

        assert!(controller.wait_for_write(&cf).is_ok());
    }
}
