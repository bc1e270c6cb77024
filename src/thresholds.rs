// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

/// Stall thresholds of a column family.
///
/// Thresholds convert raw resource levels into stall conditions.
/// A threshold of `0` disables the corresponding check.
///
/// Soft (slowdown) thresholds are expected to be below their hard
/// (stop) counterparts. An inverted pair is not an error: the lower
/// value becomes a stop trigger and the delay band disappears.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StallThresholds {
    /// Maximum number of unflushed memtables (stop trigger)
    pub(crate) max_write_buffer_number: usize,

    /// Number of L0 files that starts throttling writes
    pub(crate) level0_slowdown_writes_trigger: usize,

    /// Number of L0 files that stops writes
    pub(crate) level0_stop_writes_trigger: usize,

    /// Compaction backlog estimate that starts throttling writes
    pub(crate) soft_pending_compaction_bytes_limit: u64,

    /// Compaction backlog estimate that stops writes
    pub(crate) hard_pending_compaction_bytes_limit: u64,

    /// If `true`, L0 and compaction backlog checks are skipped
    pub(crate) disable_auto_compactions: bool,
}

impl Default for StallThresholds {
    fn default() -> Self {
        Self {
            max_write_buffer_number: 2,
            level0_slowdown_writes_trigger: 20,
            level0_stop_writes_trigger: 36,
            soft_pending_compaction_bytes_limit: /* 64 GiB */ 64 * 1_073_741_824,
            hard_pending_compaction_bytes_limit: /* 256 GiB */ 256 * 1_073_741_824,
            disable_auto_compactions: false,
        }
    }
}

impl StallThresholds {
    /// Sets the maximum number of unflushed memtables.
    ///
    /// When the memtable count reaches this number, writes are stopped
    /// until a flush retires one. When this is greater than 3, writes
    /// are already throttled one memtable earlier.
    ///
    /// Default = 2
    #[must_use]
    pub fn max_write_buffer_number(mut self, n: usize) -> Self {
        self.max_write_buffer_number = n;
        self
    }

    /// Sets the L0 file count that starts throttling writes.
    ///
    /// Default = 20
    #[must_use]
    pub fn level0_slowdown_writes_trigger(mut self, n: usize) -> Self {
        self.level0_slowdown_writes_trigger = n;
        self
    }

    /// Sets the L0 file count that stops writes.
    ///
    /// Default = 36
    #[must_use]
    pub fn level0_stop_writes_trigger(mut self, n: usize) -> Self {
        self.level0_stop_writes_trigger = n;
        self
    }

    /// Sets the compaction backlog estimate (in bytes) that starts
    /// throttling writes.
    ///
    /// Default = 64 GiB
    #[must_use]
    pub fn soft_pending_compaction_bytes_limit(mut self, bytes: u64) -> Self {
        self.soft_pending_compaction_bytes_limit = bytes;
        self
    }

    /// Sets the compaction backlog estimate (in bytes) that stops writes.
    ///
    /// Default = 256 GiB
    #[must_use]
    pub fn hard_pending_compaction_bytes_limit(mut self, bytes: u64) -> Self {
        self.hard_pending_compaction_bytes_limit = bytes;
        self
    }

    /// Disables the L0 file count and compaction backlog checks.
    ///
    /// With auto compactions off, L0 buildup is expected and not a
    /// sign of pressure, so only the memtable count keeps gating
    /// writes.
    ///
    /// Default = false
    #[must_use]
    pub fn disable_auto_compactions(mut self, flag: bool) -> Self {
        self.disable_auto_compactions = flag;
        self
    }
}
