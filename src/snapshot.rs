// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

/// Point-in-time resource levels of a column family.
///
/// The levels are owned and updated by the flush and compaction
/// machinery of the host engine; the stall controller only reads them.
/// A missing value should be reported as the last known level or `0`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ResourceSnapshot {
    /// Number of unflushed (active + sealed) memtables
    pub memtable_count: usize,

    /// Number of files (or sorted runs) in level 0
    pub l0_file_count: usize,

    /// Estimated bytes of data awaiting compaction
    pub pending_compaction_bytes: u64,
}
