// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

// Scope membership is encoded as contiguous discriminant ranges:
// each scope's causes occupy the block directly below its sentinel,
// so membership is a constant-time range check and adding a cause to
// a scope means renumbering the sentinel, not touching any predicate.
const CF_SCOPE_SENTINEL: u8 = 3;
const DB_SCOPE_SENTINEL: u8 = 5;

const NUM_CF_SCOPE_CAUSES: u8 = 3;
const NUM_DB_SCOPE_CAUSES: u8 = 1;

/// Resource pressure that can cause a write stall.
///
/// Causes are partitioned into two disjoint scopes: per-column-family
/// causes, which each column family tracks on its own, and
/// database-wide causes, which affect every write regardless of the
/// target column family.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
#[repr(u8)]
pub enum WriteStallCause {
    /// Too many unflushed memtables (CF scope)
    MemtableLimit = 0,

    /// Too many level 0 files (CF scope)
    L0FileCountLimit = 1,

    /// Compaction backlog estimate too large (CF scope)
    PendingCompactionBytes = 2,

    /// Global write buffer memory exhausted (DB scope)
    WriteBufferManagerLimit = 4,
}

impl WriteStallCause {
    /// All column-family-scope causes, in evaluation order.
    pub const CF_SCOPE: [Self; NUM_CF_SCOPE_CAUSES as usize] = [
        Self::MemtableLimit,
        Self::L0FileCountLimit,
        Self::PendingCompactionBytes,
    ];

    /// All database-scope causes.
    pub const DB_SCOPE: [Self; NUM_DB_SCOPE_CAUSES as usize] = [Self::WriteBufferManagerLimit];

    /// Returns `true` if this cause is tracked per column family.
    #[must_use]
    pub fn is_cf_scope(self) -> bool {
        let cause = self as u8;
        let lower_bound = CF_SCOPE_SENTINEL - NUM_CF_SCOPE_CAUSES;
        let upper_bound = CF_SCOPE_SENTINEL - 1;
        (lower_bound..=upper_bound).contains(&cause)
    }

    /// Returns `true` if this cause is tracked for the database as a whole.
    #[must_use]
    pub fn is_db_scope(self) -> bool {
        let cause = self as u8;
        let lower_bound = DB_SCOPE_SENTINEL - NUM_DB_SCOPE_CAUSES;
        let upper_bound = DB_SCOPE_SENTINEL - 1;
        (lower_bound..=upper_bound).contains(&cause)
    }

    /// Returns the stable hyphenated token for this cause.
    ///
    /// These tokens are reported to external tooling and must never
    /// change for existing causes.
    #[must_use]
    pub fn as_hyphen_str(self) -> &'static str {
        match self {
            Self::MemtableLimit => "memtable-limit",
            Self::L0FileCountLimit => "l0-file-count-limit",
            Self::PendingCompactionBytes => "pending-compaction-bytes",
            Self::WriteBufferManagerLimit => "write-buffer-manager-limit",
        }
    }
}
