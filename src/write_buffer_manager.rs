// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::sync::{atomic::AtomicU64, Arc};

/// Tracks the write buffer memory used across all column families.
///
/// This is the resource level behind the database-scope
/// [`WriteBufferManagerLimit`](crate::WriteStallCause::WriteBufferManagerLimit)
/// cause. The counter itself enforces nothing; the controller
/// classifies it against the configured limit whenever it changes.
///
/// Cheaply cloneable, all clones share the same counter.
#[derive(Clone, Default, Debug)]
pub struct WriteBufferManager(Arc<AtomicU64>);

impl std::ops::Deref for WriteBufferManager {
    type Target = AtomicU64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl WriteBufferManager {
    /// Returns the current write buffer usage in bytes.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.load(std::sync::atomic::Ordering::Acquire)
    }

    /// Adds some bytes to the write buffer counter.
    ///
    /// Returns the counter *after* incrementing.
    pub fn allocate(&self, n: u64) -> u64 {
        let before = self.fetch_add(n, std::sync::atomic::Ordering::AcqRel);
        before + n
    }

    /// Frees some bytes from the write buffer counter.
    ///
    /// Saturates at 0, freeing more than was allocated is not an
    /// error.
    ///
    /// Returns the counter *after* decrementing.
    pub fn free(&self, n: u64) -> u64 {
        use std::sync::atomic::Ordering::{Acquire, SeqCst};

        loop {
            let now = self.load(Acquire);
            let subbed = now.saturating_sub(n);

            if self.compare_exchange(now, subbed, SeqCst, SeqCst).is_ok() {
                return subbed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn write_buffer_manager_increment() {
        let m = WriteBufferManager::default();
        assert_eq!(5, m.allocate(5));
        assert_eq!(5, m.get());

        assert_eq!(20, m.allocate(15));
        assert_eq!(20, m.get());
    }

    #[test]
    fn write_buffer_manager_decrement() {
        let m = WriteBufferManager::default();
        m.allocate(20);

        assert_eq!(15, m.free(5));
        assert_eq!(15, m.get());

        // Saturating
        assert_eq!(0, m.free(20));
        assert_eq!(0, m.get());
    }

    #[test]
    fn write_buffer_manager_shared_between_clones() {
        let m = WriteBufferManager::default();
        let clone = m.clone();

        m.allocate(10);
        clone.allocate(10);

        assert_eq!(20, m.get());
        assert_eq!(20, clone.get());
    }
}
