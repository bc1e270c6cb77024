// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

const DELAY_STEPS_MS: [u64; 11] = [10, 20, 30, 40, 50, 60, 70, 80, 100, 200, 500];

/// Flat throttle delay for delayed causes without a distance metric
/// (memtable count and compaction backlog).
pub(crate) const BASE_DELAY_MS: u64 = 100;

/// Gets the write delay based on how far the L0 file count has moved
/// from the slowdown trigger towards the stop trigger.
///
/// The write delay increases exponentially as the count approaches
/// the stop trigger, capped at 500 ms.
#[allow(clippy::module_name_repetitions)]
pub(crate) fn get_write_delay(
    l0_file_count: usize,
    slowdown_trigger: usize,
    stop_trigger: usize,
) -> u64 {
    if slowdown_trigger == 0 || l0_file_count < slowdown_trigger {
        return 0;
    }

    let last = DELAY_STEPS_MS.len() - 1;
    let span = stop_trigger.saturating_sub(slowdown_trigger).max(1);
    let pos = l0_file_count - slowdown_trigger;
    let step = (pos.saturating_mul(last) / span).min(last);

    DELAY_STEPS_MS.get(step).copied().unwrap_or(500)
}
