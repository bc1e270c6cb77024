// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Lock-free readable stall state.
//!
//! Write-path readers load a single atomic word; transitions store a
//! fully encoded replacement under the owner's evaluation lock, so a
//! reader always sees a consistent set of conditions plus aggregate,
//! never a torn intermediate.

use crate::{evaluator::CfClassification, WriteStallCondition};
use std::sync::atomic::{
    AtomicU32, AtomicU8,
    Ordering::{Acquire, Release},
};

const CONDITION_BITS: u32 = 2;
const CONDITION_MASK: u32 = 0b11;

const MEMTABLE_SHIFT: u32 = 0;
const L0_SHIFT: u32 = CONDITION_BITS;
const PENDING_SHIFT: u32 = 2 * CONDITION_BITS;
const AGGREGATE_SHIFT: u32 = 3 * CONDITION_BITS;

/// Stall state of one column family: one condition slot per CF-scope
/// cause plus the cached aggregate, packed into one word.
#[derive(Default)]
pub(crate) struct CfStallState(AtomicU32);

impl CfStallState {
    /// Loads all condition slots.
    pub fn load(&self) -> CfClassification {
        let bits = self.0.load(Acquire);

        CfClassification {
            memtable: decode(bits, MEMTABLE_SHIFT),
            l0: decode(bits, L0_SHIFT),
            pending_bytes: decode(bits, PENDING_SHIFT),
        }
    }

    /// Loads only the cached aggregate condition.
    pub fn aggregate(&self) -> WriteStallCondition {
        decode(self.0.load(Acquire), AGGREGATE_SHIFT)
    }

    /// Publishes a new classification.
    ///
    /// Callers must hold the owning column family's evaluation lock.
    pub fn store(&self, classification: CfClassification) {
        self.0.store(encode(classification), Release);
    }
}

/// Stall state of the database scope.
///
/// One slot per DB-scope cause; the aggregate is the maximum over
/// them, which today is just the write buffer manager slot.
#[derive(Default)]
pub(crate) struct DbStallState(AtomicU8);

impl DbStallState {
    pub fn write_buffer(&self) -> WriteStallCondition {
        WriteStallCondition::from_u8(self.0.load(Acquire))
    }

    pub fn aggregate(&self) -> WriteStallCondition {
        self.write_buffer()
    }

    /// Callers must hold the controller's database evaluation lock.
    pub fn store_write_buffer(&self, condition: WriteStallCondition) {
        self.0.store(condition as u8, Release);
    }
}

fn decode(bits: u32, shift: u32) -> WriteStallCondition {
    // Masked to two bits, so the cast cannot truncate
    #[allow(clippy::cast_possible_truncation)]
    let condition = ((bits >> shift) & CONDITION_MASK) as u8;

    WriteStallCondition::from_u8(condition)
}

fn encode(classification: CfClassification) -> u32 {
    ((classification.memtable as u32) << MEMTABLE_SHIFT)
        | ((classification.l0 as u32) << L0_SHIFT)
        | ((classification.pending_bytes as u32) << PENDING_SHIFT)
        | ((classification.aggregate() as u32) << AGGREGATE_SHIFT)
}
