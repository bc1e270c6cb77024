use test_log::test;
use write_stall::{
    ControllerOptions, ResourceSnapshot, StallController, StallThresholds, WriteStallCause,
    WriteStallCondition,
};

#[test]
fn l0_buildup_and_recovery() {
    let controller = StallController::new(ControllerOptions::default());
    let cf = controller.column_family("default", StallThresholds::default());

    // Healthy below the slowdown trigger
    cf.set_l0_file_count(19);
    assert_eq!(WriteStallCondition::Normal, cf.aggregate_condition());
    assert_eq!(None, cf.binding_cause());

    // Reaching the slowdown trigger throttles writes
    cf.set_l0_file_count(20);
    assert_eq!(WriteStallCondition::Delayed, cf.aggregate_condition());
    assert_eq!(Some(WriteStallCause::L0FileCountLimit), cf.binding_cause());

    // Reaching the stop trigger halts writes
    cf.set_l0_file_count(36);
    assert_eq!(WriteStallCondition::Stopped, cf.aggregate_condition());

    // Compaction drains L0 again
    cf.set_l0_file_count(12);
    assert_eq!(WriteStallCondition::Normal, cf.aggregate_condition());
    assert_eq!(None, cf.binding_cause());
}

#[test]
fn memtable_buildup_and_flush() {
    let controller = StallController::new(ControllerOptions::default());
    let cf = controller.column_family(
        "default",
        StallThresholds::default().max_write_buffer_number(4),
    );

    cf.set_memtable_count(2);
    assert_eq!(WriteStallCondition::Normal, cf.aggregate_condition());

    // One memtable short of the limit throttles
    cf.set_memtable_count(3);
    assert_eq!(WriteStallCondition::Delayed, cf.aggregate_condition());
    assert_eq!(Some(WriteStallCause::MemtableLimit), cf.binding_cause());

    cf.set_memtable_count(4);
    assert_eq!(WriteStallCondition::Stopped, cf.aggregate_condition());

    // Flush retires a memtable
    cf.set_memtable_count(3);
    assert_eq!(WriteStallCondition::Delayed, cf.aggregate_condition());

    cf.set_memtable_count(1);
    assert_eq!(WriteStallCondition::Normal, cf.aggregate_condition());
}

#[test]
fn compaction_backlog_buildup() {
    let controller = StallController::new(ControllerOptions::default());
    let cf = controller.column_family(
        "default",
        StallThresholds::default()
            .soft_pending_compaction_bytes_limit(1_000)
            .hard_pending_compaction_bytes_limit(2_000),
    );

    cf.set_pending_compaction_bytes(999);
    assert_eq!(WriteStallCondition::Normal, cf.aggregate_condition());

    cf.set_pending_compaction_bytes(1_000);
    assert_eq!(WriteStallCondition::Delayed, cf.aggregate_condition());
    assert_eq!(
        Some(WriteStallCause::PendingCompactionBytes),
        cf.binding_cause()
    );

    cf.set_pending_compaction_bytes(2_000);
    assert_eq!(WriteStallCondition::Stopped, cf.aggregate_condition());
}

#[test]
fn worst_cause_wins() {
    let controller = StallController::new(ControllerOptions::default());
    let cf = controller.column_family(
        "default",
        StallThresholds::default()
            .max_write_buffer_number(4)
            .level0_slowdown_writes_trigger(4)
            .level0_stop_writes_trigger(8),
    );

    cf.set_memtable_count(3);
    cf.set_l0_file_count(8);

    assert_eq!(
        WriteStallCondition::Delayed,
        cf.current_condition(WriteStallCause::MemtableLimit)
    );
    assert_eq!(
        WriteStallCondition::Stopped,
        cf.current_condition(WriteStallCause::L0FileCountLimit)
    );
    assert_eq!(
        WriteStallCondition::Normal,
        cf.current_condition(WriteStallCause::PendingCompactionBytes)
    );

    assert_eq!(WriteStallCondition::Stopped, cf.aggregate_condition());
    assert_eq!(Some(WriteStallCause::L0FileCountLimit), cf.binding_cause());

    // L0 drains; the memtable delay becomes binding
    cf.set_l0_file_count(0);
    assert_eq!(WriteStallCondition::Delayed, cf.aggregate_condition());
    assert_eq!(Some(WriteStallCause::MemtableLimit), cf.binding_cause());
}

#[test]
fn snapshot_reports_all_levels_at_once() {
    let controller = StallController::new(ControllerOptions::default());
    let cf = controller.column_family(
        "default",
        StallThresholds::default()
            .max_write_buffer_number(4)
            .soft_pending_compaction_bytes_limit(1_000)
            .hard_pending_compaction_bytes_limit(2_000),
    );

    cf.apply_snapshot(ResourceSnapshot {
        memtable_count: 4,
        l0_file_count: 20,
        pending_compaction_bytes: 1_500,
    });

    assert_eq!(WriteStallCondition::Stopped, cf.aggregate_condition());
    assert_eq!(Some(WriteStallCause::MemtableLimit), cf.binding_cause());
    assert_eq!(
        WriteStallCondition::Delayed,
        cf.current_condition(WriteStallCause::L0FileCountLimit)
    );
    assert_eq!(
        WriteStallCondition::Delayed,
        cf.current_condition(WriteStallCause::PendingCompactionBytes)
    );

    cf.apply_snapshot(ResourceSnapshot::default());
    assert_eq!(WriteStallCondition::Normal, cf.aggregate_condition());
}

#[test]
fn column_families_are_independent() {
    let controller = StallController::new(ControllerOptions::default());

    let a = controller.column_family(
        "a",
        StallThresholds::default()
            .level0_slowdown_writes_trigger(1)
            .level0_stop_writes_trigger(2),
    );
    let b = controller.column_family("b", StallThresholds::default());

    a.set_l0_file_count(2);

    assert_eq!(WriteStallCondition::Stopped, a.aggregate_condition());
    assert_eq!(WriteStallCondition::Normal, b.aggregate_condition());

    assert_eq!(
        WriteStallCondition::Stopped,
        controller.effective_condition(&a)
    );
    assert_eq!(
        WriteStallCondition::Normal,
        controller.effective_condition(&b)
    );
}

#[test]
fn db_scope_gates_every_column_family() {
    let controller = StallController::new(ControllerOptions::default().db_write_buffer_size(100));

    let a = controller.column_family("a", StallThresholds::default());
    let b = controller.column_family("b", StallThresholds::default());

    controller.reserve_memory(101);

    assert_eq!(WriteStallCondition::Normal, a.aggregate_condition());
    assert_eq!(WriteStallCondition::Normal, b.aggregate_condition());
    assert_eq!(WriteStallCondition::Stopped, controller.db_condition());

    assert_eq!(
        WriteStallCondition::Stopped,
        controller.effective_condition(&a)
    );
    assert_eq!(
        WriteStallCondition::Stopped,
        controller.effective_condition(&b)
    );

    controller.release_memory(1);
    assert_eq!(
        WriteStallCondition::Normal,
        controller.effective_condition(&a)
    );
}
