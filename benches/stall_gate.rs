use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use write_stall::{ControllerOptions, StallController, StallThresholds};

fn write_path_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_path_check");

    let controller = StallController::new(
        ControllerOptions::default().db_write_buffer_size(64 * 1_024 * 1_024),
    );
    let cf = controller.column_family("default", StallThresholds::default());

    cf.set_memtable_count(1);
    cf.set_l0_file_count(4);

    group.bench_function("effective_condition healthy", |b| {
        b.iter(|| controller.effective_condition(black_box(&cf)));
    });

    group.bench_function("wait_for_write healthy", |b| {
        b.iter(|| controller.wait_for_write(black_box(&cf)));
    });

    // A stalled scope is the contended case
    cf.set_l0_file_count(36);

    group.bench_function("effective_condition stalled", |b| {
        b.iter(|| controller.effective_condition(black_box(&cf)));
    });

    group.finish();
}

fn level_reports(c: &mut Criterion) {
    let mut group = c.benchmark_group("level_reports");

    let controller = StallController::new(ControllerOptions::default());
    let cf = controller.column_family("default", StallThresholds::default());

    cf.set_l0_file_count(4);

    // Re-classification that lands on the same condition
    group.bench_function("unchanged report", |b| {
        b.iter(|| cf.set_l0_file_count(black_box(4)));
    });

    // Every report flips between Normal and Delayed
    group.bench_function("flapping report", |b| {
        let mut count = 4;

        b.iter(|| {
            count = if count == 4 { 20 } else { 4 };
            cf.set_l0_file_count(black_box(count));
        });
    });

    group.bench_function("stats map export", |b| {
        b.iter(|| cf.stall_stats());
    });

    group.finish();
}

criterion_group!(benches, write_path_check, level_reports);
criterion_main!(benches);
