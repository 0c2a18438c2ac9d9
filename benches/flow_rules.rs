use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use shopfloor_api::{
    entities::operation::OperationStatus,
    services::{
        flow_rules::{self, OperationRef, OrderFigures, PhaseSnapshot},
        reporting::shape_series,
    },
};
use std::time::Duration;

fn routing(len: usize) -> Vec<PhaseSnapshot> {
    (0..len)
        .map(|i| {
            let status = match i % 4 {
                0 => OperationStatus::Done,
                1 => OperationStatus::InProgress,
                _ => OperationStatus::Todo,
            };
            PhaseSnapshot {
                phase_number: i as i32 + 1,
                status,
                good_output: 100 - i as i64,
                scrap_output: (i % 3) as i64,
            }
        })
        .collect()
}

// Input-chain planning over routings of increasing length
fn input_chain_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_input_quantities");

    for size in [2usize, 8, 32, 128].iter() {
        let phases = routing(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &phases, |b, phases| {
            b.iter(|| flow_rules::plan_input_quantities(black_box(120), black_box(phases)));
        });
    }

    group.finish();
}

fn order_figures_benchmark(c: &mut Criterion) {
    let phases = routing(32);
    c.bench_function("order_figures", |b| {
        b.iter(|| flow_rules::order_figures(black_box(&phases)))
    });
}

fn series_benchmark(c: &mut Criterion) {
    let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap_or_default();
    let window = flow_rules::seven_day_window(today);
    let completed: Vec<(NaiveDate, OrderFigures)> = (0..500)
        .map(|i| {
            (
                window[i % 7],
                OrderFigures {
                    produced_quantity: 20 + (i % 11) as i64,
                    total_scrap: (i % 5) as i64,
                },
            )
        })
        .collect();

    c.bench_function("shape_series_500_orders", |b| {
        b.iter(|| shape_series(black_box(&window), black_box(&completed)))
    });
}

fn scan_code_benchmark(c: &mut Criterion) {
    c.bench_function("parse_scan_code", |b| {
        b.iter(|| black_box("OF-2024-1001/12").parse::<OperationRef>())
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(5))
        .sample_size(100);
    targets =
        input_chain_benchmark,
        order_figures_benchmark,
        series_benchmark,
        scan_code_benchmark
}

criterion_main!(benches);
