//! Schedule execution benchmarks using Criterion.
//!
//! The plan is built once outside the measured loop; each iteration runs it against the world.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rusty_schedule_bench::scenarios::{ChainScenario, NestedScenario, Scenario, WideScenario};

fn bench_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("run");
    let scenarios: [Box<dyn Scenario>; 3] = [
        Box::new(ChainScenario::new(500)),
        Box::new(WideScenario::new(4, 100)),
        Box::new(NestedScenario::new(16, 10)),
    ];

    for scenario in &scenarios {
        let count = scenario.system_count();
        let (mut world, mut schedule) = scenario.setup().expect("scenario registers");
        schedule.initialize(&mut world).expect("scenario builds");

        group.throughput(Throughput::Elements(count as u64));
        group.bench_function(BenchmarkId::new(scenario.name(), count), |b| {
            b.iter(|| schedule.run(&mut world).expect("plan is built"));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_run);
criterion_main!(benches);
