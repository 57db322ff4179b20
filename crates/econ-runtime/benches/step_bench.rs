use criterion::{black_box, criterion_group, criterion_main, Criterion};
use econ_core::SimConfig;
use econ_runtime::Simulation;

fn bench_step(c: &mut Criterion) {
    let config = SimConfig::benchmark();
    c.bench_function("step 200/50 firms", |b| {
        b.iter_batched(
            || Simulation::from_config(&config).unwrap(),
            |mut sim| {
                let _ = black_box(sim.step());
            },
            criterion::BatchSize::LargeInput,
        )
    });
}

fn bench_run(c: &mut Criterion) {
    let mut config = SimConfig::benchmark();
    config.parameters.innovation = true;
    config.parameters.fix_supplier = false;
    c.bench_function("run 200/50 firms x 20 steps", |b| {
        b.iter(|| {
            let mut sim = Simulation::from_config(&config).unwrap();
            black_box(sim.run(20))
        })
    });
}

criterion_group!(benches, bench_step, bench_run);
criterion_main!(benches);
