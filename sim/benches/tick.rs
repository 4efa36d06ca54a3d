//! Tick throughput with busy lanes.
//!
//! Run with: cargo bench --bench tick

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lanesiege_sim::*;

fn crowded_world(per_lane: usize) -> SimWorld {
    let mut sim = SimWorld::with_config(SimConfig {
        seed: Some(99),
        ..SimConfig::default()
    });
    let lanes: Vec<LaneId> = (0..5)
        .map(|i| {
            let x = i as f32 * 8.0;
            sim.register_lane_points(&[
                Position::new(x, 0.0, 0.0),
                Position::new(x, 0.0, 60.0),
                Position::new(x, 0.0, 120.0),
            ])
        })
        .collect();
    sim.spawn_structure(Faction::Attacker, Position::new(16.0, 0.0, -5.0), 1_000_000);
    sim.spawn_structure(Faction::Defender, Position::new(16.0, 0.0, 125.0), 1_000_000);

    for lane in lanes {
        for n in 0..per_lane {
            let kind = UnitKind::ALL[n % UnitKind::ALL.len()];
            let start = n % 3;
            let _ = sim.create_unit(Faction::Attacker, kind, lane, start);
            let _ = sim.create_unit(Faction::Defender, kind, lane, start);
        }
    }
    sim
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    for per_lane in [10usize, 100, 400] {
        let units = BenchmarkId::from_parameter(per_lane * 10);
        group.bench_with_input(units, &per_lane, |b, &per_lane| {
            let mut sim = crowded_world(per_lane);
            let dt = sim.config().fixed_timestep;
            b.iter(|| {
                sim.step(black_box(dt));
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_tick);
criterion_main!(benches);
