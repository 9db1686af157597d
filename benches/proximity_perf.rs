//! Benchmark: Proximity ticks over a populated neighbourhood

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use geoloot::{geo, ChangeEvent, LootConfig, LootGenerator, Position, ProximityIndex, UserId};

fn populated_index(boxes: usize) -> ProximityIndex {
    let generator = LootGenerator::seeded(&LootConfig::default(), 7).unwrap();
    let center = Position::new(48.8566, 2.3522);
    let user = UserId::from("bench");

    let mut index = ProximityIndex::default();
    index.on_position(center);
    for i in 0..boxes {
        let origin = geo::offset(&center, i as f64 * 0.37, (i % 900) as f64 + 30.0);
        index.on_store_event(&ChangeEvent::added(generator.generate(&origin, &user)));
    }
    index
}

fn proximity_perf_benchmark(c: &mut Criterion) {
    let center = Position::new(48.8566, 2.3522);

    for size in [50usize, 500] {
        let index = populated_index(size);
        c.bench_function(&format!("proximity_tick_{size}"), |b| {
            b.iter_batched(
                || index.clone(),
                |mut index| black_box(index.on_position(black_box(center))),
                criterion::BatchSize::SmallInput,
            )
        });
    }

    let index = populated_index(500);
    c.bench_function("nearby_sorted_500", |b| b.iter(|| black_box(index.nearby())));
}

criterion_group!(benches, proximity_perf_benchmark);
criterion_main!(benches);
