use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use dsrccore::{
    entity::Entity,
    geometry::Point,
    link::{vehicle_links, vehicle_links_grid},
    units::METRES,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use std::hint::black_box;

fn scattered(count: usize, side_len: f64) -> Vec<Entity> {
    let mut rng = ChaCha12Rng::seed_from_u64(123456);

    (0..count)
        .map(|n| {
            let position = Point::new(
                rng.random_range(0.0..side_len),
                rng.random_range(0.0..side_len),
            );
            Entity::vehicle(format!("veh{n}"), position)
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("vehicle links");

    for count in [100, 500, 2000] {
        let vehicles = scattered(count, 2000.0);

        group.bench_with_input(BenchmarkId::new("Naive", count), &vehicles, |b, v| {
            b.iter(|| black_box(vehicle_links(v, 50.0 * METRES)))
        });

        group.bench_with_input(BenchmarkId::new("Grid", count), &vehicles, |b, v| {
            b.iter(|| black_box(vehicle_links_grid(v, 50.0 * METRES)))
        });
    }

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
