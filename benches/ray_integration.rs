//! Benchmark ray integration performance.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::f64::consts::PI;

use akasha_map::{MapConfig, OccupancyMap, RayFlags, WorldPoint};

/// Build a spherical scan of `num_rays` (origin, sample) pairs simulating a
/// sensor inside a box room.
fn room_scan(origin: WorldPoint, half_extent: f64, num_rays: usize) -> Vec<WorldPoint> {
    let mut rays = Vec::with_capacity(num_rays * 2);
    // Fibonacci sphere for even ray coverage.
    let golden = PI * (3.0 - 5.0f64.sqrt());
    for i in 0..num_rays {
        let y = 1.0 - 2.0 * (i as f64 + 0.5) / num_rays as f64;
        let radius = (1.0 - y * y).sqrt();
        let theta = golden * i as f64;
        let dir = WorldPoint::new(radius * theta.cos(), y, radius * theta.sin());

        // Distance to the axis-aligned box wall along this direction.
        let mut range = f64::MAX;
        for axis in 0..3 {
            let d = dir.axis(axis);
            if d.abs() > 1e-12 {
                let wall = if d > 0.0 { half_extent } else { -half_extent };
                range = range.min((wall - origin.axis(axis)) / d);
            }
        }

        rays.push(origin);
        rays.push(origin + dir * range);
    }
    rays
}

fn bench_integrate_rays(c: &mut Criterion) {
    let config = MapConfig::with_resolution(0.1);
    let mut map = OccupancyMap::new(&config).unwrap();
    let rays = room_scan(WorldPoint::ZERO, 5.0, 360);

    // Warm up so chunk allocation is out of the measured loop.
    for _ in 0..5 {
        map.integrate_rays(&rays, RayFlags::DEFAULT);
    }

    c.bench_function("integrate_360_rays", |b| {
        b.iter(|| {
            let accepted = map.integrate_rays(black_box(&rays), RayFlags::DEFAULT);
            black_box(accepted)
        })
    });
}

fn bench_integrate_ray_counts(c: &mut Criterion) {
    let mut group = c.benchmark_group("integrate_ray_count");

    for num_rays in [180, 360, 720, 1440].iter() {
        let config = MapConfig::with_resolution(0.1).with_voxel_mean();
        let mut map = OccupancyMap::new(&config).unwrap();
        let rays = room_scan(WorldPoint::new(0.3, -0.2, 0.1), 5.0, *num_rays);

        for _ in 0..5 {
            map.integrate_rays(&rays, RayFlags::DEFAULT);
        }

        group.bench_with_input(BenchmarkId::from_parameter(num_rays), num_rays, |b, _| {
            b.iter(|| {
                let accepted = map.integrate_rays(black_box(&rays), RayFlags::DEFAULT);
                black_box(accepted)
            })
        });
    }

    group.finish();
}

fn bench_fresh_map_allocation(c: &mut Criterion) {
    let rays = room_scan(WorldPoint::ZERO, 5.0, 360);

    c.bench_function("integrate_into_fresh_map", |b| {
        b.iter(|| {
            let mut map = OccupancyMap::new(&MapConfig::with_resolution(0.1)).unwrap();
            let accepted = map.integrate_rays(black_box(&rays), RayFlags::DEFAULT);
            black_box(accepted)
        })
    });
}

criterion_group!(
    benches,
    bench_integrate_rays,
    bench_integrate_ray_counts,
    bench_fresh_map_allocation
);
criterion_main!(benches);
