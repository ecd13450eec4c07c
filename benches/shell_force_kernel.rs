use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nalgebra::Vector3;
use rebound_core::mercurana::force::interaction_step;
use rebound_core::{Particle, Simulation};

fn random_cluster(n: usize) -> Simulation {
    let mut particles = Vec::with_capacity(n);
    let mut seed: u64 = 0x2545F4914F6CDD1D;
    let mut next = || {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        (seed as f64 / u64::MAX as f64) * 2.0 - 1.0
    };
    for _ in 0..n {
        particles.push(Particle::new(
            1.0,
            Vector3::new(next() * 10.0, next() * 10.0, next() * 10.0),
            Vector3::new(next(), next(), next()),
        ));
    }
    Simulation::new(1.0, particles)
}

fn bench_shell_force_kernel(c: &mut Criterion) {
    let sim = random_cluster(200);
    let dcrit = vec![0.1; sim.n()];
    let mut acc = vec![Vector3::zeros(); sim.n()];
    c.bench_function("shell_force_kernel_n200", |b| {
        b.iter(|| {
            interaction_step(
                black_box(&sim),
                black_box(&dcrit),
                0.0,
                1.0,
                &mut acc,
                None,
            )
        })
    });
}

criterion_group!(benches, bench_shell_force_kernel);
criterion_main!(benches);
