//! Render benchmarks
//!
//! Cost of pulling audio through the graph in the states the ritual spends
//! most time in.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use divan_engine::nodes::SILENCE;
use divan_engine::{Engine, EngineConfig, Haptics, SoundEngine};

const BLOCK: usize = 512;

fn engine() -> Engine {
    let mut e = Engine::offline(EngineConfig::default().with_seed(1), Haptics::none());
    e.init();
    e
}

fn benchmark_ambient(c: &mut Criterion) {
    let e = engine();
    let mut buf = vec![SILENCE; BLOCK];

    c.bench_function("ambient_block_512", |b| {
        b.iter(|| e.context().with_graph(|g| g.render(black_box(&mut buf))))
    });
}

fn benchmark_breath(c: &mut Criterion) {
    let mut e = engine();
    e.start_breath();
    let mut buf = vec![SILENCE; BLOCK];

    c.bench_function("ambient_plus_breath_block_512", |b| {
        b.iter(|| e.context().with_graph(|g| g.render(black_box(&mut buf))))
    });
}

fn benchmark_reveal(c: &mut Criterion) {
    let mut e = engine();
    e.play_reveal();
    let mut out = vec![0.0f32; BLOCK * 2];

    c.bench_function("reveal_interleaved_512", |b| {
        b.iter(|| e.context().render(black_box(&mut out), 2))
    });
}

criterion_group!(benches, benchmark_ambient, benchmark_breath, benchmark_reveal);
criterion_main!(benches);
