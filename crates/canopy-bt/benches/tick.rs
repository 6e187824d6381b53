use canopy_bt::nodes::{NeverComplete, Parallel, Root};
use canopy_bt::{Graph, ModuleBuilder};
use canopy_core::TickContext;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_wide_parallel_tick(c: &mut Criterion) {
    let mut b = ModuleBuilder::new("bench");
    let leaves = (0..64).map(|_| b.action(NeverComplete)).collect::<Vec<_>>();
    let parallel = b.composite(Parallel::all(), leaves);
    let root = b.modifier(Root::new(), parallel);
    let mut graph = Graph::new(b.build(root).expect("valid bench graph"));
    graph.start();

    let mut tick: u64 = 0;
    c.bench_function("canopy-bt/tick(running=64)", |b| {
        b.iter(|| {
            let ctx = TickContext::new(tick, 1.0 / 60.0);
            black_box(graph.tick(&ctx));
            tick = tick.wrapping_add(1);
        })
    });
}

fn bench_start_end_cycle(c: &mut Criterion) {
    let mut b = ModuleBuilder::new("bench");
    let leaves = (0..32).map(|_| b.action(NeverComplete)).collect::<Vec<_>>();
    let parallel = b.composite(Parallel::all(), leaves);
    let root = b.modifier(Root::new(), parallel);
    let mut graph = Graph::new(b.build(root).expect("valid bench graph"));

    c.bench_function("canopy-bt/start_end(nodes=34)", |b| {
        b.iter(|| {
            black_box(graph.start());
            graph.end();
        })
    });
}

criterion_group!(benches, bench_wide_parallel_tick, bench_start_end_cycle);
criterion_main!(benches);
