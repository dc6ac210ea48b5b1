//! Micro benchmarks for the pieces a schedule build leans on:
//! - Strongly connected components over random directed graphs
//! - Reachability and transitive reduction over random DAGs
//! - Pairwise access conflict checks between random systems

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rusty_schedule::ecs::access::{FilteredAccess, FilteredAccessSet};
use rusty_schedule::ecs::component::ComponentId;
use rusty_schedule::ecs::graph::{DiGraph, check_graph};

const SEED: u64 = 0x5eed;

fn random_graph(nodes: u32, edges_per_node: u32, acyclic: bool) -> DiGraph<u32> {
    let mut rng = ChaCha8Rng::seed_from_u64(SEED);
    let mut graph = DiGraph::with_capacity(nodes as usize, (nodes * edges_per_node) as usize);
    for node in 0..nodes {
        graph.add_node(node);
    }
    for a in 0..nodes {
        for _ in 0..edges_per_node {
            let b = rng.gen_range(0..nodes);
            match (acyclic, a.cmp(&b)) {
                (_, std::cmp::Ordering::Equal) => {}
                (true, std::cmp::Ordering::Greater) => graph.add_edge(b, a),
                _ => graph.add_edge(a, b),
            }
        }
    }
    graph
}

fn random_access_sets(systems: usize, components: u32) -> Vec<FilteredAccessSet<ComponentId>> {
    let mut rng = ChaCha8Rng::seed_from_u64(SEED);
    (0..systems)
        .map(|_| {
            let mut set = FilteredAccessSet::new();
            for _ in 0..rng.gen_range(1..4) {
                let mut filtered = FilteredAccess::default();
                for _ in 0..rng.gen_range(1..6) {
                    let id = ComponentId::new(rng.gen_range(0..components));
                    if rng.gen_bool(0.3) {
                        filtered.add_component_write(id);
                    } else {
                        filtered.add_component_read(id);
                    }
                }
                if rng.gen_bool(0.25) {
                    filtered.and_without(ComponentId::new(rng.gen_range(0..components)));
                }
                set.add(filtered);
            }
            set
        })
        .collect()
}

fn bench_scc(c: &mut Criterion) {
    let mut group = c.benchmark_group("scc");
    for nodes in [100, 1_000, 5_000] {
        let graph = random_graph(nodes, 3, false);
        group.throughput(Throughput::Elements(nodes as u64));
        group.bench_with_input(BenchmarkId::new("random", nodes), &graph, |b, graph| {
            b.iter(|| black_box(graph.iter_sccs().count()));
        });
    }
    group.finish();
}

fn bench_check_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("check_graph");
    for nodes in [100, 500, 1_000] {
        let graph = random_graph(nodes, 3, true);
        let mut order = graph.iter_sccs().flatten().collect::<Vec<_>>();
        order.reverse();
        group.throughput(Throughput::Elements(nodes as u64));
        group.bench_with_input(
            BenchmarkId::new("random_dag", nodes),
            &(graph, order),
            |b, (graph, order)| {
                b.iter(|| black_box(check_graph(graph, order).transitive_edges.len()));
            },
        );
    }
    group.finish();
}

fn bench_access_conflicts(c: &mut Criterion) {
    let mut group = c.benchmark_group("access_conflicts");
    for systems in [50, 200] {
        let sets = random_access_sets(systems, 64);
        group.throughput(Throughput::Elements((systems * systems) as u64));
        group.bench_with_input(BenchmarkId::new("pairwise", systems), &sets, |b, sets| {
            b.iter(|| {
                let mut conflicting = 0usize;
                for (i, lhs) in sets.iter().enumerate() {
                    for rhs in &sets[i + 1..] {
                        if !lhs.get_conflicts(rhs).is_empty() {
                            conflicting += 1;
                        }
                    }
                }
                black_box(conflicting)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_scc, bench_check_graph, bench_access_conflicts);
criterion_main!(benches);
