use criterion::{black_box, criterion_group, criterion_main, Criterion};
use statprop_core::{Domain, FiniteDomain, Store, VarId};
use statprop_stats::bincounts::BinCountsFilter;
use statprop_stats::chain;
use statprop_stats::flow::Transportation;

fn random_values(n: usize, max: i64, seed: u64) -> Vec<i64> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((state >> 33) as i64) % max
        })
        .collect()
}

fn bench_transportation(c: &mut Criterion) {
    let mut group = c.benchmark_group("transportation");

    let values = random_values(200, 10, 42);
    let allowed: Vec<Vec<usize>> = values
        .iter()
        .map(|&v| {
            let b = (v / 2) as usize;
            if b + 1 < 5 {
                vec![b, b + 1]
            } else {
                vec![b]
            }
        })
        .collect();
    let problem = Transportation::new(allowed, vec![(20, 60); 5]);

    group.bench_function("200_items_5_bins_solve", |b| {
        b.iter(|| black_box(&problem).solve())
    });
    group.bench_function("200_items_5_bins_count_range", |b| {
        b.iter(|| black_box(&problem).count_range(2))
    });

    group.finish();
}

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("bincounts_filter");

    let filter = BinCountsFilter::from_boundaries(&[0.0, 2.0, 4.0, 6.0, 8.0, 10.0]).unwrap();
    let items: Vec<Domain> = random_values(50, 8, 7)
        .into_iter()
        .map(|v| Domain::Finite(FiniteDomain::range(v, v + 2)))
        .collect();
    let counts = vec![(5, 15); 5];

    group.bench_function("50_items_5_bins", |b| {
        b.iter(|| filter.filter(black_box(&items), black_box(&counts)))
    });

    group.finish();
}

fn bench_t_statistic(c: &mut Criterion) {
    let mut group = c.benchmark_group("t_statistic");

    let values = random_values(100, 50, 11);
    group.bench_function("100_observations_post_and_propagate", |b| {
        b.iter(|| {
            let mut store = Store::new();
            let obs: Vec<VarId> = values
                .iter()
                .enumerate()
                .map(|(i, &v)| store.new_int_range(&format!("x{i}"), v, v + 1).unwrap())
                .collect();
            let mu = store.new_constant("mu", 25.0).unwrap();
            let t = store.new_real("t", -1e6, 1e6, 1e-6).unwrap();
            chain::t_statistic(&mut store, "t", &obs, mu, t, 1e-6).unwrap();
            store.propagate().unwrap();
            black_box(store.bounds(t))
        })
    });

    group.finish();
}

criterion_group!(benches, bench_transportation, bench_filter, bench_t_statistic);
criterion_main!(benches);
