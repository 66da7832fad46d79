use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ipcidrie::{Addr, Prefix, Table, Trie};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn random_v4_prefix(rng: &mut StdRng) -> Prefix<u32> {
    let bits = rng.random_range(8..=32u8);
    let addr: u32 = rng.random();
    Prefix::new(addr, bits).unwrap()
}

fn build_trie(n: usize, rng: &mut StdRng) -> Trie<u32, u32> {
    let mut t = Trie::new();
    for i in 0..n {
        t.insert(random_v4_prefix(rng), i as u32);
    }
    t
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    for size in [1_000usize, 100_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut rng = StdRng::seed_from_u64(42);
            let prefixes: Vec<_> = (0..size).map(|_| random_v4_prefix(&mut rng)).collect();
            b.iter(|| {
                let mut t: Trie<u32, u32> = Trie::new();
                for (i, p) in prefixes.iter().enumerate() {
                    t.insert(*p, i as u32);
                }
                t
            });
        });
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let trie = build_trie(500_000, &mut rng);
    let probes: Vec<u32> = (0..10_000).map(|_| rng.random()).collect();

    let mut group = c.benchmark_group("lookup");
    group.throughput(Throughput::Elements(probes.len() as u64));
    group.bench_function("lpm_by_address", |b| {
        b.iter(|| {
            let mut hits = 0u32;
            for addr in &probes {
                if trie.lookup(*addr).is_some() {
                    hits += 1;
                }
            }
            hits
        });
    });
    group.finish();
}

fn bench_table_persist(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(99);
    let mut table: Table<u32> = Table::new();
    for i in 0..50_000 {
        table
            .insert(
                inetnum::addr::Prefix::new(
                    std::net::Ipv4Addr::from(rng.random::<u32>()).into(),
                    rng.random_range(8..=32u8),
                )
                .unwrap(),
                i,
            )
            .unwrap();
    }

    c.bench_function("insert_persist_single", |b| {
        let p = inetnum::addr::Prefix::new(
            std::net::Ipv4Addr::new(203, 0, 113, 0).into(),
            24,
        )
        .unwrap();
        b.iter(|| table.insert_persist(p, 1).unwrap());
    });
}

criterion_group!(benches, bench_insert, bench_lookup, bench_table_persist);
criterion_main!(benches);
