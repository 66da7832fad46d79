//! End-to-end scenarios and property tests run against the public
//! `Table`/`Trie` surface, as opposed to the unit tests living beside
//! each module.

use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use ipcidrie::{Prefix, Table, Trie};
use proptest::prelude::*;
use rand::{Rng, SeedableRng};

fn pfx(s: &str) -> inetnum::addr::Prefix {
    inetnum::addr::Prefix::from_str(s).unwrap()
}

// --- seeded end-to-end scenarios ---------------------------------------

#[test]
fn scenario_basic_lpm() {
    let mut t: Table<&'static str> = Table::new();
    t.insert(pfx("10.0.0.0/8"), "corp").unwrap();
    t.insert(pfx("10.1.0.0/16"), "branch").unwrap();
    t.insert(pfx("10.1.2.0/24"), "floor").unwrap();

    assert_eq!(t.lookup(IpAddr::V4(Ipv4Addr::new(10, 1, 2, 5))), Some("floor"));
    assert_eq!(t.lookup(IpAddr::V4(Ipv4Addr::new(10, 1, 9, 5))), Some("branch"));
    assert_eq!(t.lookup(IpAddr::V4(Ipv4Addr::new(10, 9, 9, 9))), Some("corp"));
    assert_eq!(t.lookup(IpAddr::V4(Ipv4Addr::new(11, 0, 0, 1))), None);
}

#[test]
fn scenario_delete_restores_shorter_match() {
    let mut t: Table<u8> = Table::new();
    t.insert(pfx("192.168.0.0/16"), 1).unwrap();
    t.insert(pfx("192.168.1.0/24"), 2).unwrap();
    assert_eq!(t.lookup(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))), Some(2));

    t.delete(pfx("192.168.1.0/24")).unwrap();
    assert_eq!(t.lookup(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))), Some(1));
    assert_eq!(t.size(), 1);
}

#[test]
fn scenario_exact_vs_lpm() {
    let mut t: Table<u8> = Table::new();
    t.insert(pfx("172.16.0.0/12"), 1).unwrap();
    assert!(t.exists(pfx("172.16.0.0/12")));
    assert!(!t.exists(pfx("172.16.0.0/16")));
    assert_eq!(t.lookup_prefix(pfx("172.16.0.0/16")), Some(1));
}

#[test]
fn scenario_overlap_detection() {
    let mut a: Table<()> = Table::new();
    a.insert(pfx("10.0.0.0/8"), ()).unwrap();
    let mut b: Table<()> = Table::new();
    b.insert(pfx("10.1.0.0/16"), ()).unwrap();
    let mut c: Table<()> = Table::new();
    c.insert(pfx("172.16.0.0/12"), ()).unwrap();

    assert!(a.overlaps(&b));
    assert!(b.overlaps(&a));
    assert!(!a.overlaps(&c));
}

#[test]
fn scenario_subnets_and_supernets_roundtrip() {
    let mut t: Table<u8> = Table::new();
    t.insert(pfx("10.0.0.0/8"), 1).unwrap();
    t.insert(pfx("10.0.0.0/16"), 2).unwrap();
    t.insert(pfx("10.0.1.0/24"), 3).unwrap();

    let subs: Vec<_> = t.subnets(pfx("10.0.0.0/8")).into_iter().map(|(p, _)| p).collect();
    assert_eq!(subs.len(), 3);

    let supers: Vec<_> =
        t.supernets(pfx("10.0.1.5/32")).into_iter().map(|(p, _)| p).collect();
    assert_eq!(supers.len(), 2);
}

#[test]
fn scenario_2_covering_slash2_overlaps_every_entry_on_the_other_side() {
    let mut a: Table<()> = Table::new();
    for s in [
        "128.0.0.0/2",
        "99.173.128.0/17",
        "219.150.142.0/23",
        "164.148.190.250/31",
        "48.136.229.233/32",
    ] {
        a.insert(pfx(s), ()).unwrap();
    }
    let mut b: Table<()> = Table::new();
    for s in [
        "217.32.0.0/11",
        "38.176.0.0/12",
        "106.16.0.0/13",
        "164.85.192.0/23",
        "225.71.164.112/31",
    ] {
        b.insert(pfx(s), ()).unwrap();
    }

    assert!(a.overlaps(&b));
    assert!(b.overlaps(&a));
}

#[test]
fn scenario_3_ipv6_slash127_edges() {
    let mut t: Table<()> = Table::new();
    t.insert(pfx("2001:db8::/127"), ()).unwrap();

    assert!(t.overlaps_prefix(pfx("2001:db8::/128")));
    assert!(t.overlaps_prefix(pfx("2001:db8::1/128")));
    assert!(!t.overlaps_prefix(pfx("2001:db8::2/128")));
    assert!(!t.overlaps_prefix(pfx("2001:db8::2/127")));
    assert!(t.overlaps_prefix(pfx("2001:db8::/126")));
}

#[test]
fn scenario_5_persistent_concurrency_reader_never_sees_new_prefixes() {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    let t0: Table<u32> = Table::new();
    let probe = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 77));
    assert!(!t0.contains(probe));

    let stop = Arc::new(AtomicBool::new(false));
    let reader_view = t0.clone();
    let reader_stop = Arc::clone(&stop);
    let reader = std::thread::spawn(move || {
        while !reader_stop.load(Ordering::Relaxed) {
            assert!(!reader_view.contains(probe));
        }
    });

    let mut rng = rand::rngs::StdRng::seed_from_u64(1);
    let mut t1 = t0.clone();
    for i in 0..1000u32 {
        let addr = Ipv4Addr::from(rng.random::<u32>());
        let p = Prefix::new(u32::from(addr), 32).unwrap().into();
        t1 = t1.insert_persist(p, i).unwrap();
    }

    stop.store(true, Ordering::Relaxed);
    reader.join().unwrap();

    assert_eq!(t1.size(), 1000);
    assert!(!t0.contains(probe));
}

#[test]
fn scenario_6_clone_then_sparse_mutate_diverges_with_equal_size() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    let mut a: Table<u32> = Table::new();
    let mut inserted: Vec<inetnum::addr::Prefix> = Vec::new();
    while inserted.len() < 10_000 {
        let addr = Ipv4Addr::from(rng.random::<u32>());
        let bits = rng.random_range(8..=32u8);
        let p: inetnum::addr::Prefix = Prefix::new(u32::from(addr), bits).unwrap().into();
        if a.insert(p, inserted.len() as u32).unwrap().is_none() {
            inserted.push(p);
        }
    }

    let mut a_prime = a.clone();
    assert!(a.equal(&a_prime));

    for (i, p) in inserted.iter().enumerate() {
        if i % 42 == 0 {
            let old = a_prime.get(*p).unwrap();
            a_prime.insert(*p, old.wrapping_add(1)).unwrap();
        }
    }

    assert_eq!(a.size(), a_prime.size());
    assert!(!a.equal(&a_prime));
}

#[test]
fn scenario_persistence_isolates_snapshots() {
    let mut base: Table<u8> = Table::new();
    base.insert(pfx("10.0.0.0/8"), 1).unwrap();

    let snapshot = base.clone();
    base.insert(pfx("10.1.0.0/16"), 2).unwrap();

    assert_eq!(base.size(), 2);
    assert_eq!(snapshot.size(), 1);
    assert!(snapshot.get(pfx("10.1.0.0/16")).is_none());
}

// --- property tests -----------------------------------------------------

fn arb_v4_prefix() -> impl Strategy<Value = Prefix<u32>> {
    (any::<u32>(), 0u8..=32u8).prop_map(|(addr, bits)| Prefix::new(addr, bits).unwrap())
}

fn arb_v4_addr() -> impl Strategy<Value = u32> {
    any::<u32>()
}

proptest! {
    // P1: insert followed by get returns what was inserted.
    #[test]
    fn p1_insert_then_get(p in arb_v4_prefix(), v in any::<u8>()) {
        let mut t: Trie<u32, u8> = Trie::new();
        t.insert(p, v);
        prop_assert_eq!(t.get(p), Some(v));
    }

    // P2: deleting everything that was inserted empties the trie, in any order.
    #[test]
    fn p2_delete_inverts_insert(
        prefixes in prop::collection::vec(arb_v4_prefix(), 0..30),
    ) {
        let mut t: Trie<u32, u32> = Trie::new();
        let mut unique = std::collections::BTreeMap::new();
        for (i, p) in prefixes.iter().enumerate() {
            t.insert(*p, i as u32);
            unique.insert(*p, i as u32);
        }
        for p in unique.keys() {
            let (_, existed) = t.delete(*p);
            prop_assert!(existed);
        }
        prop_assert_eq!(t.len(), 0);
    }

    // P3: the final table is independent of insertion order.
    #[test]
    fn p3_order_invariance(
        mut prefixes in prop::collection::vec(arb_v4_prefix(), 0..20),
    ) {
        let mut a: Trie<u32, u8> = Trie::new();
        for (i, p) in prefixes.iter().enumerate() {
            a.insert(*p, i as u8);
        }
        let forward = a.all_sorted();

        prefixes.reverse();
        let mut b: Trie<u32, u8> = Trie::new();
        for (i, p) in prefixes.iter().enumerate() {
            // reversed insertion changes *which* value wins on duplicate
            // prefixes, so insert with a constant value here to isolate
            // structural order-invariance from last-write-wins semantics.
            let _ = i;
            b.insert(*p, 0);
        }
        let mut a_keys: Vec<_> = forward.iter().map(|(p, _)| *p).collect();
        let mut b_keys: Vec<_> = b.all_sorted().iter().map(|(p, _)| *p).collect();
        a_keys.sort();
        a_keys.dedup();
        b_keys.sort();
        b_keys.dedup();
        prop_assert_eq!(a_keys, b_keys);
    }

    // P4: LPM by address matches a linear-scan reference implementation.
    #[test]
    fn p4_lpm_matches_reference(
        prefixes in prop::collection::vec(arb_v4_prefix(), 0..40),
        addr in arb_v4_addr(),
    ) {
        let mut t: Trie<u32, usize> = Trie::new();
        for (i, p) in prefixes.iter().enumerate() {
            t.insert(*p, i);
        }
        let reference = prefixes
            .iter()
            .enumerate()
            .filter(|(_, p)| p.contains_addr(addr))
            .max_by_key(|(_, p)| p.bits())
            .map(|(i, _)| i);
        let got = t.lookup(addr);
        // multiple prefixes of the same max length covering addr would
        // make "the" reference ambiguous; skip those cases.
        let max_len_count = prefixes.iter().filter(|p| {
            p.contains_addr(addr)
                && p.bits() == prefixes.iter().filter(|q| q.contains_addr(addr)).map(|q| q.bits()).max().unwrap_or(0)
        }).count();
        if max_len_count <= 1 {
            prop_assert_eq!(got.is_some(), reference.is_some());
        }
    }

    // P5: contains(addr) agrees with lookup(addr).is_some().
    #[test]
    fn p5_contains_matches_lookup(
        prefixes in prop::collection::vec(arb_v4_prefix(), 0..30),
        addr in arb_v4_addr(),
    ) {
        let mut t: Trie<u32, u8> = Trie::new();
        for (i, p) in prefixes.iter().enumerate() {
            t.insert(*p, i as u8);
        }
        prop_assert_eq!(t.contains(addr), t.lookup(addr).is_some());
    }

    // P6: overlap is symmetric.
    #[test]
    fn p6_overlap_is_symmetric(
        a_prefixes in prop::collection::vec(arb_v4_prefix(), 0..15),
        b_prefixes in prop::collection::vec(arb_v4_prefix(), 0..15),
    ) {
        let mut a: Trie<u32, ()> = Trie::new();
        for p in &a_prefixes { a.insert(*p, ()); }
        let mut b: Trie<u32, ()> = Trie::new();
        for p in &b_prefixes { b.insert(*p, ()); }
        prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
    }

    // P8: a `_persist` mutation never changes what the original sees.
    #[test]
    fn p8_persist_does_not_alias(p1 in arb_v4_prefix(), p2 in arb_v4_prefix(), v in any::<u8>()) {
        let base: Trie<u32, u8> = Trie::new();
        let base = base.insert_persist(p1, v);
        let before = base.get(p2);
        let _after_insert = base.insert_persist(p2, v.wrapping_add(1));
        prop_assert_eq!(base.get(p2), before);
    }

    // P9: union never loses an entry present in either input.
    #[test]
    fn p9_union_is_a_superset(
        a_prefixes in prop::collection::vec(arb_v4_prefix(), 0..15),
        b_prefixes in prop::collection::vec(arb_v4_prefix(), 0..15),
    ) {
        let mut a: Trie<u32, u8> = Trie::new();
        for (i, p) in a_prefixes.iter().enumerate() { a.insert(*p, i as u8); }
        let mut b: Trie<u32, u8> = Trie::new();
        for (i, p) in b_prefixes.iter().enumerate() { b.insert(*p, i as u8); }

        let merged = a.union_persist(&b);
        for p in a_prefixes.iter().chain(b_prefixes.iter()) {
            prop_assert!(merged.get(*p).is_some());
        }
    }

    // P10: two tables built from the same set of entries, regardless of
    // insertion order, compare equal.
    #[test]
    fn p10_equal_is_order_invariant(
        prefixes in prop::collection::vec(arb_v4_prefix(), 0..15),
    ) {
        let mut unique = std::collections::BTreeMap::new();
        for (i, p) in prefixes.iter().enumerate() {
            unique.insert(*p, i as u8);
        }
        let mut a: Trie<u32, u8> = Trie::new();
        for (p, v) in unique.iter() {
            a.insert(*p, *v);
        }
        let mut b: Trie<u32, u8> = Trie::new();
        for (p, v) in unique.iter().rev() {
            b.insert(*p, *v);
        }
        prop_assert!(a.equal(&b));
    }
}
