//! A concurrently-readable wrapper around [`Table`]: lock-free reads of
//! a consistent snapshot, serialized writers, published via atomic
//! pointer swap (`spec.md` §5 "Concurrency & Resource Model").
//!
//! The teacher crate gets this property from an epoch-based reclamation
//! scheme (`crossbeam-epoch`) built for a mutable, in-place tree shared
//! by many writers. This crate's tree is immutable once published — a
//! reader only ever walks `Arc`-shared, never-mutated nodes — so an
//! `arc-swap` publish point plus a writer-side mutex is sufficient and
//! considerably simpler; see `DESIGN.md`.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::table::Table;

/// Many readers may call [`PersistentTable::snapshot`] and walk the
/// result concurrently and lock-free. Writers serialize through an
/// internal mutex and publish a brand new root on success; in-flight
/// readers keep working against the snapshot they already took.
pub struct PersistentTable<V> {
    current: ArcSwap<Table<V>>,
    writer: Mutex<()>,
}

impl<V> Default for PersistentTable<V>
where
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> PersistentTable<V>
where
    V: Clone,
{
    pub fn new() -> Self {
        PersistentTable { current: ArcSwap::from_pointee(Table::new()), writer: Mutex::new(()) }
    }

    /// A consistent, independently-readable view of the table as of
    /// this call. Other threads publishing new snapshots afterward
    /// don't affect it.
    pub fn snapshot(&self) -> Arc<Table<V>> {
        self.current.load_full()
    }

    /// Apply `f` to a private copy-on-write clone of the current
    /// snapshot and publish the result. Blocks only against other
    /// writers, never against readers.
    pub fn update(&self, f: impl FnOnce(&mut Table<V>)) {
        let _guard = self.writer.lock();
        let mut next = (**self.current.load()).clone();
        f(&mut next);
        self.current.store(Arc::new(next));
    }
}
