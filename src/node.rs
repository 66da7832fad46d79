//! The per-level stride node: a prefix bitset, a child bitset, and two
//! popcount-compressed value arrays, plus the tagged child handle that
//! ties nodes together into a trie (`spec.md` §3/§4.2).
//!
//! A single generic node type backs both user-visible flavors this crate
//! ships: the ordinary, per-prefix-value table (`Node<A, V>`), and the
//! set-only flavor obtained for free by instantiating `V = ()` (see
//! `DESIGN.md` for why a separate zero-sized storage type was not
//! written out by hand).

use std::sync::Arc;

use crate::afi::Addr;
use crate::art;
use crate::bitset::Bitset256;
use crate::prefix::Prefix;

/// A path-compressed terminal carrying a full canonical prefix and a
/// value, installed when no further stride discrimination is needed.
#[derive(Clone)]
pub(crate) struct LeafNode<A: Addr, V> {
    pub prefix: Prefix<A>,
    pub value: V,
}

/// A path-compressed terminal whose prefix lands exactly on a stride
/// boundary. Carries only a value; its prefix is reconstructed from the
/// path taken to reach it.
#[derive(Clone)]
pub(crate) struct FringeNode<V> {
    pub value: V,
}

/// A child slot: another stride node, or one of the two path-compressed
/// terminals. Shared via `Arc` so that copy-on-write mutation can clone a
/// single node shallowly while the rest of the subtree stays shared with
/// any other snapshot that points at it (`spec.md` §4.10).
pub(crate) enum Handle<A: Addr, V> {
    Inner(Arc<Node<A, V>>),
    Leaf(Arc<LeafNode<A, V>>),
    Fringe(Arc<FringeNode<V>>),
}

impl<A: Addr, V> Clone for Handle<A, V> {
    fn clone(&self) -> Self {
        match self {
            Handle::Inner(n) => Handle::Inner(Arc::clone(n)),
            Handle::Leaf(l) => Handle::Leaf(Arc::clone(l)),
            Handle::Fringe(f) => Handle::Fringe(Arc::clone(f)),
        }
    }
}

/// One level of the multi-bit trie: an 8-bit-stride node holding a
/// popcount-compressed array of stored prefixes and a popcount-compressed
/// array of child handles (`spec.md` §3, §4.2 "Compressed layout").
pub(crate) struct Node<A: Addr, V> {
    pub(crate) prefixes: Bitset256,
    pub(crate) children: Bitset256,
    values: Vec<V>,
    kids: Vec<Handle<A, V>>,
}

impl<A: Addr, V> Clone for Node<A, V>
where
    V: Clone,
{
    fn clone(&self) -> Self {
        Node {
            prefixes: self.prefixes,
            children: self.children,
            values: self.values.clone(),
            kids: self.kids.clone(),
        }
    }
}

impl<A: Addr, V> Node<A, V> {
    pub(crate) fn empty() -> Self {
        Node {
            prefixes: Bitset256::new(),
            children: Bitset256::new(),
            values: Vec::new(),
            kids: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.prefixes.is_empty() && self.children.is_empty()
    }

    #[inline]
    pub(crate) fn occupancy(&self) -> u32 {
        self.prefixes.count() + self.children.count()
    }

    // ---- prefix (read) ----

    pub(crate) fn get_prefix(&self, idx: u8) -> Option<&V> {
        if self.prefixes.test(idx) {
            Some(&self.values[self.prefixes.rank(idx)])
        } else {
            None
        }
    }

    /// True iff any stored prefix in this node is an ancestor of `idx`.
    pub(crate) fn contains(&self, idx: u8) -> bool {
        art::LPM_BACKTRACKING_TABLE[idx as usize].intersects(&self.prefixes)
    }

    /// Longest-prefix match within this node only.
    pub(crate) fn lookup(&self, idx: u8) -> Option<&V> {
        self.lookup_idx(idx).map(|(_, v)| v)
    }

    pub(crate) fn lookup_idx(&self, idx: u8) -> Option<(u8, &V)> {
        let m = art::LPM_BACKTRACKING_TABLE[idx as usize].intersection(&self.prefixes);
        let match_idx = m.last_set()?;
        Some((match_idx, &self.values[self.prefixes.rank(match_idx)]))
    }

    // ---- prefix (write) ----

    /// Returns the previous value, if the index was already occupied
    /// (overwrite semantics).
    pub(crate) fn insert_prefix(&mut self, idx: u8, value: V) -> Option<V> {
        let rank = self.prefixes.rank(idx);
        if self.prefixes.test(idx) {
            Some(std::mem::replace(&mut self.values[rank], value))
        } else {
            self.prefixes.set(idx);
            self.values.insert(rank, value);
            None
        }
    }

    pub(crate) fn delete_prefix(&mut self, idx: u8) -> Option<V> {
        if !self.prefixes.test(idx) {
            return None;
        }
        let rank = self.prefixes.rank(idx);
        self.prefixes.clear(idx);
        Some(self.values.remove(rank))
    }

    // ---- children (read) ----

    pub(crate) fn get_child(&self, octet: u8) -> Option<&Handle<A, V>> {
        if self.children.test(octet) {
            Some(&self.kids[self.children.rank(octet)])
        } else {
            None
        }
    }

    pub(crate) fn get_child_mut(&mut self, octet: u8) -> Option<&mut Handle<A, V>> {
        if self.children.test(octet) {
            let rank = self.children.rank(octet);
            Some(&mut self.kids[rank])
        } else {
            None
        }
    }

    // ---- children (write) ----

    /// Inserts or overwrites a child slot. Returns the previous handle,
    /// if any.
    pub(crate) fn set_child(&mut self, octet: u8, handle: Handle<A, V>) -> Option<Handle<A, V>> {
        let rank = self.children.rank(octet);
        if self.children.test(octet) {
            Some(std::mem::replace(&mut self.kids[rank], handle))
        } else {
            self.children.set(octet);
            self.kids.insert(rank, handle);
            None
        }
    }

    pub(crate) fn delete_child(&mut self, octet: u8) -> Option<Handle<A, V>> {
        if !self.children.test(octet) {
            return None;
        }
        let rank = self.children.rank(octet);
        self.children.clear(octet);
        Some(self.kids.remove(rank))
    }

    /// All stored `(idx, value)` pairs, unordered.
    pub(crate) fn prefix_entries(&self) -> impl Iterator<Item = (u8, &V)> {
        self.prefixes.iter().zip(self.values.iter())
    }

    /// All `(octet, handle)` pairs, unordered.
    pub(crate) fn child_entries(&self) -> impl Iterator<Item = (u8, &Handle<A, V>)> {
        self.children.iter().zip(self.kids.iter())
    }
}

impl<A: Addr, V: PartialEq> Node<A, V> {
    /// Structural equality: same prefixes mapped to equal values, same
    /// children mapped to structurally equal subtrees. Used by
    /// `Trie::equal` (P10) and the compaction round-trip test (P2).
    pub(crate) fn structurally_equal(&self, other: &Self) -> bool {
        if self.prefixes != other.prefixes || self.children != other.children {
            return false;
        }
        if self.values != other.values {
            return false;
        }
        self.kids.iter().zip(other.kids.iter()).all(|(a, b)| match (a, b) {
            (Handle::Inner(a), Handle::Inner(b)) => a.structurally_equal(b),
            (Handle::Leaf(a), Handle::Leaf(b)) => a.prefix == b.prefix && a.value == b.value,
            (Handle::Fringe(a), Handle::Fringe(b)) => a.value == b.value,
            _ => false,
        })
    }
}
