//! Traversal: unordered and canonically sorted enumeration, and the
//! `subnets`/`supernets` queries built on the same allotment tables that
//! back longest-prefix match (`spec.md` §4.7).
//!
//! Every entry point here takes a visitor closure returning `true` to
//! keep going or `false` to stop, so a caller can bail out of a walk
//! over a huge table without the table needing to know why
//! (`spec.md` §5 "Cancellation").

use crate::afi::Addr;
use crate::art;
use crate::node::{Handle, Node};
use crate::prefix::Prefix;
use crate::trie::Trie;

/// Depth-first, unordered walk of every stored `(prefix, &V)` pair.
/// Returns `false` if `visit` asked to stop early.
fn walk_node<A, V>(
    node: &Node<A, V>,
    depth: u8,
    path: &mut Vec<u8>,
    visit: &mut impl FnMut(Prefix<A>, &V) -> bool,
) -> bool
where
    A: Addr,
{
    for (idx, value) in node.prefix_entries() {
        let (o, bits_local) = art::idx_to_pfx(idx);
        let mut octets = path.clone();
        octets.push(o);
        let addr = A::from_octets(&octets);
        let prefix = Prefix::new_unchecked(addr, depth * 8 + bits_local);
        if !visit(prefix, value) {
            return false;
        }
    }
    for (octet, handle) in node.child_entries() {
        match handle {
            Handle::Inner(inner) => {
                path.push(octet);
                let keep_going = walk_node(inner, depth + 1, path, visit);
                path.pop();
                if !keep_going {
                    return false;
                }
            }
            Handle::Leaf(leaf) => {
                if !visit(leaf.prefix, &leaf.value) {
                    return false;
                }
            }
            Handle::Fringe(fringe) => {
                let mut octets = path.clone();
                octets.push(octet);
                let addr = A::from_octets(&octets);
                let prefix = Prefix::new_unchecked(addr, (depth + 1) * 8);
                if !visit(prefix, &fringe.value) {
                    return false;
                }
            }
        }
    }
    true
}

/// Collects every ancestor-or-self of `query` stored below `node`, i.e.
/// every stored prefix that `query` is contained by (`spec.md` §4.7
/// "supernets").
fn supernets_node<A, V>(
    node: &Node<A, V>,
    query: Prefix<A>,
    depth: u8,
    visit: &mut impl FnMut(Prefix<A>, &V) -> bool,
) -> bool
where
    A: Addr + std::ops::BitAnd<Output = A>,
{
    let last_octet_plus_one = query.bits() / 8;
    let last_bits = query.bits() % 8;
    let at_final = depth == last_octet_plus_one;
    let probe_idx = if at_final {
        art::pfx_to_idx(query.addr().octet(depth), last_bits)
    } else {
        art::octet_to_idx(query.addr().octet(depth))
    };

    let ancestors = art::LPM_BACKTRACKING_TABLE[probe_idx as usize].intersection(&node.prefixes);
    for idx in ancestors.iter() {
        if at_final && idx == probe_idx {
            // the exact match, not a strict supernet; `Trie::supernets`
            // appends it itself via `get` so every representation
            // (stride-local, leaf, fringe) is handled uniformly.
            continue;
        }
        let (o, bits_local) = art::idx_to_pfx(idx);
        let octets: Vec<u8> = (0..depth).map(|i| query.addr().octet(i)).chain([o]).collect();
        let addr = A::from_octets(&octets);
        let prefix = Prefix::new_unchecked(addr, depth * 8 + bits_local);
        let value = node.get_prefix(idx).expect("idx came from node.prefixes");
        if !visit(prefix, value) {
            return false;
        }
    }

    if at_final {
        return true;
    }
    let octet = query.addr().octet(depth);
    match node.get_child(octet) {
        None => true,
        Some(Handle::Inner(inner)) => supernets_node(inner, query, depth + 1, visit),
        Some(Handle::Fringe(fringe)) => {
            if query.bits() > (depth + 1) * 8 {
                let bits = (depth + 1) * 8;
                let prefix = Prefix::new_unchecked(query.addr().canonicalize(bits), bits);
                visit(prefix, &fringe.value)
            } else {
                true
            }
        }
        Some(Handle::Leaf(leaf)) => {
            if leaf.prefix.contains(&query) && leaf.prefix != query {
                visit(leaf.prefix, &leaf.value)
            } else {
                true
            }
        }
    }
}

/// Collects every descendant-or-self of `query`: every stored prefix
/// that `query` contains (`spec.md` §4.7 "subnets").
fn subnets_node<A, V>(
    node: &Node<A, V>,
    query: Prefix<A>,
    depth: u8,
    path: &mut Vec<u8>,
    visit: &mut impl FnMut(Prefix<A>, &V) -> bool,
) -> bool
where
    A: Addr + std::ops::BitAnd<Output = A>,
{
    let last_octet_plus_one = query.bits() / 8;
    let last_bits = query.bits() % 8;

    if depth == last_octet_plus_one {
        let idx = art::pfx_to_idx(query.addr().octet(depth), last_bits);
        let descendants = art::PFX_ROUTES_LOOKUP_TBL[idx as usize].intersection(&node.prefixes);
        for d_idx in descendants.iter() {
            let (o, bits_local) = art::idx_to_pfx(d_idx);
            let mut octets = path.clone();
            octets.push(o);
            let addr = A::from_octets(&octets);
            let prefix = Prefix::new_unchecked(addr, depth * 8 + bits_local);
            let value = node.get_prefix(d_idx).expect("idx came from node.prefixes");
            if !visit(prefix, value) {
                return false;
            }
        }
        let covered_children =
            art::FRINGE_ROUTES_LOOKUP_TBL[idx as usize].intersection(&node.children);
        for octet in covered_children.iter() {
            if !emit_subtree(node.get_child(octet).expect("set bit has a handle"), depth + 1, path, octet, visit)
            {
                return false;
            }
        }
        return true;
    }

    let idx = art::octet_to_idx(query.addr().octet(depth));
    if node.contains(idx) {
        // an ancestor of the query already covers this whole branch; the
        // ancestor itself was (or will be) reported by the caller via
        // `supernets`/`lookup`, not here. `subnets` only ever reports
        // at-or-below `query`, so continue descending without emitting.
    }
    let octet = query.addr().octet(depth);
    match node.get_child(octet) {
        None => true,
        Some(Handle::Inner(inner)) => {
            path.push(octet);
            let keep_going = subnets_node(inner, query, depth + 1, path, visit);
            path.pop();
            keep_going
        }
        Some(Handle::Fringe(fringe)) => {
            let mut octets = path.clone();
            octets.push(octet);
            let addr = A::from_octets(&octets);
            let prefix = Prefix::new_unchecked(addr, (depth + 1) * 8);
            if prefix.contains(&query) || query.contains(&prefix) {
                visit(prefix, &fringe.value)
            } else {
                true
            }
        }
        Some(Handle::Leaf(leaf)) => {
            if query.contains(&leaf.prefix) {
                visit(leaf.prefix, &leaf.value)
            } else {
                true
            }
        }
    }
}

fn emit_subtree<A, V>(
    handle: &Handle<A, V>,
    depth: u8,
    path: &mut Vec<u8>,
    entry_octet: u8,
    visit: &mut impl FnMut(Prefix<A>, &V) -> bool,
) -> bool
where
    A: Addr,
{
    match handle {
        Handle::Leaf(leaf) => visit(leaf.prefix, &leaf.value),
        Handle::Fringe(fringe) => {
            let mut octets = path.clone();
            octets.push(entry_octet);
            let addr = A::from_octets(&octets);
            let prefix = Prefix::new_unchecked(addr, depth * 8);
            visit(prefix, &fringe.value)
        }
        Handle::Inner(inner) => {
            path.push(entry_octet);
            let keep_going = walk_node(inner, depth, path, visit);
            path.pop();
            keep_going
        }
    }
}

impl<A, V> Trie<A, V>
where
    A: Addr + std::ops::BitAnd<Output = A>,
    V: Clone,
{
    /// Visit every stored `(prefix, &V)` pair in unspecified order until
    /// `visit` returns `false` or the trie is exhausted.
    pub fn walk(&self, mut visit: impl FnMut(Prefix<A>, &V) -> bool) {
        let mut path = Vec::with_capacity(A::max_depth() as usize);
        walk_node(&self.root, 0, &mut path, &mut visit);
    }

    /// Every stored `(prefix, value)` pair, in unspecified order.
    pub fn all(&self) -> Vec<(Prefix<A>, V)> {
        let mut out = Vec::with_capacity(self.len());
        self.walk(|p, v| {
            out.push((p, v.clone()));
            true
        });
        out
    }

    /// Every stored `(prefix, value)` pair in canonical CIDR order
    /// (address ascending, then length ascending).
    pub fn all_sorted(&self) -> Vec<(Prefix<A>, V)> {
        let mut out = self.all();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Every stored prefix that `query` contains, including `query`
    /// itself if present.
    pub fn subnets(&self, query: Prefix<A>) -> Vec<(Prefix<A>, V)> {
        let mut out = Vec::new();
        let mut path = Vec::with_capacity(A::max_depth() as usize);
        subnets_node(&self.root, query, 0, &mut path, &mut |p, v| {
            out.push((p, v.clone()));
            true
        });
        out
    }

    pub fn subnets_sorted(&self, query: Prefix<A>) -> Vec<(Prefix<A>, V)> {
        let mut out = self.subnets(query);
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Every stored prefix that contains `query`, including `query`
    /// itself if present.
    pub fn supernets(&self, query: Prefix<A>) -> Vec<(Prefix<A>, V)> {
        let mut out = Vec::new();
        supernets_node(&self.root, query, 0, &mut |p, v| {
            out.push((p, v.clone()));
            true
        });
        if let Some(value) = self.get(query) {
            out.push((query, value));
        }
        out
    }

    pub fn supernets_sorted(&self, query: Prefix<A>) -> Vec<(Prefix<A>, V)> {
        let mut out = self.supernets(query);
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}
