//! The mutating and persistent trie operations (`spec.md` §4.3–§4.6,
//! §4.8–§4.10): insert, delete, get, lookup, contains, overlap, union,
//! and clone, plus the copy-on-write sibling of every mutation.
//!
//! Copy-on-write is implemented with `Arc::make_mut` rather than the
//! teacher's `crossbeam-epoch` reclamation scheme: see `DESIGN.md` for
//! why that substitution is safe and sufficient for the single-writer
//! contract this crate promises (`spec.md` §5).

use std::sync::Arc;

use crate::afi::Addr;
use crate::art;
use crate::error::{TrieError, TrieResult};
use crate::node::{FringeNode, Handle, LeafNode, Node};
use crate::prefix::Prefix;

/// An in-memory, singly-rooted multi-bit trie over one address family.
///
/// This is the building block `Table` (`src/table.rs`) composes two of
/// (one per address family) into the public-facing routing table. It is
/// also usable standalone for callers that only need one family.
pub struct Trie<A: Addr, V> {
    pub(crate) root: Arc<Node<A, V>>,
    size: usize,
}

impl<A, V> Trie<A, V>
where
    A: Addr + std::ops::BitAnd<Output = A>,
{
    pub fn new() -> Self {
        Trie { root: Arc::new(Node::empty()), size: 0 }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

impl<A, V> Default for Trie<A, V>
where
    A: Addr + std::ops::BitAnd<Output = A>,
{
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn fringe_condition(bits: u8, depth: u8, max_depth: u8) -> bool {
    let next_depth = depth + 1;
    bits == next_depth * 8 && next_depth < max_depth
}

fn insert_rec<A, V>(node: &mut Node<A, V>, prefix: Prefix<A>, depth: u8, value: V) -> Option<V>
where
    A: Addr,
    V: Clone,
{
    let max_depth = A::max_depth();
    let last_octet_plus_one = prefix.bits() / 8;
    let last_bits = prefix.bits() % 8;

    if depth == last_octet_plus_one {
        let idx = art::pfx_to_idx(prefix.addr().octet(depth), last_bits);
        return node.insert_prefix(idx, value);
    }

    let octet = prefix.addr().octet(depth);
    match node.get_child_mut(octet) {
        None => {
            let handle = if fringe_condition(prefix.bits(), depth, max_depth) {
                Handle::Fringe(Arc::new(FringeNode { value }))
            } else {
                Handle::Leaf(Arc::new(LeafNode { prefix, value }))
            };
            node.set_child(octet, handle);
            None
        }
        Some(Handle::Inner(inner)) => {
            let inner = Arc::make_mut(inner);
            insert_rec(inner, prefix, depth + 1, value)
        }
        Some(handle) => match handle {
            Handle::Inner(_) => unreachable!("Inner matched above"),
            Handle::Leaf(leaf_arc) => {
                if leaf_arc.prefix == prefix {
                    let leaf = Arc::make_mut(leaf_arc);
                    Some(std::mem::replace(&mut leaf.value, value))
                } else {
                    let old = (**leaf_arc).clone();
                    let mut new_inner = Node::empty();
                    insert_rec(&mut new_inner, old.prefix, depth + 1, old.value);
                    insert_rec(&mut new_inner, prefix, depth + 1, value);
                    *handle = Handle::Inner(Arc::new(new_inner));
                    None
                }
            }
            Handle::Fringe(fringe_arc) => {
                if fringe_condition(prefix.bits(), depth, max_depth) {
                    let fringe = Arc::make_mut(fringe_arc);
                    Some(std::mem::replace(&mut fringe.value, value))
                } else {
                    let old_value = fringe_arc.value.clone();
                    let mut new_inner = Node::empty();
                    new_inner.insert_prefix(1, old_value);
                    insert_rec(&mut new_inner, prefix, depth + 1, value);
                    *handle = Handle::Inner(Arc::new(new_inner));
                    None
                }
            }
        },
    }
}

/// What the parent of a just-visited node should do with its child slot
/// after a deletion may have emptied or collapsed that node
/// (`spec.md` §4.4 "Purge and compress").
enum Collapse<A: Addr, V> {
    /// The node still holds two or more entries (or is the root): leave
    /// the slot alone.
    Keep,
    /// The node is now empty: clear the parent's child slot.
    Remove,
    /// The node collapsed to a single leaf/fringe, or its one remaining
    /// child was promoted: replace the parent's slot with this handle.
    Replace(Handle<A, V>),
}

fn compact<A, V>(
    node: &Node<A, V>,
    depth: u8,
    path: &[u8],
    is_root: bool,
) -> TrieResult<Collapse<A, V>>
where
    A: Addr,
    V: Clone,
{
    if is_root {
        return Ok(Collapse::Keep);
    }
    match node.occupancy() {
        0 => Ok(Collapse::Remove),
        1 => {
            if let Some(idx) = node.prefixes.first_set() {
                let (o, bits_local) = art::idx_to_pfx(idx);
                let value = node.get_prefix(idx).ok_or(TrieError)?.clone();
                if bits_local == 0 {
                    Ok(Collapse::Replace(Handle::Fringe(Arc::new(FringeNode { value }))))
                } else {
                    let mut octets: Vec<u8> = path.to_vec();
                    octets.push(o);
                    let addr = A::from_octets(&octets);
                    let prefix = Prefix::new_unchecked(addr, depth * 8 + bits_local);
                    Ok(Collapse::Replace(Handle::Leaf(Arc::new(LeafNode { prefix, value }))))
                }
            } else {
                let octet = node.children.first_set().ok_or(TrieError)?;
                let handle = node.get_child(octet).ok_or(TrieError)?.clone();
                match handle {
                    Handle::Inner(_) | Handle::Leaf(_) => Ok(Collapse::Replace(handle)),
                    Handle::Fringe(fringe) => {
                        let mut octets: Vec<u8> = path.to_vec();
                        octets.push(octet);
                        let addr = A::from_octets(&octets);
                        let prefix = Prefix::new_unchecked(addr, (depth + 1) * 8);
                        Ok(Collapse::Replace(Handle::Leaf(Arc::new(LeafNode {
                            prefix,
                            value: fringe.value.clone(),
                        }))))
                    }
                }
            }
        }
        _ => Ok(Collapse::Keep),
    }
}

fn delete_rec<A, V>(
    node: &mut Node<A, V>,
    target: Prefix<A>,
    depth: u8,
    path: &mut Vec<u8>,
    is_root: bool,
) -> TrieResult<(Option<V>, Collapse<A, V>)>
where
    A: Addr,
    V: Clone,
{
    let last_octet_plus_one = target.bits() / 8;
    let last_bits = target.bits() % 8;

    if depth == last_octet_plus_one {
        let idx = art::pfx_to_idx(target.addr().octet(depth), last_bits);
        let removed = node.delete_prefix(idx);
        return Ok((removed, compact(node, depth, path, is_root)?));
    }

    let octet = target.addr().octet(depth);
    let removed = match node.get_child_mut(octet) {
        None => None,
        Some(Handle::Leaf(leaf)) => {
            if leaf.prefix == target {
                let value = leaf.value.clone();
                node.delete_child(octet);
                Some(value)
            } else {
                None
            }
        }
        Some(Handle::Fringe(fringe)) => {
            let max_depth = A::max_depth();
            if fringe_condition(target.bits(), depth, max_depth) {
                let value = fringe.value.clone();
                node.delete_child(octet);
                Some(value)
            } else {
                None
            }
        }
        Some(Handle::Inner(inner)) => {
            path.push(octet);
            let inner_mut = Arc::make_mut(inner);
            let (value, collapse) = delete_rec(inner_mut, target, depth + 1, path, false)?;
            path.pop();
            match collapse {
                Collapse::Keep => {}
                Collapse::Remove => {
                    node.delete_child(octet);
                }
                Collapse::Replace(handle) => {
                    node.set_child(octet, handle);
                }
            }
            value
        }
    };

    Ok((removed, compact(node, depth, path, is_root)?))
}

impl<A, V> Trie<A, V>
where
    A: Addr + std::ops::BitAnd<Output = A>,
    V: Clone,
{
    /// Insert a prefix, overwriting any existing value. Returns the
    /// previous value, if the prefix was already present.
    pub fn insert(&mut self, prefix: Prefix<A>, value: V) -> Option<V> {
        let root = Arc::make_mut(&mut self.root);
        let old = insert_rec(root, prefix, 0, value);
        if old.is_none() {
            self.size += 1;
        }
        old
    }

    /// Copy-on-write sibling of [`Trie::insert`]: `self` is left
    /// untouched, and the returned trie shares every subtree that the
    /// insert didn't touch (`spec.md` §4.10, P8).
    pub fn insert_persist(&self, prefix: Prefix<A>, value: V) -> Self {
        let mut next = self.clone();
        next.insert(prefix, value);
        next
    }

    /// Remove a prefix. Returns `(old_value, existed)`.
    pub fn delete(&mut self, prefix: Prefix<A>) -> (Option<V>, bool) {
        let root = Arc::make_mut(&mut self.root);
        let mut path = Vec::with_capacity(A::max_depth() as usize);
        let (value, _collapse) = delete_rec(root, prefix, 0, &mut path, true)
            .unwrap_or_else(|e| panic!("{e}"));
        let existed = value.is_some();
        if existed {
            self.size -= 1;
        }
        (value, existed)
    }

    pub fn delete_persist(&self, prefix: Prefix<A>) -> (Self, Option<V>, bool) {
        let mut next = self.clone();
        let (value, existed) = next.delete(prefix);
        (next, value, existed)
    }

    /// `f(existing, existed) -> (new_value, delete)`: apply a
    /// read-modify-write to the slot for `prefix` in one tree walk.
    pub fn modify<F>(&mut self, prefix: Prefix<A>, f: F) -> Option<V>
    where
        F: FnOnce(Option<&V>, bool) -> (Option<V>, bool),
    {
        let existing = self.get(prefix);
        let existed = existing.is_some();
        let (new_value, delete) = f(existing.as_ref(), existed);
        if delete {
            let (old, _) = self.delete(prefix);
            old
        } else if let Some(v) = new_value {
            self.insert(prefix, v)
        } else {
            existing
        }
    }

    pub fn modify_persist<F>(&self, prefix: Prefix<A>, f: F) -> Self
    where
        F: FnOnce(Option<&V>, bool) -> (Option<V>, bool),
    {
        let mut next = self.clone();
        next.modify(prefix, f);
        next
    }

    /// Exact-match retrieval.
    pub fn get(&self, prefix: Prefix<A>) -> Option<V> {
        let mut node = &*self.root;
        let last_octet_plus_one = prefix.bits() / 8;
        let last_bits = prefix.bits() % 8;
        let mut depth = 0u8;
        loop {
            if depth == last_octet_plus_one {
                let idx = art::pfx_to_idx(prefix.addr().octet(depth), last_bits);
                return node.get_prefix(idx).cloned();
            }
            let octet = prefix.addr().octet(depth);
            match node.get_child(octet) {
                None => return None,
                Some(Handle::Inner(inner)) => {
                    node = inner;
                    depth += 1;
                }
                Some(Handle::Leaf(leaf)) => {
                    return (leaf.prefix == prefix).then(|| leaf.value.clone());
                }
                Some(Handle::Fringe(fringe)) => {
                    let max_depth = A::max_depth();
                    return fringe_condition(prefix.bits(), depth, max_depth)
                        .then(|| fringe.value.clone());
                }
            }
        }
    }

    pub fn exists(&self, prefix: Prefix<A>) -> bool {
        self.get(prefix).is_some()
    }

    /// Longest-prefix match by address (`spec.md` §4.5).
    pub fn lookup(&self, addr: A) -> Option<V> {
        let mut node = &*self.root;
        let mut best: Option<V> = None;
        let mut depth = 0u8;
        loop {
            let idx = art::octet_to_idx(addr.octet(depth));
            if let Some(v) = node.lookup(idx) {
                best = Some(v.clone());
            }
            let octet = addr.octet(depth);
            match node.get_child(octet) {
                None => return best,
                Some(Handle::Inner(inner)) => {
                    node = inner;
                    depth += 1;
                    if depth == A::max_depth() {
                        return best;
                    }
                }
                Some(Handle::Fringe(fringe)) => return Some(fringe.value.clone()),
                Some(Handle::Leaf(leaf)) => {
                    return if leaf.prefix.contains_addr(addr) {
                        Some(leaf.value.clone())
                    } else {
                        best
                    };
                }
            }
        }
    }

    /// Whether any stored prefix contains `addr`. Early-exits on the
    /// first ancestor found, without computing the actual LPM value.
    pub fn contains(&self, addr: A) -> bool {
        let mut node = &*self.root;
        let mut depth = 0u8;
        loop {
            let idx = art::octet_to_idx(addr.octet(depth));
            if node.contains(idx) {
                return true;
            }
            let octet = addr.octet(depth);
            match node.get_child(octet) {
                None => return false,
                Some(Handle::Inner(inner)) => {
                    node = inner;
                    depth += 1;
                    if depth == A::max_depth() {
                        return false;
                    }
                }
                Some(Handle::Fringe(_)) => return true,
                Some(Handle::Leaf(leaf)) => return leaf.prefix.contains_addr(addr),
            }
        }
    }

    /// Longest stored prefix containing `prefix` (LPM against prefixes,
    /// not addresses; `spec.md` §4.6).
    pub fn lookup_prefix(&self, prefix: Prefix<A>) -> Option<V> {
        self.lookup_prefix_lpm(prefix).map(|(_, v)| v)
    }

    pub fn lookup_prefix_lpm(&self, prefix: Prefix<A>) -> Option<(Prefix<A>, V)> {
        let mut node = &*self.root;
        let last_octet_plus_one = prefix.bits() / 8;
        let last_bits = prefix.bits() % 8;
        let mut depth = 0u8;
        let mut best: Option<(u8, u8, V)> = None; // (depth, idx, value)

        loop {
            let at_final = depth == last_octet_plus_one;
            let probe_idx = if at_final {
                art::pfx_to_idx(prefix.addr().octet(depth), last_bits)
            } else {
                art::octet_to_idx(prefix.addr().octet(depth))
            };
            if let Some((match_idx, v)) = node.lookup_idx(probe_idx) {
                best = Some((depth, match_idx, v.clone()));
            }
            if at_final {
                break;
            }
            let octet = prefix.addr().octet(depth);
            match node.get_child(octet) {
                None => break,
                Some(Handle::Inner(inner)) => {
                    node = inner;
                    depth += 1;
                }
                Some(Handle::Fringe(fringe)) => {
                    return Some((
                        Prefix::new_unchecked(
                            prefix.addr().canonicalize((depth + 1) * 8),
                            (depth + 1) * 8,
                        ),
                        fringe.value.clone(),
                    ));
                }
                Some(Handle::Leaf(leaf)) => {
                    if leaf.prefix.contains(&prefix) {
                        return Some((leaf.prefix, leaf.value.clone()));
                    }
                    break;
                }
            }
        }

        best.map(|(d, idx, v)| {
            let (o, bits_local) = art::idx_to_pfx(idx);
            let mut octets: Vec<u8> = (0..d).map(|i| prefix.addr().octet(i)).collect();
            octets.push(o);
            let addr = A::from_octets(&octets);
            (Prefix::new_unchecked(addr, d * 8 + bits_local), v)
        })
    }

    /// Whether any stored prefix overlaps `query` (`spec.md` §4.8).
    pub fn overlaps_prefix(&self, query: Prefix<A>) -> bool {
        let mut node = &*self.root;
        let last_octet_plus_one = query.bits() / 8;
        let last_bits = query.bits() % 8;
        let mut depth = 0u8;
        loop {
            if depth == last_octet_plus_one {
                let idx = art::pfx_to_idx(query.addr().octet(depth), last_bits);
                return overlaps_idx(node, idx);
            }
            let idx = art::octet_to_idx(query.addr().octet(depth));
            if node.contains(idx) {
                return true;
            }
            let octet = query.addr().octet(depth);
            match node.get_child(octet) {
                None => return false,
                Some(Handle::Inner(inner)) => {
                    node = inner;
                    depth += 1;
                }
                Some(Handle::Fringe(_)) => return true,
                Some(Handle::Leaf(leaf)) => return leaf.prefix.overlaps(&query),
            }
        }
    }

    /// Whether `self` and `other` share any overlapping prefix
    /// (`spec.md` §4.8). Symmetric (P6).
    pub fn overlaps(&self, other: &Self) -> bool {
        overlaps_nodes(&self.root, &other.root)
    }

    /// Merge `other` into `self`, "other wins" on an exact-prefix
    /// conflict (`spec.md` §4.9, P9).
    pub fn union(&mut self, other: &Self) {
        let root = Arc::make_mut(&mut self.root);
        let duplicates = union_rec(root, &other.root, 0).unwrap_or_else(|e| panic!("{e}"));
        self.size += other.size - duplicates;
    }

    pub fn union_persist(&self, other: &Self) -> Self {
        let mut next = self.clone();
        next.union(other);
        next
    }

    /// A deep, independent snapshot. Cheap at the root (an `Arc` bump);
    /// any subsequent mutation of either copy diverges via
    /// copy-on-write without affecting the other.
    pub fn clone(&self) -> Self {
        Trie { root: Arc::clone(&self.root), size: self.size }
    }
}

impl<A, V> Trie<A, V>
where
    A: Addr + std::ops::BitAnd<Output = A>,
    V: Clone + PartialEq,
{
    /// Same set of `(prefix, value)` pairs, independent of insertion
    /// order or internal structure (P10).
    pub fn equal(&self, other: &Self) -> bool {
        self.size == other.size && self.root.structurally_equal(&other.root)
    }
}

fn overlaps_idx<A: Addr, V>(node: &Node<A, V>, idx: u8) -> bool {
    if node.contains(idx) {
        return true;
    }
    if art::PFX_ROUTES_LOOKUP_TBL[idx as usize].intersects(&node.prefixes) {
        return true;
    }
    art::FRINGE_ROUTES_LOOKUP_TBL[idx as usize].intersects(&node.children)
}

fn overlaps_nodes<A: Addr + std::ops::BitAnd<Output = A>, V>(a: &Node<A, V>, b: &Node<A, V>) -> bool {
    if a.prefixes.intersects(&b.prefixes) {
        return true;
    }
    for (idx, _) in a.prefix_entries() {
        if overlaps_idx(b, idx) {
            return true;
        }
    }
    for (idx, _) in b.prefix_entries() {
        if overlaps_idx(a, idx) {
            return true;
        }
    }
    for octet in a.children.intersection(&b.children).iter() {
        let ha = a.get_child(octet).ok_or(TrieError).unwrap_or_else(|e| panic!("{e}"));
        let hb = b.get_child(octet).ok_or(TrieError).unwrap_or_else(|e| panic!("{e}"));
        if handles_overlap(ha, hb) {
            return true;
        }
    }
    false
}

fn handles_overlap<A: Addr + std::ops::BitAnd<Output = A>, V>(a: &Handle<A, V>, b: &Handle<A, V>) -> bool {
    match (a, b) {
        (Handle::Fringe(_), _) | (_, Handle::Fringe(_)) => true,
        (Handle::Inner(a), Handle::Inner(b)) => overlaps_nodes(a, b),
        (Handle::Leaf(leaf), Handle::Inner(node)) | (Handle::Inner(node), Handle::Leaf(leaf)) => {
            overlaps_prefix_in_subtree(node, &leaf.prefix, 1)
        }
        (Handle::Leaf(a), Handle::Leaf(b)) => a.prefix.overlaps(&b.prefix),
    }
}

fn overlaps_prefix_in_subtree<A: Addr + std::ops::BitAnd<Output = A>, V>(node: &Node<A, V>, query: &Prefix<A>, depth: u8) -> bool {
    let last_octet_plus_one = query.bits() / 8;
    let last_bits = query.bits() % 8;
    if depth == last_octet_plus_one {
        let idx = art::pfx_to_idx(query.addr().octet(depth), last_bits);
        return overlaps_idx(node, idx);
    }
    let idx = art::octet_to_idx(query.addr().octet(depth));
    if node.contains(idx) {
        return true;
    }
    let octet = query.addr().octet(depth);
    match node.get_child(octet) {
        None => false,
        Some(Handle::Inner(inner)) => overlaps_prefix_in_subtree(inner, query, depth + 1),
        Some(Handle::Fringe(_)) => true,
        Some(Handle::Leaf(leaf)) => leaf.prefix.overlaps(query),
    }
}

/// Merges `other`'s child into `self`'s slot. Returns the number of
/// exact-prefix duplicates encountered, so the caller can adjust its
/// size counter (`spec.md` §4.9). `depth` is the stride depth of `node`
/// and `other` themselves, so any leaf/fringe value pushed down into a
/// child inner node is inserted at `depth + 1`.
fn union_rec<A, V>(node: &mut Node<A, V>, other: &Node<A, V>, depth: u8) -> TrieResult<usize>
where
    A: Addr,
    V: Clone,
{
    let mut duplicates = 0;
    for (idx, value) in other.prefix_entries() {
        if node.insert_prefix(idx, value.clone()).is_some() {
            duplicates += 1;
        }
    }
    for (octet, other_handle) in other.child_entries() {
        match node.get_child_mut(octet) {
            None => {
                node.set_child(octet, other_handle.clone());
            }
            Some(Handle::Inner(self_inner)) => match other_handle {
                Handle::Inner(other_inner) => {
                    duplicates += union_rec(Arc::make_mut(self_inner), other_inner, depth + 1)?;
                }
                Handle::Leaf(leaf) => {
                    let self_inner = Arc::make_mut(self_inner);
                    if insert_rec(self_inner, leaf.prefix, depth + 1, leaf.value.clone())
                        .is_some()
                    {
                        duplicates += 1;
                    }
                }
                Handle::Fringe(fringe) => {
                    let self_inner = Arc::make_mut(self_inner);
                    if self_inner.insert_prefix(1, fringe.value.clone()).is_some() {
                        duplicates += 1;
                    }
                }
            },
            Some(slot) => {
                // self holds a leaf or fringe here: materialize an inner
                // node, push the existing terminal down, then merge in
                // the other side's entry at depth + 1.
                let mut new_inner = Node::empty();
                match slot.clone() {
                    Handle::Leaf(leaf) => {
                        insert_rec(&mut new_inner, leaf.prefix, depth + 1, leaf.value.clone());
                    }
                    Handle::Fringe(fringe) => {
                        new_inner.insert_prefix(1, fringe.value.clone());
                    }
                    Handle::Inner(_) => return Err(TrieError),
                }
                match other_handle {
                    Handle::Inner(other_inner) => {
                        duplicates += union_rec(&mut new_inner, other_inner, depth + 1)?;
                    }
                    Handle::Leaf(leaf) => {
                        if insert_rec(&mut new_inner, leaf.prefix, depth + 1, leaf.value.clone())
                            .is_some()
                        {
                            duplicates += 1;
                        }
                    }
                    Handle::Fringe(fringe) => {
                        if new_inner.insert_prefix(1, fringe.value.clone()).is_some() {
                            duplicates += 1;
                        }
                    }
                }
                *slot = Handle::Inner(Arc::new(new_inner));
            }
        }
    }
    Ok(duplicates)
}
