//! Direct-cover tree reconstruction for external consumption
//! (`spec.md` §6 "dump"): turns a [`Trie`] back into a tree of
//! [`DumpNode`]s where each node's children are its immediate,
//! non-transitive subnets, suitable for rendering or, behind the
//! `serde` feature, JSON export.

use crate::afi::Addr;
use crate::prefix::Prefix;
use crate::trie::Trie;

/// One node of a direct-cover tree: a stored prefix and the value-bearing
/// subnets directly underneath it (skipping over any uncovered address
/// space, not just one stride level).
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DumpNode<A: Addr, V> {
    #[cfg_attr(feature = "serde", serde(with = "prefix_display"))]
    pub prefix: Prefix<A>,
    pub value: V,
    pub children: Vec<DumpNode<A, V>>,
}

#[cfg(feature = "serde")]
mod prefix_display {
    use super::*;
    use serde::Serializer;

    pub fn serialize<A: Addr, S: Serializer>(p: &Prefix<A>, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(p)
    }
}

/// Build the direct-cover forest for every prefix stored in `trie`: the
/// roots are the least-specific stored prefixes, and each node's
/// `children` are the most-specific prefixes nested directly under it
/// with nothing stored in between.
pub fn dump_forest<A, V>(trie: &Trie<A, V>) -> Vec<DumpNode<A, V>>
where
    A: Addr + std::ops::BitAnd<Output = A>,
    V: Clone,
{
    let mut entries = trie.all_sorted();
    entries.sort_by(|a, b| a.0.bits().cmp(&b.0.bits()).then(a.0.cmp(&b.0)));

    let mut roots: Vec<DumpNode<A, V>> = Vec::new();
    'entries: for (prefix, value) in entries {
        let node = DumpNode { prefix, value, children: Vec::new() };
        if let Some(path) = find_deepest_covering_path(&roots, prefix) {
            let parent = node_at_path_mut(&mut roots, &path);
            parent.children.push(node);
            continue 'entries;
        }
        roots.push(node);
    }
    roots
}

fn node_at_path_mut<'a, A: Addr, V>(
    nodes: &'a mut [DumpNode<A, V>],
    path: &[usize],
) -> &'a mut DumpNode<A, V> {
    let mut node = &mut nodes[path[0]];
    for &i in &path[1..] {
        node = &mut node.children[i];
    }
    node
}

fn find_deepest_covering_path<A, V>(
    nodes: &[DumpNode<A, V>],
    prefix: Prefix<A>,
) -> Option<Vec<usize>>
where
    A: Addr + std::ops::BitAnd<Output = A>,
{
    for (i, node) in nodes.iter().enumerate() {
        if node.prefix.contains(&prefix) && node.prefix != prefix {
            let mut path = vec![i];
            if let Some(mut deeper) = find_deepest_covering_path(&node.children, prefix) {
                path.append(&mut deeper);
            }
            return Some(path);
        }
    }
    None
}
