//! The public, dual-family routing table: the facade that owns one
//! [`Trie`] per address family and dispatches on the family of whatever
//! [`inetnum::addr::Prefix`] or [`IpAddr`] a caller hands in
//! (`spec.md` §6).

use std::net::IpAddr;

use log::trace;

use crate::dump::{self, DumpNode};
use crate::error::TableError;
use crate::prefix::{self, Prefix};
use crate::trie::Trie;

/// An IPv4-and-IPv6 routing table backed by two independent
/// [`Trie`]s, one per family. Every method that isn't already
/// family-qualified (`_v4`/`_v6`) dispatches on the family of its
/// argument.
pub struct Table<V> {
    v4: Trie<u32, V>,
    v6: Trie<u128, V>,
}

impl<V> Default for Table<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Table<V> {
    pub fn new() -> Self {
        Table { v4: Trie::new(), v6: Trie::new() }
    }

    pub fn size(&self) -> usize {
        self.v4.len() + self.v6.len()
    }

    pub fn size4(&self) -> usize {
        self.v4.len()
    }

    pub fn size6(&self) -> usize {
        self.v6.len()
    }
}

impl<V: Clone> Table<V> {
    pub fn insert(&mut self, prefix: inetnum::addr::Prefix, value: V) -> Result<Option<V>, TableError> {
        trace!("insert {prefix}");
        match prefix.addr() {
            IpAddr::V4(_) => {
                let p: Prefix<u32> = prefix::from_inetnum(prefix).ok_or(TableError::FamilyMismatch)?;
                Ok(self.v4.insert(p, value))
            }
            IpAddr::V6(_) => {
                let p: Prefix<u128> = prefix::from_inetnum(prefix).ok_or(TableError::FamilyMismatch)?;
                Ok(self.v6.insert(p, value))
            }
        }
    }

    pub fn insert_persist(&self, prefix: inetnum::addr::Prefix, value: V) -> Result<Self, TableError> {
        let mut next = self.clone();
        next.insert(prefix, value)?;
        Ok(next)
    }

    pub fn delete(&mut self, prefix: inetnum::addr::Prefix) -> Result<(Option<V>, bool), TableError> {
        trace!("delete {prefix}");
        match prefix.addr() {
            IpAddr::V4(_) => {
                let p: Prefix<u32> = prefix::from_inetnum(prefix).ok_or(TableError::FamilyMismatch)?;
                Ok(self.v4.delete(p))
            }
            IpAddr::V6(_) => {
                let p: Prefix<u128> = prefix::from_inetnum(prefix).ok_or(TableError::FamilyMismatch)?;
                Ok(self.v6.delete(p))
            }
        }
    }

    pub fn delete_persist(
        &self,
        prefix: inetnum::addr::Prefix,
    ) -> Result<(Self, Option<V>, bool), TableError> {
        let mut next = self.clone();
        let (old, existed) = next.delete(prefix)?;
        Ok((next, old, existed))
    }

    pub fn get(&self, prefix: inetnum::addr::Prefix) -> Option<V> {
        match prefix.addr() {
            IpAddr::V4(_) => prefix::from_inetnum(prefix).and_then(|p: Prefix<u32>| self.v4.get(p)),
            IpAddr::V6(_) => prefix::from_inetnum(prefix).and_then(|p: Prefix<u128>| self.v6.get(p)),
        }
    }

    pub fn exists(&self, prefix: inetnum::addr::Prefix) -> bool {
        self.get(prefix).is_some()
    }

    /// Longest-prefix match by address.
    pub fn lookup(&self, addr: IpAddr) -> Option<V> {
        match addr {
            IpAddr::V4(v4) => self.v4.lookup(u32::from(v4)),
            IpAddr::V6(v6) => self.v6.lookup(u128::from(v6)),
        }
    }

    pub fn contains(&self, addr: IpAddr) -> bool {
        match addr {
            IpAddr::V4(v4) => self.v4.contains(u32::from(v4)),
            IpAddr::V6(v6) => self.v6.contains(u128::from(v6)),
        }
    }

    /// Longest stored prefix matching `prefix` (LPM against prefixes).
    pub fn lookup_prefix(&self, prefix: inetnum::addr::Prefix) -> Option<V> {
        self.lookup_prefix_lpm(prefix).map(|(_, v)| v)
    }

    pub fn lookup_prefix_lpm(
        &self,
        prefix: inetnum::addr::Prefix,
    ) -> Option<(inetnum::addr::Prefix, V)> {
        match prefix.addr() {
            IpAddr::V4(_) => {
                let p: Prefix<u32> = prefix::from_inetnum(prefix)?;
                self.v4.lookup_prefix_lpm(p).map(|(p, v)| (p.into(), v))
            }
            IpAddr::V6(_) => {
                let p: Prefix<u128> = prefix::from_inetnum(prefix)?;
                self.v6.lookup_prefix_lpm(p).map(|(p, v)| (p.into(), v))
            }
        }
    }

    pub fn overlaps_prefix(&self, query: inetnum::addr::Prefix) -> bool {
        match query.addr() {
            IpAddr::V4(_) => prefix::from_inetnum(query)
                .map(|p: Prefix<u32>| self.v4.overlaps_prefix(p))
                .unwrap_or(false),
            IpAddr::V6(_) => prefix::from_inetnum(query)
                .map(|p: Prefix<u128>| self.v6.overlaps_prefix(p))
                .unwrap_or(false),
        }
    }

    /// Whether `self` and `other` share any overlapping prefix, in
    /// either family.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.overlaps4(other) || self.overlaps6(other)
    }

    pub fn overlaps4(&self, other: &Self) -> bool {
        self.v4.overlaps(&other.v4)
    }

    pub fn overlaps6(&self, other: &Self) -> bool {
        self.v6.overlaps(&other.v6)
    }

    pub fn subnets(&self, query: inetnum::addr::Prefix) -> Vec<(inetnum::addr::Prefix, V)> {
        match query.addr() {
            IpAddr::V4(_) => prefix::from_inetnum(query)
                .map(|p: Prefix<u32>| self.v4.subnets(p).into_iter().map(|(p, v)| (p.into(), v)).collect())
                .unwrap_or_default(),
            IpAddr::V6(_) => prefix::from_inetnum(query)
                .map(|p: Prefix<u128>| self.v6.subnets(p).into_iter().map(|(p, v)| (p.into(), v)).collect())
                .unwrap_or_default(),
        }
    }

    pub fn subnets_sorted(&self, query: inetnum::addr::Prefix) -> Vec<(inetnum::addr::Prefix, V)> {
        let mut out = self.subnets(query);
        out.sort_by(|a, b| (a.0.addr(), a.0.len()).cmp(&(b.0.addr(), b.0.len())));
        out
    }

    pub fn supernets(&self, query: inetnum::addr::Prefix) -> Vec<(inetnum::addr::Prefix, V)> {
        match query.addr() {
            IpAddr::V4(_) => prefix::from_inetnum(query)
                .map(|p: Prefix<u32>| self.v4.supernets(p).into_iter().map(|(p, v)| (p.into(), v)).collect())
                .unwrap_or_default(),
            IpAddr::V6(_) => prefix::from_inetnum(query)
                .map(|p: Prefix<u128>| self.v6.supernets(p).into_iter().map(|(p, v)| (p.into(), v)).collect())
                .unwrap_or_default(),
        }
    }

    pub fn supernets_sorted(&self, query: inetnum::addr::Prefix) -> Vec<(inetnum::addr::Prefix, V)> {
        let mut out = self.supernets(query);
        out.sort_by(|a, b| (a.0.addr(), a.0.len()).cmp(&(b.0.addr(), b.0.len())));
        out
    }

    pub fn all4(&self) -> Vec<(inetnum::addr::Prefix, V)> {
        self.v4.all().into_iter().map(|(p, v)| (p.into(), v)).collect()
    }

    pub fn all6(&self) -> Vec<(inetnum::addr::Prefix, V)> {
        self.v6.all().into_iter().map(|(p, v)| (p.into(), v)).collect()
    }

    pub fn all(&self) -> Vec<(inetnum::addr::Prefix, V)> {
        let mut out = self.all4();
        out.extend(self.all6());
        out
    }

    pub fn all4_sorted(&self) -> Vec<(inetnum::addr::Prefix, V)> {
        self.v4.all_sorted().into_iter().map(|(p, v)| (p.into(), v)).collect()
    }

    pub fn all6_sorted(&self) -> Vec<(inetnum::addr::Prefix, V)> {
        self.v6.all_sorted().into_iter().map(|(p, v)| (p.into(), v)).collect()
    }

    /// Direct-cover tree of every stored IPv4 prefix (`spec.md` §6).
    pub fn dump_list4(&self) -> Vec<DumpNode<u32, V>> {
        dump::dump_forest(&self.v4)
    }

    /// Direct-cover tree of every stored IPv6 prefix (`spec.md` §6).
    pub fn dump_list6(&self) -> Vec<DumpNode<u128, V>> {
        dump::dump_forest(&self.v6)
    }

    pub fn union(&mut self, other: &Self) {
        trace!("union: {} + {} prefixes", self.size(), other.size());
        self.v4.union(&other.v4);
        self.v6.union(&other.v6);
    }

    pub fn union_persist(&self, other: &Self) -> Self {
        let mut next = self.clone();
        next.union(other);
        next
    }

    /// A deep, independent snapshot, cheap at the root of each family
    /// trie (`spec.md` §4.10).
    pub fn clone(&self) -> Self {
        Table { v4: self.v4.clone(), v6: self.v6.clone() }
    }
}

impl<V: Clone + PartialEq> Table<V> {
    pub fn equal(&self, other: &Self) -> bool {
        self.v4.equal(&other.v4) && self.v6.equal(&other.v6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    fn pfx(s: &str) -> inetnum::addr::Prefix {
        inetnum::addr::Prefix::from_str(s).unwrap()
    }

    #[test]
    fn family_dispatch_insert_and_lookup() {
        let mut t: Table<u32> = Table::new();
        t.insert(pfx("10.0.0.0/8"), 1).unwrap();
        t.insert(pfx("2001:db8::/32"), 2).unwrap();
        assert_eq!(t.size(), 2);
        assert_eq!(t.size4(), 1);
        assert_eq!(t.size6(), 1);

        assert_eq!(t.lookup(IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3))), Some(1));
        assert_eq!(t.lookup(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))), None);
    }

    #[test]
    fn union_and_equal() {
        let mut a: Table<u8> = Table::new();
        a.insert(pfx("10.0.0.0/8"), 1).unwrap();
        let mut b: Table<u8> = Table::new();
        b.insert(pfx("192.168.0.0/16"), 2).unwrap();

        let merged = a.union_persist(&b);
        assert_eq!(merged.size(), 2);
        assert!(!a.equal(&merged));

        a.union(&b);
        assert!(a.equal(&merged));
    }
}
