//! An in-memory, popcount-compressed multi-bit trie for IPv4 and IPv6
//! prefixes, with ART-style longest-prefix-match and a copy-on-write
//! persistence story built on `Arc::make_mut` rather than hand-rolled
//! epoch reclamation.
//!
//! The crate root mirrors the teacher crate's `lib.rs`/`prelude`
//! split: the low-level, per-family [`Trie`] is exported for callers
//! that only need one address family, and [`Table`] is the ordinary
//! entry point for the common dual-family case.

mod afi;
mod art;
mod bitset;
mod dump;
mod error;
mod iter;
mod node;
mod persistent;
mod prefix;
mod table;
mod trie;

pub use afi::Addr;
pub use dump::{dump_forest, DumpNode};
pub use error::{TableError, TrieError};
pub use persistent::PersistentTable;
pub use prefix::Prefix;
pub use table::Table;
pub use trie::Trie;

pub mod prelude {
    pub use crate::{Addr, DumpNode, PersistentTable, Prefix, Table, TableError, Trie, TrieError};
    pub use inetnum::addr::Prefix as IpPrefix;
}
