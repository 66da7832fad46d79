//! Error types. Mirrors the teacher crate's split between ordinary,
//! recoverable prefix-store errors and genuinely fatal conditions: see
//! `rotonda-store`'s `PrefixStoreError`/`FatalError` pair.
//!
//! Most of this crate's operations can't fail at all (an out-of-range
//! prefix length is simply rejected by [`crate::Prefix::new`] returning
//! `None`, per `spec.md` §7's "invalid input is a no-op" contract), so
//! this type only covers the handful of conditions a caller genuinely
//! needs to branch on.

use std::fmt;

/// A recoverable error surfaced by a table operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableError {
    /// A prefix or address from one family was used against a table
    /// view scoped to the other family.
    FamilyMismatch,
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::FamilyMismatch => {
                write!(f, "address family mismatch between query and table view")
            }
        }
    }
}

impl std::error::Error for TableError {}

/// An internal trie invariant didn't hold: a compaction step found an
/// occupancy that didn't match either stored array, or a child slot
/// tagged as one variant turned out to hold another. Mirrors the
/// teacher's `FatalError` — a condition that, should it ever actually
/// occur, means the tree is corrupt and the process should not keep
/// trusting it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TrieError;

impl fmt::Display for TrieError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "trie invariant violated: the table must be considered corrupted"
        )
    }
}

impl std::error::Error for TrieError {}

pub type TrieResult<T> = Result<T, TrieError>;
