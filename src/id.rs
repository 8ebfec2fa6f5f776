//! Query ids and pluggable id generation.
//!
//! Every call to [`begin_query`](crate::register::QueryRegister::begin_query)
//! mints a fresh [`QueryId`] from the register's [`IdSource`]. Ids are compared
//! only for equality — they exist to match a later resolution back to the
//! suspended call it belongs to, nothing more.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ---------------------------------------------------------------------------
// QueryId
// ---------------------------------------------------------------------------

/// Identifies one suspend-until-answered query cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryId(u64);

impl QueryId {
    /// Build an id from a raw value. Mainly useful for scripted id sources.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw value backing this id.
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "query#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// IdSource
// ---------------------------------------------------------------------------

/// Mints a fresh id per [`begin_query`](crate::register::QueryRegister::begin_query) call.
///
/// Registers take an id source at construction so that tests can substitute a
/// deterministic one (see [`ScriptedIds`](crate::testing::ScriptedIds)).
pub trait IdSource: Send + Sync {
    /// Produce the next id. Must never repeat an id that may still be pending.
    fn next_id(&self) -> QueryId;
}

/// Default id source: a per-register counter starting at 1.
#[derive(Debug)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    /// Create a counter-backed source. The first id handed out is 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdSource for SequentialIds {
    fn next_id(&self) -> QueryId {
        QueryId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

// ===========================================================================
// Tests
// ===========================================================================
