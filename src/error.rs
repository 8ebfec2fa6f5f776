//! Cancellation reasons and the query error type.
//!
//! Cancellation is the routine outcome of a query, not an exceptional one:
//! conflicts, dismissed surfaces, and dropped callers all funnel into
//! [`QueryError::Cancelled`], and callers are expected to handle it as part
//! of normal control flow.

use std::error::Error as StdError;
use std::fmt;

// ---------------------------------------------------------------------------
// CancelReason
// ---------------------------------------------------------------------------

/// Why a pending query was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// `cancel()` or `Resolver::cancel_query()` was invoked.
    Explicit,
    /// The query lost the slot to a conflicting query, per the register's
    /// [`ConflictPolicy`](crate::register::ConflictPolicy).
    ConflictLoss,
    /// The presentation surface disappeared without producing an answer.
    PresentationEnded,
    /// The suspended caller's own execution context went away (in Rust terms:
    /// the `begin_query` future was dropped while pending).
    CallerCancelled,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Explicit => "explicitly cancelled",
            Self::ConflictLoss => "lost slot conflict",
            Self::PresentationEnded => "presentation ended",
            Self::CallerCancelled => "caller cancelled",
        };
        f.write_str(text)
    }
}

// ---------------------------------------------------------------------------
// QueryError
// ---------------------------------------------------------------------------

/// Errors surfaced to the suspended caller of
/// [`begin_query`](crate::register::QueryRegister::begin_query).
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The query was cancelled before an answer arrived.
    #[error("query cancelled: {0}")]
    Cancelled(CancelReason),
    /// A caller-supplied error, passed through verbatim from
    /// [`Resolver::fail`](crate::resolver::Resolver::fail). The register does
    /// not interpret it.
    #[error("{0}")]
    Failed(#[from] Box<dyn StdError + Send + Sync>),
}

impl QueryError {
    /// Whether this is a cancellation (of any reason).
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// The cancellation reason, if this is a cancellation.
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        match self {
            Self::Cancelled(reason) => Some(*reason),
            Self::Failed(_) => None,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
