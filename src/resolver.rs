//! Resolver: the capability handed to presentation code.
//!
//! A [`Resolver`] can answer, fail, or cancel exactly one query — the one it
//! was minted for. Every operation is a no-op once that query has been
//! resolved or superseded, which is what makes UI dismissal races safe: a
//! late second answer is silently dropped rather than corrupting whatever
//! query occupies the slot now.

use std::fmt;
use std::sync::Weak;

use crate::error::{CancelReason, QueryError};
use crate::id::QueryId;

// ---------------------------------------------------------------------------
// ResolveSlot
// ---------------------------------------------------------------------------

/// Internal hook back into the register's slot.
///
/// Object-safe so a [`Resolver`] does not have to carry the register's input
/// type parameter. Implemented by the register's shared state.
pub(crate) trait ResolveSlot<R>: Send + Sync {
    /// Resolve the pending query if `id` still matches it.
    ///
    /// Returns whether the id matched; a stale id leaves the slot untouched.
    fn resolve(&self, id: QueryId, outcome: Result<R, QueryError>) -> bool;
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Capability object for answering or cancelling one specific pending query.
///
/// Handed to the presentation layer inside an
/// [`ActiveQuery`](crate::register::ActiveQuery). Cloneable so it can be
/// shared between, say, a confirm button and a dismiss handler. Holds only a
/// weak reference back to the register: it cannot keep a dropped register
/// alive, and it goes inert when the register goes away.
pub struct Resolver<R> {
    pub(crate) slot: Weak<dyn ResolveSlot<R>>,
    pub(crate) id: QueryId,
}

impl<R> Clone for Resolver<R> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
            id: self.id,
        }
    }
}

impl<R> fmt::Debug for Resolver<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver").field("id", &self.id).finish()
    }
}

impl<R> Resolver<R> {
    /// The id of the query this resolver is bound to.
    ///
    /// Presentation adapters must capture this at display time and use it for
    /// later [`auto_cancel`](crate::register::QueryRegister::auto_cancel)
    /// calls, so that a dismissal racing a superseding query no-ops.
    pub fn query_id(&self) -> QueryId {
        self.id
    }

    /// Resume the suspended caller with `value`.
    ///
    /// No-op if the query has already been resolved or superseded.
    pub fn answer(&self, value: R) {
        self.deliver(Ok(value));
    }

    /// Answer with `Some(value)`, or cancel the query on `None`.
    pub fn answer_opt(&self, value: Option<R>) {
        match value {
            Some(value) => self.answer(value),
            None => self.cancel_query(),
        }
    }

    /// Fail the suspended caller with a custom error, passed through verbatim.
    pub fn fail(&self, error: impl Into<Box<dyn std::error::Error + Send + Sync>>) {
        self.deliver(Err(QueryError::Failed(error.into())));
    }

    /// Cancel the query, failing the suspended caller with
    /// [`QueryError::Cancelled`].
    pub fn cancel_query(&self) {
        self.deliver(Err(QueryError::Cancelled(CancelReason::Explicit)));
    }

    fn deliver(&self, outcome: Result<R, QueryError>) {
        if let Some(slot) = self.slot.upgrade() {
            slot.resolve(self.id, outcome);
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records every delivered outcome instead of resuming anyone.
    struct RecordingSlot {
        id: QueryId,
        outcomes: Mutex<Vec<Result<u32, QueryError>>>,
    }

    impl ResolveSlot<u32> for RecordingSlot {
        fn resolve(&self, id: QueryId, outcome: Result<u32, QueryError>) -> bool {
            if id != self.id {
                return false;
            }
            self.outcomes
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(outcome);
            true
        }
    }

    fn recording(id: u64) -> (Arc<RecordingSlot>, Resolver<u32>) {
        let slot = Arc::new(RecordingSlot {
            id: QueryId::from_raw(id),
            outcomes: Mutex::new(Vec::new()),
        });
        let weak: Weak<dyn ResolveSlot<u32>> =
            Arc::downgrade(&(slot.clone() as Arc<dyn ResolveSlot<u32>>));
        let resolver = Resolver {
            slot: weak,
            id: QueryId::from_raw(id),
        };
        (slot, resolver)
    }

    #[test]
    fn query_id_is_bound_id() {
        let (_slot, resolver) = recording(5);
        assert_eq!(resolver.query_id(), QueryId::from_raw(5));
    }

    #[test]
    fn answer_delivers_ok() {
        let (slot, resolver) = recording(1);
        resolver.answer(99);
        let outcomes = slot.outcomes.lock().unwrap();
        assert!(matches!(outcomes.as_slice(), [Ok(99)]));
    }

    #[test]
    fn answer_opt_some_answers() {
        let (slot, resolver) = recording(1);
        resolver.answer_opt(Some(7));
        let outcomes = slot.outcomes.lock().unwrap();
        assert!(matches!(outcomes.as_slice(), [Ok(7)]));
    }

    #[test]
    fn answer_opt_none_cancels() {
        let (slot, resolver) = recording(1);
        resolver.answer_opt(None);
        let outcomes = slot.outcomes.lock().unwrap();
        assert!(matches!(
            outcomes.as_slice(),
            [Err(QueryError::Cancelled(CancelReason::Explicit))]
        ));
    }

    #[test]
    fn fail_wraps_custom_error() {
        let (slot, resolver) = recording(1);
        resolver.fail("custom failure");
        let outcomes = slot.outcomes.lock().unwrap();
        assert!(matches!(outcomes.as_slice(), [Err(QueryError::Failed(_))]));
    }

    #[test]
    fn clone_binds_same_id() {
        let (slot, resolver) = recording(3);
        let clone = resolver.clone();
        assert_eq!(clone.query_id(), resolver.query_id());
        clone.answer(1);
        resolver.answer(2);
        let outcomes = slot.outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 2);
    }

    #[test]
    fn inert_after_slot_dropped() {
        let resolver = {
            let (slot, resolver) = recording(1);
            drop(slot);
            resolver
        };
        // Nothing to assert beyond "did not panic and did not deliver".
        resolver.answer(1);
        resolver.cancel_query();
        resolver.fail("too late");
    }

    #[test]
    fn debug_shows_id() {
        let (_slot, resolver) = recording(8);
        let dbg = format!("{resolver:?}");
        assert!(dbg.contains("Resolver"));
        assert!(dbg.contains("8"));
    }
}
