//! The single-slot query register.
//!
//! [`QueryRegister`] holds at most one pending query at a time. A caller
//! suspends inside [`begin_query`](QueryRegister::begin_query); presentation
//! code observes the published [`ActiveQuery`] via
//! [`subscribe`](QueryRegister::subscribe), shows a surface for it, and
//! resolves it through the query's [`Resolver`]. Conflicts between a pending
//! query and a new one are settled by the register's fixed [`ConflictPolicy`].
//!
//! Every resolution path is guarded by id matching: a resolution carrying an
//! id that no longer occupies the slot is silently dropped. That single rule
//! is what makes double answers, late dismissals, and superseded-query
//! teardowns race-free.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::{oneshot, watch};
use tracing::{debug, trace};

use crate::error::{CancelReason, QueryError};
use crate::id::{IdSource, QueryId, SequentialIds};
use crate::resolver::{ResolveSlot, Resolver};

// ---------------------------------------------------------------------------
// ConflictPolicy
// ---------------------------------------------------------------------------

/// What happens when a query begins while another is still pending.
///
/// Fixed at register construction; it is a property of the register, not of
/// individual queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// The new query wins: the pending one fails with
    /// [`CancelReason::ConflictLoss`] and the new one takes the slot.
    CancelPrevious,
    /// The pending query wins: the new call fails immediately with
    /// [`CancelReason::ConflictLoss`], without ever suspending.
    CancelNew,
}

// ---------------------------------------------------------------------------
// ActiveQuery
// ---------------------------------------------------------------------------

/// The published view of the pending query.
///
/// This is what subscribers receive while a query occupies the slot: the id
/// observed at display time, the caller-supplied input, and the [`Resolver`]
/// that answers it.
pub struct ActiveQuery<I, R> {
    id: QueryId,
    input: I,
    resolver: Resolver<R>,
}

impl<I, R> ActiveQuery<I, R> {
    /// The id of this query. Adapters must hold on to this for later
    /// [`auto_cancel`](QueryRegister::auto_cancel) calls.
    pub fn id(&self) -> QueryId {
        self.id
    }

    /// The caller-supplied input describing what the query is about.
    pub fn input(&self) -> &I {
        &self.input
    }

    /// The capability that answers or cancels this query.
    pub fn resolver(&self) -> &Resolver<R> {
        &self.resolver
    }
}

impl<I: Clone, R> Clone for ActiveQuery<I, R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            input: self.input.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

impl<I: fmt::Debug, R> fmt::Debug for ActiveQuery<I, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveQuery")
            .field("id", &self.id)
            .field("input", &self.input)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Shared slot state
// ---------------------------------------------------------------------------

/// The sole mutable entity: one pending query's id plus the exclusively-owned
/// resume handle. Consuming the sender is what enforces exactly-once resume.
struct PendingQuery<R> {
    id: QueryId,
    tx: oneshot::Sender<Result<R, QueryError>>,
}

struct Shared<I, R> {
    slot: Mutex<Option<PendingQuery<R>>>,
    updates: watch::Sender<Option<ActiveQuery<I, R>>>,
}

/// Lock the slot, recovering from poisoning. The register must never panic on
/// misuse, and none of its critical sections leave the slot inconsistent.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<I, R> ResolveSlot<R> for Shared<I, R>
where
    I: Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    fn resolve(&self, id: QueryId, outcome: Result<R, QueryError>) -> bool {
        let pending = {
            let mut slot = lock(&self.slot);
            match slot.as_ref() {
                Some(pending) if pending.id == id => slot.take(),
                _ => None,
            }
        };
        let Some(pending) = pending else {
            trace!(query_id = %id, "resolution for stale query id ignored");
            return false;
        };
        if let Err(err) = &outcome {
            debug!(query_id = %id, error = %err, "query resolved with error");
        }
        self.updates.send_replace(None);
        if pending.tx.send(outcome).is_err() {
            // The suspended caller is already gone; its drop guard has raced
            // us past the id check. Nothing left to resume.
            trace!(query_id = %id, "caller vanished before resumption");
        }
        true
    }
}

// ---------------------------------------------------------------------------
// CancelOnDrop
// ---------------------------------------------------------------------------

/// Armed for the whole time a `begin_query` call is suspended. If the caller's
/// future is dropped mid-suspension, this converts the drop into an
/// auto-cancel against the query's own id.
struct CancelOnDrop<R> {
    slot: Weak<dyn ResolveSlot<R>>,
    id: QueryId,
    armed: bool,
}

impl<R> Drop for CancelOnDrop<R> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(slot) = self.slot.upgrade() {
            debug!(query_id = %self.id, "caller dropped while suspended");
            slot.resolve(
                self.id,
                Err(QueryError::Cancelled(CancelReason::CallerCancelled)),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// QueryRegister
// ---------------------------------------------------------------------------

/// A single-slot, cancellable, conflict-resolving suspension register.
///
/// `I` is the input published alongside a query, `R` the value a query
/// resolves to. The register is cheaply cloneable; all clones address the
/// same slot. Interior state is guarded by a mutex held only for short,
/// non-awaiting critical sections — the register is meant to be driven from
/// one logical owner (typically a UI event loop), but accidental cross-task
/// use stays sound.
///
/// # Examples
///
/// ```
/// use queryable::{ConflictPolicy, QueryRegister};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let register = QueryRegister::<String, bool>::new(ConflictPolicy::CancelPrevious);
///
/// // Presentation side: wait for a query, "show UI", answer it.
/// let ui = register.clone();
/// let surface = tokio::spawn(async move {
///     let mut updates = ui.subscribe();
///     loop {
///         let current = updates.borrow_and_update().clone();
///         if let Some(query) = current {
///             assert_eq!(query.input(), "Delete everything?");
///             query.resolver().answer(true);
///             break;
///         }
///         if updates.changed().await.is_err() {
///             break;
///         }
///     }
/// });
///
/// // Caller side: suspend until the surface answers.
/// let confirmed = register
///     .begin_query("Delete everything?".to_owned())
///     .await
///     .unwrap();
/// assert!(confirmed);
/// # surface.await.unwrap();
/// # }
/// ```
pub struct QueryRegister<I, R> {
    shared: Arc<Shared<I, R>>,
    ids: Arc<dyn IdSource>,
    policy: ConflictPolicy,
}

impl<I, R> Clone for QueryRegister<I, R> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            ids: self.ids.clone(),
            policy: self.policy,
        }
    }
}

impl<I, R> fmt::Debug for QueryRegister<I, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryRegister")
            .field("policy", &self.policy)
            .finish()
    }
}

impl<I, R> QueryRegister<I, R>
where
    I: Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    /// Create a register with the given conflict policy and sequential ids.
    pub fn new(policy: ConflictPolicy) -> Self {
        Self::with_ids(policy, SequentialIds::new())
    }

    /// Create a register with a custom [`IdSource`].
    ///
    /// Useful for deterministic tests; see
    /// [`ScriptedIds`](crate::testing::ScriptedIds).
    pub fn with_ids(policy: ConflictPolicy, ids: impl IdSource + 'static) -> Self {
        let (updates, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(None),
                updates,
            }),
            ids: Arc::new(ids),
            policy,
        }
    }

    /// The register's fixed conflict policy.
    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Begin a query: install it in the slot, publish it for presentation
    /// code, and suspend until it is resolved.
    ///
    /// Returns the value supplied via [`Resolver::answer`]. Fails with
    /// [`QueryError::Cancelled`] on any cancellation path (explicit cancel,
    /// conflict loss, surface dismissal, caller drop) and with
    /// [`QueryError::Failed`] when the resolver passes through a custom error.
    ///
    /// Dropping the returned future while it is suspended cancels the query
    /// with [`CancelReason::CallerCancelled`] — that is the Rust shape of
    /// "the caller's execution context was cancelled".
    pub async fn begin_query(&self, input: I) -> Result<R, QueryError> {
        let id = self.ids.next_id();
        let rx = self.install(id, input)?;

        let hook: Weak<dyn ResolveSlot<R>> =
            Arc::downgrade(&(self.shared.clone() as Arc<dyn ResolveSlot<R>>));
        let mut guard = CancelOnDrop {
            slot: hook,
            id,
            armed: true,
        };
        let outcome = rx.await;
        guard.armed = false;

        match outcome {
            Ok(result) => result,
            // The sender vanished without resolving: the register itself was
            // torn down while we were suspended.
            Err(_) => Err(QueryError::Cancelled(CancelReason::Explicit)),
        }
    }

    /// Resolve the pending query if `id` still matches it.
    ///
    /// Resumes the suspended caller exactly once, clears the slot, and
    /// publishes the cleared state. A stale id is silently ignored — this is
    /// the guard that keeps double answers and late resolutions from
    /// touching a newer query. Returns whether the id matched.
    pub fn resolve(&self, id: QueryId, outcome: Result<R, QueryError>) -> bool {
        ResolveSlot::resolve(&*self.shared, id, outcome)
    }

    /// Cancel the pending query, if any.
    ///
    /// Equivalent to resolving the current id with
    /// [`CancelReason::Explicit`]; a no-op when the slot is empty.
    pub fn cancel(&self) {
        let current = lock(&self.shared.slot).as_ref().map(|pending| pending.id);
        if let Some(id) = current {
            self.resolve(id, Err(QueryError::Cancelled(CancelReason::Explicit)));
        }
    }

    /// Cancel the query with `id` on behalf of an external collaborator.
    ///
    /// Called by presentation adapters when their surface disappears without
    /// an answer (`reason` = [`CancelReason::PresentationEnded`]). The id
    /// must be the one observed at display time: if the query has since been
    /// superseded, the call no-ops instead of cancelling its replacement.
    /// Returns whether the id matched.
    pub fn auto_cancel(&self, id: QueryId, reason: CancelReason) -> bool {
        self.resolve(id, Err(QueryError::Cancelled(reason)))
    }

    /// Whether a query currently occupies the slot. Pure observation.
    pub fn is_querying(&self) -> bool {
        lock(&self.shared.slot).is_some()
    }

    /// Subscribe to slot changes.
    ///
    /// The channel holds `Some(ActiveQuery)` while a query is pending and
    /// `None` otherwise. When [`ConflictPolicy::CancelPrevious`] supersedes a
    /// pending query, subscribers observe the handoff as a single transition
    /// to the new query.
    pub fn subscribe(&self) -> watch::Receiver<Option<ActiveQuery<I, R>>> {
        self.shared.updates.subscribe()
    }

    /// Install a fresh query in the slot, settling any conflict first.
    fn install(
        &self,
        id: QueryId,
        input: I,
    ) -> Result<oneshot::Receiver<Result<R, QueryError>>, QueryError> {
        let (tx, rx) = oneshot::channel();
        let evicted = {
            let mut slot = lock(&self.shared.slot);
            if let Some(prev) = slot.as_ref() {
                match self.policy {
                    ConflictPolicy::CancelNew => {
                        debug!(pending = %prev.id, rejected = %id, "conflict: keeping pending query");
                        return Err(QueryError::Cancelled(CancelReason::ConflictLoss));
                    }
                    ConflictPolicy::CancelPrevious => {
                        debug!(superseded = %prev.id, installed = %id, "conflict: superseding pending query");
                    }
                }
            }
            slot.replace(PendingQuery { id, tx })
        };
        if let Some(prev) = evicted {
            let _ = prev
                .tx
                .send(Err(QueryError::Cancelled(CancelReason::ConflictLoss)));
        }

        let hook: Weak<dyn ResolveSlot<R>> =
            Arc::downgrade(&(self.shared.clone() as Arc<dyn ResolveSlot<R>>));
        let resolver = Resolver { slot: hook, id };
        self.shared.updates.send_replace(Some(ActiveQuery {
            id,
            input,
            resolver,
        }));
        Ok(rx)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio_test::{assert_pending, assert_ready, task};

    fn register(policy: ConflictPolicy) -> QueryRegister<(), bool> {
        QueryRegister::new(policy)
    }

    /// The currently published query, cloned out of the watch channel.
    fn current<I: Clone + Send + Sync + 'static, R: Send + 'static>(
        register: &QueryRegister<I, R>,
    ) -> Option<ActiveQuery<I, R>> {
        register.subscribe().borrow().clone()
    }

    // ── begin / answer ───────────────────────────────────────────────

    #[test]
    fn begin_suspends_until_answered() {
        let register = register(ConflictPolicy::CancelNew);
        let mut call = task::spawn(register.begin_query(()));

        assert_pending!(call.poll());
        assert!(register.is_querying());

        let active = current(&register).expect("query should be published");
        active.resolver().answer(true);

        assert!(call.is_woken());
        let result = assert_ready!(call.poll());
        assert!(result.unwrap());
        assert!(!register.is_querying());
    }

    #[test]
    fn answer_returns_exactly_the_answered_value() {
        let register = QueryRegister::<bool, bool>::new(ConflictPolicy::CancelNew);
        for input in [true, false] {
            let mut call = task::spawn(register.begin_query(input));
            assert_pending!(call.poll());

            // Answer with the negation of the published input.
            let active = current(&register).unwrap();
            active.resolver().answer(!active.input());

            assert_eq!(assert_ready!(call.poll()).unwrap(), !input);
        }
    }

    #[test]
    fn resolver_fail_passes_custom_error_through() {
        let register = register(ConflictPolicy::CancelNew);
        let mut call = task::spawn(register.begin_query(()));
        assert_pending!(call.poll());

        current(&register).unwrap().resolver().fail("backend on fire");

        let err = assert_ready!(call.poll()).unwrap_err();
        match err {
            QueryError::Failed(inner) => assert_eq!(inner.to_string(), "backend on fire"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn answer_opt_none_cancels_the_caller() {
        let register = register(ConflictPolicy::CancelNew);
        let mut call = task::spawn(register.begin_query(()));
        assert_pending!(call.poll());

        current(&register).unwrap().resolver().answer_opt(None);

        let err = assert_ready!(call.poll()).unwrap_err();
        assert_eq!(err.cancel_reason(), Some(CancelReason::Explicit));
    }

    // ── publish discipline ───────────────────────────────────────────

    #[test]
    fn publishes_on_install_and_clear() {
        let register = register(ConflictPolicy::CancelNew);
        let mut updates = register.subscribe();
        assert!(updates.borrow_and_update().is_none());

        let mut call = task::spawn(register.begin_query(()));
        assert_pending!(call.poll());

        assert!(updates.has_changed().unwrap());
        let published = updates.borrow_and_update().clone();
        let active = published.expect("install should publish the query");

        active.resolver().answer(false);
        assert!(updates.has_changed().unwrap());
        assert!(updates.borrow_and_update().is_none());

        let _ = assert_ready!(call.poll());
    }

    // ── double answer ────────────────────────────────────────────────

    #[test]
    fn second_answer_is_a_noop() {
        let register = register(ConflictPolicy::CancelNew);
        let mut call = task::spawn(register.begin_query(()));
        assert_pending!(call.poll());

        let resolver = current(&register).unwrap().resolver().clone();
        resolver.answer(true);
        assert_eq!(assert_ready!(call.poll()).unwrap(), true);

        // Late duplicate answers must not panic and must not resume anyone.
        resolver.answer(false);
        resolver.fail("way too late");
        assert!(!register.is_querying());

        // ... and must not corrupt a subsequently started query.
        let mut next = task::spawn(register.begin_query(()));
        assert_pending!(next.poll());
        resolver.answer(false);
        resolver.cancel_query();
        assert_pending!(next.poll());
        assert!(register.is_querying());

        current(&register).unwrap().resolver().answer(true);
        assert_eq!(assert_ready!(next.poll()).unwrap(), true);
    }

    // ── conflict policies ────────────────────────────────────────────

    #[test]
    fn cancel_new_rejects_second_query_immediately() {
        let register = register(ConflictPolicy::CancelNew);
        let mut a = task::spawn(register.begin_query(()));
        assert_pending!(a.poll());

        // B fails on its very first poll — it never suspends.
        let mut b = task::spawn(register.begin_query(()));
        let err = assert_ready!(b.poll()).unwrap_err();
        assert_eq!(err.cancel_reason(), Some(CancelReason::ConflictLoss));

        // A is untouched and resolves normally.
        assert_pending!(a.poll());
        current(&register).unwrap().resolver().answer(true);
        assert_eq!(assert_ready!(a.poll()).unwrap(), true);
    }

    #[test]
    fn cancel_previous_supersedes_pending_query() {
        let register = register(ConflictPolicy::CancelPrevious);
        let mut a = task::spawn(register.begin_query(()));
        assert_pending!(a.poll());

        let mut b = task::spawn(register.begin_query(()));
        assert_pending!(b.poll());

        // A lost the conflict.
        assert!(a.is_woken());
        let err = assert_ready!(a.poll()).unwrap_err();
        assert_eq!(err.cancel_reason(), Some(CancelReason::ConflictLoss));

        // B owns the slot and resolves normally.
        assert!(register.is_querying());
        current(&register).unwrap().resolver().answer(true);
        assert_eq!(assert_ready!(b.poll()).unwrap(), true);
    }

    // ── caller-side cancellation ─────────────────────────────────────

    #[test]
    fn dropping_the_suspended_call_cancels_the_query() {
        let register = register(ConflictPolicy::CancelNew);
        let mut call = task::spawn(register.begin_query(()));
        assert_pending!(call.poll());
        assert!(register.is_querying());

        drop(call);

        assert!(!register.is_querying());
        assert!(current(&register).is_none());
    }

    #[test]
    fn dropping_an_unpolled_call_installs_nothing() {
        let register = register(ConflictPolicy::CancelNew);
        let call = task::spawn(register.begin_query(()));
        // Never polled: the query was never installed, so nothing to undo.
        drop(call);
        assert!(!register.is_querying());
    }

    #[test]
    fn dropping_a_resolved_call_does_not_cancel_the_next_query() {
        let register = register(ConflictPolicy::CancelNew);
        let mut a = task::spawn(register.begin_query(()));
        assert_pending!(a.poll());

        current(&register).unwrap().resolver().answer(true);
        // A is resolved but never polled again; drop it with the value
        // still buffered. Its guard must no-op against the next query.
        drop(a);

        let mut b = task::spawn(register.begin_query(()));
        assert_pending!(b.poll());
        assert!(register.is_querying());
    }

    // ── auto_cancel ──────────────────────────────────────────────────

    #[test]
    fn auto_cancel_resolves_with_the_given_reason() {
        let register = register(ConflictPolicy::CancelNew);
        let mut call = task::spawn(register.begin_query(()));
        assert_pending!(call.poll());

        let id = current(&register).unwrap().id();
        assert!(register.auto_cancel(id, CancelReason::PresentationEnded));

        let err = assert_ready!(call.poll()).unwrap_err();
        assert_eq!(err.cancel_reason(), Some(CancelReason::PresentationEnded));
    }

    #[test]
    fn stale_auto_cancel_leaves_newer_query_pending() {
        let register = register(ConflictPolicy::CancelPrevious);
        let mut a = task::spawn(register.begin_query(()));
        assert_pending!(a.poll());
        let a_id = current(&register).unwrap().id();

        // B supersedes A.
        let mut b = task::spawn(register.begin_query(()));
        assert_pending!(b.poll());
        let _ = assert_ready!(a.poll());

        // A delayed teardown from A's surface arrives late.
        assert!(!register.auto_cancel(a_id, CancelReason::PresentationEnded));

        // B is unaffected.
        assert_pending!(b.poll());
        assert!(register.is_querying());
        current(&register).unwrap().resolver().answer(true);
        assert_eq!(assert_ready!(b.poll()).unwrap(), true);
    }

    // ── cancel ───────────────────────────────────────────────────────

    #[test]
    fn cancel_fails_the_pending_query() {
        let register = register(ConflictPolicy::CancelNew);
        let mut call = task::spawn(register.begin_query(()));
        assert_pending!(call.poll());

        register.cancel();

        let err = assert_ready!(call.poll()).unwrap_err();
        assert!(err.is_cancelled());
        assert!(!register.is_querying());
    }

    #[test]
    fn cancel_on_idle_register_is_a_noop() {
        let register = register(ConflictPolicy::CancelNew);
        register.cancel();
        assert!(!register.is_querying());
    }

    // ── resolve ──────────────────────────────────────────────────────

    #[test]
    fn resolve_with_stale_id_returns_false() {
        let register = register(ConflictPolicy::CancelNew);
        assert!(!register.resolve(QueryId::from_raw(999), Ok(true)));
    }

    // ── construction ─────────────────────────────────────────────────

    #[test]
    fn policy_accessor() {
        assert_eq!(
            register(ConflictPolicy::CancelNew).policy(),
            ConflictPolicy::CancelNew
        );
        assert_eq!(
            register(ConflictPolicy::CancelPrevious).policy(),
            ConflictPolicy::CancelPrevious
        );
    }

    #[test]
    fn clones_share_the_slot() {
        let register = register(ConflictPolicy::CancelNew);
        let clone = register.clone();

        let mut call = task::spawn(register.begin_query(()));
        assert_pending!(call.poll());

        assert!(clone.is_querying());
        current(&clone).unwrap().resolver().answer(true);
        assert_eq!(assert_ready!(call.poll()).unwrap(), true);
    }

    #[test]
    fn independent_registers_do_not_conflict() {
        let a = register(ConflictPolicy::CancelNew);
        let b = register(ConflictPolicy::CancelNew);

        let mut call_a = task::spawn(a.begin_query(()));
        assert_pending!(call_a.poll());

        // A pending query on `a` is no conflict for `b`.
        let mut call_b = task::spawn(b.begin_query(()));
        assert_pending!(call_b.poll());

        assert!(a.is_querying());
        assert!(b.is_querying());
    }

    #[test]
    fn debug_shows_policy() {
        let register = register(ConflictPolicy::CancelPrevious);
        let dbg = format!("{register:?}");
        assert!(dbg.contains("QueryRegister"));
        assert!(dbg.contains("CancelPrevious"));
    }
}
