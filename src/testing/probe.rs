//! Probe: synchronous inspection and resolution of a register under test.

use tokio::sync::watch;

use crate::error::{CancelReason, QueryError};
use crate::id::QueryId;
use crate::register::{ActiveQuery, ConflictPolicy, QueryRegister};

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

/// A test-side stand-in for a presentation adapter.
///
/// Where an [`Adapter`](crate::adapter::Adapter) drives a real surface, the
/// probe just exposes the pending query for inspection and offers one-line
/// resolution helpers. All helpers resolve against the id that is current at
/// call time.
///
/// # Examples
///
/// ```
/// use queryable::testing::Probe;
/// use queryable::ConflictPolicy;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let probe = Probe::<(), u32>::new(ConflictPolicy::CancelNew);
/// let register = probe.register().clone();
///
/// let call = tokio::spawn(async move { register.begin_query(()).await });
/// while !probe.register().is_querying() {
///     tokio::task::yield_now().await;
/// }
/// assert!(probe.answer(42));
/// assert_eq!(call.await.unwrap().unwrap(), 42);
/// # }
/// ```
pub struct Probe<I, R> {
    register: QueryRegister<I, R>,
    updates: watch::Receiver<Option<ActiveQuery<I, R>>>,
}

impl<I, R> Probe<I, R>
where
    I: Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    /// Create a probe around a fresh register with the given policy.
    pub fn new(policy: ConflictPolicy) -> Self {
        Self::around(QueryRegister::new(policy))
    }

    /// Create a probe around an existing register.
    pub fn around(register: QueryRegister<I, R>) -> Self {
        let updates = register.subscribe();
        Self { register, updates }
    }

    /// The register under test.
    pub fn register(&self) -> &QueryRegister<I, R> {
        &self.register
    }

    /// The currently published query, if any.
    pub fn current(&self) -> Option<ActiveQuery<I, R>> {
        self.updates.borrow().clone()
    }

    /// The id of the currently published query, if any.
    pub fn current_id(&self) -> Option<QueryId> {
        self.updates.borrow().as_ref().map(ActiveQuery::id)
    }

    /// The input of the currently published query, if any.
    pub fn current_input(&self) -> Option<I> {
        self.updates.borrow().as_ref().map(|q| q.input().clone())
    }

    /// Answer the pending query. Returns whether one was pending.
    pub fn answer(&self, value: R) -> bool {
        match self.current_id() {
            Some(id) => self.register.resolve(id, Ok(value)),
            None => false,
        }
    }

    /// Fail the pending query with a custom error. Returns whether one was
    /// pending.
    pub fn fail(&self, error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> bool {
        match self.current_id() {
            Some(id) => self
                .register
                .resolve(id, Err(QueryError::Failed(error.into()))),
            None => false,
        }
    }

    /// Cancel the pending query, as `cancel()` would.
    pub fn cancel(&self) {
        self.register.cancel();
    }

    /// Report the pending query's surface as dismissed without an answer.
    /// Returns whether one was pending.
    pub fn dismiss(&self) -> bool {
        match self.current_id() {
            Some(id) => self
                .register
                .auto_cancel(id, CancelReason::PresentationEnded),
            None => false,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
