//! Presentation adapters: binding published queries to a UI surface.
//!
//! The register knows nothing about how a query is displayed. An [`Adapter`]
//! is the thin, mechanical piece in between: it watches the register's
//! update channel, tells a [`Surface`] to show or hide itself, and reports
//! host-initiated dismissals back as auto-cancels. Alert-, sheet-, and
//! overlay-style bindings in a host toolkit are all expected to look like
//! this; [`CallbackSurface`] covers the closure-style case in-crate.

use tokio::sync::watch;
use tracing::debug;

use crate::error::CancelReason;
use crate::id::QueryId;
use crate::register::{ActiveQuery, QueryRegister};
use crate::resolver::Resolver;

// ---------------------------------------------------------------------------
// Surface
// ---------------------------------------------------------------------------

/// One UI surface that can display a query and take it down again.
///
/// `show` receives the query's input and a [`Resolver`] to wire into the
/// surface's interaction handlers. `hide` is the dismiss signal: the slot was
/// cleared (answered, cancelled, or superseded) and the surface must close.
pub trait Surface<I, R> {
    /// Display the surface for a query.
    fn show(&mut self, input: &I, resolver: Resolver<R>);

    /// Take the surface down.
    fn hide(&mut self);
}

/// A [`Surface`] built from two closures.
pub struct CallbackSurface<Show, Hide> {
    on_show: Show,
    on_hide: Hide,
}

impl<Show, Hide> CallbackSurface<Show, Hide> {
    /// Build a surface from a show and a hide callback.
    pub fn new(on_show: Show, on_hide: Hide) -> Self {
        Self { on_show, on_hide }
    }
}

impl<I, R, Show, Hide> Surface<I, R> for CallbackSurface<Show, Hide>
where
    Show: FnMut(&I, Resolver<R>),
    Hide: FnMut(),
{
    fn show(&mut self, input: &I, resolver: Resolver<R>) {
        (self.on_show)(input, resolver);
    }

    fn hide(&mut self) {
        (self.on_hide)();
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Drives one [`Surface`] from a register's update channel.
///
/// The adapter remembers the id it observed when it showed the surface.
/// [`surface_dismissed`](Adapter::surface_dismissed) cancels against that
/// stored id — never a freshly-read one — so a dismissal that races a
/// superseding query correctly no-ops.
pub struct Adapter<I, R, S> {
    register: QueryRegister<I, R>,
    updates: watch::Receiver<Option<ActiveQuery<I, R>>>,
    surface: S,
    /// The id observed at display time, while the surface is up.
    shown: Option<QueryId>,
}

impl<I, R, S> Adapter<I, R, S>
where
    I: Clone + Send + Sync + 'static,
    R: Send + 'static,
    S: Surface<I, R>,
{
    /// Bind a surface to a register.
    pub fn new(register: &QueryRegister<I, R>, surface: S) -> Self {
        Self {
            register: register.clone(),
            updates: register.subscribe(),
            surface,
            shown: None,
        }
    }

    /// Drive the surface until the register goes away.
    ///
    /// Applies the current slot state immediately (a query may already be
    /// pending when the adapter starts), then follows every change.
    pub async fn run(&mut self) {
        self.apply_current();
        while self.updates.changed().await.is_ok() {
            self.apply_current();
        }
        // Register torn down; make sure the surface is not left up.
        if self.shown.take().is_some() {
            self.surface.hide();
        }
    }

    /// Synchronously reconcile the surface with the current slot state.
    ///
    /// For hosts that poll instead of awaiting. Returns whether the surface
    /// changed (shown, hidden, or switched to a different query).
    pub fn pump(&mut self) -> bool {
        let before = self.shown;
        self.apply_current();
        before != self.shown
    }

    /// The host's hook for "my surface disappeared without an answer"
    /// (user swipe-down, system dismissal, navigation away).
    pub fn surface_dismissed(&mut self) {
        if let Some(id) = self.shown.take() {
            debug!(query_id = %id, "surface dismissed without an answer");
            self.register
                .auto_cancel(id, CancelReason::PresentationEnded);
        }
    }

    /// Whether the surface is currently up.
    pub fn is_showing(&self) -> bool {
        self.shown.is_some()
    }

    /// Borrow the underlying surface.
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Borrow the underlying surface mutably.
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    fn apply_current(&mut self) {
        let current = self.updates.borrow_and_update().clone();
        match current {
            Some(query) => {
                if self.shown != Some(query.id()) {
                    self.shown = Some(query.id());
                    self.surface.show(query.input(), query.resolver().clone());
                }
            }
            None => {
                if self.shown.take().is_some() {
                    self.surface.hide();
                }
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
