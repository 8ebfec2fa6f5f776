//! # queryable
//!
//! A suspend-and-resume query primitive for declarative UI frameworks.
//!
//! A caller suspends inside [`QueryRegister::begin_query`], a presentation
//! layer observes the pending query and shows some surface for it (alert,
//! sheet, dialog, overlay), and user interaction resolves the query — the
//! caller resumes with the produced value without ever knowing how the
//! surface was presented or dismissed. The register holds at most one
//! pending query, settles conflicts by a fixed policy, and makes every
//! cancellation race safe through id matching.
//!
//! ## Core Systems
//!
//! - **[`id`]** — Query ids and pluggable id generation
//! - **[`error`]** — Cancellation reasons and the query error type
//! - **[`register`]** — The single-slot register: conflicts, publishing, suspension
//! - **[`resolver`]** — The capability presentation code uses to answer a query
//! - **[`adapter`]** — Thin bindings from published queries to a UI surface
//! - **[`testing`]** — Probe harness and scripted id sources
//!
//! ## Example
//!
//! ```
//! use queryable::{ConflictPolicy, QueryRegister};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let register = QueryRegister::<String, bool>::new(ConflictPolicy::CancelPrevious);
//!
//! // The presentation side: observe, "show UI", answer.
//! let ui = register.clone();
//! let surface = tokio::spawn(async move {
//!     let mut updates = ui.subscribe();
//!     loop {
//!         let current = updates.borrow_and_update().clone();
//!         if let Some(query) = current {
//!             query.resolver().answer(query.input() == "proceed?");
//!             break;
//!         }
//!         if updates.changed().await.is_err() {
//!             break;
//!         }
//!     }
//! });
//!
//! // The caller side: one suspending call, one answer.
//! let confirmed = register.begin_query("proceed?".to_owned()).await.unwrap();
//! assert!(confirmed);
//! # surface.await.unwrap();
//! # }
//! ```

// Foundation
pub mod error;
pub mod id;

// The register and its capability object
pub mod register;
pub mod resolver;

// Presentation binding
pub mod adapter;

// Test support
pub mod testing;

pub use adapter::{Adapter, CallbackSurface, Surface};
pub use error::{CancelReason, QueryError};
pub use id::{IdSource, QueryId, SequentialIds};
pub use register::{ActiveQuery, ConflictPolicy, QueryRegister};
pub use resolver::Resolver;
