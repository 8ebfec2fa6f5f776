//! Test support: the [`Probe`] harness and deterministic id sources.
//!
//! Use the [`Probe`] to inspect and answer a register's pending query
//! synchronously, without wiring up a presentation adapter. Use
//! [`ScriptedIds`] to pin down the ids a register hands out. Nothing here is
//! test-only in the `#[cfg(test)]` sense — hosts embedding the register can
//! use the probe from their own test suites.

pub mod ids;
pub mod probe;

pub use ids::ScriptedIds;
pub use probe::Probe;
