//! examtrend-core — exam rank reconciliation and report operations.
//!
//! This crate defines the data model, the per-source integrity gates, the
//! reconciler and progress calculator, and the engine that drives the three
//! report generators on a background job.

pub mod cancel;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod intake;
pub mod job;
pub mod model;
pub mod progress;
pub mod reconcile;
pub mod registry;
pub mod schema;
pub mod traits;
