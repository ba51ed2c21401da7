//! quell-core: coalesces redundant build/test task events.
//!
//! Many tasks get queued for the same logical target; once newer ones
//! exist, the older ones need not run. This crate owns the whole decision
//! core:
//!
//! - [`engine::CoalescingEngine`] classifies inbound events and maintains
//!   per-key ordered pending lists in a durable [`store::KeyStore`]
//! - [`threshold`] turns a list plus an (age, size) policy into a
//!   supersession verdict
//! - [`reconcile::Reconciler`] periodically checks tracked ids against the
//!   external status oracle and evicts the stale ones
//! - [`query`] exposes read-only snapshots for the serving layer
//!
//! Transport (bus consumption, the status-lookup HTTP client, the query
//! HTTP server) lives with the deployment, not here.
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums at module seams; `anyhow::Result`
//!   at composition points.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod config;
pub mod engine;
pub mod event;
pub mod key;
pub mod query;
pub mod reconcile;
pub mod stats;
pub mod store;
pub mod threshold;

pub use engine::{CoalescingEngine, Disposition};
pub use event::{TaskEvent, TaskState, Transition, UnknownTaskState};
pub use key::{DeriveKey, ProvisionerWorkerType, RouteSuffix};
pub use reconcile::{Reconciler, StatusOracle, SweepReport, TaskLiveness};
pub use store::{KeyStore, PendingTask, StoreError};
pub use threshold::ThresholdPolicy;
