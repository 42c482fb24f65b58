//! `jobkeeper`: durable job store and execution log for an in-process
//! scheduler, backed by SQLite.
//!
//! The scheduler keeps trigger math and dispatch to itself; this crate owns
//! the parts that must survive a restart. [`adapter::DatabaseJobStore`]
//! implements the scheduler-facing [`adapter::JobStore`] contract over a
//! `scheduled_jobs` table, fans lifecycle events out into a `job_executions`
//! log, and enforces the retention policy over that log. Stored payloads are
//! a versioned envelope owned by [`serializer::JobSerializer`]; task names
//! resolve against a [`registry::TaskRegistry`] at read time, so a payload
//! written by code that no longer exists degrades into a logged skip instead
//! of a failed scheduler tick.

#[macro_use]
extern crate diesel;

pub mod adapter;
pub mod api;
pub mod database;
pub mod errors;
pub mod executions;
pub mod job_store;
pub mod logger;
pub mod models;
pub mod registry;
pub mod run_now;
pub mod schema;
pub mod serializer;
pub mod settings;

pub use adapter::{DatabaseJobStore, JobStore};
pub use errors::{Result, StoreError};
pub use registry::TaskRegistry;
pub use run_now::{RunNowCoordinator, RunOutcome};
pub use serializer::{JobSerializer, JobSpec, Trigger};
