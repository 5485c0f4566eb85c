//! Periodic synchronization of the status cache with the alert source.
//!
//! # Modules
//!
//! - `retry` - [`RetryPolicy`] and the per-tick [`RetryState`] machine
//! - `health` - [`SyncHealth`], outcome of the recent ticks
//! - `sync` - [`Scheduler`], the fetch, diff, replace and notify loop
//!
//! No error of a single tick is fatal: a failed tick leaves the cache as it
//! was and the next one runs on schedule.

mod health;
mod retry;
mod sync;

pub use crate::scheduler::health::SyncHealth;
pub use crate::scheduler::retry::{RetryDecision, RetryPolicy, RetryState};
pub use crate::scheduler::sync::Scheduler;
