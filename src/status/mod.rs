//! Region alert statuses and the shared cache holding the latest of them.
//!
//! - [`StatusSnapshot`]: complete, immutable set of per-region statuses
//! - [`StatusCache`]: atomic-swap holder of the current snapshot

mod cache;
mod snapshot;

pub use crate::status::cache::StatusCache;
pub use crate::status::snapshot::StatusSnapshot;
