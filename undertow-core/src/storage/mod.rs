//! On-disk storage lifecycle.
//!
//! Content sources write bundles under a single storage root. Stream
//! sessions pin their bundle with a [`BundleLease`]; the [`StorageReaper`]
//! periodically evicts every bundle that is not pinned.

pub mod leases;
pub mod reaper;

pub use leases::{BundleLease, BundleLeases};
pub use reaper::{ReapReport, ReaperHandle, StorageReaper};
