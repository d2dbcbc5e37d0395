//! Reference counts for bundles that have an active stream session.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

/// Shared registry of bundles currently being streamed.
///
/// Cloning is cheap; all clones see the same counts.
#[derive(Debug, Clone, Default)]
pub struct BundleLeases {
    counts: Arc<Mutex<HashMap<String, usize>>>,
}

impl BundleLeases {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `bundle_id` as in use until the returned guard is dropped.
    pub fn acquire(&self, bundle_id: &str) -> BundleLease {
        *self.counts.lock().entry(bundle_id.to_string()).or_insert(0) += 1;
        BundleLease {
            counts: Arc::clone(&self.counts),
            bundle_id: bundle_id.to_string(),
        }
    }

    /// Number of live leases on `bundle_id`.
    pub fn active_count(&self, bundle_id: &str) -> usize {
        self.counts.lock().get(bundle_id).copied().unwrap_or(0)
    }

    /// Whether any session holds `bundle_id`.
    pub fn is_leased(&self, bundle_id: &str) -> bool {
        self.active_count(bundle_id) > 0
    }

    /// Locks the registry; no lease can be taken or released while held.
    pub(crate) fn lock(&self) -> LeaseTable<'_> {
        LeaseTable {
            counts: self.counts.lock(),
        }
    }
}

/// Locked view of the registry.
pub(crate) struct LeaseTable<'a> {
    counts: MutexGuard<'a, HashMap<String, usize>>,
}

impl LeaseTable<'_> {
    pub(crate) fn is_leased(&self, bundle_id: &str) -> bool {
        self.counts.get(bundle_id).is_some_and(|count| *count > 0)
    }
}

/// Keeps a bundle off the reaper's list while alive.
#[derive(Debug)]
pub struct BundleLease {
    counts: Arc<Mutex<HashMap<String, usize>>>,
    bundle_id: String,
}

impl BundleLease {
    /// Bundle this lease protects.
    pub fn bundle_id(&self) -> &str {
        &self.bundle_id
    }
}

impl Drop for BundleLease {
    fn drop(&mut self) {
        let mut counts = self.counts.lock();
        if let Some(count) = counts.get_mut(&self.bundle_id) {
            *count -= 1;
            if *count == 0 {
                counts.remove(&self.bundle_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leases_are_counted_per_bundle() {
        let leases = BundleLeases::new();
        let first = leases.acquire("aa");
        let second = leases.acquire("aa");
        let other = leases.acquire("bb");

        assert_eq!(leases.active_count("aa"), 2);
        assert_eq!(leases.active_count("bb"), 1);
        assert_eq!(leases.active_count("cc"), 0);

        drop(first);
        assert!(leases.is_leased("aa"));
        drop(second);
        assert!(!leases.is_leased("aa"));
        assert_eq!(other.bundle_id(), "bb");
    }

    #[test]
    fn test_clones_share_state() {
        let leases = BundleLeases::new();
        let clone = leases.clone();
        let _lease = clone.acquire("shared");
        assert!(leases.is_leased("shared"));
    }

    #[test]
    fn test_locked_table_sees_live_leases() {
        let leases = BundleLeases::new();
        let _lease = leases.acquire("busy");

        let table = leases.lock();
        assert!(table.is_leased("busy"));
        assert!(!table.is_leased("idle"));
    }
}
