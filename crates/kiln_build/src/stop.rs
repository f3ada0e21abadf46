//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable cancellation flag shared between a build and its callers.
///
/// Requesting a stop never blocks; the build polls the flag between units
/// and before linking.
///
/// A handle may follow a parent: a stop requested on the parent is seen by
/// the handle, but resetting the handle leaves the parent alone.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
    parent: Option<Arc<AtomicBool>>,
}

impl StopHandle {
    /// Creates a handle with no stop requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a handle that also reports stops requested on `parent`.
    pub fn following(parent: &StopHandle) -> Self {
        Self {
            requested: Arc::default(),
            parent: Some(Arc::clone(&parent.requested)),
        }
    }

    /// Requests cancellation.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Returns `true` if cancellation was requested here or on the parent.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.load(Ordering::SeqCst))
    }

    /// Clears a previous request on this handle.
    pub fn reset(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }
}
