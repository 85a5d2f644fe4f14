//! Copy-on-write registries for shared, read-heavy collaborator lists.

use parking_lot::RwLock;
use std::sync::Arc;

/// A mostly-append, read-heavy registry.
///
/// Readers take an [`Arc`] snapshot and keep it for a whole pipeline
/// invocation, so a rule registered mid-flight never appears mid-pass.
/// Writers rebuild the vector behind the lock, copy-on-write style.
#[derive(Debug)]
pub struct Registry<T: ?Sized> {
    inner: RwLock<Arc<Vec<Arc<T>>>>,
}

impl<T: ?Sized> Registry<T> {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Appends an item; dispatches already holding a snapshot are
    /// unaffected.
    pub fn push(&self, item: Arc<T>) {
        let mut guard = self.inner.write();
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(item);
        *guard = Arc::new(next);
    }

    /// A consistent snapshot of the current items.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        Arc::clone(&self.inner.read())
    }

    /// Number of registered items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_isolated_from_later_pushes() {
        let registry: Registry<str> = Registry::new();
        registry.push(Arc::from("first"));
        let snapshot = registry.snapshot();
        registry.push(Arc::from("second"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn push_preserves_registration_order() {
        let registry: Registry<str> = Registry::new();
        registry.push(Arc::from("a"));
        registry.push(Arc::from("b"));
        registry.push(Arc::from("c"));
        let snapshot = registry.snapshot();
        let items: Vec<&str> = snapshot.iter().map(|s| &**s).collect();
        assert_eq!(items, ["a", "b", "c"]);
    }
}
