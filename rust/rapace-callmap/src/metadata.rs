//! Keyed metadata attached to callables.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Value stored in a descriptor's metadata.
pub type Meta = Arc<dyn Any + Send + Sync>;

/// Keyed metadata attached to a callable (e.g. a required privilege level).
///
/// Last write wins. Dispatch never reads it.
#[derive(Default)]
pub struct Metadata {
    entries: RwLock<HashMap<String, Meta>>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: Meta) {
        self.entries.write().insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<Meta> {
        self.entries.read().get(key).cloned()
    }

    /// Typed lookup; `None` if the key is absent or holds another type.
    pub fn get_as<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.get(key)?.downcast::<T>().ok()
    }

    pub fn remove(&self, key: &str) -> Option<Meta> {
        self.entries.write().remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl std::fmt::Debug for Metadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.read();
        let mut keys: Vec<&str> = entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("Metadata").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins() {
        let meta = Metadata::new();
        meta.set("level", Arc::new(1u8));
        meta.set("level", Arc::new(3u8));
        assert_eq!(meta.get_as::<u8>("level").as_deref(), Some(&3));
        assert_eq!(meta.len(), 1);
    }

    #[test]
    fn typed_lookup_checks_type() {
        let meta = Metadata::new();
        meta.set("owner", Arc::new(String::from("ops")));
        assert!(meta.get_as::<u8>("owner").is_none());
        assert!(meta.get_as::<String>("missing").is_none());
        assert_eq!(meta.get_as::<String>("owner").as_deref().map(String::as_str), Some("ops"));
    }

    #[test]
    fn remove_entry() {
        let meta = Metadata::new();
        assert!(meta.is_empty());
        meta.set("k", Arc::new(()));
        assert!(meta.remove("k").is_some());
        assert!(meta.get("k").is_none());
    }
}
