//! Namespaced Storage
//!
//! Each extension sees a private key space inside the shared backend. The
//! physical key is `plugin:{len(id)}:{id}:{key}`; the length prefix keeps the
//! mapping injective even when ids themselves contain `:`.

use std::sync::Arc;

use docplus_core::{KeyValueBackend, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::utils::validate_storage_key;

/// Physical key prefix owned by `extension_id`
pub fn namespace_prefix(extension_id: &str) -> String {
    format!("plugin:{}:{}:", extension_id.len(), extension_id)
}

/// Extension-scoped view of a [`KeyValueBackend`]
#[derive(Clone)]
pub struct NamespacedStorage {
    prefix: String,
    backend: Arc<dyn KeyValueBackend>,
}

impl NamespacedStorage {
    pub fn new(extension_id: &str, backend: Arc<dyn KeyValueBackend>) -> Self {
        Self {
            prefix: namespace_prefix(extension_id),
            backend,
        }
    }

    fn physical(&self, key: &str) -> Result<String> {
        validate_storage_key(key)?;
        Ok(format!("{}{}", self.prefix, key))
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        self.backend.get(&self.physical(key)?)
    }

    /// Get and deserialize a value; `None` when absent.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.get(key)?
            .map(|value| serde_json::from_value(value).map_err(Into::into))
            .transpose()
    }

    pub fn set(&self, key: &str, value: impl Serialize) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.backend.set(&self.physical(key)?, value)
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        self.backend.remove(&self.physical(key)?)
    }

    /// Logical keys of this namespace, sorted
    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .backend
            .keys_with_prefix(&self.prefix)?
            .into_iter()
            .filter_map(|key| key.strip_prefix(&self.prefix).map(str::to_string))
            .collect())
    }

    /// Remove every entry of this namespace, returning how many were removed
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for key in self.backend.keys_with_prefix(&self.prefix)? {
            if self.backend.remove(&key)? {
                removed += 1;
            }
        }
        debug!(prefix = %self.prefix, removed, "Cleared extension storage");
        Ok(removed)
    }
}

impl std::fmt::Debug for NamespacedStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespacedStorage")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docplus_core::MemoryBackend;
    use serde_json::json;

    fn storage_pair() -> (NamespacedStorage, NamespacedStorage, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        (
            NamespacedStorage::new("a", backend.clone()),
            NamespacedStorage::new("b", backend.clone()),
            backend,
        )
    }

    #[test]
    fn test_extensions_are_isolated() {
        let (a, b, _) = storage_pair();

        a.set("k", 1).unwrap();
        assert_eq!(b.get("k").unwrap(), None);

        b.set("k", 2).unwrap();
        assert_eq!(a.get("k").unwrap(), Some(json!(1)));

        b.clear().unwrap();
        assert_eq!(a.get("k").unwrap(), Some(json!(1)));
        assert_eq!(b.get("k").unwrap(), None);
    }

    #[test]
    fn test_prefix_is_injective() {
        // "a:b" + "c" and "a" + "b:c" must not collide
        let backend = Arc::new(MemoryBackend::new());
        let first = NamespacedStorage::new("a:b", backend.clone());
        let second = NamespacedStorage::new("a", backend.clone());

        first.set("c", "first").unwrap();
        second.set("b:c", "second").unwrap();

        assert_eq!(first.get("c").unwrap(), Some(json!("first")));
        assert_eq!(second.get("b:c").unwrap(), Some(json!("second")));
        assert_eq!(first.keys().unwrap(), vec!["c"]);
        assert_eq!(second.keys().unwrap(), vec!["b:c"]);
    }

    #[test]
    fn test_clear_only_touches_own_namespace() {
        let (a, b, backend) = storage_pair();
        a.set("x", 1).unwrap();
        a.set("y", 2).unwrap();
        b.set("x", 3).unwrap();

        assert_eq!(a.clear().unwrap(), 2);
        assert!(a.keys().unwrap().is_empty());
        assert_eq!(b.keys().unwrap(), vec!["x"]);
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn test_invalid_keys_rejected() {
        let (a, _, backend) = storage_pair();
        assert!(matches!(
            a.set("", 1),
            Err(docplus_core::Error::InvalidKey(_))
        ));
        assert!(a.get("bad\nkey").is_err());
        assert!(a.remove(&"k".repeat(257)).is_err());
        assert!(backend.is_empty());
    }

    #[test]
    fn test_typed_roundtrip() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Draft {
            title: String,
            words: u32,
        }

        let (a, _, _) = storage_pair();
        a.set(
            "draft",
            Draft {
                title: "Intro".into(),
                words: 120,
            },
        )
        .unwrap();

        let draft: Draft = a.get_as("draft").unwrap().unwrap();
        assert_eq!(draft.words, 120);
        assert!(a.get_as::<Draft>("missing").unwrap().is_none());
    }
}
