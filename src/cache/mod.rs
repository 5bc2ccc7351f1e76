//! Decision cache: request fingerprinting and the bundled in-memory store

use crate::error::{AppError, Result};
use crate::review::AccessReviewSpec;
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Key/value collaborator holding prior decisions. The engine only computes
/// keys and reads/writes through this interface; entry lifecycle belongs to
/// the implementation.
#[cfg_attr(test, mockall::automock)]
pub trait DecisionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<bool>;
    fn set(&self, key: &str, allowed: bool) -> Result<()>;
}

/// Deterministic fingerprint of a normalized review spec.
///
/// Identity fields are lowercased and groups sorted so structurally equal
/// specs hash identically regardless of construction order.
pub fn fingerprint(spec: &AccessReviewSpec) -> String {
    let mut canonical = format!("user={}", spec.user.to_lowercase());

    let mut groups: Vec<String> = spec.groups.iter().map(|g| g.to_lowercase()).collect();
    groups.sort();
    canonical.push_str(&format!(";groups={}", groups.join(",")));

    if let Some(attrs) = &spec.resource_attributes {
        canonical.push_str(&format!(
            ";resource={}/{}/{}/{}/{}/{}/{}",
            attrs.group,
            attrs.version,
            attrs.resource,
            attrs.subresource,
            attrs.namespace,
            attrs.name,
            attrs.verb,
        ));
    }
    if let Some(attrs) = &spec.non_resource_attributes {
        canonical.push_str(&format!(";nonResource={}/{}", attrs.path, attrs.verb));
    }

    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Bundled LRU decision store. The webhook may inject any other
/// `DecisionStore` (e.g. one backed by a persistent cache).
pub struct InMemoryDecisionStore {
    entries: Mutex<LruCache<String, bool>>,
}

impl InMemoryDecisionStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }
}

impl DecisionStore for InMemoryDecisionStore {
    fn get(&self, key: &str) -> Option<bool> {
        let mut entries = self.entries.lock().ok()?;
        entries.get(key).copied()
    }

    fn set(&self, key: &str, allowed: bool) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AppError::Cache("decision store lock poisoned".to_string()))?;
        entries.put(key.to_string(), allowed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::{NonResourceAttributes, ResourceAttributes};

    fn pod_get_spec(user: &str, groups: &[&str]) -> AccessReviewSpec {
        AccessReviewSpec {
            user: user.to_string(),
            groups: groups.iter().map(|g| g.to_string()).collect(),
            resource_attributes: Some(ResourceAttributes {
                namespace: "ns1".to_string(),
                verb: "get".to_string(),
                resource: "pods".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let a = pod_get_spec("alice", &["dev", "ops"]);
        let b = pod_get_spec("alice", &["dev", "ops"]);
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_identity_normalization() {
        let a = pod_get_spec("Alice", &["Ops", "dev"]);
        let b = pod_get_spec("alice", &["dev", "ops"]);
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_verb_sensitivity() {
        let a = pod_get_spec("alice", &[]);
        let mut b = pod_get_spec("alice", &[]);
        b.resource_attributes.as_mut().unwrap().verb = "delete".to_string();
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_distinguishes_resource_from_non_resource() {
        let resource = pod_get_spec("alice", &[]);
        let non_resource = AccessReviewSpec {
            user: "alice".to_string(),
            non_resource_attributes: Some(NonResourceAttributes {
                path: "/api".to_string(),
                verb: "get".to_string(),
            }),
            ..Default::default()
        };
        assert_ne!(fingerprint(&resource), fingerprint(&non_resource));
    }

    #[test]
    fn test_in_memory_store_round_trip() {
        let store = InMemoryDecisionStore::new(8);
        let key = fingerprint(&pod_get_spec("alice", &[]));

        assert_eq!(store.get(&key), None);
        store.set(&key, true).unwrap();
        assert_eq!(store.get(&key), Some(true));
        store.set(&key, false).unwrap();
        assert_eq!(store.get(&key), Some(false));
    }

    #[test]
    fn test_in_memory_store_evicts_least_recently_used() {
        let store = InMemoryDecisionStore::new(2);
        store.set("a", true).unwrap();
        store.set("b", true).unwrap();
        store.set("c", true).unwrap();

        assert_eq!(store.get("a"), None);
        assert_eq!(store.get("b"), Some(true));
        assert_eq!(store.get("c"), Some(true));
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let store = InMemoryDecisionStore::new(0);
        store.set("a", true).unwrap();
        assert_eq!(store.get("a"), Some(true));
    }
}
