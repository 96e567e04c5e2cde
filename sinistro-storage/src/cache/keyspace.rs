//! Namespaced, version-suffixed cache keys.
//!
//! Layout: `{namespace}:{slug}[.{parent}]_v{version}`, for example
//! `sinistro:cidades.SP_v2`. Bumping the version makes every key written by
//! older builds unreachable.

use sinistro_core::{CollectionKey, CollectionName};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeyspace {
    namespace: String,
    version: String,
}

impl CacheKeyspace {
    pub fn new(namespace: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            version: version.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Storage key for one collection.
    pub fn key_for(&self, key: &CollectionKey) -> String {
        match key.parent() {
            Some(parent) => format!(
                "{}:{}.{}_v{}",
                self.namespace,
                key.name().slug(),
                parent,
                self.version
            ),
            None => format!("{}:{}_v{}", self.namespace, key.name().slug(), self.version),
        }
    }

    /// Prefix shared by every key of a collection, across parents and
    /// versions.
    pub fn collection_prefix(&self, name: CollectionName) -> String {
        format!("{}:{}", self.namespace, name.slug())
    }

    /// Prefix shared by every key in this namespace.
    pub fn namespace_prefix(&self) -> String {
        format!("{}:", self.namespace)
    }

    /// Whether a stored key belongs to this namespace but another version.
    pub fn is_superseded(&self, stored: &str) -> bool {
        stored.starts_with(&self.namespace_prefix())
            && !stored.ends_with(&format!("_v{}", self.version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unscoped_key_layout() {
        let ks = CacheKeyspace::new("sinistro", "2");
        assert_eq!(
            ks.key_for(&CollectionKey::new(CollectionName::Positions)),
            "sinistro:posicoes_v2"
        );
    }

    #[test]
    fn scoped_key_layout() {
        let ks = CacheKeyspace::new("sinistro", "2");
        let key = ks.key_for(&CollectionKey::scoped(CollectionName::Cities, "SP"));
        assert_eq!(key, "sinistro:cidades.SP_v2");
        assert!(key.starts_with(&ks.collection_prefix(CollectionName::Cities)));
    }

    #[test]
    fn detects_superseded_versions() {
        let ks = CacheKeyspace::new("sinistro", "2");
        assert!(ks.is_superseded("sinistro:cidades.SP_v1"));
        assert!(!ks.is_superseded("sinistro:cidades.SP_v2"));
        assert!(!ks.is_superseded("other:cidades_v1"));
    }
}
