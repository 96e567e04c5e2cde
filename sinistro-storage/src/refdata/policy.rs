//! Per-collection time-to-live policy.

use std::collections::HashMap;
use std::time::Duration;

use sinistro_core::CollectionName;

/// TTL per collection, falling back to [`CollectionName::default_ttl`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TtlPolicy {
    overrides: HashMap<CollectionName, Duration>,
}

impl TtlPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the TTL of one collection.
    pub fn with_ttl(mut self, name: CollectionName, ttl: Duration) -> Self {
        self.overrides.insert(name, ttl);
        self
    }

    pub fn ttl_for(&self, name: CollectionName) -> Duration {
        self.overrides
            .get(&name)
            .copied()
            .unwrap_or_else(|| name.default_ttl())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_defaults() {
        let policy = TtlPolicy::new().with_ttl(CollectionName::Brands, Duration::from_secs(60));
        assert_eq!(policy.ttl_for(CollectionName::Brands), Duration::from_secs(60));
        assert_eq!(
            policy.ttl_for(CollectionName::States),
            CollectionName::States.default_ttl()
        );
    }
}
