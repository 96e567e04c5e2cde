//! Catalog of reference collections.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const HOUR: Duration = Duration::from_secs(60 * 60);

/// A named lookup dataset consumed by intake forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionName {
    Positions,
    Brands,
    Insurers,
    Collaborators,
    Providers,
    States,
    /// Cities, scoped by state code.
    Cities,
}

impl CollectionName {
    pub const ALL: [CollectionName; 7] = [
        Self::Positions,
        Self::Brands,
        Self::Insurers,
        Self::Collaborators,
        Self::Providers,
        Self::States,
        Self::Cities,
    ];

    /// Stable storage and routing slug. The set of slugs is prefix-free.
    pub fn slug(self) -> &'static str {
        match self {
            Self::Positions => "posicoes",
            Self::Brands => "marcas",
            Self::Insurers => "seguradoras",
            Self::Collaborators => "colaboradores",
            Self::Providers => "prestadores",
            Self::States => "estados",
            Self::Cities => "cidades",
        }
    }

    /// Whether the collection only exists relative to a parent key.
    pub fn is_scoped(self) -> bool {
        matches!(self, Self::Cities)
    }

    /// Default time-to-live: geographic data changes rarely, rosters daily.
    pub fn default_ttl(self) -> Duration {
        match self {
            Self::States | Self::Cities => 7 * 24 * HOUR,
            _ => 24 * HOUR,
        }
    }

    /// Unscoped collections, i.e. the ones that can be warmed at startup.
    pub fn unscoped() -> impl Iterator<Item = CollectionName> {
        Self::ALL.into_iter().filter(|name| !name.is_scoped())
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown collection: {0}")]
pub struct ParseCollectionError(pub String);

impl FromStr for CollectionName {
    type Err = ParseCollectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|name| {
                name.slug() == needle
                    || serde_json::to_value(name)
                        .ok()
                        .and_then(|v| v.as_str().map(|v| v == needle))
                        .unwrap_or(false)
            })
            .ok_or_else(|| ParseCollectionError(s.to_string()))
    }
}

/// Address of one loadable collection: a name plus, for scoped
/// collections, the parent key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionKey {
    name: CollectionName,
    parent: Option<String>,
}

impl CollectionKey {
    /// Key for an unscoped collection.
    pub fn new(name: CollectionName) -> Self {
        Self { name, parent: None }
    }

    /// Key for a collection under a parent. Unscoped collections drop the
    /// parent, so `scoped(Brands, "x") == new(Brands)`.
    pub fn scoped(name: CollectionName, parent: impl Into<String>) -> Self {
        let parent = if name.is_scoped() {
            Some(parent.into().trim().to_string())
        } else {
            None
        };
        Self { name, parent }
    }

    pub fn name(&self) -> CollectionName {
        self.name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// A scoped collection addressed without its parent cannot be fetched.
    pub fn is_complete(&self) -> bool {
        !self.name.is_scoped() || self.parent.as_deref().is_some_and(|p| !p.is_empty())
    }
}

impl From<CollectionName> for CollectionKey {
    fn from(name: CollectionName) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parent {
            Some(parent) => write!(f, "{}.{}", self.name.slug(), parent),
            None => f.write_str(self.name.slug()),
        }
    }
}
