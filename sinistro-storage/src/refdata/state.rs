//! Observable state of one collection.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sinistro_core::{Item, RefDataError};

/// Snapshot of a collection as the UI sees it.
///
/// Cloning is cheap: items are shared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionState {
    pub items: Arc<Vec<Item>>,
    pub loading: bool,
    pub error: Option<RefDataError>,
    pub last_loaded_at: Option<DateTime<Utc>>,
}

impl CollectionState {
    /// Empty, idle, never loaded.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Successfully loaded `items` captured at `at`.
    pub fn loaded(items: Vec<Item>, at: DateTime<Utc>) -> Self {
        Self {
            items: Arc::new(items),
            loading: false,
            error: None,
            last_loaded_at: Some(at),
        }
    }

    /// Failed load with nothing to show.
    pub fn failed(error: RefDataError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
