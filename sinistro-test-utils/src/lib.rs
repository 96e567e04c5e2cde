//! SINISTRO Test Utilities
//!
//! Centralized test infrastructure for the SINISTRO workspace:
//! - Proptest generators for items, raw records, and collection keys
//! - Scriptable fetchers and in-memory caches
//! - Fixtures for the reference collections the intake form uses
//! - Custom assertions for reference-data results

// Re-export mocks from their source crate
pub use sinistro_storage::{MemoryBackend, MockFetcher, MockResponse};

// Re-export core types for convenience
pub use sinistro_core::{
    CollectionKey, CollectionName, Item, ItemId, RefDataError, RefDataResult,
};
pub use sinistro_storage::{
    CollectionState, PersistentCache, ReferenceDataStore, TtlPolicy,
};

use std::sync::Arc;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating reference-data values.

    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    /// Generate an ItemId in either representation.
    pub fn arb_item_id() -> impl Strategy<Value = ItemId> {
        prop_oneof![
            (1i64..100_000).prop_map(ItemId::Number),
            "[A-Z]{2}[0-9]{0,3}".prop_map(ItemId::Text),
        ]
    }

    /// Generate a non-blank display name.
    pub fn arb_display_name() -> impl Strategy<Value = String> {
        "[A-Za-zÀ-ú][A-Za-zÀ-ú0-9 ]{0,24}"
    }

    /// Generate a single item.
    pub fn arb_item() -> impl Strategy<Value = Item> {
        (arb_item_id(), arb_display_name()).prop_map(|(id, name)| Item::new(id, name))
    }

    /// Generate up to `max` items with distinct numeric ids.
    ///
    /// Ids are assigned by position so every item is unique under the loose
    /// id equality.
    pub fn arb_items(max: usize) -> impl Strategy<Value = Vec<Item>> {
        prop::collection::vec(arb_display_name(), 0..=max).prop_map(|names| {
            names
                .into_iter()
                .enumerate()
                .map(|(i, name)| Item::new(i as i64 + 1, name))
                .collect()
        })
    }

    /// Generate a raw backend record in one of the shapes normalization
    /// accepts.
    pub fn arb_raw_record() -> impl Strategy<Value = Value> {
        prop_oneof![
            arb_display_name().prop_map(Value::String),
            (1i64..10_000).prop_map(|n| json!(n)),
            (1i64..10_000, arb_display_name()).prop_map(|(id, name)| json!({"id": id, "nome": name})),
            (1i64..10_000, arb_display_name())
                .prop_map(|(id, name)| json!({"ID": id, "displayName": name})),
            arb_display_name().prop_map(|name| json!({"descricao": name})),
        ]
    }

    /// Generate a raw record normalization must reject.
    pub fn arb_malformed_record() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            Just(json!({})),
            "[a-z]{1,8}".prop_map(|k| json!({ k: true })),
            Just(json!("   ")),
        ]
    }

    /// Generate any collection name.
    pub fn arb_collection_name() -> impl Strategy<Value = CollectionName> {
        prop::sample::select(CollectionName::ALL.to_vec())
    }

    /// Generate a complete collection key, with a parent for scoped
    /// collections.
    pub fn arb_collection_key() -> impl Strategy<Value = CollectionKey> {
        (arb_collection_name(), "[A-Z]{2}").prop_map(|(name, uf)| {
            if name.is_scoped() {
                CollectionKey::scoped(name, uf)
            } else {
                CollectionKey::new(name)
            }
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use serde_json::{json, Value};

    /// Raw positions payload as the backend sends it.
    pub fn positions_payload() -> Vec<Value> {
        vec![
            json!({"id": 1, "nome": "Pátio A"}),
            json!({"id": 2, "nome": "Pátio B"}),
            json!({"id": 3, "nome": "Oficina"}),
        ]
    }

    /// Raw brands payload using the uppercase id spelling.
    pub fn brands_payload() -> Vec<Value> {
        vec![
            json!({"ID": 10, "displayName": "Fiat"}),
            json!({"ID": 11, "displayName": "Volkswagen"}),
            json!({"ID": 12, "displayName": "Chevrolet"}),
        ]
    }

    /// Raw states payload as bare strings.
    pub fn states_payload() -> Vec<Value> {
        vec![json!("SP"), json!("RJ"), json!("MG")]
    }

    /// Raw cities payload for São Paulo.
    pub fn cities_sp_payload() -> Vec<Value> {
        vec![
            json!({"id": 3550308, "nome": "São Paulo"}),
            json!({"id": 3509502, "nome": "Campinas"}),
            json!({"id": 3548708, "nome": "Santos"}),
        ]
    }

    /// `count` synthetic items named `"{prefix} {n}"`.
    pub fn numbered_items(prefix: &str, count: usize) -> Vec<Item> {
        (1..=count)
            .map(|n| Item::new(n as i64, format!("{prefix} {n}")))
            .collect()
    }

    /// Fetcher scripted with every fixture payload.
    pub fn scripted_fetcher() -> MockFetcher {
        let fetcher = MockFetcher::new();
        script_all(&fetcher);
        fetcher
    }

    /// Gated fetcher scripted with every fixture payload.
    pub fn gated_fetcher() -> MockFetcher {
        let fetcher = MockFetcher::gated();
        script_all(&fetcher);
        fetcher
    }

    fn script_all(fetcher: &MockFetcher) {
        fetcher.respond(
            CollectionKey::new(CollectionName::Positions),
            MockResponse::items(positions_payload()),
        );
        fetcher.respond(
            CollectionKey::new(CollectionName::Brands),
            MockResponse::items(brands_payload()),
        );
        fetcher.respond(
            CollectionKey::new(CollectionName::States),
            MockResponse::items(states_payload()),
        );
        fetcher.respond(
            CollectionKey::scoped(CollectionName::Cities, "SP"),
            MockResponse::items(cities_sp_payload()),
        );
        for name in [
            CollectionName::Insurers,
            CollectionName::Collaborators,
            CollectionName::Providers,
        ] {
            fetcher.respond(
                CollectionKey::new(name),
                MockResponse::items(
                    numbered_items(name.slug(), 3)
                        .iter()
                        .map(Item::to_value)
                        .collect(),
                ),
            );
        }
    }

    /// Store over an in-memory cache, driven by `fetcher`.
    pub fn memory_store(fetcher: Arc<MockFetcher>) -> ReferenceDataStore {
        let cache = PersistentCache::in_memory("sinistro", "2");
        cache.init();
        ReferenceDataStore::new(Arc::new(cache), fetcher, TtlPolicy::new())
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion helpers for reference-data tests.

    use super::*;

    /// Assert that a result is a FetchFailed error.
    #[track_caller]
    pub fn assert_fetch_failed<T: std::fmt::Debug>(result: &RefDataResult<T>) {
        match result {
            Err(RefDataError::FetchFailed { .. }) => {}
            other => panic!("Expected FetchFailed error, got: {:?}", other),
        }
    }

    /// Assert that a result is a MalformedRecord error.
    #[track_caller]
    pub fn assert_malformed<T: std::fmt::Debug>(result: &RefDataResult<T>) {
        match result {
            Err(RefDataError::MalformedRecord { .. }) => {}
            other => panic!("Expected MalformedRecord error, got: {:?}", other),
        }
    }

    /// Assert that a collection finished loading successfully with `len`
    /// items.
    #[track_caller]
    pub fn assert_loaded(state: &CollectionState, len: usize) {
        assert!(!state.loading, "collection still loading: {:?}", state);
        assert!(state.error.is_none(), "collection failed: {:?}", state.error);
        assert_eq!(state.len(), len, "unexpected item count");
        assert!(state.last_loaded_at.is_some(), "missing load timestamp");
    }
}

// ============================================================================
// TESTS
// ============================================================================
