//! Reference-data orchestration.
//!
//! Reads flow UI → [`ReferenceDataStore`] → [`CollectionLoader`] →
//! [`PersistentCache`](crate::PersistentCache) (hit) or
//! [`CollectionFetcher`] (miss). Invalidation flows the other way: CRUD code
//! calls [`ReferenceDataStore::invalidate`] and the next access reloads.

pub mod fetcher;
pub mod loader;
pub mod policy;
pub mod state;
pub mod store;

pub use fetcher::{CollectionFetcher, FetchResponse};
pub use loader::CollectionLoader;
pub use policy::TtlPolicy;
pub use state::CollectionState;
pub use store::{
    CollectionHandle, Invalidation, LoadMode, MutationNotice, ReferenceDataStore, StoreEvent,
    StoreStatus,
};
