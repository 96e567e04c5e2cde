//! SINISTRO Core Data Types
//!
//! Shared vocabulary for the reference-data layer: the normalized [`Item`]
//! record, the catalog of reference collections, and the error taxonomy
//! every other crate reports through.

pub mod collection;
pub mod error;
pub mod item;

pub use collection::{CollectionKey, CollectionName, ParseCollectionError};
pub use error::{RefDataError, RefDataResult};
pub use item::{display_name_of, normalize_records, Item, ItemId, DISPLAY_KEYS, ID_KEYS};
