//! Normalized reference-data records.
//!
//! Backends hand out records in several shapes (`id` vs `ID`, `nome` vs
//! `displayName`, bare strings). They are folded into a single [`Item`]
//! shape exactly once, when a collection is loaded, so nothing downstream
//! has to guess at field names again.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{RefDataError, RefDataResult};

/// Field names recognized as the record identifier, in priority order.
pub const ID_KEYS: &[&str] = &["id", "ID", "Id", "_id"];

/// Field names recognized as the human-readable label, in priority order.
pub const DISPLAY_KEYS: &[&str] = &["displayName", "display_name", "nome", "name", "descricao", "label"];

/// Identifier of a reference item.
///
/// Equality is representation-insensitive: `Number(7)` equals `Text("7")`.
/// Hashing follows the textual form so the two stay consistent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Number(i64),
    Text(String),
}

impl ItemId {
    /// Extract an identifier from a JSON scalar.
    ///
    /// Integers and non-empty strings qualify; everything else does not.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Number),
            Value::String(s) if !s.trim().is_empty() => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// Find the first id-like field of a JSON object.
    pub fn from_object(map: &Map<String, Value>) -> Option<Self> {
        ID_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(Self::from_json)
    }

    fn text_form(&self) -> std::borrow::Cow<'_, str> {
        match self {
            Self::Number(n) => std::borrow::Cow::Owned(n.to_string()),
            Self::Text(s) => std::borrow::Cow::Borrowed(s.as_str()),
        }
    }
}

impl PartialEq for ItemId {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => self.text_form() == other.text_form(),
        }
    }
}

impl Eq for ItemId {}

impl Hash for ItemId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text_form().hash(state);
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text_form())
    }
}

impl From<i64> for ItemId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for ItemId {
    fn from(value: i32) -> Self {
        Self::Number(i64::from(value))
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// First display-name-like field of a JSON object, if any.
pub fn display_name_of(map: &Map<String, Value>) -> Option<String> {
    DISPLAY_KEYS
        .iter()
        .filter_map(|key| map.get(*key))
        .find_map(|value| match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            _ => None,
        })
}

/// A reference-data record: identifier, label, and opaque extra fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub display_name: String,
    /// The record as received. Never interpreted by the cache or the guard.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Item {
    pub fn new(id: impl Into<ItemId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            fields: Map::new(),
        }
    }

    /// Normalize one raw record.
    ///
    /// A record lacking both an identifier and a display name is rejected
    /// with [`RefDataError::MalformedRecord`]; when only one is present the
    /// other is derived from it.
    pub fn from_value(value: Value) -> RefDataResult<Self> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Ok(Self {
                id: ItemId::Text(s.clone()),
                display_name: s,
                fields: Map::new(),
            }),
            Value::Number(n) => {
                let id = n
                    .as_i64()
                    .ok_or_else(|| RefDataError::malformed(format!("non-integer id {n}")))?;
                Ok(Self {
                    id: ItemId::Number(id),
                    display_name: id.to_string(),
                    fields: Map::new(),
                })
            }
            Value::Object(map) => {
                let id = ItemId::from_object(&map);
                let display_name = display_name_of(&map);
                let (id, display_name) = match (id, display_name) {
                    (Some(id), Some(name)) => (id, name),
                    (Some(id), None) => {
                        let name = id.to_string();
                        (id, name)
                    }
                    (None, Some(name)) => (ItemId::Text(name.clone()), name),
                    (None, None) => {
                        return Err(RefDataError::malformed(
                            "record has neither an id nor a display name",
                        ))
                    }
                };
                Ok(Self {
                    id,
                    display_name,
                    fields: map,
                })
            }
            other => Err(RefDataError::malformed(format!(
                "unsupported record shape: {}",
                json_kind(&other)
            ))),
        }
    }

    /// The record as a JSON object, with the normalized id and label merged
    /// over the original fields.
    pub fn to_value(&self) -> Value {
        let mut map = self.fields.clone();
        if !ID_KEYS.iter().any(|key| map.contains_key(*key)) {
            map.insert(
                "id".to_string(),
                serde_json::to_value(&self.id).unwrap_or(Value::Null),
            );
        }
        if !DISPLAY_KEYS.iter().any(|key| map.contains_key(*key)) {
            map.insert(
                "displayName".to_string(),
                Value::String(self.display_name.clone()),
            );
        }
        Value::Object(map)
    }
}

/// Normalize a batch of raw records, dropping malformed ones.
///
/// Returns the surviving items in their original order together with the
/// number of records that were dropped.
pub fn normalize_records(records: Vec<Value>) -> (Vec<Item>, usize) {
    let total = records.len();
    let items: Vec<Item> = records
        .into_iter()
        .filter_map(|record| Item::from_value(record).ok())
        .collect();
    let dropped = total - items.len();
    (items, dropped)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "empty string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn normalizes_uppercase_id_and_nome() {
        let item = Item::from_value(json!({"ID": 4, "nome": "Pátio B", "cor": "azul"})).unwrap();
        assert_eq!(item.id, ItemId::Number(4));
        assert_eq!(item.display_name, "Pátio B");
        assert_eq!(item.fields.get("cor"), Some(&json!("azul")));
    }

    #[test]
    fn bare_string_is_its_own_id() {
        let item = Item::from_value(json!("SP")).unwrap();
        assert_eq!(item.id, ItemId::from("SP"));
        assert_eq!(item.display_name, "SP");
    }

    #[test]
    fn missing_label_falls_back_to_id() {
        let item = Item::from_value(json!({"id": "X9"})).unwrap();
        assert_eq!(item.display_name, "X9");
    }

    #[test]
    fn missing_id_falls_back_to_label() {
        let item = Item::from_value(json!({"displayName": "Porto Seguro"})).unwrap();
        assert_eq!(item.id, ItemId::from("Porto Seguro"));
    }

    #[test]
    fn record_without_id_or_label_is_malformed() {
        let err = Item::from_value(json!({"cor": "azul"})).unwrap_err();
        assert!(matches!(err, RefDataError::MalformedRecord { .. }));
        assert!(Item::from_value(json!(null)).is_err());
        assert!(Item::from_value(json!("  ")).is_err());
        assert!(Item::from_value(json!({"id": "", "nome": ""})).is_err());
    }

    #[test]
    fn normalize_drops_malformed_and_keeps_order() {
        let (items, dropped) = normalize_records(vec![
            json!({"id": 1, "displayName": "A"}),
            json!({"foo": true}),
            json!({"id": 2, "displayName": "B"}),
            json!([1, 2]),
        ]);
        assert_eq!(dropped, 2);
        let names: Vec<_> = items.iter().map(|i| i.display_name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn numeric_and_text_ids_compare_equal() {
        assert_eq!(ItemId::Number(7), ItemId::from("7"));
        assert_ne!(ItemId::Number(7), ItemId::from("07"));
    }

    #[test]
    fn to_value_keeps_original_fields() {
        let item = Item::from_value(json!({"ID": 3, "nome": "Fiat"})).unwrap();
        let value = item.to_value();
        assert_eq!(value.get("ID"), Some(&json!(3)));
        assert!(value.get("id").is_none());
        let plain = Item::new(5, "Ford").to_value();
        assert_eq!(plain.get("displayName"), Some(&json!("Ford")));
    }

    proptest! {
        #[test]
        fn equal_ids_hash_equal(n in any::<i64>()) {
            use std::collections::hash_map::DefaultHasher;
            let hash = |id: &ItemId| {
                let mut h = DefaultHasher::new();
                id.hash(&mut h);
                h.finish()
            };
            let a = ItemId::Number(n);
            let b = ItemId::Text(n.to_string());
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(hash(&a), hash(&b));
        }

        #[test]
        fn normalized_count_never_exceeds_input(names in proptest::collection::vec(".{0,8}", 0..20)) {
            let records: Vec<Value> = names.iter().map(|n| json!({"nome": n})).collect();
            let (items, dropped) = normalize_records(records);
            prop_assert_eq!(items.len() + dropped, names.len());
        }
    }
}
