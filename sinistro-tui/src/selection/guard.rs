//! Selection reconciliation.
//!
//! A form holds its selected value independently of the option list, and
//! the two arrive at different times. [`resolve_selection`] decides what a
//! control may show for a given pair, so that a value outside the current
//! options is never rendered.

use serde_json::{Map, Value};
use sinistro_core::{display_name_of, Item, ItemId};
use sinistro_storage::CollectionState;

/// The value a form currently holds for a control.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SelectionCandidate {
    #[default]
    Empty,
    /// A bare identifier.
    Id(ItemId),
    /// A bare string, matched against display names.
    Text(String),
    /// A structured record as the form stored it.
    Record(Value),
}

impl SelectionCandidate {
    /// Classify a JSON value held by a form.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Self::Empty,
            Value::String(s) if s.trim().is_empty() => Self::Empty,
            Value::String(s) => Self::Text(s),
            Value::Number(n) => match n.as_i64() {
                Some(id) => Self::Id(ItemId::Number(id)),
                None => Self::Record(Value::Number(n)),
            },
            other => Self::Record(other),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Whether `item` is the option this candidate refers to.
    ///
    /// Only the first rule applicable to the candidate's shape is tried:
    /// identifier equality, then display-name equality, then structural
    /// equality.
    pub fn matches(&self, item: &Item) -> bool {
        match self {
            Self::Empty => false,
            Self::Id(id) => *id == item.id,
            Self::Text(text) => *text == item.display_name,
            Self::Record(Value::Object(map)) => match_record(map, item),
            Self::Record(value) => *value == item.to_value(),
        }
    }
}

fn match_record(map: &Map<String, Value>, item: &Item) -> bool {
    if let Some(id) = ItemId::from_object(map) {
        return id == item.id;
    }
    if let Some(name) = display_name_of(map) {
        return name == item.display_name;
    }
    *map == item.fields || Value::Object(map.clone()) == item.to_value()
}

impl From<&Item> for SelectionCandidate {
    fn from(item: &Item) -> Self {
        Self::Id(item.id.clone())
    }
}

impl From<ItemId> for SelectionCandidate {
    fn from(id: ItemId) -> Self {
        Self::Id(id)
    }
}

/// What a single-select control may display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderableValue<'a> {
    /// The collection is loading; the candidate is not consulted.
    Loading,
    /// The collection is empty and idle; the control is disabled.
    NoOptions,
    /// Nothing selected, or the candidate is not among the options.
    Unselected,
    Selected(&'a Item),
}

impl<'a> RenderableValue<'a> {
    pub fn selected(&self) -> Option<&'a Item> {
        match *self {
            Self::Selected(item) => Some(item),
            _ => None,
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Loading | Self::NoOptions)
    }

    /// Text shown in the closed control.
    pub fn label(&self) -> &'a str {
        match *self {
            Self::Loading => "Loading…",
            Self::NoOptions => "No options",
            Self::Unselected => "",
            Self::Selected(item) => item.display_name.as_str(),
        }
    }
}

/// What a multi-select control may display.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderableSelection<'a> {
    Loading,
    NoOptions,
    /// Matched options in candidate order. May be empty.
    Selected(Vec<&'a Item>),
}

/// First option `candidate` refers to, if any.
pub fn find_option<'a>(candidate: &SelectionCandidate, items: &'a [Item]) -> Option<&'a Item> {
    items.iter().find(|item| candidate.matches(item))
}

/// Reconcile a single-select candidate with its collection.
///
/// A loading collection always yields [`RenderableValue::Loading`], even
/// when it still holds items from an earlier load.
pub fn resolve_selection<'a>(
    candidate: &SelectionCandidate,
    state: &'a CollectionState,
) -> RenderableValue<'a> {
    if state.loading {
        return RenderableValue::Loading;
    }
    if state.items.is_empty() {
        return RenderableValue::NoOptions;
    }
    match find_option(candidate, &state.items) {
        Some(item) => RenderableValue::Selected(item),
        None => RenderableValue::Unselected,
    }
}

/// Reconcile a multi-select candidate, keeping the members that resolve on
/// their own, in order.
pub fn resolve_many<'a>(
    candidates: &[SelectionCandidate],
    state: &'a CollectionState,
) -> RenderableSelection<'a> {
    if state.loading {
        return RenderableSelection::Loading;
    }
    if state.items.is_empty() {
        return RenderableSelection::NoOptions;
    }
    RenderableSelection::Selected(
        candidates
            .iter()
            .filter_map(|candidate| find_option(candidate, &state.items))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn options() -> CollectionState {
        CollectionState::loaded(vec![Item::new(1, "Pátio A"), Item::new(2, "Pátio B")], Utc::now())
    }

    #[test]
    fn unknown_id_resolves_to_unselected() {
        let state = options();
        let candidate = SelectionCandidate::from_value(json!({"id": 99}));
        assert_eq!(resolve_selection(&candidate, &state), RenderableValue::Unselected);
    }

    #[test]
    fn id_matches_across_representations() {
        let state = options();
        let candidate = SelectionCandidate::from_value(json!({"ID": "2"}));
        assert_eq!(
            resolve_selection(&candidate, &state).selected().map(|i| i.display_name.as_str()),
            Some("Pátio B")
        );
    }

    #[test]
    fn bare_string_matches_display_name() {
        let state = options();
        let candidate = SelectionCandidate::from_value(json!("Pátio A"));
        assert!(matches!(resolve_selection(&candidate, &state), RenderableValue::Selected(item) if item.id == ItemId::Number(1)));
    }

    #[test]
    fn id_rule_stops_before_display_name() {
        let state = options();
        // The label matches option 1 but the id names a missing option.
        let candidate = SelectionCandidate::from_value(json!({"id": 99, "nome": "Pátio A"}));
        assert_eq!(resolve_selection(&candidate, &state), RenderableValue::Unselected);
    }

    #[test]
    fn structural_rule_for_shapeless_records() {
        let mut item = Item::new(5, "Guincho");
        item.fields.insert("tipo".into(), json!("reboque"));
        let state = CollectionState::loaded(vec![item], Utc::now());

        let same = SelectionCandidate::Record(json!({"tipo": "reboque"}));
        let other = SelectionCandidate::Record(json!({"tipo": "chaveiro"}));
        assert!(resolve_selection(&same, &state).selected().is_some());
        assert_eq!(resolve_selection(&other, &state), RenderableValue::Unselected);
    }

    #[test]
    fn loading_wins_over_items_and_candidate() {
        let mut state = options();
        state.loading = true;
        let candidate = SelectionCandidate::Id(ItemId::Number(1));
        assert_eq!(resolve_selection(&candidate, &state), RenderableValue::Loading);
        assert_eq!(resolve_many(&[candidate], &state), RenderableSelection::Loading);
    }

    #[test]
    fn empty_idle_collection_has_no_options() {
        let state = CollectionState::empty();
        let candidate = SelectionCandidate::Id(ItemId::Number(1));
        let value = resolve_selection(&candidate, &state);
        assert_eq!(value, RenderableValue::NoOptions);
        assert!(value.is_disabled());
    }

    #[test]
    fn multi_select_keeps_matches_in_order() {
        let state = options();
        let candidates = vec![
            SelectionCandidate::Id(ItemId::Number(2)),
            SelectionCandidate::Id(ItemId::Number(99)),
            SelectionCandidate::Text("Pátio A".into()),
        ];
        let RenderableSelection::Selected(items) = resolve_many(&candidates, &state) else {
            panic!("expected a selection");
        };
        let names: Vec<_> = items.iter().map(|i| i.display_name.as_str()).collect();
        assert_eq!(names, vec!["Pátio B", "Pátio A"]);
    }

    #[test]
    fn candidate_classification() {
        assert_eq!(SelectionCandidate::from_value(Value::Null), SelectionCandidate::Empty);
        assert_eq!(SelectionCandidate::from_value(json!("  ")), SelectionCandidate::Empty);
        assert_eq!(
            SelectionCandidate::from_value(json!(7)),
            SelectionCandidate::Id(ItemId::Number(7))
        );
        assert!(matches!(
            SelectionCandidate::from_value(json!(1.5)),
            SelectionCandidate::Record(_)
        ));
    }
}
