//! Application state: the intake form and its reference-data fields.

use std::time::Instant;

use sinistro_core::{CollectionKey, CollectionName};
use sinistro_storage::{
    CollectionState, Invalidation, LoadMode, MutationNotice, ReferenceDataStore, StoreEvent,
};

use crate::config::TuiConfig;
use crate::keys::Action;
use crate::notifications::{Notification, NotificationLevel};
use crate::selection::{resolve_selection, RenderableValue, SelectionCandidate, SelectionControl};
use crate::theme::Theme;

/// Option rows visible in an open dropdown.
pub const DROPDOWN_ROWS: usize = 10;

const MAX_NOTIFICATIONS: usize = 50;

/// Index of the state field; the city field is scoped by its value.
pub const STATE_FIELD: usize = 0;
pub const CITY_FIELD: usize = 1;

#[derive(Debug, Clone)]
pub struct FormField {
    pub control: SelectionControl,
    /// Value held by the form. Never rendered directly: it is reconciled
    /// with the control's options first.
    pub value: SelectionCandidate,
}

/// A load the event loop must run on the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub key: CollectionKey,
    pub mode: LoadMode,
}

impl LoadRequest {
    pub fn normal(key: CollectionKey) -> Self {
        Self {
            key,
            mode: LoadMode::Normal,
        }
    }

    pub fn forced(key: CollectionKey) -> Self {
        Self {
            key,
            mode: LoadMode::Force,
        }
    }
}

/// What handling an action asks of the event loop.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Effects {
    pub quit: bool,
    pub loads: Vec<LoadRequest>,
}

impl Effects {
    fn load(request: LoadRequest) -> Self {
        Self {
            quit: false,
            loads: vec![request],
        }
    }
}

pub struct App {
    pub config: TuiConfig,
    pub theme: Theme,
    pub store: ReferenceDataStore,
    pub fields: Vec<FormField>,
    pub focus: usize,
    pub notifications: Vec<Notification>,
    pub show_help: bool,
}

impl App {
    pub fn new(config: TuiConfig, store: ReferenceDataStore) -> Self {
        let field = |label: &str, key: CollectionKey| FormField {
            control: SelectionControl::new(label, key, config.selection.clone(), DROPDOWN_ROWS),
            value: SelectionCandidate::Empty,
        };
        let fields = vec![
            field("Estado", CollectionKey::new(CollectionName::States)),
            field("Cidade", CollectionKey::new(CollectionName::Cities)),
            field("Marca", CollectionKey::new(CollectionName::Brands)),
            field("Seguradora", CollectionKey::new(CollectionName::Insurers)),
            field("Posição", CollectionKey::new(CollectionName::Positions)),
            field("Colaborador", CollectionKey::new(CollectionName::Collaborators)),
            field("Prestador", CollectionKey::new(CollectionName::Providers)),
        ];
        Self {
            config,
            theme: Theme::console(),
            store,
            fields,
            focus: 0,
            notifications: Vec::new(),
            show_help: false,
        }
    }

    /// Collections warmed up at startup.
    pub fn initial_keys(&self) -> Vec<CollectionKey> {
        CollectionName::unscoped().map(CollectionKey::new).collect()
    }

    pub fn focused(&self) -> &FormField {
        &self.fields[self.focus]
    }

    pub fn field_state(&self, index: usize) -> CollectionState {
        self.store.state(self.fields[index].control.key())
    }

    pub fn is_dropdown_open(&self) -> bool {
        self.focused().control.is_open()
    }

    pub fn notify(&mut self, level: NotificationLevel, message: impl Into<String>) {
        self.notifications.push(Notification::new(level, message));
        if self.notifications.len() > MAX_NOTIFICATIONS {
            let excess = self.notifications.len() - MAX_NOTIFICATIONS;
            self.notifications.drain(..excess);
        }
    }

    pub fn handle_action(&mut self, action: Action, now: Instant) -> Effects {
        if self.is_dropdown_open() {
            return self.handle_dropdown_action(action, now);
        }
        let key = self.focused().control.key().clone();
        match action {
            Action::Quit => {
                return Effects {
                    quit: true,
                    loads: Vec::new(),
                }
            }
            Action::NextField => self.focus = (self.focus + 1) % self.fields.len(),
            Action::PrevField => {
                self.focus = (self.focus + self.fields.len() - 1) % self.fields.len()
            }
            Action::Open => return self.open_focused(),
            Action::Clear => {
                self.fields[self.focus].value = SelectionCandidate::Empty;
                if self.focus == STATE_FIELD {
                    return self.sync_city_scope();
                }
            }
            Action::Reload if key.is_complete() => return Effects::load(LoadRequest::normal(key)),
            Action::ForceReload if key.is_complete() => {
                return Effects::load(LoadRequest::forced(key))
            }
            Action::Reload | Action::ForceReload => {
                self.notify(NotificationLevel::Warning, "Select a state first.");
            }
            Action::Invalidate => self.store.invalidate(Invalidation::Collection(key.name())),
            Action::InvalidateAll => self.store.notify_mutation(MutationNotice::unknown()),
            Action::OpenHelp => self.show_help = !self.show_help,
            Action::Cancel => self.show_help = false,
            Action::MoveUp
            | Action::MoveDown
            | Action::PageUp
            | Action::PageDown
            | Action::Input(_)
            | Action::Backspace
            | Action::Confirm => {}
        }
        Effects::default()
    }

    fn open_focused(&mut self) -> Effects {
        let key = self.focused().control.key().clone();
        if !key.is_complete() {
            self.notify(NotificationLevel::Warning, "Select a state first.");
            return Effects::default();
        }
        let state = self.store.state(&key);
        if !state.loading && !state.is_empty() {
            self.fields[self.focus].control.open();
        }
        if !state.loading && !self.store.is_loaded(&key) {
            return Effects::load(LoadRequest::normal(key));
        }
        Effects::default()
    }

    fn handle_dropdown_action(&mut self, action: Action, now: Instant) -> Effects {
        let state = self.field_state(self.focus);
        let page = DROPDOWN_ROWS as isize;
        let control = &mut self.fields[self.focus].control;
        match action {
            Action::MoveUp => control.move_cursor(-1, &state),
            Action::MoveDown => control.move_cursor(1, &state),
            Action::PageUp => control.move_cursor(-page, &state),
            Action::PageDown => control.move_cursor(page, &state),
            Action::Input(c) => control.push_char(c, now),
            Action::Backspace => control.pop_char(now),
            Action::Cancel => control.close(),
            Action::Confirm => {
                if let Some(candidate) = control.confirm(&state) {
                    self.fields[self.focus].value = candidate;
                    if self.focus == STATE_FIELD {
                        return self.sync_city_scope();
                    }
                }
            }
            _ => {}
        }
        Effects::default()
    }

    /// Point the city field at the selected state. Returns the load for the
    /// new scope, if any.
    pub fn sync_city_scope(&mut self) -> Effects {
        let states = self.field_state(STATE_FIELD);
        let parent = match resolve_selection(&self.fields[STATE_FIELD].value, &states) {
            RenderableValue::Loading => return Effects::default(),
            RenderableValue::Selected(item) => Some(item.id.to_string()),
            RenderableValue::NoOptions | RenderableValue::Unselected => None,
        };
        let city = &mut self.fields[CITY_FIELD].control;
        if !city.rescope(parent.as_deref()) {
            return Effects::default();
        }
        let key = city.key().clone();
        if key.is_complete() {
            Effects::load(LoadRequest::normal(key))
        } else {
            Effects::default()
        }
    }

    /// Apply debounced searches. Returns `true` when a redraw is due.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.fields
            .iter_mut()
            .fold(false, |changed, field| field.control.tick(now) || changed)
    }

    pub fn apply_store_event(&mut self, event: &StoreEvent) {
        match event {
            StoreEvent::Failed(key, error) => {
                self.notify(
                    NotificationLevel::Error,
                    format!("{key}: {error} (r to retry)"),
                );
            }
            StoreEvent::Invalidated(Invalidation::All) => {
                self.close_where(|_| true);
                self.notify(NotificationLevel::Info, "All reference data invalidated.");
            }
            StoreEvent::Invalidated(Invalidation::Collection(name)) => {
                let name = *name;
                self.close_where(|key| key.name() == name);
                self.notify(
                    NotificationLevel::Info,
                    format!("{} invalidated; reloads on next use.", name.slug()),
                );
            }
            StoreEvent::Loading(_) | StoreEvent::Loaded(_) => {}
        }
    }

    fn close_where(&mut self, bound_to: impl Fn(&CollectionKey) -> bool) {
        for field in &mut self.fields {
            if bound_to(field.control.key()) {
                field.control.close();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sinistro_core::ItemId;
    use sinistro_test_utils::fixtures::{memory_store, scripted_fetcher};
    use std::sync::Arc;

    fn app() -> (App, Arc<sinistro_test_utils::MockFetcher>) {
        let fetcher = Arc::new(scripted_fetcher());
        let store = memory_store(Arc::clone(&fetcher));
        (App::new(crate::test_support::config(), store), fetcher)
    }

    async fn run(app: &App, effects: &Effects) {
        for request in &effects.loads {
            app.store.load_with(&request.key, request.mode).await;
        }
    }

    #[tokio::test]
    async fn opening_an_unloaded_field_requests_a_load() {
        let (mut app, fetcher) = app();
        app.focus = 2;
        let effects = app.handle_action(Action::Open, Instant::now());
        assert_eq!(
            effects.loads,
            vec![LoadRequest::normal(CollectionKey::new(CollectionName::Brands))]
        );
        run(&app, &effects).await;
        assert_eq!(fetcher.call_count(), 1);

        // Loaded now: opening shows the options without another load.
        let effects = app.handle_action(Action::Open, Instant::now());
        assert!(effects.loads.is_empty());
        assert!(app.is_dropdown_open());
    }

    #[tokio::test]
    async fn choosing_a_state_scopes_the_city_field() {
        let (mut app, fetcher) = app();
        let states = CollectionKey::new(CollectionName::States);
        app.store.load(&states).await;

        app.handle_action(Action::Open, Instant::now());
        let effects = app.handle_action(Action::Confirm, Instant::now());
        assert_eq!(app.fields[STATE_FIELD].value, SelectionCandidate::Id(ItemId::from("SP")));

        let cities = CollectionKey::scoped(CollectionName::Cities, "SP");
        assert_eq!(effects.loads, vec![LoadRequest::normal(cities.clone())]);
        run(&app, &effects).await;
        assert_eq!(fetcher.calls_for(&cities), 1);
        assert_eq!(app.field_state(CITY_FIELD).len(), 3);
    }

    #[tokio::test]
    async fn city_without_state_is_not_loaded() {
        let (mut app, fetcher) = app();
        app.focus = CITY_FIELD;
        let effects = app.handle_action(Action::Open, Instant::now());
        assert!(effects.loads.is_empty());
        assert!(!app.is_dropdown_open());
        assert_eq!(fetcher.call_count(), 0);
        assert_eq!(app.notifications.len(), 1);
    }

    #[tokio::test]
    async fn stale_value_is_not_rendered_after_rescoping() {
        let (mut app, _fetcher) = app();
        app.store.load(&CollectionKey::new(CollectionName::States)).await;
        app.fields[STATE_FIELD].value = SelectionCandidate::Text("SP".into());
        let effects = app.sync_city_scope();
        run(&app, &effects).await;

        // A city of SP stays held while the scope moves to RJ, which has no
        // scripted cities.
        app.fields[CITY_FIELD].value = SelectionCandidate::Id(ItemId::Number(3550308));
        app.fields[STATE_FIELD].value = SelectionCandidate::Text("RJ".into());
        let effects = app.sync_city_scope();
        run(&app, &effects).await;

        let cities = app.field_state(CITY_FIELD);
        let shown = resolve_selection(&app.fields[CITY_FIELD].value, &cities);
        assert_eq!(shown, RenderableValue::NoOptions);
    }

    #[tokio::test]
    async fn invalidate_all_closes_controls_and_unloads() {
        let (mut app, _fetcher) = app();
        app.focus = 2;
        let effects = app.handle_action(Action::Open, Instant::now());
        run(&app, &effects).await;
        app.handle_action(Action::Open, Instant::now());
        assert!(app.is_dropdown_open());

        // Esc closes the list first; invalidation happens from the form.
        app.handle_action(Action::Cancel, Instant::now());
        app.handle_action(Action::InvalidateAll, Instant::now());
        app.apply_store_event(&StoreEvent::Invalidated(Invalidation::All));
        assert!(!app.store.is_loaded(&CollectionKey::new(CollectionName::Brands)));
        assert!(!app.is_dropdown_open());
    }

    #[test]
    fn notifications_are_capped() {
        let store = memory_store(Arc::new(scripted_fetcher()));
        let mut app = App::new(crate::test_support::config(), store);
        for n in 0..(MAX_NOTIFICATIONS + 5) {
            app.notify(NotificationLevel::Info, format!("n{n}"));
        }
        assert_eq!(app.notifications.len(), MAX_NOTIFICATIONS);
        assert_eq!(app.notifications[0].message, "n5");
    }

    #[tokio::test]
    async fn collection_invalidation_closes_only_its_controls() {
        let (mut app, _fetcher) = app();
        app.store.load(&CollectionKey::new(CollectionName::Brands)).await;
        app.store.load(&CollectionKey::new(CollectionName::Positions)).await;
        app.fields[2].control.open();
        app.fields[4].control.open();

        app.apply_store_event(&StoreEvent::Invalidated(Invalidation::Collection(
            CollectionName::Positions,
        )));

        assert!(app.fields[2].control.is_open());
        assert!(!app.fields[4].control.is_open());
    }
}
