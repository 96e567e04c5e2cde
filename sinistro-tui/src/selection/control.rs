//! A single-select control bound to one reference collection.

use std::time::Instant;

use sinistro_core::{CollectionKey, Item, RefDataError};
use sinistro_storage::CollectionState;

use super::guard::{resolve_selection, RenderableValue, SelectionCandidate};
use super::renderer::{filter_options, IncrementalOptionRenderer, RendererConfig, ScrollPosition};

/// Everything a widget needs to draw a control for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlView<'a> {
    pub value: RenderableValue<'a>,
    /// Rendered options, already filtered and batched.
    pub options: Vec<&'a Item>,
    /// Options matching the search across the whole collection.
    pub matches: usize,
    pub cursor: usize,
    /// First option row inside the viewport.
    pub offset: usize,
    pub open: bool,
    pub search: &'a str,
    pub loading: bool,
    pub disabled: bool,
    pub error: Option<&'a RefDataError>,
}

#[derive(Debug, Clone)]
pub struct SelectionControl {
    label: String,
    key: CollectionKey,
    renderer: IncrementalOptionRenderer,
    cursor: usize,
    offset: usize,
    viewport_rows: usize,
}

impl SelectionControl {
    pub fn new(
        label: impl Into<String>,
        key: CollectionKey,
        config: RendererConfig,
        viewport_rows: usize,
    ) -> Self {
        Self {
            label: label.into(),
            key,
            renderer: IncrementalOptionRenderer::new(config),
            cursor: 0,
            offset: 0,
            viewport_rows: viewport_rows.max(1),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn key(&self) -> &CollectionKey {
        &self.key
    }

    /// Point a scoped control at another parent. Returns `true` if the key
    /// changed; the control closes in that case.
    pub fn rescope(&mut self, parent: Option<&str>) -> bool {
        let key = match parent {
            Some(parent) => CollectionKey::scoped(self.key.name(), parent),
            None => CollectionKey::new(self.key.name()),
        };
        if key == self.key {
            return false;
        }
        self.key = key;
        self.close();
        true
    }

    pub fn is_open(&self) -> bool {
        self.renderer.is_open()
    }

    pub fn open(&mut self) {
        self.renderer.open();
        self.cursor = 0;
        self.offset = 0;
    }

    pub fn close(&mut self) {
        self.renderer.close();
        self.cursor = 0;
        self.offset = 0;
    }

    pub fn typed_term(&self) -> &str {
        self.renderer.typed_term()
    }

    pub fn push_char(&mut self, c: char, now: Instant) {
        let mut term = self.renderer.typed_term().to_string();
        term.push(c);
        self.renderer.set_search(term, now);
    }

    pub fn pop_char(&mut self, now: Instant) {
        let mut term = self.renderer.typed_term().to_string();
        if term.pop().is_some() {
            self.renderer.set_search(term, now);
        }
    }

    /// Apply a debounced search. Returns `true` when the options changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let changed = self.renderer.poll_search(now);
        if changed {
            self.cursor = 0;
            self.offset = 0;
        }
        changed
    }

    /// Move the highlight by `delta` rows, rendering the next batch when the
    /// viewport nears the end of the rendered options.
    pub fn move_cursor(&mut self, delta: isize, state: &CollectionState) {
        if !self.is_open() || state.loading {
            return;
        }
        let filtered = filter_options(&state.items, self.renderer.search_term()).len();
        let rendered = self.renderer.rendered_count(filtered);
        if rendered == 0 {
            return;
        }
        self.cursor = self
            .cursor
            .saturating_add_signed(delta)
            .min(rendered - 1);
        if self.cursor < self.offset {
            self.offset = self.cursor;
        } else if self.cursor >= self.offset + self.viewport_rows {
            self.offset = self.cursor + 1 - self.viewport_rows;
        }
        let position = ScrollPosition::new(
            to_u32(self.offset),
            to_u32(self.viewport_rows),
            to_u32(rendered),
        );
        self.renderer.on_scroll(position, filtered);
    }

    /// The option under the highlight.
    pub fn highlighted<'a>(&self, state: &'a CollectionState) -> Option<&'a Item> {
        if !self.is_open() || state.loading {
            return None;
        }
        let filtered = filter_options(&state.items, self.renderer.search_term());
        self.renderer
            .visible(&filtered)
            .get(self.cursor)
            .copied()
    }

    /// Pick the highlighted option and close.
    ///
    /// A search still waiting on its debounce is applied instead: the list
    /// changes under the cursor, so nothing is picked until the user sees
    /// the new options.
    pub fn confirm(&mut self, state: &CollectionState) -> Option<SelectionCandidate> {
        if self.renderer.flush_search() {
            self.cursor = 0;
            self.offset = 0;
            return None;
        }
        let chosen = self.highlighted(state).map(SelectionCandidate::from);
        if chosen.is_some() {
            self.close();
        }
        chosen
    }

    pub fn view<'a>(
        &'a self,
        state: &'a CollectionState,
        candidate: &SelectionCandidate,
    ) -> ControlView<'a> {
        let value = resolve_selection(candidate, state);
        let filtered = if state.loading {
            Vec::new()
        } else {
            filter_options(&state.items, self.renderer.search_term())
        };
        let matches = filtered.len();
        let options = self.renderer.visible(&filtered).to_vec();
        ControlView {
            value,
            options,
            matches,
            cursor: self.cursor,
            offset: self.offset,
            open: self.is_open(),
            search: self.renderer.typed_term(),
            loading: state.loading,
            disabled: value.is_disabled(),
            error: state.error.as_ref(),
        }
    }
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
