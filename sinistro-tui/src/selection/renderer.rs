//! Batched rendering of large option lists.
//!
//! Rendering cost is bounded by the current batch, never by the collection:
//! a control opens with [`RendererConfig::initial_batch`] options, grows by
//! [`RendererConfig::batch_increment`] as the list is scrolled near its end,
//! and drops to zero when it closes. Filtering is independent of batching
//! and always runs over the full collection.

use std::time::{Duration, Instant};

use serde::Deserialize;
use sinistro_core::Item;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RendererConfig {
    pub initial_batch: usize,
    pub batch_increment: usize,
    #[serde(rename = "search_debounce_ms", deserialize_with = "millis::deserialize")]
    pub search_debounce: Duration,
    /// Distance from the end of the list, in scroll units, at which the
    /// next batch is rendered.
    pub load_more_threshold: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            initial_batch: 200,
            batch_increment: 200,
            search_debounce: Duration::from_millis(150),
            load_more_threshold: 48,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Scroll geometry of an option list, in a unit of the caller's choosing
/// (pixels, terminal rows).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollPosition {
    /// Distance scrolled from the top.
    pub offset: u32,
    /// Visible height.
    pub viewport: u32,
    /// Height of everything currently rendered.
    pub content: u32,
}

impl ScrollPosition {
    pub fn new(offset: u32, viewport: u32, content: u32) -> Self {
        Self {
            offset,
            viewport,
            content,
        }
    }

    /// Distance between the bottom of the viewport and the end of the list.
    pub fn remaining(&self) -> u32 {
        self.content
            .saturating_sub(self.offset.saturating_add(self.viewport))
    }
}

/// Case-insensitive substring filter over display names.
///
/// An empty or blank term keeps every option.
pub fn filter_options<'a>(items: &'a [Item], term: &str) -> Vec<&'a Item> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return items.iter().collect();
    }
    items
        .iter()
        .filter(|item| item.display_name.to_lowercase().contains(&needle))
        .collect()
}

#[derive(Debug, Clone)]
struct PendingSearch {
    term: String,
    since: Instant,
}

#[derive(Debug, Clone)]
pub struct IncrementalOptionRenderer {
    config: RendererConfig,
    open: bool,
    /// Upper bound on rendered options; the visible slice is capped by the
    /// filtered length as well.
    limit: usize,
    term: String,
    pending: Option<PendingSearch>,
}

impl IncrementalOptionRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self {
            config,
            open: false,
            limit: 0,
            term: String::new(),
            pending: None,
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Start rendering with the initial batch.
    pub fn open(&mut self) {
        self.open = true;
        self.limit = self.config.initial_batch;
    }

    /// Stop rendering and forget the search.
    pub fn close(&mut self) {
        self.open = false;
        self.limit = 0;
        self.term.clear();
        self.pending = None;
    }

    /// The search term currently applied to the options.
    pub fn search_term(&self) -> &str {
        &self.term
    }

    /// The term being typed, applied or not.
    pub fn typed_term(&self) -> &str {
        self.pending
            .as_ref()
            .map(|pending| pending.term.as_str())
            .unwrap_or(&self.term)
    }

    pub fn has_pending_search(&self) -> bool {
        self.pending.is_some()
    }

    /// Record a new search term. It is applied by [`Self::poll_search`] once
    /// it has been stable for the debounce window.
    pub fn set_search(&mut self, term: impl Into<String>, now: Instant) {
        self.pending = Some(PendingSearch {
            term: term.into(),
            since: now,
        });
    }

    /// Apply the pending search term if its debounce window has elapsed.
    ///
    /// Returns `true` when the applied term changed, in which case the batch
    /// restarts from the initial size.
    pub fn poll_search(&mut self, now: Instant) -> bool {
        let ready = self
            .pending
            .as_ref()
            .is_some_and(|pending| now.saturating_duration_since(pending.since) >= self.config.search_debounce);
        if !ready {
            return false;
        }
        match self.pending.take() {
            Some(pending) => self.apply_search(pending.term),
            None => false,
        }
    }

    /// Apply the pending search term immediately.
    pub fn flush_search(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => self.apply_search(pending.term),
            None => false,
        }
    }

    fn apply_search(&mut self, term: String) -> bool {
        if term == self.term {
            return false;
        }
        self.term = term;
        if self.open {
            self.limit = self.config.initial_batch;
        }
        true
    }

    /// Number of options rendered out of `filtered`.
    pub fn rendered_count(&self, filtered: usize) -> usize {
        if self.open {
            self.limit.min(filtered)
        } else {
            0
        }
    }

    /// Grow the batch when `position` is within the threshold of the end.
    ///
    /// Returns `true` when more options became visible. Never shrinks.
    pub fn on_scroll(&mut self, position: ScrollPosition, filtered: usize) -> bool {
        if !self.open || self.limit >= filtered {
            return false;
        }
        if position.remaining() > self.config.load_more_threshold {
            return false;
        }
        self.limit = self
            .limit
            .saturating_add(self.config.batch_increment)
            .min(filtered);
        true
    }

    /// The rendered prefix of `filtered`.
    pub fn visible<'s, T>(&self, filtered: &'s [T]) -> &'s [T] {
        &filtered[..self.rendered_count(filtered.len())]
    }

    /// React to `position`, then return the rendered prefix of `filtered`.
    pub fn render_options<'s, T>(&mut self, filtered: &'s [T], position: ScrollPosition) -> &'s [T] {
        self.on_scroll(position, filtered.len());
        self.visible(filtered)
    }
}

impl Default for IncrementalOptionRenderer {
    fn default() -> Self {
        Self::new(RendererConfig::default())
    }
}
