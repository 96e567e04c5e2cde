//! SINISTRO console entry point.

use crossterm::{
    event::{self, Event as CrosstermEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use sinistro_core::CollectionKey;
use sinistro_storage::{PersistentCache, ReferenceDataStore, StoreEvent};
use sinistro_tui::api_client::RestFetcher;
use sinistro_tui::config::TuiConfig;
use sinistro_tui::error::TuiError;
use sinistro_tui::events::TuiEvent;
use sinistro_tui::keys::{map_dropdown_key, map_key};
use sinistro_tui::logging::init_logging;
use sinistro_tui::state::{App, LoadRequest};
use sinistro_tui::views::render_view;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};

#[tokio::main]
async fn main() -> Result<(), TuiError> {
    let config = TuiConfig::load()?;
    init_logging(&config.log)?;

    let fetcher = RestFetcher::new(&config)?;
    let cache = Arc::new(PersistentCache::open(&config.cache));
    cache.init();
    let store = ReferenceDataStore::new(Arc::clone(&cache), Arc::new(fetcher), config.ttl_policy());
    let mut app = App::new(config, store);

    let mut terminal = setup_terminal()?;
    let _guard = TerminalGuard {};

    let (event_tx, mut event_rx) = mpsc::channel::<TuiEvent>(256);

    spawn_input_reader(event_tx.clone());
    spawn_store_listener(app.store.subscribe(), event_tx.clone());
    spawn_initialize(app.store.clone(), app.initial_keys());

    // Debounced searches are applied on ticks, so tick at least that often.
    let tick_rate = Duration::from_millis(app.config.refresh_interval_ms)
        .min(app.config.selection.search_debounce)
        .max(Duration::from_millis(10));
    let mut ticker = tokio::time::interval(tick_rate);

    loop {
        terminal.draw(|f| render_view(f, &app))?;

        tokio::select! {
            _ = ticker.tick() => {
                app.tick(Instant::now());
            }
            Some(event) = event_rx.recv() => {
                if handle_event(&mut app, event) {
                    break;
                }
            }
        }
    }

    if !cache.teardown() {
        tracing::warn!("cache flush failed on shutdown");
    }
    tracing::info!(stats = ?cache.stats(), "console exiting");
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, TuiError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = execute!(stdout, LeaveAlternateScreen);
    }
}

fn spawn_input_reader(sender: mpsc::Sender<TuiEvent>) {
    std::thread::spawn(move || loop {
        if let Ok(true) = event::poll(Duration::from_millis(200)) {
            if let Ok(evt) = event::read() {
                let sent = match evt {
                    CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => {
                        sender.blocking_send(TuiEvent::Input(key))
                    }
                    CrosstermEvent::Resize(width, height) => {
                        sender.blocking_send(TuiEvent::Resize { width, height })
                    }
                    _ => Ok(()),
                };
                if sent.is_err() {
                    break;
                }
            }
        }
    });
}

fn spawn_store_listener(mut events: broadcast::Receiver<StoreEvent>, sender: mpsc::Sender<TuiEvent>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if sender.send(TuiEvent::Store(event)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "store events lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

fn spawn_initialize(store: ReferenceDataStore, keys: Vec<CollectionKey>) {
    tokio::spawn(async move {
        let states = store.initialize(keys).await;
        let failed = states.iter().filter(|state| state.error.is_some()).count();
        tracing::info!(collections = states.len(), failed, "reference data warmed up");
    });
}

fn spawn_load(store: ReferenceDataStore, request: LoadRequest) {
    tokio::spawn(async move {
        store.load_with(&request.key, request.mode).await;
    });
}

fn handle_event(app: &mut App, event: TuiEvent) -> bool {
    match event {
        TuiEvent::Input(key) => {
            let action = if app.is_dropdown_open() {
                map_dropdown_key(key)
            } else {
                map_key(key)
            };
            if let Some(action) = action {
                let effects = app.handle_action(action, Instant::now());
                for request in effects.loads {
                    spawn_load(app.store.clone(), request);
                }
                return effects.quit;
            }
        }
        TuiEvent::Store(event) => app.apply_store_event(&event),
        TuiEvent::Resize { .. } => {}
    }
    false
}
