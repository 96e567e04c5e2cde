//! Event types for the console event loop.

use crossterm::event::KeyEvent;
use sinistro_storage::StoreEvent;

#[derive(Debug, Clone)]
pub enum TuiEvent {
    Input(KeyEvent),
    Resize { width: u16, height: u16 },
    Store(StoreEvent),
}
