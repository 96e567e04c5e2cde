//! Keybinding definitions for the console.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    NextField,
    PrevField,
    /// Open the focused control's option list.
    Open,
    /// Drop the focused field's value.
    Clear,
    /// Load the focused collection, honoring the cache.
    Reload,
    /// Fetch the focused collection regardless of TTL.
    ForceReload,
    /// Invalidate the focused collection.
    Invalidate,
    /// Invalidate every collection, as after an unattributed mutation.
    InvalidateAll,
    OpenHelp,
    MoveUp,
    MoveDown,
    PageUp,
    PageDown,
    Input(char),
    Backspace,
    Confirm,
    Cancel,
}

/// Keys while moving between fields.
pub fn map_key(event: KeyEvent) -> Option<Action> {
    let KeyEvent { code, modifiers, .. } = event;

    if modifiers.contains(KeyModifiers::CONTROL) {
        return match code {
            KeyCode::Char('c') => Some(Action::Quit),
            KeyCode::Char('r') => Some(Action::ForceReload),
            _ => None,
        };
    }

    match code {
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char('?') => Some(Action::OpenHelp),
        KeyCode::Char('r') => Some(Action::Reload),
        KeyCode::Char('R') => Some(Action::ForceReload),
        KeyCode::Char('i') => Some(Action::Invalidate),
        KeyCode::Char('I') => Some(Action::InvalidateAll),
        KeyCode::Char('x') | KeyCode::Delete | KeyCode::Backspace => Some(Action::Clear),
        KeyCode::Enter | KeyCode::Char(' ') => Some(Action::Open),
        KeyCode::Esc => Some(Action::Cancel),
        KeyCode::Tab | KeyCode::Down | KeyCode::Char('j') => Some(Action::NextField),
        KeyCode::BackTab | KeyCode::Up | KeyCode::Char('k') => Some(Action::PrevField),
        _ => None,
    }
}

/// Keys while an option list is open. Printable characters feed the search.
pub fn map_dropdown_key(event: KeyEvent) -> Option<Action> {
    let KeyEvent { code, modifiers, .. } = event;

    if modifiers.contains(KeyModifiers::CONTROL) {
        return match code {
            KeyCode::Char('c') => Some(Action::Cancel),
            KeyCode::Char('n') => Some(Action::MoveDown),
            KeyCode::Char('p') => Some(Action::MoveUp),
            _ => None,
        };
    }

    match code {
        KeyCode::Esc => Some(Action::Cancel),
        KeyCode::Enter => Some(Action::Confirm),
        KeyCode::Up => Some(Action::MoveUp),
        KeyCode::Down => Some(Action::MoveDown),
        KeyCode::PageUp => Some(Action::PageUp),
        KeyCode::PageDown => Some(Action::PageDown),
        KeyCode::Backspace => Some(Action::Backspace),
        KeyCode::Char(c) => Some(Action::Input(c)),
        _ => None,
    }
}
