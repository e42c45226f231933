//! Key bindings. Holes are numbered along the top keyboard row: 1-9, 0, -, =.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Keys for holes 0.. in board order.
pub const HOLE_KEYS: [char; 12] = ['1', '2', '3', '4', '5', '6', '7', '8', '9', '0', '-', '='];

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Pet(usize),
    /// Start the level, or take the default choice of a dialog.
    Confirm,
    Cancel,
    Reset,
    Ranking,
    Quit,
    None,
}

pub fn hole_for_key(c: char) -> Option<usize> {
    HOLE_KEYS.iter().position(|k| *k == c)
}

/// Map key event to game action.
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    if modifiers == KeyModifiers::CONTROL && code == KeyCode::Char('c') {
        return Action::Quit;
    }
    let no_mod = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    if !no_mod {
        return Action::None;
    }
    match code {
        KeyCode::Char(c) if hole_for_key(c).is_some() => hole_for_key(c).map_or(Action::None, Action::Pet),
        KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Char('s') => Action::Confirm,
        KeyCode::Char('c') => Action::Cancel,
        KeyCode::Char('r') => Action::Reset,
        KeyCode::Char('k') | KeyCode::Tab => Action::Ranking,
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        _ => Action::None,
    }
}
