// Keyboard event handling
//
// Translates raw key events into display commands. Stateless: applying a
// command is the job of `DisplayState`.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// What a key press asks the display to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ScrollDown,
    ScrollUp,
    CycleSort,
    TogglePause,
    /// Ask the owning application to shut down
    RequestShutdown,
}

/// Translate a key event into a command
///
/// # Key Bindings
/// - `Down` - Scroll down one row
/// - `Up` - Scroll up one row
/// - `s` - Cycle sort mode
/// - `p` - Pause / unpause
/// - `q`, `Ctrl+C` - Quit
///
/// Key release and repeat reports are ignored, as is every other key.
pub fn translate_key(key: KeyEvent) -> Option<Command> {
    if key.kind != KeyEventKind::Press {
        return None;
    }

    match key.code {
        KeyCode::Down => Some(Command::ScrollDown),
        KeyCode::Up => Some(Command::ScrollUp),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Command::RequestShutdown)
        }
        KeyCode::Char('q') => Some(Command::RequestShutdown),
        KeyCode::Char('s') => Some(Command::CycleSort),
        KeyCode::Char('p') => Some(Command::TogglePause),
        _ => None,
    }
}
