use std::sync::{Arc, Mutex};

use alacritty_terminal::event::{Event, EventListener};
use alacritty_terminal::grid::Dimensions;
use alacritty_terminal::term::{Config, Term};
use alacritty_terminal::vte::ansi;

use crate::grid::{convert_cursor_shape, CursorState, GridView};

/// Shared event state captured from the terminal.
#[derive(Default)]
struct EventState {
    title: Option<String>,
    replies: Vec<String>,
}

/// Event proxy that captures terminal events.
///
/// Must be `Clone` because `Term` requires `T: EventListener` and the event
/// loop may clone it. We use interior mutability via `Arc<Mutex<_>>`.
#[derive(Clone)]
pub struct EventProxy {
    state: Arc<Mutex<EventState>>,
}

impl EventProxy {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(EventState::default())),
        }
    }
}

impl EventListener for EventProxy {
    fn send_event(&self, event: Event) {
        let mut state = self.state.lock().unwrap();
        match event {
            Event::Title(title) => {
                state.title = Some(title);
            }
            Event::ResetTitle => {
                state.title = None;
            }
            Event::PtyWrite(data) => {
                state.replies.push(data);
            }
            _ => {}
        }
    }
}

/// Dimensions helper for creating / resizing the terminal.
struct TermSize {
    columns: usize,
    screen_lines: usize,
}

impl Dimensions for TermSize {
    fn total_lines(&self) -> usize {
        self.screen_lines
    }

    fn screen_lines(&self) -> usize {
        self.screen_lines
    }

    fn columns(&self) -> usize {
        self.columns
    }
}

/// A live terminal state engine for one session.
///
/// Feed raw PTY bytes in with [`Engine::feed`]; the engine runs them through
/// the VTE state machine and keeps grid, cursor, scrollback, and title state
/// current. The engine stays valid while its session is cached by the
/// multiplexer, whether or not it is the visible view.
pub struct Engine {
    term: Term<EventProxy>,
    parser: ansi::Processor,
    event_proxy: EventProxy,
}

impl Engine {
    /// Create a new engine with the given dimensions.
    ///
    /// Uses 10,000 lines of scrollback history.
    pub fn new(cols: u16, rows: u16) -> Self {
        let config = Config {
            scrolling_history: 10_000,
            ..Config::default()
        };

        let size = TermSize {
            columns: cols as usize,
            screen_lines: rows as usize,
        };

        let event_proxy = EventProxy::new();
        let term = Term::new(config, &size, event_proxy.clone());

        Self {
            term,
            parser: ansi::Processor::new(),
            event_proxy,
        }
    }

    /// Feed raw PTY output bytes into the engine.
    ///
    /// Parses the bytes through the VTE state machine and updates the grid
    /// accordingly. Safe to call with arbitrary chunk boundaries; the parser
    /// carries state across calls.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.parser.advance(&mut self.term, bytes);
    }

    /// Resize the engine's grid to new dimensions.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        let size = TermSize {
            columns: cols as usize,
            screen_lines: rows as usize,
        };
        self.term.resize(size);
    }

    /// Get a read-only view of the visible screen.
    pub fn grid(&self) -> GridView<'_> {
        GridView::new(&self.term)
    }

    /// Get the current cursor state (position, shape, visibility).
    pub fn cursor(&self) -> CursorState {
        let content = self.term.renderable_content();
        let cursor = &content.cursor;

        let visible = cursor.shape != alacritty_terminal::vte::ansi::CursorShape::Hidden;
        let shape = convert_cursor_shape(cursor.shape);

        CursorState {
            row: cursor.point.line.0 as u16,
            col: cursor.point.column.0 as u16,
            shape,
            visible,
        }
    }

    /// Get the current window title, if set via OSC escape sequences.
    pub fn title(&self) -> Option<String> {
        let state = self.event_proxy.state.lock().unwrap();
        state.title.clone()
    }

    /// Drain reply data the terminal needs written back to the PTY.
    ///
    /// Some escape sequences (e.g. device status reports) require the
    /// terminal to answer. The caller must forward these to the session's
    /// input or interactive programs that query the terminal will hang.
    pub fn take_replies(&mut self) -> Vec<String> {
        let mut state = self.event_proxy.state.lock().unwrap();
        std::mem::take(&mut state.replies)
    }
}
