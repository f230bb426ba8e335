//! UI-side terminal multiplexer: one cached rendering engine per session.
//!
//! Engines are created lazily on first view, seeded once from the host's raw
//! buffer, and then kept current purely from the live event stream. Hiding a
//! session detaches its engine but keeps it cached and fed; an engine is
//! disposed only when its session ends or is explicitly killed.

use std::collections::HashMap;
use std::sync::Arc;

use hatch_pty::{RegistryError, SessionEvent, SessionId, SessionRegistry};
use hatch_vt::Engine;

use crate::fit::{fit, FontMetrics, Viewport};

/// Dimensions used when the viewport cannot be fitted yet.
const DEFAULT_COLS: u16 = 80;
const DEFAULT_ROWS: u16 = 24;

/// Dimmed notice appended when the shell process ends.
const EXIT_NOTICE: &str = "\r\n\x1b[38;5;245m[session ended]\x1b[0m\r\n";

struct TerminalInstance {
    engine: Engine,
    attached: bool,
}

pub struct TerminalMux {
    registry: Arc<SessionRegistry>,
    metrics: FontMetrics,
    instances: HashMap<SessionId, TerminalInstance>,
    visible: Option<SessionId>,
}

impl TerminalMux {
    pub fn new(registry: Arc<SessionRegistry>, metrics: FontMetrics) -> Self {
        Self {
            registry,
            metrics,
            instances: HashMap::new(),
            visible: None,
        }
    }

    /// Make `id` the visible session.
    ///
    /// A cached instance is reattached as-is: its engine consumed every
    /// event while detached, so the current screen and scrollback are
    /// already correct and nothing is replayed. An uncached instance gets a
    /// fresh engine seeded exactly once from the host's buffered output.
    pub fn show(&mut self, id: SessionId, viewport: Viewport) -> Result<(), RegistryError> {
        if let Some(prev) = self.visible.take() {
            if prev != id {
                if let Some(instance) = self.instances.get_mut(&prev) {
                    instance.attached = false;
                }
            }
        }

        let dims = fit(viewport, self.metrics);
        let registry = Arc::clone(&self.registry);

        if let Some(instance) = self.instances.get_mut(&id) {
            instance.attached = true;
            if let Some((cols, rows)) = dims {
                instance.engine.resize(cols, rows);
                // A failed refit never blocks reattachment; the instance
                // must not end up attached but invisible.
                if let Err(e) = registry.resize(id, cols, rows) {
                    log::warn!("refit of session {id} failed: {e}");
                }
            }
            self.visible = Some(id);
            return Ok(());
        }

        let snapshot = registry.get(id)?;
        let (cols, rows) = dims.unwrap_or((DEFAULT_COLS, DEFAULT_ROWS));
        let mut engine = Engine::new(cols, rows);
        engine.feed(snapshot.recent_output.as_bytes());
        route_replies(&registry, id, &mut engine);
        if dims.is_some() {
            registry.resize(id, cols, rows)?;
        }

        self.instances.insert(
            id,
            TerminalInstance {
                engine,
                attached: true,
            },
        );
        self.visible = Some(id);
        Ok(())
    }

    /// Detach the visible session without disposing anything. The instance
    /// stays cached and keeps consuming events.
    pub fn hide(&mut self) {
        if let Some(id) = self.visible.take() {
            if let Some(instance) = self.instances.get_mut(&id) {
                instance.attached = false;
            }
        }
    }

    /// Dispose the cached instance for `id`. Only session end and explicit
    /// kill call this; switching views never does.
    pub fn evict(&mut self, id: SessionId) -> bool {
        if self.visible == Some(id) {
            self.visible = None;
        }
        self.instances.remove(&id).is_some()
    }

    /// Kill the session and drop its instance.
    pub fn kill(&mut self, id: SessionId) -> bool {
        self.evict(id);
        self.registry.kill(id)
    }

    /// Consume one session event from the host's fan-out.
    pub fn handle_event(&mut self, id: SessionId, event: &SessionEvent) {
        match event {
            SessionEvent::Data(chunk) => {
                let registry = Arc::clone(&self.registry);
                // Events for sessions never shown here carry no instance;
                // they are dropped, not cached speculatively.
                if let Some(instance) = self.instances.get_mut(&id) {
                    instance.engine.feed(chunk);
                    route_replies(&registry, id, &mut instance.engine);
                }
            }
            SessionEvent::Exited { .. } => {
                if let Some(instance) = self.instances.get_mut(&id) {
                    instance.engine.feed(EXIT_NOTICE.as_bytes());
                }
                self.evict(id);
            }
        }
    }

    /// Forward keystrokes to the session's shell.
    pub fn send_input(&self, id: SessionId, data: &str) -> Result<(), RegistryError> {
        self.registry.write(id, data)
    }

    /// The viewport changed; refit the visible session. A viewport that
    /// cannot produce a valid geometry is skipped entirely.
    pub fn viewport_changed(&mut self, viewport: Viewport) {
        let Some(id) = self.visible else {
            return;
        };
        let Some((cols, rows)) = fit(viewport, self.metrics) else {
            return;
        };
        if let Some(instance) = self.instances.get_mut(&id) {
            instance.engine.resize(cols, rows);
        }
        if let Err(e) = self.registry.resize(id, cols, rows) {
            log::warn!("refit of session {id} failed: {e}");
        }
    }

    pub fn visible(&self) -> Option<SessionId> {
        self.visible
    }

    pub fn is_cached(&self, id: SessionId) -> bool {
        self.instances.contains_key(&id)
    }

    /// The cached engine's screen text, for rendering layers and tests.
    pub fn screen_text(&self, id: SessionId) -> Option<String> {
        self.instances.get(&id).map(|i| i.engine.grid().text())
    }
}

/// Forward queued terminal replies (device status reports etc.) back into
/// the session's input.
fn route_replies(registry: &SessionRegistry, id: SessionId, engine: &mut Engine) {
    for reply in engine.take_replies() {
        if let Err(e) = registry.write(id, &reply) {
            log::debug!("dropping terminal reply for session {id}: {e}");
        }
    }
}
