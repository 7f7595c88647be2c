// Display engine
//
// Owns the render thread and its lifecycle. The render thread repeatedly
// polls for a key, applies it, locks the connection container, takes (or
// reuses, while paused) a snapshot, draws it, exports it and unlocks.
//
// Two locks are involved and never held together: the lifecycle lock is
// checked and released at the top of each cycle before the container lock
// is taken.

use super::config::EngineConfig;
use super::event::{translate_key, Command};
use super::DisplayState;
use crate::error::EngineError;
use crate::export::Exporter;
use crate::net::ConnectionContainer;
use crate::ui::{self, visible_rows, TableView};
use crossterm::{
    event::{self, Event, KeyEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::io::{self, Stdout};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Lifecycle of a display engine: Idle → Running → Stopping → Done
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed, not started
    Idle,
    /// Render thread active
    Running,
    /// Stop requested, render thread finishing its cycle
    Stopping,
    /// Render thread joined; terminal
    Done,
}

/// Receives the quit request from the keyboard
pub trait ShutdownNotifier: Send + Sync {
    fn shutdown(&self);
}

impl<F> ShutdownNotifier for F
where
    F: Fn() + Send + Sync,
{
    fn shutdown(&self) {
        self()
    }
}

/// A terminal the render thread draws on and reads keys from
pub trait Surface: Send + 'static {
    type Backend: Backend;

    fn terminal(&mut self) -> &mut Terminal<Self::Backend>;

    /// Wait up to `timeout` for a key event
    fn poll_key(&mut self, timeout: Duration) -> io::Result<Option<KeyEvent>>;

    /// Return the terminal to its normal mode
    fn restore(&mut self) -> io::Result<()>;
}

/// The process's own terminal, in raw mode on the alternate screen
pub struct CrosstermSurface {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    restored: bool,
}

impl CrosstermSurface {
    /// Switch the terminal into raw mode and the alternate screen
    pub fn open() -> Result<Self, EngineError> {
        enable_raw_mode().map_err(|e| EngineError::setup("enable raw mode", e))?;

        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(EngineError::setup("enter alternate screen", e));
        }

        match Terminal::new(CrosstermBackend::new(stdout)) {
            Ok(terminal) => Ok(Self {
                terminal,
                restored: false,
            }),
            Err(e) => {
                let _ = execute!(io::stdout(), LeaveAlternateScreen);
                let _ = disable_raw_mode();
                Err(EngineError::setup("create terminal", e))
            }
        }
    }
}

impl Surface for CrosstermSurface {
    type Backend = CrosstermBackend<Stdout>;

    fn terminal(&mut self) -> &mut Terminal<Self::Backend> {
        &mut self.terminal
    }

    fn poll_key(&mut self, timeout: Duration) -> io::Result<Option<KeyEvent>> {
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                return Ok(Some(key));
            }
        }
        Ok(None)
    }

    fn restore(&mut self) -> io::Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()
    }
}

impl Drop for CrosstermSurface {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

fn lock_state(lifecycle: &Mutex<EngineState>) -> MutexGuard<'_, EngineState> {
    lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The render thread's side: display state plus everything one cycle needs
pub struct RenderLoop {
    container: Arc<dyn ConnectionContainer>,
    notifier: Arc<dyn ShutdownNotifier>,
    exporter: Option<Exporter>,
    tick: Duration,
    state: DisplayState,
    input_failing: bool,
    draw_failing: bool,
}

impl RenderLoop {
    pub fn new(
        container: Arc<dyn ConnectionContainer>,
        notifier: Arc<dyn ShutdownNotifier>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            container,
            notifier,
            exporter: config.export_path.clone().map(Exporter::new),
            tick: config.tick,
            state: DisplayState::new(),
            input_failing: false,
            draw_failing: false,
        }
    }

    #[allow(dead_code)]
    pub fn display_state(&self) -> &DisplayState {
        &self.state
    }

    /// Apply one key press
    pub fn handle_key(&mut self, key: KeyEvent) {
        match translate_key(key) {
            Some(Command::RequestShutdown) => {
                info!("Shutdown requested from keyboard");
                self.notifier.shutdown();
            }
            Some(command) => self.state.apply(command, self.container.as_ref()),
            None => {}
        }
    }

    /// Run one render cycle and return what was drawn.
    ///
    /// The container stays locked from snapshot acquisition until the frame
    /// is drawn. The export works on the owned snapshot after unlocking.
    pub fn cycle<B: Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
        key: Option<KeyEvent>,
    ) -> io::Result<TableView> {
        if let Some(key) = key {
            self.handle_key(key);
        }

        let locked = self.container.lock();
        let mut snapshot = self.state.acquire_snapshot(&*locked);
        // Paused: bound by the frozen rows, not the live table
        let count = if self.state.paused {
            snapshot.len()
        } else {
            locked.num_connections()
        };
        self.state.clamp_scroll(count);

        let drawn = terminal.size().and_then(|size| {
            let view = TableView::build(&mut snapshot, &self.state, visible_rows(size.height));
            terminal.draw(|f| ui::draw(f, &view))?;
            Ok(view)
        });

        drop(locked);

        if let Some(exporter) = self.exporter.as_mut() {
            exporter.write_logged(&snapshot);
        }
        self.state.release_snapshot(snapshot);

        drawn
    }

    /// Cycle until the lifecycle leaves Idle/Running, then restore the surface
    fn run<S: Surface>(mut self, mut surface: S, lifecycle: &Mutex<EngineState>) {
        info!(tick_ms = self.tick.as_millis() as u64, "Display thread started");

        while matches!(
            *lock_state(lifecycle),
            EngineState::Running | EngineState::Idle
        ) {
            let key = match surface.poll_key(self.tick) {
                Ok(key) => {
                    if self.input_failing {
                        info!("Input poll recovered");
                        self.input_failing = false;
                    }
                    key
                }
                Err(e) => {
                    if !self.input_failing {
                        warn!(error = %e, "Input poll failed; retrying every tick");
                        self.input_failing = true;
                    }
                    // A failed poll returns at once; keep the tick rate
                    thread::sleep(self.tick);
                    None
                }
            };

            match self.cycle(surface.terminal(), key) {
                Ok(_) => {
                    if self.draw_failing {
                        info!("Frame draws recovered");
                        self.draw_failing = false;
                    }
                }
                Err(e) => {
                    if !self.draw_failing {
                        warn!(error = %e, "Frame draw failed; retrying every cycle");
                        self.draw_failing = true;
                    }
                }
            }
        }

        if let Err(e) = surface.restore() {
            warn!(error = %e, "Failed to restore terminal");
        }
        info!("Display thread exiting");
    }
}

/// Interactive connection table running on its own thread
pub struct DisplayEngine {
    lifecycle: Arc<Mutex<EngineState>>,
    container: Arc<dyn ConnectionContainer>,
    notifier: Arc<dyn ShutdownNotifier>,
    config: EngineConfig,
    handle: Option<JoinHandle<()>>,
}

impl DisplayEngine {
    pub fn new(
        container: Arc<dyn ConnectionContainer>,
        notifier: impl ShutdownNotifier + 'static,
        config: EngineConfig,
    ) -> Self {
        Self {
            lifecycle: Arc::new(Mutex::new(EngineState::Idle)),
            container,
            notifier: Arc::new(notifier),
            config,
            handle: None,
        }
    }

    pub fn state(&self) -> EngineState {
        *lock_state(&self.lifecycle)
    }

    /// Start rendering on `surface`.
    ///
    /// Only valid from `Idle`. A surface smaller than the configured
    /// minimum is restored and rejected, leaving the engine `Idle`.
    pub fn start<S: Surface>(&mut self, mut surface: S) -> Result<(), EngineError> {
        let current = self.state();
        if current != EngineState::Idle {
            let _ = surface.restore();
            return Err(EngineError::InvalidState(current));
        }

        let size = match surface.terminal().size() {
            Ok(size) => size,
            Err(e) => {
                let _ = surface.restore();
                return Err(EngineError::setup("query terminal size", e));
            }
        };
        if size.width < self.config.min_columns || size.height < self.config.min_rows {
            let _ = surface.restore();
            return Err(EngineError::TerminalTooSmall {
                columns: size.width,
                rows: size.height,
                min_columns: self.config.min_columns,
                min_rows: self.config.min_rows,
            });
        }

        let render = RenderLoop::new(
            Arc::clone(&self.container),
            Arc::clone(&self.notifier),
            &self.config,
        );
        let lifecycle = Arc::clone(&self.lifecycle);
        let handle = thread::Builder::new()
            .name("display".into())
            .spawn(move || render.run(surface, &lifecycle))
            .map_err(|e| EngineError::setup("spawn display thread", e))?;

        self.handle = Some(handle);
        *lock_state(&self.lifecycle) = EngineState::Running;
        info!(columns = size.width, rows = size.height, "Display engine running");
        Ok(())
    }

    /// True once the render thread has exited on its own (e.g. panicked)
    pub fn render_thread_exited(&self) -> bool {
        self.handle.as_ref().is_some_and(JoinHandle::is_finished)
    }

    /// Stop the render thread and wait for it.
    ///
    /// Returns at once unless the engine is `Running`. Blocks until the
    /// current cycle finishes; there is no timeout.
    pub fn stop(&mut self) {
        {
            let mut state = lock_state(&self.lifecycle);
            if *state != EngineState::Running {
                return;
            }
            *state = EngineState::Stopping;
        }
        debug!("Display engine stopping");

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Display thread panicked");
            }
        }

        *lock_state(&self.lifecycle) = EngineState::Done;
        info!("Display engine stopped");
    }
}

impl Drop for DisplayEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
