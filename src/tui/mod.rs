//! # TUI Adapter
//!
//! The ratatui-specific layer. Handles terminal I/O, renders the UI,
//! translates keyboard events into core::Action values, and wires the
//! transport into the event loop.
//!
//! This is the only module that knows about ratatui and crossterm.
//!
//! ## Redraw Strategy
//!
//! The event loop uses conditional redraw to avoid unnecessary work:
//!
//! - **Animating** (a query is in flight): draws every ~80ms so the pending
//!   message's border pulse and thinking dots move.
//! - **Idle**: sleeps up to 500ms, only redraws on events, server traffic,
//!   or terminal resize.
//!
//! A `SteadyBlock` cursor style is used instead of a blinking cursor because
//! ratatui's `set_cursor_position` resets the terminal's blink timer on every
//! `draw()` call, making blinking cursors appear erratic during continuous redraws.
//!
//! ## Transport Wiring
//!
//! ```text
//! Transport task ── TransportEvent ──► forwarder task ── Action ──► event loop
//! event loop ── Effect::Send ── OutgoingEvent ──────────────────► Transport task
//! ```

mod component;
mod components;
mod event;
pub mod markdown;
mod ui;

use log::{debug, error, info, warn};
use std::io::stdout;
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use crossterm::cursor::{Hide, SetCursorStyle, Show};
use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
    KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use tokio::sync::mpsc as async_mpsc;
use tokio::task::JoinHandle;

use crate::core::action::{Action, Effect, update};
use crate::core::config::ResolvedConfig;
use crate::core::event::{AgentError, ServerEvent};
use crate::core::state::App;
use crate::transport::{OutgoingEvent, SocketIoTransport, Transport, TransportEvent};
use crate::tui::component::EventHandler;
use crate::tui::components::{Affordance, InputBox, InputEvent, MessageListState};
use crate::tui::event::{TuiEvent, poll_event_immediate, poll_event_timeout};

/// Client events waiting for the transport. A full queue means the
/// transport is wedged; the send is reported as failed.
const OUTGOING_CAPACITY: usize = 32;
/// Server events waiting for the forwarder.
const INCOMING_CAPACITY: usize = 256;

const ANIMATING_POLL: Duration = Duration::from_millis(80);
const IDLE_POLL: Duration = Duration::from_millis(500);

/// Modal input mode: determines how keyboard events are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Navigate messages with arrow keys. Typing auto-switches to Input.
    Cursor,
    /// Text editing in the input box. Esc switches to Cursor.
    Input,
}

/// TUI-specific presentation state (not part of core business logic)
pub struct TuiState {
    // Persistent component states
    pub message_list: MessageListState,
    pub input_box: InputBox,
    // Modal input mode
    pub input_mode: InputMode,
    // Animation state
    pub pulse_value: f32,
}

impl Default for TuiState {
    fn default() -> Self {
        Self::new()
    }
}

impl TuiState {
    pub fn new() -> Self {
        Self {
            message_list: MessageListState::new(),
            input_box: InputBox::new(),
            input_mode: InputMode::Input, // User expects to type immediately
            pulse_value: 0.0,
        }
    }

    /// Push App-derived props into components before drawing.
    fn sync_props(&mut self, app: &App) {
        self.input_box.affordance = affordance(app);
        self.input_box.dimmed = self.input_mode == InputMode::Cursor;
        self.message_list
            .sync_pending(app.transcript.pending().map(|id| id.0));
    }
}

fn affordance(app: &App) -> Affordance {
    if !app.connected {
        Affordance::Offline
    } else if app.is_waiting() {
        Affordance::Waiting
    } else {
        Affordance::Ready
    }
}

struct TerminalModeGuard;

impl TerminalModeGuard {
    fn new() -> std::io::Result<Self> {
        // Kitty keyboard protocol lets us tell Shift+Enter from Enter.
        // Terminals that don't support it ignore the sequence.
        execute!(
            stdout(),
            EnableMouseCapture,
            EnableBracketedPaste,
            Show,
            SetCursorStyle::SteadyBlock,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )?;
        info!(
            "Terminal modes enabled (mouse, bracketed paste, steady block cursor, keyboard enhancement)"
        );
        Ok(Self)
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        let _ = execute!(
            stdout(),
            PopKeyboardEnhancementFlags,
            DisableMouseCapture,
            DisableBracketedPaste,
            Hide
        );
    }
}

/// Background tasks serving one transport.
struct Connection {
    outgoing: async_mpsc::Sender<OutgoingEvent>,
    transport_task: JoinHandle<()>,
    forward_task: JoinHandle<()>,
}

impl Connection {
    /// Close the outgoing channel so the transport sends its disconnect, and
    /// stop forwarding. The transport task is left to finish on its own.
    fn shutdown(self) {
        drop(self.outgoing);
        self.forward_task.abort();
        debug!(
            "Connection shut down (transport finished: {})",
            self.transport_task.is_finished()
        );
    }
}

/// Spawn `transport` and a forwarder that turns its events into `Action`s
/// on `tx`.
fn spawn_transport(transport: Arc<dyn Transport>, tx: mpsc::Sender<Action>) -> Connection {
    let (outgoing, outgoing_rx) = async_mpsc::channel(OUTGOING_CAPACITY);
    let (incoming_tx, incoming_rx) = async_mpsc::channel(INCOMING_CAPACITY);

    info!("Spawning transport '{}'", transport.name());
    let transport_task = tokio::spawn(async move {
        match transport.run(outgoing_rx, incoming_tx).await {
            Ok(()) => info!("Transport '{}' stopped", transport.name()),
            Err(e) => error!("Transport '{}' stopped: {}", transport.name(), e),
        }
    });
    let forward_task = tokio::spawn(forward_events(incoming_rx, tx));

    Connection {
        outgoing,
        transport_task,
        forward_task,
    }
}

async fn forward_events(mut incoming: async_mpsc::Receiver<TransportEvent>, tx: mpsc::Sender<Action>) {
    let mut forwarded = 0usize;
    while let Some(event) = incoming.recv().await {
        let Some(action) = to_action(event) else {
            continue;
        };
        forwarded += 1;
        if tx.send(action).is_err() {
            warn!("Failed to forward transport event: receiver dropped");
            return;
        }
    }
    info!("Transport channel closed after {} actions", forwarded);
}

fn to_action(event: TransportEvent) -> Option<Action> {
    match event {
        TransportEvent::Connected => Some(Action::Connected),
        TransportEvent::ConnectionFailed => Some(Action::ConnectionFailed),
        TransportEvent::Event { name, payload } => {
            ServerEvent::decode(&name, payload).map(Action::Server)
        }
    }
}

/// Run `action` through `update` and perform its effect.
/// Returns true when the app should quit.
fn dispatch(app: &mut App, action: Action, outgoing: &async_mpsc::Sender<OutgoingEvent>) -> bool {
    match update(app, action) {
        Effect::None => false,
        Effect::Quit => true,
        Effect::Send(event) => {
            let outgoing_event = OutgoingEvent {
                name: event.name().to_string(),
                payload: event.payload(),
            };
            if let Err(e) = outgoing.try_send(outgoing_event) {
                warn!("Could not hand '{}' to the transport: {}", event.name(), e);
                // Fail the pending message rather than leave it waiting forever
                let failed = Action::Server(ServerEvent::AgentError(AgentError::new(format!(
                    "Could not send the query: {e}"
                ))));
                return update(app, failed) == Effect::Quit;
            }
            false
        }
    }
}

pub fn run(config: ResolvedConfig) -> std::io::Result<()> {
    let mut app = App::from_config(&config);
    let mut tui = TuiState::new();

    let mut terminal = ratatui::init();
    let _terminal_mode_guard = TerminalModeGuard::new();

    // Channel for actions from background tasks
    let (tx, rx) = mpsc::channel();
    let transport: Arc<dyn Transport> = Arc::new(SocketIoTransport::new(config.connection.clone()));
    let connection = spawn_transport(transport, tx);

    // Animation timer
    let start_time = Instant::now();
    let mut needs_redraw = true; // Force first frame
    let mut should_quit = false;

    while !should_quit {
        tui.sync_props(&app);
        let animating = app.is_waiting();
        if animating {
            needs_redraw = true;
        }

        // Only draw when something changed
        if needs_redraw {
            let elapsed = start_time.elapsed().as_secs_f32();
            tui.pulse_value = (elapsed * 5.0).sin() * 0.5 + 0.5;
            let spinner_frame = (elapsed * 4.0) as usize;
            terminal.draw(|f| ui::draw_ui(f, &app, &mut tui, spinner_frame))?;
            needs_redraw = false;
        }

        // Dynamic poll timeout: short when animating, long when idle
        let timeout = if animating { ANIMATING_POLL } else { IDLE_POLL };
        let first_event = poll_event_timeout(timeout);

        // Process first event + drain ALL pending events before next draw
        if first_event.is_some() {
            needs_redraw = true;
        }
        for event in first_event
            .into_iter()
            .chain(std::iter::from_fn(poll_event_immediate))
        {
            if handle_terminal_event(event, &mut app, &mut tui, &terminal, &connection.outgoing) {
                should_quit = true;
                break;
            }
        }

        // Handle background task actions (connection lifecycle, server events)
        while let Ok(action) = rx.try_recv() {
            needs_redraw = true;
            debug!("Event loop received: {:?}", action);
            if dispatch(&mut app, action, &connection.outgoing) {
                should_quit = true;
            }
        }
    }

    connection.shutdown();
    ratatui::restore();
    Ok(())
}

/// Apply one terminal event. Returns true when the app should quit.
fn handle_terminal_event(
    event: TuiEvent,
    app: &mut App,
    tui: &mut TuiState,
    terminal: &ratatui::DefaultTerminal,
    outgoing: &async_mpsc::Sender<OutgoingEvent>,
) -> bool {
    match event {
        // Resize just needs a redraw (already flagged)
        TuiEvent::Resize => false,
        // Ctrl+C always quits regardless of mode
        TuiEvent::ForceQuit => dispatch(app, Action::Quit, outgoing),
        // Mouse hover: always active regardless of mode
        TuiEvent::MouseMove(_col, row) => {
            tui.message_list.hovered_index = hit_test(row, app, tui, terminal).map(|(i, _)| i);
            false
        }
        // Click selects; clicking a status header toggles it
        TuiEvent::MouseClick(_col, row) => {
            if let Some((idx, row_in_record)) = hit_test(row, app, tui, terminal) {
                tui.message_list.selected_index = Some(idx);
                // Row 0 is the border; the status header is the first content row
                if row_in_record == 1 {
                    tui.message_list
                        .toggle_expanded(idx, app.transcript.records());
                }
            }
            false
        }
        // Scroll events: always go to MessageList regardless of mode
        TuiEvent::ScrollUp
        | TuiEvent::ScrollDown
        | TuiEvent::ScrollPageUp
        | TuiEvent::ScrollPageDown
        | TuiEvent::ScrollToBottom => {
            tui.message_list.handle_event(&event);
            false
        }
        _ => match tui.input_mode {
            InputMode::Input => handle_input_mode(event, app, tui, outgoing),
            InputMode::Cursor => {
                handle_cursor_mode(event, app, tui);
                false
            }
        },
    }
}

fn hit_test(
    row: u16,
    app: &App,
    tui: &TuiState,
    terminal: &ratatui::DefaultTerminal,
) -> Option<(usize, u16)> {
    let frame_area = match terminal.size() {
        Ok(size) => ratatui::layout::Rect::new(0, 0, size.width, size.height),
        Err(e) => {
            warn!("Could not read terminal size: {}", e);
            return None;
        }
    };
    if app.transcript.is_empty() {
        return None;
    }
    ui::hit_test_message(
        row,
        frame_area,
        tui.message_list.scroll_state.offset().y,
        &tui.message_list.layout.prefix_heights,
        ui::notice_height(app, frame_area.width),
        tui.input_box.calculate_height(frame_area.width),
    )
}

fn handle_input_mode(
    event: TuiEvent,
    app: &mut App,
    tui: &mut TuiState,
    outgoing: &async_mpsc::Sender<OutgoingEvent>,
) -> bool {
    // Esc → browse messages, starting from the newest
    if matches!(event, TuiEvent::Escape) {
        tui.input_mode = InputMode::Cursor;
        tui.message_list.selected_index = app.transcript.len().checked_sub(1);
        tui.message_list.scroll_to_selected();
        return false;
    }

    match tui.input_box.handle_event(&event) {
        Some(InputEvent::Submit(text)) => {
            let quit = dispatch(app, Action::Submit(text), outgoing);
            // Follow the new exchange
            tui.message_list.scroll_to_bottom();
            quit
        }
        Some(InputEvent::ContentChanged) | None => false,
    }
}

fn handle_cursor_mode(event: TuiEvent, app: &App, tui: &mut TuiState) {
    let len = app.transcript.len();
    let list = &mut tui.message_list;
    match event {
        // Space toggles the selected message's status panel
        TuiEvent::InputChar(' ') => {
            if let Some(idx) = list.selected_index {
                list.toggle_expanded(idx, app.transcript.records());
            }
        }
        // Typing auto-switches to Input mode and forwards the event
        TuiEvent::InputChar(_) | TuiEvent::Paste(_) => {
            tui.input_mode = InputMode::Input;
            list.selected_index = None;
            tui.input_box.handle_event(&event);
        }
        TuiEvent::Escape | TuiEvent::Submit => {
            tui.input_mode = InputMode::Input;
            list.selected_index = None;
        }
        TuiEvent::CursorUp if len > 0 => {
            list.selected_index = Some(list.selected_index.map_or(len - 1, |i| i.saturating_sub(1)));
            list.scroll_to_selected();
        }
        TuiEvent::CursorDown => {
            if let Some(idx) = list.selected_index
                && idx + 1 < len
            {
                list.selected_index = Some(idx + 1);
                list.scroll_to_selected();
            }
        }
        TuiEvent::CursorHome if len > 0 => {
            list.selected_index = Some(0);
            list.scroll_to_selected();
        }
        TuiEvent::CursorEnd => {
            list.selected_index = len.checked_sub(1);
            list.scroll_to_bottom();
        }
        _ => {}
    }
}
