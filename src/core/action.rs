//! # Actions
//!
//! Everything that can happen in Sift becomes an `Action`.
//! User presses Enter? That's `Action::Submit(text)`.
//! The server reports progress? That's `Action::Server(event)`.
//!
//! The `update()` function takes the current state and an action, mutates
//! the state, and returns an `Effect` describing any I/O the caller must
//! perform. No side effects here.
//!
//! ```text
//! State + Action  →  update()  →  New State + Effect
//! ```

use log::{debug, error, info, warn};

use crate::core::event::{AgentError, ClientEvent, QueryComplete, ServerEvent, StageUpdate};
use crate::core::state::{App, Notice};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// User asked to send the input text.
    Submit(String),
    /// Transport (re)established the connection.
    Connected,
    /// Transport is unavailable, whatever the reason.
    ConnectionFailed,
    /// A decoded server event.
    Server(ServerEvent),
    Quit,
}

/// I/O requested by `update()`.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    None,
    Send(ClientEvent),
    Quit,
}

pub fn update(app: &mut App, action: Action) -> Effect {
    match action {
        Action::Submit(text) => submit(app, &text),
        Action::Connected => {
            info!("Connected to {}", app.server_url);
            app.connected = true;
            app.notice = None;
            Effect::None
        }
        Action::ConnectionFailed => {
            if app.connected {
                warn!("Lost connection to {}", app.server_url);
            }
            app.connected = false;
            app.notice = Some(Notice::Connectivity);
            Effect::None
        }
        Action::Server(ServerEvent::StageUpdate(stage)) => {
            on_stage_update(app, &stage);
            Effect::None
        }
        Action::Server(ServerEvent::QueryComplete(complete)) => {
            on_query_complete(app, &complete);
            Effect::None
        }
        Action::Server(ServerEvent::AgentError(err)) => {
            on_agent_error(app, &err);
            Effect::None
        }
        Action::Quit => Effect::Quit,
    }
}

fn submit(app: &mut App, text: &str) -> Effect {
    let query = text.trim();
    if query.is_empty() {
        return Effect::None;
    }
    if !app.affordance_enabled() {
        debug!(
            "Submit ignored (connected={}, pending={})",
            app.connected,
            app.transcript.has_pending()
        );
        return Effect::None;
    }

    app.transcript.append_user(query);
    if let Err(e) = app.transcript.append_pending_assistant() {
        // Unreachable while the affordance check above holds.
        error!("{}", e);
        return Effect::None;
    }
    if matches!(app.notice, Some(Notice::AgentError(_))) {
        app.notice = None;
    }

    info!("Submitting query ({} chars)", query.len());
    Effect::Send(ClientEvent::RunQuery {
        query: query.to_string(),
    })
}

fn on_stage_update(app: &mut App, stage: &StageUpdate) {
    match app.transcript.pending_mut() {
        Some(msg) => {
            debug!("Applying stage update: {:?}", stage);
            msg.apply(stage);
        }
        None => debug!("Dropping stage update with no pending message: {:?}", stage),
    }
}

fn on_query_complete(app: &mut App, complete: &QueryComplete) {
    if let Some(msg) = app.transcript.pending_mut() {
        msg.complete(complete);
    }
    match app.transcript.finalize() {
        Some(id) => info!("Query complete (record {})", id.0),
        None => debug!("query_complete with no pending message"),
    }
}

fn on_agent_error(app: &mut App, err: &AgentError) {
    warn!("Agent error: {}", err.error);
    match app.transcript.pending_mut() {
        Some(msg) => {
            msg.fail(err);
            app.transcript.finalize();
        }
        None => app.notice = Some(Notice::AgentError(err.error.clone())),
    }
}
