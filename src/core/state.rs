//! # Application State
//!
//! Core business state for Sift. Domain logic only; presentation state
//! lives in the `tui` module.
//!
//! ```text
//! App
//! ├── server_url: String        // where the agent lives (title bar)
//! ├── connected: bool           // last lifecycle signal from the transport
//! ├── transcript: Transcript    // records + pending handle
//! └── notice: Option<Notice>    // out-of-band banner
//! ```
//!
//! State changes only happen through `update(state, action)` in action.rs.

use std::fmt;

use crate::core::config::ResolvedConfig;
use crate::core::transcript::Transcript;

/// Out-of-band message shown above the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Transport unreachable. Blocks submission until the next connect.
    Connectivity,
    /// `agent_error` that arrived with no pending message to attach to.
    AgentError(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Connectivity => {
                write!(f, "Connection failed. Please ensure the server is running.")
            }
            Notice::AgentError(error) => write!(f, "Error: {error}"),
        }
    }
}

pub struct App {
    pub server_url: String,
    pub connected: bool,
    pub transcript: Transcript,
    pub notice: Option<Notice>,
}

impl App {
    pub fn new(server_url: String) -> Self {
        Self {
            server_url,
            connected: false,
            transcript: Transcript::new(),
            notice: None,
        }
    }

    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self::new(config.server_url.clone())
    }

    /// Submit is allowed iff the transport is up and nothing is in flight.
    pub fn affordance_enabled(&self) -> bool {
        self.connected && !self.transcript.has_pending()
    }

    pub fn is_waiting(&self) -> bool {
        self.transcript.has_pending()
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::test_app;

    #[test]
    fn test_app_new_defaults() {
        let app = test_app();
        assert!(!app.connected);
        assert!(app.transcript.is_empty());
        assert!(app.notice.is_none());
        assert_eq!(app.server_url, "http://test.invalid");
    }

    #[test]
    fn affordance_needs_connection_and_no_pending() {
        let mut app = test_app();
        assert!(!app.affordance_enabled());

        app.connected = true;
        assert!(app.affordance_enabled());

        app.transcript.append_pending_assistant().unwrap();
        assert!(!app.affordance_enabled());

        app.transcript.finalize();
        assert!(app.affordance_enabled());
    }
}
