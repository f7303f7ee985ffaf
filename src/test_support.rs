//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc::{Receiver, Sender};

use crate::core::state::App;
use crate::transport::{OutgoingEvent, Transport, TransportError, TransportEvent};

/// Plays a fixed list of events, then records everything the client emits
/// until the outgoing channel closes.
pub struct ScriptedTransport {
    script: Vec<TransportEvent>,
    sent: Arc<Mutex<Vec<OutgoingEvent>>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<TransportEvent>) -> Self {
        Self {
            script,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle to the events emitted so far.
    pub fn sent(&self) -> Arc<Mutex<Vec<OutgoingEvent>>> {
        Arc::clone(&self.sent)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn run(
        &self,
        mut outgoing: Receiver<OutgoingEvent>,
        incoming: Sender<TransportEvent>,
    ) -> Result<(), TransportError> {
        for event in self.script.clone() {
            incoming
                .send(event)
                .await
                .map_err(|_| TransportError::ChannelClosed)?;
        }
        while let Some(event) = outgoing.recv().await {
            self.sent.lock().unwrap().push(event);
        }
        Ok(())
    }
}

/// Creates a disconnected test App.
pub fn test_app() -> App {
    App::new("http://test.invalid".to_string())
}
