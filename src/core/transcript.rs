//! # Transcript Store
//!
//! Ordered, append-only list of chat records plus the handle of the one
//! assistant record that is still receiving stage events.
//!
//! The store refuses a second pending record, but callers are expected never
//! to ask: the submission path checks the affordance first.

use chrono::{DateTime, Local};

use crate::core::stage::AssistantMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    /// Literal user text. Never interpreted as markup.
    User(String),
    Assistant(AssistantMessage),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub body: MessageBody,
    pub created_at: DateTime<Local>,
}

impl MessageRecord {
    fn new(body: MessageBody) -> Self {
        Self {
            body,
            created_at: Local::now(),
        }
    }

    pub fn role(&self) -> Role {
        match self.body {
            MessageBody::User(_) => Role::User,
            MessageBody::Assistant(_) => Role::Assistant,
        }
    }

    pub fn as_assistant(&self) -> Option<&AssistantMessage> {
        match &self.body {
            MessageBody::Assistant(msg) => Some(msg),
            MessageBody::User(_) => None,
        }
    }
}

/// Position of a record in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub usize);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("invariant violation: record {0:?} is already pending")]
    InvariantViolation(RecordId),
}

#[derive(Debug, Default)]
pub struct Transcript {
    records: Vec<MessageRecord>,
    pending: Option<RecordId>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_user(&mut self, text: impl Into<String>) -> RecordId {
        self.push(MessageRecord::new(MessageBody::User(text.into())))
    }

    pub fn append_pending_assistant(&mut self) -> Result<RecordId, TranscriptError> {
        if let Some(existing) = self.pending {
            return Err(TranscriptError::InvariantViolation(existing));
        }
        let id = self.push(MessageRecord::new(MessageBody::Assistant(
            AssistantMessage::new(),
        )));
        self.pending = Some(id);
        Ok(id)
    }

    /// Drop the pending handle, closing the record to further mutation.
    /// The terminal phase is the message's own business
    /// (`AssistantMessage::complete` / `fail`) and is not touched here.
    /// Returns the record that was pending, if any.
    pub fn finalize(&mut self) -> Option<RecordId> {
        self.pending.take()
    }

    pub fn pending(&self) -> Option<RecordId> {
        self.pending
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Mutable access to the in-flight assistant message. This is the only
    /// way to mutate a record after it has been appended.
    pub fn pending_mut(&mut self) -> Option<&mut AssistantMessage> {
        let RecordId(index) = self.pending?;
        match &mut self.records.get_mut(index)?.body {
            MessageBody::Assistant(msg) => Some(msg),
            MessageBody::User(_) => None,
        }
    }

    pub fn get(&self, id: RecordId) -> Option<&MessageRecord> {
        self.records.get(id.0)
    }

    pub fn records(&self) -> &[MessageRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn push(&mut self, record: MessageRecord) -> RecordId {
        self.records.push(record);
        RecordId(self.records.len() - 1)
    }
}
