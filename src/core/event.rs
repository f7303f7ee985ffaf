//! # Event Contract
//!
//! Typed views of the named events exchanged with the agent server.
//!
//! The server speaks in loosely-typed JSON, so every payload here is decoded
//! permissively: optional fields default, unknown stage tags collapse into
//! [`StageUpdate::Unknown`], and the completion/error events always produce
//! *something* so the client can never get stuck with a pending message.
//!
//! ```text
//! server → client   stage_update    {stage, ...stage payload}
//!                   query_complete  {timings?: {"Total Time": n, ...}}
//!                   agent_error     {error}
//! client → server   run_query       {query}
//! ```

use std::collections::BTreeMap;

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const STAGE_UPDATE: &str = "stage_update";
pub const QUERY_COMPLETE: &str = "query_complete";
pub const AGENT_ERROR: &str = "agent_error";
pub const RUN_QUERY: &str = "run_query";

/// Label the router reports when it doesn't name a decision.
pub const DEFAULT_ROUTE: &str = "analysis";

/// Progress of a single stage, as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Running,
    Complete,
    Failed,
    #[serde(other)]
    Other,
}

// Stage payload fields go through `lenient`/`lenient_count`: a field of the
// wrong type reads as absent instead of failing the whole event.

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RouterUpdate {
    #[serde(default, deserialize_with = "lenient")]
    pub decision: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlanUpdate {
    #[serde(default, deserialize_with = "lenient")]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExecutionUpdate {
    #[serde(default, deserialize_with = "lenient_count")]
    pub attempt: Option<u32>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub max_retries: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<StageStatus>,
    #[serde(default, deserialize_with = "lenient")]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SynthesisUpdate {
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<StageStatus>,
    #[serde(default, deserialize_with = "lenient")]
    pub answer: Option<String>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match serde_json::from_value(value) {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            debug!("Ignoring unreadable stage field: {}", e);
            Ok(None)
        }
    }
}

/// Counts arrive as `1`, `1.0` or `"1"` depending on the server.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let count = match &value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(u32::MAX))
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    let count = count.and_then(|n| u32::try_from(n).ok());
    if count.is_none() && !value.is_null() {
        debug!("Ignoring unreadable count: {}", value);
    }
    Ok(count)
}

/// One `stage_update` event, tagged by its `stage` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "stage", rename_all = "lowercase")]
pub enum StageUpdate {
    Router(RouterUpdate),
    Planner(PlanUpdate),
    Reflection(PlanUpdate),
    Execution(ExecutionUpdate),
    Synthesis(SynthesisUpdate),
    /// Any stage this client doesn't know about.
    #[serde(other)]
    Unknown,
}

/// Payload of `query_complete`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueryComplete {
    #[serde(default)]
    pub timings: Option<BTreeMap<String, Value>>,
}

impl QueryComplete {
    pub const TOTAL_TIME: &'static str = "Total Time";

    /// Numeric timings in display order: "Total Time" first, then the rest by name.
    /// Non-numeric entries are skipped.
    pub fn numeric_timings(&self) -> Vec<(String, f64)> {
        let Some(timings) = &self.timings else {
            return Vec::new();
        };
        let mut out: Vec<(String, f64)> = timings
            .iter()
            .filter_map(|(name, value)| value.as_f64().map(|secs| (name.clone(), secs)))
            .collect();
        out.sort_by_key(|(name, _)| name != Self::TOTAL_TIME);
        out
    }
}

/// Payload of `agent_error`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentError {
    #[serde(default = "unknown_error")]
    pub error: String,
}

fn unknown_error() -> String {
    "Unknown error".to_string()
}

impl AgentError {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

/// Everything the server can tell us about a query.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    StageUpdate(StageUpdate),
    QueryComplete(QueryComplete),
    AgentError(AgentError),
}

impl ServerEvent {
    /// Decode a named event. Returns `None` for names this client doesn't
    /// handle and for stage updates that can't be read at all.
    pub fn decode(name: &str, payload: Value) -> Option<ServerEvent> {
        match name {
            STAGE_UPDATE => match serde_json::from_value::<StageUpdate>(payload) {
                Ok(update) => Some(ServerEvent::StageUpdate(update)),
                Err(e) => {
                    warn!("Dropping unreadable stage_update: {}", e);
                    None
                }
            },
            QUERY_COMPLETE => {
                let complete = serde_json::from_value(payload).unwrap_or_else(|e| {
                    warn!("query_complete payload unreadable ({}), ignoring timings", e);
                    QueryComplete::default()
                });
                Some(ServerEvent::QueryComplete(complete))
            }
            AGENT_ERROR => {
                let error = serde_json::from_value(payload).unwrap_or_else(|e| {
                    warn!("agent_error payload unreadable: {}", e);
                    AgentError::new(unknown_error())
                });
                Some(ServerEvent::AgentError(error))
            }
            other => {
                debug!("Ignoring unhandled server event '{}'", other);
                None
            }
        }
    }
}

/// Events this client sends.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClientEvent {
    RunQuery { query: String },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::RunQuery { .. } => RUN_QUERY,
        }
    }

    pub fn payload(&self) -> Value {
        // Serializing a struct-like variant of plain strings cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
