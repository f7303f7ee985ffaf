//! # Stage Interpreter
//!
//! Turns the server's stage events into mutations of the one in-flight
//! assistant message.
//!
//! ```text
//!                 ┌──────────── reflection ◄───────────┐
//!                 ▼                                    │ failed
//! Initializing → Routing → Planning → Executing ───────┘
//!                    │                    │ complete
//!                    └──── direct ────────┴──► Synthesizing
//!                                                  │
//!                      query_complete / agent_error▼
//!                                             Finalized
//! ```
//!
//! The graph is cyclic (retries revisit planning and execution) and the
//! machine only advances on events; there are no timeouts.
//!
//! The detail log is chronological and never reordered. Attempt outcomes,
//! performance and errors are appended. A plan amends the most recent entry
//! when that entry is itself a plan (the newer code supersedes it), and is
//! appended otherwise, so the plan behind each failed attempt stays above it.

use std::fmt;

use crate::core::event::{
    AgentError, DEFAULT_ROUTE, ExecutionUpdate, PlanUpdate, QueryComplete, RouterUpdate,
    StageStatus, StageUpdate, SynthesisUpdate,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
}

/// Where the remote pipeline currently is, as far as this message knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Routing,
    Planning,
    Executing,
    Synthesizing,
    Finalized(Outcome),
}

/// One-line status summary shown in the status region header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summary {
    Initializing,
    Routing { decision: String },
    GeneratingCode,
    Executing {
        attempt: Option<u32>,
        max_retries: Option<u32>,
    },
    Synthesized,
    Error,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn or_unknown(n: Option<u32>) -> String {
            n.map_or_else(|| "?".to_string(), |n| n.to_string())
        }
        match self {
            Summary::Initializing => write!(f, "Initializing..."),
            Summary::Routing { decision } => write!(f, "Routing... Decision: {decision}"),
            Summary::GeneratingCode => write!(f, "Generating Code..."),
            Summary::Executing {
                attempt,
                max_retries,
            } => write!(
                f,
                "Executing... (Attempt {}/{})",
                or_unknown(*attempt),
                or_unknown(*max_retries)
            ),
            Summary::Synthesized => write!(f, "Final Answer Synthesized"),
            Summary::Error => write!(f, "Error!"),
        }
    }
}

/// The collapsible status region of an assistant message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRegion {
    /// Hidden until the first stage event arrives.
    pub visible: bool,
    /// Whether the detail log is shown under the summary.
    pub expanded: bool,
    pub summary: Summary,
}

impl Default for StatusRegion {
    fn default() -> Self {
        Self {
            visible: false,
            expanded: true,
            summary: Summary::Initializing,
        }
    }
}

/// One detail log record.
#[derive(Debug, Clone, PartialEq)]
pub enum LogEntry {
    /// Code from the planner or reflection stage.
    Plan(String),
    AttemptSucceeded { attempt: Option<u32>, output: String },
    AttemptFailed { attempt: Option<u32>, output: String },
    /// Named timings in seconds, "Total Time" first.
    Performance(Vec<(String, f64)>),
    Error(String),
}

/// Detail log under the status summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailLog {
    entries: Vec<LogEntry>,
}

impl DetailLog {
    /// Record generated code. Replaces the last entry if it is a plan nothing
    /// has run against yet; otherwise appends.
    pub fn record_plan(&mut self, code: impl Into<String>) {
        let code = code.into();
        match self.entries.last_mut() {
            Some(LogEntry::Plan(current)) => *current = code,
            _ => self.entries.push(LogEntry::Plan(code)),
        }
    }

    pub fn append(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    /// The most recently recorded plan.
    pub fn latest_plan(&self) -> Option<&str> {
        self.entries.iter().rev().find_map(|entry| match entry {
            LogEntry::Plan(code) => Some(code.as_str()),
            _ => None,
        })
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What the body of the assistant message shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentRegion {
    /// Animated "thinking" indicator.
    Placeholder,
    /// Markdown answer from the synthesis stage.
    Answer(String),
    /// Generic failure notice; details live in the log.
    Error,
    /// The query finished without a synthesized answer.
    NoAnswer,
}

/// Extended state of an assistant transcript entry.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantMessage {
    pub phase: Phase,
    pub status: StatusRegion,
    pub log: DetailLog,
    pub content: ContentRegion,
}

impl Default for AssistantMessage {
    fn default() -> Self {
        Self::new()
    }
}

impl AssistantMessage {
    pub fn new() -> Self {
        Self {
            phase: Phase::Initializing,
            status: StatusRegion::default(),
            log: DetailLog::default(),
            content: ContentRegion::Placeholder,
        }
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.phase, Phase::Finalized(_))
    }

    pub fn errored(&self) -> bool {
        self.phase == Phase::Finalized(Outcome::Error)
    }

    /// Apply one stage event. Any event, even an unknown stage, reveals the
    /// status region; unknown stages change nothing else.
    pub fn apply(&mut self, update: &StageUpdate) {
        if self.is_finalized() {
            return;
        }
        self.reveal_status();
        match update {
            StageUpdate::Router(router) => self.on_router(router),
            StageUpdate::Planner(plan) | StageUpdate::Reflection(plan) => self.on_plan(plan),
            StageUpdate::Execution(execution) => self.on_execution(execution),
            StageUpdate::Synthesis(synthesis) => self.on_synthesis(synthesis),
            StageUpdate::Unknown => {}
        }
    }

    fn reveal_status(&mut self) {
        self.status.visible = true;
    }

    fn on_router(&mut self, router: &RouterUpdate) {
        self.phase = Phase::Routing;
        let decision = router
            .decision
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_ROUTE);
        self.status.summary = Summary::Routing {
            decision: decision.to_string(),
        };
    }

    fn on_plan(&mut self, plan: &PlanUpdate) {
        self.phase = Phase::Planning;
        self.status.summary = Summary::GeneratingCode;
        if let Some(code) = plan.code.as_deref().filter(|c| !c.is_empty()) {
            self.log.record_plan(code);
        }
    }

    fn on_execution(&mut self, execution: &ExecutionUpdate) {
        // Outcome events omit max_retries; keep the last one the server sent.
        let (known_attempt, known_max) = match self.status.summary {
            Summary::Executing {
                attempt,
                max_retries,
            } => (attempt, max_retries),
            _ => (None, None),
        };
        let attempt = execution.attempt.or(known_attempt);
        self.phase = Phase::Executing;
        self.status.summary = Summary::Executing {
            attempt,
            max_retries: execution.max_retries.or(known_max),
        };
        let output = execution.output.clone().unwrap_or_default();
        match execution.status {
            Some(StageStatus::Complete) => {
                self.log.append(LogEntry::AttemptSucceeded { attempt, output })
            }
            Some(StageStatus::Failed) => self.log.append(LogEntry::AttemptFailed { attempt, output }),
            _ => {}
        }
    }

    fn on_synthesis(&mut self, synthesis: &SynthesisUpdate) {
        self.phase = Phase::Synthesizing;
        self.status.summary = Summary::Synthesized;
        if synthesis.status == Some(StageStatus::Complete)
            && let Some(answer) = synthesis.answer.as_deref().filter(|a| !a.is_empty())
        {
            self.content = ContentRegion::Answer(answer.to_string());
        }
    }

    /// Final mutation for `query_complete`.
    pub fn complete(&mut self, complete: &QueryComplete) {
        let timings = complete.numeric_timings();
        if !timings.is_empty() {
            self.log.append(LogEntry::Performance(timings));
        }
        // Collapse, but keep it visible for later inspection.
        self.status.expanded = false;
        if self.content == ContentRegion::Placeholder {
            self.content = ContentRegion::NoAnswer;
        }
        self.phase = Phase::Finalized(Outcome::Success);
    }

    /// Final mutation for `agent_error` while this message is pending.
    pub fn fail(&mut self, error: &AgentError) {
        self.content = ContentRegion::Error;
        self.status.visible = true;
        self.status.expanded = true;
        self.status.summary = Summary::Error;
        self.log.append(LogEntry::Error(error.error.clone()));
        self.phase = Phase::Finalized(Outcome::Error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::{ServerEvent, STAGE_UPDATE};
    use serde_json::json;

    fn update(payload: serde_json::Value) -> StageUpdate {
        match ServerEvent::decode(STAGE_UPDATE, payload) {
            Some(ServerEvent::StageUpdate(u)) => u,
            other => panic!("expected stage update, got {:?}", other),
        }
    }

    #[test]
    fn new_message_is_hidden_placeholder() {
        let msg = AssistantMessage::new();
        assert!(!msg.status.visible);
        assert!(msg.status.expanded);
        assert_eq!(msg.status.summary, Summary::Initializing);
        assert_eq!(msg.content, ContentRegion::Placeholder);
        assert!(msg.log.is_empty());
    }

    #[test]
    fn first_event_reveals_status_once() {
        let mut msg = AssistantMessage::new();
        msg.apply(&update(json!({"stage": "router"})));
        assert!(msg.status.visible);
        msg.apply(&update(json!({"stage": "router", "decision": "direct_answer"})));
        assert!(msg.status.visible);
        assert_eq!(
            msg.status.summary.to_string(),
            "Routing... Decision: direct_answer"
        );
    }

    #[test]
    fn router_defaults_decision_label() {
        let mut msg = AssistantMessage::new();
        msg.apply(&update(json!({"stage": "router", "status": "running"})));
        assert_eq!(msg.phase, Phase::Routing);
        assert_eq!(msg.status.summary.to_string(), "Routing... Decision: analysis");
    }

    #[test]
    fn later_plan_replaces_earlier_plan() {
        let mut msg = AssistantMessage::new();
        msg.apply(&update(json!({"stage": "planner", "code": "print(1)"})));
        msg.apply(&update(json!({"stage": "planner", "code": "print(2)"})));
        assert_eq!(msg.log.entries(), &[LogEntry::Plan("print(2)".into())]);
        assert_eq!(msg.status.summary, Summary::GeneratingCode);
    }

    #[test]
    fn plan_without_code_keeps_previous_plan() {
        let mut msg = AssistantMessage::new();
        msg.apply(&update(json!({"stage": "planner", "code": "df.head()"})));
        msg.apply(&update(json!({"stage": "reflection", "status": "running"})));
        assert_eq!(msg.log.latest_plan(), Some("df.head()"));
        assert_eq!(msg.log.entries().len(), 1);
        assert_eq!(msg.phase, Phase::Planning);
    }

    #[test]
    fn execution_attempts_accumulate_in_order() {
        let mut msg = AssistantMessage::new();
        msg.apply(&update(json!({
            "stage": "execution", "attempt": 1, "max_retries": 3,
            "status": "failed", "output": "NameError"
        })));
        msg.apply(&update(json!({
            "stage": "execution", "attempt": 2, "max_retries": 3,
            "status": "complete", "output": "4"
        })));
        assert_eq!(
            msg.log.entries(),
            &[
                LogEntry::AttemptFailed {
                    attempt: Some(1),
                    output: "NameError".into()
                },
                LogEntry::AttemptSucceeded {
                    attempt: Some(2),
                    output: "4".into()
                },
            ]
        );
        assert_eq!(msg.status.summary.to_string(), "Executing... (Attempt 2/3)");
    }

    #[test]
    fn retry_cycle_keeps_each_plan_above_its_attempt() {
        let mut msg = AssistantMessage::new();
        for payload in [
            json!({"stage": "planner", "code": "bad()"}),
            json!({"stage": "execution", "attempt": 1, "max_retries": 3, "status": "running"}),
            json!({"stage": "execution", "attempt": 1, "status": "failed", "output": "ERROR: x"}),
            json!({"stage": "reflection", "code": "good()"}),
            json!({"stage": "execution", "attempt": 2, "max_retries": 3, "status": "running"}),
            json!({"stage": "execution", "attempt": 2, "status": "complete", "output": "ok"}),
        ] {
            msg.apply(&update(payload));
        }
        assert_eq!(
            msg.log.entries(),
            &[
                LogEntry::Plan("bad()".into()),
                LogEntry::AttemptFailed {
                    attempt: Some(1),
                    output: "ERROR: x".into()
                },
                LogEntry::Plan("good()".into()),
                LogEntry::AttemptSucceeded {
                    attempt: Some(2),
                    output: "ok".into()
                },
            ]
        );
        assert_eq!(msg.log.latest_plan(), Some("good()"));
    }

    #[test]
    fn outcome_events_keep_known_retry_budget() {
        // Payload shapes as the agent server sends them
        let mut msg = AssistantMessage::new();
        msg.apply(&update(json!({
            "stage": "execution", "status": "running", "attempt": 1, "max_retries": 3
        })));
        assert_eq!(msg.status.summary.to_string(), "Executing... (Attempt 1/3)");

        msg.apply(&update(json!({
            "stage": "execution", "status": "failed", "attempt": 1, "output": "ERROR: x"
        })));
        assert_eq!(msg.status.summary.to_string(), "Executing... (Attempt 1/3)");

        msg.apply(&update(json!({
            "stage": "execution", "status": "running", "attempt": 2, "max_retries": 3
        })));
        msg.apply(&update(json!({
            "stage": "execution", "status": "complete", "output": "4"
        })));
        assert_eq!(msg.status.summary.to_string(), "Executing... (Attempt 2/3)");
        assert_eq!(
            msg.log.entries().last(),
            Some(&LogEntry::AttemptSucceeded {
                attempt: Some(2),
                output: "4".into()
            })
        );
    }

    #[test]
    fn running_execution_only_updates_summary() {
        let mut msg = AssistantMessage::new();
        msg.apply(&update(json!({"stage": "execution", "status": "running"})));
        assert!(msg.log.entries().is_empty());
        assert_eq!(msg.status.summary.to_string(), "Executing... (Attempt ?/?)");
    }

    #[test]
    fn synthesis_sets_answer_only_when_complete() {
        let mut msg = AssistantMessage::new();
        msg.apply(&update(json!({"stage": "synthesis", "status": "running"})));
        assert_eq!(msg.content, ContentRegion::Placeholder);
        assert_eq!(msg.status.summary, Summary::Synthesized);

        msg.apply(&update(json!({"stage": "synthesis", "status": "complete", "answer": ""})));
        assert_eq!(msg.content, ContentRegion::Placeholder);

        msg.apply(&update(json!({"stage": "synthesis", "status": "complete", "answer": "**4**"})));
        assert_eq!(msg.content, ContentRegion::Answer("**4**".into()));
    }

    #[test]
    fn unknown_stage_only_reveals_status() {
        let mut msg = AssistantMessage::new();
        let mut expected = msg.clone();
        expected.status.visible = true;

        // The server's `error` pseudo-stage decodes as Unknown
        msg.apply(&update(json!({"stage": "error", "error": "API Request Error"})));
        assert_eq!(msg, expected);
        assert_eq!(msg.status.summary.to_string(), "Initializing...");

        msg.apply(&StageUpdate::Unknown);
        assert_eq!(msg, expected);
    }

    #[test]
    fn completion_collapses_and_logs_timings() {
        let mut msg = AssistantMessage::new();
        msg.apply(&update(json!({"stage": "synthesis", "status": "complete", "answer": "done"})));
        let complete: QueryComplete =
            serde_json::from_value(json!({"timings": {"Total Time": 1.23}})).unwrap();
        msg.complete(&complete);

        assert!(msg.status.visible);
        assert!(!msg.status.expanded);
        assert_eq!(
            msg.log.entries().last(),
            Some(&LogEntry::Performance(vec![("Total Time".into(), 1.23)]))
        );
        assert_eq!(msg.phase, Phase::Finalized(Outcome::Success));
        assert!(!msg.errored());
    }

    #[test]
    fn completion_without_answer_stops_placeholder() {
        let mut msg = AssistantMessage::new();
        msg.complete(&QueryComplete::default());
        assert_eq!(msg.content, ContentRegion::NoAnswer);
        assert!(msg.log.is_empty());
    }

    #[test]
    fn failure_forces_status_open_with_detail() {
        let mut msg = AssistantMessage::new();
        msg.status.expanded = false;
        msg.fail(&AgentError::new("timeout"));
        assert!(msg.status.visible);
        assert!(msg.status.expanded);
        assert_eq!(msg.status.summary, Summary::Error);
        assert_eq!(msg.content, ContentRegion::Error);
        assert_eq!(msg.log.entries(), &[LogEntry::Error("timeout".into())]);
        assert!(msg.errored());
    }

    #[test]
    fn finalized_message_ignores_stage_updates() {
        let mut msg = AssistantMessage::new();
        msg.complete(&QueryComplete::default());
        let before = msg.clone();
        msg.apply(&update(json!({"stage": "planner", "code": "late()"})));
        assert_eq!(msg, before);
    }
}
