//! Recorded simulation events.

use std::fmt;

use serde::Serialize;

use crate::runtime::format_log;

use super::value::Value;

/// One observable step of a simulated network.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    SystemChange { mode: String },
    LocalChange { node: String, state: String },
    /// `level` is `None` for plain `print`.
    Log {
        node: String,
        level: Option<String>,
        message: String,
    },
    Publish { node: String, topic: String, value: Value },
    /// A listener on `node` received a value from `source` (`Node.topic`).
    Deliver { node: String, source: String, value: Value },
    Request {
        from: String,
        node: String,
        func: String,
        silent: bool,
    },
    Fault { node: String, message: String },
}

impl TraceEvent {
    /// Whether the generated program prints this event.
    pub fn is_output(&self) -> bool {
        matches!(self, TraceEvent::SystemChange { .. } | TraceEvent::Log { .. })
    }

    fn kind(&self) -> &'static str {
        match self {
            TraceEvent::SystemChange { .. } => "system",
            TraceEvent::LocalChange { .. } => "local",
            TraceEvent::Log { .. } => "log",
            TraceEvent::Publish { .. } => "publish",
            TraceEvent::Deliver { .. } => "deliver",
            TraceEvent::Request { .. } => "request",
            TraceEvent::Fault { .. } => "fault",
        }
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEvent::SystemChange { mode } => write!(f, "[SYS] Transitioning to: {}", mode),
            TraceEvent::LocalChange { node, state } => {
                write!(f, "[{}] entering local mode '{}'", node, state)
            }
            TraceEvent::Log {
                node,
                level: Some(level),
                message,
            } => write!(f, "{}", format_log(node, level, message)),
            TraceEvent::Log { message, .. } => write!(f, "{}", message),
            TraceEvent::Publish { node, topic, value } => {
                write!(f, "[{}] publish {} = {}", node, topic, value)
            }
            TraceEvent::Deliver {
                node,
                source,
                value,
            } => write!(f, "[{}] deliver {} = {}", node, source, value),
            TraceEvent::Request {
                from,
                node,
                func,
                silent,
            } => {
                let mode = if *silent { " (silent)" } else { "" };
                write!(f, "[{}] request {}.{}{}", from, node, func, mode)
            }
            TraceEvent::Fault { node, message } => write!(f, "[{}] fault: {}", node, message),
        }
    }
}

/// JSON form of an event for `rivetc simulate --error-format json`.
#[derive(Debug, Serialize)]
pub struct TraceRecord {
    pub kind: &'static str,
    pub text: String,
}

impl From<&TraceEvent> for TraceRecord {
    fn from(event: &TraceEvent) -> Self {
        Self {
            kind: event.kind(),
            text: event.to_string(),
        }
    }
}

/// The events of one simulation run, in order.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    pub events: Vec<TraceEvent>,
}

impl Trace {
    /// Lines the generated program would print.
    pub fn output_lines(&self) -> Vec<String> {
        self.events
            .iter()
            .filter(|e| e.is_output())
            .map(|e| e.to_string())
            .collect()
    }

    pub fn faults(&self) -> impl Iterator<Item = &TraceEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e, TraceEvent::Fault { .. }))
    }

    /// Index of the first event matching `pred`.
    pub fn position(&self, pred: impl Fn(&TraceEvent) -> bool) -> Option<usize> {
        self.events.iter().position(pred)
    }

    pub fn records(&self) -> Vec<TraceRecord> {
        self.events.iter().map(TraceRecord::from).collect()
    }
}
