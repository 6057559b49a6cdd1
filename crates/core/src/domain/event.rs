// Queue Event Model (server-push notifications)

use serde::{Deserialize, Serialize};

/// Named state-change events fanned out to live subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventName {
    QueueStarted,
    NextCodeCalled,
    NewCodeAdded,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::QueueStarted => "QUEUE_STARTED",
            EventName::NextCodeCalled => "NEXT_CODE_CALLED",
            EventName::NewCodeAdded => "NEW_CODE_ADDED",
        }
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event as delivered: `{name, payload}` with a JSON payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEvent {
    pub name: EventName,
    pub payload: serde_json::Value,
}

impl QueueEvent {
    pub fn new(name: EventName, payload: serde_json::Value) -> Self {
        Self { name, payload }
    }
}
