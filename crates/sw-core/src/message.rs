//! Cross-context control messages.

use serde_json::Value;

/// Literal payload that asks a waiting worker to activate.
pub const SKIP_WAITING: &str = "skipWaiting";

/// A recognised control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Activate the waiting worker without waiting for clients to close.
    SkipWaiting,
}

impl ControlMessage {
    /// Parse a message payload. Anything but the exact string is `None`.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        match payload {
            Value::String(s) if s == SKIP_WAITING => Some(Self::SkipWaiting),
            _ => None,
        }
    }

    /// Wire payload for this message.
    pub fn to_payload(self) -> Value {
        match self {
            Self::SkipWaiting => Value::String(SKIP_WAITING.to_string()),
        }
    }
}

/// A message delivered to a worker.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    /// Origin of the sending context.
    pub origin: String,
    /// Structured message payload.
    pub data: Value,
}

impl MessageEvent {
    /// Create a message event.
    pub fn new(origin: impl Into<String>, data: Value) -> Self {
        Self {
            origin: origin.into(),
            data,
        }
    }

    /// Create a message event carrying a control message.
    pub fn control(origin: impl Into<String>, message: ControlMessage) -> Self {
        Self::new(origin, message.to_payload())
    }

    /// The control message carried by this event, if any.
    pub fn control_message(&self) -> Option<ControlMessage> {
        ControlMessage::from_payload(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exact_payload_only() {
        assert_eq!(
            ControlMessage::from_payload(&json!("skipWaiting")),
            Some(ControlMessage::SkipWaiting)
        );
        assert_eq!(ControlMessage::from_payload(&json!("skipwaiting")), None);
        assert_eq!(ControlMessage::from_payload(&json!(" skipWaiting")), None);
        assert_eq!(ControlMessage::from_payload(&json!({"type": "skipWaiting"})), None);
        assert_eq!(ControlMessage::from_payload(&json!(null)), None);
    }

    #[test]
    fn test_control_event() {
        let event = MessageEvent::control("http://localhost:3000", ControlMessage::SkipWaiting);

        assert_eq!(event.data, json!("skipWaiting"));
        assert_eq!(event.control_message(), Some(ControlMessage::SkipWaiting));
    }
}
