//! Wire format of browser extension messages.
//!
//! One JSON object per WebSocket frame:
//!
//! ```json
//! {"type":"heartbeat","active_meetings":[{"tab_id":7,"platform":"meet","url":"..."}]}
//! {"type":"meeting_detected","platform":"meet","url":"...","title":"...","timestamp":"..."}
//! {"type":"meeting_ended","platform":"meet","url":"...","title":"...","timestamp":"..."}
//! ```

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

const KNOWN_TYPES: &[&str] = &["heartbeat", "meeting_detected", "meeting_ended"];

#[derive(Debug, Error)]
pub enum BridgeMessageError {
    #[error("message is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("message has no \"type\" field")]
    MissingType,
    #[error("unknown message type: {0}")]
    UnknownType(String),
    #[error("invalid {kind} message: {source}")]
    Invalid {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One meeting tab as reported inside a heartbeat.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BrowserMeeting {
    pub tab_id: Option<i64>,
    pub platform: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub detected_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MeetingEvent {
    #[serde(default)]
    pub tab_id: Option<i64>,
    pub platform: String,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
    Heartbeat {
        #[serde(default)]
        active_meetings: Vec<BrowserMeeting>,
        #[serde(default)]
        extension_version: Option<String>,
    },
    MeetingDetected(MeetingEvent),
    MeetingEnded(MeetingEvent),
}

impl BridgeMessage {
    pub fn parse(text: &str) -> Result<Self, BridgeMessageError> {
        let value: Value = serde_json::from_str(text).map_err(BridgeMessageError::Malformed)?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(BridgeMessageError::MissingType)?
            .to_string();

        if !KNOWN_TYPES.contains(&kind.as_str()) {
            return Err(BridgeMessageError::UnknownType(kind));
        }

        serde_json::from_value(value).map_err(|source| BridgeMessageError::Invalid { kind, source })
    }

    /// Whether this message says a browser meeting is in progress.
    pub fn is_active(&self) -> bool {
        match self {
            Self::Heartbeat {
                active_meetings, ..
            } => !active_meetings.is_empty(),
            Self::MeetingDetected(_) => true,
            Self::MeetingEnded(_) => false,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Heartbeat {
                active_meetings, ..
            } => format!("Heartbeat: {} active meeting(s)", active_meetings.len()),
            Self::MeetingDetected(event) => format!("Meeting detected: {}", event.url),
            Self::MeetingEnded(event) => format!("Meeting ended: {}", event.url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_heartbeat() {
        let msg = BridgeMessage::parse(
            r#"{"type":"heartbeat","active_meetings":[{"tab_id":12,"platform":"meet","url":"https://meet.google.com/abc-defg-hij","title":"Standup","detected_at":"2026-10-18T09:00:00Z"}],"extension_version":"1.2.0","timestamp":"2026-10-18T09:00:20Z"}"#,
        )
        .unwrap();
        assert!(msg.is_active());
        let BridgeMessage::Heartbeat {
            active_meetings,
            extension_version,
        } = msg
        else {
            panic!("expected heartbeat");
        };
        assert_eq!(active_meetings[0].tab_id, Some(12));
        assert_eq!(active_meetings[0].platform.as_deref(), Some("meet"));
        assert_eq!(extension_version.as_deref(), Some("1.2.0"));
    }

    #[test]
    fn test_heartbeat_without_meetings_is_inactive() {
        let msg = BridgeMessage::parse(r#"{"type":"heartbeat"}"#).unwrap();
        assert!(!msg.is_active());
        let msg = BridgeMessage::parse(r#"{"type":"heartbeat","active_meetings":[]}"#).unwrap();
        assert!(!msg.is_active());
    }

    #[test]
    fn test_parse_events() {
        let msg = BridgeMessage::parse(
            r#"{"type":"meeting_detected","tab_id":3,"platform":"teams","url":"https://teams.microsoft.com/x","title":null,"timestamp":"2026-10-18T09:00:00Z"}"#,
        )
        .unwrap();
        assert!(msg.is_active());
        assert_eq!(msg.describe(), "Meeting detected: https://teams.microsoft.com/x");

        let msg = BridgeMessage::parse(
            r#"{"type":"meeting_ended","platform":"teams","url":"https://teams.microsoft.com/x"}"#,
        )
        .unwrap();
        assert!(!msg.is_active());
    }

    #[test]
    fn test_rejects_bad_messages() {
        assert!(matches!(
            BridgeMessage::parse("not json"),
            Err(BridgeMessageError::Malformed(_))
        ));
        assert!(matches!(
            BridgeMessage::parse(r#"{"active_meetings":[]}"#),
            Err(BridgeMessageError::MissingType)
        ));
        assert!(matches!(
            BridgeMessage::parse(r#"{"type":"ping"}"#),
            Err(BridgeMessageError::UnknownType(t)) if t == "ping"
        ));
        assert!(matches!(
            BridgeMessage::parse(r#"{"type":"meeting_detected","platform":"meet"}"#),
            Err(BridgeMessageError::Invalid { .. })
        ));
    }
}
