//! Wire protocol between the editor page and the server.

use serde::{Deserialize, Serialize};

use playground_core::{FragmentKind, Fragments, LogEvent, LogUpdate, SessionId, TypeDeclaration};
use playground_host::HostState;
use playground_runtime::DocumentSnapshot;

/// Message from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// The editor content of one pane changed.
    Edit { fragment: FragmentKind, text: String },
    /// Publish the current fragments.
    Run,
    SetAutorun { enabled: bool },
    /// Restart the execution context.
    Reload,
    /// Ask for the rendered state.
    Snapshot,
    /// Ping for keepalive.
    Ping,
}

/// Message from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Current editor state, sent on connect.
    State { fragments: Fragments, autorun: bool },
    /// One log panel entry. `args` holds each argument serialized on its own.
    Log {
        seq: u64,
        timestamp_ms: u64,
        channel: String,
        args: Vec<String>,
    },
    /// The log panel was cleared.
    Cleared,
    /// Rendered state of the execution context.
    Snapshot {
        session: SessionId,
        stylesheet: String,
        body_html: String,
        styled_css: String,
    },
    /// Type declarations for the editor.
    Declarations { declarations: Vec<TypeDeclaration> },
    /// Error message.
    Error { message: String },
    /// Pong response.
    Pong,
}

impl From<&LogEvent> for ServerMessage {
    fn from(event: &LogEvent) -> Self {
        Self::Log {
            seq: event.seq,
            timestamp_ms: event.timestamp_ms(),
            channel: event.channel.as_str().to_string(),
            args: event.display_args(),
        }
    }
}

impl From<LogUpdate> for ServerMessage {
    fn from(update: LogUpdate) -> Self {
        match update {
            LogUpdate::Appended(event) => Self::from(&event),
            LogUpdate::Cleared { .. } => Self::Cleared,
        }
    }
}

impl From<DocumentSnapshot> for ServerMessage {
    fn from(snapshot: DocumentSnapshot) -> Self {
        Self::Snapshot {
            session: snapshot.session,
            stylesheet: snapshot.stylesheet,
            body_html: snapshot.body_html,
            styled_css: snapshot.styled_css,
        }
    }
}

impl From<HostState> for ServerMessage {
    fn from(state: HostState) -> Self {
        Self::State {
            fragments: state.fragments,
            autorun: state.autorun,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use playground_core::LogChannel;
    use serde_json::json;

    use super::*;

    #[test]
    fn edit_message_parses() {
        let parsed: ClientMessage =
            serde_json::from_str(r#"{"type":"edit","fragment":"style","text":"p {}"}"#).unwrap();
        assert_eq!(
            parsed,
            ClientMessage::Edit {
                fragment: FragmentKind::Style,
                text: "p {}".into()
            }
        );

        let parsed: ClientMessage =
            serde_json::from_str(r#"{"type":"set_autorun","enabled":false}"#).unwrap();
        assert_eq!(parsed, ClientMessage::SetAutorun { enabled: false });
    }

    #[test]
    fn log_event_becomes_display_args() {
        let event = LogEvent {
            seq: 7,
            timestamp: UNIX_EPOCH + Duration::from_millis(1_500),
            channel: LogChannel::Warn,
            payload: Some(vec![json!({"a": 1}), json!([1, 2, 3])]),
        };
        let json = serde_json::to_value(ServerMessage::from(&event)).unwrap();
        assert_eq!(
            json,
            json!({
                "type": "log",
                "seq": 7,
                "timestamp_ms": 1500,
                "channel": "warn",
                "args": ["{\"a\":1}", "[1,2,3]"],
            })
        );
    }

    #[test]
    fn cleared_update_is_bare() {
        let update = LogUpdate::Cleared { seq: 3 };
        let json = serde_json::to_string(&ServerMessage::from(update)).unwrap();
        assert_eq!(json, r#"{"type":"cleared"}"#);
    }
}
