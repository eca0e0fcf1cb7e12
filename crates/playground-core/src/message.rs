//! Messages exchanged between the host controller and the execution context.
//!
//! Wire shapes:
//! - host → context: `{"code": ".."}` | `{"css": ".."}` | `{"html": ".."}`
//! - context → host: `"request_default_static"` | `"request_default_code"` |
//!   `{"console": "log", "payload": "[..]"}` | `{"console": "clear"}`

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{FragmentKind, LogChannel};

/// Message from the host to the execution context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostMessage {
    /// Script fragment in the authoring dialect.
    Code(String),
    /// Style fragment.
    Css(String),
    /// Markup fragment.
    Html(String),
}

impl HostMessage {
    /// Which fragment this message carries.
    #[must_use]
    pub const fn kind(&self) -> FragmentKind {
        match self {
            Self::Code(_) => FragmentKind::Script,
            Self::Css(_) => FragmentKind::Style,
            Self::Html(_) => FragmentKind::Markup,
        }
    }

    /// The carried fragment text.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Code(s) | Self::Css(s) | Self::Html(s) => s,
        }
    }
}

/// Handshake signal sent by a freshly activated context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeRequest {
    /// Ask for the current style and markup.
    RequestDefaultStatic,
    /// Ask for the current script.
    RequestDefaultCode,
}

impl HandshakeRequest {
    /// Fragments that answer this request, in the order they are re-sent.
    #[must_use]
    pub const fn answered_by(self) -> &'static [FragmentKind] {
        match self {
            Self::RequestDefaultStatic => &[FragmentKind::Markup, FragmentKind::Style],
            Self::RequestDefaultCode => &[FragmentKind::Script],
        }
    }
}

/// A console event posted by the interception shim.
///
/// `payload` is the JSON text of the argument array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "console", rename_all = "lowercase")]
pub enum ConsoleMessage {
    Log { payload: String },
    Warn { payload: String },
    Error { payload: String },
    /// Transpile failure, only posted when compile errors are surfaced.
    Compile { payload: String },
    Clear,
}

impl ConsoleMessage {
    /// Build a console message, serializing the arguments as one JSON array.
    ///
    /// `clear` ignores its arguments.
    #[must_use]
    pub fn new(channel: LogChannel, args: &[Value]) -> Self {
        let payload = || Value::Array(args.to_vec()).to_string();
        match channel {
            LogChannel::Log => Self::Log { payload: payload() },
            LogChannel::Warn => Self::Warn { payload: payload() },
            LogChannel::Error => Self::Error { payload: payload() },
            LogChannel::Compile => Self::Compile { payload: payload() },
            LogChannel::Clear => Self::Clear,
        }
    }

    /// Shorthand for an `error` event carrying a single message string.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogChannel::Error, &[Value::String(message.into())])
    }

    /// The channel this message was posted on.
    #[must_use]
    pub const fn channel(&self) -> LogChannel {
        match self {
            Self::Log { .. } => LogChannel::Log,
            Self::Warn { .. } => LogChannel::Warn,
            Self::Error { .. } => LogChannel::Error,
            Self::Compile { .. } => LogChannel::Compile,
            Self::Clear => LogChannel::Clear,
        }
    }

    /// The serialized argument array, absent for `clear`.
    #[must_use]
    pub fn payload(&self) -> Option<&str> {
        match self {
            Self::Log { payload }
            | Self::Warn { payload }
            | Self::Error { payload }
            | Self::Compile { payload } => Some(payload),
            Self::Clear => None,
        }
    }
}

/// Message from the execution context to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextMessage {
    /// Handshake request signal.
    Request(HandshakeRequest),
    /// Intercepted console output or uncaught error.
    Console(ConsoleMessage),
}

impl From<ConsoleMessage> for ContextMessage {
    fn from(msg: ConsoleMessage) -> Self {
        Self::Console(msg)
    }
}

impl From<HandshakeRequest> for ContextMessage {
    fn from(req: HandshakeRequest) -> Self {
        Self::Request(req)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn host_message_wire_shape() {
        let json = serde_json::to_string(&HostMessage::Css("p{}".into())).unwrap();
        assert_eq!(json, r#"{"css":"p{}"}"#);

        let parsed: HostMessage = serde_json::from_str(r#"{"code":"print(1)"}"#).unwrap();
        assert_eq!(parsed, HostMessage::Code("print(1)".into()));
        assert_eq!(parsed.kind(), FragmentKind::Script);
    }

    #[test]
    fn handshake_requests_are_bare_strings() {
        let json = serde_json::to_string(&ContextMessage::Request(
            HandshakeRequest::RequestDefaultStatic,
        ))
        .unwrap();
        assert_eq!(json, r#""request_default_static""#);

        let parsed: ContextMessage = serde_json::from_str(r#""request_default_code""#).unwrap();
        assert_eq!(
            parsed,
            ContextMessage::Request(HandshakeRequest::RequestDefaultCode)
        );
    }

    #[test]
    fn console_message_wire_shape() {
        let msg = ConsoleMessage::new(LogChannel::Log, &[json!("hi")]);
        let json = serde_json::to_value(ContextMessage::from(msg)).unwrap();
        assert_eq!(json, json!({"console": "log", "payload": "[\"hi\"]"}));

        let clear = serde_json::to_value(ContextMessage::from(ConsoleMessage::Clear)).unwrap();
        assert_eq!(clear, json!({"console": "clear"}));
    }

    #[test]
    fn console_message_parses_from_wire() {
        let parsed: ContextMessage =
            serde_json::from_str(r#"{"console":"warn","payload":"[1,2]"}"#).unwrap();
        let ContextMessage::Console(msg) = parsed else {
            panic!("Wrong message type");
        };
        assert_eq!(msg.channel(), LogChannel::Warn);
        assert_eq!(msg.payload(), Some("[1,2]"));
    }

    #[test]
    fn static_request_answers_markup_then_style() {
        assert_eq!(
            HandshakeRequest::RequestDefaultStatic.answered_by(),
            &[FragmentKind::Markup, FragmentKind::Style]
        );
        assert_eq!(
            HandshakeRequest::RequestDefaultCode.answered_by(),
            &[FragmentKind::Script]
        );
    }
}
