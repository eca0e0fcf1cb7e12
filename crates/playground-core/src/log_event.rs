//! Log events as recorded by the host.

use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ConsoleMessage;

/// Console channel of a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogChannel {
    Log,
    Warn,
    Error,
    /// Transpile failure (opt-in).
    Compile,
    /// Truncates the history.
    Clear,
}

impl LogChannel {
    /// Wire name of the channel.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Compile => "compile",
            Self::Clear => "clear",
        }
    }
}

impl fmt::Display for LogChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed console call or runtime error.
///
/// The timestamp is assigned by the host on receipt, never by the context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Host-side sequence number, monotonically increasing.
    pub seq: u64,
    /// Receipt time.
    pub timestamp: SystemTime,
    pub channel: LogChannel,
    /// Decoded argument array, absent for `clear`.
    pub payload: Option<Vec<Value>>,
}

impl LogEvent {
    /// Stamp a console message received from the context.
    ///
    /// A payload that is not a JSON array is kept as a single argument; text
    /// that is not JSON at all becomes a single string argument.
    #[must_use]
    pub fn from_console(msg: &ConsoleMessage, seq: u64, timestamp: SystemTime) -> Self {
        let payload = msg.payload().map(decode_payload);
        Self {
            seq,
            timestamp,
            channel: msg.channel(),
            payload,
        }
    }

    /// Each argument re-serialized independently for display.
    #[must_use]
    pub fn display_args(&self) -> Vec<String> {
        self.payload
            .iter()
            .flatten()
            .map(Value::to_string)
            .collect()
    }

    /// Receipt time as Unix epoch milliseconds.
    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }

    /// Rough in-memory size, used to cap the history.
    #[must_use]
    pub fn approx_bytes(&self) -> usize {
        const OVERHEAD: usize = 48;
        OVERHEAD
            + self
                .payload
                .iter()
                .flatten()
                .map(|v| v.to_string().len())
                .sum::<usize>()
    }
}

fn decode_payload(raw: &str) -> Vec<Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items,
        Ok(other) => vec![other],
        Err(_) => vec![Value::String(raw.to_string())],
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_argument_array() {
        let msg = ConsoleMessage::Log {
            payload: r#"[{"a":1},[1,2,3]]"#.into(),
        };
        let event = LogEvent::from_console(&msg, 0, SystemTime::now());
        assert_eq!(event.channel, LogChannel::Log);
        assert_eq!(event.payload, Some(vec![json!({"a": 1}), json!([1, 2, 3])]));
        assert_eq!(event.display_args(), vec![r#"{"a":1}"#, "[1,2,3]"]);
    }

    #[test]
    fn strings_display_as_json() {
        let msg = ConsoleMessage::Log {
            payload: r#"["hi"]"#.into(),
        };
        let event = LogEvent::from_console(&msg, 0, SystemTime::now());
        assert_eq!(event.payload, Some(vec![json!("hi")]));
        assert_eq!(event.display_args(), vec![r#""hi""#]);
    }

    #[test]
    fn clear_has_no_payload() {
        let event = LogEvent::from_console(&ConsoleMessage::Clear, 3, SystemTime::now());
        assert_eq!(event.channel, LogChannel::Clear);
        assert!(event.payload.is_none());
        assert!(event.display_args().is_empty());
    }

    #[test]
    fn malformed_payload_is_kept_as_text() {
        let msg = ConsoleMessage::Error {
            payload: "not json".into(),
        };
        let event = LogEvent::from_console(&msg, 0, SystemTime::now());
        assert_eq!(event.payload, Some(vec![json!("not json")]));
    }

    #[test]
    fn timestamp_in_millis() {
        let ts = UNIX_EPOCH + std::time::Duration::from_millis(1_500);
        let event = LogEvent::from_console(&ConsoleMessage::Clear, 0, ts);
        assert_eq!(event.timestamp_ms(), 1_500);
    }
}
