//! Transport between the playground host and a browser editor.
//!
//! Provides:
//! - Wire protocol (tagged JSON)
//! - WebSocket transport (feature: websocket)

pub mod protocol;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use protocol::{ClientMessage, ServerMessage};
