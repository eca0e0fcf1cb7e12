//! Execution context for the live playground.
//!
//! A context owns an embedded Lua state and a small in-memory document. It
//! receives fragments from the host, transpiles and evaluates script, applies
//! style and markup, and reports console output and uncaught errors back.
//!
//! - `Session` - One load of the context: Lua state, document, timers
//! - `spawn_context` / `ContextHandle` - The context thread and its sender
//! - `Document` / `DocumentSnapshot` - Rendered state
//! - `lua_to_json` - Console argument serialization

pub mod console;
pub mod context;
pub mod document;
pub mod error;
pub mod markup;
pub mod sandbox;
pub mod serialize;
pub mod session;
pub mod timers;
pub mod ui;

pub use context::{ContextCommand, ContextHandle, spawn_context};
pub use document::{Document, DocumentSnapshot};
pub use error::{RuntimeError, lua_error_message};
pub use serialize::lua_to_json;
pub use session::Session;
