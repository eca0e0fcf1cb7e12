//! Core types for the live playground runtime.
//!
//! This crate provides the fundamental building blocks shared by the host
//! controller and the execution context:
//! - `Fragment` - One of the three user-authored sources
//! - `HostMessage` / `ContextMessage` - The two directions of the message channel
//! - `LogEvent` - A captured console call, stamped by the host
//! - `LogStore` - Broadcast + history for the visible log panel
//! - `PlaygroundConfig` - Runtime configuration
//! - `Transpiler` and `DeclarationFetcher` traits

pub mod config;
pub mod fragment;
pub mod log_event;
pub mod log_store;
pub mod message;
pub mod traits;

pub use config::{ConfigError, DeclarationSource, PlaygroundConfig};
pub use fragment::{Fragment, FragmentKind, Fragments};
pub use log_event::{LogChannel, LogEvent};
pub use log_store::{LogStore, LogUpdate};
pub use message::{ConsoleMessage, ContextMessage, HandshakeRequest, HostMessage};
pub use traits::{DeclarationFetcher, FetchError, TranspileError, Transpiler, TypeDeclaration};

/// Identifier of one execution context session.
pub type SessionId = uuid::Uuid;
