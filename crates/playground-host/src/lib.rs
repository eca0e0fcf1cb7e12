//! Host controller for the live playground.
//!
//! Provides:
//! - `HostController` - Owns the fragments, answers handshakes, records logs
//! - `HostHandle` - Cloneable command sender for a running controller
//! - `HttpFetcher` - Fetches auxiliary type declarations over HTTP

pub mod controller;
pub mod declarations;

pub use controller::{
    HostCommand, HostController, HostError, HostHandle, HostState, start_host, start_host_with,
};
pub use declarations::{HttpFetcher, fetch_declarations};
