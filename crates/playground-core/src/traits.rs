//! Core traits for transpiling and declaration fetching.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::DeclarationSource;

/// Transpile error with the position it was detected at (1-based).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}:{column}: {message}")]
pub struct TranspileError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl TranspileError {
    /// Create a transpile error.
    #[must_use]
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

/// Turns authoring-dialect source into directly executable code.
pub trait Transpiler: Send + Sync {
    /// Transpile `source`; `filename` is only used for diagnostics.
    ///
    /// # Errors
    /// Returns error if the source is malformed.
    fn transpile(&self, source: &str, filename: &str) -> Result<String, TranspileError>;
}

/// Fetched declaration text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDeclaration {
    pub name: String,
    pub text: String,
}

/// Declaration fetch error.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Unexpected status {status} for {url}")]
    Status { status: u16, url: String },
}

/// Source of auxiliary type declarations for the editing surface.
#[async_trait]
pub trait DeclarationFetcher: Send + Sync {
    /// Fetch one declaration file.
    async fn fetch(&self, source: &DeclarationSource) -> Result<TypeDeclaration, FetchError>;
}
