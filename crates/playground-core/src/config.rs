//! Playground configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::log_store::DEFAULT_HISTORY_BYTES;

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// An auxiliary type declaration file for the editing surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationSource {
    /// Library name the declarations describe.
    pub name: String,
    /// Where to fetch the declaration text from.
    pub url: String,
}

/// Runtime configuration shared by host and context.
///
/// Every field has a default, so a partial JSON document is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaygroundConfig {
    /// Diagnostic name of the script fragment.
    pub filename: String,
    /// Publish edits immediately instead of waiting for an explicit run.
    pub autorun: bool,
    /// Post a `compile` log event when the script fails to transpile.
    pub surface_compile_errors: bool,
    /// Approximate byte limit of the host log history.
    pub max_history_bytes: usize,
    /// Maximum component nesting while rendering.
    pub max_render_depth: usize,
    /// Strip filesystem, process and loader globals before user code runs.
    pub sandbox: bool,
    /// Declaration files fetched once at host start.
    pub declarations: Vec<DeclarationSource>,
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            filename: "index.luax".to_string(),
            autorun: true,
            surface_compile_errors: false,
            max_history_bytes: DEFAULT_HISTORY_BYTES,
            max_render_depth: 256,
            sandbox: true,
            declarations: Vec::new(),
        }
    }
}

impl PlaygroundConfig {
    /// Parse a configuration from JSON text.
    ///
    /// # Errors
    /// Returns error if the text is not a valid configuration document.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a configuration from a JSON file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Set the script filename.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Set the autorun flag.
    #[must_use]
    pub const fn with_autorun(mut self, autorun: bool) -> Self {
        self.autorun = autorun;
        self
    }

    /// Surface transpile failures as `compile` log events.
    #[must_use]
    pub const fn with_compile_errors(mut self, surface: bool) -> Self {
        self.surface_compile_errors = surface;
        self
    }
}
