//! Source-to-source lowering for the playground's script dialect.
//!
//! The dialect is Lua 5.4 plus:
//! - type annotations on bindings, parameters and return values
//! - generic parameter lists on functions
//! - `type` / `export type` aliases
//! - component syntax (`<Tag prop={x}>child</Tag>`, `<>...</>`)
//!
//! Output is plain Lua with the same line structure as the input, so runtime
//! error line numbers point at the user's source.

mod component;
mod options;
mod scanner;
mod transpile;
mod types;

pub use options::{Preset, TranspileOptions};
pub use playground_core::{TranspileError, Transpiler};

use transpile::{Stop, Transpile};

/// Lower `source` with the given options.
///
/// # Errors
/// Returns error with a 1-based position if the source is malformed.
pub fn transpile(source: &str, options: &TranspileOptions) -> Result<String, TranspileError> {
    let mut pass = Transpile::new(source, options);
    pass.run(Stop::Eof)?;
    Ok(pass.out)
}

/// [`Transpiler`] for the playground dialect.
#[derive(Debug, Clone, Default)]
pub struct Luax {
    options: TranspileOptions,
}

impl Luax {
    #[must_use]
    pub const fn new(options: TranspileOptions) -> Self {
        Self { options }
    }

    /// Transpiler using [`Preset::standard`].
    #[must_use]
    pub fn standard() -> Self {
        Self::new(Preset::standard())
    }

    #[must_use]
    pub const fn options(&self) -> &TranspileOptions {
        &self.options
    }
}

impl Transpiler for Luax {
    fn transpile(&self, source: &str, filename: &str) -> Result<String, TranspileError> {
        transpile(source, &self.options).inspect_err(|e| {
            tracing::debug!(filename, error = %e, "Transpile failed");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transpiler_trait_object() {
        let t: Box<dyn Transpiler> = Box::new(Luax::standard());
        let out = t
            .transpile("local n: number = #<p>hi</p>", "index.luax")
            .unwrap();
        assert_eq!(out, r#"local n = #UI.createElement("p", nil, "hi")"#);
    }

    #[test]
    fn error_carries_position() {
        let err = Luax::standard()
            .transpile("local a = 1\nlocal b = 'x", "index.luax")
            .unwrap_err();
        assert_eq!((err.line, err.column), (2, 11));
        assert_eq!(err.to_string(), "2:11: unfinished string");
    }
}
