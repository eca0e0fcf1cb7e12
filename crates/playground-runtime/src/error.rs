//! Runtime error types.

use thiserror::Error;

/// Errors raised while building or driving an execution context.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Lua error: {0}")]
    Lua(#[from] mlua::Error),
    #[error("Execution context is closed")]
    ContextClosed,
    #[error("Failed to start execution context: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Human-readable message of a Lua error, without mlua's prefixes or the traceback.
#[must_use]
pub fn lua_error_message(err: &mlua::Error) -> String {
    let message = match err {
        mlua::Error::RuntimeError(msg) | mlua::Error::MemoryError(msg) => msg.clone(),
        mlua::Error::SyntaxError { message, .. } => message.clone(),
        mlua::Error::CallbackError { cause, .. } => return lua_error_message(cause),
        other => other.to_string(),
    };
    match message.find("\nstack traceback:") {
        Some(idx) => message[..idx].to_string(),
        None => message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_traceback() {
        let err = mlua::Error::RuntimeError(
            "index.luax:1: boom\nstack traceback:\n\t[C]: in ?".to_string(),
        );
        assert_eq!(lua_error_message(&err), "index.luax:1: boom");
    }

    #[test]
    fn unwraps_callback_errors() {
        let err = mlua::Error::CallbackError {
            traceback: String::new(),
            cause: std::sync::Arc::new(mlua::Error::RuntimeError("inner".to_string())),
        };
        assert_eq!(lua_error_message(&err), "inner");
    }

    #[test]
    fn lua_and_spawn_errors_convert() {
        let err = RuntimeError::from(mlua::Error::RuntimeError("bad".to_string()));
        assert_eq!(err.to_string(), "Lua error: runtime error: bad");

        let err = RuntimeError::from(std::io::Error::other("no threads"));
        assert!(matches!(err, RuntimeError::Spawn(_)));
        assert_eq!(RuntimeError::ContextClosed.to_string(), "Execution context is closed");
    }
}
