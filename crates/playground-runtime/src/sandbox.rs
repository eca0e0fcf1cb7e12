//! Removal of globals that reach outside the execution context.

use mlua::{Lua, Value};

/// Globals removed before user code runs.
pub const STRIPPED_GLOBALS: &[&str] = &[
    "os",
    "io",
    "debug",
    "require",
    "package",
    "load",
    "loadfile",
    "dofile",
    "collectgarbage",
];

/// Strip filesystem, process, loader and GC access from the global scope.
///
/// # Errors
/// Returns error if the global table cannot be modified.
pub fn sandbox_globals(lua: &Lua) -> mlua::Result<()> {
    let globals = lua.globals();
    for name in STRIPPED_GLOBALS {
        globals.set(*name, Value::Nil)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stripped_globals_are_nil() {
        let lua = Lua::new();
        sandbox_globals(&lua).unwrap();
        for name in STRIPPED_GLOBALS {
            let value: Value = lua.globals().get(*name).unwrap();
            assert!(value.is_nil(), "{name} should be removed");
        }
        let kept: String = lua.load("return string.upper(type(math.floor))").eval().unwrap();
        assert_eq!(kept, "FUNCTION");
    }

    #[test]
    fn user_code_cannot_reach_os() {
        let lua = Lua::new();
        sandbox_globals(&lua).unwrap();
        assert!(lua.load("os.exit(1)").exec().is_err());
    }
}
