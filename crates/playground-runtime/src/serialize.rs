//! Deep serialization of Lua values to JSON for console payloads.

use std::ffi::c_void;

use mlua::{Table, Value};
use serde_json::{Map, Number, Value as Json};

/// Deepest table nesting accepted by [`lua_to_json`].
pub const MAX_DEPTH: usize = 64;

/// Serialize one console argument.
///
/// Tables with a positive border become arrays, other tables objects with
/// string keys. Functions, threads and userdata become `null`.
///
/// # Errors
/// Returns a Lua runtime error for cyclic or too deeply nested tables.
pub fn lua_to_json(value: &Value) -> mlua::Result<Json> {
    let mut ancestors = Vec::new();
    convert(value, &mut ancestors)
}

fn convert(value: &Value, ancestors: &mut Vec<*const c_void>) -> mlua::Result<Json> {
    match value {
        Value::Nil => Ok(Json::Null),
        Value::Boolean(b) => Ok(Json::Bool(*b)),
        Value::Integer(i) => Ok(Json::Number((*i).into())),
        Value::Number(n) => Ok(Number::from_f64(*n).map_or(Json::Null, Json::Number)),
        Value::String(s) => Ok(Json::String(s.to_string_lossy())),
        Value::Table(table) => convert_table(table, ancestors),
        Value::Error(err) => Ok(Json::String(crate::lua_error_message(err))),
        _ => Ok(Json::Null),
    }
}

fn convert_table(table: &Table, ancestors: &mut Vec<*const c_void>) -> mlua::Result<Json> {
    let ptr = table.to_pointer();
    if ancestors.contains(&ptr) {
        return Err(mlua::Error::RuntimeError(
            "cannot serialize cyclic table".to_string(),
        ));
    }
    if ancestors.len() >= MAX_DEPTH {
        return Err(mlua::Error::RuntimeError(format!(
            "cannot serialize table nested deeper than {MAX_DEPTH} levels"
        )));
    }
    ancestors.push(ptr);
    let result = table_body(table, ancestors);
    ancestors.pop();
    result
}

fn table_body(table: &Table, ancestors: &mut Vec<*const c_void>) -> mlua::Result<Json> {
    let len = table.raw_len();
    if len > 0 {
        let mut items = Vec::with_capacity(len);
        for i in 1..=len {
            let item: Value = table.raw_get(i)?;
            items.push(convert(&item, ancestors)?);
        }
        return Ok(Json::Array(items));
    }

    let mut map = Map::new();
    for pair in table.pairs::<Value, Value>() {
        let (key, item) = pair?;
        let key = match key {
            Value::String(s) => s.to_string_lossy(),
            Value::Integer(i) => i.to_string(),
            Value::Number(n) => n.to_string(),
            _ => continue,
        };
        if is_opaque(&item) {
            continue;
        }
        map.insert(key, convert(&item, ancestors)?);
    }
    Ok(Json::Object(map))
}

const fn is_opaque(value: &Value) -> bool {
    matches!(
        value,
        Value::Function(_) | Value::Thread(_) | Value::UserData(_) | Value::LightUserData(_)
    )
}
