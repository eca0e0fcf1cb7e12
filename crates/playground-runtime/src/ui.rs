//! Rendering globals: `UI`, `UIDom`, `styled` and `document`.
//!
//! Elements are plain Lua tables built by `UI.createElement`. `UIDom.render`
//! turns an element tree into document nodes, calling function components
//! along the way, and swaps them in as the children of a target element.

use std::{
    cell::RefCell,
    collections::{BTreeMap, HashSet},
    hash::{DefaultHasher, Hash, Hasher},
    rc::Rc,
};

use mlua::{Lua, MultiValue, Table, Value, Variadic};

use crate::document::{Document, Element, KeyAlloc, Node, NodeKey, escape_html};

const ELEMENT_MARK: &str = "__ui_element";
const NODE_FIELD: &str = "__node";

/// Rules registered through `styled`, one per distinct CSS text.
#[derive(Debug, Default)]
pub struct StyledSheet {
    classes: HashSet<String>,
    rules: Vec<String>,
}

impl StyledSheet {
    /// Register `css` and return its generated class name.
    pub fn register(&mut self, css: &str) -> String {
        let mut hasher = DefaultHasher::new();
        css.hash(&mut hasher);
        let class = format!("sc-{:x}", hasher.finish());
        if self.classes.insert(class.clone()) {
            self.rules.push(format!(".{class} {{ {} }}", css.trim()));
        }
        class
    }

    pub fn css(&self) -> String {
        self.rules.join("\n")
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Document state shared between the session and the rendering globals.
#[derive(Debug)]
pub struct Dom {
    pub document: RefCell<Document>,
    pub keys: KeyAlloc,
    pub styled: RefCell<StyledSheet>,
    pub max_depth: usize,
}

impl Dom {
    pub fn new(max_depth: usize) -> Self {
        Self {
            document: RefCell::new(Document::new()),
            keys: KeyAlloc::default(),
            styled: RefCell::new(StyledSheet::default()),
            max_depth,
        }
    }
}

fn runtime_error(message: impl Into<String>) -> mlua::Error {
    mlua::Error::RuntimeError(message.into())
}

/// Install the rendering globals.
///
/// # Errors
/// Returns error if the Lua tables or functions cannot be created.
pub fn install_ui(lua: &Lua, dom: &Rc<Dom>) -> mlua::Result<()> {
    let fragment = lua.create_table()?;

    let ui = lua.create_table()?;
    ui.set("Fragment", fragment.clone())?;
    ui.set(
        "createElement",
        lua.create_function(
            |lua, (ty, props, children): (Value, Option<Table>, Variadic<Value>)| {
                create_element(lua, ty, props, children.to_vec())
            },
        )?,
    )?;
    ui.set(
        "assign",
        lua.create_function(|_, (target, sources): (Table, Variadic<Value>)| {
            for source in sources.iter() {
                if let Value::Table(source) = source {
                    for pair in source.pairs::<Value, Value>() {
                        let (k, v) = pair?;
                        target.set(k, v)?;
                    }
                }
            }
            Ok(target)
        })?,
    )?;

    let ui_dom = lua.create_table()?;
    let d = Rc::clone(dom);
    ui_dom.set(
        "render",
        lua.create_function(move |lua, (element, target): (Value, Value)| {
            render(lua, &d, &fragment, element, &target)
        })?,
    )?;

    let document = lua.create_table()?;
    let d = Rc::clone(dom);
    document.set(
        "getElementById",
        lua.create_function(move |lua, args: MultiValue| {
            // Accept both `document.getElementById(id)` and `document:getElementById(id)`.
            let Some(Value::String(id)) = args.into_iter().find(|v| matches!(v, Value::String(_)))
            else {
                return Ok(Value::Nil);
            };
            let id = id.to_string_lossy();
            let key = d.document.borrow().find_by_id(&id);
            match key {
                Some(key) => {
                    let handle = lua.create_table()?;
                    handle.set(NODE_FIELD, key.0)?;
                    handle.set("id", id)?;
                    Ok(Value::Table(handle))
                }
                None => Ok(Value::Nil),
            }
        })?,
    )?;

    let d = Rc::clone(dom);
    let styled = lua.create_function(move |lua, tag: Value| {
        let d = Rc::clone(&d);
        lua.create_function(move |lua, css: String| {
            let class = d.styled.borrow_mut().register(&css);
            let tag = tag.clone();
            lua.create_function(move |lua, props: Option<Table>| {
                let merged = lua.create_table()?;
                let mut extra = None;
                if let Some(props) = props {
                    for pair in props.pairs::<Value, Value>() {
                        let (k, v) = pair?;
                        let is_class = matches!(
                            &k,
                            Value::String(s) if matches!(s.to_string_lossy().as_str(), "class" | "className")
                        );
                        if is_class {
                            if let Value::String(s) = v {
                                extra = Some(s.to_string_lossy());
                            }
                        } else {
                            merged.set(k, v)?;
                        }
                    }
                }
                let classes = match extra {
                    Some(extra) => format!("{class} {extra}"),
                    None => class.clone(),
                };
                merged.set("class", classes)?;
                create_element(lua, tag.clone(), Some(merged), Vec::new())
            })
        })
    })?;

    let globals = lua.globals();
    globals.set("UI", ui)?;
    globals.set("UIDom", ui_dom)?;
    globals.set("styled", styled)?;
    globals.set("document", document)?;
    Ok(())
}

fn create_element(
    lua: &Lua,
    ty: Value,
    props: Option<Table>,
    children: Vec<Value>,
) -> mlua::Result<Table> {
    let merged = lua.create_table()?;
    if let Some(props) = props {
        for pair in props.pairs::<Value, Value>() {
            let (k, v) = pair?;
            merged.raw_set(k, v)?;
        }
    }
    let children: Vec<Value> = children.into_iter().filter(|c| !c.is_nil()).collect();
    if !children.is_empty() {
        merged.raw_set("children", lua.create_sequence_from(children)?)?;
    }

    let element = lua.create_table()?;
    element.raw_set(ELEMENT_MARK, true)?;
    element.raw_set("type", ty)?;
    element.raw_set("props", merged)?;
    Ok(element)
}

fn render(
    lua: &Lua,
    dom: &Dom,
    fragment: &Table,
    element: Value,
    target: &Value,
) -> mlua::Result<()> {
    let (key, label) = match target {
        Value::String(id) => {
            let id = id.to_string_lossy();
            let key = dom.document.borrow().find_by_id(&id);
            (key, id)
        }
        Value::Table(handle) => {
            let key: Option<i64> = handle.get(NODE_FIELD)?;
            let label: Option<String> = handle.get("id")?;
            (key.map(NodeKey), label.unwrap_or_default())
        }
        other => {
            return Err(runtime_error(format!(
                "render target must be an element id or handle, got {}",
                other.type_name()
            )));
        }
    };
    let Some(key) = key else {
        return Err(runtime_error(format!("render target not found: {label}")));
    };

    // Components may call back into the document, so no borrow is held while rendering.
    let renderer = Renderer {
        lua,
        dom,
        fragment,
    };
    let mut nodes = Vec::new();
    renderer.child(element, 0, &mut nodes)?;

    if dom.document.borrow_mut().replace_children(key, nodes) {
        Ok(())
    } else {
        Err(runtime_error(format!("render target not found: {label}")))
    }
}

struct Renderer<'a> {
    lua: &'a Lua,
    dom: &'a Dom,
    fragment: &'a Table,
}

impl Renderer<'_> {
    fn child(&self, value: Value, depth: usize, out: &mut Vec<Node>) -> mlua::Result<()> {
        match value {
            Value::String(s) => out.push(Node::Text(escape_html(&s.to_string_lossy()))),
            Value::Integer(i) => out.push(Node::Text(i.to_string())),
            Value::Number(n) => out.push(Node::Text(n.to_string())),
            Value::Table(t) => {
                if matches!(t.raw_get::<Value>(ELEMENT_MARK)?, Value::Boolean(true)) {
                    self.element(&t, depth, out)?;
                } else {
                    for item in t.sequence_values::<Value>() {
                        self.child(item?, depth, out)?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn element(&self, element: &Table, depth: usize, out: &mut Vec<Node>) -> mlua::Result<()> {
        if depth >= self.dom.max_depth {
            return Err(runtime_error(format!(
                "maximum render depth of {} exceeded",
                self.dom.max_depth
            )));
        }
        let ty: Value = element.raw_get("type")?;
        let props = match element.raw_get::<Option<Table>>("props")? {
            Some(props) => props,
            None => self.lua.create_table()?,
        };

        match ty {
            Value::String(tag) => {
                let mut el = Element::new(self.dom.keys.next(), tag.to_string_lossy());
                el.attrs = attributes(&props)?;
                self.child(props.get("children")?, depth + 1, &mut el.children)?;
                out.push(Node::Element(el));
                Ok(())
            }
            Value::Table(t) if t.to_pointer() == self.fragment.to_pointer() => {
                self.child(props.get("children")?, depth + 1, out)
            }
            Value::Function(component) => {
                let rendered: Value = component.call(props)?;
                self.child(rendered, depth + 1, out)
            }
            other => Err(runtime_error(format!(
                "invalid element type: {}",
                other.type_name()
            ))),
        }
    }
}

/// Markup attributes of an intrinsic element, sorted by name.
fn attributes(props: &Table) -> mlua::Result<Vec<(String, Option<String>)>> {
    let mut attrs: BTreeMap<String, Option<String>> = BTreeMap::new();
    for pair in props.pairs::<Value, Value>() {
        let (k, v) = pair?;
        let Value::String(k) = k else { continue };
        let name = k.to_string_lossy();
        let name = match name.as_str() {
            "children" | "key" | "ref" => continue,
            "className" => "class".to_string(),
            _ => name,
        };
        let value = match v {
            Value::Boolean(true) => None,
            Value::String(s) => Some(escape_html(&s.to_string_lossy())),
            Value::Integer(i) => Some(i.to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Table(t) if name == "style" => Some(escape_html(&inline_style(&t)?)),
            // false, nil, event handlers and other tables
            _ => continue,
        };
        match attrs.get_mut(&name) {
            Some(Some(existing)) if name == "class" => {
                if let Some(value) = value {
                    existing.push(' ');
                    existing.push_str(&value);
                }
            }
            _ => {
                attrs.insert(name, value);
            }
        }
    }
    Ok(attrs.into_iter().collect())
}

fn inline_style(style: &Table) -> mlua::Result<String> {
    let mut decls = BTreeMap::new();
    for pair in style.pairs::<Value, Value>() {
        let (k, v) = pair?;
        let Value::String(k) = k else { continue };
        let value = match v {
            Value::String(s) => s.to_string_lossy(),
            Value::Integer(i) => i.to_string(),
            Value::Number(n) => n.to_string(),
            _ => continue,
        };
        decls.insert(kebab_case(&k.to_string_lossy()), value);
    }
    Ok(decls
        .into_iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join("; "))
}

fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lua_error_message;

    fn setup(markup: &str, max_depth: usize) -> (Lua, Rc<Dom>) {
        let lua = Lua::new();
        let dom = Rc::new(Dom::new(max_depth));
        dom.document.borrow_mut().set_markup(markup, &dom.keys);
        install_ui(&lua, &dom).unwrap();
        (lua, dom)
    }

    fn body(dom: &Dom) -> String {
        dom.document.borrow().body_html()
    }

    #[test]
    fn renders_intrinsic_elements() {
        let (lua, dom) = setup("<div id=\"root\">old</div>", 64);
        lua.load(
            r#"
            UIDom.render(UI.createElement("div", {
                className = "box",
                style = { fontSize = "12px", color = "red" },
                onClick = function() end,
                hidden = true,
                open = false,
                tabIndex = 2,
            }, "a<b", 3, nil, true), "root")
            "#,
        )
        .exec()
        .unwrap();
        assert_eq!(
            body(&dom),
            "<div id=\"root\"><div class=\"box\" hidden style=\"color: red; font-size: 12px\" tabIndex=\"2\">a&lt;b3</div></div>"
        );
    }

    #[test]
    fn function_components_and_fragments() {
        let (lua, dom) = setup("<main id=\"root\"></main>", 64);
        lua.load(
            r#"
            local function Item(props)
                return UI.createElement("li", nil, props.label, props.children)
            end
            UIDom.render(
                UI.createElement(UI.Fragment, nil,
                    UI.createElement(Item, { label = "x" }, "!"),
                    { UI.createElement("br") }),
                document.getElementById("root"))
            "#,
        )
        .exec()
        .unwrap();
        assert_eq!(body(&dom), "<main id=\"root\"><li>x!</li><br></main>");
    }

    #[test]
    fn rendering_replaces_previous_output() {
        let (lua, dom) = setup("<div id=\"root\"></div>", 64);
        lua.load(r#"UIDom.render(UI.createElement("p", nil, "one"), "root")"#)
            .exec()
            .unwrap();
        lua.load(r#"UIDom.render(UI.createElement("p", nil, "two"), "root")"#)
            .exec()
            .unwrap();
        assert_eq!(body(&dom), "<div id=\"root\"><p>two</p></div>");
    }

    #[test]
    fn styled_components_register_once() {
        let (lua, dom) = setup("<div id=\"root\"></div>", 64);
        lua.load(
            r#"
            local Title = styled("h1")("color: red;")
            local Again = styled("h1")("color: red;")
            UIDom.render(UI.createElement(Title, { class = "big" }, "T"), "root")
            "#,
        )
        .exec()
        .unwrap();
        let styled = dom.styled.borrow();
        assert_eq!(styled.len(), 1);
        let class = styled.css()[1..].split(' ').next().unwrap().to_string();
        assert!(class.starts_with("sc-"));
        assert_eq!(
            body(&dom),
            format!("<div id=\"root\"><h1 class=\"{class} big\">T</h1></div>")
        );
    }

    #[test]
    fn missing_target_is_an_error() {
        let (lua, _dom) = setup("<div id=\"root\"></div>", 64);
        let err = lua
            .load(r#"UIDom.render(UI.createElement("p"), "nope")"#)
            .exec()
            .unwrap_err();
        assert_eq!(lua_error_message(&err), "render target not found: nope");
        assert!(lua.load(r#"return document.getElementById("nope")"#).eval::<Value>().unwrap().is_nil());
    }

    #[test]
    fn runaway_recursion_hits_depth_limit() {
        let (lua, _dom) = setup("<div id=\"root\"></div>", 8);
        let err = lua
            .load(
                r#"
                local function R() return UI.createElement(R) end
                UIDom.render(UI.createElement(R), "root")
                "#,
            )
            .exec()
            .unwrap_err();
        assert!(lua_error_message(&err).contains("render depth"));
    }

    #[test]
    fn assign_merges_left_to_right() {
        let (lua, _dom) = setup("", 64);
        let (a, b): (i64, i64) = lua
            .load("local t = UI.assign({a = 1}, {b = 2}, nil, {a = 3}) return t.a, t.b")
            .eval()
            .unwrap();
        assert_eq!((a, b), (3, 2));
    }

    #[test]
    fn kebab_case_conversion() {
        assert_eq!(kebab_case("backgroundColor"), "background-color");
        assert_eq!(kebab_case("color"), "color");
    }
}
