//! Lowering of component syntax to element factory calls.
//!
//! `<Tag a="s" b={expr} {...rest}>text {child}</Tag>` becomes
//! `factory(Tag, props, "text", (child))`. Intrinsic tags (lowercase, no
//! dot) are passed as strings, everything else as a Lua path expression.

use std::fmt::Write as _;

use playground_core::TranspileError;

use crate::{
    scanner::{is_keyword, is_name_char, is_name_start},
    transpile::{Stop, Transpile},
};

enum Prop {
    Pair(String, String),
    Spread(String),
}

impl Transpile<'_, '_> {
    /// Whether the `<` just consumed opens an element.
    pub(crate) fn at_component_start(&self) -> bool {
        self.scanner
            .peek_char()
            .is_some_and(|c| is_name_start(c) || c == '>')
    }

    /// Lower the element whose `<` starts at `start` and has been consumed.
    ///
    /// Line breaks swallowed by the element are appended after the call so
    /// that following code keeps its line numbers.
    pub(crate) fn element(&mut self, start: usize) -> Result<String, TranspileError> {
        let mut lowered = self.parse_element(start)?;
        let consumed = &self.scanner.source()[start..self.scanner.pos()];
        let missing = consumed
            .matches('\n')
            .count()
            .saturating_sub(lowered.matches('\n').count());
        lowered.extend(std::iter::repeat_n('\n', missing));
        Ok(lowered)
    }

    fn parse_element(&mut self, start: usize) -> Result<String, TranspileError> {
        let fragment = self.scanner.eat(">");
        let name = if fragment {
            String::new()
        } else {
            self.read_while(|c| is_name_char(c) || matches!(c, '.' | ':' | '-'))
        };
        let tag = if fragment {
            self.opts.fragment.clone()
        } else {
            self.tag_expression(&name, start)?
        };

        let mut props = Vec::new();
        let self_closing = if fragment {
            false
        } else {
            self.attributes(&mut props, &name, start)?
        };

        let mut children = Vec::new();
        if !self_closing {
            self.children(&mut children, &name, start)?;
        }

        let mut call = format!("{}({}, {}", self.opts.factory, tag, self.props_expression(props));
        for child in children {
            let _ = write!(call, ", {child}");
        }
        call.push(')');
        Ok(call)
    }

    /// Parse attributes up to `>` or `/>`, returning whether the element closed itself.
    fn attributes(
        &mut self,
        props: &mut Vec<Prop>,
        tag: &str,
        start: usize,
    ) -> Result<bool, TranspileError> {
        loop {
            self.scanner.skip_whitespace();
            if self.scanner.eat("/>") {
                return Ok(true);
            }
            if self.scanner.eat(">") {
                return Ok(false);
            }
            let here = self.scanner.pos();
            match self.scanner.peek_char() {
                None => {
                    return Err(self.scanner.error_at(start, format!("unterminated element <{tag}>")));
                }
                Some('{') => {
                    self.scanner.bump_char();
                    self.scanner.skip_whitespace();
                    if !self.scanner.eat("...") {
                        return Err(self.scanner.error_at(here, "expected '...' in attribute spread"));
                    }
                    let (expr, any) = self.nested_expression()?;
                    if !any {
                        return Err(self.scanner.error_at(here, "empty attribute spread"));
                    }
                    props.push(Prop::Spread(expr));
                }
                Some(c) if is_name_start(c) => {
                    let key = self.read_while(|c| is_name_char(c) || matches!(c, ':' | '-'));
                    self.scanner.skip_whitespace();
                    let value = if self.scanner.eat("=") {
                        self.scanner.skip_whitespace();
                        self.attribute_value(&key)?
                    } else {
                        "true".to_string()
                    };
                    props.push(Prop::Pair(key, value));
                }
                Some(c) => {
                    return Err(self
                        .scanner
                        .error_at(here, format!("unexpected '{c}' in element <{tag}>")));
                }
            }
        }
    }

    fn attribute_value(&mut self, key: &str) -> Result<String, TranspileError> {
        let here = self.scanner.pos();
        match self.scanner.peek_char() {
            Some(quote @ ('"' | '\'')) => {
                self.scanner.bump_char();
                let raw = self.read_while(|c| c != quote);
                if !self.scanner.eat(&quote.to_string()) {
                    return Err(self.scanner.error_at(here, "unfinished attribute string"));
                }
                Ok(lua_string(&decode_entities(&raw)))
            }
            Some('{') => {
                self.scanner.bump_char();
                let (expr, any) = self.nested_expression()?;
                if !any {
                    return Err(self
                        .scanner
                        .error_at(here, format!("attribute '{key}' must not be empty")));
                }
                Ok(format!("({})", trim_expression(&expr)))
            }
            Some('<') => {
                self.scanner.bump_char();
                if !self.at_component_start() {
                    return Err(self.scanner.error_at(here, "expected element"));
                }
                self.parse_element(here)
            }
            _ => Err(self
                .scanner
                .error_at(here, format!("expected value for attribute '{key}'"))),
        }
    }

    fn children(
        &mut self,
        children: &mut Vec<String>,
        tag: &str,
        start: usize,
    ) -> Result<(), TranspileError> {
        loop {
            let here = self.scanner.pos();
            if self.scanner.eat("</") {
                self.scanner.skip_whitespace();
                let closing = self.read_while(|c| is_name_char(c) || matches!(c, '.' | ':' | '-'));
                self.scanner.skip_whitespace();
                if closing != tag || !self.scanner.eat(">") {
                    return Err(self
                        .scanner
                        .error_at(here, format!("expected closing tag </{tag}>")));
                }
                return Ok(());
            }
            match self.scanner.peek_char() {
                None => {
                    return Err(self.scanner.error_at(start, format!("unterminated element <{tag}>")));
                }
                Some('<') => {
                    self.scanner.bump_char();
                    if !self.at_component_start() {
                        return Err(self.scanner.error_at(here, "expected element"));
                    }
                    children.push(self.parse_element(here)?);
                }
                Some('{') => {
                    self.scanner.bump_char();
                    let (expr, any) = self.nested_expression()?;
                    if any {
                        children.push(format!("({})", trim_expression(&expr)));
                    }
                }
                Some(_) => {
                    let raw = self.read_while(|c| c != '<' && c != '{');
                    let text = collapse_text(&raw);
                    if !text.is_empty() {
                        children.push(lua_string(&decode_entities(&text)));
                    }
                }
            }
        }
    }

    /// Lower an embedded expression after its `{`, consuming the closing `}`.
    fn nested_expression(&mut self) -> Result<(String, bool), TranspileError> {
        let outer = std::mem::take(&mut self.out);
        let prev = std::mem::replace(&mut self.prev_operand, false);
        let result = self.run(Stop::Brace);
        let inner = std::mem::replace(&mut self.out, outer);
        self.prev_operand = prev;
        Ok((inner, result?))
    }

    fn tag_expression(&self, name: &str, start: usize) -> Result<String, TranspileError> {
        let intrinsic = name.starts_with(|c: char| c.is_ascii_lowercase()) && !name.contains('.');
        if intrinsic {
            return Ok(lua_string(name));
        }
        let valid = name
            .split('.')
            .all(is_identifier);
        if valid {
            Ok(name.to_string())
        } else {
            Err(self
                .scanner
                .error_at(start, format!("invalid component name '{name}'")))
        }
    }

    fn props_expression(&self, props: Vec<Prop>) -> String {
        if props.is_empty() {
            return "nil".to_string();
        }
        let has_spread = props.iter().any(|p| matches!(p, Prop::Spread(_)));
        let mut groups: Vec<String> = Vec::new();
        let mut pairs: Vec<String> = Vec::new();
        for prop in props {
            match prop {
                Prop::Pair(key, value) => pairs.push(table_field(&key, &value)),
                Prop::Spread(expr) => {
                    if !pairs.is_empty() {
                        groups.push(format!("{{{}}}", pairs.join(", ")));
                        pairs.clear();
                    }
                    groups.push(trim_expression(&expr).to_string());
                }
            }
        }
        if !pairs.is_empty() {
            groups.push(format!("{{{}}}", pairs.join(", ")));
        }
        if has_spread {
            format!("{}({{}}, {})", self.opts.assign, groups.join(", "))
        } else {
            groups.concat()
        }
    }

    fn read_while(&mut self, keep: impl Fn(char) -> bool) -> String {
        let begin = self.scanner.pos();
        while self.scanner.peek_char().is_some_and(&keep) {
            self.scanner.bump_char();
        }
        self.scanner.source()[begin..self.scanner.pos()].to_string()
    }
}

fn is_identifier(word: &str) -> bool {
    word.starts_with(is_name_start) && word.chars().all(is_name_char) && !is_keyword(word)
}

fn table_field(key: &str, value: &str) -> String {
    if is_identifier(key) {
        format!("{key} = {value}")
    } else {
        format!("[{}] = {value}", lua_string(key))
    }
}

/// Strip surrounding whitespace unless a trailing line comment needs its newline.
fn trim_expression(expr: &str) -> &str {
    let expr = expr.trim_start();
    if expr.contains("--") { expr } else { expr.trim_end() }
}

/// Apply the component-text whitespace rule: lines are trimmed, lines
/// holding only whitespace vanish, and the rest are joined by one space.
fn collapse_text(raw: &str) -> String {
    let lines: Vec<&str> = raw.split('\n').collect();
    let last_non_empty = lines.iter().rposition(|l| !l.trim().is_empty());
    let mut text = String::new();
    for (i, line) in lines.iter().enumerate() {
        let mut piece = line.trim_end_matches('\r').replace('\t', " ");
        if i != 0 {
            piece = piece.trim_start().to_string();
        }
        if i != lines.len() - 1 {
            piece = piece.trim_end().to_string();
        }
        if piece.is_empty() {
            continue;
        }
        text.push_str(&piece);
        if Some(i) != last_non_empty {
            text.push(' ');
        }
    }
    text
}

fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').and_then(|semi| {
            let entity = &rest[1..semi];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity.strip_prefix('#').and_then(|num| {
                    let code = match num.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => num.parse().ok(),
                    };
                    code.and_then(char::from_u32)
                }),
            };
            c.map(|c| (c, semi + 1))
        });
        match decoded {
            Some((c, len)) => {
                out.push(c);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Quote `s` as a double-quoted Lua string literal.
pub(crate) fn lua_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{{{:X}}}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
