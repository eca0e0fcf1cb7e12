//! Skipping of type expressions.
//!
//! Types are never checked, only recognised well enough to find where they
//! end. Every token consumed here is dropped from the output.

use playground_core::TranspileError;

use crate::{scanner::TokenKind, transpile::Transpile};

impl Transpile<'_, '_> {
    /// Erase one type expression, including unions, intersections and `?`.
    pub(crate) fn skip_type(&mut self) -> Result<(), TranspileError> {
        let lead = self.peek()?;
        if lead.is_symbol("|") || lead.is_symbol("&") {
            self.erase()?;
        }
        loop {
            self.type_atom()?;
            while self.peek()?.is_symbol("?") {
                self.erase()?;
            }
            let next = self.peek()?;
            if next.is_symbol("|") || next.is_symbol("&") {
                self.erase()?;
            } else {
                return Ok(());
            }
        }
    }

    fn type_atom(&mut self) -> Result<(), TranspileError> {
        let tok = self.erase()?;
        match tok.kind {
            TokenKind::String | TokenKind::Number => Ok(()),
            TokenKind::Keyword if matches!(tok.text, "nil" | "true" | "false") => Ok(()),
            TokenKind::Name if tok.text == "typeof" && self.peek()?.is_symbol("(") => {
                self.erase()?;
                self.erase_balanced("(", ")")
            }
            TokenKind::Name => {
                loop {
                    if self.peek()?.is_symbol(".")
                        && self.scanner.peek_nth(1)?.kind == TokenKind::Name
                    {
                        self.erase()?;
                        self.erase()?;
                    } else {
                        break;
                    }
                }
                if self.peek()?.is_symbol("<") {
                    self.erase_angle_group()?;
                }
                Ok(())
            }
            TokenKind::Symbol if tok.text == "(" => self.function_or_group_type(),
            TokenKind::Symbol if tok.text == "{" => self.erase_balanced("{", "}"),
            TokenKind::Symbol if tok.text == "..." => {
                let next = self.peek()?;
                if next.kind == TokenKind::Name || next.is_symbol("(") || next.is_symbol("{") {
                    self.type_atom()?;
                }
                Ok(())
            }
            _ => Err(self.scanner.error_at(tok.start, "expected type")),
        }
    }

    /// `(A, b: B, ...C) -> R` or a parenthesised type; the `(` is consumed.
    fn function_or_group_type(&mut self) -> Result<(), TranspileError> {
        loop {
            if self.peek()?.is_symbol(")") {
                self.erase()?;
                break;
            }
            if self.peek()?.kind == TokenKind::Name && self.scanner.peek_nth(1)?.is_symbol(":") {
                self.erase()?;
                self.erase()?;
            }
            self.skip_type()?;
            let tok = self.erase()?;
            if tok.is_symbol(")") {
                break;
            }
            if !tok.is_symbol(",") {
                return Err(self.scanner.error_at(tok.start, "expected ',' or ')' in type"));
            }
        }
        if self.peek()?.is_symbol("->") {
            self.erase()?;
            self.skip_type()?;
        }
        Ok(())
    }

    /// Erase up to the matching `close`; the opening symbol is consumed.
    pub(crate) fn erase_balanced(&mut self, open: &str, close: &str) -> Result<(), TranspileError> {
        let mut depth = 1usize;
        loop {
            let tok = self.erase()?;
            if tok.kind == TokenKind::Eof {
                return Err(self.scanner.error_at(tok.start, format!("expected '{close}'")));
            }
            if tok.is_symbol(open) {
                depth += 1;
            } else if tok.is_symbol(close) {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
        }
    }

    /// Erase a generic parameter or argument list such as `<K, V<T>>`.
    ///
    /// `>>` and `>=` are split when only their first `>` closes the group.
    pub(crate) fn erase_angle_group(&mut self) -> Result<(), TranspileError> {
        let open = self.erase()?;
        debug_assert!(open.is_symbol("<"));
        let mut depth = 1usize;
        loop {
            let tok = self.erase()?;
            match tok.kind {
                TokenKind::Eof => {
                    return Err(self
                        .scanner
                        .error_at(open.start, "expected '>' to close type parameters"));
                }
                TokenKind::Symbol => match tok.text {
                    "<" => depth += 1,
                    ">" => depth -= 1,
                    ">>" if depth >= 2 => depth -= 2,
                    ">>" | ">=" => {
                        self.scanner.set_pos(tok.start + 1);
                        depth -= 1;
                    }
                    _ => {}
                },
                _ => {}
            }
            if depth == 0 {
                return Ok(());
            }
        }
    }
}
