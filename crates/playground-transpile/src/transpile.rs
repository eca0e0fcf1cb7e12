//! Main lowering pass.
//!
//! Tokens are copied through unchanged together with their leading trivia,
//! so the output keeps the line structure of the input. Type syntax is
//! dropped token by token; component syntax is replaced by factory calls.

use playground_core::TranspileError;

use crate::{
    TranspileOptions,
    scanner::{Scanner, Token, TokenKind, is_name_char},
};

/// Where a run of the main loop ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stop {
    /// End of input.
    Eof,
    /// An unmatched `}` closing an embedded expression.
    Brace,
}

pub(crate) struct Transpile<'a, 'o> {
    pub(crate) scanner: Scanner<'a>,
    pub(crate) out: String,
    pub(crate) opts: &'o TranspileOptions,
    pub(crate) prev_operand: bool,
}

impl<'a, 'o> Transpile<'a, 'o> {
    pub(crate) fn new(source: &'a str, opts: &'o TranspileOptions) -> Self {
        Self {
            scanner: Scanner::new(source),
            out: String::with_capacity(source.len() + source.len() / 4),
            opts,
            prev_operand: false,
        }
    }

    /// Copy trivia to the output and consume the next token without emitting it.
    pub(crate) fn advance(&mut self) -> Result<Token<'a>, TranspileError> {
        let trivia = self.scanner.skip_trivia()?;
        self.out.push_str(trivia);
        self.scanner.next_token()
    }

    pub(crate) fn emit(&mut self, tok: Token<'_>) {
        self.out.push_str(tok.text);
        self.prev_operand = tok.ends_operand();
    }

    /// Consume and emit the next token.
    fn pass(&mut self) -> Result<(), TranspileError> {
        let tok = self.advance()?;
        self.emit(tok);
        Ok(())
    }

    /// Consume the next token, dropping its text and all trivia but line breaks.
    pub(crate) fn erase(&mut self) -> Result<Token<'a>, TranspileError> {
        let trivia = self.scanner.skip_trivia()?;
        self.keep_lines(trivia);
        self.scanner.next_token()
    }

    pub(crate) fn keep_lines(&mut self, text: &str) {
        for _ in text.matches('\n') {
            self.out.push('\n');
        }
    }

    pub(crate) fn peek(&self) -> Result<Token<'a>, TranspileError> {
        self.scanner.peek_token()
    }

    /// Keep two words from gluing together where erased text used to be.
    pub(crate) fn separate(&mut self) {
        let glued_left = self.out.chars().next_back().is_some_and(is_name_char);
        let glued_right = self.scanner.peek_char().is_some_and(is_name_char);
        if glued_left && glued_right {
            self.out.push(' ');
        }
    }

    /// Run the main loop, returning whether any token was seen before `stop`.
    pub(crate) fn run(&mut self, stop: Stop) -> Result<bool, TranspileError> {
        let mut depth = 0usize;
        let mut any = false;
        loop {
            let tok = self.advance()?;
            if tok.kind == TokenKind::Eof {
                return match stop {
                    Stop::Eof => Ok(any),
                    Stop::Brace => Err(self
                        .scanner
                        .error_at(tok.start, "expected '}' to close embedded expression")),
                };
            }
            if stop == Stop::Brace && depth == 0 && tok.is_symbol("}") {
                return Ok(any);
            }
            any = true;
            if tok.is_symbol("{") {
                depth += 1;
            } else if tok.is_symbol("}") {
                depth = depth.saturating_sub(1);
            }

            if tok.is_symbol("<")
                && self.opts.lower_components
                && !self.prev_operand
                && self.at_component_start()
            {
                let lowered = self.element(tok.start)?;
                self.out.push_str(&lowered);
                self.prev_operand = true;
                continue;
            }

            if self.opts.erase_types {
                if tok.is_keyword("function") {
                    self.emit(tok);
                    self.function_signature()?;
                    continue;
                }
                if tok.is_keyword("local") {
                    self.emit(tok);
                    if !self.peek()?.is_keyword("function") {
                        self.binding_list()?;
                    }
                    continue;
                }
                if tok.is_keyword("for") {
                    self.emit(tok);
                    self.binding_list()?;
                    continue;
                }
                if tok.is_name("type") && self.at_type_alias(0)? {
                    self.erase_type_alias()?;
                    continue;
                }
                if tok.is_name("export")
                    && self.peek()?.is_name("type")
                    && self.at_type_alias(1)?
                {
                    self.erase()?;
                    self.erase_type_alias()?;
                    continue;
                }
            }

            self.emit(tok);
        }
    }

    /// Name list of a `local` or `for` statement, with optional annotations.
    fn binding_list(&mut self) -> Result<(), TranspileError> {
        loop {
            if self.peek()?.kind != TokenKind::Name {
                return Ok(());
            }
            self.pass()?;

            // Lua 5.4 attribute such as `<const>`.
            if self.peek()?.is_symbol("<")
                && self.scanner.peek_nth(1)?.kind == TokenKind::Name
                && self.scanner.peek_nth(2)?.is_symbol(">")
            {
                for _ in 0..3 {
                    self.pass()?;
                }
            }

            self.optional_annotation()?;
            if !self.peek()?.is_symbol(",") {
                return Ok(());
            }
            self.pass()?;
        }
    }

    /// Everything between `function` and the body: name, generics, parameters, return type.
    fn function_signature(&mut self) -> Result<(), TranspileError> {
        if self.peek()?.kind == TokenKind::Name {
            self.pass()?;
            loop {
                let next = self.peek()?;
                let separator = next.is_symbol(".") || next.is_symbol(":");
                if separator && self.scanner.peek_nth(1)?.kind == TokenKind::Name {
                    self.pass()?;
                    self.pass()?;
                } else {
                    break;
                }
            }
        }

        if self.peek()?.is_symbol("<") {
            self.erase_angle_group()?;
            self.separate();
        }

        if !self.peek()?.is_symbol("(") {
            // Malformed; the interpreter reports it.
            return Ok(());
        }
        self.pass()?;

        loop {
            let tok = self.advance()?;
            if tok.kind == TokenKind::Eof {
                return Err(self.scanner.error_at(tok.start, "unfinished parameter list"));
            }
            let closes = tok.is_symbol(")");
            let param = tok.kind == TokenKind::Name || tok.is_symbol("...");
            self.emit(tok);
            if closes {
                break;
            }
            if param {
                self.optional_annotation()?;
            }
        }

        self.optional_annotation()
    }

    /// Erase `: Type` if present.
    fn optional_annotation(&mut self) -> Result<(), TranspileError> {
        if self.peek()?.is_symbol(":") {
            self.erase()?;
            self.skip_type()?;
            self.separate();
        }
        Ok(())
    }

    /// Whether the tokens after `offset` peeked tokens read `Name =` or `Name <`.
    fn at_type_alias(&self, offset: usize) -> Result<bool, TranspileError> {
        let name = self.scanner.peek_nth(offset)?;
        if name.kind != TokenKind::Name {
            return Ok(false);
        }
        let after = self.scanner.peek_nth(offset + 1)?;
        Ok(after.is_symbol("=") || after.is_symbol("<"))
    }

    /// Erase `Name<Params> = Type`; the `type` keyword is already consumed.
    fn erase_type_alias(&mut self) -> Result<(), TranspileError> {
        self.erase()?;
        if self.peek()?.is_symbol("<") {
            self.erase_angle_group()?;
        }
        let eq = self.erase()?;
        if !eq.is_symbol("=") {
            return Err(self.scanner.error_at(eq.start, "expected '=' in type alias"));
        }
        self.skip_type()?;
        self.separate();
        self.prev_operand = false;
        Ok(())
    }
}
