//! On-demand Lua token scanner.
//!
//! The scanner is a cursor over the source, not a token list: component
//! syntax contains free text that is not made of Lua tokens, so the lowering
//! code reads raw characters from the same cursor when it needs to.

use playground_core::TranspileError;

const KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if", "in",
    "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

// Longest first.
const SYMBOLS: &[&str] = &[
    "...", "..", "==", "~=", "<=", ">=", "<<", ">>", "//", "::", "->", "+", "-", "*", "/", "%",
    "^", "#", "&", "~", "|", "<", ">", "=", "(", ")", "{", "}", "[", "]", ";", ":", ",", ".", "?",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Name,
    Keyword,
    Number,
    String,
    Symbol,
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub start: usize,
}

impl Token<'_> {
    pub fn is_symbol(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Symbol && self.text == symbol
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == keyword
    }

    pub fn is_name(&self, name: &str) -> bool {
        self.kind == TokenKind::Name && self.text == name
    }

    /// Whether this token can end an operand, making a following `<` a comparison.
    pub fn ends_operand(&self) -> bool {
        match self.kind {
            TokenKind::Name | TokenKind::Number | TokenKind::String => true,
            TokenKind::Keyword => matches!(self.text, "nil" | "true" | "false" | "end"),
            TokenKind::Symbol => matches!(self.text, ")" | "]" | "}" | "..."),
            TokenKind::Eof => false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub const fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    pub const fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn source(&self) -> &'a str {
        self.src
    }

    pub fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    pub fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn bump_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    pub fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    /// Consume `s` if the input continues with it.
    pub fn eat(&mut self, s: &str) -> bool {
        if self.starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    /// Skip plain whitespace (no comments), returning how much was skipped.
    pub fn skip_whitespace(&mut self) -> &'a str {
        let start = self.pos;
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.bump_char();
        }
        &self.src[start..self.pos]
    }

    /// 1-based line and column of a byte offset.
    pub fn line_col(&self, pos: usize) -> (usize, usize) {
        let before = &self.src[..pos.min(self.src.len())];
        let line = before.matches('\n').count() + 1;
        let column = before
            .rfind('\n')
            .map_or(before.chars().count(), |nl| before[nl + 1..].chars().count())
            + 1;
        (line, column)
    }

    pub fn error_at(&self, pos: usize, message: impl Into<String>) -> TranspileError {
        let (line, column) = self.line_col(pos);
        TranspileError::new(line, column, message)
    }

    /// Skip whitespace and comments, returning the skipped text.
    pub fn skip_trivia(&mut self) -> Result<&'a str, TranspileError> {
        let start = self.pos;
        loop {
            self.skip_whitespace();
            if !self.starts_with("--") {
                break;
            }
            let comment_start = self.pos;
            self.pos += 2;
            if let Some(level) = self.long_bracket_level() {
                self.skip_long_bracket(level)
                    .map_err(|()| self.error_at(comment_start, "unfinished long comment"))?;
            } else {
                while let Some(c) = self.peek_char() {
                    if c == '\n' {
                        break;
                    }
                    self.bump_char();
                }
            }
        }
        Ok(&self.src[start..self.pos])
    }

    /// Lex one token at the cursor. Trivia must already be skipped.
    pub fn next_token(&mut self) -> Result<Token<'a>, TranspileError> {
        let start = self.pos;
        let Some(c) = self.peek_char() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                text: "",
                start,
            });
        };

        let kind = if is_name_start(c) {
            while self.peek_char().is_some_and(is_name_char) {
                self.bump_char();
            }
            if KEYWORDS.contains(&&self.src[start..self.pos]) {
                TokenKind::Keyword
            } else {
                TokenKind::Name
            }
        } else if c.is_ascii_digit()
            || (c == '.' && self.rest()[1..].starts_with(|n: char| n.is_ascii_digit()))
        {
            self.number();
            TokenKind::Number
        } else if c == '"' || c == '\'' {
            self.short_string(c)?;
            TokenKind::String
        } else if c == '[' && self.long_bracket_level().is_some() {
            let level = self.long_bracket_level().unwrap_or(0);
            self.skip_long_bracket(level)
                .map_err(|()| self.error_at(start, "unfinished long string"))?;
            TokenKind::String
        } else if let Some(sym) = SYMBOLS.iter().find(|s| self.starts_with(s)) {
            self.pos += sym.len();
            TokenKind::Symbol
        } else {
            return Err(self.error_at(start, format!("unexpected character '{c}'")));
        };

        Ok(Token {
            kind,
            text: &self.src[start..self.pos],
            start,
        })
    }

    /// Lex the next token on a copy of the cursor, consuming nothing.
    pub fn peek_token(&self) -> Result<Token<'a>, TranspileError> {
        self.peek_nth(0)
    }

    /// Peek `n` tokens ahead (0 is the next token).
    pub fn peek_nth(&self, n: usize) -> Result<Token<'a>, TranspileError> {
        let mut copy = *self;
        for _ in 0..n {
            copy.skip_trivia()?;
            copy.next_token()?;
        }
        copy.skip_trivia()?;
        copy.next_token()
    }

    fn number(&mut self) {
        let hex = self.starts_with("0x") || self.starts_with("0X");
        if hex {
            self.pos += 2;
        }
        let exponent = if hex { ['p', 'P'] } else { ['e', 'E'] };
        while let Some(c) = self.peek_char() {
            if exponent.contains(&c) {
                self.bump_char();
                if matches!(self.peek_char(), Some('+' | '-')) {
                    self.bump_char();
                }
            } else if c.is_ascii_alphanumeric() || c == '.' {
                self.bump_char();
            } else {
                break;
            }
        }
    }

    fn short_string(&mut self, quote: char) -> Result<(), TranspileError> {
        let start = self.pos;
        self.bump_char();
        loop {
            match self.bump_char() {
                None | Some('\n') => return Err(self.error_at(start, "unfinished string")),
                Some('\\') => {
                    self.bump_char();
                }
                Some(c) if c == quote => return Ok(()),
                Some(_) => {}
            }
        }
    }

    /// Level of a long bracket (`[[`, `[=[`, ...) at the cursor, if any.
    fn long_bracket_level(&self) -> Option<usize> {
        let rest = self.rest().strip_prefix('[')?;
        let level = rest.chars().take_while(|&c| c == '=').count();
        rest[level..].starts_with('[').then_some(level)
    }

    fn skip_long_bracket(&mut self, level: usize) -> Result<(), ()> {
        self.pos += level + 2;
        let close = format!("]{}]", "=".repeat(level));
        match self.rest().find(&close) {
            Some(offset) => {
                self.pos += offset + close.len();
                Ok(())
            }
            None => {
                self.pos = self.src.len();
                Err(())
            }
        }
    }
}

pub(crate) fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub(crate) fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub(crate) fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<(TokenKind, String)> {
        let mut scanner = Scanner::new(src);
        let mut out = Vec::new();
        loop {
            scanner.skip_trivia().unwrap();
            let tok = scanner.next_token().unwrap();
            if tok.kind == TokenKind::Eof {
                break;
            }
            out.push((tok.kind, tok.text.to_string()));
        }
        out
    }

    #[test]
    fn lexes_mixed_tokens() {
        let toks = tokens("local x = 0x1F + 2.5e-3 .. 'a\\'b' -- note\nreturn x >= [[long]]");
        let texts: Vec<&str> = toks.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "local", "x", "=", "0x1F", "+", "2.5e-3", "..", "'a\\'b'", "return", "x", ">=",
                "[[long]]"
            ]
        );
        assert_eq!(toks[0].0, TokenKind::Keyword);
        assert_eq!(toks[1].0, TokenKind::Name);
        assert_eq!(toks[3].0, TokenKind::Number);
        assert_eq!(toks[7].0, TokenKind::String);
    }

    #[test]
    fn long_comments_are_trivia() {
        let mut scanner = Scanner::new("--[==[ a ]] b ]==] x");
        let trivia = scanner.skip_trivia().unwrap();
        assert_eq!(trivia, "--[==[ a ]] b ]==] ");
        assert_eq!(scanner.next_token().unwrap().text, "x");
    }

    #[test]
    fn unfinished_string_reports_position() {
        let mut scanner = Scanner::new("x = 1\ny = 'abc\n");
        let err = loop {
            scanner.skip_trivia().unwrap();
            match scanner.next_token() {
                Ok(tok) if tok.kind == TokenKind::Eof => panic!("expected error"),
                Ok(_) => {}
                Err(e) => break e,
            }
        };
        assert_eq!((err.line, err.column), (2, 5));
        assert!(err.message.contains("unfinished string"));
    }

    #[test]
    fn peek_does_not_consume() {
        let scanner = Scanner::new("  foo bar");
        assert_eq!(scanner.peek_token().unwrap().text, "foo");
        assert_eq!(scanner.peek_nth(1).unwrap().text, "bar");
        assert_eq!(scanner.pos(), 0);
    }
}
