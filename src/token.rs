//! CIF token types and the tokenizer.
//!
//! The tokenizer scans a CIF text into a stream of classified tokens with
//! byte spans. Every byte of the input is covered by exactly one of
//! whitespace, a comment, or a token; any non-whitespace span that matches
//! no CIF token pattern is emitted as a single [`TokenKind::Bad`] token, so
//! the stream is total over the input.
//!
//! Recognition is positional: text fields and the line-start restriction on
//! `;` depend on whether the scanner sits at the beginning of a line, and
//! quoted values may only open at a token boundary. Keyword prefixes
//! (`data_`, `save_`, `loop_`, `stop_`, `global_`) match case-insensitively
//! per the CIF 1.1 specification.

use serde::{Deserialize, Serialize};

/// Classification of a CIF token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// `data_X` block header.
    BlockCode,
    /// `save_X` frame header, or the bare `save_` terminator (empty text).
    /// The parser post-processes empty frame codes into [`TokenKind::FrameEnd`].
    FrameCode,
    /// Frame terminator; produced by the parser from an empty `FrameCode`.
    FrameEnd,
    /// `loop_` header (text carries any trailing junk after the keyword).
    Loop,
    /// `_name` data name (text excludes the leading underscore).
    Name,
    /// Unquoted data value.
    Value,
    /// Single-quoted data value (text excludes the quotes).
    ValueQuoted,
    /// Double-quoted data value (text excludes the quotes).
    ValueDoubleQuoted,
    /// Semicolon-delimited text field (text excludes the delimiters).
    ValueField,
    /// Comment from `#` to end of line (text excludes the `#`).
    Comment,
    /// STAR-reserved `stop_`, not legal in CIF.
    Stop,
    /// STAR-reserved `global_`, not legal in CIF.
    Global,
    /// STAR-reserved `$frame` reference, not legal in CIF.
    FrameRef,
    /// STAR-reserved `[...]` composite value, not legal in CIF.
    Brackets,
    /// Input span matching no CIF token pattern.
    Bad,
}

impl TokenKind {
    /// Whether this kind carries a data value.
    pub fn is_value(self) -> bool {
        matches!(
            self,
            TokenKind::Value
                | TokenKind::ValueQuoted
                | TokenKind::ValueDoubleQuoted
                | TokenKind::ValueField
        )
    }

    /// Whether this kind is a STAR-reserved token rejected by CIF.
    pub fn is_reserved(self) -> bool {
        matches!(
            self,
            TokenKind::Stop | TokenKind::Global | TokenKind::FrameRef | TokenKind::Brackets
        )
    }
}

/// A classified token with its byte span in the input.
///
/// `text` is the token payload (keyword suffix, value content without
/// delimiters); `start..end` is the full span including delimiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

impl<'a> Token<'a> {
    fn new(kind: TokenKind, text: &'a str, start: usize, end: usize) -> Self {
        Self {
            kind,
            text,
            start,
            end,
        }
    }
}

/// Iterator producing the token stream for a CIF text.
///
/// The input is expected to use LF line endings (the reader normalizes
/// CRLF/CR before tokenizing); stray `\r` bytes are treated as whitespace.
pub struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn bytes(&self) -> &'a [u8] {
        self.input.as_bytes()
    }

    fn at_line_start(&self) -> bool {
        self.pos == 0 || self.bytes()[self.pos - 1] == b'\n'
    }

    fn skip_whitespace(&mut self) {
        let bytes = self.bytes();
        while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    /// End (exclusive) of the non-whitespace run starting at `start`.
    fn run_end(&self, start: usize) -> usize {
        let bytes = self.bytes();
        let mut end = start;
        while end < bytes.len() && !bytes[end].is_ascii_whitespace() {
            end += 1;
        }
        end
    }

    /// Followed-by-whitespace-or-EOF check for a token ending at `end`.
    fn token_boundary(&self, end: usize) -> bool {
        end >= self.bytes().len() || self.bytes()[end].is_ascii_whitespace()
    }

    fn bad_run(&mut self, start: usize) -> Token<'a> {
        let end = self.run_end(start);
        self.pos = end;
        Token::new(TokenKind::Bad, &self.input[start..end], start, end)
    }

    /// Text field: `;` at line start through the next line-start `;` that is
    /// followed by whitespace or EOF. The delimiters (leading `;`, final
    /// `\n;`) are excluded from the text.
    fn scan_text_field(&mut self) -> Token<'a> {
        let start = self.pos;
        let bytes = self.bytes();
        let mut i = start + 1;
        while i < bytes.len() {
            if bytes[i] == b'\n' && i + 1 < bytes.len() && bytes[i + 1] == b';' {
                if self.token_boundary(i + 2) {
                    let text = &self.input[start + 1..i];
                    self.pos = i + 2;
                    return Token::new(TokenKind::ValueField, text, start, i + 2);
                }
            }
            i += 1;
        }
        // Unterminated text field: the leading run is a bad token.
        self.bad_run(start)
    }

    /// Quoted value: the closing quote terminates only when followed by
    /// whitespace or EOF, so embedded quotes followed by non-whitespace are
    /// part of the value. Quoted values may not span lines.
    fn scan_quoted(&mut self, quote: u8, kind: TokenKind) -> Token<'a> {
        let start = self.pos;
        let bytes = self.bytes();
        let mut i = start + 1;
        while i < bytes.len() && bytes[i] != b'\n' {
            if bytes[i] == quote && self.token_boundary(i + 1) {
                let text = &self.input[start + 1..i];
                self.pos = i + 1;
                return Token::new(kind, text, start, i + 1);
            }
            i += 1;
        }
        // No closing quote on this line.
        self.bad_run(start)
    }

    fn scan_comment(&mut self) -> Token<'a> {
        let start = self.pos;
        let bytes = self.bytes();
        let mut end = start + 1;
        while end < bytes.len() && bytes[end] != b'\n' {
            end += 1;
        }
        self.pos = end;
        Token::new(TokenKind::Comment, &self.input[start + 1..end], start, end)
    }

    /// Classify a bare (unquoted, non-comment) non-whitespace run.
    fn classify_run(&mut self, start: usize, line_start: bool) -> Token<'a> {
        let end = self.run_end(start);
        let run = &self.input[start..end];
        self.pos = end;

        let token = |kind: TokenKind, text: &'a str| Token::new(kind, text, start, end);

        if let Some(rest) = run.strip_prefix('_') {
            return token(TokenKind::Name, rest);
        }
        if let Some(rest) = strip_prefix_ci(run, "loop_") {
            return token(TokenKind::Loop, rest);
        }
        if let Some(rest) = strip_prefix_ci(run, "data_") {
            return token(TokenKind::BlockCode, rest);
        }
        if let Some(rest) = strip_prefix_ci(run, "save_") {
            return token(TokenKind::FrameCode, rest);
        }
        if let Some(rest) = strip_prefix_ci(run, "stop_") {
            return token(TokenKind::Stop, rest);
        }
        if let Some(rest) = strip_prefix_ci(run, "global_") {
            return token(TokenKind::Global, rest);
        }
        if let Some(rest) = run.strip_prefix('$') {
            if rest.is_empty() {
                return token(TokenKind::Bad, run);
            }
            return token(TokenKind::FrameRef, rest);
        }
        if run.starts_with('[') {
            if run.len() >= 3 && run.ends_with(']') {
                return token(TokenKind::Brackets, &run[1..run.len() - 1]);
            }
            return token(TokenKind::Bad, run);
        }
        if run.starts_with(']') {
            return token(TokenKind::Bad, run);
        }
        if run.starts_with(';') && line_start {
            // Only reachable for a line-start `;` run that failed to open a
            // text field; handled in `scan_text_field`, kept as a guard.
            return token(TokenKind::Bad, run);
        }
        token(TokenKind::Value, run)
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        self.skip_whitespace();
        if self.pos >= self.bytes().len() {
            return None;
        }
        let line_start = self.at_line_start();
        let byte = self.bytes()[self.pos];
        let token = match byte {
            b';' if line_start => self.scan_text_field(),
            b'#' => self.scan_comment(),
            b'\'' => self.scan_quoted(b'\'', TokenKind::ValueQuoted),
            b'"' => self.scan_quoted(b'"', TokenKind::ValueDoubleQuoted),
            _ => self.classify_run(self.pos, line_start),
        };
        Some(token)
    }
}

/// ASCII case-insensitive prefix strip.
fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

/// Collect all tokens of `input`.
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    Tokenizer::new(input).collect()
}
