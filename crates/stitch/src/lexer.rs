//! Minimal JavaScript tokenizer
//!
//! The linker only needs to recognize module-level `import` and `export`
//! statements, but it must never mistake text inside strings, template
//! literals, comments or regular expressions for such a statement. This lexer
//! produces just enough structure for that: identifiers, punctuators and
//! opaque literal tokens, each annotated with its bracket nesting depth.

use std::ops::Range;

/// Kind of a lexed token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or keyword (including `#private` names)
    Ident,
    /// Single-byte punctuator
    Punct,
    /// Single or double quoted string literal, quotes included
    Str,
    /// A template literal fragment, from its opening delimiter to its closing one
    Template,
    /// Regular expression literal including flags
    Regex,
    /// Numeric literal
    Number,
}

/// A lexed token referring back into the source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
    /// Bracket nesting depth; module-level tokens have depth 0
    pub depth: u32,
    /// Whether a line terminator separates this token from the previous one
    pub newline_before: bool,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.clone()]
    }

    pub fn is_ident(&self, source: &str, name: &str) -> bool {
        self.kind == TokenKind::Ident && self.text(source) == name
    }

    pub fn is_punct(&self, source: &str, punct: &str) -> bool {
        self.kind == TokenKind::Punct && self.text(source) == punct
    }
}

/// Keywords after which a `/` starts a regular expression rather than a division
const REGEX_PRECEDING_KEYWORDS: &[&str] = &[
    "return",
    "typeof",
    "instanceof",
    "in",
    "of",
    "new",
    "delete",
    "void",
    "throw",
    "case",
    "do",
    "else",
    "yield",
    "await",
];

/// Tokenize JavaScript source. Never fails: unterminated literals simply run
/// to the end of the input.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut lexer = Lexer {
        source,
        bytes: source.as_bytes(),
        pos: 0,
        depth: 0,
        template_depths: Vec::new(),
        newline_before: false,
        tokens: Vec::new(),
    };
    lexer.run();
    lexer.tokens
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: u32,
    /// Depths at which an open `${` substitution returns to its template
    template_depths: Vec<u32>,
    newline_before: bool,
    tokens: Vec<Token>,
}

impl Lexer<'_> {
    fn run(&mut self) {
        loop {
            self.skip_trivia();
            let Some(&byte) = self.bytes.get(self.pos) else {
                break;
            };
            let start = self.pos;

            match byte {
                b'\'' | b'"' => {
                    self.scan_string(byte);
                    self.push(TokenKind::Str, start, self.depth);
                }
                b'`' => {
                    self.pos += 1;
                    self.scan_template(start);
                }
                b'/' if self.regex_allowed() && self.scan_regex() => {
                    self.push(TokenKind::Regex, start, self.depth);
                }
                b'0'..=b'9' => {
                    self.scan_number();
                    self.push(TokenKind::Number, start, self.depth);
                }
                b'.' if self.peek(1).is_some_and(|b| b.is_ascii_digit()) => {
                    self.scan_number();
                    self.push(TokenKind::Number, start, self.depth);
                }
                b if is_ident_start(b) => {
                    self.pos += 1;
                    while self.bytes.get(self.pos).copied().is_some_and(is_ident_continue) {
                        self.pos += 1;
                    }
                    self.push(TokenKind::Ident, start, self.depth);
                }
                b'(' | b'[' | b'{' => {
                    self.pos += 1;
                    self.push(TokenKind::Punct, start, self.depth);
                    self.depth += 1;
                }
                b'}' if self
                    .template_depths
                    .last()
                    .is_some_and(|&d| d + 1 == self.depth) =>
                {
                    // Closes a `${` substitution: resume the enclosing template
                    self.template_depths.pop();
                    self.depth -= 1;
                    self.pos += 1;
                    self.scan_template(start);
                }
                b')' | b']' | b'}' => {
                    self.pos += 1;
                    self.depth = self.depth.saturating_sub(1);
                    self.push(TokenKind::Punct, start, self.depth);
                }
                _ => {
                    self.pos += 1;
                    self.push(TokenKind::Punct, start, self.depth);
                }
            }
        }
    }

    fn push(&mut self, kind: TokenKind, start: usize, depth: u32) {
        self.tokens.push(Token {
            kind,
            span: start..self.pos,
            depth,
            newline_before: self.newline_before,
        });
        self.newline_before = false;
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn skip_trivia(&mut self) {
        while let Some(byte) = self.peek(0) {
            match byte {
                b'\n' | b'\r' => {
                    self.newline_before = true;
                    self.pos += 1;
                }
                b if b.is_ascii_whitespace() => self.pos += 1,
                b'/' if self.peek(1) == Some(b'/') => {
                    while self.peek(0).is_some_and(|b| b != b'\n') {
                        self.pos += 1;
                    }
                }
                b'/' if self.peek(1) == Some(b'*') => {
                    let rest = &self.source[self.pos + 2..];
                    let len = rest.find("*/").map_or(rest.len(), |i| i + 2);
                    if rest[..len].contains('\n') {
                        self.newline_before = true;
                    }
                    self.pos += 2 + len;
                }
                _ => break,
            }
        }
    }

    fn scan_string(&mut self, quote: u8) {
        self.pos += 1;
        while let Some(byte) = self.peek(0) {
            self.pos += 1;
            match byte {
                b'\\' => self.pos += 1,
                b if b == quote => return,
                b'\n' => return,
                _ => {}
            }
        }
        self.pos = self.pos.min(self.bytes.len());
    }

    /// Scan template characters up to the closing backtick or a `${`.
    /// `start` is where the fragment token begins.
    fn scan_template(&mut self, start: usize) {
        while let Some(byte) = self.peek(0) {
            match byte {
                b'\\' => self.pos += 2,
                b'`' => {
                    self.pos += 1;
                    self.push(TokenKind::Template, start, self.depth);
                    return;
                }
                b'$' if self.peek(1) == Some(b'{') => {
                    self.pos += 2;
                    self.push(TokenKind::Template, start, self.depth);
                    self.template_depths.push(self.depth);
                    self.depth += 1;
                    return;
                }
                _ => self.pos += 1,
            }
        }
        self.pos = self.pos.min(self.bytes.len());
        self.push(TokenKind::Template, start, self.depth);
    }

    fn regex_allowed(&self) -> bool {
        let Some(prev) = self.tokens.last() else {
            return true;
        };
        if prev.kind == TokenKind::Punct && self.ends_postfix_update() {
            return false;
        }
        !self.ends_operand(self.tokens.len() - 1)
    }

    /// Whether the token at `index` can end an operand, after which `/` divides
    fn ends_operand(&self, index: usize) -> bool {
        let token = &self.tokens[index];
        match token.kind {
            TokenKind::Ident => !REGEX_PRECEDING_KEYWORDS.contains(&token.text(self.source)),
            TokenKind::Punct => matches!(token.text(self.source), ")" | "]"),
            TokenKind::Str | TokenKind::Template | TokenKind::Regex | TokenKind::Number => true,
        }
    }

    /// Whether the last two tokens form a `++`/`--` applied to a preceding operand
    fn ends_postfix_update(&self) -> bool {
        let [.., _, first, second] = self.tokens.as_slice() else {
            return false;
        };
        let update = second.text(self.source);
        matches!(update, "+" | "-")
            && first.kind == TokenKind::Punct
            && first.text(self.source) == update
            && first.span.end == second.span.start
            && !first.newline_before
            && self.ends_operand(self.tokens.len() - 3)
    }

    /// Try to scan a regular expression literal at the current position.
    /// A literal cannot span lines, so running into a line terminator means
    /// the `/` was a division after all and nothing is consumed.
    fn scan_regex(&mut self) -> bool {
        let mut pos = self.pos + 1;
        let mut in_class = false;
        loop {
            match self.bytes.get(pos) {
                None | Some(b'\n' | b'\r') => return false,
                Some(b'\\') => pos += 2,
                Some(b'[') => {
                    in_class = true;
                    pos += 1;
                }
                Some(b']') => {
                    in_class = false;
                    pos += 1;
                }
                Some(b'/') if !in_class => {
                    pos += 1;
                    break;
                }
                Some(_) => pos += 1,
            }
        }
        while self.bytes.get(pos).copied().is_some_and(is_ident_continue) {
            pos += 1;
        }
        self.pos = pos;
        true
    }

    fn scan_number(&mut self) {
        self.pos += 1;
        while let Some(byte) = self.peek(0) {
            let exponent_sign =
                matches!(byte, b'+' | b'-') && matches!(self.bytes[self.pos - 1], b'e' | b'E');
            if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'.' || exponent_sign {
                self.pos += 1;
            } else {
                break;
            }
        }
    }
}

fn is_ident_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || matches!(byte, b'_' | b'$' | b'#') || byte >= 0x80
}

fn is_ident_continue(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'$') || byte >= 0x80
}
