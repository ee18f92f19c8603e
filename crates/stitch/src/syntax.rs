//! Parser for the module-level import/export grammar
//!
//! Works on the token stream from [`crate::lexer`] and recognizes only the
//! small, fixed set of statement shapes a bundler emits for chunk linkage.
//! Anything that does not match a known shape is left alone: parsing never
//! fails, it just recognizes less.

use std::ops::Range;

use crate::lexer::{Token, TokenKind, tokenize};

/// One `imported as local` pair of an import clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedImport {
    /// Name as exported by the imported module
    pub imported: String,
    /// Binding introduced in the importing module
    pub local: String,
}

/// The bindings an import statement introduces
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportClause {
    /// `import d from "..."`
    pub default: Option<String>,
    /// `import * as ns from "..."`
    pub namespace: Option<String>,
    /// `import { a as b, c } from "..."`
    pub named: Vec<NamedImport>,
}

impl ImportClause {
    /// A side-effect-only import binds nothing
    pub fn is_empty(&self) -> bool {
        self.default.is_none() && self.namespace.is_none() && self.named.is_empty()
    }

    /// All `imported → local` pairs in source order, with the default import
    /// expressed as an import of `default`
    pub fn bindings(&self) -> Vec<NamedImport> {
        let mut bindings = Vec::with_capacity(self.named.len() + 1);
        if let Some(local) = &self.default {
            bindings.push(NamedImport {
                imported: "default".to_owned(),
                local: local.clone(),
            });
        }
        bindings.extend(self.named.iter().cloned());
        bindings
    }
}

/// A static module-level import statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    /// Byte range of the whole statement, including a trailing `;`
    pub span: Range<usize>,
    /// Unquoted module specifier
    pub specifier: String,
    pub clause: ImportClause,
}

/// One `local as exported` pair of an export list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSpecifier {
    pub local: String,
    pub exported: String,
}

/// Shape of a module-level export statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportKind {
    /// `export { a as i, b }` or, with `from`, a re-export list
    List {
        specifiers: Vec<ExportSpecifier>,
        from: Option<String>,
    },
    /// `export * from "..."` / `export * as ns from "..."`
    All { from: String },
    /// `export const|let|var|function|class|async function ...`
    Declaration { names: Vec<String> },
    /// `export default function f() {}` / `export default class C {}`
    DefaultDeclaration { name: String },
    /// `export default <expression>` (including anonymous functions/classes)
    DefaultExpression {
        /// Byte offset just past the exported expression
        end: usize,
        /// Whether the statement already ends in `;`
        terminated: bool,
    },
}

/// A module-level export statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDecl {
    /// For list and star exports the whole statement; for declarations and
    /// defaults only the leading `export` / `export default` keywords plus the
    /// whitespace that follows them
    pub span: Range<usize>,
    pub kind: ExportKind,
}

/// Module-level linkage statements of one chunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSyntax {
    pub imports: Vec<ImportDecl>,
    pub exports: Vec<ExportDecl>,
}

/// Parse the module-level import and export statements of `source`
pub fn parse_module(source: &str) -> ModuleSyntax {
    let tokens = tokenize(source);
    let parser = Parser {
        source,
        tokens: &tokens,
    };

    let mut module = ModuleSyntax::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        if token.depth != 0 || token.kind != TokenKind::Ident || parser.follows_dot(i) {
            i += 1;
            continue;
        }

        match token.text(source) {
            "import" => {
                if let Some((decl, next)) = parser.parse_import(i) {
                    module.imports.push(decl);
                    i = next;
                    continue;
                }
            }
            "export" => {
                if let Some((decl, next)) = parser.parse_export(i) {
                    module.exports.push(decl);
                    i = next;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
    module
}

/// A text replacement over a byte range of the original source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub range: Range<usize>,
    pub replacement: String,
}

impl Edit {
    pub fn remove(range: Range<usize>) -> Self {
        Self {
            range,
            replacement: String::new(),
        }
    }

    pub fn replace(range: Range<usize>, replacement: impl Into<String>) -> Self {
        Self {
            range,
            replacement: replacement.into(),
        }
    }

    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::replace(at..at, text)
    }
}

/// Apply non-overlapping edits to `source`. Edits may be given in any order;
/// insertions at the same offset keep their relative order.
pub fn apply_edits(source: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|edit| (edit.range.start, edit.range.end));

    let mut output = String::with_capacity(source.len());
    let mut cursor = 0;
    for edit in edits {
        let start = edit.range.start.max(cursor);
        output.push_str(&source[cursor..start]);
        output.push_str(&edit.replacement);
        cursor = edit.range.end.max(start);
    }
    output.push_str(&source[cursor..]);
    output
}

/// Unquote a string literal token. Escapes are kept verbatim; module
/// specifiers and export names never need them in bundler output.
pub fn unquote(literal: &str) -> &str {
    let inner = literal.get(1..).unwrap_or_default();
    inner.strip_suffix(['"', '\'']).unwrap_or(inner)
}

/// Check whether `name` can be written as a bare JavaScript identifier
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token],
}

impl Parser<'_> {
    fn text(&self, index: usize) -> Option<&str> {
        self.tokens.get(index).map(|t| t.text(self.source))
    }

    fn is_ident(&self, index: usize, name: &str) -> bool {
        self.tokens
            .get(index)
            .is_some_and(|t| t.is_ident(self.source, name))
    }

    fn is_punct(&self, index: usize, punct: &str) -> bool {
        self.tokens
            .get(index)
            .is_some_and(|t| t.is_punct(self.source, punct))
    }

    fn kind(&self, index: usize) -> Option<TokenKind> {
        self.tokens.get(index).map(|t| t.kind)
    }

    /// Property accesses such as `foo.import` are not statements
    fn follows_dot(&self, index: usize) -> bool {
        index > 0 && self.is_punct(index - 1, ".")
    }

    /// End offset of the token at `index`
    fn end_of(&self, index: usize) -> usize {
        self.tokens[index].span.end
    }

    fn start_of(&self, index: usize) -> usize {
        self.tokens
            .get(index)
            .map_or(self.source.len(), |t| t.span.start)
    }

    /// Consume an optional `;` after token `last`; returns the index of the
    /// final token belonging to the statement
    fn consume_semicolon(&self, last: usize) -> usize {
        if self.is_punct(last + 1, ";") {
            last + 1
        } else {
            last
        }
    }

    /// A binding name in an import/export list: identifier or string literal
    fn module_export_name(&self, index: usize) -> Option<String> {
        match self.kind(index)? {
            TokenKind::Ident => self.text(index).map(str::to_owned),
            TokenKind::Str => self.text(index).map(|s| unquote(s).to_owned()),
            _ => None,
        }
    }

    /// Parse `{ a as b, c }` starting at the `{`. Returns the pairs as
    /// `(left, right)` and the index of the closing `}`.
    fn parse_braced_list(&self, open: usize) -> Option<(Vec<(String, String)>, usize)> {
        if !self.is_punct(open, "{") {
            return None;
        }
        let mut pairs = Vec::new();
        let mut i = open + 1;
        loop {
            if self.is_punct(i, "}") {
                return Some((pairs, i));
            }
            let left = self.module_export_name(i)?;
            i += 1;
            let right = if self.is_ident(i, "as") {
                let right = self.module_export_name(i + 1)?;
                i += 2;
                right
            } else {
                left.clone()
            };
            pairs.push((left, right));

            if self.is_punct(i, ",") {
                i += 1;
            } else if !self.is_punct(i, "}") {
                return None;
            }
        }
    }

    /// Parse `from "specifier"` at `index`; returns the specifier and the
    /// index of the string token
    fn parse_from_clause(&self, index: usize) -> Option<(String, usize)> {
        if !self.is_ident(index, "from") || self.kind(index + 1) != Some(TokenKind::Str) {
            return None;
        }
        let specifier = unquote(self.text(index + 1)?).to_owned();
        Some((specifier, index + 1))
    }

    /// Skip `with { type: "json" }` / `assert { ... }` import attributes
    fn skip_import_attributes(&self, last: usize) -> usize {
        if (self.is_ident(last + 1, "with") || self.is_ident(last + 1, "assert"))
            && self.is_punct(last + 2, "{")
        {
            let depth = self.tokens[last + 2].depth;
            let mut i = last + 3;
            while i < self.tokens.len() {
                if self.tokens[i].depth == depth && self.is_punct(i, "}") {
                    return i;
                }
                i += 1;
            }
        }
        last
    }

    fn parse_import(&self, start: usize) -> Option<(ImportDecl, usize)> {
        let mut i = start + 1;
        // `import(...)` and `import.meta` are expressions
        if self.is_punct(i, "(") || self.is_punct(i, ".") {
            return None;
        }

        let mut clause = ImportClause::default();
        let specifier;
        let mut last;

        if self.kind(i) == Some(TokenKind::Str) {
            specifier = unquote(self.text(i)?).to_owned();
            last = i;
        } else {
            let mut default_only = false;
            if self.kind(i) == Some(TokenKind::Ident) && !self.is_ident(i, "from") {
                clause.default = self.text(i).map(str::to_owned);
                i += 1;
                if self.is_punct(i, ",") {
                    i += 1;
                } else {
                    default_only = true;
                }
            }

            if !default_only {
                if self.is_punct(i, "*") {
                    if !self.is_ident(i + 1, "as") || self.kind(i + 2) != Some(TokenKind::Ident) {
                        return None;
                    }
                    clause.namespace = self.text(i + 2).map(str::to_owned);
                    i += 3;
                } else if self.is_punct(i, "{") {
                    let (pairs, close) = self.parse_braced_list(i)?;
                    clause.named = pairs
                        .into_iter()
                        .map(|(imported, local)| NamedImport { imported, local })
                        .collect();
                    i = close + 1;
                } else {
                    return None;
                }
            }

            let (from, string_index) = self.parse_from_clause(i)?;
            specifier = from;
            last = string_index;
        }

        last = self.skip_import_attributes(last);
        Some(self.finish_import(start, last, specifier, clause))
    }

    fn finish_import(
        &self,
        start: usize,
        last: usize,
        specifier: String,
        clause: ImportClause,
    ) -> (ImportDecl, usize) {
        let last = self.consume_semicolon(last);
        let decl = ImportDecl {
            span: self.start_of(start)..self.end_of(last),
            specifier,
            clause,
        };
        (decl, last + 1)
    }

    fn parse_export(&self, start: usize) -> Option<(ExportDecl, usize)> {
        let next = start + 1;
        let text = self.text(next)?;

        match text {
            "{" => {
                let (pairs, close) = self.parse_braced_list(next)?;
                let specifiers = pairs
                    .into_iter()
                    .map(|(local, exported)| ExportSpecifier { local, exported })
                    .collect();
                let (from, last) = match self.parse_from_clause(close + 1) {
                    Some((from, string_index)) => (Some(from), string_index),
                    None => (None, close),
                };
                let last = self.consume_semicolon(last);
                Some((
                    ExportDecl {
                        span: self.start_of(start)..self.end_of(last),
                        kind: ExportKind::List { specifiers, from },
                    },
                    last + 1,
                ))
            }
            "*" => {
                let mut i = next + 1;
                if self.is_ident(i, "as") {
                    i += 2;
                }
                let (from, string_index) = self.parse_from_clause(i)?;
                let last = self.consume_semicolon(string_index);
                Some((
                    ExportDecl {
                        span: self.start_of(start)..self.end_of(last),
                        kind: ExportKind::All { from },
                    },
                    last + 1,
                ))
            }
            "default" => self.parse_export_default(start),
            _ => {
                let names = self.declaration_names(next)?;
                Some((
                    ExportDecl {
                        span: self.start_of(start)..self.start_of(next),
                        kind: ExportKind::Declaration { names },
                    },
                    next,
                ))
            }
        }
    }

    fn parse_export_default(&self, start: usize) -> Option<(ExportDecl, usize)> {
        let value = start + 2;
        self.tokens.get(value)?;
        let keyword_span = self.start_of(start)..self.start_of(value);

        let is_async_function =
            self.is_ident(value, "async") && self.is_ident(value + 1, "function");
        let (keyword, name_index) = if is_async_function {
            ("function", value + 2)
        } else {
            (self.text(value)?, value + 1)
        };

        if keyword == "function" || keyword == "class" {
            let name_index = if self.is_punct(name_index, "*") {
                name_index + 1
            } else {
                name_index
            };
            if self.kind(name_index) == Some(TokenKind::Ident)
                && !self.is_ident(name_index, "extends")
            {
                let name = self.text(name_index)?.to_owned();
                return Some((
                    ExportDecl {
                        span: keyword_span,
                        kind: ExportKind::DefaultDeclaration { name },
                    },
                    value,
                ));
            }

            // Anonymous function or class: the expression ends with its body
            let body_close = self.body_close(name_index)?;
            let terminated = self.is_punct(body_close + 1, ";");
            return Some((
                ExportDecl {
                    span: keyword_span,
                    kind: ExportKind::DefaultExpression {
                        end: self.end_of(body_close),
                        terminated,
                    },
                },
                value,
            ));
        }

        let last = self.statement_end(value);
        let terminated = self.is_punct(last, ";");
        let end = if terminated {
            self.start_of(last)
        } else {
            self.end_of(last)
        };
        Some((
            ExportDecl {
                span: keyword_span,
                kind: ExportKind::DefaultExpression { end, terminated },
            },
            value,
        ))
    }

    /// Index of the `}` closing the first module-level-relative `{` at or after `from`
    fn body_close(&self, from: usize) -> Option<usize> {
        let base = self.tokens.get(from)?.depth;
        let open = (from..self.tokens.len())
            .find(|&i| self.tokens[i].depth == base && self.is_punct(i, "{"))?;
        (open + 1..self.tokens.len())
            .find(|&i| self.tokens[i].depth == base && self.is_punct(i, "}"))
    }

    /// Index of the last token of the statement starting at `from`: the `;`
    /// that ends it, or the token before an automatic-semicolon line break
    fn statement_end(&self, from: usize) -> usize {
        let base = self.tokens[from].depth;
        let mut i = from;
        while i + 1 < self.tokens.len() {
            let next = &self.tokens[i + 1];
            if self.is_punct(i, ";") && self.tokens[i].depth == base {
                return i;
            }
            if next.depth == base
                && next.newline_before
                && self.ends_expression(i)
                && !continues_expression(next, self.source)
            {
                return i;
            }
            i += 1;
        }
        i
    }

    fn ends_expression(&self, index: usize) -> bool {
        match self.kind(index) {
            Some(TokenKind::Punct) => matches!(self.text(index), Some(")" | "]" | "}")),
            Some(_) => true,
            None => false,
        }
    }

    /// Names bound by the declaration starting at `index`, if it is one
    fn declaration_names(&self, index: usize) -> Option<Vec<String>> {
        match self.text(index)? {
            "const" | "let" | "var" => Some(self.variable_names(index + 1)),
            "function" | "class" => self.declared_name(index + 1).map(|n| vec![n]),
            "async" if self.is_ident(index + 1, "function") => {
                self.declared_name(index + 2).map(|n| vec![n])
            }
            _ => None,
        }
    }

    fn declared_name(&self, index: usize) -> Option<String> {
        let index = if self.is_punct(index, "*") {
            index + 1
        } else {
            index
        };
        if self.kind(index) == Some(TokenKind::Ident) {
            self.text(index).map(str::to_owned)
        } else {
            None
        }
    }

    /// Binding names of a `const`/`let`/`var` declaration list starting at the
    /// first declarator
    fn variable_names(&self, first: usize) -> Vec<String> {
        let Some(base) = self.tokens.get(first).map(|t| t.depth) else {
            return Vec::new();
        };
        let end = self.statement_end(first);

        let mut names = Vec::new();
        let mut declarator = first;
        loop {
            self.collect_binding_names(declarator, &mut names);
            let Some(comma) = (declarator + 1..=end)
                .find(|&i| self.tokens[i].depth == base && self.is_punct(i, ","))
            else {
                break;
            };
            declarator = comma + 1;
            if declarator > end {
                break;
            }
        }
        names
    }

    /// Collect the names bound by a single declarator target (identifier or
    /// destructuring pattern)
    fn collect_binding_names(&self, index: usize, names: &mut Vec<String>) {
        match self.kind(index) {
            Some(TokenKind::Ident) => {
                if let Some(name) = self.text(index) {
                    names.push(name.to_owned());
                }
            }
            Some(TokenKind::Punct) if matches!(self.text(index), Some("{" | "[")) => {
                let base = self.tokens[index].depth;
                let mut i = index + 1;
                while i < self.tokens.len() && self.tokens[i].depth > base {
                    let is_target = self.kind(i) == Some(TokenKind::Ident)
                        && !self.is_punct(i.saturating_sub(1), ".")
                        && !self.is_punct(i.saturating_sub(1), "=")
                        && matches!(self.text(i + 1), Some("," | "}" | "]" | "="));
                    if is_target && let Some(name) = self.text(i) {
                        names.push(name.to_owned());
                    }
                    i += 1;
                }
            }
            _ => {}
        }
    }
}

/// Tokens that continue the previous line's expression despite a line break
fn continues_expression(token: &Token, source: &str) -> bool {
    token.kind == TokenKind::Punct
        && matches!(
            token.text(source),
            "." | "," | "?" | ":" | "+" | "-" | "*" | "/" | "%" | "&" | "|" | "^" | "=" | "<" | ">"
                | "(" | "["
        )
}
