//! Structural checks on finished scripts
//!
//! A deployable content script must be free of module syntax and enclosed in
//! a self-invoking closure. These checks run over the final text, independent
//! of how it was produced, so they also work on output written by earlier
//! builds.

use std::{fmt, sync::LazyLock};

use anyhow::{Result, bail};
use log::{debug, error};
use regex::Regex;

use crate::bundle::Bundle;

static IMPORT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^[ \t]*import\s*[\w{*"']"#).expect("valid regex"));
static EXPORT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*export\b").expect("valid regex"));
static EXPORT_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"export\s*\{").expect("valid regex"));
static RELATIVE_FROM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"from\s+["']\.\."#).expect("valid regex"));
static CLOSURE_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(function\(\)\s*\{").expect("valid regex"));
static CLOSURE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\}\)\(\);?\s*$").expect("valid regex"));

/// A structural problem in a finished script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A line begins with an `import` statement
    ImportStatement { line: usize },
    /// A line begins with `export`
    ExportStatement { line: usize },
    /// An `export {` list appears anywhere
    ExportList { line: usize },
    /// A `from "../..."` module reference survived
    RelativeSpecifier { line: usize },
    /// The code does not open with the closure prologue
    MissingClosureStart,
    /// The code does not end with the closure invocation
    MissingClosureEnd,
    /// A non-entry chunk is still part of the output
    SharedChunkEmitted,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImportStatement { line } => write!(f, "line {line}: import statement"),
            Self::ExportStatement { line } => write!(f, "line {line}: export statement"),
            Self::ExportList { line } => write!(f, "line {line}: export list"),
            Self::RelativeSpecifier { line } => write!(f, "line {line}: relative module reference"),
            Self::MissingClosureStart => write!(f, "does not start with a closure prologue"),
            Self::MissingClosureEnd => write!(f, "does not end with a closure invocation"),
            Self::SharedChunkEmitted => write!(f, "shared chunk left in the output"),
        }
    }
}

/// Check one finished script
pub fn verify_script(code: &str) -> Vec<Violation> {
    let mut violations = Vec::new();
    collect_matches(&mut violations, &IMPORT_LINE, code, |line| {
        Violation::ImportStatement { line }
    });
    collect_matches(&mut violations, &EXPORT_LINE, code, |line| {
        Violation::ExportStatement { line }
    });
    collect_matches(&mut violations, &EXPORT_LIST, code, |line| {
        Violation::ExportList { line }
    });
    collect_matches(&mut violations, &RELATIVE_FROM, code, |line| {
        Violation::RelativeSpecifier { line }
    });

    let trimmed = code.trim();
    if !CLOSURE_START.is_match(trimmed) {
        violations.push(Violation::MissingClosureStart);
    }
    if !CLOSURE_END.is_match(trimmed) {
        violations.push(Violation::MissingClosureEnd);
    }
    violations
}

fn collect_matches(
    violations: &mut Vec<Violation>,
    pattern: &Regex,
    code: &str,
    violation: impl Fn(usize) -> Violation,
) {
    for found in pattern.find_iter(code) {
        let line = code[..found.start()].matches('\n').count() + 1;
        violations.push(violation(line));
    }
}

/// Check every chunk of a linked bundle, failing with a report of all
/// violations
pub fn verify_bundle(bundle: &Bundle) -> Result<()> {
    let mut failures = Vec::new();
    for chunk in bundle.chunks() {
        let mut violations = verify_script(&chunk.code);
        if !chunk.is_entry {
            violations.push(Violation::SharedChunkEmitted);
        }
        for violation in violations {
            error!("{}: {violation}", chunk.file_name);
            failures.push(format!("{}: {violation}", chunk.file_name));
        }
    }

    if !failures.is_empty() {
        bail!(
            "Linked output failed {} structural check(s):\n  {}",
            failures.len(),
            failures.join("\n  ")
        );
    }
    debug!("Verified {} script(s)", bundle.len());
    Ok(())
}
