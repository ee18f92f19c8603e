//! Closure wrapping
//!
//! Every finished entry is enclosed in a self-invoking function so its
//! top-level declarations (including inlined shared code) stay out of the
//! page's global scope. Any module syntax still present at this point is
//! removed, since the deployment target cannot load it.

use log::warn;

use crate::{
    exports::strip_exports,
    syntax::{Edit, apply_edits, parse_module},
};

pub const CLOSURE_PROLOGUE: &str = "(function() {";
pub const CLOSURE_EPILOGUE: &str = "})();";

/// Remove leftover import/export statements and wrap the code in a closure
pub fn wrap_entry(file_name: &str, code: &str) -> String {
    let body = strip_module_syntax(file_name, code);
    format!("{CLOSURE_PROLOGUE}\n{body}\n{CLOSURE_EPILOGUE}\n")
}

/// Remove every module-level import and export statement from `code`
pub fn strip_module_syntax(file_name: &str, code: &str) -> String {
    let module = parse_module(code);
    let edits: Vec<_> = module
        .imports
        .into_iter()
        .map(|import| {
            warn!(
                "Removing unresolved import of '{}' from {file_name}",
                import.specifier
            );
            Edit::remove(import.span)
        })
        .collect();

    let code = if edits.is_empty() {
        code.to_owned()
    } else {
        apply_edits(code, edits)
    };
    strip_exports(file_name, &code)
}
