//! Export binding resolution
//!
//! Reads a shared chunk's export statements into an alias → local-name map
//! and strips every export form from the chunk's code so the remaining body
//! can be pasted into a consumer verbatim.

use indexmap::IndexMap;
use log::{trace, warn};

use crate::{
    module_path::ModulePath,
    syntax::{Edit, ExportDecl, ExportKind, apply_edits, is_identifier, parse_module},
};

/// One externally visible name of a shared chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportBinding {
    pub exported_alias: String,
    pub local_name: String,
}

/// Chunk-scoped mapping from exported alias to internal symbol name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportMap {
    bindings: IndexMap<String, String>,
}

impl ExportMap {
    /// Record a binding. Aliases are unique within a chunk, so the first
    /// binding for an alias wins.
    pub fn insert(&mut self, exported_alias: impl Into<String>, local_name: impl Into<String>) {
        self.bindings
            .entry(exported_alias.into())
            .or_insert_with(|| local_name.into());
    }

    /// Internal name behind an exported alias
    pub fn local_name(&self, exported_alias: &str) -> Option<&str> {
        self.bindings.get(exported_alias).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Bindings in declaration order
    pub fn iter(&self) -> impl Iterator<Item = ExportBinding> + '_ {
        self.bindings
            .iter()
            .map(|(exported_alias, local_name)| ExportBinding {
                exported_alias: exported_alias.clone(),
                local_name: local_name.clone(),
            })
    }
}

/// A shared chunk's code with exports removed, plus what it exported
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedExports {
    pub exports: ExportMap,
    /// Export-free code body
    pub body: String,
}

/// Resolve the export bindings of a shared chunk and strip its export syntax.
///
/// Never fails: a chunk without recognizable exports yields an empty map and
/// its code unchanged apart from trailing whitespace.
pub fn resolve_exports(file_name: &str, code: &str) -> ResolvedExports {
    let module = parse_module(code);
    let mut exports = ExportMap::default();
    let mut edits = Vec::with_capacity(module.exports.len());

    for ExportDecl { span, kind } in module.exports {
        match kind {
            ExportKind::List {
                specifiers,
                from: None,
            } => {
                for specifier in specifiers {
                    exports.insert(specifier.exported, specifier.local);
                }
                edits.push(Edit::remove(span));
            }
            ExportKind::List {
                from: Some(from), ..
            }
            | ExportKind::All { from } => {
                warn!("Dropping re-export from '{from}' in {file_name}; re-exports are not linked");
                edits.push(Edit::remove(span));
            }
            ExportKind::Declaration { names } => {
                for name in names {
                    exports.insert(name.clone(), name);
                }
                edits.push(Edit::remove(span));
            }
            ExportKind::DefaultDeclaration { name } => {
                exports.insert("default", name);
                edits.push(Edit::remove(span));
            }
            ExportKind::DefaultExpression { end, terminated } => {
                let local = default_export_name(file_name);
                edits.push(Edit::replace(span, format!("const {local} = ")));
                if !terminated {
                    edits.push(Edit::insert(end, ";"));
                }
                exports.insert("default", local);
            }
        }
    }

    trace!("{file_name} exports {} bindings", exports.len());
    let body = apply_edits(code, edits).trim_end().to_owned();
    ResolvedExports { exports, body }
}

/// Strip residual export syntax from an entry's code, discarding bindings
pub fn strip_exports(file_name: &str, code: &str) -> String {
    resolve_exports(file_name, code).body
}

/// Chunk-scoped name for an anonymous default export (`__dom_default` for `dom.js`)
fn default_export_name(file_name: &str) -> String {
    let path = ModulePath::from_file_name(file_name);
    let stem: String = path
        .stem()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    let name = format!("__{stem}_default");
    debug_assert!(is_identifier(&name));
    name
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_export_list_is_parsed_and_stripped() {
        let resolved = resolve_exports(
            "dom.js",
            "function a(){}\nfunction r(){}\nexport { a as i, r as l };\n",
        );

        assert_eq!(resolved.exports.local_name("i"), Some("a"));
        assert_eq!(resolved.exports.local_name("l"), Some("r"));
        assert_eq!(resolved.exports.local_name("a"), None);
        assert_eq!(resolved.body, "function a(){}\nfunction r(){}");
    }

    #[test]
    fn test_minified_export_list() {
        let resolved = resolve_exports("dom.js", "function a(e){}export{a as i};");
        assert_eq!(resolved.exports.local_name("i"), Some("a"));
        assert_eq!(resolved.body, "function a(e){}");
    }

    #[test]
    fn test_no_exports_yields_empty_map() {
        let resolved = resolve_exports("polyfill.js", "window.x = 1;\n\n");
        assert!(resolved.exports.is_empty());
        assert_eq!(resolved.body, "window.x = 1;");
    }

    #[test]
    fn test_declaration_keywords_are_stripped() {
        let code = concat!(
            "export const a = 1;\n",
            "export let b = 2;\n",
            "export var c = 3;\n",
            "export function d() {}\n",
            "export class E {}\n",
            "export async function f() {}",
        );
        let resolved = resolve_exports("decls.js", code);

        assert_eq!(
            resolved.body,
            concat!(
                "const a = 1;\n",
                "let b = 2;\n",
                "var c = 3;\n",
                "function d() {}\n",
                "class E {}\n",
                "async function f() {}",
            )
        );
        let aliases: Vec<_> = resolved.exports.iter().map(|b| b.exported_alias).collect();
        assert_eq!(aliases, vec!["a", "b", "c", "d", "E", "f"]);
    }

    #[test]
    fn test_default_exports() {
        let resolved = resolve_exports("main.js", "export default function boot() {}");
        assert_eq!(resolved.body, "function boot() {}");
        assert_eq!(resolved.exports.local_name("default"), Some("boot"));

        let resolved = resolve_exports("ui-kit.js", "export default { theme: 'dark' }");
        assert_eq!(resolved.body, "const __ui_kit_default = { theme: 'dark' };");
        assert_eq!(
            resolved.exports.local_name("default"),
            Some("__ui_kit_default")
        );
    }

    #[test]
    fn test_duplicate_alias_keeps_first() {
        let resolved = resolve_exports("dup.js", "export { a as x };\nexport { b as x };");
        assert_eq!(resolved.exports.local_name("x"), Some("a"));
        assert_eq!(resolved.body, "");
    }

    #[test]
    fn test_reexports_are_dropped() {
        let resolved = resolve_exports("barrel.js", "const k = 1;\nexport * from './other.js';");
        assert!(resolved.exports.is_empty());
        assert_eq!(resolved.body, "const k = 1;");
    }

    #[test]
    fn test_export_text_in_strings_survives() {
        let code = "const s = \"export { a as b }\";\nexport { s as t };";
        let resolved = resolve_exports("str.js", code);
        assert_eq!(resolved.body, "const s = \"export { a as b }\";");
        assert_eq!(resolved.exports.local_name("t"), Some("s"));
    }
}
