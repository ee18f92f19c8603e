//! Import site rewriting
//!
//! Replaces every import of a shared chunk with the chunk's export-free body
//! followed by the alias bindings the importer expects. A body is injected at
//! most once per consumer; later import sites of the same chunk only add
//! their bindings.

use std::fmt;

use anyhow::{Context, Result, bail};
use indexmap::{IndexMap, IndexSet};
use log::{debug, trace, warn};
use rustc_hash::FxHashMap;

use crate::{
    classifier::ChunkIndex,
    exports::ExportMap,
    lexer::tokenize,
    syntax::{Edit, ImportDecl, apply_edits, is_identifier, parse_module},
    types::ChunkKind,
};

/// A generated `const <local_alias> = <value>;` declaration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AliasBinding {
    pub local_alias: String,
    /// Resolved internal name, or an object literal for namespace imports
    pub value: String,
}

impl fmt::Display for AliasBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "const {} = {};", self.local_alias, self.value)
    }
}

/// A shared chunk prepared for injection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedUnit {
    pub file_name: String,
    pub exports: ExportMap,
    /// Export-free code with its imports of other shared chunks removed
    pub body: String,
    /// Shared chunks this body depends on, in import order
    pub requires: Vec<String>,
    /// Bindings the body expects for its own imports; emitted right before
    /// the body unless the consumer already declares them
    pub bindings: Vec<AliasBinding>,
}

/// An import statement together with the chunk it refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSite {
    pub decl: ImportDecl,
    pub target: String,
    pub kind: ChunkKind,
}

/// Find every import statement in `code` that refers to a chunk of the bundle
pub fn find_import_sites(index: &ChunkIndex, importer: &str, code: &str) -> Vec<ImportSite> {
    parse_module(code)
        .imports
        .into_iter()
        .filter_map(|decl| {
            let target = index.resolve(importer, &decl.specifier)?;
            Some(ImportSite {
                target: target.file_name.to_owned(),
                kind: target.kind,
                decl,
            })
        })
        .collect()
}

/// Result of rewriting one entry chunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryRewrite {
    pub code: String,
    /// Shared chunks whose bodies were injected, in bundle order
    pub inlined: Vec<String>,
}

/// Per-consumer bookkeeping
#[derive(Debug, Default)]
struct LinkState {
    injected: IndexSet<String>,
    bound: FxHashMap<String, String>,
}

impl LinkState {
    /// Record a binding; returns `false` when an identical binding already exists
    fn bind(&mut self, importer: &str, binding: &AliasBinding) -> Result<bool> {
        match self.bound.get(&binding.local_alias) {
            Some(existing) if *existing == binding.value => Ok(false),
            Some(existing) => bail!(
                "Conflicting bindings for '{}' in {importer}: '{existing}' and '{}'",
                binding.local_alias,
                binding.value
            ),
            None => {
                self.bound
                    .insert(binding.local_alias.clone(), binding.value.clone());
                Ok(true)
            }
        }
    }
}

/// Rewrites import sites against a set of prepared shared units
#[derive(Debug)]
pub struct ImportRewriter<'a> {
    index: &'a ChunkIndex,
    units: &'a IndexMap<String, SharedUnit>,
    strict_aliases: bool,
}

impl<'a> ImportRewriter<'a> {
    pub fn new(
        index: &'a ChunkIndex,
        units: &'a IndexMap<String, SharedUnit>,
        strict_aliases: bool,
    ) -> Self {
        Self {
            index,
            units,
            strict_aliases,
        }
    }

    /// Inline shared chunks into an entry.
    ///
    /// Every shared chunk the entry needs, directly or through other shared
    /// chunks, is injected at the textually first shared import site,
    /// dependencies before dependents and otherwise in `order`. Later import
    /// sites only receive their bindings. Running this over an already
    /// rewritten entry finds no import sites and returns the code unchanged.
    pub fn rewrite_entry(
        &self,
        entry: &str,
        code: &str,
        order: &[String],
    ) -> Result<EntryRewrite> {
        let sites: Vec<_> = find_import_sites(self.index, entry, code)
            .into_iter()
            .filter(|site| site.kind.is_shared())
            .collect();
        if sites.is_empty() {
            return Ok(EntryRewrite {
                code: code.to_owned(),
                inlined: Vec::new(),
            });
        }
        trace!("{entry} has {} shared import site(s)", sites.len());

        let mut state = LinkState::default();
        let mut edits = Vec::with_capacity(sites.len());
        for (position, site) in sites.iter().enumerate() {
            let mut pieces = Vec::new();
            if position == 0 {
                for shared in order {
                    if sites.iter().any(|s| s.target == *shared) {
                        self.inject(entry, shared, &mut state, &mut pieces)?;
                    }
                }
                for other in &sites {
                    self.inject(entry, &other.target, &mut state, &mut pieces)?;
                }
            }
            for binding in self.bindings_for(entry, site)? {
                if state.bind(entry, &binding)? {
                    pieces.push(binding.to_string());
                }
            }
            edits.push(Edit::replace(site.decl.span.clone(), pieces.join("\n")));
        }

        let mut inlined: Vec<_> = order
            .iter()
            .filter(|shared| state.injected.contains(*shared))
            .cloned()
            .collect();
        inlined.extend(
            state
                .injected
                .iter()
                .filter(|shared| !order.contains(shared))
                .cloned(),
        );
        debug!("Inlined {} shared chunk(s) into {entry}", inlined.len());
        Ok(EntryRewrite {
            code: apply_edits(code, edits),
            inlined,
        })
    }

    /// Prepare a shared chunk: remove its imports of other shared chunks,
    /// recording those chunks as requirements and the imports' aliases as
    /// bindings. Every required chunk must already be present in the unit set.
    pub fn link_shared(
        &self,
        file_name: &str,
        exports: ExportMap,
        body: &str,
    ) -> Result<SharedUnit> {
        let mut state = LinkState::default();
        let mut requires = Vec::new();
        let mut bindings = Vec::new();
        let mut edits = Vec::new();

        for site in find_import_sites(self.index, file_name, body) {
            if site.kind.is_entry() {
                warn!(
                    "Shared chunk {file_name} imports entry chunk {}; entries are never inlined",
                    site.target
                );
                continue;
            }

            for binding in self.bindings_for(file_name, &site)? {
                if state.bind(file_name, &binding)? {
                    bindings.push(binding);
                }
            }
            if !requires.contains(&site.target) {
                requires.push(site.target.clone());
            }
            edits.push(Edit::remove(site.decl.span.clone()));
        }

        Ok(SharedUnit {
            file_name: file_name.to_owned(),
            exports,
            body: apply_edits(body, edits).trim().to_owned(),
            requires,
            bindings,
        })
    }

    fn unit(&self, file_name: &str) -> Result<&'a SharedUnit> {
        self.units
            .get(file_name)
            .with_context(|| format!("Shared chunk {file_name} was not prepared for inlining"))
    }

    /// Append the body of `file_name`, preceded by any requirement not yet
    /// injected into this consumer
    fn inject(
        &self,
        consumer: &str,
        file_name: &str,
        state: &mut LinkState,
        pieces: &mut Vec<String>,
    ) -> Result<()> {
        if !state.injected.insert(file_name.to_owned()) {
            trace!("{file_name} already injected into {consumer}");
            return Ok(());
        }

        let unit = self.unit(file_name)?;
        for dependency in &unit.requires {
            self.inject(consumer, dependency, state, pieces)?;
        }
        for binding in &unit.bindings {
            if state.bind(consumer, binding)? {
                pieces.push(binding.to_string());
            }
        }
        if !unit.body.is_empty() {
            pieces.push(terminate_statement(&unit.body));
        }
        Ok(())
    }

    /// Alias bindings an import site needs, in import-list order
    fn bindings_for(&self, importer: &str, site: &ImportSite) -> Result<Vec<AliasBinding>> {
        let unit = self.unit(&site.target)?;
        let clause = &site.decl.clause;
        let mut bindings = Vec::new();

        for import in clause.bindings() {
            let value = self.resolve_alias(importer, unit, &import.imported)?;
            if value != import.local {
                bindings.push(AliasBinding {
                    local_alias: import.local,
                    value,
                });
            }
        }

        if let Some(namespace) = &clause.namespace {
            bindings.push(AliasBinding {
                local_alias: namespace.clone(),
                value: namespace_object(&unit.exports),
            });
        }
        Ok(bindings)
    }

    /// Map an imported name to the shared chunk's internal symbol
    fn resolve_alias(&self, importer: &str, unit: &SharedUnit, imported: &str) -> Result<String> {
        if let Some(local) = unit.exports.local_name(imported) {
            return Ok(local.to_owned());
        }
        if self.strict_aliases {
            bail!(
                "{importer} imports '{imported}' from {}, which does not export it",
                unit.file_name
            );
        }
        warn!(
            "{importer} imports '{imported}' from {}, which does not export it; binding the raw \
             name",
            unit.file_name
        );
        Ok(imported.to_owned())
    }
}

/// `Object.freeze({ alias: local, ... })` for a namespace import
fn namespace_object(exports: &ExportMap) -> String {
    let members: Vec<_> = exports
        .iter()
        .map(|binding| {
            if is_identifier(&binding.exported_alias) {
                format!("{}: {}", binding.exported_alias, binding.local_name)
            } else {
                format!("{:?}: {}", binding.exported_alias, binding.local_name)
            }
        })
        .collect();
    if members.is_empty() {
        "Object.freeze({})".to_owned()
    } else {
        format!("Object.freeze({{ {} }})", members.join(", "))
    }
}

/// Make sure an injected body cannot merge with the code that follows it.
/// The `;` goes right after the last token so a trailing line comment cannot
/// swallow it.
fn terminate_statement(body: &str) -> String {
    match tokenize(body).last() {
        Some(last) if !last.is_punct(body, ";") => {
            apply_edits(body, vec![Edit::insert(last.span.end, ";")])
        }
        _ => body.to_owned(),
    }
}
