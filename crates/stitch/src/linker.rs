//! Link pipeline
//!
//! Drives one bundle through classification, export resolution, import
//! rewriting, dead chunk elimination and closure wrapping. All stages run on a
//! private copy of the bundle; the caller's bundle is replaced only when every
//! stage succeeded.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use indexmap::{IndexMap, IndexSet};
use log::{debug, info};

use crate::{
    bundle::{Bundle, Chunk},
    chunk_graph::ChunkGraph,
    classifier::{ChunkIndex, Classification, classify},
    config::Config,
    eliminator::eliminate_shared_chunks,
    exports::resolve_exports,
    rewriter::{ImportRewriter, SharedUnit, find_import_sites},
    verify::verify_bundle,
    wrapper::wrap_entry,
};

/// Behavior switches for a link run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkOptions {
    /// Fail instead of binding the raw name when an import has no matching export
    pub strict_aliases: bool,
    /// Run the structural checks over the finished entries
    pub verify: bool,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            strict_aliases: false,
            verify: true,
        }
    }
}

/// Summary of a successful link run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkReport {
    /// Entry chunks left in the bundle
    pub entries: Vec<String>,
    /// Shared chunks injected into each entry, in bundle order
    pub inlined: IndexMap<String, Vec<String>>,
    /// Shared chunks removed after being inlined somewhere
    pub consumed: Vec<String>,
    /// Shared chunks removed without any entry importing them
    pub unused: Vec<String>,
}

impl LinkReport {
    /// Every shared chunk that was removed from the bundle
    pub fn removed(&self) -> impl Iterator<Item = &str> {
        self.consumed
            .iter()
            .chain(&self.unused)
            .map(String::as_str)
    }
}

/// Link `bundle` into self-contained entry scripts.
///
/// On success the bundle holds only entry chunks, each wrapped in a closure.
/// On failure it is left untouched.
pub fn link(bundle: &mut Bundle, options: &LinkOptions) -> Result<LinkReport> {
    let mut working = bundle.clone();
    let report = link_in_place(&mut working, options)?;
    *bundle = working;
    Ok(report)
}

fn link_in_place(bundle: &mut Bundle, options: &LinkOptions) -> Result<LinkReport> {
    let classification = classify(bundle);
    let index = ChunkIndex::new(&classification);
    let units = prepare_shared_units(bundle, &classification, &index, options)?;
    let rewriter = ImportRewriter::new(&index, &units, options.strict_aliases);

    let mut consumed = IndexSet::new();
    let mut inlined = IndexMap::new();
    for entry in &classification.entries {
        let chunk = entry_chunk(bundle, entry)?;
        let rewrite = rewriter
            .rewrite_entry(entry, &chunk.code, &classification.shared)
            .with_context(|| format!("Failed to inline shared chunks into {entry}"))?;
        chunk.code = rewrite.code;
        consumed.extend(rewrite.inlined.iter().cloned());
        inlined.insert(entry.clone(), rewrite.inlined);
    }

    let elimination = eliminate_shared_chunks(bundle, &classification, &consumed);

    for entry in &classification.entries {
        let chunk = entry_chunk(bundle, entry)?;
        chunk.code = wrap_entry(entry, &chunk.code);
    }

    if options.verify {
        verify_bundle(bundle)?;
    }

    Ok(LinkReport {
        entries: classification.entries,
        inlined,
        consumed: elimination.consumed,
        unused: elimination.unused,
    })
}

fn entry_chunk<'b>(bundle: &'b mut Bundle, entry: &str) -> Result<&'b mut Chunk> {
    bundle
        .get_mut(entry)
        .with_context(|| format!("Entry chunk {entry} disappeared from the bundle"))
}

/// Resolve the exports of every shared chunk and link shared chunks against
/// each other, dependencies first
fn prepare_shared_units(
    bundle: &Bundle,
    classification: &Classification,
    index: &ChunkIndex,
    options: &LinkOptions,
) -> Result<IndexMap<String, SharedUnit>> {
    let mut resolved = IndexMap::with_capacity(classification.shared.len());
    for file_name in &classification.shared {
        let chunk = bundle
            .get(file_name)
            .with_context(|| format!("Shared chunk {file_name} is missing from the bundle"))?;
        resolved.insert(file_name.clone(), resolve_exports(file_name, &chunk.code));
    }

    let mut graph = ChunkGraph::new(&classification.shared);
    for (file_name, exports) in &resolved {
        for site in find_import_sites(index, file_name, &exports.body) {
            if site.kind.is_shared() {
                graph.add_dependency(file_name, &site.target);
            }
        }
    }
    let order = graph.topological_order()?;
    debug!("Shared chunk link order: {order:?}");

    let mut units = IndexMap::with_capacity(order.len());
    for file_name in order {
        let Some(exports) = resolved.swap_remove(&file_name) else {
            continue;
        };
        let unit = ImportRewriter::new(index, &units, options.strict_aliases)
            .link_shared(&file_name, exports.exports, &exports.body)
            .with_context(|| format!("Failed to link shared chunk {file_name}"))?;
        units.insert(file_name, unit);
    }
    Ok(units)
}

/// Files touched by a build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutput {
    pub report: LinkReport,
    /// Entry scripts that were written
    pub written: Vec<PathBuf>,
    /// Shared chunk files deleted from an in-place output directory
    pub deleted: Vec<PathBuf>,
}

/// Load the configured bundle directory, link it and write the entries out.
///
/// When the output directory is the input directory, the files of removed
/// shared chunks are deleted so only deployable scripts remain.
pub fn run_build(config: &Config) -> Result<BuildOutput> {
    if config.entries.is_empty() {
        bail!(
            "No entry chunks configured for {}; every chunk would be removed",
            config.input_dir.display()
        );
    }
    let mut bundle = Bundle::load_dir(&config.input_dir, &config.entries)?;

    let report = link(&mut bundle, &config.link_options())
        .with_context(|| format!("Failed to link bundle in {}", config.input_dir.display()))?;

    let output_dir = config.output_dir();
    let written = bundle.write_dir(output_dir)?;
    let mut deleted = Vec::new();
    if config.is_in_place() {
        for file_name in report.removed() {
            let path = output_dir.join(file_name);
            fs::remove_file(&path)
                .with_context(|| format!("Failed to delete shared chunk {}", path.display()))?;
            debug!("Deleted {}", path.display());
            deleted.push(path);
        }
    }

    info!(
        "Linked {} entr{} into {} ({} shared chunk(s) inlined, {} unused)",
        report.entries.len(),
        if report.entries.len() == 1 { "y" } else { "ies" },
        output_dir.display(),
        report.consumed.len(),
        report.unused.len()
    );
    Ok(BuildOutput {
        report,
        written,
        deleted,
    })
}

/// Run the structural checks over already linked scripts in `dir`.
///
/// With no `entries`, every `.js` file below `dir` is expected to be a
/// finished script. Returns the number of scripts checked.
pub fn check_dir(dir: &Path, entries: &[String]) -> Result<usize> {
    let bundle = Bundle::load_dir(dir, entries)?;
    let scripts: Bundle = bundle
        .chunks()
        .filter(|chunk| entries.is_empty() || chunk.is_entry)
        .map(|chunk| Chunk::entry(chunk.file_name.clone(), chunk.code.clone()))
        .collect();

    verify_bundle(&scripts)
        .with_context(|| format!("Scripts in {} are not deployable", dir.display()))?;
    info!("{} script(s) in {} passed", scripts.len(), dir.display());
    Ok(scripts.len())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const DOM: &str = "function a(e){const t=document.createElement(\"style\");t.textContent=e;document.head.appendChild(t)}\nexport { a as i };\n";

    fn linked(bundle: &mut Bundle) -> LinkReport {
        link(bundle, &LinkOptions::default()).unwrap()
    }

    #[test]
    fn test_inlines_shared_chunk_into_entry() {
        let mut bundle: Bundle = [
            Chunk::shared("dom.js", DOM),
            Chunk::entry(
                "content/calendar.js",
                "import { i as injectCSS } from \"../dom\";\ninjectCSS(\".cal{}\");\n",
            ),
        ]
        .into_iter()
        .collect();

        let report = linked(&mut bundle);

        assert_eq!(
            bundle.file_names().collect::<Vec<_>>(),
            vec!["content/calendar.js"]
        );
        assert_eq!(report.consumed, vec!["dom.js"]);
        let code = &bundle.get("content/calendar.js").unwrap().code;
        assert_eq!(
            code,
            concat!(
                "(function() {\n",
                "function a(e){const t=document.createElement(\"style\");t.textContent=e;document.head.appendChild(t)};\n",
                "const injectCSS = a;\n",
                "injectCSS(\".cal{}\");\n",
                "})();\n"
            )
        );
    }

    #[test]
    fn test_shared_chunk_without_exports() {
        let mut bundle: Bundle = [
            Chunk::shared("polyfill.js", "window.__ready = true;"),
            Chunk::entry("main.js", "import './polyfill.js';\nboot();"),
        ]
        .into_iter()
        .collect();

        linked(&mut bundle);
        assert_eq!(
            bundle.get("main.js").unwrap().code,
            "(function() {\nwindow.__ready = true;\nboot();\n})();\n"
        );
    }

    #[test]
    fn test_two_shared_chunks_in_enumeration_order() {
        let mut bundle: Bundle = [
            Chunk::shared("dom.js", "function a(){}\nexport { a as i };"),
            Chunk::shared("time.js", "function f(){}\nexport { f as t };"),
            Chunk::entry(
                "main.js",
                "import { t as fmt } from './time.js';\nimport { i as inject } from './dom.js';\ninject(fmt());",
            ),
        ]
        .into_iter()
        .collect();

        let report = linked(&mut bundle);

        assert_eq!(report.inlined["main.js"], vec!["dom.js", "time.js"]);
        assert_eq!(bundle.len(), 1);
        assert_eq!(
            bundle.get("main.js").unwrap().code,
            concat!(
                "(function() {\n",
                "function a(){};\n",
                "function f(){};\nconst fmt = f;\n",
                "const inject = a;\n",
                "inject(fmt());\n",
                "})();\n"
            )
        );
    }

    #[test]
    fn test_shared_chunk_used_by_several_entries() {
        let mut bundle: Bundle = [
            Chunk::shared("dom.js", DOM),
            Chunk::entry("content/calendar.js", "import{i as S}from\"../dom.js\";S(1);"),
            Chunk::entry("content/contact.js", "import{i as n}from\"../dom.js\";n(2);"),
            Chunk::shared("orphan.js", "console.log('never');"),
        ]
        .into_iter()
        .collect();

        let report = linked(&mut bundle);

        assert_eq!(report.consumed, vec!["dom.js"]);
        assert_eq!(report.unused, vec!["orphan.js"]);
        for (entry, alias) in [("content/calendar.js", "S"), ("content/contact.js", "n")] {
            let code = &bundle.get(entry).unwrap().code;
            assert!(code.contains(&format!("const {alias} = a;")), "{code}");
            assert!(code.contains("function a(e)"), "{code}");
        }
    }

    #[test]
    fn test_entry_chunks_are_never_inlined() {
        let mut bundle: Bundle = [
            Chunk::entry("a.js", "export const shared = 1;"),
            Chunk::entry("b.js", "run();"),
        ]
        .into_iter()
        .collect();

        let report = linked(&mut bundle);
        assert!(report.inlined.values().all(Vec::is_empty));
        assert_eq!(
            bundle.get("a.js").unwrap().code,
            "(function() {\nconst shared = 1;\n})();\n"
        );
    }

    #[test]
    fn test_shared_dependencies_are_linked_first() {
        let mut bundle: Bundle = [
            Chunk::shared(
                "dom.js",
                "import { n as now } from './time.js';\nfunction d(){ return now(); }\nexport { d as i };",
            ),
            Chunk::shared("time.js", "function t(){}\nexport { t as n };"),
            Chunk::entry("main.js", "import { i as inject } from './dom.js';\ninject();"),
        ]
        .into_iter()
        .collect();

        let report = linked(&mut bundle);

        assert_eq!(report.inlined["main.js"], vec!["dom.js", "time.js"]);
        assert_eq!(
            bundle.get("main.js").unwrap().code,
            concat!(
                "(function() {\n",
                "function t(){};\nconst now = t;\n",
                "function d(){ return now(); };\nconst inject = d;\n",
                "inject();\n",
                "})();\n"
            )
        );
    }

    #[test]
    fn test_cycle_fails_and_leaves_bundle_untouched() {
        let mut bundle: Bundle = [
            Chunk::shared("a.js", "import { b } from './b.js';\nexport function a(){ b(); }"),
            Chunk::shared("b.js", "import { a } from './a.js';\nexport function b(){ a(); }"),
            Chunk::entry("main.js", "import { a } from './a.js';\na();"),
        ]
        .into_iter()
        .collect();
        let before = bundle.clone();

        let err = link(&mut bundle, &LinkOptions::default()).unwrap_err();
        assert!(format!("{err:#}").contains("Circular dependency"), "{err:#}");
        assert_eq!(bundle, before);
    }

    #[test]
    fn test_strict_aliases_fail_the_link() {
        let mut bundle: Bundle = [
            Chunk::shared("dom.js", "function q(){}"),
            Chunk::entry("main.js", "import { q as run } from './dom.js';\nrun();"),
        ]
        .into_iter()
        .collect();
        let options = LinkOptions {
            strict_aliases: true,
            verify: true,
        };

        let err = link(&mut bundle, &options).unwrap_err();
        assert!(format!("{err:#}").contains("which does not export it"), "{err:#}");
        assert_eq!(bundle.len(), 2);
    }

    #[test]
    fn test_division_after_postfix_update_keeps_exports() {
        let mut bundle: Bundle = [
            Chunk::shared(
                "dom.js",
                "let n=0;function a(){return n++/2}const b=n/4;export{a as i};",
            ),
            Chunk::entry("main.js", "import{i as S}from\"./dom.js\";S();"),
        ]
        .into_iter()
        .collect();

        linked(&mut bundle);
        assert_eq!(
            bundle.get("main.js").unwrap().code,
            concat!(
                "(function() {\n",
                "let n=0;function a(){return n++/2}const b=n/4;\n",
                "const S = a;S();\n",
                "})();\n"
            )
        );
    }

    #[test]
    fn test_dependency_listed_first_is_injected_first() {
        let mut bundle: Bundle = [
            Chunk::shared("b.js", "const K=1;function g(){return K}export{g as h};"),
            Chunk::shared("a.js", "import{h as g}from\"./b.js\";const V=g();export{V as v};"),
            Chunk::entry("main.js", "import{v}from\"./a.js\";import{h}from\"./b.js\";h(v);"),
        ]
        .into_iter()
        .collect();

        let report = linked(&mut bundle);

        assert_eq!(report.inlined["main.js"], vec!["b.js", "a.js"]);
        let code = &bundle.get("main.js").unwrap().code;
        let dependency = code.find("const K=1").unwrap();
        let dependent = code.find("const V=g()").unwrap();
        assert!(dependency < dependent, "{code}");
        assert_eq!(
            code,
            concat!(
                "(function() {\n",
                "const K=1;function g(){return K};\n",
                "const V=g();\n",
                "const v = V;const h = g;h(v);\n",
                "})();\n"
            )
        );
    }
}
