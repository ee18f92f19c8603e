//! Chunk classification and module lookup
//!
//! Partitions a bundle into entry chunks (deployable scripts) and shared
//! chunks (inlining candidates), and answers "which chunk does this import
//! specifier refer to" for the later stages.

use log::{debug, trace};
use rustc_hash::FxHashMap;

use crate::{bundle::Bundle, module_path::ModulePath, types::ChunkKind};

/// Result of partitioning a bundle, in bundle enumeration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub entries: Vec<String>,
    pub shared: Vec<String>,
}

/// Partition `bundle` into entry and shared chunks.
///
/// Pure and order-preserving: the same bundle always yields the same
/// classification. A chunk flagged as an entry is never a shared chunk, even
/// when other chunks import it.
pub fn classify(bundle: &Bundle) -> Classification {
    let mut classification = Classification::default();
    for chunk in bundle.chunks() {
        trace!("Classified {} as {}", chunk.file_name, chunk.kind());
        match chunk.kind() {
            ChunkKind::Entry => classification.entries.push(chunk.file_name.clone()),
            ChunkKind::Shared => classification.shared.push(chunk.file_name.clone()),
        }
    }
    debug!(
        "Classified bundle: {} entries, {} shared chunks",
        classification.entries.len(),
        classification.shared.len()
    );
    classification
}

/// A chunk an import specifier resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRef<'a> {
    pub file_name: &'a str,
    pub kind: ChunkKind,
}

/// Lookup table from normalized module paths to chunks
#[derive(Debug, Clone, Default)]
pub struct ChunkIndex {
    by_path: FxHashMap<ModulePath, (String, ChunkKind)>,
    shared_by_stem: FxHashMap<String, Vec<String>>,
}

impl ChunkIndex {
    pub fn new(classification: &Classification) -> Self {
        let mut index = Self::default();
        for (names, kind) in [
            (&classification.entries, ChunkKind::Entry),
            (&classification.shared, ChunkKind::Shared),
        ] {
            for file_name in names {
                let path = ModulePath::from_file_name(file_name);
                if kind.is_shared() {
                    index
                        .shared_by_stem
                        .entry(path.stem().to_owned())
                        .or_default()
                        .push(file_name.clone());
                }
                index.by_path.insert(path, (file_name.clone(), kind));
            }
        }
        index
    }

    /// Resolve `specifier`, as written in `importer`, to a chunk of the bundle.
    ///
    /// The normalized path is tried first. When it names no chunk, a shared
    /// chunk whose file stem matches the specifier's is accepted as long as
    /// that stem is unambiguous, since bundlers write the same `./` or `../`
    /// prefix regardless of where the consuming entry is finally emitted.
    pub fn resolve(&self, importer: &str, specifier: &str) -> Option<ChunkRef<'_>> {
        let path = ModulePath::resolve(importer, specifier)?;
        if let Some((file_name, kind)) = self.by_path.get(&path) {
            return Some(ChunkRef {
                file_name,
                kind: *kind,
            });
        }

        match self.shared_by_stem.get(path.stem()).map(Vec::as_slice) {
            Some([file_name]) => {
                trace!("Resolved '{specifier}' in {importer} to {file_name} by file stem");
                Some(ChunkRef {
                    file_name,
                    kind: ChunkKind::Shared,
                })
            }
            _ => None,
        }
    }
}
