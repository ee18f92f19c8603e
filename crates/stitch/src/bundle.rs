//! Bundle and chunk model
//!
//! The `Bundle` is the single owned, single-writer structure threaded through
//! every linker stage by exclusive reference. It keeps chunks in insertion
//! order so classification and rewriting are deterministic.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use log::{debug, trace};
use walkdir::WalkDir;

use crate::types::ChunkKind;

/// One compiled JavaScript file produced by the upstream bundler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Bundle-relative file name using `/` separators (e.g. `content/calendar.js`)
    pub file_name: String,
    /// Current source text; rewritten in place by the linker stages
    pub code: String,
    /// Whether the chunk is deployed as its own script
    pub is_entry: bool,
}

impl Chunk {
    /// Create an entry chunk
    pub fn entry(file_name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            code: code.into(),
            is_entry: true,
        }
    }

    /// Create a shared (non-entry) chunk
    pub fn shared(file_name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            code: code.into(),
            is_entry: false,
        }
    }

    pub fn kind(&self) -> ChunkKind {
        if self.is_entry {
            ChunkKind::Entry
        } else {
            ChunkKind::Shared
        }
    }
}

/// Mapping from file name to chunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bundle {
    chunks: IndexMap<String, Chunk>,
}

impl Bundle {
    /// Create a new empty bundle
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk, replacing any chunk already stored under the same file name
    pub fn insert(&mut self, chunk: Chunk) -> Option<Chunk> {
        self.chunks.insert(chunk.file_name.clone(), chunk)
    }

    pub fn get(&self, file_name: &str) -> Option<&Chunk> {
        self.chunks.get(file_name)
    }

    pub fn get_mut(&mut self, file_name: &str) -> Option<&mut Chunk> {
        self.chunks.get_mut(file_name)
    }

    /// Remove a chunk while preserving the order of the remaining ones
    pub fn remove(&mut self, file_name: &str) -> Option<Chunk> {
        self.chunks.shift_remove(file_name)
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.chunks.contains_key(file_name)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Iterate over chunks in insertion order
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    /// File names in insertion order
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.chunks.keys().map(String::as_str)
    }

    /// Load every `.js` file below `dir` as a chunk.
    ///
    /// Files named in `entries` (relative to `dir`) become entry chunks, all
    /// others are shared. A configured entry that is not present on disk is a
    /// fatal error, since the packaging step depends on it.
    pub fn load_dir(dir: &Path, entries: &[String]) -> Result<Self> {
        if !dir.is_dir() {
            bail!("Bundle directory does not exist: {}", dir.display());
        }

        let mut bundle = Self::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry
                .with_context(|| format!("Failed to walk bundle directory {}", dir.display()))?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "js") {
                continue;
            }

            let file_name = relative_file_name(dir, path)?;
            let code = fs::read_to_string(path)
                .with_context(|| format!("Failed to read chunk {}", path.display()))?;
            let is_entry = entries.iter().any(|e| normalize_separators(e) == file_name);
            trace!("Loaded chunk {file_name} ({} bytes, entry: {is_entry})", code.len());

            bundle.insert(Chunk {
                file_name,
                code,
                is_entry,
            });
        }

        for expected in entries {
            let expected = normalize_separators(expected);
            if !bundle.contains(&expected) {
                bail!(
                    "Configured entry '{expected}' was not found in bundle directory {}",
                    dir.display()
                );
            }
        }

        debug!("Loaded {} chunks from {}", bundle.len(), dir.display());
        Ok(bundle)
    }

    /// Write every chunk below `dir`, creating intermediate directories.
    /// Returns the paths that were written.
    pub fn write_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.len());
        for chunk in self.chunks() {
            let path = dir.join(&chunk.file_name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {}", parent.display()))?;
            }
            fs::write(&path, &chunk.code)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            debug!("Wrote {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}

impl FromIterator<Chunk> for Bundle {
    fn from_iter<T: IntoIterator<Item = Chunk>>(iter: T) -> Self {
        let mut bundle = Self::new();
        for chunk in iter {
            bundle.insert(chunk);
        }
        bundle
    }
}

fn normalize_separators(name: &str) -> String {
    name.replace('\\', "/").trim_start_matches("./").to_owned()
}

fn relative_file_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .with_context(|| format!("{} is not inside {}", path.display(), root.display()))?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}
