//! Shared type definitions for the stitch crate
//!
//! This module contains common types that are used across multiple linker
//! stages, keeping them out of the stage modules to avoid circular imports.

/// Classification of a chunk within a bundle
///
/// Every decision the linker makes about a chunk (inline it, keep it, wrap it)
/// starts from this categorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkKind {
    /// A chunk that is deployed as its own script (e.g. a content script)
    Entry,

    /// Code split out by the bundler and reused by entries; only ever consumed
    /// by inlining
    Shared,
}

impl ChunkKind {
    /// Check if this is an entry chunk
    pub fn is_entry(&self) -> bool {
        matches!(self, ChunkKind::Entry)
    }

    /// Check if this is a shared chunk
    pub fn is_shared(&self) -> bool {
        matches!(self, ChunkKind::Shared)
    }
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkKind::Entry => write!(f, "entry"),
            ChunkKind::Shared => write!(f, "shared"),
        }
    }
}
