//! Static linker for bundled ES modules
//!
//! Takes the multi-chunk output of a JavaScript bundler and turns every entry
//! chunk into a self-contained script: shared chunks are inlined at their
//! import sites, removed from the bundle, and each entry is wrapped in a
//! self-invoking closure.

pub mod bundle;
pub mod chunk_graph;
pub mod classifier;
pub mod config;
pub mod eliminator;
pub mod exports;
pub mod lexer;
pub mod linker;
pub mod module_path;
pub mod rewriter;
pub mod syntax;
pub mod types;
pub mod verify;
pub mod wrapper;
