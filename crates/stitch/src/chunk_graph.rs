//! Dependency graph between shared chunks
//!
//! Shared chunks may themselves import other shared chunks. Those links are
//! resolved before any entry is rewritten, so the shared chunks are processed
//! in topological order. Cycles are not supported and are reported as errors.

use anyhow::{Result, bail};
use log::debug;
use petgraph::{
    algo::{tarjan_scc, toposort},
    graph::{DiGraph, NodeIndex},
};
use rustc_hash::FxHashMap;

/// Directed graph over shared chunk file names
#[derive(Debug, Default)]
pub struct ChunkGraph {
    graph: DiGraph<String, ()>,
    node_indices: FxHashMap<String, NodeIndex>,
}

impl ChunkGraph {
    /// Create a graph with one node per shared chunk, in the given order
    pub fn new<'a>(chunks: impl IntoIterator<Item = &'a String>) -> Self {
        let mut graph = Self::default();
        for chunk in chunks {
            let index = graph.graph.add_node(chunk.clone());
            graph.node_indices.insert(chunk.clone(), index);
        }
        graph
    }

    /// Record that `importer` depends on `dependency`
    pub fn add_dependency(&mut self, importer: &str, dependency: &str) {
        if let (Some(&from_idx), Some(&to_idx)) = (
            self.node_indices.get(importer),
            self.node_indices.get(dependency),
        ) {
            // Edges point from dependency to dependent so a topological sort
            // yields dependencies first
            if !self.graph.contains_edge(to_idx, from_idx) {
                self.graph.add_edge(to_idx, from_idx, ());
            }
        }
    }

    /// Chunk names ordered so every chunk comes after all of its dependencies
    pub fn topological_order(&self) -> Result<Vec<String>> {
        match toposort(&self.graph, None) {
            Ok(nodes) => Ok(nodes
                .into_iter()
                .map(|node| self.graph[node].clone())
                .collect()),
            Err(_) => {
                let cycles = self.cycles();
                debug!("Shared chunk cycles: {cycles:?}");
                let described: Vec<_> = cycles.iter().map(|c| c.join(" -> ")).collect();
                bail!(
                    "Circular dependency between shared chunks is not supported: {}",
                    described.join("; ")
                );
            }
        }
    }

    /// Groups of chunks that import each other, including self-imports
    pub fn cycles(&self) -> Vec<Vec<String>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&node| self.graph.contains_edge(node, node))
            })
            .map(|component| {
                let mut names: Vec<_> = component
                    .into_iter()
                    .map(|node| self.graph[node].clone())
                    .collect();
                names.sort();
                names
            })
            .collect()
    }
}
