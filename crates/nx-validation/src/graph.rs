//! Dependency graph between link and concatenation directives

use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Directed graph from a directive's path to the paths it reads
#[derive(Debug, Default)]
pub struct DirectiveGraph {
    edges: BTreeMap<String, Vec<String>>,
}

impl DirectiveGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a directive node, even if it has no dependencies
    pub fn add_node(&mut self, path: impl Into<String>) {
        self.edges.entry(path.into()).or_default();
    }

    /// `from` reads the value at `to`
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.edges.entry(from.into()).or_default().push(to.into());
    }

    /// Paths the node depends on directly
    pub fn dependencies(&self, path: &str) -> &[String] {
        self.edges.get(path).map_or(&[], Vec::as_slice)
    }

    /// Whether `to` is reachable from `from` through at least one edge
    pub fn reaches(&self, from: &str, to: &str) -> bool {
        let mut to_visit: Vec<&str> = self.dependencies(from).iter().map(String::as_str).collect();
        let mut visited = HashSet::new();

        while let Some(current) = to_visit.pop() {
            if current == to {
                return true;
            }
            if visited.insert(current) {
                to_visit.extend(self.dependencies(current).iter().map(String::as_str));
            }
        }
        false
    }

    /// Every registered node that lies on a cycle
    pub fn nodes_on_cycles(&self) -> BTreeSet<String> {
        self.edges
            .keys()
            .filter(|node| self.reaches(node, node))
            .cloned()
            .collect()
    }

    /// Registered nodes ordered so dependencies come first
    ///
    /// Nodes in `skip` are left out.
    pub fn topological_order(&self, skip: &BTreeSet<String>) -> Vec<String> {
        fn visit(
            graph: &DirectiveGraph,
            node: &str,
            skip: &BTreeSet<String>,
            done: &mut HashSet<String>,
            out: &mut Vec<String>,
        ) {
            if skip.contains(node) || !done.insert(node.to_string()) {
                return;
            }
            for dep in graph.dependencies(node) {
                if graph.edges.contains_key(dep) {
                    visit(graph, dep, skip, done, out);
                }
            }
            out.push(node.to_string());
        }

        let mut done = HashSet::new();
        let mut out = Vec::new();
        for node in self.edges.keys() {
            visit(self, node, skip, &mut done, &mut out);
        }
        out
    }
}
