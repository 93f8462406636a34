//! Library dependency graph over a set of compiled contracts.
//!
//! Nodes live in an arena indexed by position in the artifact set, which is
//! also the tie-break order when several contracts are ready to deploy.

use crate::{
    names::{expand_reference_name, extract_link_reference_names},
    scan::find_link_references,
    LinkError,
};
use deplink_primitives::ArtifactSet;
use std::collections::{BTreeSet, HashMap};

/// Direct library dependencies of every contract in one build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    names: Vec<String>,
    index: HashMap<String, usize>,
    /// `edges[i]` holds the nodes contract `i` links against.
    edges: Vec<BTreeSet<usize>>,
}

/// DFS colouring used by cycle detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

impl DependencyGraph {
    /// Builds the shallow graph by scanning every contract's deploy bytecode.
    ///
    /// Placeholder names are expanded against the names in `artifacts`;
    /// contracts without deploy code have no dependencies.
    pub fn from_artifacts(artifacts: &ArtifactSet) -> Result<Self, LinkError> {
        let mut graph = Self::default();
        for name in artifacts.names() {
            graph.add_node(name);
        }
        for artifact in artifacts {
            let deps = extract_link_reference_names(&artifact.code, artifacts.names())?;
            for dep in deps {
                graph.add_edge(&artifact.name, &dep);
            }
        }
        Ok(graph)
    }

    /// Builds the graph linking follows: references in both deploy and
    /// runtime code.
    ///
    /// A placeholder that expands to no contract, or to several, is left out.
    /// Only link-time overrides can satisfy it, and linking reports it when
    /// they do not.
    pub fn from_link_references(artifacts: &ArtifactSet) -> Self {
        let mut graph = Self::default();
        for name in artifacts.names() {
            graph.add_node(name);
        }
        for artifact in artifacts {
            let references = find_link_references(&artifact.code)
                .chain(find_link_references(&artifact.code_runtime));
            for reference in references {
                if let Ok(dep) = expand_reference_name(&reference.name, artifacts.names()) {
                    graph.add_edge(&artifact.name, &dep);
                }
            }
        }
        graph
    }

    /// Builds a graph from explicit `(name, direct dependencies)` pairs.
    ///
    /// Dependencies that are not listed as nodes themselves are added as
    /// leaves.
    pub fn from_edges<'a, I, D>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, D)>,
        D: IntoIterator<Item = &'a str>,
    {
        let mut graph = Self::default();
        let entries: Vec<(&str, Vec<&str>)> = entries
            .into_iter()
            .map(|(name, deps)| (name, deps.into_iter().collect()))
            .collect();
        for (name, _) in &entries {
            graph.add_node(name);
        }
        for (name, deps) in &entries {
            for dep in deps {
                graph.add_edge(name, dep);
            }
        }
        graph
    }

    fn add_node(&mut self, name: &str) -> usize {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = self.names.len();
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), id);
        self.edges.push(BTreeSet::new());
        id
    }

    fn add_edge(&mut self, from: &str, to: &str) {
        let from = self.add_node(from);
        let to = self.add_node(to);
        self.edges[from].insert(to);
    }

    /// Number of contracts in the graph.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if the graph has no contracts.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Returns true if `name` is a node of the graph.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Libraries `name` links against directly, or `None` for an unknown
    /// contract.
    pub fn direct_dependencies(&self, name: &str) -> Option<BTreeSet<String>> {
        let id = *self.index.get(name)?;
        Some(self.edges[id].iter().map(|&dep| self.names[dep].clone()).collect())
    }

    /// Every library `name` needs, directly or through other libraries.
    ///
    /// Fails with [`LinkError::DependencyCycle`] if a cycle is reachable from
    /// `name`. Unknown names have no dependencies.
    pub fn transitive_dependencies(&self, name: &str) -> Result<BTreeSet<String>, LinkError> {
        let Some(&root) = self.index.get(name) else {
            return Ok(BTreeSet::new());
        };

        let mut marks = vec![Mark::Unvisited; self.names.len()];
        let mut path = Vec::new();
        let mut found = BTreeSet::new();
        self.visit(root, &mut marks, &mut path, &mut found)?;
        found.remove(&root);

        Ok(found.into_iter().map(|id| self.names[id].clone()).collect())
    }

    fn visit(
        &self,
        node: usize,
        marks: &mut [Mark],
        path: &mut Vec<usize>,
        found: &mut BTreeSet<usize>,
    ) -> Result<(), LinkError> {
        match marks[node] {
            Mark::Done => return Ok(()),
            Mark::InProgress => return Err(self.cycle_error(path, node)),
            Mark::Unvisited => {}
        }

        marks[node] = Mark::InProgress;
        path.push(node);
        for &dep in &self.edges[node] {
            found.insert(dep);
            self.visit(dep, marks, path, found)?;
        }
        path.pop();
        marks[node] = Mark::Done;
        Ok(())
    }

    fn cycle_error(&self, path: &[usize], repeated: usize) -> LinkError {
        let start = path.iter().position(|&id| id == repeated).unwrap_or(0);
        let mut cycle: Vec<String> = path[start..]
            .iter()
            .map(|&id| self.names[id].clone())
            .collect();
        cycle.push(self.names[repeated].clone());
        LinkError::DependencyCycle { cycle }
    }

    /// Orders every contract so each one comes after all of its libraries.
    ///
    /// Among contracts that are ready at the same time, the one inserted
    /// first wins.
    pub fn deploy_order(&self) -> Result<Vec<String>, LinkError> {
        let mut pending: Vec<usize> = self.edges.iter().map(BTreeSet::len).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.names.len()];
        for (node, deps) in self.edges.iter().enumerate() {
            for &dep in deps {
                dependents[dep].push(node);
            }
        }

        let mut ready: BTreeSet<usize> = pending
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(node, _)| node)
            .collect();
        let mut order = Vec::with_capacity(self.names.len());

        while let Some(node) = ready.pop_first() {
            order.push(self.names[node].clone());
            for &dependent in &dependents[node] {
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() < self.names.len() {
            let stuck = (0..self.names.len())
                .find(|&node| pending[node] > 0)
                .unwrap_or_default();
            let mut marks = vec![Mark::Unvisited; self.names.len()];
            return Err(self
                .visit(stuck, &mut marks, &mut Vec::new(), &mut BTreeSet::new())
                .err()
                .unwrap_or_else(|| LinkError::DependencyCycle {
                    cycle: vec![self.names[stuck].clone()],
                }));
        }
        Ok(order)
    }
}
