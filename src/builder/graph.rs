//! Command dependency graph.
//!
//! Built from root commands by following their dependency edges. Edges
//! point from a dependency to its dependent, so a topological order is an
//! execution order.

use std::collections::HashMap;
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::Serialize;

use super::command::Command;
use super::errors::GraphError;

/// A DAG of build commands, deduplicated by identity.
#[derive(Debug, Default)]
pub struct CommandGraph {
    graph: DiGraph<Arc<Command>, ()>,
    nodes: HashMap<usize, NodeIndex>,
}

/// Serializable view of one command in the graph.
#[derive(Debug, Clone, Serialize)]
pub struct CommandSummary {
    pub id: usize,
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<String>,
    pub outputs: Vec<String>,
    pub depends_on: Vec<usize>,
}

impl CommandGraph {
    /// Build a graph from root commands and everything they depend on.
    pub fn from_roots(roots: impl IntoIterator<Item = Arc<Command>>) -> Self {
        let mut graph = CommandGraph::default();
        for root in roots {
            graph.insert(root);
        }
        graph
    }

    fn insert(&mut self, cmd: Arc<Command>) -> NodeIndex {
        let key = Arc::as_ptr(&cmd) as usize;
        if let Some(&idx) = self.nodes.get(&key) {
            return idx;
        }

        let idx = self.graph.add_node(cmd.clone());
        self.nodes.insert(key, idx);

        for dep in &cmd.dependencies {
            let dep_idx = self.insert(dep.clone());
            self.graph.update_edge(dep_idx, idx, ());
        }

        idx
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Commands in dependency order.
    pub fn topological_order(&self) -> Result<Vec<Arc<Command>>, GraphError> {
        let order = toposort(&self.graph, None).map_err(|cycle| GraphError::Cycle {
            command: self.graph[cycle.node_id()].name.clone(),
        })?;
        Ok(order.into_iter().map(|i| self.graph[i].clone()).collect())
    }

    /// Direct dependencies of a command in the graph.
    pub fn dependencies_of(&self, cmd: &Arc<Command>) -> Vec<Arc<Command>> {
        match self.nodes.get(&(Arc::as_ptr(cmd) as usize)) {
            Some(&idx) => self
                .graph
                .neighbors_directed(idx, Direction::Incoming)
                .map(|i| self.graph[i].clone())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Serializable summaries in dependency order.
    pub fn summaries(&self) -> Result<Vec<CommandSummary>, GraphError> {
        let order = toposort(&self.graph, None).map_err(|cycle| GraphError::Cycle {
            command: self.graph[cycle.node_id()].name.clone(),
        })?;
        let position: HashMap<NodeIndex, usize> =
            order.iter().enumerate().map(|(i, &n)| (n, i)).collect();

        Ok(order
            .iter()
            .enumerate()
            .map(|(id, &idx)| {
                let cmd = &self.graph[idx];
                let mut depends_on: Vec<usize> = self
                    .graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .filter_map(|d| position.get(&d).copied())
                    .collect();
                depends_on.sort_unstable();
                CommandSummary {
                    id,
                    name: cmd.name.clone(),
                    program: cmd.program.display().to_string(),
                    args: cmd.args.clone(),
                    working_dir: cmd.working_dir.as_ref().map(|d| d.display().to_string()),
                    outputs: cmd.outputs.iter().map(|o| o.display().to_string()).collect(),
                    depends_on,
                }
            })
            .collect())
    }
}
