//! Stage dependency graph built with petgraph
//!
//! - **Directed Graph**: `A → B` means "B needs A"
//! - **Nodes**: stage indices into the configured `[[stages]]` list
//! - **Order**: Kahn's algorithm, ties broken by declaration order

use crate::core::config::StageConfig;
use crate::core::error::{ConfigError, ReleaseError, ReleaseResult};
use petgraph::Direction;
use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeSet, HashMap};

/// Validated stage graph with a deterministic execution order
#[derive(Debug)]
pub struct StageGraph {
  graph: DiGraph<usize, ()>,
  names: Vec<String>,
  order: Vec<usize>,
}

impl StageGraph {
  /// Validate stage names and `needs`, reject cycles and compute the order
  pub fn build(stages: &[StageConfig]) -> ReleaseResult<Self> {
    let mut graph = DiGraph::new();
    let mut by_name: HashMap<&str, NodeIndex> = HashMap::new();

    for (idx, stage) in stages.iter().enumerate() {
      let node = graph.add_node(idx);
      if by_name.insert(stage.name.as_str(), node).is_some() {
        return Err(invalid(format!("stage '{}' is declared more than once", stage.name)));
      }
    }

    for (idx, stage) in stages.iter().enumerate() {
      let node = NodeIndex::new(idx);
      for need in &stage.needs {
        if need == &stage.name {
          return Err(invalid(format!("stage '{}' needs itself", stage.name)));
        }
        let dep = by_name
          .get(need.as_str())
          .ok_or_else(|| invalid(format!("stage '{}' needs unknown stage '{}'", stage.name, need)))?;
        graph.update_edge(*dep, node, ());
      }
    }

    if let Err(cycle) = algo::toposort(&graph, None) {
      let name = &stages[graph[cycle.node_id()]].name;
      return Err(invalid(format!("dependency cycle through stage '{}'", name)));
    }

    let names = stages.iter().map(|s| s.name.clone()).collect();
    let order = declaration_ordered_toposort(&graph);

    Ok(Self { graph, names, order })
  }

  /// Stage indices in execution order
  pub fn order(&self) -> &[usize] {
    &self.order
  }

  /// Direct prerequisites of a stage, in declaration order
  pub fn needs(&self, idx: usize) -> Vec<usize> {
    let mut deps: Vec<usize> = self
      .graph
      .neighbors_directed(NodeIndex::new(idx), Direction::Incoming)
      .map(|n| self.graph[n])
      .collect();
    deps.sort_unstable();
    deps
  }

  pub fn name(&self, idx: usize) -> &str {
    &self.names[idx]
  }

  pub fn index_of(&self, name: &str) -> Option<usize> {
    self.names.iter().position(|n| n == name)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }
}

/// Topological order that always picks the earliest-declared ready stage
fn declaration_ordered_toposort(graph: &DiGraph<usize, ()>) -> Vec<usize> {
  let mut in_degree: Vec<usize> = graph
    .node_indices()
    .map(|n| graph.neighbors_directed(n, Direction::Incoming).count())
    .collect();

  let mut ready: BTreeSet<usize> = in_degree
    .iter()
    .enumerate()
    .filter(|(_, d)| **d == 0)
    .map(|(i, _)| i)
    .collect();

  let mut order = Vec::with_capacity(in_degree.len());
  while let Some(next) = ready.pop_first() {
    order.push(graph[NodeIndex::new(next)]);
    for child in graph.neighbors_directed(NodeIndex::new(next), Direction::Outgoing) {
      let idx = child.index();
      in_degree[idx] -= 1;
      if in_degree[idx] == 0 {
        ready.insert(idx);
      }
    }
  }
  order
}

fn invalid(reason: String) -> ReleaseError {
  ReleaseError::Config(ConfigError::InvalidGraph { reason })
}
