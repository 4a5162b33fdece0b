//! Prerequisite graph of a build context.
//!
//! Edges point from a prerequisite to its dependent, so a topological order
//! lists every builder after all of its prerequisites.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::builder::BuilderKey;

/// Snapshot of the builders registered in a context and their prerequisite edges.
#[derive(Debug, Default)]
pub struct BuilderGraph {
  graph: DiGraph<BuilderKey, ()>,
  nodes: HashMap<BuilderKey, NodeIndex>,
}

impl BuilderGraph {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a node; adding an existing key is a no-op.
  pub fn add_node(&mut self, key: &BuilderKey) -> NodeIndex {
    if let Some(&idx) = self.nodes.get(key) {
      return idx;
    }
    let idx = self.graph.add_node(key.clone());
    self.nodes.insert(key.clone(), idx);
    idx
  }

  /// Record that `dependent` needs `prerequisite` first.
  pub fn add_edge(&mut self, prerequisite: &BuilderKey, dependent: &BuilderKey) {
    let from = self.add_node(prerequisite);
    let to = self.add_node(dependent);
    self.graph.update_edge(from, to, ());
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn contains(&self, key: &BuilderKey) -> bool {
    self.nodes.contains_key(key)
  }

  /// Keys in an order where prerequisites come before dependents.
  ///
  /// On a cycle, returns the key at which the cycle was found.
  pub fn topological_order(&self) -> Result<Vec<BuilderKey>, BuilderKey> {
    toposort(&self.graph, None)
      .map(|sorted| sorted.into_iter().map(|idx| self.graph[idx].clone()).collect())
      .map_err(|cycle| self.graph[cycle.node_id()].clone())
  }

  /// Group keys into levels; every key's prerequisites sit in earlier levels.
  ///
  /// Within a level, keys keep insertion order.
  pub fn waves(&self) -> Result<Vec<Vec<BuilderKey>>, BuilderKey> {
    let mut in_degree: HashMap<NodeIndex, usize> = self
      .graph
      .node_indices()
      .map(|idx| (idx, self.graph.neighbors_directed(idx, Direction::Incoming).count()))
      .collect();

    let mut remaining: Vec<NodeIndex> = self.graph.node_indices().collect();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
      let (ready, blocked): (Vec<NodeIndex>, Vec<NodeIndex>) =
        remaining.into_iter().partition(|idx| in_degree[idx] == 0);

      if ready.is_empty() {
        return Err(self.graph[blocked[0]].clone());
      }

      for &idx in &ready {
        for neighbor in self.graph.neighbors_directed(idx, Direction::Outgoing) {
          if let Some(deg) = in_degree.get_mut(&neighbor) {
            *deg = deg.saturating_sub(1);
          }
        }
      }

      waves.push(ready.into_iter().map(|idx| self.graph[idx].clone()).collect());
      remaining = blocked;
    }

    Ok(waves)
  }

  /// Direct prerequisites of `key`.
  pub fn prerequisites(&self, key: &BuilderKey) -> Vec<BuilderKey> {
    self.neighbors(key, Direction::Incoming)
  }

  /// Direct dependents of `key`.
  pub fn dependents(&self, key: &BuilderKey) -> Vec<BuilderKey> {
    self.neighbors(key, Direction::Outgoing)
  }

  /// Every builder that depends on `key`, directly or not, in breadth-first order.
  pub fn transitive_dependents(&self, key: &BuilderKey) -> Vec<BuilderKey> {
    let Some(&start) = self.nodes.get(key) else {
      return Vec::new();
    };

    let mut seen = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);
    let mut found = Vec::new();

    while let Some(idx) = queue.pop_front() {
      for next in self.graph.neighbors_directed(idx, Direction::Outgoing) {
        if seen.insert(next) {
          found.push(self.graph[next].clone());
          queue.push_back(next);
        }
      }
    }

    found
  }

  fn neighbors(&self, key: &BuilderKey, direction: Direction) -> Vec<BuilderKey> {
    let Some(&idx) = self.nodes.get(key) else {
      return Vec::new();
    };
    let mut keys: Vec<BuilderKey> = self
      .graph
      .neighbors_directed(idx, direction)
      .map(|n| self.graph[n].clone())
      .collect();
    keys.sort();
    keys
  }
}
