//! Graph builder for constructing start-order dependency graphs from services.
//!
//! The builder takes the configured services with their `depends_on` lists and
//! constructs a directed acyclic graph that the supervisor uses for start-up
//! ordering and dependency-abort propagation.

use crate::errors::ConfigError;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Index into the service list. Equal to the service's registration position.
pub type ServiceIndex = usize;

/// A directed acyclic graph of services.
#[derive(Debug, Clone)]
pub struct ServiceGraph {
    /// Service names indexed by registration position
    names: Vec<String>,
    /// Map from service name to index
    index_map: HashMap<String, ServiceIndex>,
    /// Reverse edges: index -> services it depends on
    reverse_edges: Vec<Vec<ServiceIndex>>,
    /// Topological order, ties broken by registration order
    order: Vec<ServiceIndex>,
}

impl ServiceGraph {
    /// Get the number of services in the graph.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Get a service name by its index.
    pub fn name(&self, index: ServiceIndex) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Get the index for a service name.
    pub fn get_index(&self, name: &str) -> Option<ServiceIndex> {
        self.index_map.get(name).copied()
    }

    /// Services the given service depends on directly.
    pub fn dependencies(&self, index: ServiceIndex) -> &[ServiceIndex] {
        self.reverse_edges.get(index).map_or(&[], |v| v.as_slice())
    }

    /// Check if all dependencies of a service are in `ready`.
    pub fn dependencies_satisfied(&self, index: ServiceIndex, ready: &HashSet<ServiceIndex>) -> bool {
        self.dependencies(index).iter().all(|dep| ready.contains(dep))
    }

    /// Full start order. Every service appears after all of its dependencies;
    /// among services that are free to go, the earlier-registered one goes first.
    pub fn topological_order(&self) -> &[ServiceIndex] {
        &self.order
    }

    /// Sort an arbitrary subset of services into start order.
    pub fn order_subset(&self, subset: &[ServiceIndex]) -> Vec<ServiceIndex> {
        let wanted: HashSet<ServiceIndex> = subset.iter().copied().collect();
        self.order
            .iter()
            .copied()
            .filter(|i| wanted.contains(i))
            .collect()
    }

    /// Compute start-up waves: groups of services whose dependencies are all
    /// satisfied by earlier waves.
    pub fn compute_waves(&self) -> Vec<Vec<ServiceIndex>> {
        let mut waves = Vec::new();
        let mut done: HashSet<ServiceIndex> = HashSet::new();

        loop {
            let ready: Vec<ServiceIndex> = (0..self.len())
                .filter(|i| !done.contains(i) && self.dependencies_satisfied(*i, &done))
                .collect();

            if ready.is_empty() {
                break;
            }

            done.extend(ready.iter().copied());
            waves.push(ready);
        }

        waves
    }
}

/// Builder for constructing service graphs.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    services: Vec<(String, Vec<String>)>,
}

impl GraphBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service and the names it depends on. Registration order is significant.
    pub fn service(mut self, name: impl Into<String>, depends_on: &[String]) -> Self {
        self.services.push((name.into(), depends_on.to_vec()));
        self
    }

    /// Build the service graph.
    ///
    /// This validates the graph structure:
    /// - Names must be unique
    /// - All dependencies must reference registered services
    /// - No service may depend on itself
    /// - No cycles are allowed
    pub fn build(self) -> Result<ServiceGraph, ConfigError> {
        let mut index_map = HashMap::new();
        for (i, (name, _)) in self.services.iter().enumerate() {
            if index_map.insert(name.clone(), i).is_some() {
                return Err(ConfigError::DuplicateService { name: name.clone() });
            }
        }

        let mut forward_edges: Vec<Vec<ServiceIndex>> = vec![Vec::new(); self.services.len()];
        let mut reverse_edges: Vec<Vec<ServiceIndex>> = vec![Vec::new(); self.services.len()];

        for (to_idx, (name, deps)) in self.services.iter().enumerate() {
            for dep in deps {
                if dep == name {
                    return Err(ConfigError::SelfDependency {
                        service: name.clone(),
                    });
                }
                let from_idx = *index_map.get(dep).ok_or_else(|| ConfigError::UnknownDependency {
                    service: name.clone(),
                    dependency: dep.clone(),
                })?;

                if !reverse_edges[to_idx].contains(&from_idx) {
                    forward_edges[from_idx].push(to_idx);
                    reverse_edges[to_idx].push(from_idx);
                }
            }
        }

        let names: Vec<String> = self.services.into_iter().map(|(name, _)| name).collect();
        let order = Self::sort_topologically(&names, &forward_edges, &reverse_edges)?;

        Ok(ServiceGraph {
            names,
            index_map,
            reverse_edges,
            order,
        })
    }

    /// Kahn's algorithm with a min-heap so ties resolve to registration order.
    fn sort_topologically(
        names: &[String],
        forward_edges: &[Vec<ServiceIndex>],
        reverse_edges: &[Vec<ServiceIndex>],
    ) -> Result<Vec<ServiceIndex>, ConfigError> {
        let mut in_degree: Vec<usize> = reverse_edges.iter().map(Vec::len).collect();

        let mut queue: BinaryHeap<Reverse<ServiceIndex>> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, deg)| *deg == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(names.len());

        while let Some(Reverse(node)) = queue.pop() {
            order.push(node);
            for &dependent in &forward_edges[node] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push(Reverse(dependent));
                }
            }
        }

        if order.len() != names.len() {
            let services: Vec<String> = in_degree
                .iter()
                .enumerate()
                .filter(|&(_, deg)| *deg > 0)
                .map(|(i, _)| names[i].clone())
                .collect();
            return Err(ConfigError::CyclicDependency { services });
        }

        Ok(order)
    }
}
