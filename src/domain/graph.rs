//! Dependency graph over the products of a project
//!
//! Built once during resolution and immutable afterwards. Uses petgraph for
//! cycle detection and topological ordering. Dependency edges influence build
//! ordering and inter-product version resolution only; they never pull a
//! dependency's artifacts into a dist or publish selection.

use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use super::id::ProductId;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("Adding dependency would create a cycle: {0} -> {1}")]
    CycleDetected(ProductId, ProductId),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Self-dependency not allowed: {0}")]
    SelfDependency(ProductId),
}

/// A dependency graph for the products of a project
#[derive(Debug, Default)]
pub struct ProductGraph {
    /// The underlying directed graph; edges point dependency -> dependent
    graph: DiGraph<ProductId, ()>,

    /// Map from ProductId to node index
    node_map: HashMap<ProductId, NodeIndex>,
}

impl ProductGraph {
    /// Creates an empty graph
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    /// Builds a graph from (product, dependencies) pairs
    ///
    /// Products are inserted in sorted order so topological ordering is
    /// deterministic across invocations.
    pub fn from_products<'a, I>(products: I) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = (&'a ProductId, &'a [ProductId])>,
    {
        let mut pairs: Vec<_> = products.into_iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));

        let mut graph = Self::new();
        for (id, _) in &pairs {
            graph.add_product((*id).clone());
        }
        for (id, deps) in &pairs {
            for dep in deps.iter() {
                graph.add_dependency(id, dep)?;
            }
        }
        Ok(graph)
    }

    /// Adds a product node to the graph
    pub fn add_product(&mut self, product: ProductId) {
        if !self.node_map.contains_key(&product) {
            let idx = self.graph.add_node(product.clone());
            self.node_map.insert(product, idx);
        }
    }

    /// Adds a dependency edge: `product` depends on `depends_on`
    ///
    /// The edge direction is depends_on -> product, i.e. "depends_on must be
    /// built before product".
    pub fn add_dependency(
        &mut self,
        product: &ProductId,
        depends_on: &ProductId,
    ) -> Result<(), GraphError> {
        if product == depends_on {
            return Err(GraphError::SelfDependency(product.clone()));
        }

        let product_idx = self
            .node_map
            .get(product)
            .ok_or_else(|| GraphError::ProductNotFound(product.clone()))?;

        let dep_idx = self
            .node_map
            .get(depends_on)
            .ok_or_else(|| GraphError::ProductNotFound(depends_on.clone()))?;

        self.graph.add_edge(*dep_idx, *product_idx, ());

        if is_cyclic_directed(&self.graph) {
            // Remove the edge we just added
            if let Some(edge) = self.graph.find_edge(*dep_idx, *product_idx) {
                self.graph.remove_edge(edge);
            }
            return Err(GraphError::CycleDetected(
                product.clone(),
                depends_on.clone(),
            ));
        }

        Ok(())
    }

    /// Returns the direct dependencies of a product
    pub fn direct_dependencies(&self, product: &ProductId) -> Vec<ProductId> {
        let idx = match self.node_map.get(product) {
            Some(idx) => *idx,
            None => return vec![],
        };

        self.graph
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .filter_map(|i| self.graph.node_weight(i).cloned())
            .collect()
    }

    /// Returns the transitive dependencies of a product, dependencies first
    ///
    /// Used for build ordering and informational output only; never for
    /// artifact selection.
    pub fn dependencies_of(&self, product: &ProductId) -> Result<Vec<ProductId>, GraphError> {
        if !self.node_map.contains_key(product) {
            return Err(GraphError::ProductNotFound(product.clone()));
        }

        let mut reachable = HashSet::new();
        let mut stack = vec![product.clone()];
        while let Some(current) = stack.pop() {
            for dep in self.direct_dependencies(&current) {
                if reachable.insert(dep.clone()) {
                    stack.push(dep);
                }
            }
        }

        let order = self.topological_order()?;
        Ok(order.into_iter().filter(|p| reachable.contains(p)).collect())
    }

    /// Returns all products in topological order (dependencies before
    /// dependents), ties broken by product ID for determinism
    pub fn topological_order(&self) -> Result<Vec<ProductId>, GraphError> {
        match toposort(&self.graph, None) {
            Ok(order) => Ok(order
                .into_iter()
                .filter_map(|idx| self.graph.node_weight(idx).cloned())
                .collect()),
            Err(cycle) => {
                let product = self
                    .graph
                    .node_weight(cycle.node_id())
                    .cloned()
                    .expect("cycle node exists in graph");
                Err(GraphError::CycleDetected(product.clone(), product))
            }
        }
    }

    /// Returns true if the graph contains the product
    pub fn contains(&self, product: &ProductId) -> bool {
        self.node_map.contains_key(product)
    }

    /// Returns the number of products in the graph
    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    /// Returns true if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }
}
