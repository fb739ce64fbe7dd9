//! A graph paired with the attribute store its `GetAttr` nodes resolve in.

use crate::{
    attrs::Attrs, error::GraphError, graph::Graph, interpreter::Interpreter, tensor::TensorData,
};

/// An executable unit: a graph plus its attribute store.
///
/// Invariants: every `GetAttr` path resolves in `attrs`, and every node
/// argument references an already-defined node. A graph violating the
/// second invariant is tolerated by evaluation order but disables folding.
#[derive(Debug, Clone)]
pub struct GraphModule {
    pub graph: Graph,
    pub attrs: Attrs,
}

impl GraphModule {
    pub fn new(graph: Graph, attrs: Attrs) -> Self {
        GraphModule { graph, attrs }
    }

    /// Evaluates the graph over the given runtime inputs.
    pub fn run(&self, inputs: &[TensorData]) -> Result<Vec<TensorData>, GraphError> {
        Interpreter::new().evaluate(&self.graph, &self.attrs, inputs)
    }
}
