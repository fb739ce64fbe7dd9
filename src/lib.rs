//! graphfold: constant-subgraph folding for dataflow computation graphs.
//!
//! A computation graph mixes runtime inputs with values that depend only on
//! module attributes. This crate partitions such a graph into a constant
//! subgraph (evaluated once, results cached as attributes) and a base
//! subgraph that consumes the cached results, so repeated executions skip
//! the constant work.
//!
//! # Architecture
//!
//! - **graph**: arena-backed graph model with typed node roles
//!   (input, attribute read, call, output)
//! - **attrs**: nested attribute hierarchy and its flat path-keyed store
//! - **interpreter**: the evaluation engine over `ndarray` tensors
//! - **module**: a graph paired with its attribute store
//! - **fold**: const-reachability analysis, graph splitting, and the
//!   lazily materializing folded-module wrapper
//!
//! # Example
//!
//! ```
//! use graphfold::prelude::*;
//!
//! let mut tree = AttrTree::new();
//! tree.set("weight", TensorData::scalar(3.0));
//!
//! let mut graph = Graph::new();
//! let x = graph.input("x");
//! let w = graph.get_attr("weight");
//! let doubled = graph.add(w, w);
//! let out = graph.sub(x, doubled);
//! graph.output(vec![out]);
//!
//! let module = GraphModule::new(graph, Attrs::from_tree(&tree));
//! let mut folded = split_const_subgraphs(&module).unwrap();
//!
//! let result = folded.run(&[TensorData::scalar(10.0)]).unwrap();
//! assert_eq!(result, module.run(&[TensorData::scalar(10.0)]).unwrap());
//! ```

pub mod attrs;
pub mod error;
pub mod fold;
pub mod graph;
pub mod interpreter;
pub mod module;
pub mod tensor;

pub use error::GraphError;
pub use fold::{split_const_subgraphs, FoldedModule};
pub use module::GraphModule;
pub use tensor::TensorData;

/// Prelude module with commonly used types and functions.
pub mod prelude {
    pub use crate::attrs::{AttrTree, Attrs};
    pub use crate::error::GraphError;
    pub use crate::fold::{split_const_subgraphs, FoldResult, FoldedModule};
    pub use crate::graph::{Arg, CallOp, Graph, NodeData, NodeId, NodeOp};
    pub use crate::interpreter::Interpreter;
    pub use crate::module::GraphModule;
    pub use crate::tensor::TensorData;
}
