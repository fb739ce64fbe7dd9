//! The dataflow graph model: arena node storage, typed node roles, and the
//! builder API used to construct computation graphs.

pub mod graph;
pub mod node;
pub mod op;


pub use graph::Graph;
pub use node::{Arg, NodeData, NodeId};
pub use op::{CallOp, NodeOp};
