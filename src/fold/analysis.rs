//! Constant-reachability analysis: classifies every node as const-foldable
//! or not, in a single forward pass over the node list.

use log::debug;

use crate::graph::{Graph, NodeId, NodeOp};

/// Result of the constant-reachability pass.
#[derive(Debug, Clone)]
pub struct ConstAnalysis {
    flags: Vec<bool>,
    anomaly: bool,
}

impl ConstAnalysis {
    /// Whether the node's value depends only on module attributes.
    pub fn is_const(&self, id: NodeId) -> bool {
        self.flags[id.0]
    }

    /// Set when the node order violates the inputs-first invariant or an
    /// argument refers forward. Splitting must be skipped for such graphs:
    /// the classification of nodes around the violation cannot be trusted
    /// to produce a valid cut.
    pub fn anomaly(&self) -> bool {
        self.anomaly
    }
}

/// Classifies every node in `graph`.
///
/// An input is never const. An attribute read always is. A call is const
/// iff all of its node arguments are const; literal arguments carry no
/// dependency. Output nodes are the interface boundary and are never
/// folded themselves.
pub fn analyze(graph: &Graph) -> ConstAnalysis {
    let mut flags = vec![false; graph.len()];
    let mut anomaly = false;
    let mut seen_non_input = false;

    for (idx, node) in graph.nodes.iter().enumerate() {
        if node.op.is_input() {
            if seen_non_input {
                debug!(
                    "input {} preceded by a non-input node; fold disabled",
                    node.name
                );
                anomaly = true;
            }
        } else {
            seen_non_input = true;
        }
        if node.src().any(|src| src.0 >= idx) {
            debug!("{} has a forward argument reference; fold disabled", node.name);
            anomaly = true;
        }

        flags[idx] = match &node.op {
            NodeOp::Input | NodeOp::Output => false,
            NodeOp::GetAttr(_) => true,
            NodeOp::Call(_) => node.src().all(|src| src.0 < idx && flags[src.0]),
        };
    }
    ConstAnalysis { flags, anomaly }
}
