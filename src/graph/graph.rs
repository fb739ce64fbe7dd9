use rustc_hash::FxHashMap;

use crate::{
    error::GraphError,
    graph::{
        node::{Arg, NodeData, NodeId},
        op::{CallOp, NodeOp},
    },
};

/// Owns all the nodes of a computation graph.
///
/// Nodes live in an arena (`Vec<NodeData>`); a `NodeId` is a stable index
/// into it. Definition order doubles as evaluation order and is expected to
/// be a topological order. The one tolerated exception is a non-input node
/// placed ahead of an input node, which the fold pass detects and treats as
/// grounds to skip folding rather than an error.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// All nodes, in definition order.
    pub nodes: Vec<NodeData>,
    /// Ids of the input placeholder nodes, in positional-argument order.
    pub inputs: Vec<NodeId>,
    /// Ids of the output nodes.
    pub outputs: Vec<NodeId>,
    name_counts: FxHashMap<String, usize>,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0]
    }

    /// Looks a node up by name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|node| node.name == name)
            .map(NodeId)
    }

    /// Allocates a name unique within this graph: `stem`, then `stem_1`,
    /// `stem_2`, and so on.
    fn unique_name(&mut self, stem: &str) -> String {
        let count = self.name_counts.entry(stem.to_string()).or_insert(0);
        let name = if *count == 0 {
            stem.to_string()
        } else {
            format!("{stem}_{count}")
        };
        *count += 1;
        name
    }

    /// Appends a fully-formed node, keeping its existing name. Used by graph
    /// transformations that carry nodes over from another graph; the builder
    /// methods below are the front door for constructing graphs.
    pub fn push_node(&mut self, node: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        if node.op.is_input() {
            self.inputs.push(id);
        }
        if node.op.is_output() {
            self.outputs.push(id);
        }
        self.nodes.push(node);
        id
    }

    /// Adds a new input placeholder node.
    pub fn input(&mut self, name: &str) -> NodeId {
        let name = self.unique_name(name);
        self.push_node(NodeData::new(name, NodeOp::Input, Vec::new()))
    }

    /// Adds a read of the attribute at `path` (dotted for nested stores).
    pub fn get_attr(&mut self, path: &str) -> NodeId {
        let name = self.unique_name(&path.replace('.', "_"));
        self.push_node(NodeData::new(name, NodeOp::GetAttr(path.to_string()), Vec::new()))
    }

    /// Adds a `Call` node with explicit arguments.
    pub fn call(&mut self, op: CallOp, args: Vec<Arg>) -> NodeId {
        let name = self.unique_name(op.stem());
        self.push_node(NodeData::new(name, NodeOp::Call(op), args))
    }

    /// Adds the output node; `results` become the graph's results, in order.
    pub fn output(&mut self, results: Vec<NodeId>) -> NodeId {
        let name = self.unique_name("output");
        let args = results.into_iter().map(Arg::Node).collect();
        self.push_node(NodeData::new(name, NodeOp::Output, args))
    }

    // --- Convenience constructors for operation nodes ---

    pub fn add(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.call(CallOp::Add, vec![Arg::Node(lhs), Arg::Node(rhs)])
    }

    pub fn sub(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.call(CallOp::Sub, vec![Arg::Node(lhs), Arg::Node(rhs)])
    }

    pub fn mul(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.call(CallOp::Mul, vec![Arg::Node(lhs), Arg::Node(rhs)])
    }

    pub fn div(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.call(CallOp::Div, vec![Arg::Node(lhs), Arg::Node(rhs)])
    }

    pub fn add_lit(&mut self, lhs: NodeId, rhs: f32) -> NodeId {
        self.call(CallOp::Add, vec![Arg::Node(lhs), Arg::Lit(rhs)])
    }

    pub fn mul_lit(&mut self, lhs: NodeId, rhs: f32) -> NodeId {
        self.call(CallOp::Mul, vec![Arg::Node(lhs), Arg::Lit(rhs)])
    }

    pub fn neg(&mut self, src: NodeId) -> NodeId {
        self.call(CallOp::Neg, vec![Arg::Node(src)])
    }

    pub fn sqrt(&mut self, src: NodeId) -> NodeId {
        self.call(CallOp::Sqrt, vec![Arg::Node(src)])
    }

    pub fn sigmoid(&mut self, src: NodeId) -> NodeId {
        self.call(CallOp::Sigmoid, vec![Arg::Node(src)])
    }

    pub fn relu(&mut self, src: NodeId) -> NodeId {
        self.call(CallOp::Relu, vec![Arg::Node(src)])
    }

    pub fn matmul(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.call(CallOp::MatMul, vec![Arg::Node(lhs), Arg::Node(rhs)])
    }

    pub fn permute(&mut self, src: NodeId, axes: Vec<usize>) -> NodeId {
        self.call(CallOp::Permute(axes), vec![Arg::Node(src)])
    }

    pub fn sum(&mut self, src: NodeId, axis: usize) -> NodeId {
        self.call(CallOp::Sum(axis), vec![Arg::Node(src)])
    }

    /// Builds the consumer map: node id -> ids of the nodes referencing it,
    /// in node order.
    pub fn users(&self) -> FxHashMap<NodeId, Vec<NodeId>> {
        let mut users: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
        for (id, node) in self.nodes.iter().enumerate() {
            for src in node.src() {
                users.entry(src).or_default().push(NodeId(id));
            }
        }
        users
    }

    /// Removes every node not reachable from an output, then remaps the
    /// surviving ids densely, preserving relative order. Input nodes are
    /// always retained so the positional input contract stays intact.
    pub fn compact(&mut self) -> Result<(), GraphError> {
        let mut live = vec![false; self.nodes.len()];
        let mut stack: Vec<NodeId> = self
            .outputs
            .iter()
            .chain(self.inputs.iter())
            .copied()
            .collect();
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut live[id.0], true) {
                continue;
            }
            for src in self.nodes[id.0].src() {
                if !live[src.0] {
                    stack.push(src);
                }
            }
        }
        if live.iter().all(|&alive| alive) {
            return Ok(());
        }

        let mut remap: Vec<Option<NodeId>> = vec![None; self.nodes.len()];
        let mut nodes = Vec::with_capacity(live.iter().filter(|&&alive| alive).count());
        for (idx, node) in self.nodes.drain(..).enumerate() {
            if live[idx] {
                remap[idx] = Some(NodeId(nodes.len()));
                nodes.push(node);
            }
        }
        for node in &mut nodes {
            for arg in &mut node.args {
                if let Arg::Node(id) = arg {
                    *id = remap[id.0].ok_or_else(|| {
                        GraphError::InvariantViolation(format!(
                            "argument references removed node {}",
                            id.0
                        ))
                    })?;
                }
            }
        }
        self.inputs = remap_ids(&self.inputs, &remap)?;
        self.outputs = remap_ids(&self.outputs, &remap)?;
        self.nodes = nodes;
        Ok(())
    }
}

fn remap_ids(ids: &[NodeId], remap: &[Option<NodeId>]) -> Result<Vec<NodeId>, GraphError> {
    ids.iter()
        .map(|id| {
            remap[id.0].ok_or_else(|| {
                GraphError::InvariantViolation(format!("interface node {} was removed", id.0))
            })
        })
        .collect()
}
