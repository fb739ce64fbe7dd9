use rustc_hash::FxHashMap;

use crate::graph::op::NodeOp;

/// A unique identifier for a node within a `Graph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// An argument to a node: either another node's result or a scalar literal.
///
/// Literal arguments are transparent to const-reachability analysis; only
/// node arguments carry dependency information.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Node(NodeId),
    Lit(f32),
}

impl Arg {
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Arg::Node(id) => Some(*id),
            Arg::Lit(_) => None,
        }
    }
}

/// The data associated with a single node in the computation graph.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    /// Name unique within the owning graph.
    pub name: String,
    /// The role and operation of this node.
    pub op: NodeOp,
    /// Ordered argument references.
    pub args: Vec<Arg>,
    /// Free-form metadata. Graph transformations must carry this over to
    /// whichever node comes to represent this node's result.
    pub meta: FxHashMap<String, String>,
}

impl NodeData {
    pub fn new(name: String, op: NodeOp, args: Vec<Arg>) -> Self {
        NodeData {
            name,
            op,
            args,
            meta: FxHashMap::default(),
        }
    }

    /// The node ids referenced by this node's arguments, in argument order.
    pub fn src(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.args.iter().filter_map(Arg::as_node)
    }
}
