/// The role of a node in the graph.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOp {
    /// A runtime input placeholder.
    Input,
    /// A read of a module attribute by dotted path.
    GetAttr(String),
    /// A computation over the node's arguments.
    Call(CallOp),
    /// The graph interface; its arguments are the graph results.
    Output,
}

impl NodeOp {
    pub fn is_input(&self) -> bool {
        matches!(self, NodeOp::Input)
    }

    pub fn is_get_attr(&self) -> bool {
        matches!(self, NodeOp::GetAttr(_))
    }

    pub fn is_call(&self) -> bool {
        matches!(self, NodeOp::Call(_))
    }

    pub fn is_output(&self) -> bool {
        matches!(self, NodeOp::Output)
    }
}

/// The operator performed by a `Call` node.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOp {
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    Sqrt,
    Sigmoid,
    Relu,
    /// 2-D matrix multiplication.
    MatMul,
    /// Axis permutation.
    Permute(Vec<usize>),
    /// Sum-reduction along one axis; the axis is removed from the shape.
    Sum(usize),
}

impl CallOp {
    /// Lower-case stem used when generating node names.
    pub fn stem(&self) -> &'static str {
        match self {
            CallOp::Add => "add",
            CallOp::Sub => "sub",
            CallOp::Mul => "mul",
            CallOp::Div => "div",
            CallOp::Neg => "neg",
            CallOp::Sqrt => "sqrt",
            CallOp::Sigmoid => "sigmoid",
            CallOp::Relu => "relu",
            CallOp::MatMul => "matmul",
            CallOp::Permute(_) => "permute",
            CallOp::Sum(_) => "sum",
        }
    }
}
