//! The evaluation engine: walks a graph's node list in order and computes
//! each node's value over `ndarray` tensors.
//!
//! Evaluation is deterministic and error-transparent: any failure (missing
//! attribute, shape mismatch) propagates unchanged to the caller.

use log::trace;
use ndarray::{ArrayD, Axis, Ix2, IxDyn, Zip};

use crate::{
    attrs::Attrs,
    error::GraphError,
    graph::{Arg, CallOp, Graph, NodeData, NodeId, NodeOp},
    tensor::TensorData,
};

/// Evaluates a graph node list over an attribute store and runtime inputs.
#[derive(Default)]
pub struct Interpreter {
    values: Vec<Option<TensorData>>,
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter::default()
    }

    /// Evaluates `graph` and returns the values of its output node's
    /// arguments, in order.
    ///
    /// `inputs` bind to input placeholders positionally, following
    /// `graph.inputs` order regardless of where the placeholder nodes sit
    /// in the node list. A graph holds at most one output node; a second
    /// one is an invariant violation.
    pub fn evaluate(
        &mut self,
        graph: &Graph,
        attrs: &Attrs,
        inputs: &[TensorData],
    ) -> Result<Vec<TensorData>, GraphError> {
        if inputs.len() != graph.inputs.len() {
            return Err(GraphError::InputArity {
                expected: graph.inputs.len(),
                got: inputs.len(),
            });
        }
        self.values = vec![None; graph.nodes.len()];

        let mut results = None;
        for (idx, node) in graph.nodes.iter().enumerate() {
            match &node.op {
                NodeOp::Input => {
                    let position = graph
                        .inputs
                        .iter()
                        .position(|&id| id == NodeId(idx))
                        .ok_or_else(|| {
                            GraphError::InvariantViolation(format!(
                                "input node {} missing from the graph input list",
                                node.name
                            ))
                        })?;
                    self.values[idx] = Some(inputs[position].clone());
                }
                NodeOp::GetAttr(path) => {
                    let value = attrs
                        .get(path)
                        .ok_or_else(|| GraphError::MissingAttr(path.clone()))?;
                    self.values[idx] = Some(value.clone());
                }
                NodeOp::Call(op) => {
                    let args = self.resolve_args(node)?;
                    trace!("evaluating {} ({:?})", node.name, op);
                    self.values[idx] = Some(eval_call(op, &args, &node.name)?);
                }
                NodeOp::Output => {
                    if results.is_some() {
                        return Err(GraphError::InvariantViolation(format!(
                            "second output node {} in the node list",
                            node.name
                        )));
                    }
                    results = Some(self.resolve_args(node)?);
                }
            }
        }
        Ok(results.unwrap_or_default())
    }

    fn resolve_args(&self, node: &NodeData) -> Result<Vec<TensorData>, GraphError> {
        node.args
            .iter()
            .map(|arg| match arg {
                Arg::Node(id) => self
                    .values
                    .get(id.0)
                    .and_then(|slot| slot.clone())
                    .ok_or_else(|| {
                        GraphError::InvariantViolation(format!(
                            "{} reads node {} before it is defined",
                            node.name, id.0
                        ))
                    }),
                Arg::Lit(value) => Ok(TensorData::scalar(*value)),
            })
            .collect()
    }
}

fn eval_call(op: &CallOp, args: &[TensorData], name: &str) -> Result<TensorData, GraphError> {
    match op {
        CallOp::Add => binary(args, name, |a, b| a + b),
        CallOp::Sub => binary(args, name, |a, b| a - b),
        CallOp::Mul => binary(args, name, |a, b| a * b),
        CallOp::Div => binary(args, name, |a, b| a / b),
        CallOp::Neg => unary(args, name, |x| -x),
        CallOp::Sqrt => unary(args, name, |x| x.sqrt()),
        CallOp::Sigmoid => unary(args, name, |x| 1.0 / (1.0 + (-x).exp())),
        CallOp::Relu => unary(args, name, |x| x.max(0.0)),
        CallOp::MatMul => matmul(args, name),
        CallOp::Permute(axes) => permute(args, name, axes),
        CallOp::Sum(axis) => sum(args, name, *axis),
    }
}

fn one<'a>(args: &'a [TensorData], name: &str) -> Result<&'a TensorData, GraphError> {
    match args {
        [input] => Ok(input),
        _ => Err(GraphError::UnsupportedOp(format!(
            "{name}: expected 1 argument, got {}",
            args.len()
        ))),
    }
}

fn two<'a>(
    args: &'a [TensorData],
    name: &str,
) -> Result<(&'a TensorData, &'a TensorData), GraphError> {
    match args {
        [lhs, rhs] => Ok((lhs, rhs)),
        _ => Err(GraphError::UnsupportedOp(format!(
            "{name}: expected 2 arguments, got {}",
            args.len()
        ))),
    }
}

fn unary(
    args: &[TensorData],
    name: &str,
    f: impl Fn(f32) -> f32,
) -> Result<TensorData, GraphError> {
    let input = one(args, name)?;
    Ok(TensorData(input.0.mapv(f)))
}

fn binary(
    args: &[TensorData],
    name: &str,
    f: impl Fn(f32, f32) -> f32,
) -> Result<TensorData, GraphError> {
    let (lhs, rhs) = two(args, name)?;
    let shape = broadcast_shape(lhs.shape(), rhs.shape()).ok_or_else(|| {
        GraphError::ShapeMismatch(format!(
            "{name}: cannot broadcast {:?} with {:?}",
            lhs.shape(),
            rhs.shape()
        ))
    })?;
    let lhs_view = lhs.0.broadcast(IxDyn(&shape)).ok_or_else(|| {
        GraphError::ShapeMismatch(format!("{name}: cannot broadcast {:?}", lhs.shape()))
    })?;
    let rhs_view = rhs.0.broadcast(IxDyn(&shape)).ok_or_else(|| {
        GraphError::ShapeMismatch(format!("{name}: cannot broadcast {:?}", rhs.shape()))
    })?;
    let mut out = ArrayD::zeros(IxDyn(&shape));
    Zip::from(&mut out)
        .and(&lhs_view)
        .and(&rhs_view)
        .for_each(|o, &a, &b| *o = f(a, b));
    Ok(TensorData(out))
}

/// Numpy-style broadcast shape of two operand shapes, aligned at the
/// trailing dimensions.
fn broadcast_shape(a: &[usize], b: &[usize]) -> Option<Vec<usize>> {
    let rank = a.len().max(b.len());
    let mut shape = vec![0; rank];
    for i in 0..rank {
        let da = if i < rank - a.len() { 1 } else { a[i - (rank - a.len())] };
        let db = if i < rank - b.len() { 1 } else { b[i - (rank - b.len())] };
        shape[i] = if da == db || db == 1 {
            da
        } else if da == 1 {
            db
        } else {
            return None;
        };
    }
    Some(shape)
}

fn matmul(args: &[TensorData], name: &str) -> Result<TensorData, GraphError> {
    let (lhs, rhs) = two(args, name)?;
    let a = lhs.0.clone().into_dimensionality::<Ix2>().map_err(|_| {
        GraphError::ShapeMismatch(format!("{name}: matmul lhs must be 2-d, got {:?}", lhs.shape()))
    })?;
    let b = rhs.0.clone().into_dimensionality::<Ix2>().map_err(|_| {
        GraphError::ShapeMismatch(format!("{name}: matmul rhs must be 2-d, got {:?}", rhs.shape()))
    })?;
    if a.ncols() != b.nrows() {
        return Err(GraphError::ShapeMismatch(format!(
            "{name}: matmul inner dimensions differ, {:?} vs {:?}",
            lhs.shape(),
            rhs.shape()
        )));
    }
    Ok(TensorData(a.dot(&b).into_dyn()))
}

fn permute(args: &[TensorData], name: &str, axes: &[usize]) -> Result<TensorData, GraphError> {
    let input = one(args, name)?;
    let ndim = input.ndim();
    let mut seen = vec![false; ndim];
    let valid = axes.len() == ndim
        && axes
            .iter()
            .all(|&axis| axis < ndim && !std::mem::replace(&mut seen[axis], true));
    if !valid {
        return Err(GraphError::ShapeMismatch(format!(
            "{name}: invalid permutation {axes:?} for rank {ndim}"
        )));
    }
    let permuted = input.0.clone().permuted_axes(IxDyn(axes));
    Ok(TensorData(permuted.as_standard_layout().to_owned()))
}

fn sum(args: &[TensorData], name: &str, axis: usize) -> Result<TensorData, GraphError> {
    let input = one(args, name)?;
    if axis >= input.ndim() {
        return Err(GraphError::ShapeMismatch(format!(
            "{name}: reduction axis {axis} out of bounds for rank {}",
            input.ndim()
        )));
    }
    Ok(TensorData(input.0.sum_axis(Axis(axis))))
}
