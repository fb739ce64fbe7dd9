//! The graph splitter: partitions a module into a constant subgraph and a
//! rewired base subgraph, with collision-free attribute names for the
//! values crossing the cut.

use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    error::GraphError,
    graph::{Arg, Graph, NodeData, NodeId, NodeOp},
    module::GraphModule,
};

use super::analysis::{analyze, ConstAnalysis};

/// Outcome of splitting a module.
///
/// `const_subgraph` is `None` when no split was performed: structural
/// anomaly, no constant computation, or no constant result consumed
/// outside the constant region. All of these are expected terminal
/// outcomes, not errors; `base_subgraph` is then an unmodified clone of
/// the source module.
#[derive(Debug, Clone)]
pub struct FoldResult {
    pub const_subgraph: Option<GraphModule>,
    pub base_subgraph: GraphModule,
    /// Attribute paths in `base_subgraph` synthesized from const-subgraph
    /// outputs. Order matches the const subgraph's output arguments and is
    /// the binding order at materialization.
    pub const_output_names: Vec<String>,
}

impl FoldResult {
    fn unsplit(module: &GraphModule) -> Self {
        FoldResult {
            const_subgraph: None,
            base_subgraph: module.clone(),
            const_output_names: Vec::new(),
        }
    }
}

/// Partitions `module` into constant and base subgraphs. The source module
/// is never mutated.
pub fn split(module: &GraphModule) -> Result<FoldResult, GraphError> {
    let graph = &module.graph;
    let analysis = analyze(graph);
    if analysis.anomaly() {
        debug!("structural anomaly; returning module unsplit");
        return Ok(FoldResult::unsplit(module));
    }

    let (cut_outputs, cut_set) = collect_cut_outputs(graph, &analysis);
    if cut_outputs.is_empty() {
        debug!("no const result consumed outside the const region; skipping fold");
        return Ok(FoldResult::unsplit(module));
    }

    let const_output_names = allocate_names(module, graph, &cut_outputs);
    let const_graph = build_const_subgraph(graph, &analysis, &cut_outputs)?;
    let base_graph = build_base_subgraph(
        graph,
        &analysis,
        &cut_outputs,
        &cut_set,
        &const_output_names,
    )?;

    debug!(
        "folded {} const nodes into {} attribute(s)",
        const_graph.len() - 1,
        const_output_names.len()
    );
    Ok(FoldResult {
        const_subgraph: Some(GraphModule::new(const_graph, module.attrs.clone())),
        base_subgraph: GraphModule::new(base_graph, module.attrs.clone()),
        const_output_names,
    })
}

/// Collects const `Call` nodes with at least one non-const consumer, in
/// first-encountered order.
///
/// Bare attribute reads consumed by non-const nodes are not cut outputs:
/// they stay in the base subgraph as plain reads, since extracting them
/// saves nothing. Folding is only worthwhile if some const result is
/// consumed by a non-const node other than the output boundary; when no
/// such consumer exists (all constant results are unused, or the entire
/// graph is constant) the returned list is empty and no split happens.
fn collect_cut_outputs(graph: &Graph, analysis: &ConstAnalysis) -> (Vec<NodeId>, FxHashSet<NodeId>) {
    let mut cut_outputs = Vec::new();
    let mut cut_set = FxHashSet::default();
    let mut worthwhile = false;

    for (idx, node) in graph.nodes.iter().enumerate() {
        if analysis.is_const(NodeId(idx)) {
            continue;
        }
        for src in node.src() {
            if !analysis.is_const(src) || !graph.node(src).op.is_call() {
                continue;
            }
            if !node.op.is_output() {
                worthwhile = true;
            }
            if cut_set.insert(src) {
                cut_outputs.push(src);
            }
        }
    }
    if !worthwhile {
        return (Vec::new(), FxHashSet::default());
    }
    (cut_outputs, cut_set)
}

/// Allocates one fresh attribute path per cut output: `{name}__folded`,
/// integer-suffixed until it collides with neither an existing attribute,
/// an existing node name, nor a previously allocated name. Node names count
/// because each allocated path also names the replacement read node in the
/// base subgraph.
fn allocate_names(module: &GraphModule, graph: &Graph, cut_outputs: &[NodeId]) -> Vec<String> {
    let mut taken: FxHashSet<String> =
        graph.nodes.iter().map(|node| node.name.clone()).collect();
    let mut names = Vec::with_capacity(cut_outputs.len());
    for &id in cut_outputs {
        let stem = format!("{}__folded", graph.node(id).name);
        let mut candidate = stem.clone();
        let mut suffix = 0usize;
        while module.attrs.contains(&candidate) || taken.contains(&candidate) {
            suffix += 1;
            candidate = format!("{stem}_{suffix}");
        }
        taken.insert(candidate.clone());
        names.push(candidate);
    }
    names
}

/// Builds the constant subgraph: every const node in original relative
/// order, capped by an output node whose arguments are the cut outputs.
fn build_const_subgraph(
    graph: &Graph,
    analysis: &ConstAnalysis,
    cut_outputs: &[NodeId],
) -> Result<Graph, GraphError> {
    let mut const_graph = Graph::new();
    let mut id_map: FxHashMap<NodeId, NodeId> = FxHashMap::default();

    for (idx, node) in graph.nodes.iter().enumerate() {
        let id = NodeId(idx);
        if !analysis.is_const(id) {
            continue;
        }
        let mut carried = node.clone();
        for arg in &mut carried.args {
            if let Arg::Node(src) = arg {
                *src = *id_map.get(src).ok_or_else(|| {
                    GraphError::InvariantViolation(format!(
                        "const node {} depends on a non-const node",
                        node.name
                    ))
                })?;
            }
        }
        id_map.insert(id, const_graph.push_node(carried));
    }

    let results = cut_outputs
        .iter()
        .map(|id| {
            id_map.get(id).copied().ok_or_else(|| {
                GraphError::InvariantViolation(format!("cut output {} not carried over", id.0))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    const_graph.output(results);
    Ok(const_graph)
}

/// Builds the base subgraph: the original node list with each cut output
/// replaced by a fresh attribute read placed just before its earliest
/// consumer, followed by dead-node elimination of the now-unreferenced
/// constant region.
fn build_base_subgraph(
    graph: &Graph,
    analysis: &ConstAnalysis,
    cut_outputs: &[NodeId],
    cut_set: &FxHashSet<NodeId>,
    const_output_names: &[String],
) -> Result<Graph, GraphError> {
    // Earliest non-const consumer position per cut output. Const consumers
    // keep their original reference; they die with the rest of the const
    // region during compaction.
    let mut earliest: FxHashMap<NodeId, usize> = FxHashMap::default();
    for (idx, node) in graph.nodes.iter().enumerate() {
        if analysis.is_const(NodeId(idx)) {
            continue;
        }
        for src in node.src() {
            if cut_set.contains(&src) {
                earliest.entry(src).or_insert(idx);
            }
        }
    }

    let mut base_graph = Graph::new();
    let mut id_map: FxHashMap<NodeId, NodeId> = FxHashMap::default();
    let mut read_map: FxHashMap<NodeId, NodeId> = FxHashMap::default();

    for (idx, node) in graph.nodes.iter().enumerate() {
        for (pos, &cut) in cut_outputs.iter().enumerate() {
            if earliest.get(&cut) == Some(&idx) {
                let path = const_output_names[pos].clone();
                let mut read = NodeData::new(path.clone(), NodeOp::GetAttr(path), Vec::new());
                // The read stands in for the folded node's result; it
                // inherits that node's metadata.
                read.meta = graph.node(cut).meta.clone();
                read_map.insert(cut, base_graph.push_node(read));
            }
        }

        let rewire = !analysis.is_const(NodeId(idx));
        let mut carried = node.clone();
        for arg in &mut carried.args {
            if let Arg::Node(src) = arg {
                if rewire {
                    if let Some(&read) = read_map.get(src) {
                        *src = read;
                        continue;
                    }
                }
                *src = *id_map.get(src).ok_or_else(|| {
                    GraphError::InvariantViolation(format!(
                        "{} references a node that was not carried over",
                        node.name
                    ))
                })?;
            }
        }
        id_map.insert(NodeId(idx), base_graph.push_node(carried));
    }

    base_graph.compact()?;
    Ok(base_graph)
}
