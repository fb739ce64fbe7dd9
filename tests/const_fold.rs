//! End-to-end tests for constant-subgraph folding: split structure,
//! rewiring, naming, metadata, and numeric equivalence with the unfolded
//! module.

use graphfold::prelude::*;
use ndarray::array;

fn scalar2(v: f32) -> TensorData {
    TensorData(array![[v]].into_dyn())
}

fn iota(shape: &[usize], scale: f32, offset: f32) -> TensorData {
    let len: usize = shape.iter().product();
    let data = (0..len).map(|i| i as f32 * scale + offset).collect();
    TensorData::from_vec(shape, data)
}

/// The structural checks shared by every test that expects a split: a
/// const subgraph exists, and each const output name appears as exactly
/// one attribute read in the base subgraph.
fn verify_fold(folded: &FoldedModule) {
    assert!(folded.has_const_subgraph());
    let reads = folded
        .base_subgraph
        .graph
        .nodes
        .iter()
        .filter(|node| match &node.op {
            NodeOp::GetAttr(path) => folded.const_output_names.contains(path),
            _ => false,
        })
        .count();
    assert_eq!(reads, folded.const_output_names.len());
    assert!(!folded.const_output_names.is_empty());
}

/// Single folded attr, single replaced result:
///
///    attr_1                 attr_1
///     | |                    | |
/// x   add                    add
///  \ /                        |
///  sub   y                  output    (becomes attr add__folded)
///     \ /          ==>  ------+------
///     mul  attr_2        x   /
///       \ /               \ /
///       add               sub   y
///        |                   \ /
///      output                mul  attr_2
///                              \ /
///                              add
///                               |
///                             output
#[test]
fn basic_one_attr_no_name_collision() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut tree = AttrTree::new();
    tree.set("attr_1", scalar2(-0.9));
    tree.set("attr_2", scalar2(17.1));

    let mut graph = Graph::new();
    let x = graph.input("x");
    let y = graph.input("y");
    let g1 = graph.get_attr("attr_1");
    let a = graph.add(g1, g1);
    let s = graph.sub(x, a);
    let m = graph.mul(s, y);
    let g2 = graph.get_attr("attr_2");
    let o = graph.add(m, g2);
    graph.output(vec![o]);

    let module = GraphModule::new(graph, Attrs::from_tree(&tree));
    let mut folded = split_const_subgraphs(&module).unwrap();
    verify_fold(&folded);
    assert_eq!(folded.const_output_names, vec!["add__folded".to_string()]);

    let inputs = [scalar2(-0.45), TensorData::from_vec(&[1], vec![0.9])];
    let base_result = module.run(&inputs).unwrap();
    let fold_result = folded.run(&inputs).unwrap();
    assert_eq!(fold_result, base_result);
}

/// Same shape as the basic test, but an existing attribute already claims
/// the splitter's default name for the folded result; the allocator must
/// retry with a suffix.
#[test]
fn basic_one_attr_name_collision() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut tree = AttrTree::new();
    // Named to collide with the folded name for the node named "add".
    tree.set("add__folded", scalar2(1.0));
    tree.set("attr_2", scalar2(17.1));

    let mut graph = Graph::new();
    let x = graph.input("x");
    let y = graph.input("y");
    let g1 = graph.get_attr("add__folded");
    let a = graph.add(g1, g1);
    let s = graph.sub(x, a);
    let m = graph.mul(s, y);
    let g2 = graph.get_attr("attr_2");
    let o = graph.add(m, g2);
    graph.output(vec![o]);

    let module = GraphModule::new(graph, Attrs::from_tree(&tree));
    let mut folded = split_const_subgraphs(&module).unwrap();
    verify_fold(&folded);
    assert_eq!(folded.const_output_names, vec!["add__folded_1".to_string()]);

    let inputs = [scalar2(5.0), TensorData::from_vec(&[1], vec![4.0])];
    let base_result = module.run(&inputs).unwrap();
    let fold_result = folded.run(&inputs).unwrap();
    assert_eq!(fold_result, base_result);

    // The colliding attribute is untouched.
    assert_eq!(
        folded.base_subgraph.attrs.get("add__folded"),
        Some(&scalar2(1.0))
    );
}

/// A placeholder placed after a computation node disables folding
/// entirely; evaluation still matches the original.
#[test]
fn placeholder_reordered_disables_folding() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut graph = Graph::new();
    let x = graph.input("x");
    let m = graph.mul_lit(x, 2.0);
    let y = graph.input("y");
    let o = graph.add(m, y);
    graph.output(vec![o]);

    let module = GraphModule::new(graph, Attrs::new());
    let mut folded = split_const_subgraphs(&module).unwrap();
    assert!(!folded.has_const_subgraph());
    assert!(folded.const_output_names.is_empty());

    let inputs = [scalar2(-0.45), scalar2(0.45)];
    let base_result = module.run(&inputs).unwrap();
    let fold_result = folded.run(&inputs).unwrap();
    assert_eq!(fold_result, base_result);
}

/// A node argument referring forward in the node list also disables
/// folding; the module comes back unsplit.
#[test]
fn forward_reference_disables_folding() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut tree = AttrTree::new();
    tree.set("attr", scalar2(2.0));

    let mut graph = Graph::new();
    let x = graph.input("x");
    // References the attribute read defined one slot later.
    let a = graph.push_node(NodeData::new(
        "add".to_string(),
        NodeOp::Call(CallOp::Add),
        vec![Arg::Node(NodeId(2)), Arg::Node(NodeId(2))],
    ));
    let _g = graph.get_attr("attr");
    let s = graph.sub(x, a);
    graph.output(vec![s]);

    let module = GraphModule::new(graph, Attrs::from_tree(&tree));
    let folded = split_const_subgraphs(&module).unwrap();
    assert!(!folded.has_const_subgraph());
    assert!(folded.const_output_names.is_empty());
    assert_eq!(folded.base_subgraph.graph.nodes, module.graph.nodes);
}

/// A graph with no constant computation at all: a bare attribute read
/// feeding a runtime subtraction is left alone.
#[test]
fn noop_graph_is_returned_unsplit() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut tree = AttrTree::new();
    tree.set("attr1", scalar2(-0.9));

    let mut graph = Graph::new();
    let x = graph.input("x");
    let g = graph.get_attr("attr1");
    let s = graph.sub(x, g);
    graph.output(vec![s]);

    let module = GraphModule::new(graph, Attrs::from_tree(&tree));
    let mut folded = split_const_subgraphs(&module).unwrap();
    assert!(!folded.has_const_subgraph());
    assert_eq!(folded.base_subgraph.graph.nodes, module.graph.nodes);

    let inputs = [scalar2(-0.45)];
    assert_eq!(
        folded.run(&inputs).unwrap(),
        module.run(&inputs).unwrap()
    );
}

/// The allocator also dodges existing node names: each allocated path
/// names the replacement read node in the base subgraph, and node names
/// are unique per graph.
#[test]
fn folded_name_avoids_existing_node_names() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut tree = AttrTree::new();
    tree.set("attr", scalar2(2.0));

    let mut graph = Graph::new();
    // Claims the default folded name for the node named "add".
    let x = graph.input("add__folded");
    let g = graph.get_attr("attr");
    let a = graph.add(g, g);
    let s = graph.sub(x, a);
    graph.output(vec![s]);

    let module = GraphModule::new(graph, Attrs::from_tree(&tree));
    let mut folded = split_const_subgraphs(&module).unwrap();
    verify_fold(&folded);
    assert_eq!(folded.const_output_names, vec!["add__folded_1".to_string()]);

    let names: Vec<&str> = folded
        .base_subgraph
        .graph
        .nodes
        .iter()
        .map(|node| node.name.as_str())
        .collect();
    let unique: std::collections::HashSet<&str> = names.iter().copied().collect();
    assert_eq!(unique.len(), names.len());

    let inputs = [scalar2(6.0)];
    assert_eq!(folded.run(&inputs).unwrap(), module.run(&inputs).unwrap());
}

#[test]
fn two_attr_reads_three_inputs() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut tree = AttrTree::new();
    tree.set("attr1", scalar2(1.32));

    let mut graph = Graph::new();
    let x = graph.input("x");
    let y = graph.input("y");
    let z = graph.input("z");
    let g1 = graph.get_attr("attr1");
    let a = graph.add(g1, g1);
    let s = graph.sub(x, a);
    let m = graph.mul(s, y);
    let d = graph.div(m, z);
    graph.output(vec![d]);

    let module = GraphModule::new(graph, Attrs::from_tree(&tree));
    let mut folded = split_const_subgraphs(&module).unwrap();
    verify_fold(&folded);

    let inputs = [
        scalar2(-0.45),
        TensorData::from_vec(&[1], vec![0.9]),
        TensorData::from_vec(&[1], vec![1.1]),
    ];
    let base_result = module.run(&inputs).unwrap();
    let fold_result = folded.run(&inputs).unwrap();
    assert_eq!(fold_result, base_result);
}

/// Two attribute reads folded into a single output attr.
#[test]
fn two_attrs_folded_into_one_result() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut tree = AttrTree::new();
    tree.set("attr1", iota(&[2, 3], 0.25, -0.7));
    tree.set("attr2", iota(&[2, 3], -0.5, 1.3));

    let mut graph = Graph::new();
    let x = graph.input("x");
    let g1 = graph.get_attr("attr1");
    let g2 = graph.get_attr("attr2");
    let y = graph.add(g1, g2);
    let o = graph.add(x, y);
    graph.output(vec![o]);

    let module = GraphModule::new(graph, Attrs::from_tree(&tree));
    let mut folded = split_const_subgraphs(&module).unwrap();
    verify_fold(&folded);
    assert_eq!(folded.const_output_names.len(), 1);

    let inputs = [iota(&[2, 3], 0.125, 0.0)];
    let base_result = module.run(&inputs).unwrap();
    let fold_result = folded.run(&inputs).unwrap();
    assert_eq!(fold_result, base_result);
}

/// Two independent constant computations feeding two distinct downstream
/// consumers yield exactly two folded attributes, each wired to its
/// correct consumer.
#[test]
fn multiple_folded_attrs() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut tree = AttrTree::new();
    tree.set("attr1", iota(&[4, 4], 0.3, -2.0));
    tree.set("attr2", iota(&[4, 4], -0.2, 1.5));
    tree.set("lin_w", iota(&[4, 4], 0.1, -0.8));
    tree.set("lin_b", iota(&[4], 0.05, 0.2));

    let mut graph = Graph::new();
    let x = graph.input("x");
    let y = graph.input("y");
    let g1 = graph.get_attr("attr1");
    let p = graph.permute(g1, vec![1, 0]);
    let a = graph.add(g1, p);
    let sx = graph.sub(x, a);
    let g2 = graph.get_attr("attr2");
    let amax = graph.sum(g2, 1);
    let ay = graph.add(y, amax);
    let t = graph.add(sx, ay);
    let gw = graph.get_attr("lin_w");
    let mm = graph.matmul(t, gw);
    let gb = graph.get_attr("lin_b");
    let lin = graph.add(mm, gb);
    let sig = graph.sigmoid(lin);
    graph.output(vec![sig]);

    let module = GraphModule::new(graph, Attrs::from_tree(&tree));
    let mut folded = split_const_subgraphs(&module).unwrap();
    verify_fold(&folded);
    assert_eq!(folded.const_output_names.len(), 2);
    // First-encountered consumer order: sub(x, a) comes before add(y, amax).
    assert_eq!(folded.const_output_names[0], "add__folded");
    assert_eq!(folded.const_output_names[1], "sum__folded");

    let inputs = [iota(&[4, 4], 0.07, -0.4), iota(&[4], 0.5, -1.0)];
    let base_result = module.run(&inputs).unwrap();
    let fold_result = folded.run(&inputs).unwrap();
    assert_eq!(fold_result, base_result);
}

/// A constant nested deep in the attribute hierarchy folds identically to
/// a top-level one.
#[test]
fn submodule_attr_hierarchy() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut inner = AttrTree::new();
    inner.set("internal_attr", iota(&[2, 3], 0.4, -1.1));
    let mut tree = AttrTree::new();
    tree.set("attr", iota(&[2, 3], -0.3, 0.6));
    tree.set_tree("my_mod", inner);

    let mut graph = Graph::new();
    let x = graph.input("x");
    let g1 = graph.get_attr("attr");
    let g2 = graph.get_attr("my_mod.internal_attr");
    let a = graph.add(g1, g2);
    let o = graph.add(a, x);
    graph.output(vec![o]);

    let module = GraphModule::new(graph, Attrs::from_tree(&tree));
    let mut folded = split_const_subgraphs(&module).unwrap();
    verify_fold(&folded);

    let inputs = [iota(&[2, 3], 0.2, 0.1)];
    let base_result = module.run(&inputs).unwrap();
    let fold_result = folded.run(&inputs).unwrap();
    assert_eq!(fold_result, base_result);
}

/// Node metadata survives folding: the replacement attribute read carries
/// the folded call's metadata, untouched nodes keep their own, and the
/// dead attribute read's metadata disappears with it.
#[test]
fn retain_node_meta() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut tree = AttrTree::new();
    tree.set("attr", iota(&[2, 3], 0.15, -0.2));

    let mut graph = Graph::new();
    let x = graph.input("x");
    let g = graph.get_attr("attr");
    let a = graph.add(g, g);
    let s = graph.sub(x, a);
    graph.output(vec![s]);

    // Tag every non-output node with its pre-fold position.
    for (id, idx) in [(x, 0), (g, 1), (a, 2), (s, 3)] {
        graph
            .node_mut(id)
            .meta
            .insert("meta_idx".to_string(), idx.to_string());
    }

    let module = GraphModule::new(graph, Attrs::from_tree(&tree));
    let mut folded = split_const_subgraphs(&module).unwrap();
    verify_fold(&folded);

    // Post-fold: the placeholder keeps idx 0, the new attribute read
    // replaces the add (idx 2), the sub keeps idx 3, and the original
    // get_attr (idx 1) is gone.
    for node in &folded.base_subgraph.graph.nodes {
        match &node.op {
            NodeOp::Input => assert_eq!(node.meta["meta_idx"], "0"),
            NodeOp::GetAttr(_) => assert_eq!(node.meta["meta_idx"], "2"),
            NodeOp::Call(CallOp::Sub) => assert_eq!(node.meta["meta_idx"], "3"),
            other => assert!(other.is_output(), "unexpected node {:?}", other),
        }
    }

    let inputs = [iota(&[2, 3], 0.35, 0.0)];
    let base_result = module.run(&inputs).unwrap();
    let fold_result = folded.run(&inputs).unwrap();
    assert_eq!(fold_result, base_result);
}

/// Folding composes with downstream non-foldable activation nodes.
#[test]
fn fold_feeding_relu() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut tree = AttrTree::new();
    tree.set("attr", iota(&[2, 3], 0.45, -1.3));

    let mut graph = Graph::new();
    let x = graph.input("x");
    let g = graph.get_attr("attr");
    let a = graph.add(g, g);
    let s = graph.sub(x, a);
    let r = graph.relu(s);
    graph.output(vec![r]);

    let module = GraphModule::new(graph, Attrs::from_tree(&tree));
    let mut folded = split_const_subgraphs(&module).unwrap();
    verify_fold(&folded);

    let inputs = [iota(&[2, 3], 0.6, -0.9)];
    let base_result = module.run(&inputs).unwrap();
    let fold_result = folded.run(&inputs).unwrap();
    assert_eq!(fold_result, base_result);
}

/// A constant computation whose only consumer is itself dead code is not
/// extracted; the module comes back unsplit.
#[test]
fn unused_const_computation_is_not_extracted() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut tree = AttrTree::new();
    tree.set("attr1", scalar2(2.5));

    let mut graph = Graph::new();
    let x = graph.input("x");
    let y = graph.input("y");
    let g1 = graph.get_attr("attr1");
    let a = graph.add(g1, g1);
    let _unused = graph.mul_lit(a, 2.0);
    let o = graph.sub(x, y);
    graph.output(vec![o]);

    let module = GraphModule::new(graph, Attrs::from_tree(&tree));
    let mut folded = split_const_subgraphs(&module).unwrap();
    assert!(!folded.has_const_subgraph());
    assert_eq!(folded.base_subgraph.graph.nodes, module.graph.nodes);

    let inputs = [scalar2(3.0), scalar2(1.0)];
    assert_eq!(
        folded.run(&inputs).unwrap(),
        module.run(&inputs).unwrap()
    );
}

/// An entirely constant graph offers no extraction benefit and is left
/// unsplit.
#[test]
fn all_const_graph_is_not_extracted() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut tree = AttrTree::new();
    tree.set("attr1", scalar2(2.0));
    tree.set("attr2", scalar2(3.0));

    let mut graph = Graph::new();
    let g1 = graph.get_attr("attr1");
    let g2 = graph.get_attr("attr2");
    let a = graph.add(g1, g2);
    graph.output(vec![a]);

    let module = GraphModule::new(graph, Attrs::from_tree(&tree));
    let mut folded = split_const_subgraphs(&module).unwrap();
    assert!(!folded.has_const_subgraph());
    assert_eq!(folded.run(&[]).unwrap(), module.run(&[]).unwrap());
}

/// A folded result that is also a graph output is rewired at the output
/// boundary too.
#[test]
fn const_result_also_a_graph_output() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut tree = AttrTree::new();
    tree.set("attr", scalar2(4.5));

    let mut graph = Graph::new();
    let x = graph.input("x");
    let g = graph.get_attr("attr");
    let a = graph.add(g, g);
    let s = graph.sub(x, a);
    graph.output(vec![s, a]);

    let module = GraphModule::new(graph, Attrs::from_tree(&tree));
    let mut folded = split_const_subgraphs(&module).unwrap();
    verify_fold(&folded);
    assert_eq!(folded.const_output_names.len(), 1);

    let inputs = [scalar2(10.0)];
    let base_result = module.run(&inputs).unwrap();
    let fold_result = folded.run(&inputs).unwrap();
    assert_eq!(fold_result, base_result);
    assert_eq!(fold_result.len(), 2);
}

/// Repeated invocation materializes exactly once and keeps matching the
/// original module on every call.
#[test]
fn idempotent_materialization() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut tree = AttrTree::new();
    tree.set("attr", scalar2(-1.5));

    let mut graph = Graph::new();
    let x = graph.input("x");
    let g = graph.get_attr("attr");
    let a = graph.add(g, g);
    let s = graph.sub(x, a);
    graph.output(vec![s]);

    let module = GraphModule::new(graph, Attrs::from_tree(&tree));
    let mut folded = split_const_subgraphs(&module).unwrap();
    assert!(!folded.is_materialized());

    let inputs = [scalar2(7.0)];
    let base_result = module.run(&inputs).unwrap();

    let first = folded.run(&inputs).unwrap();
    assert!(folded.is_materialized());
    let attrs_after_first = folded.base_subgraph.attrs.len();

    for _ in 0..2 {
        assert_eq!(folded.run(&inputs).unwrap(), base_result);
    }
    assert_eq!(first, base_result);
    assert_eq!(folded.base_subgraph.attrs.len(), attrs_after_first);
}
