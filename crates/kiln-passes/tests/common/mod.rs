//! Common test utilities for pass tests.
//!
//! Graph fixtures and inspection helpers shared by the integration tests.

#![allow(dead_code)]

use kiln_core::{
    AttributeValue, DataType, Dimension, GraphBuilder, IrEdgeId, IrGraph, Pass,
    TensorShape,
};
use kiln_passes::NopEliminationPass;

/// Initialize a debug-level tracing subscriber, ignoring repeat calls.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_test_writer()
        .try_init();
}

/// Shorthand for a fully static shape.
pub fn shape(dims: &[usize]) -> TensorShape {
    TensorShape::Static(dims.to_vec())
}

/// Shape whose first dimension is the named dimension `n`.
pub fn batched(rest: &[usize]) -> TensorShape {
    let mut dims = vec![Dimension::Named("n".to_string())];
    dims.extend(rest.iter().map(|&d| Dimension::Fixed(d)));
    TensorShape::Symbolic(dims)
}

/// Run the default pass once.
pub fn run(graph: &mut IrGraph) -> bool {
    NopEliminationPass::new()
        .run(graph)
        .expect("nop elimination failed")
}

/// Sorted `op_type`s of every node in the graph.
pub fn op_types(graph: &IrGraph) -> Vec<String> {
    let mut types: Vec<String> = graph
        .nodes()
        .map(|(_, node)| node.op_type.clone())
        .collect();
    types.sort();
    types
}

/// Inputs of the node producing the given graph output.
pub fn producer_inputs(graph: &IrGraph, edge: IrEdgeId) -> Vec<IrEdgeId> {
    let producer = graph.edge_producer(edge).expect("edge has no producer");
    graph.node(producer).unwrap().inputs().to_vec()
}

/// Single-input operator `op_type` between input `x` and a `Relu` consumer.
///
/// Graph structure:
/// - Input: x:[F32; in_shape]
/// - Operation: op_type(x) -> y:[F32; out_shape]
/// - Operation: Relu(y) -> z, graph output
///
/// Returns the graph with the ids of `x` and `z`.
pub fn make_unary_graph(
    op_type: &str,
    in_shape: TensorShape,
    out_shape: TensorShape,
) -> (IrGraph, IrEdgeId, IrEdgeId) {
    let mut builder = GraphBuilder::new();
    let x = builder.input("x", DataType::F32, in_shape);
    let y = builder.op(op_type, &[x], "y", DataType::F32, out_shape.clone());
    let z = builder.op("Relu", &[y], "z", DataType::F32, out_shape);
    builder.output(z);
    (builder.build(), x, z)
}

/// `outer(inner(x, inner_axes), outer_axes)` feeding a `Relu`.
///
/// `inner` and `outer` are "Squeeze" or "Unsqueeze"; both axis lists are
/// constant inputs. Returns the graph with the ids of `x` and the Relu output.
pub fn make_squeeze_pair_graph(
    inner: &str,
    inner_axes: Vec<i64>,
    mid_shape: TensorShape,
    outer: &str,
    outer_axes: Vec<i64>,
    x_shape: TensorShape,
    out_shape: TensorShape,
) -> (IrGraph, IrEdgeId, IrEdgeId) {
    let mut builder = GraphBuilder::new();
    let x = builder.input("x", DataType::F32, x_shape);
    let a1 = builder.constant_i64("inner_axes", inner_axes);
    let mid = builder.op(inner, &[x, a1], "mid", DataType::F32, mid_shape);
    let a2 = builder.constant_i64("outer_axes", outer_axes);
    let y = builder.op(outer, &[mid, a2], "y", DataType::F32, out_shape.clone());
    let z = builder.op("Relu", &[y], "z", DataType::F32, out_shape);
    builder.output(z);
    (builder.build(), x, z)
}

/// Sum with an explicit `axes` attribute.
pub fn sum_with_axes(
    builder: &mut GraphBuilder,
    input: IrEdgeId,
    axes: Vec<i64>,
    name: &str,
    out_shape: TensorShape,
) -> IrEdgeId {
    builder.op_with_attributes(
        "Sum",
        &[input],
        vec![("axes", AttributeValue::Ints(axes))],
        name,
        DataType::F32,
        out_shape,
    )
}
