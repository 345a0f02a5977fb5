//! Per-operator rewrite rules.
//!
//! Every eliminator inspects one node and either redirects the consumers of
//! its first output to an equivalent value (returning `Ok(true)`) or leaves
//! the graph untouched (returning `Ok(false)`). Uncertainty about shapes or
//! axes is never an error: the rule simply declines.

use super::NopEliminationConfig;
use super::axes::{axes_equal, axes_remaining};
use kiln_core::shape_inference::{normalize_axes, squeeze_shape, unsqueeze_shape};
use kiln_core::{
    AttributeValue, DataType, IrEdge, IrEdgeId, IrGraph, IrNode, IrNodeId, OpKind, Result,
    TensorShape,
};
use tracing::{debug, trace};

/// State handed to an eliminator for one candidate node.
pub struct EliminationCtx<'a> {
    /// The graph being rewritten.
    pub graph: &'a mut IrGraph,

    /// The candidate node.
    pub node_id: IrNodeId,

    /// Pass configuration.
    pub config: &'a NopEliminationConfig,

    replacement: Option<IrEdgeId>,
}

impl<'a> EliminationCtx<'a> {
    /// Create a context for one candidate node.
    pub fn new(
        graph: &'a mut IrGraph,
        node_id: IrNodeId,
        config: &'a NopEliminationConfig,
    ) -> Self {
        Self {
            graph,
            node_id,
            config,
            replacement: None,
        }
    }

    /// The value the candidate's consumers were redirected to, once a rule
    /// has fired.
    pub fn replacement(&self) -> Option<IrEdgeId> {
        self.replacement
    }

    /// The candidate node.
    pub fn node(&self) -> Result<&IrNode> {
        self.graph.node(self.node_id)
    }

    /// Edge feeding input slot `index` of the candidate.
    pub fn input(&self, index: usize) -> Result<IrEdgeId> {
        self.graph.node_input(self.node_id, index)
    }

    /// The candidate's first output, the one every rule rewrites.
    pub fn output(&self) -> Result<IrEdgeId> {
        self.graph.node_output(self.node_id, 0)
    }

    /// Shape of an edge.
    fn shape(&self, edge: IrEdgeId) -> Result<&TensorShape> {
        Ok(&self.graph.edge(edge)?.shape)
    }

    /// Redirect consumers of the candidate's output to `replacement`.
    fn replace_with(&mut self, replacement: IrEdgeId) -> Result<bool> {
        let output = self.output()?;
        self.graph.replace_output(output, replacement)?;
        self.replacement = Some(replacement);
        let node = self.node()?;
        trace!(
            node = %node.name,
            op_type = %node.op_type,
            replacement = %self.graph.edge(replacement)?.name,
            "eliminated"
        );
        Ok(true)
    }
}

/// Panics unless the node is of the kind the eliminator was written for.
///
/// Only a wrong dispatch table entry can trip this.
fn expect_kind(node: &IrNode, kind: OpKind) {
    assert_eq!(
        node.kind(),
        Some(kind),
        "{kind} eliminator dispatched on node '{}' of type {}",
        node.name,
        node.op_type
    );
}

/// Panics unless the node is one of `kinds`.
fn expect_kind_in(node: &IrNode, kinds: &[OpKind]) {
    assert!(
        node.kind().is_some_and(|kind| kinds.contains(&kind)),
        "eliminator for {kinds:?} dispatched on node '{}' of type {}",
        node.name,
        node.op_type
    );
}

/// Where a node's axis list comes from.
enum Axes {
    /// Compile-time constant axes.
    Constant(Vec<i64>),

    /// Axes arrive through a runtime input.
    Runtime,

    /// No axes input and no `axes` attribute.
    Missing,
}

/// Read a node's axes from its constant second input or its `axes` attribute.
fn read_axes(graph: &IrGraph, node_id: IrNodeId) -> Result<Axes> {
    let node = graph.node(node_id)?;
    if let Some(&axes_input) = node.inputs.get(1) {
        return Ok(match graph.edge(axes_input)?.constant_i64s() {
            Some(axes) => Axes::Constant(axes),
            None => Axes::Runtime,
        });
    }
    Ok(match node.get_attribute("axes") {
        Some(AttributeValue::Ints(axes)) => Axes::Constant(axes.clone()),
        Some(_) => Axes::Runtime,
        None => Axes::Missing,
    })
}

// ──────────────────────────── Shape-preserving ops ─────────────────────────

/// Pad, Slice and Broadcast whose output shape equals their input shape.
pub fn eliminate_nop(ctx: &mut EliminationCtx<'_>) -> Result<bool> {
    expect_kind_in(
        ctx.node()?,
        &[OpKind::Pad, OpKind::Slice, OpKind::Broadcast],
    );

    let input = ctx.input(0)?;
    let output = ctx.output()?;

    let (in_shape, out_shape) = (ctx.shape(input)?, ctx.shape(output)?);
    let (Some(in_dims), Some(out_dims)) = (in_shape.as_static(), out_shape.as_static()) else {
        debug!(node = %ctx.node()?.name, "skipping node with dynamic shapes");
        return Ok(false);
    };

    if in_dims == out_dims {
        return ctx.replace_with(input);
    }
    Ok(false)
}

// ──────────────────────────────── Sum ─────────────────────────────────────

/// Sum over an empty set of reduction axes.
pub fn eliminate_sum(ctx: &mut EliminationCtx<'_>) -> Result<bool> {
    expect_kind(ctx.node()?, OpKind::Sum);

    let axes = match read_axes(ctx.graph, ctx.node_id)? {
        Axes::Constant(axes) => axes,
        Axes::Missing => Vec::new(),
        Axes::Runtime => {
            debug!(node = %ctx.node()?.name, "Sum reduction axes are not constant");
            return Ok(false);
        }
    };

    if axes.is_empty() {
        let input = ctx.input(0)?;
        return ctx.replace_with(input);
    }
    Ok(false)
}

// ─────────────────────────────── Convert ──────────────────────────────────

/// Convert to the type it already has, or feeding only a type-agnostic op.
///
/// In the type-agnostic case a chain of Converts is skipped in one step by
/// reading from the upstream Convert's own input.
pub fn eliminate_convert(ctx: &mut EliminationCtx<'_>) -> Result<bool> {
    let node = ctx.node()?;
    expect_kind(node, OpKind::Convert);

    let input = ctx.input(0)?;
    let output = ctx.output()?;

    let consumers = ctx.graph.edge_consumers(output);
    let type_agnostic = match consumers.as_slice() {
        [consumer] if !ctx.graph.is_graph_output(output) => ctx
            .graph
            .node(*consumer)?
            .kind()
            .is_some_and(|kind| ctx.config.type_agnostic_consumers.contains(&kind)),
        _ => false,
    };

    let target: DataType = match node.get_attribute("to") {
        Some(AttributeValue::DataType(dtype)) => *dtype,
        _ => ctx.graph.edge(output)?.dtype,
    };
    let source = ctx.graph.edge(input)?.dtype;

    if target != source && !type_agnostic {
        return Ok(false);
    }

    let mut replacement = input;
    if type_agnostic && ctx.graph.producer_kind(input) == Some(OpKind::Convert) {
        if let Some(upstream) = ctx.graph.edge_producer(input) {
            replacement = ctx.graph.node_input(upstream, 0)?;
        }
    }
    ctx.replace_with(replacement)
}

// ─────────────────────────────── Concat ───────────────────────────────────

/// Concat of a single input.
pub fn eliminate_concat(ctx: &mut EliminationCtx<'_>) -> Result<bool> {
    expect_kind(ctx.node()?, OpKind::Concat);
    if ctx.node()?.inputs.len() == 1 {
        let input = ctx.input(0)?;
        return ctx.replace_with(input);
    }
    Ok(false)
}

// ─────────────────────────────── Reshape ──────────────────────────────────

/// Identity Reshape, or a Reshape stacked on another shape-only op.
pub fn eliminate_reshape(ctx: &mut EliminationCtx<'_>) -> Result<bool> {
    expect_kind(ctx.node()?, OpKind::Reshape);

    let input = ctx.input(0)?;
    let output = ctx.output()?;

    let (in_shape, out_shape) = (ctx.shape(input)?, ctx.shape(output)?);
    let (Some(in_dims), Some(out_dims)) = (in_shape.as_static(), out_shape.as_static()) else {
        debug!(node = %ctx.node()?.name, "Reshape has dynamic shapes");
        return Ok(false);
    };

    if in_dims == out_dims {
        return ctx.replace_with(input);
    }

    let target = out_dims.to_vec();
    match ctx.graph.producer_kind(input) {
        Some(OpKind::Squeeze | OpKind::Unsqueeze | OpKind::Reshape) => {
            let Some(upstream) = ctx.graph.edge_producer(input) else {
                return Ok(false);
            };
            let source = ctx.graph.node_input(upstream, 0)?;
            fuse_into_reshape(ctx, source, target)
        }
        _ => Ok(false),
    }
}

/// Replace the candidate with a single Reshape of `source` to `target`.
///
/// When `source` already has exactly that static shape no Reshape is built
/// and consumers read `source` directly.
fn fuse_into_reshape(
    ctx: &mut EliminationCtx<'_>,
    source: IrEdgeId,
    target: Vec<usize>,
) -> Result<bool> {
    if ctx.shape(source)?.as_static() == Some(target.as_slice()) {
        return ctx.replace_with(source);
    }

    let output = ctx.graph.edge(ctx.output()?)?.clone();
    let name = ctx.node()?.name.clone();

    let pattern = ctx.graph.add_constant_i64(
        &format!("{}_shape", output.name),
        target.iter().map(|&d| d as i64).collect(),
    );
    let fused_name = ctx.graph.unique_edge_name(&format!("{}_fused", output.name));
    let fused_output = ctx.graph.add_edge(IrEdge::new(
        fused_name,
        output.dtype,
        TensorShape::Static(target),
    ));

    let mut reshape = IrNode::of_kind(OpKind::Reshape);
    reshape.name = format!("{name}_fused");
    reshape.add_input(source);
    reshape.add_input(pattern);
    reshape.add_output(fused_output);
    // Target extents are literal; a 0 means an empty dimension.
    reshape.set_attribute("allowzero", AttributeValue::Int(1));
    ctx.graph.add_node(reshape);

    ctx.replace_with(fused_output)
}

// ────────────────────────── Squeeze / Unsqueeze ───────────────────────────

/// Squeeze fed by an Unsqueeze (cancel or reduce) or by a Reshape (fuse).
pub fn eliminate_squeeze(ctx: &mut EliminationCtx<'_>) -> Result<bool> {
    expect_kind(ctx.node()?, OpKind::Squeeze);
    eliminate_squeeze_like(ctx, OpKind::Unsqueeze)
}

/// Unsqueeze fed by a Squeeze (cancel or reduce) or by a Reshape (fuse).
pub fn eliminate_unsqueeze(ctx: &mut EliminationCtx<'_>) -> Result<bool> {
    expect_kind(ctx.node()?, OpKind::Unsqueeze);
    eliminate_squeeze_like(ctx, OpKind::Squeeze)
}

fn eliminate_squeeze_like(ctx: &mut EliminationCtx<'_>, opposite: OpKind) -> Result<bool> {
    let data = ctx.input(0)?;
    let Some(inner) = ctx.graph.edge_producer(data) else {
        return Ok(false);
    };
    let inner_kind = ctx.graph.node(inner)?.kind();

    if inner_kind == Some(opposite) {
        if let Some(data_rank) = ctx.shape(data)?.ndim() {
            return collapse_pair(ctx, inner, data_rank);
        }
        debug!(node = %ctx.node()?.name, "squeeze/unsqueeze pair has dynamic rank");
        return Ok(false);
    }

    if inner_kind == Some(OpKind::Reshape) {
        let output = ctx.output()?;
        let Some(out_dims) = ctx.shape(output)?.as_static().map(<[usize]>::to_vec) else {
            debug!(node = %ctx.node()?.name, "output shape is dynamic, not fusing into Reshape");
            return Ok(false);
        };
        let source = ctx.graph.node_input(inner, 0)?;
        return fuse_into_reshape(ctx, source, out_dims);
    }

    Ok(false)
}

/// Cancel or shrink an adjacent Squeeze/Unsqueeze pair.
///
/// `inner` produces the candidate's data input, whose rank is `data_rank`.
/// Both axis lists are normalized to non-negative positions before they are
/// compared: Squeeze axes against the Squeeze input rank, Unsqueeze axes
/// against the Unsqueeze output rank.
fn collapse_pair(ctx: &mut EliminationCtx<'_>, inner: IrNodeId, data_rank: usize) -> Result<bool> {
    let outer_is_unsqueeze = ctx.node()?.kind() == Some(OpKind::Unsqueeze);
    let (squeeze_id, unsqueeze_id) = if outer_is_unsqueeze {
        (inner, ctx.node_id)
    } else {
        (ctx.node_id, inner)
    };

    let (Axes::Constant(sq_raw), Axes::Constant(unsq_raw)) = (
        read_axes(ctx.graph, squeeze_id)?,
        read_axes(ctx.graph, unsqueeze_id)?,
    ) else {
        debug!(node = %ctx.node()?.name, "squeeze/unsqueeze axes are not constants");
        return Ok(false);
    };
    if sq_raw.is_empty() {
        debug!(node = %ctx.node()?.name, "Squeeze with implicit axes is not paired");
        return Ok(false);
    }

    // Squeeze→Unsqueeze: data is the squeeze output. Unsqueeze→Squeeze: data
    // is the unsqueeze output, which is also the squeeze input.
    let (squeeze_in_rank, unsqueeze_out_rank) = if outer_is_unsqueeze {
        (data_rank + sq_raw.len(), data_rank + unsq_raw.len())
    } else {
        (data_rank, data_rank)
    };
    let (Some(sq_axes), Some(unsq_axes)) = (
        normalize_axes(&sq_raw, squeeze_in_rank),
        normalize_axes(&unsq_raw, unsqueeze_out_rank),
    ) else {
        debug!(node = %ctx.node()?.name, "squeeze/unsqueeze axes out of range");
        return Ok(false);
    };
    let sq_axes: Vec<i64> = sq_axes.into_iter().map(|a| a as i64).collect();
    let unsq_axes: Vec<i64> = unsq_axes.into_iter().map(|a| a as i64).collect();

    let source = ctx.graph.node_input(inner, 0)?;
    if axes_equal(&sq_axes, &unsq_axes) {
        // A squeezed named dimension comes back as 1; the pair is not an
        // identity on shape information then.
        let output = ctx.output()?;
        if !ctx.shape(source)?.same_scheme(ctx.shape(output)?) {
            debug!(node = %ctx.node()?.name, "cancelling pair would change the output shape");
            return Ok(false);
        }
        return ctx.replace_with(source);
    }

    let rank_reducing = outer_is_unsqueeze;
    if let Some(axes) = axes_remaining(&unsq_axes, &sq_axes, rank_reducing) {
        if try_rebuild(ctx, OpKind::Squeeze, source, axes)? {
            return Ok(true);
        }
    }
    if let Some(axes) = axes_remaining(&sq_axes, &unsq_axes, rank_reducing) {
        if try_rebuild(ctx, OpKind::Unsqueeze, source, axes)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Build `kind(source, axes)` if its inferred output matches the candidate's.
///
/// Nothing is added to the graph when the shapes disagree.
fn try_rebuild(
    ctx: &mut EliminationCtx<'_>,
    kind: OpKind,
    source: IrEdgeId,
    axes: Vec<i64>,
) -> Result<bool> {
    let source_shape = ctx.shape(source)?;
    let inferred = match kind {
        OpKind::Squeeze => squeeze_shape(source_shape, &axes),
        _ => unsqueeze_shape(source_shape, &axes),
    };
    let output = ctx.graph.edge(ctx.output()?)?.clone();
    let Some(inferred) = inferred.filter(|shape| shape.same_scheme(&output.shape)) else {
        trace!(%kind, ?axes, "rebuilt op does not reproduce the output shape");
        return Ok(false);
    };

    let name = ctx.node()?.name.clone();
    let axes_edge = ctx
        .graph
        .add_constant_i64(&format!("{}_axes", output.name), axes);
    let rebuilt_name = ctx
        .graph
        .unique_edge_name(&format!("{}_reduced", output.name));
    let rebuilt_output = ctx
        .graph
        .add_edge(IrEdge::new(rebuilt_name, output.dtype, inferred));

    let mut node = IrNode::of_kind(kind);
    node.name = format!("{name}_reduced");
    node.add_input(source);
    node.add_input(axes_edge);
    node.add_output(rebuilt_output);
    ctx.graph.add_node(node);

    ctx.replace_with(rebuilt_output)
}

// ──────────────────────────── StopGradient ────────────────────────────────

/// StopGradient has no effect on forward values.
pub fn eliminate_stop_gradient(ctx: &mut EliminationCtx<'_>) -> Result<bool> {
    expect_kind(ctx.node()?, OpKind::StopGradient);
    let input = ctx.input(0)?;
    ctx.replace_with(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::GraphBuilder;

    fn shape(dims: &[usize]) -> TensorShape {
        TensorShape::Static(dims.to_vec())
    }

    #[test]
    fn test_read_axes_sources() {
        let mut builder = GraphBuilder::new();
        let x = builder.input("x", DataType::F32, shape(&[2, 1]));
        let axes = builder.constant_i64("axes", vec![1]);
        let runtime = builder.input("runtime_axes", DataType::I64, shape(&[1]));
        let a = builder.op("Squeeze", &[x, axes], "a", DataType::F32, shape(&[2]));
        let b = builder.op("Squeeze", &[x, runtime], "b", DataType::F32, shape(&[2]));
        let c = builder.op("Squeeze", &[x], "c", DataType::F32, shape(&[2]));
        let (a, b, c) = (
            builder.producer(a).unwrap(),
            builder.producer(b).unwrap(),
            builder.producer(c).unwrap(),
        );
        let graph = builder.build();

        assert!(matches!(read_axes(&graph, a).unwrap(), Axes::Constant(v) if v == vec![1]));
        assert!(matches!(read_axes(&graph, b).unwrap(), Axes::Runtime));
        assert!(matches!(read_axes(&graph, c).unwrap(), Axes::Missing));
    }

    #[test]
    fn test_stop_gradient_reports_change() {
        let mut builder = GraphBuilder::new();
        let x = builder.input("x", DataType::F32, TensorShape::Unknown);
        let y = builder.op("StopGradient", &[x], "y", DataType::F32, TensorShape::Unknown);
        let z = builder.op("Relu", &[y], "z", DataType::F32, TensorShape::Unknown);
        builder.output(z);
        let node_id = builder.producer(y).unwrap();
        let relu = builder.producer(z).unwrap();
        let mut graph = builder.build();

        let config = NopEliminationConfig::default();
        let mut ctx = EliminationCtx::new(&mut graph, node_id, &config);
        assert!(eliminate_stop_gradient(&mut ctx).unwrap());
        assert_eq!(ctx.replacement(), Some(x));
        assert_eq!(graph.node(relu).unwrap().inputs(), &[x]);
        // Removal is left to the driver.
        assert!(graph.contains_node(node_id));
        assert!(graph.is_dead(node_id).unwrap());
    }

    #[test]
    fn test_declined_rewrite_leaves_graph_untouched() {
        let mut builder = GraphBuilder::new();
        let x = builder.input("x", DataType::F32, shape(&[2, 3]));
        let y = builder.op("Reshape", &[x], "y", DataType::F32, shape(&[3, 2]));
        builder.output(y);
        let node_id = builder.producer(y).unwrap();
        let mut graph = builder.build();
        let edges_before = graph.edge_count();

        let config = NopEliminationConfig::default();
        let mut ctx = EliminationCtx::new(&mut graph, node_id, &config);
        assert!(!eliminate_reshape(&mut ctx).unwrap());
        assert_eq!(graph.edge_count(), edges_before);
        assert_eq!(graph.outputs, vec![y]);
    }

    #[test]
    fn test_rebuild_rejected_on_shape_mismatch() {
        // A Squeeze{0} of [2,3] cannot produce anything.
        let mut builder = GraphBuilder::new();
        let x = builder.input("x", DataType::F32, shape(&[2, 3]));
        let y = builder.op("Unsqueeze", &[x], "y", DataType::F32, shape(&[1, 2, 3]));
        let node_id = builder.producer(y).unwrap();
        let mut graph = builder.build();
        let edges_before = graph.edge_count();

        let config = NopEliminationConfig::default();
        let mut ctx = EliminationCtx::new(&mut graph, node_id, &config);
        assert!(!try_rebuild(&mut ctx, OpKind::Squeeze, x, vec![0]).unwrap());
        assert_eq!(graph.edge_count(), edges_before);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    #[should_panic(expected = "Reshape eliminator dispatched")]
    fn test_wrong_kind_panics() {
        let mut builder = GraphBuilder::new();
        let x = builder.input("x", DataType::F32, shape(&[2]));
        let y = builder.op("Concat", &[x], "y", DataType::F32, shape(&[2]));
        let node_id = builder.producer(y).unwrap();
        let mut graph = builder.build();

        let config = NopEliminationConfig::default();
        let mut ctx = EliminationCtx::new(&mut graph, node_id, &config);
        let _ = eliminate_reshape(&mut ctx);
    }

    #[test]
    #[should_panic(expected = "eliminator for [Pad, Slice, Broadcast] dispatched")]
    fn test_shape_preserving_rule_rejects_other_kinds() {
        let mut builder = GraphBuilder::new();
        let x = builder.input("x", DataType::F32, shape(&[2]));
        let y = builder.op("Reshape", &[x], "y", DataType::F32, shape(&[2]));
        let node_id = builder.producer(y).unwrap();
        let mut graph = builder.build();

        let config = NopEliminationConfig::default();
        let mut ctx = EliminationCtx::new(&mut graph, node_id, &config);
        let _ = eliminate_nop(&mut ctx);
    }

    #[test]
    #[should_panic(expected = "StopGradient eliminator dispatched")]
    fn test_stop_gradient_rule_rejects_other_kinds() {
        let mut builder = GraphBuilder::new();
        let x = builder.input("x", DataType::F32, shape(&[2]));
        let y = builder.op("Relu", &[x], "y", DataType::F32, shape(&[2]));
        let node_id = builder.producer(y).unwrap();
        let mut graph = builder.build();

        let config = NopEliminationConfig::default();
        let mut ctx = EliminationCtx::new(&mut graph, node_id, &config);
        let _ = eliminate_stop_gradient(&mut ctx);
    }

    #[test]
    fn test_cancel_keeps_static_output() {
        // [n,3] -squeeze{0}-> [3] -unsqueeze{0}-> [1,3]: x is not [1,3].
        let mut builder = GraphBuilder::new();
        let x = builder.input(
            "x",
            DataType::F32,
            TensorShape::Symbolic(vec![
                kiln_core::Dimension::Named("n".to_string()),
                kiln_core::Dimension::Fixed(3),
            ]),
        );
        let sq_axes = builder.constant_i64("sq_axes", vec![0]);
        let s = builder.op("Squeeze", &[x, sq_axes], "s", DataType::F32, shape(&[3]));
        let unsq_axes = builder.constant_i64("unsq_axes", vec![0]);
        let u = builder.op("Unsqueeze", &[s, unsq_axes], "u", DataType::F32, shape(&[1, 3]));
        let node_id = builder.producer(u).unwrap();
        let mut graph = builder.build();

        let config = NopEliminationConfig::default();
        let mut ctx = EliminationCtx::new(&mut graph, node_id, &config);
        assert!(!eliminate_unsqueeze(&mut ctx).unwrap());
        assert_eq!(ctx.replacement(), None);
    }
}
