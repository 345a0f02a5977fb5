//! Build IR graphs programmatically.
//!
//! Frontends normally produce `IrGraph`s directly; `GraphBuilder` is the
//! lightweight path for hand-assembled graphs and test fixtures.

use crate::ir::{IrEdge, IrEdgeId, IrGraph, IrNode, IrNodeId};
use crate::types::{AttributeValue, DataType, TensorShape};

/// Fluent builder for `IrGraph`.
///
/// # Example
///
/// ```
/// use kiln_core::{DataType, GraphBuilder, TensorShape};
///
/// let mut builder = GraphBuilder::new();
/// let x = builder.input("x", DataType::F32, TensorShape::Static(vec![2, 3]));
/// let y = builder.op("StopGradient", &[x], "y", DataType::F32, TensorShape::Static(vec![2, 3]));
/// builder.output(y);
/// let graph = builder.build();
/// assert_eq!(graph.node_count(), 1);
/// ```
pub struct GraphBuilder {
    graph: IrGraph,
}

impl GraphBuilder {
    /// Create a builder for an empty graph.
    pub fn new() -> Self {
        Self {
            graph: IrGraph::new(),
        }
    }

    /// Declare a graph input.
    pub fn input(&mut self, name: &str, dtype: DataType, shape: TensorShape) -> IrEdgeId {
        let id = self
            .graph
            .add_edge(IrEdge::new(name.to_string(), dtype, shape));
        self.graph.inputs.push(id);
        id
    }

    /// Materialize a 1-D `I64` constant (axis lists, target shapes).
    pub fn constant_i64(&mut self, name: &str, values: Vec<i64>) -> IrEdgeId {
        self.graph.add_constant_i64(name, values)
    }

    /// Declare a runtime edge with no producer that is not a graph input.
    ///
    /// Useful for values whose producer is outside the fragment under test.
    pub fn value(&mut self, name: &str, dtype: DataType, shape: TensorShape) -> IrEdgeId {
        self.graph
            .add_edge(IrEdge::new(name.to_string(), dtype, shape))
    }

    /// Add a single-output operator and return its output edge.
    pub fn op(
        &mut self,
        op_type: &str,
        inputs: &[IrEdgeId],
        output_name: &str,
        dtype: DataType,
        shape: TensorShape,
    ) -> IrEdgeId {
        self.op_with_attributes(op_type, inputs, Vec::new(), output_name, dtype, shape)
    }

    /// Add a single-output operator carrying attributes.
    pub fn op_with_attributes(
        &mut self,
        op_type: &str,
        inputs: &[IrEdgeId],
        attributes: Vec<(&str, AttributeValue)>,
        output_name: &str,
        dtype: DataType,
        shape: TensorShape,
    ) -> IrEdgeId {
        let output = self
            .graph
            .add_edge(IrEdge::new(output_name.to_string(), dtype, shape));

        let mut node = IrNode::new(op_type.to_string());
        node.name = format!("{op_type}_{output_name}");
        for &input in inputs {
            node.add_input(input);
        }
        node.add_output(output);
        for (key, value) in attributes {
            node.set_attribute(key, value);
        }
        self.graph.add_node(node);

        output
    }

    /// Mark an edge as a graph output.
    pub fn output(&mut self, edge: IrEdgeId) {
        self.graph.outputs.push(edge);
    }

    /// Get the node producing an edge built so far.
    pub fn producer(&self, edge: IrEdgeId) -> Option<IrNodeId> {
        self.graph.edge_producer(edge)
    }

    /// Borrow the graph under construction.
    pub fn graph(&self) -> &IrGraph {
        &self.graph
    }

    /// Finish building.
    pub fn build(self) -> IrGraph {
        self.graph
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}
