//! Intermediate representation for the optimizer graph.
//!
//! The IR is a directed graph where:
//! - **Nodes** (`IrNode`) are operators (e.g., Reshape, Squeeze, Convert)
//! - **Edges** (`IrEdge`) are tensor values flowing between operators
//!
//! Rewrites never edit a node in place. They redirect the consumers of one
//! edge to another edge with `replace_output`, after which the old producer
//! is dead and can be dropped with `remove_if_dead`.

use crate::types::{DataType, TensorShape, TensorValue};
use crate::{AttributeValue, Error, OpKind, Result};
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use petgraph::visit::{EdgeRef, Topo};

use std::collections::{HashMap, HashSet};

/// Type alias for IR node identifiers (backed by petgraph NodeIndex).
pub type IrNodeId = NodeIndex;

/// Unique identifier for an edge (tensor value) in the IR graph.
///
/// This is an index into `IrGraph::edges`. Edges are never removed, so an
/// `IrEdgeId` stays valid for the lifetime of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IrEdgeId(pub usize);

impl IrEdgeId {
    /// Create a new edge ID.
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    /// Get the underlying index.
    pub fn index(&self) -> usize {
        self.0
    }
}

// ──────────────────────────────── IrGraph ────────────────────────────────

/// Intermediate representation graph.
///
/// Nodes are operators; edges are tensor values stored in a side-table.
/// petgraph edges exist solely for topological ordering.
pub struct IrGraph {
    /// The graph structure (nodes only, no edge data).
    graph: StableGraph<IrNode, ()>,

    /// Edge metadata side-table.
    edges: Vec<IrEdge>,

    /// Lookup table: edge name -> edge ID.
    edge_by_name: HashMap<String, IrEdgeId>,

    /// Lookup table: edge ID -> producing node ID.
    edge_producer: HashMap<IrEdgeId, IrNodeId>,

    /// Lookup table: edge ID -> consuming node IDs (one entry per input slot).
    edge_consumers: HashMap<IrEdgeId, Vec<IrNodeId>>,

    /// Graph input edge IDs.
    pub inputs: Vec<IrEdgeId>,

    /// Graph output edge IDs.
    pub outputs: Vec<IrEdgeId>,
}

impl IrGraph {
    /// Create a new empty IR graph.
    pub fn new() -> Self {
        Self {
            graph: StableGraph::new(),
            edges: Vec::new(),
            edge_by_name: HashMap::new(),
            edge_producer: HashMap::new(),
            edge_consumers: HashMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    // ── Node access ──

    /// Get an immutable reference to a node.
    pub fn node(&self, id: IrNodeId) -> Result<&IrNode> {
        self.graph
            .node_weight(id)
            .ok_or_else(|| Error::InvalidGraph(format!("Node {:?} not found", id)))
    }

    /// Get a mutable reference to a node.
    pub fn node_mut(&mut self, id: IrNodeId) -> Result<&mut IrNode> {
        self.graph
            .node_weight_mut(id)
            .ok_or_else(|| Error::InvalidGraph(format!("Node {:?} not found", id)))
    }

    /// Check whether a node is still part of the graph.
    pub fn contains_node(&self, id: IrNodeId) -> bool {
        self.graph.contains_node(id)
    }

    /// Get the edge feeding input slot `index` of a node.
    pub fn node_input(&self, id: IrNodeId, index: usize) -> Result<IrEdgeId> {
        let node = self.node(id)?;
        node.inputs.get(index).copied().ok_or_else(|| {
            Error::InvalidGraph(format!(
                "Node '{}' ({}) has no input {index}",
                node.name, node.op_type
            ))
        })
    }

    /// Get the edge produced at output slot `index` of a node.
    pub fn node_output(&self, id: IrNodeId, index: usize) -> Result<IrEdgeId> {
        let node = self.node(id)?;
        node.outputs.get(index).copied().ok_or_else(|| {
            Error::InvalidGraph(format!(
                "Node '{}' ({}) has no output {index}",
                node.name, node.op_type
            ))
        })
    }

    /// Iterate over all nodes in the graph.
    pub fn nodes(&self) -> impl Iterator<Item = (IrNodeId, &IrNode)> {
        self.graph
            .node_indices()
            .filter_map(|id| self.graph.node_weight(id).map(|node| (id, node)))
    }

    // ── Edge access ──

    /// Get an immutable reference to an edge.
    pub fn edge(&self, id: IrEdgeId) -> Result<&IrEdge> {
        self.edges
            .get(id.index())
            .ok_or_else(|| Error::InvalidGraph(format!("Edge {:?} not found", id)))
    }

    /// Get a mutable reference to an edge.
    pub fn edge_mut(&mut self, id: IrEdgeId) -> Result<&mut IrEdge> {
        self.edges
            .get_mut(id.index())
            .ok_or_else(|| Error::InvalidGraph(format!("Edge {:?} not found", id)))
    }

    /// Look up an edge by name.
    pub fn edge_by_name(&self, name: &str) -> Option<IrEdgeId> {
        self.edge_by_name.get(name).copied()
    }

    /// Get the node that produces an edge, if any.
    pub fn edge_producer(&self, id: IrEdgeId) -> Option<IrNodeId> {
        self.edge_producer.get(&id).copied()
    }

    /// Get the operator kind of the node producing an edge, if any.
    pub fn producer_kind(&self, id: IrEdgeId) -> Option<OpKind> {
        self.edge_producer(id)
            .and_then(|producer| self.graph.node_weight(producer))
            .and_then(IrNode::kind)
    }

    /// Get the nodes that consume an edge (one entry per consuming input slot).
    pub fn edge_consumers(&self, id: IrEdgeId) -> Vec<IrNodeId> {
        self.edge_consumers.get(&id).cloned().unwrap_or_default()
    }

    /// Check whether an edge is a graph input.
    pub fn is_graph_input(&self, id: IrEdgeId) -> bool {
        self.inputs.contains(&id)
    }

    /// Check whether an edge is a graph output.
    pub fn is_graph_output(&self, id: IrEdgeId) -> bool {
        self.outputs.contains(&id)
    }

    // ── Graph mutation ──

    /// Add a new node to the graph and return its ID.
    ///
    /// This also updates the producer/consumer lookup tables and
    /// adds petgraph edges for topological ordering.
    pub fn add_node(&mut self, mut node: IrNode) -> IrNodeId {
        let inputs = node.inputs.clone();
        let outputs = node.outputs.clone();
        let node_id = self.graph.add_node(IrNode::new(String::new()));
        node.node_index = node_id;

        for output_id in outputs {
            self.edge_producer.insert(output_id, node_id);
        }

        for input_id in inputs {
            self.edge_consumers
                .entry(input_id)
                .or_default()
                .push(node_id);

            if let Some(&producer_id) = self.edge_producer.get(&input_id) {
                self.graph.add_edge(producer_id, node_id, ());
            }
        }

        if let Some(slot) = self.graph.node_weight_mut(node_id) {
            *slot = node;
        }

        node_id
    }

    /// Remove a node from the graph.
    ///
    /// This also removes the node from producer/consumer lookup tables. With
    /// `StableGraph`, other node indices remain valid.
    pub fn remove_node(&mut self, id: IrNodeId) -> Result<()> {
        let node = self.node(id)?.clone();

        for output_id in &node.outputs {
            self.edge_producer.remove(output_id);
        }

        for input_id in &node.inputs {
            if let Some(consumers) = self.edge_consumers.get_mut(input_id) {
                consumers.retain(|&c| c != id);
            }
        }

        self.graph.remove_node(id);

        Ok(())
    }

    /// Add an edge (tensor) to the graph and return its ID.
    pub fn add_edge(&mut self, edge: IrEdge) -> IrEdgeId {
        let id = IrEdgeId::new(self.edges.len());
        self.edge_by_name.insert(edge.name.clone(), id);
        self.edges.push(edge);
        id
    }

    /// Produce an edge name that is not yet used in the graph.
    pub fn unique_edge_name(&self, hint: &str) -> String {
        if !self.edge_by_name.contains_key(hint) {
            return hint.to_string();
        }
        let mut suffix = self.edges.len();
        loop {
            let candidate = format!("{hint}_{suffix}");
            if !self.edge_by_name.contains_key(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }

    /// Materialize a 1-D `I64` constant and return its edge.
    ///
    /// The edge has no producer; consumers see the value through
    /// `IrEdge::constant_value`.
    pub fn add_constant_i64(&mut self, name_hint: &str, values: Vec<i64>) -> IrEdgeId {
        let name = self.unique_edge_name(name_hint);
        let value = TensorValue::i64_vector(values);
        let shape = TensorShape::Static(value.shape.clone());
        self.add_edge(IrEdge::with_constant(name, DataType::I64, shape, value))
    }

    /// Redirect every consumer of `old` to read `new` instead.
    ///
    /// Consumer identity and input slot order are preserved. Graph output
    /// entries pointing at `old` are rewritten as well; in that case the two
    /// edges swap names so the graph-facing name survives the rewrite, unless
    /// `new` is itself a graph input or output whose name must not change.
    pub fn replace_output(&mut self, old: IrEdgeId, new: IrEdgeId) -> Result<()> {
        self.edge(old)?;
        self.edge(new)?;
        if old == new {
            return Ok(());
        }

        let consumers = self.edge_consumers.remove(&old).unwrap_or_default();
        let mut seen = HashSet::new();
        for consumer_id in consumers {
            self.edge_consumers
                .entry(new)
                .or_default()
                .push(consumer_id);
            if !seen.insert(consumer_id) {
                continue;
            }
            let node = self.node_mut(consumer_id)?;
            for input in node.inputs.iter_mut().filter(|input| **input == old) {
                *input = new;
            }
            self.rebuild_ordering_edges(consumer_id)?;
        }

        if self.is_graph_output(old) {
            if !self.is_graph_input(new) && !self.is_graph_output(new) {
                self.swap_edge_names(old, new)?;
            }
            for output in self.outputs.iter_mut().filter(|output| **output == old) {
                *output = new;
            }
        }

        Ok(())
    }

    /// Re-derive the petgraph ordering edges feeding a node from its inputs.
    fn rebuild_ordering_edges(&mut self, id: IrNodeId) -> Result<()> {
        let stale: Vec<_> = self
            .graph
            .edges_directed(id, Direction::Incoming)
            .map(|edge| edge.id())
            .collect();
        for edge in stale {
            self.graph.remove_edge(edge);
        }

        let inputs = self.node(id)?.inputs.clone();
        for input in inputs {
            if let Some(&producer_id) = self.edge_producer.get(&input) {
                self.graph.add_edge(producer_id, id, ());
            }
        }
        Ok(())
    }

    fn swap_edge_names(&mut self, a: IrEdgeId, b: IrEdgeId) -> Result<()> {
        let name_a = self.edge(a)?.name.clone();
        let name_b = self.edge(b)?.name.clone();
        self.edge_mut(a)?.name = name_b.clone();
        self.edge_mut(b)?.name = name_a.clone();
        self.edge_by_name.insert(name_a, b);
        self.edge_by_name.insert(name_b, a);
        Ok(())
    }

    /// Check whether a node's results are unused.
    ///
    /// A node is dead when it has at least one output and none of its outputs
    /// are consumed or exported as graph outputs. Output-less nodes are kept.
    pub fn is_dead(&self, id: IrNodeId) -> Result<bool> {
        let node = self.node(id)?;
        Ok(!node.outputs.is_empty()
            && node.outputs.iter().all(|output| {
                self.edge_consumers
                    .get(output)
                    .is_none_or(|consumers| consumers.is_empty())
                    && !self.is_graph_output(*output)
            }))
    }

    /// Remove a node if it is dead, then any producers that became dead.
    ///
    /// Returns the number of nodes removed.
    pub fn remove_if_dead(&mut self, id: IrNodeId) -> Result<usize> {
        let mut removed = 0;
        let mut worklist = vec![id];

        while let Some(candidate) = worklist.pop() {
            if !self.contains_node(candidate) || !self.is_dead(candidate)? {
                continue;
            }
            let producers: Vec<IrNodeId> = self
                .node(candidate)?
                .inputs
                .iter()
                .filter_map(|input| self.edge_producer(*input))
                .collect();
            self.remove_node(candidate)?;
            removed += 1;
            worklist.extend(producers);
        }

        Ok(removed)
    }

    // ── Graph queries ──

    /// Get the topological order of nodes in the graph.
    ///
    /// Returns nodes in an order such that all inputs to a node are produced
    /// before the node itself.
    pub fn topological_order(&self) -> Vec<IrNodeId> {
        let mut topo = Topo::new(&self.graph);
        let mut order = Vec::new();

        while let Some(id) = topo.next(&self.graph) {
            if self.graph.node_weight(id).is_some() {
                order.push(id);
            }
        }

        order
    }

    /// Get the number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get the number of edges (tensors) in the graph.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

impl Default for IrGraph {
    fn default() -> Self {
        Self::new()
    }
}

// ──────────────────────────────── IrNode ─────────────────────────────────

/// A node in the IR graph: one operator application.
#[derive(Debug, Clone)]
pub struct IrNode {
    /// Node name (may be empty).
    pub name: String,

    /// Operator type (e.g., "Reshape", "Squeeze").
    pub op_type: String,

    /// Operator attributes (e.g., reduction axes, target type).
    pub attributes: HashMap<String, AttributeValue>,

    /// Input edge IDs.
    pub inputs: Vec<IrEdgeId>,

    /// Output edge IDs.
    pub outputs: Vec<IrEdgeId>,

    /// The graph node index (for efficient graph traversal).
    pub node_index: IrNodeId,
}

impl IrNode {
    /// Create a new operator node.
    pub fn new(op_type: String) -> Self {
        Self {
            name: String::new(),
            op_type,
            attributes: HashMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            node_index: NodeIndex::default(),
        }
    }

    /// Create a node for a known operator kind.
    pub fn of_kind(kind: OpKind) -> Self {
        Self::new(kind.op_type())
    }

    /// Get the operator type.
    pub fn op_type(&self) -> &str {
        &self.op_type
    }

    /// Get the operator kind, if the operator type is recognized.
    pub fn kind(&self) -> Option<OpKind> {
        OpKind::parse(&self.op_type)
    }

    /// Get input edge IDs.
    pub fn inputs(&self) -> &[IrEdgeId] {
        &self.inputs
    }

    /// Get output edge IDs.
    pub fn outputs(&self) -> &[IrEdgeId] {
        &self.outputs
    }

    /// Add an input edge.
    pub fn add_input(&mut self, edge_id: IrEdgeId) {
        self.inputs.push(edge_id);
    }

    /// Add an output edge.
    pub fn add_output(&mut self, edge_id: IrEdgeId) {
        self.outputs.push(edge_id);
    }

    /// Set an attribute.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.attributes.insert(key.into(), value);
    }

    /// Get an attribute.
    pub fn get_attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Get a typed attribute.
    pub fn attr<T>(&self, key: &str) -> Result<T>
    where
        T: TryFrom<AttributeValue, Error = String>,
    {
        let value = self
            .get_attribute(key)
            .ok_or_else(|| Error::Attribute(format!("Missing attribute '{key}'")))?;
        T::try_from(value.clone())
            .map_err(|e| Error::Attribute(format!("Attribute '{key}' on {}: {e}", self.op_type)))
    }
}

// ──────────────────────────────── EdgeData ───────────────────────────────

/// What compile-time data an edge carries.
#[derive(Debug, Clone)]
pub enum EdgeData {
    /// No compile-time data; value arrives at runtime.
    Runtime,

    /// Fully evaluated compile-time constant.
    Constant(TensorValue),
}

// ──────────────────────────────── IrEdge ─────────────────────────────────

/// An edge (tensor value) in the IR graph.
#[derive(Debug, Clone)]
pub struct IrEdge {
    /// Tensor name (unique within the graph).
    pub name: String,

    /// Data type.
    pub dtype: DataType,

    /// Shape (static, symbolic, or unknown).
    pub shape: TensorShape,

    /// Compile-time data carried by this edge.
    pub data: EdgeData,
}

impl IrEdge {
    /// Create a new runtime edge (no compile-time data).
    pub fn new(name: String, dtype: DataType, shape: TensorShape) -> Self {
        Self {
            name,
            dtype,
            shape,
            data: EdgeData::Runtime,
        }
    }

    /// Create a new edge with a known constant value.
    pub fn with_constant(
        name: String,
        dtype: DataType,
        shape: TensorShape,
        value: TensorValue,
    ) -> Self {
        Self {
            name,
            dtype,
            shape,
            data: EdgeData::Constant(value),
        }
    }

    /// Check if this edge holds a constant value.
    pub fn is_constant(&self) -> bool {
        matches!(self.data, EdgeData::Constant(_))
    }

    /// Get the constant value, if this edge holds one.
    pub fn constant_value(&self) -> Option<&TensorValue> {
        match &self.data {
            EdgeData::Constant(value) => Some(value),
            EdgeData::Runtime => None,
        }
    }

    /// Get the constant value as an integer list, if this edge holds one.
    pub fn constant_i64s(&self) -> Option<Vec<i64>> {
        self.constant_value().and_then(TensorValue::to_i64_vec)
    }
}
