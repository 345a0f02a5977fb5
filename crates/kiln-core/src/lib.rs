//! Core intermediate representation and pass abstractions for kiln.
//!
//! This crate provides the foundations the optimization passes build on:
//! - Graph-based IR (`IrGraph`, `IrNode`, `IrEdge`) with the rewiring
//!   primitive `IrGraph::replace_output`
//! - Tensor shape and value types, including partially dynamic shapes
//! - `OpKind`, the operator kinds passes dispatch on
//! - Shape inference for rank-changing operators
//! - The `Pass` trait

pub mod ir;
pub mod ir_builder;
pub mod op;
pub mod pass;
pub mod shape_inference;
pub mod types;

pub use ir::{EdgeData, IrEdge, IrEdgeId, IrGraph, IrNode, IrNodeId};
pub use ir_builder::GraphBuilder;
pub use op::OpKind;
pub use pass::Pass;
pub use types::{AttributeValue, DataType, Dimension, TensorData, TensorShape, TensorValue};

/// Result type using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for kiln-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid graph structure: {0}")]
    InvalidGraph(String),

    #[error("Attribute error: {0}")]
    Attribute(String),
}
