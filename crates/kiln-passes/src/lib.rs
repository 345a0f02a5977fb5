//! Graph rewriting passes for kiln.
//!
//! Each pass implements `kiln_core::Pass` and runs once over a graph
//! snapshot, reporting whether it changed anything. Scheduling passes and
//! iterating them to a fixed point is the caller's job.

pub mod nop_elimination;

pub use nop_elimination::{NopEliminationConfig, NopEliminationPass};
