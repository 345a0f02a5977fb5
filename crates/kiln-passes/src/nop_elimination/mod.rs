//! No-op elimination.
//!
//! Removes operators that provably do not change their input: identity Pad,
//! Slice, Broadcast and Reshape, empty-axis Sum, redundant Convert,
//! single-input Concat, cancelling Squeeze/Unsqueeze pairs and StopGradient.
//! Chains of shape-only operators are fused into a single Reshape where that
//! is cheaper than keeping them.
//!
//! A rewrite never deletes the eliminated node directly. Its consumers are
//! redirected to an equivalent value with `IrGraph::replace_output`, after
//! which the driver removes whatever became unreachable. The producer of the
//! replacement value is then revisited in the same run: it may be a node the
//! rewrite just built, or one whose consumers have changed.

pub mod axes;
pub mod dispatch;
pub mod eliminators;

pub use dispatch::{EliminateFn, EliminatorTable};
pub use eliminators::EliminationCtx;

use kiln_core::{IrGraph, IrNodeId, OpKind, Pass, Result};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, trace};

/// Tuning knobs for `NopEliminationPass`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NopEliminationConfig {
    /// Operators whose result does not depend on the element type of their
    /// input. A Convert feeding only one of these is dropped.
    pub type_agnostic_consumers: HashSet<OpKind>,

    /// Operator kinds the pass leaves alone.
    pub disabled: HashSet<OpKind>,
}

impl Default for NopEliminationConfig {
    fn default() -> Self {
        Self {
            type_agnostic_consumers: HashSet::from([OpKind::NonZero]),
            disabled: HashSet::new(),
        }
    }
}

/// Graph pass removing operators that do not affect forward values.
pub struct NopEliminationPass {
    config: NopEliminationConfig,
    table: EliminatorTable,
}

impl NopEliminationPass {
    pub fn new() -> Self {
        Self::with_config(NopEliminationConfig::default())
    }

    pub fn with_config(config: NopEliminationConfig) -> Self {
        Self {
            config,
            table: EliminatorTable::standard(),
        }
    }

    pub fn config(&self) -> &NopEliminationConfig {
        &self.config
    }
}

impl Default for NopEliminationPass {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for NopEliminationPass {
    fn name(&self) -> &str {
        "nop_elimination"
    }

    #[tracing::instrument(skip_all, fields(num_nodes = graph.node_count()))]
    fn run(&self, graph: &mut IrGraph) -> Result<bool> {
        let mut changed = false;
        let mut eliminated = 0usize;
        let mut removed = 0usize;

        // Every rewrite removes its candidate, so revisits are bounded.
        let mut worklist: VecDeque<IrNodeId> = graph.topological_order().into();
        while let Some(node_id) = worklist.pop_front() {
            if !graph.contains_node(node_id) {
                continue;
            }

            let Some(kind) = graph.node(node_id)?.kind() else {
                continue;
            };
            if self.config.disabled.contains(&kind) {
                trace!(%kind, "kind disabled, skipping");
                continue;
            }
            let Some(eliminate) = self.table.get(kind) else {
                continue;
            };

            let mut ctx = EliminationCtx::new(graph, node_id, &self.config);
            if !eliminate(&mut ctx)? {
                continue;
            }
            let replacement = ctx.replacement();

            changed = true;
            eliminated += 1;
            removed += graph.remove_if_dead(node_id)?;

            if let Some(producer) = replacement.and_then(|edge| graph.edge_producer(edge)) {
                worklist.push_front(producer);
            }
        }

        debug!(
            eliminated,
            removed,
            remaining = graph.node_count(),
            "nop elimination finished"
        );
        Ok(changed)
    }
}
