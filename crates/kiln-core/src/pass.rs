//! Graph pass trait.

use crate::Result;
use crate::ir::IrGraph;

/// A rewrite over an `IrGraph`.
///
/// A pass is a single graph transformation. Deciding which passes run, in
/// what order, and how often is left to the caller.
///
/// # Return Value
///
/// The `run()` method returns `Ok(true)` if the pass made changes to the
/// graph, or `Ok(false)` if no changes were made. This allows a driver to
/// detect when the graph reaches a fixed point and stop re-running passes.
///
/// # Example
///
/// ```ignore
/// struct DropIdentity;
///
/// impl Pass for DropIdentity {
///     fn name(&self) -> &str {
///         "drop_identity"
///     }
///
///     fn run(&self, graph: &mut IrGraph) -> Result<bool> {
///         let identities: Vec<_> = graph
///             .nodes()
///             .filter(|(_, node)| node.op_type == "Identity")
///             .map(|(id, _)| id)
///             .collect();
///         for &id in &identities {
///             let (input, output) = (graph.node_input(id, 0)?, graph.node_output(id, 0)?);
///             graph.replace_output(output, input)?;
///             graph.remove_if_dead(id)?;
///         }
///         Ok(!identities.is_empty())
///     }
/// }
/// ```
pub trait Pass: Send + Sync {
    /// Stable name used in log spans.
    fn name(&self) -> &str;

    /// Run the pass on the given graph.
    ///
    /// * `Ok(true)` if the pass made changes to the graph.
    /// * `Ok(false)` if no changes were made.
    /// * `Err(_)` if the graph was found to be inconsistent.
    fn run(&self, graph: &mut IrGraph) -> Result<bool>;
}
