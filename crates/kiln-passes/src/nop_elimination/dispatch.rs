//! Operator kind to eliminator mapping.

use super::eliminators::{self, EliminationCtx};
use kiln_core::{OpKind, Result};
use std::collections::HashMap;

/// Signature shared by every eliminator.
pub type EliminateFn = fn(&mut EliminationCtx<'_>) -> Result<bool>;

/// Maps operator kinds to the rule that tries to eliminate them.
///
/// Kinds without an entry are never touched by the pass.
///
/// # Example
///
/// ```ignore
/// let mut table = EliminatorTable::new();
/// table.register(OpKind::StopGradient, eliminators::eliminate_stop_gradient);
///
/// let eliminate = table.get(OpKind::StopGradient).unwrap();
/// ```
pub struct EliminatorTable {
    eliminators: HashMap<OpKind, EliminateFn>,
}

impl EliminatorTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            eliminators: HashMap::new(),
        }
    }

    /// The table covering every kind the pass knows how to eliminate.
    pub fn standard() -> Self {
        let mut table = Self::new();
        table
            .register(OpKind::Pad, eliminators::eliminate_nop)
            .register(OpKind::Slice, eliminators::eliminate_nop)
            .register(OpKind::Broadcast, eliminators::eliminate_nop)
            .register(OpKind::Sum, eliminators::eliminate_sum)
            .register(OpKind::Convert, eliminators::eliminate_convert)
            .register(OpKind::Concat, eliminators::eliminate_concat)
            .register(OpKind::Reshape, eliminators::eliminate_reshape)
            .register(OpKind::Squeeze, eliminators::eliminate_squeeze)
            .register(OpKind::Unsqueeze, eliminators::eliminate_unsqueeze)
            .register(OpKind::StopGradient, eliminators::eliminate_stop_gradient);
        table
    }

    /// Register an eliminator, replacing any previous entry for `kind`.
    pub fn register(&mut self, kind: OpKind, eliminate: EliminateFn) -> &mut Self {
        self.eliminators.insert(kind, eliminate);
        self
    }

    /// Look up the eliminator for a kind.
    pub fn get(&self, kind: OpKind) -> Option<EliminateFn> {
        self.eliminators.get(&kind).copied()
    }

    /// Check whether `kind` has an eliminator.
    pub fn contains(&self, kind: OpKind) -> bool {
        self.eliminators.contains_key(&kind)
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.eliminators.len()
    }

    /// Check whether no kind is registered.
    pub fn is_empty(&self) -> bool {
        self.eliminators.is_empty()
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<OpKind> {
        let mut kinds: Vec<_> = self.eliminators.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

impl Default for EliminatorTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table() {
        let table = EliminatorTable::standard();
        assert_eq!(table.len(), 10);
        assert_eq!(
            table.kinds(),
            vec![
                OpKind::Pad,
                OpKind::Slice,
                OpKind::Broadcast,
                OpKind::Sum,
                OpKind::Convert,
                OpKind::Concat,
                OpKind::Reshape,
                OpKind::Squeeze,
                OpKind::Unsqueeze,
                OpKind::StopGradient,
            ]
        );
        assert!(!table.contains(OpKind::NonZero));
        assert!(table.get(OpKind::NonZero).is_none());
    }

    #[test]
    fn test_register_replaces() {
        fn never(_: &mut EliminationCtx<'_>) -> Result<bool> {
            Ok(false)
        }

        let mut table = EliminatorTable::new();
        assert!(table.is_empty());
        table.register(OpKind::Concat, eliminators::eliminate_concat);
        table.register(OpKind::Concat, never);
        assert_eq!(table.len(), 1);
        assert!(table.get(OpKind::Concat).is_some());
    }
}
