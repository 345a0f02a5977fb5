//! Operator kinds recognized by the optimizer.

use std::str::FromStr;

/// The closed set of operator kinds that passes match on.
///
/// Nodes carry their operator as an `op_type` string; `OpKind::parse` maps
/// it onto this enum. Unrecognized operator types have no kind and are left
/// alone by kind-keyed passes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::EnumString, strum::Display,
)]
pub enum OpKind {
    Pad,
    Slice,
    #[strum(to_string = "Broadcast", serialize = "Expand")]
    Broadcast,
    Sum,
    #[strum(to_string = "Convert", serialize = "Cast")]
    Convert,
    Concat,
    Reshape,
    Squeeze,
    Unsqueeze,
    StopGradient,
    NonZero,
}

impl OpKind {
    /// Parse an `op_type` string, returning `None` for unknown operators.
    pub fn parse(op_type: &str) -> Option<Self> {
        OpKind::from_str(op_type).ok()
    }

    /// Canonical `op_type` string for nodes created by passes.
    pub fn op_type(&self) -> String {
        self.to_string()
    }
}
