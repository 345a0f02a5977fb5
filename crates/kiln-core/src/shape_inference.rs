//! Output shape inference for rank-changing operators.
//!
//! Passes that build replacement nodes use these helpers to check that the
//! replacement produces exactly the shape the replaced node promised. All
//! functions work on partially dynamic shapes and return `None` when the
//! result cannot be determined (unknown rank, out-of-range or repeated axes,
//! squeezing a dimension that is not 1).

use crate::types::{Dimension, TensorShape};
use std::collections::BTreeSet;
use tracing::trace;

/// Normalize possibly negative axes against `rank`.
///
/// Returns `None` if any axis is out of range or an axis repeats.
pub fn normalize_axes(axes: &[i64], rank: usize) -> Option<Vec<usize>> {
    let rank = rank as i64;
    let mut seen = BTreeSet::new();
    let mut normalized = Vec::with_capacity(axes.len());
    for &axis in axes {
        let pos = if axis < 0 { axis + rank } else { axis };
        if pos < 0 || pos >= rank || !seen.insert(pos) {
            return None;
        }
        normalized.push(pos as usize);
    }
    Some(normalized)
}

/// Infer the Squeeze output shape: removes the listed axes from `input`.
///
/// An empty axis list removes every fixed dimension of extent 1; in that case
/// a named dimension makes the output rank unknowable.
pub fn squeeze_shape(input: &TensorShape, axes: &[i64]) -> Option<TensorShape> {
    let dims = input.dims()?;

    if axes.is_empty() {
        if dims.iter().any(|d| d.as_fixed().is_none()) {
            trace!(%input, "Cannot infer Squeeze output - implicit axes over symbolic dims");
            return None;
        }
        let kept = dims
            .into_iter()
            .filter(|d| *d != Dimension::Fixed(1))
            .collect();
        return Some(TensorShape::from_dims(kept));
    }

    let axes: BTreeSet<usize> = normalize_axes(axes, dims.len())?.into_iter().collect();
    let mut result = Vec::with_capacity(dims.len() - axes.len());
    for (i, dim) in dims.into_iter().enumerate() {
        if !axes.contains(&i) {
            result.push(dim);
            continue;
        }
        if let Dimension::Fixed(extent) = dim {
            if extent != 1 {
                trace!(axis = i, extent, "Cannot squeeze a dimension that is not 1");
                return None;
            }
        }
    }

    Some(TensorShape::from_dims(result))
}

/// Infer the Unsqueeze output shape: inserts unit dimensions at `axes`.
///
/// Axes refer to positions in the output, so negative axes are normalized
/// against the output rank.
pub fn unsqueeze_shape(input: &TensorShape, axes: &[i64]) -> Option<TensorShape> {
    let dims = input.dims()?;
    let out_rank = dims.len() + axes.len();
    let axes: BTreeSet<usize> = normalize_axes(axes, out_rank)?.into_iter().collect();

    let mut source = dims.into_iter();
    let mut result = Vec::with_capacity(out_rank);
    for i in 0..out_rank {
        if axes.contains(&i) {
            result.push(Dimension::Fixed(1));
        } else {
            result.push(source.next()?);
        }
    }

    Some(TensorShape::from_dims(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> Dimension {
        Dimension::Named(name.to_string())
    }

    #[test]
    fn test_normalize_axes() {
        assert_eq!(normalize_axes(&[0, -1], 3), Some(vec![0, 2]));
        assert_eq!(normalize_axes(&[3], 3), None);
        assert_eq!(normalize_axes(&[-4], 3), None);
        assert_eq!(normalize_axes(&[1, -2], 3), None);
    }

    #[test]
    fn test_squeeze_static() {
        let input = TensorShape::Static(vec![1, 2, 1, 3]);
        assert_eq!(
            squeeze_shape(&input, &[0, 2]),
            Some(TensorShape::Static(vec![2, 3]))
        );
        assert_eq!(
            squeeze_shape(&input, &[-2]),
            Some(TensorShape::Static(vec![1, 2, 3]))
        );
        assert_eq!(squeeze_shape(&input, &[1]), None);
    }

    #[test]
    fn test_squeeze_implicit_axes() {
        let input = TensorShape::Static(vec![1, 4, 1]);
        assert_eq!(
            squeeze_shape(&input, &[]),
            Some(TensorShape::Static(vec![4]))
        );

        let symbolic = TensorShape::Symbolic(vec![named("n"), Dimension::Fixed(1)]);
        assert_eq!(squeeze_shape(&symbolic, &[]), None);
    }

    #[test]
    fn test_squeeze_symbolic_keeps_scheme() {
        let input = TensorShape::Symbolic(vec![named("n"), Dimension::Fixed(1)]);
        assert_eq!(
            squeeze_shape(&input, &[1]),
            Some(TensorShape::Symbolic(vec![named("n")]))
        );
    }

    #[test]
    fn test_unsqueeze() {
        let input = TensorShape::Static(vec![2, 3]);
        assert_eq!(
            unsqueeze_shape(&input, &[0, 3]),
            Some(TensorShape::Static(vec![1, 2, 3, 1]))
        );
        assert_eq!(
            unsqueeze_shape(&input, &[-1]),
            Some(TensorShape::Static(vec![2, 3, 1]))
        );
        assert_eq!(unsqueeze_shape(&input, &[4]), None);
    }

    #[test]
    fn test_unknown_rank() {
        assert_eq!(squeeze_shape(&TensorShape::Unknown, &[0]), None);
        assert_eq!(unsqueeze_shape(&TensorShape::Unknown, &[0]), None);
    }
}
