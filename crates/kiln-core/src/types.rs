//! Core types for tensor shapes, values, and attributes.

use std::fmt;

/// Element types a tensor edge can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    F32,
    F16,
    I32,
    I64,
    U8,
    U32,
    Bool,
}

/// A single dimension in a partially known shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// Dimension known at compile time.
    Fixed(usize),

    /// Named symbolic dimension (e.g., "batch", "sequence").
    Named(String),
}

impl Dimension {
    /// Get the fixed extent if available.
    pub fn as_fixed(&self) -> Option<usize> {
        match self {
            Dimension::Fixed(n) => Some(*n),
            Dimension::Named(_) => None,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Fixed(n) => write!(f, "{n}"),
            Dimension::Named(name) => write!(f, "{name}"),
        }
    }
}

/// Tensor shape with support for static, symbolic, and unknown shapes.
///
/// Only `Static` shapes are usable for equality-based rewrites. `Symbolic`
/// shapes have a known rank but at least one extent that may be unknown, and
/// `Unknown` shapes have no known rank at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TensorShape {
    /// All dimensions are known at compile time.
    Static(Vec<usize>),

    /// Known rank, mix of fixed and named dimensions.
    Symbolic(Vec<Dimension>),

    /// Rank is not known.
    Unknown,
}

impl TensorShape {
    /// Build a shape from dimensions, collapsing to `Static` when every
    /// dimension is fixed.
    pub fn from_dims(dims: Vec<Dimension>) -> Self {
        if dims.iter().all(|d| d.as_fixed().is_some()) {
            TensorShape::Static(dims.iter().filter_map(Dimension::as_fixed).collect())
        } else {
            TensorShape::Symbolic(dims)
        }
    }

    /// Check if the shape is fully static.
    pub fn is_static(&self) -> bool {
        matches!(self, TensorShape::Static(_))
    }

    /// Check if any part of the shape (rank or an extent) is unknown.
    pub fn is_dynamic(&self) -> bool {
        !self.is_static()
    }

    /// Get static dimensions if available.
    pub fn as_static(&self) -> Option<&[usize]> {
        match self {
            TensorShape::Static(dims) => Some(dims),
            _ => None,
        }
    }

    /// Number of dimensions, if known.
    pub fn ndim(&self) -> Option<usize> {
        match self {
            TensorShape::Static(dims) => Some(dims.len()),
            TensorShape::Symbolic(dims) => Some(dims.len()),
            TensorShape::Unknown => None,
        }
    }

    /// Dimensions as a list of `Dimension`s, if the rank is known.
    pub fn dims(&self) -> Option<Vec<Dimension>> {
        match self {
            TensorShape::Static(dims) => Some(dims.iter().map(|&d| Dimension::Fixed(d)).collect()),
            TensorShape::Symbolic(dims) => Some(dims.clone()),
            TensorShape::Unknown => None,
        }
    }

    /// Check whether two partial shapes describe the same scheme.
    ///
    /// Two rank-unknown shapes match. Otherwise the ranks must agree and each
    /// pair of dimensions must be either equal fixed extents or the same
    /// named symbol.
    pub fn same_scheme(&self, other: &TensorShape) -> bool {
        match (self.dims(), other.dims()) {
            (None, None) => true,
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dims() {
            Some(dims) => {
                let parts: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            None => write!(f, "[?]"),
        }
    }
}

/// Raw tensor data for compile-time constants.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    I64(Vec<i64>),
    I32(Vec<i32>),
    F32(Vec<f32>),
    Bool(Vec<bool>),
    U8(Vec<u8>),
}

impl TensorData {
    /// Get the number of elements in this tensor data.
    pub fn len(&self) -> usize {
        match self {
            TensorData::I64(v) => v.len(),
            TensorData::I32(v) => v.len(),
            TensorData::F32(v) => v.len(),
            TensorData::Bool(v) => v.len(),
            TensorData::U8(v) => v.len(),
        }
    }

    /// Check if this tensor data is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the inferred data type from this tensor data.
    pub fn dtype(&self) -> DataType {
        match self {
            TensorData::I64(_) => DataType::I64,
            TensorData::I32(_) => DataType::I32,
            TensorData::F32(_) => DataType::F32,
            TensorData::Bool(_) => DataType::Bool,
            TensorData::U8(_) => DataType::U8,
        }
    }
}

/// A tensor value known at compile time.
///
/// Only small tensors are stored here (axis lists, target shapes).
#[derive(Debug, Clone, PartialEq)]
pub struct TensorValue {
    /// The raw tensor data.
    pub data: TensorData,

    /// The shape of the tensor (dimensions).
    pub shape: Vec<usize>,

    /// The data type of the tensor.
    pub dtype: DataType,
}

impl TensorValue {
    /// Create a new TensorValue with data, shape, and dtype.
    ///
    /// # Panics
    ///
    /// Panics if the data length doesn't match the shape product.
    pub fn new(data: TensorData, shape: Vec<usize>, dtype: DataType) -> Self {
        let expected_len: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            expected_len,
            "Data length {} doesn't match shape {:?} (product = {})",
            data.len(),
            shape,
            expected_len
        );
        assert_eq!(
            data.dtype(),
            dtype,
            "Data type {:?} doesn't match declared dtype {:?}",
            data.dtype(),
            dtype
        );
        Self { data, shape, dtype }
    }

    /// Create a 1-D `I64` vector value.
    pub fn i64_vector(values: Vec<i64>) -> Self {
        let len = values.len();
        Self::new(TensorData::I64(values), vec![len], DataType::I64)
    }

    /// Get the number of elements in this tensor value.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if this tensor value is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read the value as a list of integers, widening `I32` data.
    ///
    /// Returns `None` for non-integer data.
    pub fn to_i64_vec(&self) -> Option<Vec<i64>> {
        match &self.data {
            TensorData::I64(v) => Some(v.clone()),
            TensorData::I32(v) => Some(v.iter().map(|&x| x as i64).collect()),
            _ => None,
        }
    }
}

/// Attribute value types carried on nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Int(i64),
    Ints(Vec<i64>),
    DataType(DataType),
}

impl TryFrom<AttributeValue> for i64 {
    type Error = String;

    fn try_from(value: AttributeValue) -> std::result::Result<Self, Self::Error> {
        match value {
            AttributeValue::Int(v) => Ok(v),
            _ => Err("Not an int".to_string()),
        }
    }
}

impl TryFrom<AttributeValue> for Vec<i64> {
    type Error = String;

    fn try_from(value: AttributeValue) -> std::result::Result<Self, Self::Error> {
        match value {
            AttributeValue::Ints(v) => Ok(v),
            _ => Err("Not an int array".to_string()),
        }
    }
}

impl TryFrom<AttributeValue> for DataType {
    type Error = String;

    fn try_from(value: AttributeValue) -> std::result::Result<Self, Self::Error> {
        match value {
            AttributeValue::DataType(v) => Ok(v),
            _ => Err("Not a data type".to_string()),
        }
    }
}
