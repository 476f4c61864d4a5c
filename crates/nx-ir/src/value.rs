//! Typed values carried by contributions and populated entries
#![allow(clippy::must_use_candidate)] // Small accessors are clear at call sites without #[must_use].
#![allow(clippy::cast_precision_loss)] // Integer-to-float widening is the documented NX_FLOAT behaviour.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single typed value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    /// UTF-8 string
    Str(String),

    /// Signed integer
    Int(i64),

    /// Unsigned integer that does not fit an `i64`
    UInt(u64),

    /// Floating point number
    Float(f64),

    /// Boolean flag
    Bool(bool),
}

/// Homogeneous, flattened array storage (row-major)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrayData {
    Str(Vec<String>),
    Int(Vec<i64>),
    UInt(Vec<u64>),
    Float(Vec<f64>),
    Bool(Vec<bool>),
}

/// A value that can be written as a dataset or attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Scalar value
    Scalar(Scalar),

    /// N-dimensional array with its shape
    Array { data: ArrayData, shape: Vec<usize> },
}

/// Element type of a stored dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Utf8,
    Int64,
    UInt64,
    Float64,
    Bool,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Utf8 => "utf8",
            DataType::Int64 => "int64",
            DataType::UInt64 => "uint64",
            DataType::Float64 => "float64",
            DataType::Bool => "bool",
        };
        f.write_str(name)
    }
}

impl Scalar {
    /// Natural element type of this scalar
    pub fn dtype(&self) -> DataType {
        match self {
            Scalar::Str(_) => DataType::Utf8,
            Scalar::Int(_) => DataType::Int64,
            Scalar::UInt(_) => DataType::UInt64,
            Scalar::Float(_) => DataType::Float64,
            Scalar::Bool(_) => DataType::Bool,
        }
    }

    /// Whether the scalar is numeric
    pub fn is_numeric(&self) -> bool {
        matches!(self, Scalar::Int(_) | Scalar::UInt(_) | Scalar::Float(_))
    }

    /// Numeric value as `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::UInt(u) => Some(*u as f64),
            Scalar::Float(x) => Some(*x),
            _ => None,
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            Scalar::Str(s) => serde_json::Value::String(s.clone()),
            Scalar::Int(i) => serde_json::Value::from(*i),
            Scalar::UInt(u) => serde_json::Value::from(*u),
            Scalar::Float(x) => serde_json::Number::from_f64(*x).map_or_else(
                || serde_json::Value::String(non_finite_name(*x).to_string()),
                serde_json::Value::Number,
            ),
            Scalar::Bool(b) => serde_json::Value::Bool(*b),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Str(s) => f.write_str(s),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::UInt(u) => write!(f, "{u}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl ArrayData {
    /// Number of stored elements
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Str(v) => v.len(),
            ArrayData::Int(v) => v.len(),
            ArrayData::UInt(v) => v.len(),
            ArrayData::Float(v) => v.len(),
            ArrayData::Bool(v) => v.len(),
        }
    }

    /// Whether the array holds no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Natural element type of the array
    pub fn dtype(&self) -> DataType {
        match self {
            ArrayData::Str(_) => DataType::Utf8,
            ArrayData::Int(_) => DataType::Int64,
            ArrayData::UInt(_) => DataType::UInt64,
            ArrayData::Float(_) => DataType::Float64,
            ArrayData::Bool(_) => DataType::Bool,
        }
    }

    /// Iterate the elements as scalars
    pub fn scalars(&self) -> Vec<Scalar> {
        match self {
            ArrayData::Str(v) => v.iter().cloned().map(Scalar::Str).collect(),
            ArrayData::Int(v) => v.iter().copied().map(Scalar::Int).collect(),
            ArrayData::UInt(v) => v.iter().copied().map(Scalar::UInt).collect(),
            ArrayData::Float(v) => v.iter().copied().map(Scalar::Float).collect(),
            ArrayData::Bool(v) => v.iter().copied().map(Scalar::Bool).collect(),
        }
    }
}

impl Value {
    /// Build a string scalar
    pub fn string(value: impl Into<String>) -> Self {
        Value::Scalar(Scalar::Str(value.into()))
    }

    /// Build a float scalar
    pub fn float(value: f64) -> Self {
        Value::Scalar(Scalar::Float(value))
    }

    /// Build an integer scalar
    pub fn int(value: i64) -> Self {
        Value::Scalar(Scalar::Int(value))
    }

    /// Build a boolean scalar
    pub fn bool(value: bool) -> Self {
        Value::Scalar(Scalar::Bool(value))
    }

    /// Build an array, checking that the shape covers every element
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidShape`] when the product of `shape` differs from
    /// the number of elements.
    pub fn array(data: ArrayData, shape: Vec<usize>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if shape.is_empty() || expected != data.len() {
            return Err(Error::InvalidShape {
                shape,
                reason: format!("expected {expected} elements, found {}", data.len()),
            });
        }
        Ok(Value::Array { data, shape })
    }

    /// Build a one-dimensional array
    pub fn vector(data: ArrayData) -> Self {
        let len = data.len();
        Value::Array {
            data,
            shape: vec![len],
        }
    }

    /// Shape of the value (`[]` for scalars)
    pub fn shape(&self) -> &[usize] {
        match self {
            Value::Scalar(_) => &[],
            Value::Array { shape, .. } => shape,
        }
    }

    /// Natural element type of the value
    pub fn dtype(&self) -> DataType {
        match self {
            Value::Scalar(s) => s.dtype(),
            Value::Array { data, .. } => data.dtype(),
        }
    }

    /// Scalar view of the value, if it is one
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            Value::Array { .. } => None,
        }
    }

    /// All elements of the value as scalars
    pub fn elements(&self) -> Vec<Scalar> {
        match self {
            Value::Scalar(s) => vec![s.clone()],
            Value::Array { data, .. } => data.scalars(),
        }
    }

    /// Convert the value to the requested element type
    ///
    /// Integers widen to floats; unsigned and signed integers convert when
    /// the value fits. Strings never convert.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conversion`] when an element cannot be represented.
    pub fn cast(&self, dtype: DataType) -> Result<Value> {
        if self.dtype() == dtype {
            return Ok(self.clone());
        }
        let converted = self
            .elements()
            .iter()
            .map(|s| cast_scalar(s, dtype))
            .collect::<Result<Vec<_>>>()?;
        match self {
            Value::Scalar(_) => converted
                .into_iter()
                .next()
                .map(Value::Scalar)
                .ok_or_else(|| Error::conversion("cast", "empty scalar")),
            Value::Array { shape, .. } => Ok(Value::Array {
                data: collect_array(converted, dtype)?,
                shape: shape.clone(),
            }),
        }
    }

    /// Convert a JSON document value into a typed value
    ///
    /// Nested arrays must be rectangular and homogeneous; integer and float
    /// elements mix into a float array.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conversion`] for `null`, objects, ragged or mixed
    /// arrays.
    pub fn from_json(json: &serde_json::Value) -> Result<Value> {
        match json {
            serde_json::Value::Array(_) => {
                let mut shape = Vec::new();
                let mut leaves = Vec::new();
                let mut leaf_depth = None;
                flatten_json(json, 0, &mut shape, &mut leaves, &mut leaf_depth)?;
                let dtype = unify_dtype(&leaves)?;
                let data = collect_array(
                    leaves
                        .iter()
                        .map(|s| cast_scalar(s, dtype))
                        .collect::<Result<Vec<_>>>()?,
                    dtype,
                )?;
                Ok(Value::Array { data, shape })
            }
            other => Ok(Value::Scalar(json_scalar(other)?)),
        }
    }

    /// Decode JSON written by [`Value::to_json`] back into `dtype`
    ///
    /// Unlike [`Value::from_json`] the element type is known, so the
    /// `"NaN"`, `"Infinity"` and `"-Infinity"` spellings of non-finite
    /// floats are restored and integers are not widened by guesswork.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conversion`] when an element does not fit `dtype`.
    pub fn from_json_as(json: &serde_json::Value, dtype: DataType) -> Result<Value> {
        let decode = |leaf: Scalar| match (leaf, dtype) {
            (Scalar::Str(s), DataType::Float64) => parse_non_finite(&s)
                .map(Scalar::Float)
                .ok_or_else(|| Error::conversion("json", format!("'{s}' is not a float"))),
            (leaf, dtype) => cast_scalar(&leaf, dtype),
        };
        match json {
            serde_json::Value::Array(_) => {
                let mut shape = Vec::new();
                let mut leaves = Vec::new();
                let mut leaf_depth = None;
                flatten_json(json, 0, &mut shape, &mut leaves, &mut leaf_depth)?;
                let data = collect_array(
                    leaves.into_iter().map(decode).collect::<Result<Vec<_>>>()?,
                    dtype,
                )?;
                Ok(Value::Array { data, shape })
            }
            other => Ok(Value::Scalar(decode(json_scalar(other)?)?)),
        }
    }

    /// Render the value as JSON, nesting arrays by shape
    ///
    /// Non-finite floats have no JSON number form and are written as the
    /// strings `"NaN"`, `"Infinity"` and `"-Infinity"`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Scalar(s) => s.to_json(),
            Value::Array { data, shape } => {
                let flat: Vec<serde_json::Value> =
                    data.scalars().iter().map(Scalar::to_json).collect();
                nest_json(&flat, shape)
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(s) => write!(f, "{s}"),
            Value::Array { data, shape } => {
                write!(f, "{} array {:?}", data.dtype(), shape)
            }
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::float(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::string(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::string(value)
    }
}

fn non_finite_name(x: f64) -> &'static str {
    if x.is_nan() {
        "NaN"
    } else if x.is_sign_negative() {
        "-Infinity"
    } else {
        "Infinity"
    }
}

fn parse_non_finite(text: &str) -> Option<f64> {
    match text {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

fn cast_scalar(scalar: &Scalar, dtype: DataType) -> Result<Scalar> {
    let fail = || {
        Error::conversion(
            "cast",
            format!("cannot represent '{scalar}' as {dtype}"),
        )
    };
    match (scalar, dtype) {
        (s, d) if s.dtype() == d => Ok(s.clone()),
        (Scalar::Int(i), DataType::Float64) => Ok(Scalar::Float(*i as f64)),
        (Scalar::UInt(u), DataType::Float64) => Ok(Scalar::Float(*u as f64)),
        (Scalar::Int(i), DataType::UInt64) => u64::try_from(*i).map(Scalar::UInt).map_err(|_| fail()),
        (Scalar::UInt(u), DataType::Int64) => i64::try_from(*u).map(Scalar::Int).map_err(|_| fail()),
        _ => Err(fail()),
    }
}

fn collect_array(scalars: Vec<Scalar>, dtype: DataType) -> Result<ArrayData> {
    let mismatch = || Error::conversion("array", format!("mixed element types for {dtype}"));
    Ok(match dtype {
        DataType::Utf8 => ArrayData::Str(
            scalars
                .into_iter()
                .map(|s| match s {
                    Scalar::Str(v) => Ok(v),
                    _ => Err(mismatch()),
                })
                .collect::<Result<_>>()?,
        ),
        DataType::Int64 => ArrayData::Int(
            scalars
                .into_iter()
                .map(|s| match s {
                    Scalar::Int(v) => Ok(v),
                    _ => Err(mismatch()),
                })
                .collect::<Result<_>>()?,
        ),
        DataType::UInt64 => ArrayData::UInt(
            scalars
                .into_iter()
                .map(|s| match s {
                    Scalar::UInt(v) => Ok(v),
                    _ => Err(mismatch()),
                })
                .collect::<Result<_>>()?,
        ),
        DataType::Float64 => ArrayData::Float(
            scalars
                .into_iter()
                .map(|s| match s {
                    Scalar::Float(v) => Ok(v),
                    _ => Err(mismatch()),
                })
                .collect::<Result<_>>()?,
        ),
        DataType::Bool => ArrayData::Bool(
            scalars
                .into_iter()
                .map(|s| match s {
                    Scalar::Bool(v) => Ok(v),
                    _ => Err(mismatch()),
                })
                .collect::<Result<_>>()?,
        ),
    })
}

fn json_scalar(json: &serde_json::Value) -> Result<Scalar> {
    match json {
        serde_json::Value::Bool(b) => Ok(Scalar::Bool(*b)),
        serde_json::Value::String(s) => Ok(Scalar::Str(s.clone())),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Scalar::Int(i))
            } else if let Some(u) = n.as_u64() {
                Ok(Scalar::UInt(u))
            } else {
                n.as_f64()
                    .map(Scalar::Float)
                    .ok_or_else(|| Error::conversion("json", format!("unsupported number {n}")))
            }
        }
        serde_json::Value::Null => Err(Error::conversion("json", "null is not a value")),
        serde_json::Value::Object(_) => {
            Err(Error::conversion("json", "objects cannot be stored as values"))
        }
        serde_json::Value::Array(_) => Err(Error::conversion("json", "unexpected nested array")),
    }
}

fn flatten_json(
    json: &serde_json::Value,
    depth: usize,
    shape: &mut Vec<usize>,
    leaves: &mut Vec<Scalar>,
    leaf_depth: &mut Option<usize>,
) -> Result<()> {
    match json {
        serde_json::Value::Array(items) => {
            if shape.len() == depth {
                shape.push(items.len());
            } else if shape.get(depth) != Some(&items.len()) {
                return Err(Error::conversion(
                    "json",
                    format!("ragged array at depth {depth}"),
                ));
            }
            for item in items {
                flatten_json(item, depth + 1, shape, leaves, leaf_depth)?;
            }
            Ok(())
        }
        leaf => {
            match leaf_depth {
                Some(d) if *d != depth => {
                    return Err(Error::conversion(
                        "json",
                        "array mixes nested lists and values",
                    ));
                }
                _ => *leaf_depth = Some(depth),
            }
            leaves.push(json_scalar(leaf)?);
            Ok(())
        }
    }
}

fn unify_dtype(leaves: &[Scalar]) -> Result<DataType> {
    let Some(first) = leaves.first() else {
        return Ok(DataType::Float64);
    };
    if leaves.iter().all(|s| matches!(s, Scalar::Str(_))) {
        return Ok(DataType::Utf8);
    }
    if leaves.iter().all(|s| matches!(s, Scalar::Bool(_))) {
        return Ok(DataType::Bool);
    }
    if !leaves.iter().all(Scalar::is_numeric) {
        return Err(Error::conversion(
            "json",
            format!("array mixes {} with other element types", first.dtype()),
        ));
    }
    if leaves.iter().any(|s| matches!(s, Scalar::Float(_))) {
        Ok(DataType::Float64)
    } else if leaves.iter().all(|s| matches!(s, Scalar::Int(_))) {
        Ok(DataType::Int64)
    } else if leaves.iter().all(|s| match s {
        Scalar::Int(i) => *i >= 0,
        _ => true,
    }) {
        Ok(DataType::UInt64)
    } else {
        Ok(DataType::Float64)
    }
}

fn nest_json(flat: &[serde_json::Value], shape: &[usize]) -> serde_json::Value {
    match shape {
        [] | [_] => serde_json::Value::Array(flat.to_vec()),
        [_, rest @ ..] => {
            let stride: usize = rest.iter().product();
            if stride == 0 {
                return serde_json::Value::Array(Vec::new());
            }
            serde_json::Value::Array(
                flat.chunks(stride)
                    .map(|chunk| nest_json(chunk, rest))
                    .collect(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_scalar_types() {
        assert_eq!(Value::from_json(&json!(8.5)).unwrap(), Value::float(8.5));
        assert_eq!(Value::from_json(&json!(3)).unwrap(), Value::int(3));
        assert_eq!(Value::from_json(&json!("keV")).unwrap(), Value::string("keV"));
        assert_eq!(Value::from_json(&json!(true)).unwrap(), Value::bool(true));
        assert!(Value::from_json(&json!(null)).is_err());
        assert!(Value::from_json(&json!({"a": 1})).is_err());
    }

    #[test]
    fn test_from_json_nested_array_shape() {
        let value = Value::from_json(&json!([[1, 2, 3], [4, 5, 6]])).unwrap();
        assert_eq!(value.shape(), &[2, 3]);
        assert_eq!(value.dtype(), DataType::Int64);
    }

    #[test]
    fn test_from_json_mixed_numbers_widen_to_float() {
        let value = Value::from_json(&json!([1, 2.5])).unwrap();
        assert_eq!(
            value,
            Value::Array {
                data: ArrayData::Float(vec![1.0, 2.5]),
                shape: vec![2]
            }
        );
    }

    #[test]
    fn test_from_json_rejects_ragged_and_mixed() {
        assert!(Value::from_json(&json!([[1, 2], [3]])).is_err());
        assert!(Value::from_json(&json!([1, "a"])).is_err());
        assert!(Value::from_json(&json!([1, [2]])).is_err());
    }

    #[test]
    fn test_to_json_nests_by_shape() {
        let value = Value::array(ArrayData::Int(vec![1, 2, 3, 4, 5, 6]), vec![3, 2]).unwrap();
        assert_eq!(value.to_json(), json!([[1, 2], [3, 4], [5, 6]]));
    }

    #[test]
    fn test_array_shape_must_cover_elements() {
        let result = Value::array(ArrayData::Float(vec![1.0, 2.0, 3.0]), vec![2, 2]);
        assert!(matches!(result, Err(Error::InvalidShape { .. })));
    }

    #[test]
    fn test_non_finite_floats_survive_json() {
        let value = Value::vector(ArrayData::Float(vec![f64::NAN, f64::INFINITY, -2.5, f64::NEG_INFINITY]));
        let json = value.to_json();
        assert_eq!(json, json!(["NaN", "Infinity", -2.5, "-Infinity"]));

        let Value::Array { data: ArrayData::Float(back), shape } =
            Value::from_json_as(&json, DataType::Float64).unwrap()
        else {
            panic!("expected a float array");
        };
        assert_eq!(shape, vec![4]);
        assert!(back[0].is_nan());
        assert_eq!(&back[1..], &[f64::INFINITY, -2.5, f64::NEG_INFINITY]);

        let nan = Value::from_json_as(&Value::float(f64::NAN).to_json(), DataType::Float64).unwrap();
        assert!(matches!(nan, Value::Scalar(Scalar::Float(x)) if x.is_nan()));
    }

    #[test]
    fn test_from_json_as_keeps_declared_type() {
        assert_eq!(
            Value::from_json_as(&json!(8), DataType::Float64).unwrap(),
            Value::float(8.0)
        );
        assert_eq!(
            Value::from_json_as(&json!([1, 2]), DataType::UInt64).unwrap(),
            Value::vector(ArrayData::UInt(vec![1, 2]))
        );
        assert!(Value::from_json_as(&json!("fast"), DataType::Float64).is_err());
        assert!(Value::from_json_as(&json!("NaN"), DataType::Int64).is_err());
    }

    #[test]
    fn test_cast_int_to_float_and_reject_string() {
        let value = Value::int(8);
        assert_eq!(value.cast(DataType::Float64).unwrap(), Value::float(8.0));
        assert!(Value::string("x").cast(DataType::Float64).is_err());
        assert!(Value::int(-1).cast(DataType::UInt64).is_err());
    }
}
