use std::{fmt, slice};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Values keyed by variable name, in declaration order.
///
/// This is the exchange type between the registry and disciplines: a
/// discipline receives its declared inputs as `Values` and returns its
/// declared outputs the same way.
pub type Values = IndexMap<String, Value>;

/// The shape of a variable's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Scalar,
    Array(usize),
}

impl Shape {
    /// Returns the number of elements a value of this shape holds.
    #[must_use]
    pub fn len(self) -> usize {
        match self {
            Shape::Scalar => 1,
            Shape::Array(len) => len,
        }
    }

    /// Returns `true` for a zero-length array shape.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Scalar => write!(f, "scalar"),
            Shape::Array(len) => write!(f, "array[{len}]"),
        }
    }
}

/// A numeric value held by a variable: a scalar or a fixed-length array.
///
/// Serialized untagged, so `2.5` and `[1.0, 2.0]` are both valid inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(f64),
    Array(Vec<f64>),
}

impl Value {
    /// Creates a value of the given shape with every element set to `fill`.
    #[must_use]
    pub fn filled(shape: Shape, fill: f64) -> Self {
        match shape {
            Shape::Scalar => Value::Scalar(fill),
            Shape::Array(len) => Value::Array(vec![fill; len]),
        }
    }

    /// Returns the shape of this value.
    #[must_use]
    pub fn shape(&self) -> Shape {
        match self {
            Value::Scalar(_) => Shape::Scalar,
            Value::Array(values) => Shape::Array(values.len()),
        }
    }

    /// Returns the scalar, or `None` for arrays.
    #[must_use]
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(x) => Some(*x),
            Value::Array(_) => None,
        }
    }

    /// Views the value as a flat slice of elements.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        match self {
            Value::Scalar(x) => slice::from_ref(x),
            Value::Array(values) => values,
        }
    }

    /// Returns `true` if every element is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.as_slice().iter().all(|x| x.is_finite())
    }

    /// Combines two values of the same shape element by element.
    ///
    /// Returns `None` if the shapes differ.
    #[must_use]
    pub fn zip_map(&self, other: &Value, f: impl Fn(f64, f64) -> f64) -> Option<Value> {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => Some(Value::Scalar(f(*a, *b))),
            (Value::Array(a), Value::Array(b)) if a.len() == b.len() => Some(Value::Array(
                a.iter().zip(b).map(|(&a, &b)| f(a, b)).collect(),
            )),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Scalar(x)
    }
}

impl From<Vec<f64>> for Value {
    fn from(values: Vec<f64>) -> Self {
        Value::Array(values)
    }
}

impl<const N: usize> From<[f64; N]> for Value {
    fn from(values: [f64; N]) -> Self {
        Value::Array(values.to_vec())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(x) => write!(f, "{x}"),
            Value::Array(values) => write!(f, "{values:?}"),
        }
    }
}
