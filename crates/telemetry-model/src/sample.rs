//! Telemetry sample and value types.

use serde::{Deserialize, Serialize};

/// A telemetry value: a scalar or a fixed-dimension vector.
///
/// Serialized untagged, so `12.5` is a scalar and `[0.1, -0.4]` a vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl Value {
    /// Number of components (1 for scalars).
    pub fn dimension(&self) -> usize {
        match self {
            Value::Scalar(_) => 1,
            Value::Vector(v) => v.len(),
        }
    }

    /// Components as a slice.
    pub fn components(&self) -> &[f64] {
        match self {
            Value::Scalar(v) => std::slice::from_ref(v),
            Value::Vector(v) => v,
        }
    }

    /// Scalar value, or the first component of a one-element vector.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            Value::Vector(v) if v.len() == 1 => Some(v[0]),
            Value::Vector(_) => None,
        }
    }

    /// First two components of a vector of dimension >= 2.
    pub fn as_xy(&self) -> Option<(f64, f64)> {
        match self {
            Value::Vector(v) if v.len() >= 2 => Some((v[0], v[1])),
            _ => None,
        }
    }

    /// A single component by index.
    pub fn component(&self, index: usize) -> Option<f64> {
        self.components().get(index).copied()
    }

    /// Whether every component is finite.
    pub fn is_finite(&self) -> bool {
        self.components().iter().all(|c| c.is_finite())
    }

    /// Build a value of the given dimension from a flat component slice.
    pub fn from_components(components: &[f64]) -> Self {
        if components.len() == 1 {
            Value::Scalar(components[0])
        } else {
            Value::Vector(components.to_vec())
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(v)
    }
}

impl From<[f64; 2]> for Value {
    fn from(v: [f64; 2]) -> Self {
        Value::Vector(v.to_vec())
    }
}

impl From<[f64; 3]> for Value {
    fn from(v: [f64; 3]) -> Self {
        Value::Vector(v.to_vec())
    }
}

/// Scalar linear interpolation.
#[inline]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// A single timestamped telemetry sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Seconds since the start of the telemetry recording.
    pub t: f64,

    /// The sampled value.
    #[serde(rename = "v")]
    pub value: Value,
}

impl Sample {
    pub fn new(t: f64, value: impl Into<Value>) -> Self {
        Self {
            t,
            value: value.into(),
        }
    }

    pub fn scalar(t: f64, v: f64) -> Self {
        Self::new(t, Value::Scalar(v))
    }

    pub fn vector(t: f64, v: &[f64]) -> Self {
        Self::new(t, Value::Vector(v.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp() {
        assert_eq!(lerp(10.0, 20.0, 0.25), 12.5);
        assert_eq!(lerp(-2.0, 2.0, 0.5), 0.0);
        assert_eq!(lerp(4.0, 8.0, 1.0), 8.0);
    }

    #[test]
    fn test_sample_json_shape() {
        let s: Sample = serde_json::from_str(r#"{"t": 1.5, "v": [0.2, -0.1]}"#).unwrap();
        assert_eq!(s.value.as_xy(), Some((0.2, -0.1)));
        let s: Sample = serde_json::from_str(r#"{"t": 0.0, "v": 42.0}"#).unwrap();
        assert_eq!(s.value.as_scalar(), Some(42.0));
    }
}
