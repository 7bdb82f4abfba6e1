//! Model and input artifacts.
//!
//! Artifacts arrive as JSON produced by an external uploader:
//!
//! ```text
//! model: { "kind": "linear_regression"?, "weights": [8 numbers], "bias": number,
//!          "threshold": 0? }
//! input: { "features": [8 numbers] }
//! ```
//!
//! The supported model kinds form a closed set ([`ModelKind`]). A document
//! either parses as one of them or is rejected with
//! [`ComputeError::UnsupportedModelKind`]; there is no guessing from key names.
//! The circuit thresholds at zero, so a `threshold` other than `0` is refused
//! rather than silently ignored.
//! Shape (length) checks happen later, in witness construction, so the error
//! names both lengths.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::ComputeError;

/// Tag value for the only supported model family.
pub const LINEAR_REGRESSION: &str = "linear_regression";

/// Private linear model: `weights` and `bias`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelData {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl ModelData {
    pub fn new(weights: impl Into<Vec<f64>>, bias: f64) -> Self {
        Self { weights: weights.into(), bias }
    }

    /// Build from integers (test vectors, CLI demos).
    pub fn from_ints(weights: &[i64], bias: i64) -> Self {
        Self::new(weights.iter().map(|&w| w as f64).collect::<Vec<_>>(), bias as f64)
    }
}

/// Private input vector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputData {
    pub features: Vec<f64>,
}

impl InputData {
    pub fn new(features: impl Into<Vec<f64>>) -> Self {
        Self { features: features.into() }
    }

    pub fn from_ints(features: &[i64]) -> Self {
        Self::new(features.iter().map(|&x| x as f64).collect::<Vec<_>>())
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self, ComputeError> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Closed set of model families the circuit can prove.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelKind {
    LinearRegression(ModelData),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelDocument {
    #[serde(default)]
    kind: Option<String>,
    weights: Vec<f64>,
    bias: f64,
    #[serde(default)]
    threshold: Option<f64>,
}

impl ModelKind {
    /// Validate a model document once, at the system boundary.
    pub fn from_json(value: serde_json::Value) -> Result<Self, ComputeError> {
        if let Some(kind) = value.get("kind").and_then(|k| k.as_str()) {
            if kind != LINEAR_REGRESSION {
                return Err(ComputeError::UnsupportedModelKind(kind.to_string()));
            }
        }
        let doc: ModelDocument = serde_json::from_value(value)
            .map_err(|e| ComputeError::UnsupportedModelKind(e.to_string()))?;
        if let Some(t) = doc.threshold.filter(|t| *t != 0.0) {
            return Err(ComputeError::UnsupportedModelKind(format!(
                "{LINEAR_REGRESSION} with threshold {t}"
            )));
        }
        match doc.kind.as_deref() {
            None | Some(LINEAR_REGRESSION) => Ok(ModelKind::LinearRegression(ModelData {
                weights: doc.weights,
                bias: doc.bias,
            })),
            Some(other) => Err(ComputeError::UnsupportedModelKind(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::LinearRegression(_) => LINEAR_REGRESSION,
        }
    }

    /// The linear model the circuit consumes.
    pub fn linear(&self) -> &ModelData {
        match self {
            ModelKind::LinearRegression(m) => m,
        }
    }

    pub fn into_linear(self) -> ModelData {
        match self {
            ModelKind::LinearRegression(m) => m,
        }
    }
}
