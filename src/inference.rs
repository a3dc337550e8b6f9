//! Prediction results and how they are shown to a person

use crate::canonical::B64Image;
use serde_json::{Map, Value};
use std::fmt;

/// Shown in place of a result that has not been computed yet
pub const UNKNOWN: &str = "unknown";

/// The output of a prediction. Exactly one representation is populated
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionResult {
    /// Plain text, shown as is
    Raw(String),

    /// A labelled class with its confidence in `[0, 1]`
    Class { label: String, confidence: f64 },

    /// One probability per class; the label is the argmax index
    Probabilities(Vec<f64>),

    /// Anything else the remote service sent back
    Opaque(Value),

    /// The request failed
    Error(String),
}

impl PredictionResult {
    /// Classify a JSON response. Never fails: unknown shapes become `Opaque`
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(text) => PredictionResult::Raw(text),
            Value::Object(map) => Self::from_object(map),
            other => PredictionResult::Opaque(other),
        }
    }

    /// Like [`from_json`](Self::from_json), but an `image` field is split off
    /// first
    pub fn from_attack_json(value: Value) -> (Self, Option<B64Image>) {
        match value {
            Value::Object(mut map) => {
                let image = match map.remove("image") {
                    Some(Value::String(image)) => Some(B64Image::from(image)),
                    Some(other) => {
                        map.insert("image".into(), other);
                        None
                    }
                    None => None,
                };
                (Self::from_object(map), image)
            }
            other => (Self::from_json(other), None),
        }
    }

    fn from_object(map: Map<String, Value>) -> Self {
        let label = map.get("top").and_then(label_of);
        let confidence = map.get("conf").and_then(Value::as_f64);
        if let (Some(label), Some(confidence)) = (label, confidence) {
            return PredictionResult::Class { label, confidence };
        }

        let probs = map
            .get("probs")
            .and_then(Value::as_array)
            .and_then(|probs| probs.iter().map(Value::as_f64).collect::<Option<Vec<_>>>())
            .filter(|probs| !probs.is_empty());
        if let Some(probs) = probs {
            return PredictionResult::Probabilities(probs);
        }

        PredictionResult::Opaque(Value::Object(map))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PredictionResult::Error(_))
    }
}

fn label_of(top: &Value) -> Option<String> {
    match top {
        Value::String(label) => Some(label.clone()),
        Value::Number(label) => Some(label.to_string()),
        _ => None,
    }
}

/// Index and value of the largest probability. Ties go to the lower index
fn argmax(probs: &[f64]) -> Option<(usize, f64)> {
    probs
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, p)| match best {
            Some((_, b)) if b >= p => best,
            _ => Some((i, p)),
        })
}

fn write_class(f: &mut fmt::Formatter<'_>, label: &dyn fmt::Display, confidence: f64) -> fmt::Result {
    write!(f, "'{label}' with {:.1}%", confidence * 100.0)
}

impl fmt::Display for PredictionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionResult::Raw(text) => f.write_str(text),
            PredictionResult::Class { label, confidence } => write_class(f, label, *confidence),
            PredictionResult::Probabilities(probs) => match argmax(probs) {
                Some((label, confidence)) => write_class(f, &label, confidence),
                None => write!(f, "{}", Value::from(probs.clone())),
            },
            PredictionResult::Opaque(value) => write!(f, "{value}"),
            PredictionResult::Error(detail) => write!(f, "Error: {detail}"),
        }
    }
}

/// Render an optional result, falling back to the [`UNKNOWN`] placeholder
pub fn format(result: Option<&PredictionResult>) -> String {
    result.map_or_else(|| UNKNOWN.to_string(), ToString::to_string)
}
