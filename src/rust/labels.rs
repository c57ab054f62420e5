use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AdapterError;

/// Read-only lookup from a string-encoded class index (`"0"`, `"1"`, ...)
/// to its human-readable label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelMapping {
    labels: HashMap<String, String>,
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            labels: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl LabelMapping {
    pub fn new(labels: HashMap<String, String>) -> Self {
        Self { labels }
    }

    /// Parses either a flat `{"0": "negative", ...}` object or a model
    /// config that carries the same object under `id2label`.
    ///
    /// # Example
    /// ```
    /// use hybrid_classifier::LabelMapping;
    ///
    /// let mapping = LabelMapping::from_json_str(r#"{"0": "negative", "1": "positive"}"#)?;
    /// assert_eq!(mapping.label_for(1)?, "positive");
    /// # Ok::<(), hybrid_classifier::AdapterError>(())
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self, AdapterError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_json_value(&value)
    }

    pub fn from_json_value(value: &Value) -> Result<Self, AdapterError> {
        let object = value
            .get("id2label")
            .unwrap_or(value)
            .as_object()
            .ok_or_else(|| AdapterError::ValidationError("Label mapping must be a JSON object".into()))?;

        object
            .iter()
            .map(|(index, label)| match label {
                Value::String(label) => Ok((index.clone(), label.clone())),
                other => Err(AdapterError::ValidationError(format!(
                    "Label for index '{}' must be a string, found {}",
                    index, other
                ))),
            })
            .collect::<Result<HashMap<_, _>, _>>()
            .map(Self::new)
    }

    pub fn get(&self, index: &str) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Looks up the label of a class index.
    ///
    /// # Errors
    /// - `LabelNotFound` if the index has no entry; no fallback label is used
    pub fn label_for(&self, index: usize) -> Result<&str, AdapterError> {
        let key = index.to_string();
        self.get(&key).ok_or(AdapterError::LabelNotFound(key))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label strings ordered by class index where the keys are numeric.
    pub fn labels(&self) -> Vec<&str> {
        let mut entries: Vec<_> = self.labels.iter().collect();
        entries.sort_by(|a, b| match (a.0.parse::<usize>(), b.0.parse::<usize>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => a.0.cmp(b.0),
        });
        entries.into_iter().map(|(_, label)| label.as_str()).collect()
    }

    /// Checks that the mapping is usable by an adapter:
    /// - it has at least one entry
    /// - no label is empty
    pub fn validate(&self) -> Result<(), AdapterError> {
        if self.labels.is_empty() {
            return Err(AdapterError::ValidationError("Label mapping cannot be empty".into()));
        }
        if let Some((index, _)) = self.labels.iter().find(|(_, label)| label.is_empty()) {
            return Err(AdapterError::ValidationError(format!(
                "Label for index '{}' cannot be empty",
                index
            )));
        }
        Ok(())
    }
}
