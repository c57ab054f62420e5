use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AdapterError;

/// Maximum sequence length used when the host does not configure one.
pub const DEFAULT_MAX_LENGTH: usize = 128;

/// How shorter token sequences are padded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaddingStrategy {
    /// Pad to the longest sequence encoded in the call
    #[default]
    Longest,
    /// Pad every sequence to `max_length`
    MaxLength,
    DoNotPad,
}

impl FromStr for PaddingStrategy {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "longest" | "true" => Ok(Self::Longest),
            "max_length" => Ok(Self::MaxLength),
            "do_not_pad" | "false" => Ok(Self::DoNotPad),
            other => Err(AdapterError::ConfigError(format!(
                "Unknown padding strategy '{}'", other
            ))),
        }
    }
}

/// The closed set of model tasks an adapter can be selected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    TextClassification,
    TokenClassification,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::TextClassification => "text_classification",
            Task::TokenClassification => "token_classification",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Task {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "text_classification" => Ok(Task::TextClassification),
            "token_classification" => Ok(Task::TokenClassification),
            other => Err(AdapterError::ConfigError(format!("Unsupported task '{}'", other))),
        }
    }
}

/// Fixed tokenization settings an adapter is constructed with.
///
/// The defaults reproduce the policy every classification request is
/// tokenized under: truncate to `max_length`, pad to the longest sequence,
/// and include the model's special tokens.
///
/// # Example
/// ```
/// use hybrid_classifier::{AdapterConfig, PaddingStrategy};
///
/// let config = AdapterConfig::default()
///     .with_max_length(64)
///     .with_padding(PaddingStrategy::MaxLength);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub max_length: usize,
    pub truncation: bool,
    pub padding: PaddingStrategy,
    pub add_special_tokens: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            truncation: true,
            padding: PaddingStrategy::Longest,
            add_special_tokens: true,
        }
    }
}

impl AdapterConfig {
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_truncation(mut self, truncation: bool) -> Self {
        self.truncation = truncation;
        self
    }

    pub fn with_padding(mut self, padding: PaddingStrategy) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_special_tokens(mut self, add_special_tokens: bool) -> Self {
        self.add_special_tokens = add_special_tokens;
        self
    }

    /// Checks that the configuration can be used for encoding.
    pub fn validate(&self) -> Result<(), AdapterError> {
        if self.max_length == 0 {
            return Err(AdapterError::ConfigError("max_length must be positive".into()));
        }
        Ok(())
    }

    /// Builds a configuration from the string properties a serving host
    /// passes at model load time.
    ///
    /// Recognized keys are `max_length`, `truncation`, `padding` and
    /// `add_special_tokens`; anything else is left for other consumers.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self, AdapterError> {
        let mut config = Self::default();

        if let Some(value) = properties.get("max_length") {
            config.max_length = value.trim().parse().map_err(|_| {
                AdapterError::ConfigError(format!("Invalid max_length '{}'", value))
            })?;
        }
        if let Some(value) = properties.get("truncation") {
            config.truncation = parse_flag("truncation", value)?;
        }
        if let Some(value) = properties.get("padding") {
            config.padding = value.parse()?;
        }
        if let Some(value) = properties.get("add_special_tokens") {
            config.add_special_tokens = parse_flag("add_special_tokens", value)?;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Reads the `task` property, if the host supplied one.
pub fn task_from_properties(properties: &HashMap<String, String>) -> Result<Option<Task>, AdapterError> {
    properties.get("task").map(|value| value.parse()).transpose()
}

fn parse_flag(key: &str, value: &str) -> Result<bool, AdapterError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(AdapterError::ConfigError(format!("Invalid boolean for {}: '{}'", key, value))),
    }
}
