use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use log::info;

use super::{HybridModel, TextClassification, TokenClassification};
use crate::config::{AdapterConfig, Task};
use crate::error::AdapterError;
use crate::labels::LabelMapping;
use crate::tokenizer::{HuggingFaceTokenizer, TextTokenizer};

/// A builder for constructing a handler with a fluent interface.
///
/// Every collaborator is passed in explicitly: the tokenizer, the label
/// mapping and the configuration.
#[derive(Default)]
pub struct HandlerBuilder {
    config: AdapterConfig,
    tokenizer: Option<Arc<dyn TextTokenizer>>,
    mapping: Option<LabelMapping>,
}

impl HandlerBuilder {
    /// Creates a new empty HandlerBuilder instance with default configuration
    ///
    /// # Example
    /// ```
    /// use hybrid_classifier::HandlerBuilder;
    ///
    /// let builder = HandlerBuilder::new();
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the tokenization configuration
    ///
    /// # Example
    /// ```
    /// use hybrid_classifier::{AdapterConfig, HandlerBuilder};
    ///
    /// let builder = HandlerBuilder::new()
    ///     .with_config(AdapterConfig::default().with_max_length(256));
    /// ```
    pub fn with_config(mut self, config: AdapterConfig) -> Self {
        self.config = config;
        self
    }

    /// Reads the configuration from host properties
    pub fn with_properties(mut self, properties: &HashMap<String, String>) -> Result<Self, AdapterError> {
        self.config = AdapterConfig::from_properties(properties)?;
        Ok(self)
    }

    pub fn with_tokenizer<T: TextTokenizer + 'static>(self, tokenizer: T) -> Self {
        self.with_shared_tokenizer(Arc::new(tokenizer))
    }

    pub fn with_shared_tokenizer(mut self, tokenizer: Arc<dyn TextTokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    /// Loads a Hugging Face `tokenizer.json`
    ///
    /// # Returns
    /// * `Result<Self, AdapterError>` - The builder instance if successful, or an error if:
    ///   - The path is empty
    ///   - A tokenizer is already set
    ///   - The file doesn't exist or fails to load
    pub fn with_tokenizer_file(self, path: impl AsRef<Path>) -> Result<Self, AdapterError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(AdapterError::BuildError("Tokenizer path cannot be empty".to_string()));
        }
        if self.tokenizer.is_some() {
            return Err(AdapterError::BuildError("Tokenizer already set".to_string()));
        }
        if !path.exists() {
            return Err(AdapterError::BuildError(format!("Tokenizer file not found: {}", path.display())));
        }

        let tokenizer = HuggingFaceTokenizer::from_file(path)?;
        Ok(self.with_tokenizer(tokenizer))
    }

    /// Sets the label mapping after validating it
    ///
    /// # Returns
    /// * `Result<Self, AdapterError>` - The builder instance if successful, or an error if:
    ///   - The mapping is empty
    ///   - Any label is empty
    pub fn with_label_mapping(mut self, mapping: LabelMapping) -> Result<Self, AdapterError> {
        mapping.validate()?;
        self.mapping = Some(mapping);
        Ok(self)
    }

    /// Parses and sets the label mapping from JSON (flat or `id2label`)
    pub fn with_labels_json(self, json: &str) -> Result<Self, AdapterError> {
        let mapping = LabelMapping::from_json_str(json)?;
        self.with_label_mapping(mapping)
    }

    fn into_parts(self) -> Result<(AdapterConfig, Arc<dyn TextTokenizer>, Arc<LabelMapping>), AdapterError> {
        self.config.validate()?;
        let tokenizer = self
            .tokenizer
            .ok_or_else(|| AdapterError::BuildError("A tokenizer must be set".to_string()))?;
        let mapping = self
            .mapping
            .ok_or_else(|| AdapterError::BuildError("A label mapping must be set".to_string()))?;
        info!(
            "Building handler with {} labels (max_length {})",
            mapping.len(),
            self.config.max_length
        );
        Ok((self.config, tokenizer, Arc::new(mapping)))
    }

    /// Builds and returns a sequence classification handler
    ///
    /// # Returns
    /// * `Result<TextClassification, AdapterError>` - The handler if successful, or an error if:
    ///   - No tokenizer has been set
    ///   - No label mapping has been set
    ///   - The configuration is invalid
    pub fn build_text_classification(self) -> Result<TextClassification, AdapterError> {
        let (config, tokenizer, mapping) = self.into_parts()?;
        TextClassification::new(config, tokenizer, mapping)
    }

    pub fn build_token_classification(self) -> Result<TokenClassification, AdapterError> {
        let (config, tokenizer, mapping) = self.into_parts()?;
        TokenClassification::new(config, tokenizer, mapping)
    }

    /// Builds the handler for `task`
    pub fn build(self, task: Task) -> Result<HybridModel, AdapterError> {
        let (config, tokenizer, mapping) = self.into_parts()?;
        HybridModel::new(task, config, tokenizer, mapping)
    }
}
