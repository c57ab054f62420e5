use std::io;
use std::string::FromUtf8Error;

/// Represents the different types of errors that can occur while adapting
/// requests and model outputs.
///
/// Nothing in this crate recovers from these locally: every failure is
/// handed back to the serving host unchanged.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The request envelope has no content, or not under the requested key
    #[error("Payload error: {0}")]
    PayloadError(String),
    /// The request payload could not be decoded as UTF-8 text
    #[error("Payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),
    /// Error occurred while loading or using the tokenizer
    #[error("Tokenizer error: {0}")]
    TokenizerError(String),
    /// Malformed tensor bytes or an unsupported element type
    #[error("Codec error: {0}")]
    CodecError(String),
    /// A tensor did not have the shape the adapter expects
    #[error("Shape mismatch: expected {expected}, got {actual:?}")]
    ShapeError {
        expected: String,
        actual: Vec<usize>,
    },
    /// The predicted class index has no entry in the label mapping
    #[error("No label mapped for class index '{0}'")]
    LabelNotFound(String),
    /// Error occurred due to an invalid configuration value
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// Error occurred during the build phase
    #[error("Build error: {0}")]
    BuildError(String),
    /// Error occurred due to invalid input parameters
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl AdapterError {
    pub(crate) fn shape(expected: impl Into<String>, actual: &[usize]) -> Self {
        AdapterError::ShapeError {
            expected: expected.into(),
            actual: actual.to_vec(),
        }
    }
}

impl From<tokenizers::Error> for AdapterError {
    fn from(err: tokenizers::Error) -> Self {
        AdapterError::TokenizerError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_error_message() {
        let err = AdapterError::shape("rank 2 score matrix", &[2, 3, 4]);
        assert_eq!(
            err.to_string(),
            "Shape mismatch: expected rank 2 score matrix, got [2, 3, 4]"
        );
    }

    #[test]
    fn test_tokenizer_error_conversion() {
        let source: tokenizers::Error = "vocabulary missing".into();
        let err = AdapterError::from(source);
        assert!(matches!(err, AdapterError::TokenizerError(msg) if msg.contains("vocabulary")));
    }
}
