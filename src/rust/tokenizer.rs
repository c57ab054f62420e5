use std::fmt;
use std::path::Path;
use std::str::FromStr;

use log::{debug, error, info};
use ndarray::Array2;
use tokenizers::{PaddingDirection, PostProcessor, Tokenizer, TruncationDirection};

use crate::config::{AdapterConfig, PaddingStrategy};
use crate::error::AdapterError;
use crate::ndlist::NdArray;

/// Per-call tokenization settings.
///
/// Results are always returned as plain `ndarray` arrays, never as
/// framework tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    pub max_length: usize,
    pub truncation: bool,
    pub padding: PaddingStrategy,
    pub add_special_tokens: bool,
}

impl From<&AdapterConfig> for EncodeOptions {
    fn from(config: &AdapterConfig) -> Self {
        Self {
            max_length: config.max_length,
            truncation: config.truncation,
            padding: config.padding,
            add_special_tokens: config.add_special_tokens,
        }
    }
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self::from(&AdapterConfig::default())
    }
}

/// Token ids and attention mask for one encoded input, each shaped
/// `[batch_size, sequence_length]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBatch {
    input_ids: Array2<i64>,
    attention_mask: Array2<i64>,
}

impl TokenBatch {
    /// # Errors
    /// - `ShapeError` if the two arrays do not have the same shape
    pub fn new(input_ids: Array2<i64>, attention_mask: Array2<i64>) -> Result<Self, AdapterError> {
        if input_ids.dim() != attention_mask.dim() {
            return Err(AdapterError::shape(
                format!("attention mask shaped like input ids {:?}", input_ids.shape()),
                attention_mask.shape(),
            ));
        }
        Ok(Self {
            input_ids,
            attention_mask,
        })
    }

    /// Builds a single-row batch from raw tokenizer output.
    pub fn from_ids(ids: &[u32], attention_mask: &[u32]) -> Result<Self, AdapterError> {
        let to_row = |values: &[u32]| {
            Array2::from_shape_vec((1, values.len()), values.iter().map(|&v| v as i64).collect())
                .map_err(|e| AdapterError::TokenizerError(format!("Failed to create token array: {}", e)))
        };
        Self::new(to_row(ids)?, to_row(attention_mask)?)
    }

    pub fn input_ids(&self) -> &Array2<i64> {
        &self.input_ids
    }

    pub fn attention_mask(&self) -> &Array2<i64> {
        &self.attention_mask
    }

    pub fn batch_size(&self) -> usize {
        self.input_ids.nrows()
    }

    /// Sequence length shared by the ids and the mask
    pub fn len(&self) -> usize {
        self.input_ids.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the arrays in model input order: ids first, then mask.
    pub fn into_arrays(self) -> [NdArray; 2] {
        [
            NdArray::from(self.input_ids.into_dyn()),
            NdArray::from(self.attention_mask.into_dyn()),
        ]
    }
}

/// Converts text into model input arrays.
///
/// Implementations must return ids and mask of equal length, honour the
/// truncation limit whenever truncation is enabled, and be deterministic.
pub trait TextTokenizer: Send + Sync {
    fn encode(&self, text: &str, options: &EncodeOptions) -> Result<TokenBatch, AdapterError>;
}

/// A [`TextTokenizer`] backed by a Hugging Face `tokenizer.json`.
///
/// Truncation and padding stored in the tokenizer file are cleared on
/// construction; the [`EncodeOptions`] passed to each call are the only
/// policy applied.
pub struct HuggingFaceTokenizer {
    tokenizer: Tokenizer,
    pad_id: u32,
    pad_type_id: u32,
    pad_token: String,
}

impl fmt::Debug for HuggingFaceTokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HuggingFaceTokenizer")
            .field("vocab_size", &self.tokenizer.get_vocab_size(true))
            .field("pad_id", &self.pad_id)
            .field("pad_token", &self.pad_token)
            .finish()
    }
}

impl HuggingFaceTokenizer {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AdapterError> {
        let path = path.as_ref();
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            error!("Failed to load tokenizer from {:?}: {}", path, e);
            AdapterError::TokenizerError(format!("Failed to load tokenizer: {}", e))
        })?;
        info!("Tokenizer loaded from {:?}", path);
        Self::from_tokenizer(tokenizer)
    }

    /// Parses the contents of a `tokenizer.json` file.
    pub fn from_json(json: &str) -> Result<Self, AdapterError> {
        let tokenizer = Tokenizer::from_str(json)
            .map_err(|e| AdapterError::TokenizerError(format!("Failed to parse tokenizer: {}", e)))?;
        Self::from_tokenizer(tokenizer)
    }

    pub fn from_tokenizer(mut tokenizer: Tokenizer) -> Result<Self, AdapterError> {
        let (pad_id, pad_type_id, pad_token) = match tokenizer.get_padding() {
            Some(params) => (params.pad_id, params.pad_type_id, params.pad_token.clone()),
            None => ["[PAD]", "<pad>", "<PAD>"]
                .iter()
                .find_map(|token| tokenizer.token_to_id(token).map(|id| (id, 0, token.to_string())))
                .unwrap_or((0, 0, "[PAD]".to_string())),
        };

        tokenizer.with_truncation(None)?;
        tokenizer.with_padding(None);

        Ok(Self {
            tokenizer,
            pad_id,
            pad_type_id,
            pad_token,
        })
    }

    /// Number of special tokens the post-processor adds to a single sequence.
    fn special_token_count(&self) -> usize {
        self.tokenizer
            .get_post_processor()
            .map(|processor| processor.added_tokens(false))
            .unwrap_or(0)
    }
}

impl TextTokenizer for HuggingFaceTokenizer {
    /// Encodes `text` as a single-row batch.
    ///
    /// Special tokens count toward `max_length`: the content is truncated
    /// first so that the sequence still fits once they are added.
    ///
    /// # Errors
    /// - `TokenizerError` if the text cannot be encoded
    /// - `TokenizerError` if `max_length` cannot hold the special tokens
    fn encode(&self, text: &str, options: &EncodeOptions) -> Result<TokenBatch, AdapterError> {
        let mut encoding = self.tokenizer.encode(text, false)?;

        if options.truncation {
            let reserved = if options.add_special_tokens {
                self.special_token_count()
            } else {
                0
            };
            if options.max_length <= reserved {
                return Err(AdapterError::TokenizerError(format!(
                    "max_length {} leaves no room for content next to {} special tokens",
                    options.max_length, reserved
                )));
            }
            encoding.truncate(options.max_length - reserved, 0, TruncationDirection::Right);
        }

        let mut encoding = self
            .tokenizer
            .post_process(encoding, None, options.add_special_tokens)?;

        // a single sequence is already the longest one in its batch
        if options.padding == PaddingStrategy::MaxLength {
            encoding.pad(
                options.max_length,
                self.pad_id,
                self.pad_type_id,
                &self.pad_token,
                PaddingDirection::Right,
            );
        }

        debug!("Encoded {} chars into {} tokens", text.len(), encoding.len());
        TokenBatch::from_ids(encoding.get_ids(), encoding.get_attention_mask())
    }
}
