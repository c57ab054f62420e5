use std::fmt;
use std::sync::Arc;

use log::debug;

use super::{encode_request, encode_text, first_tensor, label_lanes, Handler, HandlerBuilder};
use crate::config::{AdapterConfig, Task};
use crate::envelope::{Input, Output};
use crate::error::AdapterError;
use crate::labels::LabelMapping;
use crate::ndlist::NdArray;
use crate::tokenizer::{TextTokenizer, TokenBatch};

const SCORE_LAYOUT: &str = "rank 2 tensor (rows, classes) with at least one class";

/// Sequence classification: one label per input text.
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use hybrid_classifier::{Handler, Input, LabelMapping, TextClassification, NdArray};
/// use ndarray::arr2;
///
/// let handler = TextClassification::builder()
///     .with_tokenizer_file("tests/fixtures/tokenizer.json")?
///     .with_label_mapping([("0", "negative"), ("1", "positive")].into_iter().collect())?
///     .build_text_classification()?;
///
/// let model_input = handler.preprocess(&Input::from_text("great product"))?;
/// assert_eq!(model_input.into_input().get_as_numpy(None)?.len(), 2);
///
/// let scores = NdArray::from(arr2(&[[0.1f32, 0.9]]).into_dyn());
/// let response = handler.postprocess(&Input::from_numpy(&[scores])?)?;
/// assert_eq!(response.body(), Some(&br#"["positive"]"#[..]));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TextClassification {
    config: AdapterConfig,
    tokenizer: Arc<dyn TextTokenizer>,
    mapping: Arc<LabelMapping>,
}

impl fmt::Debug for TextClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextClassification")
            .field("config", &self.config)
            .field("num_labels", &self.mapping.len())
            .finish()
    }
}

impl TextClassification {
    /// # Errors
    /// - `ConfigError` if `config` is invalid
    /// - `ValidationError` if the label mapping is empty or has blank labels
    pub fn new(
        config: AdapterConfig,
        tokenizer: Arc<dyn TextTokenizer>,
        mapping: Arc<LabelMapping>,
    ) -> Result<Self, AdapterError> {
        config.validate()?;
        mapping.validate()?;
        Ok(Self {
            config,
            tokenizer,
            mapping,
        })
    }

    /// Creates a new HandlerBuilder for fluent construction
    pub fn builder() -> HandlerBuilder {
        HandlerBuilder::new()
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn mapping(&self) -> &LabelMapping {
        &self.mapping
    }

    /// Tokenizes `text` exactly as `preprocess` would.
    pub fn tokenize(&self, text: &str) -> Result<TokenBatch, AdapterError> {
        encode_text(self.tokenizer.as_ref(), &self.config, text)
    }

    /// Maps each row of a `(rows, classes)` score matrix to the label of its
    /// highest-scoring class, preserving row order. Scores are compared in
    /// the tensor's own element type.
    ///
    /// The whole call fails on the first row that cannot be labelled; no
    /// partial result is returned.
    ///
    /// # Errors
    /// - `ShapeError` if the tensor is not rank 2 or has no class columns
    /// - `LabelNotFound` if a predicted index has no label
    pub fn classify_scores(&self, scores: &NdArray) -> Result<Vec<String>, AdapterError> {
        scores.ensure_rank(2, SCORE_LAYOUT)?;
        label_lanes(scores, &self.mapping, SCORE_LAYOUT)
    }
}

impl Handler for TextClassification {
    fn task(&self) -> Task {
        Task::TextClassification
    }

    fn preprocess(&self, input: &Input) -> Result<Output, AdapterError> {
        encode_request(self.tokenizer.as_ref(), &self.config, input)
    }

    fn postprocess(&self, input: &Input) -> Result<Output, AdapterError> {
        let labels = self.classify_scores(&first_tensor(input)?)?;
        debug!("Labelled {} score rows", labels.len());

        let mut output = Output::new();
        output.add_as_json(&labels)?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::EncodeOptions;
    use ndarray::{arr2, Array2};

    /// Whitespace tokenizer with fixed ids: `[CLS]`=101, words=1000+position, `[SEP]`=102.
    struct StubTokenizer;

    impl TextTokenizer for StubTokenizer {
        fn encode(&self, text: &str, options: &EncodeOptions) -> Result<TokenBatch, AdapterError> {
            let mut ids: Vec<u32> = vec![101];
            ids.extend(text.split_whitespace().enumerate().map(|(i, _)| 1000 + i as u32));
            ids.push(102);
            ids.truncate(options.max_length);
            let mask = vec![1; ids.len()];
            TokenBatch::from_ids(&ids, &mask)
        }
    }

    fn handler() -> TextClassification {
        let mapping: LabelMapping = [("0", "negative"), ("1", "positive")].into_iter().collect();
        TextClassification::new(AdapterConfig::default(), Arc::new(StubTokenizer), Arc::new(mapping)).unwrap()
    }

    #[test]
    fn test_classify_scores_row_order() {
        let labels = handler()
            .classify_scores(&NdArray::from(arr2(&[[0.1f32, 0.9], [0.8, 0.2]]).into_dyn()))
            .unwrap();
        assert_eq!(labels, vec!["positive", "negative"]);
    }

    #[test]
    fn test_classify_scores_in_native_precision() {
        let close_floats = NdArray::from(arr2(&[[1.0f64, 1.0 + 1e-9]]).into_dyn());
        assert_eq!(handler().classify_scores(&close_floats).unwrap(), vec!["positive"]);

        let large_ints = NdArray::from(arr2(&[[16_777_216i64, 16_777_217]]).into_dyn());
        assert_eq!(handler().classify_scores(&large_ints).unwrap(), vec!["positive"]);
    }

    #[test]
    fn test_classify_scores_missing_label() {
        let scores = NdArray::from(arr2(&[[0.9f32, 0.1, 0.0], [0.1, 0.2, 0.7]]).into_dyn());
        let result = handler().classify_scores(&scores);
        assert!(matches!(result, Err(AdapterError::LabelNotFound(index)) if index == "2"));
    }

    #[test]
    fn test_classify_scores_without_columns() {
        let result = handler().classify_scores(&NdArray::from(Array2::<f32>::zeros((2, 0)).into_dyn()));
        assert!(matches!(result, Err(AdapterError::ShapeError { .. })));
    }

    #[test]
    fn test_postprocess_rejects_rank_three_scores() {
        let scores = NdArray::from(ndarray::ArrayD::<f32>::zeros(ndarray::IxDyn(&[1, 2, 2])));
        let input = Input::from_numpy(&[scores]).unwrap();
        assert!(matches!(handler().postprocess(&input), Err(AdapterError::ShapeError { .. })));
    }

    #[test]
    fn test_preprocess_uses_injected_tokenizer() {
        let output = handler().preprocess(&Input::from_text("two words")).unwrap();
        let arrays = output.into_input().get_as_numpy(None).unwrap();
        assert_eq!(arrays.len(), 2);
        assert_eq!(arrays[0], NdArray::from(arr2(&[[101i64, 1000, 1001, 102]]).into_dyn()));
        assert_eq!(arrays[1], NdArray::from(arr2(&[[1i64, 1, 1, 1]]).into_dyn()));
    }

    #[test]
    fn test_rejects_empty_mapping() {
        let result = TextClassification::new(
            AdapterConfig::default(),
            Arc::new(StubTokenizer),
            Arc::new(LabelMapping::default()),
        );
        assert!(matches!(result, Err(AdapterError::ValidationError(_))));
    }
}
