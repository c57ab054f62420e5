use std::fmt;
use std::sync::Arc;

use log::debug;

use super::{encode_request, first_tensor, label_lanes, Handler};
use crate::config::{AdapterConfig, Task};
use crate::envelope::{Input, Output};
use crate::error::AdapterError;
use crate::labels::LabelMapping;
use crate::ndlist::NdArray;
use crate::tokenizer::TextTokenizer;

const SCORE_LAYOUT: &str = "rank 3 tensor (rows, tokens, classes) with at least one class";

/// Token classification (tagging): one label per token of each input.
///
/// Shares the inbound path with [`TextClassification`](super::TextClassification);
/// the model output is a `(rows, tokens, classes)` tensor.
#[derive(Clone)]
pub struct TokenClassification {
    config: AdapterConfig,
    tokenizer: Arc<dyn TextTokenizer>,
    mapping: Arc<LabelMapping>,
}

impl fmt::Debug for TokenClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenClassification")
            .field("config", &self.config)
            .field("num_labels", &self.mapping.len())
            .finish()
    }
}

impl TokenClassification {
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

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn mapping(&self) -> &LabelMapping {
        &self.mapping
    }

    /// Labels every token of every row of a `(rows, tokens, classes)` tensor,
    /// preserving both orders.
    pub fn tag_scores(&self, scores: &NdArray) -> Result<Vec<Vec<String>>, AdapterError> {
        scores.ensure_rank(3, SCORE_LAYOUT)?;
        let (rows, tokens) = (scores.shape()[0], scores.shape()[1]);

        let mut tags = label_lanes(scores, &self.mapping, SCORE_LAYOUT)?.into_iter();
        Ok((0..rows).map(|_| tags.by_ref().take(tokens).collect()).collect())
    }
}

impl Handler for TokenClassification {
    fn task(&self) -> Task {
        Task::TokenClassification
    }

    fn preprocess(&self, input: &Input) -> Result<Output, AdapterError> {
        encode_request(self.tokenizer.as_ref(), &self.config, input)
    }

    fn postprocess(&self, input: &Input) -> Result<Output, AdapterError> {
        let scores = first_tensor(input)?;
        let tags = self.tag_scores(&scores)?;
        debug!("Tagged {} rows of {} tokens", tags.len(), scores.shape()[1]);

        let mut output = Output::new();
        output.add_as_json(&tags)?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::HuggingFaceTokenizer;
    use ndarray::arr3;

    fn handler() -> TokenClassification {
        let tokenizer = HuggingFaceTokenizer::from_json(include_str!("../../../tests/fixtures/tokenizer.json")).unwrap();
        let mapping: LabelMapping = [("0", "O"), ("1", "B-PRODUCT")].into_iter().collect();
        TokenClassification::new(AdapterConfig::default(), Arc::new(tokenizer), Arc::new(mapping)).unwrap()
    }

    #[test]
    fn test_tag_scores() {
        let scores = NdArray::from(arr3(&[[[0.9f32, 0.1], [0.2, 0.8], [0.6, 0.4]]]).into_dyn());
        let tags = handler().tag_scores(&scores).unwrap();
        assert_eq!(tags, vec![vec!["O", "B-PRODUCT", "O"]]);
    }

    #[test]
    fn test_tag_scores_keeps_rows_apart() {
        let scores = NdArray::from(arr3(&[[[3i64, 1], [0, 2]], [[1, 5], [9, 4]]]).into_dyn());
        let tags = handler().tag_scores(&scores).unwrap();
        assert_eq!(tags, vec![vec!["O", "B-PRODUCT"], vec!["B-PRODUCT", "O"]]);

        let no_tokens = NdArray::from(ndarray::ArrayD::<f32>::zeros(ndarray::IxDyn(&[2, 0, 2])));
        assert_eq!(handler().tag_scores(&no_tokens).unwrap(), vec![Vec::<String>::new(); 2]);
    }

    #[test]
    fn test_tag_scores_missing_label() {
        let scores = NdArray::from(arr3(&[[[0.1f32, 0.1, 0.8]]]).into_dyn());
        assert!(matches!(handler().tag_scores(&scores), Err(AdapterError::LabelNotFound(_))));
    }

    #[test]
    fn test_postprocess_requires_rank_three() {
        let scores = NdArray::from(ndarray::arr2(&[[0.1f32, 0.9]]).into_dyn());
        let input = Input::from_numpy(&[scores]).unwrap();
        assert!(matches!(handler().postprocess(&input), Err(AdapterError::ShapeError { .. })));
    }

    #[test]
    fn test_task() {
        assert_eq!(handler().task(), Task::TokenClassification);
    }
}
