//! Pre- and post-processing adapters, one per supported model task.

mod builder;
mod text_classification;
mod token_classification;
pub(crate) mod utils;

pub use builder::HandlerBuilder;
pub use text_classification::TextClassification;
pub use token_classification::TokenClassification;

use std::sync::Arc;

use log::debug;

use crate::config::{AdapterConfig, Task};
use crate::envelope::{Input, Output};
use crate::error::AdapterError;
use crate::labels::LabelMapping;
use crate::ndlist::NdArray;
use crate::tokenizer::{EncodeOptions, TextTokenizer, TokenBatch};

/// The capability a serving host drives: request in, model input out, and
/// model output in, response out.
///
/// Both calls are synchronous, keep no state between requests and surface
/// every failure unchanged.
pub trait Handler: Send + Sync {
    fn task(&self) -> Task;

    /// Converts a request envelope into model input tensors.
    fn preprocess(&self, input: &Input) -> Result<Output, AdapterError>;

    /// Converts raw model output tensors into the response body.
    fn postprocess(&self, input: &Input) -> Result<Output, AdapterError>;
}

/// A handler for one of the supported tasks, selected by configuration.
#[derive(Debug, Clone)]
pub enum HybridModel {
    TextClassification(TextClassification),
    TokenClassification(TokenClassification),
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<HybridModel>();
        assert_send_sync::<TextClassification>();
        assert_send_sync::<TokenClassification>();
    }
};

impl HybridModel {
    /// Builds the adapter for `task` from explicitly supplied parts.
    pub fn new(
        task: Task,
        config: AdapterConfig,
        tokenizer: Arc<dyn TextTokenizer>,
        mapping: Arc<LabelMapping>,
    ) -> Result<Self, AdapterError> {
        Ok(match task {
            Task::TextClassification => {
                HybridModel::TextClassification(TextClassification::new(config, tokenizer, mapping)?)
            }
            Task::TokenClassification => {
                HybridModel::TokenClassification(TokenClassification::new(config, tokenizer, mapping)?)
            }
        })
    }

    fn handler(&self) -> &dyn Handler {
        match self {
            HybridModel::TextClassification(h) => h as &dyn Handler,
            HybridModel::TokenClassification(h) => h,
        }
    }
}

impl Handler for HybridModel {
    fn task(&self) -> Task {
        self.handler().task()
    }

    fn preprocess(&self, input: &Input) -> Result<Output, AdapterError> {
        self.handler().preprocess(input)
    }

    fn postprocess(&self, input: &Input) -> Result<Output, AdapterError> {
        self.handler().postprocess(input)
    }
}

/// Tokenizes `text` under the fixed options of `config`.
pub(crate) fn encode_text(
    tokenizer: &dyn TextTokenizer,
    config: &AdapterConfig,
    text: &str,
) -> Result<TokenBatch, AdapterError> {
    tokenizer.encode(text, &EncodeOptions::from(config))
}

/// The inbound path shared by every text task: read the payload as text,
/// tokenize it, and attach `[input_ids, attention_mask]`.
pub(crate) fn encode_request(
    tokenizer: &dyn TextTokenizer,
    config: &AdapterConfig,
    input: &Input,
) -> Result<Output, AdapterError> {
    let text = input.get_as_string(None)?;
    let batch = encode_text(tokenizer, config, &text)?;
    debug!("Preprocessed request into {} x {} token arrays", batch.batch_size(), batch.len());

    let mut output = Output::new();
    output.add_as_numpy(&batch.into_arrays())?;
    Ok(output)
}

/// Reads the first tensor of a model response.
pub(crate) fn first_tensor(input: &Input) -> Result<NdArray, AdapterError> {
    input
        .get_as_numpy(None)?
        .into_iter()
        .next()
        .ok_or_else(|| AdapterError::PayloadError("Model output carries no tensors".into()))
}

/// Labels each lane along the last axis of `scores` with the class of its
/// highest score, compared in the tensor's own element type.
///
/// Fails on the first lane that cannot be labelled.
pub(crate) fn label_lanes(
    scores: &NdArray,
    mapping: &LabelMapping,
    expected: &str,
) -> Result<Vec<String>, AdapterError> {
    utils::argmax_lanes(scores)
        .into_iter()
        .map(|index| {
            let index = index.ok_or_else(|| AdapterError::shape(expected, scores.shape()))?;
            mapping.label_for(index).map(str::to_owned)
        })
        .collect()
}
