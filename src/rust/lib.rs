//! Adapters that plug a pretrained text classifier into a model-serving host.
//!
//! A host drives two calls per request:
//! - `preprocess` turns a request envelope into the model inputs
//!   `[input_ids, attention_mask]`, packed as an `.npz` payload.
//! - `postprocess` turns the model's `(rows, classes)` score matrix back into
//!   one label per row, as a JSON array.
//!
//! Tokenizer, label mapping and configuration are handed to each adapter at
//! construction; the adapters keep no other state.
//!
//! # Basic Usage
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use hybrid_classifier::{Handler, Input, NdArray, TextClassification};
//! use ndarray::arr2;
//!
//! let handler = TextClassification::builder()
//!     .with_tokenizer_file("tests/fixtures/tokenizer.json")?
//!     .with_labels_json(r#"{"0": "negative", "1": "positive"}"#)?
//!     .build_text_classification()?;
//!
//! // request -> model inputs
//! let model_input = handler.preprocess(&Input::from_text("great product"))?;
//! let arrays = model_input.into_input().get_as_numpy(None)?;
//! assert_eq!(arrays[0].shape(), arrays[1].shape());
//!
//! // model outputs -> labels
//! let scores = NdArray::from(arr2(&[[0.1f32, 0.9], [0.8, 0.2]]).into_dyn());
//! let response = handler.postprocess(&Input::from_numpy(&[scores])?)?;
//! let labels: Vec<String> = serde_json::from_slice(response.body().unwrap_or_default())?;
//! assert_eq!(labels, vec!["positive", "negative"]);
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! Handlers are `Send + Sync` and can be shared across worker threads with `Arc`.

pub mod config;
pub mod envelope;
mod error;
pub mod handler;
pub mod labels;
pub mod ndlist;
pub mod tokenizer;

pub use config::{AdapterConfig, PaddingStrategy, Task};
pub use envelope::{Input, Output};
pub use error::AdapterError;
pub use handler::{Handler, HandlerBuilder, HybridModel, TextClassification, TokenClassification};
pub use labels::LabelMapping;
pub use ndlist::NdArray;
pub use tokenizer::{EncodeOptions, HuggingFaceTokenizer, TextTokenizer, TokenBatch};

pub fn init_logger() {
    env_logger::init();
}
