use std::collections::HashMap;

use serde::Serialize;

use super::{Input, CONTENT_TYPE, CONTENT_TYPE_JSON, CONTENT_TYPE_NPZ, CONTENT_TYPE_TEXT};
use crate::error::AdapterError;
use crate::ndlist::{self, NdArray};

/// A response produced by model code for the serving host to deliver.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    code: u16,
    message: String,
    properties: HashMap<String, String>,
    content: Vec<(String, Vec<u8>)>,
}

impl Default for Output {
    fn default() -> Self {
        Self {
            code: 200,
            message: "OK".to_string(),
            properties: HashMap::new(),
            content: Vec::new(),
        }
    }
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an error response.
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn set_code(&mut self, code: u16) -> &mut Self {
        self.code = code;
        self
    }

    pub fn set_message(&mut self, message: impl Into<String>) -> &mut Self {
        self.message = message.into();
        self
    }

    pub fn add_property(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    pub fn get_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn add(&mut self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) -> &mut Self {
        self.content.push((key.into(), bytes.into()));
        self
    }

    /// Attaches `arrays`, in order, as one `.npz` payload.
    pub fn add_as_numpy(&mut self, arrays: &[NdArray]) -> Result<&mut Self, AdapterError> {
        let body = ndlist::to_npz(arrays)?;
        self.add_property(CONTENT_TYPE, CONTENT_TYPE_NPZ);
        Ok(self.add("data", body))
    }

    /// Attaches `value` serialized as JSON.
    pub fn add_as_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<&mut Self, AdapterError> {
        let body = serde_json::to_vec(value)?;
        self.add_property(CONTENT_TYPE, CONTENT_TYPE_JSON);
        Ok(self.add("data", body))
    }

    pub fn add_as_string(&mut self, text: impl Into<String>) -> &mut Self {
        self.add_property(CONTENT_TYPE, CONTENT_TYPE_TEXT);
        self.add("data", text.into().into_bytes())
    }

    /// The first payload, which is what a single-payload host writes out.
    pub fn body(&self) -> Option<&[u8]> {
        self.content.first().map(|(_, bytes)| bytes.as_slice())
    }

    pub fn content(&self) -> &[(String, Vec<u8>)] {
        &self.content
    }

    /// Hands this response to the next stage as a request.
    pub fn into_input(self) -> Input {
        Input::from_parts(self.properties, self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_defaults() {
        let output = Output::new();
        assert_eq!(output.code(), 200);
        assert_eq!(output.message(), "OK");
        assert!(output.body().is_none());
    }

    #[test]
    fn test_error_response() {
        let mut output = Output::error(424, "prediction failed");
        assert_eq!(output.code(), 424);
        assert_eq!(output.message(), "prediction failed");

        output.set_code(500).set_message("internal");
        assert_eq!(output.code(), 500);
        assert_eq!(output.message(), "internal");
    }

    #[test]
    fn test_json_body() {
        let mut output = Output::new();
        output.add_as_json(&vec!["positive", "negative"]).unwrap();
        assert_eq!(output.get_property(CONTENT_TYPE), Some(CONTENT_TYPE_JSON));
        assert_eq!(output.body().unwrap(), br#"["positive","negative"]"#);
    }

    #[test]
    fn test_numpy_body_feeds_next_stage() {
        let ids = NdArray::from(arr2(&[[2i64, 4, 3]]).into_dyn());
        let mask = NdArray::from(arr2(&[[1i64, 1, 1]]).into_dyn());

        let mut output = Output::new();
        output.add_as_numpy(&[ids.clone(), mask.clone()]).unwrap();
        assert_eq!(output.get_property(CONTENT_TYPE), Some(CONTENT_TYPE_NPZ));

        let input = output.into_input();
        assert_eq!(input.content_type(), Some(CONTENT_TYPE_NPZ));
        assert_eq!(input.get_as_numpy(None).unwrap(), vec![ids, mask]);
    }

    #[test]
    fn test_string_body() {
        let mut output = Output::new();
        output.add_as_string("ok");
        assert_eq!(output.body().unwrap(), b"ok");
        assert_eq!(output.content().len(), 1);
    }
}
