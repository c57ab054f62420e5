use std::collections::HashMap;

use log::debug;

use super::{CONTENT_TYPE, CONTENT_TYPE_NPZ, CONTENT_TYPE_TEXT};
use crate::error::AdapterError;
use crate::ndlist::{self, NdArray};

/// An incoming request as the serving host hands it to model code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Input {
    properties: HashMap<String, String>,
    content: Vec<(String, Vec<u8>)>,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a request whose only payload is `text`, keyed `data`.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new()
            .with_property(CONTENT_TYPE, CONTENT_TYPE_TEXT)
            .add("data", text.into().into_bytes())
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new().add("data", bytes)
    }

    /// Creates a request carrying `arrays` as a single `.npz` payload.
    pub fn from_numpy(arrays: &[NdArray]) -> Result<Self, AdapterError> {
        Ok(Self::new()
            .with_property(CONTENT_TYPE, CONTENT_TYPE_NPZ)
            .add("data", ndlist::to_npz(arrays)?))
    }

    pub(crate) fn from_parts(properties: HashMap<String, String>, content: Vec<(String, Vec<u8>)>) -> Self {
        Self { properties, content }
    }

    pub fn add(mut self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.content.push((key.into(), bytes.into()));
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    /// Looks a property up by exact key, then ignoring ASCII case.
    pub fn get_property(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .or_else(|| {
                self.properties
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(key))
                    .map(|(_, v)| v)
            })
            .map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get_property(CONTENT_TYPE)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.content.iter().map(|(k, _)| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Returns the payload stored under `key`, or the first payload when no
    /// key is given.
    ///
    /// # Errors
    /// - `PayloadError` if the request carries no content
    /// - `PayloadError` if nothing is stored under `key`
    pub fn get_as_bytes(&self, key: Option<&str>) -> Result<&[u8], AdapterError> {
        let entry = match key {
            Some(key) => self
                .content
                .iter()
                .find(|(k, _)| k == key)
                .ok_or_else(|| AdapterError::PayloadError(format!("No content under key '{}'", key)))?,
            None => self
                .content
                .first()
                .ok_or_else(|| AdapterError::PayloadError("Request has no content".into()))?,
        };
        Ok(entry.1.as_slice())
    }

    /// Decodes the payload as UTF-8 text.
    pub fn get_as_string(&self, key: Option<&str>) -> Result<String, AdapterError> {
        let bytes = self.get_as_bytes(key)?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    pub fn get_as_json(&self, key: Option<&str>) -> Result<serde_json::Value, AdapterError> {
        Ok(serde_json::from_slice(self.get_as_bytes(key)?)?)
    }

    /// Decodes the payload as a list of tensors.
    ///
    /// An `.npz` archive yields its arrays in list order; a bare `.npy` blob
    /// yields a one-element list.
    pub fn get_as_numpy(&self, key: Option<&str>) -> Result<Vec<NdArray>, AdapterError> {
        let bytes = self.get_as_bytes(key)?;
        let arrays = if ndlist::is_npy(bytes) {
            vec![NdArray::from_npy(bytes)?]
        } else if ndlist::is_npz(bytes) {
            ndlist::from_npz(bytes)?
        } else {
            return Err(AdapterError::CodecError(
                "Payload is neither an .npz archive nor an .npy array".into(),
            ));
        };
        debug!("Decoded {} tensor(s) from {} bytes", arrays.len(), bytes.len());
        Ok(arrays)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_text_payload() {
        let input = Input::from_text("great product");
        assert_eq!(input.get_as_string(None).unwrap(), "great product");
        assert_eq!(input.get_as_string(Some("data")).unwrap(), "great product");
        assert_eq!(input.content_type(), Some(CONTENT_TYPE_TEXT));
    }

    #[test]
    fn test_missing_payload() {
        let input = Input::new();
        assert!(matches!(input.get_as_string(None), Err(AdapterError::PayloadError(_))));

        let input = Input::from_text("hello");
        assert!(matches!(input.get_as_bytes(Some("inputs")), Err(AdapterError::PayloadError(_))));
    }

    #[test]
    fn test_invalid_utf8_payload() {
        let input = Input::from_bytes(vec![0xff, 0xfe, 0x00]);
        assert!(matches!(input.get_as_string(None), Err(AdapterError::InvalidUtf8(_))));
    }

    #[test]
    fn test_property_lookup_ignores_case() {
        let input = Input::from_bytes(b"{}".to_vec()).with_property("content-type", "application/json");
        assert_eq!(input.content_type(), Some("application/json"));
        assert!(input.get_as_json(None).unwrap().is_object());
    }

    #[test]
    fn test_numpy_payloads() {
        let scores = NdArray::from(arr2(&[[0.1f32, 0.9], [0.8, 0.2]]).into_dyn());

        let archive = Input::from_numpy(&[scores.clone()]).unwrap();
        assert_eq!(archive.get_as_numpy(None).unwrap(), vec![scores.clone()]);

        let bare = Input::from_bytes(scores.to_npy());
        assert_eq!(bare.get_as_numpy(None).unwrap(), vec![scores]);

        let text = Input::from_text("not a tensor");
        assert!(matches!(text.get_as_numpy(None), Err(AdapterError::CodecError(_))));
    }
}
