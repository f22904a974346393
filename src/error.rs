//! Errors raised while moving state between the host and the store
//!
//! Everything else in the crate falls back to defaults instead of failing;
//! these are the cases where there is nothing sensible to fall back to.

use thiserror::Error;
use wasm_bindgen::JsValue;

#[derive(Error, Debug)]
pub enum StoreError {
    /// A value could not be encoded for the store
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A JS value did not have the expected shape
    #[error("JS conversion error: {0}")]
    Conversion(#[from] serde_wasm_bindgen::Error),

    /// The host handed over something other than a key/value object
    #[error("Storage snapshot must be an object, got {0}")]
    InvalidSnapshot(String),
}

impl From<StoreError> for JsValue {
    fn from(err: StoreError) -> JsValue {
        JsValue::from_str(&err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = StoreError::InvalidSnapshot("array".to_string());
        assert_eq!(err.to_string(), "Storage snapshot must be an object, got array");

        let json: StoreError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(json.to_string().starts_with("JSON error:"));
    }
}
