use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

use crate::error::{InvalidValueError, InvalidValueKind};

use super::ValidatorInfo;

/// Media type assumed for raw image bytes.
pub const DEFAULT_IMAGE_MIME: &str = "image/png";

/// Renders `bytes` as a base64 `data:` URI.
#[must_use]
pub fn image_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Image source: a URI string, or raw bytes given as a list of integers
/// in `0..=255` that are encoded into a `data:` URI.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUriValidator {
    pub(crate) info: ValidatorInfo,
    mime: String,
}

impl ImageUriValidator {
    #[must_use]
    pub fn new(name: impl Into<String>, parent_name: impl Into<String>) -> Self {
        Self::from_info(ValidatorInfo::new(name, parent_name))
    }

    pub(crate) fn from_info(info: ValidatorInfo) -> Self {
        Self {
            info,
            mime: DEFAULT_IMAGE_MIME.to_owned(),
        }
    }

    /// Media type written into URIs built from raw bytes.
    #[must_use]
    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime = mime.into();
        self
    }

    pub fn validate_coerce(&self, value: &Value) -> Result<Value, InvalidValueError> {
        match value {
            Value::Null => self.info.null_to_default(),
            Value::String(_) => Ok(value.clone()),
            Value::Array(items) if !items.is_empty() => {
                let bytes = items
                    .iter()
                    .map(|item| item.as_u64().and_then(|byte| u8::try_from(byte).ok()))
                    .collect::<Option<Vec<u8>>>()
                    .ok_or_else(|| {
                        self.info
                            .error(InvalidValueKind::TypeMismatch, value)
                            .with_detail("raw image data must be a list of bytes")
                    })?;
                Ok(Value::String(image_data_uri(&self.mime, &bytes)))
            }
            _ => Err(self
                .info
                .error(InvalidValueKind::TypeMismatch, value)
                .with_detail("expected an image URI string or raw image bytes")),
        }
    }
}
