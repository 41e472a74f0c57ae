use std::fmt;

use serde_json::Value;
use thiserror::Error;

pub type FigureResult<T> = Result<T, FigureError>;

#[derive(Debug, Error)]
pub enum FigureError {
    #[error(transparent)]
    InvalidValue(#[from] InvalidValueError),

    #[error("`{property}` is not a valid property of {parent_name}")]
    UnknownProperty {
        parent_name: String,
        property: String,
    },

    #[error(transparent)]
    InvalidTraceAssignment(#[from] TraceAssignmentError),

    #[error("stale {channel} echo: received message id {received}, expected {expected}")]
    StaleMessage {
        channel: &'static str,
        received: u64,
        expected: u64,
    },

    #[error("sync transport failure: {0}")]
    Transport(String),

    #[error("invalid schema fragment: {0}")]
    InvalidSchema(String),

    #[error("{type_name} object already belongs to another parent")]
    NodeAlreadyOwned { type_name: String },

    #[error("trace index {index} is out of range for a figure with {len} traces")]
    TraceIndexOutOfRange { index: usize, len: usize },
}

impl FigureError {
    pub(crate) fn unknown_property(parent_name: impl Into<String>, property: impl Into<String>) -> Self {
        Self::UnknownProperty {
            parent_name: parent_name.into(),
            property: property.into(),
        }
    }
}

/// Reason a validator rejected a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidValueKind {
    TypeMismatch,
    OutOfRange,
    NotInEnumeration,
    InvalidFormat,
    WrongLength,
    /// `null` was supplied for a property with no configured default.
    NoDefault,
}

impl InvalidValueKind {
    const fn describe(self) -> &'static str {
        match self {
            Self::TypeMismatch => "has the wrong type",
            Self::OutOfRange => "is out of range",
            Self::NotInEnumeration => "is not one of the allowed values",
            Self::InvalidFormat => "is malformed",
            Self::WrongLength => "has the wrong length",
            Self::NoDefault => "has no default value and may not be null",
        }
    }
}

/// Validator rejection, rendered with enough context to fix the call site.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidValueError {
    pub property: String,
    pub parent_name: String,
    pub kind: InvalidValueKind,
    pub received: String,
    pub received_type: &'static str,
    pub invalid_elements: Vec<Value>,
    pub detail: Option<String>,
    pub valid_description: Option<String>,
}

impl InvalidValueError {
    pub(crate) fn new(
        property: &str,
        parent_name: &str,
        kind: InvalidValueKind,
        received: &Value,
    ) -> Self {
        Self {
            property: property.to_owned(),
            parent_name: parent_name.to_owned(),
            kind,
            received: received.to_string(),
            received_type: json_type_name(received),
            invalid_elements: Vec::new(),
            detail: None,
            valid_description: None,
        }
    }

    #[must_use]
    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    #[must_use]
    pub(crate) fn with_invalid_elements(mut self, elements: Vec<Value>) -> Self {
        self.invalid_elements = elements;
        self
    }

    #[must_use]
    pub(crate) fn with_valid_description(mut self, description: impl Into<String>) -> Self {
        self.valid_description = Some(description.into());
        self
    }
}

impl fmt::Display for InvalidValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "the `{}` property of {} {}",
            self.property,
            self.parent_name,
            self.kind.describe()
        )?;
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        write!(
            f,
            "\n    received value of type {}: {}",
            self.received_type, self.received
        )?;
        if !self.invalid_elements.is_empty() {
            let rendered: Vec<String> = self.invalid_elements.iter().map(Value::to_string).collect();
            write!(f, "\n    invalid elements include: [{}]", rendered.join(", "))?;
        }
        if let Some(description) = &self.valid_description {
            write!(f, "\n{description}")?;
        }
        Ok(())
    }
}

impl std::error::Error for InvalidValueError {}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceAssignmentError {
    #[error("trace identifier `{0}` appears more than once in the new trace sequence")]
    DuplicateIdentifier(String),

    #[error("trace identifier `{0}` does not belong to an existing trace; traces may only be reordered or removed")]
    UnknownIdentifier(String),

    #[error("trace type `{0}` is not supported by this figure")]
    UnsupportedTraceType(String),

    #[error("trace `{0}` already belongs to a figure or parent object")]
    AlreadyOwned(String),

    #[error("trace `{0}` belongs to a figure; its identifier cannot change")]
    IdentifierChange(String),
}

/// JSON-flavoured type name used in validation messages.
#[must_use]
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "mapping",
    }
}
