use serde_json::Value;

use crate::error::{FigureError, FigureResult, InvalidValueError, InvalidValueKind};

use super::{ScalarCoerce, Validator, ValidatorInfo, coerce_with_array_mode};

/// Data column: any sequence, stored as given.
#[derive(Debug, Clone, PartialEq)]
pub struct DataArrayValidator {
    pub(crate) info: ValidatorInfo,
}

impl DataArrayValidator {
    #[must_use]
    pub fn new(name: impl Into<String>, parent_name: impl Into<String>) -> Self {
        Self::from_info(ValidatorInfo::new(name, parent_name))
    }

    /// A missing default means "unset" rather than "required".
    pub(crate) fn from_info(mut info: ValidatorInfo) -> Self {
        info.default.get_or_insert(Value::Null);
        Self { info }
    }

    pub fn validate_coerce(&self, value: &Value) -> Result<Value, InvalidValueError> {
        match value {
            Value::Null => self.info.null_to_default(),
            Value::Array(_) => Ok(value.clone()),
            _ => Err(self
                .info
                .error(InvalidValueKind::TypeMismatch, value)
                .with_detail("expected a sequence")),
        }
    }
}

/// Accepts anything.
#[derive(Debug, Clone, PartialEq)]
pub struct AnyValidator {
    pub(crate) info: ValidatorInfo,
}

impl AnyValidator {
    #[must_use]
    pub fn new(name: impl Into<String>, parent_name: impl Into<String>) -> Self {
        Self::from_info(ValidatorInfo::new(name, parent_name))
    }

    pub(crate) fn from_info(mut info: ValidatorInfo) -> Self {
        info.default.get_or_insert(Value::Null);
        Self { info }
    }

    pub fn validate_coerce(&self, value: &Value) -> Result<Value, InvalidValueError> {
        match value {
            Value::Null => Ok(self.info.default.clone().unwrap_or(Value::Null)),
            _ => coerce_with_array_mode(self, value),
        }
    }
}

impl ScalarCoerce for AnyValidator {
    fn info(&self) -> &ValidatorInfo {
        &self.info
    }

    fn coerce_scalar(&self, value: &Value) -> Result<Value, InvalidValueError> {
        Ok(value.clone())
    }
}

/// Tuple-like sequence; position `i` is checked by item validator `i`.
#[derive(Debug, Clone)]
pub struct InfoArrayValidator {
    pub(crate) info: ValidatorInfo,
    items: Vec<Validator>,
    free_length: bool,
}

impl InfoArrayValidator {
    /// Builds item validators from schema fragments, named `name[i]`.
    pub fn new(
        name: impl Into<String>,
        parent_name: impl Into<String>,
        items: &[Value],
    ) -> FigureResult<Self> {
        let info = ValidatorInfo::new(name, parent_name);
        let items = items
            .iter()
            .enumerate()
            .map(|(index, schema)| {
                Validator::from_schema(&format!("{}[{index}]", info.name), &info.parent_name, schema)
            })
            .collect::<FigureResult<Vec<_>>>()?;
        Ok(Self::with_items(info, items))
    }

    /// Uses already-built item validators.
    #[must_use]
    pub fn with_items(info: ValidatorInfo, items: Vec<Validator>) -> Self {
        Self {
            info,
            items,
            free_length: false,
        }
    }

    /// Allow sequences shorter than the item list.
    #[must_use]
    pub fn free_length(mut self) -> Self {
        self.free_length = true;
        self
    }

    pub fn validate_coerce(&self, value: &Value) -> FigureResult<Value> {
        let items = match value {
            Value::Null => return Ok(self.info.null_to_default()?),
            Value::Array(items) => items,
            _ => {
                return Err(self
                    .info
                    .error(InvalidValueKind::TypeMismatch, value)
                    .with_detail(format!("expected a sequence of {} elements", self.items.len()))
                    .into());
            }
        };

        let length_ok = if self.free_length {
            items.len() <= self.items.len()
        } else {
            items.len() == self.items.len()
        };
        if !length_ok {
            let expected = if self.free_length {
                format!("at most {} elements", self.items.len())
            } else {
                format!("exactly {} elements", self.items.len())
            };
            return Err(self
                .info
                .error(InvalidValueKind::WrongLength, value)
                .with_detail(format!("expected {expected}, got {}", items.len()))
                .into());
        }

        items
            .iter()
            .zip(&self.items)
            .map(|(item, validator)| validator.validate_coerce(item))
            .collect::<FigureResult<Vec<_>>>()
            .map(Value::Array)
    }

    pub(crate) fn validate_item(&self, index: usize, value: &Value) -> FigureResult<Value> {
        match self.items.get(index) {
            Some(validator) => validator.validate_coerce(value),
            None => Err(FigureError::unknown_property(
                &self.info.parent_name,
                format!("{}[{index}]", self.info.name),
            )),
        }
    }
}
