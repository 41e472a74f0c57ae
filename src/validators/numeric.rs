use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{InvalidValueError, InvalidValueKind};

use super::{ScalarCoerce, ValidatorInfo, coerce_with_array_mode};

/// What a numeric validator does with a value outside `[min, max]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfRangePolicy {
    #[default]
    Reject,
    /// Replace the value with the configured default (legacy behaviour).
    CoerceToDefault,
}

fn range_text<T: std::fmt::Display>(min: Option<T>, max: Option<T>) -> String {
    match (min, max) {
        (Some(min), Some(max)) => format!("in the interval [{min}, {max}]"),
        (Some(min), None) => format!("greater than or equal to {min}"),
        (None, Some(max)) => format!("less than or equal to {max}"),
        (None, None) => "any number".to_owned(),
    }
}

fn out_of_range(
    info: &ValidatorInfo,
    policy: OutOfRangePolicy,
    received: &Value,
    range: String,
) -> Result<Value, InvalidValueError> {
    match policy {
        OutOfRangePolicy::CoerceToDefault if info.default.is_some() => info.null_to_default(),
        _ => Err(info
            .error(InvalidValueKind::OutOfRange, received)
            .with_detail(format!("expected a number {range}"))),
    }
}

fn expect_number(info: &ValidatorInfo, value: &Value) -> Result<f64, InvalidValueError> {
    match value {
        Value::Number(number) => number.as_f64().ok_or_else(|| {
            info.error(InvalidValueKind::TypeMismatch, value)
                .with_detail("number is not representable as a float")
        }),
        _ => Err(info
            .error(InvalidValueKind::TypeMismatch, value)
            .with_detail("expected a number")),
    }
}

/// Floating point property with an optional inclusive range.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberValidator {
    pub(crate) info: ValidatorInfo,
    min: Option<f64>,
    max: Option<f64>,
    policy: OutOfRangePolicy,
}

impl NumberValidator {
    #[must_use]
    pub fn new(name: impl Into<String>, parent_name: impl Into<String>) -> Self {
        Self::from_info(ValidatorInfo::new(name, parent_name))
    }

    pub(crate) fn from_info(info: ValidatorInfo) -> Self {
        Self {
            info,
            min: None,
            max: None,
            policy: OutOfRangePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    #[must_use]
    pub fn with_out_of_range_policy(mut self, policy: OutOfRangePolicy) -> Self {
        self.policy = policy;
        self
    }

    fn in_range(&self, number: f64) -> bool {
        self.min.is_none_or(|min| number >= min) && self.max.is_none_or(|max| number <= max)
    }

    pub fn validate_coerce(&self, value: &Value) -> Result<Value, InvalidValueError> {
        coerce_with_array_mode(self, value)
    }
}

impl ScalarCoerce for NumberValidator {
    fn info(&self) -> &ValidatorInfo {
        &self.info
    }

    fn coerce_scalar(&self, value: &Value) -> Result<Value, InvalidValueError> {
        let number = expect_number(&self.info, value)?;
        if self.in_range(number) {
            Ok(value.clone())
        } else {
            out_of_range(&self.info, self.policy, value, range_text(self.min, self.max))
        }
    }

    fn coerce_element(&self, value: &Value) -> Result<Value, InvalidValueError> {
        let coerced = self.coerce_scalar(value)?;
        Ok(coerced.as_f64().map_or(coerced, Value::from))
    }
}

/// Integer property; in-range finite numbers are truncated toward zero.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegerValidator {
    pub(crate) info: ValidatorInfo,
    min: Option<i64>,
    max: Option<i64>,
    policy: OutOfRangePolicy,
}

impl IntegerValidator {
    #[must_use]
    pub fn new(name: impl Into<String>, parent_name: impl Into<String>) -> Self {
        Self::from_info(ValidatorInfo::new(name, parent_name))
    }

    pub(crate) fn from_info(info: ValidatorInfo) -> Self {
        Self {
            info,
            min: None,
            max: None,
            policy: OutOfRangePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_range(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    #[must_use]
    pub fn with_out_of_range_policy(mut self, policy: OutOfRangePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn validate_coerce(&self, value: &Value) -> Result<Value, InvalidValueError> {
        coerce_with_array_mode(self, value)
    }

    fn truncate(&self, value: &Value) -> Result<i64, InvalidValueError> {
        if let Some(integer) = value.as_i64() {
            return Ok(integer);
        }
        let number = expect_number(&self.info, value)?;
        if number.is_finite() && number >= i64::MIN as f64 && number <= i64::MAX as f64 {
            Ok(number.trunc() as i64)
        } else {
            Err(self
                .info
                .error(InvalidValueKind::OutOfRange, value)
                .with_detail("number does not fit a 64-bit integer"))
        }
    }
}

impl ScalarCoerce for IntegerValidator {
    fn info(&self) -> &ValidatorInfo {
        &self.info
    }

    fn coerce_scalar(&self, value: &Value) -> Result<Value, InvalidValueError> {
        let number = expect_number(&self.info, value)?;
        let in_range = self.min.is_none_or(|min| number >= min as f64)
            && self.max.is_none_or(|max| number <= max as f64);
        if in_range {
            self.truncate(value).map(Value::from)
        } else {
            out_of_range(&self.info, self.policy, value, range_text(self.min, self.max))
        }
    }
}

/// Angle in degrees, wrapped into `(-180, 180]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AngleValidator {
    pub(crate) info: ValidatorInfo,
}

impl AngleValidator {
    #[must_use]
    pub fn new(name: impl Into<String>, parent_name: impl Into<String>) -> Self {
        Self::from_info(ValidatorInfo::new(name, parent_name))
    }

    pub(crate) fn from_info(info: ValidatorInfo) -> Self {
        Self { info }
    }

    pub fn validate_coerce(&self, value: &Value) -> Result<Value, InvalidValueError> {
        coerce_with_array_mode(self, value)
    }
}

#[must_use]
pub(crate) fn wrap_degrees(degrees: f64) -> f64 {
    let wrapped = (degrees + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 { 180.0 } else { wrapped }
}

impl ScalarCoerce for AngleValidator {
    fn info(&self) -> &ValidatorInfo {
        &self.info
    }

    fn coerce_scalar(&self, value: &Value) -> Result<Value, InvalidValueError> {
        let degrees = expect_number(&self.info, value)?;
        if degrees > -180.0 && degrees <= 180.0 {
            Ok(value.clone())
        } else {
            Ok(Value::from(wrap_degrees(degrees)))
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use serde_json::json;

    use super::{IntegerValidator, NumberValidator, OutOfRangePolicy, wrap_degrees};
    use crate::error::InvalidValueKind;

    #[test]
    fn integer_truncates_toward_zero() {
        let validator = IntegerValidator::new("nbins", "histogram");
        assert_eq!(validator.validate_coerce(&json!(3.9)).unwrap(), json!(3));
        assert_eq!(validator.validate_coerce(&json!(-3.9)).unwrap(), json!(-3));
    }

    #[test]
    fn integer_range_applies_before_truncation() {
        let validator = IntegerValidator::new("nbins", "histogram").with_range(Some(-2), Some(3));
        assert_eq!(validator.validate_coerce(&json!(3.0)).unwrap(), json!(3));
        let err = validator.validate_coerce(&json!(3.5)).unwrap_err();
        assert_eq!(err.kind, InvalidValueKind::OutOfRange);
        assert!(validator.validate_coerce(&json!(-2.5)).is_err());
        assert_eq!(validator.validate_coerce(&json!(-1.5)).unwrap(), json!(-1));
    }

    #[test]
    fn legacy_policy_substitutes_default() {
        let validator = NumberValidator::new("opacity", "scatter")
            .with_range(Some(0.0), Some(1.0))
            .with_default(1.0)
            .with_out_of_range_policy(OutOfRangePolicy::CoerceToDefault);
        assert_eq!(validator.validate_coerce(&json!(7)).unwrap(), json!(1.0));
    }

    #[test]
    fn array_elements_are_range_checked() {
        let validator = NumberValidator::new("size", "marker")
            .with_range(Some(0.0), None)
            .array_ok();
        let err = validator.validate_coerce(&json!([1, -2, 3, -4])).unwrap_err();
        assert_eq!(err.kind, InvalidValueKind::OutOfRange);
        assert_eq!(err.invalid_elements, vec![json!(-2), json!(-4)]);
    }

    #[test]
    fn degrees_wrap_into_half_open_interval() {
        assert_relative_eq!(wrap_degrees(190.0), -170.0);
        assert_relative_eq!(wrap_degrees(-180.0), 180.0);
        assert_relative_eq!(wrap_degrees(540.0), 180.0);
    }
}
