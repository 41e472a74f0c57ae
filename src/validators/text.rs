use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::core::tree::values_equal;
use crate::error::{InvalidValueError, InvalidValueKind};

use super::{ScalarCoerce, ValidatorInfo, coerce_with_array_mode};

fn expect_str<'a>(info: &ValidatorInfo, value: &'a Value) -> Result<&'a str, InvalidValueError> {
    value.as_str().ok_or_else(|| {
        info.error(InvalidValueKind::TypeMismatch, value)
            .with_detail("expected a string")
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct BooleanValidator {
    pub(crate) info: ValidatorInfo,
}

impl BooleanValidator {
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

impl ScalarCoerce for BooleanValidator {
    fn info(&self) -> &ValidatorInfo {
        &self.info
    }

    fn coerce_scalar(&self, value: &Value) -> Result<Value, InvalidValueError> {
        match value {
            Value::Bool(_) => Ok(value.clone()),
            _ => Err(self
                .info
                .error(InvalidValueKind::TypeMismatch, value)
                .with_detail("expected a boolean")),
        }
    }
}

/// Free text, optionally non-blank or restricted to a fixed set.
#[derive(Debug, Clone, PartialEq)]
pub struct StringValidator {
    pub(crate) info: ValidatorInfo,
    no_blank: bool,
    values: Vec<String>,
}

impl StringValidator {
    #[must_use]
    pub fn new(name: impl Into<String>, parent_name: impl Into<String>) -> Self {
        Self::from_info(ValidatorInfo::new(name, parent_name))
    }

    pub(crate) fn from_info(info: ValidatorInfo) -> Self {
        Self {
            info,
            no_blank: false,
            values: Vec::new(),
        }
    }

    /// Reject the empty string.
    #[must_use]
    pub fn no_blank(mut self) -> Self {
        self.no_blank = true;
        self
    }

    #[must_use]
    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate_coerce(&self, value: &Value) -> Result<Value, InvalidValueError> {
        coerce_with_array_mode(self, value)
    }
}

impl ScalarCoerce for StringValidator {
    fn info(&self) -> &ValidatorInfo {
        &self.info
    }

    fn coerce_scalar(&self, value: &Value) -> Result<Value, InvalidValueError> {
        let text = expect_str(&self.info, value)?;
        if self.no_blank && text.is_empty() {
            return Err(self
                .info
                .error(InvalidValueKind::InvalidFormat, value)
                .with_detail("expected a non-empty string"));
        }
        if !self.values.is_empty() && !self.values.iter().any(|allowed| allowed == text) {
            return Err(self
                .info
                .error(InvalidValueKind::NotInEnumeration, value)
                .with_valid_description(format!(
                    "    Valid values are: [{}]",
                    self.values.join(", ")
                )));
        }
        Ok(value.clone())
    }
}

#[derive(Debug, Clone)]
enum EnumToken {
    Literal(Value),
    Pattern { source: String, regex: Regex },
}

impl EnumToken {
    /// Strings wrapped in `/.../` are regular expressions matched against the
    /// whole value.
    fn parse(token: Value) -> Self {
        if let Some(source) = token
            .as_str()
            .filter(|text| text.len() >= 2 && text.starts_with('/') && text.ends_with('/'))
        {
            let inner = &source[1..source.len() - 1];
            match Regex::new(&format!("^(?:{inner})$")) {
                Ok(regex) => {
                    return Self::Pattern {
                        source: source.to_owned(),
                        regex,
                    };
                }
                Err(err) => {
                    warn!(token = source, error = %err, "enumeration pattern does not compile; treating it as a literal");
                }
            }
        }
        Self::Literal(token)
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Literal(token) => values_equal(token, value),
            Self::Pattern { regex, .. } => value.as_str().is_some_and(|text| regex.is_match(text)),
        }
    }

    fn render(&self) -> String {
        match self {
            Self::Literal(Value::String(text)) => format!("'{text}'"),
            Self::Literal(other) => other.to_string(),
            Self::Pattern { source, .. } => source.clone(),
        }
    }
}

/// Value drawn from a fixed token list; `/regex/` tokens match patterns.
#[derive(Debug, Clone)]
pub struct EnumeratedValidator {
    pub(crate) info: ValidatorInfo,
    tokens: Vec<EnumToken>,
}

impl EnumeratedValidator {
    #[must_use]
    pub fn new<I, V>(name: impl Into<String>, parent_name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::from_info(
            ValidatorInfo::new(name, parent_name),
            values.into_iter().map(Into::into).collect(),
        )
    }

    pub(crate) fn from_info(info: ValidatorInfo, values: Vec<Value>) -> Self {
        Self {
            info,
            tokens: values.into_iter().map(EnumToken::parse).collect(),
        }
    }

    pub fn validate_coerce(&self, value: &Value) -> Result<Value, InvalidValueError> {
        coerce_with_array_mode(self, value)
    }

    fn description(&self) -> String {
        let rendered: Vec<String> = self.tokens.iter().map(EnumToken::render).collect();
        let mut text = format!("    Valid values are: [{}]", rendered.join(", "));
        if self.tokens.iter().any(|token| matches!(token, EnumToken::Pattern { .. })) {
            text.push_str("\n    Tokens wrapped in '/' are regular expressions matched against the whole value");
        }
        text
    }
}

impl ScalarCoerce for EnumeratedValidator {
    fn info(&self) -> &ValidatorInfo {
        &self.info
    }

    fn coerce_scalar(&self, value: &Value) -> Result<Value, InvalidValueError> {
        if self.tokens.iter().any(|token| token.matches(value)) {
            Ok(value.clone())
        } else {
            Err(self
                .info
                .error(InvalidValueKind::NotInEnumeration, value)
                .with_valid_description(self.description()))
        }
    }
}

/// `+`-joined combination of flags, or exactly one extra.
#[derive(Debug, Clone, PartialEq)]
pub struct FlaglistValidator {
    pub(crate) info: ValidatorInfo,
    flags: Vec<String>,
    extras: Vec<String>,
}

impl FlaglistValidator {
    #[must_use]
    pub fn new<F, E>(
        name: impl Into<String>,
        parent_name: impl Into<String>,
        flags: F,
        extras: E,
    ) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        Self::from_info(
            ValidatorInfo::new(name, parent_name),
            flags.into_iter().map(Into::into).collect(),
            extras.into_iter().map(Into::into).collect(),
        )
    }

    pub(crate) fn from_info(info: ValidatorInfo, flags: Vec<String>, extras: Vec<String>) -> Self {
        Self {
            info,
            flags,
            extras,
        }
    }

    pub fn validate_coerce(&self, value: &Value) -> Result<Value, InvalidValueError> {
        coerce_with_array_mode(self, value)
    }

    fn accepts(&self, text: &str) -> bool {
        if self.extras.iter().any(|extra| extra == text) {
            return true;
        }
        text.split('+')
            .all(|flag| self.flags.iter().any(|known| known == flag))
    }

    fn description(&self) -> String {
        let mut text = format!(
            "    Any combination of [{}] joined with '+' characters (e.g. '{}')",
            self.flags.join(", "),
            self.flags.iter().take(2).cloned().collect::<Vec<_>>().join("+"),
        );
        if !self.extras.is_empty() {
            text.push_str(&format!(
                "\n    OR exactly one of [{}] (e.g. '{}')",
                self.extras.join(", "),
                self.extras[0]
            ));
        }
        text
    }
}

impl ScalarCoerce for FlaglistValidator {
    fn info(&self) -> &ValidatorInfo {
        &self.info
    }

    fn coerce_scalar(&self, value: &Value) -> Result<Value, InvalidValueError> {
        let text = expect_str(&self.info, value)
            .map_err(|err| err.with_valid_description(self.description()))?;
        if self.accepts(text) {
            Ok(value.clone())
        } else {
            Err(self
                .info
                .error(InvalidValueKind::InvalidFormat, value)
                .with_valid_description(self.description()))
        }
    }
}

/// Subplot reference: the base token, or the base token followed by an
/// integer greater than one (`x`, `x2`, `x3`, ...).
#[derive(Debug, Clone)]
pub struct SubplotidValidator {
    pub(crate) info: ValidatorInfo,
    base: String,
    pattern: Regex,
}

impl SubplotidValidator {
    #[must_use]
    pub fn new(name: impl Into<String>, parent_name: impl Into<String>, base: impl Into<String>) -> Self {
        let base = base.into();
        let mut info = ValidatorInfo::new(name, parent_name);
        info.default = Some(Value::String(base.clone()));
        Self {
            info,
            pattern: subplot_suffix_pattern(&base),
            base,
        }
    }

    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn validate_coerce(&self, value: &Value) -> Result<Value, InvalidValueError> {
        coerce_with_array_mode(self, value)
    }

    fn description(&self) -> String {
        format!(
            "    The string '{base}' optionally followed by an integer >= 2 (e.g. '{base}', '{base}2', '{base}3', etc.)",
            base = self.base
        )
    }
}

/// `^base(\d*)$` for the given literal base token.
pub(crate) fn subplot_suffix_pattern(base: &str) -> Regex {
    let source = format!(r"^{}(\d*)$", regex::escape(base));
    Regex::new(&source).expect("escaped subplot base compiles")
}

/// Numeric suffix accepted by a subplot-id pattern: `Some(None)` for the bare
/// base token, `Some(Some(n))` with `n >= 2`, `None` when rejected.
pub(crate) fn subplot_suffix(pattern: &Regex, text: &str) -> Option<Option<u64>> {
    let captures = pattern.captures(text)?;
    let digits = captures.get(1).map_or("", |m| m.as_str());
    if digits.is_empty() {
        return Some(None);
    }
    match digits.parse::<u64>() {
        Ok(index) if index > 1 => Some(Some(index)),
        _ => None,
    }
}

impl ScalarCoerce for SubplotidValidator {
    fn info(&self) -> &ValidatorInfo {
        &self.info
    }

    fn coerce_scalar(&self, value: &Value) -> Result<Value, InvalidValueError> {
        let text = expect_str(&self.info, value)
            .map_err(|err| err.with_valid_description(self.description()))?;
        if subplot_suffix(&self.pattern, text).is_some() {
            Ok(value.clone())
        } else {
            Err(self
                .info
                .error(InvalidValueKind::InvalidFormat, value)
                .with_valid_description(self.description()))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{EnumeratedValidator, FlaglistValidator, StringValidator};
    use crate::error::InvalidValueKind;

    #[test]
    fn regex_tokens_match_whole_value() {
        let validator = EnumeratedValidator::new("xref", "shape", ["paper", "/^x([2-9]|[1-9][0-9]+)?$/"]);
        assert!(validator.validate_coerce(&json!("x3")).is_ok());
        assert!(validator.validate_coerce(&json!("paper")).is_ok());
        assert!(validator.validate_coerce(&json!("y")).is_err());
    }

    #[test]
    fn extras_may_not_be_combined() {
        let validator = FlaglistValidator::new("hoverinfo", "scatter", ["x", "y", "text"], ["all", "none"]);
        assert!(validator.validate_coerce(&json!("x+y")).is_ok());
        assert!(validator.validate_coerce(&json!("none")).is_ok());
        let err = validator.validate_coerce(&json!("x+none")).unwrap_err();
        assert_eq!(err.kind, InvalidValueKind::InvalidFormat);
        assert!(err.to_string().contains("OR exactly one of [all, none]"));
    }

    #[test]
    fn blank_strings_can_be_forbidden() {
        let validator = StringValidator::new("name", "scatter").no_blank();
        assert!(validator.validate_coerce(&json!("")).is_err());
        assert!(validator.validate_coerce(&json!("trace 0")).is_ok());
    }
}
