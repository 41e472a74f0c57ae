//! Per-property value checking and coercion.
//!
//! Every validator is a pure function of the raw value: it either returns
//! the coerced value or an [`InvalidValueError`] describing what was wrong.
//! Scalar kinds share the array-ok driver in this module, so element-wise
//! validation and invalid-element reporting behave identically across kinds.

mod array;
mod color;
mod compound;
mod image;
mod numeric;
mod text;

use std::rc::Rc;

use serde_json::Value;

use crate::error::{FigureError, FigureResult, InvalidValueError, InvalidValueKind};
use crate::node::NodeClass;

pub use array::{AnyValidator, DataArrayValidator, InfoArrayValidator};
pub use color::{
    ColorValidator, ColorscaleValidator, NAMED_COLORSCALES, NAMED_COLORS, is_valid_color,
    valid_color_description,
};
pub use compound::{CompoundArrayValidator, CompoundValidator};
pub use image::{DEFAULT_IMAGE_MIME, ImageUriValidator, image_data_uri};
pub use numeric::{AngleValidator, IntegerValidator, NumberValidator, OutOfRangePolicy};
pub use text::{
    BooleanValidator, EnumeratedValidator, FlaglistValidator, StringValidator,
    SubplotidValidator,
};
pub(crate) use text::{subplot_suffix, subplot_suffix_pattern};

/// Upper bound on offending elements copied into an array-ok rejection.
pub const INVALID_ELEMENT_REPORT_LIMIT: usize = 10;

/// Identity and shared options of a validator.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorInfo {
    pub name: String,
    pub parent_name: String,
    /// `None` means no default: `null` input is rejected.
    /// `Some(Value::Null)` is an explicit "unset" default.
    pub default: Option<Value>,
    pub array_ok: bool,
}

impl ValidatorInfo {
    #[must_use]
    pub fn new(name: impl Into<String>, parent_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_name: parent_name.into(),
            default: None,
            array_ok: false,
        }
    }

    pub(crate) fn error(&self, kind: InvalidValueKind, received: &Value) -> InvalidValueError {
        InvalidValueError::new(&self.name, &self.parent_name, kind, received)
    }

    pub(crate) fn null_to_default(&self) -> Result<Value, InvalidValueError> {
        self.default
            .clone()
            .ok_or_else(|| self.error(InvalidValueKind::NoDefault, &Value::Null))
    }
}

/// Scalar coercion hook used by [`coerce_with_array_mode`].
pub(crate) trait ScalarCoerce {
    fn info(&self) -> &ValidatorInfo;

    fn coerce_scalar(&self, value: &Value) -> Result<Value, InvalidValueError>;

    /// Coercion applied to each element of an array-ok sequence.
    fn coerce_element(&self, value: &Value) -> Result<Value, InvalidValueError> {
        self.coerce_scalar(value)
    }

    fn coerce_sequence(&self, items: &[Value]) -> Result<Value, InvalidValueError> {
        coerce_elements(self, items)
    }
}

/// Dispatches `null`, sequence and scalar input for a scalar validator.
pub(crate) fn coerce_with_array_mode<V>(validator: &V, value: &Value) -> Result<Value, InvalidValueError>
where
    V: ScalarCoerce + ?Sized,
{
    let info = validator.info();
    match value {
        Value::Null => info.null_to_default(),
        Value::Array(items) if info.array_ok => validator.coerce_sequence(items),
        Value::Array(_) => Err(info
            .error(InvalidValueKind::TypeMismatch, value)
            .with_detail("expected a scalar value, not a sequence")),
        scalar => validator.coerce_scalar(scalar),
    }
}

/// Element-wise coercion collecting up to [`INVALID_ELEMENT_REPORT_LIMIT`]
/// offending elements.
pub(crate) fn coerce_elements<V>(validator: &V, items: &[Value]) -> Result<Value, InvalidValueError>
where
    V: ScalarCoerce + ?Sized,
{
    let mut coerced = Vec::with_capacity(items.len());
    let mut invalid = Vec::new();
    let mut first_error: Option<InvalidValueError> = None;

    for item in items {
        match validator.coerce_element(item) {
            Ok(value) => coerced.push(value),
            Err(err) => {
                if invalid.len() < INVALID_ELEMENT_REPORT_LIMIT {
                    invalid.push(item.clone());
                }
                first_error.get_or_insert(err);
            }
        }
    }

    match first_error {
        None => Ok(Value::Array(coerced)),
        Some(first) => {
            let mut err = validator
                .info()
                .error(first.kind, &Value::Array(items.to_vec()))
                .with_detail("every element must be valid")
                .with_invalid_elements(invalid);
            err.valid_description = first.valid_description;
            Err(err)
        }
    }
}

/// Any validator a node class can declare for one of its properties.
#[derive(Debug, Clone)]
pub enum Validator {
    DataArray(DataArrayValidator),
    Enumerated(EnumeratedValidator),
    Boolean(BooleanValidator),
    Number(NumberValidator),
    Integer(IntegerValidator),
    String(StringValidator),
    Color(ColorValidator),
    Colorscale(ColorscaleValidator),
    Angle(AngleValidator),
    Subplotid(SubplotidValidator),
    Flaglist(FlaglistValidator),
    ImageUri(ImageUriValidator),
    Any(AnyValidator),
    InfoArray(InfoArrayValidator),
    Compound(CompoundValidator),
    CompoundArray(CompoundArrayValidator),
}

macro_rules! validator_from {
    ($($variant:ident => $ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Validator {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )+
    };
}

validator_from! {
    DataArray => DataArrayValidator,
    Enumerated => EnumeratedValidator,
    Boolean => BooleanValidator,
    Number => NumberValidator,
    Integer => IntegerValidator,
    String => StringValidator,
    Color => ColorValidator,
    Colorscale => ColorscaleValidator,
    Angle => AngleValidator,
    Subplotid => SubplotidValidator,
    Flaglist => FlaglistValidator,
    ImageUri => ImageUriValidator,
    Any => AnyValidator,
    InfoArray => InfoArrayValidator,
    Compound => CompoundValidator,
    CompoundArray => CompoundArrayValidator,
}

impl Validator {
    #[must_use]
    pub fn info(&self) -> &ValidatorInfo {
        match self {
            Self::DataArray(v) => &v.info,
            Self::Enumerated(v) => &v.info,
            Self::Boolean(v) => &v.info,
            Self::Number(v) => &v.info,
            Self::Integer(v) => &v.info,
            Self::String(v) => &v.info,
            Self::Color(v) => &v.info,
            Self::Colorscale(v) => &v.info,
            Self::Angle(v) => &v.info,
            Self::Subplotid(v) => &v.info,
            Self::Flaglist(v) => &v.info,
            Self::ImageUri(v) => &v.info,
            Self::Any(v) => &v.info,
            Self::InfoArray(v) => &v.info,
            Self::Compound(v) => &v.info,
            Self::CompoundArray(v) => &v.info,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.info().name
    }

    #[must_use]
    pub fn parent_name(&self) -> &str {
        &self.info().parent_name
    }

    #[must_use]
    pub fn is_compound(&self) -> bool {
        matches!(self, Self::Compound(_) | Self::CompoundArray(_))
    }

    /// Class of the nested node(s) for compound kinds.
    #[must_use]
    pub fn compound_class(&self) -> Option<&Rc<NodeClass>> {
        match self {
            Self::Compound(v) => Some(v.class()),
            Self::CompoundArray(v) => Some(v.class()),
            _ => None,
        }
    }

    /// Validates and coerces a raw value.
    ///
    /// Compound kinds accept mappings (or lists of mappings) and return the
    /// validated mapping data.
    pub fn validate_coerce(&self, value: &Value) -> FigureResult<Value> {
        let coerced = match self {
            Self::DataArray(v) => v.validate_coerce(value)?,
            Self::Enumerated(v) => v.validate_coerce(value)?,
            Self::Boolean(v) => v.validate_coerce(value)?,
            Self::Number(v) => v.validate_coerce(value)?,
            Self::Integer(v) => v.validate_coerce(value)?,
            Self::String(v) => v.validate_coerce(value)?,
            Self::Color(v) => v.validate_coerce(value)?,
            Self::Colorscale(v) => v.validate_coerce(value)?,
            Self::Angle(v) => v.validate_coerce(value)?,
            Self::Subplotid(v) => v.validate_coerce(value)?,
            Self::Flaglist(v) => v.validate_coerce(value)?,
            Self::ImageUri(v) => v.validate_coerce(value)?,
            Self::Any(v) => v.validate_coerce(value)?,
            Self::InfoArray(v) => v.validate_coerce(value)?,
            Self::Compound(v) => return v.validate_value(value),
            Self::CompoundArray(v) => return v.validate_value(value),
        };
        Ok(coerced)
    }

    /// Validates one element addressed by index inside this property's value,
    /// e.g. `range[1]` or `marker.color[3]`.
    pub(crate) fn validate_element(&self, index: usize, value: &Value) -> FigureResult<Value> {
        let coerced = match self {
            Self::DataArray(_) | Self::Any(_) => value.clone(),
            Self::InfoArray(v) => return v.validate_item(index, value),
            Self::Enumerated(v) if v.info.array_ok => v.coerce_element(value)?,
            Self::Boolean(v) if v.info.array_ok => v.coerce_element(value)?,
            Self::Number(v) if v.info.array_ok => v.coerce_element(value)?,
            Self::Integer(v) if v.info.array_ok => v.coerce_element(value)?,
            Self::String(v) if v.info.array_ok => v.coerce_element(value)?,
            Self::Color(v) if v.info.array_ok => v.coerce_element(value)?,
            Self::Angle(v) if v.info.array_ok => v.coerce_element(value)?,
            Self::Subplotid(v) if v.info.array_ok => v.coerce_element(value)?,
            Self::Flaglist(v) if v.info.array_ok => v.coerce_element(value)?,
            _ => {
                return Err(FigureError::unknown_property(
                    self.parent_name(),
                    format!("{}[{index}]", self.name()),
                ));
            }
        };
        Ok(coerced)
    }

    /// Builds a scalar validator from a schema fragment such as
    /// `{"valType": "number", "min": 0, "dflt": 1}`.
    pub fn from_schema(name: &str, parent_name: &str, schema: &Value) -> FigureResult<Self> {
        let Value::Object(fragment) = schema else {
            return Err(FigureError::InvalidSchema(format!(
                "`{name}` of {parent_name}: expected a mapping, got {schema}"
            )));
        };
        let val_type = fragment
            .get("valType")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                FigureError::InvalidSchema(format!("`{name}` of {parent_name}: missing `valType`"))
            })?;

        let mut info = ValidatorInfo::new(name, parent_name);
        info.default = fragment.get("dflt").cloned();
        info.array_ok = fragment.get("arrayOk").and_then(Value::as_bool).unwrap_or(false);
        let bound = |key: &str| fragment.get(key).and_then(Value::as_f64);
        let strings = |key: &str| -> Vec<String> {
            fragment
                .get(key)
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(Value::as_str).map(str::to_owned).collect())
                .unwrap_or_default()
        };

        let validator = match val_type {
            "data_array" => DataArrayValidator::from_info(info).into(),
            "enumerated" => {
                let values = fragment
                    .get("values")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                EnumeratedValidator::from_info(info, values).into()
            }
            "boolean" => BooleanValidator::from_info(info).into(),
            "number" => NumberValidator::from_info(info)
                .with_range(bound("min"), bound("max"))
                .into(),
            "integer" => IntegerValidator::from_info(info)
                .with_range(
                    bound("min").map(|min| min as i64),
                    bound("max").map(|max| max as i64),
                )
                .into(),
            "string" => {
                let mut validator = StringValidator::from_info(info);
                if fragment.get("noBlank").and_then(Value::as_bool).unwrap_or(false) {
                    validator = validator.no_blank();
                }
                let values = strings("values");
                if !values.is_empty() {
                    validator = validator.with_values(values);
                }
                validator.into()
            }
            "color" => ColorValidator::from_info(info).into(),
            "colorscale" => ColorscaleValidator::from_info(info).into(),
            "angle" => AngleValidator::from_info(info).into(),
            "subplotid" => {
                let base = info
                    .default
                    .as_ref()
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .ok_or_else(|| {
                        FigureError::InvalidSchema(format!(
                            "`{name}` of {parent_name}: subplotid requires a string `dflt`"
                        ))
                    })?;
                SubplotidValidator::new(name, parent_name, base).into()
            }
            "flaglist" => {
                FlaglistValidator::from_info(info, strings("flags"), strings("extras")).into()
            }
            "image_uri" => ImageUriValidator::from_info(info).into(),
            "any" => AnyValidator::from_info(info).into(),
            "info_array" => {
                let items = fragment
                    .get("items")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let free_length = fragment
                    .get("freeLength")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let mut validator = InfoArrayValidator::new(name, parent_name, &items)?;
                validator.info.default = info.default;
                if free_length {
                    validator = validator.free_length();
                }
                validator.into()
            }
            other => {
                return Err(FigureError::InvalidSchema(format!(
                    "`{name}` of {parent_name}: unsupported valType `{other}`"
                )));
            }
        };
        Ok(validator)
    }
}

/// Builder methods shared by every validator struct with a plain default.
macro_rules! default_builders {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $ty {
                /// Value used when `null` is assigned.
                #[must_use]
                pub fn with_default(mut self, default: impl Into<serde_json::Value>) -> Self {
                    self.info.default = Some(default.into());
                    self
                }

                #[must_use]
                pub fn info(&self) -> &$crate::validators::ValidatorInfo {
                    &self.info
                }
            }
        )+
    };
}

macro_rules! array_ok_builders {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $ty {
                /// Accept sequences, validated element by element.
                #[must_use]
                pub fn array_ok(mut self) -> Self {
                    self.info.array_ok = true;
                    self
                }
            }
        )+
    };
}

default_builders!(
    DataArrayValidator,
    EnumeratedValidator,
    BooleanValidator,
    NumberValidator,
    IntegerValidator,
    StringValidator,
    ColorValidator,
    ColorscaleValidator,
    AngleValidator,
    SubplotidValidator,
    FlaglistValidator,
    ImageUriValidator,
    AnyValidator,
    InfoArrayValidator,
);

array_ok_builders!(
    EnumeratedValidator,
    BooleanValidator,
    NumberValidator,
    IntegerValidator,
    StringValidator,
    ColorValidator,
    AngleValidator,
    SubplotidValidator,
    FlaglistValidator,
    AnyValidator,
);
