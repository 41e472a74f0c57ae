use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;

use crate::core::{PathKey, PropertyPath, TRACE_IDENTITY_KEY};
use crate::error::{FigureError, FigureResult};
use crate::validators::{
    EnumeratedValidator, StringValidator, Validator, subplot_suffix, subplot_suffix_pattern,
};

/// Builds the validator for one member of a subplot family, given its full
/// name (`xaxis2`, `yaxis3`, ...).
pub type ValidatorFactory = Rc<dyn Fn(&str) -> Validator>;

#[derive(Clone)]
struct SubplotFamily {
    base: String,
    pattern: Regex,
    factory: ValidatorFactory,
}

impl fmt::Debug for SubplotFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubplotFamily")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

/// Declared shape of a node type: its fixed properties and its subplot
/// families.
#[derive(Debug)]
pub struct NodeClass {
    type_name: String,
    trace_type: Option<String>,
    validators: IndexMap<String, Validator>,
    families: Vec<SubplotFamily>,
}

impl NodeClass {
    #[must_use]
    pub fn builder(type_name: impl Into<String>) -> NodeClassBuilder {
        NodeClassBuilder {
            class: Self {
                type_name: type_name.into(),
                trace_type: None,
                validators: IndexMap::new(),
                families: Vec::new(),
            },
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// `Some("scatter")` for trace classes.
    #[must_use]
    pub fn trace_type(&self) -> Option<&str> {
        self.trace_type.as_deref()
    }

    pub fn validators(&self) -> impl Iterator<Item = &Validator> {
        self.validators.values()
    }

    /// Fixed-name validator.
    #[must_use]
    pub fn validator(&self, name: &str) -> Option<&Validator> {
        self.validators.get(name)
    }

    /// Fixed-name validator, falling back to subplot families.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<Cow<'_, Validator>> {
        if let Some(validator) = self.validators.get(name) {
            return Some(Cow::Borrowed(validator));
        }
        self.family_validator(name).map(Cow::Owned)
    }

    pub(crate) fn family_validator(&self, name: &str) -> Option<Validator> {
        self.families
            .iter()
            .find(|family| subplot_suffix(&family.pattern, name).is_some())
            .map(|family| (family.factory)(name))
    }

    /// Validates `value` for the property addressed by `keys`, descending
    /// through compound classes and into indexed elements.
    pub(crate) fn validate_path_value(&self, keys: &[PathKey], value: &Value) -> FigureResult<Value> {
        let unknown = || {
            let path: PropertyPath = keys.iter().collect();
            FigureError::unknown_property(&self.type_name, path.to_string())
        };
        let (first, rest) = keys.split_first().ok_or_else(unknown)?;
        let name = first.as_key().ok_or_else(unknown)?;
        let validator = self.resolve(name).ok_or_else(unknown)?;

        match (validator.as_ref(), rest) {
            (validator, []) => validator.validate_coerce(value),
            (Validator::Compound(compound), rest) => compound.class().validate_path_value(rest, value),
            (Validator::CompoundArray(array), [PathKey::Index(_)]) => array.validate_element_value(value),
            (Validator::CompoundArray(array), [PathKey::Index(_), rest @ ..]) => {
                array.class().validate_path_value(rest, value)
            }
            (scalar, [PathKey::Index(index)]) if !scalar.is_compound() => scalar.validate_element(*index, value),
            _ => Err(unknown()),
        }
    }
}

pub struct NodeClassBuilder {
    class: NodeClass,
}

impl NodeClassBuilder {
    /// Marks the class as a trace type: adds the read-only `type` token and
    /// the `uid` identity property.
    #[must_use]
    pub fn trace(mut self, trace_type: impl Into<String>) -> Self {
        let trace_type = trace_type.into();
        let type_validator = EnumeratedValidator::new("type", &self.class.type_name, [trace_type.as_str()])
            .with_default(trace_type.as_str());
        let uid_validator =
            StringValidator::new(TRACE_IDENTITY_KEY, &self.class.type_name).with_default(Value::Null);
        self.class.trace_type = Some(trace_type);
        self.property(type_validator).property(uid_validator)
    }

    #[must_use]
    pub fn property(mut self, validator: impl Into<Validator>) -> Self {
        let validator = validator.into();
        self.class.validators.insert(validator.name().to_owned(), validator);
        self
    }

    /// Registers a family of properties named `base`, `base2`, `base3`, ...
    #[must_use]
    pub fn subplot_family<F>(mut self, base: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&str) -> Validator + 'static,
    {
        let base = base.into();
        self.class.families.push(SubplotFamily {
            pattern: subplot_suffix_pattern(&base),
            base,
            factory: Rc::new(factory),
        });
        self
    }

    #[must_use]
    pub fn build(self) -> Rc<NodeClass> {
        Rc::new(self.class)
    }
}
