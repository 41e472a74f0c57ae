use std::rc::Rc;

use serde_json::Value;

use crate::error::{FigureError, FigureResult, InvalidValueKind};
use crate::node::{Node, NodeClass, PropertyValue};

use super::ValidatorInfo;

fn coerce_node(info: &ValidatorInfo, class: &Rc<NodeClass>, value: PropertyValue) -> FigureResult<Node> {
    match value {
        PropertyValue::Node(node) if node.type_name() == class.type_name() => Ok(node),
        PropertyValue::Value(Value::Null) => Node::new(class),
        PropertyValue::Value(Value::Object(map)) => Node::from_map(class, map),
        other => Err(info
            .error(InvalidValueKind::TypeMismatch, &other.to_json())
            .with_detail(format!(
                "expected a {} object or a mapping of its properties",
                class.type_name()
            ))
            .into()),
    }
}

/// Nested object property.
#[derive(Debug, Clone)]
pub struct CompoundValidator {
    pub(crate) info: ValidatorInfo,
    class: Rc<NodeClass>,
}

impl CompoundValidator {
    #[must_use]
    pub fn new(name: impl Into<String>, parent_name: impl Into<String>, class: Rc<NodeClass>) -> Self {
        let mut info = ValidatorInfo::new(name, parent_name);
        info.default = Some(Value::Null);
        Self { info, class }
    }

    #[must_use]
    pub fn class(&self) -> &Rc<NodeClass> {
        &self.class
    }

    /// Existing nodes of the declared class pass through; mappings become a
    /// fresh detached node; `null` yields a default-filled node.
    pub fn coerce(&self, value: PropertyValue) -> FigureResult<Node> {
        coerce_node(&self.info, &self.class, value)
    }

    pub(crate) fn validate_value(&self, value: &Value) -> FigureResult<Value> {
        Ok(self.coerce(PropertyValue::Value(value.clone()))?.to_value())
    }
}

/// Ordered sequence of nested objects.
#[derive(Debug, Clone)]
pub struct CompoundArrayValidator {
    pub(crate) info: ValidatorInfo,
    class: Rc<NodeClass>,
}

impl CompoundArrayValidator {
    #[must_use]
    pub fn new(name: impl Into<String>, parent_name: impl Into<String>, class: Rc<NodeClass>) -> Self {
        let mut info = ValidatorInfo::new(name, parent_name);
        info.default = Some(Value::Null);
        Self { info, class }
    }

    #[must_use]
    pub fn class(&self) -> &Rc<NodeClass> {
        &self.class
    }

    pub fn coerce(&self, value: PropertyValue) -> FigureResult<Vec<Node>> {
        match value {
            PropertyValue::Value(Value::Null) => Ok(Vec::new()),
            PropertyValue::Value(Value::Array(items)) => items
                .into_iter()
                .map(|item| coerce_node(&self.info, &self.class, PropertyValue::Value(item)))
                .collect(),
            PropertyValue::Elements(items) => items
                .into_iter()
                .map(|item| coerce_node(&self.info, &self.class, item))
                .collect(),
            other => Err(FigureError::from(
                self.info
                    .error(InvalidValueKind::TypeMismatch, &other.to_json())
                    .with_detail(format!(
                        "expected a sequence of {} objects or mappings",
                        self.class.type_name()
                    )),
            )),
        }
    }

    pub(crate) fn validate_value(&self, value: &Value) -> FigureResult<Value> {
        let nodes = self.coerce(PropertyValue::Value(value.clone()))?;
        Ok(Value::Array(nodes.iter().map(Node::to_value).collect()))
    }

    /// One element addressed as `name[i]`.
    pub(crate) fn validate_element_value(&self, value: &Value) -> FigureResult<Value> {
        Ok(coerce_node(&self.info, &self.class, PropertyValue::Value(value.clone()))?.to_value())
    }
}
