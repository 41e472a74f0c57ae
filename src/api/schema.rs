use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{FigureError, FigureResult};
use crate::node::NodeClass;

/// Node classes a figure is built from: one layout class and the supported
/// trace classes keyed by trace type.
#[derive(Debug, Clone)]
pub struct FigureSchema {
    layout: Rc<NodeClass>,
    traces: IndexMap<String, Rc<NodeClass>>,
}

impl FigureSchema {
    #[must_use]
    pub fn new(layout: Rc<NodeClass>) -> Self {
        Self {
            layout,
            traces: IndexMap::new(),
        }
    }

    /// Registers a trace class. The class must have been built with
    /// [`crate::node::NodeClassBuilder::trace`].
    pub fn with_trace_class(mut self, class: Rc<NodeClass>) -> FigureResult<Self> {
        let Some(trace_type) = class.trace_type().map(str::to_owned) else {
            return Err(FigureError::InvalidSchema(format!(
                "class `{}` is not a trace class",
                class.type_name()
            )));
        };
        if self.traces.contains_key(&trace_type) {
            return Err(FigureError::InvalidSchema(format!(
                "trace type `{trace_type}` registered twice"
            )));
        }
        self.traces.insert(trace_type, class);
        Ok(self)
    }

    #[must_use]
    pub fn layout_class(&self) -> &Rc<NodeClass> {
        &self.layout
    }

    #[must_use]
    pub fn trace_class(&self, trace_type: &str) -> Option<&Rc<NodeClass>> {
        self.traces.get(trace_type)
    }

    pub fn trace_types(&self) -> impl Iterator<Item = &str> {
        self.traces.keys().map(String::as_str)
    }
}
