use serde::{Deserialize, Serialize};

/// How trace identifiers are minted for traces added without one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UidStrategy {
    /// Random v4 UUIDs.
    #[default]
    Uuid,
    /// `trace-1`, `trace-2`, ... in creation order.
    Sequential,
}

/// Public figure bootstrap configuration.
///
/// Serializable so hosts can keep it next to their own widget settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigureConfig {
    #[serde(default)]
    pub uid_strategy: UidStrategy,
    /// Validate restyle/relayout requests coming from the surface with the
    /// same validators as local edits.
    #[serde(default = "default_validate_surface_edits")]
    pub validate_surface_edits: bool,
    /// Trace class used by [`super::Figure::add_trace_from_value`] when the
    /// mapping has no `type` key.
    #[serde(default = "default_trace_type")]
    pub default_trace_type: String,
}

impl Default for FigureConfig {
    fn default() -> Self {
        Self {
            uid_strategy: UidStrategy::default(),
            validate_surface_edits: default_validate_surface_edits(),
            default_trace_type: default_trace_type(),
        }
    }
}

impl FigureConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_uid_strategy(mut self, strategy: UidStrategy) -> Self {
        self.uid_strategy = strategy;
        self
    }

    #[must_use]
    pub fn with_surface_edit_validation(mut self, enabled: bool) -> Self {
        self.validate_surface_edits = enabled;
        self
    }

    #[must_use]
    pub fn with_default_trace_type(mut self, trace_type: impl Into<String>) -> Self {
        self.default_trace_type = trace_type.into();
        self
    }
}

fn default_validate_surface_edits() -> bool {
    true
}

fn default_trace_type() -> String {
    "scatter".to_owned()
}
