use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::PropertyPath;
use crate::interaction::PointsEvent;

/// Figure → surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Full data of each appended trace, identity key included.
    AddTraces { data: Vec<Map<String, Value>> },
    DeleteTraces {
        delete_indexes: Vec<usize>,
        layout_edit_id: u64,
    },
    MoveTraces {
        current_indexes: Vec<usize>,
        new_indexes: Vec<usize>,
    },
    /// `restyle_data` maps a path to one value per targeted trace.
    Restyle {
        restyle_data: Map<String, Value>,
        trace_indexes: Vec<usize>,
        style_edit_id: u64,
        layout_edit_id: u64,
    },
    Relayout {
        relayout_data: Map<String, Value>,
        layout_edit_id: u64,
    },
    RemoveStyleProps {
        trace_index: usize,
        remove_props: Vec<PropertyPath>,
    },
    RemoveLayoutProps { remove_props: Vec<PropertyPath> },
}

impl OutboundMessage {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AddTraces { .. } => "add_traces",
            Self::DeleteTraces { .. } => "delete_traces",
            Self::MoveTraces { .. } => "move_traces",
            Self::Restyle { .. } => "restyle",
            Self::Relayout { .. } => "relayout",
            Self::RemoveStyleProps { .. } => "remove_style_props",
            Self::RemoveLayoutProps { .. } => "remove_layout_props",
        }
    }
}

/// Surface → figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Recomputed style values, one mapping per trace keyed by `uid`.
    RestyleDelta {
        style_data: Vec<Map<String, Value>>,
        style_edit_id: u64,
    },
    LayoutDelta {
        layout_delta: Map<String, Value>,
        layout_edit_id: u64,
    },
    /// A user-driven edit (legend click, ...) to apply like a local restyle.
    RestyleFromSurface {
        restyle_data: Map<String, Value>,
        #[serde(default)]
        trace_indexes: Option<Vec<usize>>,
    },
    /// A user-driven layout edit (zoom, pan, ...).
    RelayoutFromSurface { relayout_data: Map<String, Value> },
    PointsEvent(PointsEvent),
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{InboundMessage, OutboundMessage};
    use crate::core::PropertyPath;

    #[test]
    fn messages_are_tagged_by_type() {
        let message = OutboundMessage::RemoveLayoutProps {
            remove_props: vec![PropertyPath::parse("xaxis.range")],
        };
        assert_eq!(
            serde_json::to_value(&message).expect("serializes"),
            json!({"type": "remove_layout_props", "remove_props": [["xaxis", "range"]]})
        );
    }

    #[test]
    fn surface_restyle_defaults_to_all_traces() {
        let message: InboundMessage = serde_json::from_value(json!({
            "type": "restyle_from_surface",
            "restyle_data": {"visible": [false]}
        }))
        .expect("deserializes");
        assert!(matches!(
            message,
            InboundMessage::RestyleFromSurface { trace_indexes: None, .. }
        ));
    }
}
