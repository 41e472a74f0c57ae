use tracing::{trace, warn};

use crate::error::FigureResult;
use crate::interaction::{PointsCallbackEvent, PointsEvent};
use crate::sync::InboundMessage;

use super::Figure;

impl Figure {
    /// Applies one message from the surface.
    ///
    /// Stale echoes are dropped silently. Edit requests from the surface
    /// fail like local edits when validation rejects them, leaving the tree
    /// untouched.
    pub fn handle_inbound(&self, message: InboundMessage) -> FigureResult<()> {
        match message {
            InboundMessage::RestyleDelta {
                style_data,
                style_edit_id,
            } => self.apply_restyle_delta(style_data, style_edit_id),
            InboundMessage::LayoutDelta {
                layout_delta,
                layout_edit_id,
            } => self.apply_layout_delta(layout_delta, layout_edit_id),
            InboundMessage::RestyleFromSurface {
                restyle_data,
                trace_indexes,
            } => {
                let validate = self.state.borrow().config.validate_surface_edits;
                self.perform_restyle(&restyle_data, trace_indexes.as_deref(), validate)?;
            }
            InboundMessage::RelayoutFromSurface { relayout_data } => {
                let validate = self.state.borrow().config.validate_surface_edits;
                self.perform_relayout(&relayout_data, validate)?;
            }
            InboundMessage::PointsEvent(event) => self.dispatch_points_event(&event),
        }
        Ok(())
    }

    /// Delivers a points event to the listeners of each affected trace.
    pub fn dispatch_points_event(&self, event: &PointsEvent) {
        for points in event.group_by_trace() {
            let Some(trace) = self.trace(points.trace_index) else {
                warn!(
                    trace_index = points.trace_index,
                    "points event for an unknown trace skipped"
                );
                continue;
            };
            let callbacks =
                trace.with_point_handlers(|handlers| handlers.callbacks(event.event_kind));
            if callbacks.is_empty() {
                trace!(trace_index = points.trace_index, "no points listener registered");
                continue;
            }
            let payload = PointsCallbackEvent {
                kind: event.event_kind,
                trace,
                points,
                selector: event.selector.clone(),
                device_state: event.device_state,
            };
            for callback in callbacks {
                callback(&payload);
            }
        }
    }
}
