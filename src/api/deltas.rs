use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::core::tree::{deep_merge, leaf_paths, remove_overlapping};
use crate::core::{PropertyPath, TRACE_IDENTITY_KEY};
use crate::error::FigureError;
use crate::sync::OutboundMessage;

use super::{Figure, SyncChannel};

impl Figure {
    /// Echo ids must match the last id sent on the channel; anything else
    /// is a stale echo and is dropped.
    fn accept_echo(&self, channel: SyncChannel, received: u64) -> bool {
        let expected = self.last_edit_id(channel);
        if received == expected {
            return true;
        }
        let stale = FigureError::StaleMessage {
            channel: channel.as_str(),
            received,
            expected,
        };
        debug!(%stale, "echo dropped");
        false
    }

    pub(super) fn apply_restyle_delta(
        &self,
        style_data: Vec<Map<String, Value>>,
        style_edit_id: u64,
    ) {
        if !self.accept_echo(SyncChannel::Style, style_edit_id) {
            return;
        }
        for mut trace_delta in style_data {
            let uid = trace_delta
                .shift_remove(TRACE_IDENTITY_KEY)
                .and_then(|uid| uid.as_str().map(str::to_owned));
            let Some(uid) = uid else {
                warn!("style delta without a trace identifier skipped");
                continue;
            };
            if trace_delta.is_empty() {
                continue;
            }

            let (index, removed) = {
                let mut state = self.state.borrow_mut();
                let Some(index) = state.trace_position(&uid) else {
                    warn!(uid = %uid, "style delta for an unknown trace skipped");
                    continue;
                };
                let entry = &mut state.traces[index];
                deep_merge(&mut entry.delta, &trace_delta);
                let removed =
                    remove_overlapping(&mut entry.data, &trace_delta, &PropertyPath::new());
                (index, removed)
            };
            if !removed.is_empty() {
                debug!(
                    trace_index = index,
                    removed = removed.len(),
                    "style props now owned by the surface"
                );
                self.emit(
                    OutboundMessage::RemoveStyleProps {
                        trace_index: index,
                        remove_props: removed,
                    },
                    &[],
                );
            }
            self.dispatch_trace(index, &leaf_paths(&trace_delta));
        }
        self.complete_channel(SyncChannel::Style);
    }

    pub(super) fn apply_layout_delta(
        &self,
        layout_delta: Map<String, Value>,
        layout_edit_id: u64,
    ) {
        if !self.accept_echo(SyncChannel::Layout, layout_edit_id) {
            return;
        }
        if !layout_delta.is_empty() {
            let removed = {
                let mut state = self.state.borrow_mut();
                deep_merge(&mut state.layout_delta, &layout_delta);
                remove_overlapping(&mut state.layout, &layout_delta, &PropertyPath::new())
            };
            if !removed.is_empty() {
                debug!(removed = removed.len(), "layout props now owned by the surface");
                self.emit(OutboundMessage::RemoveLayoutProps { remove_props: removed }, &[]);
            }
            self.dispatch_layout(&leaf_paths(&layout_delta));
        }
        self.complete_channel(SyncChannel::Layout);
    }
}
