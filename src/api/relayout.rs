use serde_json::{Map, Value};
use tracing::trace;

use crate::core::PropertyPath;
use crate::core::tree::set_in;
use crate::error::FigureResult;
use crate::sync::OutboundMessage;

use super::restyle::coerce_edit;
use super::{Figure, SyncChannel};

impl Figure {
    /// Applies `relayout_data` (path → value) to the layout. `null` deletes
    /// the path. The whole request is validated before anything is committed.
    pub fn relayout(&self, relayout_data: &Map<String, Value>) -> FigureResult<()> {
        self.perform_relayout(relayout_data, true)
    }

    pub(super) fn perform_relayout(
        &self,
        relayout_data: &Map<String, Value>,
        validate: bool,
    ) -> FigureResult<()> {
        let class = self.layout().class();
        let edits = relayout_data
            .iter()
            .map(|(key, value)| {
                let path = PropertyPath::parse(key);
                let coerced = coerce_edit(&class, &path, value, validate)?;
                Ok((path, coerced))
            })
            .collect::<FigureResult<Vec<_>>>()?;

        let mut relayout_changes = Map::new();
        let mut changed = Vec::new();
        let batched = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            for (path, value) in edits {
                if set_in(&mut state.layout, &path, value.clone()) {
                    let value = value.unwrap_or_default();
                    if let Some(batch) = state.batch.as_mut() {
                        batch.record_layout_edit(&path, value.clone());
                    }
                    relayout_changes.insert(path.to_string(), value);
                    changed.push(path);
                }
            }
            state.batch.is_some()
        };

        if batched {
            trace!(paths = relayout_changes.len(), "relayout recorded in open batch");
            return Ok(());
        }
        if relayout_changes.is_empty() {
            trace!("relayout left the layout unchanged");
            return Ok(());
        }
        self.send_relayout(relayout_changes);
        self.dispatch_layout(&changed);
        Ok(())
    }

    pub(super) fn send_relayout(&self, relayout_data: Map<String, Value>) {
        let layout_edit_id = self
            .state
            .borrow_mut()
            .sync
            .channel_mut(SyncChannel::Layout)
            .mint();
        self.emit(
            OutboundMessage::Relayout {
                relayout_data,
                layout_edit_id,
            },
            &[(SyncChannel::Layout, layout_edit_id)],
        );
    }
}
