use serde_json::{Map, Value};
use tracing::trace;

use crate::core::tree::{is_deletion, set_in};
use crate::core::{PropertyPath, TRACE_IDENTITY_KEY};
use crate::error::{FigureError, FigureResult, TraceAssignmentError};
use crate::node::NodeClass;
use crate::sync::OutboundMessage;

use super::{Figure, SyncChannel};

/// Validated value for one path: `None` deletes.
pub(super) fn coerce_edit(
    class: &NodeClass,
    path: &PropertyPath,
    value: &Value,
    validate: bool,
) -> FigureResult<Option<Value>> {
    if is_deletion(value) {
        let known = path
            .first()
            .and_then(|key| key.as_key())
            .is_some_and(|name| class.resolve(name).is_some());
        if validate && !known {
            return Err(FigureError::unknown_property(class.type_name(), path.to_string()));
        }
        return Ok(None);
    }
    if !validate {
        return Ok(Some(value.clone()));
    }
    class.validate_path_value(path.keys(), value).map(Some)
}

struct StyleEdit {
    path: PropertyPath,
    values: Vec<Option<Value>>,
}

impl Figure {
    /// Applies a restyle to the traces at `trace_indexes` (every trace when
    /// `None`).
    ///
    /// A list value is read per trace and broadcast with `value[i % len]`;
    /// any other value applies to every targeted trace. `null` deletes the
    /// path. The whole request is validated before anything is committed.
    pub fn restyle(
        &self,
        restyle_data: &Map<String, Value>,
        trace_indexes: Option<&[usize]>,
    ) -> FigureResult<()> {
        self.perform_restyle(restyle_data, trace_indexes, true)
    }

    pub(super) fn perform_restyle(
        &self,
        restyle_data: &Map<String, Value>,
        trace_indexes: Option<&[usize]>,
        validate: bool,
    ) -> FigureResult<()> {
        let targets = self.resolve_trace_indexes(trace_indexes)?;
        let (classes, uids): (Vec<_>, Vec<_>) = {
            let state = self.state.borrow();
            targets
                .iter()
                .map(|&index| {
                    let entry = &state.traces[index];
                    (entry.node.class(), entry.uid.clone())
                })
                .unzip()
        };

        let mut edits = Vec::with_capacity(restyle_data.len());
        for (key, raw) in restyle_data {
            let per_trace = match raw {
                Value::Array(items) if items.is_empty() => {
                    trace!(path = %key, "empty restyle value list skipped");
                    continue;
                }
                Value::Array(items) => items.as_slice(),
                other => std::slice::from_ref(other),
            };
            let path = PropertyPath::parse(key);
            let targets_identity = path.first().and_then(|key| key.as_key()) == Some(TRACE_IDENTITY_KEY);
            let values = classes
                .iter()
                .enumerate()
                .map(|(position, class)| {
                    let value = &per_trace[position % per_trace.len()];
                    if targets_identity && value.as_str() != Some(uids[position].as_str()) {
                        return Err(FigureError::from(TraceAssignmentError::IdentifierChange(
                            uids[position].clone(),
                        )));
                    }
                    coerce_edit(class, &path, value, validate)
                })
                .collect::<FigureResult<Vec<_>>>()?;
            edits.push(StyleEdit { path, values });
        }

        let mut restyle_changes = Map::new();
        let mut changed: Vec<Vec<PropertyPath>> = vec![Vec::new(); targets.len()];
        let batched = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            for edit in edits {
                let mut any_changed = false;
                for (position, &index) in targets.iter().enumerate() {
                    let entry = &mut state.traces[index];
                    let value = edit.values[position].clone();
                    if set_in(&mut entry.data, &edit.path, value.clone()) {
                        if let Some(batch) = state.batch.as_mut() {
                            let recorded = value.unwrap_or_default();
                            batch.record_trace_edit(&entry.uid, &edit.path, recorded);
                        }
                        changed[position].push(edit.path.clone());
                        any_changed = true;
                    }
                }
                if any_changed {
                    let sent = edit.values.into_iter().map(Option::unwrap_or_default);
                    restyle_changes.insert(edit.path.to_string(), Value::Array(sent.collect()));
                }
            }
            state.batch.is_some()
        };

        if batched {
            trace!(paths = restyle_changes.len(), "restyle recorded in open batch");
            return Ok(());
        }
        if restyle_changes.is_empty() {
            trace!("restyle left every targeted trace unchanged");
            return Ok(());
        }
        self.send_restyle(restyle_changes, targets.clone());
        for (index, paths) in targets.into_iter().zip(changed) {
            self.dispatch_trace(index, &paths);
        }
        Ok(())
    }

    pub(super) fn resolve_trace_indexes(
        &self,
        trace_indexes: Option<&[usize]>,
    ) -> FigureResult<Vec<usize>> {
        let len = self.trace_count();
        let Some(indexes) = trace_indexes else {
            return Ok((0..len).collect());
        };
        if let Some(&index) = indexes.iter().find(|&&index| index >= len) {
            return Err(FigureError::TraceIndexOutOfRange { index, len });
        }
        Ok(indexes.to_vec())
    }

    /// Emits a restyle carrying a fresh id on both channels.
    pub(super) fn send_restyle(
        &self,
        restyle_data: Map<String, Value>,
        trace_indexes: Vec<usize>,
    ) {
        let (style_edit_id, layout_edit_id) = {
            let mut state = self.state.borrow_mut();
            (
                state.sync.channel_mut(SyncChannel::Style).mint(),
                state.sync.channel_mut(SyncChannel::Layout).mint(),
            )
        };
        self.emit(
            OutboundMessage::Restyle {
                restyle_data,
                trace_indexes,
                style_edit_id,
                layout_edit_id,
            },
            &[
                (SyncChannel::Style, style_edit_id),
                (SyncChannel::Layout, layout_edit_id),
            ],
        );
    }
}
