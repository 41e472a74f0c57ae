use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::core::PropertyPath;
use crate::error::FigureResult;

use super::Figure;

/// Edits recorded while a batch is open, keyed by trace identifier so that
/// reordering inside the batch is harmless.
#[derive(Debug, Default)]
pub(crate) struct PendingBatch {
    trace_edits: IndexMap<String, Map<String, Value>>,
    layout_edits: Map<String, Value>,
}

impl PendingBatch {
    pub(crate) fn record_trace_edit(&mut self, uid: &str, path: &PropertyPath, value: Value) {
        self.trace_edits
            .entry(uid.to_owned())
            .or_default()
            .insert(path.to_string(), value);
    }

    pub(crate) fn record_layout_edit(&mut self, path: &PropertyPath, value: Value) {
        self.layout_edits.insert(path.to_string(), value);
    }
}

impl Figure {
    /// Runs `update` with outbound messages and change callbacks deferred.
    ///
    /// Node edits made inside are committed right away; on exit one restyle
    /// per group of traces with the same changed paths and one relayout are
    /// sent, then each affected node's observers run once. Edits committed
    /// before an error are still flushed. Nested calls join the outer batch.
    pub fn batch_update<F>(&self, update: F) -> FigureResult<()>
    where
        F: FnOnce(&Figure) -> FigureResult<()>,
    {
        let nested = {
            let mut state = self.state.borrow_mut();
            if state.batch.is_some() {
                true
            } else {
                state.batch = Some(PendingBatch::default());
                false
            }
        };
        if nested {
            return update(self);
        }

        let result = update(self);
        let batch = self.state.borrow_mut().batch.take();
        if let Some(batch) = batch {
            self.flush_batch(batch);
        }
        result
    }

    #[must_use]
    pub fn in_batch(&self) -> bool {
        self.state.borrow().batch.is_some()
    }

    fn flush_batch(&self, batch: PendingBatch) {
        let PendingBatch {
            trace_edits,
            layout_edits,
        } = batch;

        let mut groups: IndexMap<Vec<String>, Vec<(usize, Map<String, Value>)>> =
            IndexMap::new();
        for (uid, edits) in trace_edits {
            let Some(index) = self.state.borrow().trace_position(&uid) else {
                continue;
            };
            let mut key_set: Vec<String> = edits.keys().cloned().collect();
            key_set.sort();
            groups.entry(key_set).or_default().push((index, edits));
        }
        debug!(
            restyles = groups.len(),
            relayout = !layout_edits.is_empty(),
            "flushing batch"
        );

        let mut dispatches: Vec<(usize, Vec<PropertyPath>)> = Vec::new();
        for (keys, members) in groups {
            let mut restyle_data = Map::new();
            for key in &keys {
                let values = members
                    .iter()
                    .map(|(_, edits)| edits.get(key).cloned().unwrap_or_default())
                    .collect();
                restyle_data.insert(key.clone(), Value::Array(values));
            }
            let indexes: Vec<usize> = members.iter().map(|(index, _)| *index).collect();
            self.send_restyle(restyle_data, indexes);
            for (index, edits) in members {
                let paths = edits.keys().map(|key| PropertyPath::parse(key)).collect();
                dispatches.push((index, paths));
            }
        }

        let layout_paths: Vec<PropertyPath> =
            layout_edits.keys().map(|key| PropertyPath::parse(key)).collect();
        if !layout_edits.is_empty() {
            self.send_relayout(layout_edits);
        }

        for (index, paths) in dispatches {
            self.dispatch_trace(index, &paths);
        }
        if !layout_paths.is_empty() {
            self.dispatch_layout(&layout_paths);
        }
    }
}
