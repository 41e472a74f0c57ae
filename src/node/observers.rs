use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::core::PropertyPath;

use super::Node;

/// Invoked once per mutation batch with the changed sub-paths it cares about.
pub type ChangeCallback = Rc<dyn Fn(&ChangeEvent)>;

/// Delivered to change observers.
#[derive(Clone)]
pub struct ChangeEvent {
    /// Node the observer was registered on.
    pub node: Node,
    /// Changed paths relative to `node`, limited to the watched ones.
    pub changed: Vec<PropertyPath>,
}

impl fmt::Debug for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeEvent")
            .field("node", &self.node)
            .field("changed", &self.changed)
            .finish()
    }
}

/// Observers keyed by their (sorted, deduplicated) watch set.
///
/// An empty watch set means "anything below this node".
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    entries: IndexMap<Vec<PropertyPath>, Vec<ChangeCallback>>,
}

impl ObserverRegistry {
    pub(crate) fn register(&mut self, mut watched: Vec<PropertyPath>, callback: ChangeCallback, append: bool) {
        watched.sort();
        watched.dedup();
        let callbacks = self.entries.entry(watched).or_default();
        if !append {
            callbacks.clear();
        }
        callbacks.push(callback);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Callbacks whose watch set intersects `changed`, each paired with the
    /// relevant subset of `changed`.
    pub(crate) fn matching(&self, changed: &[PropertyPath]) -> Vec<(ChangeCallback, Vec<PropertyPath>)> {
        let mut calls = Vec::new();
        for (watched, callbacks) in &self.entries {
            let relevant: Vec<PropertyPath> = changed
                .iter()
                .filter(|path| watched.is_empty() || watched.iter().any(|w| w.overlaps(path)))
                .cloned()
                .collect();
            if relevant.is_empty() {
                continue;
            }
            for callback in callbacks {
                calls.push((Rc::clone(callback), relevant.clone()));
            }
        }
        calls
    }
}
