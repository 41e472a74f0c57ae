//! Turns changed paths into observer calls.

use tracing::trace;

use crate::core::{PathKey, PropertyPath};
use crate::node::Node;

use super::Figure;

/// Observer targets for one mutation batch, each with the sub-paths that
/// changed below it. Built per dispatch and dropped afterwards.
#[derive(Default)]
pub(super) struct DispatchPlan {
    targets: Vec<(Node, Vec<PropertyPath>)>,
}

impl DispatchPlan {
    /// Walks each changed path down from `root`, recording every node passed
    /// on the way together with the part of the path left below it.
    pub(super) fn build(root: &Node, changed: &[PropertyPath]) -> Self {
        let mut plan = Self::default();
        for path in changed {
            let path = reported_path(root, path);
            if path.is_empty() {
                continue;
            }
            let mut node = root.clone();
            let mut consumed = 0;
            loop {
                plan.record(&node, path.suffix(consumed));
                match node.step_into(&path.keys()[consumed..]) {
                    Some((child, used)) if consumed + used < path.len() => {
                        node = child;
                        consumed += used;
                    }
                    _ => break,
                }
            }
        }
        plan
    }

    fn record(&mut self, node: &Node, path: PropertyPath) {
        match self.targets.iter_mut().find(|(target, _)| target.ptr_eq(node)) {
            Some((_, paths)) => {
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
            None => self.targets.push((node.clone(), vec![path])),
        }
    }

    pub(super) fn len(&self) -> usize {
        self.targets.len()
    }

    /// Calls the observers of every target, once per target.
    pub(super) fn run(self) {
        for (node, paths) in self.targets {
            if node.has_observers() {
                node.notify(&paths);
            }
        }
    }
}

/// A trailing index into a list of plain values is reported at the list's
/// path; an index into a list of objects is kept.
fn reported_path(root: &Node, path: &PropertyPath) -> PropertyPath {
    let mut reported = path.clone();
    if matches!(path.last(), Some(PathKey::Index(_))) {
        let element_is_object = root.read_value(path).is_some_and(|value| value.is_object());
        if !element_is_object {
            reported.pop();
        }
    }
    reported
}

impl Figure {
    pub(super) fn dispatch_trace(&self, index: usize, changed: &[PropertyPath]) {
        if changed.is_empty() {
            return;
        }
        if let Some(trace) = self.trace(index) {
            dispatch(&trace, changed);
        }
    }

    pub(super) fn dispatch_layout(&self, changed: &[PropertyPath]) {
        if changed.is_empty() {
            return;
        }
        dispatch(&self.layout(), changed);
    }
}

fn dispatch(root: &Node, changed: &[PropertyPath]) {
    let plan = DispatchPlan::build(root, changed);
    trace!(targets = plan.len(), changed = changed.len(), "dispatch plan built");
    plan.run();
}
