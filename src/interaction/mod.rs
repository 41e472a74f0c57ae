//! Hover, click and selection events reported by the surface, and the
//! per-trace listeners they are delivered to.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::node::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointsEventKind {
    Hover,
    Unhover,
    Click,
    Selection,
}

/// Shape drawn by the user for a selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "selector_type", rename_all = "snake_case")]
pub enum SelectorGeometry {
    Box { xrange: [f64; 2], yrange: [f64; 2] },
    Lasso { xs: Vec<f64>, ys: Vec<f64> },
}

/// Modifier keys and mouse buttons at the time of the event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDeviceState {
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub meta: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub button: u8,
    #[serde(default)]
    pub buttons: u8,
}

/// Parallel per-point arrays as sent by the surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPoints {
    #[serde(default)]
    pub xs: Vec<Value>,
    #[serde(default)]
    pub ys: Vec<Value>,
    pub point_indexes: Vec<usize>,
    pub trace_indexes: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsEvent {
    pub event_kind: PointsEventKind,
    pub points: RawPoints,
    #[serde(default)]
    pub selector: Option<SelectorGeometry>,
    #[serde(default)]
    pub device_state: Option<InputDeviceState>,
}

/// Points of a single trace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Points {
    pub trace_index: usize,
    pub point_indexes: Vec<usize>,
    pub xs: Vec<Value>,
    pub ys: Vec<Value>,
}

impl PointsEvent {
    /// Splits the per-point records by trace, in order of first appearance.
    #[must_use]
    pub fn group_by_trace(&self) -> Vec<Points> {
        let raw = &self.points;
        let count = raw.point_indexes.len().min(raw.trace_indexes.len());
        if raw.point_indexes.len() != raw.trace_indexes.len()
            || (!raw.xs.is_empty() && raw.xs.len() != count)
            || (!raw.ys.is_empty() && raw.ys.len() != count)
        {
            warn!(
                points = raw.point_indexes.len(),
                traces = raw.trace_indexes.len(),
                xs = raw.xs.len(),
                ys = raw.ys.len(),
                "points event arrays differ in length; extra entries ignored"
            );
        }

        let mut grouped: IndexMap<usize, Points> = IndexMap::new();
        for position in 0..count {
            let trace_index = raw.trace_indexes[position];
            let points = grouped.entry(trace_index).or_insert_with(|| Points {
                trace_index,
                ..Points::default()
            });
            points.point_indexes.push(raw.point_indexes[position]);
            if let Some(x) = raw.xs.get(position) {
                points.xs.push(x.clone());
            }
            if let Some(y) = raw.ys.get(position) {
                points.ys.push(y.clone());
            }
        }
        grouped.into_values().collect()
    }
}

/// Argument of a points listener.
#[derive(Clone)]
pub struct PointsCallbackEvent {
    pub kind: PointsEventKind,
    pub trace: Node,
    pub points: Points,
    pub selector: Option<SelectorGeometry>,
    pub device_state: Option<InputDeviceState>,
}

impl fmt::Debug for PointsCallbackEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointsCallbackEvent")
            .field("kind", &self.kind)
            .field("trace", &self.trace)
            .field("points", &self.points)
            .field("selector", &self.selector)
            .field("device_state", &self.device_state)
            .finish()
    }
}

pub type PointsCallback = Rc<dyn Fn(&PointsCallbackEvent)>;

#[derive(Default)]
pub(crate) struct PointHandlers {
    by_kind: HashMap<PointsEventKind, Vec<PointsCallback>>,
}

impl PointHandlers {
    fn register(&mut self, kind: PointsEventKind, callback: PointsCallback, append: bool) {
        let callbacks = self.by_kind.entry(kind).or_default();
        if !append {
            callbacks.clear();
        }
        callbacks.push(callback);
    }

    pub(crate) fn callbacks(&self, kind: PointsEventKind) -> Vec<PointsCallback> {
        self.by_kind.get(&kind).cloned().unwrap_or_default()
    }
}

impl Node {
    /// Registers a points listener on this trace, replacing earlier ones for
    /// the same kind unless `append` is set.
    pub fn on_points_event<F>(&self, kind: PointsEventKind, callback: F, append: bool)
    where
        F: Fn(&PointsCallbackEvent) + 'static,
    {
        self.with_point_handlers(|handlers| handlers.register(kind, Rc::new(callback), append));
    }

    pub fn on_hover<F>(&self, callback: F)
    where
        F: Fn(&PointsCallbackEvent) + 'static,
    {
        self.on_points_event(PointsEventKind::Hover, callback, false);
    }

    pub fn on_unhover<F>(&self, callback: F)
    where
        F: Fn(&PointsCallbackEvent) + 'static,
    {
        self.on_points_event(PointsEventKind::Unhover, callback, false);
    }

    pub fn on_click<F>(&self, callback: F)
    where
        F: Fn(&PointsCallbackEvent) + 'static,
    {
        self.on_points_event(PointsEventKind::Click, callback, false);
    }

    pub fn on_selection<F>(&self, callback: F)
    where
        F: Fn(&PointsCallbackEvent) + 'static,
    {
        self.on_points_event(PointsEventKind::Selection, callback, false);
    }
}
