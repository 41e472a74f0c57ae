use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::core::tree::deep_merge;
use crate::core::{PathKey, PropertyPath};
use crate::error::{FigureError, FigureResult, InvalidValueError, InvalidValueKind};
use crate::node::{DataMap, Node, Owner, Slot, map_at, map_at_mut};
use crate::sync::{OutboundMessage, SyncTransport};

use super::batch::PendingBatch;
use super::sync_state::{ChannelState, CompletionCallback, SyncChannel, SyncState};
use super::{FigureConfig, FigureSchema};

fn type_mismatch(property: &str, value: &Value) -> FigureError {
    InvalidValueError::new(property, "Figure", InvalidValueKind::TypeMismatch, value).into()
}

/// Outbound message with the channel ids it puts in flight.
type QueuedMessage = (OutboundMessage, Vec<(SyncChannel, u64)>);

/// One trace slot: the node handle plus the data it delegates to.
pub(super) struct TraceEntry {
    pub(super) uid: String,
    pub(super) node: Node,
    pub(super) data: DataMap,
    pub(super) delta: DataMap,
}

pub(crate) struct FigureState {
    pub(super) schema: FigureSchema,
    pub(super) config: FigureConfig,
    pub(super) traces: Vec<TraceEntry>,
    pub(super) layout: DataMap,
    pub(super) layout_delta: DataMap,
    pub(super) layout_node: Node,
    pub(super) transport: Option<Box<dyn SyncTransport>>,
    /// Messages emitted while the transport is busy sending.
    pub(super) outbox: VecDeque<QueuedMessage>,
    pub(super) sending: bool,
    pub(super) sync: SyncState,
    pub(super) batch: Option<PendingBatch>,
    pub(super) issued_uids: HashSet<String>,
    pub(super) next_sequential_uid: u64,
}

impl FigureState {
    pub(super) fn trace_position(&self, uid: &str) -> Option<usize> {
        self.traces.iter().position(|entry| entry.uid == uid)
    }

    pub(crate) fn with_slot_map<R>(
        &self,
        slot: &Slot,
        keys: &[PathKey],
        f: impl FnOnce(Option<&DataMap>) -> R,
    ) -> R {
        match slot {
            Slot::Trace(uid) => f(self
                .traces
                .iter()
                .find(|entry| entry.uid == *uid)
                .and_then(|entry| map_at(&entry.data, keys))),
            Slot::Layout => f(map_at(&self.layout, keys)),
            Slot::Property(_) | Slot::Element(..) => f(None),
        }
    }

    pub(crate) fn with_slot_map_mut<R>(
        &mut self,
        slot: &Slot,
        keys: &[PathKey],
        f: impl FnOnce(&mut DataMap) -> R,
    ) -> R {
        match slot {
            Slot::Trace(uid) => match self.traces.iter_mut().find(|entry| entry.uid == *uid) {
                Some(entry) => f(map_at_mut(&mut entry.data, keys)),
                None => {
                    warn!(uid = %uid, "write to a trace no longer in the figure discarded");
                    f(&mut DataMap::new())
                }
            },
            Slot::Layout => f(map_at_mut(&mut self.layout, keys)),
            Slot::Property(_) | Slot::Element(..) => f(&mut DataMap::new()),
        }
    }

    pub(crate) fn with_slot_delta<R>(
        &self,
        slot: &Slot,
        keys: &[PathKey],
        f: impl FnOnce(Option<&DataMap>) -> R,
    ) -> R {
        match slot {
            Slot::Trace(uid) => f(self
                .traces
                .iter()
                .find(|entry| entry.uid == *uid)
                .and_then(|entry| map_at(&entry.delta, keys))),
            Slot::Layout => f(map_at(&self.layout_delta, keys)),
            Slot::Property(_) | Slot::Element(..) => f(None),
        }
    }
}

impl Drop for FigureState {
    // Nodes outlive the figure as detached objects holding their last data.
    fn drop(&mut self) {
        for entry in self.traces.drain(..) {
            entry.node.adopt_snapshot(Some(entry.data));
        }
        let layout = std::mem::take(&mut self.layout);
        self.layout_node.adopt_snapshot(Some(layout));
    }
}

/// Root of the property tree: an ordered list of traces plus one layout,
/// kept in sync with a rendering surface.
///
/// `Figure` is a handle; clones share the same figure.
#[derive(Clone)]
pub struct Figure {
    pub(super) state: Rc<RefCell<FigureState>>,
}

impl fmt::Debug for Figure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state.try_borrow() {
            Ok(state) => f
                .debug_struct("Figure")
                .field("traces", &state.traces.len())
                .field("style", &state.sync.channel(SyncChannel::Style).state())
                .field("layout", &state.sync.channel(SyncChannel::Layout).state())
                .finish(),
            Err(_) => f.write_str("Figure { <borrowed> }"),
        }
    }
}

impl Figure {
    /// Creates an empty figure with a default-filled layout.
    pub fn new(schema: FigureSchema) -> FigureResult<Self> {
        Self::with_config(schema, FigureConfig::default())
    }

    pub fn with_config(schema: FigureSchema, config: FigureConfig) -> FigureResult<Self> {
        let layout = Node::new(schema.layout_class())?;
        Ok(Self::assemble(schema, config, layout))
    }

    /// Builds a figure from a `{"data": [...], "layout": {...}}` mapping.
    pub fn from_value(
        schema: FigureSchema,
        config: FigureConfig,
        value: Value,
    ) -> FigureResult<Self> {
        let Value::Object(mut figure) = value else {
            return Err(type_mismatch("figure", &value));
        };
        if let Some(key) = figure.keys().find(|key| *key != "data" && *key != "layout") {
            return Err(FigureError::unknown_property("Figure", key.clone()));
        }

        let layout = match figure.shift_remove("layout") {
            None | Some(Value::Null) => Node::new(schema.layout_class())?,
            Some(Value::Object(map)) => Node::from_map(schema.layout_class(), map)?,
            Some(other) => return Err(type_mismatch("layout", &other)),
        };
        let traces = match figure.shift_remove("data") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(other) => return Err(type_mismatch("data", &other)),
        };

        let figure = Self::assemble(schema, config, layout);
        let nodes = traces
            .into_iter()
            .map(|trace| figure.trace_node_from_value(trace))
            .collect::<FigureResult<Vec<_>>>()?;
        figure.add_traces(nodes)?;
        Ok(figure)
    }

    fn assemble(schema: FigureSchema, config: FigureConfig, layout: Node) -> Self {
        let data = layout.to_map();
        let state = Rc::new(RefCell::new(FigureState {
            schema,
            config,
            traces: Vec::new(),
            layout: data,
            layout_delta: DataMap::new(),
            layout_node: layout.clone(),
            transport: None,
            outbox: VecDeque::new(),
            sending: false,
            sync: SyncState::default(),
            batch: None,
            issued_uids: HashSet::new(),
            next_sequential_uid: 0,
        }));
        layout.attach(Owner::Figure(Rc::downgrade(&state)), Slot::Layout);
        Self { state }
    }

    pub(crate) fn from_state(state: Rc<RefCell<FigureState>>) -> Self {
        Self { state }
    }

    pub(super) fn owner(&self) -> Owner {
        Owner::Figure(Rc::downgrade(&self.state))
    }

    /// Routes outbound messages through `transport` from now on.
    pub fn set_transport(&self, transport: impl SyncTransport + 'static) {
        self.state.borrow_mut().transport = Some(Box::new(transport));
    }

    /// Detaches the transport; later edits complete immediately.
    pub fn clear_transport(&self) {
        self.state.borrow_mut().transport = None;
    }

    #[must_use]
    pub fn config(&self) -> FigureConfig {
        self.state.borrow().config.clone()
    }

    #[must_use]
    pub fn schema(&self) -> FigureSchema {
        self.state.borrow().schema.clone()
    }

    #[must_use]
    pub fn layout(&self) -> Node {
        self.state.borrow().layout_node.clone()
    }

    #[must_use]
    pub fn traces(&self) -> Vec<Node> {
        self.state.borrow().traces.iter().map(|entry| entry.node.clone()).collect()
    }

    #[must_use]
    pub fn trace(&self, index: usize) -> Option<Node> {
        self.state.borrow().traces.get(index).map(|entry| entry.node.clone())
    }

    #[must_use]
    pub fn trace_count(&self) -> usize {
        self.state.borrow().traces.len()
    }

    /// Position of `trace` in this figure.
    #[must_use]
    pub fn trace_index(&self, trace: &Node) -> Option<usize> {
        self.state
            .borrow()
            .traces
            .iter()
            .position(|entry| entry.node.ptr_eq(trace))
    }

    /// Identifiers of the traces, in order.
    #[must_use]
    pub fn trace_uids(&self) -> Vec<String> {
        self.state.borrow().traces.iter().map(|entry| entry.uid.clone()).collect()
    }

    /// Delta overlay of trace `index`.
    #[must_use]
    pub fn trace_delta(&self, index: usize) -> Option<Map<String, Value>> {
        self.state.borrow().traces.get(index).map(|entry| entry.delta.clone())
    }

    #[must_use]
    pub fn layout_delta(&self) -> Map<String, Value> {
        self.state.borrow().layout_delta.clone()
    }

    /// Authoritative tree as `{"data": [...], "layout": {...}}`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let state = self.state.borrow();
        let data = state
            .traces
            .iter()
            .map(|entry| Value::Object(entry.data.clone()))
            .collect();
        serde_json::json!({
            "data": Value::Array(data),
            "layout": Value::Object(state.layout.clone()),
        })
    }

    /// Like [`Figure::to_value`], with the delta overlay merged underneath.
    #[must_use]
    pub fn full_value(&self) -> Value {
        let overlay = |delta: &DataMap, data: &DataMap| {
            let mut merged = delta.clone();
            deep_merge(&mut merged, data);
            Value::Object(merged)
        };
        let state = self.state.borrow();
        let data = state
            .traces
            .iter()
            .map(|entry| overlay(&entry.delta, &entry.data))
            .collect();
        serde_json::json!({
            "data": Value::Array(data),
            "layout": overlay(&state.layout_delta, &state.layout),
        })
    }

    #[must_use]
    pub fn channel_state(&self, channel: SyncChannel) -> ChannelState {
        self.state.borrow().sync.channel(channel).state()
    }

    /// Id of the last message sent on `channel` (0 before the first one).
    #[must_use]
    pub fn last_edit_id(&self, channel: SyncChannel) -> u64 {
        self.state.borrow().sync.channel(channel).last_sent()
    }

    /// Runs `callback` once `channel` has no outstanding message: right away
    /// when idle, otherwise after the matching echo, in registration order.
    pub fn on_sync_complete<F>(&self, channel: SyncChannel, callback: F)
    where
        F: FnOnce() + 'static,
    {
        let mut state = self.state.borrow_mut();
        let sync = state.sync.channel_mut(channel);
        if sync.state() == ChannelState::Idle {
            drop(state);
            callback();
        } else {
            sync.enqueue(Box::new(callback));
        }
    }

    pub(super) fn complete_channel(&self, channel: SyncChannel) {
        let callbacks: Vec<CompletionCallback> =
            self.state.borrow_mut().sync.channel_mut(channel).resolve();
        debug!(channel = channel.as_str(), queued = callbacks.len(), "sync channel idle");
        for callback in callbacks {
            callback();
        }
    }

    /// Marks the channels in `ids` pending and sends `message`.
    ///
    /// Without a transport the message completes immediately. A transport
    /// may answer from inside `send`; messages emitted meanwhile are queued
    /// and sent in order once it returns. A failed send restores the
    /// channels it had marked.
    pub(super) fn emit(&self, message: OutboundMessage, ids: &[(SyncChannel, u64)]) {
        let mut transport = {
            let mut state = self.state.borrow_mut();
            if state.sending {
                trace!(kind = message.kind(), "send in progress; message queued");
                state.outbox.push_back((message, ids.to_vec()));
                return;
            }
            let Some(transport) = state.transport.take() else {
                trace!(kind = message.kind(), "no transport attached; message completes immediately");
                return;
            };
            state.sending = true;
            state.outbox.push_back((message, ids.to_vec()));
            transport
        };

        loop {
            let next = self.state.borrow_mut().outbox.pop_front();
            let Some((message, ids)) = next else {
                break;
            };
            let previous = self.state.borrow_mut().sync.enter_pending(&ids);
            match transport.send(&message) {
                Ok(()) => debug!(kind = message.kind(), "outbound message sent"),
                Err(error) => {
                    warn!(kind = message.kind(), %error, "transport rejected outbound message");
                    self.state.borrow_mut().sync.leave_pending(&ids, &previous);
                }
            }
        }

        let mut state = self.state.borrow_mut();
        state.sending = false;
        if state.transport.is_none() {
            state.transport = Some(transport);
        }
    }

    /// Entry point for changes committed through a trace or layout node.
    pub(crate) fn node_updated(&self, slot: &Slot, path: PropertyPath, value: Value) {
        match slot {
            Slot::Trace(uid) => self.trace_node_updated(uid, path, value),
            Slot::Layout => self.layout_node_updated(path, value),
            Slot::Property(_) | Slot::Element(..) => {
                trace!(path = %path, "update from a non-root slot ignored");
            }
        }
    }

    fn trace_node_updated(&self, uid: &str, path: PropertyPath, value: Value) {
        let index = {
            let mut state = self.state.borrow_mut();
            let Some(index) = state.trace_position(uid) else {
                warn!(uid, "update from a trace no longer in the figure");
                return;
            };
            if let Some(batch) = state.batch.as_mut() {
                batch.record_trace_edit(uid, &path, value);
                return;
            }
            index
        };
        let mut restyle_data = Map::new();
        restyle_data.insert(path.to_string(), Value::Array(vec![value]));
        self.send_restyle(restyle_data, vec![index]);
        self.dispatch_trace(index, &[path]);
    }

    fn layout_node_updated(&self, path: PropertyPath, value: Value) {
        {
            let mut state = self.state.borrow_mut();
            if let Some(batch) = state.batch.as_mut() {
                batch.record_layout_edit(&path, value);
                return;
            }
        }
        let mut relayout_data = Map::new();
        relayout_data.insert(path.to_string(), value);
        self.send_relayout(relayout_data);
        self.dispatch_layout(&[path]);
    }
}
