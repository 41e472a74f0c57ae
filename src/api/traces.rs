use std::rc::Rc;

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::core::TRACE_IDENTITY_KEY;
use crate::error::{
    FigureError, FigureResult, InvalidValueError, InvalidValueKind, TraceAssignmentError,
};
use crate::node::{DataMap, Node, Slot};
use crate::sync::OutboundMessage;

use super::figure::{FigureState, TraceEntry};
use super::{Figure, SyncChannel, UidStrategy};

impl FigureState {
    /// Fresh identifier never handed out by this figure before.
    fn mint_uid(&mut self) -> String {
        loop {
            let candidate = match self.config.uid_strategy {
                UidStrategy::Uuid => Uuid::new_v4().to_string(),
                UidStrategy::Sequential => {
                    self.next_sequential_uid += 1;
                    format!("trace-{}", self.next_sequential_uid)
                }
            };
            let fresh = self.issued_uids.insert(candidate.clone());
            if fresh && self.trace_position(&candidate).is_none() {
                return candidate;
            }
        }
    }
}

impl Figure {
    /// Appends `trace` and returns its index.
    pub fn add_trace(&self, trace: Node) -> FigureResult<usize> {
        let index = self.trace_count();
        self.add_traces(vec![trace])?;
        Ok(index)
    }

    /// Appends traces, minting identifiers for those without one.
    ///
    /// Every trace is checked before any is added: it must be a detached node
    /// of a trace class this figure supports, and its identifier (if set)
    /// must not already be in use.
    pub fn add_traces(&self, traces: Vec<Node>) -> FigureResult<()> {
        if traces.is_empty() {
            return Ok(());
        }
        let mut uids: Vec<Option<String>> = Vec::with_capacity(traces.len());
        {
            let state = self.state.borrow();
            for (position, trace) in traces.iter().enumerate() {
                let class = trace.class();
                let supported = class
                    .trace_type()
                    .and_then(|trace_type| state.schema.trace_class(trace_type))
                    .is_some_and(|registered| Rc::ptr_eq(registered, &class));
                if !supported {
                    let trace_type = trace.type_name();
                    return Err(TraceAssignmentError::UnsupportedTraceType(trace_type).into());
                }
                let repeated = traces[..position].iter().any(|other| other.ptr_eq(trace));
                if repeated || !trace.is_orphan() {
                    return Err(TraceAssignmentError::AlreadyOwned(trace.type_name()).into());
                }
                let uid = trace.uid();
                if let Some(uid) = &uid {
                    let taken = state.trace_position(uid).is_some()
                        || uids.iter().flatten().any(|other| other == uid);
                    if taken {
                        return Err(TraceAssignmentError::DuplicateIdentifier(uid.clone()).into());
                    }
                }
                uids.push(uid);
            }
        }

        let owner = self.owner();
        let mut added = Vec::with_capacity(traces.len());
        {
            let mut state = self.state.borrow_mut();
            state.issued_uids.extend(uids.iter().flatten().cloned());
        }
        for (trace, uid) in traces.into_iter().zip(uids) {
            let uid = match uid {
                Some(uid) => uid,
                None => {
                    let uid = self.state.borrow_mut().mint_uid();
                    trace.with_data_mut(|data| {
                        data.insert(TRACE_IDENTITY_KEY.to_owned(), Value::String(uid.clone()));
                    });
                    uid
                }
            };
            let data = trace.to_map();
            added.push(data.clone());
            self.state.borrow_mut().traces.push(TraceEntry {
                uid: uid.clone(),
                node: trace.clone(),
                data,
                delta: DataMap::new(),
            });
            trace.attach(owner.clone(), Slot::Trace(uid));
        }

        debug!(count = added.len(), "traces added");
        self.emit(OutboundMessage::AddTraces { data: added }, &[]);
        Ok(())
    }

    /// Creates a trace from a mapping whose `type` key picks the trace class,
    /// appends it and returns the new node.
    pub fn add_trace_from_value(&self, value: Value) -> FigureResult<Node> {
        let trace = self.trace_node_from_value(value)?;
        self.add_trace(trace.clone())?;
        Ok(trace)
    }

    pub(super) fn trace_node_from_value(&self, value: Value) -> FigureResult<Node> {
        let Value::Object(map) = value else {
            let error =
                InvalidValueError::new("data", "Figure", InvalidValueKind::TypeMismatch, &value);
            return Err(error.with_detail("expected a trace mapping").into());
        };
        let class = {
            let state = self.state.borrow();
            let trace_type = map
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or(state.config.default_trace_type.as_str());
            state
                .schema
                .trace_class(trace_type)
                .cloned()
                .ok_or_else(|| TraceAssignmentError::UnsupportedTraceType(trace_type.to_owned()))?
        };
        Node::from_map(&class, map)
    }

    /// Replaces the trace sequence with `traces`, which must be a reordering
    /// of a subset of the current traces (matched by identifier).
    ///
    /// Traces left out are detached and a delete message is sent; a move
    /// message follows when the remaining order changed.
    pub fn set_traces(&self, traces: &[Node]) -> FigureResult<()> {
        let current = self.trace_uids();
        let mut requested: Vec<String> = Vec::with_capacity(traces.len());
        for trace in traces {
            let uid = trace
                .uid()
                .ok_or_else(|| TraceAssignmentError::UnknownIdentifier(trace.type_name()))?;
            if requested.contains(&uid) {
                return Err(TraceAssignmentError::DuplicateIdentifier(uid).into());
            }
            if !current.contains(&uid) {
                return Err(TraceAssignmentError::UnknownIdentifier(uid).into());
            }
            requested.push(uid);
        }

        let delete_indexes: Vec<usize> = current
            .iter()
            .enumerate()
            .filter(|(_, uid)| !requested.contains(uid))
            .map(|(index, _)| index)
            .collect();
        if !delete_indexes.is_empty() {
            self.remove_trace_entries(&delete_indexes);
        }

        let remaining = self.trace_uids();
        if remaining != requested {
            let new_indexes: Vec<usize> = remaining
                .iter()
                .filter_map(|uid| requested.iter().position(|other| other == uid))
                .collect();
            self.state.borrow_mut().traces.sort_by_key(|entry| {
                requested
                    .iter()
                    .position(|uid| *uid == entry.uid)
                    .unwrap_or(usize::MAX)
            });
            debug!(?new_indexes, "traces reordered");
            self.emit(
                OutboundMessage::MoveTraces {
                    current_indexes: (0..remaining.len()).collect(),
                    new_indexes,
                },
                &[],
            );
        }
        Ok(())
    }

    /// Removes the traces at `indexes`.
    pub fn delete_traces(&self, indexes: &[usize]) -> FigureResult<()> {
        let len = self.trace_count();
        if let Some(&index) = indexes.iter().find(|&&index| index >= len) {
            return Err(FigureError::TraceIndexOutOfRange { index, len });
        }
        let kept: Vec<Node> = self
            .traces()
            .into_iter()
            .enumerate()
            .filter(|(index, _)| !indexes.contains(index))
            .map(|(_, trace)| trace)
            .collect();
        self.set_traces(&kept)
    }

    fn remove_trace_entries(&self, delete_indexes: &[usize]) {
        let removed: Vec<Node> = delete_indexes
            .iter()
            .filter_map(|&index| self.trace(index))
            .collect();
        for trace in &removed {
            trace.detach();
        }
        let layout_edit_id = {
            let mut state = self.state.borrow_mut();
            let mut position = 0;
            state.traces.retain(|_| {
                let keep = !delete_indexes.contains(&position);
                position += 1;
                keep
            });
            state.sync.channel_mut(SyncChannel::Layout).mint()
        };
        debug!(?delete_indexes, "traces deleted");
        self.emit(
            OutboundMessage::DeleteTraces {
                delete_indexes: delete_indexes.to_vec(),
                layout_edit_id,
            },
            &[(SyncChannel::Layout, layout_edit_id)],
        );
    }
}
