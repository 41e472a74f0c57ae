//! Typed compound objects of the figure tree.
//!
//! A [`Node`] is a cheap handle: clones share the same object, and identity
//! is pointer identity. Each node has at most one owner. While owned, all of
//! its reads and writes go through the owner's storage; while detached, it
//! keeps a private snapshot.

mod class;
mod observers;
mod storage;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::trace;

use crate::api::Figure;
use crate::core::tree::{deep_merge, get_in_map, set_in, values_equal};
use crate::core::{PathKey, PropertyPath, TRACE_IDENTITY_KEY};
use crate::error::{
    FigureError, FigureResult, InvalidValueError, InvalidValueKind, TraceAssignmentError,
};
use crate::interaction::PointHandlers;
use crate::validators::Validator;

pub use class::{NodeClass, NodeClassBuilder, ValidatorFactory};
pub use observers::{ChangeCallback, ChangeEvent};

pub(crate) use observers::ObserverRegistry;
pub(crate) use storage::{
    DataMap, DelegatedStorage, NodeStorage, OrphanStorage, Owner, Slot, Storage, map_at,
    map_at_mut,
};

/// Value accepted by [`Node::set`].
#[derive(Debug, Clone)]
pub enum PropertyValue {
    Value(Value),
    Node(Node),
    /// Elements of a compound array: nodes, mappings, or a mix.
    Elements(Vec<PropertyValue>),
}

impl PropertyValue {
    /// JSON rendering, used in error messages.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Node(node) => node.to_value(),
            Self::Elements(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }
}

impl From<Value> for PropertyValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Node> for PropertyValue {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

impl From<&Node> for PropertyValue {
    fn from(node: &Node) -> Self {
        Self::Node(node.clone())
    }
}

impl From<Vec<Node>> for PropertyValue {
    fn from(nodes: Vec<Node>) -> Self {
        Self::Elements(nodes.into_iter().map(Self::Node).collect())
    }
}

/// Result of [`Node::get`].
#[derive(Debug, Clone)]
pub enum Property {
    Scalar(Value),
    Compound(Node),
    CompoundArray(Vec<Node>),
}

impl Property {
    #[must_use]
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_node(self) -> Option<Node> {
        match self {
            Self::Compound(node) => Some(node),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_nodes(self) -> Option<Vec<Node>> {
        match self {
            Self::CompoundArray(nodes) => Some(nodes),
            _ => None,
        }
    }
}

#[derive(Clone)]
enum Child {
    Single(Node),
    Array(Vec<Node>),
}

pub(crate) struct NodeState {
    class: Rc<NodeClass>,
    prop_name: String,
    pub(crate) storage: Storage,
    children: IndexMap<String, Child>,
    subplot_validators: HashMap<String, Validator>,
    observers: ObserverRegistry,
    point_handlers: PointHandlers,
}

impl Drop for NodeState {
    // Children keep their data when the node that held it goes away.
    fn drop(&mut self) {
        let Storage::Orphan(orphan) = &self.storage else {
            return;
        };
        for (name, child) in self.children.drain(..) {
            let slot_keys = |index: Option<usize>| {
                let mut keys = vec![PathKey::Key(name.clone())];
                keys.extend(index.map(PathKey::Index));
                keys
            };
            match child {
                Child::Single(node) => node.adopt_snapshot(map_at(orphan.data(), &slot_keys(None)).cloned()),
                Child::Array(nodes) => {
                    for (index, node) in nodes.into_iter().enumerate() {
                        node.adopt_snapshot(map_at(orphan.data(), &slot_keys(Some(index))).cloned());
                    }
                }
            }
        }
    }
}

/// Handle to one compound object of the tree.
#[derive(Clone)]
pub struct Node {
    inner: Rc<RefCell<NodeState>>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(state) => f
                .debug_struct("Node")
                .field("type_name", &state.class.type_name())
                .field("prop_name", &state.prop_name)
                .field("orphan", &matches!(state.storage, Storage::Orphan(_)))
                .finish(),
            Err(_) => f.write_str("Node { <borrowed> }"),
        }
    }
}

fn unknown(node: &Node, path: impl fmt::Display) -> FigureError {
    FigureError::unknown_property(node.type_name(), path.to_string())
}

impl Node {
    fn orphan(class: Rc<NodeClass>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(NodeState {
                class,
                prop_name: String::new(),
                storage: Storage::Orphan(OrphanStorage::default()),
                children: IndexMap::new(),
                subplot_validators: HashMap::new(),
                observers: ObserverRegistry::default(),
                point_handlers: PointHandlers::default(),
            })),
        }
    }

    /// Detached node with every default filled in.
    pub fn new(class: &Rc<NodeClass>) -> FigureResult<Self> {
        Self::from_map(class, Map::new())
    }

    /// Detached node built from caller-supplied values, default-filled
    /// through each validator.
    pub fn from_map(class: &Rc<NodeClass>, values: Map<String, Value>) -> FigureResult<Self> {
        let node = Self::orphan(Rc::clone(class));
        node.populate(values)?;
        Ok(node)
    }

    fn populate(&self, mut values: Map<String, Value>) -> FigureResult<()> {
        if let Some(name) = values.keys().find(|name| self.validator(name).is_none()) {
            return Err(unknown(self, name));
        }
        let class = self.class();
        for validator in class.validators() {
            let name = validator.name();
            match values.shift_remove(name) {
                Some(value) => self.set_property(name, PropertyValue::Value(value))?,
                None if validator.is_compound() => self.set_property(name, PropertyValue::Value(Value::Null))?,
                None => match &validator.info().default {
                    Some(default) if !default.is_null() => {
                        self.set_property(name, PropertyValue::Value(default.clone()))?;
                    }
                    _ => {}
                },
            }
        }
        for (name, value) in values {
            self.set_property(&name, PropertyValue::Value(value))?;
        }
        Ok(())
    }

    pub(crate) fn from_inner(inner: Rc<RefCell<NodeState>>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<RefCell<NodeState>> {
        Rc::downgrade(&self.inner)
    }

    #[must_use]
    pub fn class(&self) -> Rc<NodeClass> {
        Rc::clone(&self.inner.borrow().class)
    }

    #[must_use]
    pub fn type_name(&self) -> String {
        self.inner.borrow().class.type_name().to_owned()
    }

    /// Key under the owner (`""` when never attached).
    #[must_use]
    pub fn prop_name(&self) -> String {
        self.inner.borrow().prop_name.clone()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    #[must_use]
    pub fn is_orphan(&self) -> bool {
        matches!(self.inner.borrow().storage, Storage::Orphan(_))
    }

    /// Owning node; `None` when detached or owned directly by a figure.
    #[must_use]
    pub fn parent(&self) -> Option<Node> {
        match self.link()? {
            (Owner::Node(parent), _) => parent.upgrade().map(Self::from_inner),
            (Owner::Figure(_), _) => None,
        }
    }

    /// Trace identifier, for trace nodes.
    #[must_use]
    pub fn uid(&self) -> Option<String> {
        self.with_data(|data| {
            data.and_then(|data| data.get(TRACE_IDENTITY_KEY))
                .and_then(Value::as_str)
                .map(str::to_owned)
        })
    }

    /// Validator for `name`, including subplot-family members.
    pub(crate) fn validator(&self, name: &str) -> Option<Validator> {
        let class = self.class();
        if let Some(validator) = class.validator(name) {
            return Some(validator.clone());
        }
        if let Some(validator) = self.inner.borrow().subplot_validators.get(name) {
            return Some(validator.clone());
        }
        let matched = class.family_validator(name)?;
        self.inner
            .borrow_mut()
            .subplot_validators
            .insert(name.to_owned(), matched.clone());
        Some(matched)
    }

    pub(crate) fn link(&self) -> Option<(Owner, Slot)> {
        self.inner.borrow().storage.link()
    }

    fn is_figure_trace(&self) -> bool {
        matches!(self.link(), Some((Owner::Figure(_), Slot::Trace(_))))
    }

    pub(crate) fn with_data<R>(&self, f: impl FnOnce(Option<&DataMap>) -> R) -> R {
        self.inner.borrow().storage.with_map(&[], f)
    }

    pub(crate) fn with_data_mut<R>(&self, f: impl FnOnce(&mut DataMap) -> R) -> R {
        self.inner.borrow_mut().storage.with_map_mut(&[], f)
    }

    pub(crate) fn with_delta<R>(&self, f: impl FnOnce(Option<&DataMap>) -> R) -> R {
        self.inner.borrow().storage.with_delta(&[], f)
    }

    /// Authoritative value at `path`, falling back to the delta overlay.
    pub(crate) fn read_value(&self, path: &PropertyPath) -> Option<Value> {
        self.with_data(|data| data.and_then(|data| get_in_map(data, path)).cloned())
            .or_else(|| self.with_delta(|delta| delta.and_then(|delta| get_in_map(delta, path)).cloned()))
    }

    /// Resolves a dotted/bracketed path.
    ///
    /// Returns `Ok(None)` when the path is valid but nothing is set there.
    pub fn get(&self, path: &str) -> FigureResult<Option<Property>> {
        self.get_path(&PropertyPath::parse(path))
    }

    pub fn get_path(&self, path: &PropertyPath) -> FigureResult<Option<Property>> {
        let Some((first, rest)) = path.keys().split_first() else {
            return Ok(Some(Property::Compound(self.clone())));
        };
        let name = first.as_key().ok_or_else(|| unknown(self, path))?;
        let validator = self.validator(name).ok_or_else(|| unknown(self, path))?;
        let rest: PropertyPath = rest.iter().collect();

        match validator {
            Validator::Compound(_) => {
                let child = self.child(name)?;
                if rest.is_empty() {
                    Ok(Some(Property::Compound(child)))
                } else {
                    child.get_path(&rest)
                }
            }
            Validator::CompoundArray(_) => {
                let elements = self.children(name)?;
                match rest.keys().split_first() {
                    None => Ok(Some(Property::CompoundArray(elements))),
                    Some((PathKey::Index(index), tail)) => match elements.get(*index) {
                        Some(element) => element.get_path(&tail.iter().collect()),
                        None => Ok(None),
                    },
                    Some(_) => Err(unknown(self, path)),
                }
            }
            Validator::Any(_) => Ok(self.read_value(path).map(Property::Scalar)),
            _ if matches!(rest.keys().first(), Some(PathKey::Key(_))) => Err(unknown(self, path)),
            _ => Ok(self.read_value(path).map(Property::Scalar)),
        }
    }

    /// Scalar value at `path`.
    pub fn value(&self, path: &str) -> FigureResult<Option<Value>> {
        Ok(match self.get(path)? {
            Some(Property::Scalar(value)) => Some(value),
            Some(Property::Compound(node)) => Some(node.to_value()),
            Some(Property::CompoundArray(nodes)) => {
                Some(Value::Array(nodes.iter().map(Node::to_value).collect()))
            }
            None => None,
        })
    }

    /// Compound child `name`, created on first access for subplot families.
    pub fn child(&self, name: &str) -> FigureResult<Node> {
        if let Some(Child::Single(child)) = self.inner.borrow().children.get(name) {
            return Ok(child.clone());
        }
        let Some(Validator::Compound(compound)) = self.validator(name) else {
            return Err(unknown(self, name));
        };
        let child = Self::orphan(Rc::clone(compound.class()));
        child.attach(Owner::Node(self.downgrade()), Slot::Property(name.to_owned()));
        self.inner
            .borrow_mut()
            .children
            .insert(name.to_owned(), Child::Single(child.clone()));
        Ok(child)
    }

    /// Elements of compound array `name`, kept in step with the stored list.
    pub fn children(&self, name: &str) -> FigureResult<Vec<Node>> {
        let Some(Validator::CompoundArray(array)) = self.validator(name) else {
            return Err(unknown(self, name));
        };
        let len = self.with_data(|data| {
            data.and_then(|data| data.get(name))
                .and_then(Value::as_array)
                .map_or(0, Vec::len)
        });

        let owner = self.downgrade();
        let mut state = self.inner.borrow_mut();
        let entry = state
            .children
            .entry(name.to_owned())
            .or_insert_with(|| Child::Array(Vec::new()));
        let Child::Array(elements) = entry else {
            return Err(FigureError::unknown_property(array.info.parent_name.clone(), name));
        };
        let stale = elements.split_off(len.min(elements.len()));
        while elements.len() < len {
            let element = Self::orphan(Rc::clone(array.class()));
            element.attach(
                Owner::Node(owner.clone()),
                Slot::Element(name.to_owned(), elements.len()),
            );
            elements.push(element);
        }
        let current = elements.clone();
        drop(state);

        for element in stale {
            element.detach();
        }
        Ok(current)
    }

    /// Assigns a property addressed by a dotted path.
    ///
    /// Intermediate segments must name compound properties (or elements of
    /// compound arrays); the last segment is validated by its validator.
    pub fn set(&self, path: &str, value: impl Into<PropertyValue>) -> FigureResult<()> {
        let path = PropertyPath::parse(path);
        let (target, name) = self.resolve_target(&path)?;
        target.set_property(&name, value.into())
    }

    /// Removes a property. Compound properties are replaced by an empty
    /// node; the previous child is detached.
    pub fn unset(&self, path: &str) -> FigureResult<()> {
        let path = PropertyPath::parse(path);
        let (target, name) = self.resolve_target(&path)?;
        match target.validator(&name) {
            Some(Validator::Compound(compound)) => {
                target.assign_compound(&name, Self::orphan(Rc::clone(compound.class())))
            }
            Some(Validator::CompoundArray(_)) => target.assign_compound_array(&name, Vec::new()),
            Some(_) => target.assign_scalar(&name, Value::Null),
            None => Err(unknown(&target, &name)),
        }
    }

    fn resolve_target(&self, path: &PropertyPath) -> FigureResult<(Node, String)> {
        let Some((last, parents)) = path.keys().split_last() else {
            return Err(unknown(self, path));
        };
        let mut node = self.clone();
        let mut position = 0;
        while position < parents.len() {
            let (next, consumed) = node
                .step_into(&parents[position..])
                .ok_or_else(|| unknown(self, path))?;
            node = next;
            position += consumed;
        }
        let name = last.as_key().ok_or_else(|| unknown(self, path))?;
        Ok((node, name.to_owned()))
    }

    /// Child node addressed by the leading keys, with the number of keys used.
    pub(crate) fn step_into(&self, keys: &[PathKey]) -> Option<(Node, usize)> {
        let Some(PathKey::Key(name)) = keys.first() else {
            return None;
        };
        match self.validator(name)? {
            Validator::Compound(_) => self.child(name).ok().map(|child| (child, 1)),
            Validator::CompoundArray(_) => match keys.get(1) {
                Some(PathKey::Index(index)) => self
                    .children(name)
                    .ok()?
                    .get(*index)
                    .cloned()
                    .map(|element| (element, 2)),
                _ => None,
            },
            _ => None,
        }
    }

    fn set_property(&self, name: &str, value: PropertyValue) -> FigureResult<()> {
        let validator = self.validator(name).ok_or_else(|| unknown(self, name))?;
        match validator {
            Validator::Compound(compound) => self.assign_compound(name, compound.coerce(value)?),
            Validator::CompoundArray(array) => self.assign_compound_array(name, array.coerce(value)?),
            scalar => {
                let PropertyValue::Value(raw) = value else {
                    return Err(InvalidValueError::new(
                        name,
                        scalar.parent_name(),
                        InvalidValueKind::TypeMismatch,
                        &value.to_json(),
                    )
                    .with_detail("expected a plain value, not a node")
                    .into());
                };
                let coerced = scalar.validate_coerce(&raw)?;
                self.assign_scalar(name, coerced)
            }
        }
    }

    fn assign_scalar(&self, name: &str, coerced: Value) -> FigureResult<()> {
        let current = self.with_data(|data| data.and_then(|data| data.get(name)).cloned());
        let unchanged = match &current {
            Some(current) => values_equal(current, &coerced),
            None => coerced.is_null(),
        };
        if unchanged {
            trace!(property = name, "assignment leaves value unchanged");
            return Ok(());
        }
        if name == TRACE_IDENTITY_KEY && self.is_figure_trace() {
            return Err(TraceAssignmentError::IdentifierChange(self.uid().unwrap_or_default()).into());
        }
        let path = PropertyPath::from_keys([name]);
        self.with_data_mut(|data| set_in(data, &path, Some(coerced.clone())));
        self.propagate_update(path, coerced);
        Ok(())
    }

    fn assign_compound(&self, name: &str, child: Node) -> FigureResult<()> {
        let previous = match self.inner.borrow().children.get(name) {
            Some(Child::Single(previous)) => Some(previous.clone()),
            _ => None,
        };
        if previous.as_ref().is_some_and(|previous| previous.ptr_eq(&child)) {
            return Ok(());
        }
        if !child.is_orphan() {
            return Err(FigureError::NodeAlreadyOwned {
                type_name: child.type_name(),
            });
        }

        let snapshot = child.to_map();
        if let Some(previous) = previous {
            previous.detach();
        }
        let path = PropertyPath::from_keys([name]);
        let value = (!snapshot.is_empty()).then_some(Value::Object(snapshot));
        let changed = self.with_data_mut(|data| set_in(data, &path, value.clone()));
        child.attach(Owner::Node(self.downgrade()), Slot::Property(name.to_owned()));
        self.inner
            .borrow_mut()
            .children
            .insert(name.to_owned(), Child::Single(child));
        if changed {
            self.propagate_update(path, value.unwrap_or(Value::Null));
        }
        Ok(())
    }

    fn assign_compound_array(&self, name: &str, elements: Vec<Node>) -> FigureResult<()> {
        let previous = self.children(name)?;
        for (position, element) in elements.iter().enumerate() {
            let repeated = elements[..position].iter().any(|other| other.ptr_eq(element));
            let foreign = !element.is_orphan() && !previous.iter().any(|other| other.ptr_eq(element));
            if repeated || foreign {
                return Err(FigureError::NodeAlreadyOwned {
                    type_name: element.type_name(),
                });
            }
        }

        let snapshots: Vec<Value> = elements.iter().map(Node::to_value).collect();
        for stale in previous
            .iter()
            .filter(|old| !elements.iter().any(|element| element.ptr_eq(old)))
        {
            stale.detach();
        }
        let path = PropertyPath::from_keys([name]);
        let value = (!snapshots.is_empty()).then_some(Value::Array(snapshots));
        let changed = self.with_data_mut(|data| set_in(data, &path, value.clone()));
        for (index, element) in elements.iter().enumerate() {
            element.attach(Owner::Node(self.downgrade()), Slot::Element(name.to_owned(), index));
        }
        self.inner
            .borrow_mut()
            .children
            .insert(name.to_owned(), Child::Array(elements));
        if changed {
            self.propagate_update(path, value.unwrap_or(Value::Null));
        }
        Ok(())
    }

    /// Forwards a committed change toward the figure, qualifying the path
    /// with each owner's slot on the way up.
    fn propagate_update(&self, path: PropertyPath, value: Value) {
        let Some((owner, slot)) = self.link() else {
            trace!(path = %path, "detached node updated; nothing to propagate");
            return;
        };
        match owner {
            Owner::Node(parent) => {
                if let Some(parent) = parent.upgrade() {
                    Self::from_inner(parent).propagate_update(path.prefixed(&slot.keys()), value);
                }
            }
            Owner::Figure(figure) => {
                if let Some(figure) = figure.upgrade() {
                    Figure::from_state(figure).node_updated(&slot, path, value);
                }
            }
        }
    }

    pub(crate) fn attach(&self, owner: Owner, slot: Slot) {
        let mut state = self.inner.borrow_mut();
        state.prop_name = slot.prop_name().to_owned();
        state.storage = Storage::Delegated(DelegatedStorage { owner, slot });
    }

    /// Copies the current data into private storage and drops the owner link.
    pub(crate) fn detach(&self) {
        let snapshot = self.to_map();
        self.inner.borrow_mut().storage = Storage::Orphan(OrphanStorage::new(snapshot));
    }

    pub(crate) fn adopt_snapshot(&self, data: Option<DataMap>) {
        if let Ok(mut state) = self.inner.try_borrow_mut() {
            state.storage = Storage::Orphan(OrphanStorage::new(data.unwrap_or_default()));
        }
    }

    /// Authoritative data of this node.
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        self.with_data(|data| data.cloned().unwrap_or_default())
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.to_map())
    }

    /// Authoritative data laid over the delta overlay.
    #[must_use]
    pub fn full_value(&self) -> Value {
        let mut merged = self.with_delta(|delta| delta.cloned().unwrap_or_default());
        deep_merge(&mut merged, &self.to_map());
        Value::Object(merged)
    }

    /// Registers `callback` for changes below any of `watched` (or anything,
    /// when `watched` is empty), replacing an earlier registration with the
    /// same watch set.
    pub fn on_change<F>(&self, watched: &[&str], callback: F) -> FigureResult<()>
    where
        F: Fn(&ChangeEvent) + 'static,
    {
        self.register_observer(watched, Rc::new(callback), false)
    }

    /// Like [`Node::on_change`], keeping earlier callbacks for the same watch set.
    pub fn on_change_append<F>(&self, watched: &[&str], callback: F) -> FigureResult<()>
    where
        F: Fn(&ChangeEvent) + 'static,
    {
        self.register_observer(watched, Rc::new(callback), true)
    }

    fn register_observer(&self, watched: &[&str], callback: ChangeCallback, append: bool) -> FigureResult<()> {
        let paths: Vec<PropertyPath> = watched.iter().map(|path| PropertyPath::parse(path)).collect();
        for path in &paths {
            match path.first() {
                Some(PathKey::Key(name)) if self.validator(name).is_some() => {}
                _ => return Err(unknown(self, path)),
            }
        }
        self.inner
            .borrow_mut()
            .observers
            .register(paths, callback, append);
        Ok(())
    }

    pub(crate) fn has_observers(&self) -> bool {
        !self.inner.borrow().observers.is_empty()
    }

    /// Runs matching observers. No borrow is held while callbacks run, so
    /// they may mutate the tree.
    pub(crate) fn notify(&self, changed: &[PropertyPath]) {
        let calls = self.inner.borrow().observers.matching(changed);
        for (callback, paths) in calls {
            callback(&ChangeEvent {
                node: self.clone(),
                changed: paths,
            });
        }
    }

    pub(crate) fn with_point_handlers<R>(&self, f: impl FnOnce(&mut PointHandlers) -> R) -> R {
        f(&mut self.inner.borrow_mut().point_handlers)
    }
}
