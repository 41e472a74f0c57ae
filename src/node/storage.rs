//! Where a node's data mapping lives.
//!
//! An attached node never holds data: it asks its owner for its slice of the
//! owner's tree, all the way up to the figure (or to the nearest detached
//! ancestor). A detached node keeps a private mapping with the same access
//! contract.

use std::cell::RefCell;
use std::rc::Weak;

use serde_json::{Map, Value};
use tracing::warn;

use crate::api::FigureState;
use crate::core::PathKey;
use crate::core::tree::ensure_path;

use super::NodeState;

pub(crate) type DataMap = Map<String, Value>;

/// Who a delegated node asks for its data.
#[derive(Debug, Clone)]
pub(crate) enum Owner {
    Node(Weak<RefCell<NodeState>>),
    Figure(Weak<RefCell<FigureState>>),
}

/// Position of a node inside its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Slot {
    Property(String),
    Element(String, usize),
    Trace(String),
    Layout,
}

impl Slot {
    /// Keys of this slot inside an owning node's mapping.
    pub(crate) fn keys(&self) -> Vec<PathKey> {
        match self {
            Self::Property(name) => vec![PathKey::Key(name.clone())],
            Self::Element(name, index) => vec![PathKey::Key(name.clone()), PathKey::Index(*index)],
            Self::Trace(_) | Self::Layout => Vec::new(),
        }
    }

    pub(crate) fn prop_name(&self) -> &str {
        match self {
            Self::Property(name) | Self::Element(name, _) => name,
            Self::Trace(_) => "data",
            Self::Layout => "layout",
        }
    }
}

/// Read/write access to the mapping found `keys` below a node's own mapping.
pub(crate) trait NodeStorage {
    fn with_map<R>(&self, keys: &[PathKey], f: impl FnOnce(Option<&DataMap>) -> R) -> R;

    /// Missing intermediate containers are created.
    fn with_map_mut<R>(&mut self, keys: &[PathKey], f: impl FnOnce(&mut DataMap) -> R) -> R;

    /// Delta overlay at the same position; detached nodes have none.
    fn with_delta<R>(&self, keys: &[PathKey], f: impl FnOnce(Option<&DataMap>) -> R) -> R;
}

#[derive(Debug, Default)]
pub(crate) struct OrphanStorage {
    data: DataMap,
}

impl OrphanStorage {
    pub(crate) fn new(data: DataMap) -> Self {
        Self { data }
    }

    pub(crate) fn data(&self) -> &DataMap {
        &self.data
    }
}

impl NodeStorage for OrphanStorage {
    fn with_map<R>(&self, keys: &[PathKey], f: impl FnOnce(Option<&DataMap>) -> R) -> R {
        f(map_at(&self.data, keys))
    }

    fn with_map_mut<R>(&mut self, keys: &[PathKey], f: impl FnOnce(&mut DataMap) -> R) -> R {
        f(map_at_mut(&mut self.data, keys))
    }

    fn with_delta<R>(&self, _keys: &[PathKey], f: impl FnOnce(Option<&DataMap>) -> R) -> R {
        f(None)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DelegatedStorage {
    pub(crate) owner: Owner,
    pub(crate) slot: Slot,
}

impl DelegatedStorage {
    fn owner_keys(&self, keys: &[PathKey]) -> Vec<PathKey> {
        let mut full = self.slot.keys();
        full.extend_from_slice(keys);
        full
    }
}

impl NodeStorage for DelegatedStorage {
    fn with_map<R>(&self, keys: &[PathKey], f: impl FnOnce(Option<&DataMap>) -> R) -> R {
        match &self.owner {
            Owner::Node(owner) => match owner.upgrade() {
                Some(owner) => owner.borrow().storage.with_map(&self.owner_keys(keys), f),
                None => f(None),
            },
            Owner::Figure(figure) => match figure.upgrade() {
                Some(figure) => figure.borrow().with_slot_map(&self.slot, keys, f),
                None => f(None),
            },
        }
    }

    fn with_map_mut<R>(&mut self, keys: &[PathKey], f: impl FnOnce(&mut DataMap) -> R) -> R {
        match &self.owner {
            Owner::Node(owner) => match owner.upgrade() {
                Some(owner) => owner
                    .borrow_mut()
                    .storage
                    .with_map_mut(&self.owner_keys(keys), f),
                None => dropped_owner_write(f),
            },
            Owner::Figure(figure) => match figure.upgrade() {
                Some(figure) => figure.borrow_mut().with_slot_map_mut(&self.slot, keys, f),
                None => dropped_owner_write(f),
            },
        }
    }

    fn with_delta<R>(&self, keys: &[PathKey], f: impl FnOnce(Option<&DataMap>) -> R) -> R {
        match &self.owner {
            Owner::Node(owner) => match owner.upgrade() {
                Some(owner) => owner.borrow().storage.with_delta(&self.owner_keys(keys), f),
                None => f(None),
            },
            Owner::Figure(figure) => match figure.upgrade() {
                Some(figure) => figure.borrow().with_slot_delta(&self.slot, keys, f),
                None => f(None),
            },
        }
    }
}

fn dropped_owner_write<R>(f: impl FnOnce(&mut DataMap) -> R) -> R {
    warn!("write through a dropped owner discarded");
    f(&mut DataMap::new())
}

#[derive(Debug)]
pub(crate) enum Storage {
    Orphan(OrphanStorage),
    Delegated(DelegatedStorage),
}

impl Storage {
    pub(crate) fn link(&self) -> Option<(Owner, Slot)> {
        match self {
            Self::Orphan(_) => None,
            Self::Delegated(delegated) => Some((delegated.owner.clone(), delegated.slot.clone())),
        }
    }
}

impl NodeStorage for Storage {
    fn with_map<R>(&self, keys: &[PathKey], f: impl FnOnce(Option<&DataMap>) -> R) -> R {
        match self {
            Self::Orphan(storage) => storage.with_map(keys, f),
            Self::Delegated(storage) => storage.with_map(keys, f),
        }
    }

    fn with_map_mut<R>(&mut self, keys: &[PathKey], f: impl FnOnce(&mut DataMap) -> R) -> R {
        match self {
            Self::Orphan(storage) => storage.with_map_mut(keys, f),
            Self::Delegated(storage) => storage.with_map_mut(keys, f),
        }
    }

    fn with_delta<R>(&self, keys: &[PathKey], f: impl FnOnce(Option<&DataMap>) -> R) -> R {
        match self {
            Self::Orphan(storage) => storage.with_delta(keys, f),
            Self::Delegated(storage) => storage.with_delta(keys, f),
        }
    }
}

/// Mapping found at `keys` below `root`, if every step exists.
pub(crate) fn map_at<'a>(root: &'a DataMap, keys: &[PathKey]) -> Option<&'a DataMap> {
    let Some((first, rest)) = keys.split_first() else {
        return Some(root);
    };
    let mut current = root.get(first.as_key()?)?;
    for key in rest {
        current = match (key, current) {
            (PathKey::Key(key), Value::Object(map)) => map.get(key)?,
            (PathKey::Index(index), Value::Array(items)) => items.get(*index)?,
            _ => return None,
        };
    }
    current.as_object()
}

/// Mapping at `keys` below `root`, created (and replacing scalars) as needed.
pub(crate) fn map_at_mut<'a>(root: &'a mut DataMap, keys: &[PathKey]) -> &'a mut DataMap {
    let Some((first, rest)) = keys.split_first() else {
        return root;
    };
    let slot = ensure_path(root.entry(first.to_string()).or_insert(Value::Null), rest);
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    let Value::Object(map) = slot else {
        unreachable!("mapping was just installed")
    };
    map
}
