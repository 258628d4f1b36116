//! Keyed tensor storage shared by nodes and elements.
//!
//! An [`AttributeStore`] maps small integer ids to tensor values. Values are
//! reference counted so that one value broadcast to many items is stored
//! once. An [`AttributeRegistry`] maps human-readable names to
//! `(id, order)` pairs; the mesh owns one registry for nodes and one for
//! elements.

use crate::types::AttributeValue;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Identifier of a registered attribute. Ids start at 1.
pub type AttributeId = usize;

/// Name under which node coordinates are registered.
pub const COORDINATES: &str = "Cartesian Coordinates";

/// Id reserved for node coordinates (always the first registration).
pub const COORDINATES_ID: AttributeId = 1;

/// Mapping from attribute id to value for a single node or element.
#[derive(Debug, Clone, Default)]
pub struct AttributeStore {
    values: HashMap<AttributeId, Arc<AttributeValue>>,
}

impl AttributeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow the value stored under `id`, if any.
    pub fn get(&self, id: AttributeId) -> Option<&AttributeValue> {
        self.values.get(&id).map(|v| v.as_ref())
    }

    /// Value stored under `id`, or a 1×1 zero when absent.
    pub fn value(&self, id: AttributeId) -> AttributeValue {
        self.get(id)
            .cloned()
            .unwrap_or_else(|| AttributeValue::zeros(1, 1))
    }

    /// Shared handle on the value stored under `id`.
    pub fn shared(&self, id: AttributeId) -> Option<Arc<AttributeValue>> {
        self.values.get(&id).cloned()
    }

    /// Insert or replace the value stored under `id`.
    pub fn set(&mut self, id: AttributeId, value: AttributeValue) {
        self.values.insert(id, Arc::new(value));
    }

    /// Insert or replace with a value that may be shared with other items.
    pub fn set_shared(&mut self, id: AttributeId, value: Arc<AttributeValue>) {
        self.values.insert(id, value);
    }

    /// Whether a value is stored under `id`.
    pub fn contains(&self, id: AttributeId) -> bool {
        self.values.contains_key(&id)
    }

    /// Stored ids, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = AttributeId> + '_ {
        self.values.keys().copied()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Registry entry: id and tensor order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeEntry {
    /// Attribute id.
    pub id: AttributeId,
    /// Tensor order.
    pub order: usize,
}

/// Name → (id, order) table with monotonically assigned ids.
#[derive(Debug, Clone, Default)]
pub struct AttributeRegistry {
    entries: BTreeMap<String, AttributeEntry>,
    max_id: AttributeId,
}

impl AttributeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` with `order` and return its id.
    ///
    /// A name that is already known keeps its id; only the recorded order is
    /// updated.
    pub fn register(&mut self, name: &str, order: usize) -> AttributeId {
        if let Some(entry) = self.entries.get_mut(name) {
            entry.order = order;
            return entry.id;
        }
        self.max_id += 1;
        let id = self.max_id;
        self.entries.insert(name.to_string(), AttributeEntry { id, order });
        id
    }

    /// Id of `name` if it is registered with exactly `order`.
    pub fn id(&self, name: &str, order: usize) -> Option<AttributeId> {
        self.entries
            .get(name)
            .filter(|entry| entry.order == order)
            .map(|entry| entry.id)
    }

    /// Entry of `name`, whatever its order.
    pub fn entry(&self, name: &str) -> Option<AttributeEntry> {
        self.entries.get(name).copied()
    }

    /// Recorded order of `name`.
    pub fn order(&self, name: &str) -> Option<usize> {
        self.entries.get(name).map(|entry| entry.order)
    }

    /// All entries ordered by name.
    pub fn entries(&self) -> impl Iterator<Item = (&str, AttributeEntry)> + '_ {
        self.entries.iter().map(|(name, entry)| (name.as_str(), *entry))
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
