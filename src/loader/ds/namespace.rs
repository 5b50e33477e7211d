use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

use uuid::Uuid;

use crate::loader::ds::property::PropertySlot;
use crate::loader::ds::value::Value;

pub type ObjectRef = Rc<RefCell<NamespaceObject>>;

/// The object exposing a module's bindings: a legacy module's top-level
/// declarations, an ES module's exports, an importer node's children, or an
/// introspected native namespace.
///
/// Identity matters more than structure here: the registry guarantees one
/// instance per canonical identifier, and callers compare namespaces with
/// [`same_object`], never structurally. Each instance carries a uuid so the
/// identity is visible in logs and printable representations.
#[derive(Debug)]
pub struct NamespaceObject {
    instance_id: Uuid,
    name: String,
    properties: HashMap<String, PropertySlot>,
}

impl NamespaceObject {
    pub fn new(name: &str) -> ObjectRef {
        Rc::new(RefCell::new(NamespaceObject {
            instance_id: Uuid::new_v4(),
            name: name.to_string(),
            properties: HashMap::new(),
        }))
    }

    pub fn instance_id(&self) -> &Uuid {
        &self.instance_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Define or redefine a property with explicit attributes.
    ///
    /// Returns `false` without touching the slot when an existing property is
    /// non-configurable.
    pub fn define(&mut self, key: &str, slot: PropertySlot) -> bool {
        if let Some(existing) = self.properties.get(key) {
            if !existing.configurable {
                return false;
            }
        }
        self.properties.insert(key.to_string(), slot);
        true
    }

    /// Ordinary assignment. Creates a plain data slot when the key is absent;
    /// rejects the write when an existing slot is non-writable.
    pub fn set(&mut self, key: &str, value: Value) -> bool {
        match self.properties.get_mut(key) {
            Some(slot) => {
                if !slot.writable {
                    return false;
                }
                slot.value = value;
                true
            }
            None => {
                self.properties
                    .insert(key.to_string(), PropertySlot::data(value));
                true
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.properties.get(key).map(|slot| slot.value.clone())
    }

    pub fn slot(&self, key: &str) -> Option<&PropertySlot> {
        self.properties.get(key)
    }

    pub fn has_own(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Delete a property. Deleting a non-configurable slot fails silently,
    /// which is what makes `delete imports.foo` a no-op.
    pub fn delete(&mut self, key: &str) -> bool {
        match self.properties.get(key) {
            Some(slot) if !slot.configurable => false,
            Some(_) => {
                self.properties.remove(key);
                true
            }
            None => true,
        }
    }

    /// Enumerable own keys, sorted for stable iteration order.
    pub fn own_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .properties
            .iter()
            .filter(|(_, slot)| slot.enumerable)
            .map(|(key, _)| key.to_string())
            .collect();
        keys.sort();
        keys
    }
}

impl Display for NamespaceObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[Module {} #{}]",
            self.name,
            &self.instance_id.to_string()[..8]
        )
    }
}

/// Reference identity, the loader's notion of "the same module object".
pub fn same_object(a: &ObjectRef, b: &ObjectRef) -> bool {
    Rc::ptr_eq(a, b)
}
