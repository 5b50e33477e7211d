use crate::loader::ds::value::Value;

/// A data property slot on a namespace object.
///
/// The loader's object model only has data slots; module namespaces and
/// importer nodes never install accessors. The three flags carry the same
/// meaning as their engine-level property attributes: a slot that is not
/// `configurable` cannot be deleted or redefined, and a slot that is not
/// `writable` rejects assignment.
#[derive(Clone, Debug)]
pub struct PropertySlot {
    pub value: Value,
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
}

impl PropertySlot {
    /// An ordinary script-created slot: writable, enumerable, configurable.
    pub fn data(value: Value) -> Self {
        PropertySlot {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// A resolved-import slot: visible to enumeration but permanent, so a
    /// delete is a no-op and a second resolution short-circuits on lookup.
    pub fn permanent(value: Value) -> Self {
        PropertySlot {
            value,
            writable: false,
            enumerable: true,
            configurable: false,
        }
    }

    /// A meta slot (`__moduleName__`, `__parentModule__`): permanent and
    /// hidden from enumeration.
    pub fn meta(value: Value) -> Self {
        PropertySlot {
            value,
            writable: false,
            enumerable: false,
            configurable: false,
        }
    }
}
