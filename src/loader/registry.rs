//! The module registry: one record per canonical identifier, shared by the
//! legacy importer and the standards-path loader.
//!
//! The central invariant lives here: for any canonical identifier there is
//! at most one `Evaluated` record, and every successful resolution hands
//! back that record's namespace object by reference. Records that error are
//! evicted in the same span, never cached.

use std::collections::HashMap;

use log::debug;

use crate::loader::ds::error::LoadError;
use crate::loader::ds::namespace::{NamespaceObject, ObjectRef};
use crate::loader::ds::record::{ModuleRecord, ModuleState, RecordRef};
use crate::loader::resolve::CanonicalId;

pub struct ModuleRegistry {
    records: HashMap<CanonicalId, RecordRef>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        ModuleRegistry {
            records: HashMap::new(),
        }
    }

    pub fn lookup(&self, id: &CanonicalId) -> Option<RecordRef> {
        self.records.get(id).cloned()
    }

    /// Return the existing record for `id` in whatever state it is in
    /// (this is what lets a cycle find the in-flight record instead of
    /// recursing), or insert a fresh `Pending` record with an empty
    /// namespace named `ns_name`.
    pub fn get_or_create(&mut self, id: &CanonicalId, ns_name: &str) -> (RecordRef, bool) {
        if let Some(existing) = self.records.get(id) {
            return (existing.clone(), false);
        }
        debug!("registry: new pending record for {}", id);
        let record = ModuleRecord::new_pending(id.clone(), NamespaceObject::new(ns_name));
        self.records.insert(id.clone(), record.clone());
        (record, true)
    }

    /// Transition a record to `Evaluated`, attaching its final namespace.
    ///
    /// Loads are serialized, so a second commit for the same identifier is a
    /// loader bug and reports `DoubleEvaluation`.
    pub fn commit(&mut self, id: &CanonicalId, namespace: ObjectRef) -> Result<(), LoadError> {
        let record = match self.records.get(id) {
            Some(record) => record.clone(),
            None => {
                return Err(LoadError::DoubleEvaluation(format!(
                    "{} (no record to commit)",
                    id
                )))
            }
        };
        {
            let mut record = record.borrow_mut();
            if record.state() == ModuleState::Evaluated {
                return Err(LoadError::DoubleEvaluation(id.as_text()));
            }
            record.attach_namespace(namespace);
            record.mark_evaluated();
        }
        debug!("registry: committed {}", id);
        Ok(())
    }

    /// Drop a record. Used only when a load errors, so the next request for
    /// the same identifier retries from scratch.
    pub fn evict(&mut self, id: &CanonicalId) -> bool {
        match self.records.remove(id) {
            Some(record) => {
                record.borrow_mut().mark_errored();
                debug!("registry: evicted {}", id);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn state_of(&self, id: &CanonicalId) -> Option<ModuleState> {
        self.records.get(id).map(|r| r.borrow().state())
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
