use std::cell::RefCell;
use std::rc::Rc;

use crate::host::compiler::CompiledUnit;
use crate::loader::ds::namespace::ObjectRef;
use crate::loader::resolve::CanonicalId;
use crate::loader::tasks::Promise;

/// Lifecycle of a module record.
///
/// `Errored` is transient: a record that errors is evicted from the registry
/// in the same span, so later requests retry from scratch instead of
/// observing a poisoned entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Pending,
    Instantiated,
    Evaluated,
    Errored,
}

pub type RecordRef = Rc<RefCell<ModuleRecord>>;

/// One registry entry: the single holder of a module's namespace object and
/// load-state for a canonical identifier.
pub struct ModuleRecord {
    id: CanonicalId,
    state: ModuleState,
    namespace: ObjectRef,
    source: Option<String>,
    unit: Option<CompiledUnit>,
    dependencies: Vec<CanonicalId>,
    // true while this record's own body (or a cycle through it) is being
    // evaluated, so a re-entrant evaluation request returns instead of
    // recursing forever
    evaluating: bool,
    // present while a top-level suspension is outstanding; later requests
    // share this completion instead of re-running the body
    completion: Option<Promise<()>>,
}

impl ModuleRecord {
    pub fn new_pending(id: CanonicalId, namespace: ObjectRef) -> RecordRef {
        Rc::new(RefCell::new(ModuleRecord {
            id,
            state: ModuleState::Pending,
            namespace,
            source: None,
            unit: None,
            dependencies: Vec::new(),
            evaluating: false,
            completion: None,
        }))
    }

    pub fn id(&self) -> &CanonicalId {
        &self.id
    }

    pub fn state(&self) -> ModuleState {
        self.state
    }

    pub fn namespace(&self) -> ObjectRef {
        self.namespace.clone()
    }

    pub fn set_source(&mut self, source: String) {
        self.source = Some(source);
    }

    /// Attach the compiled form and release the raw source text.
    pub fn set_unit(&mut self, unit: CompiledUnit) {
        self.unit = Some(unit);
        self.source = None;
    }

    pub fn unit(&self) -> Option<CompiledUnit> {
        self.unit.clone()
    }

    pub fn set_dependencies(&mut self, dependencies: Vec<CanonicalId>) {
        self.dependencies = dependencies;
    }

    pub fn dependencies(&self) -> Vec<CanonicalId> {
        self.dependencies.clone()
    }

    pub fn mark_instantiated(&mut self) {
        debug_assert_eq!(self.state, ModuleState::Pending);
        self.state = ModuleState::Instantiated;
    }

    pub fn mark_evaluated(&mut self) {
        self.state = ModuleState::Evaluated;
    }

    pub fn mark_errored(&mut self) {
        self.state = ModuleState::Errored;
    }

    pub fn is_evaluating(&self) -> bool {
        self.evaluating
    }

    pub fn set_evaluating(&mut self, evaluating: bool) {
        self.evaluating = evaluating;
    }

    pub fn completion(&self) -> Option<Promise<()>> {
        self.completion.clone()
    }

    pub fn set_completion(&mut self, completion: Option<Promise<()>>) {
        self.completion = completion;
    }

    /// Replace the namespace object. Only the registry's commit path does
    /// this, for records whose namespace is materialized externally (native
    /// introspected namespaces and builtins).
    pub(crate) fn attach_namespace(&mut self, namespace: ObjectRef) {
        self.namespace = namespace;
    }
}
