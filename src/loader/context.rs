//! The loader context: one self-contained instance of the whole subsystem.
//!
//! All shared state (the registry, the importer tree, the task queue, the
//! scheme and builtin tables) hangs off a context rather than process
//! globals, so embeddings (and tests) can run several isolated loaders
//! side by side. Handles are cheap clones of one shared context.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::host::compiler::Compiler;
use crate::host::evaluator::Evaluator;
use crate::host::fetcher::SourceFetcher;
use crate::host::introspection::IntrospectionLoader;
use crate::loader::bridge::{self, BuiltinScheme, GiScheme, SchemeHandler};
use crate::loader::config::LoaderConfig;
use crate::loader::ds::error::LoadError;
use crate::loader::ds::namespace::ObjectRef;
use crate::loader::ds::record::ModuleState;
use crate::loader::esm;
use crate::loader::importer::ImporterNode;
use crate::loader::registry::ModuleRegistry;
use crate::loader::resolve::{self, CanonicalId};
use crate::loader::tasks::{Promise, TaskQueue};

struct CxInner {
    config: RefCell<LoaderConfig>,
    registry: RefCell<ModuleRegistry>,
    queue: TaskQueue,
    fetcher: Rc<dyn SourceFetcher>,
    compiler: Rc<dyn Compiler>,
    evaluator: Rc<dyn Evaluator>,
    introspection: Rc<dyn IntrospectionLoader>,
    schemes: RefCell<HashMap<String, Rc<dyn SchemeHandler>>>,
    builtins: RefCell<HashMap<String, ObjectRef>>,
    gi_versions: RefCell<HashMap<String, String>>,
    gi_pins: RefCell<HashMap<String, String>>,
    root: RefCell<Option<ImporterNode>>,
}

/// Handle to a loader instance. Clones share the same caches and queue.
#[derive(Clone)]
pub struct LoaderCx {
    inner: Rc<CxInner>,
}

impl LoaderCx {
    pub fn new(
        config: LoaderConfig,
        fetcher: Rc<dyn SourceFetcher>,
        compiler: Rc<dyn Compiler>,
        evaluator: Rc<dyn Evaluator>,
        introspection: Rc<dyn IntrospectionLoader>,
    ) -> Self {
        let cx = LoaderCx {
            inner: Rc::new(CxInner {
                config: RefCell::new(config),
                registry: RefCell::new(ModuleRegistry::new()),
                queue: TaskQueue::new(),
                fetcher,
                compiler,
                evaluator,
                introspection,
                schemes: RefCell::new(HashMap::new()),
                builtins: RefCell::new(HashMap::new()),
                gi_versions: RefCell::new(HashMap::new()),
                gi_pins: RefCell::new(HashMap::new()),
                root: RefCell::new(None),
            }),
        };
        cx.register_scheme("gi", Rc::new(GiScheme));
        cx.register_scheme("builtin", Rc::new(BuiltinScheme));
        cx
    }

    /// The legacy importer root, created on first use from the configured
    /// search path.
    pub fn imports(&self) -> ImporterNode {
        let mut root = self.inner.root.borrow_mut();
        if let Some(node) = &*root {
            return node.clone();
        }
        let node = ImporterNode::new_root(self.inner.config.borrow().search_path.clone());
        *root = Some(node.clone());
        node
    }

    /// Resolve a specifier to a canonical identifier. See
    /// [`resolve::resolve`] for the resolution order.
    pub fn resolve(
        &self,
        specifier: &str,
        referrer: Option<&CanonicalId>,
    ) -> Result<CanonicalId, LoadError> {
        let config = self.inner.config.borrow();
        resolve::resolve(specifier, referrer, &config, self.fetcher())
    }

    /// Synchronous standards-path import, for static top-level loads.
    pub fn import_sync(
        &self,
        specifier: &str,
        referrer: Option<&CanonicalId>,
    ) -> Result<ObjectRef, LoadError> {
        esm::import_sync(self, specifier, referrer)
    }

    /// Dynamic import: resolves to the namespace once fully evaluated,
    /// without blocking the current turn. Drive with [`run_jobs`](Self::run_jobs).
    pub fn import_dynamic(
        &self,
        specifier: &str,
        referrer: Option<&CanonicalId>,
    ) -> Promise<ObjectRef> {
        esm::import_dynamic(self, specifier, referrer)
    }

    /// Synchronous access to a registered builtin module, bypassing
    /// filesystem resolution entirely.
    pub fn require(&self, name: &str) -> Result<ObjectRef, LoadError> {
        bridge::builtin_namespace(self, name)
    }

    /// Pin an introspected namespace to a version before its first load.
    pub fn pin_gi_version(&self, namespace: &str, version: &str) -> Result<(), LoadError> {
        bridge::pin_version(self, namespace, version)
    }

    pub fn register_builtin(&self, name: &str, namespace: ObjectRef) {
        self.inner
            .builtins
            .borrow_mut()
            .insert(name.to_string(), namespace);
    }

    pub fn register_scheme(&self, scheme: &str, handler: Rc<dyn SchemeHandler>) {
        self.inner
            .schemes
            .borrow_mut()
            .insert(scheme.to_string(), handler);
    }

    /// Replace the root importer's search path. Installed children are
    /// untouched; `__init__` seeding re-runs against the new roots.
    pub fn set_search_path(&self, roots: Vec<String>) {
        self.inner.config.borrow_mut().search_path = roots.clone();
        if let Some(root) = &*self.inner.root.borrow() {
            root.replace_search_path(roots);
        }
    }

    pub fn search_path(&self) -> Vec<String> {
        self.inner.config.borrow().search_path.clone()
    }

    pub fn script_extension(&self) -> String {
        self.inner.config.borrow().script_extension.clone()
    }

    /// Drain the task queue: runs parked dynamic imports and deferred
    /// completions. Returns how many jobs ran.
    pub fn run_jobs(&self) -> usize {
        self.inner.queue.run_until_idle()
    }

    /// Park a host job on the loader's queue. This is how an embedding
    /// interleaves its own event-loop work (timer callbacks, I/O
    /// completions that settle a top-level suspension) with module loads.
    pub fn enqueue_job(&self, job: impl FnOnce() + 'static) {
        self.inner.queue.enqueue(job);
    }

    /// State of the registry record for `id`, for diagnostics and tests.
    pub fn module_state(&self, id: &CanonicalId) -> Option<ModuleState> {
        self.inner.registry.borrow().state_of(id)
    }

    pub fn registry_len(&self) -> usize {
        self.inner.registry.borrow().len()
    }

    // ---- crate-internal plumbing ----

    /// Run `f` against the registry. The borrow lasts exactly the closure,
    /// which keeps registry access out of evaluation re-entry.
    pub(crate) fn with_registry<R>(&self, f: impl FnOnce(&mut ModuleRegistry) -> R) -> R {
        f(&mut self.inner.registry.borrow_mut())
    }

    pub(crate) fn queue(&self) -> &TaskQueue {
        &self.inner.queue
    }

    pub(crate) fn fetcher(&self) -> &dyn SourceFetcher {
        self.inner.fetcher.as_ref()
    }

    pub(crate) fn compiler(&self) -> &dyn Compiler {
        self.inner.compiler.as_ref()
    }

    pub(crate) fn evaluator(&self) -> &dyn Evaluator {
        self.inner.evaluator.as_ref()
    }

    pub(crate) fn introspection(&self) -> &dyn IntrospectionLoader {
        self.inner.introspection.as_ref()
    }

    pub(crate) fn scheme_handler(&self, scheme: &str) -> Option<Rc<dyn SchemeHandler>> {
        self.inner.schemes.borrow().get(scheme).cloned()
    }

    pub(crate) fn builtin(&self, name: &str) -> Option<ObjectRef> {
        self.inner.builtins.borrow().get(name).cloned()
    }

    pub(crate) fn loaded_gi_version(&self, namespace: &str) -> Option<String> {
        self.inner.gi_versions.borrow().get(namespace).cloned()
    }

    pub(crate) fn record_gi_version(&self, namespace: &str, version: &str) {
        self.inner
            .gi_versions
            .borrow_mut()
            .insert(namespace.to_string(), version.to_string());
    }

    pub(crate) fn pinned_gi_version(&self, namespace: &str) -> Option<String> {
        self.inner.gi_pins.borrow().get(namespace).cloned()
    }

    pub(crate) fn record_gi_pin(&self, namespace: &str, version: &str) {
        self.inner
            .gi_pins
            .borrow_mut()
            .insert(namespace.to_string(), version.to_string());
    }
}
