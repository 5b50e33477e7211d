//! The legacy synchronous importer: a lazily-populated tree of namespace
//! nodes, one per directory spanned by the search path.
//!
//! Each child access on a node resolves on demand, in this order per search
//! directory: a declaration seeded by the directory's `__init__` script,
//! then a subdirectory, then a file `<name>.<ext>`. A subdirectory match in
//! any search root wins over files in later roots, and subdirectories with
//! the same name across several roots merge into a single child node whose
//! own search path lists them all.
//!
//! Resolved children are installed as permanent, non-configurable
//! properties: a second access short-circuits on the property lookup and a
//! delete is a silent no-op. A child whose evaluation throws installs
//! nothing and caches nothing, so the next access retries from scratch.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::rc::{Rc, Weak};

use log::{debug, warn};

use crate::host::compiler::CompileMode;
use crate::loader::bridge;
use crate::loader::context::LoaderCx;
use crate::loader::ds::error::LoadError;
use crate::loader::ds::namespace::{NamespaceObject, ObjectRef};
use crate::loader::ds::property::PropertySlot;
use crate::loader::ds::record::ModuleState;
use crate::loader::ds::value::Value;
use crate::loader::resolve::CanonicalId;

/// Stem of the script that seeds a directory node's own namespace.
pub const INIT_STEM: &str = "__init__";

const META_MODULE_NAME: &str = "__moduleName__";
const META_PARENT_MODULE: &str = "__parentModule__";

enum NodeKind {
    /// A directory (or the synthetic root) backed by search-path probing.
    Tree,
    /// The `gi` node: children are introspected native namespaces, shared
    /// with the standards loader through the interop bridge.
    Introspection,
}

struct NodeInner {
    kind: NodeKind,
    ns: ObjectRef,
    name: Option<String>,
    parent: Option<Weak<NodeInner>>,
    search_path: RefCell<Vec<String>>,
    seeded: Cell<bool>,
    children: RefCell<HashMap<String, ImporterNode>>,
}

/// Handle to one node of the importer tree. Clones share the node.
#[derive(Clone)]
pub struct ImporterNode {
    inner: Rc<NodeInner>,
}

impl ImporterNode {
    /// The synthetic root spanning the configured search roots.
    pub(crate) fn new_root(search_path: Vec<String>) -> ImporterNode {
        Self::new_node(NodeKind::Tree, None, None, search_path)
    }

    fn new_node(
        kind: NodeKind,
        name: Option<String>,
        parent: Option<&ImporterNode>,
        search_path: Vec<String>,
    ) -> ImporterNode {
        let display = match (&name, parent) {
            (Some(name), Some(parent)) => parent.child_path(name),
            (Some(name), None) => name.to_string(),
            _ => "root".to_string(),
        };
        let ns = NamespaceObject::new(&display);
        {
            let mut ns_mut = ns.borrow_mut();
            let name_value = match &name {
                Some(name) => Value::String(name.to_string()),
                None => Value::Null,
            };
            ns_mut.define(META_MODULE_NAME, PropertySlot::meta(name_value));
            let parent_value = match parent {
                Some(parent) => Value::Object(parent.namespace()),
                None => Value::Null,
            };
            ns_mut.define(META_PARENT_MODULE, PropertySlot::meta(parent_value));
        }
        ImporterNode {
            inner: Rc::new(NodeInner {
                kind,
                ns,
                name,
                parent: parent.map(|p| Rc::downgrade(&p.inner)),
                search_path: RefCell::new(search_path),
                seeded: Cell::new(false),
                children: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub fn namespace(&self) -> ObjectRef {
        self.inner.ns.clone()
    }

    pub fn module_name(&self) -> Option<String> {
        self.inner.name.clone()
    }

    pub fn parent(&self) -> Option<ImporterNode> {
        self.inner
            .parent
            .as_ref()
            .and_then(|weak| weak.upgrade())
            .map(|inner| ImporterNode { inner })
    }

    pub fn search_path(&self) -> Vec<String> {
        self.inner.search_path.borrow().clone()
    }

    /// Swap the directories this node spans. Children already installed
    /// stay installed; `__init__` seeding re-runs against the new roots on
    /// the next resolution.
    pub(crate) fn replace_search_path(&self, roots: Vec<String>) {
        *self.inner.search_path.borrow_mut() = roots;
        self.inner.seeded.set(false);
    }

    fn is_root(&self) -> bool {
        self.inner.parent.is_none()
    }

    /// Dotted path from the root, e.g. `subA.subB`; `root` for the root.
    pub fn dotted_path(&self) -> String {
        match (&self.inner.name, self.parent()) {
            (Some(name), Some(parent)) if !parent.is_root() => {
                format!("{}.{}", parent.dotted_path(), name)
            }
            (Some(name), _) => name.to_string(),
            _ => "root".to_string(),
        }
    }

    fn child_path(&self, name: &str) -> String {
        if self.is_root() {
            name.to_string()
        } else {
            format!("{}.{}", self.dotted_path(), name)
        }
    }

    /// Look up (and on first access, resolve) the child `name`.
    pub fn get(&self, cx: &LoaderCx, name: &str) -> Result<Value, LoadError> {
        if let Some(value) = self.inner.ns.borrow().get(name) {
            return Ok(value);
        }
        match self.inner.kind {
            NodeKind::Introspection => self.resolve_introspected(cx, name),
            NodeKind::Tree => self.resolve_child(cx, name),
        }
    }

    /// Like [`get`](Self::get), but hands back the child as a tree node for
    /// further navigation. Fails when `name` resolves to a plain module.
    pub fn child(&self, cx: &LoaderCx, name: &str) -> Result<ImporterNode, LoadError> {
        self.get(cx, name)?;
        match self.inner.children.borrow().get(name) {
            Some(node) => Ok(node.clone()),
            None => Err(LoadError::evaluation(
                Some(&self.dotted_path()),
                format!("'{}' is a module, not a subdirectory importer", name),
            )),
        }
    }

    fn resolve_introspected(&self, cx: &LoaderCx, name: &str) -> Result<Value, LoadError> {
        let ns = bridge::shared_namespace(cx, name, None)?;
        self.install(name, Value::Object(ns.clone()));
        Ok(Value::Object(ns))
    }

    fn resolve_child(&self, cx: &LoaderCx, name: &str) -> Result<Value, LoadError> {
        self.ensure_seeded(cx)?;

        // An __init__ declaration satisfies the lookup before any probing.
        if let Some(value) = self.inner.ns.borrow().get(name) {
            return Ok(value);
        }

        if self.is_root() {
            if let Some(ns) = bridge::try_builtin(cx, name)? {
                debug!("importer: '{}' satisfied by builtin registry", name);
                self.install(name, Value::Object(ns.clone()));
                return Ok(Value::Object(ns));
            }
            if name == bridge::GI_NODE_NAME {
                let child =
                    Self::new_node(NodeKind::Introspection, Some(name.to_string()), Some(self), Vec::new());
                self.install(name, Value::Object(child.namespace()));
                self.inner
                    .children
                    .borrow_mut()
                    .insert(name.to_string(), child.clone());
                return Ok(Value::Object(child.namespace()));
            }
        }

        let extension = cx.script_extension();
        let roots = self.inner.search_path.borrow().clone();
        let mut directories: Vec<String> = Vec::new();

        for root in &roots {
            let dir_candidate = CanonicalId::path(&format!("{}/{}", root, name));
            if cx.fetcher().is_directory(&dir_candidate) {
                debug!(
                    "importer: adding directory '{}' to child importer '{}'",
                    dir_candidate, name
                );
                directories.push(dir_candidate.as_text());
                continue;
            }

            // A directory match in an earlier root hides files in later ones.
            if !directories.is_empty() {
                continue;
            }

            let file_candidate =
                CanonicalId::path(&format!("{}/{}.{}", root, name, extension));
            if cx.fetcher().exists(&file_candidate) {
                return self.import_file(cx, name, file_candidate);
            }
            debug!("importer: '{}' not found in {}", name, root);
        }

        if !directories.is_empty() {
            let child = Self::new_node(
                NodeKind::Tree,
                Some(name.to_string()),
                Some(self),
                directories,
            );
            // A throwing __init__ aborts construction; nothing is installed
            // and the next access retries.
            child.ensure_seeded(cx)?;
            self.install(name, Value::Object(child.namespace()));
            self.inner
                .children
                .borrow_mut()
                .insert(name.to_string(), child.clone());
            debug!("importer: successfully imported directory '{}'", self.child_path(name));
            return Ok(Value::Object(child.namespace()));
        }

        let referrer = if self.is_root() {
            None
        } else {
            Some(self.dotted_path())
        };
        Err(LoadError::not_found(name, referrer.as_deref()))
    }

    fn import_file(
        &self,
        cx: &LoaderCx,
        name: &str,
        id: CanonicalId,
    ) -> Result<Value, LoadError> {
        let dotted = self.child_path(name);
        let (record, created) = cx.with_registry(|r| r.get_or_create(&id, &dotted));
        let ns = record.borrow().namespace();

        if !created {
            let state = record.borrow().state();
            debug!("importer: registry hit for {} ({:?})", id, state);
            if state == ModuleState::Evaluated {
                // Same file reached through another tree position; unify.
                self.install(name, Value::Object(ns.clone()));
            }
            // Pending means we are inside a mutual-import cycle: hand back
            // the partially-populated namespace instead of recursing.
            return Ok(Value::Object(ns));
        }

        let outcome = (|| -> Result<(), LoadError> {
            let source = cx.fetcher().fetch_sync(&id)?;
            record.borrow_mut().set_source(source.to_string());
            let unit = cx.compiler().compile(&source, &id, CompileMode::Legacy)?;
            {
                let mut record = record.borrow_mut();
                record.set_unit(unit.clone());
                record.mark_instantiated();
            }
            cx.evaluator().eval_legacy(&unit, &ns, cx)
        })();

        match outcome {
            Ok(()) => {
                cx.with_registry(|r| r.commit(&id, ns.clone()))?;
                self.install(name, Value::Object(ns.clone()));
                debug!("importer: successfully imported module '{}'", dotted);
                Ok(Value::Object(ns))
            }
            Err(error) => {
                cx.with_registry(|r| r.evict(&id));
                debug!("importer: import of '{}' failed: {}", dotted, error);
                Err(error)
            }
        }
    }

    /// Evaluate each search directory's `__init__` script with `this` bound
    /// to this node's namespace, so its top-level declarations become the
    /// node's own properties. Runs at most once per search-path assignment.
    fn ensure_seeded(&self, cx: &LoaderCx) -> Result<(), LoadError> {
        if self.inner.seeded.get() {
            return Ok(());
        }
        let extension = cx.script_extension();
        let roots = self.inner.search_path.borrow().clone();
        for root in &roots {
            let init_id =
                CanonicalId::path(&format!("{}/{}.{}", root, INIT_STEM, extension));
            if !cx.fetcher().exists(&init_id) {
                continue;
            }
            debug!("importer: evaluating {} for {}", init_id, self);
            let source = cx.fetcher().fetch_sync(&init_id)?;
            let unit = cx.compiler().compile(&source, &init_id, CompileMode::Legacy)?;
            cx.evaluator().eval_legacy(&unit, &self.inner.ns, cx)?;
        }
        self.inner.seeded.set(true);
        Ok(())
    }

    fn install(&self, name: &str, value: Value) {
        let installed = self
            .inner
            .ns
            .borrow_mut()
            .define(name, PropertySlot::permanent(value));
        if !installed {
            // Can only happen if resolution re-entered itself for the same
            // name; the first installation wins.
            warn!("importer: '{}' already installed on {}", name, self);
        }
    }

    /// The child names this node could resolve, without importing any of
    /// them: script files (minus extension) and subdirectories across the
    /// search path, already-resolved children, and `__init__` declarations.
    /// Meta-properties are excluded.
    pub fn enumerate(&self, cx: &LoaderCx) -> Vec<String> {
        let extension = cx.script_extension();
        let suffix = format!(".{}", extension);
        let init_name = format!("{}.{}", INIT_STEM, extension);
        let mut names: BTreeSet<String> = self.inner.ns.borrow().own_keys().into_iter().collect();

        for root in self.inner.search_path.borrow().iter() {
            let root_id = CanonicalId::path(root);
            for entry in cx.fetcher().list(&root_id) {
                if entry == init_name {
                    continue;
                }
                if entry.ends_with(&suffix) {
                    names.insert(entry[..entry.len() - suffix.len()].to_string());
                } else {
                    let dir_candidate = CanonicalId::path(&format!("{}/{}", root, entry));
                    if cx.fetcher().is_directory(&dir_candidate) {
                        names.insert(entry);
                    }
                }
            }
        }
        names.into_iter().collect()
    }
}

impl Display for ImporterNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.inner.name {
            Some(name) => write!(f, "[Importer {}]", name),
            None => write!(f, "[Importer root]"),
        }
    }
}
