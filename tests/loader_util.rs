//! Shared helpers for the loader integration tests: an in-memory module
//! tree, a scripted evaluator whose module bodies are Rust closures keyed
//! by canonical identifier, a fake typelib repository, and a compiler that
//! fails on marked sources.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use modus::host::compiler::{CompileMode, CompiledUnit, Compiler};
use modus::host::evaluator::{Completion, Evaluator};
use modus::host::fetcher::MemorySourceFetcher;
use modus::host::introspection::IntrospectionLoader;
use modus::loader::config::LoaderConfig;
use modus::loader::context::LoaderCx;
use modus::loader::ds::error::LoadError;
use modus::loader::ds::namespace::ObjectRef;

pub type ScriptFn = Rc<dyn Fn(&ObjectRef, &LoaderCx) -> Result<(), LoadError>>;
pub type ModuleFn = Rc<dyn Fn(&ObjectRef, &LoaderCx) -> Result<Completion, LoadError>>;

/// Evaluator whose behaviors are registered per canonical identifier.
/// Units with no registered behavior evaluate as empty modules.
pub struct ScriptedEvaluator {
    legacy: RefCell<HashMap<String, ScriptFn>>,
    modules: RefCell<HashMap<String, ModuleFn>>,
}

impl ScriptedEvaluator {
    pub fn new() -> Self {
        ScriptedEvaluator {
            legacy: RefCell::new(HashMap::new()),
            modules: RefCell::new(HashMap::new()),
        }
    }

    pub fn on_legacy(
        &self,
        id: &str,
        body: impl Fn(&ObjectRef, &LoaderCx) -> Result<(), LoadError> + 'static,
    ) {
        self.legacy
            .borrow_mut()
            .insert(id.to_string(), Rc::new(body));
    }

    pub fn on_module(
        &self,
        id: &str,
        body: impl Fn(&ObjectRef, &LoaderCx) -> Result<Completion, LoadError> + 'static,
    ) {
        self.modules
            .borrow_mut()
            .insert(id.to_string(), Rc::new(body));
    }
}

impl Evaluator for ScriptedEvaluator {
    fn eval_legacy(
        &self,
        unit: &CompiledUnit,
        module_this: &ObjectRef,
        cx: &LoaderCx,
    ) -> Result<(), LoadError> {
        // Clone the behavior out before running it: bodies re-enter the
        // evaluator through nested imports.
        let body = self.legacy.borrow().get(&unit.id.as_text()).cloned();
        match body {
            Some(body) => body(module_this, cx),
            None => Ok(()),
        }
    }

    fn eval_module(
        &self,
        unit: &CompiledUnit,
        namespace: &ObjectRef,
        cx: &LoaderCx,
    ) -> Result<Completion, LoadError> {
        let body = self.modules.borrow().get(&unit.id.as_text()).cloned();
        match body {
            Some(body) => body(namespace, cx),
            None => Ok(Completion::Finished),
        }
    }
}

/// In-memory typelib repository: namespace name -> (namespace, version).
pub struct FakeTypelibs {
    namespaces: RefCell<HashMap<String, (ObjectRef, String)>>,
}

impl FakeTypelibs {
    pub fn new() -> Self {
        FakeTypelibs {
            namespaces: RefCell::new(HashMap::new()),
        }
    }

    pub fn add(&self, name: &str, version: &str, namespace: ObjectRef) {
        self.namespaces
            .borrow_mut()
            .insert(name.to_string(), (namespace, version.to_string()));
    }
}

impl IntrospectionLoader for FakeTypelibs {
    fn load_namespace(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<(ObjectRef, String), LoadError> {
        let namespaces = self.namespaces.borrow();
        let (namespace, available) = namespaces
            .get(name)
            .ok_or_else(|| LoadError::TypelibNotFound(name.to_string()))?;
        if let Some(version) = version {
            if version != available {
                return Err(LoadError::TypelibNotFound(format!("{}-{}", name, version)));
            }
        }
        Ok((namespace.clone(), available.to_string()))
    }
}

/// Compiler that reports a syntax error for any source containing the
/// `@syntax-error` marker, and passes everything else through.
pub struct MarkerCompiler;

impl Compiler for MarkerCompiler {
    fn compile(
        &self,
        source: &str,
        id: &modus::loader::resolve::CanonicalId,
        mode: CompileMode,
    ) -> Result<CompiledUnit, LoadError> {
        if source.contains("@syntax-error") {
            return Err(LoadError::Syntax {
                id: id.as_text(),
                line: 1,
                column: 1,
                message: "unexpected token".to_string(),
            });
        }
        Ok(CompiledUnit {
            id: id.clone(),
            mode,
            source: source.to_string(),
        })
    }
}

pub struct TestHost {
    pub cx: LoaderCx,
    pub evaluator: Rc<ScriptedEvaluator>,
    pub typelibs: Rc<FakeTypelibs>,
}

/// Build an isolated loader over `fetcher` with the given search roots.
pub fn build_cx(fetcher: MemorySourceFetcher, roots: &[&str]) -> TestHost {
    let evaluator = Rc::new(ScriptedEvaluator::new());
    let typelibs = Rc::new(FakeTypelibs::new());
    let cx = LoaderCx::new(
        LoaderConfig::with_search_path(roots.iter().map(|r| r.to_string()).collect()),
        Rc::new(fetcher),
        Rc::new(MarkerCompiler),
        evaluator.clone(),
        typelibs.clone(),
    );
    TestHost {
        cx,
        evaluator,
        typelibs,
    }
}

/// Call a function-valued property on a namespace with no arguments.
pub fn call_member(ns: &ObjectRef, name: &str) -> Result<modus::loader::ds::value::Value, LoadError> {
    let member = ns
        .borrow()
        .get(name)
        .ok_or_else(|| LoadError::evaluation(None, format!("no member '{}'", name)))?;
    member.call(Vec::new())
}
