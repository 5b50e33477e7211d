//! The evaluation seam between the loader and the embedded engine.

use crate::host::compiler::CompiledUnit;
use crate::loader::context::LoaderCx;
use crate::loader::ds::error::LoadError;
use crate::loader::ds::namespace::ObjectRef;
use crate::loader::tasks::Promise;

/// Outcome of evaluating a module body.
pub enum Completion {
    /// The body ran to the end.
    Finished,
    /// The body hit a top-level suspension point. The promise settles when
    /// the engine resumes and finishes (or throws); the loader keeps the
    /// record un-evaluated until then.
    Suspended(Promise<()>),
}

/// Executes compiled units. Evaluation may re-enter the loader (a legacy
/// script body importing another module, a module body calling dynamic
/// import), which is why the context is passed back in.
pub trait Evaluator {
    /// Run a legacy script with `this` bound to `module_this`. Top-level
    /// declarations become properties of `module_this`.
    fn eval_legacy(
        &self,
        unit: &CompiledUnit,
        module_this: &ObjectRef,
        cx: &LoaderCx,
    ) -> Result<(), LoadError>;

    /// Run a module body once, populating `namespace` with its exports.
    fn eval_module(
        &self,
        unit: &CompiledUnit,
        namespace: &ObjectRef,
        cx: &LoaderCx,
    ) -> Result<Completion, LoadError>;
}

/// Evaluator that treats every module body as empty. Useful for hosts that
/// only exercise resolution and caching, and for examples.
pub struct NullEvaluator;

impl Evaluator for NullEvaluator {
    fn eval_legacy(
        &self,
        _unit: &CompiledUnit,
        _module_this: &ObjectRef,
        _cx: &LoaderCx,
    ) -> Result<(), LoadError> {
        Ok(())
    }

    fn eval_module(
        &self,
        _unit: &CompiledUnit,
        _namespace: &ObjectRef,
        _cx: &LoaderCx,
    ) -> Result<Completion, LoadError> {
        Ok(Completion::Finished)
    }
}
