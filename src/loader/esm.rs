//! The standards-path module loader: fetch, dependency scan, instantiate,
//! evaluate, with dynamic import and top-level suspension.
//!
//! State machine per record: `Pending -> Instantiated -> Evaluated`, with
//! any failure evicting the record so a later request retries from
//! scratch. A record found in the registry in any state short-circuits
//! re-instantiation, which is how import cycles terminate.

use log::{debug, trace};

use crate::host::compiler::CompileMode;
use crate::host::evaluator::Completion;
use crate::loader::context::LoaderCx;
use crate::loader::ds::error::LoadError;
use crate::loader::ds::namespace::ObjectRef;
use crate::loader::ds::record::{ModuleState, RecordRef};
use crate::loader::resolve::CanonicalId;
use crate::loader::tasks::{await_settled, Promise};
use crate::scan::scan_module;

/// Whether evaluation of a subgraph finished in this turn or parked on a
/// top-level suspension.
enum EvalOutcome {
    Done,
    Deferred(Promise<()>),
}

/// Synchronous load, used for static top-level resolution during initial
/// program load. If the module (or a dependency) suspends at top level,
/// the task queue is drained until the evaluation completes.
pub fn import_sync(
    cx: &LoaderCx,
    specifier: &str,
    referrer: Option<&CanonicalId>,
) -> Result<ObjectRef, LoadError> {
    let id = cx.resolve(specifier, referrer)?;
    load_sync(cx, &id)
}

pub(crate) fn load_sync(cx: &LoaderCx, id: &CanonicalId) -> Result<ObjectRef, LoadError> {
    ensure_instantiated(cx, id, None)?;
    match evaluate_graph(cx, id)? {
        EvalOutcome::Done => {}
        EvalOutcome::Deferred(completion) => {
            await_settled(&completion, cx.queue())?;
        }
    }
    evaluated_namespace(cx, id)
}

/// Deferred load. The returned promise resolves with the module's
/// namespace once it is fully evaluated, or rejects with the load error;
/// nothing runs in the caller's current turn.
pub fn import_dynamic(
    cx: &LoaderCx,
    specifier: &str,
    referrer: Option<&CanonicalId>,
) -> Promise<ObjectRef> {
    let promise = Promise::pending();
    let job_cx = cx.clone();
    let job_specifier = specifier.to_string();
    let job_referrer = referrer.cloned();
    let job_promise = promise.clone();
    debug!("dynamic import of '{}' scheduled", specifier);
    cx.queue().enqueue(move || {
        run_dynamic(&job_cx, &job_specifier, job_referrer.as_ref(), &job_promise);
    });
    promise
}

fn run_dynamic(
    cx: &LoaderCx,
    specifier: &str,
    referrer: Option<&CanonicalId>,
    promise: &Promise<ObjectRef>,
) {
    let id = match cx.resolve(specifier, referrer) {
        Ok(id) => id,
        Err(error) => {
            promise.reject(error);
            return;
        }
    };

    if let Some(record) = cx.with_registry(|r| r.lookup(&id)) {
        if record.borrow().state() == ModuleState::Evaluated {
            promise.resolve(record.borrow().namespace());
            return;
        }
    }

    // Scheme-handled identifiers materialize synchronously; everything else
    // gets its source through the asynchronous fetch path.
    let handled_by_scheme = match &id {
        CanonicalId::Uri(uri) => cx.scheme_handler(&uri.scheme).is_some(),
        CanonicalId::Path(_) => false,
    };
    if handled_by_scheme {
        finish_dynamic(cx, &id, None, promise);
        return;
    }

    let fetch = cx.fetcher().fetch_async(&id);
    let done_cx = cx.clone();
    let done_id = id.clone();
    let done_promise = promise.clone();
    fetch.when_settled(move |result| match result {
        Ok(source) => finish_dynamic(&done_cx, &done_id, Some(source.to_string()), &done_promise),
        Err(error) => done_promise.reject(error.clone()),
    });
}

fn finish_dynamic(
    cx: &LoaderCx,
    id: &CanonicalId,
    prefetched: Option<String>,
    promise: &Promise<ObjectRef>,
) {
    if let Err(error) = ensure_instantiated(cx, id, prefetched) {
        promise.reject(error);
        return;
    }
    match evaluate_graph(cx, id) {
        Ok(EvalOutcome::Done) => match evaluated_namespace(cx, id) {
            Ok(ns) => promise.resolve(ns),
            Err(error) => promise.reject(error),
        },
        Ok(EvalOutcome::Deferred(completion)) => {
            let done_cx = cx.clone();
            let done_id = id.clone();
            let done_promise = promise.clone();
            completion.when_settled(move |result| match result {
                Ok(()) => match evaluated_namespace(&done_cx, &done_id) {
                    Ok(ns) => done_promise.resolve(ns),
                    Err(error) => done_promise.reject(error),
                },
                Err(error) => done_promise.reject(error.clone()),
            });
        }
        Err(error) => promise.reject(error),
    }
}

fn evaluated_namespace(cx: &LoaderCx, id: &CanonicalId) -> Result<ObjectRef, LoadError> {
    let record = cx
        .with_registry(|r| r.lookup(id))
        .ok_or_else(|| LoadError::evaluation(Some(&id.as_text()), "module record was evicted"))?;
    let namespace = record.borrow().namespace();
    Ok(namespace)
}

/// Fetch, scan, compile, and recursively instantiate `id` and its static
/// dependencies in declaration order. A record already present in the
/// registry, in any state, is returned as-is, deferring cycle binding to
/// evaluation time. Any failure evicts the record.
fn ensure_instantiated(
    cx: &LoaderCx,
    id: &CanonicalId,
    prefetched: Option<String>,
) -> Result<RecordRef, LoadError> {
    if let Some(existing) = cx.with_registry(|r| r.lookup(id)) {
        trace!("instantiate: registry hit for {}", id);
        return Ok(existing);
    }

    // Scheme-handled identifiers materialize through the interop bridge,
    // which keeps its own registry entries (e.g. `gi://Gtk` regardless of
    // version query). That must happen before this id gets a pending
    // record, or the bridge would find the empty record and skip loading.
    if let CanonicalId::Uri(uri) = id {
        if let Some(handler) = cx.scheme_handler(&uri.scheme) {
            let ns = handler.load(cx, uri)?;
            let record = cx.with_registry(|r| -> Result<RecordRef, LoadError> {
                if let Some(record) = r.lookup(id) {
                    if record.borrow().state() == ModuleState::Evaluated {
                        return Ok(record);
                    }
                }
                let (record, _) = r.get_or_create(id, &id.as_text());
                r.commit(id, ns)?;
                Ok(record)
            })?;
            debug!("instantiate: {} materialized by scheme handler", id);
            return Ok(record);
        }
    }

    let (record, _) = cx.with_registry(|r| r.get_or_create(id, &id.as_text()));

    let outcome = (|| -> Result<(), LoadError> {
        let source = match prefetched {
            Some(source) => source,
            None => cx.fetcher().fetch_sync(id)?,
        };
        let header = scan_module(&source, id)?;
        record.borrow_mut().set_source(source.to_string());
        let unit = cx.compiler().compile(&source, id, CompileMode::Module)?;

        let mut dependencies = Vec::new();
        for specifier in header.specifiers() {
            dependencies.push(cx.resolve(specifier, Some(id))?);
        }
        {
            let mut record = record.borrow_mut();
            record.set_unit(unit);
            record.set_dependencies(dependencies.clone());
        }

        for dependency in &dependencies {
            ensure_instantiated(cx, dependency, None)?;
        }
        record.borrow_mut().mark_instantiated();
        debug!("instantiate: {} ({} dependencies)", id, dependencies.len());
        Ok(())
    })();

    match outcome {
        Ok(()) => Ok(record),
        Err(error) => {
            cx.with_registry(|r| r.evict(id));
            Err(error)
        }
    }
}

/// Evaluate `id`'s dependencies (post-order, declaration order) and then
/// its own body. Cycles terminate on the `evaluating` flag; a module whose
/// body suspends parks a shared completion on its record.
fn evaluate_graph(cx: &LoaderCx, id: &CanonicalId) -> Result<EvalOutcome, LoadError> {
    let record = cx.with_registry(|r| r.lookup(id)).ok_or_else(|| {
        LoadError::evaluation(Some(&id.as_text()), "module record was evicted before evaluation")
    })?;

    let (state, evaluating, completion, dependencies) = {
        let record = record.borrow();
        (
            record.state(),
            record.is_evaluating(),
            record.completion(),
            record.dependencies(),
        )
    };

    if state == ModuleState::Evaluated {
        return Ok(EvalOutcome::Done);
    }
    if let Some(completion) = completion {
        // Already suspended at top level; share the completion.
        return Ok(EvalOutcome::Deferred(completion));
    }
    if evaluating || state == ModuleState::Pending {
        // Cycle back-edge; binding resolution happens at evaluation time of
        // the module that started the cycle.
        return Ok(EvalOutcome::Done);
    }

    record.borrow_mut().set_evaluating(true);

    for dependency in &dependencies {
        match evaluate_graph(cx, dependency) {
            Ok(EvalOutcome::Done) => {}
            Ok(EvalOutcome::Deferred(pending)) => {
                // Resume this module once the asynchronous dependency
                // finishes.
                record.borrow_mut().set_evaluating(false);
                let completion = Promise::pending();
                let resume_cx = cx.clone();
                let resume_id = id.clone();
                let resume_completion = completion.clone();
                pending.when_settled(move |result| match result {
                    Ok(()) => resume_evaluation(&resume_cx, &resume_id, &resume_completion),
                    Err(error) => {
                        resume_cx.with_registry(|r| r.evict(&resume_id));
                        resume_completion.reject(error.clone());
                    }
                });
                return Ok(EvalOutcome::Deferred(completion));
            }
            Err(error) => {
                record.borrow_mut().set_evaluating(false);
                cx.with_registry(|r| r.evict(id));
                return Err(error);
            }
        }
    }

    let unit = match record.borrow().unit() {
        Some(unit) => unit,
        None => {
            record.borrow_mut().set_evaluating(false);
            return Err(LoadError::evaluation(
                Some(&id.as_text()),
                "no compiled unit attached to module record",
            ));
        }
    };
    let ns = record.borrow().namespace();

    match cx.evaluator().eval_module(&unit, &ns, cx) {
        Ok(Completion::Finished) => {
            record.borrow_mut().set_evaluating(false);
            cx.with_registry(|r| r.commit(id, ns))?;
            debug!("evaluated {}", id);
            Ok(EvalOutcome::Done)
        }
        Ok(Completion::Suspended(pending)) => {
            debug!("evaluation of {} suspended at top level", id);
            let completion = Promise::pending();
            record.borrow_mut().set_completion(Some(completion.clone()));
            let settle_cx = cx.clone();
            let settle_id = id.clone();
            let settle_ns = ns;
            let settle_completion = completion.clone();
            pending.when_settled(move |result| {
                if let Some(record) = settle_cx.with_registry(|r| r.lookup(&settle_id)) {
                    let mut record = record.borrow_mut();
                    record.set_evaluating(false);
                    record.set_completion(None);
                }
                match result {
                    Ok(()) => {
                        match settle_cx.with_registry(|r| r.commit(&settle_id, settle_ns.clone()))
                        {
                            Ok(()) => {
                                debug!("deferred evaluation of {} completed", settle_id);
                                settle_completion.resolve(());
                            }
                            Err(error) => settle_completion.reject(error),
                        }
                    }
                    Err(error) => {
                        settle_cx.with_registry(|r| r.evict(&settle_id));
                        settle_completion.reject(error.clone());
                    }
                }
            });
            Ok(EvalOutcome::Deferred(completion))
        }
        Err(error) => {
            record.borrow_mut().set_evaluating(false);
            cx.with_registry(|r| r.evict(id));
            debug!("evaluation of {} failed: {}", id, error);
            Err(error)
        }
    }
}

fn resume_evaluation(cx: &LoaderCx, id: &CanonicalId, completion: &Promise<()>) {
    match evaluate_graph(cx, id) {
        Ok(EvalOutcome::Done) => completion.resolve(()),
        Ok(EvalOutcome::Deferred(next)) => {
            let chained = completion.clone();
            next.when_settled(move |result| match result {
                Ok(()) => chained.resolve(()),
                Err(error) => chained.reject(error.clone()),
            });
        }
        Err(error) => completion.reject(error),
    }
}
