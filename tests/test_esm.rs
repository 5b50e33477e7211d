//! Standards-path loader behavior: dependency ordering, cycles, dynamic
//! import scheduling, top-level suspension, and failure eviction.

mod loader_util;

use std::cell::RefCell;
use std::rc::Rc;

use loader_util::{build_cx, TestHost};
use modus::host::evaluator::Completion;
use modus::host::fetcher::MemorySourceFetcher;
use modus::loader::ds::error::LoadError;
use modus::loader::ds::namespace::same_object;
use modus::loader::ds::record::ModuleState;
use modus::loader::ds::value::Value;
use modus::loader::resolve::CanonicalId;
use modus::loader::tasks::Promise;

fn fixture() -> MemorySourceFetcher {
    let mut sources = MemorySourceFetcher::new();
    sources.insert(
        "/app/entry.js",
        "import './a.js';\nimport './b.js';\nexport const entry = true;",
    );
    sources.insert("/app/a.js", "export const a = 1;");
    sources.insert("/app/b.js", "export const b = 2;");
    sources.insert("/app/cycleA.js", "import './cycleB.js';\nexport const fromA = 1;");
    sources.insert("/app/cycleB.js", "import './cycleA.js';\nexport const fromB = 2;");
    sources.insert("/app/pkg/broken.js", "export const never = boom();");
    sources.insert("/app/bad.js", "@syntax-error");
    sources.insert("/app/needs-bad.js", "import './bad.js';\nexport const x = 1;");
    sources
}

/// Record evaluation order into a shared log.
fn log_body(host: &TestHost, id: &str, tag: &'static str, log: &Rc<RefCell<Vec<&'static str>>>) {
    let log = log.clone();
    host.evaluator.on_module(id, move |ns, _cx| {
        log.borrow_mut().push(tag);
        ns.borrow_mut().set("tag", Value::String(tag.to_string()));
        Ok(Completion::Finished)
    });
}

// ============================================================================
// Static loading
// ============================================================================

#[test]
fn evaluates_static_dependencies_in_declaration_order() {
    let host = build_cx(fixture(), &["/app"]);
    let log = Rc::new(RefCell::new(Vec::new()));
    log_body(&host, "/app/entry.js", "entry", &log);
    log_body(&host, "/app/a.js", "a", &log);
    log_body(&host, "/app/b.js", "b", &log);

    host.cx.import_sync("/app/entry.js", None).unwrap();
    assert_eq!(*log.borrow(), vec!["a", "b", "entry"]);
}

#[test]
fn caches_by_identity_across_specifier_spellings() {
    let host = build_cx(fixture(), &["/app"]);
    let direct = host.cx.import_sync("/app/a.js", None).unwrap();
    let referrer = CanonicalId::path("/app/entry.js");
    let relative = host.cx.import_sync("./a.js", Some(&referrer)).unwrap();
    assert!(same_object(&direct, &relative));
}

#[test]
fn import_cycles_terminate() {
    let host = build_cx(fixture(), &["/app"]);
    let log = Rc::new(RefCell::new(Vec::new()));
    log_body(&host, "/app/cycleA.js", "A", &log);
    log_body(&host, "/app/cycleB.js", "B", &log);

    let a = host.cx.import_sync("/app/cycleA.js", None).unwrap();
    // B (the dependency) evaluates first, then A; each body ran once.
    assert_eq!(*log.borrow(), vec!["B", "A"]);

    let b = host.cx.import_sync("/app/cycleB.js", None).unwrap();
    assert!(!same_object(&a, &b));
    assert_eq!(
        host.cx.module_state(&CanonicalId::path("/app/cycleB.js")),
        Some(ModuleState::Evaluated)
    );
}

#[test]
fn a_module_can_reenter_the_loader_during_evaluation() {
    let host = build_cx(fixture(), &["/app"]);
    // cycleB's body imports cycleA synchronously mid-cycle and observes its
    // (still partial) namespace without deadlocking.
    let seen = Rc::new(RefCell::new(None));
    let seen_in_body = seen.clone();
    host.evaluator.on_module("/app/cycleB.js", move |_ns, cx| {
        let a = cx.import_sync("/app/cycleA.js", None)?;
        *seen_in_body.borrow_mut() = Some(a.borrow().has_own("fromA"));
        Ok(Completion::Finished)
    });

    host.cx.import_sync("/app/cycleA.js", None).unwrap();
    // B ran before A's body, so A's exports were not populated yet.
    assert_eq!(*seen.borrow(), Some(false));
}

// ============================================================================
// Failure semantics
// ============================================================================

#[test]
fn a_throwing_module_rejects_identically_on_retry() {
    let host = build_cx(fixture(), &["/app"]);
    host.evaluator.on_module("/app/pkg/broken.js", |_ns, _cx| {
        Err(LoadError::evaluation(None, "boom is not defined"))
    });

    let first = host.cx.import_sync("pkg/broken", None).unwrap_err();
    let second = host.cx.import_sync("pkg/broken", None).unwrap_err();
    assert_eq!(first, second);
    assert_eq!(
        host.cx.module_state(&CanonicalId::path("/app/pkg/broken.js")),
        None
    );
}

#[test]
fn two_dynamic_imports_of_a_broken_module_both_reject() {
    let host = build_cx(fixture(), &["/app"]);
    let calls = Rc::new(RefCell::new(0));
    let calls_in_body = calls.clone();
    host.evaluator.on_module("/app/pkg/broken.js", move |_ns, _cx| {
        *calls_in_body.borrow_mut() += 1;
        Err(LoadError::evaluation(None, "boom is not defined"))
    });

    let first = host.cx.import_dynamic("pkg/broken", None);
    host.cx.run_jobs();
    let second = host.cx.import_dynamic("pkg/broken", None);
    host.cx.run_jobs();

    let first = first.settled_result().unwrap().unwrap_err();
    let second = second.settled_result().unwrap().unwrap_err();
    assert_eq!(first, second);
    // The body was re-attempted, not memoized.
    assert_eq!(*calls.borrow(), 2);
}

#[test]
fn a_syntax_error_in_a_dependency_fails_the_importer_only() {
    let host = build_cx(fixture(), &["/app"]);

    match host.cx.import_sync("/app/needs-bad.js", None) {
        Err(LoadError::Syntax { id, .. }) => assert_eq!(id, "/app/bad.js"),
        other => panic!("expected Syntax, got {:?}", other),
    }
    // Both records evicted (same dependency path); unrelated modules load.
    assert_eq!(host.cx.module_state(&CanonicalId::path("/app/bad.js")), None);
    assert_eq!(
        host.cx.module_state(&CanonicalId::path("/app/needs-bad.js")),
        None
    );
    assert!(host.cx.import_sync("/app/a.js", None).is_ok());
}

// ============================================================================
// Dynamic import scheduling
// ============================================================================

#[test]
fn dynamic_import_does_not_run_in_the_callers_turn() {
    let host = build_cx(fixture(), &["/app"]);
    let ran = Rc::new(RefCell::new(false));
    let ran_in_body = ran.clone();
    host.evaluator.on_module("/app/a.js", move |_ns, _cx| {
        *ran_in_body.borrow_mut() = true;
        Ok(Completion::Finished)
    });

    let pending = host.cx.import_dynamic("/app/a.js", None);
    assert!(!pending.is_settled());
    assert!(!*ran.borrow());

    host.cx.run_jobs();
    assert!(*ran.borrow());
    assert!(pending.settled_result().unwrap().is_ok());
}

#[test]
fn dynamic_import_shares_the_static_cache() {
    let host = build_cx(fixture(), &["/app"]);
    let eager = host.cx.import_sync("/app/a.js", None).unwrap();

    let pending = host.cx.import_dynamic("/app/a.js", None);
    host.cx.run_jobs();
    let lazy = pending.settled_result().unwrap().unwrap();
    assert!(same_object(&eager, &lazy));
}

#[test]
fn dynamic_import_resolves_relative_to_the_importing_module() {
    let host = build_cx(fixture(), &["/app"]);
    let referrer = CanonicalId::path("/app/entry.js");
    let pending = host.cx.import_dynamic("./b.js", Some(&referrer));
    host.cx.run_jobs();
    let ns = pending.settled_result().unwrap().unwrap();
    assert!(same_object(&ns, &host.cx.import_sync("/app/b.js", None).unwrap()));
}

#[test]
fn dynamic_import_of_an_unresolvable_specifier_rejects() {
    let host = build_cx(fixture(), &["/app"]);
    let pending = host.cx.import_dynamic("no-such-module", None);
    host.cx.run_jobs();
    match pending.settled_result().unwrap() {
        Err(LoadError::ModuleNotFound { specifier, .. }) => {
            assert_eq!(specifier, "no-such-module");
        }
        other => panic!("expected ModuleNotFound, got {:?}", other),
    }
}

// ============================================================================
// Top-level suspension
// ============================================================================

#[test]
fn a_suspending_module_completes_through_the_task_queue() {
    let host = build_cx(fixture(), &["/app"]);
    host.evaluator.on_module("/app/a.js", |ns, cx| {
        // Suspend, then finish exports from a parked continuation, the
        // shape of a top-level await on host I/O.
        let gate: Promise<()> = Promise::pending();
        let resume_ns = ns.clone();
        let resume_gate = gate.clone();
        cx.enqueue_job(move || {
            resume_ns
                .borrow_mut()
                .set("late", Value::String("arrived".to_string()));
            resume_gate.resolve(());
        });
        Ok(Completion::Suspended(gate))
    });

    let ns = host.cx.import_sync("/app/a.js", None).unwrap();
    assert_eq!(
        ns.borrow().get("late"),
        Some(Value::String("arrived".to_string()))
    );
    assert_eq!(
        host.cx.module_state(&CanonicalId::path("/app/a.js")),
        Some(ModuleState::Evaluated)
    );
}

#[test]
fn a_suspending_dependency_defers_its_importer() {
    let host = build_cx(fixture(), &["/app"]);
    let gate: Promise<()> = Promise::pending();
    let body_gate = gate.clone();
    host.evaluator.on_module("/app/a.js", move |_ns, _cx| {
        Ok(Completion::Suspended(body_gate.clone()))
    });
    let entry_ran = Rc::new(RefCell::new(false));
    let entry_flag = entry_ran.clone();
    host.evaluator.on_module("/app/entry.js", move |_ns, _cx| {
        *entry_flag.borrow_mut() = true;
        Ok(Completion::Finished)
    });

    let pending = host.cx.import_dynamic("/app/entry.js", None);
    host.cx.run_jobs();
    // The dependency is suspended; the importer's body has not run and the
    // dynamic import is still pending.
    assert!(!*entry_ran.borrow());
    assert!(!pending.is_settled());

    gate.resolve(());
    assert!(*entry_ran.borrow());
    assert!(pending.settled_result().unwrap().is_ok());
}

#[test]
fn a_suspension_failure_evicts_and_rejects() {
    let host = build_cx(fixture(), &["/app"]);
    let gate: Promise<()> = Promise::pending();
    let body_gate = gate.clone();
    host.evaluator.on_module("/app/a.js", move |_ns, _cx| {
        Ok(Completion::Suspended(body_gate.clone()))
    });

    let pending = host.cx.import_dynamic("/app/a.js", None);
    host.cx.run_jobs();
    gate.reject(LoadError::evaluation(None, "async failure"));

    assert!(pending.settled_result().unwrap().is_err());
    assert_eq!(host.cx.module_state(&CanonicalId::path("/app/a.js")), None);
}

// ============================================================================
// URI-backed modules
// ============================================================================

#[test]
fn resource_uris_load_and_resolve_relatively() {
    let mut sources = MemorySourceFetcher::new();
    sources.insert(
        "resource:///org/example/main.js",
        "import './helper.js';\nexport const main = true;",
    );
    sources.insert("resource:///org/example/helper.js", "export const helper = true;");
    let host = build_cx(sources, &[]);

    let log = Rc::new(RefCell::new(Vec::new()));
    log_body(&host, "resource:///org/example/main.js", "main", &log);
    log_body(&host, "resource:///org/example/helper.js", "helper", &log);

    host.cx
        .import_sync("resource:///org/example/main.js", None)
        .unwrap();
    assert_eq!(*log.borrow(), vec!["helper", "main"]);
}
