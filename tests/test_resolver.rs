//! Resolution and registry behavior: canonical identifiers, the specifier
//! shapes, and the single-record-per-identifier cache.

mod loader_util;

use loader_util::build_cx;
use modus::host::fetcher::MemorySourceFetcher;
use modus::loader::ds::error::LoadError;
use modus::loader::ds::namespace::{same_object, NamespaceObject};
use modus::loader::ds::record::ModuleState;
use modus::loader::registry::ModuleRegistry;
use modus::loader::resolve::CanonicalId;

fn fixture() -> MemorySourceFetcher {
    let mut sources = MemorySourceFetcher::new();
    sources.insert("/space/one/pkg/foo.js", "// foo");
    sources.insert("/space/one/solo.js", "// solo");
    sources.insert("/space/two/solo.js", "// other solo");
    sources.insert("/space/two/only.js", "// only");
    sources
}

// ============================================================================
// Specifier resolution
// ============================================================================

#[test]
fn resolves_relative_sibling_against_referrer() {
    let host = build_cx(fixture(), &["/space/one"]);
    let referrer = CanonicalId::path("/project/modules/a.js");
    let id = host.cx.resolve("./sibling.js", Some(&referrer)).unwrap();
    assert_eq!(id.as_text(), "/project/modules/sibling.js");
}

#[test]
fn resolves_parent_relative_against_referrer() {
    let host = build_cx(fixture(), &["/space/one"]);

    let referrer = CanonicalId::path("/project/modules/a.js");
    let id = host.cx.resolve("../lib/util.js", Some(&referrer)).unwrap();
    assert_eq!(id.as_text(), "/project/lib/util.js");

    // One directory level deeper in the referrer shifts the result by one.
    let nested = CanonicalId::path("/project/modules/sub/a.js");
    let id = host.cx.resolve("../lib/util.js", Some(&nested)).unwrap();
    assert_eq!(id.as_text(), "/project/modules/lib/util.js");
}

#[test]
fn absolute_specifiers_are_normalized() {
    let host = build_cx(fixture(), &["/space/one"]);
    let id = host.cx.resolve("/space/./one/pkg/../pkg/foo.js", None).unwrap();
    assert_eq!(id.as_text(), "/space/one/pkg/foo.js");
}

#[test]
fn resolution_is_idempotent_on_canonical_ids() {
    let host = build_cx(fixture(), &["/space/one"]);
    for specifier in &["/space/one/solo.js", "gi://Gtk?version=3.0", "builtin:system"] {
        let once = host.cx.resolve(specifier, None).unwrap();
        let twice = host.cx.resolve(&once.as_text(), None).unwrap();
        assert_eq!(once, twice);
    }
}

#[test]
fn bare_specifier_searches_roots_in_order() {
    let host = build_cx(fixture(), &["/space/one", "/space/two"]);

    // Both roots carry solo.js; the first root wins.
    let id = host.cx.resolve("solo", None).unwrap();
    assert_eq!(id.as_text(), "/space/one/solo.js");

    // Only the second root carries only.js.
    let id = host.cx.resolve("only", None).unwrap();
    assert_eq!(id.as_text(), "/space/two/only.js");

    // A nested bare path reaches into a package directory.
    let id = host.cx.resolve("pkg/foo", None).unwrap();
    assert_eq!(id.as_text(), "/space/one/pkg/foo.js");
}

#[test]
fn bare_specifier_prefers_a_directory_over_a_file() {
    let mut sources = fixture();
    sources.insert("/space/one/pkg.js", "// shadowed by the pkg directory");
    let host = build_cx(sources, &["/space/one"]);
    let id = host.cx.resolve("pkg", None).unwrap();
    assert_eq!(id.as_text(), "/space/one/pkg");
}

#[test]
fn unresolvable_specifiers_carry_diagnostics() {
    let host = build_cx(fixture(), &["/space/one"]);

    match host.cx.resolve("nonexistent", None) {
        Err(LoadError::ModuleNotFound {
            specifier,
            referrer,
        }) => {
            assert_eq!(specifier, "nonexistent");
            assert_eq!(referrer, None);
        }
        other => panic!("expected ModuleNotFound, got {:?}", other),
    }

    let referrer = CanonicalId::Uri(
        modus::loader::resolve::Uri::with_authority("gi", "Gtk", ""),
    );
    match host.cx.resolve("./x.js", Some(&referrer)) {
        Err(LoadError::ModuleNotFound { referrer, .. }) => {
            assert_eq!(referrer.as_deref(), Some("gi://Gtk"));
        }
        other => panic!("expected ModuleNotFound, got {:?}", other),
    }
}

#[test]
fn unknown_schemes_fail_resolution() {
    let host = build_cx(fixture(), &["/space/one"]);
    match host.cx.resolve("npm:left-pad", None) {
        Err(LoadError::ModuleNotFound { specifier, .. }) => {
            assert_eq!(specifier, "npm:left-pad");
        }
        other => panic!("expected ModuleNotFound, got {:?}", other),
    }
}

#[test]
fn uri_specifiers_keep_scheme_and_query() {
    let host = build_cx(fixture(), &["/space/one"]);
    let id = host.cx.resolve("gi://Gtk?version=3.0", None).unwrap();
    match &id {
        CanonicalId::Uri(uri) => {
            assert_eq!(uri.scheme, "gi");
            assert_eq!(uri.host, "Gtk");
            assert_eq!(uri.query_get("version"), Some("3.0"));
        }
        other => panic!("expected a URI id, got {:?}", other),
    }
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn get_or_create_returns_the_same_record() {
    let mut registry = ModuleRegistry::new();
    let id = CanonicalId::path("/space/one/solo.js");

    let (first, created) = registry.get_or_create(&id, "solo");
    assert!(created);
    assert_eq!(first.borrow().state(), ModuleState::Pending);

    let (second, created) = registry.get_or_create(&id, "solo");
    assert!(!created);
    assert!(same_object(
        &first.borrow().namespace(),
        &second.borrow().namespace()
    ));
}

#[test]
fn commit_twice_is_a_double_evaluation_error() {
    let mut registry = ModuleRegistry::new();
    let id = CanonicalId::path("/space/one/solo.js");
    let (record, _) = registry.get_or_create(&id, "solo");
    let ns = record.borrow().namespace();

    registry.commit(&id, ns.clone()).unwrap();
    match registry.commit(&id, ns) {
        Err(LoadError::DoubleEvaluation(text)) => {
            assert_eq!(text, "/space/one/solo.js");
        }
        other => panic!("expected DoubleEvaluation, got {:?}", other),
    }
}

#[test]
fn evicted_records_are_recreated_fresh() {
    let mut registry = ModuleRegistry::new();
    let id = CanonicalId::path("/space/one/solo.js");

    let (first, _) = registry.get_or_create(&id, "solo");
    let first_ns = first.borrow().namespace();
    assert!(registry.evict(&id));
    assert_eq!(first.borrow().state(), ModuleState::Errored);
    assert!(registry.lookup(&id).is_none());

    let (second, created) = registry.get_or_create(&id, "solo");
    assert!(created);
    assert!(!same_object(&first_ns, &second.borrow().namespace()));
}

#[test]
fn commit_attaches_an_external_namespace() {
    let mut registry = ModuleRegistry::new();
    let id = CanonicalId::path("/space/one/solo.js");
    registry.get_or_create(&id, "solo");

    let external = NamespaceObject::new("native");
    registry.commit(&id, external.clone()).unwrap();
    let record = registry.lookup(&id).unwrap();
    assert_eq!(record.borrow().state(), ModuleState::Evaluated);
    assert!(same_object(&record.borrow().namespace(), &external));
}
