//! The interop bridge: one materialization point for namespaces reachable
//! from both loader paths.
//!
//! `imports.gi.Foo` and `import Foo from 'gi://Foo'` must hand back the
//! same object, so neither path materializes an introspected namespace
//! itself; both call through [`shared_namespace`], a thin wrapper over the
//! module registry keyed by a scheme-qualified identifier. Builtins work
//! the same way under the `builtin:` scheme.

use log::debug;

use crate::loader::context::LoaderCx;
use crate::loader::ds::error::LoadError;
use crate::loader::ds::namespace::ObjectRef;
use crate::loader::resolve::{CanonicalId, Uri};

/// Root importer child that exposes introspected namespaces.
pub const GI_NODE_NAME: &str = "gi";

/// Loads a namespace for one URI scheme on the standards path. Handlers
/// registered on a context are consulted before the fetch/compile pipeline.
pub trait SchemeHandler {
    fn load(&self, cx: &LoaderCx, uri: &Uri) -> Result<ObjectRef, LoadError>;
    fn name(&self) -> &str;
}

/// Registry key for an introspected namespace: `gi://<name>`, without any
/// version query, so every version spelling of the same namespace unifies.
fn gi_key(namespace: &str) -> CanonicalId {
    CanonicalId::Uri(Uri::with_authority(GI_NODE_NAME, namespace, ""))
}

fn builtin_key(name: &str) -> CanonicalId {
    CanonicalId::Uri(Uri::opaque("builtin", name))
}

/// Fetch the shared namespace object for an introspected namespace,
/// loading the typelib on first request.
///
/// Version policy: the first load fixes the namespace's version (an
/// explicit request or pin wins over the introspection default). Any later
/// request naming a different version fails with `VersionMismatch`;
/// versionless requests always succeed against the loaded version.
pub fn shared_namespace(
    cx: &LoaderCx,
    namespace: &str,
    requested: Option<&str>,
) -> Result<ObjectRef, LoadError> {
    let key = gi_key(namespace);

    if let Some(record) = cx.with_registry(|r| r.lookup(&key)) {
        if let Some(requested) = requested {
            let loaded = cx.loaded_gi_version(namespace).unwrap_or_default();
            if loaded != requested {
                return Err(LoadError::VersionMismatch {
                    namespace: namespace.to_string(),
                    loaded,
                    requested: requested.to_string(),
                });
            }
        }
        return Ok(record.borrow().namespace());
    }

    let pinned = cx.pinned_gi_version(namespace);
    if let (Some(requested), Some(pinned)) = (requested, &pinned) {
        if requested != pinned {
            return Err(LoadError::VersionMismatch {
                namespace: namespace.to_string(),
                loaded: pinned.to_string(),
                requested: requested.to_string(),
            });
        }
    }
    let effective = requested.map(str::to_string).or(pinned);

    let (ns, version) = cx
        .introspection()
        .load_namespace(namespace, effective.as_deref())?;
    cx.with_registry(|r| {
        r.get_or_create(&key, &format!("gi.{}", namespace));
        r.commit(&key, ns.clone())
    })?;
    cx.record_gi_version(namespace, &version);
    debug!("loaded introspected namespace {} {}", namespace, version);
    Ok(ns)
}

/// Pin an introspected namespace to a version before it is loaded. Pinning
/// an already-loaded namespace to a different version is an error.
pub fn pin_version(cx: &LoaderCx, namespace: &str, version: &str) -> Result<(), LoadError> {
    if let Some(loaded) = cx.loaded_gi_version(namespace) {
        if loaded != version {
            return Err(LoadError::VersionMismatch {
                namespace: namespace.to_string(),
                loaded,
                requested: version.to_string(),
            });
        }
        return Ok(());
    }
    cx.record_gi_pin(namespace, version);
    Ok(())
}

/// Fetch a registered builtin's namespace, committing it into the registry
/// under `builtin:<name>` on first access so both loader paths and
/// `require()` agree on identity.
pub fn builtin_namespace(cx: &LoaderCx, name: &str) -> Result<ObjectRef, LoadError> {
    let key = builtin_key(name);
    if let Some(record) = cx.with_registry(|r| r.lookup(&key)) {
        return Ok(record.borrow().namespace());
    }
    let ns = cx
        .builtin(name)
        .ok_or_else(|| LoadError::not_found(name, None))?;
    cx.with_registry(|r| {
        r.get_or_create(&key, &key.as_text());
        r.commit(&key, ns.clone())
    })?;
    debug!("registered builtin module '{}'", name);
    Ok(ns)
}

/// Like [`builtin_namespace`], but a miss is not an error. Used by the
/// root importer, which falls through to filesystem probing.
pub fn try_builtin(cx: &LoaderCx, name: &str) -> Result<Option<ObjectRef>, LoadError> {
    if cx.builtin(name).is_none() {
        return Ok(None);
    }
    builtin_namespace(cx, name).map(Some)
}

/// Standards-path handler for `gi://Namespace?version=X`.
pub struct GiScheme;

impl SchemeHandler for GiScheme {
    fn load(&self, cx: &LoaderCx, uri: &Uri) -> Result<ObjectRef, LoadError> {
        shared_namespace(cx, &uri.host, uri.query_get("version"))
    }

    fn name(&self) -> &str {
        "gi"
    }
}

/// Standards-path handler for `builtin:<name>`.
pub struct BuiltinScheme;

impl SchemeHandler for BuiltinScheme {
    fn load(&self, cx: &LoaderCx, uri: &Uri) -> Result<ObjectRef, LoadError> {
        let name = if uri.host.is_empty() {
            &uri.path
        } else {
            &uri.host
        };
        builtin_namespace(cx, name)
    }

    fn name(&self) -> &str {
        "builtin"
    }
}
