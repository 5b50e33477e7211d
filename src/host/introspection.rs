//! The typelib seam: loading an introspected native namespace as an opaque
//! namespace object.

use crate::loader::ds::error::LoadError;
use crate::loader::ds::namespace::ObjectRef;

pub trait IntrospectionLoader {
    /// Load the namespace `name`, optionally pinned to `version`, returning
    /// the namespace object and the concrete version that was selected.
    ///
    /// Implementations report `TypelibNotFound` when no typelib matches and
    /// may report `VersionMismatch` themselves; the interop bridge also
    /// enforces one-version-per-namespace across repeated requests.
    fn load_namespace(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<(ObjectRef, String), LoadError>;
}

/// Introspection loader for hosts without a typelib repository: every
/// request reports `TypelibNotFound`.
pub struct NoTypelibs;

impl IntrospectionLoader for NoTypelibs {
    fn load_namespace(
        &self,
        name: &str,
        _version: Option<&str>,
    ) -> Result<(ObjectRef, String), LoadError> {
        Err(LoadError::TypelibNotFound(name.to_string()))
    }
}
