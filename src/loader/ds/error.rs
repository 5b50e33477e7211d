use std::fmt;
use std::fmt::{Display, Formatter};

/// Errors raised by the module resolution and loading subsystem.
///
/// The enum is `Clone` and `PartialEq` so a rejected deferred load can hand
/// the same error to every waiter, and so a retried failing import can be
/// checked to fail identically.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadError {
    /// No module could be resolved for a specifier.
    ModuleNotFound {
        specifier: String,
        referrer: Option<String>,
    },
    /// The specifier resolved to an identifier, but no resource exists there.
    ResourceNotFound(String),
    /// The source text failed to parse or compile.
    Syntax {
        id: String,
        line: usize,
        column: usize,
        message: String,
    },
    /// No typelib is available for an introspected namespace.
    TypelibNotFound(String),
    /// An introspected namespace was requested with a version other than the
    /// one already loaded.
    VersionMismatch {
        namespace: String,
        loaded: String,
        requested: String,
    },
    /// A registry record was committed twice for the same identifier.
    /// Loads are serialized, so hitting this means a bug in the loader.
    DoubleEvaluation(String),
    /// A module body (or `__init__` script) threw during evaluation.
    Evaluation {
        id: Option<String>,
        message: String,
    },
}

impl LoadError {
    pub fn not_found(specifier: &str, referrer: Option<&str>) -> Self {
        LoadError::ModuleNotFound {
            specifier: specifier.to_string(),
            referrer: referrer.map(|r| r.to_string()),
        }
    }

    pub fn evaluation(id: Option<&str>, message: impl Into<String>) -> Self {
        LoadError::Evaluation {
            id: id.map(|i| i.to_string()),
            message: message.into(),
        }
    }
}

impl Display for LoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::ModuleNotFound {
                specifier,
                referrer: Some(referrer),
            } => write!(
                f,
                "No module '{}' found (imported from {})",
                specifier, referrer
            ),
            LoadError::ModuleNotFound {
                specifier,
                referrer: None,
            } => write!(f, "No module '{}' found in search path", specifier),
            LoadError::ResourceNotFound(id) => write!(f, "Resource not found: {}", id),
            LoadError::Syntax {
                id,
                line,
                column,
                message,
            } => write!(f, "Syntax error in {}:{}:{}: {}", id, line, column, message),
            LoadError::TypelibNotFound(name) => {
                write!(f, "No typelib found for namespace '{}'", name)
            }
            LoadError::VersionMismatch {
                namespace,
                loaded,
                requested,
            } => write!(
                f,
                "Requiring {}, version {}: version {} already loaded",
                namespace, requested, loaded
            ),
            LoadError::DoubleEvaluation(id) => {
                write!(f, "Module '{}' was evaluated twice", id)
            }
            LoadError::Evaluation {
                id: Some(id),
                message,
            } => write!(f, "Error evaluating {}: {}", id, message),
            LoadError::Evaluation { id: None, message } => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for LoadError {}
