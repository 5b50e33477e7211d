//! Specifier resolution: canonical identifiers, URI parsing, and lexical
//! path normalization.
//!
//! Resolution is pure over its inputs and the configured search path. The
//! only filesystem contact is existence probing for bare specifiers, which
//! goes through the [`SourceFetcher`] so hosts and tests control it.

use std::collections::HashSet;
use std::fmt;
use std::fmt::{Display, Formatter};

use log::trace;

use crate::host::fetcher::SourceFetcher;
use crate::loader::config::LoaderConfig;
use crate::loader::ds::error::LoadError;

lazy_static! {
    /// URI schemes the resolver recognizes. Anything else is treated as a
    /// bare specifier and searched on the filesystem, so an unknown scheme
    /// surfaces as `ModuleNotFound` carrying the original specifier.
    static ref RECOGNIZED_SCHEMES: HashSet<&'static str> =
        ["file", "resource", "gi", "builtin"].iter().cloned().collect();
}

/// A parsed scheme-qualified identifier, e.g. `gi://Gtk?version=3.0` or
/// `resource:///org/example/main.js`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Uri {
    pub scheme: String,
    pub host: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    has_authority: bool,
}

impl Uri {
    /// A `scheme://host/path` form URI.
    pub fn with_authority(scheme: &str, host: &str, path: &str) -> Self {
        Uri {
            scheme: scheme.to_string(),
            host: host.to_string(),
            path: path.to_string(),
            query: Vec::new(),
            has_authority: true,
        }
    }

    /// A `scheme:path` form URI without an authority component, e.g.
    /// `builtin:system`.
    pub fn opaque(scheme: &str, path: &str) -> Self {
        Uri {
            scheme: scheme.to_string(),
            host: String::new(),
            path: path.to_string(),
            query: Vec::new(),
            has_authority: false,
        }
    }

    /// Parse a specifier as a recognized-scheme URI. Returns `None` when the
    /// text has no scheme, a malformed scheme, or a scheme the loader does
    /// not know.
    pub fn parse(text: &str) -> Option<Uri> {
        let colon = text.find(':')?;
        let scheme = &text[..colon];
        let mut chars = scheme.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() => {}
            _ => return None,
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.') {
            return None;
        }
        if !RECOGNIZED_SCHEMES.contains(scheme) {
            return None;
        }

        let rest = &text[colon + 1..];
        let (has_authority, host, after_host) = if rest.starts_with("//") {
            let stripped = &rest[2..];
            let host_end = stripped
                .find(|c| c == '/' || c == '?')
                .unwrap_or_else(|| stripped.len());
            (true, &stripped[..host_end], &stripped[host_end..])
        } else {
            (false, "", rest)
        };

        let (path, query_text) = match after_host.find('?') {
            Some(idx) => (&after_host[..idx], &after_host[idx + 1..]),
            None => (after_host, ""),
        };

        let mut query = Vec::new();
        if !query_text.is_empty() {
            for pair in query_text.split('&') {
                match pair.find('=') {
                    Some(idx) => {
                        query.push((pair[..idx].to_string(), pair[idx + 1..].to_string()))
                    }
                    None => query.push((pair.to_string(), String::new())),
                }
            }
        }

        Some(Uri {
            scheme: scheme.to_string(),
            host: host.to_string(),
            path: path.to_string(),
            query,
            has_authority,
        })
    }

    pub fn query_get(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn to_uri_string(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.scheme);
        out.push(':');
        if self.has_authority {
            out.push_str("//");
            out.push_str(&self.host);
        }
        out.push_str(&self.path);
        if !self.query.is_empty() {
            out.push('?');
            let pairs: Vec<String> = self
                .query
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            out.push_str(&pairs.join("&"));
        }
        out
    }
}

impl Display for Uri {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uri_string())
    }
}

/// A normalized absolute identifier for a loadable resource: either a plain
/// filesystem path or a scheme-qualified URI. URIs are never
/// filesystem-normalized; the scheme owns their shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CanonicalId {
    Path(String),
    Uri(Uri),
}

impl CanonicalId {
    pub fn path(p: &str) -> Self {
        CanonicalId::Path(normalize_path(p))
    }

    pub fn uri(u: Uri) -> Self {
        CanonicalId::Uri(u)
    }

    pub fn as_text(&self) -> String {
        match self {
            CanonicalId::Path(p) => p.to_string(),
            CanonicalId::Uri(u) => u.to_uri_string(),
        }
    }

    pub fn scheme(&self) -> Option<&str> {
        match self {
            CanonicalId::Path(_) => None,
            CanonicalId::Uri(u) => Some(&u.scheme),
        }
    }

    /// The identifier of the containing directory, when the identifier has
    /// path semantics. `gi://` and other opaque URIs have none.
    pub fn directory(&self) -> Option<CanonicalId> {
        match self {
            CanonicalId::Path(p) => parent_dir(p).map(CanonicalId::path),
            CanonicalId::Uri(u) if !u.path.is_empty() => {
                let parent = parent_dir(&u.path)?;
                let mut dir = u.clone();
                dir.path = normalize_path(parent);
                dir.query = Vec::new();
                Some(CanonicalId::Uri(dir))
            }
            CanonicalId::Uri(_) => None,
        }
    }

    /// Join a relative specifier onto a directory identifier.
    pub fn join(&self, relative: &str) -> Option<CanonicalId> {
        match self {
            CanonicalId::Path(dir) => {
                Some(CanonicalId::path(&format!("{}/{}", dir, relative)))
            }
            CanonicalId::Uri(u) => {
                let mut joined = u.clone();
                joined.path = normalize_path(&format!("{}/{}", u.path, relative));
                joined.query = Vec::new();
                Some(CanonicalId::Uri(joined))
            }
        }
    }
}

impl Display for CanonicalId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_text())
    }
}

/// POSIX lexical normalization: drop `.` segments and empty segments,
/// collapse `x/..` when `x` is a real segment. No filesystem access.
///
/// Idempotent: `normalize_path(normalize_path(p)) == normalize_path(p)`.
pub fn normalize_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(last) if *last != ".." => {
                    parts.pop();
                }
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }
    if absolute {
        format!("/{}", parts.join("/"))
    } else if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

fn parent_dir(path: &str) -> Option<&str> {
    let idx = path.rfind('/')?;
    if idx == 0 {
        Some("/")
    } else {
        Some(&path[..idx])
    }
}

/// Resolve a raw specifier against an optional referrer and the configured
/// search path.
///
/// The three specifier shapes, in probe order:
/// 1. recognized-scheme URIs, returned structurally with the scheme intact;
/// 2. absolute and relative paths, normalized lexically (relative paths
///    resolve against the referrer's containing directory, or the working
///    directory when no referrer is known);
/// 3. bare names, searched root by root for a directory `name` or a file
///    `name.<ext>`.
pub fn resolve(
    specifier: &str,
    referrer: Option<&CanonicalId>,
    config: &LoaderConfig,
    fetcher: &dyn SourceFetcher,
) -> Result<CanonicalId, LoadError> {
    let referrer_text = referrer.map(|r| r.as_text());

    if let Some(uri) = Uri::parse(specifier) {
        trace!("resolved '{}' as {} URI", specifier, uri.scheme);
        return Ok(CanonicalId::Uri(uri));
    }

    if specifier.starts_with('/') {
        return Ok(CanonicalId::path(specifier));
    }

    if specifier.starts_with("./") || specifier.starts_with("../") {
        let base = match referrer {
            Some(r) => r.directory(),
            None => working_directory(),
        };
        let base = base.ok_or_else(|| {
            LoadError::not_found(specifier, referrer_text.as_deref())
        })?;
        let id = base.join(specifier).ok_or_else(|| {
            LoadError::not_found(specifier, referrer_text.as_deref())
        })?;
        trace!("resolved '{}' against {} -> {}", specifier, base, id);
        return Ok(id);
    }

    for root in &config.search_path {
        let dir = CanonicalId::path(&format!("{}/{}", root, specifier));
        if fetcher.is_directory(&dir) {
            trace!("bare '{}' matched directory {}", specifier, dir);
            return Ok(dir);
        }
        let file = CanonicalId::path(&format!(
            "{}/{}.{}",
            root, specifier, config.script_extension
        ));
        if fetcher.exists(&file) {
            trace!("bare '{}' matched file {}", specifier, file);
            return Ok(file);
        }
    }

    Err(LoadError::not_found(specifier, referrer_text.as_deref()))
}

fn working_directory() -> Option<CanonicalId> {
    std::env::current_dir()
        .ok()
        .map(|dir| CanonicalId::path(&dir.to_string_lossy()))
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn normalize_collapses_dot_and_dotdot() {
        assert_eq!(normalize_path("/a/./b/../c"), "/a/c");
        assert_eq!(normalize_path("/a//b/"), "/a/b");
        assert_eq!(normalize_path("a/b/../../c"), "c");
    }

    #[test]
    fn normalize_keeps_unanchored_dotdot() {
        assert_eq!(normalize_path("../a"), "../a");
        assert_eq!(normalize_path("a/../../b"), "../b");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in &["/a/./b/../c", "../x/y", "/", ".", "a/b/c/.."] {
            let once = normalize_path(raw);
            assert_eq!(normalize_path(&once), once);
        }
    }

    #[test]
    fn uri_parse_roundtrip() {
        let uri = Uri::parse("gi://Gtk?version=3.0").unwrap();
        assert_eq!(uri.scheme, "gi");
        assert_eq!(uri.host, "Gtk");
        assert_eq!(uri.query_get("version"), Some("3.0"));
        assert_eq!(uri.to_uri_string(), "gi://Gtk?version=3.0");

        let opaque = Uri::parse("builtin:system").unwrap();
        assert_eq!(opaque.scheme, "builtin");
        assert_eq!(opaque.path, "system");
        assert_eq!(opaque.to_uri_string(), "builtin:system");
    }

    #[test]
    fn uri_parse_rejects_unknown_schemes() {
        assert!(Uri::parse("npm:left-pad").is_none());
        assert!(Uri::parse("./relative.js").is_none());
        assert!(Uri::parse("noscheme").is_none());
    }
}
