//! Source text acquisition for resolved identifiers.
//!
//! The loader never touches the filesystem directly; every probe and read
//! goes through a [`SourceFetcher`], so hosts can mount packaged resources
//! and tests can run against an in-memory tree.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::loader::ds::error::LoadError;
use crate::loader::resolve::CanonicalId;
use crate::loader::tasks::Promise;

pub trait SourceFetcher {
    /// Whether a loadable resource exists at `id`.
    fn exists(&self, id: &CanonicalId) -> bool;

    /// Whether `id` denotes a directory of modules.
    fn is_directory(&self, id: &CanonicalId) -> bool;

    /// Names of the entries directly under a directory identifier. Used
    /// only for importer-node enumeration; an empty list is always safe.
    fn list(&self, id: &CanonicalId) -> Vec<String>;

    /// Read the source text at `id`.
    fn fetch_sync(&self, id: &CanonicalId) -> Result<String, LoadError>;

    /// Read the source text at `id`, deferring completion. The default
    /// reads synchronously and hands back a settled promise; hosts with a
    /// real asynchronous I/O layer override this.
    fn fetch_async(&self, id: &CanonicalId) -> Promise<String> {
        match self.fetch_sync(id) {
            Ok(source) => Promise::resolved(source),
            Err(error) => Promise::rejected(error),
        }
    }
}

/// Fetcher over the real filesystem. Only plain-path identifiers are
/// servable; scheme-qualified identifiers report `ResourceNotFound`.
pub struct FileSourceFetcher;

impl FileSourceFetcher {
    pub fn new() -> Self {
        FileSourceFetcher
    }

    fn file_path(id: &CanonicalId) -> Option<String> {
        match id {
            CanonicalId::Path(p) => Some(p.to_string()),
            CanonicalId::Uri(_) => None,
        }
    }
}

impl SourceFetcher for FileSourceFetcher {
    fn exists(&self, id: &CanonicalId) -> bool {
        match Self::file_path(id) {
            Some(p) => Path::new(&p).is_file(),
            None => false,
        }
    }

    fn is_directory(&self, id: &CanonicalId) -> bool {
        match Self::file_path(id) {
            Some(p) => Path::new(&p).is_dir(),
            None => false,
        }
    }

    fn list(&self, id: &CanonicalId) -> Vec<String> {
        let path = match Self::file_path(id) {
            Some(p) => p,
            None => return Vec::new(),
        };
        let entries = match fs::read_dir(&path) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        names
    }

    fn fetch_sync(&self, id: &CanonicalId) -> Result<String, LoadError> {
        let path = Self::file_path(id)
            .ok_or_else(|| LoadError::ResourceNotFound(id.as_text()))?;
        fs::read_to_string(&path).map_err(|_| LoadError::ResourceNotFound(id.as_text()))
    }
}

impl Default for FileSourceFetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// An in-memory source tree keyed by canonical identifier text. Directories
/// are implied by the keys: `/modules/subA` is a directory because
/// `/modules/subA/subB/foobar.js` exists under it.
///
/// URI-keyed entries (e.g. `resource:///org/example/util.js`) are served
/// the same way, which is enough to stand in for a packaged-resource layer.
pub struct MemorySourceFetcher {
    files: BTreeMap<String, String>,
}

impl MemorySourceFetcher {
    pub fn new() -> Self {
        MemorySourceFetcher {
            files: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, id: &str, source: &str) -> &mut Self {
        self.files.insert(id.to_string(), source.to_string());
        self
    }
}

impl SourceFetcher for MemorySourceFetcher {
    fn exists(&self, id: &CanonicalId) -> bool {
        self.files.contains_key(&id.as_text())
    }

    fn is_directory(&self, id: &CanonicalId) -> bool {
        let prefix = format!("{}/", id.as_text());
        self.files.range(prefix.clone()..).next().map_or(false, |(key, _)| {
            key.starts_with(&prefix)
        })
    }

    fn list(&self, id: &CanonicalId) -> Vec<String> {
        let prefix = format!("{}/", id.as_text());
        let mut names: Vec<String> = Vec::new();
        for key in self.files.keys() {
            if let Some(rest) = key.strip_prefix(&prefix) {
                let first = rest.split('/').next().unwrap_or(rest);
                if !first.is_empty() && !names.iter().any(|n| n == first) {
                    names.push(first.to_string());
                }
            }
        }
        names
    }

    fn fetch_sync(&self, id: &CanonicalId) -> Result<String, LoadError> {
        self.files
            .get(&id.as_text())
            .map(|source| source.to_string())
            .ok_or_else(|| LoadError::ResourceNotFound(id.as_text()))
    }
}

impl Default for MemorySourceFetcher {
    fn default() -> Self {
        Self::new()
    }
}
