//! # modus - dual-mode module loader for a JavaScript engine embedding
//!
//! The resolution and loading subsystem behind a script platform's two
//! import surfaces:
//! - a legacy, synchronous importer object (`imports.subA.subB.foobar`):
//!   a lazily-populated directory tree where each property access resolves,
//!   evaluates, and permanently caches a module;
//! - a standards-based module loader (`import x from './x.js'`,
//!   dynamic `import()`): static dependency graphs, link-then-evaluate
//!   state machine, deferred loads that never block the caller's turn.
//!
//! Both paths share one module registry keyed by canonical identifiers, so
//! a resource reached through either surface (or through a `gi://`
//! introspected-namespace URI or a `builtin:` module) materializes exactly
//! one namespace object.
//!
//! ## Quick Start
//!
//! ### Resolving specifiers
//!
//! ```
//! use modus::loader::resolve::{normalize_path, CanonicalId};
//!
//! assert_eq!(normalize_path("/project/modules/../lib/util.js"), "/project/lib/util.js");
//!
//! let referrer = CanonicalId::path("/project/modules/a.js");
//! assert_eq!(referrer.directory().unwrap().as_text(), "/project/modules");
//! ```
//!
//! ### Loading modules
//!
//! ```
//! use std::rc::Rc;
//!
//! use modus::host::compiler::PassthroughCompiler;
//! use modus::host::evaluator::NullEvaluator;
//! use modus::host::fetcher::MemorySourceFetcher;
//! use modus::host::introspection::NoTypelibs;
//! use modus::loader::config::LoaderConfig;
//! use modus::loader::context::LoaderCx;
//! use modus::loader::ds::namespace::same_object;
//!
//! let mut sources = MemorySourceFetcher::new();
//! sources.insert("/modules/util.js", "export const answer = 42;");
//!
//! let cx = LoaderCx::new(
//!     LoaderConfig::with_search_path(vec!["/modules".to_string()]),
//!     Rc::new(sources),
//!     Rc::new(PassthroughCompiler),
//!     Rc::new(NullEvaluator),
//!     Rc::new(NoTypelibs),
//! );
//!
//! // Importing the same specifier twice yields the identical namespace.
//! let first = cx.import_sync("util", None).unwrap();
//! let second = cx.import_sync("util", None).unwrap();
//! assert!(same_object(&first, &second));
//! ```
//!
//! ### Dynamic import
//!
//! ```
//! # use std::rc::Rc;
//! # use modus::host::compiler::PassthroughCompiler;
//! # use modus::host::evaluator::NullEvaluator;
//! # use modus::host::fetcher::MemorySourceFetcher;
//! # use modus::host::introspection::NoTypelibs;
//! # use modus::loader::config::LoaderConfig;
//! # use modus::loader::context::LoaderCx;
//! # let mut sources = MemorySourceFetcher::new();
//! # sources.insert("/modules/util.js", "export const answer = 42;");
//! # let cx = LoaderCx::new(
//! #     LoaderConfig::with_search_path(vec!["/modules".to_string()]),
//! #     Rc::new(sources),
//! #     Rc::new(PassthroughCompiler),
//! #     Rc::new(NullEvaluator),
//! #     Rc::new(NoTypelibs),
//! # );
//! let pending = cx.import_dynamic("util", None);
//! assert!(!pending.is_settled()); // nothing ran in this turn
//! cx.run_jobs();
//! assert!(pending.settled_result().unwrap().is_ok());
//! ```
//!
//! ## Architecture
//!
//! - **[`loader::resolve`]** - canonical identifiers and the specifier
//!   resolution algorithm (absolute, relative, bare, scheme-qualified)
//! - **[`loader::registry`]** - the shared module cache and its
//!   single-instance-per-identifier invariant
//! - **[`loader::importer`]** - the legacy importer tree
//! - **[`loader::esm`]** - the standards loader state machine
//! - **[`loader::bridge`]** - shared namespaces across both paths
//!   (`gi://`, `builtin:`)
//! - **[`scan`]** - pest-based static dependency scanning
//! - **[`host`]** - the contracts the embedding supplies: source fetching,
//!   compilation, evaluation, introspection
//!
//! The engine itself (parser, bytecode, GC, the FFI marshalling layer)
//! sits behind the [`host`] traits and is not part of this crate.

#[macro_use]
extern crate lazy_static;

pub mod host;
pub mod loader;
pub mod scan;
