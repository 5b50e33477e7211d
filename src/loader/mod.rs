//! The module resolution and loading subsystem.
//!
//! Two import surfaces share one cache:
//!
//! - the **legacy importer** ([`importer`]): a lazy, tree-shaped namespace
//!   where each property access synchronously resolves, evaluates, and
//!   permanently installs a child module;
//! - the **standards loader** ([`esm`]): fetch → scan → instantiate →
//!   evaluate, with dynamic import and top-level suspension.
//!
//! Both paths resolve specifiers through [`resolve`] into canonical
//! identifiers and cache through [`registry`], so the same underlying
//! resource yields exactly one namespace object no matter how it is
//! reached; [`bridge`] covers the shared-namespace cases (`gi://`,
//! `builtin:`) explicitly.

pub mod bridge;
pub mod config;
pub mod context;
pub mod ds;
pub mod esm;
pub mod importer;
pub mod registry;
pub mod resolve;
pub mod tasks;

pub use context::LoaderCx;
pub use ds::error::LoadError;
pub use resolve::CanonicalId;
