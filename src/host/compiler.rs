//! The compile seam between the loader and the embedded engine.

use crate::loader::ds::error::LoadError;
use crate::loader::resolve::CanonicalId;

/// Which grammar and scoping rules a unit is compiled under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileMode {
    /// Top-level script, sloppy-mode semantics; `this` is the module
    /// namespace and top-level declarations land on it.
    Legacy,
    /// Standards module semantics with static import/export declarations.
    Module,
}

/// An engine-compiled unit ready for evaluation. The loader treats it as
/// opaque; retaining the source text here is the engine adapter's choice.
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    pub id: CanonicalId,
    pub mode: CompileMode,
    pub source: String,
}

pub trait Compiler {
    /// Compile source text, reporting `LoadError::Syntax` with line/column
    /// on malformed input.
    fn compile(
        &self,
        source: &str,
        id: &CanonicalId,
        mode: CompileMode,
    ) -> Result<CompiledUnit, LoadError>;
}

/// Compiler that wraps the source text unchanged. Suitable wherever the
/// evaluator interprets source directly (and for tests); hosts with a real
/// engine front end substitute their own.
pub struct PassthroughCompiler;

impl Compiler for PassthroughCompiler {
    fn compile(
        &self,
        source: &str,
        id: &CanonicalId,
        mode: CompileMode,
    ) -> Result<CompiledUnit, LoadError> {
        Ok(CompiledUnit {
            id: id.clone(),
            mode,
            source: source.to_string(),
        })
    }
}
