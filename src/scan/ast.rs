/// How a dependency edge was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    /// `import ... from '...'` or a bare `import '...'`.
    Import,
    /// `export ... from '...'`.
    ReExport,
}

/// One static dependency declaration extracted from a module source.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyDecl {
    /// The raw specifier text, unescaped, exactly as the module wrote it.
    pub specifier: String,
    pub kind: DependencyKind,
    /// Imported binding names, for diagnostics: `*` for a namespace
    /// import, `default` for the default binding, otherwise the exported
    /// names as written. Empty for side-effect-only imports.
    pub bindings: Vec<String>,
}

/// The scanned header of a module: its dependency declarations in source
/// order. Source order matters: dependencies are instantiated in
/// declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleHeader {
    pub dependencies: Vec<DependencyDecl>,
}

impl ModuleHeader {
    pub fn specifiers(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(|d| d.specifier.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}
