use pest::error::LineColLocation;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use log::trace;

use super::ast::{DependencyDecl, DependencyKind, ModuleHeader};
use crate::loader::ds::error::LoadError;
use crate::loader::resolve::CanonicalId;

#[derive(Parser)]
#[grammar = "scan/module_grammar.pest"] // relative to src
pub struct ModuleScanner;

/// Scan a module source for its static dependency declarations.
///
/// The scanner is deliberately permissive: anything that is not a
/// recognizable `import`/`export ... from` declaration is skipped token by
/// token, and full syntax checking stays with the engine's compiler. What
/// it does guarantee is that declarations inside strings, template
/// literals, and comments are never picked up, and that declarations are
/// reported in source order.
pub fn scan_module(source: &str, id: &CanonicalId) -> Result<ModuleHeader, LoadError> {
    let mut pairs = ModuleScanner::parse(Rule::module, source)
        .map_err(|e| syntax_error(e, id))?;

    let mut header = ModuleHeader::default();
    let module = match pairs.next() {
        Some(module) => module,
        None => return Ok(header),
    };
    for item in module.into_inner() {
        match item.as_rule() {
            Rule::import_decl => header.dependencies.push(build_import(item)),
            Rule::export_from_decl => header.dependencies.push(build_reexport(item)),
            _ => {}
        }
    }
    trace!(
        "scanned {}: {} static dependencies",
        id,
        header.dependencies.len()
    );
    Ok(header)
}

fn build_import(pair: Pair<Rule>) -> DependencyDecl {
    let mut specifier = String::new();
    let mut bindings = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::string_literal => specifier = string_text(inner),
            Rule::import_clause => collect_bindings(inner, &mut bindings),
            _ => {}
        }
    }
    DependencyDecl {
        specifier,
        kind: DependencyKind::Import,
        bindings,
    }
}

fn build_reexport(pair: Pair<Rule>) -> DependencyDecl {
    let mut specifier = String::new();
    let mut bindings = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::string_literal => specifier = string_text(inner),
            Rule::star_export => bindings.push("*".to_string()),
            Rule::named_imports => collect_named(inner, &mut bindings),
            _ => {}
        }
    }
    DependencyDecl {
        specifier,
        kind: DependencyKind::ReExport,
        bindings,
    }
}

fn collect_bindings(clause: Pair<Rule>, bindings: &mut Vec<String>) {
    for inner in clause.into_inner() {
        match inner.as_rule() {
            Rule::default_import => bindings.push("default".to_string()),
            Rule::namespace_import => bindings.push("*".to_string()),
            Rule::named_imports => collect_named(inner, bindings),
            _ => {}
        }
    }
}

fn collect_named(named: Pair<Rule>, bindings: &mut Vec<String>) {
    for specifier in named.into_inner() {
        if specifier.as_rule() == Rule::import_specifier {
            if let Some(name) = specifier.into_inner().next() {
                bindings.push(name.as_str().to_string());
            }
        }
    }
}

fn string_text(literal: Pair<Rule>) -> String {
    let raw = literal.as_str();
    // Quotes are part of the match; everything between them is the value.
    let body = &raw[1..raw.len() - 1];
    unescape(body)
}

fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn syntax_error(error: pest::error::Error<Rule>, id: &CanonicalId) -> LoadError {
    let (line, column) = match error.line_col {
        LineColLocation::Pos((line, column)) => (line, column),
        LineColLocation::Span((line, column), _) => (line, column),
    };
    LoadError::Syntax {
        id: id.as_text(),
        line,
        column,
        message: error.variant.message().to_string(),
    }
}
