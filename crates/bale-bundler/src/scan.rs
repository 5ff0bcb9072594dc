//! Static import and export extraction.
//!
//! Modules are parsed with oxc and walked once after semantic analysis, so a
//! `require(...)` call only counts when `require` is not bound in the module,
//! and identifier queries see real scopes. Spans are byte offsets into the
//! scanned source; [`crate::link`] rewrites the source at those spans.

use std::collections::BTreeSet;
use std::ops::Range;

use bale_graph::ImportKind;
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, BindingPattern, BindingPatternKind, CallExpression, Declaration,
    ExportAllDeclaration, ExportDefaultDeclaration, ExportDefaultDeclarationKind,
    ExportNamedDeclaration, Expression, IdentifierReference, ImportDeclaration,
    ImportDeclarationSpecifier, ImportExpression, ModuleExportName, Program,
};
use oxc_ast_visit::{walk, Visit};
use oxc_parser::{ParseOptions, Parser};
use oxc_semantic::{Scoping, SemanticBuilder};
use oxc_span::{GetSpan, SourceType, Span};
use thiserror::Error;

/// The module is not valid JavaScript.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ScanError {
    pub message: String,
}

/// How an import's bindings were written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportBindings {
    pub default: Option<String>,
    pub namespace: Option<String>,
    /// (imported, local)
    pub named: Vec<(String, String)>,
}

impl ImportBindings {
    pub fn locals(&self) -> impl Iterator<Item = &str> {
        self.default
            .iter()
            .chain(self.namespace.iter())
            .map(String::as_str)
            .chain(self.named.iter().map(|(_, local)| local.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportForm {
    Bindings(ImportBindings),
    /// `import 'x'`
    Bare,
    /// `require('x')` or `import('x')`; the span covers the call
    Call,
    /// `export * from 'x'`
    ReExportAll,
    /// `export * as ns from 'x'`
    ReExportNamespace(String),
    /// `export { a, b as c } from 'x'`, as (imported, exported)
    ReExportNamed(Vec<(String, String)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedImport {
    pub specifier: String,
    pub kind: ImportKind,
    pub span: Range<usize>,
    pub form: ImportForm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportForm {
    /// `export default <expr>`; the span runs up to the expression
    DefaultExpression,
    /// `export default function f` / `class C`; the span runs up to the
    /// declaration
    DefaultDeclaration { name: String },
    /// `export const a = …`, `export function f`; the span runs up to the
    /// declaration
    Declaration { names: Vec<String> },
    /// `export { a, b as c }`, as (local, exported); the span covers the
    /// whole statement
    List(Vec<(String, String)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedExport {
    pub span: Range<usize>,
    pub form: ExportForm,
}

/// Imports and exports of one module, each in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSyntax {
    pub imports: Vec<ScannedImport>,
    pub exports: Vec<ScannedExport>,
    /// Names referenced without a binding in any enclosing scope
    pub globals: BTreeSet<String>,
}

impl ModuleSyntax {
    /// Whether the module uses `import`/`export` declarations.
    pub fn is_esm(&self) -> bool {
        !self.exports.is_empty()
            || self.imports.iter().any(|import| {
                !matches!(import.kind, ImportKind::Require | ImportKind::Dynamic)
            })
    }

    /// Whether `name` is read somewhere it is neither declared nor imported.
    pub fn uses_global(&self, name: &str) -> bool {
        self.globals.contains(name)
    }
}

/// Parse `source` and collect its imports, exports and free names.
pub fn scan(source: &str) -> Result<ModuleSyntax, ScanError> {
    let allocator = Allocator::default();
    let program = parse(&allocator, source)?;
    let semantic = SemanticBuilder::new().build(&program).semantic;

    let mut collector = Collector {
        scoping: semantic.scoping(),
        syntax: ModuleSyntax::default(),
    };
    collector.visit_program(&program);
    Ok(collector.syntax)
}

/// Modules are parsed as ES modules when they contain module syntax and as
/// scripts otherwise. Top-level `return` is allowed since every module body
/// ends up inside a factory function.
pub(crate) fn parse<'a>(allocator: &'a Allocator, source: &'a str) -> Result<Program<'a>, ScanError> {
    let ret = Parser::new(allocator, source, SourceType::unambiguous())
        .with_options(ParseOptions {
            allow_return_outside_function: true,
            ..ParseOptions::default()
        })
        .parse();

    if let Some(error) = ret.errors.first() {
        return Err(ScanError {
            message: error.to_string(),
        });
    }
    if ret.panicked {
        return Err(ScanError {
            message: "parser stopped before the end of the module".to_string(),
        });
    }
    Ok(ret.program)
}

struct Collector<'s> {
    scoping: &'s Scoping,
    syntax: ModuleSyntax,
}

impl Collector<'_> {
    fn push_import(&mut self, specifier: &str, kind: ImportKind, span: Span, form: ImportForm) {
        self.syntax.imports.push(ScannedImport {
            specifier: specifier.to_string(),
            kind,
            span: range(span),
            form,
        });
    }

    fn push_export(&mut self, span: Range<usize>, form: ExportForm) {
        self.syntax.exports.push(ScannedExport { span, form });
    }

    fn is_unresolved(&self, ident: &IdentifierReference<'_>) -> bool {
        ident
            .reference_id
            .get()
            .is_some_and(|id| self.scoping.get_reference(id).symbol_id().is_none())
    }

    /// `require("x")` with `require` unbound and one string argument.
    fn require_specifier<'c>(&self, call: &'c CallExpression<'_>) -> Option<&'c str> {
        let Expression::Identifier(callee) = &call.callee else {
            return None;
        };
        if callee.name.as_str() != "require" || call.arguments.len() != 1 {
            return None;
        }
        if !self.is_unresolved(callee) {
            return None;
        }
        match &call.arguments[0] {
            Argument::StringLiteral(literal) => Some(literal.value.as_str()),
            _ => None,
        }
    }
}

impl<'a> Visit<'a> for Collector<'_> {
    fn visit_import_declaration(&mut self, decl: &ImportDeclaration<'a>) {
        if decl.import_kind.is_type() {
            return;
        }
        let (kind, form) = match &decl.specifiers {
            None => (ImportKind::SideEffect, ImportForm::Bare),
            Some(specifiers) => (
                ImportKind::Static,
                ImportForm::Bindings(import_bindings(specifiers)),
            ),
        };
        self.push_import(decl.source.value.as_str(), kind, decl.span, form);
    }

    fn visit_export_all_declaration(&mut self, decl: &ExportAllDeclaration<'a>) {
        if decl.export_kind.is_type() {
            return;
        }
        let form = match &decl.exported {
            Some(name) => ImportForm::ReExportNamespace(export_name(name)),
            None => ImportForm::ReExportAll,
        };
        self.push_import(decl.source.value.as_str(), ImportKind::ReExport, decl.span, form);
    }

    fn visit_export_named_declaration(&mut self, decl: &ExportNamedDeclaration<'a>) {
        if decl.export_kind.is_type() {
            return;
        }
        if let Some(source) = &decl.source {
            let list = decl
                .specifiers
                .iter()
                .map(|spec| (export_name(&spec.local), export_name(&spec.exported)))
                .collect();
            self.push_import(
                source.value.as_str(),
                ImportKind::ReExport,
                decl.span,
                ImportForm::ReExportNamed(list),
            );
            return;
        }

        match &decl.declaration {
            Some(declaration) => {
                let mut names = Vec::new();
                declared_names(declaration, &mut names);
                let start = decl.span.start as usize;
                let end = declaration.span().start as usize;
                self.push_export(start..end, ExportForm::Declaration { names });
            }
            None => {
                let list = decl
                    .specifiers
                    .iter()
                    .filter(|spec| !spec.export_kind.is_type())
                    .map(|spec| (export_name(&spec.local), export_name(&spec.exported)))
                    .collect();
                self.push_export(range(decl.span), ExportForm::List(list));
            }
        }
        walk::walk_export_named_declaration(self, decl);
    }

    fn visit_export_default_declaration(&mut self, decl: &ExportDefaultDeclaration<'a>) {
        let name = match &decl.declaration {
            ExportDefaultDeclarationKind::FunctionDeclaration(function) => function.id.as_ref(),
            ExportDefaultDeclarationKind::ClassDeclaration(class) => class.id.as_ref(),
            _ => None,
        };
        let form = match name {
            Some(id) => ExportForm::DefaultDeclaration {
                name: id.name.to_string(),
            },
            None => ExportForm::DefaultExpression,
        };
        let start = decl.span.start as usize;
        let end = decl.declaration.span().start as usize;
        self.push_export(start..end, form);
        walk::walk_export_default_declaration(self, decl);
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if let Some(specifier) = self.require_specifier(call) {
            let specifier = specifier.to_string();
            self.push_import(&specifier, ImportKind::Require, call.span, ImportForm::Call);
        }
        walk::walk_call_expression(self, call);
    }

    fn visit_import_expression(&mut self, expr: &ImportExpression<'a>) {
        if let Expression::StringLiteral(literal) = &expr.source {
            self.push_import(
                literal.value.as_str(),
                ImportKind::Dynamic,
                expr.span,
                ImportForm::Call,
            );
        }
        walk::walk_import_expression(self, expr);
    }

    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        if self.is_unresolved(ident) {
            self.syntax.globals.insert(ident.name.to_string());
        }
    }
}

fn range(span: Span) -> Range<usize> {
    span.start as usize..span.end as usize
}

fn export_name(name: &ModuleExportName<'_>) -> String {
    match name {
        ModuleExportName::IdentifierName(ident) => ident.name.to_string(),
        ModuleExportName::IdentifierReference(ident) => ident.name.to_string(),
        ModuleExportName::StringLiteral(literal) => literal.value.to_string(),
    }
}

fn import_bindings(specifiers: &[ImportDeclarationSpecifier<'_>]) -> ImportBindings {
    let mut bindings = ImportBindings::default();
    for specifier in specifiers {
        match specifier {
            ImportDeclarationSpecifier::ImportDefaultSpecifier(default) => {
                bindings.default = Some(default.local.name.to_string());
            }
            ImportDeclarationSpecifier::ImportNamespaceSpecifier(namespace) => {
                bindings.namespace = Some(namespace.local.name.to_string());
            }
            ImportDeclarationSpecifier::ImportSpecifier(named) => {
                if named.import_kind.is_type() {
                    continue;
                }
                bindings
                    .named
                    .push((export_name(&named.imported), named.local.name.to_string()));
            }
        }
    }
    bindings
}

fn declared_names(declaration: &Declaration<'_>, names: &mut Vec<String>) {
    match declaration {
        Declaration::VariableDeclaration(var) => {
            for declarator in &var.declarations {
                pattern_names(&declarator.id, names);
            }
        }
        Declaration::FunctionDeclaration(function) => {
            if let Some(id) = &function.id {
                names.push(id.name.to_string());
            }
        }
        Declaration::ClassDeclaration(class) => {
            if let Some(id) = &class.id {
                names.push(id.name.to_string());
            }
        }
        _ => {}
    }
}

fn pattern_names(pattern: &BindingPattern<'_>, names: &mut Vec<String>) {
    match &pattern.kind {
        BindingPatternKind::BindingIdentifier(ident) => names.push(ident.name.to_string()),
        BindingPatternKind::ObjectPattern(object) => {
            for property in &object.properties {
                pattern_names(&property.value, names);
            }
            if let Some(rest) = &object.rest {
                pattern_names(&rest.argument, names);
            }
        }
        BindingPatternKind::ArrayPattern(array) => {
            for element in array.elements.iter().flatten() {
                pattern_names(element, names);
            }
            if let Some(rest) = &array.rest {
                pattern_names(&rest.argument, names);
            }
        }
        BindingPatternKind::AssignmentPattern(assignment) => {
            pattern_names(&assignment.left, names);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specifiers(source: &str) -> Vec<(String, ImportKind)> {
        scan(source)
            .unwrap()
            .imports
            .into_iter()
            .map(|import| (import.specifier, import.kind))
            .collect()
    }

    #[test]
    fn finds_every_import_form_in_order() {
        let source = r#"
import a from './a';
import { b, c as d } from "./b";
import * as ns from './ns';
import './side.css';
export * from './all';
export { e } from './e';
const f = require('./f');
const g = import('./g');
"#;
        assert_eq!(
            specifiers(source),
            vec![
                ("./a".to_string(), ImportKind::Static),
                ("./b".to_string(), ImportKind::Static),
                ("./ns".to_string(), ImportKind::Static),
                ("./side.css".to_string(), ImportKind::SideEffect),
                ("./all".to_string(), ImportKind::ReExport),
                ("./e".to_string(), ImportKind::ReExport),
                ("./f".to_string(), ImportKind::Require),
                ("./g".to_string(), ImportKind::Dynamic),
            ]
        );
    }

    #[test]
    fn comments_and_strings_are_skipped() {
        let source = r#"
// import nope from './line-comment';
/* require('./block-comment') */
const text = "import x from './string'";
const tpl = `require('./template')`;
import real from './real';
"#;
        assert_eq!(
            specifiers(source),
            vec![("./real".to_string(), ImportKind::Static)]
        );
    }

    #[test]
    fn template_expressions_are_code() {
        let source = "const s = `${require('./inside')}`;";
        assert_eq!(
            specifiers(source),
            vec![("./inside".to_string(), ImportKind::Require)]
        );
    }

    #[test]
    fn regex_literals_do_not_open_strings() {
        let source = "const re = /['\"]/g;\nimport x from './after-regex';\nconst half = x / 2;";
        assert_eq!(
            specifiers(source),
            vec![("./after-regex".to_string(), ImportKind::Static)]
        );
    }

    #[test]
    fn member_calls_meta_and_local_require_are_ignored() {
        let source = "module.require('./no');\nconst u = import.meta.url;";
        assert!(specifiers(source).is_empty());

        let shadowed = "function load(require) { return require('./param'); }";
        assert!(specifiers(shadowed).is_empty());
    }

    #[test]
    fn import_bindings_are_captured() {
        let syntax = scan("import React, { useState as use, memo } from 'react';").unwrap();
        let ImportForm::Bindings(bindings) = &syntax.imports[0].form else {
            panic!("expected bindings");
        };
        assert_eq!(bindings.default.as_deref(), Some("React"));
        assert_eq!(
            bindings.named,
            vec![
                ("useState".to_string(), "use".to_string()),
                ("memo".to_string(), "memo".to_string())
            ]
        );
    }

    #[test]
    fn export_forms() {
        let source = "export const a = 1, b = fn(1, 2);\nexport function c() {}\nexport default class D {}\nexport { a as x };\nexport const { p, q: r, ...s } = obj;\nexport let [t, , u = 1] = list;";
        let exports: Vec<ExportForm> = scan(source)
            .unwrap()
            .exports
            .into_iter()
            .map(|e| e.form)
            .collect();
        assert_eq!(
            exports,
            vec![
                ExportForm::Declaration {
                    names: vec!["a".into(), "b".into()]
                },
                ExportForm::Declaration {
                    names: vec!["c".into()]
                },
                ExportForm::DefaultDeclaration { name: "D".into() },
                ExportForm::List(vec![("a".into(), "x".into())]),
                ExportForm::Declaration {
                    names: vec!["p".into(), "r".into(), "s".into()]
                },
                ExportForm::Declaration {
                    names: vec!["t".into(), "u".into()]
                },
            ]
        );
    }

    #[test]
    fn export_spans_stop_at_the_declaration() {
        let source = "export let a = 1\nexport default 42;";
        let syntax = scan(source).unwrap();
        assert_eq!(&source[syntax.exports[0].span.clone()], "export ");
        assert_eq!(&source[syntax.exports[1].span.clone()], "export default ");
        assert_eq!(syntax.exports[1].form, ExportForm::DefaultExpression);
    }

    #[test]
    fn commonjs_is_not_esm() {
        assert!(!scan("module.exports = require('./x');").unwrap().is_esm());
        assert!(scan("export default 1;").unwrap().is_esm());
    }

    #[test]
    fn top_level_return_is_accepted() {
        let syntax = scan("if (typeof window === 'undefined') return;\nrequire('./dom');").unwrap();
        assert_eq!(syntax.imports.len(), 1);
    }

    #[test]
    fn syntax_errors_are_reported() {
        let err = scan("const = ;").unwrap_err();
        assert!(!err.message.is_empty());
    }

    #[test]
    fn free_identifiers_respect_scopes() {
        let uses = scan("$('#app').hide();").unwrap();
        assert!(uses.uses_global("$"));

        let member = scan("window.$ = 1; const o = { $: 2 };").unwrap();
        assert!(!member.uses_global("$"));

        let declared = scan("const $ = make();\n$('#x');").unwrap();
        assert!(!declared.uses_global("$"));

        let imported = scan("import $ from 'jquery';\n$('#x');").unwrap();
        assert!(!imported.uses_global("$"));
    }

    #[test]
    fn destructured_and_later_declarators_are_bindings() {
        let destructured = scan("const { $ } = window.libs;\n$('x');").unwrap();
        assert!(!destructured.uses_global("$"));

        let later = scan("let a = 1, $ = window.jQuery;\n$(a);").unwrap();
        assert!(!later.uses_global("$"));

        let nested = scan("const [{ deep: [$] }] = list;\n$();").unwrap();
        assert!(!nested.uses_global("$"));

        let shorthand = scan("const o = { $ };").unwrap();
        assert!(shorthand.uses_global("$"));

        let inner_only = scan("function f($) { return $; }\n$();").unwrap();
        assert!(inner_only.uses_global("$"));
    }
}
