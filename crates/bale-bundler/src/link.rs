//! Lowering of module syntax to registry calls.
//!
//! Every emitted module runs as a factory `function (module, exports,
//! __bale_require__)`. Imports become `__bale_require__("<key>")` calls (or a
//! global lookup for externals) and exports become getters on `exports`.
//! Replacements keep the line count of what they replace, and export getters
//! are prepended on the first line, so line N of the lowered code is line N of
//! the transformed source.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use bale_config::ModuleIds;
use bale_graph::ModuleId;

use crate::hash::hash_content;
use crate::scan::{ExportForm, ImportBindings, ImportForm, ModuleSyntax};

/// Characters kept from a hashed module key.
const HASHED_KEY_LENGTH: usize = 12;

/// Maps module identities to the keys they are registered under at runtime.
#[derive(Debug, Clone)]
pub struct ModuleKeys {
    root: PathBuf,
    style: ModuleIds,
}

impl ModuleKeys {
    pub fn new(root: impl Into<PathBuf>, style: ModuleIds) -> Self {
        Self {
            root: root.into(),
            style,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `./src/a.js` for named keys, a short digest of that path for hashed
    /// keys. Virtual modules always keep their id.
    pub fn key(&self, id: &ModuleId) -> String {
        if id.is_virtual() {
            return id.path_string().into_owned();
        }
        let relative = id.relative_to(&self.root);
        match self.style {
            ModuleIds::Named => relative,
            ModuleIds::Hashed => hash_content(relative.as_bytes())[..HASHED_KEY_LENGTH].to_string(),
        }
    }
}

/// Where an import points once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// Registry key of a bundled module
    Module(String),
    /// Dotted global path, e.g. `$` or `window.React`
    External(String),
    /// Resolution failed; evaluating the import throws
    Missing(String),
}

impl LinkTarget {
    /// JavaScript expression producing the target's exports.
    pub fn expression(&self) -> String {
        match self {
            LinkTarget::Module(key) => format!("__bale_require__({})", quote(key)),
            LinkTarget::External(global) => {
                let mut expr = String::from("globalThis");
                for segment in global.split('.') {
                    let _ = write!(expr, "[{}]", quote(segment));
                }
                expr
            }
            LinkTarget::Missing(specifier) => format!("__bale_require__.x({})", quote(specifier)),
        }
    }
}

/// JSON string literal, which is also a valid JavaScript string literal.
pub(crate) fn quote(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value.escape_default()))
}

/// Lower `code` given its scanned syntax and one target per import.
pub fn link(code: &str, syntax: &ModuleSyntax, targets: &[LinkTarget]) -> String {
    let mut edits: Vec<(std::ops::Range<usize>, String)> = Vec::new();
    let mut prefix = String::new();

    if syntax.is_esm() {
        prefix.push_str("__bale_require__.r(exports);");
    }

    for (index, (import, target)) in syntax.imports.iter().zip(targets).enumerate() {
        let expr = target.expression();
        let temp = format!("__bale_i{index}");
        let replacement = match &import.form {
            ImportForm::Bindings(bindings) => lower_bindings(bindings, &expr, &temp),
            ImportForm::Bare => format!("{expr};"),
            ImportForm::Call => match import.kind {
                bale_graph::ImportKind::Dynamic => {
                    format!("Promise.resolve().then(function () {{ return {expr}; }})")
                }
                _ => expr,
            },
            ImportForm::ReExportAll => format!("__bale_require__.s(exports, {expr});"),
            ImportForm::ReExportNamespace(name) => format!(
                "var {temp} = {expr}; {}",
                getter(name, &temp)
            ),
            ImportForm::ReExportNamed(list) => {
                let mut out = format!("var {temp} = {expr};");
                for (imported, exported) in list {
                    out.push(' ');
                    out.push_str(&getter(exported, &member(&temp, imported)));
                }
                out
            }
        };
        edits.push((import.span.clone(), replacement));
    }

    for export in &syntax.exports {
        let replacement = match &export.form {
            ExportForm::DefaultExpression => "exports[\"default\"] = ".to_string(),
            ExportForm::DefaultDeclaration { name } => {
                prefix.push_str(&getter("default", name));
                String::new()
            }
            ExportForm::Declaration { names } => {
                for name in names {
                    prefix.push_str(&getter(name, name));
                }
                String::new()
            }
            ExportForm::List(list) => {
                for (local, exported) in list {
                    prefix.push_str(&getter(exported, local));
                }
                String::new()
            }
        };
        edits.push((export.span.clone(), replacement));
    }

    edits.sort_by_key(|(span, _)| span.start);

    let mut out = String::with_capacity(prefix.len() + code.len() + edits.len() * 32);
    out.push_str(&prefix);
    let mut cursor = 0;
    for (span, replacement) in edits {
        if span.start < cursor {
            continue;
        }
        out.push_str(&code[cursor..span.start]);
        out.push_str(&replacement);
        let newlines = code[span.clone()].bytes().filter(|b| *b == b'\n').count();
        out.extend(std::iter::repeat_n('\n', newlines));
        cursor = span.end;
    }
    out.push_str(&code[cursor..]);
    out
}

fn lower_bindings(bindings: &ImportBindings, expr: &str, temp: &str) -> String {
    match (bindings.default.as_deref(), bindings.namespace.as_deref(), bindings.named.is_empty()) {
        (None, None, true) => format!("{expr};"),
        (None, Some(ns), true) => format!("var {ns} = {expr};"),
        (Some(name), None, true) => format!("var {name} = __bale_require__.n({expr});"),
        (default, namespace, _) => {
            let mut out = format!("var {temp} = {expr}");
            if let Some(name) = default {
                let _ = write!(out, ", {name} = __bale_require__.n({temp})");
            }
            if let Some(ns) = namespace {
                let _ = write!(out, ", {ns} = {temp}");
            }
            for (imported, local) in &bindings.named {
                let _ = write!(out, ", {local} = {}", member(temp, imported));
            }
            out.push(';');
            out
        }
    }
}

fn member(object: &str, name: &str) -> String {
    if name == "default" {
        format!("__bale_require__.n({object})")
    } else {
        format!("{object}[{}]", quote(name))
    }
}

fn getter(exported: &str, value: &str) -> String {
    format!(
        "__bale_require__.d(exports, {}, function () {{ return {value}; }});",
        quote(exported)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::scan;

    fn lower(code: &str, targets: &[LinkTarget]) -> String {
        link(code, &scan(code).unwrap(), targets)
    }

    fn module(key: &str) -> LinkTarget {
        LinkTarget::Module(key.to_string())
    }

    #[test]
    fn default_and_named_imports() {
        let out = lower(
            "import a, { b, c as d } from './a';\nuse(a, b, d);",
            &[module("./src/a.js")],
        );
        assert_eq!(
            out,
            "__bale_require__.r(exports);var __bale_i0 = __bale_require__(\"./src/a.js\"), a = __bale_require__.n(__bale_i0), b = __bale_i0[\"b\"], d = __bale_i0[\"c\"];\nuse(a, b, d);"
        );
    }

    #[test]
    fn externals_read_the_global() {
        let out = lower(
            "var $ = require('jquery');",
            &[LinkTarget::External("$".into())],
        );
        assert_eq!(out, "var $ = globalThis[\"$\"];");

        let nested = LinkTarget::External("window.React".into()).expression();
        assert_eq!(nested, "globalThis[\"window\"][\"React\"]");
    }

    #[test]
    fn exports_become_getters_on_the_first_line() {
        let code = "export const a = 1;\nexport function f() {}\nexport default 42;";
        let out = lower(code, &[]);
        let first_line = out.lines().next().unwrap();
        assert!(first_line.starts_with("__bale_require__.r(exports);"));
        assert!(first_line.contains("__bale_require__.d(exports, \"a\", function () { return a; });"));
        assert!(first_line.contains("__bale_require__.d(exports, \"f\", function () { return f; });"));
        assert!(out.ends_with("exports[\"default\"] = 42;"));
        assert_eq!(out.lines().count(), code.lines().count());
    }

    #[test]
    fn multi_line_imports_keep_line_count() {
        let code = "import {\n  a,\n  b\n} from './x';\nrun(a, b);";
        let out = lower(code, &[module("x")]);
        assert_eq!(out.lines().count(), code.lines().count());
        assert_eq!(out.lines().last(), Some("run(a, b);"));
    }

    #[test]
    fn dynamic_and_missing_imports() {
        let out = lower("load(import('./lazy'));", &[LinkTarget::Missing("./lazy".into())]);
        assert_eq!(
            out,
            "load(Promise.resolve().then(function () { return __bale_require__.x(\"./lazy\"); }));"
        );
    }

    #[test]
    fn re_exports_are_live_getters() {
        let out = lower("export { a as b } from './a';", &[module("k")]);
        assert!(out.contains(
            "var __bale_i0 = __bale_require__(\"k\"); __bale_require__.d(exports, \"b\", function () { return __bale_i0[\"a\"]; });"
        ));
    }

    #[test]
    fn keys_follow_the_id_style() {
        let id = ModuleId::new("/app/src/index.js").unwrap();
        let named = ModuleKeys::new("/app", ModuleIds::Named);
        assert_eq!(named.key(&id), "./src/index.js");

        let hashed = ModuleKeys::new("/app", ModuleIds::Hashed);
        let key = hashed.key(&id);
        assert_eq!(key.len(), 12);
        assert_eq!(key, hashed.key(&id));
        assert_eq!(hashed.key(&ModuleId::new_virtual("env")), "virtual:env");
    }

    #[test]
    fn commonjs_is_left_alone() {
        let code = "module.exports = function () { return 1; };";
        assert_eq!(lower(code, &[]), code);
    }
}
