//! Production minification of linked module code.
//!
//! Each module body is minified on its own with oxc. Top-level names are
//! left alone since the export getters and the registry refer to them.

use std::path::PathBuf;

use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{Minifier, MinifierOptions};
use oxc_parser::{ParseOptions, Parser};
use oxc_span::SourceType;

use super::sourcemap::Mapping;
use crate::scan::ScanError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Minified {
    pub code: String,
    /// Positions in `code` and where they came from, in generated order.
    /// Source index is always 0.
    pub mappings: Vec<Mapping>,
}

pub fn minify(source: &str) -> Result<Minified, ScanError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::cjs())
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
    let mut program = ret.program;

    let minified = Minifier::new(MinifierOptions::default()).minify(&allocator, &mut program);
    let output = Codegen::new()
        .with_options(CodegenOptions {
            source_map_path: Some(PathBuf::from("module.js")),
            ..CodegenOptions::minify()
        })
        .with_scoping(minified.scoping)
        .build(&program);

    let mappings = match &output.map {
        Some(map) => map
            .get_tokens()
            .map(|token| Mapping {
                generated_line: token.get_dst_line(),
                generated_column: token.get_dst_col(),
                source: 0,
                source_line: token.get_src_line(),
                source_column: token.get_src_col(),
            })
            .collect(),
        None => Vec::new(),
    };

    Ok(Minified {
        code: output.code.trim_end().to_string(),
        mappings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_comments_and_whitespace() {
        let out = minify("// header\nfunction f() {\n    return 1; /* one */\n}\nexports.f = f;\n")
            .unwrap();
        assert!(!out.code.contains("header"));
        assert!(!out.code.contains("one"));
        assert!(!out.code.contains("\n    "));
        assert!(out.code.contains("exports.f"));
    }

    #[test]
    fn keeps_literals_verbatim() {
        let source = "exports.a = \"  // not a comment  \";\nexports.b = `line one  \n    line two`;\n";
        let out = minify(source).unwrap();
        assert!(out.code.contains("  // not a comment  "));
        assert!(out.code.contains("line one  "));
        assert!(out.code.contains("    line two"));
    }

    #[test]
    fn registry_names_survive() {
        let source = "__bale_require__.r(exports);var helper = __bale_require__(\"./a.js\");\nmodule.exports = helper;";
        let out = minify(source).unwrap();
        assert!(out.code.contains("__bale_require__("));
        assert!(out.code.contains("./a.js"));
        assert!(out.code.contains("module.exports"));
    }

    #[test]
    fn tokens_point_back_into_the_module() {
        let source = "var a = 1;\n\n\nexports.a = a;";
        let out = minify(source).unwrap();
        assert!(!out.mappings.is_empty());
        assert!(out.mappings.iter().any(|m| m.source_line == 3));
        assert!(out.mappings.iter().all(|m| m.source == 0));
    }

    #[test]
    fn invalid_code_is_an_error() {
        assert!(minify("var = ;").is_err());
    }
}
