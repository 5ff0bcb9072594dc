//! Source map v3 output for chunks.

use oxc_sourcemap::SourceMapBuilder;

/// One mapped position of generated code, all zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    pub generated_line: u32,
    pub generated_column: u32,
    /// Index into the map's sources
    pub source: u32,
    pub source_line: u32,
    pub source_column: u32,
}

impl Mapping {
    /// Start of a generated line, mapped to the start of a source line.
    pub fn line(generated_line: u32, source: u32, source_line: u32) -> Self {
        Self {
            generated_line,
            generated_column: 0,
            source,
            source_line,
            source_column: 0,
        }
    }
}

/// JSON source map of `file` over `(name, content)` sources. `mappings`
/// must be in generated order.
pub fn render_map(file: &str, sources: &[(String, &str)], mappings: &[Mapping]) -> String {
    let mut builder = SourceMapBuilder::default();
    builder.set_file(file);
    let ids: Vec<u32> = sources
        .iter()
        .map(|(name, content)| builder.add_source_and_content(name, content))
        .collect();
    for mapping in mappings {
        let Some(&source_id) = ids.get(mapping.source as usize) else {
            continue;
        };
        builder.add_token(
            mapping.generated_line,
            mapping.generated_column,
            mapping.source_line,
            mapping.source_column,
            Some(source_id),
            None,
        );
    }
    builder.into_sourcemap().to_json_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_lines_stay_empty() {
        let json = render_map(
            "app.js",
            &[("./a.js".into(), "a;\nb;"), ("./b.js".into(), "c;")],
            &[
                Mapping::line(1, 0, 0),
                Mapping::line(2, 0, 1),
                Mapping::line(4, 1, 0),
            ],
        );
        let map: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(map["version"], 3);
        assert_eq!(map["file"], "app.js");
        assert_eq!(map["sources"], serde_json::json!(["./a.js", "./b.js"]));
        assert_eq!(map["sourcesContent"][1], "c;");
        assert_eq!(map["mappings"], ";AAAA;AACA;;ACDA");
    }

    #[test]
    fn unknown_sources_are_skipped() {
        let json = render_map("x.js", &[("./a.js".into(), "")], &[Mapping::line(0, 3, 0)]);
        let map: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(map["mappings"], "");
    }
}
