//! Built-in transform steps.

use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bale_graph::SideArtifact;

use super::{StepContext, StepError, StepOutput, TransformStep};
use crate::hash::digest;
use crate::link::quote;
use crate::template::{public_url, render_filename, FilenameParams};

fn utf8(input: Vec<u8>) -> Result<String, StepError> {
    String::from_utf8(input)
        .map_err(|e| StepError::new(format!("invalid UTF-8 at byte {}", e.utf8_error().valid_up_to())))
}

/// Validates UTF-8 and normalizes line endings to `\n`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptStep;

impl TransformStep for ScriptStep {
    fn name(&self) -> &str {
        "script"
    }

    fn apply(&self, input: Vec<u8>, _ctx: &StepContext<'_>) -> Result<StepOutput, StepError> {
        let text = utf8(input)?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text.as_str());
        let normalized = if text.contains('\r') {
            text.replace("\r\n", "\n").replace('\r', "\n")
        } else {
            text.to_string()
        };
        Ok(StepOutput::new(normalized))
    }
}

/// Exports a JSON document as the module value.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonStep;

impl TransformStep for JsonStep {
    fn name(&self) -> &str {
        "json"
    }

    fn apply(&self, input: Vec<u8>, _ctx: &StepContext<'_>) -> Result<StepOutput, StepError> {
        serde_json::from_slice::<serde_json::Value>(&input)
            .map_err(|e| StepError::new(format!("invalid JSON: {e}")))?;
        let text = utf8(input)?;
        Ok(StepOutput::new(format!("module.exports = {};", text.trim())))
    }
}

/// Inlines files up to `limit` bytes as data URLs and emits larger ones.
///
/// The limit is checked against the size of the file as read, not of the
/// bytes earlier steps produced. Without a step limit the rule's
/// `inline_limit` applies; with neither, every file is emitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssetStep {
    pub limit: Option<u64>,
}

impl TransformStep for AssetStep {
    fn name(&self) -> &str {
        "asset"
    }

    fn apply(&self, input: Vec<u8>, ctx: &StepContext<'_>) -> Result<StepOutput, StepError> {
        let limit = self.limit.or_else(|| ctx.rule.and_then(|rule| rule.inline_limit));
        let path = ctx.id.as_path();

        if limit.is_some_and(|limit| ctx.raw_len <= limit) {
            let url = format!("data:{};base64,{}", mime_type(path), STANDARD.encode(&input));
            return Ok(StepOutput::new(format!("module.exports = {};", quote(&url))));
        }

        let hash = digest(ctx.caps.hash, &input);
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "asset".to_string());
        let ext = path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_name = render_filename(
            &ctx.output.asset_filename,
            &FilenameParams {
                name: &stem,
                id: ctx.key,
                ext: &ext,
                hash: &hash,
                hash_length: ctx.output.hash_length,
            },
        )
        .map_err(|e| StepError::new(e.to_string()))?;

        let url = public_url(&ctx.output.public_path, &file_name);
        Ok(
            StepOutput::new(format!("module.exports = {};", quote(&url))).with_artifact(
                SideArtifact::Asset {
                    file_name,
                    bytes: Arc::from(input),
                },
            ),
        )
    }
}

fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "css" => "text/css",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Appends a `<style>` element when the module is evaluated.
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleInjectStep;

impl TransformStep for StyleInjectStep {
    fn name(&self) -> &str {
        "style-inject"
    }

    fn apply(&self, input: Vec<u8>, ctx: &StepContext<'_>) -> Result<StepOutput, StepError> {
        let css = utf8(input)?;
        let code = format!(
            "var css = {css};\n\
             if (typeof document !== \"undefined\") {{\n\
             \x20 var style = document.createElement(\"style\");\n\
             \x20 style.setAttribute(\"data-bale\", {key});\n\
             \x20 style.appendChild(document.createTextNode(css));\n\
             \x20 document.head.appendChild(style);\n\
             }}\n\
             module.exports = css;",
            css = quote(&css),
            key = quote(ctx.key),
        );
        Ok(StepOutput::new(code))
    }
}

/// Routes stylesheet text to the owning chunk's CSS file.
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleExtractStep;

impl TransformStep for StyleExtractStep {
    fn name(&self) -> &str {
        "style-extract"
    }

    fn apply(&self, input: Vec<u8>, _ctx: &StepContext<'_>) -> Result<StepOutput, StepError> {
        let css = utf8(input)?;
        Ok(StepOutput::new("module.exports = {};").with_artifact(SideArtifact::Stylesheet { css }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bale_config::{BundleOptions, Mode, OutputOptions};
    use bale_graph::ModuleId;
    use serde_json::Value;

    static NULL: Value = Value::Null;

    struct Fixture {
        id: ModuleId,
        caps: bale_config::ModeCapabilities,
        output: OutputOptions,
    }

    impl Fixture {
        fn new(path: &str, mode: Mode) -> Self {
            Self {
                id: ModuleId::new(path).unwrap(),
                caps: BundleOptions::default().with_mode(mode).capabilities(),
                output: OutputOptions::default(),
            }
        }

        fn ctx(&self) -> StepContext<'_> {
            self.ctx_for(&[])
        }

        fn ctx_for(&self, raw: &[u8]) -> StepContext<'_> {
            StepContext {
                id: &self.id,
                key: "./src/x",
                root: Path::new("/app"),
                caps: &self.caps,
                output: &self.output,
                rule: None,
                options: &NULL,
                raw_len: raw.len() as u64,
            }
        }
    }

    #[test]
    fn script_normalizes_line_endings() {
        let f = Fixture::new("/app/a.js", Mode::Development);
        let out = ScriptStep.apply(b"\xef\xbb\xbfa();\r\nb();\r".to_vec(), &f.ctx()).unwrap();
        assert_eq!(out.bytes, b"a();\nb();\n");

        let err = ScriptStep.apply(vec![b'a', 0xff], &f.ctx()).unwrap_err();
        assert!(err.0.contains("byte 1"));
    }

    #[test]
    fn json_becomes_module_exports() {
        let f = Fixture::new("/app/data.json", Mode::Development);
        let out = JsonStep.apply(b"{\"a\": [1, 2]}\n".to_vec(), &f.ctx()).unwrap();
        assert_eq!(out.bytes, b"module.exports = {\"a\": [1, 2]};");
    }

    #[test]
    fn small_assets_are_inlined() {
        let f = Fixture::new("/app/logo.png", Mode::Development);
        let out = AssetStep { limit: Some(8) }
            .apply(vec![1, 2, 3], &f.ctx_for(&[1, 2, 3]))
            .unwrap();
        assert_eq!(out.bytes, b"module.exports = \"data:image/png;base64,AQID\";");
        assert!(out.artifacts.is_empty());
    }

    #[test]
    fn large_assets_are_emitted_with_content_names() {
        let f = Fixture::new("/app/logo.png", Mode::Production);
        let bytes = vec![7u8; 64];
        let out = AssetStep { limit: Some(8) }
            .apply(bytes.clone(), &f.ctx_for(&bytes))
            .unwrap();

        let expected = format!("logo.{}.png", &crate::hash::hash_content(&bytes)[..8]);
        assert_eq!(
            String::from_utf8(out.bytes).unwrap(),
            format!("module.exports = \"{expected}\";")
        );
        match &out.artifacts[..] {
            [SideArtifact::Asset { file_name, bytes: emitted }] => {
                assert_eq!(file_name, &expected);
                assert_eq!(&emitted[..], &bytes[..]);
            }
            other => panic!("unexpected artifacts: {other:?}"),
        }
    }

    #[test]
    fn inline_limit_uses_the_size_as_read() {
        let f = Fixture::new("/app/icon.svg", Mode::Development);
        let raw = vec![b'x'; 80];
        // An earlier step doubled the bytes; the file on disk is still small.
        let grown = vec![b'x'; 160];
        let out = AssetStep { limit: Some(100) }
            .apply(grown.clone(), &f.ctx_for(&raw))
            .unwrap();
        let code = String::from_utf8(out.bytes).unwrap();
        assert!(code.starts_with("module.exports = \"data:image/svg+xml;base64,"));
        assert!(out.artifacts.is_empty());

        let shrunk = vec![b'x'; 20];
        let big = vec![b'x'; 200];
        let out = AssetStep { limit: Some(100) }
            .apply(shrunk, &f.ctx_for(&big))
            .unwrap();
        assert_eq!(out.artifacts.len(), 1);
    }

    #[test]
    fn inject_quotes_css_and_tags_the_element() {
        let f = Fixture::new("/app/a.css", Mode::Development);
        let out = StyleInjectStep
            .apply(b"a::after { content: \"\\\"\"; }".to_vec(), &f.ctx())
            .unwrap();
        let code = String::from_utf8(out.bytes).unwrap();
        assert!(code.starts_with("var css = \"a::after { content: \\\"\\\\\\\"\\\"; }\";"));
        assert!(code.contains("style.setAttribute(\"data-bale\", \"./src/x\");"));
        assert!(code.ends_with("module.exports = css;"));
    }
}
