//! HTML document generation from the manifest.
//!
//! Templates use Jinja2 syntax (minijinja) with HTML auto-escaping. The
//! context carries `title`, `lang`, `scripts`, `styles`, `entries` and every
//! configured variable; built-in keys win over variables of the same name.

use std::collections::BTreeMap;

use bale_config::HtmlOptions;
use indexmap::IndexSet;
use minijinja::{AutoEscape, Environment, Value};
use thiserror::Error;

use crate::emit::Manifest;
use crate::template::public_url;

pub const DEFAULT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="{{ lang }}">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{{ title }}</title>
{%- for href in styles %}
  <link rel="stylesheet" href="{{ href }}">
{%- endfor %}
</head>
<body>
{%- for src in scripts %}
  <script src="{{ src }}"></script>
{%- endfor %}
</body>
</html>
"#;

const DEFAULT_TITLE: &str = "Bale App";

#[derive(Debug, Error)]
pub enum HtmlError {
    #[error("HTML options name entry '{0}', which is not an entry chunk")]
    UnknownEntry(String),

    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),
}

/// Script and stylesheet URLs for the selected entries, in load order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentAssets {
    pub entries: Vec<String>,
    pub scripts: Vec<String>,
    pub styles: Vec<String>,
}

impl DocumentAssets {
    pub fn collect(manifest: &Manifest, only: Option<&[String]>) -> Result<Self, HtmlError> {
        let entries: Vec<String> = match only {
            Some(names) => {
                for name in names {
                    if !manifest.entrypoints.contains_key(name) {
                        return Err(HtmlError::UnknownEntry(name.clone()));
                    }
                }
                names.to_vec()
            }
            None => manifest.entrypoints.keys().cloned().collect(),
        };

        let mut needed: IndexSet<&str> = IndexSet::new();
        for name in &entries {
            if let Some(chunk) = manifest.chunks.get(name) {
                needed.extend(chunk.requires.iter().map(String::as_str));
            }
            needed.insert(name);
        }

        // Manifest chunk order is already runtime, shared, vendors, entries.
        let mut scripts = Vec::new();
        let mut styles = Vec::new();
        for (name, chunk) in &manifest.chunks {
            if !needed.contains(name.as_str()) {
                continue;
            }
            scripts.push(public_url(&manifest.public_path, &chunk.file));
            if let Some(css) = &chunk.css {
                styles.push(public_url(&manifest.public_path, css));
            }
        }
        Ok(Self {
            entries,
            scripts,
            styles,
        })
    }
}

/// Render the document for `manifest`. `template` overrides the built-in one.
pub fn render_document(
    options: &HtmlOptions,
    manifest: &Manifest,
    template: Option<&str>,
) -> Result<String, HtmlError> {
    let assets = DocumentAssets::collect(manifest, options.chunks.as_deref())?;

    let mut env = Environment::new();
    env.set_auto_escape_callback(|_| AutoEscape::Html);
    env.add_template_owned(
        options.filename.clone(),
        template.unwrap_or(DEFAULT_TEMPLATE).to_string(),
    )?;

    let mut context: BTreeMap<String, Value> = options
        .variables
        .iter()
        .map(|(key, value)| (key.clone(), Value::from_serialize(value)))
        .collect();
    context.insert(
        "title".into(),
        Value::from(options.title.clone().unwrap_or_else(|| DEFAULT_TITLE.to_string())),
    );
    context.insert("lang".into(), Value::from(options.lang.clone()));
    context.insert("scripts".into(), urls(&assets.scripts));
    context.insert("styles".into(), urls(&assets.styles));
    context.insert("entries".into(), Value::from_serialize(&assets.entries));

    let rendered = env.get_template(&options.filename)?.render(context)?;
    Ok(rendered)
}

/// URLs are escaped for attribute context here and passed as safe strings,
/// so path separators stay readable.
fn urls(values: &[String]) -> Value {
    Value::from(
        values
            .iter()
            .map(|url| Value::from_safe_string(escape_attribute(url)))
            .collect::<Vec<_>>(),
    )
}

fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}
