//! Output filename templates.
//!
//! Supported placeholders: `[name]`, `[id]`, `[ext]`, `[hash]`,
//! `[contenthash]` and the truncating forms `[hash:N]` / `[contenthash:N]`.
//! Bare `[hash]` is cut to the configured hash length.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder '[{0}]' in filename template")]
    UnknownPlaceholder(String),

    #[error("invalid hash length in '[{0}]'")]
    InvalidLength(String),

    #[error("unterminated placeholder in filename template '{0}'")]
    Unterminated(String),
}

#[derive(Debug, Clone, Copy)]
pub struct FilenameParams<'a> {
    pub name: &'a str,
    pub id: &'a str,
    /// Extension without the dot
    pub ext: &'a str,
    /// Full hex digest; truncated while rendering
    pub hash: &'a str,
    /// Length used for `[hash]` without an explicit length
    pub hash_length: usize,
}

pub fn render_filename(template: &str, params: &FilenameParams<'_>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len() + params.hash_length);
    let mut rest = template;
    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after
            .find(']')
            .ok_or_else(|| TemplateError::Unterminated(template.to_string()))?;
        let token = &after[..close];
        out.push_str(&expand(token, params)?);
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn expand(token: &str, params: &FilenameParams<'_>) -> Result<String, TemplateError> {
    let (key, length) = match token.split_once(':') {
        Some((key, length)) => {
            let length: usize = length
                .parse()
                .map_err(|_| TemplateError::InvalidLength(token.to_string()))?;
            if length == 0 {
                return Err(TemplateError::InvalidLength(token.to_string()));
            }
            (key, Some(length))
        }
        None => (token, None),
    };

    match (key, length) {
        ("name", None) => Ok(params.name.to_string()),
        ("id", None) => Ok(params.id.to_string()),
        ("ext", None) => Ok(params.ext.to_string()),
        ("hash" | "contenthash", length) => {
            let length = length.unwrap_or(params.hash_length).min(params.hash.len());
            Ok(params.hash[..length].to_string())
        }
        _ => Err(TemplateError::UnknownPlaceholder(token.to_string())),
    }
}

/// URL under which an emitted file is served.
pub fn public_url(public_path: &str, file_name: &str) -> String {
    if public_path.is_empty() {
        return file_name.to_string();
    }
    format!("{}/{}", public_path.trim_end_matches('/'), file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> FilenameParams<'static> {
        FilenameParams {
            name: "app",
            id: "0",
            ext: "js",
            hash: "0123456789abcdef0123",
            hash_length: 16,
        }
    }

    #[test]
    fn default_chunk_template() {
        assert_eq!(
            render_filename("[name].[hash].js", &params()).unwrap(),
            "app.0123456789abcdef.js"
        );
    }

    #[test]
    fn explicit_lengths_and_aliases() {
        assert_eq!(
            render_filename("[id]-[name].[contenthash:8].[ext]", &params()).unwrap(),
            "0-app.01234567.js"
        );
        assert_eq!(
            render_filename("[hash:99]", &params()).unwrap(),
            "0123456789abcdef0123"
        );
    }

    #[test]
    fn public_urls_join_with_one_slash() {
        assert_eq!(public_url("", "logo.png"), "logo.png");
        assert_eq!(public_url("/static/", "logo.png"), "/static/logo.png");
        assert_eq!(public_url("https://cdn.test", "a.js"), "https://cdn.test/a.js");
    }

    #[test]
    fn bad_placeholders_are_errors() {
        assert_eq!(
            render_filename("[chunk].js", &params()),
            Err(TemplateError::UnknownPlaceholder("chunk".into()))
        );
        assert!(matches!(
            render_filename("[hash:x].js", &params()),
            Err(TemplateError::InvalidLength(_))
        ));
        assert!(matches!(
            render_filename("[name.js", &params()),
            Err(TemplateError::Unterminated(_))
        ));
    }
}
