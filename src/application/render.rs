//! Note document rendering.
//!
//! The publishing client sends an already-rendered HTML body; the server
//! only wraps it into the page template.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Deserialize;

use super::error::AppError;

const BUILTIN_TEMPLATE: &str = include_str!("../../templates/note.html");

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"TEMPLATE_(?:OG_TITLE|META_DESCRIPTION|NOTE_CONTENT|TITLE)")
        .expect("placeholder pattern is valid")
});

/// The `template` object of a create-note request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateFields {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub encrypted: bool,
}

#[derive(Debug, Clone)]
pub struct NoteTemplate {
    html: String,
}

impl Default for NoteTemplate {
    fn default() -> Self {
        Self::from_html(BUILTIN_TEMPLATE)
    }
}

impl NoteTemplate {
    pub fn from_html(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    /// Read the template from `path`, or use the built-in one.
    pub fn load(path: Option<&Path>) -> std::io::Result<Self> {
        match path {
            Some(path) => std::fs::read_to_string(path).map(Self::from_html),
            None => Ok(Self::default()),
        }
    }

    /// Substitute every placeholder in one pass, so text inside the title or
    /// body is never re-expanded.
    pub fn cook(&self, fields: &TemplateFields) -> Result<String, AppError> {
        if fields.encrypted {
            return Err(AppError::EncryptedNoteUnsupported);
        }

        let title = escape_html(&fields.title);
        let description = escape_html(&fields.description);
        let rendered = PLACEHOLDER.replace_all(&self.html, |captures: &Captures<'_>| {
            match &captures[0] {
                "TEMPLATE_TITLE" => title.clone(),
                "TEMPLATE_OG_TITLE" => format!(r#"<meta property="og:title" content="{title}">"#),
                "TEMPLATE_META_DESCRIPTION" => format!(
                    r#"<meta name="description" content="{description}" property="og:description">"#
                ),
                _ => fields.content.clone(),
            }
        });
        Ok(rendered.into_owned())
    }
}

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(title: &str, content: &str) -> TemplateFields {
        TemplateFields {
            title: title.to_string(),
            description: "A \"quoted\" summary".to_string(),
            content: content.to_string(),
            encrypted: false,
        }
    }

    #[test]
    fn substitutes_all_placeholders() {
        let html = NoteTemplate::default()
            .cook(&fields("Hello World", "<p>body</p>"))
            .expect("cook");
        assert!(html.contains("<title>Hello World</title>"));
        assert!(html.contains(r#"<meta property="og:title" content="Hello World">"#));
        assert!(html.contains(r#"content="A &quot;quoted&quot; summary""#));
        assert!(html.contains("<p>body</p>"));
        assert!(!html.contains("TEMPLATE_"));
    }

    #[test]
    fn title_is_escaped_but_body_is_verbatim() {
        let template = NoteTemplate::from_html("<title>TEMPLATE_TITLE</title>TEMPLATE_NOTE_CONTENT");
        let html = template
            .cook(&fields("<b>Tom & Jerry</b>", "<em>TEMPLATE_TITLE</em>"))
            .expect("cook");
        assert_eq!(
            html,
            "<title>&lt;b&gt;Tom &amp; Jerry&lt;/b&gt;</title><em>TEMPLATE_TITLE</em>"
        );
    }

    #[test]
    fn encrypted_notes_are_rejected() {
        let mut fields = fields("Secret", "ciphertext");
        fields.encrypted = true;
        assert!(matches!(
            NoteTemplate::default().cook(&fields),
            Err(AppError::EncryptedNoteUnsupported)
        ));
    }
}
