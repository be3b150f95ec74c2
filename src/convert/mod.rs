/*!
 * Content Conversion
 * Stateless text transforms from source formats to printable HTML
 */

mod json;
mod markdown;
mod template;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Conversion result type
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Conversion errors; all are raised before any engine activity
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    #[error("unsupported document format: {0:?}")]
    UnsupportedFormat(String),

    #[error("document content is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("template references unknown field: {0:?}")]
    UnknownField(String),

    #[error("template placeholder opened at byte {0} is never closed")]
    UnterminatedPlaceholder(usize),
}

/// Source formats accepted by the converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Html,
    Markdown,
    Json,
    Template,
}

impl FromStr for DocumentFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "html" => Ok(Self::Html),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "template" => Ok(Self::Template),
            other => Err(ConvertError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Html => "html",
            Self::Markdown => "markdown",
            Self::Json => "json",
            Self::Template => "template",
        };
        f.write_str(name)
    }
}

/// Presentation knobs honored by the document wrapper
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Document title; falls back to "Document"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Extra CSS appended after the base print styles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stylesheet: Option<String>,
}

/// Convert source content in the named format into a complete printable
/// HTML document. Unknown formats are a hard error, not a fallback.
pub fn render_to_html(
    format: &str,
    content: &str,
    data: Option<&Value>,
    options: &RenderOptions,
) -> ConvertResult<String> {
    let format = DocumentFormat::from_str(format)?;
    let body = match format {
        DocumentFormat::Html => content.to_string(),
        DocumentFormat::Markdown => markdown::to_html(content),
        DocumentFormat::Json => json::to_html(content)?,
        DocumentFormat::Template => template::expand(content, data)?,
    };
    Ok(wrap_document(&body, options))
}

/// Base print styles: readable defaults that individual documents can
/// override through `RenderOptions::stylesheet`
const BASE_STYLES: &str = "\
body{font-family:Helvetica,Arial,sans-serif;font-size:12px;color:#1a1a1a;margin:24px}\
table{border-collapse:collapse;width:100%}\
th,td{border:1px solid #ccc;padding:4px 8px;text-align:left}\
th{background:#f0f0f0}\
h1,h2,h3{page-break-after:avoid}";

fn wrap_document(body: &str, options: &RenderOptions) -> String {
    let title = options.title.as_deref().unwrap_or("Document");
    let extra = options.stylesheet.as_deref().unwrap_or("");
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>{}{}</style>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(title),
        BASE_STYLES,
        extra,
        body
    )
}

/// Minimal HTML escaping for text interpolated into markup
pub(crate) fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
