//! Raw manifest ingestion and rendering
//!
//! Manifests are YAML streams; documents are separated by `---` lines.
//! JSON is accepted as well since it is valid YAML.

use serde_json::Value as JsonValue;

use crate::document::Document;
use crate::error::{CoreError, Result};

/// Longest fragment quoted in parse errors
const FRAGMENT_LEN: usize = 60;

/// Parse a multi-document manifest into documents
///
/// Empty and comment-only documents are skipped. The first malformed
/// document aborts parsing with a [`CoreError::Parse`] naming it.
pub fn parse_documents(manifest: &str) -> Result<Vec<Document>> {
    let mut documents = Vec::new();

    for (index, doc) in split_documents(manifest).into_iter().enumerate() {
        if is_blank(doc) {
            continue;
        }

        let parse_error = |message: String| CoreError::Parse {
            index,
            fragment: fragment_of(doc),
            message,
        };

        let value: JsonValue =
            serde_yaml::from_str(doc).map_err(|e| parse_error(e.to_string()))?;
        if value.is_null() {
            continue;
        }

        let document = Document::from_value(value).map_err(|e| match e {
            CoreError::InvalidDocument { message } => parse_error(message),
            other => parse_error(other.to_string()),
        })?;
        documents.push(document);
    }

    Ok(documents)
}

/// Render documents as a `---` separated YAML stream
pub fn render(documents: &[Document]) -> Result<String> {
    let rendered = documents
        .iter()
        .map(Document::to_yaml)
        .collect::<Result<Vec<_>>>()?;
    Ok(rendered.join("---\n"))
}

/// Split a stream on document separator lines
fn split_documents(manifest: &str) -> Vec<&str> {
    let mut documents = Vec::new();
    let mut start = 0;
    let mut offset = 0;

    for line in manifest.split_inclusive('\n') {
        let content = line.trim_end();
        if content == "---" || content == "..." {
            documents.push(&manifest[start..offset]);
            start = offset + line.len();
        } else if content.starts_with("--- ") {
            // Content after the marker opens the next document
            documents.push(&manifest[start..offset]);
            start = offset + "--- ".len();
        }
        offset += line.len();
    }
    documents.push(&manifest[start..]);

    documents
}

fn is_blank(doc: &str) -> bool {
    doc.lines()
        .all(|l| l.trim().is_empty() || l.trim().starts_with('#'))
}

/// Short excerpt identifying a document in error messages
pub(crate) fn fragment_of(doc: &str) -> String {
    let line = doc
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .unwrap_or_default();

    if line.chars().count() > FRAGMENT_LEN {
        let truncated: String = line.chars().take(FRAGMENT_LEN).collect();
        format!("{}...", truncated)
    } else {
        line.to_string()
    }
}
