//! Document extraction: turns an uploaded document into plain text.
//! PDF via `pdf-extract`; anything else is treated as UTF-8 text.

use std::sync::LazyLock;

use regex::Regex;

use crate::errors::EvalError;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex"));

/// Extracts and normalizes text from document bytes, dispatching on the file
/// extension. An unreadable document or one that yields no text is an
/// `ExtractionError`.
pub fn extract_text(content: &[u8], file_name: &str) -> Result<String, EvalError> {
    let raw = match extension(file_name).as_deref() {
        Some("pdf") => pdf_extract::extract_text_from_mem(content)
            .map_err(|e| EvalError::Extraction(format!("unreadable pdf '{file_name}': {e}")))?,
        _ => String::from_utf8_lossy(content).into_owned(),
    };

    let cleaned = clean_text(&raw);
    if cleaned.is_empty() {
        return Err(EvalError::Extraction(format!(
            "document '{file_name}' produced no text"
        )));
    }
    Ok(cleaned)
}

fn extension(file_name: &str) -> Option<String> {
    file_name.rsplit_once('.').map(|(_, ext)| ext.to_lowercase())
}

/// Collapses runs of whitespace but keeps line breaks, which downstream
/// analyzers use for name and title heuristics.
fn clean_text(text: &str) -> String {
    text.lines()
        .map(|line| WHITESPACE.replace_all(line.trim(), " ").into_owned())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
