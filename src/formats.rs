use anyhow::{anyhow, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub const FALLBACK_MIME: &str = "application/octet-stream";

const MIME_TABLE: &[(&str, &str)] = &[
    ("pdf", "application/pdf"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("odt", "application/vnd.oasis.opendocument.text"),
    ("rtf", "application/rtf"),
    ("txt", "text/plain"),
    ("html", "text/html"),
    ("xls", "application/vnd.ms-excel"),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    ("ods", "application/vnd.oasis.opendocument.spreadsheet"),
    ("csv", "text/csv"),
    ("ppt", "application/vnd.ms-powerpoint"),
    (
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    ("odp", "application/vnd.oasis.opendocument.presentation"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("svg", "image/svg+xml"),
    ("epub", "application/epub+zip"),
];

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9]{1,16}$").expect("static regex"))
}

pub fn normalize_format(raw: &str) -> String {
    raw.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Format tags end up in file names and on the converter's command line,
/// so only short alphanumeric tags are accepted.
pub fn validate_format(tag: &str) -> Result<()> {
    if tag_re().is_match(tag) {
        Ok(())
    } else {
        Err(anyhow!("invalid format tag: {tag:?}"))
    }
}

pub fn mime_for(tag: &str, overrides: &BTreeMap<String, String>) -> String {
    if let Some(m) = overrides.get(tag) {
        return m.clone();
    }
    MIME_TABLE
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, m)| (*m).to_string())
        .unwrap_or_else(|| FALLBACK_MIME.to_string())
}

/// The static table merged with configured overrides.
pub fn known_formats(overrides: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = MIME_TABLE
        .iter()
        .map(|(t, m)| ((*t).to_string(), (*m).to_string()))
        .collect();
    for (t, m) in overrides {
        out.insert(t.clone(), m.clone());
    }
    out
}

/// Extension of an uploaded file name, normalized like a format tag.
pub fn extension_of(file_name: &str) -> Option<String> {
    let ext = std::path::Path::new(file_name).extension()?.to_str()?;
    let ext = normalize_format(ext);
    if ext.is_empty() { None } else { Some(ext) }
}
