use anyhow::{Context, Result};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use time::format_description::well_known::Rfc3339;

pub fn ensure_dir(p: &Path) -> Result<()> {
    std::fs::create_dir_all(p).with_context(|| format!("create_dir_all {}", p.display()))
}

pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

pub fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Reduce a file name to something safe inside a quoted
/// `Content-Disposition` filename parameter.
pub fn header_safe_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' | '/' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    let cleaned = cleaned.trim().to_string();
    if cleaned.is_empty() {
        "download".to_string()
    } else {
        cleaned
    }
}

/// RFC 5987 `attr-char` minus the alphanumerics.
const FILENAME_STAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// `attachment` disposition for `name`. Names that do not survive
/// [`header_safe_filename`] unchanged also get a `filename*` parameter
/// carrying the exact UTF-8 name.
pub fn content_disposition(name: &str) -> String {
    let safe = header_safe_filename(name);
    if safe == name || name.trim().is_empty() {
        return format!("attachment; filename=\"{safe}\"");
    }
    format!(
        "attachment; filename=\"{safe}\"; filename*=UTF-8''{}",
        utf8_percent_encode(name, FILENAME_STAR)
    )
}

/// File stem of an uploaded name, ignoring any directory components a
/// browser may have sent along.
pub fn upload_stem(file_name: &str) -> Option<String> {
    let base = file_name.rsplit(['/', '\\']).next()?;
    let stem = Path::new(base).file_stem()?.to_str()?.trim();
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_are_made_header_safe() {
        assert_eq!(header_safe_filename("report.pdf"), "report.pdf");
        assert_eq!(header_safe_filename("a\"b\\c/d.pdf"), "a_b_c_d.pdf");
        assert_eq!(header_safe_filename("März.pdf"), "M_rz.pdf");
        assert_eq!(header_safe_filename("  "), "download");
    }

    #[test]
    fn non_ascii_names_get_an_encoded_filename_star() {
        assert_eq!(
            content_disposition("report.pdf"),
            "attachment; filename=\"report.pdf\""
        );
        assert_eq!(
            content_disposition("März.pdf"),
            "attachment; filename=\"M_rz.pdf\"; filename*=UTF-8''M%C3%A4rz.pdf"
        );
        assert_eq!(
            content_disposition("Q3 \"final\".pdf"),
            "attachment; filename=\"Q3 _final_.pdf\"; filename*=UTF-8''Q3%20%22final%22.pdf"
        );
    }

    #[test]
    fn upload_stem_drops_directories() {
        assert_eq!(upload_stem("dir/sub/report.docx").as_deref(), Some("report"));
        assert_eq!(upload_stem("C:\\x\\deck.pptx").as_deref(), Some("deck"));
        assert_eq!(upload_stem(""), None);
    }
}
