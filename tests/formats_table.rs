use quack_convert::formats::{
    extension_of, known_formats, mime_for, normalize_format, validate_format, FALLBACK_MIME,
};
use std::collections::BTreeMap;

#[test]
fn pdf_maps_to_application_pdf() {
    assert_eq!(mime_for("pdf", &BTreeMap::new()), "application/pdf");
}

#[test]
fn unknown_format_falls_back_to_octet_stream() {
    assert_eq!(mime_for("xyz", &BTreeMap::new()), FALLBACK_MIME);
    assert_eq!(FALLBACK_MIME, "application/octet-stream");
}

#[test]
fn overrides_win_over_static_table() {
    let mut overrides = BTreeMap::new();
    overrides.insert("pdf".to_string(), "application/x-pdf".to_string());
    overrides.insert("md".to_string(), "text/markdown".to_string());
    assert_eq!(mime_for("pdf", &overrides), "application/x-pdf");
    assert_eq!(mime_for("md", &overrides), "text/markdown");

    let table = known_formats(&overrides);
    assert_eq!(table["md"], "text/markdown");
    assert_eq!(table["docx"], mime_for("docx", &BTreeMap::new()));
}

#[test]
fn tags_are_lowercased_and_trimmed() {
    assert_eq!(normalize_format(" DOCX "), "docx");
    assert_eq!(normalize_format(".PDF"), "pdf");
}

#[test]
fn tags_with_path_characters_are_rejected() {
    assert!(validate_format("pdf").is_ok());
    assert!(validate_format("../etc").is_err());
    assert!(validate_format("pdf:writer").is_err());
    assert!(validate_format("").is_err());
    assert!(validate_format("a_very_long_format_tag").is_err());
}

#[test]
fn extension_comes_from_upload_name() {
    assert_eq!(extension_of("Report.DOCX").as_deref(), Some("docx"));
    assert_eq!(extension_of("archive.tar.gz").as_deref(), Some("gz"));
    assert_eq!(extension_of("README"), None);
}
