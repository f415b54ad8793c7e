//! Duplicate detection tests for `doclib-detector`.
//!
//! Each test gets an isolated `TempDir`.

use std::fs;
use std::path::Path;

use doclib_detector::{detect_duplicates, Context, DetectError, PREVIEW_LEN};
use rstest::rstest;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helper
// ---------------------------------------------------------------------------

fn write(dir: &TempDir, rel: &str, content: &str) {
    let path = dir.path().join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    fs::write(path, content).expect("write fixture");
}

fn names(files: &[std::path::PathBuf], root: &Path) -> Vec<String> {
    files
        .iter()
        .map(|f| f.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
        .collect()
}

// ---------------------------------------------------------------------------
// Sentence context
// ---------------------------------------------------------------------------

#[test]
fn sentence_repeated_across_files_is_reported() {
    let dir = TempDir::new().unwrap();
    write(&dir, "a.md", "Install the tool first. Then configure it.\n");
    write(&dir, "guide/b.md", "Some intro.\n\ninstall the tool, first!\n");

    let detection = detect_duplicates(dir.path(), ".md", "..", Context::Sentence).expect("detect");

    assert_eq!(detection.documents, 2);
    assert_eq!(detection.findings.len(), 1);
    let finding = &detection.findings[0];
    assert_eq!(finding.occurrences, 2);
    assert_eq!(names(&finding.files, dir.path()), vec!["a.md", "guide/b.md"]);
    assert_eq!(finding.preview, "Install the tool first.");
}

#[test]
fn fragments_occurring_once_are_ignored() {
    let dir = TempDir::new().unwrap();
    write(&dir, "a.md", "Alpha sentence.\n");
    write(&dir, "b.md", "Beta sentence.\n");

    let detection = detect_duplicates(dir.path(), ".md", "..", Context::Sentence).unwrap();
    assert!(detection.findings.is_empty());
}

#[test]
fn repeat_within_one_file_lists_the_file_once() {
    let dir = TempDir::new().unwrap();
    write(&dir, "a.md", "Same here.\n\nSame here.\n");

    let detection = detect_duplicates(dir.path(), ".md", "..", Context::Sentence).unwrap();
    assert_eq!(detection.findings.len(), 1);
    assert_eq!(detection.findings[0].occurrences, 2);
    assert_eq!(detection.findings[0].files.len(), 1);
}

#[rstest]
#[case(".. only: abc\n\n.. only: abc\n")]
#[case("- item one\n\n- item one\n")]
#[case("# Title\n\n# Title\n")]
fn fragments_not_starting_alphanumeric_are_skipped(#[case] text: &str) {
    let dir = TempDir::new().unwrap();
    write(&dir, "a.md", text);

    let detection = detect_duplicates(dir.path(), ".md", "..", Context::Sentence).unwrap();
    assert!(detection.findings.is_empty());
}

#[test]
fn repeated_directives_are_not_duplicated_prose() {
    let dir = TempDir::new().unwrap();
    write(&dir, "a.md", "Alpha text.\n\n.. only: abc xyz\n.. dl:version 2\n");
    write(&dir, "b.md", ".. only: abc xyz\nBeta text.\n\n.. dl:version 2\n");

    for context in [Context::Sentence, Context::Paragraph] {
        let detection = detect_duplicates(dir.path(), ".md", "..", context).unwrap();
        assert!(detection.findings.is_empty(), "{context}: {:?}", detection.findings);
    }
}

#[test]
fn preview_is_capped() {
    let dir = TempDir::new().unwrap();
    let long = "This sentence is considerably longer than the preview allows.\n";
    write(&dir, "a.md", long);
    write(&dir, "b.md", long);

    let detection = detect_duplicates(dir.path(), ".md", "..", Context::Sentence).unwrap();
    assert_eq!(detection.findings[0].preview.chars().count(), PREVIEW_LEN);
}

#[test]
fn other_formats_are_not_read() {
    let dir = TempDir::new().unwrap();
    write(&dir, "a.md", "Shared line.\n");
    write(&dir, "b.txt", "Shared line.\n");

    let detection = detect_duplicates(dir.path(), ".md", "..", Context::Sentence).unwrap();
    assert_eq!(detection.documents, 1);
    assert!(detection.findings.is_empty());
}

// ---------------------------------------------------------------------------
// Paragraph context
// ---------------------------------------------------------------------------

#[test]
fn paragraph_context_needs_whole_paragraph_match() {
    let dir = TempDir::new().unwrap();
    write(&dir, "a.md", "One. Two.\n\nThree.\n");
    write(&dir, "b.md", "One.\nTwo.\n\nThree and more.\n");

    let detection = detect_duplicates(dir.path(), ".md", "..", Context::Paragraph).unwrap();
    assert_eq!(detection.findings.len(), 1);
    assert_eq!(detection.findings[0].preview, "One. Two.");
}

// ---------------------------------------------------------------------------
// Errors and output
// ---------------------------------------------------------------------------

#[test]
fn missing_root_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = detect_duplicates(&dir.path().join("nope"), ".md", "..", Context::Sentence).unwrap_err();
    assert!(matches!(err, DetectError::MissingRoot { .. }));
}

#[test]
fn detection_serializes_lowercase_enums() {
    let dir = TempDir::new().unwrap();
    write(&dir, "a.md", "Shared.\n");
    write(&dir, "b.md", "Shared.\n");

    let detection = detect_duplicates(dir.path(), ".md", "..", Context::Paragraph).unwrap();
    let json = serde_json::to_value(&detection).unwrap();
    assert_eq!(json["target"], "duplicate");
    assert_eq!(json["context"], "paragraph");
    assert_eq!(json["findings"][0]["occurrences"], 2);
}
