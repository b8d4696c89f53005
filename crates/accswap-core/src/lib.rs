//! Foundational low-level utilities shared across accswap crates.
//!
//! Provides atomic file-write helpers, the durable JSON document store used
//! for registry and backup persistence, timestamp helpers, and size-based
//! log rotation for the persistent tool log.

pub mod atomic_io;
pub mod document_store;
pub mod log_rotation;
pub mod time_utils;

pub use atomic_io::{restrict_dir_permissions, restrict_permissions, write_text_atomic};
pub use document_store::{read_document, write_document, DocumentState};
pub use log_rotation::{rotate_if_oversized, LogRotationPolicy};
pub use time_utils::{current_unix_timestamp, utc_timestamp};

#[cfg(test)]
mod tests {
    use std::fs::read_to_string;

    use serde_json::json;

    use super::*;

    #[test]
    fn utc_timestamp_has_iso_shape() {
        let stamp = utc_timestamp();
        assert_eq!(stamp.len(), 20);
        assert!(stamp.ends_with('Z'));
        assert_eq!(&stamp[4..5], "-");
        assert_eq!(&stamp[10..11], "T");
    }

    #[test]
    fn write_text_atomic_writes_content() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("sample.txt");
        write_text_atomic(&path, "hello world").expect("write");
        let contents = read_to_string(&path).expect("read");
        assert_eq!(contents, "hello world");
    }

    #[test]
    fn write_text_atomic_creates_missing_parents() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("nested").join("deeper").join("sample.txt");
        write_text_atomic(&path, "nested").expect("write");
        assert_eq!(read_to_string(&path).expect("read"), "nested");
    }

    #[test]
    fn document_round_trip_is_identity() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("registry.json");
        let document = json!({
            "activeAccountNumber": 2,
            "sequence": [1, 2],
            "accounts": {"1": {"email": "a@example.com"}},
        });
        write_document(&path, &document).expect("write");
        match read_document(&path) {
            DocumentState::Found(read_back) => assert_eq!(read_back, document),
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn absent_document_reads_as_absent() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("missing.json");
        assert!(matches!(read_document(&path), DocumentState::Absent));
    }

    #[test]
    fn malformed_document_reads_as_corrupt() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("broken.json");
        std::fs::write(&path, "{not json").expect("seed");
        assert!(matches!(read_document(&path), DocumentState::Corrupt));
    }

    #[cfg(unix)]
    #[test]
    fn written_documents_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("secret.json");
        write_document(&path, &json!({"token": "t"})).expect("write");
        let mode = std::fs::metadata(&path).expect("stat").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
