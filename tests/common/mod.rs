#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use booking_audit::{Document, data::document_from_json};
use chrono::{DateTime, TimeZone, Utc};
use tempfile::{TempDir, tempdir};

/// Builds a document from a `serde_json::json!` literal.
pub fn doc(raw: serde_json::Value) -> Document {
    document_from_json(raw).expect("test literal is an object")
}

pub fn docs(raws: Vec<serde_json::Value>) -> Vec<Document> {
    raws.into_iter().map(doc).collect()
}

/// Fixed reference instant shared by the window tests.
pub fn reference_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 8, 12, 0, 0)
        .single()
        .expect("valid reference instant")
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}
