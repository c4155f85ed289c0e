//! Result sink - append-only JSONL stream
//!
//! One JSON object per line, flushed after every write so a crash mid-run
//! loses at most the line being written. Opened in append mode: prior
//! runs' output is preserved, nothing is ever rewritten or deduplicated.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::graph::OutputRecord;

pub struct JsonlSink {
    file: File,
    path: PathBuf,
}

impl JsonlSink {
    /// Open (or create) the output stream in append mode.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open output stream: {:?}", path))?;

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and flush it.
    pub fn write(&mut self, record: &OutputRecord) -> Result<()> {
        let line = serde_json::to_string(record).context("Failed to encode output record")?;
        writeln!(self.file, "{}", line)
            .with_context(|| format!("Failed to append to output stream: {:?}", self.path))?;
        self.file
            .flush()
            .with_context(|| format!("Failed to flush output stream: {:?}", self.path))?;
        Ok(())
    }
}

/// Count the lines already present in an output stream, for status
/// reporting. A missing file counts as zero.
pub fn count_lines(path: &Path) -> Result<usize> {
    if !path.exists() {
        return Ok(0);
    }
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read output stream: {:?}", path))?;
    Ok(body.lines().filter(|l| !l.trim().is_empty()).count())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EntityRelation;
    use serde_json::json;
    use tempfile::tempdir;

    fn relation() -> EntityRelation {
        EntityRelation {
            subject: "pemerintah".to_string(),
            subject_type: "PEMERINTAHAN".to_string(),
            relation: "Mengumumkan".to_string(),
            object: "insentif pajak".to_string(),
            object_type: "KONSEP".to_string(),
        }
    }

    #[test]
    fn writes_one_json_object_per_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.jsonl");

        let mut sink = JsonlSink::open(&path).unwrap();
        sink.write(&OutputRecord::entity(relation(), "d1")).unwrap();
        sink.write(&OutputRecord::error("parsing error", "d2", json!([])))
            .unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in &lines {
            serde_json::from_str::<OutputRecord>(line).unwrap();
        }
    }

    #[test]
    fn reopening_appends_instead_of_truncating() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.jsonl");

        JsonlSink::open(&path)
            .unwrap()
            .write(&OutputRecord::entity(relation(), "run-1"))
            .unwrap();
        JsonlSink::open(&path)
            .unwrap()
            .write(&OutputRecord::entity(relation(), "run-2"))
            .unwrap();

        assert_eq!(count_lines(&path).unwrap(), 2);
    }

    #[test]
    fn count_lines_on_missing_file_is_zero() {
        let dir = tempdir().unwrap();
        assert_eq!(count_lines(&dir.path().join("nope.jsonl")).unwrap(), 0);
    }
}
