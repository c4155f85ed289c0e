//! Extraction checkpoint - durable resume cursor
//!
//! A single JSON record `{ "last_processed_index": n }` where `n` is the
//! number of fully processed articles, i.e. the offset the next run
//! resumes from. The file is overwritten after every article and removed
//! once the whole slice completes, so its presence alone means "resume".

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct Checkpoint {
    last_processed_index: usize,
}

pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the persisted cursor, or `start` when there is nothing to
    /// resume. A missing file means "start fresh"; an unreadable or
    /// malformed file is treated the same way but logged as a warning,
    /// since it usually means the previous run died mid-write.
    pub fn load(&self, start: usize) -> usize {
        if !self.path.exists() {
            return start;
        }

        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(
                    "Unreadable checkpoint {:?} ({}); starting from row {}",
                    self.path,
                    e,
                    start
                );
                return start;
            }
        };

        match serde_json::from_str::<Checkpoint>(&raw) {
            Ok(checkpoint) => {
                tracing::info!(
                    "Resuming extraction from global row {}",
                    checkpoint.last_processed_index + 1
                );
                checkpoint.last_processed_index
            }
            Err(e) => {
                tracing::warn!(
                    "Malformed checkpoint {:?} ({}); starting from row {}",
                    self.path,
                    e,
                    start
                );
                start
            }
        }
    }

    /// Overwrite the cursor. Durable before the next article starts: the
    /// file is written and flushed in one call, never buffered across
    /// articles.
    pub fn save(&self, last_processed_index: usize) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {:?}", parent))?;
            }
        }

        let checkpoint = Checkpoint {
            last_processed_index,
        };
        let body = serde_json::to_string_pretty(&checkpoint).context("Failed to encode checkpoint")?;
        std::fs::write(&self.path, body)
            .with_context(|| format!("Failed to write checkpoint: {:?}", self.path))?;
        Ok(())
    }

    /// Remove the cursor. Called only after every article in the slice
    /// reached a terminal state.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove checkpoint: {:?}", self.path))?;
            tracing::info!("Checkpoint file removed.");
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_starts_fresh() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("checkpoint.json"));
        assert_eq!(store.load(7), 7);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("checkpoint.json"));

        store.save(42).unwrap();
        assert_eq!(store.load(0), 42);

        // Overwrites, never appends.
        store.save(43).unwrap();
        assert_eq!(store.load(0), 43);
    }

    #[test]
    fn malformed_checkpoint_falls_back_to_start() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = CheckpointStore::new(&path);
        assert_eq!(store.load(3), 3);
    }

    #[test]
    fn clear_removes_the_file_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("checkpoint.json"));

        store.save(1).unwrap();
        assert!(store.exists());

        store.clear().unwrap();
        assert!(!store.exists());

        // Clearing an absent checkpoint is not an error.
        store.clear().unwrap();
    }
}
