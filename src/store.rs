//! Durable study persistence: one pretty-printed JSON document per study,
//! named `<study_id>.json`, inside a flat directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StudyError;
use crate::space::OptimizationConfig;
use crate::study::TrialRecord;

/// On-disk layout of a persisted study.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyRecord {
    pub study_id: String,
    pub config: OptimizationConfig,
    pub trials_history: Vec<TrialRecord>,
    pub timestamp: u64,
}

/// Flat-directory JSON store.
pub struct StudyStore {
    dir: PathBuf,
}

impl StudyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, study_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", study_id))
    }

    /// Write a study record, creating the directory on first use.
    pub fn save(&self, record: &StudyRecord) -> Result<(), StudyError> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(record)?;
        fs::write(self.path_for(&record.study_id), json)?;
        Ok(())
    }

    /// Read a study record back, or `None` when no file exists for the id.
    pub fn load(&self, study_id: &str) -> Result<Option<StudyRecord>, StudyError> {
        let path = self.path_for(study_id);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        let record: StudyRecord = serde_json::from_str(&text)?;
        Ok(Some(record))
    }

    pub fn contains(&self, study_id: &str) -> bool {
        self.path_for(study_id).exists()
    }

    /// Ids of every persisted study, sorted.
    pub fn list(&self) -> Result<Vec<String>, StudyError> {
        let mut ids = Vec::new();
        if !self.dir.exists() {
            return Ok(ids);
        }
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}
