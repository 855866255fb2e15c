//! Versioned condition embedding index: snapshot type, persistence, and the
//! swappable handle readers take snapshots from.

pub mod build;

use std::{
    fs::File,
    io::{BufRead, BufReader, Write},
    path::Path,
    sync::{Arc, RwLock},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::types::TrialCondition;

pub const SNAPSHOT_FILE: &str = "condition_index.jsonl";

/// One condition with its embedding and the trials that declare it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionRecord {
    pub id: u32,
    pub condition: String,
    pub embedding: Vec<f32>,
    /// Never empty: a condition only exists because some trial declared it.
    pub nct_ids: Vec<String>,
}

/// Snapshot metadata; `embedding_model` is checked before any scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub embedding_model: String,
    pub built_at: DateTime<Utc>,
    pub conditions: usize,
    pub trials: usize,
}

/// Immutable snapshot of the condition corpus. Published whole, never
/// mutated in place.
#[derive(Debug, Clone)]
pub struct ConditionIndex {
    pub meta: IndexMeta,
    pub records: Vec<ConditionRecord>,
}

impl ConditionIndex {
    /// Empty snapshot claiming the given model, used before the first ingest.
    pub fn empty(embedding_model: &str) -> Self {
        Self {
            meta: IndexMeta {
                embedding_model: embedding_model.to_string(),
                built_at: Utc::now(),
                conditions: 0,
                trials: 0,
            },
            records: Vec::new(),
        }
    }

    /// Flatten back to `(nct_id, condition)` pairs for snapshot merging.
    pub fn trial_conditions(&self) -> Vec<TrialCondition> {
        let mut rows = Vec::new();
        for record in &self.records {
            for nct_id in &record.nct_ids {
                rows.push(TrialCondition {
                    nct_id: nct_id.clone(),
                    condition: record.condition.clone(),
                });
            }
        }
        rows
    }

    /// Load the published snapshot, if one exists. Format: one meta line
    /// followed by one JSON record per line.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(SNAPSHOT_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let reader = BufReader::new(File::open(&path).with_context(|| format!("open {path:?}"))?);
        let mut lines = reader.lines();
        let meta_line = match lines.next() {
            Some(line) => line?,
            None => return Ok(None),
        };
        let meta: IndexMeta = serde_json::from_str(&meta_line).context("decode index meta")?;
        let mut records = Vec::with_capacity(meta.conditions);
        for line in lines {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line).context("decode index record")?);
        }
        info!(
            model = %meta.embedding_model,
            conditions = records.len(),
            "loaded condition index snapshot"
        );
        Ok(Some(Self { meta, records }))
    }

    /// Publish atomically: write the complete snapshot next to the live file,
    /// then rename over it so readers never observe a partial index.
    pub fn publish(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let final_path = dir.join(SNAPSHOT_FILE);
        let tmp_path = dir.join(format!("{SNAPSHOT_FILE}.tmp"));
        {
            let mut file =
                File::create(&tmp_path).with_context(|| format!("create {tmp_path:?}"))?;
            let meta_line = serde_json::to_string(&self.meta)?;
            file.write_all(meta_line.as_bytes())?;
            file.write_all(b"\n")?;
            for record in &self.records {
                let line = serde_json::to_string(record)?;
                file.write_all(line.as_bytes())?;
                file.write_all(b"\n")?;
            }
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &final_path)
            .with_context(|| format!("publish {final_path:?}"))?;
        info!(
            path = %final_path.display(),
            conditions = self.meta.conditions,
            trials = self.meta.trials,
            "published condition index snapshot"
        );
        Ok(())
    }
}

/// Swappable reference to the active snapshot.
///
/// Readers clone the `Arc` under a brief read lock and keep scoring against
/// that snapshot for the whole request; `install` swaps in a replacement
/// without disturbing in-flight readers.
pub struct IndexHandle {
    inner: RwLock<Arc<ConditionIndex>>,
}

impl IndexHandle {
    pub fn new(index: ConditionIndex) -> Self {
        Self {
            inner: RwLock::new(Arc::new(index)),
        }
    }

    /// Load from disk, or start with an empty snapshot for the given model.
    pub fn load_or_empty(dir: &Path, embedding_model: &str) -> Result<Self> {
        let index = match ConditionIndex::load(dir)? {
            Some(index) => index,
            None => ConditionIndex::empty(embedding_model),
        };
        Ok(Self::new(index))
    }

    pub fn snapshot(&self) -> Arc<ConditionIndex> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn install(&self, index: ConditionIndex) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(index);
    }
}
