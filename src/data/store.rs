//! Read-only trial store keyed by NCT-ID sets.
//!
//! Production data lives in three parquet files under the data directory
//! (`trials.parquet`, `facilities.parquet`, `eligibilities.parquet`, plus
//! `conditions.parquet` for the ingestion job). `MemoryStore` backs tests.

use std::{
    collections::{HashMap, HashSet},
    fs::File,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use polars::prelude::{DataFrame, NamedFrom, ParquetReader, ParquetWriter, SerReader, Series};
use tracing::info;

use crate::{
    config::Settings,
    data::types::{is_active_status, EligibilityRecord, Facility, TrialCondition, TrialSummary},
};

/// Read-only queries the engine and the ingestion job need.
pub trait TrialStore: Send + Sync {
    /// `(nct_id, condition)` pairs for every active trial, conditions lower-cased.
    fn active_trial_conditions(&self) -> Result<Vec<TrialCondition>>;

    /// Trial-level summaries for the given NCT IDs.
    fn trial_summaries(&self, nct_ids: &[String]) -> Result<HashMap<String, TrialSummary>>;

    /// All facility rows belonging to the given NCT IDs.
    fn facilities(&self, nct_ids: &[String]) -> Result<Vec<Facility>>;

    /// Eligibility rows for the given NCT IDs, one per trial.
    fn eligibilities(&self, nct_ids: &[String]) -> Result<HashMap<String, EligibilityRecord>>;
}

/// Parquet-backed store rooted at the configured data directory.
pub struct ParquetStore {
    root: PathBuf,
}

impl ParquetStore {
    pub fn open(settings: &Settings) -> Result<Self> {
        let trials = settings.join_data("trials.parquet");
        if !trials.exists() {
            info!(path = %trials.display(), "trials.parquet missing; store starts empty");
        }
        Ok(Self {
            root: settings.data_dir.clone(),
        })
    }

    fn read_df(&self, file: &str) -> Result<Option<DataFrame>> {
        let path = self.root.join(file);
        if !path.exists() {
            return Ok(None);
        }
        let df = ParquetReader::new(File::open(&path).with_context(|| format!("open {file}"))?)
            .finish()
            .with_context(|| format!("read {file}"))?;
        Ok(Some(df))
    }
}

impl TrialStore for ParquetStore {
    fn active_trial_conditions(&self) -> Result<Vec<TrialCondition>> {
        let Some(trials) = self.read_df("trials.parquet")? else {
            return Ok(Vec::new());
        };
        let Some(conditions) = self.read_df("conditions.parquet")? else {
            return Ok(Vec::new());
        };

        let nct_col = trials.column("nct_id")?.str()?;
        let status_col = trials.column("overall_status")?.str()?;
        let mut active = HashSet::new();
        for idx in 0..trials.height() {
            if let (Some(nct), Some(status)) = (nct_col.get(idx), status_col.get(idx)) {
                if is_active_status(status) {
                    active.insert(nct.to_string());
                }
            }
        }

        let nct_col = conditions.column("nct_id")?.str()?;
        let name_col = conditions.column("condition")?.str()?;
        let mut rows = Vec::new();
        for idx in 0..conditions.height() {
            if let (Some(nct), Some(name)) = (nct_col.get(idx), name_col.get(idx)) {
                if active.contains(nct) {
                    rows.push(TrialCondition {
                        nct_id: nct.to_string(),
                        condition: name.trim().to_lowercase(),
                    });
                }
            }
        }
        info!(rows = rows.len(), trials = active.len(), "loaded active trial conditions");
        Ok(rows)
    }

    fn trial_summaries(&self, nct_ids: &[String]) -> Result<HashMap<String, TrialSummary>> {
        let mut out = HashMap::new();
        let Some(df) = self.read_df("trials.parquet")? else {
            return Ok(out);
        };
        let wanted: HashSet<&str> = nct_ids.iter().map(String::as_str).collect();
        let nct_col = df.column("nct_id")?.str()?;
        let status_col = df.column("overall_status")?.str()?;
        let phase_col = df.column("phase")?.str()?;
        let type_col = df.column("study_type")?.str()?;
        for idx in 0..df.height() {
            if let (Some(nct), Some(status)) = (nct_col.get(idx), status_col.get(idx)) {
                if wanted.contains(nct) {
                    out.insert(
                        nct.to_string(),
                        TrialSummary {
                            nct_id: nct.to_string(),
                            overall_status: status.to_string(),
                            phase: phase_col.get(idx).map(str::to_string),
                            study_type: type_col.get(idx).map(str::to_string),
                        },
                    );
                }
            }
        }
        Ok(out)
    }

    fn facilities(&self, nct_ids: &[String]) -> Result<Vec<Facility>> {
        let mut out = Vec::new();
        let Some(df) = self.read_df("facilities.parquet")? else {
            return Ok(out);
        };
        let wanted: HashSet<&str> = nct_ids.iter().map(String::as_str).collect();
        let nct_col = df.column("nct_id")?.str()?;
        let name_col = df.column("name")?.str()?;
        let city_col = df.column("city")?.str()?;
        let state_col = df.column("state")?.str()?;
        let zip_col = df.column("zip")?.str()?;
        let lat_col = df.column("latitude")?.f64()?;
        let lon_col = df.column("longitude")?.f64()?;
        let status_col = df.column("status")?.str()?;
        for idx in 0..df.height() {
            let Some(nct) = nct_col.get(idx) else { continue };
            if !wanted.contains(nct) {
                continue;
            }
            out.push(Facility {
                nct_id: nct.to_string(),
                name: name_col.get(idx).map(str::to_string),
                city: city_col.get(idx).map(str::to_string),
                state: state_col.get(idx).map(str::to_string),
                zip: zip_col.get(idx).map(str::to_string),
                latitude: lat_col.get(idx),
                longitude: lon_col.get(idx),
                status: status_col.get(idx).map(str::to_string),
            });
        }
        Ok(out)
    }

    fn eligibilities(&self, nct_ids: &[String]) -> Result<HashMap<String, EligibilityRecord>> {
        let mut out = HashMap::new();
        let Some(df) = self.read_df("eligibilities.parquet")? else {
            return Ok(out);
        };
        let wanted: HashSet<&str> = nct_ids.iter().map(String::as_str).collect();
        let nct_col = df.column("nct_id")?.str()?;
        let gender_col = df.column("gender")?.str()?;
        let min_col = df.column("minimum_age")?.str()?;
        let max_col = df.column("maximum_age")?.str()?;
        for idx in 0..df.height() {
            let Some(nct) = nct_col.get(idx) else { continue };
            if !wanted.contains(nct) {
                continue;
            }
            out.insert(
                nct.to_string(),
                EligibilityRecord {
                    nct_id: nct.to_string(),
                    gender: gender_col.get(idx).map(str::to_string),
                    minimum_age: min_col.get(idx).map(str::to_string),
                    maximum_age: max_col.get(idx).map(str::to_string),
                },
            );
        }
        Ok(out)
    }
}

/// In-memory store used by tests and fixtures.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    pub trials: Vec<TrialSummary>,
    pub conditions: Vec<TrialCondition>,
    pub facilities: Vec<Facility>,
    pub eligibilities: Vec<EligibilityRecord>,
}

impl TrialStore for MemoryStore {
    fn active_trial_conditions(&self) -> Result<Vec<TrialCondition>> {
        let active: HashSet<&str> = self
            .trials
            .iter()
            .filter(|t| is_active_status(&t.overall_status))
            .map(|t| t.nct_id.as_str())
            .collect();
        Ok(self
            .conditions
            .iter()
            .filter(|c| active.contains(c.nct_id.as_str()))
            .map(|c| TrialCondition {
                nct_id: c.nct_id.clone(),
                condition: c.condition.trim().to_lowercase(),
            })
            .collect())
    }

    fn trial_summaries(&self, nct_ids: &[String]) -> Result<HashMap<String, TrialSummary>> {
        let wanted: HashSet<&str> = nct_ids.iter().map(String::as_str).collect();
        Ok(self
            .trials
            .iter()
            .filter(|t| wanted.contains(t.nct_id.as_str()))
            .map(|t| (t.nct_id.clone(), t.clone()))
            .collect())
    }

    fn facilities(&self, nct_ids: &[String]) -> Result<Vec<Facility>> {
        let wanted: HashSet<&str> = nct_ids.iter().map(String::as_str).collect();
        Ok(self
            .facilities
            .iter()
            .filter(|f| wanted.contains(f.nct_id.as_str()))
            .cloned()
            .collect())
    }

    fn eligibilities(&self, nct_ids: &[String]) -> Result<HashMap<String, EligibilityRecord>> {
        let wanted: HashSet<&str> = nct_ids.iter().map(String::as_str).collect();
        Ok(self
            .eligibilities
            .iter()
            .filter(|e| wanted.contains(e.nct_id.as_str()))
            .map(|e| (e.nct_id.clone(), e.clone()))
            .collect())
    }
}

/// Materialise a `MemoryStore` as the parquet files `ParquetStore` reads.
/// Integration tests use this to exercise the on-disk path.
pub fn write_parquet_fixtures(store: &MemoryStore, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;

    let mut trials = DataFrame::new(vec![
        Series::new(
            "nct_id".into(),
            store.trials.iter().map(|t| t.nct_id.clone()).collect::<Vec<_>>(),
        ),
        Series::new(
            "overall_status".into(),
            store
                .trials
                .iter()
                .map(|t| t.overall_status.clone())
                .collect::<Vec<_>>(),
        ),
        Series::new(
            "phase".into(),
            store.trials.iter().map(|t| t.phase.clone()).collect::<Vec<_>>(),
        ),
        Series::new(
            "study_type".into(),
            store
                .trials
                .iter()
                .map(|t| t.study_type.clone())
                .collect::<Vec<_>>(),
        ),
    ])?;
    write_df(&mut trials, &dir.join("trials.parquet"))?;

    let mut conditions = DataFrame::new(vec![
        Series::new(
            "nct_id".into(),
            store
                .conditions
                .iter()
                .map(|c| c.nct_id.clone())
                .collect::<Vec<_>>(),
        ),
        Series::new(
            "condition".into(),
            store
                .conditions
                .iter()
                .map(|c| c.condition.clone())
                .collect::<Vec<_>>(),
        ),
    ])?;
    write_df(&mut conditions, &dir.join("conditions.parquet"))?;

    let mut facilities = DataFrame::new(vec![
        Series::new(
            "nct_id".into(),
            store
                .facilities
                .iter()
                .map(|f| f.nct_id.clone())
                .collect::<Vec<_>>(),
        ),
        Series::new(
            "name".into(),
            store.facilities.iter().map(|f| f.name.clone()).collect::<Vec<_>>(),
        ),
        Series::new(
            "city".into(),
            store.facilities.iter().map(|f| f.city.clone()).collect::<Vec<_>>(),
        ),
        Series::new(
            "state".into(),
            store
                .facilities
                .iter()
                .map(|f| f.state.clone())
                .collect::<Vec<_>>(),
        ),
        Series::new(
            "zip".into(),
            store.facilities.iter().map(|f| f.zip.clone()).collect::<Vec<_>>(),
        ),
        Series::new(
            "latitude".into(),
            store.facilities.iter().map(|f| f.latitude).collect::<Vec<_>>(),
        ),
        Series::new(
            "longitude".into(),
            store.facilities.iter().map(|f| f.longitude).collect::<Vec<_>>(),
        ),
        Series::new(
            "status".into(),
            store
                .facilities
                .iter()
                .map(|f| f.status.clone())
                .collect::<Vec<_>>(),
        ),
    ])?;
    write_df(&mut facilities, &dir.join("facilities.parquet"))?;

    let mut eligibilities = DataFrame::new(vec![
        Series::new(
            "nct_id".into(),
            store
                .eligibilities
                .iter()
                .map(|e| e.nct_id.clone())
                .collect::<Vec<_>>(),
        ),
        Series::new(
            "gender".into(),
            store
                .eligibilities
                .iter()
                .map(|e| e.gender.clone())
                .collect::<Vec<_>>(),
        ),
        Series::new(
            "minimum_age".into(),
            store
                .eligibilities
                .iter()
                .map(|e| e.minimum_age.clone())
                .collect::<Vec<_>>(),
        ),
        Series::new(
            "maximum_age".into(),
            store
                .eligibilities
                .iter()
                .map(|e| e.maximum_age.clone())
                .collect::<Vec<_>>(),
        ),
    ])?;
    write_df(&mut eligibilities, &dir.join("eligibilities.parquet"))?;
    Ok(())
}

fn write_df(df: &mut DataFrame, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create {path:?}"))?;
    ParquetWriter::new(file).finish(df)?;
    Ok(())
}
