//! Offline ingestion job that (re)builds the condition embedding index.

use anyhow::Result;
use chrono::Utc;
use indexmap::{IndexMap, IndexSet};
use tracing::info;

use crate::{
    config::Settings,
    data::{store::TrialStore, types::TrialCondition},
    embed::Embedder,
    index::{ConditionIndex, ConditionRecord, IndexMeta},
};

/// Merge current store rows with the prior snapshot and embed the result.
///
/// Rows conflict on `(nct_id, condition)`; freshly fetched rows win. Every
/// condition is re-embedded with the current model, so a prior snapshot from
/// an older embedding model merges cleanly; only its text survives.
pub fn build_index(
    current: Vec<TrialCondition>,
    prior: Option<&ConditionIndex>,
    embedder: &dyn Embedder,
) -> Result<ConditionIndex> {
    let mut merged: IndexSet<TrialCondition> = IndexSet::new();
    for row in current {
        merged.insert(row);
    }
    if let Some(prior) = prior {
        for row in prior.trial_conditions() {
            merged.insert(row);
        }
    }

    let mut grouped: IndexMap<String, IndexSet<String>> = IndexMap::new();
    for row in &merged {
        grouped
            .entry(row.condition.clone())
            .or_default()
            .insert(row.nct_id.clone());
    }

    let conditions: Vec<String> = grouped.keys().cloned().collect();
    let embeddings = embedder.embed(&conditions)?;

    let mut trials: IndexSet<&str> = IndexSet::new();
    let mut records = Vec::with_capacity(grouped.len());
    for (id, ((condition, nct_ids), embedding)) in grouped.iter().zip(embeddings).enumerate() {
        for nct_id in nct_ids {
            trials.insert(nct_id.as_str());
        }
        records.push(ConditionRecord {
            id: id as u32,
            condition: condition.clone(),
            embedding,
            nct_ids: nct_ids.iter().cloned().collect(),
        });
    }

    Ok(ConditionIndex {
        meta: IndexMeta {
            embedding_model: embedder.model_id().to_string(),
            built_at: Utc::now(),
            conditions: records.len(),
            trials: trials.len(),
        },
        records,
    })
}

/// Full ingestion run: fetch, merge with the published snapshot, embed,
/// publish atomically.
pub fn run(settings: &Settings, store: &dyn TrialStore, embedder: &dyn Embedder) -> Result<()> {
    let current = store.active_trial_conditions()?;
    let prior = ConditionIndex::load(&settings.data_dir)?;
    if let Some(prior) = &prior {
        if prior.meta.embedding_model != embedder.model_id() {
            info!(
                prior_model = %prior.meta.embedding_model,
                model = %embedder.model_id(),
                "embedding model changed; prior snapshot text is kept, vectors are rebuilt"
            );
        }
    }
    let index = build_index(current, prior.as_ref(), embedder)?;
    info!(
        conditions = index.meta.conditions,
        trials = index.meta.trials,
        "built condition index"
    );
    index.publish(&settings.data_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::TrigramEmbedder;

    fn row(nct: &str, condition: &str) -> TrialCondition {
        TrialCondition {
            nct_id: nct.into(),
            condition: condition.into(),
        }
    }

    #[test]
    fn groups_trials_under_shared_conditions() {
        let rows = vec![
            row("NCT001", "multiple sclerosis"),
            row("NCT002", "multiple sclerosis"),
            row("NCT002", "optic neuritis"),
        ];
        let index = build_index(rows, None, &TrigramEmbedder).unwrap();
        assert_eq!(index.meta.conditions, 2);
        assert_eq!(index.meta.trials, 2);
        let ms = index
            .records
            .iter()
            .find(|r| r.condition == "multiple sclerosis")
            .unwrap();
        assert_eq!(ms.nct_ids, vec!["NCT001", "NCT002"]);
        assert!(index.records.iter().all(|r| !r.nct_ids.is_empty()));
    }

    #[test]
    fn merge_keeps_prior_rows_and_dedupes_pairs() {
        let prior = build_index(
            vec![row("NCT001", "asthma"), row("NCT003", "copd")],
            None,
            &TrigramEmbedder,
        )
        .unwrap();
        // NCT001/asthma appears in both generations; it must not double up.
        let index = build_index(
            vec![row("NCT001", "asthma"), row("NCT002", "asthma")],
            Some(&prior),
            &TrigramEmbedder,
        )
        .unwrap();
        let asthma = index
            .records
            .iter()
            .find(|r| r.condition == "asthma")
            .unwrap();
        assert_eq!(asthma.nct_ids, vec!["NCT001", "NCT002"]);
        assert!(index.records.iter().any(|r| r.condition == "copd"));
        assert_eq!(index.meta.trials, 3);
    }

    #[test]
    fn record_ids_are_unique() {
        let rows = vec![
            row("NCT001", "a"),
            row("NCT001", "b"),
            row("NCT001", "c"),
        ];
        let index = build_index(rows, None, &TrigramEmbedder).unwrap();
        let mut ids: Vec<u32> = index.records.iter().map(|r| r.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }
}
