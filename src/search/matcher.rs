//! Condition matching: synonym embeddings scored against the index.

use std::collections::HashMap;

use tracing::debug;

use crate::{
    data::types::{is_active_status, TrialSummary},
    embed::{cosine, Embedder},
    error::{SearchError, SearchResult},
    index::ConditionIndex,
};

/// One matched trial with the best similarity that reached it.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialMatch {
    pub nct_id: String,
    pub similarity: f32,
}

/// Score synonyms against every condition record and return matched trials.
///
/// Every `(synonym, record)` pair at or above `threshold` contributes the
/// record's trials; a trial reachable through several synonyms or conditions
/// keeps its highest similarity. Output is ordered by descending similarity
/// (NCT ID breaks ties so the order is deterministic). An empty result is a
/// valid outcome, not an error.
pub fn score_synonyms(
    embedder: &dyn Embedder,
    index: &ConditionIndex,
    synonyms: &[String],
    threshold: f32,
) -> SearchResult<Vec<TrialMatch>> {
    // Mixing embedding spaces yields meaningless scores; refuse outright.
    if index.meta.embedding_model != embedder.model_id() {
        return Err(SearchError::InconsistentIndex {
            index_model: index.meta.embedding_model.clone(),
            query_model: embedder.model_id().to_string(),
        });
    }
    if synonyms.is_empty() || index.records.is_empty() {
        return Ok(Vec::new());
    }

    let synonym_vectors = embedder.embed(synonyms)?;

    let mut best: HashMap<&str, f32> = HashMap::new();
    for vector in &synonym_vectors {
        for record in &index.records {
            let similarity = cosine(vector, &record.embedding);
            if similarity < threshold {
                continue;
            }
            for nct_id in &record.nct_ids {
                let entry = best.entry(nct_id.as_str()).or_insert(similarity);
                if similarity > *entry {
                    *entry = similarity;
                }
            }
        }
    }

    let mut matches: Vec<TrialMatch> = best
        .into_iter()
        .map(|(nct_id, similarity)| TrialMatch {
            nct_id: nct_id.to_string(),
            similarity,
        })
        .collect();
    matches.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.nct_id.cmp(&b.nct_id))
    });
    debug!(matches = matches.len(), threshold, "scored synonyms");
    Ok(matches)
}

/// Keep only trials whose `overall_status` is currently active.
///
/// Trials outside the supplied summary map are dropped too: an unknown
/// status cannot be shown to patients as enrollable.
pub fn retain_active(
    matches: Vec<TrialMatch>,
    summaries: &HashMap<String, TrialSummary>,
) -> Vec<TrialMatch> {
    matches
        .into_iter()
        .filter(|m| {
            summaries
                .get(&m.nct_id)
                .is_some_and(|s| is_active_status(&s.overall_status))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        embed::TrigramEmbedder,
        index::{build::build_index, ConditionIndex},
    };
    use crate::data::types::TrialCondition;

    fn index_for(pairs: &[(&str, &str)]) -> ConditionIndex {
        let rows = pairs
            .iter()
            .map(|(nct, cond)| TrialCondition {
                nct_id: (*nct).into(),
                condition: (*cond).into(),
            })
            .collect();
        build_index(rows, None, &TrigramEmbedder).unwrap()
    }

    fn summary(nct: &str, status: &str) -> (String, TrialSummary) {
        (
            nct.to_string(),
            TrialSummary {
                nct_id: nct.into(),
                overall_status: status.into(),
                phase: None,
                study_type: None,
            },
        )
    }

    #[test]
    fn exact_condition_text_matches_at_threshold() {
        let index = index_for(&[("NCT001", "multiple sclerosis"), ("NCT002", "asthma")]);
        let matches = score_synonyms(
            &TrigramEmbedder,
            &index,
            &["Multiple Sclerosis".to_string()],
            0.8,
        )
        .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].nct_id, "NCT001");
        assert!(matches[0].similarity >= 0.8);
    }

    #[test]
    fn trial_reached_twice_keeps_best_similarity() {
        // Both conditions belong to the same trial; one synonym hits each.
        let index = index_for(&[
            ("NCT001", "multiple sclerosis"),
            ("NCT001", "relapsing multiple sclerosis"),
        ]);
        let matches = score_synonyms(
            &TrigramEmbedder,
            &index,
            &[
                "multiple sclerosis".to_string(),
                "relapsing multiple sclerosis".to_string(),
            ],
            0.8,
        )
        .unwrap();
        assert_eq!(matches.len(), 1, "no duplicate trial rows");
        // Each synonym matches its condition exactly, so the max is 1.0.
        assert!((matches[0].similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn below_threshold_is_empty_not_error() {
        let index = index_for(&[("NCT001", "pancreatic cancer")]);
        let matches =
            score_synonyms(&TrigramEmbedder, &index, &["asthma".to_string()], 0.8).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn model_mismatch_is_fatal() {
        let mut index = index_for(&[("NCT001", "asthma")]);
        index.meta.embedding_model = "all-MiniLM-L6-v2".into();
        let err = score_synonyms(&TrigramEmbedder, &index, &["asthma".to_string()], 0.8)
            .unwrap_err();
        assert!(matches!(err, SearchError::InconsistentIndex { .. }));
    }

    #[test]
    fn inactive_trials_drop_out() {
        let matches = vec![
            TrialMatch {
                nct_id: "NCT001".into(),
                similarity: 0.95,
            },
            TrialMatch {
                nct_id: "NCT002".into(),
                similarity: 0.90,
            },
            TrialMatch {
                nct_id: "NCT003".into(),
                similarity: 0.85,
            },
        ];
        let summaries: HashMap<_, _> = [
            summary("NCT001", "RECRUITING"),
            summary("NCT002", "COMPLETED"),
        ]
        .into_iter()
        .collect();
        let active = retain_active(matches, &summaries);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].nct_id, "NCT001");
    }
}
