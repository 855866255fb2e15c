//! Search engine orchestration: one logical pipeline per request.

pub mod eligibility;
pub mod filters;
pub mod geo;
pub mod matcher;
pub mod ranker;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::{
    config::Settings,
    data::{
        geocode::{Geocoder, NominatimGeocoder, ResolvedLocation},
        store::{ParquetStore, TrialStore},
        synonyms::{OpenAiSynonymExpander, SynonymExpander},
        types::{EligibilityRecord, Facility, TrialSummary},
    },
    embed::{default_embedder, Embedder},
    error::{SearchError, SearchResult},
    index::IndexHandle,
};
use filters::FacetSelection;
use ranker::RankedSite;

/// One user search. Transient.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    pub condition: String,
    pub location: String,
    pub max_distance_miles: Option<f64>,
    #[serde(default)]
    pub facets: FacetSelection,
}

/// Everything a caller needs to present a search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub condition: String,
    pub synonyms: Vec<String>,
    /// `None` when the match set was empty and geocoding was skipped.
    pub location: Option<ResolvedLocation>,
    pub sites: Vec<RankedSite>,
}

/// Structured detail for a single trial (summary, eligibility, sites).
#[derive(Debug, Clone, Serialize)]
pub struct TrialDetail {
    pub summary: TrialSummary,
    pub eligibility: Option<EligibilityRecord>,
    pub facilities: Vec<Facility>,
}

/// The condition-matching and site-ranking engine.
///
/// Holds the collaborator seams and the swappable index handle. A search
/// mutates nothing shared, so abandoned requests can simply be dropped.
pub struct SearchEngine {
    store: Arc<dyn TrialStore>,
    expander: Arc<dyn SynonymExpander>,
    geocoder: Arc<dyn Geocoder>,
    embedder: Arc<dyn Embedder>,
    index: Arc<IndexHandle>,
    similarity_threshold: f32,
    default_max_distance: f64,
    result_cap: usize,
}

impl SearchEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn TrialStore>,
        expander: Arc<dyn SynonymExpander>,
        geocoder: Arc<dyn Geocoder>,
        embedder: Arc<dyn Embedder>,
        index: Arc<IndexHandle>,
        similarity_threshold: f32,
        default_max_distance: f64,
        result_cap: usize,
    ) -> Self {
        Self {
            store,
            expander,
            geocoder,
            embedder,
            index,
            similarity_threshold,
            default_max_distance,
            result_cap,
        }
    }

    /// Wire up the production collaborators from configuration.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let embedder: Arc<dyn Embedder> = Arc::from(default_embedder()?);
        let index = Arc::new(IndexHandle::load_or_empty(
            &settings.data_dir,
            embedder.model_id(),
        )?);
        Ok(Self::new(
            Arc::new(ParquetStore::open(settings)?),
            Arc::new(OpenAiSynonymExpander::from_settings(settings)?),
            Arc::new(NominatimGeocoder::from_settings(settings)?),
            embedder,
            index,
            settings.similarity_threshold,
            settings.max_distance_miles,
            settings.result_cap,
        ))
    }

    pub fn index_handle(&self) -> Arc<IndexHandle> {
        self.index.clone()
    }

    /// Run the full pipeline for one query.
    #[instrument(skip(self, query), fields(condition = %query.condition, location = %query.location))]
    pub async fn search(&self, query: SearchQuery) -> SearchResult<SearchOutcome> {
        let condition = query.condition.trim().to_string();
        if condition.is_empty() {
            return Err(SearchError::InvalidInput("condition text is empty".into()));
        }
        let location_text = query.location.trim().to_string();
        if location_text.is_empty() {
            return Err(SearchError::InvalidInput("location text is empty".into()));
        }

        let synonyms = match self.expander.expand(&condition).await {
            Ok(synonyms) => synonyms,
            Err(err) if err.is_retryable() => {
                warn!(%err, "synonym expansion unavailable; searching the verbatim term only");
                vec![condition.clone()]
            }
            Err(err) => return Err(err),
        };

        // The snapshot reference is held for the whole request; a concurrent
        // rebuild publishes a new snapshot without disturbing this one.
        let index = self.index.snapshot();
        let scored = matcher::score_synonyms(
            self.embedder.as_ref(),
            &index,
            &synonyms,
            self.similarity_threshold,
        )?;
        let candidate_ids: Vec<String> = scored.iter().map(|m| m.nct_id.clone()).collect();
        let summaries = self.store.trial_summaries(&candidate_ids)?;
        let matches = matcher::retain_active(scored, &summaries);

        if matches.is_empty() {
            // Valid empty outcome; the geocoder is never contacted.
            info!("no trials matched the condition");
            return Ok(SearchOutcome {
                condition,
                synonyms,
                location: None,
                sites: Vec::new(),
            });
        }

        let candidates = self.geocoder.resolve(&location_text).await?;
        let Some(resolved) = candidates.into_iter().next() else {
            return Err(SearchError::LocationNotFound(location_text));
        };

        let matched_ids: Vec<String> = matches.iter().map(|m| m.nct_id.clone()).collect();
        let facilities = self.store.facilities(&matched_ids)?;
        let eligibilities = self.store.eligibilities(&matched_ids)?;

        let max_distance = query
            .max_distance_miles
            .unwrap_or(self.default_max_distance);
        let sites = ranker::rank_sites(
            &matches,
            facilities,
            &summaries,
            &eligibilities,
            resolved.coordinate(),
            max_distance,
            self.result_cap,
        );
        let sites = filters::apply(sites, &query.facets);
        info!(
            trials = matched_ids.len(),
            sites = sites.len(),
            "search complete"
        );

        Ok(SearchOutcome {
            condition,
            synonyms,
            location: Some(resolved),
            sites,
        })
    }

    /// Structured detail for one trial, or `None` when it is unknown.
    pub fn trial_detail(&self, nct_id: &str) -> SearchResult<Option<TrialDetail>> {
        let nct_id = nct_id.trim().to_ascii_uppercase();
        if nct_id.is_empty() {
            return Err(SearchError::InvalidInput("nct_id is empty".into()));
        }
        let ids = vec![nct_id.clone()];
        let mut summaries = self.store.trial_summaries(&ids)?;
        let Some(summary) = summaries.remove(&nct_id) else {
            return Ok(None);
        };
        let eligibility = self.store.eligibilities(&ids)?.remove(&nct_id);
        let facilities = self.store.facilities(&ids)?;
        Ok(Some(TrialDetail {
            summary,
            eligibility,
            facilities,
        }))
    }
}
