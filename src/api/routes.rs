//! HTTP route handlers for Axum.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use clap::ValueEnum;
use serde::Deserialize;
use tracing::error;

use crate::{
    api::types::SearchResponse,
    error::SearchError,
    search::{eligibility::AgeGroup, filters::FacetSelection, SearchQuery, TrialDetail},
};

use super::AppState;

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub condition: String,
    pub location: String,
    pub max_distance: Option<f64>,
    pub phase: Option<String>,
    pub study_type: Option<String>,
    pub gender: Option<String>,
    pub status: Option<String>,
    pub age_group: Option<String>,
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<SearchResponse> {
    let age_group = match params.age_group.as_deref() {
        Some(raw) => Some(
            AgeGroup::from_str(raw, true)
                .map_err(|_| (StatusCode::BAD_REQUEST, format!("unknown age group '{raw}'")))?,
        ),
        None => None,
    };
    let query = SearchQuery {
        condition: params.condition,
        location: params.location,
        max_distance_miles: params.max_distance,
        facets: FacetSelection {
            max_distance_miles: None,
            age_group,
            phase: params.phase,
            study_type: params.study_type,
            gender: params.gender,
            status: params.status,
        },
    };
    let outcome = state.engine.search(query).await.map_err(into_response)?;
    Ok(Json(SearchResponse::from(outcome)))
}

pub async fn trial_detail(
    Path(nct_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<TrialDetail> {
    match state.engine.trial_detail(&nct_id) {
        Ok(Some(detail)) => Ok(Json(detail)),
        Ok(None) => Err((StatusCode::NOT_FOUND, format!("unknown trial '{nct_id}'"))),
        Err(err) => Err(into_response(err)),
    }
}

fn into_response(err: SearchError) -> (StatusCode, String) {
    let status = match &err {
        SearchError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        SearchError::LocationNotFound(_) => StatusCode::NOT_FOUND,
        SearchError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        SearchError::InconsistentIndex { .. } | SearchError::Other(_) => {
            error!(%err, "search failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string())
}
