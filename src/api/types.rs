//! Shared DTOs for JSON responses.

use serde::Serialize;

use crate::{
    data::geocode::ResolvedLocation,
    search::{ranker::RankedSite, SearchOutcome},
};

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub condition: String,
    pub synonyms: Vec<String>,
    pub location: Option<LocationDto>,
    pub sites: Vec<SiteDto>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationDto {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteDto {
    pub nct_id: String,
    pub facility_name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_miles: f64,
    pub similarity: f32,
    pub overall_status: Option<String>,
    pub phase: Option<String>,
    pub study_type: Option<String>,
    pub gender: String,
    pub min_age_years: f64,
    pub max_age_years: f64,
    pub age_groups: Vec<String>,
}

impl From<ResolvedLocation> for LocationDto {
    fn from(value: ResolvedLocation) -> Self {
        Self {
            latitude: value.latitude,
            longitude: value.longitude,
            display_name: value.display_name,
        }
    }
}

impl From<RankedSite> for SiteDto {
    fn from(value: RankedSite) -> Self {
        Self {
            nct_id: value.nct_id,
            facility_name: value.facility_name,
            city: value.city,
            state: value.state,
            zip: value.zip,
            latitude: value.latitude,
            longitude: value.longitude,
            distance_miles: value.distance_miles,
            similarity: value.similarity,
            overall_status: value.overall_status,
            phase: value.phase,
            study_type: value.study_type,
            gender: value.gender,
            min_age_years: value.min_age_years,
            max_age_years: value.max_age_years,
            age_groups: value.age_groups.iter().map(|g| format!("{g:?}")).collect(),
        }
    }
}

impl From<SearchOutcome> for SearchResponse {
    fn from(value: SearchOutcome) -> Self {
        Self {
            condition: value.condition,
            synonyms: value.synonyms,
            location: value.location.map(LocationDto::from),
            sites: value.sites.into_iter().map(SiteDto::from).collect(),
        }
    }
}
