//! Distance ranking of trial sites around a resolved origin.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::{
    data::types::{is_active_status, EligibilityRecord, Facility, TrialSummary},
    search::{
        eligibility::{
            groups_for_bounds, normalize_gender, parse_age_years, AgeGroup,
            DEFAULT_MAX_AGE_YEARS, DEFAULT_MIN_AGE_YEARS,
        },
        geo::{haversine_miles, Coordinate},
        matcher::TrialMatch,
    },
};

/// A facility joined with its trial summary and derived eligibility facets.
/// Built per search request and discarded with it.
#[derive(Debug, Clone, Serialize)]
pub struct RankedSite {
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
    pub age_groups: BTreeSet<AgeGroup>,
}

/// Rank facilities by distance from `origin`.
///
/// Facilities with an explicitly inactive status or missing coordinates are
/// dropped, as is anything beyond `max_distance_miles`. A missing facility
/// status does not exclude the row; that column is sparsely populated and is
/// treated as filter-inapplicable. Duplicate `(nct_id, address)` rows keep
/// their first occurrence. The sort is stable, so equal distances preserve
/// fetch order, and the result is capped at `cap` rows.
pub fn rank_sites(
    matches: &[TrialMatch],
    facilities: Vec<Facility>,
    summaries: &HashMap<String, TrialSummary>,
    eligibilities: &HashMap<String, EligibilityRecord>,
    origin: Coordinate,
    max_distance_miles: f64,
    cap: usize,
) -> Vec<RankedSite> {
    let similarity: HashMap<&str, f32> = matches
        .iter()
        .map(|m| (m.nct_id.as_str(), m.similarity))
        .collect();

    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut within: Vec<(Facility, Coordinate, f64)> = Vec::new();
    for facility in facilities {
        if !similarity.contains_key(facility.nct_id.as_str()) {
            continue;
        }
        if facility
            .status
            .as_deref()
            .is_some_and(|s| !is_active_status(s))
        {
            continue;
        }
        let (Some(latitude), Some(longitude)) = (facility.latitude, facility.longitude) else {
            continue;
        };
        let position = Coordinate {
            latitude,
            longitude,
        };
        let distance = haversine_miles(origin, position);
        if distance > max_distance_miles {
            continue;
        }
        if !seen.insert((facility.nct_id.clone(), facility.address_key())) {
            continue;
        }
        within.push((facility, position, distance));
    }

    // Vec::sort_by is stable: ties keep fetch order.
    within.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));
    within.truncate(cap);
    debug!(sites = within.len(), max_distance_miles, "ranked facilities");

    within
        .into_iter()
        .map(|(facility, position, distance_miles)| {
            let summary = summaries.get(&facility.nct_id);
            let elig = eligibilities.get(&facility.nct_id);
            let min_age_years = elig
                .and_then(|e| parse_age_years(e.minimum_age.as_deref()))
                .unwrap_or(DEFAULT_MIN_AGE_YEARS);
            let max_age_years = elig
                .and_then(|e| parse_age_years(e.maximum_age.as_deref()))
                .unwrap_or(DEFAULT_MAX_AGE_YEARS);
            RankedSite {
                similarity: similarity
                    .get(facility.nct_id.as_str())
                    .copied()
                    .unwrap_or_default(),
                overall_status: summary.map(|s| s.overall_status.clone()),
                phase: summary.and_then(|s| s.phase.clone()),
                study_type: summary.and_then(|s| s.study_type.clone()),
                gender: normalize_gender(elig.and_then(|e| e.gender.as_deref())),
                min_age_years,
                max_age_years,
                age_groups: groups_for_bounds(min_age_years, max_age_years),
                nct_id: facility.nct_id,
                facility_name: facility.name,
                city: facility.city,
                state: facility.state,
                zip: facility.zip,
                latitude: position.latitude,
                longitude: position.longitude,
                distance_miles,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Coordinate {
        // Boston, MA
        Coordinate {
            latitude: 42.3601,
            longitude: -71.0589,
        }
    }

    fn facility(nct: &str, city: &str, lat: f64, lon: f64) -> Facility {
        Facility {
            nct_id: nct.into(),
            name: Some(format!("{city} Medical Center")),
            city: Some(city.into()),
            state: Some("MA".into()),
            zip: None,
            latitude: Some(lat),
            longitude: Some(lon),
            status: None,
        }
    }

    fn matched(nct: &str) -> TrialMatch {
        TrialMatch {
            nct_id: nct.into(),
            similarity: 0.9,
        }
    }

    #[test]
    fn sites_come_back_sorted_and_capped() {
        let facilities = vec![
            facility("NCT001", "Worcester", 42.2626, -71.8023),
            facility("NCT002", "Boston", 42.3601, -71.0589),
            facility("NCT003", "Providence", 41.8240, -71.4128),
        ];
        let matches = vec![matched("NCT001"), matched("NCT002"), matched("NCT003")];
        let sites = rank_sites(
            &matches,
            facilities,
            &HashMap::new(),
            &HashMap::new(),
            origin(),
            250.0,
            2,
        );
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].nct_id, "NCT002");
        assert!(sites[0].distance_miles <= sites[1].distance_miles);
        assert!(sites.iter().all(|s| s.distance_miles <= 250.0));
    }

    #[test]
    fn far_missing_and_closed_facilities_drop() {
        let mut far = facility("NCT001", "Seattle", 47.6062, -122.3321);
        far.status = Some("RECRUITING".into());
        let missing = Facility {
            latitude: None,
            longitude: None,
            ..facility("NCT001", "Nowhere", 0.0, 0.0)
        };
        let mut closed = facility("NCT001", "Boston", 42.3601, -71.0589);
        closed.status = Some("COMPLETED".into());
        let sites = rank_sites(
            &[matched("NCT001")],
            vec![far, missing, closed],
            &HashMap::new(),
            &HashMap::new(),
            origin(),
            250.0,
            100,
        );
        assert!(sites.is_empty());
    }

    #[test]
    fn duplicate_addresses_within_a_trial_collapse() {
        let facilities = vec![
            facility("NCT001", "Boston", 42.3601, -71.0589),
            facility("NCT001", "Boston", 42.3601, -71.0589),
        ];
        let sites = rank_sites(
            &[matched("NCT001")],
            facilities,
            &HashMap::new(),
            &HashMap::new(),
            origin(),
            250.0,
            100,
        );
        assert_eq!(sites.len(), 1);
    }

    #[test]
    fn join_fills_eligibility_facets() {
        let summaries: HashMap<_, _> = [(
            "NCT001".to_string(),
            TrialSummary {
                nct_id: "NCT001".into(),
                overall_status: "RECRUITING".into(),
                phase: Some("PHASE2".into()),
                study_type: Some("INTERVENTIONAL".into()),
            },
        )]
        .into_iter()
        .collect();
        let eligibilities: HashMap<_, _> = [(
            "NCT001".to_string(),
            EligibilityRecord {
                nct_id: "NCT001".into(),
                gender: Some("Female".into()),
                minimum_age: Some("18 Years".into()),
                maximum_age: Some("64 Years".into()),
            },
        )]
        .into_iter()
        .collect();
        let sites = rank_sites(
            &[matched("NCT001")],
            vec![facility("NCT001", "Boston", 42.3601, -71.0589)],
            &summaries,
            &eligibilities,
            origin(),
            250.0,
            100,
        );
        assert_eq!(sites.len(), 1);
        let site = &sites[0];
        assert_eq!(site.gender, "FEMALE");
        assert_eq!(site.min_age_years, 18.0);
        assert_eq!(site.max_age_years, 64.0);
        assert_eq!(site.age_groups, BTreeSet::from([AgeGroup::Adult]));
        assert_eq!(site.phase.as_deref(), Some("PHASE2"));
    }
}
