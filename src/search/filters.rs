//! Facet filter pipeline over a ranked site list.

use serde::{Deserialize, Serialize};

use crate::search::{eligibility::AgeGroup, ranker::RankedSite};

/// User-selected facets. `None` means the facet was left at its default and
/// its stage is skipped entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FacetSelection {
    pub max_distance_miles: Option<f64>,
    pub age_group: Option<AgeGroup>,
    pub phase: Option<String>,
    pub study_type: Option<String>,
    pub gender: Option<String>,
    pub status: Option<String>,
}

/// Apply the facet stages in fixed order, each narrowing the previous
/// stage's output: distance, age group, phase, study type, gender,
/// recruitment status. Pure and idempotent. Rows with no stored phase,
/// study type, or status compare as the literal `"N/A"`, matching how the
/// source data standardises blanks.
pub fn apply(mut sites: Vec<RankedSite>, selection: &FacetSelection) -> Vec<RankedSite> {
    if let Some(max_distance) = selection.max_distance_miles {
        sites.retain(|s| s.distance_miles <= max_distance);
    }
    if let Some(group) = selection.age_group {
        sites.retain(|s| s.age_groups.contains(&group));
    }
    if let Some(phase) = &selection.phase {
        sites.retain(|s| facet_value(s.phase.as_deref()) == normalized(phase));
    }
    if let Some(study_type) = &selection.study_type {
        sites.retain(|s| facet_value(s.study_type.as_deref()) == normalized(study_type));
    }
    if let Some(gender) = &selection.gender {
        // Equality only; "ALL" rows do not implicitly satisfy FEMALE/MALE.
        sites.retain(|s| s.gender == normalized(gender));
    }
    if let Some(status) = &selection.status {
        sites.retain(|s| facet_value(s.overall_status.as_deref()) == normalized(status));
    }
    sites
}

fn facet_value(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.trim().to_ascii_uppercase(),
        _ => "N/A".to_string(),
    }
}

fn normalized(value: &str) -> String {
    value.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn site(nct: &str, distance: f64, phase: Option<&str>, gender: &str) -> RankedSite {
        RankedSite {
            nct_id: nct.into(),
            facility_name: None,
            city: None,
            state: None,
            zip: None,
            latitude: 0.0,
            longitude: 0.0,
            distance_miles: distance,
            similarity: 0.9,
            overall_status: Some("RECRUITING".into()),
            phase: phase.map(str::to_string),
            study_type: Some("INTERVENTIONAL".into()),
            gender: gender.into(),
            min_age_years: 18.0,
            max_age_years: 64.0,
            age_groups: BTreeSet::from([AgeGroup::Adult]),
        }
    }

    #[test]
    fn stages_narrow_in_order() {
        let sites = vec![
            site("NCT001", 10.0, Some("PHASE2"), "ALL"),
            site("NCT002", 80.0, Some("PHASE2"), "ALL"),
            site("NCT003", 10.0, Some("PHASE3"), "ALL"),
            site("NCT004", 10.0, Some("PHASE2"), "FEMALE"),
        ];
        let selection = FacetSelection {
            max_distance_miles: Some(50.0),
            phase: Some("Phase2".into()),
            gender: Some("all".into()),
            ..Default::default()
        };
        let filtered = apply(sites, &selection);
        let ids: Vec<&str> = filtered.iter().map(|s| s.nct_id.as_str()).collect();
        assert_eq!(ids, vec!["NCT001"]);
    }

    #[test]
    fn missing_phase_matches_na_selection() {
        let sites = vec![
            site("NCT001", 10.0, None, "ALL"),
            site("NCT002", 10.0, Some("PHASE1"), "ALL"),
        ];
        let selection = FacetSelection {
            phase: Some("N/A".into()),
            ..Default::default()
        };
        let filtered = apply(sites, &selection);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].nct_id, "NCT001");
    }

    #[test]
    fn all_rows_do_not_satisfy_female() {
        let sites = vec![site("NCT001", 10.0, None, "ALL")];
        let selection = FacetSelection {
            gender: Some("FEMALE".into()),
            ..Default::default()
        };
        assert!(apply(sites, &selection).is_empty());
    }

    #[test]
    fn empty_selection_is_identity_and_apply_is_idempotent() {
        let sites = vec![
            site("NCT001", 10.0, Some("PHASE2"), "ALL"),
            site("NCT002", 200.0, None, "MALE"),
        ];
        let selection = FacetSelection {
            max_distance_miles: Some(100.0),
            ..Default::default()
        };
        let once = apply(sites.clone(), &selection);
        let twice = apply(once.clone(), &selection);
        assert_eq!(once.len(), twice.len());

        let untouched = apply(sites.clone(), &FacetSelection::default());
        assert_eq!(untouched.len(), sites.len());
    }
}
