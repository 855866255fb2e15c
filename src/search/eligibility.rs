//! Age parsing and eligibility facet derivation.

use std::collections::BTreeSet;

use clap::ValueEnum;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Age assumed when a trial states no lower bound.
pub const DEFAULT_MIN_AGE_YEARS: f64 = 0.0;
/// Age assumed when a trial states no upper bound.
pub const DEFAULT_MAX_AGE_YEARS: f64 = 120.0;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
pub enum AgeGroup {
    Child,
    Adult,
    Senior,
}

static AGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)\s+([A-Za-z]+)\s*$").expect("valid age regex"));

/// Parse a `"<number> <unit>"` age expression into years.
///
/// Units are matched case-insensitively by prefix ("Year" matches "Years").
/// Months, weeks, and days all collapse to 0 years; sub-year precision is
/// deliberately not retained. `"N/A"`, missing, or malformed input is `None`.
pub fn parse_age_years(text: Option<&str>) -> Option<f64> {
    let text = text?;
    if text.trim().eq_ignore_ascii_case("n/a") {
        return None;
    }
    let caps = AGE_RE.captures(text)?;
    let value: f64 = caps[1].parse().ok()?;
    let unit = caps[2].to_ascii_lowercase();
    if "years".starts_with(&unit) {
        Some(value)
    } else if "months".starts_with(&unit) || "weeks".starts_with(&unit) || "days".starts_with(&unit)
    {
        Some(0.0)
    } else {
        None
    }
}

/// Derive the age groups a trial is open to from its textual age bounds.
///
/// Missing or unparseable bounds default to 0 and 120 years, so a trial with
/// no stated bounds is open to all three groups. The bands intentionally
/// overlap at 17/18 and 64/65: a 10-70 trial is Child, Adult, and Senior at
/// once, and stays visible under any single-band filter.
pub fn age_groups(min_age: Option<&str>, max_age: Option<&str>) -> BTreeSet<AgeGroup> {
    let min = parse_age_years(min_age).unwrap_or(DEFAULT_MIN_AGE_YEARS);
    let max = parse_age_years(max_age).unwrap_or(DEFAULT_MAX_AGE_YEARS);
    groups_for_bounds(min, max)
}

/// Banding over already-parsed numeric bounds.
pub fn groups_for_bounds(min: f64, max: f64) -> BTreeSet<AgeGroup> {
    let mut groups = BTreeSet::new();
    if min <= 17.0 && max >= 0.0 {
        groups.insert(AgeGroup::Child);
    }
    if min <= 65.0 && max >= 18.0 {
        groups.insert(AgeGroup::Adult);
    }
    if max >= 65.0 {
        groups.insert(AgeGroup::Senior);
    }
    groups
}

/// Uppercase the stored gender; absent values mean no restriction.
pub fn normalize_gender(gender: Option<&str>) -> String {
    match gender {
        Some(g) if !g.trim().is_empty() => g.trim().to_ascii_uppercase(),
        _ => "ALL".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn years_pass_through() {
        assert_eq!(parse_age_years(Some("18 Years")), Some(18.0));
        assert_eq!(parse_age_years(Some("65 years")), Some(65.0));
        assert_eq!(parse_age_years(Some("1 Year")), Some(1.0));
    }

    #[test]
    fn sub_year_units_collapse_to_zero() {
        assert_eq!(parse_age_years(Some("6 Months")), Some(0.0));
        assert_eq!(parse_age_years(Some("2 Weeks")), Some(0.0));
        assert_eq!(parse_age_years(Some("30 Days")), Some(0.0));
    }

    #[test]
    fn missing_and_malformed_are_none() {
        assert_eq!(parse_age_years(Some("N/A")), None);
        assert_eq!(parse_age_years(Some("eighteen years")), None);
        assert_eq!(parse_age_years(Some("18")), None);
        assert_eq!(parse_age_years(None), None);
    }

    #[test]
    fn single_band_classification() {
        use AgeGroup::*;
        assert_eq!(
            age_groups(Some("0 Years"), Some("17 Years")),
            BTreeSet::from([Child])
        );
        assert_eq!(
            age_groups(Some("18 Years"), Some("64 Years")),
            BTreeSet::from([Adult])
        );
        assert_eq!(
            age_groups(Some("65 Years"), Some("120 Years")),
            BTreeSet::from([Senior])
        );
    }

    #[test]
    fn wide_span_lands_in_every_band() {
        use AgeGroup::*;
        assert_eq!(
            age_groups(Some("10 Years"), Some("70 Years")),
            BTreeSet::from([Child, Adult, Senior])
        );
        assert_eq!(age_groups(None, None), BTreeSet::from([Child, Adult, Senior]));
    }

    #[test]
    fn unparseable_bound_acts_like_missing() {
        use AgeGroup::*;
        assert_eq!(
            age_groups(Some("N/A"), Some("17 Years")),
            BTreeSet::from([Child])
        );
    }

    #[test]
    fn gender_normalization() {
        assert_eq!(normalize_gender(Some("Female")), "FEMALE");
        assert_eq!(normalize_gender(Some("  all ")), "ALL");
        assert_eq!(normalize_gender(Some("")), "ALL");
        assert_eq!(normalize_gender(None), "ALL");
    }
}
