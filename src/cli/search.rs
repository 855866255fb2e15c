//! CLI entry-point for running a one-shot search.

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::{info, instrument};

use crate::{
    config::Settings,
    search::{
        eligibility::AgeGroup, filters::FacetSelection, ranker::RankedSite, SearchEngine,
        SearchQuery,
    },
};

/// Args for the `search` sub-command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// Medical condition or disease, e.g. "Breast Cancer".
    #[arg(long)]
    pub condition: String,
    /// Free-text location, e.g. "Boston, MA" or a ZIP code.
    #[arg(long)]
    pub location: String,
    /// Maximum distance in miles (default 250).
    #[arg(long)]
    pub max_distance: Option<f64>,
    /// Only trials in this phase, e.g. PHASE2 (N/A for unphased trials).
    #[arg(long)]
    pub phase: Option<String>,
    /// Only trials of this study type, e.g. INTERVENTIONAL.
    #[arg(long)]
    pub study_type: Option<String>,
    /// Only trials with this sex eligibility, e.g. FEMALE.
    #[arg(long)]
    pub gender: Option<String>,
    /// Only trials with this recruitment status, e.g. RECRUITING.
    #[arg(long)]
    pub status: Option<String>,
    /// Only trials open to this age group.
    #[arg(long, value_enum)]
    pub age_group: Option<AgeGroup>,
    /// Print the full outcome as JSON instead of a site table.
    #[arg(long)]
    pub json: bool,
}

#[instrument(skip(args, settings), fields(condition = %args.condition, location = %args.location))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    let engine = SearchEngine::from_settings(&settings)?;
    let query = SearchQuery {
        condition: args.condition.clone(),
        location: args.location.clone(),
        max_distance_miles: args.max_distance,
        facets: FacetSelection {
            max_distance_miles: None,
            age_group: args.age_group,
            phase: args.phase.clone(),
            study_type: args.study_type.clone(),
            gender: args.gender.clone(),
            status: args.status.clone(),
        },
    };
    let outcome = engine.search(query).await?;

    let export = settings.join_output("sites.csv");
    export_sites(&outcome.sites, &export)?;
    info!(path = %export.display(), sites = outcome.sites.len(), "exported ranked sites");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!("Condition: {}", outcome.condition);
    println!("Search terms: {}", outcome.synonyms.join(", "));
    match &outcome.location {
        Some(location) => println!("Location: {}", location.display_name),
        None => println!("Location: (not resolved; no matching trials)"),
    }
    if outcome.sites.is_empty() {
        println!("No trial sites found. Try a broader condition or distance.");
        return Ok(());
    }
    println!("{:<12} {:>9}  {:<28} {:<18} {:<10}", "NCT ID", "Miles", "Facility", "City", "Phase");
    for site in &outcome.sites {
        println!(
            "{:<12} {:>9.1}  {:<28} {:<18} {:<10}",
            site.nct_id,
            site.distance_miles,
            truncate(site.facility_name.as_deref().unwrap_or("-"), 28),
            truncate(site.city.as_deref().unwrap_or("-"), 18),
            site.phase.as_deref().unwrap_or("N/A"),
        );
    }
    Ok(())
}

fn export_sites(sites: &[RankedSite], path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("create {path:?}"))?;
    writer.write_record([
        "nct_id",
        "facility_name",
        "city",
        "state",
        "distance_miles",
        "similarity",
        "overall_status",
        "phase",
        "study_type",
        "gender",
        "age_groups",
    ])?;
    for site in sites {
        let age_groups = site
            .age_groups
            .iter()
            .map(|g| format!("{g:?}"))
            .collect::<Vec<_>>()
            .join("|");
        let distance = format!("{:.1}", site.distance_miles);
        let similarity = format!("{:.3}", site.similarity);
        writer.write_record([
            site.nct_id.as_str(),
            site.facility_name.as_deref().unwrap_or(""),
            site.city.as_deref().unwrap_or(""),
            site.state.as_deref().unwrap_or(""),
            distance.as_str(),
            similarity.as_str(),
            site.overall_status.as_deref().unwrap_or(""),
            site.phase.as_deref().unwrap_or("N/A"),
            site.study_type.as_deref().unwrap_or("N/A"),
            site.gender.as_str(),
            age_groups.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let cut: String = text.chars().take(width.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
