//! Runtime configuration utilities for trial-scout.

use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;

/// Application configuration resolved from `.env` and defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Root folder for the trial store and index snapshots.
    pub data_dir: PathBuf,
    /// Root folder for search exports.
    pub outputs_dir: PathBuf,
    /// Base URL of the Nominatim-compatible geocoding service.
    pub geocoder_url: String,
    /// Contact email sent with geocoding requests (usage-policy courtesy).
    pub geocoder_email: String,
    /// Comma separated ISO country codes the geocoder is restricted to.
    pub geocoder_countries: String,
    /// Base URL of the OpenAI-compatible chat-completions API.
    pub synonym_api_url: String,
    /// API key for the synonym expander; absent key degrades to verbatim-only.
    pub synonym_api_key: Option<String>,
    /// Chat model used for synonym expansion.
    pub synonym_model: String,
    /// Cosine similarity threshold for condition matching.
    pub similarity_threshold: f32,
    /// Default search radius in miles.
    pub max_distance_miles: f64,
    /// Maximum number of ranked sites returned per search.
    pub result_cap: usize,
    /// Maximum synonym list length, verbatim term included.
    pub max_synonyms: usize,
    /// Attempts per external call before reporting a service unavailable.
    pub retry_attempts: u32,
    /// Base backoff between retries, in milliseconds.
    pub retry_backoff_ms: u64,
}

impl Settings {
    /// Load configuration from environment with reasonable defaults.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let data_dir = env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));
        let outputs_dir = env::var("OUTPUTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./outputs"));
        let geocoder_url = env::var("GEOCODER_URL")
            .unwrap_or_else(|_| "https://nominatim.openstreetmap.org".to_string());
        let geocoder_email =
            env::var("GEOCODER_EMAIL").unwrap_or_else(|_| "research@example.com".to_string());
        let geocoder_countries = env::var("GEOCODER_COUNTRIES").unwrap_or_else(|_| "us".to_string());
        let synonym_api_url = env::var("SYNONYM_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let synonym_api_key = env::var("SYNONYM_API_KEY").ok();
        let synonym_model =
            env::var("SYNONYM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let similarity_threshold = parse_env("SIMILARITY_THRESHOLD", 0.80f32);
        let max_distance_miles = parse_env("MAX_DISTANCE_MILES", 250.0f64);
        let result_cap = parse_env("RESULT_CAP", 100usize);
        let max_synonyms = parse_env("MAX_SYNONYMS", 11usize);
        let retry_attempts = parse_env("RETRY_ATTEMPTS", 3u32);
        let retry_backoff_ms = parse_env("RETRY_BACKOFF_MS", 500u64);

        std::fs::create_dir_all(&data_dir).context("creating data dir")?;
        std::fs::create_dir_all(&outputs_dir).context("creating outputs dir")?;

        Ok(Self {
            data_dir,
            outputs_dir,
            geocoder_url,
            geocoder_email,
            geocoder_countries,
            synonym_api_url,
            synonym_api_key,
            synonym_model,
            similarity_threshold,
            max_distance_miles,
            result_cap,
            max_synonyms,
            retry_attempts,
            retry_backoff_ms,
        })
    }

    /// Convenience helper for derived data path segments.
    pub fn join_data<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.data_dir.join(path)
    }

    /// Convenience helper for derived output path segments.
    pub fn join_output<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.outputs_dir.join(path)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
