//! CLI entry-point for the index ingestion job.

use anyhow::Result;
use tracing::instrument;

use crate::{config::Settings, data::store::ParquetStore, embed, index};

#[instrument(skip(settings))]
pub async fn run(settings: Settings) -> Result<()> {
    let store = ParquetStore::open(&settings)?;
    let embedder = embed::default_embedder()?;
    index::build::run(&settings, &store, embedder.as_ref())
}
