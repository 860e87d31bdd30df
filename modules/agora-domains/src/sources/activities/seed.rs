use anyhow::Result;
use tracing::info;

use agora_core::PipelineDeps;

use crate::sources::Source;

/// Sync the source registry from the `[[sources]]` entries in the config
/// file. Existing rows are updated in place (keyed on URL), new ones are
/// inserted. Returns the number of entries processed.
pub async fn seed_sources(deps: &PipelineDeps) -> Result<usize> {
    let seeds = &deps.file_config.sources;
    if seeds.is_empty() {
        info!("no sources configured, nothing to seed");
        return Ok(0);
    }

    for seed in seeds {
        let source = Source::upsert_seed(seed, deps.pool()).await?;
        info!(source = %source.name, url = %source.url, "seeded source");
    }

    info!(count = seeds.len(), "source registry synced");
    Ok(seeds.len())
}
