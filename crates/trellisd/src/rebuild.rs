use std::path::Path;

use anyhow::{Context, Result};
use trellis_build::{BuilderConfig, build_graph};
use trellis_config::TrellisConfig;
use trellis_rank::{PropagationConfig, persist_scores, propagate, synthesize_edges};
use trellis_store::CatalogStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildOutcome {
    pub products: usize,
    pub edges: usize,
    pub ranked: usize,
}

/// Full pipeline: wipe, construct the similarity graph, derive weights,
/// rank, persist. Concurrent rebuilds against one store are not supported.
pub fn run_rebuild<S: CatalogStore>(
    store: &S,
    catalog_path: &Path,
    config: &TrellisConfig,
) -> Result<RebuildOutcome> {
    let records = crate::catalog::load_catalog(catalog_path).context("catalog ingestion failed")?;

    store.wipe().context("wiping previous graph failed")?;

    let builder_config = BuilderConfig {
        policy: config.build.policy,
        batch_size: config.build.batch_size,
    };
    let summary =
        build_graph(store, records, &builder_config).context("graph construction failed")?;

    let contexts = store
        .edge_contexts()
        .context("reading edges for weight synthesis failed")?;
    let weighted = synthesize_edges(&contexts);

    let scores = propagate(
        &weighted,
        PropagationConfig {
            damping: config.rank.damping,
            max_iterations: config.rank.max_iterations,
            tolerance: config.rank.tolerance,
        },
    );

    let persisted = persist_scores(store, &scores).context("rank persistence failed")?;

    tracing::info!(
        products = summary.products,
        edges = summary.edges,
        ranked = persisted.written,
        "rebuild complete"
    );

    Ok(RebuildOutcome {
        products: summary.products,
        edges: summary.edges,
        ranked: persisted.written,
    })
}
