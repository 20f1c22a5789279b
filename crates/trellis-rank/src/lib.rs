use std::collections::BTreeMap;

use trellis_core::{EdgeContext, ProductId};
use trellis_store::{CatalogStore, StoreError};

mod propagate;
mod weight;

pub use propagate::{PropagationConfig, propagate};
pub use weight::synthesize_weight;

#[derive(Debug, Clone, PartialEq)]
pub struct WeightedEdge {
    pub source: ProductId,
    pub target: ProductId,
    pub weight: f64,
}

pub fn synthesize_edges(contexts: &[EdgeContext]) -> Vec<WeightedEdge> {
    contexts
        .iter()
        .map(|ctx| WeightedEdge {
            source: ctx.source.clone(),
            target: ctx.target.clone(),
            weight: synthesize_weight(ctx),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PersistOutcome {
    pub written: usize,
    pub failed: usize,
}

/// Writes scores back best-effort: a failed write is logged and counted
/// but does not stop the rest. Unscored products keep their stored rank.
pub fn persist_scores<S: CatalogStore>(
    store: &S,
    scores: &BTreeMap<ProductId, f64>,
) -> Result<PersistOutcome, StoreError> {
    let mut outcome = PersistOutcome::default();

    for (product_id, score) in scores {
        match store.set_pagerank(product_id, *score) {
            Ok(()) => outcome.written += 1,
            Err(err) => {
                tracing::warn!(product_id = %product_id, error = %err, "rank write failed");
                outcome.failed += 1;
            }
        }
    }

    tracing::info!(
        written = outcome.written,
        failed = outcome.failed,
        "persisted rank scores"
    );

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use trellis_core::Product;
    use trellis_store::SqliteCatalogStore;

    use super::*;

    fn context(source: &str, target: &str) -> EdgeContext {
        EdgeContext {
            source: source.to_owned(),
            target: target.to_owned(),
            same_brand: true,
            same_gender: true,
            same_color: false,
            price_diff: 100.0,
            source_out_degree: 1,
            target_in_degree: 1,
        }
    }

    #[test]
    fn synthesize_edges_maps_every_context() {
        let edges = synthesize_edges(&[context("1", "2"), context("2", "3")]);

        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].source, "1");
        assert_eq!(edges[0].target, "2");
        assert!(edges.iter().all(|edge| edge.weight > 0.0));
    }

    #[test]
    fn persist_scores_overwrites_scored_products_only() {
        let store = SqliteCatalogStore::open_in_memory().expect("open store");
        store
            .insert_products(&[
                Product::new("1", "a", "b", "Men", 100.0, "Blue", "", 1),
                Product::new("2", "a", "b", "Men", 100.0, "Blue", "", 1),
            ])
            .expect("insert products");

        let scores = BTreeMap::from([("1".to_owned(), 1.0)]);
        let outcome = persist_scores(&store, &scores).expect("persist");

        assert_eq!(outcome.written, 1);
        assert_eq!(outcome.failed, 0);

        let scored = store.product("1").expect("query").expect("present");
        assert_eq!(scored.pagerank, 1.0);
        let untouched = store.product("2").expect("query").expect("present");
        assert_eq!(untouched.pagerank, trellis_core::DEFAULT_PAGERANK);
    }
}
