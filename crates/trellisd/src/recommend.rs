use std::collections::HashSet;

use anyhow::{Context, Result};
use serde::Serialize;
use trellis_core::{Product, ProductId, RecommendationKind};
use trellis_store::CatalogStore;

const DEFAULT_LIMIT: u32 = 50;
const PAGERANK_PICKS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub num_recommendations: usize,
    pub num_relevant: usize,
    pub true_positives: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendations {
    pub products: Vec<Product>,
    pub metrics: Option<Metrics>,
}

/// Marks the externally recommended ids as `ai`, supplements them with
/// the top rank-scored products, and evaluates the rank picks. Without
/// any external ids the pass degrades to a rank listing with no metrics.
pub fn run_recommendation<S: CatalogStore>(
    store: &S,
    ai_ids: &[ProductId],
) -> Result<Recommendations> {
    store
        .reset_recommendations()
        .context("resetting recommendation tags failed")?;

    if ai_ids.is_empty() {
        let products = store
            .top_by_pagerank(&[], DEFAULT_LIMIT)
            .context("rank-ordered listing failed")?;
        return Ok(Recommendations {
            products,
            metrics: None,
        });
    }

    let mut products = Vec::new();
    for product_id in ai_ids {
        if let Some(mut product) = store
            .product(product_id)
            .context("loading recommended product failed")?
        {
            product.recommendation = RecommendationKind::Ai;
            products.push(product);
        } else {
            tracing::warn!(product_id = %product_id, "recommended id not in catalog");
        }
    }
    store
        .mark_recommendations(ai_ids, RecommendationKind::Ai)
        .context("marking ai recommendations failed")?;

    let mut rank_picks = store
        .top_by_pagerank(ai_ids, PAGERANK_PICKS)
        .context("rank recommendations failed")?;
    let pick_ids: Vec<ProductId> = rank_picks.iter().map(|p| p.product_id.clone()).collect();
    for pick in &mut rank_picks {
        pick.recommendation = RecommendationKind::Pagerank;
    }
    store
        .mark_recommendations(&pick_ids, RecommendationKind::Pagerank)
        .context("marking rank recommendations failed")?;

    let metrics = evaluate_picks(store, &pick_ids).context("computing rank metrics failed")?;

    products.extend(rank_picks);
    Ok(Recommendations {
        products,
        metrics: Some(metrics),
    })
}

// A pick's neighbourhood is the set of same-gender targets it shares a
// brand or color with; a pick is a true positive when it also appears in
// some pick's neighbourhood.
fn evaluate_picks<S: CatalogStore>(store: &S, pick_ids: &[ProductId]) -> Result<Metrics> {
    let picks: HashSet<&str> = pick_ids.iter().map(String::as_str).collect();

    let mut relevant: HashSet<ProductId> = HashSet::new();
    for edge in store.edges().context("edge scan failed")? {
        if picks.contains(edge.source.as_str())
            && edge.same_gender
            && (edge.same_brand || edge.same_color)
        {
            relevant.insert(edge.target.clone());
        }
    }

    let num_recommendations = pick_ids.len();
    let num_relevant = relevant.len();
    let true_positives = pick_ids
        .iter()
        .filter(|id| relevant.contains(id.as_str()))
        .count();

    let precision = if num_recommendations > 0 {
        true_positives as f64 / num_recommendations as f64
    } else {
        0.0
    };
    let recall = if num_relevant > 0 {
        true_positives as f64 / num_relevant as f64
    } else {
        0.0
    };
    let f1_score = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    Ok(Metrics {
        precision,
        recall,
        f1_score,
        num_recommendations,
        num_relevant,
        true_positives,
    })
}

#[cfg(test)]
mod tests {
    use trellis_core::SimilarEdge;
    use trellis_store::SqliteCatalogStore;

    use super::*;

    fn product(id: &str, rank: f64) -> Product {
        let mut product = Product::new(
            id,
            format!("Item {id}"),
            "Roadster",
            "Men",
            999.0,
            "Blue",
            "",
            2,
        );
        product.pagerank = rank;
        product
    }

    fn edge(source: &str, target: &str) -> SimilarEdge {
        SimilarEdge {
            source: source.to_owned(),
            target: target.to_owned(),
            same_brand: true,
            same_gender: true,
            same_color: false,
            price_diff: 50.0,
            similarity_score: 3,
        }
    }

    fn seeded_store() -> SqliteCatalogStore {
        let store = SqliteCatalogStore::open_in_memory().expect("open store");
        store
            .insert_products(&[
                product("1", 1.0),
                product("2", 0.8),
                product("3", 0.6),
                product("4", 0.4),
            ])
            .expect("insert products");
        store
            .insert_edges(&[edge("1", "2"), edge("2", "3")])
            .expect("insert edges");
        store
    }

    #[test]
    fn empty_ai_ids_degrade_to_rank_listing_without_metrics() {
        let store = seeded_store();
        let recommendations = run_recommendation(&store, &[]).expect("recommend");

        assert!(recommendations.metrics.is_none());
        let ids: Vec<&str> = recommendations
            .products
            .iter()
            .map(|p| p.product_id.as_str())
            .collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
        assert!(recommendations
            .products
            .iter()
            .all(|p| p.recommendation == RecommendationKind::Other));
    }

    #[test]
    fn ai_ids_are_marked_and_supplemented_with_rank_picks() {
        let store = seeded_store();
        let recommendations =
            run_recommendation(&store, &["3".to_owned()]).expect("recommend");

        let ai = &recommendations.products[0];
        assert_eq!(ai.product_id, "3");
        assert_eq!(ai.recommendation, RecommendationKind::Ai);

        let pick_ids: Vec<&str> = recommendations.products[1..]
            .iter()
            .map(|p| p.product_id.as_str())
            .collect();
        assert_eq!(pick_ids, vec!["1", "2", "4"]);
        assert!(recommendations.products[1..]
            .iter()
            .all(|p| p.recommendation == RecommendationKind::Pagerank));

        // The store reflects the same tags.
        let stored = store.product("3").expect("query").expect("present");
        assert_eq!(stored.recommendation, RecommendationKind::Ai);
        let stored = store.product("1").expect("query").expect("present");
        assert_eq!(stored.recommendation, RecommendationKind::Pagerank);
    }

    #[test]
    fn metrics_count_picks_inside_pick_neighbourhoods() {
        let store = seeded_store();
        let recommendations =
            run_recommendation(&store, &["4".to_owned()]).expect("recommend");

        let metrics = recommendations.metrics.expect("metrics present");
        // Picks are 1, 2, 3. Neighbourhoods: 1 -> {2}, 2 -> {3}. Both 2
        // and 3 are themselves picks: 2 true positives over 3 picks and
        // 2 relevant products.
        assert_eq!(metrics.num_recommendations, 3);
        assert_eq!(metrics.num_relevant, 2);
        assert_eq!(metrics.true_positives, 2);
        assert!((metrics.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((metrics.recall - 1.0).abs() < 1e-12);
        assert!(metrics.f1_score > 0.0);
    }

    #[test]
    fn unknown_ai_ids_are_skipped_but_do_not_fail_the_pass() {
        let store = seeded_store();
        let recommendations =
            run_recommendation(&store, &["99".to_owned()]).expect("recommend");

        // No ai product could be loaded; the rank picks still come back.
        assert!(recommendations
            .products
            .iter()
            .all(|p| p.recommendation == RecommendationKind::Pagerank));
        assert!(recommendations.metrics.is_some());
    }
}
