use std::fmt::Write as _;

use anyhow::{Context, Result};
use serde::Serialize;
use trellis_core::{Product, ProductId};
use trellis_store::CatalogStore;

use crate::intent;

const RESULT_LIMIT: usize = 5;
const SIMILAR_SCORE_FLOOR: i64 = 2;
const SIMILAR_ITEMS_SHOWN: u32 = 2;
const RANK_WEIGHT: f64 = 0.4;
const SIMILARITY_WEIGHT: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedProduct {
    #[serde(flatten)]
    pub product: Product,
    pub relevance: f64,
    pub similar_items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Retrieval {
    pub context: String,
    pub recommended_products: Vec<ProductId>,
    pub results: Vec<RetrievedProduct>,
}

/// Retrieves the products backing a free-text query and renders the
/// context block a downstream text generator would consume.
pub fn retrieve<S: CatalogStore>(store: &S, utterance: &str) -> Result<Retrieval> {
    let filter = intent::extract_filter(utterance);
    tracing::debug!(?filter, "extracted query filter");

    // The similarity component dominates the blend, so the cut to the top
    // results has to happen after scoring the full match set.
    let candidates = store
        .find_products(&filter, None)
        .context("product filter query failed")?;

    let mut scored = Vec::with_capacity(candidates.len());
    for product in candidates {
        let similar = store
            .similar_count(&product.product_id, SIMILAR_SCORE_FLOOR)
            .context("similar-neighbour count failed")?;
        let relevance =
            product.pagerank * RANK_WEIGHT + f64::from(similar) / 10.0 * SIMILARITY_WEIGHT;
        scored.push((product, relevance));
    }

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.product_id.cmp(&b.0.product_id))
    });
    scored.truncate(RESULT_LIMIT);

    let mut results = Vec::with_capacity(scored.len());
    for (product, relevance) in scored {
        let similar_items = store
            .similar_names(&product.product_id, SIMILAR_ITEMS_SHOWN)
            .context("similar-neighbour name lookup failed")?;
        results.push(RetrievedProduct {
            product,
            relevance,
            similar_items,
        });
    }

    let recommended_products: Vec<ProductId> = results
        .iter()
        .map(|r| r.product.product_id.clone())
        .collect();
    let context = render_context(&results);

    Ok(Retrieval {
        context,
        recommended_products,
        results,
    })
}

fn render_context(results: &[RetrievedProduct]) -> String {
    if results.is_empty() {
        return "No specific products found matching your criteria.".to_owned();
    }

    let mut context = String::from("Here are some relevant products I found:\n\n");
    for result in results {
        let product = &result.product;
        let _ = writeln!(context, "• {}", product.name);
        let _ = writeln!(context, "  Brand: {}", product.brand);
        let _ = writeln!(context, "  Gender: {}", product.gender);
        let _ = writeln!(context, "  Price: ₹{}", product.price);
        let _ = writeln!(context, "  Color: {}", product.color);
        if !result.similar_items.is_empty() {
            let _ = writeln!(context, "  Similar items: {}", result.similar_items.join(", "));
        }
        context.push('\n');
    }

    let avg_relevance =
        results.iter().map(|r| r.relevance).sum::<f64>() / results.len() as f64;
    let _ = writeln!(context, "Recommendation confidence: {:.2}%", avg_relevance * 100.0);

    context
}
