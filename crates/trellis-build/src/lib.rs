use std::collections::{HashMap, HashSet};

use thiserror::Error;
use trellis_core::similarity::{
    MAX_EDGES_PER_SOURCE, SimilarityPolicy, score_pair,
};
use trellis_core::{Product, SimilarEdge};
use trellis_store::{CatalogStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderConfig {
    pub policy: SimilarityPolicy,
    pub batch_size: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            policy: SimilarityPolicy::default(),
            batch_size: 100,
        }
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("batch size must be non-zero")]
    InvalidBatchSize,
    #[error("graph construction failed: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuildSummary {
    pub products: usize,
    pub edges: usize,
    pub batches: usize,
}

/// Candidate lookup keyed by the attributes the predicates filter on.
/// A pair can only reach either policy's threshold when at least one of
/// brand, gender or color matches, so the buckets replace a full sweep.
#[derive(Default)]
struct AttributeIndex {
    products: Vec<Product>,
    by_brand: HashMap<String, Vec<usize>>,
    by_gender: HashMap<String, Vec<usize>>,
    by_color: HashMap<String, Vec<usize>>,
}

impl AttributeIndex {
    fn insert(&mut self, product: Product) {
        let slot = self.products.len();
        self.by_brand
            .entry(product.brand.clone())
            .or_default()
            .push(slot);
        self.by_gender
            .entry(product.gender.clone())
            .or_default()
            .push(slot);
        self.by_color
            .entry(product.color.clone())
            .or_default()
            .push(slot);
        self.products.push(product);
    }

    // Under the gender-gated policy only the gender bucket can yield edges.
    fn candidates(&self, product: &Product, policy: SimilarityPolicy) -> Vec<usize> {
        let mut seen = HashSet::new();

        let buckets: [Option<&Vec<usize>>; 3] = match policy {
            SimilarityPolicy::FirstPass => [
                self.by_brand.get(&product.brand),
                self.by_gender.get(&product.gender),
                self.by_color.get(&product.color),
            ],
            SimilarityPolicy::GenderGated => [self.by_gender.get(&product.gender), None, None],
        };

        for bucket in buckets.into_iter().flatten() {
            for &slot in bucket {
                seen.insert(slot);
            }
        }

        seen.into_iter().collect()
    }
}

/// Builds the similarity graph. Each batch is scored against the entire
/// node set built so far (itself included); per source, threshold-passing
/// pairs are kept by (score desc, target id asc) and capped at
/// [`MAX_EDGES_PER_SOURCE`], always from the smaller id to the larger.
pub fn build_graph<S: CatalogStore>(
    store: &S,
    records: Vec<Product>,
    config: &BuilderConfig,
) -> Result<BuildSummary, BuildError> {
    if config.batch_size == 0 {
        return Err(BuildError::InvalidBatchSize);
    }

    let mut summary = BuildSummary {
        products: records.len(),
        ..BuildSummary::default()
    };
    let total_batches = records.len().div_ceil(config.batch_size);
    let mut index = AttributeIndex::default();

    let mut remaining = records;
    while !remaining.is_empty() {
        let split = remaining.len().min(config.batch_size);
        let batch: Vec<Product> = remaining.drain(..split).collect();
        summary.batches += 1;

        store.insert_products(&batch)?;
        let batch_start = index.products.len();
        for product in batch {
            index.insert(product);
        }

        let mut edges = Vec::new();
        for p1 in &index.products[batch_start..] {
            edges.extend(score_source(&index, p1, config.policy));
        }

        store.insert_edges(&edges)?;
        summary.edges += edges.len();

        tracing::info!(
            batch = summary.batches,
            total_batches,
            edges = edges.len(),
            "processed batch"
        );
    }

    tracing::info!(
        products = summary.products,
        edges = summary.edges,
        policy = config.policy.as_str(),
        "graph construction complete"
    );

    Ok(summary)
}

fn score_source(index: &AttributeIndex, p1: &Product, policy: SimilarityPolicy) -> Vec<SimilarEdge> {
    let mut scored: Vec<SimilarEdge> = index
        .candidates(p1, policy)
        .into_iter()
        .map(|slot| &index.products[slot])
        .filter(|p2| p2.product_id > p1.product_id)
        .filter_map(|p2| {
            score_pair(policy, p1, p2)
                .map(|matched| matched.into_edge(p1.product_id.clone(), p2.product_id.clone()))
        })
        .collect();

    scored.sort_by(|a, b| {
        b.similarity_score
            .cmp(&a.similarity_score)
            .then_with(|| a.target.cmp(&b.target))
    });
    scored.truncate(MAX_EDGES_PER_SOURCE);
    scored
}
