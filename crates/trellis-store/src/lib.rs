use thiserror::Error;
use trellis_core::{EdgeContext, Product, ProductFilter, ProductId, RecommendationKind, SimilarEdge};

mod sqlite;

pub use sqlite::SqliteCatalogStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Storage contract the construction and ranking pipeline issues against.
/// Writes are non-transactional; [`CatalogStore::wipe`] before a rebuild
/// is the idempotency mechanism.
pub trait CatalogStore {
    fn wipe(&self) -> Result<(), StoreError>;

    fn insert_products(&self, products: &[Product]) -> Result<(), StoreError>;

    fn insert_edges(&self, edges: &[SimilarEdge]) -> Result<(), StoreError>;

    fn set_pagerank(&self, product_id: &str, score: f64) -> Result<(), StoreError>;

    fn product(&self, product_id: &str) -> Result<Option<Product>, StoreError>;

    fn product_count(&self) -> Result<u64, StoreError>;

    fn edge_count(&self) -> Result<u64, StoreError>;

    fn edges(&self) -> Result<Vec<SimilarEdge>, StoreError>;

    /// Every persisted edge joined with the source's out-degree and the
    /// target's in-degree. Input of the weight synthesis.
    fn edge_contexts(&self) -> Result<Vec<EdgeContext>, StoreError>;

    /// Rank-ordered products matching the nullable filter triple: gender
    /// and color by case-insensitive equality, the product type by
    /// substring against name and description. `None` returns every match.
    fn find_products(
        &self,
        filter: &ProductFilter,
        limit: Option<u32>,
    ) -> Result<Vec<Product>, StoreError>;

    /// Number of outgoing similarity edges at or above a score floor.
    fn similar_count(&self, product_id: &str, min_score: i64) -> Result<u32, StoreError>;

    /// Names of the top outgoing neighbours, by (score desc, target asc).
    fn similar_names(&self, product_id: &str, limit: u32) -> Result<Vec<String>, StoreError>;

    fn reset_recommendations(&self) -> Result<(), StoreError>;

    fn mark_recommendations(
        &self,
        product_ids: &[ProductId],
        kind: RecommendationKind,
    ) -> Result<(), StoreError>;

    fn top_by_pagerank(
        &self,
        exclude: &[ProductId],
        limit: u32,
    ) -> Result<Vec<Product>, StoreError>;
}
