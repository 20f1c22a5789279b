use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, Row, params};
use trellis_core::{EdgeContext, Product, ProductFilter, ProductId, RecommendationKind, SimilarEdge};

use super::{CatalogStore, StoreError};

pub const CATALOG_FILE_NAME: &str = "catalog.sqlite";

pub struct SqliteCatalogStore {
    conn: Connection,
}

impl SqliteCatalogStore {
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)?;

        let conn = Connection::open(data_dir.join(CATALOG_FILE_NAME))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        run_migrations(&conn)?;

        tracing::debug!(data_dir = %data_dir.display(), "opened catalog store");
        Ok(Self { conn })
    }

    /// In-memory store for tests and one-shot runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }
}

impl CatalogStore for SqliteCatalogStore {
    fn wipe(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch("DELETE FROM similar_edges; DELETE FROM products;")?;
        Ok(())
    }

    fn insert_products(&self, products: &[Product]) -> Result<(), StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            INSERT INTO products (
                product_id, name, brand, gender, price, color, description,
                num_images, pagerank, recommendation
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )?;

        for product in products {
            stmt.execute(params![
                product.product_id,
                product.name,
                product.brand,
                product.gender,
                product.price,
                product.color,
                product.description,
                product.num_images,
                product.pagerank,
                product.recommendation.as_str(),
            ])?;
        }

        Ok(())
    }

    fn insert_edges(&self, edges: &[SimilarEdge]) -> Result<(), StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            INSERT INTO similar_edges (
                source, target, same_brand, same_gender, same_color,
                price_diff, similarity_score
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )?;

        for edge in edges {
            stmt.execute(params![
                edge.source,
                edge.target,
                edge.same_brand,
                edge.same_gender,
                edge.same_color,
                edge.price_diff,
                edge.similarity_score,
            ])?;
        }

        Ok(())
    }

    fn set_pagerank(&self, product_id: &str, score: f64) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE products SET pagerank = ?2 WHERE product_id = ?1",
            params![product_id, score],
        )?;
        Ok(())
    }

    fn product(&self, product_id: &str) -> Result<Option<Product>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT product_id, name, brand, gender, price, color, description,
                   num_images, pagerank, recommendation
            FROM products
            WHERE product_id = ?1
            "#,
        )?;

        let product = stmt
            .query_row(params![product_id], product_from_row)
            .optional()?;
        Ok(product)
    }

    fn product_count(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn edge_count(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM similar_edges", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn edges(&self) -> Result<Vec<SimilarEdge>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT source, target, same_brand, same_gender, same_color,
                   price_diff, similarity_score
            FROM similar_edges
            ORDER BY source ASC, target ASC
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(SimilarEdge {
                source: row.get(0)?,
                target: row.get(1)?,
                same_brand: row.get(2)?,
                same_gender: row.get(3)?,
                same_color: row.get(4)?,
                price_diff: row.get(5)?,
                similarity_score: row.get(6)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn edge_contexts(&self) -> Result<Vec<EdgeContext>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT e.source, e.target, e.same_brand, e.same_gender, e.same_color, e.price_diff,
                   (SELECT COUNT(*) FROM similar_edges o WHERE o.source = e.source),
                   (SELECT COUNT(*) FROM similar_edges i WHERE i.target = e.target)
            FROM similar_edges e
            ORDER BY e.source ASC, e.target ASC
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(EdgeContext {
                source: row.get(0)?,
                target: row.get(1)?,
                same_brand: row.get(2)?,
                same_gender: row.get(3)?,
                same_color: row.get(4)?,
                price_diff: row.get(5)?,
                source_out_degree: row.get::<_, i64>(6)? as u32,
                target_in_degree: row.get::<_, i64>(7)? as u32,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn find_products(
        &self,
        filter: &ProductFilter,
        limit: Option<u32>,
    ) -> Result<Vec<Product>, StoreError> {
        let gender = filter.gender.as_deref().map(str::to_lowercase);
        let color = filter.color.as_deref().map(str::to_lowercase);
        let product_type = filter.product_type.as_deref().map(str::to_lowercase);
        // A negative LIMIT disables it.
        let limit = limit.map_or(-1, i64::from);

        let mut stmt = self.conn.prepare(
            r#"
            SELECT product_id, name, brand, gender, price, color, description,
                   num_images, pagerank, recommendation
            FROM products
            WHERE (?1 IS NULL OR LOWER(gender) = ?1)
              AND (?2 IS NULL OR LOWER(color) = ?2)
              AND (?3 IS NULL
                   OR LOWER(name) LIKE '%' || ?3 || '%'
                   OR description LIKE '%' || ?3 || '%')
            ORDER BY pagerank DESC, product_id ASC
            LIMIT ?4
            "#,
        )?;

        let rows = stmt.query_map(
            params![gender, color, product_type, limit],
            product_from_row,
        )?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn similar_count(&self, product_id: &str, min_score: i64) -> Result<u32, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM similar_edges WHERE source = ?1 AND similarity_score >= ?2",
            params![product_id, min_score],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }

    fn similar_names(&self, product_id: &str, limit: u32) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT p.name
            FROM similar_edges e
            JOIN products p ON p.product_id = e.target
            WHERE e.source = ?1
            ORDER BY e.similarity_score DESC, e.target ASC
            LIMIT ?2
            "#,
        )?;

        let rows = stmt.query_map(params![product_id, i64::from(limit)], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn reset_recommendations(&self) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE products SET recommendation = ?1",
            params![RecommendationKind::Other.as_str()],
        )?;
        Ok(())
    }

    fn mark_recommendations(
        &self,
        product_ids: &[ProductId],
        kind: RecommendationKind,
    ) -> Result<(), StoreError> {
        let mut stmt = self
            .conn
            .prepare("UPDATE products SET recommendation = ?2 WHERE product_id = ?1")?;

        for product_id in product_ids {
            stmt.execute(params![product_id, kind.as_str()])?;
        }

        Ok(())
    }

    fn top_by_pagerank(
        &self,
        exclude: &[ProductId],
        limit: u32,
    ) -> Result<Vec<Product>, StoreError> {
        let excluded: HashSet<&str> = exclude.iter().map(String::as_str).collect();

        let mut stmt = self.conn.prepare(
            r#"
            SELECT product_id, name, brand, gender, price, color, description,
                   num_images, pagerank, recommendation
            FROM products
            ORDER BY pagerank DESC, product_id ASC
            "#,
        )?;

        let rows = stmt.query_map([], product_from_row)?;

        let mut products = Vec::new();
        for row in rows {
            let product = row?;
            if excluded.contains(product.product_id.as_str()) {
                continue;
            }
            products.push(product);
            if products.len() as u32 >= limit {
                break;
            }
        }

        Ok(products)
    }
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    let recommendation: String = row.get(9)?;
    let recommendation: RecommendationKind = recommendation.parse().map_err(|err: String| {
        rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, err.into())
    })?;

    Ok(Product {
        product_id: row.get(0)?,
        name: row.get(1)?,
        brand: row.get(2)?,
        gender: row.get(3)?,
        price: row.get(4)?,
        color: row.get(5)?,
        description: row.get(6)?,
        num_images: row.get::<_, i64>(7)? as u32,
        pagerank: row.get(8)?,
        recommendation,
    })
}

fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            product_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            brand TEXT NOT NULL,
            gender TEXT NOT NULL,
            price REAL NOT NULL,
            color TEXT NOT NULL,
            description TEXT NOT NULL,
            num_images INTEGER NOT NULL,
            pagerank REAL NOT NULL DEFAULT 0.15,
            recommendation TEXT NOT NULL DEFAULT 'other'
        );

        CREATE INDEX IF NOT EXISTS idx_products_brand ON products(brand);
        CREATE INDEX IF NOT EXISTS idx_products_gender ON products(gender);
        CREATE INDEX IF NOT EXISTS idx_products_color ON products(color);

        CREATE TABLE IF NOT EXISTS similar_edges (
            source TEXT NOT NULL,
            target TEXT NOT NULL,
            same_brand INTEGER NOT NULL,
            same_gender INTEGER NOT NULL,
            same_color INTEGER NOT NULL,
            price_diff REAL NOT NULL,
            similarity_score INTEGER NOT NULL,
            PRIMARY KEY (source, target)
        );

        CREATE INDEX IF NOT EXISTS idx_similar_edges_target ON similar_edges(target);
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn product(id: &str, brand: &str, gender: &str, color: &str, price: f64) -> Product {
        Product::new(
            id,
            format!("{brand} {color} item"),
            brand,
            gender,
            price,
            color,
            format!("A {color} product by {brand}"),
            2,
        )
    }

    fn edge(source: &str, target: &str, score: i64) -> SimilarEdge {
        SimilarEdge {
            source: source.to_owned(),
            target: target.to_owned(),
            same_brand: true,
            same_gender: true,
            same_color: false,
            price_diff: 120.0,
            similarity_score: score,
        }
    }

    fn seeded_store() -> SqliteCatalogStore {
        let store = SqliteCatalogStore::open_in_memory().expect("open store");
        store
            .insert_products(&[
                product("1", "Roadster", "Men", "Blue", 999.0),
                product("2", "Roadster", "Men", "Black", 1099.0),
                product("3", "HRX", "Women", "Red", 499.0),
                product("4", "HRX", "Women", "Blue", 599.0),
            ])
            .expect("insert products");
        store
            .insert_edges(&[edge("1", "2", 4), edge("1", "4", 2), edge("3", "4", 3)])
            .expect("insert edges");
        store
    }

    #[test]
    fn open_creates_catalog_file_and_persists_across_reopen() {
        let temp = tempdir().expect("tempdir");
        let data_dir = temp.path();

        let store = SqliteCatalogStore::open(data_dir).expect("open store");
        store
            .insert_products(&[product("1", "Roadster", "Men", "Blue", 999.0)])
            .expect("insert product");
        drop(store);

        assert!(data_dir.join(CATALOG_FILE_NAME).exists());

        let reopened = SqliteCatalogStore::open(data_dir).expect("reopen store");
        assert_eq!(reopened.product_count().expect("count"), 1);
        let loaded = reopened.product("1").expect("query").expect("present");
        assert_eq!(loaded.brand, "Roadster");
        assert_eq!(loaded.pagerank, trellis_core::DEFAULT_PAGERANK);
    }

    #[test]
    fn counts_and_wipe() {
        let store = seeded_store();
        assert_eq!(store.product_count().expect("products"), 4);
        assert_eq!(store.edge_count().expect("edges"), 3);

        store.wipe().expect("wipe");
        assert_eq!(store.product_count().expect("products"), 0);
        assert_eq!(store.edge_count().expect("edges"), 0);
    }

    #[test]
    fn set_pagerank_overwrites_single_product() {
        let store = seeded_store();
        store.set_pagerank("2", 1.0).expect("set pagerank");

        let updated = store.product("2").expect("query").expect("present");
        assert_eq!(updated.pagerank, 1.0);

        let untouched = store.product("1").expect("query").expect("present");
        assert_eq!(untouched.pagerank, trellis_core::DEFAULT_PAGERANK);
    }

    #[test]
    fn edges_round_trip_in_order() {
        let store = seeded_store();
        let edges = store.edges().expect("edges");

        assert_eq!(edges.len(), 3);
        let pairs: Vec<(&str, &str)> = edges
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str()))
            .collect();
        assert_eq!(pairs, vec![("1", "2"), ("1", "4"), ("3", "4")]);
        assert_eq!(edges[0].similarity_score, 4);
        assert!(edges[0].same_brand);
    }

    #[test]
    fn edge_contexts_join_degrees() {
        let store = seeded_store();
        let contexts = store.edge_contexts().expect("edge contexts");

        assert_eq!(contexts.len(), 3);
        // Ordered by (source, target).
        assert_eq!(contexts[0].source, "1");
        assert_eq!(contexts[0].target, "2");
        // Node 1 has two outgoing edges.
        assert_eq!(contexts[0].source_out_degree, 2);
        assert_eq!(contexts[0].target_in_degree, 1);
        // Node 4 is the target of two edges.
        assert_eq!(contexts[1].target, "4");
        assert_eq!(contexts[1].target_in_degree, 2);
    }

    #[test]
    fn find_products_applies_nullable_filter_triple() {
        let store = seeded_store();

        let all = store
            .find_products(&ProductFilter::default(), None)
            .expect("unfiltered query");
        assert_eq!(all.len(), 4);

        let women = store
            .find_products(
                &ProductFilter {
                    gender: Some("women".to_owned()),
                    ..ProductFilter::default()
                },
                None,
            )
            .expect("gender query");
        assert_eq!(women.len(), 2);
        assert!(women.iter().all(|p| p.gender == "Women"));

        let blue_women = store
            .find_products(
                &ProductFilter {
                    gender: Some("Women".to_owned()),
                    color: Some("blue".to_owned()),
                    ..ProductFilter::default()
                },
                None,
            )
            .expect("gender+color query");
        assert_eq!(blue_women.len(), 1);
        assert_eq!(blue_women[0].product_id, "4");
    }

    #[test]
    fn find_products_matches_type_against_name_and_description() {
        let store = SqliteCatalogStore::open_in_memory().expect("open store");
        store
            .insert_products(&[
                Product::new("1", "Crew Tee", "HRX", "Men", 399.0, "Red", "cotton t-shirt", 1),
                Product::new("2", "Formal Shirt", "Arrow", "Men", 1299.0, "White", "office wear", 1),
                Product::new("3", "Denim Jeans", "Levis", "Men", 1999.0, "Blue", "slim fit", 1),
            ])
            .expect("insert products");

        let shirts = store
            .find_products(
                &ProductFilter {
                    product_type: Some("shirt".to_owned()),
                    ..ProductFilter::default()
                },
                None,
            )
            .expect("type query");

        // "shirt" hits the tee through its description and the formal
        // shirt through its name, but never the jeans.
        let ids: Vec<&str> = shirts.iter().map(|p| p.product_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn find_products_orders_by_rank_and_respects_limit() {
        let store = seeded_store();
        store.set_pagerank("3", 0.9).expect("set pagerank");
        store.set_pagerank("1", 0.5).expect("set pagerank");

        let top = store
            .find_products(&ProductFilter::default(), Some(2))
            .expect("limited query");
        let ids: Vec<&str> = top.iter().map(|p| p.product_id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1"]);
    }

    #[test]
    fn similar_count_applies_score_floor() {
        let store = seeded_store();
        assert_eq!(store.similar_count("1", 2).expect("count"), 2);
        assert_eq!(store.similar_count("1", 3).expect("count"), 1);
        assert_eq!(store.similar_count("2", 2).expect("count"), 0);
    }

    #[test]
    fn similar_names_join_targets_by_score_then_id() {
        let store = seeded_store();

        let names = store.similar_names("1", 2).expect("names");
        assert_eq!(names, vec!["Roadster Black item", "HRX Blue item"]);

        let capped = store.similar_names("1", 1).expect("capped names");
        assert_eq!(capped, vec!["Roadster Black item"]);

        assert!(store.similar_names("2", 2).expect("no names").is_empty());
    }

    #[test]
    fn recommendation_lifecycle_marks_and_resets() {
        let store = seeded_store();

        store
            .mark_recommendations(&["1".to_owned(), "3".to_owned()], RecommendationKind::Ai)
            .expect("mark ai");
        let marked = store.product("1").expect("query").expect("present");
        assert_eq!(marked.recommendation, RecommendationKind::Ai);

        store
            .mark_recommendations(&["2".to_owned()], RecommendationKind::Pagerank)
            .expect("mark pagerank");

        store.reset_recommendations().expect("reset");
        for id in ["1", "2", "3", "4"] {
            let product = store.product(id).expect("query").expect("present");
            assert_eq!(product.recommendation, RecommendationKind::Other);
        }
    }

    #[test]
    fn top_by_pagerank_skips_excluded_ids() {
        let store = seeded_store();
        store.set_pagerank("1", 0.9).expect("set pagerank");
        store.set_pagerank("2", 0.8).expect("set pagerank");
        store.set_pagerank("3", 0.7).expect("set pagerank");

        let top = store
            .top_by_pagerank(&["1".to_owned()], 2)
            .expect("top by pagerank");
        let ids: Vec<&str> = top.iter().map(|p| p.product_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
    }
}
