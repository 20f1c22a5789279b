use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use trellis_core::Product;

/// Raw catalog row as exported by the upstream dataset. A row that fails
/// to coerce is fatal to the whole ingestion run.
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "ProductID")]
    product_id: String,
    #[serde(rename = "ProductName")]
    name: String,
    #[serde(rename = "ProductBrand")]
    brand: String,
    #[serde(rename = "Gender")]
    gender: String,
    #[serde(rename = "Price (INR)")]
    price: f64,
    #[serde(rename = "PrimaryColor")]
    color: String,
    #[serde(rename = "Description")]
    description: String,
    #[serde(rename = "NumImages")]
    num_images: u32,
}

impl From<RawRow> for Product {
    fn from(row: RawRow) -> Self {
        Product::new(
            row.product_id,
            row.name,
            row.brand,
            row.gender,
            row.price,
            row.color,
            row.description,
            row.num_images,
        )
    }
}

pub fn load_catalog(path: impl AsRef<Path>) -> Result<Vec<Product>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open catalog {}", path.display()))?;

    let mut products = Vec::new();
    for (line, row) in reader.deserialize::<RawRow>().enumerate() {
        let row = row.with_context(|| {
            format!("failed to coerce catalog row {} in {}", line + 1, path.display())
        })?;
        products.push(Product::from(row));
    }

    tracing::info!(products = products.len(), path = %path.display(), "loaded catalog");
    Ok(products)
}
