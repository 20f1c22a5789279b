use serde::{Deserialize, Serialize};

pub mod similarity;

pub type ProductId = String;

/// Rank every product holds until a propagation pass overwrites it.
pub const DEFAULT_PAGERANK: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Ai,
    Pagerank,
    Connected,
    #[default]
    Other,
}

impl RecommendationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ai => "ai",
            Self::Pagerank => "pagerank",
            Self::Connected => "connected",
            Self::Other => "other",
        }
    }
}

impl std::str::FromStr for RecommendationKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "ai" => Ok(Self::Ai),
            "pagerank" => Ok(Self::Pagerank),
            "connected" => Ok(Self::Connected),
            "other" => Ok(Self::Other),
            other => Err(format!(
                "invalid recommendation kind '{other}', expected one of: ai, pagerank, connected, other"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: ProductId,
    pub name: String,
    pub brand: String,
    pub gender: String,
    pub price: f64,
    pub color: String,
    pub description: String,
    pub num_images: u32,
    pub pagerank: f64,
    pub recommendation: RecommendationKind,
}

impl Product {
    pub fn new(
        product_id: impl Into<ProductId>,
        name: impl Into<String>,
        brand: impl Into<String>,
        gender: impl Into<String>,
        price: f64,
        color: impl Into<String>,
        description: impl Into<String>,
        num_images: u32,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            brand: brand.into(),
            gender: gender.into(),
            price,
            color: color.into(),
            description: description.into().to_lowercase(),
            num_images,
            pagerank: DEFAULT_PAGERANK,
            recommendation: RecommendationKind::Other,
        }
    }
}

/// Directed similarity relation; construction keeps `source < target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarEdge {
    pub source: ProductId,
    pub target: ProductId,
    pub same_brand: bool,
    pub same_gender: bool,
    pub same_color: bool,
    pub price_diff: f64,
    pub similarity_score: i64,
}

/// A persisted edge joined with the degrees the weight synthesis needs.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeContext {
    pub source: ProductId,
    pub target: ProductId,
    pub same_brand: bool,
    pub same_gender: bool,
    pub same_color: bool,
    pub price_diff: f64,
    pub source_out_degree: u32,
    pub target_in_degree: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductFilter {
    pub gender: Option<String>,
    pub color: Option<String>,
    pub product_type: Option<String>,
}

impl ProductFilter {
    pub fn is_empty(&self) -> bool {
        self.gender.is_none() && self.color.is_none() && self.product_type.is_none()
    }
}
