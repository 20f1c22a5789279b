use serde::{Deserialize, Serialize};

use crate::{Product, ProductId, SimilarEdge};

/// Minimum score a pair must reach before an edge is materialized.
pub const SIMILARITY_THRESHOLD: i64 = 2;

/// Cap on outgoing edges per source node per construction pass.
pub const MAX_EDGES_PER_SOURCE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityPolicy {
    #[default]
    FirstPass,
    GenderGated,
}

impl SimilarityPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstPass => "first_pass",
            Self::GenderGated => "gender_gated",
        }
    }
}

impl std::str::FromStr for SimilarityPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "first_pass" => Ok(Self::FirstPass),
            "gender_gated" => Ok(Self::GenderGated),
            other => Err(format!(
                "invalid similarity policy '{other}', expected one of: first_pass, gender_gated"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityMatch {
    pub score: i64,
    pub same_brand: bool,
    pub same_gender: bool,
    pub same_color: bool,
    pub price_diff: f64,
}

impl SimilarityMatch {
    pub fn into_edge(self, source: ProductId, target: ProductId) -> SimilarEdge {
        SimilarEdge {
            source,
            target,
            same_brand: self.same_brand,
            same_gender: self.same_gender,
            same_color: self.same_color,
            price_diff: self.price_diff,
            similarity_score: self.score,
        }
    }
}

/// Scores a pair under a policy; `None` below [`SIMILARITY_THRESHOLD`].
pub fn score_pair(policy: SimilarityPolicy, a: &Product, b: &Product) -> Option<SimilarityMatch> {
    let same_brand = a.brand == b.brand;
    let same_gender = a.gender == b.gender;
    let same_color = a.color == b.color;
    let price_diff = (a.price - b.price).abs();

    let score = match policy {
        SimilarityPolicy::FirstPass => {
            i64::from(same_brand)
                + i64::from(same_gender)
                + i64::from(same_color)
                + i64::from(price_diff < 500.0)
        }
        SimilarityPolicy::GenderGated => {
            if !same_gender {
                return None;
            }

            // The brand clause gates on price but scores only the brand
            // signal; the price tier is an independent addend.
            let brand_points = if same_brand && price_diff < 1000.0 { 2 } else { 0 };
            let price_points = if price_diff < 200.0 {
                2
            } else if price_diff < 500.0 {
                1
            } else {
                0
            };

            brand_points + i64::from(same_color) + price_points
        }
    };

    if score < SIMILARITY_THRESHOLD {
        return None;
    }

    Some(SimilarityMatch {
        score,
        same_brand,
        same_gender,
        same_color,
        price_diff,
    })
}
