use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::SearchError;

/// One embedded tag object. Indexed as an independent nested
/// sub-document so multi-tag filters cannot cross-match.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TagRef {
    pub tag: String,
}

/// Denormalized brand reference, updated only when the source brand
/// record changes.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BrandRef {
    pub brand_name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// The indexed product projection. Never the source of truth; the
/// external indexing pipeline keeps it in sync with storage writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDoc {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub price: f64,
    /// Legacy flat keyword field, kept alongside the embedded brand.
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub brand_name: Option<BrandRef>,
    #[serde(default)]
    pub tags: Vec<TagRef>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

/// Display projection of one ranked hit. Every field is optional so a
/// document missing a display field degrades instead of failing the
/// whole response.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProjectedHit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub brand: Option<String>,
    pub sku: Option<String>,
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    pub score: Option<f64>,
    /// Absent (not an empty map) when the engine returned no highlight
    /// for this hit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight: Option<BTreeMap<String, Vec<String>>>,
}

/// Aggregation result entry over a grouping field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bucket {
    pub key: String,
    pub doc_count: u64,
}

/// Response wrapper returned to callers. Transport status is always
/// 200; errors are signaled through `status`/`message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchEnvelope {
    pub status: u16,
    pub message: String,
    pub products: Vec<ProjectedHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Vec<Bucket>>,
}

impl SearchEnvelope {
    pub fn empty(message: &str) -> Self {
        Self {
            status: 200,
            message: message.to_string(),
            products: Vec::new(),
            total: None,
            page: None,
            size: None,
            aggregations: None,
        }
    }

    pub fn failure(err: &SearchError) -> Self {
        Self {
            status: err.envelope_status(),
            message: err.to_string(),
            products: Vec::new(),
            total: None,
            page: None,
            size: None,
            aggregations: None,
        }
    }
}
