//! Result mapper: raw engine hits and buckets into the stable response
//! envelope. Projection is per endpoint variant; a hit missing a
//! display field degrades to `null` for that field only.

use serde_json::Value;

use crate::builder::CATEGORY_AGG;
use crate::model::{ProjectedHit, SearchEnvelope};
use crate::query::{RawHit, RawResult};
use crate::schema;

/// Basic variant: hits only, no totals or facets.
pub fn map_basic(raw: &RawResult) -> SearchEnvelope {
    let mut env = SearchEnvelope::empty("Products");
    env.products = raw.hits.iter().map(|h| project_hit(h, false)).collect();
    env
}

/// Faceted variant: hits plus category buckets. An aggregation name
/// absent from the raw result yields an empty bucket list, not an
/// error.
pub fn map_toggled(raw: &RawResult) -> SearchEnvelope {
    let mut env = SearchEnvelope::empty("Products");
    env.products = raw.hits.iter().map(|h| project_hit(h, false)).collect();
    env.aggregations = Some(raw.aggregations.get(CATEGORY_AGG).cloned().unwrap_or_default());
    env
}

/// Advanced variant: hits with flattened tags, the engine-reported
/// total and the requested page window.
pub fn map_advanced(raw: &RawResult, page: u64, size: u64) -> SearchEnvelope {
    let mut env = SearchEnvelope::empty("Products fetched successfully");
    env.products = raw.hits.iter().map(|h| project_hit(h, true)).collect();
    env.total = Some(raw.total);
    env.page = Some(page);
    env.size = Some(size);
    env
}

fn project_hit(hit: &RawHit, with_tags: bool) -> ProjectedHit {
    let src = &hit.source;
    ProjectedHit {
        title: str_field(src, schema::TITLE),
        description: str_field(src, schema::DESCRIPTION),
        category: str_field(src, schema::CATEGORY),
        price: src.get(schema::PRICE).and_then(Value::as_f64),
        brand: str_field(src, schema::BRAND),
        sku: str_field(src, schema::SKU),
        thumbnail: str_field(src, schema::THUMBNAIL),
        tags: if with_tags { Some(flatten_tags(src)) } else { None },
        score: hit.score,
        highlight: hit.highlight.clone(),
    }
}

fn str_field(src: &Value, field: &str) -> Option<String> {
    src.get(field).and_then(Value::as_str).map(str::to_string)
}

/// Embedded `{tag}` objects back to bare strings for display.
fn flatten_tags(src: &Value) -> Vec<String> {
    src.get(schema::TAGS)
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(|t| t.get("tag").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
