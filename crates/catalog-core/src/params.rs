//! Typed request parameters for the three endpoint variants.
//!
//! Query-string values arrive stringly-typed; numeric fields are kept
//! as raw strings here and parsed at the builder boundary so a bad
//! value becomes a `Validation` error in the envelope instead of a
//! transport-level rejection.

use serde::{Deserialize, Deserializer};

use crate::errors::{Result, SearchError};

/// Basic search: comma-joined terms.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BasicParams {
    #[serde(default)]
    pub search: Option<String>,
}

/// Faceted/toggle search. Each boolean flag enables one additional
/// clause type; flags are presence-style (`?fuzzy` or `?fuzzy=true`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToggleParams {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    /// `lo,hi` inclusive price bounds.
    #[serde(default)]
    pub price_range: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    /// Comma list for the `terms` clause; a non-empty list enables it.
    #[serde(default)]
    pub terms: Option<String>,
    /// Comma list for the `ids` clause; a non-empty list enables it.
    #[serde(default)]
    pub ids: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub size: Option<String>,

    #[serde(default, deserialize_with = "flag")]
    pub phrase: bool,
    #[serde(default, deserialize_with = "flag")]
    pub term: bool,
    #[serde(rename = "terms_q", default, deserialize_with = "flag")]
    pub terms_q: bool,
    #[serde(default, deserialize_with = "flag")]
    pub should: bool,
    #[serde(default, deserialize_with = "flag")]
    pub must_not: bool,
    #[serde(default, deserialize_with = "flag")]
    pub nested: bool,
    #[serde(default, deserialize_with = "flag")]
    pub prefix: bool,
    #[serde(default, deserialize_with = "flag")]
    pub wildcard: bool,
    #[serde(default, deserialize_with = "flag")]
    pub fuzzy: bool,
    #[serde(default, deserialize_with = "flag")]
    pub match_all: bool,
    #[serde(default, deserialize_with = "flag")]
    pub exists: bool,
    #[serde(rename = "ids_q", default, deserialize_with = "flag")]
    pub ids_q: bool,
    #[serde(default, deserialize_with = "flag")]
    pub geo: bool,
    #[serde(default, deserialize_with = "flag")]
    pub geo_bounding_box: bool,
    #[serde(default, deserialize_with = "flag")]
    pub edge_ngram: bool,
    #[serde(default, deserialize_with = "flag")]
    pub span: bool,
    #[serde(default, deserialize_with = "flag")]
    pub script_score: bool,
}

/// Advanced structured search.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdvancedParams {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub min_price: Option<String>,
    #[serde(default)]
    pub max_price: Option<String>,
    /// Comma list matched as OR-of-terms inside one nested clause.
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_order: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

/// Presence-style boolean: a flag given with no value (or any value
/// other than `false`/`0`) counts as enabled.
fn flag<'de, D>(d: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(d)?;
    Ok(!matches!(raw.as_deref(), Some("false") | Some("0")))
}

/// Split a comma list, trimming entries and dropping empties.
pub fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn parse_f64(name: &str, raw: Option<&str>) -> Result<Option<f64>> {
    match raw {
        None => Ok(None),
        Some(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<f64>()
                .map(Some)
                .map_err(|_| SearchError::Validation(format!("{name} must be numeric, got {s:?}")))
        }
    }
}

pub(crate) fn parse_u64(name: &str, raw: Option<&str>) -> Result<Option<u64>> {
    match raw {
        None => Ok(None),
        Some(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<u64>()
                .map(Some)
                .map_err(|_| SearchError::Validation(format!("{name} must be a non-negative integer, got {s:?}")))
        }
    }
}
