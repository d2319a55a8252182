//! The ephemeral query model: a boolean tree of typed clauses plus the
//! sibling request modifiers. Rebuilt from scratch for every request;
//! nothing here is cached or shared between calls.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::{Result, SearchError};
use crate::model::{Bucket, GeoPoint};

/// One typed condition in a structured query.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    MatchAll,
    Match { field: String, value: String },
    MatchPhrase { field: String, value: String },
    MultiMatch { fields: Vec<String>, value: String, fuzzy: bool },
    Term { field: String, value: String },
    Terms { field: String, values: Vec<String> },
    /// One- or two-sided inclusive numeric range. Builders must never
    /// emit this with both bounds absent or inverted.
    Range { field: String, gte: Option<f64>, lte: Option<f64> },
    /// Inner clause evaluated per embedded object of `path`; a match
    /// requires a single object to satisfy the whole inner clause.
    Nested { path: String, query: Box<Clause> },
    Prefix { field: String, value: String },
    Wildcard { field: String, pattern: String },
    Fuzzy { field: String, value: String },
    Exists { field: String },
    Ids { values: Vec<String> },
    GeoDistance { field: String, distance_km: f64, center: GeoPoint },
    GeoBoundingBox { field: String, top_left: GeoPoint, bottom_right: GeoPoint },
    SpanTerm { field: String, value: String },
    /// Wrapped clause rescored by `doc[field].value * factor`.
    FunctionScore { query: Box<Clause>, field: String, factor: f64 },
    Bool { must: Vec<Clause>, should: Vec<Clause>, must_not: Vec<Clause> },
}

impl Clause {
    /// Short structural summary, used in gateway error context and
    /// logs. Never includes user-supplied values.
    pub fn describe(&self) -> String {
        match self {
            Clause::MatchAll => "match_all".into(),
            Clause::Match { field, .. } => format!("match({field})"),
            Clause::MatchPhrase { field, .. } => format!("match_phrase({field})"),
            Clause::MultiMatch { fields, .. } => format!("multi_match({})", fields.join(",")),
            Clause::Term { field, .. } => format!("term({field})"),
            Clause::Terms { field, values } => format!("terms({field}x{})", values.len()),
            Clause::Range { field, .. } => format!("range({field})"),
            Clause::Nested { path, query } => format!("nested({path},{})", query.describe()),
            Clause::Prefix { field, .. } => format!("prefix({field})"),
            Clause::Wildcard { field, .. } => format!("wildcard({field})"),
            Clause::Fuzzy { field, .. } => format!("fuzzy({field})"),
            Clause::Exists { field } => format!("exists({field})"),
            Clause::Ids { values } => format!("ids(x{})", values.len()),
            Clause::GeoDistance { field, .. } => format!("geo_distance({field})"),
            Clause::GeoBoundingBox { field, .. } => format!("geo_bounding_box({field})"),
            Clause::SpanTerm { field, .. } => format!("span_term({field})"),
            Clause::FunctionScore { query, .. } => format!("function_score({})", query.describe()),
            Clause::Bool { must, should, must_not } => format!(
                "bool(must=[{}] should=[{}] must_not=[{}])",
                must.iter().map(Clause::describe).collect::<Vec<_>>().join(","),
                should.iter().map(Clause::describe).collect::<Vec<_>>().join(","),
                must_not.iter().map(Clause::describe).collect::<Vec<_>>().join(","),
            ),
        }
    }
}

/// Full boolean composition of clauses for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTree {
    pub root: Clause,
}

impl QueryTree {
    pub fn match_all() -> Self {
        Self { root: Clause::MatchAll }
    }

    /// AND-fold accepted clauses into one tree. `MatchAll` is the
    /// neutral starting clause: no clauses means match everything, a
    /// single AND arm collapses to itself.
    pub fn compose(must: Vec<Clause>, should: Vec<Clause>, must_not: Vec<Clause>) -> Result<Self> {
        let root = match (must.len(), should.len(), must_not.len()) {
            (0, 0, 0) => Clause::MatchAll,
            (1, 0, 0) => must.into_iter().next().ok_or_else(|| {
                SearchError::Composition("single-arm fold lost its clause".into())
            })?,
            _ => Clause::Bool { must, should, must_not },
        };
        Ok(Self { root })
    }

    pub fn describe(&self) -> String {
        self.root.describe()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(SearchError::Validation(format!(
                "sort_order must be asc or desc, got {other:?}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub field: String,
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HighlightSpec {
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggSpec {
    pub name: String,
    pub field: String,
}

/// Request modifiers riding alongside the query tree. Sort defaults to
/// relevance when absent; ties under an explicit sort keep the
/// engine's native document order.
#[derive(Debug, Clone, PartialEq)]
pub struct Modifiers {
    pub offset: u64,
    pub limit: u64,
    pub sort: Option<SortSpec>,
    pub highlight: Option<HighlightSpec>,
    pub aggs: Vec<AggSpec>,
}

impl Modifiers {
    pub fn window(offset: u64, limit: u64) -> Self {
        Self { offset, limit, sort: None, highlight: None, aggs: Vec::new() }
    }
}

/// One raw hit as returned by the engine, before projection.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub source: serde_json::Value,
    pub score: Option<f64>,
    pub highlight: Option<BTreeMap<String, Vec<String>>>,
}

/// Raw engine result: ranked hits, the total match count (not just the
/// page length) and any aggregation buckets keyed by aggregation name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResult {
    pub hits: Vec<RawHit>,
    pub total: u64,
    pub aggregations: BTreeMap<String, Vec<Bucket>>,
}

impl Default for Modifiers {
    fn default() -> Self {
        Self::window(0, 10)
    }
}

impl Default for RawHit {
    fn default() -> Self {
        Self { source: serde_json::Value::Null, score: None, highlight: None }
    }
}
