//! Wire codec for the engine's structured-query protocol: renders the
//! clause tree and modifiers into one `_search` body, and parses the
//! engine response back into a `RawResult`.
//!
//! Rendering is pure and deterministic: identical trees always
//! serialize to identical bodies (object keys are ordered).

use catalog_core::{
    Bucket, Clause, Modifiers, QueryTree, RawHit, RawResult, Result, SearchError, SortOrder,
};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Full request body: query plus pagination, sort, highlight and
/// aggregation modifiers. Absent modifiers are omitted entirely.
pub fn search_body(tree: &QueryTree, mods: &Modifiers) -> Value {
    let mut body = Map::new();
    body.insert("query".into(), clause_value(&tree.root));
    body.insert("from".into(), json!(mods.offset));
    body.insert("size".into(), json!(mods.limit));
    body.insert("track_total_hits".into(), json!(true));
    if let Some(sort) = &mods.sort {
        body.insert(
            "sort".into(),
            json!([{ (sort.field.as_str()): { "order": order_str(sort.order) } }]),
        );
    }
    if let Some(hl) = &mods.highlight {
        let fields: Map<String, Value> =
            hl.fields.iter().map(|f| (f.clone(), json!({}))).collect();
        body.insert("highlight".into(), json!({ "fields": fields }));
    }
    if !mods.aggs.is_empty() {
        let aggs: Map<String, Value> = mods
            .aggs
            .iter()
            .map(|a| (a.name.clone(), json!({ "terms": { "field": a.field } })))
            .collect();
        body.insert("aggs".into(), Value::Object(aggs));
    }
    Value::Object(body)
}

fn order_str(order: SortOrder) -> &'static str {
    order.as_str()
}

/// One clause in query DSL form.
pub fn clause_value(clause: &Clause) -> Value {
    match clause {
        Clause::MatchAll => json!({ "match_all": {} }),
        Clause::Match { field, value } => json!({ "match": { (field.as_str()): value } }),
        Clause::MatchPhrase { field, value } => json!({ "match_phrase": { (field.as_str()): value } }),
        Clause::MultiMatch { fields, value, fuzzy } => {
            let mut inner = Map::new();
            inner.insert("query".into(), json!(value));
            inner.insert("fields".into(), json!(fields));
            if *fuzzy {
                inner.insert("fuzziness".into(), json!("AUTO"));
            }
            json!({ "multi_match": inner })
        }
        Clause::Term { field, value } => json!({ "term": { (field.as_str()): value } }),
        Clause::Terms { field, values } => json!({ "terms": { (field.as_str()): values } }),
        Clause::Range { field, gte, lte } => {
            let mut bounds = Map::new();
            if let Some(lo) = gte {
                bounds.insert("gte".into(), json!(lo));
            }
            if let Some(hi) = lte {
                bounds.insert("lte".into(), json!(hi));
            }
            json!({ "range": { (field.as_str()): bounds } })
        }
        Clause::Nested { path, query } => {
            json!({ "nested": { "path": path, "query": clause_value(query) } })
        }
        Clause::Prefix { field, value } => json!({ "prefix": { (field.as_str()): value } }),
        Clause::Wildcard { field, pattern } => json!({ "wildcard": { (field.as_str()): pattern } }),
        Clause::Fuzzy { field, value } => {
            json!({ "fuzzy": { (field.as_str()): { "value": value, "fuzziness": "AUTO" } } })
        }
        Clause::Exists { field } => json!({ "exists": { "field": field } }),
        Clause::Ids { values } => json!({ "ids": { "values": values } }),
        Clause::GeoDistance { field, distance_km, center } => json!({
            "geo_distance": {
                "distance": format!("{distance_km}km"),
                (field.as_str()): { "lat": center.lat, "lon": center.lon },
            }
        }),
        Clause::GeoBoundingBox { field, top_left, bottom_right } => json!({
            "geo_bounding_box": {
                (field.as_str()): {
                    "top_left": { "lat": top_left.lat, "lon": top_left.lon },
                    "bottom_right": { "lat": bottom_right.lat, "lon": bottom_right.lon },
                }
            }
        }),
        Clause::SpanTerm { field, value } => json!({ "span_term": { (field.as_str()): value } }),
        Clause::FunctionScore { query, field, factor } => json!({
            "function_score": {
                "query": clause_value(query),
                "script_score": {
                    "script": { "source": format!("doc['{field}'].value * {factor}") }
                },
            }
        }),
        Clause::Bool { must, should, must_not } => {
            let mut arms = Map::new();
            if !must.is_empty() {
                arms.insert("must".into(), arm_values(must));
            }
            if !should.is_empty() {
                arms.insert("should".into(), arm_values(should));
            }
            if !must_not.is_empty() {
                arms.insert("must_not".into(), arm_values(must_not));
            }
            json!({ "bool": arms })
        }
    }
}

fn arm_values(clauses: &[Clause]) -> Value {
    Value::Array(clauses.iter().map(clause_value).collect())
}

/// Engine response into a `RawResult`. Per-hit fields are tolerated
/// when missing; a response with no hits section or no total at all is
/// a mapping failure.
pub fn parse_response(v: &Value) -> Result<RawResult> {
    let hits_section = v
        .get("hits")
        .and_then(Value::as_object)
        .ok_or_else(|| SearchError::Mapping("response has no hits section".into()))?;
    let total = match hits_section.get("total") {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::Object(o)) => o.get("value").and_then(Value::as_u64),
        _ => None,
    }
    .ok_or_else(|| SearchError::Mapping("response has no total count".into()))?;
    let list = hits_section
        .get("hits")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::Mapping("response has no hit list".into()))?;

    let hits = list
        .iter()
        .map(|h| RawHit {
            source: h.get("_source").cloned().unwrap_or(Value::Null),
            score: h.get("_score").and_then(Value::as_f64),
            highlight: h.get("highlight").and_then(Value::as_object).map(highlight_map),
        })
        .collect();

    let mut aggregations = BTreeMap::new();
    if let Some(aggs) = v.get("aggregations").and_then(Value::as_object) {
        for (name, agg) in aggs {
            let buckets = agg
                .get("buckets")
                .and_then(Value::as_array)
                .map(|bs| bs.iter().filter_map(parse_bucket).collect())
                .unwrap_or_default();
            aggregations.insert(name.clone(), buckets);
        }
    }

    Ok(RawResult { hits, total, aggregations })
}

fn highlight_map(obj: &Map<String, Value>) -> BTreeMap<String, Vec<String>> {
    obj.iter()
        .map(|(field, snippets)| {
            let list = snippets
                .as_array()
                .map(|a| {
                    a.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            (field.clone(), list)
        })
        .collect()
}

fn parse_bucket(b: &Value) -> Option<Bucket> {
    let key = match b.get("key")? {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let doc_count = b.get("doc_count").and_then(Value::as_u64)?;
    Some(Bucket { key, doc_count })
}
