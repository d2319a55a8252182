//! In-memory engine: evaluates the clause tree directly over product
//! documents. Serves as the dev/fixture backend and as the reference
//! for nested-isolation semantics; the index of record lives behind
//! `RemoteEngine` in production.

use catalog_core::schema::{self, FieldKind};
use catalog_core::{
    Bucket, Clause, GeoPoint, HighlightSpec, Modifiers, ProductDoc, QueryTree, RawHit, RawResult,
    Result,
};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use prometheus::{register_histogram, Histogram};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

static MEM_QUERY_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!("mem_query_seconds", "In-memory engine query latency").unwrap()
});

#[derive(Clone, Default)]
pub struct InMemoryEngine {
    inner: Arc<RwLock<Vec<ProductDoc>>>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole index with a fixture set.
    pub fn load(&self, docs: Vec<ProductDoc>) {
        *self.inner.write() = docs;
    }

    pub fn insert(&self, doc: ProductDoc) {
        self.inner.write().push(doc);
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[async_trait::async_trait]
impl crate::traits::SearchEngine for InMemoryEngine {
    async fn execute(&self, tree: &QueryTree, mods: &Modifiers) -> Result<RawResult> {
        let _timer = MEM_QUERY_SECONDS.start_timer();
        let docs = self.inner.read().clone();
        let mut matched: Vec<(ProductDoc, f64)> = docs
            .into_iter()
            .filter_map(|d| eval(&tree.root, &d).map(|s| (d, s)))
            .collect();
        let total = matched.len() as u64;

        // Buckets cover the whole filtered set, not just the page.
        let mut aggregations = BTreeMap::new();
        for agg in &mods.aggs {
            aggregations.insert(agg.name.clone(), terms_buckets(&matched, &agg.field));
        }

        match &mods.sort {
            // Stable sorts: ties keep native (insertion) document order.
            Some(spec) => {
                let descending = spec.order == catalog_core::SortOrder::Desc;
                let field = spec.field.clone();
                matched.sort_by(|a, b| {
                    let ord = compare_field(&a.0, &b.0, &field);
                    if descending { ord.reverse() } else { ord }
                });
            }
            None => matched.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal)),
        }

        let scored = mods.sort.is_none();
        let hits = matched
            .into_iter()
            .skip(mods.offset as usize)
            .take(mods.limit as usize)
            .map(|(d, s)| RawHit {
                highlight: mods.highlight.as_ref().and_then(|hl| highlight_doc(&d, &tree.root, hl)),
                score: if scored { Some(s) } else { None },
                source: serde_json::to_value(&d).unwrap_or(serde_json::Value::Null),
            })
            .collect();

        Ok(RawResult { hits, total, aggregations })
    }
}

/// Evaluate one clause against one document: `Some(score)` on match.
fn eval(clause: &Clause, doc: &ProductDoc) -> Option<f64> {
    match clause {
        Clause::MatchAll => Some(1.0),
        Clause::Match { field, value } => match schema::field_kind(field) {
            FieldKind::Text => {
                let hay = tokenize(str_field(doc, field)?);
                let n = tokenize(value).iter().filter(|t| hay.contains(t)).count();
                (n > 0).then_some(n as f64)
            }
            _ => keyword_eq(doc, field, value).then_some(1.0),
        },
        Clause::MatchPhrase { field, value } => {
            let hay = tokenize(str_field(doc, field)?);
            let needle = tokenize(value);
            if needle.is_empty() {
                return None;
            }
            hay.windows(needle.len())
                .any(|w| w == needle.as_slice())
                .then_some(needle.len() as f64)
        }
        Clause::MultiMatch { fields, value, fuzzy } => {
            let mut best: Option<f64> = None;
            for field in fields {
                let Some(text) = str_field(doc, field) else { continue };
                let hay = tokenize(text);
                let n = tokenize(value)
                    .iter()
                    .filter(|t| {
                        hay.iter().any(|h| {
                            h == *t || (*fuzzy && levenshtein(h, t) <= auto_fuzz(t.len()))
                        })
                    })
                    .count();
                if n > 0 {
                    best = Some(best.map_or(n as f64, |b: f64| b.max(n as f64)));
                }
            }
            best
        }
        Clause::Term { field, value } => keyword_eq(doc, field, value).then_some(1.0),
        Clause::Terms { field, values } => {
            values.iter().any(|v| keyword_eq(doc, field, v)).then_some(1.0)
        }
        Clause::Range { field, gte, lte } => {
            let n = num_field(doc, field)?;
            (gte.map_or(true, |lo| n >= lo) && lte.map_or(true, |hi| n <= hi)).then_some(1.0)
        }
        Clause::Nested { path, query } => eval_nested(path, query, doc).then_some(1.0),
        Clause::Prefix { field, value } => {
            let p = value.to_lowercase();
            match schema::field_kind(field) {
                FieldKind::Text => tokenize(str_field(doc, field)?)
                    .iter()
                    .any(|t| t.starts_with(&p))
                    .then_some(1.0),
                _ => str_field(doc, field)?.to_lowercase().starts_with(&p).then_some(1.0),
            }
        }
        Clause::Wildcard { field, pattern } => {
            let p = pattern.to_lowercase();
            match schema::field_kind(field) {
                FieldKind::Text => tokenize(str_field(doc, field)?)
                    .iter()
                    .any(|t| wildcard_match(&p, t))
                    .then_some(1.0),
                _ => wildcard_match(&p, &str_field(doc, field)?.to_lowercase()).then_some(1.0),
            }
        }
        Clause::Fuzzy { field, value } => {
            let needle = value.to_lowercase();
            tokenize(str_field(doc, field)?)
                .iter()
                .any(|t| levenshtein(t, &needle) <= auto_fuzz(needle.len()))
                .then_some(1.0)
        }
        Clause::Exists { field } => exists(doc, field).then_some(1.0),
        Clause::Ids { values } => values.iter().any(|v| v == &doc.id).then_some(1.0),
        Clause::GeoDistance { distance_km, center, .. } => {
            let loc = doc.location?;
            (haversine_km(loc, *center) <= *distance_km).then_some(1.0)
        }
        Clause::GeoBoundingBox { top_left, bottom_right, .. } => {
            let loc = doc.location?;
            (loc.lat <= top_left.lat
                && loc.lat >= bottom_right.lat
                && loc.lon >= top_left.lon
                && loc.lon <= bottom_right.lon)
                .then_some(1.0)
        }
        Clause::SpanTerm { field, value } => match schema::field_kind(field) {
            FieldKind::Text => tokenize(str_field(doc, field)?)
                .contains(&value.to_lowercase())
                .then_some(1.0),
            _ => keyword_eq(doc, field, value).then_some(1.0),
        },
        Clause::FunctionScore { query, field, factor } => {
            eval(query, doc)?;
            Some(num_field(doc, field).unwrap_or(0.0) * factor)
        }
        Clause::Bool { must, should, must_not } => {
            let mut score = 0.0;
            for m in must {
                score += eval(m, doc)?;
            }
            for mn in must_not {
                if eval(mn, doc).is_some() {
                    return None;
                }
            }
            let mut should_hit = false;
            for s in should {
                if let Some(s) = eval(s, doc) {
                    score += s;
                    should_hit = true;
                }
            }
            if must.is_empty() && !should.is_empty() && !should_hit {
                return None;
            }
            Some(score)
        }
    }
}

/// Nested semantics: the inner clause must hold within one single
/// embedded object. Conditions can never be satisfied by combining
/// fields from sibling objects.
fn eval_nested(path: &str, query: &Clause, doc: &ProductDoc) -> bool {
    match path {
        schema::TAGS => doc.tags.iter().any(|t| eval_in_object(query, path, &t.tag)),
        schema::BRAND_NAME => doc
            .brand_name
            .as_ref()
            .map(|b| eval_in_object(query, path, &b.brand_name))
            .unwrap_or(false),
        _ => false,
    }
}

/// Evaluate a clause against one embedded object. The embedded objects
/// carry a single keyword sub-field named after the path's tail
/// (`tags.tag`, `brand_name.brand_name`).
fn eval_in_object(clause: &Clause, path: &str, value: &str) -> bool {
    let field_matches = |field: &str| {
        field == path
            || field
                .strip_prefix(path)
                .and_then(|rest| rest.strip_prefix('.'))
                .is_some()
    };
    match clause {
        Clause::Match { field, value: v } | Clause::MatchPhrase { field, value: v } => {
            field_matches(field) && v.trim().eq_ignore_ascii_case(value)
        }
        Clause::Term { field, value: v } | Clause::SpanTerm { field, value: v } => {
            field_matches(field) && v == value
        }
        Clause::Terms { field, values } => {
            field_matches(field) && values.iter().any(|v| v == value)
        }
        Clause::Prefix { field, value: v } => {
            field_matches(field) && value.to_lowercase().starts_with(&v.to_lowercase())
        }
        Clause::Wildcard { field, pattern } => {
            field_matches(field) && wildcard_match(&pattern.to_lowercase(), &value.to_lowercase())
        }
        Clause::Fuzzy { field, value: v } => {
            let needle = v.to_lowercase();
            field_matches(field) && levenshtein(&value.to_lowercase(), &needle) <= auto_fuzz(needle.len())
        }
        Clause::Exists { field } => field_matches(field) && !value.is_empty(),
        Clause::Bool { must, should, must_not } => {
            must.iter().all(|m| eval_in_object(m, path, value))
                && !must_not.iter().any(|m| eval_in_object(m, path, value))
                && (should.is_empty()
                    || !must.is_empty()
                    || should.iter().any(|s| eval_in_object(s, path, value)))
        }
        Clause::MatchAll => true,
        _ => false,
    }
}

fn str_field<'a>(doc: &'a ProductDoc, field: &str) -> Option<&'a str> {
    match field {
        "id" => Some(&doc.id),
        schema::TITLE => Some(&doc.title),
        schema::DESCRIPTION => Some(&doc.description),
        schema::CATEGORY => Some(&doc.category),
        schema::BRAND => Some(&doc.brand),
        schema::SKU => Some(&doc.sku),
        schema::THUMBNAIL => Some(&doc.thumbnail),
        _ => None,
    }
}

fn num_field(doc: &ProductDoc, field: &str) -> Option<f64> {
    (field == schema::PRICE).then_some(doc.price)
}

fn keyword_eq(doc: &ProductDoc, field: &str, value: &str) -> bool {
    match schema::field_kind(field) {
        FieldKind::Numeric => value
            .parse::<f64>()
            .map(|v| num_field(doc, field) == Some(v))
            .unwrap_or(false),
        _ => str_field(doc, field).map_or(false, |s| s == value),
    }
}

fn exists(doc: &ProductDoc, field: &str) -> bool {
    match field {
        schema::PRICE => true,
        schema::LOCATION => doc.location.is_some(),
        schema::TAGS => !doc.tags.is_empty(),
        schema::BRAND_NAME => doc.brand_name.is_some(),
        other => str_field(doc, other).map_or(false, |s| !s.is_empty()),
    }
}

fn compare_field(a: &ProductDoc, b: &ProductDoc, field: &str) -> Ordering {
    if let (Some(x), Some(y)) = (num_field(a, field), num_field(b, field)) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    match (str_field(a, field), str_field(b, field)) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn terms_buckets(matched: &[(ProductDoc, f64)], field: &str) -> Vec<Bucket> {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for (doc, _) in matched {
        if let Some(v) = str_field(doc, field) {
            if !v.is_empty() {
                *counts.entry(v.to_string()).or_default() += 1;
            }
        }
    }
    let mut buckets: Vec<Bucket> = counts
        .into_iter()
        .map(|(key, doc_count)| Bucket { key, doc_count })
        .collect();
    // Count descending, key ascending on ties (BTreeMap order is stable).
    buckets.sort_by(|a, b| b.doc_count.cmp(&a.doc_count));
    buckets
}

/// Wrap query-term occurrences in `<em>` for each highlighted field.
/// Fields with no match are left out; a hit with no matches at all
/// yields no highlight entry.
fn highlight_doc(
    doc: &ProductDoc,
    root: &Clause,
    hl: &HighlightSpec,
) -> Option<BTreeMap<String, Vec<String>>> {
    let mut out = BTreeMap::new();
    for field in &hl.fields {
        let mut terms = Vec::new();
        collect_terms(root, field, &mut terms);
        if terms.is_empty() {
            continue;
        }
        let Some(text) = str_field(doc, field) else { continue };
        let mut hit = false;
        let snippet: Vec<String> = text
            .split_whitespace()
            .map(|word| {
                let norm = word
                    .trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase();
                if terms.contains(&norm) {
                    hit = true;
                    format!("<em>{word}</em>")
                } else {
                    word.to_string()
                }
            })
            .collect();
        if hit {
            out.insert(field.clone(), vec![snippet.join(" ")]);
        }
    }
    (!out.is_empty()).then_some(out)
}

/// Lowercased tokens from the match-family clauses targeting `field`.
fn collect_terms(clause: &Clause, field: &str, out: &mut Vec<String>) {
    match clause {
        Clause::Match { field: f, value }
        | Clause::MatchPhrase { field: f, value }
        | Clause::Fuzzy { field: f, value } => {
            if f == field {
                out.extend(tokenize(value));
            }
        }
        Clause::MultiMatch { fields, value, .. } => {
            if fields.iter().any(|f| f == field) {
                out.extend(tokenize(value));
            }
        }
        Clause::Bool { must, should, must_not } => {
            for c in must.iter().chain(should).chain(must_not) {
                collect_terms(c, field, out);
            }
        }
        Clause::FunctionScore { query, .. } => collect_terms(query, field, out),
        _ => {}
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// AUTO fuzziness: allowed edits by term length.
fn auto_fuzz(len: usize) -> usize {
    match len {
        0..=2 => 0,
        3..=5 => 1,
        _ => 2,
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let sub = prev[j] + usize::from(ca != cb);
            cur[j + 1] = sub.min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Glob matcher supporting `*` and `?`.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let (mut star, mut mark) = (None, 0usize);
    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

const EARTH_RADIUS_KM: f64 = 6371.0;

fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::TagRef;

    fn doc(id: &str, title: &str, price: f64, category: &str, tags: &[&str]) -> ProductDoc {
        ProductDoc {
            id: id.into(),
            title: title.into(),
            description: format!("{title} description"),
            category: category.into(),
            price,
            brand: "Acme".into(),
            sku: format!("SKU-{id}"),
            thumbnail: String::new(),
            brand_name: None,
            tags: tags.iter().map(|t| TagRef { tag: t.to_string() }).collect(),
            location: None,
        }
    }

    #[test]
    fn nested_conditions_stay_inside_one_embedded_object() {
        let d = doc("1", "Red Shoes", 40.0, "fashion", &["red", "xl"]);
        // Both conditions on one object: no single tag is red AND xl.
        let cross = Clause::Nested {
            path: "tags".into(),
            query: Box::new(Clause::Bool {
                must: vec![
                    Clause::Term { field: "tags.tag".into(), value: "red".into() },
                    Clause::Term { field: "tags.tag".into(), value: "xl".into() },
                ],
                should: vec![],
                must_not: vec![],
            }),
        };
        assert_eq!(eval(&cross, &d), None);
        // OR across objects is fine.
        let any = Clause::Nested {
            path: "tags".into(),
            query: Box::new(Clause::Terms {
                field: "tags.tag".into(),
                values: vec!["red".into(), "xl".into()],
            }),
        };
        assert!(eval(&any, &d).is_some());
    }

    #[test]
    fn match_tokenizes_and_phrase_requires_contiguity() {
        let d = doc("1", "Bright Red Running Shoes", 40.0, "fashion", &[]);
        let m = Clause::Match { field: "title".into(), value: "shoes red".into() };
        assert_eq!(eval(&m, &d), Some(2.0));
        let hit = Clause::MatchPhrase { field: "title".into(), value: "red running".into() };
        assert!(eval(&hit, &d).is_some());
        let miss = Clause::MatchPhrase { field: "title".into(), value: "red shoes".into() };
        assert_eq!(eval(&miss, &d), None);
    }

    #[test]
    fn fuzzy_tolerates_auto_edit_distance() {
        let d = doc("1", "Red Shoes", 40.0, "fashion", &[]);
        assert!(eval(&Clause::Fuzzy { field: "title".into(), value: "shoez".into() }, &d).is_some());
        assert_eq!(eval(&Clause::Fuzzy { field: "title".into(), value: "boots".into() }, &d), None);
        // Short terms get no edits.
        assert_eq!(eval(&Clause::Fuzzy { field: "title".into(), value: "rd".into() }, &d), None);
    }

    #[test]
    fn range_and_term_and_ids() {
        let d = doc("p1", "Red Shoes", 40.0, "fashion", &[]);
        let range = Clause::Range { field: "price".into(), gte: Some(30.0), lte: Some(50.0) };
        assert!(eval(&range, &d).is_some());
        let out = Clause::Range { field: "price".into(), gte: Some(41.0), lte: None };
        assert_eq!(eval(&out, &d), None);
        assert!(eval(&Clause::Term { field: "category".into(), value: "fashion".into() }, &d).is_some());
        assert_eq!(eval(&Clause::Term { field: "category".into(), value: "Fashion".into() }, &d), None);
        assert!(eval(&Clause::Ids { values: vec!["p1".into()] }, &d).is_some());
        assert_eq!(eval(&Clause::Ids { values: vec!["p2".into()] }, &d), None);
    }

    #[test]
    fn wildcard_and_prefix_run_per_token() {
        let d = doc("1", "Elegant Lamp", 10.0, "home", &[]);
        assert!(eval(&Clause::Prefix { field: "title".into(), value: "el".into() }, &d).is_some());
        assert!(eval(&Clause::Wildcard { field: "title".into(), pattern: "el*nt".into() }, &d).is_some());
        assert_eq!(eval(&Clause::Wildcard { field: "title".into(), pattern: "zz*".into() }, &d), None);
    }

    #[test]
    fn bool_must_not_excludes_and_bare_should_requires_one() {
        let d = doc("1", "Red Shoes", 40.0, "fashion", &[]);
        let q = Clause::Bool {
            must: vec![Clause::MatchAll],
            should: vec![],
            must_not: vec![Clause::Term { field: "brand".into(), value: "Acme".into() }],
        };
        assert_eq!(eval(&q, &d), None);
        let q = Clause::Bool {
            must: vec![],
            should: vec![Clause::Term { field: "category".into(), value: "toys".into() }],
            must_not: vec![],
        };
        assert_eq!(eval(&q, &d), None);
    }

    #[test]
    fn geo_distance_and_bounding_box() {
        let mut d = doc("1", "Lamp", 10.0, "home", &[]);
        d.location = Some(GeoPoint { lat: 40.7, lon: -73.9 });
        let near = Clause::GeoDistance {
            field: "location".into(),
            distance_km: 50.0,
            center: GeoPoint { lat: 40.73, lon: -73.93 },
        };
        assert!(eval(&near, &d).is_some());
        let far = Clause::GeoDistance {
            field: "location".into(),
            distance_km: 5.0,
            center: GeoPoint { lat: 34.0, lon: -118.0 },
        };
        assert_eq!(eval(&far, &d), None);
        let inside = Clause::GeoBoundingBox {
            field: "location".into(),
            top_left: GeoPoint { lat: 41.0, lon: -74.0 },
            bottom_right: GeoPoint { lat: 39.0, lon: -70.0 },
        };
        assert!(eval(&inside, &d).is_some());
    }

    #[test]
    fn function_score_scales_by_price() {
        let d = doc("1", "Lamp", 25.0, "home", &[]);
        let q = Clause::FunctionScore {
            query: Box::new(Clause::MatchAll),
            field: "price".into(),
            factor: 2.0,
        };
        assert_eq!(eval(&q, &d), Some(50.0));
    }

    #[test]
    fn levenshtein_and_wildcard_primitives() {
        assert_eq!(levenshtein("shoes", "shoez"), 1);
        assert_eq!(levenshtein("", "abc"), 3);
        assert!(wildcard_match("el*", "elegant"));
        assert!(wildcard_match("e?e*", "elegant"));
        assert!(!wildcard_match("el*", "lamp"));
    }
}
