//! Query builders for the three endpoint variants.
//!
//! Each builder parses and validates its parameters first, then walks a
//! fixed ordered list of clause steps. A step pushes at most one clause
//! onto the composer; the result is AND-folded into a single tree. The
//! step order is the documented parameter order, never the arrival
//! order, so identical parameters always produce an identical tree. On
//! any validation failure the whole build is discarded; no partial tree
//! escapes.

use crate::errors::{Result, SearchError};
use crate::model::GeoPoint;
use crate::params::{parse_f64, parse_u64, split_csv, AdvancedParams, ToggleParams};
use crate::query::{
    AggSpec, Clause, HighlightSpec, Modifiers, QueryTree, SortOrder, SortSpec,
};
use crate::schema::{self, FieldKind};

/// Default page size when none is requested.
pub const DEFAULT_SIZE: u64 = 10;

/// Name of the static category aggregation on the faceted endpoint.
pub const CATEGORY_AGG: &str = "category_agg";

// The basic endpoint ships a fixed result window.
const BASIC_OFFSET: u64 = 1;
const BASIC_LIMIT: u64 = 3;

// Demo coordinates for the geo toggle clauses; these were never
// parameterized in the produced interface.
const GEO_CENTER: GeoPoint = GeoPoint { lat: 40.73, lon: -73.93 };
const GEO_RADIUS_KM: f64 = 50.0;
const BBOX_TOP_LEFT: GeoPoint = GeoPoint { lat: 40.0, lon: -74.0 };
const BBOX_BOTTOM_RIGHT: GeoPoint = GeoPoint { lat: 39.0, lon: -70.0 };

// Scale applied by the script-score toggle (doc price * factor).
const SCRIPT_SCORE_FACTOR: f64 = 1.0;

/// Accumulates the boolean arms while steps run.
#[derive(Default)]
struct Composer {
    must: Vec<Clause>,
    should: Vec<Clause>,
    must_not: Vec<Clause>,
}

impl Composer {
    fn and(&mut self, clause: Clause) {
        self.must.push(clause);
    }

    fn or(&mut self, clause: Clause) {
        self.should.push(clause);
    }

    fn not(&mut self, clause: Clause) {
        self.must_not.push(clause);
    }

    fn into_tree(self) -> Result<QueryTree> {
        QueryTree::compose(self.must, self.should, self.must_not)
    }
}

/// Basic search: comma-joined terms fuzzily matched over the full-text
/// fields, price-descending, fixed window.
pub fn build_basic(search: &str) -> Result<(QueryTree, Modifiers)> {
    let joined = split_csv(search).join(" ");
    if joined.is_empty() {
        return Err(SearchError::Validation(
            "search must contain at least one term".into(),
        ));
    }
    let mut c = Composer::default();
    c.and(Clause::MultiMatch {
        fields: schema::FULLTEXT_FIELDS.iter().map(|f| f.to_string()).collect(),
        value: joined,
        fuzzy: true,
    });
    let tree = c.into_tree()?;
    let mut mods = Modifiers::window(BASIC_OFFSET, BASIC_LIMIT);
    mods.sort = Some(SortSpec { field: schema::PRICE.into(), order: SortOrder::Desc });
    Ok((tree, mods))
}

/// Validated input for the toggle builder.
struct ToggleInput {
    search: Option<String>,
    category: Option<String>,
    brand: Option<String>,
    tag: Option<String>,
    terms: Vec<String>,
    ids: Vec<String>,
    price: Option<(f64, f64)>,
    flags: ToggleParams,
}

impl ToggleInput {
    fn parse(p: &ToggleParams) -> Result<(Self, u64, u64)> {
        let from = parse_u64("from", p.from.as_deref())?.unwrap_or(0);
        let size = parse_u64("size", p.size.as_deref())?.unwrap_or(DEFAULT_SIZE);
        if size == 0 {
            return Err(SearchError::Validation("size must be positive".into()));
        }
        let price = match p.price_range.as_deref() {
            None => None,
            Some(raw) => {
                let parts = split_csv(raw);
                if parts.len() != 2 {
                    return Err(SearchError::Validation(format!(
                        "price_range must be \"lo,hi\", got {raw:?}"
                    )));
                }
                let lo = parse_f64("price_range lower bound", Some(&parts[0]))?
                    .ok_or_else(|| SearchError::Validation("price_range lower bound is empty".into()))?;
                let hi = parse_f64("price_range upper bound", Some(&parts[1]))?
                    .ok_or_else(|| SearchError::Validation("price_range upper bound is empty".into()))?;
                if lo > hi {
                    return Err(SearchError::Validation(format!(
                        "price bounds inverted: {lo} > {hi}"
                    )));
                }
                Some((lo, hi))
            }
        };
        let input = Self {
            search: clean(&p.search),
            category: clean(&p.category),
            brand: clean(&p.brand),
            tag: clean(&p.tag),
            terms: p.terms.as_deref().map(split_csv).unwrap_or_default(),
            ids: p.ids.as_deref().map(split_csv).unwrap_or_default(),
            price,
            flags: p.clone(),
        };
        Ok((input, from, size))
    }
}

type ToggleStep = fn(&ToggleInput, &mut Composer) -> Result<()>;

/// Clause steps in documented order. Every flag contributes exactly one
/// clause when enabled; a flag missing its value parameter is a
/// validation error rather than a silently hardcoded constant.
const TOGGLE_STEPS: &[ToggleStep] = &[
    step_search,
    step_term,
    step_terms,
    step_range,
    step_should,
    step_must_not,
    step_nested,
    step_prefix,
    step_wildcard,
    step_fuzzy,
    step_match_all,
    step_exists,
    step_ids,
    step_geo_distance,
    step_geo_bounding_box,
    step_edge_ngram,
    step_span,
    step_script_score,
];

/// Faceted/toggle search: every enabled flag AND-composes one clause;
/// highlighting and the category aggregation are always attached.
pub fn build_toggled(p: &ToggleParams) -> Result<(QueryTree, Modifiers)> {
    let (input, from, size) = ToggleInput::parse(p)?;
    let mut c = Composer::default();
    for step in TOGGLE_STEPS {
        step(&input, &mut c)?;
    }
    let tree = c.into_tree()?;
    let mods = Modifiers {
        offset: from,
        limit: size,
        sort: None,
        highlight: Some(HighlightSpec {
            fields: vec![schema::TITLE.into(), schema::DESCRIPTION.into()],
        }),
        aggs: vec![AggSpec { name: CATEGORY_AGG.into(), field: schema::CATEGORY.into() }],
    };
    Ok((tree, mods))
}

fn step_search(i: &ToggleInput, c: &mut Composer) -> Result<()> {
    if let Some(q) = &i.search {
        if i.flags.phrase {
            c.and(Clause::MatchPhrase { field: schema::TITLE.into(), value: q.clone() });
        } else {
            c.and(Clause::Match { field: schema::TITLE.into(), value: q.clone() });
        }
    }
    Ok(())
}

fn step_term(i: &ToggleInput, c: &mut Composer) -> Result<()> {
    if i.flags.term {
        let v = require("term", "category", &i.category)?;
        c.and(Clause::Term { field: schema::CATEGORY.into(), value: v });
    }
    Ok(())
}

// A non-empty terms list enables the clause by itself; the terms_q
// flag alone still demands its value parameter.
fn step_terms(i: &ToggleInput, c: &mut Composer) -> Result<()> {
    if i.flags.terms_q && i.terms.is_empty() {
        return Err(SearchError::Validation(
            "terms_q requires the terms parameter".into(),
        ));
    }
    if !i.terms.is_empty() {
        c.and(Clause::Terms { field: schema::CATEGORY.into(), values: i.terms.clone() });
    }
    Ok(())
}

fn step_range(i: &ToggleInput, c: &mut Composer) -> Result<()> {
    if let Some((lo, hi)) = i.price {
        c.and(Clause::Range { field: schema::PRICE.into(), gte: Some(lo), lte: Some(hi) });
    }
    Ok(())
}

fn step_should(i: &ToggleInput, c: &mut Composer) -> Result<()> {
    if i.flags.should {
        let v = require("should", "category", &i.category)?;
        c.or(Clause::Match { field: schema::CATEGORY.into(), value: v });
    }
    Ok(())
}

fn step_must_not(i: &ToggleInput, c: &mut Composer) -> Result<()> {
    if i.flags.must_not {
        let v = require("must_not", "brand", &i.brand)?;
        c.not(Clause::Term { field: schema::BRAND.into(), value: v });
    }
    Ok(())
}

fn step_nested(i: &ToggleInput, c: &mut Composer) -> Result<()> {
    if i.flags.nested {
        let v = require("nested", "tag", &i.tag)?;
        c.and(Clause::Nested {
            path: schema::TAGS.into(),
            query: Box::new(Clause::Match {
                field: schema::nested_field(schema::TAGS, "tag"),
                value: v,
            }),
        });
    }
    Ok(())
}

fn step_prefix(i: &ToggleInput, c: &mut Composer) -> Result<()> {
    if i.flags.prefix {
        let v = require("prefix", "search", &i.search)?;
        c.and(Clause::Prefix { field: schema::TITLE.into(), value: v });
    }
    Ok(())
}

fn step_wildcard(i: &ToggleInput, c: &mut Composer) -> Result<()> {
    if i.flags.wildcard {
        let v = require("wildcard", "search", &i.search)?;
        c.and(Clause::Wildcard { field: schema::TITLE.into(), pattern: format!("{v}*") });
    }
    Ok(())
}

fn step_fuzzy(i: &ToggleInput, c: &mut Composer) -> Result<()> {
    if i.flags.fuzzy {
        let v = require("fuzzy", "search", &i.search)?;
        c.and(Clause::Fuzzy { field: schema::TITLE.into(), value: v });
    }
    Ok(())
}

fn step_match_all(i: &ToggleInput, c: &mut Composer) -> Result<()> {
    if i.flags.match_all {
        c.and(Clause::MatchAll);
    }
    Ok(())
}

fn step_exists(i: &ToggleInput, c: &mut Composer) -> Result<()> {
    if i.flags.exists {
        c.and(Clause::Exists { field: schema::PRICE.into() });
    }
    Ok(())
}

fn step_ids(i: &ToggleInput, c: &mut Composer) -> Result<()> {
    if i.flags.ids_q && i.ids.is_empty() {
        return Err(SearchError::Validation(
            "ids_q requires the ids parameter".into(),
        ));
    }
    if !i.ids.is_empty() {
        c.and(Clause::Ids { values: i.ids.clone() });
    }
    Ok(())
}

fn step_geo_distance(i: &ToggleInput, c: &mut Composer) -> Result<()> {
    if i.flags.geo {
        c.and(Clause::GeoDistance {
            field: schema::LOCATION.into(),
            distance_km: GEO_RADIUS_KM,
            center: GEO_CENTER,
        });
    }
    Ok(())
}

fn step_geo_bounding_box(i: &ToggleInput, c: &mut Composer) -> Result<()> {
    if i.flags.geo_bounding_box {
        c.and(Clause::GeoBoundingBox {
            field: schema::LOCATION.into(),
            top_left: BBOX_TOP_LEFT,
            bottom_right: BBOX_BOTTOM_RIGHT,
        });
    }
    Ok(())
}

fn step_edge_ngram(i: &ToggleInput, c: &mut Composer) -> Result<()> {
    // Query-side approximation of edge-ngram matching.
    if i.flags.edge_ngram {
        let v = require("edge_ngram", "search", &i.search)?;
        c.and(Clause::Prefix { field: schema::TITLE.into(), value: v });
    }
    Ok(())
}

fn step_span(i: &ToggleInput, c: &mut Composer) -> Result<()> {
    if i.flags.span {
        let v = require("span", "category", &i.category)?;
        c.and(Clause::SpanTerm { field: schema::CATEGORY.into(), value: v });
    }
    Ok(())
}

fn step_script_score(i: &ToggleInput, c: &mut Composer) -> Result<()> {
    if i.flags.script_score {
        c.and(Clause::FunctionScore {
            query: Box::new(Clause::MatchAll),
            field: schema::PRICE.into(),
            factor: SCRIPT_SCORE_FACTOR,
        });
    }
    Ok(())
}

/// Validated input for the advanced builder.
struct AdvancedInput {
    search: Option<String>,
    category: Option<String>,
    brand: Option<String>,
    min_price: Option<f64>,
    max_price: Option<f64>,
    tags: Vec<String>,
}

impl AdvancedInput {
    fn parse(p: &AdvancedParams) -> Result<(Self, Modifiers)> {
        let min_price = parse_f64("min_price", p.min_price.as_deref())?;
        let max_price = parse_f64("max_price", p.max_price.as_deref())?;
        if let (Some(lo), Some(hi)) = (min_price, max_price) {
            if lo > hi {
                return Err(SearchError::Validation(format!(
                    "price bounds inverted: min_price {lo} > max_price {hi}"
                )));
            }
        }
        let page = parse_u64("page", p.page.as_deref())?.unwrap_or(1);
        if page == 0 {
            return Err(SearchError::Validation("page must be >= 1".into()));
        }
        let size = parse_u64("size", p.size.as_deref())?.unwrap_or(DEFAULT_SIZE);
        if size == 0 {
            return Err(SearchError::Validation("size must be positive".into()));
        }
        let sort_by = clean(&p.sort_by).unwrap_or_else(|| schema::PRICE.into());
        match schema::field_kind(&sort_by) {
            FieldKind::Numeric | FieldKind::Keyword => {}
            _ => {
                return Err(SearchError::Validation(format!(
                    "cannot sort on field {sort_by:?}"
                )))
            }
        }
        let order = match clean(&p.sort_order) {
            Some(raw) => SortOrder::parse(&raw)?,
            None => SortOrder::Asc,
        };
        let mods = Modifiers {
            offset: (page - 1) * size,
            limit: size,
            sort: Some(SortSpec { field: sort_by, order }),
            highlight: None,
            aggs: Vec::new(),
        };
        let input = Self {
            search: clean(&p.search),
            category: clean(&p.category),
            brand: clean(&p.brand),
            min_price,
            max_price,
            tags: p.tags.as_deref().map(split_csv).unwrap_or_default(),
        };
        Ok((input, mods))
    }
}

type AdvancedStep = fn(&AdvancedInput, &mut Composer) -> Result<()>;

const ADVANCED_STEPS: &[AdvancedStep] = &[
    adv_search,
    adv_category,
    adv_brand,
    adv_price,
    adv_tags,
];

/// Advanced structured search: paginated, sorted, with total count.
pub fn build_advanced(p: &AdvancedParams) -> Result<(QueryTree, Modifiers)> {
    let (input, mods) = AdvancedInput::parse(p)?;
    let mut c = Composer::default();
    for step in ADVANCED_STEPS {
        step(&input, &mut c)?;
    }
    Ok((c.into_tree()?, mods))
}

fn adv_search(i: &AdvancedInput, c: &mut Composer) -> Result<()> {
    if let Some(q) = &i.search {
        c.and(Clause::MultiMatch {
            fields: schema::FULLTEXT_FIELDS.iter().map(|f| f.to_string()).collect(),
            value: q.clone(),
            fuzzy: false,
        });
    }
    Ok(())
}

fn adv_category(i: &AdvancedInput, c: &mut Composer) -> Result<()> {
    if let Some(v) = &i.category {
        c.and(Clause::Term { field: schema::CATEGORY.into(), value: v.clone() });
    }
    Ok(())
}

fn adv_brand(i: &AdvancedInput, c: &mut Composer) -> Result<()> {
    if let Some(v) = &i.brand {
        c.and(Clause::Term { field: schema::BRAND.into(), value: v.clone() });
    }
    Ok(())
}

fn adv_price(i: &AdvancedInput, c: &mut Composer) -> Result<()> {
    if i.min_price.is_some() || i.max_price.is_some() {
        c.and(Clause::Range {
            field: schema::PRICE.into(),
            gte: i.min_price,
            lte: i.max_price,
        });
    }
    Ok(())
}

/// All requested tags go into a single nested clause as OR-of-terms.
/// Separate top-level clauses would break nested isolation.
fn adv_tags(i: &AdvancedInput, c: &mut Composer) -> Result<()> {
    if !i.tags.is_empty() {
        c.and(Clause::Nested {
            path: schema::TAGS.into(),
            query: Box::new(Clause::Terms {
                field: schema::nested_field(schema::TAGS, "tag"),
                values: i.tags.clone(),
            }),
        });
    }
    Ok(())
}

fn clean(raw: &Option<String>) -> Option<String> {
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn require(flag: &str, param: &str, value: &Option<String>) -> Result<String> {
    value
        .clone()
        .ok_or_else(|| SearchError::Validation(format!("{flag} requires the {param} parameter")))
}
