//! End-to-end scenarios over the in-memory engine: params in, envelope
//! out, exercising the builder, engine and mapper together.

use catalog_core::{
    build_advanced, build_basic, build_toggled, map_advanced, map_basic, map_toggled,
    AdvancedParams, ProductDoc, TagRef, ToggleParams,
};
use catalog_engine::{InMemoryEngine, SearchEngine};

fn catalog() -> Vec<ProductDoc> {
    let mk = |id: &str, title: &str, price: f64, category: &str, tags: &[&str]| ProductDoc {
        id: id.into(),
        title: title.into(),
        description: format!("A pair of {}", title.to_lowercase()),
        category: category.into(),
        price,
        brand: "Acme".into(),
        sku: format!("SKU-{id}"),
        thumbnail: format!("http://img/{id}.png"),
        brand_name: None,
        tags: tags.iter().map(|t| TagRef { tag: t.to_string() }).collect(),
        location: None,
    };
    vec![
        mk("p1", "Red Shoes", 40.0, "fashion", &["red"]),
        mk("p2", "Blue Shoes", 60.0, "fashion", &["blue"]),
        mk("p3", "Red Hat", 20.0, "accessories", &["red"]),
    ]
}

fn engine() -> InMemoryEngine {
    let e = InMemoryEngine::new();
    e.load(catalog());
    e
}

#[tokio::test]
async fn advanced_search_sorts_by_price_and_reports_the_full_total() {
    let params = AdvancedParams {
        search: Some("shoes".into()),
        sort_by: Some("price".into()),
        sort_order: Some("asc".into()),
        ..Default::default()
    };
    let (tree, mods) = build_advanced(&params).unwrap();
    let raw = engine().execute(&tree, &mods).await.unwrap();
    let env = map_advanced(&raw, 1, 10);

    assert_eq!(env.status, 200);
    assert_eq!(env.total, Some(2));
    let titles: Vec<_> = env.products.iter().filter_map(|p| p.title.as_deref()).collect();
    assert_eq!(titles, ["Red Shoes", "Blue Shoes"]);
}

#[tokio::test]
async fn advanced_pagination_windows_hits_but_not_the_total() {
    let params = AdvancedParams {
        page: Some("2".into()),
        size: Some("2".into()),
        sort_by: Some("price".into()),
        sort_order: Some("asc".into()),
        ..Default::default()
    };
    let (tree, mods) = build_advanced(&params).unwrap();
    let raw = engine().execute(&tree, &mods).await.unwrap();
    let env = map_advanced(&raw, 2, 2);

    assert_eq!(env.total, Some(3));
    assert_eq!(env.products.len(), 1);
    assert_eq!(env.products[0].title.as_deref(), Some("Blue Shoes"));
}

#[tokio::test]
async fn advanced_tags_filter_matches_any_requested_tag() {
    let params = AdvancedParams { tags: Some("red".into()), ..Default::default() };
    let (tree, mods) = build_advanced(&params).unwrap();
    let raw = engine().execute(&tree, &mods).await.unwrap();
    let env = map_advanced(&raw, 1, 10);

    assert_eq!(env.total, Some(2));
    let titles: Vec<_> = env.products.iter().filter_map(|p| p.title.as_deref()).collect();
    assert_eq!(titles, ["Red Hat", "Red Shoes"]);
    for p in &env.products {
        assert!(p.tags.as_ref().unwrap().contains(&"red".to_string()));
    }
}

#[tokio::test]
async fn faceted_search_counts_categories_over_the_whole_match_set() {
    let params = ToggleParams::default();
    let (tree, mods) = build_toggled(&params).unwrap();
    let raw = engine().execute(&tree, &mods).await.unwrap();
    let env = map_toggled(&raw);

    let buckets = env.aggregations.unwrap();
    assert_eq!(buckets.len(), 2);
    assert_eq!((buckets[0].key.as_str(), buckets[0].doc_count), ("fashion", 2));
    assert_eq!((buckets[1].key.as_str(), buckets[1].doc_count), ("accessories", 1));
}

#[tokio::test]
async fn faceted_highlight_wraps_matched_terms() {
    let params = ToggleParams { search: Some("shoes".into()), ..Default::default() };
    let (tree, mods) = build_toggled(&params).unwrap();
    let raw = engine().execute(&tree, &mods).await.unwrap();
    let env = map_toggled(&raw);

    assert_eq!(env.products.len(), 2);
    for p in &env.products {
        let hl = p.highlight.as_ref().unwrap();
        assert!(hl["title"][0].contains("<em>Shoes</em>"));
    }
}

#[tokio::test]
async fn faceted_filters_compose_as_intersection() {
    let params = ToggleParams {
        search: Some("shoes".into()),
        category: Some("fashion".into()),
        price_range: Some("35,50".into()),
        term: true,
        ..Default::default()
    };
    let (tree, mods) = build_toggled(&params).unwrap();
    let raw = engine().execute(&tree, &mods).await.unwrap();
    let env = map_toggled(&raw);

    assert_eq!(env.products.len(), 1);
    assert_eq!(env.products[0].title.as_deref(), Some("Red Shoes"));
}

#[tokio::test]
async fn nested_tag_filter_never_leaks_across_products() {
    let params = ToggleParams {
        tag: Some("blue".into()),
        nested: true,
        ..Default::default()
    };
    let (tree, mods) = build_toggled(&params).unwrap();
    let raw = engine().execute(&tree, &mods).await.unwrap();
    assert_eq!(raw.hits.len(), 1);
    assert_eq!(map_toggled(&raw).products[0].title.as_deref(), Some("Blue Shoes"));
}

#[tokio::test]
async fn basic_search_serves_a_fixed_window_without_totals() {
    let (tree, mods) = build_basic("shoes").unwrap();
    let raw = engine().execute(&tree, &mods).await.unwrap();
    let env = map_basic(&raw);

    // Fixed window starts at the second hit: price desc puts Blue
    // Shoes first, so only Red Shoes is served.
    assert_eq!(env.products.len(), 1);
    assert_eq!(env.products[0].title.as_deref(), Some("Red Shoes"));
    assert!(env.total.is_none());
    assert!(env.aggregations.is_none());
    assert!(env.products[0].tags.is_none());
}

#[tokio::test]
async fn basic_search_is_typo_tolerant() {
    let (tree, mods) = build_basic("shoez").unwrap();
    let raw = engine().execute(&tree, &mods).await.unwrap();
    assert_eq!(raw.total, 2);
}

#[tokio::test]
async fn empty_match_set_yields_an_empty_page_and_zero_total() {
    let params = AdvancedParams { category: Some("toys".into()), ..Default::default() };
    let (tree, mods) = build_advanced(&params).unwrap();
    let raw = engine().execute(&tree, &mods).await.unwrap();
    let env = map_advanced(&raw, 1, 10);

    assert_eq!(env.total, Some(0));
    assert!(env.products.is_empty());
}
