use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use catalog_core::{
    build_advanced, build_basic, build_toggled, map_advanced, map_basic, map_toggled,
    AdvancedParams, BasicParams, Modifiers, ProductDoc, QueryTree, RawResult, SearchEnvelope,
    ToggleParams,
};
use catalog_engine::{InMemoryEngine, RemoteEngine, SearchEngine};
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, Level};

mod metrics;

const DEFAULT_LISTEN: &str = "0.0.0.0:8080";
const ENGINE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
struct AppState {
    engine: Arc<dyn SearchEngine>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_env_filter("info")
        .init();

    let engine: Arc<dyn SearchEngine> = match std::env::var("ENGINE_URL") {
        Ok(url) => match RemoteEngine::new(&url, ENGINE_TIMEOUT) {
            Ok(remote) => {
                info!("using remote engine at {}", url);
                Arc::new(remote)
            }
            Err(e) => {
                tracing::warn!("engine client init failed: {} — falling back to memory", e);
                Arc::new(seeded_memory())
            }
        },
        Err(_) => Arc::new(seeded_memory()),
    };
    let state = AppState { engine };

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/products/search", get(search_basic))
        .route("/api/products/search/faceted", get(search_faceted))
        .route("/api/products/search/advanced", get(search_advanced))
        .route("/metrics", get(metrics_text))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr: SocketAddr = std::env::var("LISTEN_ADDR")
        .unwrap_or_else(|_| DEFAULT_LISTEN.into())
        .parse()?;
    info!("http listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Dev/fixture engine, optionally preloaded from PRODUCTS_PATH (a JSON
/// array of product documents). A missing or unreadable fixture leaves
/// the index empty rather than failing startup.
fn seeded_memory() -> InMemoryEngine {
    let engine = InMemoryEngine::new();
    if let Ok(path) = std::env::var("PRODUCTS_PATH") {
        match std::fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|raw| serde_json::from_str::<Vec<ProductDoc>>(&raw).map_err(Into::into))
        {
            Ok(docs) => {
                info!("loaded {} products from {}", docs.len(), path);
                engine.load(docs);
            }
            Err(e) => tracing::warn!("product fixture load failed: {} — starting empty", e),
        }
    }
    engine
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Basic search. No search terms means an empty result page, not an
/// error; the transport status is always 200 and the envelope carries
/// the outcome.
async fn search_basic(
    State(app): State<AppState>,
    Query(p): Query<BasicParams>,
) -> Json<SearchEnvelope> {
    let Some(q) = p.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        metrics::SEARCH_TOTAL.with_label_values(&["basic", "ok"]).inc();
        return Json(SearchEnvelope::empty("Products"));
    };
    Json(run(&app, "basic", build_basic(q), |raw| map_basic(raw)).await)
}

async fn search_faceted(
    State(app): State<AppState>,
    Query(p): Query<ToggleParams>,
) -> Json<SearchEnvelope> {
    Json(run(&app, "faceted", build_toggled(&p), |raw| map_toggled(raw)).await)
}

async fn search_advanced(
    State(app): State<AppState>,
    Query(p): Query<AdvancedParams>,
) -> Json<SearchEnvelope> {
    let _timer = metrics::SEARCH_DURATION.with_label_values(&["advanced"]).start_timer();
    let env = match build_advanced(&p) {
        Ok((tree, mods)) => {
            let page = mods.offset / mods.limit + 1;
            let size = mods.limit;
            match app.engine.execute(&tree, &mods).await {
                Ok(raw) => {
                    metrics::SEARCH_TOTAL.with_label_values(&["advanced", "ok"]).inc();
                    map_advanced(&raw, page, size)
                }
                Err(e) => failed("advanced", &e),
            }
        }
        Err(e) => failed("advanced", &e),
    };
    Json(env)
}

async fn run<F>(
    app: &AppState,
    variant: &'static str,
    built: catalog_core::Result<(QueryTree, Modifiers)>,
    project: F,
) -> SearchEnvelope
where
    F: FnOnce(&RawResult) -> SearchEnvelope,
{
    let _timer = metrics::SEARCH_DURATION.with_label_values(&[variant]).start_timer();
    match built {
        Ok((tree, mods)) => match app.engine.execute(&tree, &mods).await {
            Ok(raw) => {
                metrics::SEARCH_TOTAL.with_label_values(&[variant, "ok"]).inc();
                project(&raw)
            }
            Err(e) => failed(variant, &e),
        },
        Err(e) => failed(variant, &e),
    }
}

fn failed(variant: &'static str, e: &catalog_core::SearchError) -> SearchEnvelope {
    metrics::SEARCH_TOTAL.with_label_values(&[variant, "error"]).inc();
    tracing::warn!("{} search failed: {}", variant, e);
    SearchEnvelope::failure(e)
}

async fn metrics_text() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buf = Vec::new();
    let _ = encoder.encode(&metric_families, &mut buf);
    (StatusCode::OK, String::from_utf8(buf).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        AppState { engine: Arc::new(InMemoryEngine::new()) }
    }

    #[tokio::test]
    async fn validation_failures_come_back_in_the_envelope() {
        let p = AdvancedParams { page: Some("0".into()), ..Default::default() };
        let Json(env) = search_advanced(State(state()), Query(p)).await;
        assert_eq!(env.status, 400);
        assert!(env.products.is_empty());
        assert!(env.message.contains("page"));
    }

    #[tokio::test]
    async fn faceted_flag_without_its_parameter_is_a_validation_error() {
        let p = ToggleParams { nested: true, ..Default::default() };
        let Json(env) = search_faceted(State(state()), Query(p)).await;
        assert_eq!(env.status, 400);
    }

    #[tokio::test]
    async fn basic_without_search_serves_an_empty_page() {
        let Json(env) = search_basic(State(state()), Query(BasicParams::default())).await;
        assert_eq!(env.status, 200);
        assert!(env.products.is_empty());
    }
}
