use catalog_core::{Modifiers, QueryTree, RawResult, Result};

/// The query execution gateway seam. Implementations are stateless per
/// call; the engine owns index consistency and is treated as opaque.
#[async_trait::async_trait]
pub trait SearchEngine: Send + Sync + 'static {
    /// Execute one composed request: query tree plus offset/limit,
    /// sort, highlight and aggregation modifiers, all in a single
    /// round trip.
    async fn execute(&self, tree: &QueryTree, mods: &Modifiers) -> Result<RawResult>;
}
