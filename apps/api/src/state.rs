use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::embedding::Embedder;
use crate::evaluation::matcher::MatcherConfig;
use crate::evaluation::queue::EvalQueue;
use crate::evaluation::recommend::Recommender;
use crate::evaluation::scorer::ScoringConfig;
use crate::taxonomy::TaxonomyHandle;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    /// Current taxonomy snapshot holder; swapped wholesale on reload.
    pub taxonomy: TaxonomyHandle,
    /// Pluggable embedding backend behind the `Embedder` trait.
    pub embedder: Arc<dyn Embedder>,
    /// Pluggable recommendation backend. Default: TemplateRecommender.
    pub recommender: Arc<dyn Recommender>,
    pub matcher: MatcherConfig,
    pub scoring: ScoringConfig,
    /// Background worker pool handle for submit/cancel.
    pub queue: EvalQueue,
}
