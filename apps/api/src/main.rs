mod analysis;
mod analytics;
mod config;
mod db;
mod embedding;
mod errors;
mod evaluation;
mod extract;
mod intake;
mod models;
mod ranking;
mod routes;
mod state;
mod taxonomy;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::embedding::{Embedder, HttpEmbedder};
use crate::evaluation::matcher::MatcherConfig;
use crate::evaluation::queue::{spawn_workers, WorkerContext};
use crate::evaluation::recommend::{Recommender, TemplateRecommender};
use crate::evaluation::scorer::ScoringConfig;
use crate::routes::build_router;
use crate::state::AppState;
use crate::taxonomy::{SkillTaxonomy, TaxonomyHandle};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Shortlist API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Load the skill taxonomy. Failure here is fatal: the service must not
    // accept evaluations without a consistent taxonomy snapshot.
    let taxonomy = match config.taxonomy_path.as_deref() {
        Some(path) => SkillTaxonomy::load_from_path(path),
        None => SkillTaxonomy::load_default(),
    }
    .context("taxonomy failed to load, refusing to start")?;
    info!(
        "Skill taxonomy v{} loaded ({} canonical skills, {} equivalence rules)",
        taxonomy.version(),
        taxonomy.canonical_count(),
        taxonomy.equivalence_count()
    );
    let taxonomy = TaxonomyHandle::new(taxonomy);

    // Collaborators behind their trait seams
    let embedder: Arc<dyn Embedder> = Arc::new(HttpEmbedder::new(config.embedding_url.clone()));
    let recommender: Arc<dyn Recommender> = Arc::new(TemplateRecommender);
    info!("Embedding client initialized ({})", config.embedding_url);

    let matcher = MatcherConfig::default();
    let scoring = ScoringConfig::default();

    // Background worker pool
    let queue = spawn_workers(
        WorkerContext {
            db: db.clone(),
            taxonomy: taxonomy.clone(),
            embedder: embedder.clone(),
            recommender: recommender.clone(),
            matcher: matcher.clone(),
            scoring: scoring.clone(),
            stage_timeout: config.stage_timeout(),
        },
        config.worker_count,
        config.queue_capacity,
    );
    info!(
        "Evaluation worker pool started ({} workers, queue capacity {})",
        config.worker_count, config.queue_capacity
    );

    // Build app state
    let state = AppState {
        db,
        config: config.clone(),
        taxonomy,
        embedder,
        recommender,
        matcher,
        scoring,
        queue,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
